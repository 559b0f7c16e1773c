//! Integration tests for the AI core
//!
//! Covers the full pipeline:
//! - Nav mesh construction and A* corridor search
//! - Funnel smoothing on small hand-built meshes
//! - Perception passes with injected line of sight
//! - Behavior tree activation across ticks
//! - Manager-driven chase, loss of contact and investigation

use std::collections::BinaryHeap;
use std::sync::Arc;

use approx::assert_relative_eq;
use parking_lot::RwLock;
use void_ai_core::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn shared(mesh: NavMesh) -> Arc<RwLock<NavMesh>> {
    Arc::new(RwLock::new(mesh))
}

/// Square split along its diagonal: A = (v0, v1, v2), B = (v0, v2, v3)
fn two_triangles() -> NavMesh {
    let mut mesh = NavMesh::new();
    for p in [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(4.0, 0.0, 0.0),
        Vec3::new(4.0, 0.0, 4.0),
        Vec3::new(0.0, 0.0, 4.0),
    ] {
        mesh.add_vertex(p).unwrap();
    }
    mesh.add_polygon(&[0, 1, 2]).unwrap();
    mesh.add_polygon(&[0, 2, 3]).unwrap();
    mesh.build_adjacency();
    mesh
}

/// Three triangles bending around the vertex (3, 1)
fn l_bend() -> NavMesh {
    let mut mesh = NavMesh::new();
    for p in [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(4.0, 0.0, 0.0),
        Vec3::new(3.0, 0.0, 1.0),
        Vec3::new(4.0, 0.0, 4.0),
        Vec3::new(3.0, 0.0, 4.0),
    ] {
        mesh.add_vertex(p).unwrap();
    }
    mesh.add_polygon(&[0, 1, 2]).unwrap();
    mesh.add_polygon(&[1, 3, 2]).unwrap();
    mesh.add_polygon(&[2, 3, 4]).unwrap();
    mesh.build_adjacency();
    mesh
}

fn centroid(mesh: &NavMesh, id: u32) -> Vec3 {
    mesh.polygon(PolygonId(id)).unwrap().centroid
}

#[test]
fn test_same_polygon_path() {
    init_logging();
    let pathfinder = Pathfinder::new(shared(two_triangles()));

    let p = Vec3::new(3.0, 0.0, 1.0);
    let q = Vec3::new(3.5, 0.0, 0.5);
    let path = pathfinder.find_path(p, q, 1);

    assert_eq!(path.status(), PathStatus::Success);
    assert_eq!(path.points(), &[p, q]);
    assert_eq!(path.polygons(), &[PolygonId(0)]);
}

#[test]
fn test_two_polygon_funnel() {
    init_logging();
    let mesh = two_triangles();
    let start = centroid(&mesh, 0);
    let end = centroid(&mesh, 1);
    let pathfinder = Pathfinder::new(shared(mesh));

    let path = pathfinder.find_path(start, end, 1);

    assert_eq!(path.status(), PathStatus::Success);
    assert_eq!(path.points(), &[start, end]);
    assert_eq!(path.polygons(), &[PolygonId(0), PolygonId(1)]);
}

#[test]
fn test_l_bend_emits_corner() {
    init_logging();
    let mesh = l_bend();
    let start = centroid(&mesh, 0);
    let end = centroid(&mesh, 2);
    let mesh = shared(mesh);
    let pathfinder = Pathfinder::new(mesh.clone());

    let path = pathfinder.find_path(start, end, 1);

    assert_eq!(path.status(), PathStatus::Success);
    assert_eq!(path.polygons(), &[PolygonId(0), PolygonId(1), PolygonId(2)]);
    assert_eq!(path.points().len(), 3);
    assert_eq!(path.points()[0], start);
    assert_relative_eq!(path.points()[1].x, 3.0, epsilon = 1e-5);
    assert_relative_eq!(path.points()[1].z, 1.0, epsilon = 1e-5);
    assert_eq!(path.points()[2], end);

    // Every steering point lies on the walkable surface
    let mesh = mesh.read();
    for point in path.points() {
        assert!(mesh.find_polygon_for_point(*point).is_some());
    }
}

#[test]
fn test_disjoint_components_have_no_path() {
    init_logging();
    let mut mesh = NavMesh::new();
    for p in [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(4.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 4.0),
        Vec3::new(10.0, 0.0, 0.0),
        Vec3::new(14.0, 0.0, 0.0),
        Vec3::new(10.0, 0.0, 4.0),
    ] {
        mesh.add_vertex(p).unwrap();
    }
    mesh.add_polygon(&[0, 1, 2]).unwrap();
    mesh.add_polygon(&[3, 4, 5]).unwrap();
    mesh.build_adjacency();
    let pathfinder = Pathfinder::new(shared(mesh));

    let path = pathfinder.find_path(Vec3::new(1.0, 0.0, 1.0), Vec3::new(11.0, 0.0, 1.0), 5);

    assert_eq!(path.status(), PathStatus::FailureNoPath);
    assert!(path.points().is_empty());
    assert_eq!(path.agent_id(), 5);
}

#[test]
fn test_polygon_search_is_optimal() {
    let mut mesh = NavMesh::grid(20.0, 20.0, 5.0).unwrap();
    for id in [5, 6, 9] {
        mesh.set_cost(PolygonId(id), 3.0).unwrap();
    }
    mesh.set_walkable(PolygonId(10), false).unwrap();

    let corridor = mesh
        .find_polygon_path(PolygonId(0), PolygonId(15))
        .unwrap()
        .unwrap();
    assert!(!corridor.contains(&PolygonId(10)));

    // Reference Dijkstra over the same graph and edge costs
    let count = mesh.polygon_count();
    let mut best = vec![f32::INFINITY; count];
    let mut heap = BinaryHeap::new();
    best[0] = 0.0;
    heap.push((std::cmp::Reverse(0u64), 0usize));
    while let Some((std::cmp::Reverse(cost_bits), current)) = heap.pop() {
        let cost = f32::from_bits(cost_bits as u32);
        if cost > best[current] {
            continue;
        }
        let polygon = &mesh.polygons()[current];
        for neighbor in &polygon.neighbors {
            let next = mesh.polygon(neighbor.polygon).unwrap();
            if !next.walkable {
                continue;
            }
            let candidate = cost + polygon.centroid.distance(next.centroid) * next.cost;
            if candidate < best[next.id.index()] {
                best[next.id.index()] = candidate;
                heap.push((std::cmp::Reverse(candidate.to_bits() as u64), next.id.index()));
            }
        }
    }

    assert_relative_eq!(mesh.corridor_cost(&corridor), best[15], epsilon = 1e-3);
}

#[test]
fn test_path_consumption() {
    let mesh = l_bend();
    let start = centroid(&mesh, 0);
    let end = centroid(&mesh, 2);
    let pathfinder = Pathfinder::new(shared(mesh));
    let mut path = pathfinder.find_path(start, end, 1);

    let mut visited = Vec::new();
    while let Some(point) = path.current_point() {
        let before = path.cursor();
        path.next_point(point, 0.0);
        assert_eq!(path.cursor(), before + 1);
        visited.push(point);
    }

    assert_eq!(visited.len(), 3);
    assert!(path.is_completed());
    assert_eq!(path.next_point(end, 0.0), None);
}

#[test]
fn test_visual_contact() {
    init_logging();
    let mut perception = PerceptionSystem::new();
    let observer = perception
        .add_perceiver(
            Perceiver::new(1, Vec3::ZERO, Vec3::Z)
                .with_fov(std::f32::consts::FRAC_PI_2)
                .with_view_distance(10.0),
        )
        .unwrap();
    perception
        .add_perceivable(Perceivable::new(2, Vec3::new(0.0, 0.0, 5.0)).with_auditory_strength(0.0))
        .unwrap();
    // The observer's own body is registered too and must be ignored
    perception
        .add_perceivable(Perceivable::new(1, Vec3::ZERO))
        .unwrap();

    perception.update(16.0, 0.0);
    let contacts = perception.perceived_objects(observer).unwrap();

    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].entity_id, 2);
    assert_eq!(contacts[0].modality, Modality::Visual);
    assert_relative_eq!(contacts[0].strength, 0.5, epsilon = 1e-5);
    assert_relative_eq!(contacts[0].distance, 5.0, epsilon = 1e-5);
}

#[test]
fn test_wall_blocks_sight_but_not_sound() {
    let wall_at_x5 = |from: Vec3, to: Vec3, _exclude: u64| (from.x < 5.0) != (to.x < 5.0);
    let mut perception = PerceptionSystem::new().with_line_of_sight(wall_at_x5);
    let observer = perception
        .add_perceiver(Perceiver::new(1, Vec3::ZERO, Vec3::X))
        .unwrap();
    perception
        .add_perceivable(Perceivable::new(2, Vec3::new(8.0, 0.0, 0.0)))
        .unwrap();
    perception
        .add_perceivable(Perceivable::new(3, Vec3::new(9.0, 0.0, 0.0)).with_auditory_strength(1.0))
        .unwrap();

    perception.update(16.0, 0.0);
    let contacts = perception.perceived_objects(observer).unwrap();

    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].entity_id, 3);
    assert_eq!(contacts[0].modality, Modality::Auditory);
}

struct ArenaContext {
    delta_ms: f32,
    position: Vec3,
    target: Option<Vec3>,
    abilities: Vec<u32>,
}

impl BehaviorContext for ArenaContext {
    fn delta_ms(&self) -> f32 {
        self.delta_ms
    }

    fn agent_position(&self) -> Vec3 {
        self.position
    }

    fn set_agent_position(&mut self, position: Vec3) {
        self.position = position;
    }

    fn target_position(&self) -> Option<Vec3> {
        self.target
    }

    fn use_ability(&mut self, ability_id: u32) {
        self.abilities.push(ability_id);
    }
}

#[test]
fn test_sequence_with_running_child() {
    let mut tree = BehaviorTree::new(BehaviorNode::sequence_of(
        "wait_then_attack",
        vec![
            BehaviorNode::leaf("wait", Wait::new(300.0)),
            BehaviorNode::leaf("attack", Attack::new(9, 2.0)),
        ],
    ));
    let mut ctx = ArenaContext {
        delta_ms: 100.0,
        position: Vec3::ZERO,
        target: Some(Vec3::new(1.0, 0.0, 1.0)),
        abilities: Vec::new(),
    };

    for tick in 1..=3 {
        assert_eq!(tree.tick(&mut ctx), BehaviorStatus::Running, "tick {}", tick);
        assert_eq!(tree.root().cursor(), Some(0));
    }

    assert_eq!(tree.tick(&mut ctx), BehaviorStatus::Success);
    assert_eq!(ctx.abilities, vec![9]);

    // Out of range: the next activation waits again, then fails on the attack
    ctx.target = Some(Vec3::new(10.0, 0.0, 0.0));
    for _ in 0..3 {
        assert_eq!(tree.tick(&mut ctx), BehaviorStatus::Running);
    }
    assert_eq!(tree.tick(&mut ctx), BehaviorStatus::Failure);
    assert_eq!(ctx.abilities.len(), 1);
}

#[test]
fn test_selector_falls_back_to_move() {
    let mut tree = BehaviorTree::new(BehaviorNode::selector_of(
        "engage",
        vec![
            BehaviorNode::leaf("attack", Attack::new(1, 1.0)),
            BehaviorNode::leaf("approach", MoveTo::new(Vec2::new(5.0, 0.0), 1.0, 0.1)),
        ],
    ));
    let mut ctx = ArenaContext {
        delta_ms: 100.0,
        position: Vec3::ZERO,
        target: Some(Vec3::new(5.0, 0.0, 0.0)),
        abilities: Vec::new(),
    };

    let mut ticks = 0;
    while ctx.abilities.is_empty() && ticks < 20 {
        tree.tick(&mut ctx);
        ticks += 1;
    }

    assert_eq!(ctx.abilities, vec![1]);
    assert!(ctx.position.distance(Vec3::new(5.0, 0.0, 0.0)) <= 1.0);
}

#[test]
fn test_chase_lose_and_investigate() {
    init_logging();
    let mesh = shared(NavMesh::grid(30.0, 30.0, 5.0).unwrap());
    let perception = Arc::new(RwLock::new(PerceptionSystem::new()));
    let pathfinder = Arc::new(Pathfinder::new(mesh));
    let mut ai = AiManager::new(4, perception.clone(), pathfinder);

    ai.register_agent(1, Vec3::new(2.5, 0.0, 2.5), Vec3::Z).unwrap();
    let intruder = perception
        .write()
        .add_perceivable(Perceivable::new(100, Vec3::new(2.5, 0.0, 12.5)))
        .unwrap();

    ai.update(100.0, 0.0);
    assert_eq!(ai.get_agent(1).unwrap().state(), AgentState::Chase);
    assert_eq!(ai.get_agent(1).unwrap().target_entity(), Some(100));

    // The intruder slips away out of sight
    {
        let mut perception = perception.write();
        perception
            .set_perceivable_position(intruder, Vec3::new(27.5, 0.0, 27.5))
            .unwrap();
        perception.perceivable_mut(intruder).unwrap().visible = false;
    }

    ai.update(100.0, 100.0);
    assert_eq!(ai.get_agent(1).unwrap().state(), AgentState::Chase);

    ai.update(100.0, 200.0);
    let agent = ai.get_agent(1).unwrap();
    assert_eq!(agent.state(), AgentState::Investigate);
    assert_eq!(agent.goal(), Some(Vec3::new(2.5, 0.0, 12.5)));

    let mut time = 300.0;
    while ai.get_agent(1).unwrap().state() != AgentState::Idle && time < 10_000.0 {
        ai.update(100.0, time);
        time += 100.0;
    }

    let agent = ai.get_agent(1).unwrap();
    assert_eq!(agent.state(), AgentState::Idle);
    assert!(agent.position().distance(Vec3::new(2.5, 0.0, 12.5)) <= 0.25);

    let transitions: Vec<(AgentState, AgentState)> = ai
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            AiEvent::StateChanged { from, to, .. } => Some((from, to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (AgentState::Idle, AgentState::Chase),
            (AgentState::Chase, AgentState::Investigate),
            (AgentState::Investigate, AgentState::Idle),
        ]
    );
}

#[test]
fn test_unregister_releases_perceiver() {
    let mesh = shared(NavMesh::grid(10.0, 10.0, 5.0).unwrap());
    let perception = Arc::new(RwLock::new(PerceptionSystem::new()));
    let mut ai = AiManager::new(2, perception.clone(), Arc::new(Pathfinder::new(mesh)));

    let handle = ai.register_agent(7, Vec3::new(2.5, 0.0, 2.5), Vec3::Z).unwrap();
    assert_eq!(perception.read().perceiver_count(), 1);

    ai.unregister_agent(7).unwrap();
    assert_eq!(perception.read().perceiver_count(), 0);
    assert!(perception.read().perceived_objects(handle).is_err());
}
