//! Void AI Sandbox
//!
//! Headless run of the AI layer:
//! - Builds a grid nav mesh with a blocked wall segment
//! - Spawns a guard with a combat behavior and a patrolling sentry
//! - Walks an intruder across the map and logs every AI event
//!
//! Run with: cargo run -p void_ai_sandbox -- [config.json] [frames]
//!
//! The config path may also come from `VOID_AI_CONFIG`.

use std::result::Result;
use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;
use void_ai_core::prelude::*;

const FRAME_MS: f32 = 50.0;
const DEFAULT_FRAMES: u32 = 400;

const GUARD: u64 = 1;
const SENTRY: u64 = 2;
const INTRUDER: u64 = 100;
const NOISE: u64 = 200;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let config = load_config(args.next().or_else(|| std::env::var("VOID_AI_CONFIG").ok()))?;
    let frames = match args.next() {
        Some(frames) => frames.parse()?,
        None => DEFAULT_FRAMES,
    };

    let mesh = build_arena()?;
    log::info!(
        "Arena ready: {} polygons, {} vertices",
        mesh.polygon_count(),
        mesh.vertex_count()
    );

    let perception = Arc::new(RwLock::new(PerceptionSystem::new()));
    let pathfinder = Arc::new(Pathfinder::new(Arc::new(RwLock::new(mesh))));
    let mut ai = AiManager::new(8, perception.clone(), pathfinder).with_config(config);

    ai.register_agent(GUARD, Vec3::new(2.5, 0.0, 2.5), Vec3::Z)?;
    if let Some(guard) = ai.get_agent_mut(GUARD) {
        guard.set_behavior(Some(combat_behavior()));
    }
    ai.register_agent(SENTRY, Vec3::new(47.5, 0.0, 47.5), Vec3::NEG_Z)?;
    ai.set_target(SENTRY, Some(Vec3::new(47.5, 0.0, 27.5)))?;

    let intruder = perception
        .write()
        .add_perceivable(Perceivable::new(INTRUDER, Vec3::new(2.5, 0.0, 30.0)))?;
    let noise = perception.write().add_perceivable(
        Perceivable::new(NOISE, Vec3::new(40.0, 0.0, 20.0))
            .with_auditory_strength(1.0)
            .with_visible(false)
            .with_active(false),
    )?;

    let mut time_ms = 0.0f64;
    for frame in 0..frames {
        script_world(&perception, intruder, noise, frame)?;

        ai.update(FRAME_MS, time_ms);
        time_ms += f64::from(FRAME_MS);

        for event in ai.drain_events() {
            report(frame, &event);
        }
    }

    for agent in ai.agents() {
        log::info!(
            "Agent {} finished in state {} at {:?}",
            agent.entity_id(),
            agent.state(),
            agent.position()
        );
    }
    Ok(())
}

fn load_config(path: Option<String>) -> Result<AiConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(AiConfig::default());
    };
    log::info!("Loading AI config from {}", path);
    let json = std::fs::read_to_string(&path)?;
    Ok(AiConfig::from_json_str(&json)?)
}

/// 50x50 grid with the middle of row 4 blocked off
fn build_arena() -> Result<NavMesh, NavMeshError> {
    let mut mesh = NavMesh::grid(50.0, 50.0, 5.0)?;
    for column in 3..7 {
        mesh.set_walkable(PolygonId(4 * 10 + column), false)?;
    }
    Ok(mesh)
}

/// Wind up for half a second, then strike
fn combat_behavior() -> BehaviorTree {
    BehaviorTree::new(BehaviorNode::sequence_of(
        "strike",
        vec![
            BehaviorNode::leaf("in_range", Condition::target_within(2.0)),
            BehaviorNode::leaf("wind_up", Wait::new(500.0)),
            BehaviorNode::leaf("swing", Attack::new(1, 2.0)),
        ],
    ))
}

/// Move the intruder toward the guard and pop a noise for the sentry
fn script_world(
    perception: &RwLock<PerceptionSystem>,
    intruder: Handle<Perceivable>,
    noise: Handle<Perceivable>,
    frame: u32,
) -> Result<(), PerceptionError> {
    let mut perception = perception.write();

    let z = (30.0 - frame as f32 * 0.1).max(8.0);
    perception.set_perceivable_position(intruder, Vec3::new(2.5, 0.0, z))?;

    if let Some(noise) = perception.perceivable_mut(noise) {
        noise.active = (100..140).contains(&frame);
    }
    Ok(())
}

fn report(frame: u32, event: &AiEvent) {
    match event {
        AiEvent::StateChanged { entity_id, from, to } => {
            log::info!("[frame {}] agent {}: {} -> {}", frame, entity_id, from, to);
        }
        AiEvent::PathFailed {
            entity_id,
            status,
            destination,
        } => {
            log::warn!(
                "[frame {}] agent {}: no path to {:?} ({:?})",
                frame,
                entity_id,
                destination,
                status
            );
        }
        AiEvent::AbilityUsed {
            entity_id,
            ability_id,
            target,
        } => {
            log::info!(
                "[frame {}] agent {} used ability {} on {:?}",
                frame,
                entity_id,
                ability_id,
                target
            );
        }
    }
}
