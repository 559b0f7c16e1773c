//! AI agents: perception-driven state, path following and combat behavior

use std::fmt;

use glam::Vec3;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::behavior::{BehaviorContext, BehaviorTree};
use crate::config::AgentTuning;
use crate::handle::Handle;
use crate::navigation::flat_distance;
use crate::path::{Path, PathStatus};
use crate::pathfinding::Pathfinder;
use crate::perception::{Modality, PerceivedObject, PerceptionSystem, Perceiver};

/// High-level agent state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AgentState {
    /// No contact, standing still
    #[default]
    Idle,
    /// Heading for a sound, a last-known position or a move order
    Investigate,
    /// Pursuing a hostile contact
    Chase,
    /// Hostile contact within attack range
    Attack,
}

impl AgentState {
    /// States in which the agent follows a path
    pub fn is_moving(self) -> bool {
        matches!(self, Self::Investigate | Self::Chase)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Investigate => "investigate",
            Self::Chase => "chase",
            Self::Attack => "attack",
        };
        f.write_str(name)
    }
}

/// Things that happened to agents during an update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AiEvent {
    StateChanged {
        entity_id: u64,
        from: AgentState,
        to: AgentState,
    },
    PathFailed {
        entity_id: u64,
        status: PathStatus,
        destination: Vec3,
    },
    AbilityUsed {
        entity_id: u64,
        ability_id: u32,
        target: Option<u64>,
    },
}

/// Per-entity AI record
#[derive(Debug)]
pub struct AiAgent {
    entity_id: u64,
    position: Vec3,
    forward: Vec3,
    state: AgentState,
    path: Path,
    perceiver: Handle<Perceiver>,
    tuning: AgentTuning,
    active: bool,
    /// Entity being chased or attacked
    target_entity: Option<u64>,
    /// Where the agent is currently heading
    goal: Option<Vec3>,
    /// External move order, followed when nothing else demands attention
    move_order: Option<Vec3>,
    /// Memory entry already searched, as (entity, time perceived)
    investigated: Option<(u64, f64)>,
    perceived: Vec<PerceivedObject>,
    behavior: Option<BehaviorTree>,
}

/// What the agent sensed this tick
#[derive(Debug, Default)]
struct Senses {
    hostile: Option<PerceivedObject>,
    auditory: Option<PerceivedObject>,
    lost: Option<(u64, f64, Vec3)>,
}

impl AiAgent {
    pub fn new(
        entity_id: u64,
        position: Vec3,
        forward: Vec3,
        perceiver: Handle<Perceiver>,
        tuning: AgentTuning,
    ) -> Self {
        Self {
            entity_id,
            position,
            forward: forward.try_normalize().unwrap_or(Vec3::Z),
            state: AgentState::Idle,
            path: Path::new(entity_id, position, position),
            perceiver,
            tuning,
            active: true,
            target_entity: None,
            goal: None,
            move_order: None,
            investigated: None,
            perceived: Vec::new(),
            behavior: None,
        }
    }

    /// Attach a combat behavior, ticked while attacking
    pub fn with_behavior(mut self, behavior: BehaviorTree) -> Self {
        self.behavior = Some(behavior);
        self
    }

    pub fn set_behavior(&mut self, behavior: Option<BehaviorTree>) {
        self.behavior = behavior;
    }

    pub fn behavior(&self) -> Option<&BehaviorTree> {
        self.behavior.as_ref()
    }

    pub fn entity_id(&self) -> u64 {
        self.entity_id
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Teleport the agent; the current path is dropped
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.path = Path::new(self.entity_id, position, position);
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn perceiver(&self) -> Handle<Perceiver> {
        self.perceiver
    }

    pub fn tuning(&self) -> &AgentTuning {
        &self.tuning
    }

    pub fn set_tuning(&mut self, tuning: AgentTuning) {
        self.tuning = tuning;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Entity currently chased or attacked
    pub fn target_entity(&self) -> Option<u64> {
        self.target_entity
    }

    /// Point the agent is heading for
    pub fn goal(&self) -> Option<Vec3> {
        self.goal
    }

    /// Contacts read back on the latest tick
    pub fn perceived(&self) -> &[PerceivedObject] {
        &self.perceived
    }

    /// Order the agent to a point, or clear the order with `None`
    pub fn set_target(&mut self, target: Option<Vec3>) {
        self.move_order = target;
    }

    pub fn move_order(&self) -> Option<Vec3> {
        self.move_order
    }

    /// Advance the agent by one frame
    pub fn tick(
        &mut self,
        delta_ms: f32,
        game_time_ms: f64,
        perception: &RwLock<PerceptionSystem>,
        pathfinder: &Pathfinder,
        events: &mut Vec<AiEvent>,
    ) {
        let senses = self.sense(perception);
        let (mut next, goal) = self.decide(&senses);

        if next.is_moving() {
            if let Some(goal) = goal {
                if !self.follow_goal(goal, pathfinder, events) {
                    next = AgentState::Idle;
                }
            }
        }

        self.goal = if next == AgentState::Idle { None } else { goal };
        self.transition(next, events);

        if self.state.is_moving() {
            self.advance(delta_ms);
        }

        if self.state == AgentState::Attack {
            if let Some(goal) = self.goal {
                self.face(goal - self.position);
            }
            self.run_behavior(delta_ms, game_time_ms, events);
        }
    }

    /// Push our pose into the perceiver and read back what it perceived
    fn sense(&mut self, perception: &RwLock<PerceptionSystem>) -> Senses {
        if let Err(err) =
            perception
                .write()
                .set_perceiver_pose(self.perceiver, self.position, self.forward)
        {
            log::warn!("AI {}: cannot update perceiver: {}", self.entity_id, err);
        }

        let perception = perception.read();
        let Some(perceiver) = perception.perceiver(self.perceiver) else {
            self.perceived.clear();
            return Senses::default();
        };

        self.perceived.clear();
        self.perceived.extend_from_slice(perceiver.perceived_objects());

        let strongest = |hostile: bool| {
            self.perceived
                .iter()
                .filter(|p| p.hostile == hostile)
                .filter(|p| hostile || p.modality == Modality::Auditory)
                .max_by(|a, b| {
                    a.strength
                        .total_cmp(&b.strength)
                        .then(b.distance.total_cmp(&a.distance))
                })
                .cloned()
        };

        Senses {
            hostile: strongest(true),
            auditory: strongest(false),
            lost: perceiver
                .most_recent_lost_contact()
                .filter(|m| m.hostile)
                .map(|m| (m.entity_id, m.last_perceived_ms, m.last_known_position)),
        }
    }

    /// Pick the next state and the point to head for
    fn decide(&mut self, senses: &Senses) -> (AgentState, Option<Vec3>) {
        if let Some(contact) = &senses.hostile {
            self.target_entity = Some(contact.entity_id);
            let state = if self.position.distance(contact.position) <= self.tuning.attack_range {
                AgentState::Attack
            } else {
                AgentState::Chase
            };
            return (state, Some(contact.position));
        }
        self.target_entity = None;

        if let Some(contact) = &senses.auditory {
            return (AgentState::Investigate, Some(contact.position));
        }

        if let Some((entity_id, perceived_ms, last_known)) = senses.lost {
            let key = (entity_id, perceived_ms);
            if self.investigated != Some(key) {
                if !self.arrived_at(last_known) {
                    return (AgentState::Investigate, Some(last_known));
                }
                log::debug!(
                    "AI {} lost entity {} at its last-known position",
                    self.entity_id,
                    entity_id
                );
                self.investigated = Some(key);
            }
        }

        if let Some(order) = self.move_order {
            if !self.arrived_at(order) {
                return (AgentState::Investigate, Some(order));
            }
            self.move_order = None;
        }

        (AgentState::Idle, None)
    }

    /// Make sure the path leads to `goal`. Returns false when no path exists.
    fn follow_goal(
        &mut self,
        goal: Vec3,
        pathfinder: &Pathfinder,
        events: &mut Vec<AiEvent>,
    ) -> bool {
        let diverged = flat_distance(self.path.end(), goal) > self.tuning.repath_threshold;

        let repath = match self.path.status() {
            PathStatus::None | PathStatus::Computing => true,
            PathStatus::Success => diverged,
            PathStatus::Completed => !self.arrived_at(goal),
            // Already failed for this goal; wait for the goal to move
            PathStatus::FailureNoPath | PathStatus::FailureInvalidArgs if !diverged => return false,
            PathStatus::FailureNoPath | PathStatus::FailureInvalidArgs => true,
        };
        if !repath {
            return true;
        }

        log::debug!(
            "AI {} requesting path from {:?} to {:?}",
            self.entity_id,
            self.position,
            goal
        );
        self.path = pathfinder.find_path(self.position, goal, self.entity_id);

        if self.path.status().is_failure() {
            events.push(AiEvent::PathFailed {
                entity_id: self.entity_id,
                status: self.path.status(),
                destination: goal,
            });
            return false;
        }
        true
    }

    fn transition(&mut self, next: AgentState, events: &mut Vec<AiEvent>) {
        if next == self.state {
            return;
        }

        log::debug!(
            "AI {} transitioning from {} to {}",
            self.entity_id,
            self.state,
            next
        );
        events.push(AiEvent::StateChanged {
            entity_id: self.entity_id,
            from: self.state,
            to: next,
        });

        if self.state == AgentState::Attack {
            if let Some(behavior) = &mut self.behavior {
                behavior.reset();
            }
        }
        self.state = next;
    }

    /// Step toward the current steering point without overshooting it
    fn advance(&mut self, delta_ms: f32) {
        let Some(point) = self.path.next_point(self.position, self.tuning.arrival_tolerance) else {
            return;
        };

        let offset = point - self.position;
        let distance = offset.length();
        if distance <= f32::EPSILON {
            return;
        }

        let step = (self.tuning.move_speed * delta_ms / 1000.0).max(0.0);
        if step >= distance {
            self.position = point;
        } else {
            self.position += offset / distance * step;
        }
        self.face(offset);
    }

    fn face(&mut self, direction: Vec3) {
        let flat = Vec3::new(direction.x, 0.0, direction.z);
        if let Some(forward) = flat.try_normalize() {
            self.forward = forward;
        }
    }

    fn arrived_at(&self, point: Vec3) -> bool {
        flat_distance(self.position, point) <= self.tuning.arrival_tolerance
    }

    fn run_behavior(&mut self, delta_ms: f32, game_time_ms: f64, events: &mut Vec<AiEvent>) {
        let Some(behavior) = &mut self.behavior else {
            return;
        };

        let mut view = AgentView {
            entity_id: self.entity_id,
            delta_ms,
            game_time_ms,
            position: &mut self.position,
            target: self.goal,
            target_entity: self.target_entity,
            events,
        };
        behavior.tick(&mut view);
    }
}

/// Behavior context over one agent
struct AgentView<'a> {
    entity_id: u64,
    delta_ms: f32,
    game_time_ms: f64,
    position: &'a mut Vec3,
    target: Option<Vec3>,
    target_entity: Option<u64>,
    events: &'a mut Vec<AiEvent>,
}

impl BehaviorContext for AgentView<'_> {
    fn delta_ms(&self) -> f32 {
        self.delta_ms
    }

    fn game_time_ms(&self) -> f64 {
        self.game_time_ms
    }

    fn agent_position(&self) -> Vec3 {
        *self.position
    }

    fn set_agent_position(&mut self, position: Vec3) {
        *self.position = position;
    }

    fn target_position(&self) -> Option<Vec3> {
        self.target
    }

    fn use_ability(&mut self, ability_id: u32) {
        log::debug!("AI {} uses ability {}", self.entity_id, ability_id);
        self.events.push(AiEvent::AbilityUsed {
            entity_id: self.entity_id,
            ability_id,
            target: self.target_entity,
        });
    }
}
