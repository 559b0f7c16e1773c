//! AI manager: owns the agents and drives perception and agents each frame

use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;

use crate::agent::{AiAgent, AiEvent};
use crate::config::AiConfig;
use crate::error::{AiError, Result};
use crate::handle::Handle;
use crate::pathfinding::Pathfinder;
use crate::perception::{PerceptionSystem, Perceiver};

/// Events kept between drains; older ones are dropped first
pub const MAX_PENDING_EVENTS: usize = 4096;

/// Owns the agent collection; shares perception and pathfinding with the
/// rest of the engine
#[derive(Debug)]
pub struct AiManager {
    agents: Vec<AiAgent>,
    perception: Arc<RwLock<PerceptionSystem>>,
    pathfinder: Arc<Pathfinder>,
    config: AiConfig,
    events: Vec<AiEvent>,
    game_time_ms: f64,
}

impl AiManager {
    pub fn new(
        initial_capacity: usize,
        perception: Arc<RwLock<PerceptionSystem>>,
        pathfinder: Arc<Pathfinder>,
    ) -> Self {
        log::info!("AI manager created (capacity {})", initial_capacity);
        Self {
            agents: Vec::with_capacity(initial_capacity),
            perception,
            pathfinder,
            config: AiConfig::default(),
            events: Vec::new(),
            game_time_ms: 0.0,
        }
    }

    /// Use `config` for agents registered from now on and for perception tuning
    pub fn with_config(mut self, config: AiConfig) -> Self {
        self.perception.write().set_tuning(config.perception);
        self.config = config;
        self
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn perception(&self) -> &Arc<RwLock<PerceptionSystem>> {
        &self.perception
    }

    pub fn pathfinder(&self) -> &Arc<Pathfinder> {
        &self.pathfinder
    }

    /// Game time of the latest update
    pub fn game_time_ms(&self) -> f64 {
        self.game_time_ms
    }

    /// Register an agent with a perceiver built from the configured defaults
    pub fn register_agent(
        &mut self,
        entity_id: u64,
        position: Vec3,
        forward: Vec3,
    ) -> Result<Handle<Perceiver>> {
        if !position.is_finite() || !forward.is_finite() {
            return Err(AiError::InvalidArgument(format!(
                "agent {} has a non-finite pose",
                entity_id
            )));
        }
        if self.get_agent(entity_id).is_some() {
            log::warn!("Agent {} is already registered", entity_id);
            return Err(AiError::AgentAlreadyRegistered(entity_id));
        }

        let perceiver = Perceiver::from_defaults(entity_id, position, forward, &self.config.perceiver);
        let handle = self.perception.write().add_perceiver(perceiver)?;

        self.agents.push(AiAgent::new(
            entity_id,
            position,
            forward,
            handle,
            self.config.agent,
        ));
        log::info!(
            "Registered AI agent {} at {:?} ({} agents)",
            entity_id,
            position,
            self.agents.len()
        );
        Ok(handle)
    }

    /// Remove an agent and its perceiver
    pub fn unregister_agent(&mut self, entity_id: u64) -> Result<AiAgent> {
        let index = self
            .agents
            .iter()
            .position(|a| a.entity_id() == entity_id)
            .ok_or_else(|| {
                log::warn!("Cannot unregister unknown agent {}", entity_id);
                AiError::AgentNotFound(entity_id)
            })?;

        let agent = self.agents.remove(index);
        if let Err(err) = self.perception.write().remove_perceiver(agent.perceiver()) {
            log::warn!("Agent {} perceiver already gone: {}", entity_id, err);
        }
        log::info!(
            "Unregistered AI agent {} ({} agents)",
            entity_id,
            self.agents.len()
        );
        Ok(agent)
    }

    /// Run perception, then tick every active agent in registration order.
    ///
    /// Events accumulate until [`AiManager::drain_events`] is called; a host
    /// that never drains keeps only the newest [`MAX_PENDING_EVENTS`].
    pub fn update(&mut self, delta_ms: f32, game_time_ms: f64) {
        if !delta_ms.is_finite() || delta_ms < 0.0 || !game_time_ms.is_finite() {
            log::warn!(
                "Ignoring AI update with dt={} t={}",
                delta_ms,
                game_time_ms
            );
            return;
        }
        self.game_time_ms = game_time_ms;

        self.perception.write().update(delta_ms, game_time_ms);

        for agent in self.agents.iter_mut().filter(|a| a.is_active()) {
            agent.tick(
                delta_ms,
                game_time_ms,
                &self.perception,
                &self.pathfinder,
                &mut self.events,
            );
        }

        if self.events.len() > MAX_PENDING_EVENTS {
            let excess = self.events.len() - MAX_PENDING_EVENTS;
            self.events.drain(..excess);
            log::warn!(
                "AI event queue full: dropped {} undrained events",
                excess
            );
        }
    }

    pub fn get_agent(&self, entity_id: u64) -> Option<&AiAgent> {
        self.agents.iter().find(|a| a.entity_id() == entity_id)
    }

    pub fn get_agent_mut(&mut self, entity_id: u64) -> Option<&mut AiAgent> {
        self.agents.iter_mut().find(|a| a.entity_id() == entity_id)
    }

    /// Agents in registration order
    pub fn agents(&self) -> impl Iterator<Item = &AiAgent> {
        self.agents.iter()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Pause or resume an agent; inactive agents are skipped by `update`
    pub fn set_agent_active(&mut self, entity_id: u64, active: bool) -> Result<()> {
        self.agent_mut_or_err(entity_id)?.set_active(active);
        Ok(())
    }

    /// Give an agent a move order, or clear it with `None`
    pub fn set_target(&mut self, entity_id: u64, target: Option<Vec3>) -> Result<()> {
        if target.is_some_and(|t| !t.is_finite()) {
            return Err(AiError::InvalidArgument(format!(
                "non-finite target for agent {}",
                entity_id
            )));
        }
        self.agent_mut_or_err(entity_id)?.set_target(target);
        Ok(())
    }

    /// Take every event produced since the last call
    pub fn drain_events(&mut self) -> Vec<AiEvent> {
        std::mem::take(&mut self.events)
    }

    fn agent_mut_or_err(&mut self, entity_id: u64) -> Result<&mut AiAgent> {
        self.get_agent_mut(entity_id)
            .ok_or(AiError::AgentNotFound(entity_id))
    }
}
