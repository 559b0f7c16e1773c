//! AI configuration

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level AI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Sensor template for newly registered agents
    pub perceiver: PerceiverDefaults,

    /// Perception pass tuning
    pub perception: PerceptionTuning,

    /// Agent movement and combat tuning
    pub agent: AgentTuning,
}

impl AiConfig {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Set the perceiver template
    pub fn with_perceiver(mut self, perceiver: PerceiverDefaults) -> Self {
        self.perceiver = perceiver;
        self
    }

    /// Set perception tuning
    pub fn with_perception(mut self, perception: PerceptionTuning) -> Self {
        self.perception = perception;
        self
    }

    /// Set agent tuning
    pub fn with_agent(mut self, agent: AgentTuning) -> Self {
        self.agent = agent;
        self
    }
}

/// Sensor values given to every perceiver the manager creates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceiverDefaults {
    /// Full horizontal field of view (radians)
    pub fov: f32,

    /// Maximum view distance
    pub view_distance: f32,

    /// Maximum hearing distance
    pub hearing_distance: f32,

    /// Minimum time between evaluations (ms)
    pub period_ms: f64,
}

impl Default for PerceiverDefaults {
    fn default() -> Self {
        Self {
            fov: std::f32::consts::FRAC_PI_2,
            view_distance: 20.0,
            hearing_distance: 15.0,
            period_ms: 200.0,
        }
    }
}

impl PerceiverDefaults {
    /// Set the field of view in degrees
    pub fn with_fov_degrees(mut self, degrees: f32) -> Self {
        self.fov = degrees.to_radians();
        self
    }

    /// Set view distance
    pub fn with_view_distance(mut self, distance: f32) -> Self {
        self.view_distance = distance;
        self
    }

    /// Set hearing distance
    pub fn with_hearing_distance(mut self, distance: f32) -> Self {
        self.hearing_distance = distance;
        self
    }

    /// Set evaluation period
    pub fn with_period_ms(mut self, period_ms: f64) -> Self {
        self.period_ms = period_ms;
        self
    }
}

/// Thresholds used by the perception pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionTuning {
    /// Anything closer than this is sensed regardless of facing
    pub proximity_radius: f32,

    /// Auditory strength must exceed this to register
    pub auditory_threshold: f32,

    /// How long a lost target's last-known position is remembered (ms)
    pub memory_duration_ms: f64,
}

impl Default for PerceptionTuning {
    fn default() -> Self {
        Self {
            proximity_radius: 1.5,
            auditory_threshold: 0.1,
            memory_duration_ms: 10_000.0,
        }
    }
}

/// Per-agent movement and combat values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentTuning {
    /// Movement speed (units per second)
    pub move_speed: f32,

    /// Distance at which a steering point counts as reached
    pub arrival_tolerance: f32,

    /// Repath once the path end drifts this far from the target
    pub repath_threshold: f32,

    /// Distance at which a chasing agent switches to attacking
    pub attack_range: f32,
}

impl Default for AgentTuning {
    fn default() -> Self {
        Self {
            move_speed: 3.5,
            arrival_tolerance: 0.25,
            repath_threshold: 1.0,
            attack_range: 2.0,
        }
    }
}

impl AgentTuning {
    /// Set movement speed
    pub fn with_move_speed(mut self, speed: f32) -> Self {
        self.move_speed = speed;
        self
    }

    /// Set attack range
    pub fn with_attack_range(mut self, range: f32) -> Self {
        self.attack_range = range;
        self
    }
}
