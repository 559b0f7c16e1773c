//! Void AI Core - Navigation, Perception and Behavior for Engine Agents
//!
//! This crate provides the AI layer the runtime ticks once per frame.
//!
//! # Features
//!
//! - Polygon nav mesh with adjacency, point location and A* corridor search
//! - Funnel-smoothed steering paths
//! - Perception: view cone, hearing falloff, proximity, last-known positions
//! - Behavior trees with sequence, selector and user-defined leaves
//! - Agents that chase, investigate and attack based on what they perceive
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!                 │  AiManager   │
//!                 └──────┬───────┘
//!          ┌─────────────┼──────────────┐
//!          ▼             ▼              ▼
//!   ┌─────────────┐ ┌─────────┐ ┌──────────────┐
//!   │ Perception  │ │ AiAgent │ │  Pathfinder  │
//!   │   System    │ │  + BT   │ │  (A*+funnel) │
//!   └─────────────┘ └─────────┘ └──────┬───────┘
//!                                      ▼
//!                                ┌──────────┐
//!                                │ NavMesh  │
//!                                └──────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use parking_lot::RwLock;
//! use void_ai_core::prelude::*;
//!
//! let mesh = Arc::new(RwLock::new(NavMesh::grid(50.0, 50.0, 5.0)?));
//! let perception = Arc::new(RwLock::new(PerceptionSystem::new()));
//! let pathfinder = Arc::new(Pathfinder::new(mesh));
//!
//! let mut ai = AiManager::new(16, perception.clone(), pathfinder);
//! ai.register_agent(1, Vec3::new(2.5, 0.0, 2.5), Vec3::Z)?;
//! perception.write().add_perceivable(Perceivable::new(100, Vec3::new(2.5, 0.0, 20.0)))?;
//!
//! ai.update(16.0, 16.0);
//! for event in ai.drain_events() {
//!     println!("{:?}", event);
//! }
//! ```

pub mod agent;
pub mod behavior;
pub mod config;
pub mod error;
pub mod handle;
pub mod leaves;
pub mod manager;
pub mod navigation;
pub mod path;
pub mod pathfinding;
pub mod perception;

pub mod prelude {
    //! Common imports for AI functionality
    pub use crate::agent::{AgentState, AiAgent, AiEvent};
    pub use crate::behavior::{BehaviorContext, BehaviorNode, BehaviorStatus, BehaviorTree, Leaf};
    pub use crate::config::{AgentTuning, AiConfig, PerceiverDefaults, PerceptionTuning};
    pub use crate::error::{AiError, BehaviorError, NavMeshError, PerceptionError, Result};
    pub use crate::handle::{Handle, HandleMap};
    pub use crate::leaves::{Attack, Condition, FnLeaf, MoveTo, Wait};
    pub use crate::manager::AiManager;
    pub use crate::navigation::{NavMesh, NavPolygon, PolygonId};
    pub use crate::path::{Path, PathStatus};
    pub use crate::pathfinding::Pathfinder;
    pub use crate::perception::{
        LineOfSight, Modality, NoObstruction, Perceivable, PerceivedObject, PerceptionSystem,
        Perceiver,
    };
    pub use glam::{Vec2, Vec3};
}

pub use prelude::*;
