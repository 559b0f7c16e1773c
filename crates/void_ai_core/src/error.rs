//! Error types for the AI core

use thiserror::Error;

use crate::handle::Handle;
use crate::navigation::PolygonId;
use crate::perception::{Perceivable, Perceiver};

/// Nav mesh construction and query errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NavMeshError {
    /// A polygon referenced a vertex that does not exist
    #[error("Vertex index {index} out of range (mesh has {count} vertices)")]
    VertexOutOfRange { index: usize, count: usize },

    /// Polygons need at least three vertices
    #[error("Polygon has too few vertices: {0}")]
    TooFewVertices(usize),

    /// Polygons are capped at `MAX_POLYGON_VERTICES`
    #[error("Polygon has too many vertices: {0}")]
    TooManyVertices(usize),

    /// The same vertex appears twice in one polygon
    #[error("Polygon repeats vertex {0}")]
    DuplicateVertex(usize),

    /// Geometry can no longer change once adjacency is built
    #[error("Nav mesh is sealed")]
    Sealed,

    /// The operation needs `build_adjacency` to have run
    #[error("Nav mesh adjacency has not been built")]
    AdjacencyNotBuilt,

    /// Polygon id is not part of this mesh
    #[error("Polygon {0:?} out of range")]
    PolygonOutOfRange(PolygonId),

    /// Non-finite coordinates
    #[error("Invalid point")]
    InvalidPoint,

    /// Traversal costs must be finite
    #[error("Invalid polygon cost: {0}")]
    InvalidCost(f32),

    /// Grid dimensions must be positive
    #[error("Invalid grid dimensions: {0}")]
    InvalidDimensions(String),
}

/// Result type for nav mesh operations
pub type NavResult<T> = std::result::Result<T, NavMeshError>;

/// Perception registry errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PerceptionError {
    /// Stale or unknown perceiver handle
    #[error("Perceiver not found: {0:?}")]
    PerceiverNotFound(Handle<Perceiver>),

    /// Stale or unknown perceivable handle
    #[error("Perceivable not found: {0:?}")]
    PerceivableNotFound(Handle<Perceivable>),

    /// Rejected template values
    #[error("Invalid perception argument: {0}")]
    InvalidArgument(String),
}

/// Result type for perception operations
pub type PerceptionResult<T> = std::result::Result<T, PerceptionError>;

/// Behavior tree construction errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BehaviorError {
    /// Children can only be attached to sequences and selectors
    #[error("Node '{0}' is not a composite")]
    NotComposite(String),
}

/// AI manager errors
#[derive(Debug, Error)]
pub enum AiError {
    /// No agent with this entity id
    #[error("Agent not found: {0}")]
    AgentNotFound(u64),

    /// Entity ids are unique per manager
    #[error("Agent already registered: {0}")]
    AgentAlreadyRegistered(u64),

    /// Rejected input values
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Perception registry failure
    #[error(transparent)]
    Perception(#[from] PerceptionError),

    /// Config could not be parsed
    #[error("Invalid AI configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for AI manager operations
pub type Result<T> = std::result::Result<T, AiError>;
