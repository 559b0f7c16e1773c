//! Behavior Tree implementation
//!
//! Nodes are ticked against a [`BehaviorContext`]. A node's first tick of an
//! activation runs its `init`; once it returns something other than
//! [`BehaviorStatus::Running`] the activation ends and the next tick starts a
//! fresh one. Leaves are released through [`Leaf::destroy`] when the tree is
//! dropped.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::BehaviorError;

/// Status of a behavior node execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BehaviorStatus {
    /// Node succeeded
    Success,
    /// Node failed
    Failure,
    /// Node is still running
    Running,
}

/// World view handed to leaves on every tick
pub trait BehaviorContext {
    /// Frame delta (ms)
    fn delta_ms(&self) -> f32;

    /// Current game time (ms)
    fn game_time_ms(&self) -> f64 {
        0.0
    }

    /// Position of the agent running the tree
    fn agent_position(&self) -> Vec3;

    /// Move the agent running the tree
    fn set_agent_position(&mut self, position: Vec3);

    /// Current target, if the agent has one
    fn target_position(&self) -> Option<Vec3> {
        None
    }

    /// Fire an ability at the current target
    fn use_ability(&mut self, _ability_id: u32) {}
}

/// User-supplied leaf behavior
pub trait Leaf: Send {
    /// Start of a fresh activation
    fn init(&mut self) {}

    fn tick(&mut self, ctx: &mut dyn BehaviorContext) -> BehaviorStatus;

    /// Tree teardown
    fn destroy(&mut self) {}
}

/// Node type, for inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Sequence,
    Selector,
    Leaf,
}

enum NodeKind {
    Sequence {
        children: Vec<BehaviorNode>,
        cursor: usize,
    },
    Selector {
        children: Vec<BehaviorNode>,
        cursor: usize,
    },
    Leaf(Box<dyn Leaf>),
}

/// A node in a behavior tree; composites own their children
pub struct BehaviorNode {
    name: String,
    kind: NodeKind,
    state: BehaviorStatus,
    initialized: bool,
}

impl BehaviorNode {
    fn with_kind(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            state: BehaviorStatus::Failure,
            initialized: false,
        }
    }

    /// Create an empty sequence (ordered AND)
    pub fn sequence(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            NodeKind::Sequence {
                children: Vec::new(),
                cursor: 0,
            },
        )
    }

    /// Create an empty selector (ordered OR)
    pub fn selector(name: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            NodeKind::Selector {
                children: Vec::new(),
                cursor: 0,
            },
        )
    }

    /// Create a sequence over `children`
    pub fn sequence_of(name: impl Into<String>, children: Vec<BehaviorNode>) -> Self {
        Self::with_kind(name, NodeKind::Sequence { children, cursor: 0 })
    }

    /// Create a selector over `children`
    pub fn selector_of(name: impl Into<String>, children: Vec<BehaviorNode>) -> Self {
        Self::with_kind(name, NodeKind::Selector { children, cursor: 0 })
    }

    /// Create a leaf node
    pub fn leaf(name: impl Into<String>, leaf: impl Leaf + 'static) -> Self {
        Self::with_kind(name, NodeKind::Leaf(Box::new(leaf)))
    }

    /// Append a child to a composite
    pub fn add_child(&mut self, child: BehaviorNode) -> Result<(), BehaviorError> {
        match &mut self.kind {
            NodeKind::Sequence { children, .. } | NodeKind::Selector { children, .. } => {
                children.push(child);
                Ok(())
            }
            NodeKind::Leaf(_) => {
                log::error!(
                    "Cannot add child '{}' to leaf node '{}'",
                    child.name,
                    self.name
                );
                Err(BehaviorError::NotComposite(self.name.clone()))
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Status returned by the latest tick (`Failure` before the first tick)
    pub fn state(&self) -> BehaviorStatus {
        self.state
    }

    /// Whether an activation is in progress
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Sequence { .. } => NodeType::Sequence,
            NodeKind::Selector { .. } => NodeType::Selector,
            NodeKind::Leaf(_) => NodeType::Leaf,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.node_type() != NodeType::Leaf
    }

    /// Children of a composite; empty for leaves
    pub fn children(&self) -> &[BehaviorNode] {
        match &self.kind {
            NodeKind::Sequence { children, .. } | NodeKind::Selector { children, .. } => children,
            NodeKind::Leaf(_) => &[],
        }
    }

    /// Index of the child a composite resumes from
    pub fn cursor(&self) -> Option<usize> {
        match self.kind {
            NodeKind::Sequence { cursor, .. } | NodeKind::Selector { cursor, .. } => Some(cursor),
            NodeKind::Leaf(_) => None,
        }
    }

    /// Tick this node and, for composites, the children it reaches
    pub fn tick(&mut self, ctx: &mut dyn BehaviorContext) -> BehaviorStatus {
        if !self.initialized {
            match &mut self.kind {
                NodeKind::Leaf(leaf) => leaf.init(),
                NodeKind::Sequence { cursor, .. } | NodeKind::Selector { cursor, .. } => {
                    *cursor = 0
                }
            }
            self.initialized = true;
            self.state = BehaviorStatus::Running;
        }

        let status = match &mut self.kind {
            NodeKind::Sequence { children, cursor } => {
                tick_children(children, cursor, ctx, BehaviorStatus::Success)
            }
            NodeKind::Selector { children, cursor } => {
                tick_children(children, cursor, ctx, BehaviorStatus::Failure)
            }
            NodeKind::Leaf(leaf) => leaf.tick(ctx),
        };

        self.state = status;
        if status != BehaviorStatus::Running {
            self.initialized = false;
        }
        status
    }

    /// Return this subtree to its pre-activation state
    pub fn reset(&mut self) {
        self.state = BehaviorStatus::Failure;
        self.initialized = false;
        match &mut self.kind {
            NodeKind::Sequence { children, cursor } | NodeKind::Selector { children, cursor } => {
                *cursor = 0;
                for child in children {
                    child.reset();
                }
            }
            NodeKind::Leaf(_) => {}
        }
    }

    /// Tear down this subtree, running every leaf's `destroy`
    pub fn destroy(self) {
        drop(self);
    }
}

/// Shared loop for sequences and selectors. `advance_on` is the status that
/// moves on to the next child; any other final status ends the composite.
fn tick_children(
    children: &mut [BehaviorNode],
    cursor: &mut usize,
    ctx: &mut dyn BehaviorContext,
    advance_on: BehaviorStatus,
) -> BehaviorStatus {
    while let Some(child) = children.get_mut(*cursor) {
        if child.state != BehaviorStatus::Running {
            child.reset();
        }

        match child.tick(ctx) {
            BehaviorStatus::Running => return BehaviorStatus::Running,
            status if status == advance_on => *cursor += 1,
            status => {
                *cursor = 0;
                return status;
            }
        }
    }

    *cursor = 0;
    advance_on
}

impl Drop for BehaviorNode {
    fn drop(&mut self) {
        if let NodeKind::Leaf(leaf) = &mut self.kind {
            leaf.destroy();
        }
    }
}

impl fmt::Debug for BehaviorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorNode")
            .field("name", &self.name)
            .field("type", &self.node_type())
            .field("state", &self.state)
            .field("initialized", &self.initialized)
            .field("children", &self.children())
            .finish()
    }
}

/// Behavior tree
#[derive(Debug)]
pub struct BehaviorTree {
    /// Root node
    root: BehaviorNode,
    ticks: u64,
}

impl BehaviorTree {
    /// Create a new behavior tree
    pub fn new(root: BehaviorNode) -> Self {
        Self { root, ticks: 0 }
    }

    /// Tick the root
    pub fn tick(&mut self, ctx: &mut dyn BehaviorContext) -> BehaviorStatus {
        self.ticks += 1;
        self.root.tick(ctx)
    }

    /// Reset every node
    pub fn reset(&mut self) {
        self.root.reset();
    }

    /// Status of the latest tick
    pub fn status(&self) -> BehaviorStatus {
        self.root.state()
    }

    /// Number of ticks since creation
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn root(&self) -> &BehaviorNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut BehaviorNode {
        &mut self.root
    }
}
