//! Stock behavior tree leaves

use glam::{Vec2, Vec3};

use crate::behavior::{BehaviorContext, BehaviorStatus, Leaf};
use crate::navigation::flat_distance;

/// Waits for a duration, counted down by the frame delta
#[derive(Debug, Clone)]
pub struct Wait {
    duration_ms: f32,
    remaining: Option<f32>,
}

impl Wait {
    pub fn new(duration_ms: f32) -> Self {
        Self {
            duration_ms,
            remaining: None,
        }
    }

    /// Time left in the current activation
    pub fn remaining_ms(&self) -> Option<f32> {
        self.remaining
    }
}

impl Leaf for Wait {
    fn init(&mut self) {
        self.remaining = Some(self.duration_ms);
    }

    fn tick(&mut self, ctx: &mut dyn BehaviorContext) -> BehaviorStatus {
        let remaining = self.remaining.get_or_insert(self.duration_ms);
        if *remaining <= 0.0 {
            self.remaining = None;
            return BehaviorStatus::Success;
        }
        *remaining -= ctx.delta_ms();
        BehaviorStatus::Running
    }

    fn destroy(&mut self) {
        self.remaining = None;
    }
}

/// Moves the agent toward a point on the ground plane
#[derive(Debug, Clone)]
pub struct MoveTo {
    /// Target as (x, z)
    pub target: Vec2,
    /// Units per tick
    pub speed: f32,
    pub tolerance: f32,
}

impl MoveTo {
    pub fn new(target: Vec2, speed: f32, tolerance: f32) -> Self {
        Self {
            target,
            speed,
            tolerance,
        }
    }
}

impl Leaf for MoveTo {
    fn tick(&mut self, ctx: &mut dyn BehaviorContext) -> BehaviorStatus {
        let position = ctx.agent_position();
        let target = Vec3::new(self.target.x, position.y, self.target.y);
        let distance = flat_distance(position, target);
        if distance <= self.tolerance {
            return BehaviorStatus::Success;
        }

        let step = self.speed.max(0.0).min(distance);
        let moved = position + (target - position) / distance * step;
        ctx.set_agent_position(moved);

        if flat_distance(moved, target) <= self.tolerance {
            BehaviorStatus::Success
        } else {
            BehaviorStatus::Running
        }
    }
}

/// Uses an ability on the current target when it is in range
#[derive(Debug, Clone)]
pub struct Attack {
    pub ability_id: u32,
    pub range: f32,
}

impl Attack {
    pub fn new(ability_id: u32, range: f32) -> Self {
        Self { ability_id, range }
    }
}

impl Leaf for Attack {
    fn tick(&mut self, ctx: &mut dyn BehaviorContext) -> BehaviorStatus {
        let Some(target) = ctx.target_position() else {
            return BehaviorStatus::Failure;
        };
        if ctx.agent_position().distance(target) > self.range {
            return BehaviorStatus::Failure;
        }
        ctx.use_ability(self.ability_id);
        BehaviorStatus::Success
    }
}

type Predicate = Box<dyn FnMut(&dyn BehaviorContext) -> bool + Send>;

/// Succeeds when the predicate holds, fails otherwise
pub struct Condition {
    predicate: Predicate,
}

impl Condition {
    pub fn new<F>(predicate: F) -> Self
    where
        F: FnMut(&dyn BehaviorContext) -> bool + Send + 'static,
    {
        Self {
            predicate: Box::new(predicate),
        }
    }

    /// Succeeds while the agent has a target
    pub fn has_target() -> Self {
        Self::new(|ctx| ctx.target_position().is_some())
    }

    /// Succeeds while the target is within `range`
    pub fn target_within(range: f32) -> Self {
        Self::new(move |ctx| {
            ctx.target_position()
                .is_some_and(|target| ctx.agent_position().distance(target) <= range)
        })
    }
}

impl Leaf for Condition {
    fn tick(&mut self, ctx: &mut dyn BehaviorContext) -> BehaviorStatus {
        if (self.predicate)(&*ctx) {
            BehaviorStatus::Success
        } else {
            BehaviorStatus::Failure
        }
    }
}

type TickFn = Box<dyn FnMut(&mut dyn BehaviorContext) -> BehaviorStatus + Send>;
type HookFn = Box<dyn FnMut() + Send>;

/// Leaf built from closures
pub struct FnLeaf {
    tick: TickFn,
    init: Option<HookFn>,
    destroy: Option<HookFn>,
}

impl FnLeaf {
    pub fn new<F>(tick: F) -> Self
    where
        F: FnMut(&mut dyn BehaviorContext) -> BehaviorStatus + Send + 'static,
    {
        Self {
            tick: Box::new(tick),
            init: None,
            destroy: None,
        }
    }

    /// Run `init` at the start of every activation
    pub fn with_init(mut self, init: impl FnMut() + Send + 'static) -> Self {
        self.init = Some(Box::new(init));
        self
    }

    /// Run `destroy` when the tree is torn down
    pub fn with_destroy(mut self, destroy: impl FnMut() + Send + 'static) -> Self {
        self.destroy = Some(Box::new(destroy));
        self
    }
}

impl Leaf for FnLeaf {
    fn init(&mut self) {
        if let Some(init) = &mut self.init {
            init();
        }
    }

    fn tick(&mut self, ctx: &mut dyn BehaviorContext) -> BehaviorStatus {
        (self.tick)(ctx)
    }

    fn destroy(&mut self) {
        if let Some(destroy) = &mut self.destroy {
            destroy();
        }
    }
}
