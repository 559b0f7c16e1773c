//! Steering-point paths produced by the pathfinder

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::navigation::{flat_distance, PolygonId};

/// Lifecycle of a path request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PathStatus {
    /// No request made yet
    #[default]
    None,
    /// Reserved for asynchronous searches; never produced by the synchronous pathfinder
    Computing,
    /// Steering points are available
    Success,
    /// Endpoints off the mesh or no connecting corridor
    FailureNoPath,
    /// Bad input or unconfigured pathfinder
    FailureInvalidArgs,
    /// Every steering point has been consumed
    Completed,
}

impl PathStatus {
    /// Whether this status is one of the failure variants
    pub fn is_failure(self) -> bool {
        matches!(self, Self::FailureNoPath | Self::FailureInvalidArgs)
    }
}

/// A cursor over a sequence of steering points
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Path {
    agent_id: u64,
    start: Vec3,
    end: Vec3,
    status: PathStatus,
    points: Vec<Vec3>,
    corridor: Vec<PolygonId>,
    cursor: usize,
}

impl Path {
    /// Empty path with no request attached
    pub fn new(agent_id: u64, start: Vec3, end: Vec3) -> Self {
        Self {
            agent_id,
            start,
            end,
            ..Default::default()
        }
    }

    /// Path that failed with the given status
    pub fn failed(agent_id: u64, start: Vec3, end: Vec3, status: PathStatus) -> Self {
        debug_assert!(status.is_failure());
        Self {
            status,
            ..Self::new(agent_id, start, end)
        }
    }

    /// Successful path over the given steering points and polygon corridor
    pub fn succeeded(
        agent_id: u64,
        start: Vec3,
        end: Vec3,
        points: Vec<Vec3>,
        corridor: Vec<PolygonId>,
    ) -> Self {
        Self {
            status: PathStatus::Success,
            points,
            corridor,
            ..Self::new(agent_id, start, end)
        }
    }

    pub fn agent_id(&self) -> u64 {
        self.agent_id
    }

    pub fn status(&self) -> PathStatus {
        self.status
    }

    /// Requested start point
    pub fn start(&self) -> Vec3 {
        self.start
    }

    /// Requested end point
    pub fn end(&self) -> Vec3 {
        self.end
    }

    /// Steering points, including start and end
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Polygon corridor found by A*
    pub fn polygons(&self) -> &[PolygonId] {
        &self.corridor
    }

    /// Index of the current steering point
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_completed(&self) -> bool {
        self.status == PathStatus::Completed
    }

    /// Current steering point without advancing
    pub fn current_point(&self) -> Option<Vec3> {
        if self.status != PathStatus::Success {
            return None;
        }
        self.points.get(self.cursor).copied()
    }

    /// Final steering point
    pub fn destination(&self) -> Option<Vec3> {
        self.points.last().copied()
    }

    /// Current steering point for an agent at `agent_pos`.
    ///
    /// When the agent is within `tolerance` of the current point on the XZ
    /// plane the cursor advances by one first. Returns `None` once the cursor
    /// passes the last point, at which point the path becomes `Completed`.
    pub fn next_point(&mut self, agent_pos: Vec3, tolerance: f32) -> Option<Vec3> {
        if self.status != PathStatus::Success {
            return None;
        }

        let Some(&current) = self.points.get(self.cursor) else {
            self.status = PathStatus::Completed;
            return None;
        };

        if flat_distance(agent_pos, current) > tolerance {
            return Some(current);
        }

        self.cursor += 1;
        match self.points.get(self.cursor) {
            Some(&next) => Some(next),
            None => {
                self.status = PathStatus::Completed;
                None
            }
        }
    }

    /// Remaining length from the current steering point to the end
    pub fn remaining_distance(&self) -> f32 {
        if self.cursor >= self.points.len() {
            return 0.0;
        }
        polyline_length(&self.points[self.cursor..])
    }

    /// Total polyline length
    pub fn total_length(&self) -> f32 {
        polyline_length(&self.points)
    }
}

fn polyline_length(points: &[Vec3]) -> f32 {
    points.windows(2).map(|pair| pair[0].distance(pair[1])).sum()
}
