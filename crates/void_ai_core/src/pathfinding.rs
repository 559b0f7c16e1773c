//! Pathfinder: A* corridor search plus funnel string-pulling

use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;

use crate::navigation::{NavMesh, PolygonId};
use crate::path::{Path, PathStatus};

/// Squared XZ distance under which two funnel points are the same point
const SAME_POINT_EPSILON_SQ: f32 = 1e-6;

/// Finds steering paths over a shared nav mesh
#[derive(Debug, Clone, Default)]
pub struct Pathfinder {
    mesh: Option<Arc<RwLock<NavMesh>>>,
}

impl Pathfinder {
    /// Create a pathfinder over `mesh`
    pub fn new(mesh: Arc<RwLock<NavMesh>>) -> Self {
        Self { mesh: Some(mesh) }
    }

    /// Point the pathfinder at a different mesh
    pub fn configure_with(&mut self, mesh: Arc<RwLock<NavMesh>>) {
        self.mesh = Some(mesh);
    }

    pub fn mesh(&self) -> Option<&Arc<RwLock<NavMesh>>> {
        self.mesh.as_ref()
    }

    /// Compute a path from `start` to `end` for `agent_id`.
    ///
    /// On success the steering points begin at `start` and end at `end`. On
    /// failure the status carries the reason and the point list is empty.
    pub fn find_path(&self, start: Vec3, end: Vec3, agent_id: u64) -> Path {
        if !start.is_finite() || !end.is_finite() {
            log::warn!("Agent {}: path request with non-finite endpoints", agent_id);
            return Path::failed(agent_id, start, end, PathStatus::FailureInvalidArgs);
        }

        let Some(mesh) = &self.mesh else {
            log::warn!("Agent {}: pathfinder has no nav mesh", agent_id);
            return Path::failed(agent_id, start, end, PathStatus::FailureInvalidArgs);
        };

        let mut mesh = mesh.write();
        if !mesh.is_sealed() {
            log::warn!("Agent {}: nav mesh adjacency not built", agent_id);
            return Path::failed(agent_id, start, end, PathStatus::FailureInvalidArgs);
        }

        let Some(start_polygon) = mesh.find_polygon_for_point(start) else {
            log::warn!("Agent {}: start {:?} is off the nav mesh", agent_id, start);
            return Path::failed(agent_id, start, end, PathStatus::FailureNoPath);
        };
        let Some(end_polygon) = mesh.find_polygon_for_point(end) else {
            log::warn!("Agent {}: end {:?} is off the nav mesh", agent_id, end);
            return Path::failed(agent_id, start, end, PathStatus::FailureNoPath);
        };

        let corridor = match mesh.find_polygon_path(start_polygon, end_polygon) {
            Ok(Some(corridor)) => corridor,
            Ok(None) => {
                log::warn!(
                    "Agent {}: no path from {:?} to {:?}",
                    agent_id,
                    start_polygon,
                    end_polygon
                );
                return Path::failed(agent_id, start, end, PathStatus::FailureNoPath);
            }
            Err(err) => {
                log::error!("Agent {}: polygon search failed: {}", agent_id, err);
                return Path::failed(agent_id, start, end, PathStatus::FailureInvalidArgs);
            }
        };

        let points = string_pull(&mesh, &corridor, start, end);
        log::trace!(
            "Agent {}: path over {} polygons, {} steering points",
            agent_id,
            corridor.len(),
            points.len()
        );
        Path::succeeded(agent_id, start, end, points, corridor)
    }
}

/// Portal endpoints as seen when walking the corridor
#[derive(Debug, Clone, Copy)]
struct Portal {
    left: Vec3,
    right: Vec3,
}

/// 2D cross product on the XZ plane. Positive when `b` is left of `a`.
#[inline]
fn cross_xz(a: Vec3, b: Vec3) -> f32 {
    a.x * b.z - a.z * b.x
}

#[inline]
fn same_point(a: Vec3, b: Vec3) -> bool {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    dx * dx + dz * dz < SAME_POINT_EPSILON_SQ
}

fn corridor_portals(mesh: &NavMesh, corridor: &[PolygonId], start: Vec3, end: Vec3) -> Vec<Portal> {
    let mut portals = Vec::with_capacity(corridor.len() + 1);
    portals.push(Portal {
        left: start,
        right: start,
    });

    for pair in corridor.windows(2) {
        let (Some(from), Some(to)) = (mesh.polygon(pair[0]), mesh.polygon(pair[1])) else {
            continue;
        };
        let Some((a, b)) = mesh.portal(pair[0], pair[1]) else {
            log::error!("Corridor step {:?} -> {:?} has no shared edge", pair[0], pair[1]);
            continue;
        };

        let travel = to.centroid - from.centroid;
        if cross_xz(travel, b - a) > 0.0 {
            portals.push(Portal { left: b, right: a });
        } else {
            portals.push(Portal { left: a, right: b });
        }
    }

    portals.push(Portal {
        left: end,
        right: end,
    });
    portals
}

/// Funnel algorithm over a polygon corridor.
///
/// The output always starts with `start` and ends with `end`; corners are
/// emitted whenever one side of the funnel crosses the other. A side that
/// lines up exactly with the other stays inside the funnel, so no collinear
/// corners are produced.
pub fn string_pull(mesh: &NavMesh, corridor: &[PolygonId], start: Vec3, end: Vec3) -> Vec<Vec3> {
    let portals = corridor_portals(mesh, corridor, start, end);
    let mut points = vec![start];

    let mut apex = start;
    let mut left = start;
    let mut right = start;
    let mut left_index = 0;
    let mut right_index = 0;

    let mut i = 1;
    while i < portals.len() {
        let portal = portals[i];

        if cross_xz(right - apex, portal.right - apex) >= 0.0 {
            if same_point(apex, right) || cross_xz(left - apex, portal.right - apex) <= 0.0 {
                right = portal.right;
                right_index = i;
            } else {
                // Right crossed over left: left becomes a corner
                apex = left;
                let apex_index = left_index;
                push_corner(&mut points, apex);
                left = apex;
                right = apex;
                left_index = apex_index;
                right_index = apex_index;
                i = apex_index + 1;
                continue;
            }
        }

        if cross_xz(left - apex, portal.left - apex) <= 0.0 {
            if same_point(apex, left) || cross_xz(right - apex, portal.left - apex) >= 0.0 {
                left = portal.left;
                left_index = i;
            } else {
                apex = right;
                let apex_index = right_index;
                push_corner(&mut points, apex);
                left = apex;
                right = apex;
                left_index = apex_index;
                right_index = apex_index;
                i = apex_index + 1;
                continue;
            }
        }

        i += 1;
    }

    if points.len() > 1 && points.last().is_some_and(|last| same_point(*last, end)) {
        points.pop();
    }
    points.push(end);
    points
}

fn push_corner(points: &mut Vec<Vec3>, corner: Vec3) {
    if points.last().is_some_and(|last| same_point(*last, corner)) {
        return;
    }
    points.push(corner);
}
