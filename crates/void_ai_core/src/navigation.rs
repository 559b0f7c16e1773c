//! Navigation mesh: shared vertex pool, convex polygons and their adjacency
//!
//! Polygons live in one arena and refer to each other by [`PolygonId`], so the
//! cyclic adjacency graph needs no shared ownership. The A* scratch table is a
//! parallel vector indexed by polygon id and reused across searches.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{NavMeshError, NavResult};

/// Maximum number of vertices per polygon
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Distance under which a point is treated as coincident with a polygon vertex
pub const POINT_EPSILON: f32 = 1e-2;

/// Stable polygon id, equal to the polygon's position in the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolygonId(pub u32);

impl PolygonId {
    /// Index into the polygon array
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Adjacency record: the neighbor and the shared edge in local vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolygonNeighbor {
    /// Polygon on the other side of the edge
    pub polygon: PolygonId,
    /// Local index of the edge start in the owning polygon
    pub edge_start: u8,
    /// Local index of the edge end in the owning polygon
    pub edge_end: u8,
}

/// A convex polygon of the navigation mesh
#[derive(Debug, Clone, Serialize)]
pub struct NavPolygon {
    /// Stable id
    pub id: PolygonId,
    /// Indices into the mesh vertex pool, in winding order
    vertices: Vec<usize>,
    /// Arithmetic mean of the vertices
    pub centroid: Vec3,
    /// Polygons sharing an edge with this one
    pub neighbors: Vec<PolygonNeighbor>,
    /// Area projected on the XZ plane
    pub area: f32,
    /// Traversal cost multiplier (higher = harder to traverse)
    pub cost: f32,
    /// Whether this polygon can be entered by a search
    pub walkable: bool,
    /// XZ bounds (min, max)
    bounds: (Vec2, Vec2),
}

impl NavPolygon {
    /// Vertex indices in winding order
    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// XZ bounding box as (min, max)
    pub fn aabb(&self) -> (Vec2, Vec2) {
        self.bounds
    }

    /// Neighbor record for `other`, if the two polygons share an edge
    pub fn neighbor(&self, other: PolygonId) -> Option<&PolygonNeighbor> {
        self.neighbors.iter().find(|n| n.polygon == other)
    }

    /// Global vertex index pairs of every edge
    fn edges(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let count = self.vertices.len();
        (0..count).map(move |i| (i, self.vertices[i], self.vertices[(i + 1) % count]))
    }
}

/// Per-polygon A* bookkeeping
#[derive(Debug, Clone, Copy)]
struct SearchNode {
    g: f32,
    h: f32,
    f: f32,
    parent: Option<PolygonId>,
    open: bool,
    closed: bool,
}

impl Default for SearchNode {
    fn default() -> Self {
        Self {
            g: f32::INFINITY,
            h: f32::INFINITY,
            f: f32::INFINITY,
            parent: None,
            open: false,
            closed: false,
        }
    }
}

/// Open-set entry. Lower `f` wins, then earlier insertion.
#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    f: f32,
    order: u64,
    polygon: PolygonId,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Navigation mesh for pathfinding.
///
/// Serialized as raw geometry ([`NavMeshData`]); deserializing rebuilds the
/// mesh through the validating constructors, so malformed data is rejected
/// with a [`NavMeshError`] instead of producing a mesh that panics on query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "NavMeshData", into = "NavMeshData")]
pub struct NavMesh {
    vertices: Vec<Vec3>,
    polygons: Vec<NavPolygon>,
    adjacency_built: bool,
    scratch: Vec<SearchNode>,
}

/// Serialized form of a [`NavMesh`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavMeshData {
    pub vertices: Vec<Vec3>,
    pub polygons: Vec<NavPolygonData>,
    /// Whether adjacency is rebuilt on load
    #[serde(default)]
    pub sealed: bool,
}

/// Serialized form of a [`NavPolygon`]; derived fields are recomputed on load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavPolygonData {
    pub vertices: Vec<usize>,
    #[serde(default = "default_cost")]
    pub cost: f32,
    #[serde(default = "default_walkable")]
    pub walkable: bool,
}

fn default_cost() -> f32 {
    1.0
}

fn default_walkable() -> bool {
    true
}

impl TryFrom<NavMeshData> for NavMesh {
    type Error = NavMeshError;

    fn try_from(data: NavMeshData) -> NavResult<Self> {
        let mut mesh = Self::with_capacity(data.vertices.len(), data.polygons.len());
        for vertex in data.vertices {
            mesh.add_vertex(vertex)?;
        }
        for polygon in &data.polygons {
            let id = mesh.add_polygon(&polygon.vertices)?;
            mesh.set_cost(id, polygon.cost)?;
            mesh.set_walkable(id, polygon.walkable)?;
        }
        if data.sealed {
            mesh.build_adjacency();
        }
        Ok(mesh)
    }
}

impl From<NavMesh> for NavMeshData {
    fn from(mesh: NavMesh) -> Self {
        Self {
            vertices: mesh.vertices,
            polygons: mesh
                .polygons
                .into_iter()
                .map(|polygon| NavPolygonData {
                    vertices: polygon.vertices,
                    cost: polygon.cost,
                    walkable: polygon.walkable,
                })
                .collect(),
            sealed: mesh.adjacency_built,
        }
    }
}

impl NavMesh {
    /// Create a new empty nav mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mesh with preallocated storage
    pub fn with_capacity(vertices: usize, polygons: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            polygons: Vec::with_capacity(polygons),
            adjacency_built: false,
            scratch: Vec::with_capacity(polygons),
        }
    }

    /// Build a flat grid of square cells on the XZ plane, adjacency included
    pub fn grid(width: f32, depth: f32, cell_size: f32) -> NavResult<Self> {
        if !(width > 0.0 && depth > 0.0 && cell_size > 0.0) {
            return Err(NavMeshError::InvalidDimensions(format!(
                "{}x{} with cell size {}",
                width, depth, cell_size
            )));
        }

        let cols = (width / cell_size).ceil() as usize;
        let rows = (depth / cell_size).ceil() as usize;
        let mut mesh = Self::with_capacity((cols + 1) * (rows + 1), cols * rows);

        for row in 0..=rows {
            for col in 0..=cols {
                let x = col as f32 * cell_size;
                let z = row as f32 * cell_size;
                mesh.add_vertex(Vec3::new(x, 0.0, z))?;
            }
        }

        let stride = cols + 1;
        for row in 0..rows {
            for col in 0..cols {
                let base = row * stride + col;
                mesh.add_polygon(&[base, base + 1, base + stride + 1, base + stride])?;
            }
        }

        mesh.build_adjacency();
        Ok(mesh)
    }

    /// Append a vertex, returning its index
    pub fn add_vertex(&mut self, position: Vec3) -> NavResult<usize> {
        if self.adjacency_built {
            return Err(NavMeshError::Sealed);
        }
        if !position.is_finite() {
            return Err(NavMeshError::InvalidPoint);
        }
        self.vertices.push(position);
        Ok(self.vertices.len() - 1)
    }

    /// Append a convex polygon over existing vertices, returning its id
    pub fn add_polygon(&mut self, vertex_indices: &[usize]) -> NavResult<PolygonId> {
        if self.adjacency_built {
            return Err(NavMeshError::Sealed);
        }

        let count = vertex_indices.len();
        if count < 3 {
            return Err(NavMeshError::TooFewVertices(count));
        }
        if count > MAX_POLYGON_VERTICES {
            return Err(NavMeshError::TooManyVertices(count));
        }

        for (i, &index) in vertex_indices.iter().enumerate() {
            if index >= self.vertices.len() {
                return Err(NavMeshError::VertexOutOfRange {
                    index,
                    count: self.vertices.len(),
                });
            }
            if vertex_indices[..i].contains(&index) {
                return Err(NavMeshError::DuplicateVertex(index));
            }
        }

        let points: Vec<Vec3> = vertex_indices.iter().map(|&i| self.vertices[i]).collect();
        let centroid = points.iter().copied().sum::<Vec3>() / count as f32;

        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(f32::NEG_INFINITY);
        for p in &points {
            min = min.min(Vec2::new(p.x, p.z));
            max = max.max(Vec2::new(p.x, p.z));
        }

        let id = PolygonId(self.polygons.len() as u32);
        self.polygons.push(NavPolygon {
            id,
            vertices: vertex_indices.to_vec(),
            centroid,
            neighbors: Vec::new(),
            area: polygon_area_xz(&points),
            cost: 1.0,
            walkable: true,
            bounds: (min, max),
        });
        self.scratch.push(SearchNode::default());
        Ok(id)
    }

    /// Connect polygons that share an edge and seal the mesh.
    ///
    /// Two polygons are adjacent when they share an unordered pair of global
    /// vertex indices as consecutive vertices. Runs once after loading.
    pub fn build_adjacency(&mut self) {
        for polygon in &mut self.polygons {
            polygon.neighbors.clear();
        }

        let count = self.polygons.len();
        for a in 0..count {
            for b in (a + 1)..count {
                let shared = self.polygons[a].edges().find_map(|(local_a, u, v)| {
                    self.polygons[b]
                        .edges()
                        .find(|&(_, p, q)| (p == u && q == v) || (p == v && q == u))
                        .map(|(local_b, _, _)| (local_a, local_b))
                });

                if let Some((local_a, local_b)) = shared {
                    let len_a = self.polygons[a].vertex_count();
                    let len_b = self.polygons[b].vertex_count();
                    self.polygons[a].neighbors.push(PolygonNeighbor {
                        polygon: PolygonId(b as u32),
                        edge_start: local_a as u8,
                        edge_end: ((local_a + 1) % len_a) as u8,
                    });
                    self.polygons[b].neighbors.push(PolygonNeighbor {
                        polygon: PolygonId(a as u32),
                        edge_start: local_b as u8,
                        edge_end: ((local_b + 1) % len_b) as u8,
                    });
                }
            }
        }

        self.adjacency_built = true;
        log::info!(
            "Nav mesh sealed: {} vertices, {} polygons",
            self.vertices.len(),
            self.polygons.len()
        );
    }

    /// Whether `build_adjacency` has run
    pub fn is_sealed(&self) -> bool {
        self.adjacency_built
    }

    /// Vertex pool
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// All polygons in id order
    pub fn polygons(&self) -> &[NavPolygon] {
        &self.polygons
    }

    /// Polygon by id
    pub fn polygon(&self, id: PolygonId) -> Option<&NavPolygon> {
        self.polygons.get(id.index())
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// World positions of a polygon's vertices, in winding order
    pub fn polygon_points(&self, id: PolygonId) -> Option<Vec<Vec3>> {
        let polygon = self.polygon(id)?;
        Some(polygon.vertices.iter().map(|&i| self.vertices[i]).collect())
    }

    /// Face normal from the first three vertices; zero when degenerate
    pub fn polygon_normal(&self, id: PolygonId) -> Vec3 {
        self.polygon_points(id)
            .map(|points| polygon_normal(&points))
            .unwrap_or(Vec3::ZERO)
    }

    /// Shared edge between two adjacent polygons, in `from`'s winding order
    pub fn portal(&self, from: PolygonId, to: PolygonId) -> Option<(Vec3, Vec3)> {
        let polygon = self.polygon(from)?;
        let neighbor = polygon.neighbor(to)?;
        let start = polygon.vertices[neighbor.edge_start as usize];
        let end = polygon.vertices[neighbor.edge_end as usize];
        Some((self.vertices[start], self.vertices[end]))
    }

    /// Mark a polygon as walkable or blocked
    pub fn set_walkable(&mut self, id: PolygonId, walkable: bool) -> NavResult<()> {
        let polygon = self
            .polygons
            .get_mut(id.index())
            .ok_or(NavMeshError::PolygonOutOfRange(id))?;
        polygon.walkable = walkable;
        Ok(())
    }

    /// Set the traversal cost multiplier of a polygon
    pub fn set_cost(&mut self, id: PolygonId, cost: f32) -> NavResult<()> {
        if !cost.is_finite() {
            return Err(NavMeshError::InvalidCost(cost));
        }
        let polygon = self
            .polygons
            .get_mut(id.index())
            .ok_or(NavMeshError::PolygonOutOfRange(id))?;
        polygon.cost = cost.max(0.0);
        Ok(())
    }

    /// First polygon (in id order) containing `point` on the XZ plane
    pub fn find_polygon_for_point(&self, point: Vec3) -> Option<PolygonId> {
        if !point.is_finite() {
            return None;
        }
        self.polygons
            .iter()
            .find(|polygon| self.contains_point(polygon, point))
            .map(|polygon| polygon.id)
    }

    /// Polygon whose centroid is horizontally closest to `point`
    pub fn closest_polygon(&self, point: Vec3) -> Option<PolygonId> {
        self.polygons
            .iter()
            .min_by(|a, b| {
                flat_distance_squared(a.centroid, point)
                    .total_cmp(&flat_distance_squared(b.centroid, point))
            })
            .map(|polygon| polygon.id)
    }

    fn contains_point(&self, polygon: &NavPolygon, point: Vec3) -> bool {
        let (min, max) = polygon.bounds;
        if point.x < min.x - POINT_EPSILON
            || point.x > max.x + POINT_EPSILON
            || point.z < min.y - POINT_EPSILON
            || point.z > max.y + POINT_EPSILON
        {
            return false;
        }

        let points: Vec<Vec3> = polygon.vertices.iter().map(|&i| self.vertices[i]).collect();
        if points
            .iter()
            .any(|v| flat_distance_squared(*v, point) <= POINT_EPSILON * POINT_EPSILON)
        {
            return true;
        }

        point_in_polygon_xz(&points, point)
    }

    /// A* over the polygon graph.
    ///
    /// Returns `Ok(None)` when the open set is exhausted without reaching `end`,
    /// or when either endpoint polygon is blocked.
    pub fn find_polygon_path(
        &mut self,
        start: PolygonId,
        end: PolygonId,
    ) -> NavResult<Option<Vec<PolygonId>>> {
        if !self.adjacency_built {
            return Err(NavMeshError::AdjacencyNotBuilt);
        }
        for id in [start, end] {
            if id.index() >= self.polygons.len() {
                return Err(NavMeshError::PolygonOutOfRange(id));
            }
        }

        for id in [start, end] {
            if !self.polygons[id.index()].walkable {
                log::debug!("Polygon search endpoint {:?} is not walkable", id);
                return Ok(None);
            }
        }

        if start == end {
            return Ok(Some(vec![start]));
        }

        self.reset_scratch();

        let goal = self.polygons[end.index()].centroid;
        let mut open = BinaryHeap::new();
        let mut order = 0u64;

        let h = self.polygons[start.index()].centroid.distance(goal);
        let node = &mut self.scratch[start.index()];
        node.g = 0.0;
        node.h = h;
        node.f = h;
        node.open = true;
        open.push(OpenEntry {
            f: h,
            order,
            polygon: start,
        });

        while let Some(entry) = open.pop() {
            let current = entry.polygon.index();
            let node = self.scratch[current];
            // Entries superseded by a cheaper push are skipped.
            if node.closed || !node.open || entry.f > node.f {
                continue;
            }

            if entry.polygon == end {
                return Ok(Some(self.reconstruct(start, end)));
            }

            self.scratch[current].open = false;
            self.scratch[current].closed = true;

            let current_centroid = self.polygons[current].centroid;
            for neighbor in &self.polygons[current].neighbors {
                let next = neighbor.polygon.index();
                let Some(next_polygon) = self.polygons.get(next) else {
                    log::error!(
                        "Polygon {:?} lists missing neighbor {:?}",
                        entry.polygon,
                        neighbor.polygon
                    );
                    continue;
                };
                if !next_polygon.walkable || self.scratch[next].closed {
                    continue;
                }

                let step = current_centroid.distance(next_polygon.centroid);
                let tentative = node.g + step * next_polygon.cost;
                let next_node = &mut self.scratch[next];
                if tentative < next_node.g {
                    next_node.parent = Some(entry.polygon);
                    next_node.g = tentative;
                    next_node.h = next_polygon.centroid.distance(goal);
                    next_node.f = next_node.g + next_node.h;
                    next_node.open = true;

                    order += 1;
                    open.push(OpenEntry {
                        f: next_node.f,
                        order,
                        polygon: neighbor.polygon,
                    });
                }
            }
        }

        Ok(None)
    }

    fn reset_scratch(&mut self) {
        self.scratch.clear();
        self.scratch
            .resize(self.polygons.len(), SearchNode::default());
    }

    fn reconstruct(&self, start: PolygonId, end: PolygonId) -> Vec<PolygonId> {
        let mut corridor = vec![end];
        let mut current = end;
        while current != start {
            match self.scratch[current.index()].parent {
                Some(parent) => {
                    corridor.push(parent);
                    current = parent;
                }
                None => break,
            }
        }
        corridor.reverse();
        corridor
    }

    /// Search cost of a corridor: centroid distances scaled by the entered polygon's cost
    pub fn corridor_cost(&self, corridor: &[PolygonId]) -> f32 {
        corridor
            .windows(2)
            .filter_map(|pair| {
                let a = self.polygon(pair[0])?;
                let b = self.polygon(pair[1])?;
                Some(a.centroid.distance(b.centroid) * b.cost)
            })
            .sum()
    }
}

/// Distance on the XZ plane
#[inline]
pub fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    flat_distance_squared(a, b).sqrt()
}

#[inline]
fn flat_distance_squared(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    dx * dx + dz * dz
}

/// Normal via (v1 - v0) x (v2 - v0); zero for fewer than three points
pub fn polygon_normal(points: &[Vec3]) -> Vec3 {
    if points.len() < 3 {
        return Vec3::ZERO;
    }
    (points[1] - points[0])
        .cross(points[2] - points[0])
        .normalize_or_zero()
}

fn polygon_area_xz(points: &[Vec3]) -> f32 {
    let mut twice_area = 0.0;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        twice_area += a.x * b.z - b.x * a.z;
    }
    twice_area.abs() * 0.5
}

/// Even-odd ray cast on the XZ plane
fn point_in_polygon_xz(points: &[Vec3], point: Vec3) -> bool {
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[j];
        if (a.z > point.z) != (b.z > point.z)
            && point.x < (b.x - a.x) * (point.z - a.z) / (b.z - a.z) + a.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}
