use std::sync::atomic::{AtomicUsize, Ordering};

use hashbrown::HashMap;
use num_traits::Float;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::math;
use super::{FixedTriangleHandle, FixedVertexHandle};
use crate::{Point2, Scalar};

/// Classifies how a vertex relates to the constraint boundaries of its mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde")
)]
pub enum VertexMarker {
    /// The vertex does not lie on any constraint segment.
    Interior,
    /// The vertex is an endpoint of an outer boundary segment.
    Segment,
    /// The vertex is an endpoint of a hole boundary segment.
    Hole,
}

/// Records whether a vertex was part of the input or inserted during refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde")
)]
pub enum VertexProvenance {
    /// The vertex was part of the original input point set.
    Input,
    /// The vertex was inserted by the refinement procedure.
    Steiner,
}

/// Classifies a constraint edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde")
)]
pub enum ConstraintKind {
    /// Part of the outer boundary loop.
    Boundary,
    /// Part of a hole loop.
    Hole,
}

impl ConstraintKind {
    pub(crate) fn vertex_marker(self) -> VertexMarker {
        match self {
            ConstraintKind::Boundary => VertexMarker::Segment,
            ConstraintKind::Hole => VertexMarker::Hole,
        }
    }
}

/// An unordered pair of vertex handles identifying an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EdgeKey {
    lo: FixedVertexHandle,
    hi: FixedVertexHandle,
}

impl EdgeKey {
    pub(crate) fn new(a: FixedVertexHandle, b: FixedVertexHandle) -> Self {
        debug_assert!(a != b, "an edge requires two distinct vertices");
        if a < b {
            EdgeKey { lo: a, hi: b }
        } else {
            EdgeKey { lo: b, hi: a }
        }
    }

    pub(crate) fn vertices(&self) -> [FixedVertexHandle; 2] {
        [self.lo, self.hi]
    }
}

pub(crate) struct VertexData<S> {
    pub(crate) position: Point2<S>,
    pub(crate) marker: VertexMarker,
    pub(crate) provenance: VertexProvenance,
}

/// One triangle slot of the arena.
///
/// `vertices` are in counter clockwise order. `neighbors[i]` is the triangle across
/// the edge opposite `vertices[i]`; that edge runs from `vertices[i + 1]` to
/// `vertices[i + 2]` (indices mod 3), so the triangle interior is on its left.
pub(crate) struct TriangleData {
    pub(crate) vertices: [FixedVertexHandle; 3],
    pub(crate) neighbors: [Option<FixedTriangleHandle>; 3],
    pub(crate) excluded: bool,
    pub(crate) alive: bool,
}

/// A two dimensional triangulation: the owning aggregate of all vertices, triangles
/// and constraint edges of one triangulation session.
///
/// All adjacency is stored as indices into growable arenas rooted at this struct -
/// removing and recreating triangles can never leave a dangling reference behind.
///
/// A mesh is created with [Mesh::bulk_load] or [Mesh::bulk_load_constrained], improved
/// in place with [Mesh::refine] and read out through the accessor methods or
/// [Mesh::voronoi]. Meshes own no global state; independent meshes may be built on
/// separate threads freely.
pub struct Mesh<S> {
    pub(crate) vertices: Vec<VertexData<S>>,
    pub(crate) triangles: Vec<TriangleData>,
    free_triangles: Vec<FixedTriangleHandle>,
    pub(crate) constraints: HashMap<EdgeKey, ConstraintKind>,
    // Last triangle touched by a walk. Queries update it through a shared
    // reference, hence the atomic.
    walk_hint: AtomicUsize,
}

impl<S: Scalar + Float> Mesh<S> {
    pub(crate) fn with_capacity(num_vertices: usize) -> Self {
        Mesh {
            vertices: Vec::with_capacity(num_vertices),
            triangles: Vec::with_capacity(num_vertices * 2),
            free_triangles: Vec::new(),
            constraints: HashMap::new(),
            walk_hint: AtomicUsize::new(0),
        }
    }

    // ----- element creation and removal -----

    pub(crate) fn create_vertex(
        &mut self,
        position: Point2<S>,
        marker: VertexMarker,
        provenance: VertexProvenance,
    ) -> FixedVertexHandle {
        let handle = FixedVertexHandle::new(self.vertices.len());
        self.vertices.push(VertexData {
            position,
            marker,
            provenance,
        });
        handle
    }

    pub(crate) fn create_triangle(
        &mut self,
        vertices: [FixedVertexHandle; 3],
        excluded: bool,
    ) -> FixedTriangleHandle {
        let data = TriangleData {
            vertices,
            neighbors: [None; 3],
            excluded,
            alive: true,
        };
        if let Some(handle) = self.free_triangles.pop() {
            self.triangles[handle.index()] = data;
            handle
        } else {
            let handle = FixedTriangleHandle::new(self.triangles.len());
            self.triangles.push(data);
            handle
        }
    }

    /// Frees a triangle slot. The caller is responsible for patching any neighbor
    /// that still refers to it.
    pub(crate) fn free_triangle(&mut self, handle: FixedTriangleHandle) {
        let data = &mut self.triangles[handle.index()];
        debug_assert!(data.alive, "double free of a triangle slot");
        data.alive = false;
        data.neighbors = [None; 3];
        self.free_triangles.push(handle);
    }

    // ----- raw data access -----

    pub(crate) fn tri(&self, handle: FixedTriangleHandle) -> &TriangleData {
        &self.triangles[handle.index()]
    }

    pub(crate) fn tri_mut(&mut self, handle: FixedTriangleHandle) -> &mut TriangleData {
        &mut self.triangles[handle.index()]
    }

    pub(crate) fn position(&self, vertex: FixedVertexHandle) -> Point2<S> {
        self.vertices[vertex.index()].position
    }

    pub(crate) fn triangle_positions(&self, handle: FixedTriangleHandle) -> [Point2<S>; 3] {
        self.tri(handle).vertices.map(|v| self.position(v))
    }

    /// Returns the index of `vertex` within `triangle`.
    pub(crate) fn vertex_index(
        &self,
        triangle: FixedTriangleHandle,
        vertex: FixedVertexHandle,
    ) -> usize {
        let vertices = self.tri(triangle).vertices;
        for (index, v) in vertices.into_iter().enumerate() {
            if v == vertex {
                return index;
            }
        }
        panic!("vertex {:?} is not part of triangle {:?}", vertex, triangle);
    }

    /// Returns the edge index across which `triangle` references `neighbor`.
    pub(crate) fn neighbor_index(
        &self,
        triangle: FixedTriangleHandle,
        neighbor: FixedTriangleHandle,
    ) -> usize {
        let neighbors = self.tri(triangle).neighbors;
        for (index, n) in neighbors.into_iter().enumerate() {
            if n == Some(neighbor) {
                return index;
            }
        }
        panic!(
            "triangle {:?} is not adjacent to triangle {:?}",
            neighbor, triangle
        );
    }

    /// Returns the vertices of edge `edge_index` of `triangle`, in directed order
    /// (triangle interior on the left).
    pub(crate) fn edge_vertices(
        &self,
        triangle: FixedTriangleHandle,
        edge_index: usize,
    ) -> [FixedVertexHandle; 2] {
        let vertices = self.tri(triangle).vertices;
        [vertices[(edge_index + 1) % 3], vertices[(edge_index + 2) % 3]]
    }

    pub(crate) fn edge_key(&self, triangle: FixedTriangleHandle, edge_index: usize) -> EdgeKey {
        let [from, to] = self.edge_vertices(triangle, edge_index);
        EdgeKey::new(from, to)
    }

    pub(crate) fn set_neighbor(
        &mut self,
        triangle: FixedTriangleHandle,
        edge_index: usize,
        neighbor: Option<FixedTriangleHandle>,
    ) {
        self.tri_mut(triangle).neighbors[edge_index] = neighbor;
    }

    pub(crate) fn is_constraint_key(&self, key: EdgeKey) -> bool {
        self.constraints.contains_key(&key)
    }

    pub(crate) fn is_constraint(&self, triangle: FixedTriangleHandle, edge_index: usize) -> bool {
        self.is_constraint_key(self.edge_key(triangle, edge_index))
    }

    // ----- rotation around a vertex -----

    /// The next triangle in counter clockwise order around `vertex`.
    pub(crate) fn ccw_around(
        &self,
        triangle: FixedTriangleHandle,
        vertex: FixedVertexHandle,
    ) -> Option<FixedTriangleHandle> {
        let index = self.vertex_index(triangle, vertex);
        self.tri(triangle).neighbors[(index + 1) % 3]
    }

    /// The next triangle in clockwise order around `vertex`.
    pub(crate) fn cw_around(
        &self,
        triangle: FixedTriangleHandle,
        vertex: FixedVertexHandle,
    ) -> Option<FixedTriangleHandle> {
        let index = self.vertex_index(triangle, vertex);
        self.tri(triangle).neighbors[(index + 2) % 3]
    }

    /// Collects all triangles incident to `vertex` in counter clockwise order,
    /// starting from `start`.
    ///
    /// Returns the fan and whether it is open (i.e. `vertex` lies on the hull of the
    /// triangulated region). For an open fan, the first entry is the clockwise-most
    /// incident triangle.
    pub(crate) fn fan_around(
        &self,
        start: FixedTriangleHandle,
        vertex: FixedVertexHandle,
    ) -> (Vec<FixedTriangleHandle>, bool) {
        // Rewind to the clockwise-most triangle first so an open fan is complete.
        let mut first = start;
        loop {
            match self.cw_around(first, vertex) {
                Some(prev) if prev != start => first = prev,
                Some(_) => {
                    // Closed loop.
                    first = start;
                    break;
                }
                None => break,
            }
        }

        let mut fan = vec![first];
        let mut open = true;
        let mut current = first;
        loop {
            match self.ccw_around(current, vertex) {
                Some(next) if next == first => {
                    open = false;
                    break;
                }
                Some(next) => {
                    fan.push(next);
                    current = next;
                }
                None => break,
            }
        }
        (fan, open)
    }

    // ----- edit primitives -----

    /// Replaces the two triangles sharing edge `edge_index` of `triangle` with the
    /// two triangles of the opposite diagonal.
    ///
    /// The edge must be shared by exactly two triangles and must not be constrained;
    /// callers check this before flipping.
    pub(crate) fn flip_edge(&mut self, triangle: FixedTriangleHandle, edge_index: usize) {
        debug_assert!(
            !self.is_constraint(triangle, edge_index),
            "attempted to flip a constraint edge"
        );

        let t1 = triangle;
        let t2 = self.tri(t1).neighbors[edge_index]
            .expect("flip_edge requires an edge shared by two triangles");
        let j = self.neighbor_index(t2, t1);

        let t1_data = self.tri(t1);
        let c = t1_data.vertices[edge_index];
        let a = t1_data.vertices[(edge_index + 1) % 3];
        let b = t1_data.vertices[(edge_index + 2) % 3];
        let n_bc = t1_data.neighbors[(edge_index + 1) % 3];
        let n_ca = t1_data.neighbors[(edge_index + 2) % 3];

        let t2_data = self.tri(t2);
        let d = t2_data.vertices[j];
        let n_ad = t2_data.neighbors[(j + 1) % 3];
        let n_db = t2_data.neighbors[(j + 2) % 3];
        debug_assert_eq!(t2_data.vertices[(j + 1) % 3], b);
        debug_assert_eq!(t2_data.vertices[(j + 2) % 3], a);

        let excluded = self.tri(t1).excluded;

        // t1 becomes (c, a, d), t2 becomes (d, b, c); both keep ccw orientation.
        *self.tri_mut(t1) = TriangleData {
            vertices: [c, a, d],
            neighbors: [n_ad, Some(t2), n_ca],
            excluded,
            alive: true,
        };
        *self.tri_mut(t2) = TriangleData {
            vertices: [d, b, c],
            neighbors: [n_bc, Some(t1), n_db],
            excluded,
            alive: true,
        };

        if let Some(n) = n_ad {
            let index = self.neighbor_index(n, t2);
            self.set_neighbor(n, index, Some(t1));
        }
        if let Some(n) = n_bc {
            let index = self.neighbor_index(n, t1);
            self.set_neighbor(n, index, Some(t2));
        }
    }

    /// Fan-triangulates a star shaped cavity around `apex`.
    ///
    /// `boundary` lists the cavity border as directed edges in counter clockwise
    /// order (cavity interior on the left), each with the surviving triangle on its
    /// far side. Returns the created fan, one triangle per border edge.
    pub(crate) fn fill_cavity(
        &mut self,
        boundary: &[(
            FixedVertexHandle,
            FixedVertexHandle,
            Option<(FixedTriangleHandle, usize)>,
        )],
        apex: FixedVertexHandle,
        excluded: bool,
    ) -> Vec<FixedTriangleHandle> {
        debug_assert!(boundary.len() >= 3);

        let fan: Vec<_> = boundary
            .iter()
            .map(|&(from, to, _)| self.create_triangle([from, to, apex], excluded))
            .collect();

        let len = fan.len();
        for (k, (&(_, _, outside), &triangle)) in boundary.iter().zip(&fan).enumerate() {
            // Vertex layout is [from, to, apex]: edge 2 faces the outside, edge 0
            // leads to the next fan triangle, edge 1 to the previous one.
            self.set_neighbor(triangle, 0, Some(fan[(k + 1) % len]));
            self.set_neighbor(triangle, 1, Some(fan[(k + len - 1) % len]));
            if let Some((outside_triangle, outside_edge)) = outside {
                self.set_neighbor(triangle, 2, Some(outside_triangle));
                self.set_neighbor(outside_triangle, outside_edge, Some(triangle));
            }
        }
        fan
    }

    /// Reconnects the neighbor references of a freshly retriangulated region.
    ///
    /// `border` maps every border edge of the region to the surviving triangle just
    /// outside of it (`None` for the outer face). Edges interior to the region are
    /// matched against each other.
    pub(crate) fn stitch_region(
        &mut self,
        new_triangles: &[FixedTriangleHandle],
        border: &HashMap<EdgeKey, Option<(FixedTriangleHandle, usize)>>,
    ) {
        let mut directed: HashMap<[FixedVertexHandle; 2], (FixedTriangleHandle, usize)> =
            HashMap::with_capacity(new_triangles.len() * 3);
        for &triangle in new_triangles {
            for edge_index in 0..3 {
                directed.insert(self.edge_vertices(triangle, edge_index), (triangle, edge_index));
            }
        }

        for &triangle in new_triangles {
            for edge_index in 0..3 {
                let [from, to] = self.edge_vertices(triangle, edge_index);
                if let Some(&(twin, _)) = directed.get(&[to, from]) {
                    self.set_neighbor(triangle, edge_index, Some(twin));
                } else {
                    let outside = border
                        .get(&EdgeKey::new(from, to))
                        .expect("retriangulated region has an unmatched border edge");
                    self.set_neighbor(triangle, edge_index, outside.map(|(t, _)| t));
                    if let Some((outside_triangle, outside_edge)) = outside {
                        self.set_neighbor(*outside_triangle, *outside_edge, Some(triangle));
                    }
                }
            }
        }
    }

    // ----- derived per-triangle quantities -----

    pub(crate) fn circumcenter_of(&self, handle: FixedTriangleHandle) -> (Point2<S>, S) {
        math::circumcenter(self.triangle_positions(handle))
    }

    pub(crate) fn area_of(&self, handle: FixedTriangleHandle) -> S {
        math::triangle_area(self.triangle_positions(handle))
    }

    /// Returns the edge index and squared length of the shortest edge of a triangle.
    pub(crate) fn shortest_edge_of(&self, handle: FixedTriangleHandle) -> (usize, S) {
        let positions = self.triangle_positions(handle);
        let mut shortest = (0, positions[1].distance_2(positions[2]));
        for edge_index in 1..3 {
            let length2 = positions[(edge_index + 1) % 3].distance_2(positions[(edge_index + 2) % 3]);
            if length2 < shortest.1 {
                shortest = (edge_index, length2);
            }
        }
        shortest
    }

    // ----- walk hint -----

    pub(crate) fn walk_hint(&self) -> FixedTriangleHandle {
        let index = self.walk_hint.load(Ordering::Relaxed);
        if index < self.triangles.len() && self.triangles[index].alive {
            return FixedTriangleHandle::new(index);
        }
        self.first_alive_triangle()
            .expect("mesh contains no triangles")
    }

    pub(crate) fn update_walk_hint(&self, triangle: FixedTriangleHandle) {
        self.walk_hint.store(triangle.index(), Ordering::Relaxed);
    }

    fn first_alive_triangle(&self) -> Option<FixedTriangleHandle> {
        self.triangles
            .iter()
            .position(|t| t.alive)
            .map(FixedTriangleHandle::new)
    }

    // ----- public accessors -----

    /// Returns the number of vertices in this mesh.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Returns the number of triangles of the triangulated region.
    ///
    /// Triangles inside holes or outside the outer boundary are not counted.
    pub fn num_triangles(&self) -> usize {
        self.triangles
            .iter()
            .filter(|t| t.alive && !t.excluded)
            .count()
    }

    /// Returns the number of undirected edges of the triangulated region.
    pub fn num_undirected_edges(&self) -> usize {
        self.included_triangle_handles()
            .map(|handle| {
                (0..3)
                    .filter(|&edge_index| self.counts_edge_once(handle, edge_index))
                    .count()
            })
            .sum()
    }

    /// Returns the number of constraint edges.
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Iterates over all vertices.
    pub fn vertices(&self) -> impl Iterator<Item = VertexRef<'_, S>> + '_ {
        (0..self.vertices.len()).map(move |index| VertexRef {
            mesh: self,
            handle: FixedVertexHandle::new(index),
        })
    }

    /// Returns a reference to a single vertex.
    pub fn vertex(&self, handle: FixedVertexHandle) -> VertexRef<'_, S> {
        VertexRef { mesh: self, handle }
    }

    /// Iterates over the triangles of the triangulated region.
    ///
    /// Triangles inside holes or outside the outer boundary are omitted.
    pub fn triangles(&self) -> impl Iterator<Item = TriangleRef<'_, S>> + '_ {
        self.included_triangle_handles()
            .map(move |handle| TriangleRef { mesh: self, handle })
    }

    /// Returns a reference to a single triangle.
    pub fn triangle(&self, handle: FixedTriangleHandle) -> TriangleRef<'_, S> {
        debug_assert!(self.tri(handle).alive);
        TriangleRef { mesh: self, handle }
    }

    /// Iterates over all constraint edges as vertex pairs.
    pub fn constraint_edges(&self) -> impl Iterator<Item = [FixedVertexHandle; 2]> + '_ {
        self.constraints.keys().map(|key| key.vertices())
    }

    /// Returns `true` if the edge between the two vertices is constrained.
    pub fn is_constraint_edge(&self, from: FixedVertexHandle, to: FixedVertexHandle) -> bool {
        self.is_constraint_key(EdgeKey::new(from, to))
    }

    /// Iterates over the edges of the convex hull as directed vertex pairs.
    ///
    /// The triangulated region lies on the left of each returned edge.
    pub fn convex_hull(&self) -> impl Iterator<Item = [FixedVertexHandle; 2]> + '_ {
        self.alive_triangle_handles().flat_map(move |handle| {
            (0..3).filter_map(move |edge_index| {
                if self.tri(handle).neighbors[edge_index].is_none() {
                    Some(self.edge_vertices(handle, edge_index))
                } else {
                    None
                }
            })
        })
    }

    pub(crate) fn alive_triangle_handles(
        &self,
    ) -> impl Iterator<Item = FixedTriangleHandle> + '_ {
        self.triangles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.alive)
            .map(|(index, _)| FixedTriangleHandle::new(index))
    }

    pub(crate) fn included_triangle_handles(
        &self,
    ) -> impl Iterator<Item = FixedTriangleHandle> + '_ {
        self.triangles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.alive && !t.excluded)
            .map(|(index, _)| FixedTriangleHandle::new(index))
    }

    /// Decides whether edge `edge_index` of `handle` is counted by `handle` when
    /// enumerating undirected edges of the included region exactly once.
    fn counts_edge_once(&self, handle: FixedTriangleHandle, edge_index: usize) -> bool {
        match self.tri(handle).neighbors[edge_index] {
            None => true,
            Some(neighbor) => self.tri(neighbor).excluded || neighbor > handle,
        }
    }

    // ----- structural invariants -----

    /// Verifies the structural invariants of the mesh: neighbor symmetry, counter
    /// clockwise orientation and shared-edge consistency.
    ///
    /// Any violation is an engine defect, never caller misuse, and panics rather
    /// than letting a corrupt mesh escape.
    pub(crate) fn sanity_check(&self) {
        for handle in self.alive_triangle_handles() {
            let data = self.tri(handle);
            let [v0, v1, v2] = data.vertices.map(|v| self.position(v));
            assert!(
                math::side_query(v0, v1, v2).is_on_left_side(),
                "triangle {:?} is not oriented ccw",
                handle
            );

            for edge_index in 0..3 {
                let Some(neighbor) = data.neighbors[edge_index] else {
                    continue;
                };
                assert!(self.tri(neighbor).alive, "neighbor reference to freed slot");
                let [from, to] = self.edge_vertices(handle, edge_index);
                let twin_index = self.neighbor_index(neighbor, handle);
                assert_eq!(
                    self.edge_vertices(neighbor, twin_index),
                    [to, from],
                    "neighbor symmetry violated between {:?} and {:?}",
                    handle,
                    neighbor
                );
            }
        }
    }
}

/// A reference to a vertex of a [Mesh].
pub struct VertexRef<'a, S> {
    mesh: &'a Mesh<S>,
    handle: FixedVertexHandle,
}

impl<'a, S: Scalar + Float> VertexRef<'a, S> {
    /// Returns the fixed handle of this vertex.
    pub fn fix(&self) -> FixedVertexHandle {
        self.handle
    }

    /// Returns the position of this vertex.
    pub fn position(&self) -> Point2<S> {
        self.mesh.position(self.handle)
    }

    /// Returns the boundary marker of this vertex.
    pub fn marker(&self) -> VertexMarker {
        self.mesh.vertices[self.handle.index()].marker
    }

    /// Returns whether this vertex stems from the input or from refinement.
    pub fn provenance(&self) -> VertexProvenance {
        self.mesh.vertices[self.handle.index()].provenance
    }
}

/// A reference to a triangle of a [Mesh].
pub struct TriangleRef<'a, S> {
    mesh: &'a Mesh<S>,
    handle: FixedTriangleHandle,
}

impl<'a, S: Scalar + Float> TriangleRef<'a, S> {
    /// Returns the fixed handle of this triangle.
    pub fn fix(&self) -> FixedTriangleHandle {
        self.handle
    }

    /// Returns the three vertices of this triangle in counter clockwise order.
    pub fn vertices(&self) -> [FixedVertexHandle; 3] {
        self.mesh.tri(self.handle).vertices
    }

    /// Returns the three vertex positions in counter clockwise order.
    pub fn positions(&self) -> [Point2<S>; 3] {
        self.mesh.triangle_positions(self.handle)
    }

    /// Returns the neighbor across the edge opposite each vertex.
    ///
    /// `None` means the edge borders the outer face or a hole.
    pub fn neighbors(&self) -> [Option<FixedTriangleHandle>; 3] {
        self.mesh.tri(self.handle).neighbors.map(|neighbor| {
            neighbor.filter(|n| !self.mesh.tri(*n).excluded)
        })
    }

    /// Returns the circumcenter of this triangle and the squared circumradius.
    pub fn circumcircle(&self) -> (Point2<S>, S) {
        self.mesh.circumcenter_of(self.handle)
    }

    /// Returns the circumcenter of this triangle.
    pub fn circumcenter(&self) -> Point2<S> {
        self.circumcircle().0
    }

    /// Returns the area of this triangle.
    pub fn area(&self) -> S {
        self.mesh.area_of(self.handle)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn two_triangle_mesh() -> (Mesh<f64>, FixedTriangleHandle, FixedTriangleHandle) {
        let mut mesh = Mesh::with_capacity(4);
        let a = mesh.create_vertex(
            Point2::new(0.0, 0.0),
            VertexMarker::Interior,
            VertexProvenance::Input,
        );
        let b = mesh.create_vertex(
            Point2::new(1.0, 1.0),
            VertexMarker::Interior,
            VertexProvenance::Input,
        );
        let c = mesh.create_vertex(
            Point2::new(0.0, 1.0),
            VertexMarker::Interior,
            VertexProvenance::Input,
        );
        let d = mesh.create_vertex(
            Point2::new(1.0, 0.0),
            VertexMarker::Interior,
            VertexProvenance::Input,
        );

        let t1 = mesh.create_triangle([c, a, b], false);
        let t2 = mesh.create_triangle([d, b, a], false);
        mesh.set_neighbor(t1, 0, Some(t2));
        mesh.set_neighbor(t2, 0, Some(t1));
        mesh.sanity_check();
        (mesh, t1, t2)
    }

    #[test]
    fn test_edge_key_is_unordered() {
        let a = FixedVertexHandle::new(3);
        let b = FixedVertexHandle::new(7);
        assert_eq!(EdgeKey::new(a, b), EdgeKey::new(b, a));
    }

    #[test]
    fn test_counts() {
        let (mesh, _, _) = two_triangle_mesh();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_triangles(), 2);
        assert_eq!(mesh.num_undirected_edges(), 5);
        assert_eq!(mesh.convex_hull().count(), 4);
    }

    #[test]
    fn test_flip_edge() {
        let (mut mesh, t1, t2) = two_triangle_mesh();
        mesh.flip_edge(t1, 0);
        mesh.sanity_check();

        // The new diagonal connects (0, 1) and (1, 0).
        let mut diagonal_found = false;
        for handle in [t1, t2] {
            for edge_index in 0..3 {
                let [from, to] = mesh
                    .edge_vertices(handle, edge_index)
                    .map(|v| mesh.position(v));
                if (from, to) == (Point2::new(0.0, 1.0), Point2::new(1.0, 0.0))
                    || (from, to) == (Point2::new(1.0, 0.0), Point2::new(0.0, 1.0))
                {
                    diagonal_found = true;
                }
            }
        }
        assert!(diagonal_found);
        assert_eq!(mesh.num_undirected_edges(), 5);
    }

    #[test]
    fn test_fan_around() {
        let (mesh, t1, t2) = two_triangle_mesh();
        // Vertex a = index 1 in t1 is shared by both triangles; its fan is open.
        let a = mesh.tri(t1).vertices[1];
        let (fan, open) = mesh.fan_around(t2, a);
        assert!(open);
        assert_eq!(fan.len(), 2);
        let (fan_from_t1, _) = mesh.fan_around(t1, a);
        assert_eq!(fan, fan_from_t1);
    }

    #[test]
    fn test_free_slot_reuse() {
        let (mut mesh, t1, t2) = two_triangle_mesh();
        mesh.set_neighbor(t1, 0, None);
        mesh.set_neighbor(t2, 0, None);
        mesh.free_triangle(t2);
        assert_eq!(mesh.num_triangles(), 1);

        let vertices = mesh.tri(t1).vertices;
        let recycled = mesh.create_triangle(vertices, false);
        assert_eq!(recycled, t2);
        assert_eq!(mesh.num_triangles(), 2);
    }
}
