use hashbrown::{HashMap, HashSet};
use num_traits::Float;
use smallvec::SmallVec;

use super::math;
use super::mesh::{EdgeKey, Mesh, TriangleData, VertexMarker, VertexProvenance};
use super::{FixedTriangleHandle, FixedVertexHandle};
use crate::{Point2, Scalar};

/// The result of a point location query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PositionInTriangulation {
    /// The point coincides with an existing vertex.
    OnVertex(FixedVertexHandle),
    /// The point lies in the interior of an edge.
    OnEdge(FixedTriangleHandle, usize),
    /// The point lies strictly inside a triangle.
    OnFace(FixedTriangleHandle),
    /// The point lies outside the convex hull; carries a hull edge that the
    /// point is strictly visible from.
    OutsideConvexHull(FixedTriangleHandle, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertionResult {
    Inserted(FixedVertexHandle),
    /// The position coincided with an existing vertex; nothing was mutated.
    Existing(FixedVertexHandle),
}

type BoundaryEdge = (
    FixedVertexHandle,
    FixedVertexHandle,
    Option<(FixedTriangleHandle, usize)>,
);

impl<S: Scalar + Float> Mesh<S> {
    /// Locates `point` by walking from the last used triangle.
    ///
    /// The walk crosses the edge that separates the query point from the current
    /// triangle until no such edge is left. Runs in `O(sqrt(n))` for well
    /// distributed inputs when the hint is close; pathological inputs degrade to
    /// a linear walk.
    pub(crate) fn locate(&self, point: Point2<S>) -> PositionInTriangulation {
        let mut current = self.walk_hint();
        let mut step = 0usize;
        let max_steps = 4 * self.triangles.len() + 16;

        loop {
            step += 1;
            assert!(
                step <= max_steps,
                "point location failed to terminate - mesh is corrupt"
            );

            for vertex in self.tri(current).vertices {
                if self.position(vertex) == point {
                    self.update_walk_hint(current);
                    return PositionInTriangulation::OnVertex(vertex);
                }
            }

            let mut outward: SmallVec<[usize; 2]> = SmallVec::new();
            let mut on_edge = None;
            for edge_index in 0..3 {
                let [from, to] = self
                    .edge_vertices(current, edge_index)
                    .map(|v| self.position(v));
                let query = math::side_query(from, to, point);
                if query.is_on_right_side() {
                    outward.push(edge_index);
                } else if query.is_on_line() {
                    on_edge = Some(edge_index);
                }
            }

            if outward.is_empty() {
                self.update_walk_hint(current);
                return match on_edge {
                    Some(edge_index) => PositionInTriangulation::OnEdge(current, edge_index),
                    None => PositionInTriangulation::OnFace(current),
                };
            }

            // Alternating between the separating edge candidates keeps the walk
            // deterministic while avoiding cycles in cocircular configurations.
            let edge_index = outward[step % outward.len()];
            match self.tri(current).neighbors[edge_index] {
                Some(neighbor) => current = neighbor,
                None => {
                    self.update_walk_hint(current);
                    return PositionInTriangulation::OutsideConvexHull(current, edge_index);
                }
            }
        }
    }

    /// Inserts a point into the triangulation, keeping the (constrained) Delaunay
    /// property intact.
    pub(crate) fn insert(
        &mut self,
        point: Point2<S>,
        marker: VertexMarker,
        provenance: VertexProvenance,
    ) -> InsertionResult {
        match self.locate(point) {
            PositionInTriangulation::OnVertex(vertex) => InsertionResult::Existing(vertex),
            PositionInTriangulation::OnFace(triangle) => {
                let vertex = self.insert_in_cavity(triangle, point, marker, provenance);
                InsertionResult::Inserted(vertex)
            }
            PositionInTriangulation::OnEdge(triangle, edge_index) => {
                debug_assert!(
                    !self.is_constraint(triangle, edge_index),
                    "plain insertion must not land on a constraint edge"
                );
                let vertex = self.insert_on_edge(triangle, edge_index, point, marker, provenance);
                InsertionResult::Inserted(vertex)
            }
            PositionInTriangulation::OutsideConvexHull(triangle, edge_index) => {
                let vertex =
                    self.insert_outside_convex_hull(triangle, edge_index, point, marker, provenance);
                InsertionResult::Inserted(vertex)
            }
        }
    }

    /// Splits the edge `edge_index` of `triangle` at `point`, which must lie in the
    /// edge's interior, then restores the Delaunay property with edge flips.
    ///
    /// A constrained edge is replaced by two constrained halves; the constraint set
    /// only ever changes through such splits. The two sides of the split keep their
    /// own exclusion state, so splitting a hole boundary never leaks triangles into
    /// or out of the hole.
    pub(crate) fn insert_on_edge(
        &mut self,
        triangle: FixedTriangleHandle,
        edge_index: usize,
        point: Point2<S>,
        marker: VertexMarker,
        provenance: VertexProvenance,
    ) -> FixedVertexHandle {
        let [a, b] = self.edge_vertices(triangle, edge_index);
        let key = EdgeKey::new(a, b);
        let constraint = self.constraints.remove(&key);
        let marker = constraint.map(|kind| kind.vertex_marker()).unwrap_or(marker);
        let vertex = self.create_vertex(point, marker, provenance);

        let mut legalize: Vec<(FixedTriangleHandle, usize)> = Vec::with_capacity(4);

        // First side: `triangle` is (c, a, b) with c opposite the split edge. Its
        // slot becomes (c, a, p); a fresh slot takes (c, p, b).
        let t1 = triangle;
        let t1_data = self.tri(t1);
        let c = t1_data.vertices[edge_index];
        let n_bc = t1_data.neighbors[(edge_index + 1) % 3];
        let n_ca = t1_data.neighbors[(edge_index + 2) % 3];
        let t2 = t1_data.neighbors[edge_index];
        let first_excluded = t1_data.excluded;

        let t1b = self.create_triangle([c, vertex, b], first_excluded);
        *self.tri_mut(t1) = TriangleData {
            vertices: [c, a, vertex],
            neighbors: [None, Some(t1b), n_ca],
            excluded: first_excluded,
            alive: true,
        };
        self.tri_mut(t1b).neighbors = [None, n_bc, Some(t1)];
        if let Some(n_bc) = n_bc {
            let index = self.neighbor_index(n_bc, t1);
            self.set_neighbor(n_bc, index, Some(t1b));
        }
        legalize.push((t1, 2));
        legalize.push((t1b, 1));

        // Second side, if the split edge is not a hull edge: (d, b, a) becomes
        // (d, b, p) plus (d, p, a).
        if let Some(t2) = t2 {
            let j = self.neighbor_index(t2, t1);
            let t2_data = self.tri(t2);
            let d = t2_data.vertices[j];
            let n_ad = t2_data.neighbors[(j + 1) % 3];
            let n_db = t2_data.neighbors[(j + 2) % 3];
            let second_excluded = t2_data.excluded;
            debug_assert_eq!(t2_data.vertices[(j + 1) % 3], b);
            debug_assert_eq!(t2_data.vertices[(j + 2) % 3], a);

            let t2b = self.create_triangle([d, vertex, a], second_excluded);
            *self.tri_mut(t2) = TriangleData {
                vertices: [d, b, vertex],
                neighbors: [Some(t1b), Some(t2b), n_db],
                excluded: second_excluded,
                alive: true,
            };
            self.tri_mut(t2b).neighbors = [Some(t1), n_ad, Some(t2)];
            self.set_neighbor(t1, 0, Some(t2b));
            self.set_neighbor(t1b, 0, Some(t2));
            if let Some(n_ad) = n_ad {
                let index = self.neighbor_index(n_ad, t2);
                self.set_neighbor(n_ad, index, Some(t2b));
            }
            legalize.push((t2, 2));
            legalize.push((t2b, 1));
        }

        if let Some(kind) = constraint {
            self.constraints.insert(EdgeKey::new(a, vertex), kind);
            self.constraints.insert(EdgeKey::new(vertex, b), kind);
        }
        self.update_walk_hint(t1);
        self.legalize_edges(&mut legalize, vertex);
        vertex
    }

    /// Bowyer-Watson insertion: collects all triangles whose circumcircle contains
    /// `point` (never expanding across constraint edges), removes them and
    /// fan-triangulates the cavity boundary from the new vertex.
    fn insert_in_cavity(
        &mut self,
        seed: FixedTriangleHandle,
        point: Point2<S>,
        marker: VertexMarker,
        provenance: VertexProvenance,
    ) -> FixedVertexHandle {
        let excluded = self.tri(seed).excluded;
        let cavity = self.collect_cavity(&[seed], point);
        let boundary = self.cavity_boundary(&cavity);

        for &triangle in &cavity {
            self.free_triangle(triangle);
        }

        let vertex = self.create_vertex(point, marker, provenance);
        let fan = self.fill_cavity(&boundary, vertex, excluded);
        self.update_walk_hint(fan[0]);
        vertex
    }

    fn collect_cavity(
        &self,
        seeds: &[FixedTriangleHandle],
        point: Point2<S>,
    ) -> Vec<FixedTriangleHandle> {
        let mut cavity: Vec<FixedTriangleHandle> = seeds.to_vec();
        let mut visited: HashSet<FixedTriangleHandle> = seeds.iter().copied().collect();
        let mut cursor = 0;

        while cursor < cavity.len() {
            let current = cavity[cursor];
            cursor += 1;
            for edge_index in 0..3 {
                let Some(neighbor) = self.tri(current).neighbors[edge_index] else {
                    continue;
                };
                if visited.contains(&neighbor) || self.is_constraint(current, edge_index) {
                    continue;
                }
                let [v0, v1, v2] = self.triangle_positions(neighbor);
                if math::contained_in_circumference(v0, v1, v2, point) {
                    visited.insert(neighbor);
                    cavity.push(neighbor);
                }
            }
        }
        cavity
    }

    /// Extracts the border of a cavity as a cycle of directed edges, cavity on the
    /// left.
    fn cavity_boundary(&self, cavity: &[FixedTriangleHandle]) -> Vec<BoundaryEdge> {
        let in_cavity: HashSet<FixedTriangleHandle> = cavity.iter().copied().collect();
        let mut by_start: HashMap<FixedVertexHandle, BoundaryEdge> =
            HashMap::with_capacity(cavity.len() + 2);

        for &triangle in cavity {
            for edge_index in 0..3 {
                let neighbor = self.tri(triangle).neighbors[edge_index];
                if neighbor.is_some_and(|n| in_cavity.contains(&n)) {
                    continue;
                }
                let [from, to] = self.edge_vertices(triangle, edge_index);
                let outside = neighbor.map(|n| (n, self.neighbor_index(n, triangle)));
                by_start.insert(from, (from, to, outside));
            }
        }

        let start = by_start.keys().next().copied().expect("cavity has no border");
        let mut boundary = Vec::with_capacity(by_start.len());
        let mut cursor = start;
        while let Some(edge) = by_start.remove(&cursor) {
            cursor = edge.1;
            boundary.push(edge);
        }
        debug_assert!(by_start.is_empty(), "cavity border is not a single cycle");
        boundary
    }

    /// Like [Mesh::fill_cavity], but for an open chain whose two ends become hull
    /// edges. Used when extending the convex hull.
    fn fill_open_chain(
        &mut self,
        boundary: &[BoundaryEdge],
        apex: FixedVertexHandle,
        excluded: bool,
    ) -> Vec<FixedTriangleHandle> {
        let fan: Vec<_> = boundary
            .iter()
            .map(|&(from, to, _)| self.create_triangle([from, to, apex], excluded))
            .collect();
        for (k, (&(_, _, outside), &triangle)) in boundary.iter().zip(&fan).enumerate() {
            if k + 1 < fan.len() {
                self.set_neighbor(triangle, 0, Some(fan[k + 1]));
            }
            if k > 0 {
                self.set_neighbor(triangle, 1, Some(fan[k - 1]));
            }
            if let Some((outside_triangle, outside_edge)) = outside {
                self.set_neighbor(triangle, 2, Some(outside_triangle));
                self.set_neighbor(outside_triangle, outside_edge, Some(triangle));
            }
        }
        fan
    }

    /// Extends the convex hull with a point that lies outside of it.
    ///
    /// Builds a fan of new triangles over every hull edge the point is strictly
    /// visible from, then restores the Delaunay property with edge flips.
    fn insert_outside_convex_hull(
        &mut self,
        triangle: FixedTriangleHandle,
        edge_index: usize,
        point: Point2<S>,
        marker: VertexMarker,
        provenance: VertexProvenance,
    ) -> FixedVertexHandle {
        let is_visible = |mesh: &Self, t: FixedTriangleHandle, e: usize| {
            let [from, to] = mesh.edge_vertices(t, e).map(|v| mesh.position(v));
            math::side_query(from, to, point).is_on_right_side()
        };

        // Gather the contiguous run of visible hull edges around the exit edge.
        let mut run = vec![(triangle, edge_index)];
        loop {
            let (t, e) = run[0];
            let from = self.edge_vertices(t, e)[0];
            let Some(prev) = self.hull_edge_at(from, true, t) else {
                break;
            };
            if prev == run[run.len() - 1] || !is_visible(self, prev.0, prev.1) {
                break;
            }
            run.insert(0, prev);
        }
        loop {
            let (t, e) = run[run.len() - 1];
            let to = self.edge_vertices(t, e)[1];
            let Some(next) = self.hull_edge_at(to, false, t) else {
                break;
            };
            if next == run[0] || !is_visible(self, next.0, next.1) {
                break;
            }
            run.push(next);
        }

        // The new region is bounded by the reversed visible edges, walked from the
        // far end of the run so that consecutive chain edges share their vertices.
        let boundary: Vec<BoundaryEdge> = run
            .iter()
            .rev()
            .map(|&(t, e)| {
                let [from, to] = self.edge_vertices(t, e);
                (to, from, Some((t, e)))
            })
            .collect();

        let vertex = self.create_vertex(point, marker, provenance);
        let fan = self.fill_open_chain(&boundary, vertex, false);
        self.update_walk_hint(fan[0]);

        // The old hull edges are interior now and may violate the Delaunay property.
        let mut legalize: Vec<(FixedTriangleHandle, usize)> =
            fan.into_iter().map(|t| (t, 2)).collect();
        self.legalize_edges(&mut legalize, vertex);
        vertex
    }

    /// Finds the hull edge ending (`incoming`) or starting (`!incoming`) at `vertex`.
    ///
    /// `start` must be a triangle containing `vertex`.
    fn hull_edge_at(
        &self,
        vertex: FixedVertexHandle,
        incoming: bool,
        start: FixedTriangleHandle,
    ) -> Option<(FixedTriangleHandle, usize)> {
        let (fan, open) = self.fan_around(start, vertex);
        if !open {
            return None;
        }
        for triangle in fan {
            for edge_index in 0..3 {
                if self.tri(triangle).neighbors[edge_index].is_some() {
                    continue;
                }
                let [from, to] = self.edge_vertices(triangle, edge_index);
                if incoming && to == vertex {
                    return Some((triangle, edge_index));
                }
                if !incoming && from == vertex {
                    return Some((triangle, edge_index));
                }
            }
        }
        None
    }

    /// Lawson legalization: flips every edge on the stack whose far apex lies
    /// inside the circumcircle of the triangle containing `new_vertex`.
    fn legalize_edges(
        &mut self,
        edges: &mut Vec<(FixedTriangleHandle, usize)>,
        new_vertex: FixedVertexHandle,
    ) {
        while let Some((triangle, edge_index)) = edges.pop() {
            debug_assert_eq!(self.tri(triangle).vertices[edge_index], new_vertex);
            if self.is_constraint(triangle, edge_index) {
                continue;
            }
            let Some(neighbor) = self.tri(triangle).neighbors[edge_index] else {
                continue;
            };
            let apex_index = self.neighbor_index(neighbor, triangle);
            let apex = self.tri(neighbor).vertices[apex_index];

            let [v0, v1, v2] = self.triangle_positions(triangle);
            if math::contained_in_circumference(v0, v1, v2, self.position(apex)) {
                // After the flip, `triangle` holds (new_vertex, _, apex) and
                // `neighbor` holds (apex, _, new_vertex); the edges opposite the
                // new vertex are 0 and 2 respectively.
                self.flip_edge(triangle, edge_index);
                edges.push((triangle, 0));
                edges.push((neighbor, 2));
            }
        }
    }

    /// Removes an interior vertex again, retriangulating the surrounding polygon.
    ///
    /// This is a rollback facility for the refiner (a provisionally inserted
    /// circumcenter that turns out to encroach a segment is withdrawn); it is not
    /// part of the public mesh surface.
    pub(crate) fn remove_vertex(
        &mut self,
        vertex: FixedVertexHandle,
        hint: FixedTriangleHandle,
    ) -> Vec<FixedTriangleHandle> {
        debug_assert_eq!(
            vertex.index(),
            self.vertices.len() - 1,
            "only the most recently inserted vertex can be rolled back"
        );

        let (fan, open) = self.fan_around(hint, vertex);
        assert!(!open, "cannot roll back a vertex on the convex hull");

        let excluded = self.tri(fan[0]).excluded;
        let mut ring = Vec::with_capacity(fan.len());
        let mut border: HashMap<EdgeKey, Option<(FixedTriangleHandle, usize)>> =
            HashMap::with_capacity(fan.len());
        for &triangle in &fan {
            let index = self.vertex_index(triangle, vertex);
            ring.push(self.tri(triangle).vertices[(index + 1) % 3]);
            let outside = self.tri(triangle).neighbors[index]
                .map(|n| (n, self.neighbor_index(n, triangle)));
            border.insert(self.edge_key(triangle, index), outside);
        }

        for &triangle in &fan {
            self.free_triangle(triangle);
        }
        self.vertices.pop();

        let new_triangles = self.triangulate_ring(&ring, excluded);
        self.stitch_region(&new_triangles, &border);
        self.update_walk_hint(new_triangles[0]);
        new_triangles
    }

    /// Triangulates a counter clockwise, star shaped polygon by repeatedly clipping
    /// Delaunay ears.
    fn triangulate_ring(
        &mut self,
        ring: &[FixedVertexHandle],
        excluded: bool,
    ) -> Vec<FixedTriangleHandle> {
        let mut ring = ring.to_vec();
        let mut result = Vec::with_capacity(ring.len().saturating_sub(2));

        'clip: while ring.len() > 3 {
            for index in 0..ring.len() {
                let prev = ring[(index + ring.len() - 1) % ring.len()];
                let current = ring[index];
                let next = ring[(index + 1) % ring.len()];

                let [p0, p1, p2] = [prev, current, next].map(|v| self.position(v));
                if !math::side_query(p0, p1, p2).is_on_left_side() {
                    continue;
                }
                let is_delaunay = ring.iter().all(|&other| {
                    other == prev
                        || other == current
                        || other == next
                        || !math::contained_in_circumference(p0, p1, p2, self.position(other))
                });
                if is_delaunay {
                    result.push(self.create_triangle([prev, current, next], excluded));
                    ring.remove(index);
                    continue 'clip;
                }
            }
            unreachable!("star shaped polygon must contain a Delaunay ear");
        }
        result.push(self.create_triangle([ring[0], ring[1], ring[2]], excluded));
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utilities::assert_delaunay;
    use crate::TriangulationError;

    fn square_mesh() -> Mesh<f64> {
        Mesh::bulk_load(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_locate() {
        let mesh = square_mesh();

        match mesh.locate(Point2::new(0.25, 0.1)) {
            PositionInTriangulation::OnFace(_) => {}
            other => panic!("expected OnFace, got {:?}", other),
        }
        match mesh.locate(Point2::new(1.0, 1.0)) {
            PositionInTriangulation::OnVertex(v) => {
                assert_eq!(mesh.position(v), Point2::new(1.0, 1.0))
            }
            other => panic!("expected OnVertex, got {:?}", other),
        }
        match mesh.locate(Point2::new(0.5, 0.0)) {
            PositionInTriangulation::OnEdge(triangle, edge_index) => {
                let [from, to] = mesh
                    .edge_vertices(triangle, edge_index)
                    .map(|v| mesh.position(v));
                assert_eq!(from.y, 0.0);
                assert_eq!(to.y, 0.0);
            }
            other => panic!("expected OnEdge, got {:?}", other),
        }
        match mesh.locate(Point2::new(2.0, 0.5)) {
            PositionInTriangulation::OutsideConvexHull(_, _) => {}
            other => panic!("expected OutsideConvexHull, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_in_face() {
        let mut mesh = square_mesh();
        let result = mesh.insert(
            Point2::new(0.25, 0.25),
            VertexMarker::Interior,
            VertexProvenance::Steiner,
        );
        assert!(matches!(result, InsertionResult::Inserted(_)));
        mesh.sanity_check();
        assert_eq!(mesh.num_vertices(), 5);
        assert!(mesh.num_triangles() >= 4);
        assert_delaunay(&mesh);
    }

    #[test]
    fn test_insert_on_edge() {
        let mut mesh = square_mesh();
        // Lands exactly on the bottom hull edge.
        mesh.insert(
            Point2::new(0.5, 0.0),
            VertexMarker::Interior,
            VertexProvenance::Steiner,
        );
        mesh.sanity_check();
        assert_eq!(mesh.num_vertices(), 5);
        assert_delaunay(&mesh);
    }

    #[test]
    fn test_insert_existing() {
        let mut mesh = square_mesh();
        let result = mesh.insert(
            Point2::new(1.0, 1.0),
            VertexMarker::Interior,
            VertexProvenance::Steiner,
        );
        assert!(matches!(result, InsertionResult::Existing(_)));
        assert_eq!(mesh.num_vertices(), 4);
    }

    #[test]
    fn test_insert_outside_convex_hull() {
        let mut mesh = square_mesh();
        mesh.insert(
            Point2::new(2.0, 0.5),
            VertexMarker::Interior,
            VertexProvenance::Input,
        );
        mesh.sanity_check();
        assert_eq!(mesh.num_vertices(), 5);
        assert_delaunay(&mesh);

        // Collinear extension of the bottom hull edge.
        mesh.insert(
            Point2::new(3.0, 0.0),
            VertexMarker::Interior,
            VertexProvenance::Input,
        );
        mesh.sanity_check();
        assert_eq!(mesh.num_vertices(), 6);
        assert_delaunay(&mesh);
    }

    #[test]
    fn test_remove_vertex_rolls_back() {
        let mut mesh = square_mesh();
        let triangles_before = mesh.num_triangles();

        let vertex = match mesh.insert(
            Point2::new(0.4, 0.6),
            VertexMarker::Interior,
            VertexProvenance::Steiner,
        ) {
            InsertionResult::Inserted(vertex) => vertex,
            InsertionResult::Existing(_) => unreachable!(),
        };
        let hint = mesh
            .alive_triangle_handles()
            .find(|&t| mesh.tri(t).vertices.contains(&vertex))
            .unwrap();

        mesh.remove_vertex(vertex, hint);
        mesh.sanity_check();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_triangles(), triangles_before);
        assert_delaunay(&mesh);
    }

    #[test]
    fn test_duplicate_point_is_rejected() {
        let result = Mesh::bulk_load(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.5, 1.0),
            Point2::new(1.0, 0.0),
        ]);
        assert_eq!(
            result.err(),
            Some(TriangulationError::DuplicatePoint { index: 3 })
        );
    }
}
