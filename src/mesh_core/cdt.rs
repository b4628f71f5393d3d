use hashbrown::{HashMap, HashSet};
use num_traits::Float;

use super::math;
use super::mesh::{ConstraintKind, EdgeKey, Mesh, VertexMarker};
use super::{FixedTriangleHandle, FixedVertexHandle, PositionInTriangulation};
use crate::{Point2, Scalar, TriangulationError};

impl<S: Scalar + Float> Mesh<S> {
    /// Creates a constrained Delaunay triangulation of a point set bounded by
    /// polygon loops.
    ///
    /// The first loop is the outer boundary, every further loop outlines a hole.
    /// Loops are implicitly closed and may share vertices with the point set; a
    /// repeated trailing corner is ignored. Every loop segment survives as a
    /// constraint edge of the result. Triangles outside the outer boundary or
    /// inside a hole stay in the structure for adjacency purposes but are excluded
    /// from iteration, refinement and Voronoi extraction.
    ///
    /// Fails with [TriangulationError::SelfIntersectingBoundary] if any two
    /// non-adjacent boundary segments touch or cross, and with the loop errors if a
    /// loop has fewer than three corners or encloses no area. As with
    /// [Mesh::bulk_load], validation happens before construction.
    pub fn bulk_load_constrained(
        points: Vec<Point2<S>>,
        loops: &[Vec<Point2<S>>],
    ) -> Result<Self, TriangulationError> {
        let loops = validate_loops(loops)?;

        // Boundary corners and cloud points share one vertex set; loop corners that
        // coincide with a cloud point reuse its vertex.
        let mut entries: Vec<(Point2<S>, VertexMarker)> = Vec::with_capacity(points.len());
        let mut seen: HashMap<(u64, u64), usize> = HashMap::with_capacity(points.len());
        for (index, point) in points.iter().enumerate() {
            math::validate_point(*point)?;
            if seen.insert(position_key(*point), entries.len()).is_some() {
                return Err(TriangulationError::DuplicatePoint { index });
            }
            entries.push((*point, VertexMarker::Interior));
        }

        let mut loop_indices: Vec<Vec<usize>> = Vec::with_capacity(loops.len());
        for (loop_index, corners) in loops.iter().enumerate() {
            let kind = constraint_kind(loop_index);
            let mut indices = Vec::with_capacity(corners.len());
            for &corner in corners {
                math::validate_point(corner)?;
                let entry = *seen.entry(position_key(corner)).or_insert_with(|| {
                    entries.push((corner, kind.vertex_marker()));
                    entries.len() - 1
                });
                if entries[entry].1 == VertexMarker::Interior {
                    entries[entry].1 = kind.vertex_marker();
                }
                indices.push(entry);
            }
            loop_indices.push(indices);
        }

        let (mut mesh, handles) = Self::bulk_load_core(entries)?;

        for (loop_index, indices) in loop_indices.iter().enumerate() {
            let kind = constraint_kind(loop_index);
            for pair in 0..indices.len() {
                let from = handles[indices[pair]];
                let to = handles[indices[(pair + 1) % indices.len()]];
                mesh.enforce_constraint(from, to, kind)?;
            }
        }

        mesh.classify_excluded();
        if cfg!(debug_assertions) {
            mesh.sanity_check();
        }
        Ok(mesh)
    }

    /// Forces the segment between two vertices into the mesh as a constraint edge.
    ///
    /// Vertices lying exactly on the segment become waypoints splitting the
    /// constraint into collinear sub-segments.
    pub(crate) fn enforce_constraint(
        &mut self,
        from: FixedVertexHandle,
        to: FixedVertexHandle,
        kind: ConstraintKind,
    ) -> Result<(), TriangulationError> {
        let mut current = from;
        while current != to {
            current = self.enforce_constraint_step(current, to, kind)?;
        }
        Ok(())
    }

    /// Enforces the constraint from `current` towards `to` up to the next waypoint,
    /// returning the vertex that was reached.
    fn enforce_constraint_step(
        &mut self,
        current: FixedVertexHandle,
        to: FixedVertexHandle,
        kind: ConstraintKind,
    ) -> Result<FixedVertexHandle, TriangulationError> {
        let start = self.triangle_of_vertex(current);
        let (fan, _) = self.fan_around(start, current);

        let target_key = EdgeKey::new(current, to);
        for &triangle in &fan {
            for edge_index in 0..3 {
                if self.edge_key(triangle, edge_index) == target_key {
                    self.register_constraint(current, to, kind);
                    return Ok(to);
                }
            }
        }

        let segment_from = self.position(current);
        let segment_to = self.position(to);

        // A neighboring vertex exactly on the segment becomes a waypoint.
        for &triangle in &fan {
            let index = self.vertex_index(triangle, current);
            for other in [
                self.tri(triangle).vertices[(index + 1) % 3],
                self.tri(triangle).vertices[(index + 2) % 3],
            ] {
                let position = self.position(other);
                if math::side_query(segment_from, segment_to, position).is_on_line()
                    && position.sub(segment_from).dot(segment_to.sub(segment_from)) > S::zero()
                {
                    self.register_constraint(current, other, kind);
                    return Ok(other);
                }
            }
        }

        // Find the fan triangle whose far edge is crossed by the segment.
        let mut crossing = None;
        for &triangle in &fan {
            let index = self.vertex_index(triangle, current);
            let a = self.tri(triangle).vertices[(index + 1) % 3];
            let b = self.tri(triangle).vertices[(index + 2) % 3];
            let to_left_of_a =
                math::side_query(segment_from, self.position(a), segment_to).is_on_left_side();
            let to_right_of_b =
                math::side_query(segment_from, self.position(b), segment_to).is_on_right_side();
            if to_left_of_a && to_right_of_b {
                crossing = Some((triangle, index, a, b));
                break;
            }
        }
        let (first, index, mut right, mut left) =
            crossing.expect("segment endpoint is not inside the triangulation");

        // Walk the chain of triangles the segment passes through.
        let mut crossed = vec![first];
        let mut left_chain = vec![left];
        let mut right_chain = vec![right];
        let mut exit = (first, index);
        let waypoint;

        loop {
            if self.is_constraint(exit.0, exit.1) {
                return Err(TriangulationError::SelfIntersectingBoundary);
            }
            let entered = self.tri(exit.0).neighbors[exit.1]
                .expect("constraint segment left the triangulation");
            let apex_index = self.neighbor_index(entered, exit.0);
            let apex = self.tri(entered).vertices[apex_index];
            crossed.push(entered);

            if apex == to {
                waypoint = to;
                break;
            }
            let query = math::side_query(segment_from, segment_to, self.position(apex));
            if query.is_on_line() {
                waypoint = apex;
                break;
            }
            if query.is_on_left_side() {
                // The segment now exits between `right` and the apex, which is the
                // edge opposite the old left vertex.
                exit = (entered, self.vertex_index(entered, left));
                left = apex;
                left_chain.push(apex);
            } else {
                exit = (entered, self.vertex_index(entered, right));
                right = apex;
                right_chain.push(apex);
            }
        }

        // Remove the chain and retriangulate the polygon on either side of the
        // enforced segment.
        let in_chain: HashSet<FixedTriangleHandle> = crossed.iter().copied().collect();
        let mut border: HashMap<EdgeKey, Option<(FixedTriangleHandle, usize)>> = HashMap::new();
        for &triangle in &crossed {
            for edge_index in 0..3 {
                let neighbor = self.tri(triangle).neighbors[edge_index];
                if neighbor.is_some_and(|n| in_chain.contains(&n)) {
                    continue;
                }
                let outside = neighbor.map(|n| (n, self.neighbor_index(n, triangle)));
                border.insert(self.edge_key(triangle, edge_index), outside);
            }
        }

        let excluded = self.tri(first).excluded;
        for &triangle in &crossed {
            self.free_triangle(triangle);
        }

        right_chain.reverse();
        let mut new_triangles = Vec::with_capacity(left_chain.len() + right_chain.len());
        self.triangulate_chain(current, waypoint, &left_chain, excluded, &mut new_triangles);
        self.triangulate_chain(waypoint, current, &right_chain, excluded, &mut new_triangles);
        self.stitch_region(&new_triangles, &border);
        self.update_walk_hint(new_triangles[0]);

        self.register_constraint(current, waypoint, kind);
        Ok(waypoint)
    }

    /// Triangulates the pseudo polygon spanned by the base edge `base_from ->
    /// base_to` and `chain`, whose vertices all lie strictly left of the base edge,
    /// ordered from `base_from` towards `base_to`.
    ///
    /// Picking the chain vertex whose circumcircle with the base edge is empty
    /// yields the constrained Delaunay triangulation of the region.
    fn triangulate_chain(
        &mut self,
        base_from: FixedVertexHandle,
        base_to: FixedVertexHandle,
        chain: &[FixedVertexHandle],
        excluded: bool,
        out: &mut Vec<FixedTriangleHandle>,
    ) {
        if chain.is_empty() {
            return;
        }

        let from_position = self.position(base_from);
        let to_position = self.position(base_to);
        let mut best = 0;
        for candidate in 1..chain.len() {
            if math::contained_in_circumference(
                from_position,
                to_position,
                self.position(chain[best]),
                self.position(chain[candidate]),
            ) {
                best = candidate;
            }
        }

        out.push(self.create_triangle([base_from, base_to, chain[best]], excluded));
        self.triangulate_chain(base_from, chain[best], &chain[..best], excluded, out);
        self.triangulate_chain(chain[best], base_to, &chain[best + 1..], excluded, out);
    }

    fn register_constraint(
        &mut self,
        a: FixedVertexHandle,
        b: FixedVertexHandle,
        kind: ConstraintKind,
    ) {
        self.constraints.insert(EdgeKey::new(a, b), kind);
        for vertex in [a, b] {
            let marker = &mut self.vertices[vertex.index()].marker;
            if *marker == VertexMarker::Interior {
                *marker = kind.vertex_marker();
            }
        }
    }

    /// Returns a triangle containing `vertex`.
    fn triangle_of_vertex(&self, vertex: FixedVertexHandle) -> FixedTriangleHandle {
        match self.locate(self.position(vertex)) {
            PositionInTriangulation::OnVertex(found) => {
                debug_assert_eq!(found, vertex);
                // The walk terminated in a triangle containing the vertex.
                self.walk_hint()
            }
            _ => panic!("vertex is not part of the triangulation"),
        }
    }

    /// Classifies every triangle as included or excluded by peeling inward from the
    /// convex hull, flipping between the two states whenever a constraint edge is
    /// crossed. Regions outside the outer loop and inside a hole end up excluded.
    pub(crate) fn classify_excluded(&mut self) {
        if self.constraints.is_empty() {
            return;
        }

        // layers[0] collects the even layers (outside the outer loop, hole
        // interiors), layers[1] the odd ones.
        let mut layers: [HashSet<FixedTriangleHandle>; 2] = [HashSet::new(), HashSet::new()];
        let mut current_todo: Vec<(FixedTriangleHandle, usize)> = Vec::new();
        let mut next_todo: Vec<(FixedTriangleHandle, usize)> = Vec::new();

        for triangle in self.alive_triangle_handles() {
            for edge_index in 0..3 {
                if self.tri(triangle).neighbors[edge_index].is_none() {
                    current_todo.push((triangle, edge_index));
                }
            }
        }

        let mut parity = 0;
        loop {
            while let Some((triangle, edge_index)) = current_todo.pop() {
                if layers[0].contains(&triangle) || layers[1].contains(&triangle) {
                    continue;
                }
                // Crossing a constraint edge moves the face one layer further in;
                // its expansion is deferred to the next peeling round.
                let crosses = self.is_constraint(triangle, edge_index);
                let layer = if crosses { 1 - parity } else { parity };
                layers[layer].insert(triangle);

                for other_edge in 0..3 {
                    let Some(neighbor) = self.tri(triangle).neighbors[other_edge] else {
                        continue;
                    };
                    let entry = (neighbor, self.neighbor_index(neighbor, triangle));
                    if crosses {
                        next_todo.push(entry);
                    } else {
                        current_todo.push(entry);
                    }
                }
            }

            if next_todo.is_empty() {
                break;
            }
            std::mem::swap(&mut current_todo, &mut next_todo);
            parity = 1 - parity;
        }

        let all: Vec<_> = self.alive_triangle_handles().collect();
        for triangle in all {
            self.tri_mut(triangle).excluded = layers[0].contains(&triangle);
        }
    }
}

fn constraint_kind(loop_index: usize) -> ConstraintKind {
    if loop_index == 0 {
        ConstraintKind::Boundary
    } else {
        ConstraintKind::Hole
    }
}

fn position_key<S: Scalar>(point: Point2<S>) -> (u64, u64) {
    // +0.0 collapses the two float zeros onto one key.
    let x: f64 = point.x.into();
    let y: f64 = point.y.into();
    ((x + 0.0).to_bits(), (y + 0.0).to_bits())
}

/// Checks loop sizes, areas and mutual intersection, returning each loop with
/// consecutive duplicate corners and a repeated trailing corner removed.
fn validate_loops<S: Scalar + Float>(
    loops: &[Vec<Point2<S>>],
) -> Result<Vec<Vec<Point2<S>>>, TriangulationError> {
    let mut cleaned = Vec::with_capacity(loops.len());
    for (loop_index, corners) in loops.iter().enumerate() {
        let mut distinct: Vec<Point2<S>> = Vec::with_capacity(corners.len());
        for &corner in corners {
            if distinct.last() != Some(&corner) {
                distinct.push(corner);
            }
        }
        if distinct.last() == distinct.first() && distinct.len() > 1 {
            distinct.pop();
        }
        if distinct.len() < 3 {
            return Err(TriangulationError::DegenerateLoop { loop_index });
        }

        let mut doubled_area = S::zero();
        for index in 0..distinct.len() {
            let from = distinct[index];
            let to = distinct[(index + 1) % distinct.len()];
            doubled_area = doubled_area + (from.x * to.y - to.x * from.y);
        }
        if doubled_area == S::zero() {
            return Err(TriangulationError::ZeroAreaLoop { loop_index });
        }
        cleaned.push(distinct);
    }

    // Pairwise segment check across all loops; only segments adjacent within the
    // same loop may share a point.
    let mut segments: Vec<(usize, usize, Point2<S>, Point2<S>)> = Vec::new();
    for (loop_index, corners) in cleaned.iter().enumerate() {
        for segment_index in 0..corners.len() {
            segments.push((
                loop_index,
                segment_index,
                corners[segment_index],
                corners[(segment_index + 1) % corners.len()],
            ));
        }
    }
    for first in 0..segments.len() {
        for second in first + 1..segments.len() {
            let (l0, s0, f0, t0) = segments[first];
            let (l1, s1, f1, t1) = segments[second];
            if l0 == l1 {
                let count = cleaned[l0].len();
                let adjacent = (s0 + 1) % count == s1 || (s1 + 1) % count == s0;
                if adjacent {
                    continue;
                }
            }
            if math::segments_intersect(f0, t0, f1, t1) {
                return Err(TriangulationError::SelfIntersectingBoundary);
            }
        }
    }
    Ok(cleaned)
}
