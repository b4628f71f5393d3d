use std::collections::VecDeque;

use num_traits::Float;

use super::math;
use super::mesh::{EdgeKey, Mesh, VertexMarker, VertexProvenance};
use super::{FixedTriangleHandle, FixedVertexHandle, InsertionResult, PositionInTriangulation};
use crate::{Point2, Scalar, TriangulationError};

/// Contains details about the outcome of a refinement procedure.
///
/// *See [Mesh::refine]*
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefinementResult {
    /// Set to `true` if the refinement could be completed regularly.
    ///
    /// This will be `false` if the refinement ran out of additional vertices
    /// (see [RefinementParameters::with_max_additional_vertices]). Consider using a
    /// higher vertex budget or a lower [angle limit](RefinementParameters::with_angle_limit)
    /// in this case.
    pub refinement_complete: bool,

    /// The number of steiner points that were inserted.
    pub steiner_points_added: usize,

    /// The number of encroached segments and sub-quality triangles that were left
    /// behind when the vertex budget ran out.
    ///
    /// Zero whenever `refinement_complete` is `true`.
    pub remaining_violations: usize,
}

/// Specifies the minimum allowed angle that should be kept after a refinement
/// procedure.
///
/// The refinement algorithm will attempt to keep the minimum angle in the
/// triangulation greater than this limit.
///
/// *See [Mesh::refine], [RefinementParameters::with_angle_limit]*
#[derive(Copy, Clone, PartialEq, PartialOrd)]
pub struct AngleLimit {
    radius_to_shortest_edge_limit: f64,
}

/// The largest angle limit for which Delaunay refinement is known to terminate,
/// in degrees.
const MAX_ANGLE_LIMIT_DEG: f64 = 34.0;

impl AngleLimit {
    /// Create a new angle limit from an angle given in degrees.
    ///
    /// Only angles within `[0°, 34°]` are accepted - larger limits exceed the
    /// theoretical termination bound of the refinement algorithm. An angle of 0
    /// degrees disables refining due to small angles.
    ///
    /// *See also [from_rad](crate::AngleLimit::from_rad)*
    pub fn from_deg(degrees: f64) -> Result<Self, TriangulationError> {
        if !(0.0..=MAX_ANGLE_LIMIT_DEG).contains(&degrees) {
            return Err(TriangulationError::InvalidMinAngle { degrees });
        }
        Ok(Self::from_rad_unchecked(degrees.to_radians()))
    }

    /// Create a new angle limit from an angle given in radians.
    ///
    /// *See also [from_deg](crate::AngleLimit::from_deg)*
    pub fn from_rad(rad: f64) -> Result<Self, TriangulationError> {
        Self::from_deg(rad.to_degrees())
    }

    fn from_rad_unchecked(rad: f64) -> Self {
        let sin = rad.sin();
        if sin == 0.0 {
            Self::from_radius_to_shortest_edge_ratio(f64::INFINITY)
        } else {
            Self::from_radius_to_shortest_edge_ratio(0.5 / sin)
        }
    }

    /// Returns the radius to shortest edge limit corresponding to this angle limit.
    ///
    /// See [from_radius_to_shortest_edge_ratio](crate::AngleLimit::from_radius_to_shortest_edge_ratio)
    /// for more information.
    pub fn radius_to_shortest_edge_limit(&self) -> f64 {
        self.radius_to_shortest_edge_limit
    }

    /// Creates a new angle limit by specifying the circumradius to shortest edge
    /// ratio that must be kept.
    ///
    /// For each triangle, this ratio is calculated by dividing its circumradius by
    /// the length of its shortest edge. The ratio is related to the minimum allowed
    /// angle by `ratio = 1 / (2 sin(min_angle))` - the larger the allowed minimum
    /// angle, the smaller the ratio. Passing in `f64::INFINITY` disables refining
    /// due to small angles.
    ///
    /// This constructor is not range checked; ratios below the equivalent of the
    /// 34° bound put termination at the mercy of the vertex budget.
    pub fn from_radius_to_shortest_edge_ratio(ratio: f64) -> Self {
        Self {
            radius_to_shortest_edge_limit: ratio,
        }
    }
}

impl std::fmt::Debug for AngleLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AngleLimit")
            .field(
                "angle limit (deg)",
                &(0.5 / self.radius_to_shortest_edge_limit)
                    .asin()
                    .to_degrees(),
            )
            .finish()
    }
}

impl Default for AngleLimit {
    fn default() -> Self {
        Self::from_radius_to_shortest_edge_ratio(1.0)
    }
}

#[derive(Debug, PartialEq, PartialOrd, Clone, Copy, Hash)]
enum RefinementHint {
    Ignore,
    ShouldRefine,
    MustRefine,
}

/// Controls how a refinement is performed.
///
/// The following parameters are used by `Self::default` and [Self::new]:
/// * `angle_limit`: 30 degrees
/// * `min_required_area`: disabled - no lower area limit is used
/// * `max_allowed_area`: disabled - no upper area limit is used
/// * `num_additional_vertices`: 10 times the number of vertices in the mesh
///
/// # Example
///
/// ```
/// use trowel::{AngleLimit, Mesh, Point2, RefinementParameters, TriangulationError};
///
/// fn refine_mesh(mesh: &mut Mesh<f64>) -> Result<(), TriangulationError> {
///     let params = RefinementParameters::<f64>::new()
///         .with_max_allowed_area(0.5)
///         .with_angle_limit(AngleLimit::from_deg(25.0)?);
///
///     mesh.refine(params);
///     Ok(())
/// }
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct RefinementParameters<S> {
    max_additional_vertices: Option<usize>,
    angle_limit: AngleLimit,
    min_area: Option<S>,
    max_area: Option<S>,
}

impl<S: Scalar + Float> Default for RefinementParameters<S> {
    fn default() -> Self {
        Self {
            max_additional_vertices: None,
            angle_limit: AngleLimit::from_radius_to_shortest_edge_ratio(1.0),
            min_area: None,
            max_area: None,
        }
    }
}

impl<S: Scalar + Float> RefinementParameters<S> {
    /// Creates a new set of `RefinementParameters`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Specifies the smallest allowed inner angle in a refined triangulation.
    ///
    /// Defaults to 30 degrees.
    pub fn with_angle_limit(mut self, angle_limit: AngleLimit) -> Self {
        self.angle_limit = angle_limit;
        self
    }

    /// Specifies a lower bound for triangle areas.
    ///
    /// The refinement will not attempt to split any triangle with an area below
    /// this bound, which can prevent over-refinement around tiny input features.
    pub fn with_min_required_area(mut self, min_area: S) -> Self {
        self.min_area = Some(min_area);
        self
    }

    /// Specifies an upper bound for triangle areas.
    ///
    /// Any triangle above the bound is split regardless of its angles, which evens
    /// out the size distribution of the resulting triangles.
    pub fn with_max_allowed_area(mut self, max_area: S) -> Self {
        self.max_area = Some(max_area);
        self
    }

    /// Specifies how many additional vertices may be inserted during refinement.
    ///
    /// The budget bounds the otherwise unbounded worst case of the refinement loop
    /// and doubles as a deterministic timeout surrogate. Exhausting it is not an
    /// error: the partially refined mesh is returned along with diagnostics
    /// (see [RefinementResult]).
    pub fn with_max_additional_vertices(mut self, max_additional_vertices: usize) -> Self {
        self.max_additional_vertices = Some(max_additional_vertices);
        self
    }

    fn get_refinement_hint(&self, mesh: &Mesh<S>, face: FixedTriangleHandle) -> RefinementHint {
        if let Some(max_area) = self.max_area {
            if mesh.area_of(face) > max_area {
                return RefinementHint::MustRefine;
            }
        }
        if let Some(min_area) = self.min_area {
            if mesh.area_of(face) < min_area {
                return RefinementHint::Ignore;
            }
        }

        let (_, length2) = mesh.shortest_edge_of(face);
        let (_, radius2) = mesh.circumcenter_of(face);
        let ratio2: f64 = (radius2 / length2).into();
        let limit = self.angle_limit.radius_to_shortest_edge_limit;
        if ratio2 > limit * limit {
            RefinementHint::ShouldRefine
        } else {
            RefinementHint::Ignore
        }
    }
}

impl<S: Scalar + Float> Mesh<S> {
    /// Refines the mesh by inserting steiner points until no constraint segment is
    /// encroached and no triangle violates the configured angle and area bounds.
    ///
    /// Segment splitting always takes priority over triangle refinement. A skinny
    /// triangle is resolved by inserting its circumcenter - unless that
    /// circumcenter encroaches a constraint or hull segment, in which case the
    /// segment is split instead and the triangle is revisited later.
    ///
    /// Refinement is idempotent: re-running it with the same parameters on an
    /// already conforming mesh inserts no further points.
    ///
    /// This is an adaption of the classical refinement algorithms introduced by Jim
    /// Ruppert and Paul Chew; see
    /// <https://people.eecs.berkeley.edu/~jrs/papers/imrtalk.pdf> for an
    /// introduction to the topic.
    #[doc(alias = "refinement")]
    pub fn refine(&mut self, parameters: RefinementParameters<S>) -> RefinementResult {
        let num_initial_vertices = self.num_vertices();
        let num_additional_vertices = parameters
            .max_additional_vertices
            .unwrap_or(num_initial_vertices * 10);
        let max_allowed_vertices = num_initial_vertices + num_additional_vertices;

        let mut segment_candidates: VecDeque<EdgeKey> = self
            .fixed_edge_keys()
            .collect();
        let mut face_candidates: VecDeque<FixedTriangleHandle> =
            self.included_triangle_handles().collect();

        let mut refinement_complete = true;
        let mut steiner_points_added = 0usize;

        loop {
            // Segment encroachment is resolved before any triangle work.
            if let Some(segment) = segment_candidates.pop_front() {
                let Some((triangle, edge_index)) = self.find_fixed_edge(segment) else {
                    continue;
                };
                if self.encroaching_apex(triangle, edge_index).is_none() {
                    continue;
                }
                if self.num_vertices() >= max_allowed_vertices {
                    refinement_complete = false;
                    break;
                }
                self.split_segment(
                    triangle,
                    edge_index,
                    num_initial_vertices,
                    &mut segment_candidates,
                    &mut face_candidates,
                );
                steiner_points_added += 1;
                continue;
            }

            let Some(face) = face_candidates.pop_front() else {
                break;
            };
            if !self.tri(face).alive || self.tri(face).excluded {
                continue;
            }
            let hint = parameters.get_refinement_hint(self, face);
            if hint == RefinementHint::Ignore {
                continue;
            }
            if hint == RefinementHint::ShouldRefine && self.is_unresolvable_angle(face, num_initial_vertices)
            {
                // A seam between two fixed segments that has already been split;
                // subdividing further cannot improve it.
                continue;
            }

            if self.num_vertices() >= max_allowed_vertices {
                refinement_complete = false;
                break;
            }

            match self.insert_circumcenter(face, &mut segment_candidates, &mut face_candidates) {
                CircumcenterOutcome::Inserted => steiner_points_added += 1,
                CircumcenterOutcome::SplitSegmentInstead => {
                    steiner_points_added += 1;
                    face_candidates.push_back(face);
                }
                CircumcenterOutcome::Skipped => {}
            }
        }

        let remaining_violations = if refinement_complete {
            0
        } else {
            self.count_violations(&parameters)
        };

        if cfg!(debug_assertions) {
            self.sanity_check();
        }
        RefinementResult {
            refinement_complete,
            steiner_points_added,
            remaining_violations,
        }
    }

    /// All constraint edges plus the convex hull edges bordering included
    /// triangles. These are the segments that must not be encroached.
    fn fixed_edge_keys(&self) -> impl Iterator<Item = EdgeKey> + '_ {
        let hull_keys = self.alive_triangle_handles().flat_map(move |triangle| {
            (0..3).filter_map(move |edge_index| {
                let data = self.tri(triangle);
                if data.neighbors[edge_index].is_none() && !data.excluded {
                    Some(self.edge_key(triangle, edge_index))
                } else {
                    None
                }
            })
        });
        self.constraints.keys().copied().chain(hull_keys)
    }

    fn is_fixed_edge(&self, triangle: FixedTriangleHandle, edge_index: usize) -> bool {
        self.tri(triangle).neighbors[edge_index].is_none()
            || self.is_constraint(triangle, edge_index)
    }

    /// Looks up the current mesh location of a fixed edge. Returns `None` for keys
    /// that went stale because the segment has been split in the meantime.
    fn find_fixed_edge(&self, key: EdgeKey) -> Option<(FixedTriangleHandle, usize)> {
        let [lo, _] = key.vertices();
        let start = self.triangle_containing(lo)?;
        let (fan, _) = self.fan_around(start, lo);
        for triangle in fan {
            for edge_index in 0..3 {
                if self.edge_key(triangle, edge_index) == key {
                    if self.is_fixed_edge(triangle, edge_index) {
                        return Some((triangle, edge_index));
                    }
                    return None;
                }
            }
        }
        None
    }

    fn triangle_containing(&self, vertex: FixedVertexHandle) -> Option<FixedTriangleHandle> {
        match self.locate(self.position(vertex)) {
            PositionInTriangulation::OnVertex(_) => Some(self.walk_hint()),
            _ => None,
        }
    }

    /// Returns a vertex inside or on the diametral circle of the given fixed edge,
    /// if any. Only the apexes of the two adjacent triangles can qualify; excluded
    /// sides are protected and not inspected.
    fn encroaching_apex(
        &self,
        triangle: FixedTriangleHandle,
        edge_index: usize,
    ) -> Option<FixedVertexHandle> {
        let [from, to] = self
            .edge_vertices(triangle, edge_index)
            .map(|v| self.position(v));

        let mut sides: [Option<(FixedTriangleHandle, usize)>; 2] = [Some((triangle, edge_index)), None];
        if let Some(neighbor) = self.tri(triangle).neighbors[edge_index] {
            sides[1] = Some((neighbor, self.neighbor_index(neighbor, triangle)));
        }

        for (side_triangle, apex_index) in sides.into_iter().flatten() {
            if self.tri(side_triangle).excluded {
                continue;
            }
            let apex = self.tri(side_triangle).vertices[apex_index];
            if math::encroaches(from, to, self.position(apex)) {
                return Some(apex);
            }
        }
        None
    }

    /// Splits a fixed segment, re-queueing the two halves and everything around the
    /// new vertex.
    ///
    /// If exactly one endpoint is an input vertex, the split point is snapped to a
    /// power of two fraction of the segment length ("concentric shells"). This
    /// keeps splits near acute input corners from cascading indefinitely.
    fn split_segment(
        &mut self,
        triangle: FixedTriangleHandle,
        edge_index: usize,
        num_initial_vertices: usize,
        segment_candidates: &mut VecDeque<EdgeKey>,
        face_candidates: &mut VecDeque<FixedTriangleHandle>,
    ) {
        let is_original = |vertex: FixedVertexHandle| vertex.index() < num_initial_vertices;
        let [from, to] = self.edge_vertices(triangle, edge_index);
        let (from_position, to_position) = (self.position(from), self.position(to));

        let half = Into::<S>::into(0.5f32);
        let (w0, w1) = match (is_original(from), is_original(to)) {
            // Unsplit segments and segments between two steiner points are split in
            // the middle.
            (true, true) | (false, false) => (half, half),
            (from_is_original, _) => {
                let half_length = from_position.distance_2(to_position).sqrt() * half;
                let nearest_power_of_two = nearest_power_of_two(half_length);
                let other_vertex_weight = half * nearest_power_of_two / half_length;
                let original_vertex_weight = S::one() - other_vertex_weight;

                if from_is_original {
                    (original_vertex_weight, other_vertex_weight)
                } else {
                    (other_vertex_weight, original_vertex_weight)
                }
            }
        };
        let split_position = from_position.mul(w0).add(to_position.mul(w1));

        let vertex = self.insert_on_edge(
            triangle,
            edge_index,
            split_position,
            VertexMarker::Interior,
            VertexProvenance::Steiner,
        );

        segment_candidates.push_back(EdgeKey::new(from, vertex));
        segment_candidates.push_back(EdgeKey::new(vertex, to));
        self.queue_surroundings(vertex, segment_candidates, face_candidates);
    }

    /// Inserts the circumcenter of `face`, or splits the segment that blocks or
    /// would be encroached by it.
    fn insert_circumcenter(
        &mut self,
        face: FixedTriangleHandle,
        segment_candidates: &mut VecDeque<EdgeKey>,
        face_candidates: &mut VecDeque<FixedTriangleHandle>,
    ) -> CircumcenterOutcome {
        let (circumcenter, _) = self.circumcenter_of(face);
        if math::validate_point(circumcenter).is_err() {
            // Nearly degenerate face; its circumcenter is out of numeric range.
            return CircumcenterOutcome::Skipped;
        }

        // The circumcenter may lie on the far side of a constraint segment. Splitting
        // that segment (rather than inserting the circumcenter) keeps all steiner
        // points inside the triangulated region.
        if let Some((triangle, edge_index)) = self.first_fixed_edge_towards(face, circumcenter) {
            self.split_segment_for_circumcenter(
                triangle,
                edge_index,
                segment_candidates,
                face_candidates,
            );
            return CircumcenterOutcome::SplitSegmentInstead;
        }

        match self.locate(circumcenter) {
            PositionInTriangulation::OnVertex(_) => CircumcenterOutcome::Skipped,
            PositionInTriangulation::OutsideConvexHull(_, _) => CircumcenterOutcome::Skipped,
            PositionInTriangulation::OnEdge(triangle, edge_index)
                if self.is_fixed_edge(triangle, edge_index) =>
            {
                self.split_segment_for_circumcenter(
                    triangle,
                    edge_index,
                    segment_candidates,
                    face_candidates,
                );
                CircumcenterOutcome::SplitSegmentInstead
            }
            PositionInTriangulation::OnFace(triangle) if self.tri(triangle).excluded => {
                CircumcenterOutcome::Skipped
            }
            _ => {
                let vertex = match self.insert(
                    circumcenter,
                    VertexMarker::Interior,
                    VertexProvenance::Steiner,
                ) {
                    InsertionResult::Inserted(vertex) => vertex,
                    InsertionResult::Existing(_) => return CircumcenterOutcome::Skipped,
                };

                // The insertion may have pulled the new vertex inside the diametral
                // circle of a nearby fixed segment. In that case it is withdrawn
                // again and the offended segments are split instead.
                let hint = self.walk_hint();
                let (fan, _) = self.fan_around(hint, vertex);
                let mut encroached = Vec::new();
                for &fan_triangle in &fan {
                    for edge_index in 0..3 {
                        if !self.is_fixed_edge(fan_triangle, edge_index) {
                            continue;
                        }
                        let [from, to] = self
                            .edge_vertices(fan_triangle, edge_index)
                            .map(|v| self.position(v));
                        if math::encroaches(from, to, self.position(vertex)) {
                            encroached.push(self.edge_key(fan_triangle, edge_index));
                        }
                    }
                }

                if encroached.is_empty() {
                    self.queue_surroundings(vertex, segment_candidates, face_candidates);
                    return CircumcenterOutcome::Inserted;
                }

                let restored = self.remove_vertex(vertex, fan[0]);
                face_candidates.extend(restored);
                let mut split_any = false;
                for key in encroached {
                    if let Some((triangle, edge_index)) = self.find_fixed_edge(key) {
                        self.split_segment_for_circumcenter(
                            triangle,
                            edge_index,
                            segment_candidates,
                            face_candidates,
                        );
                        split_any = true;
                        break;
                    }
                }
                if split_any {
                    CircumcenterOutcome::SplitSegmentInstead
                } else {
                    CircumcenterOutcome::Skipped
                }
            }
        }
    }

    fn split_segment_for_circumcenter(
        &mut self,
        triangle: FixedTriangleHandle,
        edge_index: usize,
        segment_candidates: &mut VecDeque<EdgeKey>,
        face_candidates: &mut VecDeque<FixedTriangleHandle>,
    ) {
        // The circumcenter-driven split always bisects: the halves are re-examined
        // for encroachment right away.
        let [from, to] = self.edge_vertices(triangle, edge_index);
        let midpoint = self
            .position(from)
            .add(self.position(to))
            .mul(Into::<S>::into(0.5f32));
        let vertex = self.insert_on_edge(
            triangle,
            edge_index,
            midpoint,
            VertexMarker::Interior,
            VertexProvenance::Steiner,
        );
        segment_candidates.push_front(EdgeKey::new(vertex, to));
        segment_candidates.push_front(EdgeKey::new(from, vertex));
        self.queue_surroundings(vertex, segment_candidates, face_candidates);
    }

    /// Walks the straight segment from the interior of `face` towards `target` and
    /// reports the first fixed edge it crosses, if any.
    ///
    /// This is the visibility test of the refinement: a fixed edge between a skinny
    /// face and its circumcenter must be split instead of inserting the center.
    fn first_fixed_edge_towards(
        &self,
        face: FixedTriangleHandle,
        target: Point2<S>,
    ) -> Option<(FixedTriangleHandle, usize)> {
        let [p0, p1, p2] = self.triangle_positions(face);
        let third = S::one() / (S::one() + S::one() + S::one());
        let start = p0.add(p1).add(p2).mul(third);

        let mut current = face;
        let mut steps = 0usize;
        loop {
            steps += 1;
            assert!(
                steps <= 4 * self.triangles.len() + 16,
                "circumcenter walk failed to terminate - mesh is corrupt"
            );

            let mut exit = None;
            for edge_index in 0..3 {
                let [from, to] = self
                    .edge_vertices(current, edge_index)
                    .map(|v| self.position(v));
                if !math::side_query(from, to, target).is_on_right_side() {
                    continue;
                }
                // The walk segment leaves through this edge if the edge endpoints
                // straddle it.
                if math::side_query(start, target, from).is_on_left_side_or_on_line()
                    && !math::side_query(start, target, to).is_on_left_side()
                {
                    exit = Some(edge_index);
                    break;
                }
            }
            let Some(edge_index) = exit else {
                return None;
            };
            if self.is_fixed_edge(current, edge_index) {
                return Some((current, edge_index));
            }
            current = self.tri(current).neighbors[edge_index]
                .expect("non-fixed edge must have a neighbor");
        }
    }

    /// Queues the faces around a freshly inserted vertex and any fixed edges they
    /// carry - both may have become refinement candidates.
    fn queue_surroundings(
        &self,
        vertex: FixedVertexHandle,
        segment_candidates: &mut VecDeque<EdgeKey>,
        face_candidates: &mut VecDeque<FixedTriangleHandle>,
    ) {
        let (fan, _) = self.fan_around(self.walk_hint(), vertex);
        for &triangle in &fan {
            if !self.tri(triangle).excluded {
                face_candidates.push_back(triangle);
            }
            for edge_index in 0..3 {
                if self.is_fixed_edge(triangle, edge_index) {
                    segment_candidates.push_back(self.edge_key(triangle, edge_index));
                }
            }
        }
    }

    /// If the shortest edge lies between two fixed segments that were already
    /// split, no amount of further splitting will widen the angle between them.
    fn is_unresolvable_angle(
        &self,
        face: FixedTriangleHandle,
        num_initial_vertices: usize,
    ) -> bool {
        let (shortest, _) = self.shortest_edge_of(face);
        let both_fixed = [(shortest + 1) % 3, (shortest + 2) % 3]
            .into_iter()
            .all(|edge_index| self.is_fixed_edge(face, edge_index));
        if !both_fixed {
            return false;
        }
        let [from, to] = self.edge_vertices(face, shortest);
        from.index() >= num_initial_vertices || to.index() >= num_initial_vertices
    }

    fn count_violations(&self, parameters: &RefinementParameters<S>) -> usize {
        let mut violations = 0;
        let mut seen = hashbrown::HashSet::new();
        for key in self.fixed_edge_keys() {
            if !seen.insert(key) {
                continue;
            }
            if let Some((triangle, edge_index)) = self.find_fixed_edge(key) {
                if self.encroaching_apex(triangle, edge_index).is_some() {
                    violations += 1;
                }
            }
        }
        violations
            + self
                .included_triangle_handles()
                .filter(|&face| {
                    parameters.get_refinement_hint(self, face) != RefinementHint::Ignore
                })
                .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircumcenterOutcome {
    Inserted,
    SplitSegmentInstead,
    Skipped,
}

fn nearest_power_of_two<S: Scalar + Float>(input: S) -> S {
    input.log2().round().exp2()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utilities::{assert_delaunay, min_angle_deg, random_points_with_seed, SEED};

    fn unit_square() -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ]
    }

    #[test]
    fn test_angle_limit_validation() {
        assert!(AngleLimit::from_deg(0.0).is_ok());
        assert!(AngleLimit::from_deg(30.0).is_ok());
        assert_eq!(
            AngleLimit::from_deg(35.0).err(),
            Some(TriangulationError::InvalidMinAngle { degrees: 35.0 })
        );
        assert_eq!(
            AngleLimit::from_deg(-1.0).err(),
            Some(TriangulationError::InvalidMinAngle { degrees: -1.0 })
        );

        assert_eq!(
            AngleLimit::from_deg(0.0).unwrap().radius_to_shortest_edge_limit(),
            f64::INFINITY
        );
    }

    #[test]
    fn test_zero_angle_limit_dbg() {
        let limit = AngleLimit::from_deg(0.0).unwrap();
        let debug_string = format!("{:?}", limit);
        assert_eq!(debug_string, "AngleLimit { angle limit (deg): 0.0 }");
    }

    #[test]
    fn test_square_is_left_alone() {
        // The square's native 90°/45° angles already satisfy both limits; no
        // steiner point may be added.
        for angle in [0.0, 20.0] {
            let mut mesh = Mesh::bulk_load(unit_square()).unwrap();
            let result = mesh.refine(
                RefinementParameters::new()
                    .with_angle_limit(AngleLimit::from_deg(angle).unwrap()),
            );

            assert!(result.refinement_complete);
            assert_eq!(result.steiner_points_added, 0);
            assert_eq!(mesh.num_vertices(), 4);
            assert_eq!(mesh.num_undirected_edges(), 5);
            assert_eq!(mesh.num_triangles(), 2);
        }
    }

    #[test]
    fn test_refinement_improves_angles() {
        let points = random_points_with_seed(60, SEED);
        let mut mesh = Mesh::bulk_load(points).unwrap();
        let result = mesh.refine(
            RefinementParameters::new().with_angle_limit(AngleLimit::from_deg(25.0).unwrap()),
        );

        assert!(result.refinement_complete);
        assert_eq!(result.remaining_violations, 0);
        assert_delaunay(&mesh);
        for triangle in mesh.triangles() {
            assert!(
                min_angle_deg(triangle.positions()) >= 25.0 - 1.0e-6,
                "triangle {:?} stayed too skinny",
                triangle.positions()
            );
        }
    }

    #[test]
    fn test_refinement_is_idempotent() {
        let points = random_points_with_seed(40, SEED);
        let mut mesh = Mesh::bulk_load(points).unwrap();
        let parameters =
            RefinementParameters::new().with_angle_limit(AngleLimit::from_deg(22.0).unwrap());

        let first = mesh.refine(parameters.clone());
        assert!(first.refinement_complete);

        let second = mesh.refine(parameters);
        assert!(second.refinement_complete);
        assert_eq!(second.steiner_points_added, 0);
    }

    #[test]
    fn test_budget_exhaustion_is_not_an_error() {
        let points = random_points_with_seed(60, SEED);
        let mut mesh = Mesh::bulk_load(points).unwrap();
        let result = mesh.refine(
            RefinementParameters::new()
                .with_angle_limit(AngleLimit::from_deg(30.0).unwrap())
                .with_max_additional_vertices(3),
        );

        assert!(!result.refinement_complete);
        assert!(result.steiner_points_added <= 3);
        assert!(result.remaining_violations > 0);
        // The partially refined mesh is still structurally valid.
        mesh.sanity_check();
        assert_delaunay(&mesh);
    }

    #[test]
    fn test_max_area_refinement() {
        let mut mesh = Mesh::bulk_load(unit_square()).unwrap();
        let result = mesh.refine(
            RefinementParameters::new()
                .with_angle_limit(AngleLimit::from_deg(0.0).unwrap())
                .with_max_allowed_area(0.05),
        );

        assert!(result.refinement_complete);
        for triangle in mesh.triangles() {
            assert!(triangle.area() <= 0.05 + 1.0e-9);
        }
    }

    #[test]
    fn test_constrained_refinement_keeps_holes_empty() {
        let outer = vec![
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(100.0, 100.0),
            Point2::new(0.0, 100.0),
        ];
        let hole = vec![
            Point2::new(40.0, 40.0),
            Point2::new(60.0, 40.0),
            Point2::new(60.0, 60.0),
            Point2::new(40.0, 60.0),
        ];
        let mut mesh = Mesh::bulk_load_constrained(vec![], &[outer, hole]).unwrap();
        let result = mesh.refine(
            RefinementParameters::new().with_angle_limit(AngleLimit::from_deg(25.0).unwrap()),
        );

        assert!(result.refinement_complete);
        let inside_hole =
            |p: Point2<f64>| p.x > 40.0 && p.x < 60.0 && p.y > 40.0 && p.y < 60.0;
        for triangle in mesh.triangles() {
            assert!(!triangle.positions().into_iter().all(inside_hole));
            assert!(min_angle_deg(triangle.positions()) >= 25.0 - 1.0e-6);
        }

        // Every steiner point on a former boundary segment is marked accordingly.
        for vertex in mesh.vertices() {
            if vertex.provenance() == VertexProvenance::Steiner {
                let on_boundary = vertex.position().x == 0.0
                    || vertex.position().x == 100.0
                    || vertex.position().y == 0.0
                    || vertex.position().y == 100.0;
                if on_boundary {
                    assert_eq!(vertex.marker(), VertexMarker::Segment);
                }
            }
        }
    }

    #[test]
    fn test_sharp_input_angle_terminates() {
        // The 5.7° corner between the two long boundary edges cannot be refined
        // away; the concentric shell splits must settle instead of cascading.
        let wedge = vec![
            Point2::new(0.0, 0.0),
            Point2::new(40.0, -2.0),
            Point2::new(40.0, 2.0),
        ];
        let mut mesh = Mesh::bulk_load_constrained(vec![], &[wedge]).unwrap();
        let result = mesh.refine(
            RefinementParameters::new()
                .with_angle_limit(AngleLimit::from_deg(25.0).unwrap())
                .with_max_additional_vertices(500),
        );

        assert!(result.refinement_complete);
        mesh.sanity_check();
    }

    #[test]
    fn test_nearest_power_of_two() {
        assert_eq!(0.25, nearest_power_of_two(0.25));
        assert_eq!(0.25, nearest_power_of_two(0.27));
        assert_eq!(0.5, nearest_power_of_two(0.5));
        assert_eq!(1.0, nearest_power_of_two(0.75));
        assert_eq!(2.0, nearest_power_of_two(1.5));
        assert_eq!(2.0, nearest_power_of_two(2.5));
        assert_eq!(4.0, nearest_power_of_two(3.231));
        assert_eq!(4.0, nearest_power_of_two(4.0));
    }
}
