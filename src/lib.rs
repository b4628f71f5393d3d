//! # Trowel
//!
//! Trowel computes quality-constrained Delaunay triangulations of planar point
//! sets, optionally bounded by polygon loops with holes, and extracts the Voronoi
//! diagram dual to the finished triangulation.
//!
//! # Features
//! * Incremental Delaunay construction over arbitrary point distributions
//!   ([Mesh::bulk_load])
//! * Constrained triangulations whose boundary and hole segments are guaranteed to
//!   survive as mesh edges ([Mesh::bulk_load_constrained])
//! * Ruppert style mesh refinement driven by a minimum angle and optional area
//!   bounds ([Mesh::refine])
//! * Voronoi dual extraction with explicit handling of unbounded cells
//!   ([Mesh::voronoi])
//! * Numerically robust predicates - all geometric decisions fall back to exact
//!   arithmetic near their error bound and are deterministic across runs
//!
//! # Example
//!
//! ```
//! use trowel::{AngleLimit, Mesh, Point2, RefinementParameters};
//!
//! # fn main() -> Result<(), trowel::TriangulationError> {
//! let points = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(10.0, 0.0),
//!     Point2::new(10.0, 10.0),
//!     Point2::new(0.0, 10.0),
//!     Point2::new(3.0, 4.0),
//! ];
//! let mut mesh = Mesh::bulk_load(points)?;
//! let result = mesh.refine(
//!     RefinementParameters::new().with_angle_limit(AngleLimit::from_deg(25.0)?),
//! );
//! assert!(result.refinement_complete);
//!
//! let voronoi = mesh.voronoi();
//! assert_eq!(voronoi.num_faces(), mesh.num_vertices());
//! # Ok(()) }
//! ```
//!
//! A mesh is exclusively owned and never touches global state: independent meshes
//! can be built in parallel, one per region or tile. Refinement is bounded by a
//! configurable steiner point budget and returns a best effort mesh plus
//! diagnostics when the budget runs out - see [RefinementParameters] and
//! [RefinementResult].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod mesh_core;
mod point;
mod voronoi;

#[cfg(test)]
mod test_utilities;

pub use error::TriangulationError;
pub use mesh_core::math::{
    mitigate_underflow, validate_coordinate, validate_point, MAX_ALLOWED_VALUE, MIN_ALLOWED_VALUE,
};
pub use mesh_core::{
    AngleLimit, ConstraintKind, FixedTriangleHandle, FixedVertexHandle, Mesh,
    RefinementParameters, RefinementResult, TriangleRef, VertexMarker, VertexProvenance,
    VertexRef,
};
pub use point::{Point2, Scalar};
pub use voronoi::{VoronoiDiagram, VoronoiFace};

use num_traits::Float;

/// Builds a Delaunay mesh of a point set and refines it to the given minimum
/// angle, in one call.
///
/// `min_angle_deg` must lie within `[0.0, 34.0]`; passing `0.0` skips angle driven
/// refinement entirely. See [Mesh::bulk_load] and [Mesh::refine] for the two
/// underlying steps and for the finer grained configuration they offer.
pub fn build_mesh<S: Scalar + Float>(
    points: Vec<Point2<S>>,
    min_angle_deg: f64,
) -> Result<Mesh<S>, TriangulationError> {
    let angle_limit = AngleLimit::from_deg(min_angle_deg)?;
    let mut mesh = Mesh::bulk_load(points)?;
    mesh.refine(RefinementParameters::new().with_angle_limit(angle_limit));
    Ok(mesh)
}

/// Builds a constrained Delaunay mesh bounded by polygon loops and refines it to
/// the given minimum angle, in one call.
///
/// The first loop is the outer boundary, all further loops are holes. See
/// [Mesh::bulk_load_constrained] for the constraint semantics.
pub fn build_constrained_mesh<S: Scalar + Float>(
    points: Vec<Point2<S>>,
    boundaries: &[Vec<Point2<S>>],
    min_angle_deg: f64,
) -> Result<Mesh<S>, TriangulationError> {
    let angle_limit = AngleLimit::from_deg(min_angle_deg)?;
    let mut mesh = Mesh::bulk_load_constrained(points, boundaries)?;
    mesh.refine(RefinementParameters::new().with_angle_limit(angle_limit));
    Ok(mesh)
}
