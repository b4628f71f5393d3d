use num_traits::Float;

use crate::{Point2, Scalar, TriangulationError};

/// The smallest allowed coordinate value greater than zero that can be inserted into a
/// mesh. This value is equal to 2<sup>-142</sup>.
///
/// The *absolute value* of any coordinate must be either zero or greater than or equal
/// to this value. This is a requirement for preventing floating point underflow when
/// calculating exact geometric predicates.

// Implementation note: These numbers come from the paper of Jonathan Richard Shewchuk:
// "The four predicates implemented for this report will not overflow nor underflow if
// their inputs have exponents in the range -[142, 201] and IEEE-745 double precision
// arithmetic is used."
// Source: Adaptive Precision Floating-Point Arithmetic and Fast Robust Geometric Predicates
pub const MIN_ALLOWED_VALUE: f64 = 1.793662034335766e-43; // 1.0 * 2^-142

/// The largest allowed coordinate value that can be inserted into a mesh.
/// This value is equal to 2<sup>201</sup>.
///
/// The *absolute value* of any coordinate must be less than or equal to this value,
/// preventing floating point overflow in the exact predicate evaluation.
pub const MAX_ALLOWED_VALUE: f64 = 3.2138760885179806e60; // 1.0 * 2^201

/// Checks if a coordinate value is suitable for insertion into a mesh.
///
/// Will return an error if and only if
///  - The coordinate is NaN or infinite
///  - The absolute value of the coordinate is too small (See [MIN_ALLOWED_VALUE])
///  - The absolute value of the coordinate is too large (See [MAX_ALLOWED_VALUE])
pub fn validate_coordinate<S: Scalar>(value: S) -> Result<(), TriangulationError> {
    let as_f64: f64 = value.into();
    if as_f64.is_nan() {
        Err(TriangulationError::NanCoordinate)
    } else if as_f64.abs() < MIN_ALLOWED_VALUE && as_f64 != 0.0 {
        Err(TriangulationError::CoordinateTooSmall)
    } else if as_f64.abs() > MAX_ALLOWED_VALUE {
        Err(TriangulationError::CoordinateTooLarge)
    } else {
        Ok(())
    }
}

/// Checks if both coordinates of a point are suitable for insertion into a mesh.
///
/// See [validate_coordinate] for details. Passing in any non-finite value (e.g.
/// `f64::NEG_INFINITY`) results in `Err(TriangulationError::CoordinateTooLarge)`.
pub fn validate_point<S: Scalar>(point: Point2<S>) -> Result<(), TriangulationError> {
    validate_coordinate(point.x)?;
    validate_coordinate(point.y)?;
    Ok(())
}

/// Prevents underflow issues of a position by setting any coordinate that is too small
/// to zero.
///
/// A point returned by this function will never cause
/// [TriangulationError::CoordinateTooSmall]. This is useful if points come from an
/// uncontrollable source like user input. Note that this method will _always_ round
/// towards zero, even if rounding to ±[MIN_ALLOWED_VALUE] would result in a smaller
/// rounding error.
pub fn mitigate_underflow(position: Point2<f64>) -> Point2<f64> {
    Point2::new(
        mitigate_underflow_for_coordinate(position.x),
        mitigate_underflow_for_coordinate(position.y),
    )
}

fn mitigate_underflow_for_coordinate<S: Scalar>(coordinate: S) -> S {
    if coordinate != S::zero() && coordinate.abs().into() < MIN_ALLOWED_VALUE {
        S::zero()
    } else {
        coordinate
    }
}

/// Describes on which side of a directed line a point lies.
///
/// The determinant is evaluated adaptively: a fast floating point path first, with an
/// exact fallback whenever the result is within the rounding error bound of zero.
/// Repeated evaluation of the same query always returns the same answer.
#[derive(Debug, Clone, Copy)]
pub struct LineSideInfo {
    signed_side: f64,
}

impl LineSideInfo {
    #[inline]
    pub(crate) fn from_determinant(s: f64) -> LineSideInfo {
        LineSideInfo { signed_side: s }
    }

    /// Returns `true` if a point lies strictly on the left side of a line.
    pub fn is_on_left_side(&self) -> bool {
        self.signed_side > 0.0
    }

    /// Returns `true` if a point lies strictly on the right side of a line.
    pub fn is_on_right_side(&self) -> bool {
        self.signed_side < 0.0
    }

    /// Returns `true` if a point lies on the left side of a line or on the line itself.
    pub fn is_on_left_side_or_on_line(&self) -> bool {
        self.signed_side >= 0.0
    }

    /// Returns `true` if a point lies exactly on this line.
    #[inline]
    pub fn is_on_line(&self) -> bool {
        self.signed_side == 0.0
    }
}

fn to_robust_coord<S: Scalar>(point: Point2<S>) -> robust::Coord<S> {
    robust::Coord {
        x: point.x,
        y: point.y,
    }
}

/// Classifies `query_point` relative to the directed line from `p1` to `p2`.
pub fn side_query<S: Scalar>(p1: Point2<S>, p2: Point2<S>, query_point: Point2<S>) -> LineSideInfo {
    let p1 = to_robust_coord(p1);
    let p2 = to_robust_coord(p2);
    let query_point = to_robust_coord(query_point);

    let result = robust::orient2d(p1, p2, query_point);
    LineSideInfo::from_determinant(result)
}

/// Returns `true` if `p` lies strictly inside the circumcircle of the counter clockwise
/// oriented triangle `v1`, `v2`, `v3`.
///
/// Cocircular points are classified as "not contained" - together with the fixed
/// insertion order this acts as the tie break that makes cavity construction
/// deterministic.
pub fn contained_in_circumference<S: Scalar>(
    v1: Point2<S>,
    v2: Point2<S>,
    v3: Point2<S>,
    p: Point2<S>,
) -> bool {
    let v1 = to_robust_coord(v1);
    let v2 = to_robust_coord(v2);
    let v3 = to_robust_coord(v3);
    let p = to_robust_coord(p);

    // incircle expects all vertices to be ordered CW for right handed systems.
    // For consistency, the public interface of this method expects the points to be
    // ordered ccw.
    robust::incircle(v3, v2, v1, p) < 0.0
}

/// Returns `true` if `query_point` lies inside or on the diametral circle of the
/// segment between `edge_from` and `edge_to`.
///
/// The diametral circle is closed: a vertex exactly on the circle (one that sees the
/// segment under a right angle) still counts as encroaching.
pub fn encroaches<S: Scalar + Float>(
    edge_from: Point2<S>,
    edge_to: Point2<S>,
    query_point: Point2<S>,
) -> bool {
    let edge_center = edge_from.add(edge_to).mul(0.5f32.into());
    let radius_2 = edge_from.distance_2(edge_to) * 0.25.into();

    query_point.distance_2(edge_center) <= radius_2
}

/// Computes the circumcenter of three points along with the squared circumradius.
pub fn circumcenter<S: Scalar + Float>(positions: [Point2<S>; 3]) -> (Point2<S>, S) {
    let [v0, v1, v2] = positions;
    let b = v1.sub(v0);
    let c = v2.sub(v0);

    let one = S::one();
    let two = one + one;
    let d = two * (b.x * c.y - c.x * b.y);
    let len_b = b.dot(b);
    let len_c = c.dot(c);
    let d_inv: S = one / d;

    let x = (len_b * c.y - len_c * b.y) * d_inv;
    let y = (-len_b * c.x + len_c * b.x) * d_inv;
    let result = Point2::new(x, y);
    (result.add(v0), x * x + y * y)
}

/// Returns the area of the triangle spanned by three points.
pub fn triangle_area<S: Scalar>(positions: [Point2<S>; 3]) -> S {
    let [v0, v1, v2] = positions;
    let b = v1.sub(v0);
    let c = v2.sub(v0);
    (b.x * c.y - b.y * c.x).abs() * 0.5.into()
}

/// Checks whether the closed segments `(f0, t0)` and `(f1, t1)` share any point.
///
/// Used for boundary loop validation. Segments that share an endpoint handle must be
/// filtered by the caller before invoking this.
pub(crate) fn segments_intersect<S: Scalar>(
    f0: Point2<S>,
    t0: Point2<S>,
    f1: Point2<S>,
    t1: Point2<S>,
) -> bool {
    let s0 = side_query(f0, t0, f1);
    let s1 = side_query(f0, t0, t1);
    let s2 = side_query(f1, t1, f0);
    let s3 = side_query(f1, t1, t0);

    if s0.is_on_line() && s1.is_on_line() {
        // All four points collinear - intersect iff the 1d projections overlap.
        let dir = t0.sub(f0);
        let project = |p: Point2<S>| p.sub(f0).dot(dir);
        let (mut a0, mut a1) = (project(f0), project(t0));
        let (mut b0, mut b1) = (project(f1), project(t1));
        if a0 > a1 {
            std::mem::swap(&mut a0, &mut a1);
        }
        if b0 > b1 {
            std::mem::swap(&mut b0, &mut b1);
        }
        return a0 <= b1 && b0 <= a1;
    }

    let straddles_first = (s0.is_on_left_side() && s1.is_on_right_side())
        || (s0.is_on_right_side() && s1.is_on_left_side())
        || s0.is_on_line()
        || s1.is_on_line();
    let straddles_second = (s2.is_on_left_side() && s3.is_on_right_side())
        || (s2.is_on_right_side() && s3.is_on_left_side())
        || s2.is_on_line()
        || s3.is_on_line();

    straddles_first && straddles_second
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Point2;
    use approx::assert_relative_eq;

    #[test]
    fn test_validate_coordinate() {
        use crate::TriangulationError::*;
        assert_eq!(validate_coordinate(f64::NAN), Err(NanCoordinate));
        assert_eq!(validate_coordinate(f64::INFINITY), Err(CoordinateTooLarge));
        assert_eq!(
            validate_coordinate(f64::NEG_INFINITY),
            Err(CoordinateTooLarge)
        );
        assert_eq!(
            validate_coordinate(MAX_ALLOWED_VALUE * 2.0),
            Err(CoordinateTooLarge)
        );
        assert_eq!(
            validate_coordinate(MIN_ALLOWED_VALUE / 2.0),
            Err(CoordinateTooSmall)
        );

        assert_eq!(validate_coordinate(f32::MIN_POSITIVE), Ok(()));
        assert_eq!(validate_coordinate(f32::MAX), Ok(()));
        assert_eq!(validate_coordinate(MIN_ALLOWED_VALUE), Ok(()));
        assert_eq!(validate_coordinate(0.0), Ok(()));
    }

    #[test]
    fn test_mitigate_underflow() {
        let mitigated = mitigate_underflow(Point2::new(1.0e-44, 42.0));
        assert_eq!(mitigated, Point2::new(0.0, 42.0));
        assert_eq!(validate_point(mitigated), Ok(()));

        let untouched = mitigate_underflow(Point2::new(0.25, -0.5));
        assert_eq!(untouched, Point2::new(0.25, -0.5));
    }

    #[test]
    fn test_edge_side() {
        let p1 = Point2::new(0.0, 0.0);
        let p2 = Point2::new(1.0, 1.0);

        assert!(side_query(p1, p2, Point2::new(1.0, 0.0)).is_on_right_side());
        assert!(side_query(p1, p2, Point2::new(0.0, 1.0)).is_on_left_side());
        assert!(side_query(p1, p2, Point2::new(0.5, 0.5)).is_on_line());
    }

    #[test]
    fn test_contained_in_circumference() {
        let v1 = Point2::new(0.0f64, 0.0);
        let v2 = Point2::new(2.0, 0.0);
        let v3 = Point2::new(0.0, 2.0);
        assert!(side_query(v1, v2, v3).is_on_left_side());

        assert!(contained_in_circumference(v1, v2, v3, Point2::new(1.0, 1.0)));
        assert!(!contained_in_circumference(
            v1,
            v2,
            v3,
            Point2::new(3.0, 3.0)
        ));
        // Cocircular - (2.0, 2.0) lies exactly on the circumcircle and must not count.
        assert!(!contained_in_circumference(
            v1,
            v2,
            v3,
            Point2::new(2.0, 2.0)
        ));
    }

    #[test]
    fn test_encroaches() {
        let from = Point2::new(0.0f64, 0.0);
        let to = Point2::new(2.0, 0.0);

        assert!(encroaches(from, to, Point2::new(1.0, 0.5)));
        // A point seeing the segment under a right angle sits exactly on the
        // diametral circle.
        assert!(encroaches(from, to, Point2::new(1.0, 1.0)));
        assert!(!encroaches(from, to, Point2::new(1.0, 1.5)));
    }

    #[test]
    fn test_circumcenter() {
        let (center, radius_2) = circumcenter([
            Point2::new(0.0f64, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(0.0, 2.0),
        ]);
        assert_relative_eq!(center.x, 1.0);
        assert_relative_eq!(center.y, 1.0);
        assert_relative_eq!(radius_2, 2.0);
    }

    #[test]
    fn test_triangle_area() {
        let area = triangle_area([
            Point2::new(0.0f64, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(0.0, 2.0),
        ]);
        assert_relative_eq!(area, 4.0);
    }

    #[test]
    fn test_segments_intersect() {
        let a = Point2::new(0.0f64, 0.0);
        let b = Point2::new(4.0, 4.0);

        assert!(segments_intersect(
            a,
            b,
            Point2::new(0.0, 4.0),
            Point2::new(4.0, 0.0)
        ));
        assert!(!segments_intersect(
            a,
            b,
            Point2::new(3.0, 0.0),
            Point2::new(5.0, 0.0)
        ));
        // Touching counts as intersecting.
        assert!(segments_intersect(
            a,
            b,
            Point2::new(2.0, 2.0),
            Point2::new(2.0, -2.0)
        ));
        // Collinear overlap.
        assert!(segments_intersect(
            a,
            b,
            Point2::new(2.0, 2.0),
            Point2::new(6.0, 6.0)
        ));
        assert!(!segments_intersect(
            a,
            b,
            Point2::new(5.0, 5.0),
            Point2::new(6.0, 6.0)
        ));
    }
}
