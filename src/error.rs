use std::{error::Error, fmt::Display};

/// The error type used when creating or refining a triangulation.
///
/// All validation happens up front: an `Err` from any construction entry point
/// means that no mesh was built and nothing was mutated.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug)]
pub enum TriangulationError {
    /// A coordinate value was NaN or infinite.
    NanCoordinate,

    /// The absolute value of a coordinate was smaller than
    /// [crate::MIN_ALLOWED_VALUE] but not zero.
    CoordinateTooSmall,

    /// The absolute value of a coordinate was larger than
    /// [crate::MAX_ALLOWED_VALUE].
    CoordinateTooLarge,

    /// Two input points had exactly coincident coordinates.
    ///
    /// Carries the position of the second occurrence in the input sequence.
    DuplicatePoint {
        /// Index into the input point sequence.
        index: usize,
    },

    /// Fewer than three input points were supplied.
    TooFewPoints {
        /// The number of points that were supplied.
        found: usize,
    },

    /// All input points lie on a single line - no triangulation exists.
    AllPointsCollinear,

    /// The minimum angle was outside the supported range of `[0°, 34°]`.
    ///
    /// Delaunay refinement cannot guarantee termination above the theoretical
    /// bound of roughly 33 degrees.
    InvalidMinAngle {
        /// The rejected angle, in degrees.
        degrees: f64,
    },

    /// A boundary loop had fewer than three distinct corners.
    DegenerateLoop {
        /// Index of the offending loop in the input sequence.
        loop_index: usize,
    },

    /// A boundary loop encloses no area.
    ZeroAreaLoop {
        /// Index of the offending loop in the input sequence.
        loop_index: usize,
    },

    /// Two boundary segments cross each other.
    SelfIntersectingBoundary,
}

impl Display for TriangulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriangulationError::NanCoordinate => write!(f, "coordinate is NaN or infinite"),
            TriangulationError::CoordinateTooSmall => {
                write!(f, "coordinate magnitude below the supported minimum")
            }
            TriangulationError::CoordinateTooLarge => {
                write!(f, "coordinate magnitude above the supported maximum")
            }
            TriangulationError::DuplicatePoint { index } => {
                write!(f, "input point {} coincides with an earlier point", index)
            }
            TriangulationError::TooFewPoints { found } => {
                write!(f, "at least 3 points are required, got {}", found)
            }
            TriangulationError::AllPointsCollinear => {
                write!(f, "all input points are collinear")
            }
            TriangulationError::InvalidMinAngle { degrees } => {
                write!(f, "minimum angle {}° is outside [0°, 34°]", degrees)
            }
            TriangulationError::DegenerateLoop { loop_index } => {
                write!(f, "boundary loop {} has fewer than 3 corners", loop_index)
            }
            TriangulationError::ZeroAreaLoop { loop_index } => {
                write!(f, "boundary loop {} encloses no area", loop_index)
            }
            TriangulationError::SelfIntersectingBoundary => {
                write!(f, "boundary segments intersect each other")
            }
        }
    }
}

impl Error for TriangulationError {}
