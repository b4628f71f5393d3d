use std::convert::TryInto;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fixed handle to a vertex of a [Mesh](crate::Mesh).
///
/// The handle stays valid for the entire lifetime of the mesh - vertices are
/// never relocated or removed once construction has finished.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde")
)]
pub struct FixedVertexHandle {
    index: u32,
}

/// Fixed handle to a triangle of a [Mesh](crate::Mesh).
///
/// Triangle handles are only stable on a finalized mesh - insertion and
/// refinement reuse triangle slots.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde")
)]
pub struct FixedTriangleHandle {
    index: u32,
}

macro_rules! impl_fixed_handle {
    ($name:ident, $debug_name:literal) => {
        impl $name {
            pub(crate) fn new(index: usize) -> Self {
                Self {
                    index: index
                        .try_into()
                        .expect("Index too big - at most 2^32 elements supported"),
                }
            }

            /// Returns the index of this element within its mesh arena.
            #[inline]
            pub fn index(&self) -> usize {
                self.index as usize
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct($debug_name).field("index", &self.index).finish()
            }
        }
    };
}

impl_fixed_handle!(FixedVertexHandle, "FixedVertexHandle");
impl_fixed_handle!(FixedTriangleHandle, "FixedTriangleHandle");
