//! Blockcube - block-cooperative adjacent difference for CubeCL.
//!
//! Every unit of a cube holds `items_per_thread` consecutive items of a tile
//! (blocked arrangement). The primitives here look across unit boundaries to
//! flag where runs of items start and end, or to combine each item with its
//! left or right neighbor.
//!
//! # Layers
//!
//! - [`block::BlockAdjacentDifference`] - CUB-shaped adapter that owns its
//!   shared storage and forwards to the backend.
//! - [`cube`] - the backend, free `#[cube]` functions taking an explicit
//!   [`cube::AdjacentDifferenceStorage`].
//! - [`adjacent_ops`] - flag predicates (`NotEqualOp`, `GapOp`, ...) and
//!   difference operators (`SubOp`, `SecondOp`, ...).
//! - [`block_dim`] - compile-time block shapes (`B32`, `B8x8`, ...) and
//!   architecture tags.
//!
//! # Exchange
//!
//! ```text
//!   unit 0          unit 1          unit 2
//! [a0 a1 a2]      [b0 b1 b2]      [c0 c1 c2]
//!        \________/      \________/
//!    left[0]=a2 ──► read by unit 1 for b0's head flag
//!    right[1]=b0 ◄── read by unit 0 for a2's tail flag
//! ```
//!
//! Host code uses [`launch`] to check block shapes against the device and
//! [`reference`] as a sequential model of each primitive.

#![allow(clippy::needless_range_loop)]

pub mod adjacent_ops;
pub mod block;
pub mod block_dim;
pub mod cube;
pub mod error;
pub mod launch;
pub mod reference;

#[cfg(any(test, feature = "test-utils"))]
#[macro_use]
pub mod test_utils;

/// Maximum per-unit item count to unconditionally unroll
pub const UNROLL_LIMIT: usize = 8;

pub mod prelude {
    #[cfg(test)]
    pub use crate::test_kernel;
    pub use crate::{
        UNROLL_LIMIT,
        adjacent_ops::*,
        block::BlockAdjacentDifference,
        block_dim::*,
        cube::{self, AdjacentDifferenceStorage},
        error::BlockError,
    };
}
