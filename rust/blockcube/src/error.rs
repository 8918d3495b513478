use std::fmt::Debug;

use cubecl::server::ExecutionError;

/// Host-side failures when preparing or running a tile.
///
/// Device code has no error channel. Everything here is caught before a
/// launch or reported by the runtime afterwards.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    #[error("block shape {x}x{y}x{z} has no units")]
    EmptyBlock { x: usize, y: usize, z: usize },
    #[error("block has {requested} units, device allows at most {max} per cube")]
    TooManyUnits { requested: usize, max: usize },
    #[error("block extent {requested} on axis {axis} exceeds device limit {max}")]
    DimensionTooLarge {
        axis: char,
        requested: usize,
        max: usize,
    },
    #[error("items_per_thread must be greater than 0")]
    ZeroItemsPerThread,
    #[error("tile holds {actual} items, expected {expected}")]
    TileLength { expected: usize, actual: usize },
    #[error("kernel launch failed: {0}")]
    Launch(String),
    #[error("device sync failed: {0}")]
    Sync(String),
}

impl BlockError {
    /// Wraps a runtime launch error, which only promises `Debug`.
    pub fn launch(err: impl Debug) -> Self {
        Self::Launch(format!("{err:?}"))
    }
}

impl From<ExecutionError> for BlockError {
    fn from(err: ExecutionError) -> Self {
        Self::Sync(format!("{err:?}"))
    }
}

pub type Result<T> = std::result::Result<T, BlockError>;
