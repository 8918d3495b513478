//! Host helpers for launching kernels built on the block primitives.
//!
//! Device code can't report a bad block shape, so these check it against the
//! device up front and turn runtime failures into [`BlockError`]s.

use cubecl::prelude::*;
use tracing::{debug, trace, warn};

use crate::{
    block_dim::BlockDim,
    error::{BlockError, Result},
};

/// Per-cube limits of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    pub max_units: usize,
    pub max_x: usize,
    pub max_y: usize,
    pub max_z: usize,
}

impl DeviceLimits {
    pub fn of<R: Runtime>(client: &ComputeClient<R>) -> Self {
        let hardware = &client.properties().hardware;
        Self {
            max_units: hardware.max_units_per_cube as usize,
            max_x: hardware.max_cube_dim.0 as usize,
            max_y: hardware.max_cube_dim.1 as usize,
            max_z: hardware.max_cube_dim.2 as usize,
        }
    }

    /// Validates an `x * y * z` block against these limits.
    pub fn check(&self, x: usize, y: usize, z: usize) -> Result<CubeDim> {
        let units = x * y * z;
        if units == 0 {
            warn!(x, y, z, "rejecting empty block shape");
            return Err(BlockError::EmptyBlock { x, y, z });
        }

        let axes = [('x', x, self.max_x), ('y', y, self.max_y), ('z', z, self.max_z)];
        for (axis, requested, max) in axes {
            if requested > max {
                warn!(%axis, requested, max, "block extent over device limit");
                return Err(BlockError::DimensionTooLarge {
                    axis,
                    requested,
                    max,
                });
            }
        }

        if units > self.max_units {
            warn!(units, max = self.max_units, "block over device unit limit");
            return Err(BlockError::TooManyUnits {
                requested: units,
                max: self.max_units,
            });
        }

        Ok(CubeDim::new_3d(x as u32, y as u32, z as u32))
    }
}

/// Checks `B` against the device behind `client` and returns its launch dims.
pub fn check_block_dim<B: BlockDim, R: Runtime>(client: &ComputeClient<R>) -> Result<CubeDim> {
    let limits = DeviceLimits::of(client);
    debug!(
        x = B::X,
        y = B::Y,
        z = B::Z,
        ?limits,
        "checking block shape against device"
    );
    limits.check(B::X, B::Y, B::Z)
}

/// Items in one full tile of `B` with `items_per_thread` items per unit.
pub fn tile_len<B: BlockDim>(items_per_thread: usize) -> Result<usize> {
    if items_per_thread == 0 {
        return Err(BlockError::ZeroItemsPerThread);
    }
    Ok(B::tile_len(items_per_thread))
}

/// Checks that a host buffer is exactly one tile.
pub fn check_tile<B: BlockDim>(len: usize, items_per_thread: usize) -> Result<()> {
    let expected = tile_len::<B>(items_per_thread)?;
    if len != expected {
        return Err(BlockError::TileLength {
            expected,
            actual: len,
        });
    }
    trace!(len, items_per_thread, threads = B::THREADS, "tile ok");
    Ok(())
}

pub fn wait_for_sync<R: Runtime>(client: &ComputeClient<R>) -> Result<()> {
    pollster::block_on(client.sync())?;
    Ok(())
}
