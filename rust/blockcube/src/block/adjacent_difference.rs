//! `BlockAdjacentDifference`, the CUB-shaped entry point.
//!
//! The adapter is a thin wrapper: it owns one [`AdjacentDifferenceStorage`]
//! and forwards every call to the matching function in [`crate::cube`].
//!
//! ```ignore
//! #[cube(launch)]
//! fn mark_runs<F: Float>(keys: &Array<F>, heads: &mut Array<F>) {
//!     let mut items = Array::<F>::new(4);
//!     // ... load this unit's 4 keys ...
//!     let mut adj = BlockAdjacentDifference::<F, B128, AnyArch>::new();
//!     let mut flags = Array::<F>::new(4);
//!     adj.flag_heads(&mut flags, &items, NotEqualOp, 4);
//!     // ... store flags ...
//! }
//! ```

use std::marker::PhantomData;

use cubecl::prelude::*;

use crate::{
    adjacent_ops::{DifferenceOp, FlagOp},
    block_dim::{Arch, BlockDim, BlockPhantom},
    cube::{self, AdjacentDifferenceStorage},
};

/// Block-wide discontinuity flags and neighbor differences.
///
/// `T` is the item type, `B` the block shape and `A` an architecture tag
/// that has no effect on the generated code.
///
/// Every method is collective. Two calls on the same adapter must be
/// separated by [`sync`](Self::sync), since they share one storage region.
#[derive(CubeType)]
pub struct BlockAdjacentDifference<T: Numeric, B: BlockDim, A: Arch> {
    temp_storage: AdjacentDifferenceStorage<T, B>,
    #[cube(comptime)]
    _phantom: BlockPhantom<B, A>,
}

#[cube]
impl<T: Numeric, B: BlockDim, A: Arch> BlockAdjacentDifference<T, B, A> {
    /// Allocates a private storage region for this cube.
    pub fn new() -> BlockAdjacentDifference<T, B, A> {
        BlockAdjacentDifference::<T, B, A> {
            temp_storage: AdjacentDifferenceStorage::<T, B>::new(),
            _phantom: PhantomData,
        }
    }

    /// Binds a caller-allocated storage region.
    pub fn with_storage(
        temp_storage: AdjacentDifferenceStorage<T, B>,
    ) -> BlockAdjacentDifference<T, B, A> {
        BlockAdjacentDifference::<T, B, A> {
            temp_storage,
            _phantom: PhantomData,
        }
    }

    /// Gives the storage region back, e.g. to bind it to another adapter.
    pub fn into_storage(self) -> AdjacentDifferenceStorage<T, B> {
        self.temp_storage
    }

    /// Barrier to place between two operations on this adapter.
    pub fn sync(&self) {
        sync_cube();
    }

    pub fn flag_heads<FlagT: Numeric, Op: FlagOp<T>>(
        &mut self,
        head_flags: &mut Array<FlagT>,
        input: &Array<T>,
        flag_op: Op,
        #[comptime] items_per_thread: usize,
    ) {
        cube::flag_heads::<T, FlagT, Op, B>(
            head_flags,
            input,
            flag_op,
            &mut self.temp_storage,
            items_per_thread,
        );
    }

    pub fn flag_heads_with_predecessor<FlagT: Numeric, Op: FlagOp<T>>(
        &mut self,
        head_flags: &mut Array<FlagT>,
        input: &Array<T>,
        flag_op: Op,
        tile_predecessor_item: T,
        #[comptime] items_per_thread: usize,
    ) {
        cube::flag_heads_with_predecessor::<T, FlagT, Op, B>(
            head_flags,
            tile_predecessor_item,
            input,
            flag_op,
            &mut self.temp_storage,
            items_per_thread,
        );
    }

    pub fn flag_tails<FlagT: Numeric, Op: FlagOp<T>>(
        &mut self,
        tail_flags: &mut Array<FlagT>,
        input: &Array<T>,
        flag_op: Op,
        #[comptime] items_per_thread: usize,
    ) {
        cube::flag_tails::<T, FlagT, Op, B>(
            tail_flags,
            input,
            flag_op,
            &mut self.temp_storage,
            items_per_thread,
        );
    }

    pub fn flag_tails_with_successor<FlagT: Numeric, Op: FlagOp<T>>(
        &mut self,
        tail_flags: &mut Array<FlagT>,
        input: &Array<T>,
        flag_op: Op,
        tile_successor_item: T,
        #[comptime] items_per_thread: usize,
    ) {
        cube::flag_tails_with_successor::<T, FlagT, Op, B>(
            tail_flags,
            tile_successor_item,
            input,
            flag_op,
            &mut self.temp_storage,
            items_per_thread,
        );
    }

    pub fn flag_heads_and_tails<FlagT: Numeric, Op: FlagOp<T>>(
        &mut self,
        head_flags: &mut Array<FlagT>,
        tail_flags: &mut Array<FlagT>,
        input: &Array<T>,
        flag_op: Op,
        #[comptime] items_per_thread: usize,
    ) {
        cube::flag_heads_and_tails::<T, FlagT, Op, B>(
            head_flags,
            tail_flags,
            input,
            flag_op,
            &mut self.temp_storage,
            items_per_thread,
        );
    }

    pub fn flag_heads_and_tails_with_successor<FlagT: Numeric, Op: FlagOp<T>>(
        &mut self,
        head_flags: &mut Array<FlagT>,
        tail_flags: &mut Array<FlagT>,
        tile_successor_item: T,
        input: &Array<T>,
        flag_op: Op,
        #[comptime] items_per_thread: usize,
    ) {
        cube::flag_heads_and_tails_with_successor::<T, FlagT, Op, B>(
            head_flags,
            tail_flags,
            tile_successor_item,
            input,
            flag_op,
            &mut self.temp_storage,
            items_per_thread,
        );
    }

    pub fn flag_heads_and_tails_with_predecessor<FlagT: Numeric, Op: FlagOp<T>>(
        &mut self,
        head_flags: &mut Array<FlagT>,
        tile_predecessor_item: T,
        tail_flags: &mut Array<FlagT>,
        input: &Array<T>,
        flag_op: Op,
        #[comptime] items_per_thread: usize,
    ) {
        cube::flag_heads_and_tails_with_predecessor::<T, FlagT, Op, B>(
            head_flags,
            tile_predecessor_item,
            tail_flags,
            input,
            flag_op,
            &mut self.temp_storage,
            items_per_thread,
        );
    }

    #[allow(clippy::too_many_arguments)]
    pub fn flag_heads_and_tails_with_boundaries<FlagT: Numeric, Op: FlagOp<T>>(
        &mut self,
        head_flags: &mut Array<FlagT>,
        tile_predecessor_item: T,
        tail_flags: &mut Array<FlagT>,
        tile_successor_item: T,
        input: &Array<T>,
        flag_op: Op,
        #[comptime] items_per_thread: usize,
    ) {
        cube::flag_heads_and_tails_with_boundaries::<T, FlagT, Op, B>(
            head_flags,
            tile_predecessor_item,
            tail_flags,
            tile_successor_item,
            input,
            flag_op,
            &mut self.temp_storage,
            items_per_thread,
        );
    }

    /// `output[i] = op(input[i], input[i - 1])`, the block's first output
    /// is left as is.
    pub fn subtract_left<O: Numeric, D: DifferenceOp<T, O>>(
        &mut self,
        input: &Array<T>,
        output: &mut Array<O>,
        op: D,
        #[comptime] items_per_thread: usize,
    ) {
        cube::subtract_left::<T, O, D, B>(
            input,
            output,
            op,
            &mut self.temp_storage,
            items_per_thread,
        );
    }

    pub fn subtract_left_with_predecessor<O: Numeric, D: DifferenceOp<T, O>>(
        &mut self,
        input: &Array<T>,
        output: &mut Array<O>,
        op: D,
        tile_predecessor_item: T,
        #[comptime] items_per_thread: usize,
    ) {
        cube::subtract_left_with_predecessor::<T, O, D, B>(
            input,
            output,
            op,
            tile_predecessor_item,
            &mut self.temp_storage,
            items_per_thread,
        );
    }

    /// Only the first `valid_items` block positions are written.
    pub fn subtract_left_partial<O: Numeric, D: DifferenceOp<T, O>>(
        &mut self,
        input: &Array<T>,
        output: &mut Array<O>,
        op: D,
        valid_items: u32,
        #[comptime] items_per_thread: usize,
    ) {
        cube::subtract_left_partial::<T, O, D, B>(
            input,
            output,
            op,
            valid_items,
            &mut self.temp_storage,
            items_per_thread,
        );
    }

    pub fn subtract_left_partial_with_predecessor<O: Numeric, D: DifferenceOp<T, O>>(
        &mut self,
        input: &Array<T>,
        output: &mut Array<O>,
        op: D,
        tile_predecessor_item: T,
        valid_items: u32,
        #[comptime] items_per_thread: usize,
    ) {
        cube::subtract_left_partial_with_predecessor::<T, O, D, B>(
            input,
            output,
            op,
            tile_predecessor_item,
            valid_items,
            &mut self.temp_storage,
            items_per_thread,
        );
    }

    /// `output[i] = op(input[i], input[i + 1])`, the block's last output
    /// is left as is.
    pub fn subtract_right<O: Numeric, D: DifferenceOp<T, O>>(
        &mut self,
        input: &Array<T>,
        output: &mut Array<O>,
        op: D,
        #[comptime] items_per_thread: usize,
    ) {
        cube::subtract_right::<T, O, D, B>(
            input,
            output,
            op,
            &mut self.temp_storage,
            items_per_thread,
        );
    }

    pub fn subtract_right_with_successor<O: Numeric, D: DifferenceOp<T, O>>(
        &mut self,
        input: &Array<T>,
        output: &mut Array<O>,
        op: D,
        tile_successor_item: T,
        #[comptime] items_per_thread: usize,
    ) {
        cube::subtract_right_with_successor::<T, O, D, B>(
            input,
            output,
            op,
            tile_successor_item,
            &mut self.temp_storage,
            items_per_thread,
        );
    }

    /// Only items whose successor is among the first `valid_items` block
    /// positions are written.
    pub fn subtract_right_partial<O: Numeric, D: DifferenceOp<T, O>>(
        &mut self,
        input: &Array<T>,
        output: &mut Array<O>,
        op: D,
        valid_items: u32,
        #[comptime] items_per_thread: usize,
    ) {
        cube::subtract_right_partial::<T, O, D, B>(
            input,
            output,
            op,
            valid_items,
            &mut self.temp_storage,
            items_per_thread,
        );
    }
}

impl<T: Numeric, B: BlockDim, A: Arch> Default for BlockAdjacentDifference<T, B, A> {
    fn default() -> Self {
        Self::new()
    }
}
