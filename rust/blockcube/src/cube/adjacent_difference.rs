//! Block-wide adjacent difference over a blocked arrangement.
//!
//! Unit `u` owns block positions `u * items_per_thread .. (u + 1) * items_per_thread`.
//! Neighbors inside a unit's own run are read straight from its array. The two
//! items that cross a unit boundary go through [`AdjacentDifferenceStorage`]:
//! every unit publishes its last item (for its successor) and/or its first item
//! (for its predecessor), then one `sync_cube()` makes them visible.
//!
//! All functions here are collective: every unit of the cube must call them
//! with the same `items_per_thread`. Reusing a storage for a second operation
//! needs a `sync_cube()` in between, otherwise a fast unit may overwrite a slot
//! its neighbor has not read yet.

use std::marker::PhantomData;

use cubecl::prelude::*;

use crate::{
    UNROLL_LIMIT,
    adjacent_ops::{DifferenceOp, DifferenceOpExpand, FlagOp, FlagOpExpand},
    block_dim::BlockDim,
};

/// Shared scratch for exchanging boundary items between neighboring units.
///
/// `left[u]` holds the last item of unit `u` (read by `u + 1`),
/// `right[u]` holds the first item of unit `u` (read by `u - 1`).
#[derive(CubeType)]
pub struct AdjacentDifferenceStorage<T: Numeric, B: BlockDim> {
    left: SharedMemory<T>,
    right: SharedMemory<T>,
    #[cube(comptime)]
    _phantom: PhantomData<B>,
}

#[cube]
impl<T: Numeric, B: BlockDim> AdjacentDifferenceStorage<T, B> {
    /// Allocates one slot per unit in each direction.
    /// Call once at kernel entry, all units share the result.
    pub fn new() -> AdjacentDifferenceStorage<T, B> {
        AdjacentDifferenceStorage::<T, B> {
            left: SharedMemory::new(comptime!(B::THREADS)),
            right: SharedMemory::new(comptime!(B::THREADS)),
            _phantom: PhantomData,
        }
    }
}

impl<T: Numeric, B: BlockDim> Default for AdjacentDifferenceStorage<T, B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of a unit's last item. Rejects empty per-unit arrays while the
/// kernel is expanded.
pub const fn last_item(items_per_thread: usize) -> usize {
    assert!(items_per_thread > 0, "items_per_thread must be greater than 0");
    items_per_thread - 1
}

#[cube]
fn flag_of<FlagT: Numeric>(flag: bool) -> FlagT {
    if flag {
        FlagT::from_int(1)
    } else {
        FlagT::from_int(0)
    }
}

/// Publishes this unit's last item for its successor.
#[cube]
fn publish_last<T: Numeric, B: BlockDim>(
    input: &Array<T>,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    storage.left[UNIT_POS as usize] = input[comptime!(last_item(items_per_thread))];
}

/// Publishes this unit's first item for its predecessor.
#[cube]
fn publish_first<T: Numeric, B: BlockDim>(
    input: &Array<T>,
    storage: &mut AdjacentDifferenceStorage<T, B>,
) {
    storage.right[UNIT_POS as usize] = input[0];
}

/// Head flags for positions `1..items_per_thread` of this unit.
#[cube]
fn flag_inner_heads<T: Numeric, FlagT: Numeric, Op: FlagOp<T>>(
    head_flags: &mut Array<FlagT>,
    input: &Array<T>,
    flag_op: &Op,
    #[comptime] items_per_thread: usize,
) {
    #[unroll(items_per_thread <= UNROLL_LIMIT)]
    for i in 1..items_per_thread {
        head_flags[i] = flag_of::<FlagT>(flag_op.flag(input[i - 1], input[i]));
    }
}

/// Tail flags for positions `0..items_per_thread - 1` of this unit.
#[cube]
fn flag_inner_tails<T: Numeric, FlagT: Numeric, Op: FlagOp<T>>(
    tail_flags: &mut Array<FlagT>,
    input: &Array<T>,
    flag_op: &Op,
    #[comptime] items_per_thread: usize,
) {
    let last = comptime!(last_item(items_per_thread));
    #[unroll(items_per_thread <= UNROLL_LIMIT)]
    for i in 0..last {
        tail_flags[i] = flag_of::<FlagT>(flag_op.flag(input[i], input[i + 1]));
    }
}

/// Head flag of this unit's first item. The block's first item is
/// compared against `tile_predecessor_item` when `has_predecessor` is set,
/// otherwise it is always a head.
#[cube]
fn flag_first_head<T: Numeric, FlagT: Numeric, Op: FlagOp<T>, B: BlockDim>(
    head_flags: &mut Array<FlagT>,
    input: &Array<T>,
    flag_op: &Op,
    storage: &AdjacentDifferenceStorage<T, B>,
    tile_predecessor_item: T,
    #[comptime] has_predecessor: bool,
) {
    let tid = UNIT_POS as usize;
    if tid == 0 {
        if comptime!(has_predecessor) {
            head_flags[0] = flag_of::<FlagT>(flag_op.flag(tile_predecessor_item, input[0]));
        } else {
            head_flags[0] = FlagT::from_int(1);
        }
    } else {
        head_flags[0] = flag_of::<FlagT>(flag_op.flag(storage.left[tid - 1], input[0]));
    }
}

/// Tail flag of this unit's last item. The block's last item is
/// compared against `tile_successor_item` when `has_successor` is set,
/// otherwise it is always a tail.
#[cube]
#[allow(clippy::too_many_arguments)]
fn flag_last_tail<T: Numeric, FlagT: Numeric, Op: FlagOp<T>, B: BlockDim>(
    tail_flags: &mut Array<FlagT>,
    input: &Array<T>,
    flag_op: &Op,
    storage: &AdjacentDifferenceStorage<T, B>,
    tile_successor_item: T,
    #[comptime] has_successor: bool,
    #[comptime] items_per_thread: usize,
) {
    let tid = UNIT_POS as usize;
    let last = comptime!(last_item(items_per_thread));
    if tid == comptime!(B::THREADS - 1) {
        if comptime!(has_successor) {
            tail_flags[last] = flag_of::<FlagT>(flag_op.flag(input[last], tile_successor_item));
        } else {
            tail_flags[last] = FlagT::from_int(1);
        }
    } else {
        tail_flags[last] = flag_of::<FlagT>(flag_op.flag(input[last], storage.right[tid + 1]));
    }
}

// =============================================================================
// Discontinuity flags
// =============================================================================

/// Flags the first item of every run: `head[i] = flag_op(input[i - 1], input[i])`,
/// and the block's first item is always a head.
#[cube]
pub fn flag_heads<T: Numeric, FlagT: Numeric, Op: FlagOp<T>, B: BlockDim>(
    head_flags: &mut Array<FlagT>,
    input: &Array<T>,
    flag_op: Op,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    publish_last::<T, B>(input, storage, items_per_thread);
    sync_cube();

    flag_first_head::<T, FlagT, Op, B>(head_flags, input, &flag_op, storage, input[0], false);
    flag_inner_heads::<T, FlagT, Op>(head_flags, input, &flag_op, items_per_thread);
}

/// Like [`flag_heads`], but the block's first item is compared against
/// `tile_predecessor_item`, the last item of the previous tile.
#[cube]
pub fn flag_heads_with_predecessor<T: Numeric, FlagT: Numeric, Op: FlagOp<T>, B: BlockDim>(
    head_flags: &mut Array<FlagT>,
    tile_predecessor_item: T,
    input: &Array<T>,
    flag_op: Op,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    publish_last::<T, B>(input, storage, items_per_thread);
    sync_cube();

    flag_first_head::<T, FlagT, Op, B>(
        head_flags,
        input,
        &flag_op,
        storage,
        tile_predecessor_item,
        true,
    );
    flag_inner_heads::<T, FlagT, Op>(head_flags, input, &flag_op, items_per_thread);
}

/// Flags the last item of every run: `tail[i] = flag_op(input[i], input[i + 1])`,
/// and the block's last item is always a tail.
#[cube]
pub fn flag_tails<T: Numeric, FlagT: Numeric, Op: FlagOp<T>, B: BlockDim>(
    tail_flags: &mut Array<FlagT>,
    input: &Array<T>,
    flag_op: Op,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    publish_first::<T, B>(input, storage);
    sync_cube();

    flag_inner_tails::<T, FlagT, Op>(tail_flags, input, &flag_op, items_per_thread);
    flag_last_tail::<T, FlagT, Op, B>(
        tail_flags,
        input,
        &flag_op,
        storage,
        input[0],
        false,
        items_per_thread,
    );
}

/// Like [`flag_tails`], but the block's last item is compared against
/// `tile_successor_item`, the first item of the next tile.
#[cube]
pub fn flag_tails_with_successor<T: Numeric, FlagT: Numeric, Op: FlagOp<T>, B: BlockDim>(
    tail_flags: &mut Array<FlagT>,
    tile_successor_item: T,
    input: &Array<T>,
    flag_op: Op,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    publish_first::<T, B>(input, storage);
    sync_cube();

    flag_inner_tails::<T, FlagT, Op>(tail_flags, input, &flag_op, items_per_thread);
    flag_last_tail::<T, FlagT, Op, B>(
        tail_flags,
        input,
        &flag_op,
        storage,
        tile_successor_item,
        true,
        items_per_thread,
    );
}

/// Shared body of the `flag_heads_and_tails*` family: both boundary items are
/// published before a single barrier.
#[cube]
#[allow(clippy::too_many_arguments)]
fn flag_heads_and_tails_impl<T: Numeric, FlagT: Numeric, Op: FlagOp<T>, B: BlockDim>(
    head_flags: &mut Array<FlagT>,
    tile_predecessor_item: T,
    tail_flags: &mut Array<FlagT>,
    tile_successor_item: T,
    input: &Array<T>,
    flag_op: Op,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] has_predecessor: bool,
    #[comptime] has_successor: bool,
    #[comptime] items_per_thread: usize,
) {
    publish_last::<T, B>(input, storage, items_per_thread);
    publish_first::<T, B>(input, storage);
    sync_cube();

    flag_first_head::<T, FlagT, Op, B>(
        head_flags,
        input,
        &flag_op,
        storage,
        tile_predecessor_item,
        has_predecessor,
    );
    flag_inner_heads::<T, FlagT, Op>(head_flags, input, &flag_op, items_per_thread);

    flag_inner_tails::<T, FlagT, Op>(tail_flags, input, &flag_op, items_per_thread);
    flag_last_tail::<T, FlagT, Op, B>(
        tail_flags,
        input,
        &flag_op,
        storage,
        tile_successor_item,
        has_successor,
        items_per_thread,
    );
}

/// [`flag_heads`] and [`flag_tails`] in one exchange.
#[cube]
pub fn flag_heads_and_tails<T: Numeric, FlagT: Numeric, Op: FlagOp<T>, B: BlockDim>(
    head_flags: &mut Array<FlagT>,
    tail_flags: &mut Array<FlagT>,
    input: &Array<T>,
    flag_op: Op,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    flag_heads_and_tails_impl::<T, FlagT, Op, B>(
        head_flags,
        input[0],
        tail_flags,
        input[0],
        input,
        flag_op,
        storage,
        false,
        false,
        items_per_thread,
    );
}

/// [`flag_heads`] and [`flag_tails_with_successor`] in one exchange.
#[cube]
pub fn flag_heads_and_tails_with_successor<
    T: Numeric,
    FlagT: Numeric,
    Op: FlagOp<T>,
    B: BlockDim,
>(
    head_flags: &mut Array<FlagT>,
    tail_flags: &mut Array<FlagT>,
    tile_successor_item: T,
    input: &Array<T>,
    flag_op: Op,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    flag_heads_and_tails_impl::<T, FlagT, Op, B>(
        head_flags,
        input[0],
        tail_flags,
        tile_successor_item,
        input,
        flag_op,
        storage,
        false,
        true,
        items_per_thread,
    );
}

/// [`flag_heads_with_predecessor`] and [`flag_tails`] in one exchange.
#[cube]
pub fn flag_heads_and_tails_with_predecessor<
    T: Numeric,
    FlagT: Numeric,
    Op: FlagOp<T>,
    B: BlockDim,
>(
    head_flags: &mut Array<FlagT>,
    tile_predecessor_item: T,
    tail_flags: &mut Array<FlagT>,
    input: &Array<T>,
    flag_op: Op,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    flag_heads_and_tails_impl::<T, FlagT, Op, B>(
        head_flags,
        tile_predecessor_item,
        tail_flags,
        input[0],
        input,
        flag_op,
        storage,
        true,
        false,
        items_per_thread,
    );
}

/// [`flag_heads_with_predecessor`] and [`flag_tails_with_successor`] in one exchange.
#[cube]
#[allow(clippy::too_many_arguments)]
pub fn flag_heads_and_tails_with_boundaries<
    T: Numeric,
    FlagT: Numeric,
    Op: FlagOp<T>,
    B: BlockDim,
>(
    head_flags: &mut Array<FlagT>,
    tile_predecessor_item: T,
    tail_flags: &mut Array<FlagT>,
    tile_successor_item: T,
    input: &Array<T>,
    flag_op: Op,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    flag_heads_and_tails_impl::<T, FlagT, Op, B>(
        head_flags,
        tile_predecessor_item,
        tail_flags,
        tile_successor_item,
        input,
        flag_op,
        storage,
        true,
        true,
        items_per_thread,
    );
}

// =============================================================================
// Neighbor differences
// =============================================================================

/// `output[i] = op(input[i], input[i - 1])`. The block's first output is
/// left untouched.
#[cube]
pub fn subtract_left<T: Numeric, O: Numeric, D: DifferenceOp<T, O>, B: BlockDim>(
    input: &Array<T>,
    output: &mut Array<O>,
    op: D,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    let tid = UNIT_POS as usize;
    publish_last::<T, B>(input, storage, items_per_thread);
    sync_cube();

    #[unroll(items_per_thread <= UNROLL_LIMIT)]
    for i in 1..items_per_thread {
        output[i] = op.apply(input[i], input[i - 1]);
    }
    if tid != 0 {
        output[0] = op.apply(input[0], storage.left[tid - 1]);
    }
}

/// Like [`subtract_left`], but the block's first output is
/// `op(input[0], tile_predecessor_item)`.
#[cube]
pub fn subtract_left_with_predecessor<
    T: Numeric,
    O: Numeric,
    D: DifferenceOp<T, O>,
    B: BlockDim,
>(
    input: &Array<T>,
    output: &mut Array<O>,
    op: D,
    tile_predecessor_item: T,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    let tid = UNIT_POS as usize;
    publish_last::<T, B>(input, storage, items_per_thread);
    sync_cube();

    #[unroll(items_per_thread <= UNROLL_LIMIT)]
    for i in 1..items_per_thread {
        output[i] = op.apply(input[i], input[i - 1]);
    }
    if tid == 0 {
        output[0] = op.apply(input[0], tile_predecessor_item);
    } else {
        output[0] = op.apply(input[0], storage.left[tid - 1]);
    }
}

/// Like [`subtract_left`], restricted to the first `valid_items` block positions.
/// Outputs at or beyond `valid_items` are left untouched.
#[cube]
pub fn subtract_left_partial<T: Numeric, O: Numeric, D: DifferenceOp<T, O>, B: BlockDim>(
    input: &Array<T>,
    output: &mut Array<O>,
    op: D,
    valid_items: u32,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    let tid = UNIT_POS as usize;
    let base = tid * items_per_thread;
    let valid = valid_items as usize;
    publish_last::<T, B>(input, storage, items_per_thread);
    sync_cube();

    #[unroll(items_per_thread <= UNROLL_LIMIT)]
    for i in 1..items_per_thread {
        if base + i < valid {
            output[i] = op.apply(input[i], input[i - 1]);
        }
    }
    if tid != 0 && base < valid {
        output[0] = op.apply(input[0], storage.left[tid - 1]);
    }
}

/// [`subtract_left_partial`] with `tile_predecessor_item` as the block's
/// first neighbor.
#[cube]
#[allow(clippy::too_many_arguments)]
pub fn subtract_left_partial_with_predecessor<
    T: Numeric,
    O: Numeric,
    D: DifferenceOp<T, O>,
    B: BlockDim,
>(
    input: &Array<T>,
    output: &mut Array<O>,
    op: D,
    tile_predecessor_item: T,
    valid_items: u32,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    let tid = UNIT_POS as usize;
    let base = tid * items_per_thread;
    let valid = valid_items as usize;
    publish_last::<T, B>(input, storage, items_per_thread);
    sync_cube();

    #[unroll(items_per_thread <= UNROLL_LIMIT)]
    for i in 1..items_per_thread {
        if base + i < valid {
            output[i] = op.apply(input[i], input[i - 1]);
        }
    }
    if base < valid {
        if tid == 0 {
            output[0] = op.apply(input[0], tile_predecessor_item);
        } else {
            output[0] = op.apply(input[0], storage.left[tid - 1]);
        }
    }
}

/// `output[i] = op(input[i], input[i + 1])`. The block's last output is
/// left untouched.
#[cube]
pub fn subtract_right<T: Numeric, O: Numeric, D: DifferenceOp<T, O>, B: BlockDim>(
    input: &Array<T>,
    output: &mut Array<O>,
    op: D,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    let tid = UNIT_POS as usize;
    let last = comptime!(last_item(items_per_thread));
    publish_first::<T, B>(input, storage);
    sync_cube();

    #[unroll(items_per_thread <= UNROLL_LIMIT)]
    for i in 0..last {
        output[i] = op.apply(input[i], input[i + 1]);
    }
    if tid != comptime!(B::THREADS - 1) {
        output[last] = op.apply(input[last], storage.right[tid + 1]);
    }
}

/// Like [`subtract_right`], but the block's last output is
/// `op(input[last], tile_successor_item)`.
#[cube]
pub fn subtract_right_with_successor<
    T: Numeric,
    O: Numeric,
    D: DifferenceOp<T, O>,
    B: BlockDim,
>(
    input: &Array<T>,
    output: &mut Array<O>,
    op: D,
    tile_successor_item: T,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    let tid = UNIT_POS as usize;
    let last = comptime!(last_item(items_per_thread));
    publish_first::<T, B>(input, storage);
    sync_cube();

    #[unroll(items_per_thread <= UNROLL_LIMIT)]
    for i in 0..last {
        output[i] = op.apply(input[i], input[i + 1]);
    }
    if tid == comptime!(B::THREADS - 1) {
        output[last] = op.apply(input[last], tile_successor_item);
    } else {
        output[last] = op.apply(input[last], storage.right[tid + 1]);
    }
}

/// Like [`subtract_right`], restricted to the first `valid_items` block positions.
/// Only items whose successor is also valid are written, so the last valid
/// output and everything after it are left untouched.
#[cube]
pub fn subtract_right_partial<T: Numeric, O: Numeric, D: DifferenceOp<T, O>, B: BlockDim>(
    input: &Array<T>,
    output: &mut Array<O>,
    op: D,
    valid_items: u32,
    storage: &mut AdjacentDifferenceStorage<T, B>,
    #[comptime] items_per_thread: usize,
) {
    let tid = UNIT_POS as usize;
    let last = comptime!(last_item(items_per_thread));
    let base = tid * items_per_thread;
    let valid = valid_items as usize;
    publish_first::<T, B>(input, storage);
    sync_cube();

    #[unroll(items_per_thread <= UNROLL_LIMIT)]
    for i in 0..last {
        if base + i + 1 < valid {
            output[i] = op.apply(input[i], input[i + 1]);
        }
    }
    // `valid_items` may exceed the tile, the last unit has no right neighbor either way
    if tid != comptime!(B::THREADS - 1) && base + last + 1 < valid {
        output[last] = op.apply(input[last], storage.right[tid + 1]);
    }
}
