
use cubecl::prelude::*;

use crate::test_utils::TestFloat;

/// Copies this unit's blocked run out of a global tile.
#[cube]
fn load_blocked<F: Float>(
    tile: &Array<F>,
    items: &mut Array<F>,
    #[comptime] items_per_thread: usize,
) {
    let base = UNIT_POS as usize * items_per_thread;
    #[unroll]
    for i in 0..items_per_thread {
        items[i] = tile[base + i];
    }
}

/// Writes this unit's blocked run back into a global tile.
#[cube]
fn store_blocked<F: Float>(
    items: &Array<F>,
    tile: &mut Array<F>,
    #[comptime] items_per_thread: usize,
) {
    let base = UNIT_POS as usize * items_per_thread;
    #[unroll]
    for i in 0..items_per_thread {
        tile[base + i] = items[i];
    }
}

fn write_flags<F: TestFloat>(dst: &mut [F], flags: &[bool]) {
    assert_eq!(dst.len(), flags.len());
    for (d, &flag) in dst.iter_mut().zip(flags) {
        *d = F::from_f64(if flag { 1.0 } else { 0.0 });
    }
}

fn differs<F: TestFloat>(prev: F, next: F) -> bool {
    prev.into_f64() != next.into_f64()
}

fn sub<F: TestFloat>(item: F, neighbor: F) -> F {
    F::from_f64(item.into_f64() - neighbor.into_f64())
}
