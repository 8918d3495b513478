//! Finds run boundaries in a sorted key array spread over several tiles.
//!
//! Each cube flags heads and tails for its own tile. The neighboring tiles'
//! edge keys are passed in as boundary items, so runs that straddle a tile
//! boundary are not split.
//!
//! ```text
//! RUST_LOG=debug cargo run --example run_boundaries --features test-utils,cuda
//! ```

use blockcube::{
    error::{BlockError, Result as BlockResult},
    launch::{check_block_dim, check_tile, tile_len, wait_for_sync},
    prelude::*,
    reference,
    test_utils::{TestRuntime, client, download, upload},
};
use cubecl::prelude::*;
use rand::{RngExt, SeedableRng, rngs::StdRng};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

type Block = B64;
const ITEMS: usize = 4;
const TILES: usize = 4;

#[cube(launch)]
fn run_boundaries<F: Float, B: BlockDim>(
    keys: &Array<F>,
    heads: &mut Array<F>,
    tails: &mut Array<F>,
    #[comptime] items: usize,
) {
    let tile = comptime!(B::THREADS * items);
    let tile_start = CUBE_POS as usize * tile;
    let base = tile_start + UNIT_POS as usize * items;

    let mut local = Array::<F>::new(items);
    #[unroll]
    for i in 0..items {
        local[i] = keys[base + i];
    }

    // The outermost tiles get a key that can't continue their run
    let mut predecessor = keys[0] - F::from_int(1);
    if tile_start > 0 {
        predecessor = keys[tile_start - 1];
    }
    let mut successor = keys[keys.len() - 1] + F::from_int(1);
    if tile_start + tile < keys.len() {
        successor = keys[tile_start + tile];
    }

    let mut head_flags = Array::<F>::new(items);
    let mut tail_flags = Array::<F>::new(items);
    let mut adj = BlockAdjacentDifference::<F, B, AnyArch>::new();
    adj.flag_heads_and_tails_with_boundaries::<F, NotEqualOp>(
        &mut head_flags,
        predecessor,
        &mut tail_flags,
        successor,
        &local,
        NotEqualOp,
        items,
    );

    #[unroll]
    for i in 0..items {
        heads[base + i] = head_flags[i];
        tails[base + i] = tail_flags[i];
    }
}

/// Sorted keys made of runs between 1 and 12 items long.
fn sorted_keys(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut keys = Vec::with_capacity(len);
    let mut key = 0.0f32;
    while keys.len() < len {
        let run = rng.random_range(1..=12usize).min(len - keys.len());
        keys.extend(std::iter::repeat_n(key, run));
        key += 1.0;
    }
    keys
}

fn main() -> BlockResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = client();
    let cube_dim = check_block_dim::<Block, TestRuntime>(&client)?;
    let tile = tile_len::<Block>(ITEMS)?;
    let len = tile * TILES;

    let keys = sorted_keys(len, 42);
    for chunk in keys.chunks(tile) {
        check_tile::<Block>(chunk.len(), ITEMS)?;
    }
    debug!(len, tile, tiles = TILES, "generated keys");

    let keys_handle = upload(&client, &keys);
    let heads_handle = upload(&client, &vec![0.0f32; len]);
    let tails_handle = upload(&client, &vec![0.0f32; len]);

    unsafe {
        run_boundaries::launch::<f32, Block, TestRuntime>(
            &client,
            CubeCount::Static(TILES as u32, 1, 1),
            cube_dim,
            ArrayArg::from_raw_parts::<f32>(&keys_handle, len, 1),
            ArrayArg::from_raw_parts::<f32>(&heads_handle, len, 1),
            ArrayArg::from_raw_parts::<f32>(&tails_handle, len, 1),
            ITEMS,
        )
        .map_err(BlockError::launch)?;
    }
    wait_for_sync(&client)?;

    let heads: Vec<f32> = download(&client, heads_handle);
    let tails: Vec<f32> = download(&client, tails_handle);

    let expected_heads = reference::flag_heads(&keys, None, |a, b| a != b);
    let expected_tails = reference::flag_tails(&keys, None, |a, b| a != b);
    let mismatches = heads
        .iter()
        .zip(&expected_heads)
        .chain(tails.iter().zip(&expected_tails))
        .filter(|&(&got, &want)| (got == 1.0) != want)
        .count();

    let starts: Vec<usize> = (0..len).filter(|&i| heads[i] == 1.0).collect();
    let ends: Vec<usize> = (0..len).filter(|&i| tails[i] == 1.0).collect();
    info!(runs = starts.len(), mismatches, "flagged run boundaries");

    for (start, end) in starts.iter().zip(&ends).take(8) {
        println!("key {:>4}: [{start}, {end}]", keys[*start]);
    }
    if starts.len() > 8 {
        println!("... {} more runs", starts.len() - 8);
    }

    if mismatches > 0 {
        println!("{mismatches} flags differ from the host reference");
    }
    Ok(())
}
