#![allow(dead_code)]

use rand::Rng;

use sbm_blockmodel::{BlockState, BlockStateConfig, EntropyArgs};
use sbm_core::{GraphView, RngHandle, NULL_GROUP};
use sbm_graph::{random_multigraph, Multigraph};

pub const TOL: f64 = 1e-6;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn random_graph(seed: u64, n: usize, m: usize, directed: bool) -> Multigraph {
    let mut rng = RngHandle::from_seed(seed);
    random_multigraph(n, m, directed, &mut rng).unwrap()
}

/// Random partition using every block id below `b` when `n >= b`.
pub fn random_partition<R: Rng + ?Sized>(n: usize, b: usize, rng: &mut R) -> Vec<usize> {
    (0..n)
        .map(|v| if v < b { v } else { rng.gen_range(0..b) })
        .collect()
}

pub fn plain_config(deg_corr: bool) -> BlockStateConfig {
    BlockStateConfig {
        deg_corr,
        ..BlockStateConfig::default()
    }
}

pub fn sparse_args(exact: bool) -> EntropyArgs {
    EntropyArgs {
        exact,
        ..EntropyArgs::default()
    }
}

/// Compares `virtual_move` with the entropy difference of committing the
/// move on a copy; returns the copy.
pub fn assert_move_delta<G: GraphView + ?Sized>(
    state: &BlockState,
    g: &G,
    v: usize,
    nr: usize,
    ea: &EntropyArgs,
) -> BlockState {
    let r = state.b()[v];
    let before = state.entropy(g, ea, true).unwrap();
    let ds = state.virtual_move(g, v, r, nr, ea).unwrap();
    let mut moved = state.deep_copy();
    if nr == NULL_GROUP {
        moved.remove_vertex(g, v).unwrap();
    } else if r == NULL_GROUP {
        moved.add_vertex(g, v, nr).unwrap();
    } else {
        moved.move_vertex(g, v, nr).unwrap();
    }
    let after = moved.entropy(g, ea, true).unwrap();
    let full = after - before;
    assert!(
        (ds - full).abs() <= TOL * (1.0 + full.abs()),
        "vertex {v}: {r} -> {nr}: virtual {ds} vs recomputed {full}"
    );
    moved
}

pub fn assert_consistent<G: GraphView + ?Sized>(state: &BlockState, g: &G) {
    state.check_edge_counts(g).unwrap();
    state.check_node_counts().unwrap();
}
