mod common;

use proptest::prelude::*;
use rand::Rng;

use sbm_blockmodel::{BlockState, BlockStateConfig, CovariateKind, CovariatePrior, DegreeDlKind, EntropyArgs, MoveEntrySet, StateInit};
use sbm_core::{GraphView, RngHandle, NULL_GROUP};
use sbm_graph::Multigraph;

use common::{assert_consistent, assert_move_delta, init_logging, plain_config, random_graph, random_partition};

fn dl_kind(i: u8) -> DegreeDlKind {
    match i % 3 {
        0 => DegreeDlKind::Entropy,
        1 => DegreeDlKind::Uniform,
        _ => DegreeDlKind::Distributed,
    }
}

fn run_moves(g: &Multigraph, mut state: BlockState, ea: &EntropyArgs, steps: usize, rng: &mut RngHandle) {
    let n = state.b().len();
    for _ in 0..steps {
        let v = rng.gen_range(0..n);
        let nr = rng.gen_range(0..state.num_blocks());
        state = assert_move_delta(&state, g, v, nr, ea);
        assert_consistent(&state, g);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn sparse_deltas_match_recomputation(
        seed in any::<u64>(),
        directed in any::<bool>(),
        deg_corr in any::<bool>(),
        exact in any::<bool>(),
        multigraph in any::<bool>(),
        kind in any::<u8>(),
    ) {
        init_logging();
        let g = random_graph(seed, 14, 30, directed);
        let mut rng = RngHandle::from_seed(seed ^ 0x5eed);
        let b = random_partition(14, 4, &mut rng);
        let mut state = BlockState::new(&g, b, plain_config(deg_corr)).unwrap();
        state.add_block(1);
        let ea = EntropyArgs {
            exact,
            multigraph,
            degree_dl_kind: dl_kind(kind),
            ..EntropyArgs::default()
        };
        run_moves(&g, state, &ea, 12, &mut rng);
    }

    #[test]
    fn dense_deltas_match_recomputation(
        seed in any::<u64>(),
        directed in any::<bool>(),
        multigraph in any::<bool>(),
    ) {
        let g = random_graph(seed, 12, 24, directed);
        let mut rng = RngHandle::from_seed(seed.wrapping_add(1));
        let b = random_partition(12, 3, &mut rng);
        let mut state = BlockState::new(&g, b, plain_config(false)).unwrap();
        state.add_block(1);
        let ea = EntropyArgs {
            dense: true,
            multigraph,
            ..EntropyArgs::default()
        };
        run_moves(&g, state, &ea, 10, &mut rng);
    }
}

#[test]
fn dense_entries_commit_without_stale_block_edges() {
    let g = random_graph(41, 12, 26, false);
    let mut rng = RngHandle::from_seed(41);
    let b = random_partition(12, 3, &mut rng);
    let mut state = BlockState::new(&g, b, plain_config(false)).unwrap();
    let ea = EntropyArgs {
        dense: true,
        ..EntropyArgs::default()
    };
    let mut m = MoveEntrySet::new(false, 0);
    for _ in 0..20 {
        let v = rng.gen_range(0..12);
        let (r, nr) = (state.b()[v], rng.gen_range(0..3));
        let before = state.entropy(&g, &ea, true).unwrap();
        let ds = state.virtual_move_entries(&g, v, r, nr, &ea, &mut m).unwrap();
        state.move_vertex_entries(&g, v, nr, &m);
        assert_consistent(&state, &g);
        let after = state.entropy(&g, &ea, true).unwrap();
        assert!((after - before - ds).abs() < 1e-8, "{v}: {r} -> {nr}");

        let fresh = BlockState::new(&g, state.b().to_vec(), plain_config(false)).unwrap();
        assert_eq!(state.block_graph().edges().count(), fresh.block_graph().edges().count());
    }
}

#[test]
fn insertion_and_removal_match_recomputation() {
    init_logging();
    for directed in [false, true] {
        let g = random_graph(11, 10, 22, directed);
        let mut rng = RngHandle::from_seed(3);
        let b = random_partition(10, 3, &mut rng);
        let ea = EntropyArgs::default();
        let mut state = BlockState::new(&g, b.clone(), plain_config(true)).unwrap();
        for v in [0, 4, 7] {
            state = assert_move_delta(&state, &g, v, NULL_GROUP, &ea);
            assert_consistent(&state, &g);
        }
        assert_eq!(state.b()[4], NULL_GROUP);
        for v in [4, 0, 7] {
            state = assert_move_delta(&state, &g, v, b[v], &ea);
            assert_consistent(&state, &g);
        }
        let fresh = BlockState::new(&g, b.clone(), plain_config(true)).unwrap();
        let s0 = fresh.entropy(&g, &ea, true).unwrap();
        let s1 = state.entropy(&g, &ea, true).unwrap();
        assert!((s0 - s1).abs() < 1e-9);
    }
}

#[test]
fn covariate_deltas_match_recomputation() {
    for kind in [CovariateKind::Count, CovariateKind::SignedReal] {
        let mut g = random_graph(23, 12, 30, false);
        let mut rng = RngHandle::from_seed(8);
        let values: Vec<f64> = (0..g.num_edges())
            .map(|_| match kind {
                CovariateKind::Count => rng.gen_range(0..6) as f64,
                _ => rng.gen_range(-2.0..2.0),
            })
            .collect();
        g.add_covariate_channel(values).unwrap();
        let cfg = BlockStateConfig {
            rec_types: vec![kind],
            ..BlockStateConfig::default()
        };
        let b = random_partition(12, 3, &mut rng);
        let state = BlockState::new(&g, b, cfg).unwrap();
        run_moves(&g, state, &EntropyArgs::default(), 15, &mut rng);
    }
}

fn labelled_path(values: [f64; 2]) -> Multigraph {
    let mut g = Multigraph::from_edges(3, false, &[(0, 1), (0, 2)]).unwrap();
    g.add_covariate_channel(values.to_vec()).unwrap();
    g
}

#[test]
fn covariate_sums_follow_a_label_swap() {
    // moving 0 into block 1 swaps which edge sits on pair (0, 1): the
    // multiplicity and record count stay put, the sums do not
    let g = labelled_path([1.0, 5.0]);
    let cfg = BlockStateConfig {
        rec_types: vec![CovariateKind::SignedReal],
        ..BlockStateConfig::default()
    };
    let ea = EntropyArgs::default();
    let mut state = BlockState::new(&g, vec![0, 0, 1], cfg.clone()).unwrap();
    let before = state.entropy(&g, &ea, true).unwrap();
    let ds = state.virtual_move(&g, 0, 0, 1, &ea).unwrap();
    state.move_vertex(&g, 0, 1).unwrap();
    assert_consistent(&state, &g);

    let fresh = BlockState::new(&g, vec![1, 0, 1], cfg).unwrap();
    let after = state.entropy(&g, &ea, true).unwrap();
    assert!((after - fresh.entropy(&g, &ea, true).unwrap()).abs() < 1e-9);
    assert!((after - before - ds).abs() < 1e-9);
}

#[test]
fn configured_priors_reach_the_likelihood() {
    let g = labelled_path([1.0, 5.0]);
    let ea = EntropyArgs::default();
    let with_prior = |prior: Option<CovariatePrior>| {
        let cfg = BlockStateConfig {
            rec_types: vec![CovariateKind::SignedReal],
            rec_priors: prior.into_iter().collect(),
            ..BlockStateConfig::default()
        };
        let state = BlockState::new(&g, vec![0, 0, 1], cfg).unwrap();
        (state.entropy(&g, &ea, true).unwrap(), state.virtual_move(&g, 1, 0, 1, &ea).unwrap())
    };
    let (s_default, ds_default) = with_prior(None);
    let (s_tight, ds_tight) = with_prior(Some(CovariatePrior {
        kappa: 50.0,
        ..CovariatePrior::default()
    }));
    assert!((s_default - s_tight).abs() > 1e-6);
    assert!((ds_default - ds_tight).abs() > 1e-6);
}

#[test]
fn edge_check_recounts_covariate_sums() {
    let cfg = BlockStateConfig {
        rec_types: vec![CovariateKind::SignedReal],
        ..BlockStateConfig::default()
    };
    let g = labelled_path([1.0, 5.0]);
    let state = BlockState::new(&g, vec![0, 0, 1], cfg).unwrap();
    state.check_edge_counts(&g).unwrap();

    let other = labelled_path([1.0, 4.0]);
    let err = state.check_edge_counts(&other).unwrap_err();
    assert_eq!(err.code(), "brec-mismatch");
}

#[test]
fn weighted_deltas_match_recomputation() {
    let mut g = Multigraph::new(8, false);
    let edges = [(0, 1, 3), (1, 2, 1), (2, 3, 2), (3, 3, 2), (4, 5, 1), (5, 6, 4), (6, 7, 1), (7, 0, 2), (2, 6, 1)];
    for (u, v, w) in edges {
        g.add_weighted_edge(u, v, w).unwrap();
    }
    let init = StateInit {
        b: vec![0, 0, 1, 1, 2, 2, 0, 1],
        vweight: Some(vec![1, 2, 1, 3, 1, 1, 2, 1]),
        bclabel: None,
        pclabel: None,
    };
    let cfg = BlockStateConfig {
        is_weighted: true,
        ..BlockStateConfig::default()
    };
    let state = BlockState::from_init(&g, init, cfg).unwrap();
    assert_eq!(state.total_weight(), 12);
    assert_eq!(state.num_edges(), 17);
    assert_consistent(&state, &g);
    let mut rng = RngHandle::from_seed(19);
    run_moves(&g, state, &EntropyArgs::default(), 15, &mut rng);
}

#[test]
fn statistics_cells_match_recomputation() {
    let g = random_graph(5, 12, 26, true);
    let mut rng = RngHandle::from_seed(5);
    let init = StateInit {
        b: random_partition(12, 4, &mut rng),
        vweight: None,
        bclabel: None,
        pclabel: Some((0..12).map(|v| v % 2).collect()),
    };
    let state = BlockState::from_init(&g, init, plain_config(true)).unwrap();
    assert_eq!(state.partition_stats().len(), 2);
    run_moves(&g, state, &EntropyArgs::default(), 15, &mut rng);
}

#[test]
fn scaled_and_disabled_terms_match_recomputation() {
    let g = random_graph(77, 10, 20, false);
    let mut rng = RngHandle::from_seed(77);
    let b = random_partition(10, 3, &mut rng);
    let state = BlockState::new(&g, b, plain_config(true)).unwrap();
    let ea = EntropyArgs {
        partition_dl: false,
        deg_entropy: false,
        beta_dl: 0.5,
        ..EntropyArgs::default()
    };
    run_moves(&g, state, &ea, 10, &mut rng);
}

#[test]
fn self_move_and_weightless_vertex_are_free() {
    let g = Multigraph::from_edges(4, false, &[(0, 1), (1, 2)]).unwrap();
    let state = BlockState::new(&g, vec![0, 0, 1, 1], plain_config(true)).unwrap();
    let ea = EntropyArgs::default();
    assert_eq!(state.virtual_move(&g, 1, 0, 0, &ea).unwrap(), 0.0);
    // vertex 3 carries no edges but still counts in the partition
    assert!(state.virtual_move(&g, 3, 1, 0, &ea).unwrap() != 0.0);
}
