mod common;

use proptest::prelude::*;
use rand::Rng;

use sbm_blockmodel::{BlockState, BlockStateConfig, EntropyArgs, MoveEntrySet, StateInit};
use sbm_core::{GraphView, RngHandle, SbmError, NULL_GROUP};
use sbm_graph::{planted_partition, Multigraph};

use common::{assert_consistent, init_logging, plain_config, random_graph, random_partition};

fn all_pairs(state: &BlockState) -> Vec<i64> {
    let b = state.num_blocks();
    (0..b).flat_map(|r| (0..b).map(move |s| (r, s))).map(|(r, s)| state.mrs(r, s)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn random_operations_keep_aggregates_consistent(seed in any::<u64>(), directed in any::<bool>(), use_hash in any::<bool>()) {
        init_logging();
        let g = random_graph(seed, 16, 40, directed);
        let mut rng = RngHandle::from_seed(seed);
        let cfg = BlockStateConfig { use_hash, ..BlockStateConfig::default() };
        let mut state = BlockState::new(&g, random_partition(16, 5, &mut rng), cfg).unwrap();
        for _ in 0..40 {
            let v = rng.gen_range(0..16);
            match (state.b()[v], rng.gen_range(0..6)) {
                (NULL_GROUP, _) => {
                    let r = rng.gen_range(0..state.num_blocks());
                    state.add_vertex(&g, v, r).unwrap();
                }
                (_, 0) => state.remove_vertex(&g, v).unwrap(),
                (_, 1) => {
                    let s = state.get_empty_block(v, false);
                    state.move_vertex(&g, v, s).unwrap();
                }
                _ => {
                    let r = rng.gen_range(0..state.num_blocks());
                    state.move_vertex(&g, v, r).unwrap();
                }
            }
            assert_consistent(&state, &g);
            let wr: i64 = state.wr().iter().sum();
            prop_assert_eq!(wr, state.total_weight());
            let out: i64 = state.mrp().iter().sum();
            prop_assert_eq!(out, if directed { state.num_edges() } else { 2 * state.num_edges() });
            prop_assert_eq!(state.num_occupied() + state.empty_blocks().len(), state.num_blocks());
        }
    }
}

#[test]
fn negated_entries_restore_block_graph() {
    for directed in [false, true] {
        let g = random_graph(41, 12, 30, directed);
        let mut rng = RngHandle::from_seed(41);
        let mut state = BlockState::new(&g, random_partition(12, 4, &mut rng), plain_config(true)).unwrap();
        let before = all_pairs(&state);
        let (mrp, e) = (state.mrp().to_vec(), state.num_edges());
        let mut m = MoveEntrySet::new(directed, 0);
        for v in 0..12 {
            let r = state.b()[v];
            let nr = (r + 1) % 4;
            state.get_move_entries(&g, v, r, nr, &mut m);
            state.apply_delta(&m);
            m.negate();
            state.apply_delta(&m);
            assert_eq!(all_pairs(&state), before);
            assert_eq!(state.mrp(), mrp.as_slice());
            assert_eq!(state.num_edges(), e);
        }
        assert_consistent(&state, &g);
    }
}

#[test]
fn move_and_back_restores_entropy() {
    let mut rng = RngHandle::from_seed(2);
    let planted = planted_partition(&[6, 6, 6], 0.6, 0.1, false, &mut rng).unwrap();
    let g = planted.graph;
    let ea = EntropyArgs::default();
    let mut state = BlockState::new(&g, planted.blocks.clone(), plain_config(true)).unwrap();
    let s0 = state.entropy(&g, &ea, true).unwrap();
    state.move_vertex(&g, 3, 2).unwrap();
    state.move_vertex(&g, 3, 0).unwrap();
    let s1 = state.entropy(&g, &ea, true).unwrap();
    assert!((s0 - s1).abs() < 1e-9);
    assert_eq!(state.b(), planted.blocks.as_slice());
}

#[test]
fn vacated_blocks_are_reused_before_allocating() {
    let g = Multigraph::from_edges(4, false, &[(0, 1), (2, 3), (1, 2)]).unwrap();
    let mut state = BlockState::new(&g, vec![0, 0, 1, 2], plain_config(true)).unwrap();
    assert_eq!(state.num_occupied(), 3);
    assert!(state.is_last(3));
    state.move_vertex(&g, 3, 1).unwrap();
    assert!(state.empty_blocks().contains(2));
    assert!(!state.candidate_blocks().contains(2));
    assert_eq!(state.get_empty_block(0, false), 2);
    assert_eq!(state.num_blocks(), 3);

    let fresh = state.get_empty_block(0, true);
    assert_eq!(fresh, 3);
    assert_eq!(state.num_blocks(), 4);
    assert_eq!(state.get_empty_block(0, false), 3);
    assert_consistent(&state, &g);
}

#[test]
fn moving_to_current_block_is_a_no_op() {
    let g = Multigraph::from_edges(3, true, &[(0, 1), (1, 2)]).unwrap();
    let mut state = BlockState::new(&g, vec![0, 1, 1], plain_config(true)).unwrap();
    let pairs = all_pairs(&state);
    state.move_vertex(&g, 1, 1).unwrap();
    assert_eq!(all_pairs(&state), pairs);
    assert_eq!(state.wr(), &[1, 2]);
}

#[test]
fn set_partition_allocates_and_clears() {
    let g = random_graph(9, 8, 14, false);
    let mut state = BlockState::new(&g, vec![0; 8], plain_config(false)).unwrap();
    let target = vec![0, 1, 2, 3, 4, 0, 1, NULL_GROUP];
    state.set_partition(&g, &target).unwrap();
    assert_eq!(state.b(), target.as_slice());
    assert_eq!(state.num_blocks(), 5);
    assert_eq!(state.num_occupied(), 5);
    assert_eq!(state.total_weight(), 7);
    assert_consistent(&state, &g);
    assert!(state.set_partition(&g, &[0, 1]).is_err());
}

#[test]
fn label_barriers_reject_moves() {
    let g = Multigraph::from_edges(4, false, &[(0, 1), (2, 3), (0, 3)]).unwrap();
    let init = StateInit {
        b: vec![0, 0, 1, 1],
        vweight: None,
        bclabel: Some(vec![0, 1]),
        pclabel: None,
    };
    let mut state = BlockState::from_init(&g, init, plain_config(true)).unwrap();
    assert!(!state.allow_move(0, 1));
    let ds = state.virtual_move(&g, 0, 0, 1, &EntropyArgs::default()).unwrap();
    assert!(ds.is_infinite() && ds > 0.0);
    match state.move_vertex(&g, 0, 1) {
        Err(SbmError::IllegalMove(info)) => {
            assert_eq!(info.code, "clabel-barrier");
            assert_eq!(info.message, "cannot move vertex across clabel barriers");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    let s = state.get_empty_block(2, true);
    assert_eq!(state.bclabel()[s], 1);
    state.move_vertex(&g, 2, s).unwrap();
}

#[test]
fn invalid_arguments_are_config_errors() {
    let g = Multigraph::from_edges(3, false, &[(0, 1)]).unwrap();
    assert_eq!(
        BlockState::new(&g, vec![0, 0], plain_config(true)).unwrap_err().code(),
        "partition-length"
    );
    let mut state = BlockState::new(&g, vec![0, 0, NULL_GROUP], plain_config(true)).unwrap();
    assert_eq!(state.move_vertex(&g, 2, 0).unwrap_err().code(), "vertex-unassigned");
    assert_eq!(state.move_vertex(&g, 0, 9).unwrap_err().code(), "unknown-block");
    assert_eq!(state.move_vertex(&g, 7, 0).unwrap_err().code(), "unknown-vertex");
    assert_eq!(state.add_vertex(&g, 0, 0).unwrap_err().code(), "vertex-assigned");
    state.remove_vertex(&g, 2).unwrap();
    state.add_vertex(&g, 2, 0).unwrap();
    assert_eq!(state.wr(), &[3]);
}

#[test]
fn dense_entropy_rejects_unsupported_models() {
    let g = random_graph(4, 6, 9, false);
    let state = BlockState::new(&g, vec![0, 0, 0, 1, 1, 1], plain_config(true)).unwrap();
    let ea = EntropyArgs { dense: true, ..EntropyArgs::default() };
    let err = state.entropy(&g, &ea, true).unwrap_err();
    assert!(matches!(err, SbmError::Unsupported(_)));
    assert_eq!(err.code(), "dense-deg-corr");
    assert_eq!(state.virtual_move(&g, 0, 0, 1, &ea).unwrap_err().code(), "dense-deg-corr");
}

#[test]
fn copies_are_independent_and_assignable() {
    let g = random_graph(13, 10, 20, true);
    let mut rng = RngHandle::from_seed(13);
    let state = BlockState::new(&g, random_partition(10, 3, &mut rng), plain_config(true)).unwrap();
    let ea = EntropyArgs::default();
    let mut copy = state.deep_copy();
    copy.move_vertex(&g, 0, 2).unwrap();
    copy.move_vertex(&g, 5, 2).unwrap();
    assert_consistent(&state, &g);
    assert_consistent(&copy, &g);

    let mut restored = state.deep_copy();
    restored.deep_assign(&copy).unwrap();
    assert_eq!(restored.b(), copy.b());
    let (a, b) = (restored.entropy(&g, &ea, true).unwrap(), copy.entropy(&g, &ea, true).unwrap());
    assert!((a - b).abs() < 1e-12);

    let other = BlockState::new(&g, vec![0; 10], plain_config(false)).unwrap();
    assert_eq!(restored.deep_assign(&other).unwrap_err().code(), "shape-mismatch");
}

#[test]
fn hash_and_dense_indices_agree() {
    let g = random_graph(17, 15, 35, false);
    let mut rng = RngHandle::from_seed(17);
    let b = random_partition(15, 5, &mut rng);
    let ea = EntropyArgs::default();
    let dense = BlockState::new(&g, b.clone(), plain_config(true)).unwrap();
    let hashed = BlockState::new(&g, b, BlockStateConfig { use_hash: true, ..plain_config(true) }).unwrap();
    assert_eq!(all_pairs(&dense), all_pairs(&hashed));
    let (a, c) = (dense.entropy(&g, &ea, true).unwrap(), hashed.entropy(&g, &ea, true).unwrap());
    assert!((a - c).abs() < 1e-12);
    assert_eq!(g.num_vertices(), dense.b().len());
}
