mod common;

use rand::Rng;

use sbm_blockmodel::{BlockState, BlockStateConfig, EntropyArgs, StateInit};
use sbm_core::{GraphView, RngHandle, SbmError};
use sbm_graph::{planted_partition, Multigraph};

use common::{assert_consistent, assert_move_delta, init_logging, plain_config};

fn two_level(directed: bool, parent_args: EntropyArgs, seed: u64) -> (Multigraph, BlockState) {
    let mut rng = RngHandle::from_seed(seed);
    let planted = planted_partition(&[5, 5, 5, 5, 4, 4], 0.5, 0.08, directed, &mut rng).unwrap();
    let mut state = BlockState::new(&planted.graph, planted.blocks, plain_config(true)).unwrap();
    state.couple_new_level(vec![0, 0, 1, 1, 2, 2], parent_args).unwrap();
    (planted.graph, state)
}

fn sparse_level() -> EntropyArgs {
    EntropyArgs {
        dense: false,
        ..EntropyArgs::hierarchy_level()
    }
}

#[test]
fn coupled_moves_keep_every_level_consistent() {
    init_logging();
    for directed in [false, true] {
        let (g, mut state) = two_level(directed, EntropyArgs::hierarchy_level(), 1);
        assert_eq!(state.levels(), 2);
        assert_consistent(&state, &g);
        let mut rng = RngHandle::from_seed(10);
        for _ in 0..60 {
            let v = rng.gen_range(0..g.num_vertices());
            let nr = if rng.gen_bool(0.2) {
                state.get_empty_block(v, false)
            } else {
                rng.gen_range(0..state.num_blocks())
            };
            state.move_vertex(&g, v, nr).unwrap();
            assert_consistent(&state, &g);
        }
        let parent = state.coupled_state().unwrap();
        assert_eq!(parent.b().len(), state.num_blocks());
        let occupied: i64 = parent.wr().iter().sum();
        assert_eq!(occupied, state.num_occupied() as i64);
        assert_eq!(parent.num_edges(), state.num_edges());
    }
}

#[test]
fn coupled_deltas_match_recomputation() {
    for (directed, args) in [
        (false, EntropyArgs::hierarchy_level()),
        (true, EntropyArgs::hierarchy_level()),
        (false, sparse_level()),
        (true, EntropyArgs { exact: false, ..sparse_level() }),
    ] {
        let (g, mut state) = two_level(directed, args, 2);
        let ea = EntropyArgs::default();
        let mut rng = RngHandle::from_seed(20);
        for _ in 0..25 {
            let v = rng.gen_range(0..g.num_vertices());
            let nr = if rng.gen_bool(0.2) {
                state.get_empty_block(v, false)
            } else {
                rng.gen_range(0..state.num_blocks())
            };
            state = assert_move_delta(&state, &g, v, nr, &ea);
        }
        assert_consistent(&state, &g);
    }
}

#[test]
fn vacating_and_occupying_blocks_toggles_parent_vertices() {
    let g = Multigraph::from_edges(4, false, &[(0, 1), (1, 2), (2, 3)]).unwrap();
    let mut state = BlockState::new(&g, vec![0, 0, 1, 2], plain_config(true)).unwrap();
    state.couple_new_level(vec![0, 0, 1], EntropyArgs::hierarchy_level()).unwrap();
    assert_eq!(state.coupled_state().unwrap().wr(), &[2, 1]);

    state.move_vertex(&g, 3, 1).unwrap();
    let parent = state.coupled_state().unwrap();
    assert_eq!(parent.wr(), &[2, 0]);
    assert!(parent.empty_blocks().contains(1));
    assert_consistent(&state, &g);

    state.move_vertex(&g, 3, 2).unwrap();
    assert_eq!(state.coupled_state().unwrap().wr(), &[2, 1]);

    let s = state.get_empty_block(0, true);
    let parent = state.coupled_state().unwrap();
    assert_eq!(parent.b().len(), 4);
    assert_eq!(parent.b()[s], parent.b()[0]);
    state.move_vertex(&g, 0, s).unwrap();
    assert_eq!(state.coupled_state().unwrap().wr(), &[3, 1]);
    assert_consistent(&state, &g);
}

#[test]
fn coupled_entropy_includes_every_level() {
    let (g, mut state) = two_level(false, EntropyArgs::hierarchy_level(), 3);
    let ea = EntropyArgs::default();
    let local = state.entropy(&g, &ea, false).unwrap();
    let total = state.entropy(&g, &ea, true).unwrap();
    let parent = state.coupled_state().unwrap();
    let upper = parent
        .entropy(state.block_graph(), &EntropyArgs::hierarchy_level(), true)
        .unwrap();
    assert!((total - local - upper).abs() < 1e-9);

    let link = state.decouple_state().unwrap();
    assert_eq!(state.levels(), 1);
    assert!((state.entropy(&g, &ea, true).unwrap() - local).abs() < 1e-9);
    state.couple_state(link.state, link.args).unwrap();
    assert_eq!(state.levels(), 2);
}

#[test]
fn three_levels_stay_consistent() {
    let (g, mut state) = two_level(false, EntropyArgs::hierarchy_level(), 4);
    {
        let (_, parent) = state.coupled_split_mut().unwrap();
        parent.couple_new_level(vec![0, 0, 1], EntropyArgs::hierarchy_level()).unwrap();
    }
    assert_eq!(state.levels(), 3);
    let ea = EntropyArgs::default();
    let mut rng = RngHandle::from_seed(40);
    for _ in 0..20 {
        let v = rng.gen_range(0..g.num_vertices());
        let nr = rng.gen_range(0..state.num_blocks());
        state = assert_move_delta(&state, &g, v, nr, &ea);
    }
    {
        let (bg, parent) = state.coupled_split_mut().unwrap();
        let hr = parent.b()[0];
        let target = parent.get_empty_block(0, true);
        parent.move_vertex(bg, 0, target).unwrap();
        assert_ne!(parent.b()[0], hr);
    }
    assert_consistent(&state, &g);
}

#[test]
fn parent_levels_must_be_plain() {
    let g = Multigraph::from_edges(3, false, &[(0, 1), (1, 2)]).unwrap();
    let mut state = BlockState::new(&g, vec![0, 1, 1], plain_config(true)).unwrap();
    let dc_parent = BlockState::new(state.block_graph(), vec![0, 0], plain_config(true)).unwrap();
    match state.couple_state(dc_parent, EntropyArgs::hierarchy_level()) {
        Err(SbmError::Config(info)) => assert_eq!(info.code, "parent-config"),
        other => panic!("unexpected result: {other:?}"),
    }
    let cfg = BlockStateConfig {
        deg_corr: false,
        is_weighted: true,
        ..BlockStateConfig::default()
    };
    let g3 = Multigraph::new(3, false);
    let wrong = BlockState::new(&g3, vec![0, 0, 0], cfg).unwrap();
    assert_eq!(
        state.couple_state(wrong, EntropyArgs::hierarchy_level()).unwrap_err().code(),
        "parent-size"
    );
}

#[test]
fn parent_labels_constrain_child_moves() {
    let g = Multigraph::from_edges(4, false, &[(0, 1), (2, 3)]).unwrap();
    let mut state = BlockState::new(&g, vec![0, 0, 1, 1], plain_config(true)).unwrap();
    let cfg = BlockStateConfig {
        deg_corr: false,
        is_weighted: true,
        ..BlockStateConfig::default()
    };
    let init = StateInit {
        b: vec![0, 1],
        vweight: Some(vec![1, 1]),
        bclabel: Some(vec![0, 1]),
        pclabel: None,
    };
    let parent = BlockState::from_init(state.block_graph(), init, cfg).unwrap();
    state.couple_state(parent, EntropyArgs::hierarchy_level()).unwrap();
    assert!(!state.allow_move(0, 1));
    assert_eq!(state.move_vertex(&g, 0, 1).unwrap_err().code(), "clabel-barrier");
}
