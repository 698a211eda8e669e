//! Attachment of a parent level whose vertices are this level's blocks.

use log::debug;

use sbm_core::SbmError;

use super::{BlockState, StateInit};
use crate::block_graph::BlockGraph;
use crate::config::{BlockStateConfig, EntropyArgs};

/// A parent level together with the entropy arguments its terms are
/// evaluated with when reached from the child.
#[derive(Debug, Clone)]
pub struct Coupling {
    /// Parent state over the child's block multigraph.
    pub state: BlockState,
    /// Entropy arguments of the parent level.
    pub args: EntropyArgs,
}

impl BlockState {
    /// Couples `parent` above this level.
    ///
    /// The parent must have one vertex per block here, and must be weighted,
    /// non-degree-corrected and covariate-free. Its vertex weights are
    /// expected to be one for occupied blocks and zero for empty ones.
    pub fn couple_state(&mut self, parent: BlockState, args: EntropyArgs) -> Result<(), SbmError> {
        let cfg = parent.config();
        if cfg.deg_corr || !cfg.is_weighted || !cfg.rec_types.is_empty() {
            return Err(SbmError::config(
                "parent-config",
                "parent levels must be weighted, non-degree-corrected and covariate-free",
            )
            .with_context("deg_corr", cfg.deg_corr)
            .with_context("is_weighted", cfg.is_weighted)
            .with_context("channels", cfg.rec_types.len()));
        }
        if parent.b.len() != self.num_blocks() {
            return Err(SbmError::config("parent-size", "parent must have one vertex per block")
                .with_context("blocks", self.num_blocks())
                .with_context("parent_vertices", parent.b.len()));
        }
        debug!(
            "coupled parent level: {} child blocks into {} parent blocks",
            self.num_blocks(),
            parent.num_occupied()
        );
        self.coupling = Some(Box::new(Coupling { state: parent, args }));
        Ok(())
    }

    /// Detaches and returns the coupled parent, if any.
    pub fn decouple_state(&mut self) -> Option<Coupling> {
        let link = self.coupling.take()?;
        debug!("decoupled parent level with {} blocks", link.state.num_blocks());
        Some(*link)
    }

    /// Builds a parent level over this level's block multigraph with the
    /// block assignment `parent_b` and couples it.
    pub fn couple_new_level(&mut self, parent_b: Vec<usize>, args: EntropyArgs) -> Result<(), SbmError> {
        let vweight = self.wr.iter().map(|&w| i64::from(w > 0)).collect();
        let init = StateInit {
            b: parent_b,
            vweight: Some(vweight),
            bclabel: None,
            pclabel: None,
        };
        let cfg = BlockStateConfig {
            deg_corr: false,
            use_hash: self.cfg.use_hash,
            rec_types: Vec::new(),
            rec_priors: Vec::new(),
            is_weighted: true,
        };
        let parent = BlockState::from_init(&self.bg, init, cfg)?;
        self.couple_state(parent, args)
    }

    /// The coupled parent level.
    pub fn coupled_state(&self) -> Option<&BlockState> {
        self.coupling.as_deref().map(|c| &c.state)
    }

    /// Entropy arguments of the coupled parent level.
    pub fn coupled_args(&self) -> Option<&EntropyArgs> {
        self.coupling.as_deref().map(|c| &c.args)
    }

    /// The coupled parent level with the graph its moves must be given.
    pub fn coupled_split_mut(&mut self) -> Option<(&BlockGraph, &mut BlockState)> {
        let link = self.coupling.as_deref_mut()?;
        Some((&self.bg, &mut link.state))
    }

    /// Number of levels from this one upwards.
    pub fn levels(&self) -> usize {
        1 + self.coupled_state().map_or(0, BlockState::levels)
    }
}
