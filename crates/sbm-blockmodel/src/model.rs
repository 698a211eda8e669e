//! Contract shared by every partition model an outer Metropolis–Hastings
//! driver can sample.

use rand::Rng;

use sbm_core::SbmError;

use crate::config::EntropyArgs;

/// Outcome of one proposal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// Vertex the proposal was made for.
    pub vertex: usize,
    /// Block before the step.
    pub from: usize,
    /// Proposed block.
    pub to: usize,
    /// Entropy change of the proposal.
    pub delta: f64,
    /// Whether the move was committed.
    pub accepted: bool,
}

/// A partition over `num_vertices()` vertices with an entropy, a proposal
/// distribution and its probabilities.
pub trait PartitionModel {
    /// Number of vertices.
    fn num_vertices(&self) -> usize;

    /// Current block of `v`.
    fn block_of(&self, v: usize) -> usize;

    /// Entropy of the current partition.
    fn entropy(&self, ea: &EntropyArgs) -> Result<f64, SbmError>;

    /// Entropy change of moving `v` from `r` to `nr`.
    fn virtual_move(&self, v: usize, r: usize, nr: usize, ea: &EntropyArgs) -> Result<f64, SbmError>;

    /// Commits the move of `v` to `nr`.
    fn move_vertex(&mut self, v: usize, nr: usize) -> Result<(), SbmError>;

    /// Proposes a block for `v`.
    fn sample_block<R: Rng + ?Sized>(&mut self, v: usize, c: f64, d: f64, rng: &mut R) -> Result<usize, SbmError>;

    /// Log-probability of proposing `s` for `v` in `r`; with `reverse`, of
    /// the reverse proposal after `v` moved from `s` to `r`, evaluated
    /// before that move is committed.
    fn move_prob(&self, v: usize, r: usize, s: usize, c: f64, d: f64, reverse: bool) -> f64;

    /// One Metropolis–Hastings step for `v` at inverse temperature `beta`.
    #[allow(clippy::too_many_arguments)]
    fn metropolis_step<R: Rng + ?Sized>(
        &mut self,
        v: usize,
        beta: f64,
        c: f64,
        d: f64,
        ea: &EntropyArgs,
        rng: &mut R,
    ) -> Result<StepOutcome, SbmError> {
        let r = self.block_of(v);
        let s = self.sample_block(v, c, d, rng)?;
        let mut outcome = StepOutcome {
            vertex: v,
            from: r,
            to: s,
            delta: 0.0,
            accepted: false,
        };
        if s == r {
            return Ok(outcome);
        }
        outcome.delta = self.virtual_move(v, r, s, ea)?;
        if !outcome.delta.is_finite() {
            return Ok(outcome);
        }
        let forward = self.move_prob(v, r, s, c, d, false);
        let backward = self.move_prob(v, s, r, c, d, true);
        let log_a = -beta * outcome.delta + backward - forward;
        let acceptance = log_a.exp().min(1.0);
        if rng.gen::<f64>() < acceptance {
            self.move_vertex(v, s)?;
            outcome.accepted = true;
        }
        Ok(outcome)
    }
}
