//! Marginal likelihoods of edge covariates aggregated per block pair.

use std::f64::consts::PI;

use crate::config::{CovariateKind, CovariatePrior};
use crate::entropy::{lgamma, safelog_f};

/// Sufficient statistics of one channel over one block pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PairRecords {
    /// Number of edge records.
    pub count: i64,
    /// Sum of the covariate.
    pub sum: f64,
    /// Sum of squares of the covariate.
    pub sum_sq: f64,
}

/// Per-channel covariate model selected at construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CovariateModel {
    kinds: Vec<CovariateKind>,
    priors: Vec<CovariatePrior>,
}

impl CovariateModel {
    /// Pairs each channel kind with its prior; `priors` holds one entry per
    /// channel.
    pub fn new(kinds: Vec<CovariateKind>, priors: Vec<CovariatePrior>) -> Self {
        Self { kinds, priors }
    }

    /// Number of channels, including `none` channels.
    pub fn channels(&self) -> usize {
        self.kinds.len()
    }

    /// Returns whether any channel carries a likelihood.
    pub fn is_active(&self) -> bool {
        self.kinds.iter().any(|k| *k != CovariateKind::None)
    }

    /// Kind of `channel`.
    pub fn kind(&self, channel: usize) -> CovariateKind {
        self.kinds[channel]
    }

    /// Negative log marginal likelihood of the records of one block pair.
    ///
    /// Terms that depend only on individual observations are constant under
    /// moves and omitted; an empty pair contributes zero.
    pub fn pair_term(&self, channel: usize, recs: PairRecords) -> f64 {
        if recs.count <= 0 {
            return 0.0;
        }
        let prior = self.priors[channel];
        match self.kinds[channel] {
            CovariateKind::None => 0.0,
            CovariateKind::Count => -gamma_poisson(prior, recs),
            CovariateKind::SignedReal => -normal_inverse_gamma(prior, recs),
        }
    }

    /// Change of [`Self::pair_term`] when the records move from `before` by
    /// `(dcount, dsum, dsum_sq)`.
    pub fn pair_delta(&self, channel: usize, before: PairRecords, dcount: i64, dsum: f64, dsum_sq: f64) -> f64 {
        let after = PairRecords {
            count: before.count + dcount,
            sum: before.sum + dsum,
            sum_sq: before.sum_sq + dsum_sq,
        };
        self.pair_term(channel, after) - self.pair_term(channel, before)
    }
}

fn gamma_poisson(prior: CovariatePrior, recs: PairRecords) -> f64 {
    let (a, b) = (prior.alpha, prior.beta);
    let n = recs.count as f64;
    a * safelog_f(b) - lgamma(a) + lgamma(a + recs.sum) - (a + recs.sum) * safelog_f(b + n)
}

fn normal_inverse_gamma(prior: CovariatePrior, recs: PairRecords) -> f64 {
    let n = recs.count as f64;
    let (m0, k0, a0, b0) = (prior.mean, prior.kappa, prior.alpha, prior.beta);
    let kn = k0 + n;
    let mn = (k0 * m0 + recs.sum) / kn;
    let an = a0 + n / 2.0;
    // clamp rounding noise from incremental sums
    let bn = (b0 + 0.5 * (recs.sum_sq + k0 * m0 * m0 - kn * mn * mn)).max(f64::MIN_POSITIVE);
    lgamma(an) - lgamma(a0) + a0 * safelog_f(b0) - an * bn.ln() + 0.5 * (k0 / kn).ln()
        - n / 2.0 * (2.0 * PI).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model(kind: CovariateKind) -> CovariateModel {
        CovariateModel::new(vec![kind], vec![CovariatePrior::default()])
    }

    #[test]
    fn empty_pairs_cost_nothing() {
        for kind in [CovariateKind::None, CovariateKind::Count, CovariateKind::SignedReal] {
            assert_eq!(model(kind).pair_term(0, PairRecords::default()), 0.0);
        }
    }

    #[test]
    fn gamma_poisson_single_observation() {
        // alpha = beta = 1, one record of value 0: ln p = ln(1/2)
        let recs = PairRecords { count: 1, sum: 0.0, sum_sq: 0.0 };
        assert_relative_eq!(model(CovariateKind::Count).pair_term(0, recs), 2f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn pair_delta_matches_difference() {
        let m = model(CovariateKind::SignedReal);
        let before = PairRecords { count: 3, sum: 1.5, sum_sq: 4.25 };
        let d = m.pair_delta(0, before, 1, -0.5, 0.25);
        let after = PairRecords { count: 4, sum: 1.0, sum_sq: 4.5 };
        assert_relative_eq!(d, m.pair_term(0, after) - m.pair_term(0, before), epsilon = 1e-12);
    }
}
