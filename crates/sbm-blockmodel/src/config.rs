//! Serde-configurable model flags and entropy options.

use serde::{Deserialize, Serialize};

use sbm_core::SbmError;

/// Construction-time model flags of a block state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockStateConfig {
    /// Enables the degree-sequence terms.
    #[serde(default = "default_true")]
    pub deg_corr: bool,
    /// Selects the hash-map block edge index instead of the dense table.
    #[serde(default)]
    pub use_hash: bool,
    /// Kind of each modelled covariate channel, in graph channel order.
    #[serde(default)]
    pub rec_types: Vec<CovariateKind>,
    /// Prior hyperparameters, one per entry of `rec_types`; missing entries
    /// use [`CovariatePrior::default`].
    #[serde(default)]
    pub rec_priors: Vec<CovariatePrior>,
    /// Honours vertex weights and edge multiplicities instead of unit weights.
    #[serde(default)]
    pub is_weighted: bool,
}

impl Default for BlockStateConfig {
    fn default() -> Self {
        Self {
            deg_corr: true,
            use_hash: false,
            rec_types: Vec::new(),
            rec_priors: Vec::new(),
            is_weighted: false,
        }
    }
}

impl BlockStateConfig {
    /// Parses a YAML payload.
    pub fn from_yaml_str(payload: &str) -> Result<Self, SbmError> {
        serde_yaml::from_str(payload).map_err(|err| {
            SbmError::config("config-yaml", "could not parse block state config")
                .with_context("reason", err)
        })
    }

    /// Parses a JSON payload.
    pub fn from_json_str(payload: &str) -> Result<Self, SbmError> {
        serde_json::from_str(payload).map_err(|err| {
            SbmError::config("config-json", "could not parse block state config")
                .with_context("reason", err)
        })
    }

    /// Prior of covariate channel `channel`.
    pub fn prior(&self, channel: usize) -> CovariatePrior {
        self.rec_priors.get(channel).copied().unwrap_or_default()
    }
}

/// Likelihood family of one covariate channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CovariateKind {
    /// Values are aggregated but carry no likelihood.
    None,
    /// Non-negative values under a Gamma-Poisson model.
    Count,
    /// Real values under a normal model with unknown mean and variance.
    SignedReal,
}

/// Conjugate prior hyperparameters of a covariate channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CovariatePrior {
    /// Gamma shape (count) or inverse-gamma shape (signed-real).
    #[serde(default = "default_one")]
    pub alpha: f64,
    /// Gamma rate (count) or inverse-gamma scale (signed-real).
    #[serde(default = "default_one")]
    pub beta: f64,
    /// Prior mean (signed-real only).
    #[serde(default)]
    pub mean: f64,
    /// Prior pseudo-count of the mean (signed-real only).
    #[serde(default = "default_one")]
    pub kappa: f64,
}

fn default_one() -> f64 {
    1.0
}

impl Default for CovariatePrior {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 1.0,
            mean: 0.0,
            kappa: 1.0,
        }
    }
}

/// Description length charged for the degree sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DegreeDlKind {
    /// Entropy of the per-block degree histogram.
    Entropy,
    /// Uniform over degree sequences with the block's edge total.
    Uniform,
    /// Uniform histogram, then uniform sequence given the histogram.
    #[default]
    Distributed,
}

/// Selects which terms an entropy or entropy-delta evaluation includes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntropyArgs {
    /// Include the adjacency likelihood.
    #[serde(default = "default_true")]
    pub adjacency: bool,
    /// Use the dense ensemble for the adjacency term.
    #[serde(default)]
    pub dense: bool,
    /// Treat the graph as a multigraph.
    #[serde(default = "default_true")]
    pub multigraph: bool,
    /// Use microcanonical terms instead of the Poisson approximation.
    #[serde(default = "default_true")]
    pub exact: bool,
    /// Include the per-vertex degree factorial terms.
    #[serde(default = "default_true")]
    pub deg_entropy: bool,
    /// Include the covariate likelihood.
    #[serde(default = "default_true")]
    pub recs: bool,
    /// Include the partition description length.
    #[serde(default = "default_true")]
    pub partition_dl: bool,
    /// Include the degree-sequence description length.
    #[serde(default = "default_true")]
    pub degree_dl: bool,
    /// Form of the degree-sequence description length.
    #[serde(default)]
    pub degree_dl_kind: DegreeDlKind,
    /// Include the block-pair edge-count description length.
    #[serde(default = "default_true")]
    pub edges_dl: bool,
    /// Weight of the description-length part.
    #[serde(default = "default_beta_dl")]
    pub beta_dl: f64,
}

fn default_true() -> bool {
    true
}

fn default_beta_dl() -> f64 {
    1.0
}

impl Default for EntropyArgs {
    fn default() -> Self {
        Self {
            adjacency: true,
            dense: false,
            multigraph: true,
            exact: true,
            deg_entropy: true,
            recs: true,
            partition_dl: true,
            degree_dl: true,
            degree_dl_kind: DegreeDlKind::Distributed,
            edges_dl: true,
            beta_dl: 1.0,
        }
    }
}

impl EntropyArgs {
    /// Arguments for the levels above the first in a hierarchy: dense
    /// multigraph adjacency and description lengths, no degree terms.
    pub fn hierarchy_level() -> Self {
        Self {
            dense: true,
            multigraph: true,
            deg_entropy: false,
            degree_dl: false,
            ..Self::default()
        }
    }

    /// Parses a YAML payload.
    pub fn from_yaml_str(payload: &str) -> Result<Self, SbmError> {
        serde_yaml::from_str(payload).map_err(|err| {
            SbmError::config("entropy-args-yaml", "could not parse entropy arguments")
                .with_context("reason", err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_fills_defaults() {
        let config = BlockStateConfig::from_yaml_str(
            "deg_corr: false\nrec_types: [count, signed-real]\nrec_priors:\n  - alpha: 2.0\n",
        )
        .unwrap();
        assert!(!config.deg_corr);
        assert_eq!(
            config.rec_types,
            vec![CovariateKind::Count, CovariateKind::SignedReal]
        );
        assert_eq!(config.prior(0).alpha, 2.0);
        assert_eq!(config.prior(0).beta, 1.0);
        assert_eq!(config.prior(1), CovariatePrior::default());
    }

    #[test]
    fn entropy_args_parse_kebab_case_kind() {
        let args = EntropyArgs::from_yaml_str("exact: false\ndegree_dl_kind: uniform\n").unwrap();
        assert!(!args.exact);
        assert_eq!(args.degree_dl_kind, DegreeDlKind::Uniform);
        assert!(args.partition_dl);
        assert!(EntropyArgs::from_yaml_str("beta_dl: [1]").is_err());
    }
}
