#![deny(missing_docs)]
#![doc = "Incrementally maintained stochastic block-model state: block multigraph, partition statistics, exact entropy deltas for single-vertex moves, the move proposal and its probabilities, and coupling to a parent level of a nested hierarchy."]

pub mod block_graph;
pub mod centroid;
pub mod config;
pub mod covariates;
pub mod egroups;
pub mod emat;
pub mod entries;
pub mod entropy;
/// Index set with constant-time uniform sampling.
pub mod idx_set;
pub mod model;
pub mod overlap;
pub mod partition;
pub mod sampler;
mod sbm_state;
mod state;

pub use block_graph::BlockGraph;
pub use centroid::CentroidState;
pub use config::{BlockStateConfig, CovariateKind, CovariatePrior, DegreeDlKind, EntropyArgs};
pub use emat::{BlockEdgeIndex, EdgeIndex};
pub use entries::{BlockDelta, MoveEntrySet, PairDelta};
pub use model::{PartitionModel, StepOutcome};
pub use sbm_state::SbmState;
pub use state::{BlockState, Coupling, StateInit};
