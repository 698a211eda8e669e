#![deny(missing_docs)]
#![doc = "Shared contracts for the stochastic block-model engine: the error taxonomy, seeded randomness and the graph traversal interface the engine consumes."]

pub mod errors;
pub mod rng;
mod view;

pub use errors::{ErrorInfo, SbmError};
pub use rng::{derive_substream_seed, RngHandle};
pub use view::{Adjacent, GraphView};

/// Sentinel block id for "no block": the source of a vertex insertion, the
/// target of a removal, and the block of an unassigned vertex.
pub const NULL_GROUP: usize = usize::MAX;
