#![deny(missing_docs)]
#![doc = "Adjacency multigraph implementing the `sbm-core` traversal contract, plus the half-edge expansion and seeded generators used to drive the block-model engine."]

mod generators;
mod halfedge;
mod multigraph;

pub use generators::{planted_partition, random_multigraph, PlantedPartition};
pub use halfedge::{split_half_edges, HalfEdgeGraph};
pub use multigraph::Multigraph;
