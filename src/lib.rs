//! Stripe-partitioning strategy selection and SRAM layout for one
//! compilation unit's MCE/PLE pass graph. See spec.md.

pub mod errors;
pub mod graph;
pub mod pass;
pub mod sram;
pub mod stripe;
pub mod types;

pub use errors::{PassError, PassResult};
pub use graph::{Graph, Node, NodeId, NodeKind};
pub use pass::{create_greedily, find_linear_working_nodes, FixGraphHint, GreedyOutcome, Pass};
