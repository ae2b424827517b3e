//! Turning a selected linear chain of nodes into a committed `Pass`, or
//! into a hint for the driver loop to mutate the graph and retry. See
//! spec.md §4.8-4.9.

pub mod create_greedily;
pub mod linear_working_nodes;

pub use create_greedily::create_greedily;
pub use linear_working_nodes::{find_linear_working_nodes, LinearWorkingNodesResult};

use serde::{Deserialize, Serialize};

use crate::graph::NodeId;
use crate::sram::SramAllocator;
use crate::stripe::config::StrategyConfig;
use crate::types::{BufferLocation, ConvAlgorithm, DataFormat};

/// Intermediate-output compression chosen for a committed pass. FCAF-DEEP
/// is preferred over FCAF-WIDE whenever both are available (spec.md §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputCompression {
    None,
    FcafDeep,
    FcafWide,
}

/// One emitted pass: a committed strategy, SRAM layout, and the nodes it
/// consumed. Downstream command-stream emission is out of scope here
/// (spec.md §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pass {
    pub working_nodes: Vec<NodeId>,
    pub mce_node: NodeId,
    pub fuse_ple: Option<NodeId>,
    pub strategy_config: StrategyConfig,
    pub algorithm: ConvAlgorithm,
    pub output_location: BufferLocation,
    pub output_compression: OutputCompression,
    pub allocator_after: SramAllocator,
}

/// A graph mutation the driver loop should apply before retrying pass
/// building. Replaces "hints written back onto node objects" (spec.md §9)
/// with an explicit return value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FixGraphHint {
    /// `node`'s output format must become `required_format` before retrying
    /// (e.g. firmware cannot emit NHWC for a non-contiguous OFM stripe, or
    /// cannot DMA the NHWC input split the selected strategy needs).
    ConvertOutputTo { node: NodeId, required_format: DataFormat },
    /// `node` (an MCE) must be re-lowered with the Direct algorithm: no
    /// valid block config exists for Winograd here.
    RequireDirectAlgorithm { node: NodeId },
    /// `node` (a MaxPool-3x3 PLE) needs an identity node inserted before it
    /// so its stripe-depth cap can be satisfied.
    InsertIdentityNode { node: NodeId },
    /// `node`, currently SRAM-resident, must be forced to DRAM: the
    /// nearest SRAM-resident upstream node when no strategy fit.
    RequireDram { node: NodeId },
    /// `node`'s output must not be FCAF-compressed: the selected strategy's
    /// stripe shape is incompatible with compression.
    RequireUncompressed { node: NodeId },
}

/// Outcome of `CreateGreedily` for one candidate chain start. See spec.md
/// §4.9's classification table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GreedyOutcome {
    /// The chain contains no MCE op. Not an error — an empty result.
    NoMceFound,
    /// No committable pass; `Some` names the graph mutation likely to
    /// unblock the next attempt.
    NoPass(Option<FixGraphHint>),
    Pass(Pass),
}
