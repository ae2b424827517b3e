//! Node arena for the chains `FindLinearWorkingNodes` walks. Plain struct
//! plus index relations replace the downcast-based node-kind dispatch
//! observed upstream (spec.md §9): `NodeKind` is a closed tagged union, and
//! cross-references are `NodeId`s into one arena rather than pointers. A
//! node may only reference the `NodeId`s of nodes already pushed, so
//! cycles are impossible by construction.

use serde::{Deserialize, Serialize};

use crate::errors::{PassError, PassResult};
use crate::types::{BufferLocation, ConvAlgorithm, DataFormat, MceOperationKind, PleOperation, ShapeMultiplier, TensorShape, UpsampleType};

/// Index into a [`Graph`]'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// MCE-specific payload. A node carries at most one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MceNode {
    pub op: MceOperationKind,
    pub algorithm: ConvAlgorithm,
    pub weights_format: DataFormat,
    /// Kernel shape using the repurposed `TensorShape` convention: `.n` is
    /// kernel height, `.h` is kernel width, `.w`/`.c` are input/output
    /// channel counts. See `StripeContext::kernel_height`/`kernel_width`.
    pub kernel_shape: TensorShape,
    pub stride_height: u32,
    pub stride_width: u32,
    pub shape_multiplier: ShapeMultiplier,
    pub upsample: UpsampleType,
    /// True when the input operand is a compile-time-constant buffer
    /// rather than a streamed activation (spec.md §8 invariant 4: if S7 is
    /// selected for a depthwise op, this must be false).
    pub is_static_input: bool,
    /// The HWIM weight tensor's own channel-multiplier dimension (its 4th
    /// axis), distinct from `shape_multiplier`. Only meaningful when
    /// `weights_format` is `Hwim`; ignored for `Hwio`.
    pub weight_channel_multiplier: u32,
}

/// PLE-specific payload for a fuse-only PLE node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PleNode {
    pub op: PleOperation,
    pub shape_multiplier: ShapeMultiplier,
}

/// The closed set of node kinds `FindLinearWorkingNodes` recognizes. Any
/// other node terminates a chain (spec.md §4.8's "any other node
/// terminates extension").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    FormatConversion,
    ExtractSubtensor,
    Mce(MceNode),
    McePostProcess,
    FuseOnlyPle(PleNode),
    Requantize,
    Copy,
    Other,
}

/// One node in the arena. Shapes, format, and placement are queryable by
/// the driver per spec.md §6's external-interface description. Graph
/// mutation hints are *not* stored here (spec.md §9 redesign flag): a
/// `FixGraphHint` is returned by `CreateGreedily` instead of written back
/// onto a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub input_shape: TensorShape,
    pub output_shape: TensorShape,
    pub format: DataFormat,
    pub location: BufferLocation,
    /// True when this node's output tensor is already FCAF-compressed;
    /// consulted both for the S6 bandwidth heuristic and for the
    /// `FixGraphCompressionHint` check in `CreateGreedily`.
    pub is_compressed: bool,
    /// Set by a previously-applied upstream hint: forces this node's
    /// output to DRAM even when S3 would otherwise keep it resident in
    /// SRAM (spec.md §4.8's "no force-DRAM hint" clause).
    pub force_dram: bool,
    /// Set by a previously-applied `FixGraphHint::RequireUncompressed`:
    /// this node's output must never be chosen for FCAF compression.
    pub compression_forbidden: bool,
    pub inputs: Vec<NodeId>,
}

impl Node {
    fn new(kind: NodeKind, input_shape: TensorShape, output_shape: TensorShape, format: DataFormat, inputs: Vec<NodeId>) -> Self {
        Self {
            kind,
            input_shape,
            output_shape,
            format,
            location: BufferLocation::Dram,
            is_compressed: false,
            force_dram: false,
            compression_forbidden: false,
            inputs,
        }
    }
}

/// Arena holding the nodes of one compilation unit's graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Appends a node. `inputs` must only reference nodes already in the
    /// arena — enforced here so the graph can never contain a cycle.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        input_shape: TensorShape,
        output_shape: TensorShape,
        format: DataFormat,
        inputs: Vec<NodeId>,
    ) -> PassResult<NodeId> {
        let next_id = self.nodes.len();
        for &input in &inputs {
            if input.0 >= next_id {
                return Err(PassError::IllegalConfig(format!(
                    "node {next_id} references input {} which has not been added yet",
                    input.0
                )));
            }
        }
        self.nodes.push(Node::new(kind, input_shape, output_shape, format, inputs));
        Ok(NodeId(next_id))
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes that list `id` as one of their inputs, in arena order.
    pub fn consumers(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.inputs.contains(&id))
            .map(|(i, _)| NodeId(i))
            .collect()
    }

    /// `Some(consumer)` when `id` has exactly one consumer; `None`
    /// otherwise (zero, or a branch with more than one).
    pub fn single_consumer(&self, id: NodeId) -> Option<NodeId> {
        let mut consumers = self.consumers(id);
        if consumers.len() == 1 {
            consumers.pop()
        } else {
            None
        }
    }

    /// The linear chain starting at `first`, following single-consumer
    /// edges until a branch (more or less than one consumer) is reached.
    /// `FindLinearWorkingNodes` walks this list node by node; nothing
    /// downstream of a branch point can be folded into one linear pass,
    /// so the candidate chain never needs to extend past one.
    pub fn linear_chain_from(&self, first: NodeId) -> Vec<NodeId> {
        let mut chain = vec![first];
        let mut current = first;
        while let Some(next) = self.single_consumer(current) {
            chain.push(next);
            current = next;
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> TensorShape {
        TensorShape::new(1, 8, 8, 16)
    }

    #[test]
    fn add_node_rejects_forward_references() {
        let mut g = Graph::new();
        let err = g
            .add_node(NodeKind::Other, shape(), shape(), DataFormat::Nhwc, vec![NodeId(0)])
            .unwrap_err();
        assert!(matches!(err, PassError::IllegalConfig(_)));
    }

    #[test]
    fn linear_chain_stops_at_a_fan_out_branch() {
        let mut g = Graph::new();
        let a = g.add_node(NodeKind::Other, shape(), shape(), DataFormat::Nhwc, vec![]).unwrap();
        let b = g.add_node(NodeKind::Other, shape(), shape(), DataFormat::Nhwc, vec![a]).unwrap();
        let _c = g.add_node(NodeKind::Other, shape(), shape(), DataFormat::Nhwc, vec![a]).unwrap();
        // `a` now has two consumers (b and c): the chain from `a` stops at `a`.
        let chain = g.linear_chain_from(a);
        assert_eq!(chain, vec![a]);
        let chain_from_b = g.linear_chain_from(b);
        assert_eq!(chain_from_b, vec![b]);
    }

    #[test]
    fn linear_chain_follows_a_single_path() {
        let mut g = Graph::new();
        let a = g.add_node(NodeKind::Other, shape(), shape(), DataFormat::Nhwc, vec![]).unwrap();
        let b = g.add_node(NodeKind::Other, shape(), shape(), DataFormat::Nhwc, vec![a]).unwrap();
        let c = g.add_node(NodeKind::Other, shape(), shape(), DataFormat::Nhwc, vec![b]).unwrap();
        assert_eq!(g.linear_chain_from(a), vec![a, b, c]);
    }

    #[test]
    fn mce_node_carries_kernel_and_algorithm() {
        let mce = MceNode {
            op: MceOperationKind::Convolution,
            algorithm: ConvAlgorithm::Direct,
            weights_format: DataFormat::Hwio,
            kernel_shape: TensorShape::new(3, 3, 16, 16),
            stride_height: 1,
            stride_width: 1,
            shape_multiplier: ShapeMultiplier::identity(),
            upsample: UpsampleType::Off,
            is_static_input: false,
            weight_channel_multiplier: 1,
        };
        let mut g = Graph::new();
        let id = g
            .add_node(NodeKind::Mce(mce.clone()), shape(), shape(), DataFormat::Nhwcb, vec![])
            .unwrap();
        match &g.get(id).unwrap().kind {
            NodeKind::Mce(found) => assert_eq!(*found, mce),
            _ => panic!("expected an MCE node"),
        }
    }
}
