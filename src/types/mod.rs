//! Core data model shared across the strategy-selection engine: tensor
//! shapes, data formats, the MCE/PLE operation vocabulary, block configs,
//! and the read-only hardware capability description.

use serde::{Deserialize, Serialize};

use crate::errors::{PassError, PassResult};

/// Rational multiplier used to describe how an MCE/PLE operation scales an
/// input shape dimension into an output shape dimension. Two multipliers
/// compose by element-wise multiplication of fractions.
pub type Fraction = num_rational::Ratio<i64>;

/// A 4-tuple (N,H,W,C) tensor shape. `N` is always 1 in this core; it is
/// kept as a field so offsets/strides read the same as the original
/// `TensorShape = std::array<uint32_t, 4>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorShape {
    pub n: u32,
    pub h: u32,
    pub w: u32,
    pub c: u32,
}

impl TensorShape {
    pub const fn new(n: u32, h: u32, w: u32, c: u32) -> Self {
        Self { n, h, w, c }
    }

    pub fn total_elements(&self) -> u64 {
        self.n as u64 * self.h as u64 * self.w as u64 * self.c as u64
    }

    /// Bytes required to hold this shape at `bytes_per_element`.
    pub fn total_bytes(&self, bytes_per_element: u32) -> u64 {
        self.total_elements() * bytes_per_element as u64
    }
}

/// Sum type of tensor/weight layouts in DRAM/SRAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataFormat {
    Nhwc,
    /// Brick-group packed activation format.
    Nhwcb,
    Nchw,
    /// Standard convolution weights, (H,W,InputChannels,OutputChannels).
    Hwio,
    /// Depthwise convolution weights, (H,W,InputChannels,ChannelMultiplier).
    Hwim,
    /// Already weight-encoded stream, opaque to the stripe engine.
    WeightStream,
}

impl DataFormat {
    pub fn is_weights_format(&self) -> bool {
        matches!(self, DataFormat::Hwio | DataFormat::Hwim | DataFormat::WeightStream)
    }
}

/// Where a tensor physically lives between passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferLocation {
    None,
    Sram,
    Dram,
}

/// Stripe-partitioning strategy tag. Numbering gaps (no 2 or 5) are
/// historical and preserved so external identifiers stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    None,
    S0,
    S1,
    S3,
    S4,
    S6,
    S7,
    Sx,
}

/// MCE convolution algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConvAlgorithm {
    Direct,
    Winograd,
}

/// The fixed-function operation an MCE node performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MceOperationKind {
    Convolution,
    DepthwiseConvolution,
    FullyConnected,
}

impl MceOperationKind {
    pub fn is_depthwise(&self) -> bool {
        matches!(self, MceOperationKind::DepthwiseConvolution)
    }

    pub fn is_fully_connected(&self) -> bool {
        matches!(self, MceOperationKind::FullyConnected)
    }
}

/// Upsampling applied before the MCE. `Off` means no upsampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpsampleType {
    Off,
    Nearest,
    Transpose,
}

impl UpsampleType {
    pub fn is_active(&self) -> bool {
        !matches!(self, UpsampleType::Off)
    }
}

/// PLE kernel identity. Each variant knows whether it is agnostic to a
/// requantisation that would otherwise need to be merged into the MCE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PleOperation {
    Passthrough,
    MaxPool3x3_2_2Even,
    MaxPool3x3_2_2Odd,
    Interleave2x2_2_2,
    Sigmoid,
    LeakyRelu,
    TransposeXy,
}

impl PleOperation {
    pub fn is_agnostic_to_requantisation(&self) -> bool {
        match self {
            PleOperation::Passthrough
            | PleOperation::MaxPool3x3_2_2Even
            | PleOperation::MaxPool3x3_2_2Odd
            | PleOperation::TransposeXy
            | PleOperation::Interleave2x2_2_2 => true,
            PleOperation::Sigmoid | PleOperation::LeakyRelu => false,
        }
    }

    pub fn is_maxpool_3x3(&self) -> bool {
        matches!(
            self,
            PleOperation::MaxPool3x3_2_2Even | PleOperation::MaxPool3x3_2_2Odd
        )
    }
}

/// How an operation scales its input shape into its output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeMultiplier {
    pub h: Fraction,
    pub w: Fraction,
    pub c: Fraction,
}

impl ShapeMultiplier {
    pub fn identity() -> Self {
        Self {
            h: Fraction::new(1, 1),
            w: Fraction::new(1, 1),
            c: Fraction::new(1, 1),
        }
    }

    pub fn new(h: Fraction, w: Fraction, c: Fraction) -> Self {
        Self { h, w, c }
    }

    /// Composes two multipliers by element-wise multiplication.
    pub fn compose(&self, other: &ShapeMultiplier) -> ShapeMultiplier {
        ShapeMultiplier {
            h: self.h * other.h,
            w: self.w * other.w,
            c: self.c * other.c,
        }
    }
}

impl Default for ShapeMultiplier {
    fn default() -> Self {
        Self::identity()
    }
}

/// MCE hardware tile size for one accumulator-array evaluation. The MCE
/// only supports this fixed enumerated set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockConfig {
    pub width: u32,
    pub height: u32,
}

impl BlockConfig {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// All block configs the MCE hardware supports, in no particular order;
/// callers sort this with [`crate::stripe::block_config::sort_block_configs`].
pub const ALL_BLOCK_CONFIGS: [BlockConfig; 6] = [
    BlockConfig::new(16, 16),
    BlockConfig::new(32, 8),
    BlockConfig::new(8, 32),
    BlockConfig::new(16, 8),
    BlockConfig::new(8, 16),
    BlockConfig::new(8, 8),
];

/// Read-only hardware/firmware configuration consumed by the whole engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareCapabilities {
    pub total_sram_bytes: u32,
    pub num_srams: u32,
    pub num_ogs: u32,
    pub max_ple_size: u32,
    pub boundary_stripe_height: u32,
    pub num_boundary_slots: u32,
    pub num_central_slots: u32,
    pub brick_group_shape: TensorShape,
    pub patch_shape: TensorShape,
    pub total_accumulators_per_og: u32,
}

/// Binary header version this crate understands. Bumped whenever the wire
/// layout changes; see `HardwareCapabilities::from_capability_bytes`.
pub const CAPABILITIES_HEADER_VERSION: u32 = 5;

impl HardwareCapabilities {
    /// Per-bank SRAM size: stripes are sliced evenly across SRAM banks.
    pub fn sram_bytes_per_bank(&self) -> u32 {
        self.total_sram_bytes / self.num_srams
    }

    /// A capability set useful for tests and doctests: modest SRAM, 8
    /// banks, brick group 8x8x16, patch 4x4x16 — matches the values quoted
    /// in spec.md §3.
    pub fn reference() -> Self {
        Self {
            total_sram_bytes: 1024 * 1024,
            num_srams: 8,
            num_ogs: 4,
            max_ple_size: 16 * 1024,
            boundary_stripe_height: 8,
            num_boundary_slots: 2,
            num_central_slots: 4,
            brick_group_shape: TensorShape::new(1, 8, 8, 16),
            patch_shape: TensorShape::new(1, 4, 4, 16),
            total_accumulators_per_og: 256,
        }
    }

    /// Decodes the binary-stable capability header described in spec.md §6.
    /// The first 8 bytes (`{version: u32, size: u32}`) must never move;
    /// everything after them is decoded only once the version is known to
    /// this crate.
    pub fn from_capability_bytes(bytes: &[u8]) -> PassResult<Self> {
        if bytes.len() < 8 {
            return Err(PassError::IllegalConfig(
                "capability buffer shorter than the 8 byte header".into(),
            ));
        }
        let version = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        if version != CAPABILITIES_HEADER_VERSION {
            return Err(PassError::CapabilityMismatch {
                expected: CAPABILITIES_HEADER_VERSION,
                found: version,
            });
        }
        if (bytes.len() as u32) < size {
            return Err(PassError::IllegalConfig(format!(
                "capability buffer truncated: header declares {size} bytes, got {}",
                bytes.len()
            )));
        }

        let u32_at = |offset: usize| -> PassResult<u32> {
            bytes
                .get(offset..offset + 4)
                .map(|s| u32::from_le_bytes(s.try_into().unwrap()))
                .ok_or_else(|| PassError::IllegalConfig(format!("capability buffer truncated at byte {offset}")))
        };

        // Layout mirrors FirmwareAndHardwareCapabilities: header (8),
        // command-stream range (4 x u32), then hardware config.
        let total_sram_bytes = u32_at(24)?;
        let _num_engines = u32_at(28)?;
        let num_ogs = u32_at(32)?;
        let _igs_per_engine = u32_at(36)?;
        let num_srams = u32_at(40)?;
        let max_ple_size = u32_at(44)?;
        let boundary_stripe_height = u32_at(48)?;
        let num_boundary_slots = u32_at(52)?;
        let num_central_slots = u32_at(56)?;
        let brick_group_shape = TensorShape::new(1, u32_at(64)?, u32_at(68)?, u32_at(72)?);
        let patch_shape = TensorShape::new(1, u32_at(80)?, u32_at(84)?, u32_at(88)?);
        let _mac_units_per_og = u32_at(92)?;
        let _accumulators_per_mac_unit = u32_at(96)?;
        let total_accumulators_per_og = u32_at(100)?;

        if num_srams == 0 {
            return Err(PassError::IllegalConfig("num_srams must be non-zero".into()));
        }

        Ok(Self {
            total_sram_bytes,
            num_srams,
            num_ogs,
            max_ple_size,
            boundary_stripe_height,
            num_boundary_slots,
            num_central_slots,
            brick_group_shape,
            patch_shape,
            total_accumulators_per_og,
        })
    }
}
