//! The per-tensor SRAM allocation record and the aggregate `StrategyConfig`
//! a successful strategy attempt produces. See spec.md §3.

use serde::{Deserialize, Serialize};

use crate::types::{Strategy, TensorShape};

/// Describes one tensor's stripe shape and its tile placement in SRAM.
/// Invariant: `offset_bytes + tile_size_bytes <= sram_total_bytes / num_srams`
/// (per-bank addressing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SramTensorAllocation {
    pub stripe_shape: TensorShape,
    pub tile_size_bytes: u32,
    pub num_stripes_in_tile: u32,
    pub offset_bytes: u32,
}

/// The full SRAM layout and stripe-shape decision for one pass. Becomes
/// immutable once chosen; consumed by downstream command-stream emission
/// (out of scope for this crate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub input: SramTensorAllocation,
    pub output: SramTensorAllocation,
    pub weights: SramTensorAllocation,
    pub ple: SramTensorAllocation,
    pub block_width: u32,
    pub block_height: u32,
    pub strategy: Strategy,
}

impl StrategyConfig {
    /// True when the four tiles are pairwise disjoint within one SRAM bank
    /// — spec.md §8 invariant 1, checked here so tests (and callers that
    /// want a sanity check after composing a config by hand) don't have to
    /// hand-roll interval overlap math.
    pub fn tiles_are_disjoint(&self) -> bool {
        let tiles = [
            (self.input.offset_bytes, self.input.tile_size_bytes),
            (self.output.offset_bytes, self.output.tile_size_bytes),
            (self.weights.offset_bytes, self.weights.tile_size_bytes),
            (self.ple.offset_bytes, self.ple.tile_size_bytes),
        ];
        for i in 0..tiles.len() {
            for j in (i + 1)..tiles.len() {
                let (a_off, a_size) = tiles[i];
                let (b_off, b_size) = tiles[j];
                let overlap = a_off < b_off + b_size && b_off < a_off + a_size;
                if overlap {
                    return false;
                }
            }
        }
        true
    }
}
