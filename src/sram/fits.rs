//! `FitsInSram`: places the {input, weights, output, PLE} tiles at opposite
//! ends of one SRAM bank. See spec.md §4.2, grounded in
//! `StrategiesCommon.hpp`'s `FitsInSram`.

use crate::sram::allocator::{AllocationPreference, SramAllocator};
use crate::types::HardwareCapabilities;

/// Offsets (per-bank, in bytes) of the four tiles placed by `FitsInSram`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SramPlacement {
    pub success: bool,
    pub input_offset: u32,
    pub weight_offset: u32,
    pub output_offset: u32,
    pub ple_offset: u32,
}

/// Places PLE code, input, weights, and output tiles in `allocator`
/// (mutated in place — callers wanting "try on a copy" semantics clone the
/// allocator first, per spec.md §5). `input_preloaded_offset` is `Some`
/// when the input was produced by an earlier pass and already resides in
/// SRAM at that offset; `None` means it must be allocated fresh.
///
/// On failure, `allocator` is left in an implementation-defined state —
/// callers must only keep using the allocator when `success` is true.
pub fn fits_in_sram(
    allocator: &mut SramAllocator,
    capabilities: &HardwareCapabilities,
    input_total_bytes: u32,
    weight_total_bytes: u32,
    output_total_bytes: u32,
    input_preloaded_offset: Option<u32>,
) -> SramPlacement {
    let num_srams = capabilities.num_srams;
    let mut success = true;

    // 1. PLE code always goes low.
    let (ple_ok, ple_offset) = allocator.allocate(capabilities.max_ple_size, AllocationPreference::Start, "ple");
    success &= ple_ok;

    // 2. Input: reuse the pre-loaded offset, or allocate fresh.
    let input_offset = match input_preloaded_offset {
        Some(offset) => offset,
        None => {
            let (ok, offset) = allocator.allocate(input_total_bytes / num_srams, AllocationPreference::Start, "input");
            success &= ok;
            offset
        }
    };

    // 3. Overlap DMA with compute: put weights/output on opposite ends,
    // choosing sides based on which half of SRAM the input ended up in.
    let half = capabilities.sram_bytes_per_bank() / 2;
    let (weight_pref, output_pref) = if input_offset <= half {
        (AllocationPreference::Start, AllocationPreference::End)
    } else {
        (AllocationPreference::End, AllocationPreference::Start)
    };

    let (weight_ok, weight_offset) = allocator.allocate(weight_total_bytes / num_srams, weight_pref, "weights");
    success &= weight_ok;

    let (output_ok, output_offset) = allocator.allocate(output_total_bytes / num_srams, output_pref, "outputs");
    success &= output_ok;

    SramPlacement {
        success,
        input_offset,
        weight_offset,
        output_offset,
        ple_offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeds_when_everything_fits() {
        let caps = HardwareCapabilities::reference();
        let mut alloc = SramAllocator::new(caps.sram_bytes_per_bank());
        let placement = fits_in_sram(&mut alloc, &caps, 8 * caps.num_srams, 8 * caps.num_srams, 8 * caps.num_srams, None);
        assert!(placement.success);
    }

    #[test]
    fn adopting_the_returned_allocator_matches_direct_allocation() {
        let caps = HardwareCapabilities::reference();
        let mut via_fits = SramAllocator::new(caps.sram_bytes_per_bank());
        let placement = fits_in_sram(&mut via_fits, &caps, 8 * caps.num_srams, 8 * caps.num_srams, 8 * caps.num_srams, None);
        assert!(placement.success);

        let mut direct = SramAllocator::new(caps.sram_bytes_per_bank());
        direct.allocate(caps.max_ple_size, AllocationPreference::Start, "ple");
        direct.allocate(8, AllocationPreference::Start, "input");
        direct.allocate(8, AllocationPreference::Start, "weights");
        direct.allocate(8, AllocationPreference::End, "outputs");

        assert_eq!(via_fits, direct);
    }

    #[test]
    fn fails_when_input_alone_exceeds_sram() {
        let caps = HardwareCapabilities::reference();
        let mut alloc = SramAllocator::new(caps.sram_bytes_per_bank());
        let placement = fits_in_sram(
            &mut alloc,
            &caps,
            (caps.total_sram_bytes + caps.num_srams) * caps.num_srams,
            8,
            8,
            None,
        );
        assert!(!placement.success);
    }

    #[test]
    fn preloaded_input_reuses_its_offset_without_allocating() {
        let caps = HardwareCapabilities::reference();
        let mut alloc = SramAllocator::new(caps.sram_bytes_per_bank());
        let placement = fits_in_sram(&mut alloc, &caps, 0, 8 * caps.num_srams, 8 * caps.num_srams, Some(4096));
        assert!(placement.success);
        assert_eq!(placement.input_offset, 4096);
    }
}
