//! SRAM accounting: the bump allocator (§4.1) and the four-tile placement
//! oracle built on top of it (§4.2).

pub mod allocator;
pub mod fits;

pub use allocator::{AllocationPreference, SramAllocator};
pub use fits::{fits_in_sram, SramPlacement};
