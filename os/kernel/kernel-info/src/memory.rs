//! # Memory Layout

use kernel_memory_addresses::{PageSize, Size4K};

/// Bytes per KiB, the unit of the bootloader memory report.
pub const KIB: u64 = 1024;

/// Size of a page frame managed by the page allocator.
pub const PAGE_SIZE: u64 = Size4K::SIZE;

/// Start of high (upper) memory. The bootloader reports its size
/// relative to this address, and the kernel image is loaded here.
pub const HIGHMEM_START: u64 = 0x0010_0000; // 1 MiB

/// Reserved address returned for empty (zero-sized) allocations.
///
/// Not null, not page aligned and below [`HIGHMEM_START`], so it can never
/// coincide with a real frame or slab element.
pub const EMPTY_ALLOCATION: u64 = 0x10;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(HIGHMEM_START.is_multiple_of(PAGE_SIZE));
    assert!(EMPTY_ALLOCATION != 0);
    assert!(EMPTY_ALLOCATION < HIGHMEM_START);
    assert!(!EMPTY_ALLOCATION.is_multiple_of(PAGE_SIZE));
};
