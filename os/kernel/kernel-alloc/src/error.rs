//! # Allocator Errors

use kernel_memory_addresses::PhysicalAddress;

/// Recoverable allocation failures.
///
/// Misuse of the allocators (double free, foreign addresses, corrupted
/// chains) is not reported through this type; those conditions halt.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AllocError {
    #[error("no run of {pages} contiguous free pages")]
    OutOfPages { pages: usize },
    #[error("cannot obtain {pages} pages for a new slab area of size class {class}")]
    SlabConstruction { class: usize, pages: usize },
}

/// Reasons the managed high-memory region cannot be determined at boot.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum DetectError {
    #[error("bootloader didn't provide memory info")]
    MissingMemoryInfo,
    #[error("kernel image ends at {kernel_end}, past the end of high memory at {highmem_end}")]
    KernelBeyondHighMemory {
        kernel_end: PhysicalAddress,
        highmem_end: PhysicalAddress,
    },
}
