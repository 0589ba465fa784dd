//! # Kernel Physical Memory Allocation
//!
//! This crate turns the span of RAM reported by the bootloader into reusable
//! allocation units: whole page frames and small objects. It runs on a single
//! CPU, without paging and without a heap of its own; all bookkeeping lives
//! inside the managed memory or in fixed-size tables.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Kernel Memory ([`memory`])           │
//! │    • init / alloc_pages / free_pages                │
//! │    • kmalloc / kfree                                │
//! │    • re-entrancy guard                              │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │         General Allocator ([`mallocator`])          │
//! │    • 16-byte size classes up to 512 bytes           │
//! │    • one chain of slab areas per class              │
//! │    • page fallback for larger requests              │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Slab Areas ([`slab`])                  │
//! │    • fixed-size elements with a byte map            │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │           Page Allocator ([`page_alloc`])           │
//! │    • first-fit runs of 4 KiB frames                 │
//! │    • allocation chains in the descriptor array      │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │     Memory Region ([`region`], [`descriptor`])      │
//! │    • descriptor pages + frame pages                 │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Memory Region ([`region`])
//!
//! A region is split into a descriptor area and a frame area. Each frame has
//! one 32-bit [`PageDescriptor`](descriptor::PageDescriptor) holding its free
//! flag and the index of the next frame of its allocation.
//!
//! ### Page Allocator ([`page_alloc`])
//!
//! Hands out runs of contiguous frames, lowest address first. The address
//! of the first frame identifies the allocation; freeing it releases the
//! whole run. Zero-page requests return
//! [`EMPTY_ALLOCATION`](kernel_info::memory::EMPTY_ALLOCATION).
//!
//! ### Slab Areas ([`slab`]) and the General Allocator ([`mallocator`])
//!
//! A slab area serves equally sized elements from one page allocation. The
//! general allocator keeps one chain of areas per size class and grows a
//! chain when all of its areas are full.
//!
//! ### Boot Detection ([`detect`])
//!
//! Computes the free part of high memory from the bootloader report and the
//! end of the kernel image.
//!
//! ## Error Handling
//!
//! Running out of memory is reported as [`AllocError`]. Misuse (double free,
//! freeing foreign addresses, use before initialization, re-entry) cannot be
//! recovered from at this layer and panics.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use kernel_alloc::memory;
//!
//! unsafe { memory::init(&boot_info, kernel_end) };
//!
//! let stack = memory::alloc_pages(4)?;
//! let node = memory::kmalloc(48)?;
//! memory::kfree(node);
//! memory::free_pages(stack);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod descriptor;
pub mod detect;
mod error;
pub mod mallocator;
pub mod memory;
pub mod page_alloc;
pub mod region;
pub mod slab;

#[cfg(test)]
mod test_memory;

pub use error::{AllocError, DetectError};

/// Convert a frame or byte count that fits the address space.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub(crate) const fn to_usize(value: u64) -> usize {
    value as usize
}
