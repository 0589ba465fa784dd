//! # Kernel Configuration and Boot Interface
//!
//! This crate defines the boot-time contracts and memory layout constants that
//! the physical memory core depends on. It is the single source of truth for
//! values shared between the boot code, which produces them, and the
//! allocators, which consume them.
//!
//! ## Overview
//!
//! ### Boot Memory Report ([`boot`])
//! The bootloader reports how much memory exists below 1 MiB ("low") and
//! above it ("high"). The report carries a validity flag; a kernel booted
//! without it cannot size its allocators and must halt.
//!
//! ### Memory Layout ([`memory`])
//! Compile-time constants for the physical layout:
//! * **`PAGE_SIZE`**: the allocation unit of the page allocator
//! * **`HIGHMEM_START`**: where high memory (and the kernel image) begins
//! * **`EMPTY_ALLOCATION`**: the reserved address returned for empty requests
//!
//! ## Physical Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1 MiB)        │
//!             │  (BIOS, VGA, real-mode data)    │
//! HIGHMEM     ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │
//!             │   (Text, Data, BSS)             │
//! kernel_end  ├─────────────────────────────────┤ (rounded up to PAGE_SIZE)
//!             │    Page Descriptors             │
//!             ├─────────────────────────────────┤
//!             │    Page Frames                  │
//!             │  (Managed by the allocators)    │
//!             └─────────────────────────────────┘ HIGHMEM + high_memory_kb
//! ```
//!
//! All constants are checked by compile-time assertions.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
