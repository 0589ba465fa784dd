//! # Physical Memory Address Types
//!
//! Strongly typed wrappers for raw physical addresses and page bases used by
//! the kernel's physical memory allocators.
//!
//! ## Overview
//!
//! The allocators never dereference memory through typed references handed
//! out by a heap; everything they manage is identified by its **physical
//! address**. These types keep that arithmetic explicit:
//!
//! | Concept | Generic | Description |
//! |----------|----------|-------------|
//! | [`MemoryAddress`] | – | A raw 64-bit address with alignment helpers. |
//! | [`MemoryPage<S>`] | [`S: PageSize`](PageSize) | A page-aligned base address of a page of size `S`. |
//! | [`PhysicalAddress`] | – | A [`MemoryAddress`] with physical-memory intent. |
//! | [`PhysicalPage<S>`] | [`S: PageSize`](PageSize) | A page frame in physical memory. |
//!
//! ## Page Sizes
//!
//! The kernel manages memory in [`Size4K`] frames. The [`PageSize`] trait
//! carries the size and shift as associated constants so that frame index
//! arithmetic is computed at compile time.
//!
//! ## Identity Mapping
//!
//! High memory is accessed without paging, so a physical address is also a
//! usable pointer. [`PhysicalAddress::as_mut_ptr`] performs that conversion;
//! callers remain responsible for exclusivity of the memory they touch.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x0010_2042);
//!
//! // Frame that contains the address
//! let frame = pa.page::<Size4K>();
//! assert_eq!(frame.base().as_u64(), 0x0010_2000);
//!
//! // Round up to the next frame boundary
//! assert_eq!(pa.align_up::<Size4K>().as_u64(), 0x0010_3000);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code, clippy::inline_always)]

mod memory_address;
mod memory_page;
mod page_size;
mod physical_address;
mod physical_page;

pub use memory_address::MemoryAddress;
pub use memory_page::MemoryPage;
pub use page_size::{PageSize, Size4K};
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;

/// Round `value` up to the next multiple of `align` (must be a power of two).
///
/// ```rust
/// # use kernel_memory_addresses::align_up;
/// assert_eq!(align_up(650, 4096), 4096);
/// assert_eq!(align_up(4096, 4096), 4096);
/// assert_eq!(align_up(0, 4096), 0);
/// ```
#[inline]
#[must_use]
pub const fn align_up(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    (value + (align - 1)) & !(align - 1)
}

/// Round `value` down to the previous multiple of `align` (must be a power of two).
#[inline]
#[must_use]
pub const fn align_down(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    value & !(align - 1)
}

/// Number of `S`-sized pages required to hold `bytes` bytes.
#[inline]
#[must_use]
pub const fn pages_for<S: PageSize>(bytes: u64) -> u64 {
    align_up(bytes, S::SIZE) >> S::SHIFT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        let a = MemoryAddress::new(0x12345);
        assert_eq!(a.align_down::<Size4K>().as_u64(), 0x12000);
        assert_eq!(a.align_up::<Size4K>().as_u64(), 0x13000);
        assert_eq!(a.page::<Size4K>().base().as_u64(), 0x12000);
        assert!(!a.is_aligned::<Size4K>());
        assert!(MemoryAddress::new(0x13000).is_aligned::<Size4K>());
    }

    #[test]
    fn aligned_addresses_are_fixed_points() {
        let a = PhysicalAddress::new(0x0020_0000);
        assert_eq!(a.align_up::<Size4K>(), a);
        assert_eq!(a.align_down::<Size4K>(), a);
    }

    #[test]
    fn pages_for_rounds_up() {
        assert_eq!(pages_for::<Size4K>(0), 0);
        assert_eq!(pages_for::<Size4K>(1), 1);
        assert_eq!(pages_for::<Size4K>(650), 1);
        assert_eq!(pages_for::<Size4K>(4096), 1);
        assert_eq!(pages_for::<Size4K>(4097), 2);
    }

    #[test]
    fn physical_page_index_arithmetic() {
        let base = PhysicalAddress::new(0x0010_0000);
        let frame = PhysicalPage::<Size4K>::from_addr(base + 3 * Size4K::SIZE + 17);
        assert_eq!(frame.base().as_u64(), 0x0010_3000);
        assert_eq!(frame.index_from(base.page()), Some(3));
        assert_eq!(base.page::<Size4K>().index_from(frame), None);
    }

    #[test]
    fn offset_from_is_checked() {
        let lo = PhysicalAddress::new(0x1000);
        let hi = PhysicalAddress::new(0x1800);
        assert_eq!(hi.checked_offset_from(lo), Some(0x800));
        assert_eq!(lo.checked_offset_from(hi), None);
    }
}
