//! Page-aligned host memory standing in for physical memory in unit tests.

use crate::page_alloc::PageAllocator;
use crate::region::MemoryRegion;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::PhysicalAddress;
use std::alloc::{Layout, alloc_zeroed};

/// Leak `pages` zeroed, page-aligned pages.
pub fn leak_pages(pages: usize) -> PhysicalAddress {
    assert!(pages > 0);
    let page = usize::try_from(PAGE_SIZE).unwrap();
    let layout = Layout::from_size_align(pages * page, page).unwrap();
    let ptr = unsafe { alloc_zeroed(layout) };
    assert!(!ptr.is_null(), "test memory allocation failed");
    PhysicalAddress::from_ptr(ptr)
}

pub fn region(pages: usize) -> MemoryRegion<'static> {
    let start = leak_pages(pages);
    unsafe { MemoryRegion::new(start, pages as u64 * PAGE_SIZE) }
}

pub fn page_allocator(pages: usize) -> PageAllocator<'static> {
    PageAllocator::new(region(pages))
}
