//! # Page Allocator
//!
//! First-fit allocator for runs of contiguous page frames.
//!
//! ## Design
//!
//! - Every frame of a [`MemoryRegion`] has one [`PageDescriptor`].
//! - An allocation of `n` frames marks `n` adjacent descriptors as used and
//!   links each of them to its successor, forming a *chain*. The chain head
//!   is the only address handed out; freeing it releases the whole chain.
//! - The scan starts at frame 0 and takes the lowest run that fits. Freed
//!   runs are reused before untouched frames at higher addresses.
//!
//! ## Invariants
//!
//! - A descriptor is either free without link, or used.
//! - Each chain covers strictly consecutive frames `h, h+1, ..., h+n-1` and
//!   ends in a used descriptor without link.
//! - `free_count` equals the number of free descriptors.

use crate::descriptor::PageDescriptor;
use crate::error::AllocError;
use crate::region::MemoryRegion;
use kernel_info::memory::EMPTY_ALLOCATION;
use kernel_memory_addresses::{PhysicalAddress, Size4K};
use log::{trace, warn};

pub struct PageAllocator<'mem> {
    region: MemoryRegion<'mem>,
    free: usize,
}

impl<'mem> PageAllocator<'mem> {
    #[must_use]
    pub fn new(region: MemoryRegion<'mem>) -> Self {
        let free = region.descriptors().iter().filter(|d| d.free()).count();
        Self { region, free }
    }

    /// Allocate `pages` contiguous frames and return the address of the first.
    ///
    /// A request for zero pages succeeds with [`EMPTY_ALLOCATION`] and does
    /// not touch the region.
    ///
    /// # Errors
    /// [`AllocError::OutOfPages`] if no run of `pages` free frames exists.
    pub fn allocate(&mut self, pages: usize) -> Result<PhysicalAddress, AllocError> {
        if pages == 0 {
            return Ok(PhysicalAddress::new(EMPTY_ALLOCATION));
        }

        let Some(head) = self.find_free_run(pages) else {
            warn!(
                "Out of pages: no run of {pages} frames ({} of {} free)",
                self.free,
                self.region.size()
            );
            return Err(AllocError::OutOfPages { pages });
        };

        let last = head + pages - 1;
        for (index, descriptor) in self.region.descriptors_mut()[head..=last]
            .iter_mut()
            .enumerate()
        {
            let index = head + index;
            *descriptor = PageDescriptor::used((index < last).then_some(index + 1));
        }
        self.free -= pages;

        let addr = self.region.frame(head);
        trace!("Allocated {pages} page(s) at {addr}");
        Ok(addr)
    }

    /// Release the allocation whose chain head is `addr`.
    ///
    /// The null address and [`EMPTY_ALLOCATION`] are accepted and ignored.
    ///
    /// # Panics
    /// - if `addr` is not the base of a frame in this region,
    /// - on a double free (the head is already free),
    /// - if `addr` lies inside an allocation but is not its first page,
    /// - if the chain is corrupted (a free or non-adjacent frame mid-chain).
    pub fn deallocate(&mut self, addr: PhysicalAddress) {
        if addr.is_null() || addr.as_u64() == EMPTY_ALLOCATION {
            return;
        }

        let Some(head) = self.region.index_of(addr) else {
            panic!("freeing {addr}, which is outside of the page region");
        };
        assert!(
            addr.is_aligned::<Size4K>(),
            "freeing {addr}, which is not the start of a page"
        );
        assert!(
            !self.region.descriptors()[head].free(),
            "double free of page {addr}"
        );
        assert!(
            self.is_allocation_head(addr),
            "freeing {addr}, which is not the start of an allocation"
        );

        let mut released = 0;
        let mut cursor = Some(head);
        while let Some(index) = cursor {
            let descriptor = &mut self.region.descriptors_mut()[index];
            assert!(
                !descriptor.free(),
                "free page {index} found in the chain of {addr}: memory corruption"
            );
            cursor = descriptor.next();
            *descriptor = PageDescriptor::vacant();
            released += 1;

            if let Some(next) = cursor {
                assert!(
                    next == index + 1,
                    "page {index} links to {next} in the chain of {addr}: memory corruption"
                );
            }
        }
        self.free += released;
        trace!("Freed {released} page(s) at {addr}");
    }

    fn find_free_run(&self, pages: usize) -> Option<usize> {
        if pages > self.free {
            return None;
        }

        let mut run_start = 0;
        let mut run_len = 0;
        for (index, descriptor) in self.region.descriptors().iter().enumerate() {
            if !descriptor.free() {
                run_len = 0;
                continue;
            }
            if run_len == 0 {
                run_start = index;
            }
            run_len += 1;
            if run_len == pages {
                return Some(run_start);
            }
        }
        None
    }

    /// Number of managed frames.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.region.size()
    }

    /// Number of frames currently free.
    #[inline]
    #[must_use]
    pub const fn free_count(&self) -> usize {
        self.free
    }

    #[inline]
    #[must_use]
    pub const fn region(&self) -> &MemoryRegion<'mem> {
        &self.region
    }

    /// Whether `addr` lies inside one of the managed frames.
    #[inline]
    #[must_use]
    pub fn owns(&self, addr: PhysicalAddress) -> bool {
        self.region.contains(addr)
    }

    /// Whether the frame containing `addr` is in use.
    #[must_use]
    pub fn is_allocated(&self, addr: PhysicalAddress) -> bool {
        self.region
            .index_of(addr)
            .is_some_and(|index| !self.region.descriptors()[index].free())
    }

    /// Whether `addr` is the address returned by a live allocation.
    #[must_use]
    pub fn is_allocation_head(&self, addr: PhysicalAddress) -> bool {
        if !addr.is_aligned::<Size4K>() {
            return false;
        }
        let Some(index) = self.region.index_of(addr) else {
            return false;
        };
        let descriptors = self.region.descriptors();
        !descriptors[index].free() && (index == 0 || descriptors[index - 1].next() != Some(index))
    }

    /// Number of frames in the allocation headed by `addr`.
    #[must_use]
    pub fn allocation_len(&self, addr: PhysicalAddress) -> Option<usize> {
        if !self.is_allocation_head(addr) {
            return None;
        }
        let descriptors = self.region.descriptors();
        let mut len = 0;
        let mut cursor = self.region.index_of(addr);
        while let Some(index) = cursor {
            len += 1;
            cursor = descriptors[index].next();
        }
        Some(len)
    }
}
