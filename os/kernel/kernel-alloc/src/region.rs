//! # Memory Region
//!
//! A contiguous span of high memory split into two parts:
//!
//! ```text
//! start                                                   start + pages * PAGE_SIZE
//! ┌──────────────────────┬──────────────────────────────────────────┐
//! │ descriptor pages (d) │ frame pages (f)                          │
//! │ f × PageDescriptor   │ frame 0 │ frame 1 │ ...    │ frame f - 1 │
//! └──────────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! `f` is the largest frame count whose descriptors fit into the remaining
//! `d` pages. Pages left over by that rounding are counted as descriptor pages.

use crate::descriptor::{DESCRIPTORS_PER_PAGE, PageDescriptor};
use crate::to_usize;
use core::slice;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size4K};

/// How the pages of a region are divided between descriptors and frames.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RegionLayout {
    pub descriptor_pages: usize,
    pub frame_pages: usize,
}

impl RegionLayout {
    /// Pages needed to hold the descriptors of `frames` frames.
    #[inline]
    #[must_use]
    pub const fn descriptor_pages_for(frames: usize) -> usize {
        frames.div_ceil(DESCRIPTORS_PER_PAGE)
    }

    /// Split `total_pages` into descriptor and frame pages.
    ///
    /// Starts with every page as a frame and gives up frames until the
    /// descriptors fit; `descriptor_pages + frame_pages == total_pages` holds.
    #[must_use]
    pub const fn split(total_pages: usize) -> Self {
        let mut frames = if total_pages > PageDescriptor::MAX_INDEX + 1 {
            PageDescriptor::MAX_INDEX + 1
        } else {
            total_pages
        };
        while frames > 0 && Self::descriptor_pages_for(frames) + frames > total_pages {
            frames -= 1;
        }
        Self {
            descriptor_pages: total_pages - frames,
            frame_pages: frames,
        }
    }

    #[inline]
    #[must_use]
    pub const fn total_pages(&self) -> usize {
        self.descriptor_pages + self.frame_pages
    }
}

/// Descriptor array and frame area of one managed region.
///
/// The descriptors are borrowed from the region's own first pages for `'mem`.
pub struct MemoryRegion<'mem> {
    start: PhysicalAddress,
    layout: RegionLayout,
    frames: PhysicalPage<Size4K>,
    descriptors: &'mem mut [PageDescriptor],
}

impl<'mem> MemoryRegion<'mem> {
    /// Take over `bytes` bytes of memory at `start` and mark every frame free.
    ///
    /// Trailing bytes that do not fill a whole page are ignored.
    ///
    /// # Safety
    /// The memory `[start, start + bytes)` must be valid, accessible at its
    /// physical address, and exclusively owned by the region for `'mem`.
    ///
    /// # Panics
    /// If `start` is not page aligned.
    #[must_use]
    pub unsafe fn new(start: PhysicalAddress, bytes: u64) -> Self {
        assert!(
            start.is_aligned::<Size4K>(),
            "memory region start {start} is not page aligned"
        );

        let layout = RegionLayout::split(to_usize(bytes / PAGE_SIZE));
        let frames = (start + layout.descriptor_pages as u64 * PAGE_SIZE).page::<Size4K>();

        // Safety: the descriptor pages lie inside the region owned by the caller,
        // and the page-aligned start satisfies the descriptor alignment.
        let descriptors = unsafe {
            slice::from_raw_parts_mut(
                start.as_mut_ptr::<PageDescriptor>(),
                layout.frame_pages,
            )
        };
        descriptors.fill(PageDescriptor::vacant());

        Self {
            start,
            layout,
            frames,
            descriptors,
        }
    }

    /// Number of page frames (not counting descriptor pages).
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.layout.frame_pages
    }

    #[inline]
    #[must_use]
    pub const fn layout(&self) -> RegionLayout {
        self.layout
    }

    /// First byte of the region, where the descriptors begin.
    #[inline]
    #[must_use]
    pub const fn start(&self) -> PhysicalAddress {
        self.start
    }

    /// Base address of frame 0.
    #[inline]
    #[must_use]
    pub const fn frames_start(&self) -> PhysicalAddress {
        self.frames.base()
    }

    /// One past the last byte of the last frame.
    #[inline]
    #[must_use]
    pub fn end(&self) -> PhysicalAddress {
        self.frames_start() + self.layout.frame_pages as u64 * PAGE_SIZE
    }

    /// Base address of frame `index`.
    #[inline]
    #[must_use]
    pub fn frame(&self, index: usize) -> PhysicalAddress {
        debug_assert!(index < self.size());
        self.frames.forward(index as u64).base()
    }

    /// Index of the frame that contains `addr`, if any.
    #[must_use]
    pub fn index_of(&self, addr: PhysicalAddress) -> Option<usize> {
        let index = to_usize(addr.page::<Size4K>().index_from(self.frames)?);
        (index < self.size()).then_some(index)
    }

    /// Whether `addr` lies inside one of the frames.
    #[inline]
    #[must_use]
    pub fn contains(&self, addr: PhysicalAddress) -> bool {
        self.index_of(addr).is_some()
    }

    #[inline]
    #[must_use]
    pub fn descriptors(&self) -> &[PageDescriptor] {
        &*self.descriptors
    }

    #[inline]
    pub fn descriptors_mut(&mut self) -> &mut [PageDescriptor] {
        &mut *self.descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_memory::leak_pages;

    #[test]
    fn split_small_region() {
        let layout = RegionLayout::split(130);
        assert_eq!(layout.frame_pages, 129);
        assert_eq!(layout.descriptor_pages, 1);
    }

    #[test]
    fn split_exact_fit() {
        let layout = RegionLayout::split(1025);
        assert_eq!(layout.frame_pages, 1024);
        assert_eq!(layout.descriptor_pages, 1);
    }

    #[test]
    fn split_without_exact_fit_keeps_total() {
        // 1025 frames would need 2 descriptor pages; 1024 need one, leaving a spare page.
        let layout = RegionLayout::split(1026);
        assert_eq!(layout.frame_pages, 1024);
        assert_eq!(layout.descriptor_pages, 2);
        assert_eq!(layout.total_pages(), 1026);
    }

    #[test]
    fn split_degenerate_regions() {
        assert_eq!(RegionLayout::split(0).frame_pages, 0);
        assert_eq!(RegionLayout::split(1).frame_pages, 0);
        assert_eq!(RegionLayout::split(1).descriptor_pages, 1);
        assert_eq!(RegionLayout::split(2).frame_pages, 1);
    }

    #[test]
    fn split_is_maximal() {
        for total in 2..5000 {
            let layout = RegionLayout::split(total);
            let f = layout.frame_pages;
            assert_eq!(layout.total_pages(), total);
            assert!(RegionLayout::descriptor_pages_for(f) <= layout.descriptor_pages);
            assert!(RegionLayout::descriptor_pages_for(f + 1) + f + 1 > total);
        }
    }

    #[test]
    fn new_region_marks_all_frames_free() {
        let start = leak_pages(130);
        let region = unsafe { MemoryRegion::new(start, 130 * PAGE_SIZE) };
        assert_eq!(region.size(), 129);
        assert_eq!(region.descriptors().len(), 129);
        assert!(region.descriptors().iter().all(|d| d.free() && d.next().is_none()));
        assert_eq!(region.frames_start(), start + PAGE_SIZE);
        assert_eq!(region.end(), start + 130 * PAGE_SIZE);
    }

    #[test]
    fn trailing_partial_page_is_ignored() {
        let start = leak_pages(4);
        let region = unsafe { MemoryRegion::new(start, 3 * PAGE_SIZE + 100) };
        assert_eq!(region.layout().total_pages(), 3);
        assert_eq!(region.size(), 2);
    }

    #[test]
    fn frame_index_lookup() {
        let start = leak_pages(10);
        let region = unsafe { MemoryRegion::new(start, 10 * PAGE_SIZE) };
        let base = region.frames_start();

        assert_eq!(region.index_of(base), Some(0));
        assert_eq!(region.index_of(base + 3 * PAGE_SIZE + 17), Some(3));
        assert_eq!(region.frame(3), base + 3 * PAGE_SIZE);
        assert_eq!(region.index_of(start), None);
        assert_eq!(region.index_of(region.end()), None);
    }

    #[test]
    #[should_panic(expected = "not page aligned")]
    fn unaligned_start_is_rejected() {
        let start = leak_pages(2);
        let _ = unsafe { MemoryRegion::new(start + 8, PAGE_SIZE) };
    }
}
