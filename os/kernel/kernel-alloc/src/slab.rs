//! # Slab Areas
//!
//! A slab area carves a fixed number of equally sized elements out of one
//! page allocation:
//!
//! ```text
//! base
//! ┌─────────────────────┬───────────┬───────────┬─────┬──────────────────┐
//! │ map: one byte/elem  │ element 0 │ element 1 │ ... │ element n - 1    │
//! └─────────────────────┴───────────┴───────────┴─────┴──────────────────┘
//! ```
//!
//! A map byte of `0` marks a free element, `1` a used one. Elements follow
//! the map directly and are byte aligned only.

use crate::page_alloc::PageAllocator;
use core::slice;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalAddress, Size4K, pages_for};
use log::{debug, warn};

const SLOT_FREE: u8 = 0;
const SLOT_USED: u8 = 1;

pub struct SlabArea<'mem> {
    elem_size: usize,
    elem_count: usize,
    backing: Option<Backing<'mem>>,
}

/// Pages owned by a usable area.
struct Backing<'mem> {
    /// Chain head of the page allocation.
    base: PhysicalAddress,
    pages: usize,
    map: &'mem mut [u8],
    /// First element, directly after the map.
    elements: PhysicalAddress,
}

impl<'mem> SlabArea<'mem> {
    /// Bytes needed for `elem_count` elements of `elem_size` bytes plus their map.
    #[inline]
    #[must_use]
    pub const fn required_bytes(elem_size: usize, elem_count: usize) -> usize {
        elem_size * elem_count + elem_count
    }

    /// Pages backing an area of `elem_count` elements of `elem_size` bytes.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn required_pages(elem_size: usize, elem_count: usize) -> usize {
        pages_for::<Size4K>(Self::required_bytes(elem_size, elem_count) as u64) as usize
    }

    /// Build an area for `elem_count` elements of `elem_size` bytes.
    ///
    /// If the page allocator cannot provide the backing pages the area is
    /// still returned, but [`is_initialized`](Self::is_initialized) reports
    /// `false` and it never hands out elements.
    ///
    /// # Panics
    /// If `elem_size` is zero.
    pub fn new(pages: &mut PageAllocator<'mem>, elem_size: usize, elem_count: usize) -> Self {
        assert!(elem_size > 0, "slab elements must not be empty");

        let unusable = Self {
            elem_size,
            elem_count,
            backing: None,
        };
        if elem_count == 0 {
            return unusable;
        }

        let page_count = Self::required_pages(elem_size, elem_count);
        let base = match pages.allocate(page_count) {
            Ok(base) => base,
            Err(e) => {
                warn!("Slab area of {elem_count} x {elem_size} bytes unavailable: {e}");
                return unusable;
            }
        };

        // Safety: the page allocator handed out `page_count` pages at `base`,
        // which hold at least `elem_count` map bytes. They stay allocated until
        // `release` returns them.
        let map = unsafe { slice::from_raw_parts_mut(base.as_mut_ptr::<u8>(), elem_count) };
        map.fill(SLOT_FREE);

        debug!("New slab area at {base}: {elem_count} x {elem_size} bytes in {page_count} page(s)");
        Self {
            elem_size,
            elem_count,
            backing: Some(Backing {
                base,
                pages: page_count,
                map,
                elements: base + elem_count as u64,
            }),
        }
    }

    /// Whether the backing pages were obtained.
    #[inline]
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.backing.is_some()
    }

    #[inline]
    #[must_use]
    pub const fn elem_size(&self) -> usize {
        self.elem_size
    }

    #[inline]
    #[must_use]
    pub const fn elem_count(&self) -> usize {
        self.elem_count
    }

    /// Number of backing pages, zero for an unusable area.
    #[inline]
    #[must_use]
    pub fn pages(&self) -> usize {
        self.backing.as_ref().map_or(0, |b| b.pages)
    }

    /// Number of elements not handed out.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.backing
            .as_ref()
            .map_or(0, |b| b.map.iter().filter(|&&slot| slot == SLOT_FREE).count())
    }

    /// Hand out the lowest free element.
    pub fn allocate(&mut self) -> Option<PhysicalAddress> {
        let backing = self.backing.as_mut()?;
        let index = backing.map.iter().position(|&slot| slot == SLOT_FREE)?;
        backing.map[index] = SLOT_USED;
        Some(backing.elements + (index * self.elem_size) as u64)
    }

    /// Return an element to the area. The null address is ignored.
    ///
    /// # Panics
    /// If the area is unusable, or on a double free.
    pub fn deallocate(&mut self, addr: PhysicalAddress) {
        if addr.is_null() {
            return;
        }
        debug_assert!(self.is_element(addr), "{addr} is not an element of this slab area");

        let elem_size = self.elem_size;
        let Some(backing) = self.backing.as_mut() else {
            panic!("freeing {addr} into an unusable slab area");
        };
        let Some(offset) = addr.checked_offset_from(backing.elements) else {
            panic!("freeing {addr}, which lies before the slab elements");
        };

        #[allow(clippy::cast_possible_truncation)]
        let index = offset as usize / elem_size;
        assert!(
            backing.map[index] == SLOT_USED,
            "double free of slab element {addr}"
        );
        backing.map[index] = SLOT_FREE;
    }

    /// Whether `addr` lies anywhere inside the backing pages, map included.
    #[must_use]
    pub fn owns(&self, addr: PhysicalAddress) -> bool {
        self.backing.as_ref().is_some_and(|b| {
            addr.checked_offset_from(b.base)
                .is_some_and(|offset| offset < b.pages as u64 * PAGE_SIZE)
        })
    }

    /// Whether `addr` lies inside the element storage.
    #[must_use]
    pub fn contains(&self, addr: PhysicalAddress) -> bool {
        self.element_offset(addr).is_some()
    }

    /// Whether `addr` is the start of an element.
    #[must_use]
    pub fn is_element(&self, addr: PhysicalAddress) -> bool {
        self.element_offset(addr)
            .is_some_and(|offset| offset % self.elem_size as u64 == 0)
    }

    fn element_offset(&self, addr: PhysicalAddress) -> Option<u64> {
        let backing = self.backing.as_ref()?;
        let offset = addr.checked_offset_from(backing.elements)?;
        (offset < (self.elem_count * self.elem_size) as u64).then_some(offset)
    }

    /// Give the backing pages back to the page allocator.
    pub fn release(self, pages: &mut PageAllocator<'mem>) {
        if let Some(backing) = self.backing {
            pages.deallocate(backing.base);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_memory::page_allocator;

    #[test]
    fn sizes_include_the_map() {
        assert_eq!(SlabArea::required_bytes(16, 10), 170);
        assert_eq!(SlabArea::required_pages(16, 10), 1);
        assert_eq!(SlabArea::required_pages(64, 10), 1);
        assert_eq!(SlabArea::required_pages(512, 2048), 257);
        // 4096 / 16 = 256 elements plus 256 map bytes spill into a second page
        assert_eq!(SlabArea::required_pages(16, 256), 2);
    }

    #[test]
    fn small_area_uses_one_page() {
        let mut pa = page_allocator(16);
        let free = pa.free_count();
        let area = SlabArea::new(&mut pa, 64, 10);
        assert!(area.is_initialized());
        assert_eq!(area.pages(), 1);
        assert_eq!(pa.free_count(), free - 1);
        assert_eq!(area.free_count(), 10);
    }

    #[test]
    fn hands_out_every_element_once() {
        let mut pa = page_allocator(16);
        let mut area = SlabArea::new(&mut pa, 24, 8);

        let elems: Vec<_> = (0..8).map(|_| area.allocate().unwrap()).collect();
        assert_eq!(area.allocate(), None);
        assert_eq!(area.free_count(), 0);

        let first = elems[0];
        assert_eq!(first, pa.region().frames_start() + 8);
        for (i, e) in elems.iter().enumerate() {
            assert_eq!(*e, first + (i * 24) as u64);
            assert!(area.is_element(*e));
            assert!(pa.is_allocated(*e));
        }

        // each free turns exactly one failing allocation into a success
        area.deallocate(elems[5]);
        assert_eq!(area.allocate(), Some(elems[5]));
        assert_eq!(area.allocate(), None);
    }

    #[test]
    fn elements_are_reused_lowest_first() {
        let mut pa = page_allocator(16);
        let mut area = SlabArea::new(&mut pa, 32, 4);
        let a = area.allocate().unwrap();
        let b = area.allocate().unwrap();
        let c = area.allocate().unwrap();

        area.deallocate(b);
        area.deallocate(a);
        assert_eq!(area.free_count(), 3);
        assert_eq!(area.allocate(), Some(a));
        assert_eq!(area.allocate(), Some(b));
        assert_eq!(area.allocate(), Some(c + 32));
    }

    #[test]
    fn elements_are_writable() {
        let mut pa = page_allocator(16);
        let mut area = SlabArea::new(&mut pa, 16, 4);
        let a = area.allocate().unwrap();
        let b = area.allocate().unwrap();
        unsafe {
            a.as_mut_ptr::<u8>().write_bytes(0xAA, 16);
            b.as_mut_ptr::<u8>().write_bytes(0x55, 16);
            assert_eq!(*a.as_mut_ptr::<u8>().add(15), 0xAA);
        }
        // the map was not overwritten by element data
        assert_eq!(area.free_count(), 2);
    }

    #[test]
    fn ownership_queries() {
        let mut pa = page_allocator(16);
        let area = SlabArea::new(&mut pa, 16, 4);
        let base = pa.region().frames_start();

        assert!(area.owns(base));
        assert!(!area.contains(base));
        assert!(area.contains(base + 4));
        assert!(area.is_element(base + 4 + 16));
        assert!(!area.is_element(base + 4 + 17));
        assert!(!area.contains(base + 4 + 64));
        assert!(area.owns(base + 4 + 64));
        assert!(!area.owns(base + PAGE_SIZE));
    }

    #[test]
    fn unusable_when_pages_run_out() {
        let mut pa = page_allocator(4);
        let mut area = SlabArea::new(&mut pa, 512, 64);
        assert!(!area.is_initialized());
        assert_eq!(area.pages(), 0);
        assert_eq!(area.allocate(), None);
        assert!(!area.owns(pa.region().frames_start()));
        assert_eq!(pa.free_count(), pa.size());
    }

    #[test]
    fn release_returns_pages() {
        let mut pa = page_allocator(16);
        let free = pa.free_count();
        let mut area = SlabArea::new(&mut pa, 100, 100);
        assert_eq!(area.pages(), 3);
        let _ = area.allocate().unwrap();

        area.release(&mut pa);
        assert_eq!(pa.free_count(), free);
    }

    #[test]
    #[should_panic(expected = "double free of slab element")]
    fn double_free_is_fatal() {
        let mut pa = page_allocator(16);
        let mut area = SlabArea::new(&mut pa, 16, 4);
        let a = area.allocate().unwrap();
        area.deallocate(a);
        area.deallocate(a);
    }
}
