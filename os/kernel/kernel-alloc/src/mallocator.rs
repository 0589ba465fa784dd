//! # General Allocator
//!
//! Small objects are served from chains of [`SlabArea`]s, one chain per size
//! class. Class `i` holds elements of `i * granule` bytes and serves requests
//! of `(i - 1) * granule + 1 ..= i * granule` bytes. Chains grow lazily: a
//! new area is appended only when every area of the class is full.
//!
//! Requests larger than the largest class bypass the slabs and are served by
//! the page allocator directly.
//!
//! ## Storage
//!
//! The mallocator has no heap to allocate its own bookkeeping from. Areas
//! live in a fixed arena of [`MAX_AREAS`] slots; each chain is a list of
//! slot indices threaded through the arena. Once the arena is full, a class
//! that needs another area is served from whole pages instead, so only page
//! exhaustion makes a request fail.

use crate::error::AllocError;
use crate::page_alloc::PageAllocator;
use crate::slab::SlabArea;
use crate::to_usize;
use kernel_info::memory::{EMPTY_ALLOCATION, PAGE_SIZE};
use kernel_memory_addresses::{PhysicalAddress, Size4K, pages_for};
use log::{debug, warn};

/// Largest number of size classes.
pub const MAX_CHAINS: usize = 64;

/// Capacity of the slab area arena.
pub const MAX_AREAS: usize = 128;

/// Size classes of the general allocator.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MallocatorConfig {
    /// Element payload of one slab area in bytes.
    pub chain_memory: usize,
    /// Number of size classes, including the unused class `0`.
    pub chains: usize,
    /// Step between consecutive classes in bytes.
    pub granule: usize,
}

impl Default for MallocatorConfig {
    fn default() -> Self {
        Self {
            chain_memory: 1024 * 1024,
            chains: 33,
            granule: 16,
        }
    }
}

impl MallocatorConfig {
    /// Largest request served from a slab.
    #[inline]
    #[must_use]
    pub const fn max_size(&self) -> usize {
        (self.chains - 1) * self.granule
    }

    #[inline]
    #[must_use]
    pub const fn elem_size(&self, class: usize) -> usize {
        class * self.granule
    }

    /// Elements per slab area of `class`.
    #[inline]
    #[must_use]
    pub const fn elem_count(&self, class: usize) -> usize {
        self.chain_memory / self.elem_size(class)
    }
}

struct AreaSlot<'mem> {
    area: SlabArea<'mem>,
    class: usize,
    next: Option<usize>,
}

#[derive(Copy, Clone, Default)]
struct Chain {
    head: Option<usize>,
    tail: Option<usize>,
}

pub struct Mallocator<'mem> {
    config: MallocatorConfig,
    chains: [Chain; MAX_CHAINS],
    areas: [Option<AreaSlot<'mem>>; MAX_AREAS],
}

impl<'mem> Mallocator<'mem> {
    /// An allocator without any slab area.
    ///
    /// # Panics
    /// If the configuration has no usable class, more than [`MAX_CHAINS`]
    /// classes, or an area too small to hold one element of the largest class.
    #[must_use]
    pub fn new(config: MallocatorConfig) -> Self {
        assert!(config.granule > 0, "size class granule must not be zero");
        assert!(
            (2..=MAX_CHAINS).contains(&config.chains),
            "between 2 and {MAX_CHAINS} size classes supported, got {}",
            config.chains
        );
        assert!(
            config.chain_memory >= config.max_size(),
            "slab area memory {} cannot hold an element of {} bytes",
            config.chain_memory,
            config.max_size()
        );

        Self {
            config,
            chains: [Chain::default(); MAX_CHAINS],
            areas: [const { None }; MAX_AREAS],
        }
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &MallocatorConfig {
        &self.config
    }

    /// Size class serving `bytes`, or `None` if the request exceeds the largest class.
    #[inline]
    #[must_use]
    pub const fn class_of(&self, bytes: usize) -> Option<usize> {
        let class = bytes.div_ceil(self.config.granule);
        if class < self.config.chains {
            Some(class)
        } else {
            None
        }
    }

    /// Number of slab areas built so far.
    #[must_use]
    pub fn area_count(&self) -> usize {
        self.areas.iter().flatten().count()
    }

    /// Number of slab areas in the chain of `class`.
    #[must_use]
    pub fn chain_len(&self, class: usize) -> usize {
        self.chain(class).count()
    }

    /// Allocate `bytes` bytes.
    ///
    /// # Errors
    /// - [`AllocError::OutOfPages`] if a request served from whole pages
    ///   cannot be satisfied,
    /// - [`AllocError::SlabConstruction`] if the class is full and no pages
    ///   are left for another area.
    ///
    /// # Panics
    /// If a freshly built slab area cannot hand out an element.
    pub fn allocate(
        &mut self,
        pages: &mut PageAllocator<'mem>,
        bytes: usize,
    ) -> Result<PhysicalAddress, AllocError> {
        if bytes == 0 {
            return Ok(PhysicalAddress::new(EMPTY_ALLOCATION));
        }

        let Some(class) = self.class_of(bytes) else {
            debug!("Request of {bytes} bytes exceeds the size classes");
            return Self::allocate_pages(pages, bytes);
        };

        let mut cursor = self.chains[class].head;
        while let Some(index) = cursor {
            let slot = self.slot_mut(index);
            if let Some(addr) = slot.area.allocate() {
                return Ok(addr);
            }
            cursor = slot.next;
        }

        let Some(index) = self.areas.iter().position(Option::is_none) else {
            warn!("Slab area table full, serving {bytes} bytes of size class {class} from pages");
            return Self::allocate_pages(pages, bytes);
        };
        self.grow(pages, class, index)?;
        let Some(addr) = self.slot_mut(index).area.allocate() else {
            panic!("new slab area of size class {class} has no free element");
        };
        Ok(addr)
    }

    /// Free an address returned by [`allocate`](Self::allocate).
    ///
    /// The null address and [`EMPTY_ALLOCATION`] are ignored. Addresses that
    /// no slab area owns are released to the page allocator if they head a
    /// live page allocation. The page allocator does not record who made an
    /// allocation, so a head obtained from it directly is accepted as well.
    ///
    /// # Panics
    /// If `addr` is neither an element of a slab area nor the head of a page
    /// allocation, or on a double free.
    pub fn deallocate(&mut self, pages: &mut PageAllocator<'mem>, addr: PhysicalAddress) {
        if addr.is_null() || addr.as_u64() == EMPTY_ALLOCATION {
            return;
        }

        if let Some(slot) = self.areas.iter_mut().flatten().find(|s| s.area.owns(addr)) {
            assert!(
                slot.area.is_element(addr),
                "kfree of {addr}, which is not an element of a size class {} slab area",
                slot.class
            );
            slot.area.deallocate(addr);
            return;
        }

        if pages.is_allocation_head(addr) {
            pages.deallocate(addr);
            return;
        }

        panic!("kfree of {addr}, which is not owned by any allocator");
    }

    fn allocate_pages(
        pages: &mut PageAllocator<'mem>,
        bytes: usize,
    ) -> Result<PhysicalAddress, AllocError> {
        let count = to_usize(pages_for::<Size4K>(bytes as u64));
        debug!("Serving {bytes} bytes from {count} page(s)");
        pages.allocate(count)
    }

    /// Build a new slab area for `class` in the empty slot `index` and append
    /// it to the chain.
    fn grow(
        &mut self,
        pages: &mut PageAllocator<'mem>,
        class: usize,
        index: usize,
    ) -> Result<(), AllocError> {
        let elem_size = self.config.elem_size(class);
        let elem_count = self.config.elem_count(class);
        let area = SlabArea::new(pages, elem_size, elem_count);
        if !area.is_initialized() {
            return Err(AllocError::SlabConstruction {
                class,
                pages: SlabArea::required_pages(elem_size, elem_count),
            });
        }

        debug!(
            "Size class {class}: slab area {index} with {elem_count} x {elem_size} bytes ({} KiB)",
            area.pages() * to_usize(PAGE_SIZE) / 1024
        );
        self.areas[index] = Some(AreaSlot {
            area,
            class,
            next: None,
        });

        match self.chains[class].tail {
            Some(tail) => self.slot_mut(tail).next = Some(index),
            None => self.chains[class].head = Some(index),
        }
        self.chains[class].tail = Some(index);
        Ok(())
    }

    fn chain(&self, class: usize) -> impl Iterator<Item = &AreaSlot<'mem>> {
        let mut cursor = self.chains.get(class).and_then(|c| c.head);
        core::iter::from_fn(move || {
            let slot = self.areas[cursor?].as_ref()?;
            cursor = slot.next;
            Some(slot)
        })
    }

    fn slot_mut(&mut self, index: usize) -> &mut AreaSlot<'mem> {
        let Some(slot) = self.areas[index].as_mut() else {
            panic!("size class chain links to empty slab area slot {index}");
        };
        slot
    }
}
