//! # Kernel Memory
//!
//! [`KernelMemory`] owns the whole allocator stack of one memory region:
//! the [`PageAllocator`] over the region and the [`Mallocator`] on top of it.
//!
//! The kernel keeps a single instance behind the free functions of this
//! module. It is created once by [`init`] and never torn down. Every call
//! enters a [`NonReentrant`] guard; the allocators are not reentrant, so an
//! allocation from an interrupt handler that interrupted an allocator call
//! halts the kernel instead of corrupting the descriptors.

use crate::detect::{RegionSpan, detect_highmem};
use crate::error::AllocError;
use crate::mallocator::{Mallocator, MallocatorConfig};
use crate::page_alloc::PageAllocator;
use crate::region::MemoryRegion;
use core::sync::atomic::{AtomicBool, Ordering};
use kernel_info::boot::BootMemoryInfo;
use kernel_info::memory::HIGHMEM_START;
use kernel_memory_addresses::PhysicalAddress;
use kernel_sync::NonReentrant;
use log::info;

/// Allocator state of one memory region.
pub struct KernelMemory<'mem> {
    pages: PageAllocator<'mem>,
    mallocator: Mallocator<'mem>,
}

/// Snapshot of the allocator state.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryStats {
    /// Frames managed by the page allocator.
    pub total_frames: usize,
    /// Frames not handed out. Pages backing slab areas count as used.
    pub free_frames: usize,
    /// Slab areas built by the general allocator.
    pub slab_areas: usize,
}

impl<'mem> KernelMemory<'mem> {
    /// Build the allocator stack over `span`.
    ///
    /// # Safety
    /// The memory of `span` must be valid, accessible at its physical
    /// address, and exclusively owned by the returned value for `'mem`.
    #[must_use]
    pub unsafe fn new(span: RegionSpan, config: MallocatorConfig) -> Self {
        // Safety: forwarded from the caller.
        let region = unsafe { MemoryRegion::new(span.start, span.bytes) };
        let layout = region.layout();
        info!(
            "Memory region at {}: {} descriptor page(s), {} frame(s) starting at {}",
            region.start(),
            layout.descriptor_pages,
            layout.frame_pages,
            region.frames_start()
        );

        Self {
            pages: PageAllocator::new(region),
            mallocator: Mallocator::new(config),
        }
    }

    /// Allocate `count` contiguous pages.
    ///
    /// # Errors
    /// [`AllocError::OutOfPages`] if no run of `count` free pages exists.
    #[inline]
    pub fn alloc_pages(&mut self, count: usize) -> Result<PhysicalAddress, AllocError> {
        self.pages.allocate(count)
    }

    /// Free pages returned by [`alloc_pages`](Self::alloc_pages).
    #[inline]
    pub fn free_pages(&mut self, addr: PhysicalAddress) {
        self.pages.deallocate(addr);
    }

    /// Allocate `bytes` bytes.
    ///
    /// # Errors
    /// See [`Mallocator::allocate`].
    #[inline]
    pub fn kmalloc(&mut self, bytes: usize) -> Result<PhysicalAddress, AllocError> {
        self.mallocator.allocate(&mut self.pages, bytes)
    }

    /// Free memory returned by [`kmalloc`](Self::kmalloc).
    ///
    /// Large objects are page allocations, so the head of any live page
    /// allocation is accepted, including one from
    /// [`alloc_pages`](Self::alloc_pages). Release those with
    /// [`free_pages`](Self::free_pages) instead.
    #[inline]
    pub fn kfree(&mut self, addr: PhysicalAddress) {
        self.mallocator.deallocate(&mut self.pages, addr);
    }

    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            total_frames: self.pages.size(),
            free_frames: self.pages.free_count(),
            slab_areas: self.mallocator.area_count(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn page_allocator(&self) -> &PageAllocator<'mem> {
        &self.pages
    }

    #[inline]
    #[must_use]
    pub const fn mallocator(&self) -> &Mallocator<'mem> {
        &self.mallocator
    }
}

/// The kernel's allocator stack.
static MEMORY: NonReentrant<Option<KernelMemory<'static>>> = NonReentrant::new(None);

/// Set once [`MEMORY`] holds an instance.
static DID_INIT: AtomicBool = AtomicBool::new(false);

/// Bring up the kernel allocators over the high memory above the kernel image.
///
/// # Safety
/// High memory from the end of the kernel image up to the reported size must
/// be unused and accessible at its physical address for the rest of the
/// kernel's lifetime.
///
/// # Panics
/// If the boot report is missing or inconsistent, or if called twice.
pub unsafe fn init(boot: &BootMemoryInfo, kernel_end: PhysicalAddress) {
    // Safety: forwarded from the caller.
    unsafe { init_at(boot, PhysicalAddress::new(HIGHMEM_START), kernel_end) }
}

/// [`init`] with high memory starting at `highmem_start`.
///
/// # Safety
/// See [`init`].
///
/// # Panics
/// See [`init`].
pub unsafe fn init_at(
    boot: &BootMemoryInfo,
    highmem_start: PhysicalAddress,
    kernel_end: PhysicalAddress,
) {
    let span = detect_highmem(boot, highmem_start, kernel_end).unwrap_or_else(|e| panic!("{e}"));

    let Ok(mut memory) = MEMORY.enter() else {
        panic!("memory allocator re-entered");
    };
    assert!(memory.is_none(), "memory already initialized");

    // Safety: forwarded from the caller.
    let kernel_memory = unsafe { KernelMemory::new(span, MallocatorConfig::default()) };
    let stats = kernel_memory.stats();
    *memory = Some(kernel_memory);
    DID_INIT.store(true, Ordering::Release);

    info!(
        "Memory initialized: {} frame(s) free, slabs up to {} bytes",
        stats.free_frames,
        MallocatorConfig::default().max_size()
    );
}

/// Whether [`init`] has completed.
#[inline]
#[must_use]
pub fn is_initialized() -> bool {
    DID_INIT.load(Ordering::Acquire)
}

fn with_memory<R>(f: impl FnOnce(&mut KernelMemory<'static>) -> R) -> R {
    assert!(is_initialized(), "memory was not initialized yet");
    let Ok(mut memory) = MEMORY.enter() else {
        panic!("memory allocator re-entered");
    };
    let Some(memory) = memory.as_mut() else {
        panic!("memory was not initialized yet");
    };
    f(memory)
}

/// Allocate `count` contiguous pages.
///
/// # Errors
/// [`AllocError::OutOfPages`] if no run of `count` free pages exists.
///
/// # Panics
/// Before [`init`], or when re-entered.
pub fn alloc_pages(count: usize) -> Result<PhysicalAddress, AllocError> {
    with_memory(|m| m.alloc_pages(count))
}

/// Free pages returned by [`alloc_pages`].
///
/// # Panics
/// Before [`init`], when re-entered, or on a double free.
pub fn free_pages(addr: PhysicalAddress) {
    with_memory(|m| m.free_pages(addr));
}

/// Allocate `bytes` bytes.
///
/// # Errors
/// If the size class cannot grow or, for large requests, pages run out.
///
/// # Panics
/// Before [`init`], or when re-entered.
pub fn kmalloc(bytes: usize) -> Result<PhysicalAddress, AllocError> {
    with_memory(|m| m.kmalloc(bytes))
}

/// Free memory returned by [`kmalloc`].
///
/// The head of any live page allocation is accepted as well, since large
/// objects are served from pages. Pages from [`alloc_pages`] belong to
/// [`free_pages`]; mixing the two is not detected.
///
/// # Panics
/// Before [`init`], when re-entered, on a double free, or for an address
/// that [`kmalloc`] did not return.
pub fn kfree(addr: PhysicalAddress) {
    with_memory(|m| m.kfree(addr));
}

/// Current allocator statistics.
///
/// # Panics
/// Before [`init`], or when re-entered.
#[must_use]
pub fn stats() -> MemoryStats {
    with_memory(|m| m.stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_memory::leak_pages;
    use kernel_info::memory::{EMPTY_ALLOCATION, PAGE_SIZE};

    fn kernel_memory(pages: usize) -> KernelMemory<'static> {
        let start = leak_pages(pages);
        let span = RegionSpan {
            start,
            bytes: pages as u64 * PAGE_SIZE,
        };
        unsafe {
            KernelMemory::new(
                span,
                MallocatorConfig {
                    chain_memory: 1024,
                    chains: 9,
                    granule: 16,
                },
            )
        }
    }

    #[test]
    fn pages_and_objects_share_the_region() {
        let mut m = kernel_memory(32);
        assert_eq!(m.stats().total_frames, 31);

        let pages = m.alloc_pages(3).unwrap();
        let obj = m.kmalloc(24).unwrap();
        assert!(m.page_allocator().is_allocated(obj));
        assert_eq!(
            m.stats(),
            MemoryStats {
                total_frames: 31,
                free_frames: 27,
                slab_areas: 1,
            }
        );

        m.kfree(obj);
        m.free_pages(pages);
        assert_eq!(m.stats().free_frames, 30);
        assert_eq!(m.mallocator().area_count(), 1);
    }

    #[test]
    fn empty_requests_touch_nothing() {
        let mut m = kernel_memory(8);
        let before = m.stats();
        assert_eq!(m.alloc_pages(0).unwrap().as_u64(), EMPTY_ALLOCATION);
        assert_eq!(m.kmalloc(0).unwrap().as_u64(), EMPTY_ALLOCATION);
        m.kfree(PhysicalAddress::new(EMPTY_ALLOCATION));
        m.free_pages(PhysicalAddress::zero());
        assert_eq!(m.stats(), before);
    }

    #[test]
    fn kfree_accepts_direct_page_allocations() {
        let mut m = kernel_memory(16);
        let big = m.kmalloc(3 * 4096).unwrap();
        assert_eq!(m.page_allocator().allocation_len(big), Some(3));
        m.kfree(big);
        assert_eq!(m.stats().free_frames, 15);
    }

    /// The only test in this binary touching the kernel-wide instance.
    #[test]
    #[should_panic(expected = "memory allocator re-entered")]
    fn nested_call_is_fatal() {
        let start = leak_pages(64);
        unsafe { init_at(&BootMemoryInfo::new(639, 256), start, start) };
        let _ = with_memory(|_| kmalloc(16));
    }
}
