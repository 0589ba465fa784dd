use kernel_info::boot::BootMemoryInfo;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::PhysicalAddress;
use std::alloc::{Layout, alloc_zeroed};

/// Host memory standing in for high memory.
pub struct HighMemory {
    pub start: PhysicalAddress,
    pub boot: BootMemoryInfo,
}

/// Leak `mib` MiB of page-aligned memory and describe it as high memory.
pub fn leak_high_memory(mib: u32) -> HighMemory {
    let bytes = mib as usize * 1024 * 1024;
    let layout = Layout::from_size_align(bytes, PAGE_SIZE as usize).unwrap();
    let ptr = unsafe { alloc_zeroed(layout) };
    assert!(!ptr.is_null(), "test memory allocation failed");
    HighMemory {
        start: PhysicalAddress::from_ptr(ptr),
        boot: BootMemoryInfo::new(639, mib * 1024),
    }
}
