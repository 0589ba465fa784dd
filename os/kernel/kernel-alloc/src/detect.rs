//! # High Memory Detection
//!
//! Turns the bootloader memory report into the span of memory the page
//! allocator may take over: everything in high memory above the kernel image.

use crate::error::DetectError;
use kernel_info::boot::BootMemoryInfo;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalAddress, Size4K, align_down};
use log::info;

/// Page-aligned span of free high memory.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RegionSpan {
    pub start: PhysicalAddress,
    pub bytes: u64,
}

impl RegionSpan {
    #[inline]
    #[must_use]
    pub fn end(&self) -> PhysicalAddress {
        self.start + self.bytes
    }
}

/// Locate the free part of high memory.
///
/// High memory begins at `highmem_start` and extends for the reported size,
/// rounded down to whole pages. The span starts at the page-aligned end of
/// the kernel image, or at `highmem_start` if the kernel ends below it.
///
/// # Errors
/// - [`DetectError::MissingMemoryInfo`] if the report is not valid,
/// - [`DetectError::KernelBeyondHighMemory`] if the kernel ends past high memory.
pub fn detect_highmem(
    boot: &BootMemoryInfo,
    highmem_start: PhysicalAddress,
    kernel_end: PhysicalAddress,
) -> Result<RegionSpan, DetectError> {
    let high_bytes = boot
        .high_memory_bytes()
        .ok_or(DetectError::MissingMemoryInfo)?;
    info!(
        "Detected memory: low = {} KiB, high = {} KiB",
        boot.low_memory_kb, boot.high_memory_kb
    );

    let highmem_start = highmem_start.align_up::<Size4K>();
    let highmem_end = highmem_start + align_down(high_bytes, PAGE_SIZE);
    let start = kernel_end.align_up::<Size4K>().max(highmem_start);

    let Some(bytes) = highmem_end.checked_offset_from(start) else {
        return Err(DetectError::KernelBeyondHighMemory {
            kernel_end,
            highmem_end,
        });
    };
    Ok(RegionSpan { start, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::memory::HIGHMEM_START;

    const HIGHMEM: PhysicalAddress = PhysicalAddress::new(HIGHMEM_START);

    #[test]
    fn span_starts_after_kernel() {
        let boot = BootMemoryInfo::new(639, 4096);
        let span = detect_highmem(&boot, HIGHMEM, PhysicalAddress::new(0x0012_3456)).unwrap();
        assert_eq!(span.start, PhysicalAddress::new(0x0012_4000));
        assert_eq!(span.end(), PhysicalAddress::new(0x0050_0000));
        assert_eq!(span.bytes, 0x0050_0000 - 0x0012_4000);
    }

    #[test]
    fn aligned_kernel_end_is_kept() {
        let boot = BootMemoryInfo::new(639, 4096);
        let span = detect_highmem(&boot, HIGHMEM, PhysicalAddress::new(0x0020_0000)).unwrap();
        assert_eq!(span.start, PhysicalAddress::new(0x0020_0000));
    }

    #[test]
    fn kernel_below_high_memory_starts_at_highmem() {
        let boot = BootMemoryInfo::new(639, 1024);
        let span = detect_highmem(&boot, HIGHMEM, PhysicalAddress::new(0x8000)).unwrap();
        assert_eq!(span.start, HIGHMEM);
        assert_eq!(span.bytes, 1024 * 1024);
    }

    #[test]
    fn partial_page_at_the_end_is_dropped() {
        let boot = BootMemoryInfo::new(639, 4097);
        let span = detect_highmem(&boot, HIGHMEM, HIGHMEM).unwrap();
        assert_eq!(span.bytes, 4096 * 1024);
    }

    #[test]
    fn missing_report_is_an_error() {
        let result = detect_highmem(&BootMemoryInfo::missing(), HIGHMEM, HIGHMEM);
        assert_eq!(result, Err(DetectError::MissingMemoryInfo));
    }

    #[test]
    fn kernel_past_high_memory_is_an_error() {
        let boot = BootMemoryInfo::new(639, 4);
        let kernel_end = PhysicalAddress::new(0x0020_0000);
        assert_eq!(
            detect_highmem(&boot, HIGHMEM, kernel_end),
            Err(DetectError::KernelBeyondHighMemory {
                kernel_end,
                highmem_end: PhysicalAddress::new(0x0010_1000),
            })
        );
    }

    #[test]
    fn kernel_filling_high_memory_leaves_empty_span() {
        let boot = BootMemoryInfo::new(639, 4);
        let span = detect_highmem(&boot, HIGHMEM, PhysicalAddress::new(0x0010_0800)).unwrap();
        assert_eq!(span.bytes, 0);
    }
}
