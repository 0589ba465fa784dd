//! # Boot Memory Report

use crate::memory::KIB;

/// Memory information reported by the bootloader.
///
/// Mirrors the `mem_lower`/`mem_upper` fields of the Multiboot information
/// block. Keep this `#[repr(C)]` since it is filled in before Rust code runs.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BootMemoryInfo {
    /// Whether the bootloader provided the memory fields at all.
    pub meminfo_valid: bool,

    /// Amount of **lower** memory (starting at address 0) in KiB.
    pub low_memory_kb: u32,

    /// Amount of **upper** memory (starting at 1 MiB) in KiB.
    pub high_memory_kb: u32,
}

impl BootMemoryInfo {
    /// A valid report with the given lower and upper memory sizes.
    #[must_use]
    pub const fn new(low_memory_kb: u32, high_memory_kb: u32) -> Self {
        Self {
            meminfo_valid: true,
            low_memory_kb,
            high_memory_kb,
        }
    }

    /// A report from a bootloader that did not provide memory information.
    #[must_use]
    pub const fn missing() -> Self {
        Self {
            meminfo_valid: false,
            low_memory_kb: 0,
            high_memory_kb: 0,
        }
    }

    /// Size of upper memory in bytes, or `None` if the report is not valid.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn high_memory_bytes(&self) -> Option<u64> {
        if self.meminfo_valid {
            Some(self.high_memory_kb as u64 * KIB)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_memory_in_bytes() {
        let info = BootMemoryInfo::new(639, 130 * 4);
        assert_eq!(info.high_memory_bytes(), Some(130 * 4096));
    }

    #[test]
    fn missing_report_has_no_size() {
        assert_eq!(BootMemoryInfo::missing().high_memory_bytes(), None);
        assert_eq!(BootMemoryInfo::default(), BootMemoryInfo::missing());
    }
}
