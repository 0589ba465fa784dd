//! # Page Descriptors
//!
//! One 32-bit word per managed frame. Descriptors of a region are stored as a
//! contiguous array at the start of the region, indexed by frame number.

use bitfield_struct::bitfield;
use kernel_info::memory::PAGE_SIZE;

/// State of a single page frame.
///
/// Frames handed out together by one allocation form a *chain*: each
/// descriptor except the last links to the next frame of the allocation.
/// Links are stored as `index + 1` so that an all-zero word is a used
/// frame without successor.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageDescriptor {
    /// Frame is available for allocation.
    pub free: bool,
    /// Index of the next frame in the chain plus one; `0` ends the chain.
    #[bits(31)]
    link: u32,
}

impl PageDescriptor {
    /// Largest frame index a link can encode.
    pub const MAX_INDEX: usize = (1 << 31) - 2;

    /// A free frame without successor.
    #[inline]
    #[must_use]
    pub const fn vacant() -> Self {
        Self::new().with_free(true)
    }

    /// A used frame, optionally followed by `next` in its chain.
    #[inline]
    #[must_use]
    pub const fn used(next: Option<usize>) -> Self {
        Self::new().with_link(Self::encode(next))
    }

    /// Index of the next frame in the chain.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<usize> {
        match self.link() {
            0 => None,
            link => Some(link as usize - 1),
        }
    }

    #[inline]
    pub fn set_next(&mut self, next: Option<usize>) {
        self.set_link(Self::encode(next));
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn encode(next: Option<usize>) -> u32 {
        match next {
            None => 0,
            Some(index) => {
                assert!(index <= Self::MAX_INDEX, "frame index exceeds descriptor link range");
                index as u32 + 1
            }
        }
    }
}

/// Number of descriptors that fit into one page.
#[allow(clippy::cast_possible_truncation)]
pub const DESCRIPTORS_PER_PAGE: usize = PAGE_SIZE as usize / size_of::<PageDescriptor>();

const _: () = {
    assert!(size_of::<PageDescriptor>() == 4);
    assert!(DESCRIPTORS_PER_PAGE == 1024);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vacant_descriptor_is_free_without_link() {
        let d = PageDescriptor::vacant();
        assert!(d.free());
        assert_eq!(d.next(), None);
    }

    #[test]
    fn zero_word_is_used_chain_end() {
        let d = PageDescriptor::from_bits(0);
        assert!(!d.free());
        assert_eq!(d.next(), None);
        assert_eq!(d, PageDescriptor::used(None));
    }

    #[test]
    fn link_encodes_index_zero() {
        let d = PageDescriptor::used(Some(0));
        assert!(!d.free());
        assert_eq!(d.next(), Some(0));
        assert_eq!(d.into_bits(), 1 << 1);
    }

    #[test]
    fn largest_index_round_trips() {
        let d = PageDescriptor::used(Some(PageDescriptor::MAX_INDEX));
        assert_eq!(d.next(), Some(PageDescriptor::MAX_INDEX));
    }
}
