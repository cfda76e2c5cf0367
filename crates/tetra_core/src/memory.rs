//! Memory management utilities
//!
//! One [`MemorySlab`] is reserved per process and carved into bump-pointer
//! [`SubStack`]s. Sub-stacks hand out [`Allocation`]s, which are byte ranges
//! addressed by offset from the start of the slab; the bytes themselves are
//! only reachable through the slab.
//!
//! Nothing is freed individually. A sub-stack releases everything it handed
//! out at once via [`SubStack::reset`], and carved regions are never returned
//! to their parent.

mod error;
mod slab;
mod stack;

use std::ops::Range;

pub use error::MemoryError;
pub use slab::MemorySlab;
pub use stack::SubStack;

/// Default alignment used by the typed allocation helpers when the caller
/// doesn't ask for anything stricter.
pub const DEFAULT_ALIGNMENT: usize = 8;

/// Alignment [`SubStack::allocate_array`] uses for values of `T`.
pub fn array_alignment<T>() -> usize {
    std::mem::align_of::<T>().max(DEFAULT_ALIGNMENT)
}

/// Bytes [`SubStack::allocate_array`] reserves for `count` values of `T`,
/// alignment slack included. `None` on overflow.
pub fn array_footprint<T>(count: usize) -> Option<usize> {
    std::mem::size_of::<T>()
        .checked_mul(count)?
        .checked_add(array_alignment::<T>())
}

pub const fn kilobytes(value: usize) -> usize {
    value * 1024
}

pub const fn megabytes(value: usize) -> usize {
    kilobytes(value) * 1024
}

/// A byte range inside the slab, as handed out by a [`SubStack`].
///
/// An allocation is only a handle. It stays valid until the sub-stack that
/// produced it is reset; using it afterwards reads whatever the next owner
/// of those bytes wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Allocation {
    offset: usize,
    len: usize,
}

impl Allocation {
    pub(crate) fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// Offset of the first byte, relative to the slab start.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

mod sealed {
    /// Bump cursor shared by every region that can be carved.
    pub trait Cursor {
        fn base_address(&self) -> usize;
        fn cursor(&self) -> usize;
        fn limit(&self) -> usize;
        fn set_cursor(&mut self, cursor: usize);
    }
}

/// A region that sub-stacks can be carved out of: the slab itself or
/// another sub-stack.
pub trait BumpRegion: sealed::Cursor {
    /// Bytes left between the bump cursor and the end of the region.
    fn remaining(&self) -> usize {
        self.limit() - self.cursor()
    }

    /// Carve a child sub-stack of exactly `bytes` bytes.
    ///
    /// Returns `None` when fewer than `bytes` bytes remain. On success the
    /// parent's cursor moves past the carved range for good.
    fn carve(&mut self, bytes: usize) -> Option<SubStack> {
        if bytes > self.remaining() {
            tracing::debug!(
                requested = bytes,
                remaining = self.remaining(),
                "carve failed: region exhausted"
            );
            return None;
        }

        let start = self.cursor();
        let end = start + bytes;
        self.set_cursor(end);
        tracing::trace!(start, end, "carved sub-stack");
        Some(SubStack::new(self.base_address(), start, end))
    }
}

impl<R: sealed::Cursor> BumpRegion for R {}
