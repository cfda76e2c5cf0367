use super::{array_alignment, sealed, Allocation};

/// Bump-pointer stack over a fixed slice of the slab.
///
/// `[start, end)` is fixed when the sub-stack is carved; `current` only moves
/// forward until [`reset`](Self::reset) sends it back to `start`.
#[derive(Debug, PartialEq, Eq)]
pub struct SubStack {
    base: usize,
    start: usize,
    end: usize,
    current: usize,
    peak: usize,
}

impl SubStack {
    pub(crate) fn new(base: usize, start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self {
            base,
            start,
            end,
            current: start,
            peak: start,
        }
    }

    /// Offset of the first byte owned by this sub-stack.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Exclusive upper bound of the owned range.
    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.current - self.start
    }

    /// Highest `used()` ever observed, across resets.
    #[inline]
    pub fn peak(&self) -> usize {
        self.peak - self.start
    }

    /// Absolute address of an allocation made from this sub-stack.
    #[inline]
    pub fn address_of(&self, alloc: Allocation) -> usize {
        self.base + alloc.offset()
    }

    /// Whether `alloc` lies inside this sub-stack's range.
    pub fn contains(&self, alloc: Allocation) -> bool {
        alloc.offset() >= self.start && alloc.range().end <= self.end
    }

    /// Bump-allocate `size` bytes.
    ///
    /// Returns `None` when fewer than `size` bytes remain. The bytes are not
    /// cleared; whatever a previous owner left there is still there.
    pub fn allocate(&mut self, size: usize) -> Option<Allocation> {
        if self.end - self.current < size {
            tracing::debug!(
                requested = size,
                remaining = self.end - self.current,
                "sub-stack exhausted"
            );
            return None;
        }

        let alloc = Allocation::new(self.current, size);
        self.current += size;
        self.peak = self.peak.max(self.current);
        Some(alloc)
    }

    /// Bump-allocate `size` bytes whose absolute address is a multiple of
    /// `alignment`.
    ///
    /// Always reserves `size + alignment` bytes and moves the result forward
    /// by `alignment - misalignment`, so an address that is already aligned
    /// still skips a full `alignment` bytes. `alignment` must be a non-zero
    /// power of two.
    pub fn allocate_aligned(&mut self, size: usize, alignment: usize) -> Option<Allocation> {
        if !alignment.is_power_of_two() {
            tracing::warn!(alignment, "rejected non power-of-two alignment");
            return None;
        }

        let expanded = size.checked_add(alignment)?;
        let raw = self.allocate(expanded)?;

        let mask = alignment - 1;
        let misalignment = self.address_of(raw) & mask;
        let adjustment = alignment - misalignment;

        Some(Allocation::new(raw.offset() + adjustment, size))
    }

    /// Allocate room for `count` values of `T`, aligned for `T` (and to at
    /// least [`DEFAULT_ALIGNMENT`](super::DEFAULT_ALIGNMENT)).
    pub fn allocate_array<T>(&mut self, count: usize) -> Option<Allocation> {
        let size = std::mem::size_of::<T>().checked_mul(count)?;
        self.allocate_aligned(size, array_alignment::<T>())
    }

    /// Release everything at once. Every allocation previously handed out is
    /// invalid after this call.
    pub fn reset(&mut self) {
        tracing::trace!(start = self.start, used = self.used(), "sub-stack reset");
        self.current = self.start;
    }
}

impl sealed::Cursor for SubStack {
    fn base_address(&self) -> usize {
        self.base
    }

    fn cursor(&self) -> usize {
        self.current
    }

    fn limit(&self) -> usize {
        self.end
    }

    fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(cursor >= self.current && cursor <= self.end);
        self.current = cursor;
        self.peak = self.peak.max(self.current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{BumpRegion, MemorySlab};
    use proptest::prelude::*;

    fn stack_of(bytes: usize) -> (MemorySlab, SubStack) {
        let mut slab = MemorySlab::new(bytes * 2).unwrap();
        let stack = slab.carve(bytes).unwrap();
        (slab, stack)
    }

    #[test]
    fn kilobyte_arena_scenario() {
        let (_slab, mut stack) = stack_of(1024);

        let first = stack.allocate(600).unwrap();
        assert!(stack.allocate(500).is_none());
        assert_eq!(stack.remaining(), 424);

        stack.reset();
        let again = stack.allocate(600).unwrap();
        assert_eq!(again.offset(), first.offset());
        assert_eq!(again.offset(), stack.start());
    }

    #[test]
    fn exact_fit_succeeds() {
        let (_slab, mut stack) = stack_of(64);
        assert!(stack.allocate(64).is_some());
        assert_eq!(stack.remaining(), 0);
        assert!(stack.allocate(1).is_none());
        assert!(stack.allocate(0).is_some());
    }

    #[test]
    fn aligned_allocation_wastes_full_alignment_when_already_aligned() {
        let (_slab, mut stack) = stack_of(256);
        let marker = stack.allocate(0).unwrap();
        let addr = stack.address_of(marker);
        // Bring the cursor onto a 16-byte boundary first.
        let pad = (16 - addr % 16) % 16;
        stack.allocate(pad).unwrap();

        let before = stack.used();
        let alloc = stack.allocate_aligned(8, 16).unwrap();
        assert_eq!(stack.address_of(alloc) % 16, 0);
        assert_eq!(alloc.offset(), stack.start() + before + 16);
        assert_eq!(stack.used(), before + 8 + 16);
    }

    #[test]
    fn non_power_of_two_alignment_is_rejected() {
        let (_slab, mut stack) = stack_of(256);
        assert!(stack.allocate_aligned(8, 0).is_none());
        assert!(stack.allocate_aligned(8, 12).is_none());
        assert_eq!(stack.used(), 0);
    }

    #[test]
    fn aligned_allocation_fails_when_padding_does_not_fit() {
        let (_slab, mut stack) = stack_of(32);
        // 24 + 16 > 32 even though 24 alone would fit.
        assert!(stack.allocate_aligned(24, 16).is_none());
        assert_eq!(stack.used(), 0);
    }

    #[test]
    fn child_stack_carved_from_parent() {
        let (_slab, mut parent) = stack_of(1024);
        parent.allocate(100).unwrap();

        let mut child = parent.carve(200).unwrap();
        assert_eq!(child.start(), parent.start() + 100);
        assert_eq!(child.capacity(), 200);
        assert_eq!(parent.used(), 300);

        let alloc = child.allocate(50).unwrap();
        assert!(child.contains(alloc));
        assert!(parent.carve(1000).is_none());

        // Resetting the parent doesn't hand the child's bytes back to the
        // child's bookkeeping.
        parent.reset();
        assert_eq!(child.used(), 50);
    }

    #[test]
    fn peak_survives_reset() {
        let (_slab, mut stack) = stack_of(128);
        stack.allocate(96).unwrap();
        stack.reset();
        stack.allocate(10).unwrap();
        assert_eq!(stack.used(), 10);
        assert_eq!(stack.peak(), 96);
    }

    #[test]
    fn array_allocation_is_typed_aligned() {
        let (mut slab, mut stack) = stack_of(512);
        stack.allocate(3).unwrap();
        let alloc = stack.allocate_array::<u64>(4).unwrap();
        assert_eq!(alloc.len(), 32);
        assert_eq!(slab.slice_mut::<u64>(alloc).unwrap().len(), 4);
    }

    #[test]
    fn array_footprint_is_exactly_what_allocate_array_needs() {
        let needed = crate::memory::array_footprint::<i16>(1000).unwrap();
        assert_eq!(needed, 2000 + 8);

        let (_slab, mut stack) = stack_of(needed);
        assert!(stack.allocate_array::<i16>(1000).is_some());
        assert_eq!(stack.remaining(), 0);

        let (_slab, mut short) = stack_of(needed - 1);
        assert!(short.allocate_array::<i16>(1000).is_none());
    }

    proptest! {
        #[test]
        fn handed_out_bytes_never_exceed_span(
            capacity in 1usize..4096,
            requests in proptest::collection::vec(0usize..1024, 1..64),
        ) {
            let (_slab, mut stack) = stack_of(capacity);
            let mut handed_out = 0usize;
            for size in requests {
                let fits = capacity - handed_out >= size;
                match stack.allocate(size) {
                    Some(alloc) => {
                        prop_assert!(fits);
                        prop_assert!(stack.contains(alloc));
                        handed_out += size;
                    }
                    None => prop_assert!(!fits),
                }
                prop_assert!(handed_out <= capacity);
                prop_assert_eq!(stack.used(), handed_out);
            }
        }

        #[test]
        fn aligned_allocation_is_always_aligned(
            history in proptest::collection::vec(0usize..64, 0..16),
            size in 0usize..256,
            shift in 0u32..7,
        ) {
            let alignment = 1usize << shift;
            let (_slab, mut stack) = stack_of(8192);
            for bytes in history {
                stack.allocate(bytes).unwrap();
            }
            let alloc = stack.allocate_aligned(size, alignment).unwrap();
            prop_assert_eq!(stack.address_of(alloc) % alignment, 0);
            prop_assert!(stack.contains(alloc));
        }

        #[test]
        fn reset_returns_first_address(
            requests in proptest::collection::vec(1usize..128, 1..16),
        ) {
            let (_slab, mut stack) = stack_of(4096);
            let first = stack.allocate(requests[0]).unwrap();
            for &size in &requests[1..] {
                let _ = stack.allocate(size);
            }
            stack.reset();
            let next = stack.allocate(requests[0]).unwrap();
            prop_assert_eq!(next.offset(), first.offset());
        }
    }
}
