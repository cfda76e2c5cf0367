use super::{sealed, Allocation, MemoryError};
use bytemuck::Pod;

/// The single up-front reservation every sub-stack is carved from.
///
/// The slab owns its bytes for its whole lifetime and never moves them, so
/// the absolute address of an allocation (`base_address() + offset`) is
/// stable and is what alignment is measured against.
pub struct MemorySlab {
    storage: Box<[u8]>,
    current: usize,
}

impl MemorySlab {
    /// Reserve `size` zeroed bytes.
    pub fn new(size: usize) -> Result<Self, MemoryError> {
        if size == 0 {
            return Err(MemoryError::EmptySlab);
        }
        let storage = vec![0u8; size].into_boxed_slice();
        tracing::info!(
            size,
            base = format_args!("{:#x}", storage.as_ptr() as usize),
            "reserved memory slab"
        );
        Ok(Self {
            storage,
            current: 0,
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.storage.len()
    }

    /// Bytes already carved away.
    #[inline]
    pub fn used(&self) -> usize {
        self.current
    }

    /// Absolute address of the first byte of the slab.
    #[inline]
    pub fn base_address(&self) -> usize {
        self.storage.as_ptr() as usize
    }

    pub fn bytes(&self, alloc: Allocation) -> Result<&[u8], MemoryError> {
        let size = self.size();
        self.storage
            .get(alloc.range())
            .ok_or(MemoryError::OutOfBounds {
                start: alloc.offset(),
                end: alloc.range().end,
                size,
            })
    }

    pub fn bytes_mut(&mut self, alloc: Allocation) -> Result<&mut [u8], MemoryError> {
        let size = self.size();
        self.storage
            .get_mut(alloc.range())
            .ok_or(MemoryError::OutOfBounds {
                start: alloc.offset(),
                end: alloc.range().end,
                size,
            })
    }

    /// View an allocation as a slice of `T`.
    ///
    /// Fails when the allocation is not aligned for `T` or its length isn't
    /// a multiple of `size_of::<T>()`.
    pub fn slice<T: Pod>(&self, alloc: Allocation) -> Result<&[T], MemoryError> {
        let bytes = self.bytes(alloc)?;
        bytemuck::try_cast_slice(bytes).map_err(|reason| MemoryError::Cast {
            offset: alloc.offset(),
            type_name: std::any::type_name::<T>(),
            reason,
        })
    }

    pub fn slice_mut<T: Pod>(&mut self, alloc: Allocation) -> Result<&mut [T], MemoryError> {
        let bytes = self.bytes_mut(alloc)?;
        bytemuck::try_cast_slice_mut(bytes).map_err(|reason| MemoryError::Cast {
            offset: alloc.offset(),
            type_name: std::any::type_name::<T>(),
            reason,
        })
    }

    /// Copy `values` to the front of `alloc`.
    pub fn write<T: Pod>(&mut self, alloc: Allocation, values: &[T]) -> Result<(), MemoryError> {
        let src: &[u8] = bytemuck::cast_slice(values);
        if src.len() > alloc.len() {
            return Err(MemoryError::WriteOverflow {
                given: src.len(),
                capacity: alloc.len(),
            });
        }
        self.bytes_mut(alloc)?[..src.len()].copy_from_slice(src);
        Ok(())
    }

    /// Explicitly clear an allocation. Sub-stacks never zero on their own.
    pub fn zero(&mut self, alloc: Allocation) -> Result<(), MemoryError> {
        self.bytes_mut(alloc)?.fill(0);
        Ok(())
    }
}

impl sealed::Cursor for MemorySlab {
    fn base_address(&self) -> usize {
        MemorySlab::base_address(self)
    }

    fn cursor(&self) -> usize {
        self.current
    }

    fn limit(&self) -> usize {
        self.storage.len()
    }

    fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(cursor >= self.current && cursor <= self.storage.len());
        self.current = cursor;
    }
}

impl std::fmt::Debug for MemorySlab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySlab")
            .field("base", &format_args!("{:#x}", self.base_address()))
            .field("size", &self.size())
            .field("current", &self.current)
            .finish()
    }
}
