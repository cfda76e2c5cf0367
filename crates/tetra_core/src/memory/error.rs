use bytemuck::PodCastError;
use thiserror::Error;

/// Errors raised when reserving the slab or viewing its bytes.
///
/// Running out of space is not an error: carving and allocating return
/// `None` and leave the decision to the caller.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("slab size must be non-zero")]
    EmptySlab,

    #[error("allocation {start}..{end} lies outside the slab (size {size})")]
    OutOfBounds { start: usize, end: usize, size: usize },

    #[error("allocation at offset {offset} cannot be viewed as [{type_name}]: {reason:?}")]
    Cast {
        offset: usize,
        type_name: &'static str,
        reason: PodCastError,
    },

    #[error("{given} bytes do not fit an allocation of {capacity} bytes")]
    WriteOverflow { given: usize, capacity: usize },
}
