use thiserror::Error;

/// Transient failures reported by an audio device.
///
/// None of these are fatal: the frame's write is skipped and the next frame
/// tries again.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("could not query buffer cursors: {0}")]
    CursorQuery(String),

    #[error("could not lock {len} bytes at offset {offset}: {reason}")]
    Lock { offset: u32, len: u32, reason: String },

    #[error("could not unlock write region: {0}")]
    Unlock(String),
}
