//! Tetra Audio
//!
//! Software mixing into a looping hardware buffer:
//! - Sound clips, WAV decoding and a sine test tone
//! - A fixed table of playing sounds and the additive mixer
//! - Ring-buffer write-window computation
//! - The device seam and the per-frame push

pub mod clip;
pub mod device;
pub mod error;
pub mod mixer;
pub mod output;
pub mod sync;
pub mod tone;
pub mod wav;

pub use clip::{ClipBank, ClipId, SoundClip};
pub use device::{AudioDevice, LockedRegions, SimulatedDevice, WriteGuard};
pub use error::AudioError;
pub use mixer::{MixMode, SlotHandle, SoundSlots, MAX_SOUNDS_AT_ONCE};
pub use output::{AudioStats, FrameReport, SkipReason, SoundSystem};
pub use sync::{Cursors, RingBufferSync, SyncConfig, SyncState, WriteWindow};
pub use tone::ToneGenerator;
pub use wav::WavError;
