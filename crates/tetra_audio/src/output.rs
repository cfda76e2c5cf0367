//! Per-frame audio push.
//!
//! Once per game-loop iteration [`SoundSystem::push_frame`] queries the
//! device cursors, computes the write window, mixes the playing sounds into
//! a staging buffer and copies them into the locked hardware region.

use crate::clip::{ClipBank, ClipId};
use crate::device::{AudioDevice, WriteGuard};
use crate::mixer::{self, MixMode, SlotHandle, SoundSlots};
use crate::sync::{RingBufferSync, SyncConfig, WriteWindow};
use crate::tone::ToneGenerator;

/// Why a frame's write was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    CursorQuery,
    Lock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameReport {
    Written { window: WriteWindow, frames: u32 },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioStats {
    pub frames_pushed: u64,
    pub sample_frames_written: u64,
    pub skipped: u64,
    pub zero_windows: u64,
    pub low_latency_frames: u64,
}

/// Ring-buffer state plus the table of playing sounds.
#[derive(Debug)]
pub struct SoundSystem {
    sync: RingBufferSync,
    slots: SoundSlots,
    mix_mode: MixMode,
    /// Tone added on top of the mix, with the output rate it is rendered at.
    test_tone: Option<(ToneGenerator, u32)>,
    stats: AudioStats,
}

impl SoundSystem {
    pub fn new(config: SyncConfig, mix_mode: MixMode) -> Self {
        tracing::info!(
            buffer_size = config.buffer_size,
            expected_bytes_per_frame = config.expected_bytes_per_frame,
            safety_bytes = config.safety_bytes,
            ?mix_mode,
            "sound system ready"
        );
        Self {
            sync: RingBufferSync::new(config),
            slots: SoundSlots::new(),
            mix_mode,
            test_tone: None,
            stats: AudioStats::default(),
        }
    }

    /// Add `tone` to every frame written from now on.
    pub fn enable_test_tone(&mut self, tone: ToneGenerator, samples_per_second: u32) {
        tracing::info!(hz = tone.hz, volume = tone.volume, "test tone enabled");
        self.test_tone = Some((tone, samples_per_second));
    }

    /// Number of `i16` values a staging buffer needs to hold a full ring.
    pub fn staging_len(&self) -> usize {
        let cfg = self.sync.config();
        (cfg.buffer_size / cfg.bytes_per_sample.max(1)) as usize
    }

    pub fn queue(&mut self, clip: ClipId) -> Option<SlotHandle> {
        let handle = self.slots.queue(clip);
        if handle.is_none() {
            tracing::debug!(clip = ?clip, "all sound slots busy, dropping request");
        }
        handle
    }

    pub fn slots(&self) -> &SoundSlots {
        &self.slots
    }

    pub fn sync(&self) -> &RingBufferSync {
        &self.sync
    }

    pub fn stats(&self) -> AudioStats {
        self.stats
    }

    /// Mix and push this frame's audio.
    ///
    /// `staging` is scratch space for the mix, interleaved stereo; it is
    /// cleared before use. Cursor and lock failures are logged and skip the
    /// frame.
    pub fn push_frame<D: AudioDevice + ?Sized>(
        &mut self,
        device: &mut D,
        clips: &ClipBank,
        staging: &mut [i16],
    ) -> FrameReport {
        self.stats.frames_pushed += 1;

        let cursors = match device.cursors() {
            Ok(cursors) => cursors,
            Err(err) => {
                tracing::warn!(%err, "skipping audio frame");
                self.stats.skipped += 1;
                return FrameReport::Skipped(SkipReason::CursorQuery);
            }
        };

        let window = self.sync.compute_window(cursors);
        if window.low_latency {
            self.stats.low_latency_frames += 1;
        }
        if window.bytes_to_write == 0 {
            self.stats.zero_windows += 1;
            return FrameReport::Written { window, frames: 0 };
        }

        let cfg = *self.sync.config();
        let channels = cfg.channels as usize;
        let mut frames = window.frames(cfg.block_align()) as usize;
        if frames * channels > staging.len() {
            tracing::warn!(
                frames,
                staging = staging.len(),
                "staging buffer too small, truncating write"
            );
            frames = staging.len() / channels;
        }

        let staged = &mut staging[..frames * channels];
        staged.fill(0);
        mixer::mix(&mut self.slots, clips, staged, frames, self.mix_mode);
        if let Some((tone, samples_per_second)) = &mut self.test_tone {
            tone.add_into(staged, frames, *samples_per_second);
        }

        let bytes = (frames as u32) * cfg.block_align();
        let mut guard = match WriteGuard::acquire(device, window.byte_to_lock, bytes) {
            Ok(guard) => guard,
            Err(err) => {
                tracing::warn!(%err, "skipping audio frame");
                self.stats.skipped += 1;
                return FrameReport::Skipped(SkipReason::Lock);
            }
        };

        let src: &[u8] = bytemuck::cast_slice(&*staged);
        let (region0, region1) = guard.regions();
        let (first, rest) = src.split_at(region0.len());
        region0.copy_from_slice(first);
        region1.copy_from_slice(&rest[..region1.len()]);
        let copied = (region0.len() + region1.len()) as u32 / cfg.block_align();

        if let Err(err) = guard.release() {
            tracing::warn!(%err, "audio buffer unlock failed after write");
        }

        self.sync.advance(u64::from(copied));
        self.stats.sample_frames_written += u64::from(copied);
        tracing::trace!(frames = copied, "audio frame pushed");

        FrameReport::Written {
            window,
            frames: copied,
        }
    }
}
