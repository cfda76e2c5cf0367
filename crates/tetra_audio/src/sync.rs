//! Ring-buffer write-window computation.
//!
//! The hardware plays a looping buffer of `buffer_size` bytes. Each frame we
//! continue writing right after the bytes written last frame and stop at a
//! target cursor chosen so that one to two frames of audio stay queued ahead
//! of the play cursor.

/// Constants that drive the window computation. All sizes are in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub buffer_size: u32,
    pub bytes_per_sample: u32,
    pub channels: u32,
    pub expected_bytes_per_frame: u32,
    pub safety_bytes: u32,
}

impl SyncConfig {
    /// Derive the per-frame budget and safety margin for 16-bit stereo at
    /// `samples_per_second`, driven at `target_hz`.
    ///
    /// The safety margin is half a frame's worth of samples on one channel.
    /// Budgets too large for a `u32` saturate.
    pub fn for_stereo16(samples_per_second: u32, target_hz: u32, buffer_size: u32) -> Self {
        let bytes_per_sample: u32 = 2;
        let channels: u32 = 2;
        let target_hz = u64::from(target_hz.max(1));
        let per_frame = u64::from(samples_per_second) * u64::from(bytes_per_sample * channels)
            / target_hz;
        let safety = u64::from(samples_per_second) / target_hz / 2 * u64::from(bytes_per_sample);
        Self {
            buffer_size,
            bytes_per_sample,
            channels,
            expected_bytes_per_frame: u32::try_from(per_frame).unwrap_or(u32::MAX),
            safety_bytes: u32::try_from(safety).unwrap_or(u32::MAX),
        }
    }

    pub fn with_safety_bytes(mut self, safety_bytes: u32) -> Self {
        self.safety_bytes = safety_bytes;
        self
    }

    /// Bytes per sample frame (all channels).
    #[inline]
    pub fn block_align(&self) -> u32 {
        self.bytes_per_sample * self.channels
    }
}

/// Hardware cursors, both in `[0, buffer_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursors {
    /// Where the hardware is reading.
    pub play: u32,
    /// Earliest byte the hardware allows us to touch.
    pub write: u32,
}

/// Region of the ring buffer to fill this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteWindow {
    pub byte_to_lock: u32,
    pub bytes_to_write: u32,
    pub target_cursor: u32,
    pub low_latency: bool,
}

impl WriteWindow {
    /// Whole sample frames covered by the window.
    pub fn frames(&self, block_align: u32) -> u32 {
        self.bytes_to_write / block_align.max(1)
    }
}

/// Whether the running sample index has been seeded from the hardware yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Unseeded,
    Running { running_sample_index: u64 },
}

#[derive(Debug, Clone)]
pub struct RingBufferSync {
    config: SyncConfig,
    state: SyncState,
    last_window: Option<WriteWindow>,
}

impl RingBufferSync {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            state: SyncState::Unseeded,
            last_window: None,
        }
    }

    /// Resume from a known running sample index instead of seeding from the
    /// first cursor query.
    pub fn seeded(config: SyncConfig, running_sample_index: u64) -> Self {
        Self {
            config,
            state: SyncState::Running {
                running_sample_index,
            },
            last_window: None,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn running_sample_index(&self) -> Option<u64> {
        match self.state {
            SyncState::Unseeded => None,
            SyncState::Running {
                running_sample_index,
            } => Some(running_sample_index),
        }
    }

    pub fn last_window(&self) -> Option<WriteWindow> {
        self.last_window
    }

    /// Compute where to write this frame and how much.
    ///
    /// The first call seeds the running sample index from the write cursor.
    pub fn compute_window(&mut self, cursors: Cursors) -> WriteWindow {
        let cfg = self.config;
        let size = u64::from(cfg.buffer_size.max(1));
        let block = u64::from(cfg.block_align().max(1));

        let running = match self.state {
            SyncState::Running {
                running_sample_index,
            } => running_sample_index,
            SyncState::Unseeded => {
                let seeded = u64::from(cursors.write) / block;
                tracing::debug!(
                    write_cursor = cursors.write,
                    running_sample_index = seeded,
                    "seeded running sample index"
                );
                self.state = SyncState::Running {
                    running_sample_index: seeded,
                };
                seeded
            }
        };

        // Pick up where the previous frame left off.
        let byte_to_lock = (running * block) % size;

        let play = u64::from(cursors.play);
        let write = u64::from(cursors.write);
        let expected = u64::from(cfg.expected_bytes_per_frame);
        let safety = u64::from(cfg.safety_bytes);

        let expected_frame_boundary = play + expected;

        // The reported write cursor can lag; this is the farthest ahead it
        // could really be.
        let mut safe_write_cursor = write;
        if safe_write_cursor < play {
            safe_write_cursor += size;
        }
        safe_write_cursor += safety;

        let low_latency = safe_write_cursor < expected_frame_boundary;
        let target = if low_latency {
            expected_frame_boundary + expected
        } else {
            write + expected + safety
        };
        let target_cursor = ((target % size) / block) * block;

        let bytes_to_write = bytes_between(byte_to_lock, target_cursor, size);
        let window = WriteWindow {
            byte_to_lock: byte_to_lock as u32,
            bytes_to_write: bytes_to_write as u32,
            target_cursor: target_cursor as u32,
            low_latency,
        };

        if window.bytes_to_write == 0 {
            tracing::warn!(
                byte_to_lock = window.byte_to_lock,
                target_cursor = window.target_cursor,
                play_cursor = cursors.play,
                write_cursor = cursors.write,
                "nothing to write this frame"
            );
        } else {
            tracing::trace!(?window, ?cursors, "audio write window");
        }

        self.last_window = Some(window);
        window
    }

    /// Record that `frames` sample frames were copied to the hardware.
    pub fn advance(&mut self, frames: u64) {
        if let SyncState::Running {
            running_sample_index,
        } = &mut self.state
        {
            *running_sample_index += frames;
        }
    }
}

/// Forward distance from `from` to `to` around a ring of `size` bytes.
pub fn bytes_between(from: u64, to: u64, size: u64) -> u64 {
    if from > to {
        (size - from) + to
    } else {
        to - from
    }
}
