//! Audio device seam.
//!
//! [`AudioDevice`] is the thin layer over whatever owns the looping hardware
//! buffer. [`WriteGuard`] holds a locked write region and unlocks it on every
//! exit path. [`SimulatedDevice`] is an in-memory stand-in used headless and
//! in tests.

use crate::error::AudioError;
use crate::sync::Cursors;
use std::ops::Range;

/// A locked write window, split in two when it wraps past the buffer end.
///
/// Region 0 starts at `offset`; region 1, if non-empty, starts at byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockedRegions {
    pub offset: u32,
    pub len0: u32,
    pub len1: u32,
}

impl LockedRegions {
    /// Split `len` bytes starting at `offset` across the end of a ring of
    /// `buffer_size` bytes.
    pub fn split(offset: u32, len: u32, buffer_size: u32) -> Self {
        let len0 = len.min(buffer_size - offset);
        Self {
            offset,
            len0,
            len1: len - len0,
        }
    }

    pub fn region0(&self) -> Range<usize> {
        self.offset as usize..(self.offset + self.len0) as usize
    }

    pub fn region1(&self) -> Range<usize> {
        0..self.len1 as usize
    }

    pub fn total(&self) -> u32 {
        self.len0 + self.len1
    }
}

pub trait AudioDevice {
    /// Size of the looping buffer in bytes.
    fn buffer_size(&self) -> u32;

    fn cursors(&mut self) -> Result<Cursors, AudioError>;

    /// Lock `len` bytes starting at `offset` for writing.
    fn lock(&mut self, offset: u32, len: u32) -> Result<LockedRegions, AudioError>;

    /// Mutable views of both regions of a lock obtained from [`lock`](Self::lock).
    fn regions_mut(&mut self, locked: &LockedRegions) -> (&mut [u8], &mut [u8]);

    fn unlock(&mut self, locked: LockedRegions) -> Result<(), AudioError>;
}

/// Scoped device lock. Dropping it unlocks; [`release`](Self::release)
/// unlocks and reports the result.
pub struct WriteGuard<'d, D: AudioDevice + ?Sized> {
    device: &'d mut D,
    locked: LockedRegions,
    released: bool,
}

impl<'d, D: AudioDevice + ?Sized> WriteGuard<'d, D> {
    pub fn acquire(device: &'d mut D, offset: u32, len: u32) -> Result<Self, AudioError> {
        let locked = device.lock(offset, len)?;
        Ok(Self {
            device,
            locked,
            released: false,
        })
    }

    pub fn locked(&self) -> LockedRegions {
        self.locked
    }

    pub fn regions(&mut self) -> (&mut [u8], &mut [u8]) {
        self.device.regions_mut(&self.locked)
    }

    pub fn release(mut self) -> Result<(), AudioError> {
        self.released = true;
        self.device.unlock(self.locked)
    }
}

impl<D: AudioDevice + ?Sized> Drop for WriteGuard<'_, D> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.device.unlock(self.locked) {
                tracing::warn!(%err, "failed to unlock audio buffer");
            }
        }
    }
}

/// In-memory looping buffer with a caller-driven play cursor.
///
/// The write cursor always sits `lookahead` bytes past the play cursor, the
/// way real hardware reserves a region it is about to read.
#[derive(Debug)]
pub struct SimulatedDevice {
    buffer: Vec<u8>,
    play: u32,
    lookahead: u32,
    locked: bool,
    fail_next_cursors: bool,
    fail_next_lock: bool,
    fail_next_unlock: bool,
}

impl SimulatedDevice {
    pub fn new(buffer_size: u32, lookahead: u32) -> Self {
        Self {
            buffer: vec![0; buffer_size as usize],
            play: 0,
            lookahead: lookahead.min(buffer_size.saturating_sub(1)),
            locked: false,
            fail_next_cursors: false,
            fail_next_lock: false,
            fail_next_unlock: false,
        }
    }

    /// Move the play cursor forward by `bytes`, wrapping.
    pub fn advance_play(&mut self, bytes: u32) {
        let size = self.buffer_size().max(1);
        self.play = ((u64::from(self.play) + u64::from(bytes)) % u64::from(size)) as u32;
    }

    pub fn set_play(&mut self, play: u32) {
        self.play = play % self.buffer_size().max(1);
    }

    pub fn fail_next_cursor_query(&mut self) {
        self.fail_next_cursors = true;
    }

    pub fn fail_next_lock(&mut self) {
        self.fail_next_lock = true;
    }

    pub fn fail_next_unlock(&mut self) {
        self.fail_next_unlock = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Buffer contents as native-endian samples.
    pub fn samples(&self) -> Vec<i16> {
        self.buffer
            .chunks_exact(2)
            .map(|b| i16::from_ne_bytes([b[0], b[1]]))
            .collect()
    }
}

impl AudioDevice for SimulatedDevice {
    fn buffer_size(&self) -> u32 {
        self.buffer.len() as u32
    }

    fn cursors(&mut self) -> Result<Cursors, AudioError> {
        if std::mem::take(&mut self.fail_next_cursors) {
            return Err(AudioError::CursorQuery("simulated failure".into()));
        }
        let size = self.buffer_size().max(1);
        Ok(Cursors {
            play: self.play,
            write: (self.play + self.lookahead) % size,
        })
    }

    fn lock(&mut self, offset: u32, len: u32) -> Result<LockedRegions, AudioError> {
        let fail = |reason: &str| AudioError::Lock {
            offset,
            len,
            reason: reason.into(),
        };
        if std::mem::take(&mut self.fail_next_lock) {
            return Err(fail("simulated failure"));
        }
        if self.locked {
            return Err(fail("buffer already locked"));
        }
        let size = self.buffer_size();
        if offset >= size || len > size {
            return Err(fail("range outside buffer"));
        }
        self.locked = true;
        Ok(LockedRegions::split(offset, len, size))
    }

    fn regions_mut(&mut self, locked: &LockedRegions) -> (&mut [u8], &mut [u8]) {
        let (head, tail) = self.buffer.split_at_mut(locked.offset as usize);
        let region0 = &mut tail[..locked.len0 as usize];
        let region1 = &mut head[..locked.len1 as usize];
        (region0, region1)
    }

    fn unlock(&mut self, _locked: LockedRegions) -> Result<(), AudioError> {
        if !self.locked {
            return Err(AudioError::Unlock("buffer is not locked".into()));
        }
        self.locked = false;
        if std::mem::take(&mut self.fail_next_unlock) {
            return Err(AudioError::Unlock("simulated failure".into()));
        }
        Ok(())
    }
}
