//! Playing-sound slots and the additive mixer.
//!
//! A fixed table of [`MAX_SOUNDS_AT_ONCE`] slots tracks which clips are
//! playing and how far along they are. Each mix pass adds every active clip
//! into an interleaved stereo buffer and retires clips that ran out.

use crate::clip::{ClipBank, ClipId};
use serde::{Deserialize, Serialize};

pub const MAX_SOUNDS_AT_ONCE: usize = 16;

/// How overlapping clips are summed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixMode {
    /// Two's-complement wraparound on overflow.
    #[default]
    Wrap,
    /// Saturate at `i16::MIN` / `i16::MAX`.
    Clamp,
}

impl MixMode {
    #[inline]
    fn accumulate(self, acc: i16, value: i16) -> i16 {
        match self {
            MixMode::Wrap => acc.wrapping_add(value),
            MixMode::Clamp => acc.saturating_add(value),
        }
    }
}

/// One slot of the table. Free when `clip` is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayingSound {
    clip: Option<ClipId>,
    last_play_location: u32,
}

impl PlayingSound {
    pub fn clip(&self) -> Option<ClipId> {
        self.clip
    }

    /// Next sample frame of the clip to be mixed.
    pub fn last_play_location(&self) -> u32 {
        self.last_play_location
    }

    pub fn is_free(&self) -> bool {
        self.clip.is_none()
    }

    fn release(&mut self) {
        self.clip = None;
        self.last_play_location = 0;
    }
}

/// Index of an occupied slot, as returned by [`SoundSlots::queue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle(usize);

impl SlotHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct SoundSlots {
    slots: [PlayingSound; MAX_SOUNDS_AT_ONCE],
}

impl SoundSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start playing `clip` from the beginning in the first free slot.
    ///
    /// Returns `None` when every slot is busy; the request is simply dropped.
    pub fn queue(&mut self, clip: ClipId) -> Option<SlotHandle> {
        let index = self.slots.iter().position(PlayingSound::is_free)?;
        self.slots[index] = PlayingSound {
            clip: Some(clip),
            last_play_location: 0,
        };
        Some(SlotHandle(index))
    }

    pub fn get(&self, handle: SlotHandle) -> &PlayingSound {
        &self.slots[handle.0]
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_free()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayingSound> {
        self.slots.iter()
    }
}

/// Add `frames` stereo frames of every playing clip into `output`.
///
/// `output` is interleaved `L R L R ...` and is accumulated into, not
/// overwritten. Each clip contributes `min(frames, samples left)` frames and
/// its slot is freed as soon as it reaches the end.
pub fn mix(
    slots: &mut SoundSlots,
    clips: &ClipBank,
    output: &mut [i16],
    frames: usize,
    mode: MixMode,
) {
    let frames = frames.min(output.len() / 2);

    for (index, slot) in slots.slots.iter_mut().enumerate() {
        let Some(id) = slot.clip else {
            continue;
        };
        let Some(clip) = clips.get(id) else {
            tracing::warn!(slot = index, clip = ?id, "playing sound refers to a missing clip");
            slot.release();
            continue;
        };

        let start = slot.last_play_location as usize;
        let samples_left = clip.left().len().saturating_sub(start);
        let count = frames.min(samples_left);

        let left = &clip.left()[start..start + count];
        let right = &clip.right()[start..start + count];
        for ((out, &l), &r) in output.chunks_exact_mut(2).zip(left).zip(right) {
            out[0] = mode.accumulate(out[0], l);
            out[1] = mode.accumulate(out[1], r);
        }

        slot.last_play_location += count as u32;
        if slot.last_play_location >= clip.sample_count() {
            tracing::trace!(slot = index, clip = ?id, "sound finished");
            slot.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::SoundClip;
    use proptest::prelude::*;

    fn ramp(len: usize) -> SoundClip {
        SoundClip::mono((1..=len as i16).collect())
    }

    #[test]
    fn queue_uses_first_free_slot() {
        let mut bank = ClipBank::new();
        let id = bank.insert(ramp(4));
        let mut slots = SoundSlots::new();

        let a = slots.queue(id).unwrap();
        let b = slots.queue(id).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(slots.active_count(), 2);
    }

    #[test]
    fn queue_fails_when_table_is_full() {
        let mut bank = ClipBank::new();
        let id = bank.insert(ramp(4));
        let mut slots = SoundSlots::new();
        for _ in 0..MAX_SOUNDS_AT_ONCE {
            assert!(slots.queue(id).is_some());
        }
        assert!(slots.queue(id).is_none());
    }

    #[test]
    fn mono_clip_is_duplicated_to_both_channels() {
        let mut bank = ClipBank::new();
        let id = bank.insert(ramp(3));
        let mut slots = SoundSlots::new();
        slots.queue(id);

        let mut out = [0i16; 8];
        mix(&mut slots, &bank, &mut out, 4, MixMode::Wrap);
        assert_eq!(out, [1, 1, 2, 2, 3, 3, 0, 0]);
    }

    #[test]
    fn stereo_clip_keeps_channels_apart() {
        let mut bank = ClipBank::new();
        let id = bank.insert(SoundClip::from_interleaved_stereo(&[10, -10, 20, -20]));
        let mut slots = SoundSlots::new();
        slots.queue(id);

        let mut out = [1i16; 4];
        mix(&mut slots, &bank, &mut out, 2, MixMode::Wrap);
        assert_eq!(out, [11, -9, 21, -19]);
    }

    #[test]
    fn shorter_clip_frees_its_slot_first() {
        let mut bank = ClipBank::new();
        let long = bank.insert(ramp(10));
        let short = bank.insert(ramp(5));
        let mut slots = SoundSlots::new();
        let a = slots.queue(long).unwrap();
        let b = slots.queue(short).unwrap();

        let mut out = vec![0i16; 10];
        mix(&mut slots, &bank, &mut out, 5, MixMode::Wrap);

        assert!(slots.get(b).is_free());
        assert_eq!(slots.get(b).last_play_location(), 0);
        assert_eq!(slots.get(a).clip(), Some(long));
        assert_eq!(slots.get(a).last_play_location(), 5);

        let mut out = vec![0i16; 10];
        mix(&mut slots, &bank, &mut out, 5, MixMode::Wrap);
        assert!(slots.get(a).is_free());
        assert_eq!(out, [6, 6, 7, 7, 8, 8, 9, 9, 10, 10]);
    }

    #[test]
    fn slot_is_not_freed_early() {
        let mut bank = ClipBank::new();
        let id = bank.insert(ramp(6));
        let mut slots = SoundSlots::new();
        let h = slots.queue(id).unwrap();

        let mut out = vec![0i16; 20];
        mix(&mut slots, &bank, &mut out, 5, MixMode::Wrap);
        assert!(!slots.get(h).is_free());
        mix(&mut slots, &bank, &mut out, 1, MixMode::Wrap);
        assert!(slots.get(h).is_free());
    }

    #[test]
    fn overflow_wraps_or_clamps() {
        let mut bank = ClipBank::new();
        let loud = bank.insert(SoundClip::mono(vec![i16::MAX]));

        let mut slots = SoundSlots::new();
        slots.queue(loud);
        slots.queue(loud);
        let mut out = [0i16; 2];
        mix(&mut slots, &bank, &mut out, 1, MixMode::Wrap);
        assert_eq!(out, [-2, -2]);

        slots.queue(loud);
        slots.queue(loud);
        let mut out = [0i16; 2];
        mix(&mut slots, &bank, &mut out, 1, MixMode::Clamp);
        assert_eq!(out, [i16::MAX, i16::MAX]);
    }

    #[test]
    fn frames_are_limited_by_output_length() {
        let mut bank = ClipBank::new();
        let id = bank.insert(ramp(8));
        let mut slots = SoundSlots::new();
        let h = slots.queue(id).unwrap();

        let mut out = [0i16; 4];
        mix(&mut slots, &bank, &mut out, 100, MixMode::Wrap);
        assert_eq!(slots.get(h).last_play_location(), 2);
    }

    #[test]
    fn missing_clip_releases_slot() {
        let mut other = ClipBank::new();
        other.insert(ramp(1));
        let stale = other.insert(ramp(1));

        let bank = ClipBank::new();
        let mut slots = SoundSlots::new();
        let h = slots.queue(stale).unwrap();
        let mut out = [0i16; 2];
        mix(&mut slots, &bank, &mut out, 1, MixMode::Wrap);
        assert!(slots.get(h).is_free());
        assert_eq!(out, [0, 0]);
    }

    proptest! {
        #[test]
        fn split_windows_match_single_window(
            samples in proptest::collection::vec(any::<i16>(), 1..64),
            first in 0usize..64,
            second in 0usize..64,
        ) {
            let mut bank = ClipBank::new();
            let id = bank.insert(SoundClip::mono(samples));

            let mut whole_slots = SoundSlots::new();
            whole_slots.queue(id);
            let mut whole = vec![0i16; (first + second) * 2];
            mix(&mut whole_slots, &bank, &mut whole, first + second, MixMode::Wrap);

            let mut split_slots = SoundSlots::new();
            split_slots.queue(id);
            let mut split = vec![0i16; (first + second) * 2];
            let (head, tail) = split.split_at_mut(first * 2);
            mix(&mut split_slots, &bank, head, first, MixMode::Wrap);
            mix(&mut split_slots, &bank, tail, second, MixMode::Wrap);

            prop_assert_eq!(whole, split);
            prop_assert_eq!(whole_slots.iter().next(), split_slots.iter().next());
        }

        #[test]
        fn slot_frees_exactly_at_end(
            len in 1usize..50,
            chunks in proptest::collection::vec(1usize..16, 1..20),
        ) {
            let mut bank = ClipBank::new();
            let id = bank.insert(SoundClip::mono(vec![1; len]));
            let mut slots = SoundSlots::new();
            let h = slots.queue(id).unwrap();

            let mut played = 0usize;
            for n in chunks {
                if slots.get(h).is_free() {
                    break;
                }
                let mut out = vec![0i16; n * 2];
                mix(&mut slots, &bank, &mut out, n, MixMode::Wrap);
                played += n;
                prop_assert_eq!(slots.get(h).is_free(), played >= len);
            }
        }
    }
}
