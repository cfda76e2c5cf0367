//! Decoded sound clips and the bank that owns them.
//!
//! Playing sounds never own sample data; they hold a [`ClipId`] into a
//! [`ClipBank`].

/// Handle to a clip stored in a [`ClipBank`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipId(u32);

impl ClipId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// 16-bit PCM samples, one buffer per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundClip {
    left: Box<[i16]>,
    right: Option<Box<[i16]>>,
}

impl SoundClip {
    pub fn mono(samples: Vec<i16>) -> Self {
        Self {
            left: samples.into_boxed_slice(),
            right: None,
        }
    }

    /// Split interleaved `L R L R ...` samples into two channels. A trailing
    /// half frame is dropped.
    pub fn from_interleaved_stereo(samples: &[i16]) -> Self {
        let frames = samples.len() / 2;
        let mut left = Vec::with_capacity(frames);
        let mut right = Vec::with_capacity(frames);
        for frame in samples.chunks_exact(2) {
            left.push(frame[0]);
            right.push(frame[1]);
        }
        Self {
            left: left.into_boxed_slice(),
            right: Some(right.into_boxed_slice()),
        }
    }

    /// Number of sample frames (per channel).
    #[inline]
    pub fn sample_count(&self) -> u32 {
        self.left.len() as u32
    }

    #[inline]
    pub fn channel_count(&self) -> u16 {
        if self.right.is_some() {
            2
        } else {
            1
        }
    }

    #[inline]
    pub fn left(&self) -> &[i16] {
        &self.left
    }

    /// Right channel; mono clips play their only channel on both sides.
    #[inline]
    pub fn right(&self) -> &[i16] {
        self.right.as_deref().unwrap_or(&self.left)
    }
}

#[derive(Debug, Default)]
pub struct ClipBank {
    clips: Vec<SoundClip>,
}

impl ClipBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, clip: SoundClip) -> ClipId {
        let id = ClipId(self.clips.len() as u32);
        tracing::debug!(
            id = id.0,
            samples = clip.sample_count(),
            channels = clip.channel_count(),
            "clip stored"
        );
        self.clips.push(clip);
        id
    }

    pub fn get(&self, id: ClipId) -> Option<&SoundClip> {
        self.clips.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_clip_duplicates_channel() {
        let clip = SoundClip::mono(vec![1, 2, 3]);
        assert_eq!(clip.sample_count(), 3);
        assert_eq!(clip.channel_count(), 1);
        assert_eq!(clip.left(), clip.right());
    }

    #[test]
    fn stereo_clip_deinterleaves() {
        let clip = SoundClip::from_interleaved_stereo(&[1, -1, 2, -2, 3]);
        assert_eq!(clip.sample_count(), 2);
        assert_eq!(clip.left(), &[1, 2]);
        assert_eq!(clip.right(), &[-1, -2]);
    }

    #[test]
    fn bank_hands_out_sequential_ids() {
        let mut bank = ClipBank::new();
        let a = bank.insert(SoundClip::mono(vec![0; 4]));
        let b = bank.insert(SoundClip::mono(vec![0; 8]));
        assert_ne!(a, b);
        assert_eq!(bank.get(b).unwrap().sample_count(), 8);
        assert_eq!(bank.len(), 2);
    }
}
