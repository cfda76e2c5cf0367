//! Sine test tone.

use crate::clip::SoundClip;
use std::f32::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneGenerator {
    pub hz: u32,
    pub volume: i16,
    /// Current phase in radians, kept in `[0, TAU)`.
    pub phase: f32,
}

impl Default for ToneGenerator {
    fn default() -> Self {
        Self::new(440, 3000)
    }
}

impl ToneGenerator {
    pub fn new(hz: u32, volume: i16) -> Self {
        Self {
            hz,
            volume,
            phase: 0.0,
        }
    }

    fn step(&self, samples_per_second: u32) -> f32 {
        let period = (samples_per_second / self.hz.max(1)).max(1);
        TAU / period as f32
    }

    /// Add `frames` stereo frames of the tone into `output`. The phase carries
    /// over to the next call so consecutive buffers join without a click.
    pub fn add_into(&mut self, output: &mut [i16], frames: usize, samples_per_second: u32) {
        let step = self.step(samples_per_second);
        for frame in output.chunks_exact_mut(2).take(frames) {
            self.phase += step;
            if self.phase > TAU {
                self.phase -= TAU;
            }
            let value = (f32::from(self.volume) * self.phase.sin()) as i16;
            frame[0] = frame[0].wrapping_add(value);
            frame[1] = frame[1].wrapping_add(value);
        }
    }

    /// Render `frames` samples of the tone as a mono clip.
    pub fn render_clip(&mut self, frames: usize, samples_per_second: u32) -> SoundClip {
        let step = self.step(samples_per_second);
        let samples = (0..frames)
            .map(|_| {
                self.phase += step;
                if self.phase > TAU {
                    self.phase -= TAU;
                }
                (f32::from(self.volume) * self.phase.sin()) as i16
            })
            .collect();
        SoundClip::mono(samples)
    }
}
