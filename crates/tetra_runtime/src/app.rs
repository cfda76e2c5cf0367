//! Application state: the arena, the scene and the sound system.

use crate::palette::{Color, Palette, SCENE_COLORS};
use crate::scene::{MeshData, Rig, Scene};
use anyhow::{Context, Result};
use std::f32::consts::TAU;
use std::path::Path;
use std::time::Duration;
use tetra_audio::{
    wav, AudioDevice, AudioStats, ClipBank, ClipId, FrameReport, SimulatedDevice, SoundSystem,
    SyncConfig, ToneGenerator,
};
use tetra_core::glam::Vec2;
use tetra_core::memory::{BumpRegion, MemorySlab, SubStack};
use tetra_core::time::FrameClock;
use tetra_services::Settings;

const PALETTE_COLORS: u8 = 16;
const PALETTE_NAME_BYTES: u16 = 256;
const TONE_HZ: u32 = 440;
const TONE_VOLUME: i16 = 3000;
const TONE_SECONDS: usize = 2;
/// Full rig bobs per second.
const BOB_HZ: f32 = 0.5;

pub struct App {
    slab: MemorySlab,
    /// Per-frame scratch, reset at the top of every frame.
    systems: SubStack,
    /// Lives for the whole run.
    resident: SubStack,
    palette: Palette,
    scene: Scene,
    rig: Rig,
    clips: ClipBank,
    background: ClipId,
    background_queued: bool,
    sound: SoundSystem,
    device: SimulatedDevice,
    clock: FrameClock,
    samples_per_second: u32,
    /// Fractional sample frames the device has played but not yet counted.
    play_carry: f64,
}

impl App {
    /// Reserve memory, build the scene and load the background sound.
    ///
    /// `sound` is a WAV file to use as background; without one a sine tone is
    /// synthesized.
    pub fn init(settings: &Settings, sound: Option<&Path>) -> Result<Self> {
        settings.validate()?;
        tracing::info!("Tetra v{}", tetra_core::VERSION);

        let memory = &settings.memory;
        let mut slab = MemorySlab::new(memory.slab_bytes).context("reserving memory slab")?;
        let systems = slab
            .carve(memory.systems_stack_bytes)
            .context("carving the systems stack")?;
        let mut resident = slab
            .carve(memory.resident_stack_bytes)
            .context("carving the resident stack")?;

        let mut palette = Palette::create(&mut resident, PALETTE_COLORS, PALETTE_NAME_BYTES)?;
        for (name, rgb) in SCENE_COLORS {
            palette.insert(&mut slab, name, Color::rgb8(rgb))?;
        }
        let teal = palette
            .get(&slab, "Teal")?
            .context("palette is missing Teal")?;
        palette.insert(&mut slab, "TealComplement", teal.complement())?;

        let mesh = MeshData::tetrahedron(&mut resident, &mut slab)?;
        let scene = Scene::new(mesh, &palette, &slab)?;
        let rig = Rig::new(&mut resident, &mut slab)?;
        let light_color = palette.color(&slab, scene.light_color)?;
        let shadow_color = palette.color(&slab, scene.shadow_color)?;
        tracing::debug!(
            vertices = scene.mesh.count,
            light = ?scene.light_direction,
            ?light_color,
            ?shadow_color,
            "scene ready"
        );

        let audio = &settings.audio;
        let buffer_bytes = audio
            .buffer_bytes()
            .context("audio buffer size overflows")?;
        let config = SyncConfig::for_stereo16(
            audio.samples_per_second,
            settings.display.target_hz,
            buffer_bytes,
        );
        let mut sound_system = SoundSystem::new(config, audio.mix_mode);
        if audio.test_tone {
            sound_system.enable_test_tone(
                ToneGenerator::new(TONE_HZ, TONE_VOLUME),
                audio.samples_per_second,
            );
        }
        let device = SimulatedDevice::new(buffer_bytes, audio.device_lookahead_bytes);

        let clip = match sound {
            Some(path) => wav::load(path, audio.samples_per_second)
                .with_context(|| format!("loading background sound {}", path.display()))?,
            None => {
                tracing::info!(hz = TONE_HZ, "no background sound given, using a test tone");
                ToneGenerator::new(TONE_HZ, TONE_VOLUME).render_clip(
                    audio.samples_per_second as usize * TONE_SECONDS,
                    audio.samples_per_second,
                )
            }
        };
        let mut clips = ClipBank::new();
        let background = clips.insert(clip);

        tracing::info!(
            slab_used = slab.used(),
            resident_used = resident.used(),
            "initialised"
        );

        Ok(Self {
            slab,
            systems,
            resident,
            palette,
            scene,
            rig,
            clips,
            background,
            background_queued: false,
            sound: sound_system,
            device,
            clock: FrameClock::new(settings.display.target_hz),
            samples_per_second: audio.samples_per_second,
            play_carry: 0.0,
        })
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Advance the simulated hardware's play cursor by `dt` worth of audio.
    fn advance_device(&mut self, dt: Duration) {
        let frames = dt.as_secs_f64() * f64::from(self.samples_per_second) + self.play_carry;
        let whole = frames.floor();
        self.play_carry = frames - whole;
        let block_align = self.sound.sync().config().block_align();
        let bytes = (whole as u64 * u64::from(block_align)) % u64::from(self.device.buffer_size());
        self.device.advance_play(bytes as u32);
    }

    /// Run one frame of `dt`.
    pub fn frame(&mut self, dt: Duration) -> Result<FrameReport> {
        self.systems.reset();

        self.scene.update(dt.as_secs_f32() * 1000.0, Vec2::ZERO);
        let phase = self.clock.total_time().as_secs_f32() * BOB_HZ * TAU;
        self.rig.pose(&mut self.slab, 0.5 - 0.5 * phase.cos())?;
        self.rig.apply(&self.slab, &mut self.scene)?;

        if !self.background_queued {
            if self.sound.queue(self.background).is_none() {
                tracing::warn!("no free slot for the background sound");
            }
            self.background_queued = true;
        }

        self.advance_device(dt);

        let staging = self
            .systems
            .allocate_array::<i16>(self.sound.staging_len())
            .context("systems stack too small for the audio staging buffer")?;
        let staging = self.slab.slice_mut::<i16>(staging)?;
        let report = self.sound.push_frame(&mut self.device, &self.clips, staging);

        self.clock.advance(dt);
        Ok(report)
    }

    /// Log the run's statistics and release both stacks.
    pub fn teardown(mut self) -> AudioStats {
        let stats = self.sound.stats();
        tracing::info!(
            frames = self.clock.frame_count(),
            seconds = self.clock.total_time().as_secs_f32(),
            audio_frames = stats.frames_pushed,
            sample_frames = stats.sample_frames_written,
            skipped = stats.skipped,
            zero_windows = stats.zero_windows,
            low_latency = stats.low_latency_frames,
            "shutting down"
        );
        tracing::info!(
            systems_peak = self.systems.peak(),
            resident_used = self.resident.used(),
            slab_used = self.slab.used(),
            "memory usage"
        );
        self.systems.reset();
        self.resident.reset();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tetra_audio::SkipReason;

    fn small_settings() -> Settings {
        let mut settings = Settings::default();
        settings.memory.slab_bytes = 1024 * 1024;
        settings
    }

    #[test]
    fn runs_frames_with_a_tone() {
        let settings = small_settings();
        let mut app = App::init(&settings, None).unwrap();
        let dt = app.clock().frame_duration();

        for _ in 0..10 {
            let report = app.frame(dt).unwrap();
            assert!(matches!(report, FrameReport::Written { frames, .. } if frames > 0));
        }
        assert_eq!(app.sound.slots().active_count(), 1);
        assert_eq!(app.clock().frame_count(), 10);

        let stats = app.teardown();
        assert_eq!(stats.frames_pushed, 10);
        assert_eq!(stats.skipped, 0);
        assert!(stats.sample_frames_written >= 10 * 800);
    }

    #[test]
    fn background_is_queued_once() {
        let settings = small_settings();
        let mut app = App::init(&settings, None).unwrap();
        let dt = app.clock().frame_duration();
        app.frame(dt).unwrap();
        app.frame(dt).unwrap();
        assert_eq!(app.sound.slots().active_count(), 1);
    }

    #[test]
    fn palette_has_scene_colours_and_complement() {
        let app = App::init(&small_settings(), None).unwrap();
        assert_eq!(app.palette.len(), SCENE_COLORS.len() + 1);
        assert!(app
            .palette
            .get(&app.slab, "TealComplement")
            .unwrap()
            .is_some());
    }

    #[test]
    fn missing_sound_file_fails_init() {
        let result = App::init(&small_settings(), Some(Path::new("/no/such/sound.wav")));
        assert!(result.is_err());
    }

    #[test]
    fn invalid_settings_fail_init() {
        let mut settings = small_settings();
        settings.memory.systems_stack_bytes = 1024;
        assert!(App::init(&settings, None).is_err());
    }

    #[test]
    fn staging_boundary_settings_run() {
        let mut settings = small_settings();
        settings.memory.systems_stack_bytes = 192_000;
        assert!(App::init(&settings, None).is_err());

        settings.memory.systems_stack_bytes = 192_000 + 8;
        let mut app = App::init(&settings, None).unwrap();
        let dt = app.clock().frame_duration();
        assert!(matches!(app.frame(dt).unwrap(), FrameReport::Written { .. }));
    }

    #[test]
    fn rig_is_built_in_the_resident_stack() {
        let mut app = App::init(&small_settings(), None).unwrap();
        assert_eq!(app.rig.armature.len(), crate::scene::TETRA_COUNT + 1);
        let dt = app.clock().frame_duration();
        for _ in 0..30 {
            app.frame(dt).unwrap();
        }
        let transforms = app.rig.armature.transforms(&app.slab).unwrap();
        // Half a second in, the chain is partly raised; the pivot never moves.
        assert!(transforms[0].abs_diff_eq(tetra_core::glam::Mat4::IDENTITY, 1e-5));
        assert!(transforms[1].w_axis.z > 0.0);
    }

    #[test]
    fn live_test_tone_reaches_the_device() {
        let mut plain = App::init(&small_settings(), None).unwrap();
        let mut settings = small_settings();
        settings.audio.test_tone = true;
        let mut toned = App::init(&settings, None).unwrap();

        let dt = plain.clock().frame_duration();
        plain.frame(dt).unwrap();
        toned.frame(dt).unwrap();
        assert_ne!(plain.device.samples(), toned.device.samples());
    }

    #[test]
    fn device_failure_skips_only_that_frame() {
        let mut app = App::init(&small_settings(), None).unwrap();
        let dt = app.clock().frame_duration();
        app.frame(dt).unwrap();

        app.device.fail_next_lock();
        assert_eq!(app.frame(dt).unwrap(), FrameReport::Skipped(SkipReason::Lock));
        assert!(matches!(app.frame(dt).unwrap(), FrameReport::Written { .. }));
    }
}
