//! Settings management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tetra_audio::MixMode;
use tetra_core::memory::array_footprint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub memory: MemorySettings,
    pub audio: AudioSettings,
    pub display: DisplaySettings,
}

/// Arena sizes, in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    pub slab_bytes: usize,
    /// Per-frame scratch, including the audio staging buffer.
    pub systems_stack_bytes: usize,
    /// Data that lives for the whole run (geometry, palette).
    pub resident_stack_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub samples_per_second: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
    pub buffer_seconds: u32,
    pub mix_mode: MixMode,
    /// Bytes the simulated device's write cursor runs ahead of play.
    pub device_lookahead_bytes: u32,
    /// Overlay a live sine tone on the mix every frame.
    pub test_tone: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub target_hz: u32,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            slab_bytes: 64 * 1024 * 1024,
            systems_stack_bytes: 256 * 1024,
            resident_stack_bytes: 128 * 1024,
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            samples_per_second: 48_000,
            channels: 2,
            bits_per_sample: 16,
            buffer_seconds: 1,
            mix_mode: MixMode::Wrap,
            device_lookahead_bytes: 1920,
            test_tone: false,
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self { target_hz: 60 }
    }
}

impl AudioSettings {
    pub fn bytes_per_sample(&self) -> u32 {
        self.bits_per_sample / 8
    }

    /// Size of the looping device buffer in bytes, `None` if it does not fit
    /// in a `u32`.
    pub fn buffer_bytes(&self) -> Option<u32> {
        self.samples_per_second
            .checked_mul(self.bytes_per_sample())?
            .checked_mul(self.channels)?
            .checked_mul(self.buffer_seconds)
    }
}

/// Highest output rate the settings accept.
pub const MAX_SAMPLES_PER_SECOND: u32 = 192_000;

fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl Settings {
    /// Read and validate a JSON settings file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        tracing::info!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                tracing::info!("no settings file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let memory = &self.memory;
        if memory.slab_bytes == 0 {
            return Err(invalid("memory.slab_bytes", "must be non-zero"));
        }
        let stacks = memory
            .systems_stack_bytes
            .checked_add(memory.resident_stack_bytes)
            .filter(|&stacks| stacks <= memory.slab_bytes);
        if stacks.is_none() {
            return Err(invalid(
                "memory",
                format!(
                    "stacks of {} and {} bytes do not fit a slab of {} bytes",
                    memory.systems_stack_bytes, memory.resident_stack_bytes, memory.slab_bytes
                ),
            ));
        }

        let audio = &self.audio;
        if audio.bits_per_sample != 16 {
            return Err(invalid("audio.bits_per_sample", "only 16-bit output is supported"));
        }
        if audio.channels != 2 {
            return Err(invalid("audio.channels", "only stereo output is supported"));
        }
        if audio.samples_per_second == 0 || audio.buffer_seconds == 0 {
            return Err(invalid("audio", "sample rate and buffer length must be non-zero"));
        }
        if audio.samples_per_second > MAX_SAMPLES_PER_SECOND {
            return Err(invalid(
                "audio.samples_per_second",
                format!("must be at most {MAX_SAMPLES_PER_SECOND}"),
            ));
        }
        let buffer_bytes = audio
            .buffer_bytes()
            .ok_or_else(|| invalid("audio", "device buffer size overflows"))?;
        if audio.device_lookahead_bytes >= buffer_bytes {
            return Err(invalid(
                "audio.device_lookahead_bytes",
                "must be smaller than the device buffer",
            ));
        }
        let staging = array_footprint::<i16>(buffer_bytes as usize / 2)
            .ok_or_else(|| invalid("audio", "staging buffer size overflows"))?;
        if staging > memory.systems_stack_bytes {
            return Err(invalid(
                "memory.systems_stack_bytes",
                format!("audio staging needs {staging} bytes"),
            ));
        }

        if self.display.target_hz == 0 {
            return Err(invalid("display.target_hz", "must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("tetra-{}-{name}", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.audio.buffer_bytes(), Some(192_000));
        assert_eq!(settings.display.target_hz, 60);
    }

    #[test]
    fn json_round_trip() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"mix_mode\":\"wrap\""));
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let path = temp_file(
            "partial.json",
            r#"{ "audio": { "mix_mode": "clamp" }, "display": { "target_hz": 30 } }"#,
        );
        let settings = Settings::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.audio.mix_mode, MixMode::Clamp);
        assert_eq!(settings.audio.samples_per_second, 48_000);
        assert_eq!(settings.display.target_hz, 30);
        assert_eq!(settings.memory, MemorySettings::default());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let path = temp_file("broken.json", "{ not json");
        let result = Settings::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(SettingsError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_read_error() {
        let result = Settings::load_or_default(Some(Path::new("/no/such/settings.json")));
        assert!(matches!(result, Err(SettingsError::Read { .. })));
        assert_eq!(Settings::load_or_default(None).unwrap(), Settings::default());
    }

    #[test]
    fn rejects_stacks_larger_than_slab() {
        let mut settings = Settings::default();
        settings.memory.slab_bytes = 1024;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid { field: "memory", .. })
        ));
    }

    #[test]
    fn rejects_unsupported_audio_format() {
        let mut settings = Settings::default();
        settings.audio.bits_per_sample = 8;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.audio.channels = 1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_staging_that_does_not_fit() {
        let mut settings = Settings::default();
        settings.memory.systems_stack_bytes = 12 * 1024;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid {
                field: "memory.systems_stack_bytes",
                ..
            })
        ));
    }

    #[test]
    fn display_holds_only_the_frame_rate() {
        let settings: Settings = serde_json::from_str(
            r#"{ "display": { "target_hz": 50, "resolution_width": 1280 } }"#,
        )
        .unwrap();
        assert_eq!(settings.display, DisplaySettings { target_hz: 50 });
        let json = serde_json::to_string(&settings.display).unwrap();
        assert_eq!(json, r#"{"target_hz":50}"#);
    }

    #[test]
    fn staging_check_counts_alignment_slack() {
        let mut settings = Settings::default();
        settings.memory.systems_stack_bytes = 192_000;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid {
                field: "memory.systems_stack_bytes",
                ..
            })
        ));

        settings.memory.systems_stack_bytes = 192_000 + 8;
        settings.validate().unwrap();
    }

    #[test]
    fn huge_sample_rate_is_rejected_not_a_panic() {
        let settings: Settings =
            serde_json::from_str(r#"{ "audio": { "samples_per_second": 1500000000 } }"#).unwrap();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid {
                field: "audio.samples_per_second",
                ..
            })
        ));
    }

    #[test]
    fn overflowing_buffer_length_is_rejected() {
        let mut settings = Settings::default();
        settings.audio.buffer_seconds = u32::MAX;
        assert_eq!(settings.audio.buffer_bytes(), None);
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid { field: "audio", .. })
        ));
    }

    #[test]
    fn overflowing_stack_sizes_are_rejected() {
        let mut settings = Settings::default();
        settings.memory.systems_stack_bytes = usize::MAX;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid { field: "memory", .. })
        ));
    }
}
