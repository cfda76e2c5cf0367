//! Tetra Services Layer
//!
//! Platform-facing services. Currently the settings file.

pub mod settings;

pub use settings::{AudioSettings, DisplaySettings, MemorySettings, Settings, SettingsError};
