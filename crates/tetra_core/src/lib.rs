//! Tetra Core
//!
//! Contains the fundamental systems the rest of the program runs on:
//! - Slab / sub-stack arena memory
//! - Frame pacing
//! - Index-based skeletal armature

pub mod armature;
pub mod memory;
pub mod time;

pub use glam;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
