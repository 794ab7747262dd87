//! # Ember Core
//!
//! Engine-agnostic utilities shared by the Ember crates:
//!
//! - [`pool`] - allocation reuse for per-frame structures
//! - [`event`] - typed event dispatch without global registries

pub mod event;
pub mod pool;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core library version.
pub fn init() {
    log::info!("Ember Core v{} initialized", VERSION);
}
