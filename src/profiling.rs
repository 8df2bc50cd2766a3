//! # Profiling
//!
//! Enable the `profiling` feature to record `tracing` spans around bulk
//! creation, batch destruction, command application and parallel iteration,
//! plus debug events when archetypes and component types are registered.
//!
//! ```toml
//! [dependencies]
//! chunk_ecs = { version = "0.3", features = ["profiling"] }
//! ```
//!
//! Install a subscriber once at startup:
//!
//! ```ignore
//! chunk_ecs::profiling::init_tracing();
//!
//! let mut manager = EntityManager::new();
//! let archetype = manager.create_entity_type_of::<(LocalPosition,)>(256, Space(0))?;
//! manager.create_entities(10_000, archetype)?;
//! ```
//!
//! Use `RUST_LOG=chunk_ecs=trace` to also see chunk allocations.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Install a global fmt subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt::layer());
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
