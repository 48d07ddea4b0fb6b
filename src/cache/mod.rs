//! The binary cache: config grammar (C6), object-store providers (C7),
//! and the prefetch/push orchestrator (C8).

pub mod config;
pub mod orchestrator;
pub mod providers;
pub mod secrets;
pub mod status;

pub use config::{Access, CacheConfig, ConfigError, ResolvedProvider};
pub use status::CacheStatus;
