//! Small, dependency-light helpers shared by the ABI hasher and the cache
//! backends: content hashing, deterministic directory walks, and a thin
//! wrapper over `std::process::Command` that mirrors cargo's
//! `ProcessBuilder` (build up a command, then render it for logging before
//! running it).

pub mod hash;
pub mod process;
pub mod tree;

pub use hash::{sha256_hex, Sha256Digest};
pub use process::ProcessBuilder;
