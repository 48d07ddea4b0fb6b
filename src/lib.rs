//! `portkit`: the resolver, ABI hasher, and binary-cache orchestrator that
//! sit at the core of a C/C++ package manager (§1). Disk/network/process
//! collaborators (manifest parsing, the build executor, registry
//! transports) live outside this crate; only their contracts are modeled
//! here.

pub mod abi;
pub mod cache;
pub mod core;
