//! The resolution core: version model (C1), spec/platform model (C2),
//! provider contracts (C3), the resolver (C4), and the install plan it
//! produces.

pub mod dependency;
pub mod plan;
pub mod providers;
pub mod resolver;
pub mod scf;
pub mod spec;
pub mod version;
