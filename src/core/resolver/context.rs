//! Per-node bookkeeping for the fixed-point resolution loop (§4.4 steps 1-5).

use std::collections::HashSet;

use crate::core::spec::PackageSpec;
use crate::core::version::Version;

#[derive(Clone, Debug)]
pub enum VersionSource {
    Override,
    Overlay,
    Baseline,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub spec: PackageSpec,
    pub source: VersionSource,
    /// The node's current version floor. Fixed for `Override`/`Overlay`
    /// nodes; raised monotonically by `max(current, constraint)` for
    /// `Baseline` nodes as new constraints are discovered.
    pub floor: Version,
    /// Explicit feature names requested by any edge reaching this node so
    /// far (never includes the `core`/`default` pseudo-names).
    pub requested_features: HashSet<String>,
    /// True once any reaching edge did not explicitly restrict itself to
    /// `core`-only, i.e. this node's declared default features are wanted.
    /// Monotonic: starts `false`, only ever flips to `true`.
    pub wants_default: bool,
    pub user_requested: bool,
}

impl Node {
    pub fn new(spec: PackageSpec, source: VersionSource, floor: Version, user_requested: bool) -> Self {
        Node {
            spec,
            source,
            floor,
            requested_features: HashSet::new(),
            wants_default: false,
            user_requested,
        }
    }

    /// Merges a newly discovered edge into this node. Returns `true` if
    /// anything about the node actually changed (used to decide whether to
    /// re-enqueue it for reprocessing).
    pub fn merge_features(&mut self, features: impl IntoIterator<Item = String>, wants_default: bool) -> bool {
        let mut changed = false;
        for f in features {
            if self.requested_features.insert(f) {
                changed = true;
            }
        }
        if wants_default && !self.wants_default {
            self.wants_default = true;
            changed = true;
        }
        changed
    }
}
