//! File-level dependency graph for incremental rendering.
//!
//! ```text
//! DependencyGraph
//! ├── forward: entry point → {components/Footer.tsx, lib/format.ts, ...}
//! └── reverse: lib/format.ts → {pages/home.tsx, pages/about.tsx, ...}
//!
//! On change of lib/format.ts:
//! 1. Lookup reverse[lib/format.ts] → affected entry points
//! 2. Re-render only those
//! ```
//!
//! Imports that resolve to nothing yet are kept on the side in `waiting`,
//! keyed by every path that would satisfy them, so creating the missing file
//! re-renders the entries that asked for it.
//!
//! - `imports`: static import scanning and specifier resolution
//! - `builder`: per-entry closure walk, parallel over entries
//! - `handle`: rebuild-then-swap sharing of the current graph

mod builder;
mod handle;
pub mod imports;

pub use builder::build;
pub use handle::GraphHandle;

use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};

use crate::discovery::is_vendored;

pub type PathSet = FxHashSet<PathBuf>;
type PathSetMap = FxHashMap<PathBuf, PathSet>;

/// Bidirectional dependency graph.
///
/// `forward` maps each entry point to its transitive import closure,
/// `reverse` maps each depended-upon file to the entry points needing it.
///
/// # Invariants
/// - `reverse` is exactly the transpose of `forward`: both are produced by
///   one constructor and there is no API that patches either side alone.
///   A changed project is handled by building a new graph.
/// - Paths are normalized for reliable matching
/// - Self-references are excluded
/// - `waiting` keys are never files that existed at build time
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    forward: PathSetMap,
    reverse: PathSetMap,
    /// Candidate path of an unresolved import → entry points waiting on it
    waiting: PathSetMap,
}

impl DependencyGraph {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build both mappings from per-entry dependency closures.
    pub fn from_closures(closures: impl IntoIterator<Item = (PathBuf, PathSet)>) -> Self {
        let mut forward = PathSetMap::default();
        let mut reverse = PathSetMap::default();

        for (entry, mut deps) in closures {
            deps.remove(&entry);
            for dep in &deps {
                reverse
                    .entry(dep.clone())
                    .or_default()
                    .insert(entry.clone());
            }
            forward.entry(entry).or_default().extend(deps);
        }

        Self {
            forward,
            reverse,
            waiting: PathSetMap::default(),
        }
    }

    /// Record entries whose unresolved imports would be satisfied by
    /// any of the given candidate paths.
    pub fn with_waiting(mut self, waiting: impl IntoIterator<Item = (PathBuf, PathSet)>) -> Self {
        for (entry, candidates) in waiting {
            for candidate in candidates {
                self.waiting
                    .entry(candidate)
                    .or_default()
                    .insert(entry.clone());
            }
        }
        self
    }

    /// Files the entry point needs (its full import closure).
    #[inline]
    pub fn dependencies(&self, entry: &Path) -> Option<&PathSet> {
        self.forward.get(entry)
    }

    /// Entry points that need `file`.
    #[inline]
    pub fn dependents(&self, file: &Path) -> Option<&PathSet> {
        self.reverse.get(file)
    }

    /// Entry points with an unresolved import that `file` would satisfy.
    #[inline]
    pub fn waiting_on(&self, file: &Path) -> Option<&PathSet> {
        self.waiting.get(file)
    }

    /// Entry points affected by a change of `file`.
    ///
    /// `forward` already holds transitive closures, so one reverse lookup
    /// covers every entry reachable through chains of imports.
    pub fn affected_by(&self, file: &Path) -> Vec<PathBuf> {
        let mut affected: PathSet = self.dependents(file).cloned().unwrap_or_default();
        if let Some(waiting) = self.waiting_on(file) {
            affected.extend(waiting.iter().cloned());
        }
        affected.into_iter().collect()
    }

    pub fn contains_entry(&self, entry: &Path) -> bool {
        self.forward.contains_key(entry)
    }

    pub fn entries(&self) -> impl Iterator<Item = &PathBuf> {
        self.forward.keys()
    }

    /// Every node: entry points and the files they depend on.
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.forward.keys().chain(self.reverse.keys())
    }

    pub fn entry_count(&self) -> usize {
        self.forward.len()
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(FxHashSet::len).sum()
    }

    /// Directories holding any graph node or awaited import, vendored code
    /// excluded.
    pub fn node_dirs(&self) -> FxHashSet<PathBuf> {
        self.files()
            .chain(self.waiting.keys())
            .filter(|p| !is_vendored(p))
            .filter_map(|p| p.parent().map(Path::to_path_buf))
            .collect()
    }

    /// Check that `reverse` is the exact transpose of `forward`.
    pub fn is_consistent(&self) -> bool {
        let forward_ok = self.forward.iter().all(|(entry, deps)| {
            deps.iter()
                .all(|dep| self.reverse.get(dep).is_some_and(|s| s.contains(entry)))
        });
        let reverse_ok = self.reverse.iter().all(|(dep, entries)| {
            !entries.is_empty()
                && entries
                    .iter()
                    .all(|entry| self.forward.get(entry).is_some_and(|s| s.contains(dep)))
        });
        forward_ok && reverse_ok
    }
}
