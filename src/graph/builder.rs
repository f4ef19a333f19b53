//! Graph construction.
//!
//! Each entry point's closure is walked independently (in parallel with
//! rayon); the results are then folded into one [`DependencyGraph`]. A file
//! that cannot be read or an import that cannot be resolved is recorded as a
//! [`GraphBuildError`] for that entry only, and the entry keeps whatever part
//! of its closure was discovered. An unresolved import also leaves the entry
//! waiting on the paths that would satisfy it.

use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::imports::{self, Resolution};
use super::{DependencyGraph, PathSet};
use crate::core::EntryPoint;

/// Non-fatal, per-entry analysis failure.
#[derive(Debug, Error)]
pub enum GraphBuildError {
    #[error("cannot read `{}`: {source}", path.display())]
    Unreadable {
        entry: PathBuf,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot resolve `{specifier}` imported from `{}`", from.display())]
    Unresolved {
        entry: PathBuf,
        from: PathBuf,
        specifier: String,
    },
}

impl GraphBuildError {
    /// Entry point whose analysis was incomplete.
    pub fn entry(&self) -> &Path {
        match self {
            Self::Unreadable { entry, .. } | Self::Unresolved { entry, .. } => entry,
        }
    }
}

/// Result of one graph build: the (possibly partial) graph and the entry
/// points that could not be fully analyzed.
#[derive(Debug, Default)]
pub struct GraphBuild {
    pub graph: DependencyGraph,
    pub failures: Vec<GraphBuildError>,
}

impl GraphBuild {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Build the dependency graph for `entries`.
pub fn build(entries: &[EntryPoint]) -> GraphBuild {
    let walked: Vec<_> = entries
        .par_iter()
        .map(|entry| (entry.path.clone(), closure_of(&entry.path)))
        .collect();

    let mut failures = Vec::new();
    let mut waiting = Vec::new();
    let closures = walked.into_iter().map(|(entry, closure)| {
        failures.extend(closure.failures);
        if !closure.waiting.is_empty() {
            waiting.push((entry.clone(), closure.waiting));
        }
        (entry, closure.deps)
    });
    let graph = DependencyGraph::from_closures(closures);
    let graph = graph.with_waiting(waiting);

    crate::debug!(
        "graph";
        "{} entries, {} edges, {} incomplete",
        graph.entry_count(),
        graph.edge_count(),
        failures.len()
    );
    GraphBuild { graph, failures }
}

struct Closure {
    deps: PathSet,
    /// Candidates for imports that resolved to nothing
    waiting: PathSet,
    failures: Vec<GraphBuildError>,
}

/// Transitive import closure of one entry point.
///
/// The visited set is the closure itself; a cycle just revisits a member.
fn closure_of(entry: &Path) -> Closure {
    let mut visited = PathSet::default();
    let mut waiting = PathSet::default();
    let mut failures = Vec::new();
    let mut stack = vec![entry.to_path_buf()];
    visited.insert(entry.to_path_buf());

    while let Some(file) = stack.pop() {
        if !imports::is_scannable(&file) {
            continue;
        }
        let source = match fs::read_to_string(&file) {
            Ok(source) => source,
            Err(source) => {
                failures.push(GraphBuildError::Unreadable {
                    entry: entry.to_path_buf(),
                    path: file,
                    source,
                });
                continue;
            }
        };

        for specifier in imports::scan(&source) {
            match imports::resolve(&specifier, &file) {
                Resolution::Local(dep) => {
                    if visited.insert(dep.clone()) {
                        stack.push(dep);
                    }
                }
                Resolution::External => {}
                Resolution::Unresolved(candidates) => {
                    waiting.extend(candidates);
                    failures.push(GraphBuildError::Unresolved {
                        entry: entry.to_path_buf(),
                        from: file.clone(),
                        specifier,
                    });
                }
            }
        }
    }

    visited.remove(entry);
    Closure {
        deps: visited,
        waiting,
        failures,
    }
}
