use std::path::{Path, PathBuf};

use notify::{RecursiveMode, Watcher};
use rustc_hash::FxHashMap;

use super::pattern::ExtraPattern;
use crate::config::Config;
use crate::discovery::is_vendored;
use crate::graph::DependencyGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchMode {
    /// The directory and everything below it
    Recursive,
    /// Direct children only
    Shallow,
}

impl WatchMode {
    fn notify_mode(self) -> RecursiveMode {
        match self {
            Self::Recursive => RecursiveMode::Recursive,
            Self::Shallow => RecursiveMode::NonRecursive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchRoot {
    pub path: PathBuf,
    pub mode: WatchMode,
}

/// Paths to watch for a config and graph snapshot.
///
/// The entry root, template root and `watch.extra` bases recursively; the
/// directories of graph nodes shallowly, unless a recursive root already
/// covers them. The config file is watched by itself, so the directory
/// holding it (usually the project root) is never watched on its account.
/// Vendored and output paths are skipped.
pub fn compute(
    config: &Config,
    graph: &DependencyGraph,
    patterns: &[ExtraPattern],
) -> Vec<WatchRoot> {
    let mut recursive = vec![config.entry_root.clone(), config.template_root.clone()];
    recursive.extend(patterns.iter().map(|p| p.base().to_path_buf()));
    recursive.retain(|p| !is_excluded(p, config));
    recursive.sort();
    recursive.dedup();
    // drop roots nested inside another recursive root
    let nested: Vec<bool> = recursive
        .iter()
        .map(|p| recursive.iter().any(|q| q != p && p.starts_with(q)))
        .collect();
    let recursive: Vec<PathBuf> = recursive
        .into_iter()
        .zip(nested)
        .filter_map(|(p, nested)| (!nested).then_some(p))
        .collect();

    let mut shallow: Vec<PathBuf> = graph.node_dirs().into_iter().collect();
    shallow.push(config.config_path.clone());
    shallow.retain(|p| !is_excluded(p, config) && !recursive.iter().any(|r| p.starts_with(r)));
    shallow.sort();
    shallow.dedup();

    recursive
        .into_iter()
        .map(|path| WatchRoot {
            path,
            mode: WatchMode::Recursive,
        })
        .chain(shallow.into_iter().map(|path| WatchRoot {
            path,
            mode: WatchMode::Shallow,
        }))
        .collect()
}

fn is_excluded(path: &Path, config: &Config) -> bool {
    path.as_os_str().is_empty() || is_vendored(path) || path.starts_with(&config.output_root)
}

/// Watch-root consistency manager.
///
/// Responsibility:
/// - Attach existing roots at startup
/// - Re-attach roots that were removed and recreated
/// - Follow a recomputed root set after each graph rebuild
pub(super) struct WatchRoots {
    desired: Vec<WatchRoot>,
    attached: FxHashMap<PathBuf, WatchMode>,
}

impl WatchRoots {
    pub(super) fn new(roots: Vec<WatchRoot>) -> Self {
        Self {
            desired: roots,
            attached: FxHashMap::default(),
        }
    }

    pub(super) fn attach_existing<W: Watcher>(&mut self, watcher: &mut W) -> notify::Result<()> {
        for root in &self.desired {
            if !root.path.exists() {
                continue;
            }
            watcher.watch(&root.path, root.mode.notify_mode())?;
            self.attached.insert(root.path.clone(), root.mode);
        }

        Ok(())
    }

    /// Switch to a new root set: unwatch what is gone, attach what is new.
    pub(super) fn replace<W: Watcher>(&mut self, roots: Vec<WatchRoot>, watcher: &mut W) {
        let stale: Vec<PathBuf> = self
            .attached
            .iter()
            .filter(|(path, mode)| {
                !roots
                    .iter()
                    .any(|r| &r.path == *path && r.mode == **mode)
            })
            .map(|(path, _)| path.clone())
            .collect();

        for path in stale {
            // fails when the directory is already gone, which is fine
            let _ = watcher.unwatch(&path);
            self.attached.remove(&path);
            crate::debug!("watch"; "detached: {}", path.display());
        }

        self.desired = roots;
        self.maintain(watcher);
    }

    pub(super) fn maintain<W: Watcher>(&mut self, watcher: &mut W) {
        // Drop stale handles for roots that no longer exist.
        self.attached.retain(|path, _| path.exists());

        for root in &self.desired {
            if self.attached.contains_key(&root.path) || !root.path.exists() {
                continue;
            }

            if watcher.watch(&root.path, root.mode.notify_mode()).is_ok() {
                self.attached.insert(root.path.clone(), root.mode);
                crate::debug!("watch"; "attached: {}", root.path.display());
            }
        }
    }

    /// Re-arm a watched file after an event on it.
    ///
    /// An atomic save replaces the file, and the backend drops its watch on
    /// the old inode while the path keeps existing, so `maintain` would
    /// never notice.
    pub(super) fn refresh<W: Watcher>(&mut self, path: &Path, watcher: &mut W) {
        let Some(&mode) = self.attached.get(path) else {
            return;
        };
        if path.is_dir() {
            return;
        }

        // fails when the backend already dropped the watch
        let _ = watcher.unwatch(path);
        self.attached.remove(path);
        if path.exists() && watcher.watch(path, mode.notify_mode()).is_ok() {
            self.attached.insert(path.to_path_buf(), mode);
            crate::debug!("watch"; "re-armed: {}", path.display());
        }
    }

    pub(super) fn attached_count(&self) -> usize {
        self.attached.len()
    }

    #[cfg(test)]
    pub(super) fn is_attached(&self, path: &Path) -> bool {
        self.attached.contains_key(path)
    }
}
