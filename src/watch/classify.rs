//! From raw changes to affected entry points.
//!
//! ```text
//! [ChangeEvent] → reconcile with disk → classify each path → ChangePlan
//! ```
//!
//! | class       | affected                                                  |
//! |-------------|-----------------------------------------------------------|
//! | entry point | itself and every entry importing it                       |
//! | template    | entries sharing its base name, entries whose lookup hits it |
//! | dependency  | every entry whose closure holds it (reverse edges), or     |
//! |             | whose unresolved import it would satisfy                  |
//! | extra       | everything, when the graph cannot tell                    |
//! | config      | everything, after reloading the configuration             |
//!
//! Classification reads one graph snapshot for the whole batch.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use super::pattern::ExtraPattern;
use super::types::{ChangeEvent, ChangeKind};
use crate::config::Config;
use crate::core::EntryPoint;
use crate::discovery::{discover, entry_for};
use crate::graph::DependencyGraph;
use crate::render::template;
use crate::utils::path::normalize_path;

/// What a changed path is to the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathClass {
    Config,
    EntryPoint(EntryPoint),
    Template,
    Dependency,
    Extra,
    /// Written by us; never a trigger
    Output,
    Ignored,
}

pub fn class_of(
    path: &Path,
    config: &Config,
    graph: &DependencyGraph,
    patterns: &[ExtraPattern],
) -> PathClass {
    if path.starts_with(&config.output_root) {
        return PathClass::Output;
    }
    if path == config.config_path {
        return PathClass::Config;
    }
    if let Some(entry) = entry_for(path, config) {
        return PathClass::EntryPoint(entry);
    }
    if is_template(path, config) {
        return PathClass::Template;
    }
    if graph.dependents(path).is_some() || graph.waiting_on(path).is_some() {
        return PathClass::Dependency;
    }
    if patterns.iter().any(|p| p.matches(path)) {
        return PathClass::Extra;
    }
    PathClass::Ignored
}

fn is_template(path: &Path, config: &Config) -> bool {
    path.starts_with(&config.template_root)
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(config.template_extension.as_str()))
}

/// Work derived from one batch of changes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangePlan {
    /// Entries to re-render
    pub render: BTreeSet<EntryPoint>,
    /// Entries whose source is gone; their outputs are deleted
    pub removed: BTreeSet<EntryPoint>,
    /// The config file changed and must be reloaded
    pub reload_config: bool,
    /// Re-render every entry point
    pub full: bool,
}

impl ChangePlan {
    pub fn is_empty(&self) -> bool {
        self.render.is_empty() && self.removed.is_empty() && !self.reload_config && !self.full
    }

    /// Fold a later plan into this one. Where the two disagree about an
    /// entry, the later plan wins.
    pub fn merge(&mut self, other: ChangePlan) {
        for entry in &other.render {
            self.removed.remove(entry);
        }
        for entry in &other.removed {
            self.render.remove(entry);
        }
        self.render.extend(other.render);
        self.removed.extend(other.removed);
        self.reload_config |= other.reload_config;
        self.full |= other.full;
    }
}

/// Resolve a batch of changes against a graph snapshot.
pub fn plan(
    events: Vec<ChangeEvent>,
    config: &Config,
    graph: &DependencyGraph,
    patterns: &[ExtraPattern],
) -> ChangePlan {
    let mut changes: FxHashMap<PathBuf, ChangeKind> =
        events.into_iter().map(|e| (e.path, e.kind)).collect();

    correct_by_existence(&mut changes);
    recover_from_dir_events(&mut changes, graph, config);
    filter_actionable(&mut changes);

    let mut events: Vec<_> = changes.into_iter().collect();
    events.sort_by(|a, b| a.0.cmp(&b.0));

    let mut planner = Planner {
        config,
        graph,
        all: None,
        plan: ChangePlan::default(),
    };
    for (path, kind) in events {
        let class = class_of(&path, config, graph, patterns);
        crate::debug!("watch"; "{} {}: {:?}", kind.label(), path.display(), class);
        planner.apply(&path, kind, class);
    }

    let mut plan = planner.plan;
    let removed = &plan.removed;
    plan.render.retain(|e| !removed.contains(e));
    plan
}

struct Planner<'a> {
    config: &'a Config,
    graph: &'a DependencyGraph,
    /// Discovered entry points, walked at most once per batch
    all: Option<Vec<EntryPoint>>,
    plan: ChangePlan,
}

impl Planner<'_> {
    fn apply(&mut self, path: &Path, kind: ChangeKind, class: PathClass) {
        match class {
            PathClass::Config => {
                self.plan.reload_config = true;
                self.plan.full = true;
            }
            PathClass::EntryPoint(entry) => {
                self.add_dependents(path);
                if kind == ChangeKind::Removed {
                    self.plan.removed.insert(entry);
                } else {
                    self.plan.render.insert(entry);
                }
            }
            PathClass::Template => {
                let affected = self.template_users(path);
                if affected.is_empty() {
                    crate::debug!(
                        "watch"; "template {} matches no entry point", path.display()
                    );
                }
                self.plan.render.extend(affected);
            }
            PathClass::Dependency => self.add_dependents(path),
            PathClass::Extra => self.plan.full = true,
            PathClass::Output | PathClass::Ignored => {}
        }
    }

    fn add_dependents(&mut self, path: &Path) {
        let config = self.config;
        let entries = self
            .graph
            .affected_by(path)
            .into_iter()
            .filter_map(|p| entry_for(&p, config));
        self.plan.render.extend(entries);
    }

    /// Entries sharing the template's base name, plus entries whose lookup
    /// resolves (or, for a removed template, resolved) to it.
    fn template_users(&mut self, path: &Path) -> Vec<EntryPoint> {
        let config = self.config;
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let all = self.all.get_or_insert_with(|| discover(config));
        all.iter()
            .filter(|entry| entry.stem() == stem || uses_template(entry, path, config))
            .cloned()
            .collect()
    }
}

/// `template` is in the entry's candidate list and no earlier candidate
/// exists, so its appearance, edit or removal changes the entry's host.
fn uses_template(entry: &EntryPoint, template: &Path, config: &Config) -> bool {
    let candidates = template::candidates(entry, config);
    let Some(pos) = candidates.iter().position(|c| c == template) else {
        return false;
    };
    candidates[..pos].iter().all(|c| !c.is_file())
}

/// Reconcile event kinds with actual filesystem state.
///
/// The watcher may report stale events (e.g., Created for a file that's already
/// been deleted, or Removed for a file that still exists after an atomic save).
pub(super) fn correct_by_existence(changes: &mut FxHashMap<PathBuf, ChangeKind>) {
    let paths: Vec<_> = changes.keys().cloned().collect();
    for path in paths {
        let kind = changes[&path];
        let exists = path.exists();
        match kind {
            ChangeKind::Created if !exists => {
                crate::debug!("watch"; "discard added (gone): {}", path.display());
                changes.remove(&path);
            }
            ChangeKind::Modified if !exists => {
                crate::debug!("watch"; "upgrade modified->removed: {}", path.display());
                changes.insert(path, ChangeKind::Removed);
            }
            ChangeKind::Removed if exists => {
                crate::debug!("watch"; "downgrade removed->modified: {}", path.display());
                changes.insert(path, ChangeKind::Modified);
            }
            _ => {}
        }
    }
}

/// Recover file-level events from directory-level events.
///
/// Some backends only report the directory when a file below it is renamed,
/// or when a whole directory is deleted. Expand those:
/// - removed directory → every graph node below it is Removed
/// - modified/added directory → graph nodes that disappeared from it are
///   Removed, entry points that appeared in it are Created
pub(super) fn recover_from_dir_events(
    changes: &mut FxHashMap<PathBuf, ChangeKind>,
    graph: &DependencyGraph,
    config: &Config,
) {
    let removed_dirs: Vec<PathBuf> = changes
        .iter()
        .filter(|(_, k)| **k == ChangeKind::Removed)
        .map(|(p, _)| p.clone())
        .collect();
    for dir in &removed_dirs {
        let below: Vec<PathBuf> = graph
            .files()
            .filter(|f| f.starts_with(dir) && *f != dir)
            .cloned()
            .collect();
        for file in below {
            crate::debug!("watch"; "dir removed, lost: {}", file.display());
            changes.entry(file).or_insert(ChangeKind::Removed);
        }
    }

    let touched_dirs: Vec<PathBuf> = changes
        .iter()
        .filter(|(_, k)| **k != ChangeKind::Removed)
        .filter(|(p, _)| p.is_dir())
        .map(|(p, _)| p.clone())
        .collect();
    for dir in &touched_dirs {
        detect_disappeared(graph, dir, changes);
        detect_appeared(graph, dir, changes, config);
    }
}

/// Tracked files that no longer exist in a directory.
fn detect_disappeared(
    graph: &DependencyGraph,
    dir: &Path,
    changes: &mut FxHashMap<PathBuf, ChangeKind>,
) {
    let missing: Vec<PathBuf> = graph
        .files()
        .filter(|f| f.parent() == Some(dir) && !f.exists() && !changes.contains_key(*f))
        .cloned()
        .collect();
    for file in missing {
        crate::debug!("watch"; "dir-scan found missing: {}", file.display());
        changes.insert(file, ChangeKind::Removed);
    }
}

/// Entry points present in a directory but unknown to the graph.
fn detect_appeared(
    graph: &DependencyGraph,
    dir: &Path,
    changes: &mut FxHashMap<PathBuf, ChangeKind>,
    config: &Config,
) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = normalize_path(&entry.path());
        if path.is_file()
            && !changes.contains_key(&path)
            && !graph.contains_entry(&path)
            && entry_for(&path, config).is_some()
        {
            crate::debug!("watch"; "dir-scan found new entry: {}", path.display());
            changes.insert(path, ChangeKind::Created);
        }
    }
}

/// Created/Modified must name a file; directories were expanded above.
pub(super) fn filter_actionable(changes: &mut FxHashMap<PathBuf, ChangeKind>) {
    changes.retain(|p, k| match k {
        ChangeKind::Created | ChangeKind::Modified => p.is_file(),
        ChangeKind::Removed => true,
    });
}
