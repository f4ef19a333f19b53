use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rustc_hash::FxHashMap;
use tempfile::TempDir;

use super::classify::{self, ChangePlan, PathClass, class_of, plan};
use super::debouncer::{Debouncer, is_temp_file};
use super::pattern::ExtraPattern;
use super::roots::{WatchMode, compute};
use super::types::{ChangeEvent, ChangeKind};
use super::Watcher;
use crate::config::Config;
use crate::core::{EntryPoint, Shutdown};
use crate::discovery::discover;
use crate::graph::{self, DependencyGraph};
use crate::utils::path::normalize_path;

fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
    notify::Event {
        kind,
        paths: paths.into_iter().map(PathBuf::from).collect(),
        attrs: Default::default(),
    }
}

fn modify_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Data(
        notify::event::DataChange::Any,
    ))
}

fn metadata_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
        notify::event::MetadataKind::WriteTime,
    ))
}

fn create_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::File)
}

fn remove_kind() -> notify::EventKind {
    notify::EventKind::Remove(notify::event::RemoveKind::File)
}

fn instant_debouncer() -> Debouncer {
    Debouncer::with_cooldown(Duration::ZERO, Duration::ZERO)
}

// ============================================================================
// Debouncer
// ============================================================================

#[test]
fn test_debouncer_empty() {
    let debouncer = instant_debouncer();
    assert!(!debouncer.is_ready());
}

#[test]
fn test_event_routing_by_kind() {
    let mut debouncer = instant_debouncer();

    debouncer.add_event(&make_event(vec!["/tmp/a.tsx"], create_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/b.tsx"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/c.tsx"], remove_kind()));

    assert_eq!(debouncer.changes.len(), 3);
    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/a.tsx")],
        ChangeKind::Created
    );
    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/b.tsx")],
        ChangeKind::Modified
    );
    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/c.tsx")],
        ChangeKind::Removed
    );
}

#[test]
fn test_metadata_only_ignored() {
    let mut debouncer = instant_debouncer();
    debouncer.add_event(&make_event(vec!["/tmp/a.tsx"], metadata_kind()));
    assert!(debouncer.changes.is_empty());
    assert!(debouncer.last_event.is_none());
}

#[test]
fn test_temp_file_ignored() {
    let mut debouncer = instant_debouncer();

    debouncer.add_event(&make_event(vec!["/tmp/real.tsx"], modify_kind()));
    let first_time = debouncer.last_event.unwrap();

    std::thread::sleep(Duration::from_millis(5));

    // Temp file event: should NOT update last_event or add to changes
    debouncer.add_event(&make_event(vec!["/tmp/.real.tsx.swp"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/real.tsx~"], modify_kind()));
    assert_eq!(debouncer.last_event.unwrap(), first_time);
    assert_eq!(debouncer.changes.len(), 1);
}

#[test]
fn test_temp_file_patterns() {
    assert!(is_temp_file(Path::new("/p/a.tsx.swp")));
    assert!(is_temp_file(Path::new("/p/4913.tmp")));
    assert!(is_temp_file(Path::new("/p/#a.tsx#")));
    assert!(is_temp_file(Path::new("/p/.DS_Store")));
    assert!(!is_temp_file(Path::new("/p/a.tsx")));
}

#[test]
fn test_dedup_first_event_wins() {
    let mut debouncer = instant_debouncer();

    debouncer.add_event(&make_event(vec!["/tmp/a.tsx"], create_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/a.tsx"], modify_kind()));

    assert_eq!(debouncer.changes.len(), 1);
    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/a.tsx")],
        ChangeKind::Created
    );
}

#[test]
fn test_dedup_same_event() {
    let mut debouncer = instant_debouncer();
    debouncer.add_event(&make_event(vec!["/tmp/a.tsx", "/tmp/a.tsx"], modify_kind()));
    assert_eq!(debouncer.changes.len(), 1);
}

#[test]
fn test_created_then_removed_cancels() {
    let mut debouncer = instant_debouncer();
    debouncer.add_event(&make_event(vec!["/tmp/a.tsx"], create_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/a.tsx"], remove_kind()));
    assert!(debouncer.changes.is_empty());
    assert!(debouncer.take_if_ready().is_none());
}

#[test]
fn test_modified_then_removed_upgrades() {
    let mut debouncer = instant_debouncer();
    debouncer.add_event(&make_event(vec!["/tmp/a.tsx"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/a.tsx"], remove_kind()));
    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/a.tsx")],
        ChangeKind::Removed
    );
}

#[test]
fn test_removed_then_created_restores() {
    let mut debouncer = instant_debouncer();
    debouncer.add_event(&make_event(vec!["/tmp/a.tsx"], remove_kind()));
    debouncer.add_event(&make_event(vec!["/tmp/a.tsx"], create_kind()));
    assert_eq!(
        debouncer.changes[&PathBuf::from("/tmp/a.tsx")],
        ChangeKind::Created
    );
}

#[test]
fn test_take_respects_debounce_window() {
    let mut debouncer = Debouncer::with_cooldown(Duration::from_millis(200), Duration::ZERO);
    debouncer.add_event(&make_event(vec!["/tmp/b.tsx", "/tmp/a.tsx"], modify_kind()));

    assert!(debouncer.take_if_ready().is_none());
    assert!(debouncer.sleep_duration() <= Duration::from_millis(200));

    std::thread::sleep(Duration::from_millis(220));
    let events = debouncer.take_if_ready().unwrap();
    assert_eq!(
        events,
        vec![
            ChangeEvent::new("/tmp/a.tsx", ChangeKind::Modified),
            ChangeEvent::new("/tmp/b.tsx", ChangeKind::Modified),
        ]
    );
    assert!(debouncer.changes.is_empty());
    assert!(debouncer.take_if_ready().is_none());
}

#[test]
fn test_cooldown_holds_next_batch() {
    let mut debouncer = Debouncer::with_cooldown(Duration::ZERO, Duration::from_secs(60));
    debouncer.add_event(&make_event(vec!["/tmp/a.tsx"], modify_kind()));
    assert!(debouncer.take_if_ready().is_some());

    debouncer.add_event(&make_event(vec!["/tmp/a.tsx"], modify_kind()));
    assert!(!debouncer.is_ready());
    assert!(debouncer.sleep_duration() > Duration::from_secs(50));
}

// ============================================================================
// Classification
// ============================================================================

/// pages/home.tsx, pages/about.tsx → components/footer.tsx
/// pages/blog/post.tsx → lib/format.ts
struct Project {
    _dir: TempDir,
    config: Config,
}

impl Project {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = normalize_path(dir.path());
        let config = Config {
            config_path: root.join("kiln.json"),
            entry_root: root.join("pages"),
            output_root: root.join("dist"),
            template_root: root.join("templates"),
            root,
            ..Config::default()
        };
        let project = Self { _dir: dir, config };

        project.write("kiln.json", "{}");
        project.write(
            "pages/home.tsx",
            "import Footer from '../components/footer';\nexport default {};",
        );
        project.write(
            "pages/about.tsx",
            "import Footer from '../components/footer';\nexport default {};",
        );
        project.write(
            "pages/blog/post.tsx",
            "import { date } from '../../lib/format';\nexport default {};",
        );
        project.write("components/footer.tsx", "export default () => null;");
        project.write("lib/format.ts", "export const date = 1;");
        fs::create_dir_all(&project.config.template_root).unwrap();
        project
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.config.root.join(rel)
    }

    fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn graph(&self) -> DependencyGraph {
        let build = graph::build(&discover(&self.config));
        assert!(build.is_complete(), "{:?}", build.failures);
        build.graph
    }

    fn plan(&self, events: &[(&str, ChangeKind)]) -> ChangePlan {
        self.plan_with(events, &[])
    }

    fn plan_with(&self, events: &[(&str, ChangeKind)], patterns: &[ExtraPattern]) -> ChangePlan {
        let graph = self.graph();
        let events = events
            .iter()
            .map(|(rel, kind)| ChangeEvent::new(self.path(rel), *kind))
            .collect();
        plan(events, &self.config, &graph, patterns)
    }
}

fn ids(entries: &std::collections::BTreeSet<EntryPoint>) -> Vec<&str> {
    entries.iter().map(|e| e.id.as_str()).collect()
}

#[test]
fn test_shared_dependency_affects_both_importers() {
    let project = Project::new();
    let plan = project.plan(&[("components/footer.tsx", ChangeKind::Modified)]);
    assert_eq!(ids(&plan.render), vec!["about.tsx", "home.tsx"]);
    assert!(plan.removed.is_empty());
    assert!(!plan.full);
}

#[test]
fn test_dependency_only_affects_its_closure() {
    let project = Project::new();
    let plan = project.plan(&[("lib/format.ts", ChangeKind::Modified)]);
    assert_eq!(ids(&plan.render), vec!["blog/post.tsx"]);
}

#[test]
fn test_entry_change_affects_itself() {
    let project = Project::new();
    let plan = project.plan(&[("pages/home.tsx", ChangeKind::Modified)]);
    assert_eq!(ids(&plan.render), vec!["home.tsx"]);
}

#[test]
fn test_entry_imported_by_another_entry() {
    let project = Project::new();
    project.write(
        "pages/index.tsx",
        "import Home from './home';\nexport default {};",
    );
    let plan = project.plan(&[("pages/home.tsx", ChangeKind::Modified)]);
    assert_eq!(ids(&plan.render), vec!["home.tsx", "index.tsx"]);
}

#[test]
fn test_new_entry_is_rendered() {
    let project = Project::new();
    let graph = project.graph();
    project.write("pages/contact.tsx", "export default {};");

    let events = vec![ChangeEvent::new(project.path("pages/contact.tsx"), ChangeKind::Created)];
    let plan = plan(events, &project.config, &graph, &[]);
    assert_eq!(ids(&plan.render), vec!["contact.tsx"]);
}

#[test]
fn test_created_file_satisfies_unresolved_import() {
    let project = Project::new();
    project.write(
        "pages/broken.tsx",
        "import Later from '../components/later';\nexport default {};",
    );
    let build = graph::build(&discover(&project.config));
    assert_eq!(build.failures.len(), 1);
    let graph = build.graph;

    let later = project.write("components/later.tsx", "export default () => null;");
    assert_eq!(
        class_of(&later, &project.config, &graph, &[]),
        PathClass::Dependency
    );
    let events = vec![ChangeEvent::new(later, ChangeKind::Created)];
    let plan = plan(events, &project.config, &graph, &[]);
    assert_eq!(ids(&plan.render), vec!["broken.tsx"]);
    assert!(!plan.full);
}

#[test]
fn test_removed_entry_is_scheduled_for_cleanup() {
    let project = Project::new();
    let graph = project.graph();
    fs::remove_file(project.path("pages/about.tsx")).unwrap();

    let events = vec![ChangeEvent::new(project.path("pages/about.tsx"), ChangeKind::Modified)];
    let plan = plan(events, &project.config, &graph, &[]);
    assert_eq!(ids(&plan.removed), vec!["about.tsx"]);
    assert!(plan.render.is_empty());
}

#[test]
fn test_removed_directory_expands_to_entries() {
    let project = Project::new();
    let graph = project.graph();
    fs::remove_dir_all(project.path("pages/blog")).unwrap();

    let events = vec![ChangeEvent::new(project.path("pages/blog"), ChangeKind::Removed)];
    let plan = plan(events, &project.config, &graph, &[]);
    assert_eq!(ids(&plan.removed), vec!["blog/post.tsx"]);
}

#[test]
fn test_directory_event_finds_new_entry() {
    let project = Project::new();
    let graph = project.graph();
    project.write("pages/blog/second.tsx", "export default {};");

    let events = vec![ChangeEvent::new(project.path("pages/blog"), ChangeKind::Modified)];
    let plan = plan(events, &project.config, &graph, &[]);
    assert_eq!(ids(&plan.render), vec!["blog/second.tsx"]);
}

#[test]
fn test_template_basename_match() {
    let project = Project::new();
    project.write("templates/about.html", "<div id=\"app\"></div>");
    let plan = project.plan(&[("templates/about.html", ChangeKind::Modified)]);
    assert_eq!(ids(&plan.render), vec!["about.tsx"]);
}

#[test]
fn test_fallback_template_affects_its_users() {
    let project = Project::new();
    project.write("templates/index.html", "<div id=\"app\"></div>");
    project.write("templates/about.html", "<div id=\"app\"></div>");
    let plan = project.plan(&[("templates/index.html", ChangeKind::Modified)]);
    // about.tsx has its own template
    assert_eq!(ids(&plan.render), vec!["blog/post.tsx", "home.tsx"]);
}

#[test]
fn test_removed_template_affects_former_users() {
    let project = Project::new();
    let graph = project.graph();
    let events = vec![ChangeEvent::new(project.path("templates/post.html"), ChangeKind::Removed)];
    let plan = plan(events, &project.config, &graph, &[]);
    assert_eq!(ids(&plan.render), vec!["blog/post.tsx"]);
}

#[test]
fn test_template_without_match_is_noop() {
    let project = Project::new();
    project.write("templates/orphan.html", "<div id=\"app\"></div>");
    let plan = project.plan(&[("templates/orphan.html", ChangeKind::Modified)]);
    assert!(plan.is_empty());
}

#[test]
fn test_config_change_reloads_everything() {
    let project = Project::new();
    let plan = project.plan(&[("kiln.json", ChangeKind::Modified)]);
    assert!(plan.reload_config);
    assert!(plan.full);
}

#[test]
fn test_extra_pattern_without_dependents_is_full() {
    let project = Project::new();
    project.write("styles/site.css", "body{}");
    let patterns = ExtraPattern::compile_all(&["styles/**/*.css".into()], &project.config.root);

    let plan = project.plan_with(&[("styles/site.css", ChangeKind::Modified)], &patterns);
    assert!(plan.full);
    assert!(!plan.reload_config);
}

#[test]
fn test_output_and_unknown_paths_are_ignored() {
    let project = Project::new();
    project.write("dist/home.html", "x");
    project.write("notes.txt", "x");
    let plan = project.plan(&[
        ("dist/home.html", ChangeKind::Modified),
        ("notes.txt", ChangeKind::Modified),
    ]);
    assert!(plan.is_empty());
}

#[test]
fn test_class_of_precedence() {
    let project = Project::new();
    let graph = project.graph();
    let config = &project.config;
    let class = |rel: &str| class_of(&project.path(rel), config, &graph, &[]);

    assert_eq!(class("kiln.json"), PathClass::Config);
    assert!(matches!(class("pages/home.tsx"), PathClass::EntryPoint(e) if e.id == "home.tsx"));
    assert_eq!(class("templates/home.html"), PathClass::Template);
    assert_eq!(class("templates/home.txt"), PathClass::Ignored);
    assert_eq!(class("lib/format.ts"), PathClass::Dependency);
    assert_eq!(class("dist/anything.tsx"), PathClass::Output);
    assert_eq!(class("pages/node_modules/x/a.tsx"), PathClass::Ignored);
}

#[test]
fn test_correct_by_existence() {
    let project = Project::new();
    let mut changes = FxHashMap::default();
    changes.insert(project.path("pages/home.tsx"), ChangeKind::Removed);
    changes.insert(project.path("gone.tsx"), ChangeKind::Created);
    changes.insert(project.path("lost.tsx"), ChangeKind::Modified);

    classify::correct_by_existence(&mut changes);
    assert_eq!(changes[&project.path("pages/home.tsx")], ChangeKind::Modified);
    assert!(!changes.contains_key(&project.path("gone.tsx")));
    assert_eq!(changes[&project.path("lost.tsx")], ChangeKind::Removed);
}

#[test]
fn test_plan_merge_later_wins() {
    let project = Project::new();
    let entries = discover(&project.config);
    let home = entries.iter().find(|e| e.id == "home.tsx").unwrap().clone();

    let mut first = ChangePlan::default();
    first.removed.insert(home.clone());
    let mut second = ChangePlan::default();
    second.render.insert(home.clone());
    second.full = true;

    first.merge(second);
    assert!(first.removed.is_empty());
    assert!(first.render.contains(&home));
    assert!(first.full);
}

// ============================================================================
// Watch roots
// ============================================================================

#[test]
fn test_roots_cover_graph_and_skip_nested() {
    let project = Project::new();
    let graph = project.graph();
    let patterns = ExtraPattern::compile_all(
        &["templates/partials/*.html".into(), "styles/**/*.css".into()],
        &project.config.root,
    );

    let roots = compute(&project.config, &graph, &patterns);
    let find = |rel: &str| {
        let path = project.path(rel);
        roots.iter().find(|r| r.path == path).map(|r| r.mode)
    };

    assert_eq!(find("pages"), Some(WatchMode::Recursive));
    assert_eq!(find("templates"), Some(WatchMode::Recursive));
    assert_eq!(find("styles"), Some(WatchMode::Recursive));
    // nested in templates/
    assert_eq!(find("templates/partials"), None);
    assert_eq!(find("components"), Some(WatchMode::Shallow));
    assert_eq!(find("lib"), Some(WatchMode::Shallow));
    // the config file itself, never the project root holding it
    assert_eq!(find("kiln.json"), Some(WatchMode::Shallow));
    assert_eq!(find(""), None);
    // pages/blog is under the recursive entry root
    assert_eq!(find("pages/blog"), None);
    assert!(roots.iter().all(|r| !r.path.starts_with(&project.config.output_root)));
}

// ============================================================================
// Watcher actor
// ============================================================================

#[tokio::test]
async fn test_watcher_emits_debounced_batch() {
    let project = Project::new();
    let graph = project.graph();
    let roots = compute(&project.config, &graph, &[]);

    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    let watcher = Watcher::new(roots, Duration::from_millis(50), tx).unwrap();
    let shutdown = Shutdown::new();
    let task = tokio::spawn(watcher.run(shutdown.signal()));

    // give the backend a moment to arm
    tokio::time::sleep(Duration::from_millis(100)).await;
    let footer = project.write("components/footer.tsx", "export default () => 1;");

    let batch = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("batch within timeout")
        .expect("channel open");
    assert!(batch.iter().any(|e| e.path == footer));

    let plan = plan(batch, &project.config, &graph, &[]);
    assert_eq!(ids(&plan.render), vec!["about.tsx", "home.tsx"]);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("watcher stops on shutdown")
        .unwrap();
}

#[tokio::test]
async fn test_watcher_follows_atomic_config_saves() {
    let project = Project::new();
    let graph = project.graph();
    let roots = compute(&project.config, &graph, &[]);

    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    let watcher = Watcher::new(roots, Duration::from_millis(50), tx).unwrap();
    let shutdown = Shutdown::new();
    let task = tokio::spawn(watcher.run(shutdown.signal()));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let config_path = project.config.config_path.clone();
    for round in 0..2 {
        // Write aside, then rename over the watched file.
        let staged = project.write("kiln.json.next", &format!("{{\"concurrency\": {}}}", round + 1));
        fs::rename(&staged, &config_path).unwrap();

        let batch = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap_or_else(|_| panic!("no batch for save {round}"))
            .expect("channel open");
        assert!(batch.iter().any(|e| e.path == config_path), "save {round}: {batch:?}");
        // Root-level files are not watched.
        assert!(batch.iter().all(|e| !e.path.ends_with("kiln.json.next")));

        let plan = plan(batch, &project.config, &graph, &[]);
        assert!(plan.reload_config);
    }

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("watcher stops on shutdown")
        .unwrap();
}
