//! Build session: owns the configuration, the dependency graph and the
//! lifecycle of one `kiln` run.
//!
//! ```text
//! one-shot:  discover → graph → render batch → report
//! watch:     discover → graph → watcher → render batch → loop {
//!                changes → plan → render → rebuild graph → swap → reload
//!            }
//! ```
//!
//! The graph has a single writer (this session); classification and root
//! computation read `Arc` snapshots of it.

mod report;
mod watch;

pub use report::BatchReport;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Result, bail};

use crate::config::Config;
use crate::core::{EntryPoint, ShutdownSignal};
use crate::discovery::discover;
use crate::graph::{self, GraphHandle};
use crate::logger::ProgressLine;
use crate::render;
use crate::utils::plural_count;

pub struct Session {
    config: Arc<Config>,
    graph: GraphHandle,
    shutdown: ShutdownSignal,
}

impl Session {
    pub fn new(config: Config, shutdown: ShutdownSignal) -> Self {
        Self {
            config: Arc::new(config),
            graph: GraphHandle::default(),
            shutdown,
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn graph(&self) -> &GraphHandle {
        &self.graph
    }

    /// Discover entry points, build a complete new graph and swap it in.
    /// Returns the discovered entries. Analysis failures are reported and
    /// the affected entries keep their partial closure.
    pub async fn rebuild_graph(&self) -> Vec<EntryPoint> {
        let config = Arc::clone(&self.config);
        let built = tokio::task::spawn_blocking(move || {
            let entries = discover(&config);
            let build = graph::build(&entries);
            (entries, build)
        })
        .await;

        let (entries, build) = match built {
            Ok(built) => built,
            Err(e) => {
                crate::log!("graph"; "graph build failed, keeping previous graph: {}", e);
                return discover(&self.config);
            }
        };

        if !build.is_complete() {
            for failure in &build.failures {
                crate::log!("graph"; "{}", failure);
            }
        }
        crate::debug!(
            "graph"; "{}, {} edges",
            plural_count(build.graph.entry_count(), "entry point"),
            build.graph.edge_count()
        );
        self.graph.swap(build.graph);
        entries
    }

    /// Render `entries` as one batch against the current config snapshot.
    pub async fn render(&self, entries: Vec<EntryPoint>, progress: bool) -> BatchReport {
        let start = Instant::now();
        let scheduler = render::process_scheduler(&self.config, self.shutdown.clone());
        let tasks = render::tasks_for(entries, &self.config);

        let outcomes = if progress && !tasks.is_empty() {
            let bar = ProgressLine::new(&[("render", tasks.len())]);
            let outcomes = scheduler.run_with(tasks, |_| bar.inc("render")).await;
            bar.finish();
            outcomes
        } else {
            scheduler.run(tasks).await
        };

        BatchReport::new(&outcomes, start.elapsed())
    }

    /// One-shot build of `explicit` entries, or of everything discovered.
    pub async fn build(&self, explicit: Option<Vec<EntryPoint>>) -> Result<BatchReport> {
        let discovered = self.rebuild_graph().await;
        let entries = explicit.unwrap_or(discovered);
        if entries.is_empty() {
            bail!(
                "no entry points found under `{}` (extensions: {})",
                self.config.entry_root.display(),
                self.config.extensions.join(", ")
            );
        }

        let report = self.render(entries, true).await;
        report.print();
        Ok(report)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::Shutdown;
    use crate::utils::path::normalize_path;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Worker that renders the current text of `components/footer.tsx`.
    const WORKER: &str = r#"cat >/dev/null; m=$(cat components/footer.tsx); printf '{"status":"ok","markup":"%s","targetId":"app"}\n' "$m""#;

    struct Site {
        _dir: TempDir,
        config: Config,
    }

    impl Site {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let root = normalize_path(dir.path());
            let mut config = Config {
                config_path: root.join("kiln.json"),
                entry_root: root.join("pages"),
                output_root: root.join("dist"),
                template_root: root.join("templates"),
                renderer: vec!["sh".into(), "-c".into(), WORKER.into()],
                timeout_ms: 5_000,
                grace_ms: 100,
                root,
                ..Config::default()
            };
            config.watch.debounce_ms = 50;

            let site = Self { _dir: dir, config };
            site.write("kiln.json", "{}");
            site.write("components/footer.tsx", "v1");
            site.write("pages/home.tsx", "import F from '../components/footer';");
            site.write("pages/about.tsx", "import F from '../components/footer';");
            fs::create_dir_all(&site.config.template_root).unwrap();
            site
        }

        fn write(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.config.root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn output(&self, rel: &str) -> PathBuf {
            self.config.output_root.join(rel)
        }
    }

    async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    fn contains(path: &Path, needle: &str) -> bool {
        fs::read_to_string(path).is_ok_and(|s| s.contains(needle))
    }

    #[tokio::test]
    async fn build_renders_everything() {
        let site = Site::new();
        let session = Session::new(site.config.clone(), Shutdown::new().signal());

        let report = session.build(None).await.unwrap();
        assert_eq!(report.total(), 2);
        assert!(report.is_success());
        assert!(contains(&site.output("home.html"), "<div id=\"app\">v1</div>"));
        assert!(contains(&site.output("about.html"), "v1"));

        let graph = session.graph().load();
        assert_eq!(graph.entry_count(), 2);
        assert!(graph.is_consistent());
    }

    #[tokio::test]
    async fn explicit_entries_only() {
        let site = Site::new();
        let session = Session::new(site.config.clone(), Shutdown::new().signal());
        let home = crate::discovery::entry_for(&site.config.entry_root.join("home.tsx"), &site.config)
            .unwrap();

        let report = session.build(Some(vec![home])).await.unwrap();
        assert_eq!(report.total(), 1);
        assert!(site.output("home.html").exists());
        assert!(!site.output("about.html").exists());
    }

    #[tokio::test]
    async fn no_entries_is_fatal() {
        let site = Site::new();
        fs::remove_dir_all(&site.config.entry_root).unwrap();
        fs::create_dir_all(&site.config.entry_root).unwrap();
        let session = Session::new(site.config.clone(), Shutdown::new().signal());
        assert!(session.build(None).await.is_err());
    }

    #[tokio::test]
    async fn failing_entry_sets_exit_code() {
        let mut site = Site::new();
        site.config.renderer = vec![
            "sh".into(),
            "-c".into(),
            r#"cat >/dev/null; echo '{"status":"error","kind":"module-load","message":"boom"}'"#.into(),
        ];
        fs::remove_file(site.config.entry_root.join("about.tsx")).unwrap();
        let session = Session::new(site.config.clone(), Shutdown::new().signal());

        let report = session.build(None).await.unwrap();
        assert_eq!(report.total(), 1);
        assert_eq!(report.exit_code(), 1);
        assert!(report.failures[0].contains("module-load-error"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn watch_rerenders_dependents_and_cleans_up() {
        let site = Site::new();
        let shutdown = Shutdown::new();
        let session = Session::new(site.config.clone(), shutdown.signal());
        let task = tokio::spawn(session.watch(None, false));

        let home = site.output("home.html");
        let about = site.output("about.html");
        wait_for("initial build", || contains(&home, "v1") && contains(&about, "v1")).await;

        site.write("components/footer.tsx", "v2");
        wait_for("footer change", || contains(&home, "v2") && contains(&about, "v2")).await;

        fs::remove_file(site.config.entry_root.join("about.tsx")).unwrap();
        wait_for("output removal", || !about.exists()).await;
        assert!(home.exists());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .expect("session stops after shutdown")
            .unwrap()
            .unwrap();
    }
}
