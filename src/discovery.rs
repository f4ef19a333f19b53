//! Entry-point discovery.
//!
//! Walks the entry root and keeps files whose extension is in the configured
//! filter. Hidden entries and vendored dependency directories are pruned
//! before they are descended into.

use std::path::Path;

use jwalk::WalkDir;

use crate::config::Config;
use crate::core::EntryPoint;
use crate::utils::path::normalize_path;

/// Directory name marking vendored third-party code.
pub const VENDOR_DIR: &str = "node_modules";

/// Whether any component of `path` is a vendored dependency directory.
pub fn is_vendored(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str() == VENDOR_DIR)
}

/// Enumerate all entry points under the configured entry root, sorted by id.
pub fn discover(config: &Config) -> Vec<EntryPoint> {
    let root = &config.entry_root;
    if !root.is_dir() {
        return Vec::new();
    }

    let mut entries: Vec<_> = WalkDir::new(root)
        .skip_hidden(true)
        .process_read_dir(|_, _, _, children| {
            children.retain(|child| {
                child
                    .as_ref()
                    .map_or(true, |entry| entry.file_name() != VENDOR_DIR)
            });
        })
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| normalize_path(&e.path()))
        .filter(|path| config.is_entry_extension(path))
        .filter_map(|path| EntryPoint::new(&path, root))
        .collect();

    entries.sort();
    entries
}

/// Entry point for `path` if it is one (inside the entry root, supported
/// extension, not vendored).
pub fn entry_for(path: &Path, config: &Config) -> Option<EntryPoint> {
    if !config.is_entry_extension(path) || is_vendored(path) {
        return None;
    }
    EntryPoint::new(path, &config.entry_root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_for(dir: &TempDir) -> Config {
        let root = normalize_path(dir.path());
        Config {
            root: root.clone(),
            entry_root: root.join("pages"),
            output_root: root.join("dist"),
            template_root: root.join("templates"),
            ..Config::default()
        }
    }

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "export default null;").unwrap();
    }

    #[test]
    fn discovers_by_extension() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        touch(&config.entry_root, "index.tsx");
        touch(&config.entry_root, "blog/post.jsx");
        touch(&config.entry_root, "blog/util.ts");
        touch(&config.entry_root, "styles.css");

        let ids: Vec<_> = discover(&config).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["blog/post.jsx", "index.tsx"]);
    }

    #[test]
    fn prunes_vendor_and_hidden() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        touch(&config.entry_root, "home.tsx");
        touch(&config.entry_root, "node_modules/pkg/page.tsx");
        touch(&config.entry_root, ".cache/old.tsx");

        let ids: Vec<_> = discover(&config).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["home.tsx"]);
    }

    #[test]
    fn missing_root_yields_nothing() {
        let dir = TempDir::new().unwrap();
        assert!(discover(&config_for(&dir)).is_empty());
    }

    #[test]
    fn entry_for_checks_root_and_extension() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir);
        assert!(entry_for(&config.entry_root.join("a.tsx"), &config).is_some());
        assert!(entry_for(&config.entry_root.join("a.css"), &config).is_none());
        assert!(entry_for(&config.root.join("a.tsx"), &config).is_none());
        assert!(entry_for(&config.entry_root.join("node_modules/x/a.tsx"), &config).is_none());
    }
}
