//! Host template lookup.
//!
//! For entry `blog/post.tsx` and template extension `html`, the first
//! existing file wins:
//!
//! ```text
//! <templateRoot>/blog/post.html    mirrors the entry path
//! <templateRoot>/post.html         matches the base name
//! <templateRoot>/index.html        shared fallback
//! ```
//!
//! Without any of them a built-in document is used.

use std::fs;
use std::path::{Path, PathBuf};

use super::task::{ErrorKind, TaskError};
use crate::config::Config;
use crate::core::EntryPoint;

/// Base name of the shared fallback template.
pub const FALLBACK_STEM: &str = "index";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    File(PathBuf),
    Builtin,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub source: TemplateSource,
    pub content: String,
}

impl Template {
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            TemplateSource::File(path) => Some(path),
            TemplateSource::Builtin => None,
        }
    }
}

/// Candidate template paths for `entry`, in lookup order.
pub fn candidates(entry: &EntryPoint, config: &Config) -> Vec<PathBuf> {
    let ext = &config.template_extension;
    let root = &config.template_root;
    let mut out = vec![root.join(format!("{}.{ext}", entry.id_without_ext()))];
    for stem in [entry.stem(), FALLBACK_STEM] {
        let path = root.join(format!("{stem}.{ext}"));
        if !out.contains(&path) {
            out.push(path);
        }
    }
    out
}

/// The template file `entry` would use, if any exists.
pub fn lookup(entry: &EntryPoint, config: &Config) -> Option<PathBuf> {
    candidates(entry, config).into_iter().find(|p| p.is_file())
}

/// Load the host template for `entry`.
pub fn load(entry: &EntryPoint, config: &Config, target_id: &str) -> Result<Template, TaskError> {
    match lookup(entry, config) {
        Some(path) => {
            let content = fs::read_to_string(&path).map_err(|e| {
                TaskError::new(ErrorKind::Template, format!("cannot read template: {e}"))
                    .with_cause(&path)
            })?;
            Ok(Template {
                source: TemplateSource::File(path),
                content,
            })
        }
        None => Ok(Template {
            source: TemplateSource::Builtin,
            content: builtin(entry.stem(), target_id),
        }),
    }
}

fn builtin(title: &str, target_id: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
</head>
<body>
<div id="{target_id}"></div>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::path::normalize_path;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let root = normalize_path(dir.path());
        let config = Config {
            root: root.clone(),
            entry_root: root.join("pages"),
            output_root: root.join("dist"),
            template_root: root.join("templates"),
            ..Config::default()
        };
        fs::create_dir_all(root.join("templates/blog")).unwrap();
        (dir, config)
    }

    fn entry(config: &Config, rel: &str) -> EntryPoint {
        EntryPoint::new(&config.entry_root.join(rel), &config.entry_root).unwrap()
    }

    #[test]
    fn lookup_order() {
        let (_dir, config) = setup();
        let post = entry(&config, "blog/post.tsx");
        let t = &config.template_root;

        assert_eq!(lookup(&post, &config), None);

        fs::write(t.join("index.html"), "index").unwrap();
        assert_eq!(lookup(&post, &config), Some(t.join("index.html")));

        fs::write(t.join("post.html"), "post").unwrap();
        assert_eq!(lookup(&post, &config), Some(t.join("post.html")));

        fs::write(t.join("blog/post.html"), "nested").unwrap();
        assert_eq!(lookup(&post, &config), Some(t.join("blog/post.html")));
    }

    #[test]
    fn top_level_entry_has_no_duplicate_candidates() {
        let (_dir, config) = setup();
        let home = entry(&config, "index.tsx");
        assert_eq!(candidates(&home, &config).len(), 1);
    }

    #[test]
    fn builtin_fallback_has_target() {
        let (_dir, config) = setup();
        let template = load(&entry(&config, "about.tsx"), &config, "root").unwrap();
        assert_eq!(template.source, TemplateSource::Builtin);
        assert!(template.content.contains(r#"<div id="root"></div>"#));
        assert!(template.content.contains("<title>about</title>"));
    }

    #[test]
    fn file_template_is_loaded() {
        let (_dir, config) = setup();
        fs::write(config.template_root.join("about.html"), "<body>custom</body>").unwrap();
        let template = load(&entry(&config, "about.tsx"), &config, "app").unwrap();
        assert_eq!(template.content, "<body>custom</body>");
        assert!(template.path().is_some());
    }
}
