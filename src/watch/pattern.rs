//! `watch.extra` patterns.
//!
//! Patterns are relative to the project root and use a small glob dialect:
//!
//! ```text
//! styles/**/*.css   `**` spans directories
//! data/*.json       `*` stays inside one path segment
//! theme/v?.css      `?` is one character
//! content           a plain path: the file, or anything below the directory
//! ```

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::utils::path::normalize_path;

#[derive(Debug, Clone)]
pub struct ExtraPattern {
    source: String,
    /// Longest wildcard-free prefix, absolute
    base: PathBuf,
    regex: Regex,
}

impl ExtraPattern {
    /// Compile `pattern` against `root`. Returns `None` for patterns that do
    /// not compile.
    pub fn new(pattern: &str, root: &Path) -> Option<Self> {
        let trimmed = pattern.trim().trim_start_matches("./").trim_end_matches('/');
        if trimmed.is_empty() {
            return None;
        }

        let root = normalize_path(root);
        let literal: Vec<&str> = trimmed
            .split('/')
            .take_while(|seg| !has_wildcard(seg))
            .collect();
        let base = root.join(literal.join("/"));

        let regex = Regex::new(&to_regex(trimmed, &root)).ok()?;
        Some(Self {
            source: pattern.to_string(),
            base,
            regex,
        })
    }

    /// Compile every pattern, logging the ones that fail.
    pub fn compile_all(patterns: &[String], root: &Path) -> Vec<Self> {
        patterns
            .iter()
            .filter_map(|p| {
                let compiled = Self::new(p, root);
                if compiled.is_none() {
                    crate::log!("watch"; "ignoring invalid watch pattern `{}`", p);
                }
                compiled
            })
            .collect()
    }

    /// Directory to watch recursively for this pattern.
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.to_str().is_some_and(|p| self.regex.is_match(p))
    }
}

fn has_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?'])
}

fn to_regex(pattern: &str, root: &Path) -> String {
    let mut out = format!("^{}/", regex::escape(&root.to_string_lossy()));
    let mut chars = pattern.chars().peekable();
    let mut literal_only = true;

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                literal_only = false;
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:.*/)?");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => {
                literal_only = false;
                out.push_str("[^/]*");
            }
            '?' => {
                literal_only = false;
                out.push_str("[^/]");
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }

    if literal_only {
        out.push_str("(?:/.*)?");
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(p: &str) -> ExtraPattern {
        ExtraPattern::new(p, Path::new("/nowhere/site")).unwrap()
    }

    #[test]
    fn double_star_spans_directories() {
        let p = pattern("styles/**/*.css");
        assert!(p.matches(Path::new("/nowhere/site/styles/a.css")));
        assert!(p.matches(Path::new("/nowhere/site/styles/x/y/b.css")));
        assert!(!p.matches(Path::new("/nowhere/site/styles/a.scss")));
        assert!(!p.matches(Path::new("/nowhere/site/other/a.css")));
        assert_eq!(p.base(), Path::new("/nowhere/site/styles"));
    }

    #[test]
    fn single_star_stays_in_segment() {
        let p = pattern("data/*.json");
        assert!(p.matches(Path::new("/nowhere/site/data/posts.json")));
        assert!(!p.matches(Path::new("/nowhere/site/data/nested/posts.json")));
    }

    #[test]
    fn plain_path_covers_directory_contents() {
        let p = pattern("./content/");
        assert!(p.matches(Path::new("/nowhere/site/content")));
        assert!(p.matches(Path::new("/nowhere/site/content/a/b.md")));
        assert!(!p.matches(Path::new("/nowhere/site/contents")));
        assert_eq!(p.base(), Path::new("/nowhere/site/content"));
    }

    #[test]
    fn question_mark_and_escaping() {
        let p = pattern("theme/v?.css");
        assert!(p.matches(Path::new("/nowhere/site/theme/v2.css")));
        assert!(!p.matches(Path::new("/nowhere/site/theme/v10.css")));
        assert!(!pattern("a.css").matches(Path::new("/nowhere/site/aXcss")));
    }

    #[test]
    fn empty_patterns_are_dropped() {
        let compiled = ExtraPattern::compile_all(&["".into(), "x/*".into()], Path::new("/r"));
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].as_str(), "x/*");
    }
}
