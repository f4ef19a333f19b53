//! Static import scanning and specifier resolution.
//!
//! Scanning is purely lexical: the source is never executed. Recognized forms:
//!
//! ```text
//! import Foo from "./foo"            import "./side-effect.css"
//! export { a } from "../shared"      export * from "./all"
//! const m = await import("./lazy")   const x = require("./legacy")
//! @import "./theme.css";             @import url("./print.css");
//! ```
//!
//! Only relative specifiers name project files. Bare specifiers (`react`,
//! `@scope/pkg`) and anything that resolves into `node_modules` are opaque.

use regex::Regex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::discovery::is_vendored;
use crate::utils::path::normalize_path;

/// Extensions tried, in order, for extension-less specifiers.
const RESOLVE_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js", "mjs", "cjs", "json", "css"];

/// Extensions whose contents are scanned for further imports.
const SCANNABLE: &[&str] = &["tsx", "ts", "mts", "cts", "jsx", "js", "mjs", "cjs", "css"];

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?m)(?:^|;)\s*import\s+(?:[\w*{}\s,$]+?\s+from\s+)?["']([^"'\n]+)["']"#,
        r#"|\bexport\s+(?:type\s+)?(?:\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s*from\s+["']([^"'\n]+)["']"#,
        r#"|\bimport\s*\(\s*["']([^"'\n]+)["']\s*\)"#,
        r#"|\brequire\s*\(\s*["']([^"'\n]+)["']\s*\)"#,
        r#"|@import\s+(?:url\(\s*)?["']([^"'\n]+)["']"#,
    ))
    .unwrap()
});

/// Where an import specifier points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A project file (normalized absolute path)
    Local(PathBuf),
    /// Bare package or vendored file, not tracked
    External,
    /// Relative specifier with no matching file; holds the paths that
    /// would have satisfied it
    Unresolved(Vec<PathBuf>),
}

/// Whether the contents of `path` can hold further imports.
pub fn is_scannable(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| SCANNABLE.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

/// Collect import specifiers in source order, duplicates removed.
pub fn scan(source: &str) -> Vec<String> {
    let mut specifiers: Vec<String> = Vec::new();
    for caps in IMPORT_RE.captures_iter(source) {
        let Some(m) = caps.iter().skip(1).flatten().next() else {
            continue;
        };
        let spec = m.as_str().trim();
        if !spec.is_empty() && !specifiers.iter().any(|s| s == spec) {
            specifiers.push(spec.to_string());
        }
    }
    specifiers
}

/// Resolve `specifier` as written in the file `from`.
pub fn resolve(specifier: &str, from: &Path) -> Resolution {
    let spec = specifier.split(['?', '#']).next().unwrap_or(specifier);

    let is_relative = matches!(spec, "." | "..") || spec.starts_with("./") || spec.starts_with("../");
    if !is_relative {
        return Resolution::External;
    }

    let Some(dir) = from.parent() else {
        return Resolution::Unresolved(Vec::new());
    };
    let candidates = candidates(&dir.join(spec));
    match candidates.iter().find(|p| p.is_file()) {
        Some(found) => {
            let found = normalize_path(found);
            if is_vendored(&found) {
                Resolution::External
            } else {
                Resolution::Local(found)
            }
        }
        None => Resolution::Unresolved(
            candidates
                .iter()
                .map(|p| normalize_path(p))
                .filter(|p| !is_vendored(p))
                .collect(),
        ),
    }
}

/// Candidate files for a joined specifier path, in lookup order.
fn candidates(base: &Path) -> Vec<PathBuf> {
    let mut out = vec![base.to_path_buf()];
    let with_ext = |ext: &str| {
        let mut s = base.as_os_str().to_os_string();
        s.push(".");
        s.push(ext);
        PathBuf::from(s)
    };
    out.extend(RESOLVE_EXTENSIONS.iter().map(|ext| with_ext(ext)));

    // `./util.js` written in TypeScript sources refers to `./util.ts`
    if let Some(ext) = base.extension().and_then(OsStr::to_str)
        && matches!(ext, "js" | "jsx" | "mjs")
    {
        out.push(base.with_extension("ts"));
        out.push(base.with_extension("tsx"));
    }

    out.extend(
        RESOLVE_EXTENSIONS
            .iter()
            .map(|ext| base.join(format!("index.{ext}"))),
    );
    out
}
