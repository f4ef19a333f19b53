//! Configuration path helpers.

use std::path::{Path, PathBuf};

/// Find config file by searching upward from the current directory.
///
/// ```text
/// /home/user/site/src/pages/   ← cwd
/// /home/user/site/kiln.json    ← found
/// ```
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let cwd = std::env::current_dir().ok()?;
    let mut current = cwd.as_path();
    loop {
        let candidate = current.join(config_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

/// Expand `~` and make `path` absolute against `root`.
pub fn resolve_config_path(path: &Path, root: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::tilde(&raw);
    let expanded = Path::new(expanded.as_ref());
    let joined = if expanded.is_absolute() {
        expanded.to_path_buf()
    } else {
        root.join(expanded)
    };
    crate::utils::path::normalize_path(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_root() {
        let resolved = resolve_config_path(Path::new("pages"), Path::new("/nowhere/site"));
        assert_eq!(resolved, PathBuf::from("/nowhere/site/pages"));
    }

    #[test]
    fn absolute_paths_stay() {
        let resolved = resolve_config_path(Path::new("/abs/out"), Path::new("/nowhere/site"));
        assert_eq!(resolved, PathBuf::from("/abs/out"));
    }
}
