//! Content hashing for output freshness.
//!
//! A rendered document is only written when its blake3 digest differs from
//! the file already on disk. Unchanged outputs keep their mtime, so static
//! servers and browser caches are not disturbed.

use std::io;
use std::path::Path;

/// Digest of in-memory content.
#[inline]
pub fn digest(data: impl AsRef<[u8]>) -> blake3::Hash {
    blake3::hash(data.as_ref())
}

/// Digest of a file on disk, `None` if it cannot be read.
pub fn file_digest(path: &Path) -> Option<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    let mut file = std::fs::File::open(path).ok()?;
    io::copy(&mut file, &mut hasher).ok()?;
    Some(hasher.finalize())
}

/// Whether `path` already holds exactly `content`.
pub fn is_fresh(path: &Path, content: &str) -> bool {
    file_digest(path).is_some_and(|existing| existing == digest(content))
}
