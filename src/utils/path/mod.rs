//! Path utilities.
//!
//! - [`fs`]: filesystem path normalization (`normalize_path`, `resolve_path`)
//! - relative identifiers for entry points (`relative_id`)

pub mod fs;

pub use fs::{normalize_path, relative_id, resolve_path};
