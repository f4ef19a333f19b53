//! Small shared helpers.

pub mod hash;
pub mod path;
pub mod plural;
pub mod text;

pub use plural::plural_count;
