//! Data models for the website content backend.
//!
//! Field names serialize in camelCase to match the stored document verbatim.

mod content;
mod path;
mod record;
mod status;

pub use content::*;
pub use path::*;
pub use record::*;
pub use status::*;
