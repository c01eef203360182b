//! Security utilities and validation functions.
//!
//! Task output keys come from code that formats cluster object names into
//! paths; everything written to disk goes through these checks first.

pub mod path_validator;

pub use path_validator::{relative_destination, resolve_in_workspace, sanitize_filename};
