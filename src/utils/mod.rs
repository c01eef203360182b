//! Archive building, file hashing and the run summary.

pub mod archive;
pub mod hash;
pub mod summary;
