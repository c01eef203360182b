//! Per-run state shared by task units.
//!
//! - [`context`]: the workspace, its log file, the namespace set and the
//!   cluster handles
//! - [`deadline`]: the deadline and cancellation signal handed to each body

pub mod context;
pub mod deadline;

pub use context::CollectorContext;
pub use deadline::DeadlineSignal;
