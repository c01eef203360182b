//! Task units, the catalog that orders them and the engine that runs them.
//!
//! ## Architecture
//!
//! ```text
//! catalog::build_catalog(product)
//!        │  Vec<Arc<dyn TaskUnit>>
//!        ▼
//! engine::JobEngine::run_catalog ──► one progress line per unit
//!        │  spawn body, race deadline, persist files
//!        ▼
//! Vec<JobRecord> ──► summary
//! ```

pub mod catalog;
pub mod engine;
pub mod units;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::collectors::context::CollectorContext;
use crate::collectors::deadline::DeadlineSignal;
use crate::models::{JobReport, TaskOutcome};

pub use catalog::build_catalog;
pub use engine::JobEngine;

/// One named piece of collection work with its own deadline.
///
/// The body returns whatever it produced together with the first failure it
/// hit. It should pass `signal` to every cluster call so those calls stop
/// once the engine gives up on the unit.
#[async_trait]
pub trait TaskUnit: Send + Sync {
    fn name(&self) -> &str;

    fn deadline(&self) -> Duration;

    async fn run(&self, ctx: &CollectorContext, signal: DeadlineSignal) -> TaskOutcome;
}

/// Why a unit did not complete cleanly
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job {name} timed out after {timeout:?}")]
    TimedOut { name: String, timeout: Duration },

    #[error("{source:#}")]
    Failed {
        name: String,
        #[source]
        source: anyhow::Error,
        files_written: usize,
    },

    #[error("job {name} aborted before reporting a result")]
    Aborted { name: String },

    #[error("job {name} could not persist {}: {source:#}", .path.display())]
    Persist {
        name: String,
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl JobError {
    pub fn job_name(&self) -> &str {
        match self {
            JobError::TimedOut { name, .. }
            | JobError::Failed { name, .. }
            | JobError::Aborted { name }
            | JobError::Persist { name, .. } => name,
        }
    }

    /// Short machine-readable status used in the run summary
    pub fn status(&self) -> &'static str {
        match self {
            JobError::TimedOut { .. } => "timed_out",
            JobError::Failed { .. } => "failed",
            JobError::Aborted { .. } => "aborted",
            JobError::Persist { .. } => "persist_failed",
        }
    }
}

/// Result of running one unit from the catalog
#[derive(Debug)]
pub struct JobRecord {
    pub name: String,
    pub result: Result<JobReport, JobError>,
}

impl JobRecord {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn status(&self) -> &'static str {
        match &self.result {
            Ok(_) => "ok",
            Err(e) => e.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_error_messages() {
        let timed_out = JobError::TimedOut {
            name: "pod-list".to_string(),
            timeout: Duration::from_secs(2),
        };
        assert_eq!(timed_out.to_string(), "job pod-list timed out after 2s");
        assert_eq!(timed_out.status(), "timed_out");

        let failed = JobError::Failed {
            name: "exec-nginx-t".to_string(),
            source: anyhow!("connection refused").context("Command execution failed"),
            files_written: 1,
        };
        assert_eq!(failed.to_string(), "Command execution failed: connection refused");
        assert_eq!(failed.job_name(), "exec-nginx-t");
    }

    #[test]
    fn test_record_status() {
        let record = JobRecord {
            name: "crd-info".to_string(),
            result: Err(JobError::Aborted {
                name: "crd-info".to_string(),
            }),
        };
        assert!(!record.is_ok());
        assert_eq!(record.status(), "aborted");
    }
}
