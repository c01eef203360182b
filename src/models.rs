use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// What a single task unit produced: files keyed by workspace-relative path,
/// plus the first failure it ran into, if any.
///
/// A failure does not void the files; the engine persists both.
#[derive(Debug, Default)]
pub struct TaskOutcome {
    pub files: BTreeMap<PathBuf, Vec<u8>>,
    pub error: Option<anyhow::Error>,
    /// Failures recorded after the first one
    pub suppressed_errors: usize,
}

impl TaskOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// An outcome with no files and a single failure
    pub fn failed(error: anyhow::Error) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), content.into());
    }

    /// Record a failure; only the first is kept verbatim
    pub fn record_error(&mut self, error: anyhow::Error) {
        if self.error.is_none() {
            self.error = Some(error);
        } else {
            self.suppressed_errors += 1;
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|v| v.len() as u64).sum()
    }
}

/// Successful job run as reported by the engine
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub name: String,
    pub files_written: usize,
    pub bytes_written: u64,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
