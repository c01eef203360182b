//! Test utilities for k8s-supportpkg
//!
//! Fake task units and a collector context wired to a client that is never
//! contacted.

#![cfg(test)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

use crate::cluster::ClusterHandles;
use crate::collectors::context::CollectorContext;
use crate::collectors::deadline::DeadlineSignal;
use crate::constants::DEFAULT_JOB_TIMEOUT;
use crate::jobs::TaskUnit;
use crate::models::TaskOutcome;

/// Cluster handles pointing at a closed local port.
///
/// Must be called inside a tokio runtime.
pub fn test_cluster() -> ClusterHandles {
    let url = "http://127.0.0.1:9".parse().unwrap();
    let client = kube::Client::try_from(kube::Config::new(url)).unwrap();
    ClusterHandles::from_client(client)
}

/// A context for product `nic` over namespace `default`, created under `parent`
pub fn test_context(parent: &Path) -> CollectorContext {
    CollectorContext::new_in(parent, "nic", &["default".to_string()], test_cluster()).unwrap()
}

#[derive(Debug, Clone)]
enum Behavior {
    Complete {
        after: Duration,
        files: Vec<(PathBuf, Vec<u8>)>,
    },
    Fail(String),
    Panic(String),
    Hang,
}

/// A task unit with scripted behavior
#[derive(Debug, Clone)]
pub struct FakeUnit {
    name: String,
    deadline: Duration,
    behavior: Behavior,
}

impl FakeUnit {
    pub fn completes(name: &str, after: Duration, files: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            deadline: DEFAULT_JOB_TIMEOUT,
            behavior: Behavior::Complete {
                after,
                files: files
                    .iter()
                    .map(|(p, c)| (PathBuf::from(p), c.as_bytes().to_vec()))
                    .collect(),
            },
        }
    }

    pub fn fails(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            deadline: DEFAULT_JOB_TIMEOUT,
            behavior: Behavior::Fail(message.to_string()),
        }
    }

    pub fn panics(name: &str) -> Self {
        Self {
            name: name.to_string(),
            deadline: DEFAULT_JOB_TIMEOUT,
            behavior: Behavior::Panic(format!("{} panicked", name)),
        }
    }

    pub fn hangs(name: &str, deadline: Duration) -> Self {
        Self {
            name: name.to_string(),
            deadline,
            behavior: Behavior::Hang,
        }
    }
}

#[async_trait]
impl TaskUnit for FakeUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn deadline(&self) -> Duration {
        self.deadline
    }

    async fn run(&self, _ctx: &CollectorContext, signal: DeadlineSignal) -> TaskOutcome {
        match &self.behavior {
            Behavior::Complete { after, files } => {
                tokio::time::sleep(*after).await;
                let mut outcome = TaskOutcome::new();
                for (path, content) in files {
                    outcome.insert(path.clone(), content.clone());
                }
                outcome
            }
            Behavior::Fail(message) => TaskOutcome::failed(anyhow!("{}", message)),
            Behavior::Panic(message) => panic!("{}", message),
            Behavior::Hang => {
                let result: anyhow::Result<()> = signal
                    .guard("hang", futures::future::pending::<anyhow::Result<()>>())
                    .await;
                TaskOutcome::failed(result.err().unwrap_or_else(|| anyhow!("unreachable")))
            }
        }
    }
}
