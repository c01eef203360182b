use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use log::{debug, error, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;

use crate::collectors::context::CollectorContext;
use crate::collectors::deadline::DeadlineSignal;
use crate::jobs::{JobError, JobRecord, TaskUnit};
use crate::models::JobReport;
use crate::security::resolve_in_workspace;

/// Runs task units one at a time, each under its own deadline
#[derive(Debug, Clone, Default)]
pub struct JobEngine {
    overrides: BTreeMap<String, Duration>,
}

impl JobEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline overrides keyed by job name
    pub fn with_overrides(overrides: BTreeMap<String, Duration>) -> Self {
        Self { overrides }
    }

    pub fn deadline_for(&self, unit: &dyn TaskUnit) -> Duration {
        self.overrides
            .get(unit.name())
            .copied()
            .unwrap_or_else(|| unit.deadline())
    }

    /// Runs one unit and persists its files into the workspace.
    ///
    /// The body runs on its own task. If the deadline passes first the
    /// signal is cancelled and the body's eventual result is discarded.
    /// Files reported together with an error are still written.
    pub async fn run_job(
        &self,
        unit: &Arc<dyn TaskUnit>,
        ctx: &Arc<CollectorContext>,
    ) -> Result<JobReport, JobError> {
        let name = unit.name().to_string();
        let timeout = self.deadline_for(unit.as_ref());
        let signal = DeadlineSignal::new(timeout);
        let started = Instant::now();

        info!("Job {} has started (deadline {:?})", name, timeout);

        let (tx, rx) = oneshot::channel();
        {
            let unit = Arc::clone(unit);
            let ctx = Arc::clone(ctx);
            let signal = signal.clone();
            tokio::spawn(async move {
                let outcome = unit.run(&ctx, signal).await;
                // The receiver is gone once the deadline has passed
                let _ = tx.send(outcome);
            });
        }

        let outcome = match tokio::time::timeout_at(signal.deadline(), rx).await {
            Err(_) => {
                signal.cancel();
                warn!("Job {} has timed out after {:?}", name, timeout);
                return Err(JobError::TimedOut { name, timeout });
            }
            Ok(Err(_)) => {
                error!("Job {} ended without reporting a result", name);
                return Err(JobError::Aborted { name });
            }
            Ok(Ok(outcome)) => outcome,
        };

        debug!(
            "Job {} produced {} files ({} bytes)",
            name,
            outcome.files.len(),
            outcome.total_bytes()
        );
        if outcome.suppressed_errors > 0 {
            debug!(
                "Job {} recorded {} additional failures",
                name, outcome.suppressed_errors
            );
        }

        let mut files_written = 0usize;
        let mut bytes_written = 0u64;
        for (key, content) in &outcome.files {
            let path = persist_file(&name, ctx.workspace(), key, content).await?;
            files_written += 1;
            bytes_written += content.len() as u64;
            info!("Job {} wrote {} bytes to {}", name, content.len(), path.display());
        }

        if let Some(source) = outcome.error {
            warn!("Job {} has failed: {:#}", name, source);
            return Err(JobError::Failed {
                name,
                source,
                files_written,
            });
        }

        let report = JobReport {
            name,
            files_written,
            bytes_written,
            duration: started.elapsed(),
        };
        info!("Job {} completed successfully in {:?}", report.name, report.duration);
        Ok(report)
    }

    /// Runs `units` in order, writing one progress line per unit to `progress`
    pub async fn run_catalog<W: Write>(
        &self,
        units: &[Arc<dyn TaskUnit>],
        ctx: &Arc<CollectorContext>,
        progress: &mut W,
    ) -> Vec<JobRecord> {
        let mut records = Vec::with_capacity(units.len());

        for unit in units {
            report_progress(progress, format_args!("Running job {}...", unit.name()));

            let result = self.run_job(unit, ctx).await;
            match &result {
                Ok(_) => report_progress(progress, format_args!(" OK\n")),
                Err(e) => report_progress(progress, format_args!(" Error: {}\n", e)),
            }

            records.push(JobRecord {
                name: unit.name().to_string(),
                result,
            });
        }

        let failed = records.iter().filter(|r| !r.is_ok()).count();
        info!("Ran {} jobs, {} did not complete cleanly", records.len(), failed);
        records
    }
}

fn report_progress<W: Write>(out: &mut W, args: std::fmt::Arguments<'_>) {
    if let Err(e) = out.write_fmt(args).and_then(|_| out.flush()) {
        debug!("Failed to write progress: {}", e);
    }
}

async fn persist_file(
    job: &str,
    workspace: &Path,
    key: &Path,
    content: &[u8],
) -> Result<PathBuf, JobError> {
    let persist_error = |source: anyhow::Error| JobError::Persist {
        name: job.to_string(),
        path: key.to_path_buf(),
        source,
    };

    let path = resolve_in_workspace(workspace, key).map_err(persist_error)?;

    let result: anyhow::Result<()> = async {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let mut file = tokio::fs::File::create(&path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("Failed to flush {}", path.display()))?;
        Ok(())
    }
    .await;

    result.map_err(persist_error)?;
    Ok(path)
}
