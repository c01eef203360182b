use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use serde_json::json;
use uuid::Uuid;

use crate::constants::{LOG_FILE_NAME, SUMMARY_FILE_NAME};
use crate::jobs::JobRecord;
use crate::utils::hash;

/// Create a JSON summary of the collection run.
///
/// Lists every job with its status and a SHA-256 manifest of the files
/// collected into `workspace`, so the receiving side can check the archive
/// contents.
///
/// # Example Output
///
/// ```json
/// {
///   "collection_id": "550e8400-e29b-41d4-a716-446655440000",
///   "product": "nic",
///   "namespaces": ["nginx-ingress"],
///   "collection_time": "2024-01-15T14:30:52Z",
///   "jobs": [{"name": "pod-list", "status": "ok", "files_written": 1, ...}],
///   "files": {"resources/nginx-ingress/pods.json": "9f86d0..."}
/// }
/// ```
pub fn create_run_summary(
    product: &str,
    namespaces: &[String],
    records: &[JobRecord],
    workspace: &Path,
) -> Result<String> {
    let jobs: Vec<_> = records
        .iter()
        .map(|record| match &record.result {
            Ok(report) => {
                let mut entry =
                    serde_json::to_value(report).unwrap_or_else(|_| json!({ "name": record.name }));
                entry["status"] = json!(record.status());
                entry
            }
            Err(e) => json!({
                "name": record.name,
                "status": record.status(),
                "error": e.to_string(),
            }),
        })
        .collect();

    let files = hash::manifest(workspace, &[LOG_FILE_NAME, SUMMARY_FILE_NAME])
        .context("Failed to hash collected files")?;

    let summary = json!({
        "collection_id": Uuid::new_v4().to_string(),
        "product": product,
        "namespaces": namespaces,
        "collection_time": Utc::now().to_rfc3339(),
        "collector_version": env!("CARGO_PKG_VERSION"),
        "jobs_total": records.len(),
        "jobs_ok": records.iter().filter(|r| r.is_ok()).count(),
        "jobs": jobs,
        "files": files,
    });

    serde_json::to_string_pretty(&summary).context("Failed to serialize run summary to JSON")
}

/// Writes the run summary into the workspace
pub fn write_run_summary(
    product: &str,
    namespaces: &[String],
    records: &[JobRecord],
    workspace: &Path,
) -> Result<()> {
    let summary = create_run_summary(product, namespaces, records, workspace)?;
    let path = workspace.join(SUMMARY_FILE_NAME);
    fs::write(&path, summary).context(format!("Failed to write summary {}", path.display()))?;
    info!("Run summary written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobError;
    use crate::models::JobReport;
    use serde_json::Value;
    use std::time::Duration;
    use tempfile::TempDir;

    fn records() -> Vec<JobRecord> {
        vec![
            JobRecord {
                name: "pod-list".to_string(),
                result: Ok(JobReport {
                    name: "pod-list".to_string(),
                    files_written: 1,
                    bytes_written: 2,
                    duration: Duration::from_millis(15),
                }),
            },
            JobRecord {
                name: "metrics-info".to_string(),
                result: Err(JobError::TimedOut {
                    name: "metrics-info".to_string(),
                    timeout: Duration::from_secs(10),
                }),
            },
        ]
    }

    #[test]
    fn test_summary_lists_every_job() {
        let ws = TempDir::new().unwrap();
        fs::create_dir_all(ws.path().join("resources/default")).unwrap();
        fs::write(ws.path().join("resources/default/pods.json"), b"[]").unwrap();
        fs::write(ws.path().join(LOG_FILE_NAME), b"log").unwrap();

        let summary =
            create_run_summary("nic", &["default".to_string()], &records(), ws.path()).unwrap();
        let json: Value = serde_json::from_str(&summary).unwrap();

        assert_eq!(json["product"], "nic");
        assert_eq!(json["jobs_total"], 2);
        assert_eq!(json["jobs_ok"], 1);
        assert_eq!(json["jobs"][0]["status"], "ok");
        assert_eq!(json["jobs"][0]["duration_ms"], 15);
        assert_eq!(json["jobs"][1]["status"], "timed_out");
        assert!(json["jobs"][1]["error"].as_str().unwrap().contains("timed out"));

        let files = json["files"].as_object().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.contains_key("resources/default/pods.json"));
    }

    #[test]
    fn test_unique_collection_ids() {
        let ws = TempDir::new().unwrap();
        let a: Value =
            serde_json::from_str(&create_run_summary("ngx", &[], &[], ws.path()).unwrap()).unwrap();
        let b: Value =
            serde_json::from_str(&create_run_summary("ngx", &[], &[], ws.path()).unwrap()).unwrap();
        assert_ne!(a["collection_id"], b["collection_id"]);
    }

    #[test]
    fn test_write_run_summary() {
        let ws = TempDir::new().unwrap();
        write_run_summary("ngf", &["ngf".to_string()], &records(), ws.path()).unwrap();
        assert!(ws.path().join(SUMMARY_FILE_NAME).is_file());
    }
}
