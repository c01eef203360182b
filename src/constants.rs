//! Global constants for the k8s-supportpkg application.
//!
//! This module centralizes hardcoded values (timeouts, file names, archive
//! naming) so the catalog, engine and archive builder agree on them.

use std::time::Duration;

// Job deadlines
/// Default deadline for a catalog job
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for the pod log collection job
pub const POD_LOGS_JOB_TIMEOUT: Duration = Duration::from_secs(120);

// Workspace layout
/// Name of the diagnostic log file inside the workspace
pub const LOG_FILE_NAME: &str = "supportpkg.log";

/// Name of the run summary written before archiving
pub const SUMMARY_FILE_NAME: &str = "supportpkg-summary.json";

/// Infix of the workspace directory name (`<product>-diag-<uuid>`)
pub const WORKSPACE_INFIX: &str = "diag";

// Archive naming
/// Infix of the archive name (`<product>-supportpkg-<epoch>`)
pub const ARCHIVE_INFIX: &str = "supportpkg";

/// Extension of the produced archive
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Chunk size used when hashing collected files (1MB)
pub const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Largest file hashed for the summary manifest, in MB
pub const MAX_HASH_FILE_SIZE_MB: u64 = 1024;

// Helm storage
/// Label selector matching deployed releases in Helm's secret storage driver
pub const HELM_DEPLOYED_SELECTOR: &str = "owner=helm,status=deployed";

/// Data key holding the encoded release in a Helm storage secret
pub const HELM_RELEASE_KEY: &str = "release";

// Kubeconfig discovery
/// Environment variable naming the kubeconfig path list
pub const KUBECONFIG_ENV: &str = "KUBECONFIG";
