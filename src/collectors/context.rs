use std::env;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use uuid::Uuid;

use crate::cluster::ClusterHandles;
use crate::constants::{LOG_FILE_NAME, WORKSPACE_INFIX};
use crate::utils::archive;

/// Everything a collection run shares: the scratch workspace, its log file,
/// the namespaces under inspection and the cluster handles.
pub struct CollectorContext {
    product: String,
    workspace: PathBuf,
    namespaces: Vec<String>,
    cluster: ClusterHandles,
    log_file: File,
}

impl CollectorContext {
    /// Creates a fresh workspace under the system temp directory
    pub fn new(product: &str, namespaces: &[String], cluster: ClusterHandles) -> Result<Self> {
        Self::new_in(&env::temp_dir(), product, namespaces, cluster)
    }

    /// Creates a fresh workspace under `parent`.
    ///
    /// The directory name carries a random UUID and is created with
    /// `create_dir`, so an existing directory is never reused.
    pub fn new_in(
        parent: &Path,
        product: &str,
        namespaces: &[String],
        cluster: ClusterHandles,
    ) -> Result<Self> {
        let workspace = parent.join(format!("{}-{}-{}", product, WORKSPACE_INFIX, Uuid::new_v4()));
        fs::create_dir(&workspace)
            .context(format!("Failed to create workspace {}", workspace.display()))?;

        let log_path = workspace.join(LOG_FILE_NAME);
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .context(format!("Failed to open log file {}", log_path.display()))?;

        let mut unique: Vec<String> = Vec::with_capacity(namespaces.len());
        for ns in namespaces {
            if !unique.contains(ns) {
                unique.push(ns.clone());
            }
        }

        Ok(Self {
            product: product.to_string(),
            workspace,
            namespaces: unique,
            cluster,
            log_file,
        })
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    pub fn cluster(&self) -> &ClusterHandles {
        &self.cluster
    }

    pub fn log_path(&self) -> PathBuf {
        self.workspace.join(LOG_FILE_NAME)
    }

    /// A second handle on the workspace log file for the file logger
    pub fn log_sink(&self) -> Result<File> {
        self.log_file
            .try_clone()
            .context("Failed to duplicate log file handle")
    }

    /// Archives the workspace into `output_dir` and removes it.
    ///
    /// On failure the workspace is left in place for inspection. Bodies that
    /// outlived their deadline may still hold a reference to the context.
    pub fn wrap_up(&self, output_dir: &Path) -> Result<PathBuf> {
        info!("Archiving workspace {}", self.workspace.display());
        archive::build_archive(&self.workspace, &self.product, output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_cluster;
    use std::io::Write;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_workspace_layout() {
        let parent = TempDir::new().unwrap();
        let namespaces = vec!["nginx".to_string(), "default".to_string(), "nginx".to_string()];

        let ctx = CollectorContext::new_in(parent.path(), "nic", &namespaces, test_cluster()).unwrap();

        let name = ctx.workspace().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("nic-diag-"));
        assert!(ctx.workspace().is_dir());
        assert!(ctx.log_path().is_file());
        assert_eq!(ctx.namespaces(), &["nginx".to_string(), "default".to_string()]);
    }

    #[tokio::test]
    async fn test_workspaces_are_distinct() {
        let parent = TempDir::new().unwrap();
        let ns = vec!["default".to_string()];

        let a = CollectorContext::new_in(parent.path(), "ngx", &ns, test_cluster()).unwrap();
        let b = CollectorContext::new_in(parent.path(), "ngx", &ns, test_cluster()).unwrap();
        assert_ne!(a.workspace(), b.workspace());
    }

    #[tokio::test]
    async fn test_log_sink_appends() {
        let parent = TempDir::new().unwrap();
        let ctx = CollectorContext::new_in(parent.path(), "ngf", &["default".to_string()], test_cluster())
            .unwrap();

        let mut sink = ctx.log_sink().unwrap();
        writeln!(sink, "first").unwrap();
        let mut sink = ctx.log_sink().unwrap();
        writeln!(sink, "second").unwrap();

        let content = fs::read_to_string(ctx.log_path()).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_wrap_up_removes_workspace() {
        let parent = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let ctx = CollectorContext::new_in(parent.path(), "nic", &["default".to_string()], test_cluster())
            .unwrap();
        let workspace = ctx.workspace().to_path_buf();

        let archive = ctx.wrap_up(out.path()).unwrap();
        assert!(archive.is_file());
        assert!(!workspace.exists());
    }
}
