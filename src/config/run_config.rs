use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::ClusterSettings;

/// Optional settings read from a YAML file.
///
/// Command-line flags take precedence over every value here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Path to a kubeconfig file
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context to use instead of the current one
    pub context: Option<String>,
    /// Directory receiving the archive
    pub output_dir: Option<PathBuf>,
    /// Per-job deadlines in seconds, keyed by job name
    pub job_timeouts: BTreeMap<String, u64>,
}

impl RunConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: RunConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?;
        config.validate()?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml).context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// A starting point for `init-config`: the pod log deadline spelled out
    pub fn template() -> Self {
        let mut job_timeouts = BTreeMap::new();
        job_timeouts.insert(
            "collect-pods-logs".to_string(),
            crate::constants::POD_LOGS_JOB_TIMEOUT.as_secs(),
        );
        Self {
            job_timeouts,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        for (job, secs) in &self.job_timeouts {
            if *secs == 0 {
                bail!("Timeout for job '{}' must be greater than zero", job);
            }
        }
        Ok(())
    }

    /// Deadline overrides as durations
    pub fn timeout_overrides(&self) -> BTreeMap<String, Duration> {
        self.job_timeouts
            .iter()
            .map(|(name, secs)| (name.clone(), Duration::from_secs(*secs)))
            .collect()
    }

    /// Merges flag values over the file values
    pub fn cluster_settings(
        &self,
        kubeconfig: Option<PathBuf>,
        context: Option<String>,
    ) -> ClusterSettings {
        ClusterSettings {
            kubeconfig: kubeconfig.or_else(|| self.kubeconfig.clone()),
            context: context.or_else(|| self.context.clone()),
        }
    }
}
