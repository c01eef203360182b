use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use log::{debug, info};

use crate::constants::KUBECONFIG_ENV;

/// Where cluster credentials come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KubeconfigSource {
    /// Path given on the command line or in the run configuration
    Explicit(PathBuf),
    /// First entry of the `KUBECONFIG` path list
    Environment(PathBuf),
    /// `$HOME/.kube/config`
    Home(PathBuf),
    /// Service account mounted into the pod the collector runs in
    InCluster,
}

impl KubeconfigSource {
    /// Picks the source for this process.
    ///
    /// Order: explicit path, `KUBECONFIG`, `$HOME/.kube/config` when it
    /// exists, then the in-cluster service account.
    pub fn discover(explicit: Option<&Path>) -> Self {
        Self::discover_with(
            explicit,
            env::var_os(KUBECONFIG_ENV).map(PathBuf::from),
            env::var_os("HOME").map(PathBuf::from),
        )
    }

    pub fn discover_with(
        explicit: Option<&Path>,
        kubeconfig_env: Option<PathBuf>,
        home: Option<PathBuf>,
    ) -> Self {
        if let Some(path) = explicit {
            return KubeconfigSource::Explicit(path.to_path_buf());
        }

        if let Some(list) = kubeconfig_env {
            if let Some(first) = env::split_paths(&list).find(|p| !p.as_os_str().is_empty()) {
                return KubeconfigSource::Environment(first);
            }
        }

        if let Some(home) = home {
            let candidate = home.join(".kube").join("config");
            if candidate.is_file() {
                return KubeconfigSource::Home(candidate);
            }
        }

        KubeconfigSource::InCluster
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            KubeconfigSource::Explicit(p)
            | KubeconfigSource::Environment(p)
            | KubeconfigSource::Home(p) => Some(p),
            KubeconfigSource::InCluster => None,
        }
    }
}

impl fmt::Display for KubeconfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path() {
            Some(p) => write!(f, "kubeconfig {}", p.display()),
            None => write!(f, "in-cluster service account"),
        }
    }
}

/// Cluster connection settings gathered from flags and the run configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSettings {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
}

impl ClusterSettings {
    pub fn source(&self) -> KubeconfigSource {
        KubeconfigSource::discover(self.kubeconfig.as_deref())
    }

    /// Produces the client configuration for the discovered source
    pub async fn load(&self) -> Result<kube::Config> {
        let source = self.source();
        info!("Loading cluster credentials from {}", source);

        match source.path() {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
                let options = KubeConfigOptions {
                    context: self.context.clone(),
                    ..Default::default()
                };
                debug!("Kubeconfig context override: {:?}", self.context);
                kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .with_context(|| format!("Failed to load kubeconfig {}", path.display()))
            }
            None => kube::Config::incluster()
                .context("No kubeconfig found and not running inside a cluster"),
        }
    }
}
