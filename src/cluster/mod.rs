//! Cluster access shared by every task unit.
//!
//! One [`kube::Client`] serves typed listings, custom resources, metrics and
//! discovery. Remote command execution goes through an [`ExecTransport`] so
//! it can be substituted without a cluster.

pub mod crds;
pub mod exec;
pub mod helm;
pub mod metrics;
pub mod resources;

use std::sync::Arc;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::Api;
use kube::Client;
use log::{debug, info};

use crate::config::ClusterSettings;

pub use exec::{ExecTarget, ExecTransport, KubeExecTransport, PodExecutor};
pub use helm::ReleaseManager;

/// Handles used by task units to talk to the cluster
#[derive(Clone)]
pub struct ClusterHandles {
    client: Client,
    exec: Arc<dyn ExecTransport>,
    api_server: Option<String>,
}

impl ClusterHandles {
    /// Builds handles from resolved cluster settings
    pub async fn connect(settings: &ClusterSettings) -> Result<Self> {
        let config = settings.load().await?;
        let api_server = config.cluster_url.to_string();
        info!("Using API server {}", api_server);

        let client = Client::try_from(config).context("Failed to create Kubernetes client")?;
        Ok(Self {
            api_server: Some(api_server),
            ..Self::from_client(client)
        })
    }

    /// Wraps an existing client; exec goes over the same client
    pub fn from_client(client: Client) -> Self {
        let exec = Arc::new(KubeExecTransport::new(client.clone()));
        Self {
            client,
            exec,
            api_server: None,
        }
    }

    /// Replaces the exec transport
    pub fn with_exec_transport(mut self, transport: Arc<dyn ExecTransport>) -> Self {
        self.exec = transport;
        self
    }

    /// API server URL, known when built from cluster settings
    pub fn api_server(&self) -> Option<&str> {
        self.api_server.as_deref()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn executor(&self) -> PodExecutor {
        PodExecutor::new(Arc::clone(&self.exec))
    }

    /// Helm release access for one namespace
    pub fn helm(&self, namespace: &str) -> ReleaseManager {
        ReleaseManager::new(self.client.clone(), namespace)
    }

    /// Returns the namespaces from `namespaces` that do not exist
    pub async fn missing_namespaces(&self, namespaces: &[String]) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let mut missing = Vec::new();

        for namespace in namespaces {
            let found = api
                .get_opt(namespace)
                .await
                .with_context(|| format!("Failed to look up namespace {}", namespace))?;
            match found {
                Some(_) => debug!("Namespace {} exists", namespace),
                None => missing.push(namespace.clone()),
            }
        }

        Ok(missing)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::test_cluster;

    #[tokio::test]
    async fn test_api_server_unknown_for_bare_client() {
        assert!(test_cluster().api_server().is_none());
    }
}
