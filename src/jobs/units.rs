//! Concrete task units.
//!
//! Each unit is plain data describing what to collect; the catalog lists
//! them per product. A failing sub-query (one namespace, one pod) is logged
//! and recorded in the outcome and the unit carries on with the rest.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams, LogParams};
use kube::{Client, ResourceExt};
use log::{debug, warn};
use serde_json::json;

use crate::cluster::crds::CustomResource;
use crate::cluster::exec::ExecTarget;
use crate::cluster::helm::HelmSettings;
use crate::cluster::metrics;
use crate::cluster::resources::{ClusterKind, NamespacedKind};
use crate::collectors::context::CollectorContext;
use crate::collectors::deadline::DeadlineSignal;
use crate::constants::{DEFAULT_JOB_TIMEOUT, POD_LOGS_JOB_TIMEOUT};
use crate::jobs::TaskUnit;
use crate::models::TaskOutcome;
use crate::security::sanitize_filename;

fn rel(parts: &[&str]) -> PathBuf {
    parts.iter().collect()
}

fn record(outcome: &mut TaskOutcome, error: anyhow::Error) {
    warn!("{:#}", error);
    outcome.record_error(error);
}

async fn list_pods(client: &Client, namespace: &str, signal: &DeadlineSignal) -> Result<Vec<Pod>> {
    let api: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let pods = signal
        .guard("pod list", api.list(&ListParams::default()))
        .await
        .with_context(|| format!("Could not retrieve pod list for namespace {}", namespace))?;
    Ok(pods.items)
}

/// Lists one namespaced kind in every namespace
#[derive(Debug, Clone)]
pub struct NamespacedListUnit {
    pub name: &'static str,
    pub kind: NamespacedKind,
    /// Directory under the workspace, `resources` or `k8s/rbac`
    pub base: &'static str,
}

#[async_trait]
impl TaskUnit for NamespacedListUnit {
    fn name(&self) -> &str {
        self.name
    }

    fn deadline(&self) -> Duration {
        DEFAULT_JOB_TIMEOUT
    }

    async fn run(&self, ctx: &CollectorContext, signal: DeadlineSignal) -> TaskOutcome {
        let mut outcome = TaskOutcome::new();
        let client = ctx.cluster().client();

        for namespace in ctx.namespaces() {
            match self.kind.list_json(client, namespace, &signal).await {
                Ok(json) => {
                    let file = format!("{}.json", self.kind.plural());
                    let path = PathBuf::from(self.base).join(namespace).join(file);
                    outcome.insert(path, json);
                }
                Err(e) => record(
                    &mut outcome,
                    e.context(format!(
                        "Could not retrieve {} list for namespace {}",
                        self.kind.plural(),
                        namespace
                    )),
                ),
            }
        }
        outcome
    }
}

/// Lists one cluster-scoped kind into a single file
#[derive(Debug, Clone)]
pub struct ClusterListUnit {
    pub name: &'static str,
    pub kind: ClusterKind,
    pub file: &'static str,
}

#[async_trait]
impl TaskUnit for ClusterListUnit {
    fn name(&self) -> &str {
        self.name
    }

    fn deadline(&self) -> Duration {
        DEFAULT_JOB_TIMEOUT
    }

    async fn run(&self, ctx: &CollectorContext, signal: DeadlineSignal) -> TaskOutcome {
        match self.kind.list_json(ctx.cluster().client(), &signal).await {
            Ok(json) => {
                let mut outcome = TaskOutcome::new();
                outcome.insert(self.file, json);
                outcome
            }
            Err(e) => {
                let e = e.context(format!("Could not retrieve {}", self.kind.plural()));
                warn!("{:#}", e);
                TaskOutcome::failed(e)
            }
        }
    }
}

/// Logs of every container of every pod
#[derive(Debug, Clone, Default)]
pub struct PodLogsUnit;

#[async_trait]
impl TaskUnit for PodLogsUnit {
    fn name(&self) -> &str {
        "collect-pods-logs"
    }

    fn deadline(&self) -> Duration {
        POD_LOGS_JOB_TIMEOUT
    }

    async fn run(&self, ctx: &CollectorContext, signal: DeadlineSignal) -> TaskOutcome {
        let mut outcome = TaskOutcome::new();
        let client = ctx.cluster().client();

        for namespace in ctx.namespaces() {
            let pods = match list_pods(client, namespace, &signal).await {
                Ok(pods) => pods,
                Err(e) => {
                    record(&mut outcome, e);
                    continue;
                }
            };

            let api: Api<Pod> = Api::namespaced(client.clone(), namespace);
            for pod in pods {
                let pod_name = pod.name_any();
                let containers = pod.spec.map(|s| s.containers).unwrap_or_default();

                for container in containers {
                    let params = LogParams {
                        container: Some(container.name.clone()),
                        ..LogParams::default()
                    };
                    match signal.guard("log request", api.logs(&pod_name, &params)).await {
                        Ok(logs) => {
                            let file = format!(
                                "{}__{}.txt",
                                sanitize_filename(&pod_name),
                                sanitize_filename(&container.name)
                            );
                            outcome.insert(rel(&["logs", namespace, &file]), logs);
                        }
                        Err(e) => record(
                            &mut outcome,
                            e.context(format!(
                                "Could not get logs for pod {}/{} container {}",
                                namespace, pod_name, container.name
                            )),
                        ),
                    }
                }
            }
        }
        outcome
    }
}

/// API server build information
#[derive(Debug, Clone, Default)]
pub struct ServerVersionUnit;

#[async_trait]
impl TaskUnit for ServerVersionUnit {
    fn name(&self) -> &str {
        "k8s-version"
    }

    fn deadline(&self) -> Duration {
        DEFAULT_JOB_TIMEOUT
    }

    async fn run(&self, ctx: &CollectorContext, signal: DeadlineSignal) -> TaskOutcome {
        let result = async {
            let info = signal
                .guard("version request", ctx.cluster().client().apiserver_version())
                .await?;
            serde_json::to_vec_pretty(&info).context("Failed to serialize server version")
        }
        .await;

        match result {
            Ok(json) => {
                let mut outcome = TaskOutcome::new();
                outcome.insert(rel(&["k8s", "version.json"]), json);
                outcome
            }
            Err(e) => TaskOutcome::failed(e.context("Could not retrieve server version")),
        }
    }
}

/// What the API discovery unit reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    /// API groups and their versions
    Versions,
    /// Resources served by the core group and each group's preferred version
    Resources,
}

#[derive(Debug, Clone)]
pub struct ApiDiscoveryUnit {
    pub name: &'static str,
    pub discovery: Discovery,
}

impl ApiDiscoveryUnit {
    async fn versions(client: &Client, signal: &DeadlineSignal) -> Result<Vec<u8>> {
        let core = signal
            .guard("core API versions", client.list_core_api_versions())
            .await?;
        let groups = signal.guard("API groups", client.list_api_groups()).await?;
        serde_json::to_vec_pretty(&json!({ "core": core, "groups": groups }))
            .context("Failed to serialize API versions")
    }

    async fn resources(
        client: &Client,
        signal: &DeadlineSignal,
        outcome: &mut TaskOutcome,
    ) -> Result<Vec<u8>> {
        let mut lists = vec![signal
            .guard("core API resources", client.list_core_api_resources("v1"))
            .await?];

        let groups = signal.guard("API groups", client.list_api_groups()).await?;
        for group in groups.groups {
            let Some(preferred) = group.preferred_version.or_else(|| group.versions.first().cloned())
            else {
                continue;
            };
            match signal
                .guard(
                    "API group resources",
                    client.list_api_group_resources(&preferred.group_version),
                )
                .await
            {
                Ok(list) => lists.push(list),
                Err(e) => record(
                    outcome,
                    e.context(format!(
                        "Could not retrieve resources for {}",
                        preferred.group_version
                    )),
                ),
            }
        }

        serde_json::to_vec_pretty(&lists).context("Failed to serialize API resources")
    }
}

#[async_trait]
impl TaskUnit for ApiDiscoveryUnit {
    fn name(&self) -> &str {
        self.name
    }

    fn deadline(&self) -> Duration {
        DEFAULT_JOB_TIMEOUT
    }

    async fn run(&self, ctx: &CollectorContext, signal: DeadlineSignal) -> TaskOutcome {
        let client = ctx.cluster().client();
        let mut outcome = TaskOutcome::new();

        let (file, result) = match self.discovery {
            Discovery::Versions => ("apiversions.json", Self::versions(client, &signal).await),
            Discovery::Resources => (
                "apiresources.json",
                Self::resources(client, &signal, &mut outcome).await,
            ),
        };

        match result {
            Ok(json) => outcome.insert(rel(&["k8s", file]), json),
            Err(e) => record(&mut outcome, e.context("Could not query API discovery")),
        }
        outcome
    }
}

/// Node and pod resource usage
#[derive(Debug, Clone, Default)]
pub struct MetricsUnit;

#[async_trait]
impl TaskUnit for MetricsUnit {
    fn name(&self) -> &str {
        "metrics-info"
    }

    fn deadline(&self) -> Duration {
        DEFAULT_JOB_TIMEOUT
    }

    async fn run(&self, ctx: &CollectorContext, signal: DeadlineSignal) -> TaskOutcome {
        let mut outcome = TaskOutcome::new();
        let client = ctx.cluster().client();

        match metrics::node_metrics_json(client, &signal).await {
            Ok(json) => outcome.insert(rel(&["metrics", "node-resource-list.json"]), json),
            Err(e) => record(&mut outcome, e.context("Could not retrieve nodes metrics")),
        }

        for namespace in ctx.namespaces() {
            match metrics::pod_metrics_json(client, namespace, &signal).await {
                Ok(json) => {
                    outcome.insert(rel(&["metrics", namespace, "pod-resource-list.json"]), json)
                }
                Err(e) => record(
                    &mut outcome,
                    e.context(format!("Could not retrieve pods metrics for namespace {}", namespace)),
                ),
            }
        }
        outcome
    }
}

/// Helm client settings resolved from the environment
#[derive(Debug, Clone, Default)]
pub struct HelmSettingsUnit;

#[async_trait]
impl TaskUnit for HelmSettingsUnit {
    fn name(&self) -> &str {
        "helm-info"
    }

    fn deadline(&self) -> Duration {
        DEFAULT_JOB_TIMEOUT
    }

    async fn run(&self, ctx: &CollectorContext, _signal: DeadlineSignal) -> TaskOutcome {
        let mut settings = HelmSettings::from_env();
        if let Some(first) = ctx.namespaces().first() {
            settings.namespace = first.clone();
        }

        match serde_json::to_vec_pretty(&settings) {
            Ok(json) => {
                let mut outcome = TaskOutcome::new();
                outcome.insert(rel(&["helm", "settings.json"]), json);
                outcome
            }
            Err(e) => TaskOutcome::failed(
                anyhow::Error::new(e).context("Could not serialize helm information"),
            ),
        }
    }
}

/// Deployed Helm releases and their rendered manifests
#[derive(Debug, Clone, Default)]
pub struct HelmReleasesUnit;

#[async_trait]
impl TaskUnit for HelmReleasesUnit {
    fn name(&self) -> &str {
        "helm-deployments"
    }

    fn deadline(&self) -> Duration {
        DEFAULT_JOB_TIMEOUT
    }

    async fn run(&self, ctx: &CollectorContext, signal: DeadlineSignal) -> TaskOutcome {
        let mut outcome = TaskOutcome::new();

        for namespace in ctx.namespaces() {
            let releases = match ctx.cluster().helm(namespace).deployed_releases(&signal).await {
                Ok(releases) => releases,
                Err(e) => {
                    record(&mut outcome, e);
                    continue;
                }
            };

            for release in releases {
                let stem = sanitize_filename(&release.name);
                match serde_json::to_vec_pretty(&release) {
                    Ok(json) => {
                        outcome.insert(rel(&["helm", namespace, &format!("{}_release.json", stem)]), json)
                    }
                    Err(e) => record(
                        &mut outcome,
                        anyhow::Error::new(e)
                            .context(format!("Could not serialize release {}", release.name)),
                    ),
                }
                outcome.insert(
                    rel(&["helm", namespace, &format!("{}_manifest.txt", stem)]),
                    release.manifest.into_bytes(),
                );
            }
        }
        outcome
    }
}

/// Runs a command in every pod whose name contains `pod_match`
#[derive(Debug, Clone)]
pub struct ExecUnit {
    pub name: &'static str,
    pub pod_match: &'static str,
    /// `None` targets the pod's default container
    pub container: Option<&'static str>,
    pub command: &'static [&'static str],
    pub file_suffix: &'static str,
}

#[async_trait]
impl TaskUnit for ExecUnit {
    fn name(&self) -> &str {
        self.name
    }

    fn deadline(&self) -> Duration {
        DEFAULT_JOB_TIMEOUT
    }

    async fn run(&self, ctx: &CollectorContext, signal: DeadlineSignal) -> TaskOutcome {
        let mut outcome = TaskOutcome::new();
        let executor = ctx.cluster().executor();

        for namespace in ctx.namespaces() {
            let pods = match list_pods(ctx.cluster().client(), namespace, &signal).await {
                Ok(pods) => pods,
                Err(e) => {
                    record(&mut outcome, e);
                    continue;
                }
            };

            for pod in pods.iter().map(|p| p.name_any()).filter(|n| n.contains(self.pod_match)) {
                let target = ExecTarget::new(namespace, &pod, self.container, self.command);
                match executor.execute(&target, &signal).await {
                    Ok(output) => {
                        let file = format!("{}__{}.txt", sanitize_filename(&pod), self.file_suffix);
                        outcome.insert(rel(&["exec", namespace, &file]), output);
                    }
                    Err(e) => record(&mut outcome, e),
                }
            }
        }

        debug!("{} produced {} files", self.name, outcome.files.len());
        outcome
    }
}

/// Objects of each listed custom resource type in every namespace
#[derive(Debug, Clone)]
pub struct CustomResourceUnit {
    pub resources: &'static [CustomResource],
}

#[async_trait]
impl TaskUnit for CustomResourceUnit {
    fn name(&self) -> &str {
        "crd-objects"
    }

    fn deadline(&self) -> Duration {
        DEFAULT_JOB_TIMEOUT
    }

    async fn run(&self, ctx: &CollectorContext, signal: DeadlineSignal) -> TaskOutcome {
        let mut outcome = TaskOutcome::new();
        let client = ctx.cluster().client();

        for namespace in ctx.namespaces() {
            for crd in self.resources {
                match crd.list_json(client, namespace, &signal).await {
                    Ok(json) => outcome.insert(
                        rel(&["crds", namespace, &format!("{}.json", crd.plural)]),
                        json,
                    ),
                    Err(e) => record(
                        &mut outcome,
                        e.context(format!(
                            "CRD {} could not be collected in namespace {}",
                            crd, namespace
                        )),
                    ),
                }
            }
        }
        outcome
    }
}
