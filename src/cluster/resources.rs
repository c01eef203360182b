//! Typed resource listings rendered as pretty JSON.

use std::fmt::Debug;

use anyhow::{Context, Result};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::api::core::v1::{
    ConfigMap, Event, Node, PersistentVolume, PersistentVolumeClaim, Pod, Service, ServiceAccount,
};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, ListParams};
use kube::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::collectors::deadline::DeadlineSignal;

/// Namespaced kinds collected once per requested namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespacedKind {
    Pods,
    Events,
    ConfigMaps,
    Services,
    Deployments,
    StatefulSets,
    DaemonSets,
    ReplicaSets,
    Leases,
    PersistentVolumeClaims,
    Roles,
    RoleBindings,
    ServiceAccounts,
}

impl NamespacedKind {
    /// Plural used in log lines and file names
    pub fn plural(&self) -> &'static str {
        match self {
            NamespacedKind::Pods => "pods",
            NamespacedKind::Events => "events",
            NamespacedKind::ConfigMaps => "configmaps",
            NamespacedKind::Services => "services",
            NamespacedKind::Deployments => "deployments",
            NamespacedKind::StatefulSets => "statefulsets",
            NamespacedKind::DaemonSets => "daemonsets",
            NamespacedKind::ReplicaSets => "replicasets",
            NamespacedKind::Leases => "leases",
            NamespacedKind::PersistentVolumeClaims => "persistentvolumeclaims",
            NamespacedKind::Roles => "roles",
            NamespacedKind::RoleBindings => "rolebindings",
            NamespacedKind::ServiceAccounts => "serviceaccounts",
        }
    }

    pub async fn list_json(
        &self,
        client: &Client,
        namespace: &str,
        signal: &DeadlineSignal,
    ) -> Result<Vec<u8>> {
        let c = client.clone();
        match self {
            NamespacedKind::Pods => list_json(Api::<Pod>::namespaced(c, namespace), signal).await,
            NamespacedKind::Events => list_json(Api::<Event>::namespaced(c, namespace), signal).await,
            NamespacedKind::ConfigMaps => {
                list_json(Api::<ConfigMap>::namespaced(c, namespace), signal).await
            }
            NamespacedKind::Services => {
                list_json(Api::<Service>::namespaced(c, namespace), signal).await
            }
            NamespacedKind::Deployments => {
                list_json(Api::<Deployment>::namespaced(c, namespace), signal).await
            }
            NamespacedKind::StatefulSets => {
                list_json(Api::<StatefulSet>::namespaced(c, namespace), signal).await
            }
            NamespacedKind::DaemonSets => {
                list_json(Api::<DaemonSet>::namespaced(c, namespace), signal).await
            }
            NamespacedKind::ReplicaSets => {
                list_json(Api::<ReplicaSet>::namespaced(c, namespace), signal).await
            }
            NamespacedKind::Leases => list_json(Api::<Lease>::namespaced(c, namespace), signal).await,
            NamespacedKind::PersistentVolumeClaims => {
                list_json(Api::<PersistentVolumeClaim>::namespaced(c, namespace), signal).await
            }
            NamespacedKind::Roles => list_json(Api::<Role>::namespaced(c, namespace), signal).await,
            NamespacedKind::RoleBindings => {
                list_json(Api::<RoleBinding>::namespaced(c, namespace), signal).await
            }
            NamespacedKind::ServiceAccounts => {
                list_json(Api::<ServiceAccount>::namespaced(c, namespace), signal).await
            }
        }
    }
}

/// Cluster-scoped kinds collected once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterKind {
    Nodes,
    ClusterRoles,
    ClusterRoleBindings,
    CustomResourceDefinitions,
    PersistentVolumes,
    StorageClasses,
}

impl ClusterKind {
    pub fn plural(&self) -> &'static str {
        match self {
            ClusterKind::Nodes => "nodes",
            ClusterKind::ClusterRoles => "clusterroles",
            ClusterKind::ClusterRoleBindings => "clusterrolebindings",
            ClusterKind::CustomResourceDefinitions => "customresourcedefinitions",
            ClusterKind::PersistentVolumes => "persistentvolumes",
            ClusterKind::StorageClasses => "storageclasses",
        }
    }

    pub async fn list_json(&self, client: &Client, signal: &DeadlineSignal) -> Result<Vec<u8>> {
        let c = client.clone();
        match self {
            ClusterKind::Nodes => list_json(Api::<Node>::all(c), signal).await,
            ClusterKind::ClusterRoles => list_json(Api::<ClusterRole>::all(c), signal).await,
            ClusterKind::ClusterRoleBindings => {
                list_json(Api::<ClusterRoleBinding>::all(c), signal).await
            }
            ClusterKind::CustomResourceDefinitions => {
                list_json(Api::<CustomResourceDefinition>::all(c), signal).await
            }
            ClusterKind::PersistentVolumes => list_json(Api::<PersistentVolume>::all(c), signal).await,
            ClusterKind::StorageClasses => list_json(Api::<StorageClass>::all(c), signal).await,
        }
    }
}

/// Lists every object behind `api` and renders the list as indented JSON
pub async fn list_json<K>(api: Api<K>, signal: &DeadlineSignal) -> Result<Vec<u8>>
where
    K: kube::Resource + Clone + DeserializeOwned + Serialize + Debug,
{
    let list = signal
        .guard("list request", api.list(&ListParams::default()))
        .await?;
    serde_json::to_vec_pretty(&list).context("Failed to serialize resource list")
}
