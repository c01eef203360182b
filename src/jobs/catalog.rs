use std::sync::Arc;

use crate::cli::Product;
use crate::cluster::crds::{NGF_CUSTOM_RESOURCES, NIC_CUSTOM_RESOURCES};
use crate::cluster::resources::{ClusterKind, NamespacedKind};
use crate::jobs::units::{
    ApiDiscoveryUnit, ClusterListUnit, CustomResourceUnit, Discovery, ExecUnit, HelmReleasesUnit,
    HelmSettingsUnit, MetricsUnit, NamespacedListUnit, PodLogsUnit, ServerVersionUnit,
};
use crate::jobs::TaskUnit;

const NGINX_T: &[&str] = &["/usr/sbin/nginx", "-T"];
const GATEWAY_HELP: &[&str] = &["/usr/bin/gateway", "--help"];

const NAMESPACED_LISTS: &[(&str, NamespacedKind, &str)] = &[
    ("pod-list", NamespacedKind::Pods, "resources"),
    ("events-list", NamespacedKind::Events, "resources"),
    ("configmap-list", NamespacedKind::ConfigMaps, "resources"),
    ("service-list", NamespacedKind::Services, "resources"),
    ("deployment-list", NamespacedKind::Deployments, "resources"),
    ("statefulset-list", NamespacedKind::StatefulSets, "resources"),
    ("daemonsets-list", NamespacedKind::DaemonSets, "resources"),
    ("replicaset-list", NamespacedKind::ReplicaSets, "resources"),
    ("lease-list", NamespacedKind::Leases, "resources"),
    ("pvc-list", NamespacedKind::PersistentVolumeClaims, "resources"),
    ("roles-list", NamespacedKind::Roles, "k8s/rbac"),
    ("serviceaccounts-list", NamespacedKind::ServiceAccounts, "k8s/rbac"),
    ("rolebindings-list", NamespacedKind::RoleBindings, "k8s/rbac"),
];

const CLUSTER_LISTS: &[(&str, ClusterKind, &str)] = &[
    ("pv-list", ClusterKind::PersistentVolumes, "k8s/persistentvolumes.json"),
    ("sc-list", ClusterKind::StorageClasses, "k8s/storageclasses.json"),
    ("crd-info", ClusterKind::CustomResourceDefinitions, "k8s/crd.json"),
    ("clusterroles-info", ClusterKind::ClusterRoles, "k8s/rbac/clusterroles.json"),
    (
        "clusterroles-bindings-info",
        ClusterKind::ClusterRoleBindings,
        "k8s/rbac/clusterrolesbindings.json",
    ),
    ("nodes-info", ClusterKind::Nodes, "k8s/nodes.json"),
];

/// Units every product collects
fn common_units() -> Vec<Arc<dyn TaskUnit>> {
    let mut units: Vec<Arc<dyn TaskUnit>> = Vec::new();

    for &(name, kind, base) in NAMESPACED_LISTS {
        units.push(Arc::new(NamespacedListUnit {
            name,
            kind,
            base,
        }));
    }
    units.push(Arc::new(PodLogsUnit));

    units.push(Arc::new(ApiDiscoveryUnit {
        name: "apiresources-list",
        discovery: Discovery::Resources,
    }));
    units.push(Arc::new(ApiDiscoveryUnit {
        name: "apiversions-list",
        discovery: Discovery::Versions,
    }));
    units.push(Arc::new(ServerVersionUnit));

    for &(name, kind, file) in CLUSTER_LISTS {
        units.push(Arc::new(ClusterListUnit {
            name,
            kind,
            file,
        }));
    }

    units.push(Arc::new(MetricsUnit));
    units.push(Arc::new(HelmSettingsUnit));
    units.push(Arc::new(HelmReleasesUnit));
    units
}

/// The ordered catalog for `product`
pub fn build_catalog(product: Product) -> Vec<Arc<dyn TaskUnit>> {
    let mut units = common_units();

    match product {
        Product::Nic => {
            units.push(Arc::new(ExecUnit {
                name: "exec-nginx-t",
                pod_match: "ingress",
                container: None,
                command: NGINX_T,
                file_suffix: "nginx-t",
            }));
            units.push(Arc::new(CustomResourceUnit {
                resources: NIC_CUSTOM_RESOURCES,
            }));
        }
        Product::Ngf => {
            units.push(Arc::new(ExecUnit {
                name: "exec-nginx-gateway-version",
                pod_match: "nginx-gateway",
                container: Some("nginx-gateway"),
                command: GATEWAY_HELP,
                file_suffix: "nginx-gateway-version",
            }));
            units.push(Arc::new(ExecUnit {
                name: "exec-nginx-t",
                pod_match: "nginx-gateway",
                container: Some("nginx"),
                command: NGINX_T,
                file_suffix: "nginx-t",
            }));
            units.push(Arc::new(CustomResourceUnit {
                resources: NGF_CUSTOM_RESOURCES,
            }));
        }
        Product::Ngx => {
            units.push(Arc::new(ExecUnit {
                name: "exec-nginx-t",
                pod_match: "nginx",
                container: Some("nginx"),
                command: NGINX_T,
                file_suffix: "nginx-t",
            }));
        }
    }

    units
}
