//! Custom resources owned by the supported products, queried dynamically.

use anyhow::{Context, Result};
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams};
use kube::Client;

use crate::collectors::deadline::DeadlineSignal;

/// A custom resource type addressed by group, version and plural name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomResource {
    pub plural: &'static str,
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
}

impl CustomResource {
    const fn new(
        plural: &'static str,
        group: &'static str,
        version: &'static str,
        kind: &'static str,
    ) -> Self {
        Self {
            plural,
            group,
            version,
            kind,
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(self.group, self.version, self.kind);
        ApiResource::from_gvk_with_plural(&gvk, self.plural)
    }

    /// Lists the objects of this type in `namespace` as indented JSON
    pub async fn list_json(
        &self,
        client: &Client,
        namespace: &str,
        signal: &DeadlineSignal,
    ) -> Result<Vec<u8>> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(client.clone(), namespace, &self.api_resource());
        let list = signal
            .guard("custom resource query", api.list(&ListParams::default()))
            .await?;
        serde_json::to_vec_pretty(&list)
            .with_context(|| format!("Failed to serialize {}", self))
    }
}

impl std::fmt::Display for CustomResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}/{}", self.plural, self.group, self.version)
    }
}

/// NGINX Ingress Controller resources, including App Protect and App Protect DoS
pub const NIC_CUSTOM_RESOURCES: &[CustomResource] = &[
    CustomResource::new("apdoslogconfs", "appprotectdos.f5.com", "v1beta1", "APDosLogConf"),
    CustomResource::new("apdospolicies", "appprotectdos.f5.com", "v1beta1", "APDosPolicy"),
    CustomResource::new(
        "dosprotectedresources",
        "appprotectdos.f5.com",
        "v1beta1",
        "DosProtectedResource",
    ),
    CustomResource::new("aplogconfs", "appprotect.f5.com", "v1beta1", "APLogConf"),
    CustomResource::new("appolicies", "appprotect.f5.com", "v1beta1", "APPolicy"),
    CustomResource::new("apusersigs", "appprotect.f5.com", "v1beta1", "APUserSig"),
    CustomResource::new("globalconfigurations", "k8s.nginx.org", "v1", "GlobalConfiguration"),
    CustomResource::new("policies", "k8s.nginx.org", "v1", "Policy"),
    CustomResource::new("transportservers", "k8s.nginx.org", "v1", "TransportServer"),
    CustomResource::new("virtualserverroutes", "k8s.nginx.org", "v1", "VirtualServerRoute"),
    CustomResource::new("virtualservers", "k8s.nginx.org", "v1", "VirtualServer"),
];

/// NGINX Gateway Fabric resources
pub const NGF_CUSTOM_RESOURCES: &[CustomResource] = &[
    CustomResource::new(
        "clientsettingspolicies",
        "gateway.nginx.org",
        "v1alpha1",
        "ClientSettingsPolicy",
    ),
    CustomResource::new("nginxgateways", "gateway.nginx.org", "v1alpha1", "NginxGateway"),
    CustomResource::new("nginxproxies", "gateway.nginx.org", "v1alpha1", "NginxProxy"),
    CustomResource::new(
        "observabilitypolicies",
        "gateway.nginx.org",
        "v1alpha1",
        "ObservabilityPolicy",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nic_table() {
        assert_eq!(NIC_CUSTOM_RESOURCES.len(), 11);
        for crd in NIC_CUSTOM_RESOURCES {
            assert!(!crd.plural.is_empty());
            assert!(crd.group.ends_with("f5.com") || crd.group == "k8s.nginx.org");
        }
    }

    #[test]
    fn test_ngf_table() {
        assert_eq!(NGF_CUSTOM_RESOURCES.len(), 4);
        assert!(NGF_CUSTOM_RESOURCES
            .iter()
            .all(|c| c.group == "gateway.nginx.org" && c.version == "v1alpha1"));
    }

    #[test]
    fn test_api_resource_uses_plural() {
        let vs = NIC_CUSTOM_RESOURCES
            .iter()
            .find(|c| c.plural == "virtualservers")
            .unwrap();
        let ar = vs.api_resource();
        assert_eq!(ar.plural, "virtualservers");
        assert_eq!(ar.api_version, "k8s.nginx.org/v1");
        assert_eq!(ar.kind, "VirtualServer");
        assert_eq!(vs.to_string(), "virtualservers.k8s.nginx.org/v1");
    }
}
