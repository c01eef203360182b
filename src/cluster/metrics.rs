//! Resource usage from the `metrics.k8s.io` aggregated API.

use anyhow::Result;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;

use crate::cluster::resources::list_json;
use crate::collectors::deadline::DeadlineSignal;

const METRICS_GROUP: &str = "metrics.k8s.io";
const METRICS_VERSION: &str = "v1beta1";

fn node_metrics() -> ApiResource {
    let gvk = GroupVersionKind::gvk(METRICS_GROUP, METRICS_VERSION, "NodeMetrics");
    ApiResource::from_gvk_with_plural(&gvk, "nodes")
}

fn pod_metrics() -> ApiResource {
    let gvk = GroupVersionKind::gvk(METRICS_GROUP, METRICS_VERSION, "PodMetrics");
    ApiResource::from_gvk_with_plural(&gvk, "pods")
}

/// Usage of every node
pub async fn node_metrics_json(client: &Client, signal: &DeadlineSignal) -> Result<Vec<u8>> {
    let api: Api<DynamicObject> = Api::all_with(client.clone(), &node_metrics());
    list_json(api, signal).await
}

/// Usage of every pod in `namespace`
pub async fn pod_metrics_json(
    client: &Client,
    namespace: &str,
    signal: &DeadlineSignal,
) -> Result<Vec<u8>> {
    let api: Api<DynamicObject> = Api::namespaced_with(client.clone(), namespace, &pod_metrics());
    list_json(api, signal).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_resources() {
        assert_eq!(node_metrics().api_version, "metrics.k8s.io/v1beta1");
        assert_eq!(node_metrics().plural, "nodes");
        assert_eq!(pod_metrics().kind, "PodMetrics");
    }
}
