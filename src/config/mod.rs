//! Run configuration and cluster credential discovery.

mod kube_source;
mod run_config;

pub use kube_source::{ClusterSettings, KubeconfigSource};
pub use run_config::RunConfig;
