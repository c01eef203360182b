//! Helm release data read straight from Helm's secret storage driver.
//!
//! Helm 3 keeps each release revision in a Secret labelled `owner=helm`.
//! The `release` data key holds the release JSON, gzip-compressed and then
//! base64 encoded on top of the encoding the API server applies to Secret
//! data.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::GzDecoder;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::collectors::deadline::DeadlineSignal;
use crate::constants::{HELM_DEPLOYED_SELECTOR, HELM_RELEASE_KEY};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A deployed Helm release.
///
/// Only the fields the collector names files after are typed; everything
/// else is carried through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelmRelease {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub manifest: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Decodes the payload Helm stores under the `release` key
pub fn decode_release(payload: &[u8]) -> Result<HelmRelease> {
    let trimmed: Vec<u8> = payload
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let raw = STANDARD
        .decode(&trimmed)
        .context("Release payload is not valid base64")?;

    let json = if raw.starts_with(&GZIP_MAGIC) {
        let mut decoded = Vec::new();
        GzDecoder::new(raw.as_slice())
            .read_to_end(&mut decoded)
            .context("Failed to decompress release payload")?;
        decoded
    } else {
        raw
    };

    serde_json::from_slice(&json).context("Failed to parse release JSON")
}

/// Release access scoped to one namespace
#[derive(Clone)]
pub struct ReleaseManager {
    namespace: String,
    secrets: Api<Secret>,
}

impl ReleaseManager {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            secrets: Api::namespaced(client, namespace),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Releases currently in the `deployed` state.
    ///
    /// Secrets that cannot be decoded are logged and skipped.
    pub async fn deployed_releases(&self, signal: &DeadlineSignal) -> Result<Vec<HelmRelease>> {
        let params = ListParams::default().labels(HELM_DEPLOYED_SELECTOR);
        let secrets = signal
            .guard("helm release query", self.secrets.list(&params))
            .await
            .with_context(|| format!("Failed to list Helm releases in {}", self.namespace))?;

        let mut releases = Vec::new();
        for secret in secrets {
            let name = secret.name_any();
            match release_from_secret(&secret) {
                Ok(release) => {
                    debug!("Found Helm release {} in {}", release.name, self.namespace);
                    releases.push(release);
                }
                Err(e) => warn!("Skipping Helm secret {}/{}: {:#}", self.namespace, name, e),
            }
        }
        Ok(releases)
    }
}

fn release_from_secret(secret: &Secret) -> Result<HelmRelease> {
    let payload = secret
        .data
        .as_ref()
        .and_then(|d| d.get(HELM_RELEASE_KEY))
        .ok_or_else(|| anyhow!("missing '{}' data key", HELM_RELEASE_KEY))?;
    decode_release(&payload.0)
}

/// Client settings as Helm would resolve them from its environment
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HelmSettings {
    pub namespace: String,
    pub kube_config: String,
    pub kube_context: String,
    #[serde(rename = "KubeAPIServer")]
    pub kube_api_server: String,
    pub kube_as_user: String,
    pub kube_as_groups: Vec<String>,
    pub kube_ca_file: String,
    #[serde(rename = "KubeTLSServerName")]
    pub kube_tls_server_name: String,
    pub kube_insecure_skip_tls_verify: bool,
    pub debug: bool,
    pub registry_config: String,
    pub repository_config: String,
    pub repository_cache: String,
    pub plugins_directory: String,
    pub max_history: u32,
    pub burst_limit: u32,
    #[serde(rename = "QPS")]
    pub qps: f32,
}

impl HelmSettings {
    pub fn from_env() -> Self {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        Self::resolve(|key| std::env::var(key).ok(), home)
    }

    /// Resolves settings through `lookup`, falling back to Helm's defaults
    pub fn resolve<F>(lookup: F, home: Option<PathBuf>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let flag = |key: &str| {
            get(key)
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false)
        };
        let number = |key: &str, default: u32| {
            get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
        };

        let home = home.unwrap_or_default();
        let xdg = |key: &str, fallback: &[&str]| -> PathBuf {
            match get(key) {
                Some(dir) => PathBuf::from(dir),
                None => fallback.iter().fold(home.clone(), |p, c| p.join(c)),
            }
        };
        let config_home = xdg("XDG_CONFIG_HOME", &[".config"]).join("helm");
        let cache_home = xdg("XDG_CACHE_HOME", &[".cache"]).join("helm");
        let data_home = xdg("XDG_DATA_HOME", &[".local", "share"]).join("helm");

        let path_or = |key: &str, default: PathBuf| {
            get(key).unwrap_or_else(|| default.to_string_lossy().into_owned())
        };

        Self {
            namespace: get("HELM_NAMESPACE").unwrap_or_else(|| "default".to_string()),
            kube_config: get("KUBECONFIG").unwrap_or_default(),
            kube_context: get("HELM_KUBECONTEXT").unwrap_or_default(),
            kube_api_server: get("HELM_KUBEAPISERVER").unwrap_or_default(),
            kube_as_user: get("HELM_KUBEASUSER").unwrap_or_default(),
            kube_as_groups: get("HELM_KUBEASGROUPS")
                .map(|v| v.split(',').map(|g| g.trim().to_string()).collect())
                .unwrap_or_default(),
            kube_ca_file: get("HELM_KUBECAFILE").unwrap_or_default(),
            kube_tls_server_name: get("HELM_KUBETLS_SERVER_NAME").unwrap_or_default(),
            kube_insecure_skip_tls_verify: flag("HELM_KUBEINSECURE_SKIP_TLS_VERIFY"),
            debug: flag("HELM_DEBUG"),
            registry_config: path_or("HELM_REGISTRY_CONFIG", config_home.join("registry").join("config.json")),
            repository_config: path_or("HELM_REPOSITORY_CONFIG", config_home.join("repositories.yaml")),
            repository_cache: path_or("HELM_REPOSITORY_CACHE", cache_home.join("repository")),
            plugins_directory: path_or("HELM_PLUGINS", data_home.join("plugins")),
            max_history: number("HELM_MAX_HISTORY", 10),
            burst_limit: number("HELM_BURST_LIMIT", 100),
            qps: get("HELM_QPS").and_then(|v| v.parse().ok()).unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::collections::HashMap;
    use std::io::Write;

    fn release_json() -> serde_json::Value {
        serde_json::json!({
            "name": "nginx-ingress",
            "namespace": "nginx-ingress",
            "version": 3,
            "manifest": "---\napiVersion: v1\nkind: Service\n",
            "info": {"status": "deployed"},
            "chart": {"metadata": {"name": "nginx-ingress", "version": "1.1.0"}}
        })
    }

    fn encode(json: &serde_json::Value, gzip: bool) -> Vec<u8> {
        let raw = serde_json::to_vec(json).unwrap();
        let body = if gzip {
            let mut enc = GzEncoder::new(Vec::new(), Compression::default());
            enc.write_all(&raw).unwrap();
            enc.finish().unwrap()
        } else {
            raw
        };
        STANDARD.encode(body).into_bytes()
    }

    #[test]
    fn test_decode_gzipped_release() {
        let release = decode_release(&encode(&release_json(), true)).unwrap();
        assert_eq!(release.name, "nginx-ingress");
        assert_eq!(release.version, 3);
        assert!(release.manifest.contains("kind: Service"));
        assert!(release.extra.contains_key("chart"));

        let round = serde_json::to_value(&release).unwrap();
        assert_eq!(round["info"]["status"], "deployed");
    }

    #[test]
    fn test_decode_plain_release() {
        let release = decode_release(&encode(&release_json(), false)).unwrap();
        assert_eq!(release.namespace, "nginx-ingress");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_release(b"%%% not base64 %%%").is_err());
        assert!(decode_release(STANDARD.encode(b"not json").as_bytes()).is_err());
    }

    #[test]
    fn test_release_from_secret_requires_key() {
        let secret = Secret::default();
        assert!(release_from_secret(&secret).is_err());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = HelmSettings::resolve(|_| None, Some(PathBuf::from("/home/op")));
        assert_eq!(settings.namespace, "default");
        assert_eq!(settings.max_history, 10);
        assert_eq!(settings.burst_limit, 100);
        assert_eq!(settings.repository_config, "/home/op/.config/helm/repositories.yaml");
        assert_eq!(settings.plugins_directory, "/home/op/.local/share/helm/plugins");
        assert!(!settings.debug);
    }

    #[test]
    fn test_settings_from_environment() {
        let env: HashMap<&str, &str> = [
            ("HELM_NAMESPACE", "nginx-ingress"),
            ("HELM_DEBUG", "true"),
            ("HELM_MAX_HISTORY", "25"),
            ("HELM_KUBEASGROUPS", "ops, dev"),
            ("XDG_CACHE_HOME", "/var/cache"),
        ]
        .into_iter()
        .collect();

        let settings = HelmSettings::resolve(
            |k| env.get(k).map(|v| v.to_string()),
            Some(PathBuf::from("/home/op")),
        );
        assert_eq!(settings.namespace, "nginx-ingress");
        assert!(settings.debug);
        assert_eq!(settings.max_history, 25);
        assert_eq!(settings.kube_as_groups, vec!["ops", "dev"]);
        assert_eq!(settings.repository_cache, "/var/cache/helm/repository");

        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["MaxHistory"], 25);
        assert!(json.get("KubeAPIServer").is_some());
    }
}
