//! Remote command execution inside running containers.
//!
//! [`PodExecutor`] owns the request/response logic: open one exec session,
//! drain stdout and stderr concurrently while waiting for the session to
//! finish, and hand back the combined bytes. The wire side sits behind
//! [`ExecTransport`]; [`KubeExecTransport`] speaks to the pod `exec`
//! sub-resource over a websocket.

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{Api, AttachParams};
use kube::Client;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::collectors::deadline::DeadlineSignal;

/// The container and command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecTarget {
    pub namespace: String,
    pub pod: String,
    /// `None` lets the API server pick the pod's default container
    pub container: Option<String>,
    pub command: Vec<String>,
}

impl ExecTarget {
    pub fn new(namespace: &str, pod: &str, container: Option<&str>, command: &[&str]) -> Self {
        Self {
            namespace: namespace.to_string(),
            pod: pod.to_string(),
            container: container.map(str::to_string),
            command: command.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl fmt::Display for ExecTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.pod)?;
        if let Some(container) = &self.container {
            write!(f, "[{}]", container)?;
        }
        write!(f, " {:?}", self.command)
    }
}

/// How the remote process ended, as reported by the API server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecStatus {
    pub exit_code: Option<i32>,
    pub message: Option<String>,
}

impl ExecStatus {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            message: None,
        }
    }

    /// Interprets the v1 `Status` sent on the exec error channel.
    ///
    /// Non-zero exits arrive as `Failure` with reason `NonZeroExitCode` and
    /// the code in an `ExitCode` cause.
    pub fn from_status(status: &Status) -> Self {
        if status.status.as_deref() == Some("Success") {
            return Self::success();
        }

        let exit_code = status
            .details
            .as_ref()
            .and_then(|d| d.causes.as_ref())
            .and_then(|causes| {
                causes
                    .iter()
                    .find(|c| c.reason.as_deref() == Some("ExitCode"))
                    .and_then(|c| c.message.as_deref())
                    .and_then(|m| m.parse::<i32>().ok())
            });

        Self {
            exit_code,
            message: status.message.clone(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub type ExecStream = Box<dyn AsyncRead + Send + Unpin>;

/// One open exec session: the two output streams and a future resolving
/// when the remote side has closed the session.
pub struct ExecSession {
    pub stdout: Option<ExecStream>,
    pub stderr: Option<ExecStream>,
    pub completion: BoxFuture<'static, Result<ExecStatus>>,
}

/// Opens exec sessions against a cluster
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecTransport: Send + Sync {
    async fn open(&self, target: &ExecTarget) -> Result<ExecSession>;
}

/// Exec transport backed by the Kubernetes API (websocket upgrade of
/// `pods/exec`)
#[derive(Clone)]
pub struct KubeExecTransport {
    client: Client,
}

impl KubeExecTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExecTransport for KubeExecTransport {
    async fn open(&self, target: &ExecTarget) -> Result<ExecSession> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &target.namespace);

        let mut params = AttachParams::default()
            .stdin(false)
            .stdout(true)
            .stderr(true)
            .tty(false);
        if let Some(container) = &target.container {
            params = params.container(container.clone());
        }

        let mut attached = pods
            .exec(&target.pod, target.command.clone(), &params)
            .await
            .with_context(|| format!("Failed to open exec session for {}", target))?;

        let stdout = attached.stdout().map(|s| Box::new(s) as ExecStream);
        let stderr = attached.stderr().map(|s| Box::new(s) as ExecStream);
        let status = attached.take_status();

        let completion = async move {
            let status = match status {
                Some(status) => status.await,
                None => None,
            };
            attached
                .join()
                .await
                .map_err(|e| anyhow!("Exec stream failed: {}", e))?;
            Ok(status
                .as_ref()
                .map(ExecStatus::from_status)
                .unwrap_or_else(ExecStatus::success))
        }
        .boxed();

        Ok(ExecSession {
            stdout,
            stderr,
            completion,
        })
    }
}

/// Runs commands in containers and returns their combined output
#[derive(Clone)]
pub struct PodExecutor {
    transport: Arc<dyn ExecTransport>,
}

impl PodExecutor {
    pub fn new(transport: Arc<dyn ExecTransport>) -> Self {
        Self { transport }
    }

    /// Executes `target` and returns stdout followed by stderr.
    ///
    /// The whole exchange runs under `signal`; a transport or stream failure
    /// yields an error and no partial output. A non-zero exit is logged and
    /// its output returned.
    pub async fn execute(&self, target: &ExecTarget, signal: &DeadlineSignal) -> Result<Vec<u8>> {
        debug!("Executing {}", target);

        let output = signal
            .guard("command execution", async {
                let session = self.transport.open(target).await?;
                let (mut stdout, stderr, status) = tokio::try_join!(
                    drain(session.stdout),
                    drain(session.stderr),
                    session.completion,
                )?;

                if !status.is_success() {
                    warn!(
                        "Command {} exited with {:?}: {}",
                        target,
                        status.exit_code,
                        status.message.as_deref().unwrap_or("no message")
                    );
                }

                stdout.extend_from_slice(&stderr);
                Ok::<_, anyhow::Error>(stdout)
            })
            .await
            .with_context(|| format!("Command execution failed for {}", target))?;

        debug!("Command {} returned {} bytes", target, output.len());
        Ok(output)
    }
}

async fn drain(stream: Option<ExecStream>) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if let Some(mut stream) = stream {
        stream
            .read_to_end(&mut buffer)
            .await
            .context("Failed to read exec stream")?;
    }
    Ok(buffer)
}
