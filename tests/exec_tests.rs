//! Integration tests for remote command execution through the cluster
//! handles, with a scripted transport in place of the API server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::FutureExt;

use k8s_supportpkg::cluster::exec::{ExecSession, ExecStatus};
use k8s_supportpkg::cluster::{ClusterHandles, ExecTarget, ExecTransport};
use k8s_supportpkg::collectors::DeadlineSignal;

/// Replies with fixed output and remembers what it was asked to run
struct ScriptedTransport {
    stdout: &'static [u8],
    stderr: &'static [u8],
    fail_stream: bool,
    seen: Mutex<Vec<ExecTarget>>,
}

impl ScriptedTransport {
    fn new(stdout: &'static [u8], stderr: &'static [u8]) -> Self {
        Self {
            stdout,
            stderr,
            fail_stream: false,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ExecTransport for ScriptedTransport {
    async fn open(&self, target: &ExecTarget) -> Result<ExecSession> {
        self.seen.lock().unwrap().push(target.clone());
        let fail = self.fail_stream;
        Ok(ExecSession {
            stdout: Some(Box::new(self.stdout)),
            stderr: Some(Box::new(self.stderr)),
            completion: async move {
                if fail {
                    Err(anyhow!("stream reset by peer"))
                } else {
                    Ok(ExecStatus::success())
                }
            }
            .boxed(),
        })
    }
}

fn handles(transport: Arc<ScriptedTransport>) -> ClusterHandles {
    let client = kube::Client::try_from(kube::Config::new("http://127.0.0.1:9".parse().unwrap()))
        .unwrap();
    ClusterHandles::from_client(client).with_exec_transport(transport)
}

#[tokio::test]
async fn test_executor_uses_substituted_transport() {
    let transport = Arc::new(ScriptedTransport::new(b"nginx version: nginx/1.25.3\n", b""));
    let cluster = handles(Arc::clone(&transport));

    let target = ExecTarget::new(
        "nginx-gateway",
        "ngf-nginx-gateway-5f8c",
        Some("nginx"),
        &["/usr/sbin/nginx", "-v"],
    );
    let signal = DeadlineSignal::new(Duration::from_secs(5));
    let output = cluster.executor().execute(&target, &signal).await.unwrap();

    assert_eq!(output, b"nginx version: nginx/1.25.3\n".to_vec());
    let seen = transport.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], target);
}

#[tokio::test]
async fn test_stderr_follows_stdout() {
    let transport = Arc::new(ScriptedTransport::new(b"# configuration file\n", b"warning\n"));
    let cluster = handles(transport);

    let target = ExecTarget::new("default", "nginx-0", None, &["/usr/sbin/nginx", "-T"]);
    let signal = DeadlineSignal::new(Duration::from_secs(5));
    let output = cluster.executor().execute(&target, &signal).await.unwrap();

    assert_eq!(
        String::from_utf8(output).unwrap(),
        "# configuration file\nwarning\n"
    );
}

#[tokio::test]
async fn test_stream_error_discards_output() {
    let mut scripted = ScriptedTransport::new(b"half of the", b"");
    scripted.fail_stream = true;
    let cluster = handles(Arc::new(scripted));

    let target = ExecTarget::new("default", "nginx-0", None, &["env"]);
    let signal = DeadlineSignal::new(Duration::from_secs(5));
    let err = cluster.executor().execute(&target, &signal).await.unwrap_err();

    assert!(format!("{:#}", err).contains("stream reset by peer"));
}

#[tokio::test]
async fn test_cancelled_signal_stops_execution() {
    let cluster = handles(Arc::new(ScriptedTransport::new(b"ok", b"")));
    let signal = DeadlineSignal::new(Duration::from_secs(5));
    signal.cancel();

    let target = ExecTarget::new("default", "nginx-0", None, &["env"]);
    assert!(cluster.executor().execute(&target, &signal).await.is_err());
}
