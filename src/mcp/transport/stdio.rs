//! Line-delimited JSON-RPC over a child process's stdin/stdout

use super::Transport;
use crate::mcp::error::{McpError, McpResult};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct Pipes {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// MCP server running as a subprocess.
///
/// The child is killed when the transport is closed or dropped. Requests
/// are serialized: one exchange at a time per process.
pub struct StdioTransport {
    label: String,
    child: Mutex<Child>,
    pipes: Mutex<Pipes>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl StdioTransport {
    /// Spawn `command args...` and wire up its pipes
    pub fn spawn(command: &str, args: &[String], timeout: Duration) -> McpResult<Self> {
        debug!("Spawning MCP server: {} {}", command, redact_args(args).join(" "));

        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| McpError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Protocol("child stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Protocol("child stdout not captured".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "mcp_server", "{}", line);
                }
            });
        }

        Ok(Self {
            label: format!("stdio:{}", command),
            child: Mutex::new(child),
            pipes: Mutex::new(Pipes {
                stdin,
                stdout: BufReader::new(stdout).lines(),
            }),
            next_id: AtomicU64::new(1),
            timeout,
        })
    }

    async fn write_message(pipes: &mut Pipes, message: &JsonRpcRequest) -> McpResult<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        pipes.stdin.write_all(line.as_bytes()).await?;
        pipes.stdin.flush().await?;
        Ok(())
    }

    async fn read_reply(pipes: &mut Pipes, id: &Value) -> McpResult<Value> {
        loop {
            let line = match pipes.stdout.next_line().await? {
                Some(line) => line,
                None => return Err(McpError::Closed),
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let message: JsonRpcResponse = match serde_json::from_str(trimmed) {
                Ok(message) => message,
                Err(_) => {
                    debug!("Ignoring non-JSON output from MCP server: {}", trimmed);
                    continue;
                }
            };

            if message.answers(id) {
                return message.into_result();
            }
            if let Some(method) = &message.method {
                debug!("Ignoring server message: {}", method);
            }
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let id = Value::from(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = JsonRpcRequest::new(id.clone(), method, params);

        let mut pipes = self.pipes.lock().await;
        Self::write_message(&mut pipes, &request).await?;

        match tokio::time::timeout(self.timeout, Self::read_reply(&mut pipes, &id)).await {
            Ok(result) => result,
            Err(_) => Err(McpError::Timeout(method.to_string())),
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        let message = JsonRpcRequest::notification(method, params);
        let mut pipes = self.pipes.lock().await;
        Self::write_message(&mut pipes, &message).await
    }

    async fn close(&self) -> McpResult<()> {
        let mut child = self.child.lock().await;
        if let Some(status) = child.try_wait()? {
            info!("MCP server already exited with {}", status);
            return Ok(());
        }
        if let Err(e) = child.kill().await {
            warn!("Failed to stop MCP server: {}", e);
            return Err(e.into());
        }
        info!("MCP server stopped");
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Hide the value following `--password` in logged command lines
fn redact_args(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            out.push("****".to_string());
            hide_next = false;
        } else {
            hide_next = arg == "--password";
            out.push(arg.clone());
        }
    }
    out
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    /// A shell stand-in for an MCP server: it prints a log line and a
    /// notification before each reply, and echoes the request id back.
    const FAKE_SERVER: &str = r#"
echo "starting fake server" >&2
while IFS= read -r line; do
  case "$line" in
    *'"method":"notifications/'*) continue ;;
  esac
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  echo "not json at all"
  echo '{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info"}}'
  case "$line" in
    *'"method":"initialize"'*)
      echo '{"jsonrpc":"2.0","id":'"$id"',"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"fake","version":"0.0.1"}}}' ;;
    *'"method":"boom"'*)
      echo '{"jsonrpc":"2.0","id":'"$id"',"error":{"code":-32601,"message":"method not found: boom"}}' ;;
    *)
      echo '{"jsonrpc":"2.0","id":'"$id"',"result":{"echo":true}}' ;;
  esac
done
"#;

    fn fake_server() -> StdioTransport {
        StdioTransport::spawn(
            "sh",
            &["-c".to_string(), FAKE_SERVER.to_string()],
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_request_skips_noise_and_matches_id() {
        let transport = fake_server();

        let init = transport
            .request("initialize", Some(json!({"protocolVersion": "2024-11-05"})))
            .await
            .unwrap();
        assert_eq!(init["serverInfo"]["name"], "fake");

        transport.notify("notifications/initialized", None).await.unwrap();

        let second = transport.request("tools/list", None).await.unwrap();
        assert_eq!(second["echo"], true);

        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_rpc_error_is_surfaced() {
        let transport = fake_server();
        match transport.request("boom", None).await {
            Err(McpError::Rpc { code, .. }) => assert_eq!(code, -32601),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_exit_reports_closed() {
        let transport = StdioTransport::spawn(
            "sh",
            &["-c".to_string(), "exit 0".to_string()],
            Duration::from_secs(5),
        )
        .unwrap();
        let err = transport.request("initialize", None).await.unwrap_err();
        assert!(matches!(err, McpError::Closed | McpError::Io(_)));
    }

    #[tokio::test]
    async fn test_missing_command_fails_to_spawn() {
        let err = StdioTransport::spawn("definitely-not-a-real-binary-xyz", &[], Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, McpError::Spawn { .. }));
    }

    #[test]
    fn test_password_is_redacted() {
        let args: Vec<String> = ["--username", "elastic", "--password", "hunter2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(redact_args(&args), vec!["--username", "elastic", "--password", "****"]);
    }
}
