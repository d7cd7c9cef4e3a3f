//! Debug client process supervision
//!
//! Processes are spawned with tokio; their stdout and stderr are pumped into
//! the server's inbound queue and their exit is reported there as well.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use crate::common::{Error, Result};
use crate::events::OutputStream;
use crate::server::Inbound;

use super::launch::{EnvPolicy, LaunchSpec};

static NEXT_PROCESS_ID: AtomicU64 = AtomicU64::new(1);

fn next_process_id() -> u64 {
    NEXT_PROCESS_ID.fetch_add(1, Ordering::Relaxed)
}

/// Starts debug client processes
pub trait Launcher: Send {
    /// Spawn the process; returns once it started or failed to start
    fn launch(&self, spec: &LaunchSpec) -> Result<ClientProcess>;
}

/// Handle to a running debug client
///
/// Dropping the handle kills the process.
#[derive(Debug)]
pub struct ClientProcess {
    id: u64,
    pid: Option<u32>,
    program: String,
    kill: Option<oneshot::Sender<()>>,
}

impl ClientProcess {
    /// Handle with no process behind it
    pub fn detached(program: impl Into<String>) -> Self {
        Self {
            id: next_process_id(),
            pid: None,
            program: program.into(),
            kill: None,
        }
    }

    /// Identifier used in [`Inbound::ProcessExited`]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Ask the process to terminate
    ///
    /// The supervising task waits at most the configured kill timeout for
    /// the process to go away. Returns false if it was already asked.
    pub fn kill(&mut self) -> bool {
        match self.kill.take() {
            Some(tx) => {
                tracing::debug!(id = self.id, pid = ?self.pid, "Killing debug client process");
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }
}

/// Launcher spawning real processes on the tokio runtime
pub struct SystemLauncher {
    inbound: mpsc::UnboundedSender<Inbound>,
    kill_timeout: Duration,
}

impl SystemLauncher {
    pub fn new(inbound: mpsc::UnboundedSender<Inbound>, kill_timeout: Duration) -> Self {
        Self {
            inbound,
            kill_timeout,
        }
    }
}

impl Launcher for SystemLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<ClientProcess> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::spawn_failed(&spec.program, "no async runtime available"));
        }

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        match &spec.env {
            EnvPolicy::Inherit { overrides } => {
                cmd.envs(overrides.iter().map(|(k, v)| (k, v)));
            }
            EnvPolicy::Replace(vars) => {
                cmd.env_clear().envs(vars.iter().map(|(k, v)| (k, v)));
            }
            EnvPolicy::Untouched => {}
        }

        tracing::info!("Starting debug client: {}", spec.command_line());
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::spawn_failed(&spec.program, e.to_string()))?;

        let id = next_process_id();
        let pid = child.id();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, OutputStream::Stdout, self.inbound.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, OutputStream::Stderr, self.inbound.clone()));
        }

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let inbound = self.inbound.clone();
        let kill_timeout = self.kill_timeout;
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status.ok(),
                // A dropped handle counts as a kill request
                _ = kill_rx => {
                    if let Err(e) = child.start_kill() {
                        tracing::debug!(error = %e, "Kill failed, process already gone");
                    }
                    match tokio::time::timeout(kill_timeout, child.wait()).await {
                        Ok(status) => status.ok(),
                        Err(_) => {
                            tracing::warn!(pid = ?pid, "Debug client did not exit within {:?}", kill_timeout);
                            None
                        }
                    }
                }
            };
            tracing::debug!(id, ?status, "Debug client process finished");
            let _ = inbound.send(Inbound::ProcessExited {
                id,
                status: status.and_then(|s| s.code()),
            });
        });

        Ok(ClientProcess {
            id,
            pid,
            program: spec.program.clone(),
            kill: Some(kill_tx),
        })
    }
}

/// Forward everything a process writes on one stream
async fn pump<R>(mut reader: R, stream: OutputStream, inbound: mpsc::UnboundedSender<Inbound>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; 4096];
    let mut carry = Vec::new();
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = decode_output(&mut carry, &buf[..n]);
                if text.is_empty() {
                    continue;
                }
                if inbound.send(Inbound::ProcessOutput { stream, text }).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, ?stream, "Reading client output failed");
                break;
            }
        }
    }
    if !carry.is_empty() {
        let text = String::from_utf8_lossy(&carry).into_owned();
        let _ = inbound.send(Inbound::ProcessOutput { stream, text });
    }
}

/// Decode a read, holding back a UTF-8 sequence cut off at its end
fn decode_output(carry: &mut Vec<u8>, data: &[u8]) -> String {
    carry.extend_from_slice(data);
    let split = carry.len() - incomplete_tail(carry);
    let text = String::from_utf8_lossy(&carry[..split]).into_owned();
    carry.drain(..split);
    text
}

/// Length of a truncated multibyte sequence at the end of `bytes`
fn incomplete_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let b = bytes[bytes.len() - back];
        if b & 0xC0 == 0x80 {
            continue;
        }
        let need = match b {
            0xF0..=0xFF => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        return if need > back { back } else { 0 };
    }
    0
}


#[cfg(test)]
mod tests {
    use super::*;

    fn spec(program: &str, args: &[&str]) -> LaunchSpec {
        LaunchSpec {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            env: EnvPolicy::Inherit { overrides: vec![] },
        }
    }

    #[test]
    fn test_output_keeps_split_characters() {
        let mut carry = Vec::new();
        let bytes = "café ✓".as_bytes();
        let (head, tail) = bytes.split_at(4);
        assert_eq!(decode_output(&mut carry, head), "caf");
        assert_eq!(carry.len(), 1);
        let (mid, rest) = tail.split_at(3);
        assert_eq!(decode_output(&mut carry, mid), "é ");
        assert_eq!(decode_output(&mut carry, rest), "✓");
        assert!(carry.is_empty());
    }

    #[test]
    fn test_output_invalid_bytes_still_lossy() {
        let mut carry = Vec::new();
        assert_eq!(decode_output(&mut carry, b"ok\xff\n"), "ok\u{fffd}\n");
        assert!(carry.is_empty());
    }

    #[test]
    fn test_detached_kill_is_noop() {
        let mut process = ClientProcess::detached("python3");
        assert!(!process.kill());
        assert_eq!(process.program(), "python3");
        assert!(process.pid().is_none());
    }

    #[test]
    fn test_launch_outside_runtime_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let launcher = SystemLauncher::new(tx, Duration::from_millis(100));
        let result = launcher.launch(&spec("true", &[]));
        assert!(matches!(result, Err(Error::SpawnFailed { .. })));
    }

    #[tokio::test]
    async fn test_missing_program_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let launcher = SystemLauncher::new(tx, Duration::from_millis(100));
        let result = launcher.launch(&spec("/nonexistent/interpreter-xyz", &[]));
        assert!(matches!(result, Err(Error::SpawnFailed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_and_exit_are_reported() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let launcher = SystemLauncher::new(tx, Duration::from_millis(500));
        let mut env_spec = spec("sh", &["-c", "printf \"$GREETING\"; exit 3"]);
        env_spec.env = EnvPolicy::Inherit {
            overrides: vec![("GREETING".into(), "hello".into())],
        };
        let process = launcher.launch(&env_spec).unwrap();

        let mut output = String::new();
        let mut exit = None;
        while exit.is_none() {
            match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
                Ok(Some(Inbound::ProcessOutput { text, .. })) => output.push_str(&text),
                Ok(Some(Inbound::ProcessExited { id, status })) => {
                    assert_eq!(id, process.id());
                    exit = Some(status);
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => panic!("process events missing"),
            }
        }
        assert_eq!(exit, Some(Some(3)));

        // Output may arrive after the exit notice
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while output != "hello" {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(Inbound::ProcessOutput { text, .. })) => output.push_str(&text),
                _ => break,
            }
        }
        assert_eq!(output, "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_terminates_process() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let launcher = SystemLauncher::new(tx, Duration::from_millis(500));
        let mut process = launcher.launch(&spec("sleep", &["30"])).unwrap();
        assert!(process.kill());
        assert!(!process.kill());

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(Inbound::ProcessExited { id, .. })) => {
                    assert_eq!(id, process.id());
                    break;
                }
                Ok(Some(_)) => {}
                _ => panic!("process was not killed"),
            }
        }
    }
}
