//! Remote session layer (spec §4.5): a pool of interactive shell
//! sessions keyed by hostname, with a mock backend for offline
//! operation.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use crate::error::{FireletError, Result};

/// The capability set a remote session backend must provide (spec
/// §4.5). Both the live and mock variants implement this so the
/// orchestrator is generic over the transport.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Opens a session to `hostname` at `address` as `user`, or a
    /// no-op if already open. Fails with `Unreachable` on timeout.
    async fn open(&self, hostname: &str, address: Ipv4Addr, user: &str) -> Result<()>;

    /// Runs `command` on an already-open session, returning its
    /// output lines.
    async fn run(&self, hostname: &str, command: &str) -> Result<Vec<String>>;

    /// Writes `lines` to the session (used to deliver a ruleset file).
    async fn send_lines(&self, hostname: &str, lines: &[String]) -> Result<()>;

    /// Closes the session. Tolerates an already-closed session.
    async fn close(&self, hostname: &str);
}

/// An interactive live remote shell session, built over a spawned
/// `ssh` child process with piped stdio.
struct LiveSession {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<tokio::process::ChildStdout>,
}

const PROMPT_SENTINEL: &str = "__firelet_prompt_c3f1__";

/// Live backend: one `ssh` child process per hostname.
pub struct LiveBackend {
    op_timeout: Duration,
    sessions: Mutex<HashMap<String, LiveSession>>,
}

impl LiveBackend {
    pub fn new(op_timeout: Duration) -> LiveBackend {
        LiveBackend {
            op_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    async fn read_until_sentinel(stdout: &mut BufReader<tokio::process::ChildStdout>) -> std::io::Result<Vec<String>> {
        let mut out = Vec::new();
        loop {
            let mut line = String::new();
            let n = stdout.read_line(&mut line).await?;
            if n == 0 {
                break;
            }
            let trimmed = line.trim_end_matches(['\n', '\r']).to_string();
            if trimmed == PROMPT_SENTINEL {
                break;
            }
            out.push(trimmed);
        }
        Ok(out)
    }
}

#[async_trait]
impl SessionBackend for LiveBackend {
    async fn open(&self, hostname: &str, address: Ipv4Addr, user: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(hostname) {
            return Ok(());
        }

        let spawn = tokio::process::Command::new("ssh")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg(format!("{user}@{address}"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn();

        let mut child = match spawn {
            Ok(c) => c,
            Err(_) => return Err(FireletError::Unreachable(hostname.to_string())),
        };

        let stdin = child.stdin.take().ok_or_else(|| FireletError::Unreachable(hostname.to_string()))?;
        let stdout = child.stdout.take().ok_or_else(|| FireletError::Unreachable(hostname.to_string()))?;
        let stdout = BufReader::new(stdout);

        sessions.insert(
            hostname.to_string(),
            LiveSession {
                child,
                stdin,
                stdout,
            },
        );
        debug!(host = hostname, "opened live session");
        Ok(())
    }

    async fn run(&self, hostname: &str, command: &str) -> Result<Vec<String>> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(hostname)
            .ok_or_else(|| FireletError::Unreachable(hostname.to_string()))?;

        let op = async {
            session
                .stdin
                .write_all(format!("{command}\n").as_bytes())
                .await?;
            session
                .stdin
                .write_all(format!("echo {PROMPT_SENTINEL}\n").as_bytes())
                .await?;
            session.stdin.flush().await?;
            LiveBackend::read_until_sentinel(&mut session.stdout).await
        };

        match timeout(self.op_timeout, op).await {
            Ok(Ok(lines)) => Ok(lines),
            Ok(Err(_)) | Err(_) => Err(FireletError::RemoteCommandFailed {
                host: hostname.to_string(),
                command: command.to_string(),
            }),
        }
    }

    async fn send_lines(&self, hostname: &str, lines: &[String]) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(hostname)
            .ok_or_else(|| FireletError::Unreachable(hostname.to_string()))?;

        let op = async {
            for line in lines {
                session.stdin.write_all(line.as_bytes()).await?;
                session.stdin.write_all(b"\n").await?;
            }
            session
                .stdin
                .write_all(format!("echo {PROMPT_SENTINEL}\n").as_bytes())
                .await?;
            session.stdin.flush().await?;
            LiveBackend::read_until_sentinel(&mut session.stdout).await
        };

        match timeout(self.op_timeout, op).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) | Err(_) => Err(FireletError::RemoteCommandFailed {
                host: hostname.to_string(),
                command: "send_lines".to_string(),
            }),
        }
    }

    async fn close(&self, hostname: &str) {
        let mut sessions = self.sessions.lock().await;
        if let Some(mut session) = sessions.remove(hostname) {
            let _ = session.child.start_kill();
            let _ = session.child.wait().await;
        }
    }
}

/// Mock backend: serves fixed fixtures from a filesystem directory
/// instead of talking to the network (spec §4.5, §6.4).
pub struct MockBackend {
    fixtures_dir: PathBuf,
    open_hosts: Mutex<HashMap<String, ()>>,
}

impl MockBackend {
    pub fn new(fixtures_dir: PathBuf) -> MockBackend {
        MockBackend {
            fixtures_dir,
            open_hosts: Mutex::new(HashMap::new()),
        }
    }

    fn fixture_path(&self, file: &str) -> PathBuf {
        self.fixtures_dir.join(file)
    }
}

#[async_trait]
impl SessionBackend for MockBackend {
    async fn open(&self, hostname: &str, _address: Ipv4Addr, _user: &str) -> Result<()> {
        let mut open_hosts = self.open_hosts.lock().await;
        open_hosts.entry(hostname.to_string()).or_insert(());
        Ok(())
    }

    async fn run(&self, hostname: &str, command: &str) -> Result<Vec<String>> {
        let file = match command {
            "sudo /sbin/iptables-save" => format!("iptables-save-{hostname}"),
            "/bin/ip addr show" => format!("ip-addr-show-{hostname}"),
            other => {
                return Err(FireletError::RemoteCommandFailed {
                    host: hostname.to_string(),
                    command: other.to_string(),
                })
            }
        };
        let path = self.fixture_path(&file);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content.lines().map(|l| l.trim_end().to_string()).collect()),
            Err(_) => {
                warn!(host = hostname, fixture = %path.display(), "fixture missing");
                Err(FireletError::Unreachable(hostname.to_string()))
            }
        }
    }

    async fn send_lines(&self, hostname: &str, lines: &[String]) -> Result<()> {
        let main_path = self.fixture_path(&format!("iptables-save-{hostname}"));
        let shadow_path = self.fixture_path(&format!("iptables-save-{hostname}-x"));
        let body = format!("{}\n", lines.join("\n"));
        tokio::fs::write(&main_path, &body)
            .await
            .map_err(|_| FireletError::RemoteCommandFailed {
                host: hostname.to_string(),
                command: "deliver".to_string(),
            })?;
        tokio::fs::write(&shadow_path, &body)
            .await
            .map_err(|_| FireletError::RemoteCommandFailed {
                host: hostname.to_string(),
                command: "deliver".to_string(),
            })?;
        Ok(())
    }

    async fn close(&self, hostname: &str) {
        let mut open_hosts = self.open_hosts.lock().await;
        open_hosts.remove(hostname);
    }
}

/// Owns a backend and the pool of open sessions keyed by hostname.
pub struct SessionPool {
    backend: Arc<dyn SessionBackend>,
}

impl SessionPool {
    pub fn new(backend: Arc<dyn SessionBackend>) -> SessionPool {
        SessionPool { backend }
    }

    pub fn backend(&self) -> Arc<dyn SessionBackend> {
        Arc::clone(&self.backend)
    }
}
