//! The spawned mutation server process.
//!
//! Owns the child and its pipes, pumping stdout (raw chunks, possibly
//! protocol frames) and stderr (line-split, log material) into channels a
//! transport can consume. A freshly spawned server that serves over a
//! socket announces its coordinates as one JSON object on stdout; waiting
//! for that announcement is bounded, never indefinite.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use msp_types::{ServerLocation, ServerSettings};

use crate::error::ClientError;

pub(crate) const SERVER_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

const PIPE_CHANNEL_CAPACITY: usize = 64;
const STDOUT_READ_BUF: usize = 8 * 1024;

fn missing_pipe(name: &str) -> ClientError {
    ClientError::CouldNotSpawnProcess(std::io::Error::other(format!("no {name} pipe from child")))
}

/// A running mutation server child process.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    stdout_rx: Option<mpsc::Receiver<Vec<u8>>>,
    stderr_rx: Option<mpsc::Receiver<String>>,
    stdin_tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ServerProcess {
    /// Spawn the configured server executable with the workspace root as
    /// the default working directory.
    pub fn spawn(settings: &ServerSettings, workspace_root: &Path) -> Result<Self, ClientError> {
        // Prefer PATH resolution; fall back to the literal configured path.
        let program = which::which(settings.server_path())
            .unwrap_or_else(|_| PathBuf::from(settings.server_path()));
        let cwd = settings
            .current_working_directory()
            .map_or_else(|| workspace_root.to_path_buf(), PathBuf::from);

        tracing::info!(
            server = %program.display(),
            args = ?settings.server_args(),
            cwd = %cwd.display(),
            "starting mutation server"
        );

        let mut child = Command::new(&program)
            .args(settings.server_args())
            .current_dir(&cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ClientError::CouldNotSpawnProcess)?;

        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;
        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;

        let (stdout_tx, stdout_rx) = mpsc::channel(PIPE_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut stdout = stdout;
            let mut buf = [0u8; STDOUT_READ_BUF];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if stdout_tx.send(buf[..n].to_vec()).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let (stderr_tx, stderr_rx) = mpsc::channel(PIPE_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if stderr_tx.send(line).await.is_err() {
                    break;
                }
            }
        });

        let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(bytes) = stdin_rx.recv().await {
                if let Err(e) = stdin.write_all(&bytes).await {
                    tracing::warn!("mutation server stdin write error: {e}");
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            child,
            stdout_rx: Some(stdout_rx),
            stderr_rx: Some(stderr_rx),
            stdin_tx,
        })
    }

    /// Write raw bytes to the server's stdin.
    pub fn write(&self, bytes: Vec<u8>) -> Result<(), ClientError> {
        self.stdin_tx
            .send(bytes)
            .map_err(|_| ClientError::NotConnected)
    }

    /// Stdout chunk stream; closes when the process exits. Takeable once.
    pub(crate) fn take_stdout(&mut self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.stdout_rx.take()
    }

    /// Line-split stderr stream. Takeable once.
    pub(crate) fn take_stderr(&mut self) -> Option<mpsc::Receiver<String>> {
        self.stderr_rx.take()
    }

    /// Wait (bounded) for the server to announce its socket coordinates as
    /// a JSON object on the first stdout chunk.
    pub async fn server_location(&mut self) -> Result<ServerLocation, ClientError> {
        let stdout = self.stdout_rx.as_mut().ok_or(ClientError::NotConnected)?;
        match tokio::time::timeout(SERVER_STARTUP_TIMEOUT, stdout.recv()).await {
            Err(_) => Err(ClientError::ServerStartupTimeout),
            Ok(None) => Err(ClientError::Connection(std::io::Error::other(
                "mutation server exited before reporting its location",
            ))),
            Ok(Some(chunk)) => Ok(serde_json::from_slice(&chunk)?),
        }
    }

    /// Wait for the server to exit.
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus, ClientError> {
        self.child.wait().await.map_err(ClientError::Connection)
    }

    /// Kill the server process. Idempotent; also implied by drop.
    pub fn dispose(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!("mutation server already gone on dispose: {e}");
        }
    }
}
