//! Host command execution
//!
//! Every external tool the executor touches (flash utilities, mount, cp,
//! the simulator itself) goes through the [`HostShell`] trait:
//! - [`SystemShell`] spawns real processes, or only logs them in dry-run mode
//! - tests substitute a recording implementation
//!
//! Console execution tees the simulator's output into the run transcript
//! and the operator's terminal until the simulator exits.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Errors from spawning or talking to host processes
#[derive(Debug, Error)]
pub enum ShellError {
    /// The process could not be started
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading output or writing the transcript failed
    #[error("I/O error while running '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// A command line to run on the simulation host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Run through `sudo`
    pub privileged: bool,
}

impl HostCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            privileged: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Full argument vector, including `sudo` when privileged
    ///
    /// `sudo` resets the environment, so privileged commands carry their
    /// variables through `env K=V` instead.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + self.env.len() + 3);
        if self.privileged {
            argv.push("sudo".to_string());
            if !self.env.is_empty() {
                argv.push("env".to_string());
                argv.extend(self.env.iter().map(|(k, v)| format!("{}={}", k, v)));
            }
        }
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    fn to_tokio(&self) -> Command {
        let argv = self.argv();
        let mut command = Command::new(&argv[0]);
        command.args(&argv[1..]);
        if !self.privileged {
            command.envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        command
    }
}

impl std::fmt::Display for HostCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.privileged {
            for (k, v) in &self.env {
                write!(f, "{}={} ", k, v)?;
            }
        }
        write!(f, "{}", self.argv().join(" "))
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` if killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// One-line description for error reports
    pub fn describe(&self) -> String {
        let code = self
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        format!(
            "exit_code={}, stdout='{}', stderr='{}'",
            code,
            self.stdout.trim(),
            self.stderr.trim()
        )
    }
}

/// How a console session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// Process exited by itself with this code (-1 when killed by a signal)
    Exited(i32),
    /// Operator interrupted the session
    Interrupted,
}

/// Runs host commands
#[async_trait]
pub trait HostShell: Send + Sync {
    /// Runs a command to completion and captures its output
    async fn run(&self, command: &HostCommand) -> Result<CommandOutput, ShellError>;

    /// Runs a command attached to the operator's terminal
    ///
    /// Output is written both to the terminal and to `transcript`. Returns
    /// once the process exits.
    async fn run_console(
        &self,
        command: &HostCommand,
        transcript: &Path,
    ) -> Result<ConsoleExit, ShellError>;

    /// Whether commands are only logged
    fn dry_run(&self) -> bool {
        false
    }
}

/// Shell that spawns real host processes
#[derive(Debug, Clone, Default)]
pub struct SystemShell {
    dry_run: bool,
}

impl SystemShell {
    /// Creates a new system shell
    ///
    /// # Arguments
    /// * `dry_run` - Log commands instead of running them
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

#[async_trait]
impl HostShell for SystemShell {
    async fn run(&self, command: &HostCommand) -> Result<CommandOutput, ShellError> {
        if self.dry_run {
            info!("[dry-run] {}", command);
            return Ok(CommandOutput {
                code: Some(0),
                ..Default::default()
            });
        }

        debug!("Running: {}", command);
        let output = command
            .to_tokio()
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ShellError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !result.stdout.trim().is_empty() {
            debug!("{} stdout: {}", command.program, result.stdout.trim());
        }
        if !result.stderr.trim().is_empty() {
            debug!("{} stderr: {}", command.program, result.stderr.trim());
        }

        Ok(result)
    }

    async fn run_console(
        &self,
        command: &HostCommand,
        transcript: &Path,
    ) -> Result<ConsoleExit, ShellError> {
        if self.dry_run {
            info!("[dry-run] {}", command);
            return Ok(ConsoleExit::Exited(0));
        }

        let io_err = |source| ShellError::Io {
            command: command.program.clone(),
            source,
        };

        info!("Launching: {}", command);
        let mut child = command
            .to_tokio()
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ShellError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let mut file = tokio::fs::File::create(transcript).await.map_err(io_err)?;
        let mut terminal = tokio::io::stdout();

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let pid = child.id();
        let terminate = || {
            if let Some(pid) = pid {
                // SAFETY: signalling a child we spawned and have not reaped
                unsafe {
                    libc::kill(pid as libc::pid_t, libc::SIGTERM);
                }
            }
        };
        let interrupted = tee_console(
            stdout,
            stderr,
            &mut file,
            &mut terminal,
            tokio::signal::ctrl_c(),
            terminate,
        )
        .await
        .map_err(io_err)?;

        let status = child.wait().await.map_err(io_err)?;
        if interrupted {
            warn!("{} interrupted by operator ({})", command.program, status);
            return Ok(ConsoleExit::Interrupted);
        }

        Ok(ConsoleExit::Exited(status.code().unwrap_or(-1)))
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Copies both output streams to the transcript and the terminal until
/// both close
///
/// When `interrupt` resolves `terminate` is called once and the streams
/// keep draining until the child closes them. Returns whether an interrupt
/// arrived.
async fn tee_console<O, E, W, T, I, F>(
    stdout: Option<O>,
    stderr: Option<E>,
    transcript: &mut W,
    terminal: &mut T,
    interrupt: I,
    mut terminate: F,
) -> std::io::Result<bool>
where
    I: std::future::Future,
    F: FnMut(),
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    T: AsyncWrite + Unpin,
{
    let mut out_open = stdout.is_some();
    let mut err_open = stderr.is_some();
    let mut stdout = stdout;
    let mut stderr = stderr;
    let mut out_buf = [0u8; 1024];
    let mut err_buf = [0u8; 1024];
    let mut out_norm = CrlfNormalizer::default();
    let mut err_norm = CrlfNormalizer::default();
    let mut interrupted = false;

    tokio::pin!(interrupt);

    while out_open || err_open {
        tokio::select! {
            read = read_some(&mut stdout, &mut out_buf), if out_open => match read {
                Ok(0) | Err(_) => out_open = false,
                Ok(n) => {
                    let chunk = out_norm.push(&out_buf[..n]);
                    write_both(&chunk, transcript, terminal).await?;
                }
            },
            read = read_some(&mut stderr, &mut err_buf), if err_open => match read {
                Ok(0) | Err(_) => err_open = false,
                Ok(n) => {
                    let chunk = err_norm.push(&err_buf[..n]);
                    write_both(&chunk, transcript, terminal).await?;
                }
            },
            _ = &mut interrupt, if !interrupted => {
                warn!("Interrupt received, stopping the simulator");
                interrupted = true;
                terminate();
            }
        }
    }

    let tail = [out_norm.finish(), err_norm.finish()].concat();
    write_both(&tail, transcript, terminal).await?;
    transcript.flush().await?;
    terminal.flush().await?;

    Ok(interrupted)
}

async fn read_some<R: AsyncRead + Unpin>(
    reader: &mut Option<R>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match reader {
        Some(reader) => reader.read(buf).await,
        None => Ok(0),
    }
}

async fn write_both<W, T>(chunk: &[u8], transcript: &mut W, terminal: &mut T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: AsyncWrite + Unpin,
{
    if chunk.is_empty() {
        return Ok(());
    }
    transcript.write_all(chunk).await?;
    terminal.write_all(chunk).await?;
    terminal.flush().await
}

/// Rewrites `\r\n` to `\n` across chunk boundaries
#[derive(Debug, Default)]
pub struct CrlfNormalizer {
    pending_cr: bool,
}

impl CrlfNormalizer {
    /// Normalises the next chunk; a trailing `\r` is held back until the
    /// following byte is known
    pub fn push(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len() + 1);
        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if byte != b'\n' {
                    out.push(b'\r');
                }
            }
            if byte == b'\r' {
                self.pending_cr = true;
            } else {
                out.push(byte);
            }
        }
        out
    }

    /// Flushes a held-back `\r`
    pub fn finish(&mut self) -> Vec<u8> {
        if std::mem::take(&mut self.pending_cr) {
            vec![b'\r']
        } else {
            Vec::new()
        }
    }
}
