use crate::error::{OpsError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Ceiling for compose and docker operations.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Ceiling for capability and liveness probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub const DRY_RUN_MARKER: &str = "[dry-run]";

/// How long to keep reading a pipe once the child has exited or been killed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// One external command, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Added on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
            timeout: COMMAND_TIMEOUT,
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for a in &self.args {
            line.push(' ');
            line.push_str(a);
        }
        line
    }
}

/// Seam between the tools and the machine they act on.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs a side-effecting command and returns its combined output.
    async fn run(&self, cmd: &CommandSpec) -> Result<String>;

    /// Runs a read-only probe for real, regardless of dry-run. True on exit status 0.
    async fn probe(&self, program: &str, args: &[&str]) -> bool;

    fn dry_run(&self) -> bool {
        false
    }
}

/// Spawns real processes, or describes them when dry-run is on.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    dry_run: bool,
}

impl ProcessRunner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

#[async_trait]
impl Executor for ProcessRunner {
    async fn run(&self, cmd: &CommandSpec) -> Result<String> {
        let line = cmd.command_line();
        if self.dry_run {
            info!(command = %line, "dry-run");
            return Ok(format!("{DRY_RUN_MARKER} {line}"));
        }

        info!(command = %line, "running");
        let mut c = Command::new(&cmd.program);
        c.args(&cmd.args)
            .envs(&cmd.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        new_process_group(&mut c);

        let mut child = c.spawn().map_err(|e| OpsError::CommandFailed {
            command: line.clone(),
            reason: e.to_string(),
            output: String::new(),
        })?;
        let pid = child.id();
        let stdout = Capture::start(child.stdout.take());
        let stderr = Capture::start(child.stderr.take());

        let status = match tokio::time::timeout(cmd.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(OpsError::CommandFailed {
                    command: line,
                    reason: e.to_string(),
                    output: combine(stdout, stderr).await,
                })
            }
            Err(_) => {
                warn!(command = %line, timeout = ?cmd.timeout, "command timed out");
                kill_process_group(pid);
                return Err(OpsError::CommandFailed {
                    command: line,
                    reason: format!("timed out after {:?}", cmd.timeout),
                    output: combine(stdout, stderr).await,
                });
            }
        };

        let combined = combine(stdout, stderr).await;
        if status.success() {
            debug!(command = %line, bytes = combined.len(), "command finished");
            Ok(combined)
        } else {
            warn!(command = %line, %status, "command failed");
            Err(OpsError::CommandFailed {
                command: line,
                reason: status.to_string(),
                output: combined,
            })
        }
    }

    async fn probe(&self, program: &str, args: &[&str]) -> bool {
        let mut c = Command::new(program);
        c.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let ok = matches!(
            tokio::time::timeout(PROBE_TIMEOUT, c.status()).await,
            Ok(Ok(s)) if s.success()
        );
        debug!(program, ?args, ok, "probe");
        ok
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Reads one child pipe into a shared buffer while the child runs.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl Capture {
    fn start<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let task = tokio::spawn(async move {
            let Some(mut pipe) = pipe else { return };
            let mut chunk = [0u8; 4096];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink.lock().await.extend_from_slice(&chunk[..n]),
                }
            }
        });
        Self { buf, task }
    }

    /// Whatever was read so far. A grandchild holding the pipe open cannot stall this.
    async fn finish(mut self) -> String {
        if tokio::time::timeout(DRAIN_GRACE, &mut self.task).await.is_err() {
            self.task.abort();
        }
        let bytes = self.buf.lock().await;
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// stdout followed by stderr.
async fn combine(stdout: Capture, stderr: Capture) -> String {
    let mut out = stdout.finish().await;
    out.push_str(&stderr.finish().await);
    out
}

#[cfg(unix)]
fn new_process_group(c: &mut Command) {
    // Own group so a timeout can take down compose and whatever it spawned.
    unsafe {
        c.pre_exec(|| {
            nix::unistd::setpgid(nix::unistd::Pid::from_raw(0), nix::unistd::Pid::from_raw(0))
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn new_process_group(_c: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(-(pid as i32)),
            nix::sys::signal::Signal::SIGTERM,
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
