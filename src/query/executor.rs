//! Isolated query execution.
//!
//! Every submission runs in a fresh worker process with its own database
//! connection. The grader only waits for the process, reads its reply and
//! kills it when the deadline passes, so a runaway or crashing query can
//! never hang or corrupt the grading run.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::worker::{WorkerReply, WORKER_SUBCOMMAND};
use super::QueryOutcome;
use crate::db::DatabaseHandle;
use crate::error::{GraderError, Result};

/// Runs one query under a wall-clock limit.
///
/// Implementations never fail: every problem becomes an outcome.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Executes `sql` against `database`, giving up after `timeout`.
    async fn execute(&self, sql: &str, database: &DatabaseHandle, timeout: Duration)
        -> QueryOutcome;
}

/// How to launch a worker process.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    /// Creates a command running `program` with no extra arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends arguments placed before `--database <PATH>`.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The worker subcommand of the given sqlgrade binary.
    pub fn sqlgrade(binary: impl Into<PathBuf>) -> Self {
        Self::new(binary).with_args([WORKER_SUBCOMMAND])
    }

    /// The worker subcommand of the currently running binary.
    pub fn current_exe() -> Result<Self> {
        let exe = std::env::current_exe()
            .map_err(|e| GraderError::config(format!("Cannot locate own executable: {e}")))?;
        Ok(Self::sqlgrade(exe))
    }

    fn build(&self, database: &DatabaseHandle) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--database")
            .arg(database.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

/// Largest worker reply accepted before the worker is killed.
pub const MAX_REPLY_BYTES: u64 = 64 * 1024 * 1024;

/// Worker stderr kept for error messages; the rest is discarded.
const MAX_STDERR_BYTES: u64 = 64 * 1024;

/// Executes each query in its own worker process.
#[derive(Debug, Clone)]
pub struct IsolatedExecutor {
    worker: WorkerCommand,
    reply_limit: u64,
}

impl IsolatedExecutor {
    /// Creates an executor that launches `worker` for every query.
    pub fn new(worker: WorkerCommand) -> Self {
        Self {
            worker,
            reply_limit: MAX_REPLY_BYTES,
        }
    }

    /// Overrides the reply size limit.
    pub fn with_reply_limit(mut self, bytes: u64) -> Self {
        self.reply_limit = bytes;
        self
    }
}

/// Why the exchange with a worker stopped early.
enum ExchangeError {
    Io(std::io::Error),
    Oversized,
}

impl From<std::io::Error> for ExchangeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Everything the worker produced before exiting.
struct WorkerExit {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

#[async_trait]
impl QueryRunner for IsolatedExecutor {
    async fn execute(
        &self,
        sql: &str,
        database: &DatabaseHandle,
        timeout: Duration,
    ) -> QueryOutcome {
        let deadline = Instant::now() + timeout;

        let mut child = match self.worker.build(database).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn query worker: {e}");
                return QueryOutcome::error(format!("failed to start query worker: {e}"));
            }
        };

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let limit = self.reply_limit;

        let exchange = async {
            let mut out = Vec::new();
            let mut err = Vec::new();

            let write = async move {
                if let Some(mut stdin) = stdin {
                    // A worker that dies early closes the pipe; its exit
                    // status tells the real story.
                    let _ = stdin.write_all(sql.as_bytes()).await;
                    let _ = stdin.shutdown().await;
                }
                Ok::<_, ExchangeError>(())
            };
            let read_out = async {
                if let Some(pipe) = stdout {
                    pipe.take(limit.saturating_add(1)).read_to_end(&mut out).await?;
                    if out.len() as u64 > limit {
                        return Err(ExchangeError::Oversized);
                    }
                }
                Ok::<_, ExchangeError>(())
            };
            let read_err = async {
                if let Some(mut pipe) = stderr {
                    (&mut pipe).take(MAX_STDERR_BYTES).read_to_end(&mut err).await?;
                    tokio::io::copy(&mut pipe, &mut tokio::io::sink()).await?;
                }
                Ok::<_, ExchangeError>(())
            };

            tokio::try_join!(write, read_out, read_err)?;
            let status = child.wait().await?;

            Ok::<_, ExchangeError>(WorkerExit {
                status,
                stdout: out,
                stderr: err,
            })
        };

        let result = tokio::time::timeout_at(deadline, exchange).await;

        match result {
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out worker: {e}");
                }
                warn!("Query exceeded {:?} and was terminated", timeout);
                QueryOutcome::TimedOut
            }
            Ok(Err(ExchangeError::Oversized)) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill oversized worker: {e}");
                }
                warn!("Worker reply exceeded {limit} bytes and was discarded");
                QueryOutcome::error(format!("query result exceeds {limit} bytes"))
            }
            Ok(Err(ExchangeError::Io(e))) => {
                QueryOutcome::error(format!("query worker I/O failed: {e}"))
            }
            Ok(Ok(exit)) => interpret_exit(exit),
        }
    }
}

fn interpret_exit(exit: WorkerExit) -> QueryOutcome {
    match WorkerReply::parse(&exit.stdout) {
        Ok(reply) => {
            let outcome = QueryOutcome::from(reply);
            debug!("Worker finished ({}): {}", exit.status, outcome.summary());
            outcome
        }
        Err(parse_error) if exit.status.success() => {
            warn!("Worker exited cleanly without a usable reply");
            QueryOutcome::error(parse_error.to_string())
        }
        Err(_) => {
            let detail = last_line(&exit.stderr)
                .map(|line| format!(": {line}"))
                .unwrap_or_default();
            warn!("Worker exited abnormally ({})", exit.status);
            QueryOutcome::error(format!(
                "query worker exited abnormally ({}){detail}",
                exit.status
            ))
        }
    }
}

fn last_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(String::from)
}
