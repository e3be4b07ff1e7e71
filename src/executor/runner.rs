//! Task runner
//!
//! Spawns one worker process per task, hands each its request over stdin,
//! collects the single reply from its stdout and reaps it. Results come back
//! in submission order regardless of completion order.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::RunnerSettings;
use crate::error::{Error, Result};
use crate::protocol::{find_reply, Message, ReplyOutcome, TaskRequest};
use crate::types::{failure_sentinel, Task};

use super::worker::WORKER_ENV;
use super::{RunReport, TaskState, TaskTracker};

// ─────────────────────────────────────────────────────────────────
// Runner Configuration
// ─────────────────────────────────────────────────────────────────

/// The program launched for every task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Re-launch the running executable as the worker
    pub fn current_exe() -> Result<Self> {
        std::env::current_exe()
            .map(Self::new)
            .map_err(|e| Error::Internal(format!("Cannot locate current executable: {}", e)))
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Configuration for the task runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Program started once per task
    pub worker: WorkerCommand,

    /// Kill a worker whose exchange takes longer than this; `None` waits forever
    pub task_timeout: Option<Duration>,

    /// Let workers write to the caller's stderr
    pub inherit_stderr: bool,

    /// Task count above which a warning is logged
    pub concurrency_warning: usize,
}

impl RunnerConfig {
    pub fn new(worker: WorkerCommand) -> Self {
        Self {
            worker,
            task_timeout: None,
            inherit_stderr: true,
            concurrency_warning: num_cpus::get() * 4,
        }
    }

    /// Build from the `[runner]` section of the configuration file
    pub fn from_settings(settings: &RunnerSettings) -> Result<Self> {
        let worker = match &settings.worker_program {
            Some(program) => WorkerCommand::new(program),
            None => WorkerCommand::current_exe()?,
        }
        .with_args(settings.worker_args.iter().cloned());

        Ok(Self {
            worker,
            task_timeout: (settings.task_timeout_ms > 0)
                .then(|| Duration::from_millis(settings.task_timeout_ms)),
            inherit_stderr: settings.inherit_stderr,
            concurrency_warning: settings.effective_concurrency_warning(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    pub fn with_inherit_stderr(mut self, inherit: bool) -> Self {
        self.inherit_stderr = inherit;
        self
    }
}

// ─────────────────────────────────────────────────────────────────
// Task Runner
// ─────────────────────────────────────────────────────────────────

/// Runs every task of a batch in its own process, all at once
pub struct TaskRunner {
    config: RunnerConfig,
}

impl TaskRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Runner that re-launches the current executable as its worker
    pub fn for_current_exe() -> Result<Self> {
        Ok(Self::new(RunnerConfig::new(WorkerCommand::current_exe()?)))
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run all tasks and return their results, index-aligned with `tasks`.
    ///
    /// A failed task leaves the empty-array sentinel in its slot.
    pub async fn run_all(&self, tasks: Vec<Task>) -> Result<Vec<Value>> {
        Ok(self.run_all_with_report(tasks).await?.results)
    }

    /// Run tasks given as parallel name and argument lists
    pub async fn run_pairs<N, A>(&self, names: N, args: A) -> Result<Vec<Value>>
    where
        N: IntoIterator,
        N::Item: Into<String>,
        A: IntoIterator<Item = Value>,
    {
        self.run_all(Task::zip(names, args)?).await
    }

    /// Blocking form of [`run_all`](Self::run_all).
    ///
    /// Builds its own current-thread runtime, so it must not be called from
    /// inside an async context.
    pub fn run_all_blocking(&self, tasks: Vec<Task>) -> Result<Vec<Value>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Runtime(e.to_string()))?;
        runtime.block_on(self.run_all(tasks))
    }

    /// Run all tasks and return results together with per-task bookkeeping
    pub async fn run_all_with_report(&self, tasks: Vec<Task>) -> Result<RunReport> {
        validate(&tasks)?;

        let started = Instant::now();
        let count = tasks.len();
        if count > self.config.concurrency_warning {
            warn!(
                tasks = count,
                threshold = self.config.concurrency_warning,
                "Starting more worker processes than the concurrency warning threshold"
            );
        }

        let tracker = TaskTracker::new(&tasks);

        let mut children = Vec::with_capacity(count);
        for index in 0..count {
            match self.spawn_worker() {
                Ok(child) => {
                    debug!(index, pid = ?child.id(), "Worker spawned");
                    tracker.mark_running(index, child.id());
                    children.push(child);
                }
                Err(source) => {
                    error!(index, error = %source, "Failed to spawn worker, aborting run");
                    abort_all(&mut children, &tracker).await;
                    return Err(Error::SpawnFailed {
                        index,
                        program: self.config.worker.program.clone(),
                        source,
                    });
                }
            }
        }

        let tracker = &tracker;
        let collectors = children
            .into_iter()
            .zip(tasks)
            .enumerate()
            .map(move |(index, (child, task))| self.collect(index, child, task, tracker));
        let outcomes = join_all(collectors).await;

        let mut results = Vec::with_capacity(count);
        for outcome in outcomes {
            match outcome {
                Ok(value) => results.push(value),
                Err(e) => {
                    error!(error = %e, "Run aborted by transport failure");
                    return Err(e);
                }
            }
        }

        let report = RunReport {
            results,
            records: tracker.snapshot(),
            elapsed: started.elapsed(),
        };
        info!(
            tasks = count,
            succeeded = report.succeeded(),
            failed = report.failed(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Run complete"
        );
        Ok(report)
    }

    fn spawn_worker(&self) -> io::Result<Child> {
        let worker = &self.config.worker;
        let stderr = if self.config.inherit_stderr {
            Stdio::inherit()
        } else {
            Stdio::null()
        };

        Command::new(&worker.program)
            .args(&worker.args)
            .env(WORKER_ENV, "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
    }

    /// Drive one worker from request to reap and produce its result slot
    async fn collect(
        &self,
        index: usize,
        mut child: Child,
        task: Task,
        tracker: &TaskTracker,
    ) -> Result<Value> {
        let id = tracker
            .id(index)
            .ok_or_else(|| Error::Internal(format!("No record for task {}", index)))?;

        let exchanged = match self.config.task_timeout {
            Some(limit) => match timeout(limit, exchange(index, id, &mut child, task)).await {
                Ok(exchanged) => exchanged,
                Err(_) => {
                    warn!(
                        index,
                        timeout_ms = limit.as_millis() as u64,
                        "Task timed out, killing worker"
                    );
                    tracker.mark_timed_out(index);
                    if let Err(e) = child.start_kill() {
                        debug!(index, error = %e, "Kill after timeout failed");
                    }
                    Ok(Vec::new())
                }
            },
            None => exchange(index, id, &mut child, task).await,
        };

        let output = match exchanged {
            Ok(output) => output,
            Err(e) => {
                let _ = child.start_kill();
                let status = child.wait().await.ok();
                tracker.advance(index, TaskState::Failed);
                tracker.advance(index, TaskState::ChannelClosed);
                tracker.mark_reaped(index, status.and_then(|s| s.code()));
                return Err(e);
            }
        };

        let reply = find_reply(&output, id);
        let outcome = match &reply {
            Some(reply) if reply.outcome == ReplyOutcome::Succeeded => TaskState::Succeeded,
            _ => TaskState::Failed,
        };
        tracker.advance(index, outcome);
        tracker.advance(index, TaskState::ChannelClosed);

        let status = child
            .wait()
            .await
            .map_err(|source| Error::ReapFailed { index, source })?;
        tracker.mark_reaped(index, status.code());
        debug!(index, exit_code = ?status.code(), replied = reply.is_some(), "Worker reaped");

        Ok(reply.map(|r| r.result).unwrap_or_else(failure_sentinel))
    }
}

// ─────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────

fn validate(tasks: &[Task]) -> Result<()> {
    if let Some(index) = tasks.iter().position(|t| t.name.trim().is_empty()) {
        return Err(Error::MalformedInput(format!("Task {} has an empty name", index)));
    }
    Ok(())
}

/// Send the request and close stdin while reading stdout to EOF.
///
/// Both directions run concurrently: a worker may fill its stdout pipe
/// before it drains stdin.
async fn exchange(index: usize, id: Uuid, child: &mut Child, task: Task) -> Result<Vec<u8>> {
    let request = Message::TaskRequest(TaskRequest {
        id,
        index,
        task: task.name,
        args: task.args,
    });
    let payload = serde_json::to_vec(&request)?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::channel(index, "worker stdin was not captured"))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::channel(index, "worker stdout was not captured"))?;

    // stdin is dropped when `send` finishes, closing the worker's input
    let send = async move {
        match stdin.write_all(&payload).await {
            Ok(()) => Ok(()),
            // Worker exited before reading; it will have no reply
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!(index, "Worker closed stdin before reading its request");
                Ok(())
            }
            Err(e) => Err(Error::channel(index, e.to_string())),
        }
    };
    let receive = async move {
        let mut output = Vec::new();
        stdout
            .read_to_end(&mut output)
            .await
            .map_err(|e| Error::channel(index, e.to_string()))?;
        Ok::<_, Error>(output)
    };

    let ((), output) = tokio::try_join!(send, receive)?;
    Ok(output)
}

/// Kill and reap workers already started when a run cannot proceed
async fn abort_all(children: &mut [Child], tracker: &TaskTracker) {
    for (index, child) in children.iter_mut().enumerate() {
        let _ = child.start_kill();
        let status = child.wait().await.ok();
        tracker.advance(index, TaskState::Failed);
        tracker.advance(index, TaskState::ChannelClosed);
        tracker.mark_reaped(index, status.and_then(|s| s.code()));
        debug!(index, "Worker killed after spawn failure");
    }
}
