use crate::{
    metrics::Metrics,
    state::{RunPermit, RunState, RunStatus},
};
use std::{fmt, sync::Arc, time::Instant};
use stratus_core::{
    command::{self, ExecutionError},
    job::BackupJob,
    output::{OutputParser, Stats},
    restic::{self, Restic},
};

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum Hook {
    Pre,
    Post,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Pre => f.write_str("pre-command"),
            Hook::Post => f.write_str("post-command"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("{0} failed: {1}")]
    Hook(Hook, ExecutionError),
    #[error("restic backup failed: {error}")]
    Engine {
        #[source]
        error: restic::Error,
        output: String,
    },
}

#[derive(Debug)]
pub enum Outcome {
    /// Another run held the guard; nothing was executed or recorded.
    Skipped,
    Succeeded(Stats),
    Failed(RunError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }
}

/// Records the result of a run when it goes out of scope, on every exit path.
///
/// The permit is a field so the guard is released only after the result is recorded.
struct RunCompletion<'a> {
    runner: &'a Runner,
    succeeded: bool,
    _permit: RunPermit<'a>,
}

impl Drop for RunCompletion<'_> {
    fn drop(&mut self) {
        let runner = self.runner;
        if self.succeeded {
            runner
                .metrics
                .record_success(time::OffsetDateTime::now_utc());
            runner.set_status(RunStatus::Idle);
        } else {
            runner.metrics.record_failure();
            runner.set_status(RunStatus::Failed);
        }
    }
}

/// Runs the configured backup job, one run at a time.
#[derive(Debug)]
pub struct Runner {
    job: BackupJob,
    restic: Arc<Restic>,
    parser: Box<dyn OutputParser>,
    state: RunState,
    metrics: Arc<Metrics>,
}

impl Runner {
    pub fn new(job: BackupJob, restic: Arc<Restic>, metrics: Arc<Metrics>) -> Self {
        let parser = job.output_format.parser();
        Runner {
            job,
            restic,
            parser,
            state: RunState::default(),
            metrics,
        }
    }

    pub fn job(&self) -> &BackupJob {
        &self.job
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn set_status(&self, status: RunStatus) {
        self.state.set_status(status);
        self.metrics.set_status(status);
    }

    /// Runs the pre-command, the backup and the post-command, then records the backup's
    /// statistics.
    ///
    /// Returns [`Outcome::Skipped`] right away if a run is already in progress. A failure of any
    /// step aborts the run, fires the error command and leaves the status at
    /// [`RunStatus::Failed`]; unparseable backup output only degrades the recorded statistics.
    #[tracing::instrument(name = "run", skip_all)]
    pub async fn run(&self) -> Outcome {
        let Some(permit) = self.state.try_acquire() else {
            tracing::info!("backup already running, skipping");
            return Outcome::Skipped;
        };
        self.set_status(RunStatus::Running);
        let mut completion = RunCompletion {
            runner: self,
            succeeded: false,
            _permit: permit,
        };

        match self.execute().await {
            Ok(stats) => {
                completion.succeeded = true;
                tracing::info!("backup finished successfully");
                Outcome::Succeeded(stats)
            }
            Err(error) => {
                tracing::error!(%error, "backup run failed");
                self.run_error_command().await;
                Outcome::Failed(error)
            }
        }
    }

    async fn execute(&self) -> Result<Stats, RunError> {
        let start = Instant::now();

        if let Some(pre_command) = &self.job.pre_command {
            let output = command::run(pre_command)
                .await
                .map_err(|e| RunError::Hook(Hook::Pre, e))?;
            tracing::debug!(%output, "pre-command finished");
        }

        let captured = self
            .restic
            .backup(&self.job)
            .await
            .map_err(|error| RunError::Engine {
                error,
                output: String::new(),
            })?;
        if !captured.status.success() {
            let output = captured.stderr_lossy();
            tracing::error!(%output, "restic backup {}", captured.status.message());
            self.set_status(RunStatus::Failed);
            return Err(RunError::Engine {
                error: restic::Error::ResticError(captured.status),
                output,
            });
        }

        if let Some(post_command) = &self.job.post_command {
            let output = command::run(post_command)
                .await
                .map_err(|e| RunError::Hook(Hook::Post, e))?;
            tracing::debug!(%output, "post-command finished");
        }

        let duration = start.elapsed();
        let stats = match self.parser.parse(&captured.stdout) {
            Ok(stats) => stats,
            Err(failure) => {
                tracing::warn!(error = %failure, "failed to parse backup output");
                failure.stats
            }
        };
        tracing::info!(
            duration_ms = duration.as_millis() as u64,
            files_new = stats.files_new,
            files_changed = stats.files_changed,
            files_unmodified = stats.files_unmodified,
            files_processed = stats.files_processed,
            bytes_added = stats.bytes_added,
            bytes_processed = stats.bytes_processed,
            "backup statistics"
        );
        self.metrics.record_stats(duration, &stats);
        Ok(stats)
    }

    async fn run_error_command(&self) {
        let Some(error_command) = &self.job.error_command else {
            return;
        };
        match command::run(error_command).await {
            Ok(output) => tracing::info!(%output, "error command finished"),
            Err(error) => tracing::error!(%error, "error command failed"),
        }
    }
}
