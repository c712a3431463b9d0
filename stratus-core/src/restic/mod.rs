use crate::{args::tokenize, command::ExitStatus, job::BackupJob};
use std::{ffi::OsStr, path::PathBuf, process::Stdio};
use tokio::process::Command;

pub use init::{Ensured, InitError};
pub use process::*;

mod init;
mod process;
mod util;

#[derive(Debug, Default, Copy, Clone)]
pub enum Output {
    #[default]
    Null,
    Capture,
}

impl From<Output> for Stdio {
    fn from(v: Output) -> Self {
        match v {
            Output::Null => Stdio::null(),
            Output::Capture => Stdio::piped(),
        }
    }
}

#[derive(Debug, Default, Copy, Clone)]
pub struct Options {
    pub stdout: Output,
    pub stderr: Output,
}

impl Options {
    pub fn capture_output() -> Options {
        Options {
            stdout: Output::Capture,
            stderr: Output::Capture,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to start restic process: {0}")]
    FailedToStartResticProcess(#[source] std::io::Error),
    #[error("error reading from subprocess output: {0}")]
    SubprocessIoError(#[source] std::io::Error),
    #[error("error getting subprocess status: {0}")]
    SubprocessStatusError(#[source] std::io::Error),
    #[error("restic {}", .0.message())]
    ResticError(ExitStatus),
    #[error("couldn't determine restic version from output")]
    FailedToGetResticVersion,
}

/// Runs the restic binary.
///
/// The repository and its password are handed to restic through `RESTIC_REPOSITORY` and
/// `RESTIC_PASSWORD`, so the command line only contains the subcommand and its arguments.
#[derive(Debug)]
pub struct Restic {
    binary: PathBuf,
}

impl Restic {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Restic {
            binary: binary.into(),
        }
    }

    pub fn run(
        &self,
        job: Option<&BackupJob>,
        args: &[impl AsRef<OsStr>],
        options: &Options,
    ) -> Result<ResticProcess, Error> {
        let mut cmd = Command::new(&self.binary);
        cmd.stdin(Stdio::null())
            .stdout(options.stdout)
            .stderr(options.stderr)
            .kill_on_drop(true);

        if let Some(job) = job {
            cmd.env("RESTIC_REPOSITORY", &job.repository.0);
            cmd.env("RESTIC_PASSWORD", &job.password.0);
        }

        for arg in args {
            cmd.arg(arg.as_ref());
        }

        let child = cmd.spawn().map_err(Error::FailedToStartResticProcess)?;
        Ok(ResticProcess(child))
    }

    /// The arguments for `restic backup`: the subcommand, the output flag of the job's output
    /// format, then the job's own arguments.
    pub fn backup_args(job: &BackupJob) -> Vec<String> {
        let mut args = vec!["backup".to_owned()];
        if let Some(flag) = job.output_format.flag() {
            args.push(flag.to_owned());
        }
        args.extend(tokenize(&job.args));
        args
    }

    /// Runs `restic backup` to completion, capturing stdout and stderr separately.
    pub async fn backup(&self, job: &BackupJob) -> Result<CapturedOutput, Error> {
        let args = Self::backup_args(job);
        tracing::debug!(?args, "running restic backup");
        self.run(Some(job), &args, &Options::capture_output())?
            .capture()
            .await
    }
}
