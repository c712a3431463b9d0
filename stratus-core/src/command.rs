//! Execution of hook commands such as the pre- and post-backup commands.

use futures::{prelude::*, stream::BoxStream};
use std::process::Stdio;
use tokio::{
    io::{AsyncBufReadExt as _, BufReader},
    process::{Child, Command},
};
use tokio_stream::wrappers::SplitStream;

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum ExitStatus {
    Successful,
    Failed(Option<i32>),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        self == &ExitStatus::Successful
    }

    pub fn message(&self) -> String {
        match self {
            ExitStatus::Successful => "exited successfully".to_owned(),
            ExitStatus::Failed(Some(code)) => format!("exited with error status {}", code),
            ExitStatus::Failed(None) => "exited with unknown error status".to_owned(),
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if status.success() {
            ExitStatus::Successful
        } else {
            ExitStatus::Failed(status.code())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Failure {
    #[error("failed to start process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to wait for process: {0}")]
    Io(#[source] std::io::Error),
    #[error("{}", .0.message())]
    Exit(ExitStatus),
}

/// A command that could not be started or did not exit successfully.
///
/// `output` holds whatever the process wrote to stdout and stderr before it failed; it usually
/// contains the actual reason and should always be logged.
#[derive(Debug, thiserror::Error)]
#[error("{command}: {reason}, {output}")]
pub struct ExecutionError {
    pub command: String,
    pub reason: Failure,
    pub output: String,
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum Event {
    StdoutLine(Vec<u8>),
    StderrLine(Vec<u8>),
}

impl Event {
    fn into_line(self) -> String {
        let (Event::StdoutLine(mut line) | Event::StderrLine(mut line)) = self;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        String::from_utf8_lossy(&line).into_owned()
    }
}

// Lines are split as raw bytes; output that isn't UTF-8 never fails the command.
fn merge_output_streams(child: &mut Child) -> BoxStream<'static, std::io::Result<Event>> {
    let stdout = child
        .stdout
        .take()
        .map(|io| SplitStream::new(BufReader::new(io).split(b'\n')).map_ok(Event::StdoutLine));
    let stderr = child
        .stderr
        .take()
        .map(|io| SplitStream::new(BufReader::new(io).split(b'\n')).map_ok(Event::StderrLine));

    match (stdout, stderr) {
        (Some(stdout), Some(stderr)) => Box::pin(stream::select(stdout, stderr)),
        (Some(stdout), None) => Box::pin(stdout),
        (None, Some(stderr)) => Box::pin(stderr),
        (None, None) => Box::pin(stream::empty()),
    }
}

fn split_command_line(command_line: &str) -> (&str, Vec<&str>) {
    let mut parts = command_line.trim().split(' ');
    let program = parts.next().unwrap_or_default();
    (program, parts.collect())
}

/// Runs a command line and returns its combined stdout and stderr.
///
/// The command line is split on single spaces without any quote handling; the first part names
/// the program, the remaining parts are passed as arguments.
#[tracing::instrument(level = "debug", skip_all, fields(command = command_line))]
pub async fn run(command_line: &str) -> Result<String, ExecutionError> {
    let error = |reason, output| ExecutionError {
        command: command_line.to_owned(),
        reason,
        output,
    };

    let (program, args) = split_command_line(command_line);
    let mut child = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| error(Failure::Spawn(e), String::new()))?;

    let mut lines = Vec::new();
    let mut events = merge_output_streams(&mut child);
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => lines.push(event.into_line()),
            Err(e) => {
                tracing::warn!(error = %e, "error reading command output");
                break;
            }
        }
    }
    drop(events);
    let output = lines.join("\n");

    match child.wait().await.map(ExitStatus::from) {
        Ok(ExitStatus::Successful) => Ok(output),
        Ok(status) => Err(error(Failure::Exit(status), output)),
        Err(e) => Err(error(Failure::Io(e), output)),
    }
}
