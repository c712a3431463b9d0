use clap::builder::FalseyValueParser;
use std::path::PathBuf;
use stratus_core::{job::BackupJob, output::OutputFormat};
use stratus_daemon::scheduler::Schedule;

const DEFAULT_PROMETHEUS_ADDRESS: &str = ":8080";
const DEFAULT_TRIGGER_ENDPOINT: &str = "/trigger";

/// Runs restic backups on a schedule and exports their statistics as Prometheus metrics.
#[derive(Debug, clap::Parser)]
#[command(version)]
pub struct Cli {
    /// Sets when backups run: a cron expression, a descriptor like @daily, or @every <duration>
    #[arg(long, env = "SCHEDULE")]
    pub schedule: Schedule,

    /// Sets the restic repository to back up to
    #[arg(long, env = "RESTIC_REPOSITORY")]
    pub repository: String,

    /// Sets the password of the restic repository
    #[arg(long, env = "RESTIC_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Sets additional arguments for restic backup
    #[arg(long, env = "RESTIC_ARGS", default_value = "")]
    pub restic_args: String,

    /// Sets the restic binary to use
    #[arg(long, env = "RESTIC_BINARY", default_value = "restic")]
    pub restic_binary: PathBuf,

    /// Selects how the output of restic backup is parsed (json or legacy)
    #[arg(long, env = "OUTPUT_FORMAT", default_value_t)]
    pub output_format: OutputFormat,

    /// Runs a backup right after startup
    #[arg(long, env = "RUN_ON_BOOT", value_parser = FalseyValueParser::new())]
    pub run_on_boot: bool,

    /// Sets a command to run before each backup
    #[arg(long, env = "PRE_COMMAND")]
    pub pre_command: Option<String>,

    /// Sets a command to run after each successful backup
    #[arg(long, env = "POST_COMMAND")]
    pub post_command: Option<String>,

    /// Sets a command to run after a failed backup
    #[arg(long, env = "ERROR_COMMAND")]
    pub error_command: Option<String>,

    /// Sets the address of the HTTP server [default: :8080]; empty disables it
    #[arg(long, env = "PROMETHEUS_ADDRESS")]
    pub prometheus_address: Option<String>,

    /// Sets the path of the metrics endpoint
    #[arg(long, env = "PROMETHEUS_ENDPOINT", default_value = "/metrics")]
    pub prometheus_endpoint: String,

    /// Sets the path of the manual trigger endpoint [default: /trigger]; empty disables it
    #[arg(long, env = "TRIGGER_ENDPOINT")]
    pub trigger_endpoint: Option<String>,

    /// Enables debug logging
    #[arg(long, env = "DEBUG", value_parser = FalseyValueParser::new())]
    pub debug: bool,
}

fn non_empty<'a>(value: Option<&'a str>, default: &'a str) -> Option<&'a str> {
    match value {
        None => Some(default),
        Some(value) if value.trim().is_empty() => None,
        Some(value) => Some(value),
    }
}

impl Cli {
    pub fn backup_job(&self) -> BackupJob {
        let mut job = BackupJob::new(&self.repository, &self.password);
        job.args = self.restic_args.clone();
        job.output_format = self.output_format;
        job.pre_command = self.pre_command.clone().filter(|c| !c.trim().is_empty());
        job.post_command = self.post_command.clone().filter(|c| !c.trim().is_empty());
        job.error_command = self.error_command.clone().filter(|c| !c.trim().is_empty());
        job
    }

    /// The address of the HTTP server, or `None` if it is disabled.
    pub fn http_address(&self) -> Option<&str> {
        non_empty(
            self.prometheus_address.as_deref(),
            DEFAULT_PROMETHEUS_ADDRESS,
        )
    }

    pub fn trigger_path(&self) -> Option<&str> {
        non_empty(self.trigger_endpoint.as_deref(), DEFAULT_TRIGGER_ENDPOINT)
    }
}
