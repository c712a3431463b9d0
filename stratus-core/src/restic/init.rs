use super::{Error, Options, Restic};
use crate::{command::ExitStatus, job::BackupJob};
use once_cell::sync::Lazy;
use regex::Regex;

static ALREADY_EXISTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)already (exists|initialized)").expect("valid regex"));

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Restic(#[from] Error),
    #[error("failed to initialize repository ({}): {output}", .status.message())]
    Failed { status: ExitStatus, output: String },
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Ensured {
    Created,
    AlreadyExists,
}

fn already_exists(output: &str) -> bool {
    ALREADY_EXISTS.is_match(output.trim())
}

impl Restic {
    /// Runs `restic init`, treating an existing repository as success.
    #[tracing::instrument(level = "debug", skip_all, fields(repository = %job.repository.0))]
    pub async fn ensure_repository(&self, job: &BackupJob) -> Result<Ensured, InitError> {
        tracing::info!("ensuring backup repository exists");
        let captured = self
            .run(Some(job), &["init"], &Options::capture_output())?
            .capture()
            .await?;
        if captured.status.success() {
            tracing::info!("successfully created repository");
            return Ok(Ensured::Created);
        }

        let output = captured.combined_lossy();
        if already_exists(&output) {
            tracing::info!("repository exists");
            Ok(Ensured::AlreadyExists)
        } else {
            Err(InitError::Failed {
                status: captured.status,
                output,
            })
        }
    }
}
