use crate::output::OutputFormat;

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Repository(pub String);

#[derive(PartialEq, Eq, Clone)]
pub struct Password(pub String);

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

/// The backup that the daemon runs on every trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupJob {
    pub repository: Repository,
    pub password: Password,
    /// Extra arguments for `restic backup`, split with [`crate::args::tokenize`].
    pub args: String,
    pub output_format: OutputFormat,
    pub pre_command: Option<String>,
    pub post_command: Option<String>,
    /// Runs after a hook or the backup itself failed.
    pub error_command: Option<String>,
}

impl BackupJob {
    pub fn new(repository: impl Into<String>, password: impl Into<String>) -> Self {
        BackupJob {
            repository: Repository(repository.into()),
            password: Password(password.into()),
            args: String::new(),
            output_format: OutputFormat::default(),
            pre_command: None,
            post_command: None,
            error_command: None,
        }
    }
}
