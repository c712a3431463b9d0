//! Extraction of backup statistics from restic's output.
//!
//! Two formats are supported: the line-delimited JSON messages printed with `--json`
//! ([`JsonStream`]) and the human-readable report of older restic versions ([`LegacyText`]).
//! Which one applies is a matter of configuration, the output is never sniffed.

pub use json::JsonStream;
pub use legacy::LegacyText;

mod json;
mod legacy;

/// Statistics of a single backup run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub files_new: u64,
    pub files_changed: u64,
    pub files_unmodified: u64,
    pub files_processed: u64,
    pub bytes_added: u64,
    pub bytes_processed: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("error reading output: {0}")]
    Io(#[source] std::io::Error),
    #[error("invalid JSON message on line {line}: {source}")]
    InvalidMessage {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid summary message on line {line}: {source}")]
    InvalidSummary {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("no {0} line found in output")]
    MissingLine(&'static str),
    #[error("invalid number '{value}' in {line} line")]
    InvalidNumber { line: &'static str, value: String },
    #[error("unknown unit '{unit}' in {line} line")]
    UnknownUnit { line: &'static str, unit: String },
}

/// A parse error together with the statistics gathered before the error occurred.
#[derive(Debug, thiserror::Error)]
#[error("failed to extract statistics from backup output: {error}")]
pub struct ParseFailure {
    pub stats: Stats,
    #[source]
    pub error: ParseError,
}

impl ParseFailure {
    pub(crate) fn new(stats: Stats, error: ParseError) -> Self {
        ParseFailure { stats, error }
    }
}

pub trait OutputParser: std::fmt::Debug + Send + Sync {
    fn parse(&self, output: &[u8]) -> Result<Stats, ParseFailure>;
}

#[derive(Debug, Default, PartialEq, Eq, Hash, Copy, Clone)]
pub enum OutputFormat {
    #[default]
    Json,
    Legacy,
}

impl OutputFormat {
    pub fn parser(&self) -> Box<dyn OutputParser> {
        match self {
            OutputFormat::Json => Box::new(JsonStream),
            OutputFormat::Legacy => Box::new(LegacyText),
        }
    }

    /// The restic flag that makes restic print this format.
    pub fn flag(&self) -> Option<&'static str> {
        match self {
            OutputFormat::Json => Some("--json"),
            OutputFormat::Legacy => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown output format '{0}', expected 'json' or 'legacy'")]
pub struct UnknownOutputFormat(String);

impl std::str::FromStr for OutputFormat {
    type Err = UnknownOutputFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "legacy" | "text" => Ok(OutputFormat::Legacy),
            _ => Err(UnknownOutputFormat(s.to_owned())),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Legacy => f.write_str("legacy"),
        }
    }
}
