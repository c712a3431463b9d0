use super::{OutputParser, ParseError, ParseFailure, Stats};
use serde::Deserialize;
use std::io::BufRead;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    message_type: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
struct StatusMessage {
    percent_done: f64,
    total_files: u64,
    files_done: u64,
    total_bytes: u64,
    bytes_done: u64,
    error_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Text(String),
    Object { message: String },
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorDetail::Text(message) | ErrorDetail::Object { message } => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct ErrorMessage {
    error: ErrorDetail,
    #[serde(default)]
    during: String,
    #[serde(default)]
    item: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
struct SummaryMessage {
    files_new: u64,
    files_changed: u64,
    files_unmodified: u64,
    dirs_new: u64,
    dirs_changed: u64,
    dirs_unmodified: u64,
    data_blobs: u64,
    tree_blobs: u64,
    data_added: u64,
    total_files_processed: u64,
    total_bytes_processed: u64,
    total_duration: f64,
    snapshot_id: String,
}

impl SummaryMessage {
    fn stats(&self) -> Stats {
        Stats {
            files_new: self.files_new,
            files_changed: self.files_changed,
            files_unmodified: self.files_unmodified,
            files_processed: self.total_files_processed,
            bytes_added: self.data_added,
            bytes_processed: self.total_bytes_processed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Message {
    Summary(SummaryMessage),
    Status(StatusMessage),
    Error(ErrorMessage),
    /// A message type without influence on the statistics, or an informational message that
    /// couldn't be decoded.
    Ignored(String),
}

impl Message {
    fn decode(line: &str, line_number: usize) -> Result<Message, ParseError> {
        let envelope: Envelope =
            serde_json::from_str(line).map_err(|source| ParseError::InvalidMessage {
                line: line_number,
                source,
            })?;
        let message = match envelope.message_type.as_str() {
            "summary" => Message::Summary(serde_json::from_str(line).map_err(|source| {
                ParseError::InvalidSummary {
                    line: line_number,
                    source,
                }
            })?),
            "status" => serde_json::from_str(line)
                .map(Message::Status)
                .unwrap_or_else(|_| Message::Ignored(envelope.message_type.clone())),
            "error" => match serde_json::from_str(line) {
                Ok(message) => Message::Error(message),
                Err(error) => {
                    tracing::warn!(%error, line, "invalid error message in backup output");
                    Message::Ignored(envelope.message_type.clone())
                }
            },
            _ => Message::Ignored(envelope.message_type.clone()),
        };
        Ok(message)
    }
}

/// Parser for the output of `restic backup --json`.
///
/// Every line is one JSON message. The statistics are taken from the last `summary` message;
/// parsing stops at the first line that isn't valid JSON, returning what was gathered so far.
#[derive(Debug, Default, Copy, Clone)]
pub struct JsonStream;

impl JsonStream {
    fn parse_lines(reader: impl BufRead) -> Result<Stats, ParseFailure> {
        let mut stats = Stats::default();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| ParseFailure::new(stats, ParseError::Io(e)))?;
            if line.trim().is_empty() {
                continue;
            }
            match Message::decode(&line, index + 1).map_err(|e| ParseFailure::new(stats, e))? {
                Message::Summary(summary) => {
                    tracing::debug!(
                        snapshot_id = %summary.snapshot_id,
                        total_duration = summary.total_duration,
                        dirs_new = summary.dirs_new,
                        dirs_changed = summary.dirs_changed,
                        dirs_unmodified = summary.dirs_unmodified,
                        data_blobs = summary.data_blobs,
                        tree_blobs = summary.tree_blobs,
                        "backup summary"
                    );
                    stats = summary.stats();
                }
                Message::Status(status) => {
                    tracing::debug!(
                        percent_done = status.percent_done,
                        files_done = status.files_done,
                        total_files = status.total_files,
                        bytes_done = status.bytes_done,
                        total_bytes = status.total_bytes,
                        error_count = status.error_count,
                        "backup status"
                    );
                }
                Message::Error(error) => {
                    tracing::warn!(
                        error = %error.error,
                        during = %error.during,
                        item = %error.item,
                        "restic reported an error"
                    );
                }
                Message::Ignored(message_type) => {
                    tracing::trace!(%message_type, "ignoring message");
                }
            }
        }
        Ok(stats)
    }
}

impl OutputParser for JsonStream {
    fn parse(&self, output: &[u8]) -> Result<Stats, ParseFailure> {
        Self::parse_lines(output)
    }
}
