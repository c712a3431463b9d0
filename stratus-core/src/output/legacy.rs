use super::{OutputParser, ParseError, ParseFailure, Stats};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const FILES: &str = "files";
const ADDED: &str = "added";
const PROCESSED: &str = "processed";

static FILES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Files:\s+(\d+) new,\s+(\d+) changed,\s+(\d+) unmodified")
        .expect("valid regex")
});
static ADDED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Added to the repo(?:sitory)?:\s+(\d+(?:\.\d+)?) ([A-Za-z]+)").expect("valid regex")
});
static PROCESSED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"processed (\d+) files, (\d+(?:\.\d+)?) ([A-Za-z]+)").expect("valid regex")
});

/// Parser for the plain-text report printed by `restic backup` without `--json`.
///
/// All three report lines (file counts, data added, data processed) must be present, otherwise
/// parsing fails and no statistics are returned.
#[derive(Debug, Default, Copy, Clone)]
pub struct LegacyText;

impl LegacyText {
    fn parse_text(text: &str) -> Result<Stats, ParseError> {
        let files = FILES_RE
            .captures(text)
            .ok_or(ParseError::MissingLine(FILES))?;
        let added = ADDED_RE
            .captures(text)
            .ok_or(ParseError::MissingLine(ADDED))?;
        let processed = PROCESSED_RE
            .captures(text)
            .ok_or(ParseError::MissingLine(PROCESSED))?;

        Ok(Stats {
            files_new: count(&files, 1, FILES)?,
            files_changed: count(&files, 2, FILES)?,
            files_unmodified: count(&files, 3, FILES)?,
            files_processed: count(&processed, 1, PROCESSED)?,
            bytes_added: bytes(&added[1], &added[2], ADDED)?,
            bytes_processed: bytes(&processed[2], &processed[3], PROCESSED)?,
        })
    }
}

impl OutputParser for LegacyText {
    fn parse(&self, output: &[u8]) -> Result<Stats, ParseFailure> {
        Self::parse_text(&String::from_utf8_lossy(output))
            .map_err(|error| ParseFailure::new(Stats::default(), error))
    }
}

fn count(captures: &Captures, group: usize, line: &'static str) -> Result<u64, ParseError> {
    let value = &captures[group];
    value.parse().map_err(|_| ParseError::InvalidNumber {
        line,
        value: value.to_owned(),
    })
}

/// Reads an amount as printed by restic: a fractional part always has three digits and counts
/// thousandths, so `169.009` becomes 169009.
fn amount(value: &str, line: &'static str) -> Result<u64, ParseError> {
    let invalid = || ParseError::InvalidNumber {
        line,
        value: value.to_owned(),
    };
    match value.split_once('.') {
        None => value.parse().map_err(|_| invalid()),
        Some((_, fraction)) if fraction.len() > 3 => Err(invalid()),
        Some((integer, fraction)) => {
            let integer: u64 = integer.parse().map_err(|_| invalid())?;
            let fraction: u64 = format!("{:0<3}", fraction).parse().map_err(|_| invalid())?;
            integer
                .checked_mul(1000)
                .and_then(|v| v.checked_add(fraction))
                .ok_or_else(invalid)
        }
    }
}

fn unit_factor(unit: &str) -> Option<u64> {
    match unit {
        "B" => Some(1),
        "KiB" => Some(1 << 10),
        "MiB" => Some(1 << 20),
        "GiB" => Some(1 << 30),
        "TiB" => Some(1 << 40),
        _ => None,
    }
}

fn bytes(value: &str, unit: &str, line: &'static str) -> Result<u64, ParseError> {
    let factor = unit_factor(unit).ok_or_else(|| ParseError::UnknownUnit {
        line,
        unit: unit.to_owned(),
    })?;
    amount(value, line)?
        .checked_mul(factor)
        .ok_or_else(|| ParseError::InvalidNumber {
            line,
            value: value.to_owned(),
        })
}
