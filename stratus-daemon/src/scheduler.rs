use crate::runner::Runner;
use chrono::{DateTime, Local, TimeZone};
use std::{str::FromStr, sync::Arc, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("invalid cron expression '{expression}': {source}")]
    InvalidCron {
        expression: String,
        #[source]
        source: cron_parser::ParseError,
    },
    #[error("invalid seconds field '{field}', expected a single second between 0 and 59")]
    InvalidSeconds { field: String },
    #[error("invalid interval")]
    InvalidInterval(#[source] humantime::DurationError),
    #[error("interval must be longer than zero")]
    ZeroInterval,
    #[error("next schedule is out of range")]
    OutOfRange,
}

/// When backups run: a cron expression or a fixed interval.
///
/// Cron expressions have five fields, or six with a leading seconds field as in
/// `0 30 3 * * *`. The seconds field must be a single second. Also accepts the descriptors `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`, `@midnight`
/// and `@hourly` as shorthands for the equivalent cron expressions, and `@every <duration>`
/// with a human-readable duration such as `90m` or `1h 30m`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Schedule {
    /// A 5-field cron expression, fired `second` seconds into each matching minute.
    Cron { expression: String, second: u32 },
    Every(Duration),
}

fn descriptor(name: &str) -> Option<&'static str> {
    match name {
        "@yearly" | "@annually" => Some("0 0 1 1 *"),
        "@monthly" => Some("0 0 1 * *"),
        "@weekly" => Some("0 0 * * 0"),
        "@daily" | "@midnight" => Some("0 0 * * *"),
        "@hourly" => Some("0 * * * *"),
        _ => None,
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(interval) = s.strip_prefix("@every ") {
            let interval = humantime::parse_duration(interval.trim())
                .map_err(ScheduleError::InvalidInterval)?;
            if interval.is_zero() {
                return Err(ScheduleError::ZeroInterval);
            }
            return Ok(Schedule::Every(interval));
        }

        let invalid = |source| ScheduleError::InvalidCron {
            expression: s.to_owned(),
            source,
        };
        let expression = descriptor(s).unwrap_or(s);
        let fields = expression.split_whitespace().collect::<Vec<_>>();
        let (second, fields) = match fields.as_slice() {
            [second, rest @ ..] if rest.len() == 5 => (parse_second(second)?, rest),
            fields if fields.len() == 5 => (0, fields),
            _ => return Err(invalid(cron_parser::ParseError::InvalidCron)),
        };
        let expression = fields.join(" ");
        cron_parser::parse(&expression, &Local::now()).map_err(invalid)?;
        Ok(Schedule::Cron { expression, second })
    }
}

fn parse_second(field: &str) -> Result<u32, ScheduleError> {
    field
        .parse()
        .ok()
        .filter(|second| *second < 60)
        .ok_or_else(|| ScheduleError::InvalidSeconds {
            field: field.to_owned(),
        })
}

impl Schedule {
    /// The first point in time strictly after `after` at which a backup should run.
    pub fn next_after<Tz: TimeZone>(
        &self,
        after: &DateTime<Tz>,
    ) -> Result<DateTime<Tz>, ScheduleError> {
        match self {
            Schedule::Cron { expression, second } => {
                let offset = chrono::Duration::seconds(i64::from(*second));
                let shifted = after
                    .clone()
                    .checked_sub_signed(offset)
                    .ok_or(ScheduleError::OutOfRange)?;
                cron_parser::parse(expression, &shifted)
                    .map_err(|source| ScheduleError::InvalidCron {
                        expression: expression.clone(),
                        source,
                    })?
                    .checked_add_signed(offset)
                    .ok_or(ScheduleError::OutOfRange)
            }
            Schedule::Every(interval) => chrono::Duration::from_std(*interval)
                .ok()
                .and_then(|interval| after.clone().checked_add_signed(interval))
                .ok_or(ScheduleError::OutOfRange),
        }
    }
}

/// Starts a backup run every time the schedule fires.
///
/// Each run is spawned as its own task so a long backup never delays the next tick; overlapping
/// runs are skipped by the runner itself.
#[derive(Debug)]
pub struct Scheduler {
    schedule: Schedule,
    runner: Arc<Runner>,
}

impl Scheduler {
    pub fn new(schedule: Schedule, runner: Arc<Runner>) -> Self {
        Scheduler { schedule, runner }
    }

    pub async fn run(self) -> Result<(), ScheduleError> {
        loop {
            let now = Local::now();
            let next = self.schedule.next_after(&now)?;
            tracing::debug!(%next, "next backup scheduled");
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            let runner = self.runner.clone();
            tokio::spawn(async move {
                runner.run().await;
            });
        }
    }
}
