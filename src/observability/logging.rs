//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the process-wide `tracing` subscriber
//! - Select the output format from the command line
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `logfmt` emits `ts=... level=... msg=... key=value` lines, `json` emits
//!   one object per line
//! - Log level configurable via `RUST_LOG`, defaulting to `zombie=info`

use std::fmt::{self, Write as _};
use std::str::FromStr;

use thiserror::Error;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Errors raised while setting up logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unknown log format '{0}'")]
    UnknownFormat(String),

    #[error("failed to install log subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Logfmt,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logfmt" => Ok(LogFormat::Logfmt),
            "json" => Ok(LogFormat::Json),
            other => Err(LoggingError::UnknownFormat(other.to_string())),
        }
    }
}

/// Install the global subscriber.
///
/// `default_directive` is used when `RUST_LOG` is not set.
pub fn init_logging(format: LogFormat, default_directive: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Logfmt => registry
            .with(tracing_subscriber::fmt::layer().event_format(Logfmt))
            .try_init()?,
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .try_init()?,
    }

    Ok(())
}

/// Event formatter writing one logfmt line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct Logfmt;

impl<S, N> FormatEvent<S, N> for Logfmt
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, _ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        writer.write_str("ts=")?;
        SystemTime.format_time(&mut writer)?;
        write!(writer, " level={}", level_name(event.metadata().level()))?;

        let mut fields = LogfmtFields::new(&mut writer);
        event.record(&mut fields);
        fields.result?;

        writeln!(writer)
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "error",
        Level::WARN => "warn",
        Level::INFO => "info",
        Level::DEBUG => "debug",
        Level::TRACE => "trace",
    }
}

/// Appends ` key=value` for every field; the event message becomes `msg`.
struct LogfmtFields<'w> {
    out: &'w mut dyn fmt::Write,
    result: fmt::Result,
}

impl<'w> LogfmtFields<'w> {
    fn new(out: &'w mut dyn fmt::Write) -> Self {
        Self { out, result: Ok(()) }
    }

    fn pair(&mut self, key: &str, value: &str) {
        if self.result.is_err() {
            return;
        }
        let key = if key == "message" { "msg" } else { key };
        self.result = if needs_quotes(value) {
            write!(self.out, " {}={:?}", key, value)
        } else {
            write!(self.out, " {}={}", key, value)
        };
    }
}

impl Visit for LogfmtFields<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.pair(field.name(), value);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.pair(field.name(), &format!("{:?}", value));
    }
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty() || value.chars().any(|c| c == ' ' || c == '=' || c == '"' || c.is_control())
}
