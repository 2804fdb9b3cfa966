//! Terminal rendering of run events, plus development tracing.
//!
//! # Separation of Concerns
//!
//! - **Run output**: events on [`MAIN_TARGET`] and [`COMMAND_TARGET`] are the
//!   product output of donkey. They are rendered by [`DonkeyFormat`] as
//!   coloured lines on stdout, prefixed with the unit's display token.
//!
//! - **Diagnostics**: every other event (spawn details, skipped groups) uses
//!   tracing's compact format and is only visible with `-v` or `RUST_LOG`.

use std::fmt;

use chrono::Local;
use colored::{Color, Colorize};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{Compact, Format, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::io::events::{COMMAND_TARGET, MAIN_TARGET};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` env var. Defaults to `donkey=info`, or `donkey=debug` when
/// `verbose` is set.
///
/// # Example
/// ```bash
/// RUST_LOG=donkey=trace donkey build
/// ```
pub fn init(verbose: bool) {
    let default = if verbose { "donkey=debug" } else { "donkey=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_fmt::layer()
                .with_writer(std::io::stdout)
                .event_format(DonkeyFormat::default()),
        )
        .init();
}

/// Event formatter for donkey's run output.
#[derive(Debug)]
pub struct DonkeyFormat {
    fallback: Format<Compact>,
}

impl Default for DonkeyFormat {
    fn default() -> Self {
        Self {
            fallback: tracing_fmt::format().compact(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for DonkeyFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let mut fields = EventFields::default();
        match metadata.target() {
            COMMAND_TARGET => {
                event.record(&mut fields);
                let timestamp = Local::now().format("%H:%M:%S").to_string();
                write!(writer, "{}", render_command(&fields, &timestamp))
            }
            MAIN_TARGET => {
                event.record(&mut fields);
                write!(writer, "{}", render_main(&fields, *metadata.level()))
            }
            _ => self.fallback.format_event(ctx, writer, event),
        }
    }
}

/// Fields donkey attaches to run events.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct EventFields {
    message: String,
    symbol: String,
    colour: String,
    fd: Option<u64>,
    /// Line ends with a line break.
    nl: Option<bool>,
    /// Previous output ended with a line break, so this line needs a prefix.
    prev_nl: Option<bool>,
    newline: bool,
}

impl Visit for EventFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "symbol" => self.symbol = value.to_string(),
            "colour" => self.colour = value.to_string(),
            _ => {}
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        match field.name() {
            "nl" => self.nl = Some(value),
            "prev_nl" => self.prev_nl = Some(value),
            "newline" => self.newline = value,
            _ => {}
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "fd" {
            self.fd = Some(value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

fn token_colour(fields: &EventFields) -> Option<Color> {
    (!fields.colour.is_empty()).then(|| Color::from(fields.colour.as_str()))
}

/// One chunk of child output: `HH:MM:SS <symbol> <line>`.
///
/// Continuations of an unterminated fragment get no prefix, and unterminated
/// fragments get no line break.
fn render_command(fields: &EventFields, timestamp: &str) -> String {
    if fields.newline {
        return "\n".to_string();
    }

    let mut out = String::new();
    if fields.prev_nl.unwrap_or(true) {
        out.push_str(&timestamp.dimmed().to_string());
        out.push(' ');
        if !fields.symbol.is_empty() {
            let symbol = match token_colour(fields) {
                Some(colour) => fields.symbol.color(colour).to_string(),
                None => fields.symbol.clone(),
            };
            out.push_str(&symbol);
            out.push(' ');
        }
    }

    if fields.fd == Some(2) {
        out.push_str(&fields.message.yellow().to_string());
    } else {
        out.push_str(&fields.message);
    }

    if fields.nl.unwrap_or(true) {
        out.push('\n');
    }
    out
}

/// A lifecycle line, coloured by level and prefixed with the unit's symbol.
fn render_main(fields: &EventFields, level: Level) -> String {
    let colour = match level {
        Level::DEBUG | Level::TRACE => Color::White,
        Level::INFO => Color::Green,
        Level::WARN => Color::Yellow,
        Level::ERROR => Color::Red,
    };

    let mut out = String::new();
    if !fields.symbol.is_empty() {
        let symbol = match token_colour(fields) {
            Some(token) => fields.symbol.color(token).to_string(),
            None => fields.symbol.clone(),
        };
        out.push_str(&symbol);
        out.push(' ');
    }
    out.push_str(&fields.message.color(colour).to_string());
    out.push('\n');
    out
}
