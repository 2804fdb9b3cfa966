//! Structured run events and the sink they are emitted to.
//!
//! The executor never formats terminal output itself. It emits [`RunEvent`]s;
//! [`TracingSink`] forwards them as `tracing` events whose fields the logging
//! layer (see [`crate::logging`]) turns into coloured lines. Tests capture them
//! with a recording sink instead.

use std::fmt;
use std::time::Duration;

use tracing::{Level, info, warn};

use crate::core::token::DisplayToken;

/// Target for lifecycle lines ("Running ...", "... finished").
pub const MAIN_TARGET: &str = "donkey::main";
/// Target for child process output.
pub const COMMAND_TARGET: &str = "donkey::command";

/// Marker message of the synthetic newline event.
pub const NEWLINE_MESSAGE: &str = "<nl>";

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamId {
    Stdout = 1,
    Stderr = 2,
}

impl StreamId {
    pub fn fd(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamId::Stdout => f.write_str("stdout"),
            StreamId::Stderr => f.write_str("stderr"),
        }
    }
}

/// One structured event produced while running groups.
///
/// `token` is `None` when the run has a single display unit and output should
/// stay unadorned.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Started {
        display_name: String,
        token: Option<DisplayToken>,
    },
    Output {
        stream: StreamId,
        line: String,
        /// The line ended with a line break.
        terminal: bool,
        /// The line continues a fragment emitted without a line break.
        continues: bool,
        token: Option<DisplayToken>,
    },
    /// Emitted once on exit when the last fragment had no line break.
    Newline { token: Option<DisplayToken> },
    Finished {
        display_name: String,
        token: Option<DisplayToken>,
        duration: Duration,
        codes: Vec<i32>,
    },
}

impl RunEvent {
    pub fn level(&self) -> Level {
        match self {
            RunEvent::Output {
                stream: StreamId::Stderr,
                ..
            } => Level::WARN,
            _ => Level::INFO,
        }
    }

    pub fn token(&self) -> Option<DisplayToken> {
        match self {
            RunEvent::Started { token, .. }
            | RunEvent::Output { token, .. }
            | RunEvent::Newline { token }
            | RunEvent::Finished { token, .. } => *token,
        }
    }

    pub fn message(&self) -> String {
        match self {
            RunEvent::Started { display_name, .. } => format!("Running \"{display_name}\"..."),
            RunEvent::Output { line, .. } => line.clone(),
            RunEvent::Newline { .. } => NEWLINE_MESSAGE.to_string(),
            RunEvent::Finished {
                display_name,
                duration,
                codes,
                ..
            } => {
                let label = if codes.len() == 1 {
                    "return code"
                } else {
                    "return codes"
                };
                format!(
                    "\"{display_name}\" finished in {:.2}s, {label}: {}",
                    duration.as_secs_f64(),
                    join_codes(codes)
                )
            }
        }
    }
}

fn join_codes(codes: &[i32]) -> String {
    codes
        .iter()
        .map(i32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Receiver of run events.
pub trait EventSink {
    fn emit(&self, event: RunEvent);
}

/// Forwards run events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: RunEvent) {
        let token = event.token();
        let symbol = token.map_or("", |token| token.symbol);
        let colour = token.map_or("", |token| token.colour.as_str());
        let message = event.message();

        match &event {
            RunEvent::Started { display_name, .. } => {
                info!(target: MAIN_TARGET, symbol, colour, display_name = %display_name, "{message}");
            }
            RunEvent::Finished {
                display_name,
                duration,
                codes,
                ..
            } => {
                info!(
                    target: MAIN_TARGET,
                    symbol,
                    colour,
                    display_name = %display_name,
                    duration_secs = duration.as_secs_f64(),
                    return_codes = %join_codes(codes),
                    "{message}"
                );
            }
            RunEvent::Output {
                stream,
                terminal,
                continues,
                ..
            } => {
                let fd = stream.fd();
                let prev_nl = !continues;
                match stream {
                    StreamId::Stdout => {
                        info!(target: COMMAND_TARGET, fd, symbol, colour, nl = *terminal, prev_nl, "{message}");
                    }
                    StreamId::Stderr => {
                        warn!(target: COMMAND_TARGET, fd, symbol, colour, nl = *terminal, prev_nl, "{message}");
                    }
                }
            }
            RunEvent::Newline { .. } => {
                info!(target: COMMAND_TARGET, symbol, colour, newline = true, "{message}");
            }
        }
    }
}
