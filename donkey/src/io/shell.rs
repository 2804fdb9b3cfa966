//! Child process execution with line-by-line output streaming.

use std::future::Future;
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result, anyhow, bail};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, error, instrument};

use crate::core::definition::Settings;
use crate::core::plan::ShellCommand;
use crate::core::token::DisplayToken;
use crate::io::events::{EventSink, RunEvent, StreamId};

const READ_CHUNK_BYTES: usize = 8192;

/// Parameters for one child process.
#[derive(Debug, Clone, Copy)]
pub struct CommandRequest<'a> {
    pub command: &'a ShellCommand,
    /// Exported to the child as environment variables.
    pub env: &'a Settings,
    pub token: Option<DisplayToken>,
}

/// Abstraction over how a shell command is executed.
///
/// Returns the exit code once the command has fully terminated and all of its
/// output has been emitted. Tests substitute scripted runners that never spawn.
pub trait CommandRunner {
    fn run(&self, request: CommandRequest<'_>) -> impl Future<Output = Result<i32>>;
}

/// Runs commands as real child processes, streaming output to an [`EventSink`].
pub struct ShellRunner<'a> {
    sink: &'a dyn EventSink,
}

impl<'a> ShellRunner<'a> {
    pub fn new(sink: &'a dyn EventSink) -> Self {
        Self { sink }
    }
}

impl CommandRunner for ShellRunner<'_> {
    #[instrument(skip_all, fields(interpreter = %request.command.interpreter))]
    async fn run(&self, request: CommandRequest<'_>) -> Result<i32> {
        let command = request.command;
        let mut cmd = Command::new(&command.interpreter);
        cmd.args(command.args())
            .envs(request.env)
            .stdin(child_stdin())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(body = %command.body, "spawning child process");
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                error!(err = %err, "failed to spawn command");
                return Err(err).with_context(|| format!("spawn {}", command.interpreter));
            }
        };

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;

        let mut lines = LineEmitter::new(self.sink, request.token);
        let mut stdout_decoder = Utf8Decoder::new(StreamId::Stdout);
        let mut stderr_decoder = Utf8Decoder::new(StreamId::Stderr);
        let mut stdout_buf = [0u8; READ_CHUNK_BYTES];
        let mut stderr_buf = [0u8; READ_CHUNK_BYTES];
        let (mut stdout_open, mut stderr_open) = (true, true);

        while stdout_open || stderr_open {
            tokio::select! {
                read = stdout.read(&mut stdout_buf), if stdout_open => {
                    let n = read.context("read stdout")?;
                    if n == 0 {
                        stdout_open = false;
                        stdout_decoder.finish()?;
                    } else {
                        let text = stdout_decoder.decode(&stdout_buf[..n])?;
                        lines.push(StreamId::Stdout, &text);
                    }
                }
                read = stderr.read(&mut stderr_buf), if stderr_open => {
                    let n = read.context("read stderr")?;
                    if n == 0 {
                        stderr_open = false;
                        stderr_decoder.finish()?;
                    } else {
                        let text = stderr_decoder.decode(&stderr_buf[..n])?;
                        lines.push(StreamId::Stderr, &text);
                    }
                }
            }
        }

        let status = child.wait().await.context("wait for command")?;
        lines.finish();

        let code = exit_code(status);
        debug!(exit_code = code, "command finished");
        Ok(code)
    }
}

/// Splits decoded text into line events, tracking trailing line breaks across
/// chunks of both streams.
struct LineEmitter<'a> {
    sink: &'a dyn EventSink,
    token: Option<DisplayToken>,
    trailing_newline: bool,
}

impl<'a> LineEmitter<'a> {
    fn new(sink: &'a dyn EventSink, token: Option<DisplayToken>) -> Self {
        Self {
            sink,
            token,
            trailing_newline: true,
        }
    }

    fn push(&mut self, stream: StreamId, text: &str) {
        let mut parts: Vec<&str> = text.split('\n').collect();
        // `split` always yields at least one item; the last is the unterminated tail.
        let tail = parts.pop().unwrap_or_default();
        for line in parts {
            self.emit(stream, line, true);
        }
        if !tail.is_empty() {
            self.emit(stream, tail, false);
        }
    }

    fn emit(&mut self, stream: StreamId, line: &str, terminal: bool) {
        self.sink.emit(RunEvent::Output {
            stream,
            line: line.to_string(),
            terminal,
            continues: !self.trailing_newline,
            token: self.token,
        });
        self.trailing_newline = terminal;
    }

    fn finish(self) {
        if !self.trailing_newline {
            self.sink.emit(RunEvent::Newline { token: self.token });
        }
    }
}

/// Strict UTF-8 decoding that tolerates a code point split across reads.
struct Utf8Decoder {
    stream: StreamId,
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn new(stream: StreamId) -> Self {
        Self {
            stream,
            pending: Vec::new(),
        }
    }

    fn decode(&mut self, chunk: &[u8]) -> Result<String> {
        self.pending.extend_from_slice(chunk);
        match std::str::from_utf8(&self.pending).map(str::to_owned) {
            Ok(text) => {
                self.pending.clear();
                Ok(text)
            }
            // Incomplete sequence at the end: keep it for the next read.
            Err(err) if err.error_len().is_none() => {
                let tail = self.pending.split_off(err.valid_up_to());
                let head = std::mem::replace(&mut self.pending, tail);
                String::from_utf8(head).with_context(|| format!("decode {} output", self.stream))
            }
            Err(err) => Err(err).with_context(|| format!("decode {} output", self.stream)),
        }
    }

    fn finish(&self) -> Result<()> {
        if !self.pending.is_empty() {
            bail!(
                "decode {} output: stream ended inside a UTF-8 sequence",
                self.stream
            );
        }
        Ok(())
    }
}

/// Exit code of a finished child; death by signal maps to `128 + signal`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Share our stdin with the child when it is a usable descriptor, otherwise
/// give the child an empty input.
#[cfg(unix)]
fn child_stdin() -> Stdio {
    use std::os::fd::AsFd;

    match std::io::stdin().as_fd().try_clone_to_owned() {
        Ok(fd) => Stdio::from(fd),
        Err(err) => {
            debug!(err = %err, "stdin unusable, substituting empty input");
            Stdio::null()
        }
    }
}

#[cfg(not(unix))]
fn child_stdin() -> Stdio {
    Stdio::inherit()
}
