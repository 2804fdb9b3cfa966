//! Test-only helpers: recording sinks, scripted runners and scratch workspaces.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::core::definition::Settings;
use crate::core::plan::ShellCommand;
use crate::core::token::DisplayToken;
use crate::io::definition_file::{DefinitionFile, parse_definition_file};
use crate::io::events::{EventSink, RunEvent};
use crate::io::shell::{CommandRequest, CommandRunner};

/// Parse `yaml` as if it were read from `donkey.yml`.
///
/// Panics on invalid input; tests only feed it valid documents.
pub fn definition_file(yaml: &str) -> DefinitionFile {
    match parse_definition_file(Path::new("donkey.yml"), yaml) {
        Ok(file) => file,
        Err(err) => panic!("test definition should be valid: {err}"),
    }
}

/// Captures every emitted event in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Rendered messages, in emission order.
    pub fn messages(&self) -> Vec<String> {
        self.events().iter().map(RunEvent::message).collect()
    }

    /// Position of the first message equal to `message`.
    pub fn position(&self, message: &str) -> Option<usize> {
        self.messages().iter().position(|m| m == message)
    }

    /// Tokens attached to `Started` events, in emission order.
    pub fn started_tokens(&self) -> Vec<Option<DisplayToken>> {
        self.events()
            .iter()
            .filter_map(|event| match event {
                RunEvent::Started { token, .. } => Some(*token),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: RunEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Scripted behaviour for one command body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptedCommand {
    pub exit_code: i32,
    pub delay: Duration,
}

/// A command the scripted runner was asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: ShellCommand,
    pub env: Settings,
    pub token: Option<DisplayToken>,
}

/// Runner that never spawns: looks up each body in a script.
///
/// Unscripted bodies succeed immediately.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    script: HashMap<String, ScriptedCommand>,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `body` to exit with `exit_code` after `delay`.
    pub fn on(mut self, body: &str, exit_code: i32, delay: Duration) -> Self {
        self.script
            .insert(body.to_string(), ScriptedCommand { exit_code, delay });
        self
    }

    /// Invocations in launch order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .map(|invocations| invocations.clone())
            .unwrap_or_default()
    }

    /// Bodies in launch order.
    pub fn bodies(&self) -> Vec<String> {
        self.invocations()
            .into_iter()
            .map(|invocation| invocation.command.body)
            .collect()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, request: CommandRequest<'_>) -> Result<i32> {
        self.invocations
            .lock()
            .map_err(|_| anyhow!("invocation log poisoned"))?
            .push(Invocation {
                command: request.command.clone(),
                env: request.env.clone(),
                token: request.token,
            });
        let scripted = self
            .script
            .get(&request.command.body)
            .copied()
            .unwrap_or_default();
        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        Ok(scripted.exit_code)
    }
}

/// Scratch directory holding a definition file.
pub struct Workspace {
    temp: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp workspace")?;
        Ok(Self { temp })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Write `contents` to `makefile.yml` in the workspace root.
    pub fn write_definition(&self, contents: &str) -> Result<PathBuf> {
        self.write_file("makefile.yml", contents)
    }

    pub fn write_file(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    pub fn read_file(&self, name: &str) -> Result<String> {
        let path = self.path().join(name);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }
}
