//! Top-level invocation: resolve requested groups and run them.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, instrument};

use crate::core::definition::Definition;
use crate::core::verdict::RunVerdict;
use crate::error::{Error, Result};
use crate::group::{GroupDefaults, GroupExecutor};
use crate::io::definition_file::{DefinitionFile, resolve_definition};
use crate::io::events::{EventSink, TracingSink};
use crate::io::shell::{CommandRunner, ShellRunner};
use crate::scheduler::Scheduler;

/// Pseudo-command that only validates the definition file.
pub const CHECK_COMMAND: &str = "check";

/// What the caller asked to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    /// Group names; empty means the document's `.default`.
    pub commands: Vec<String>,
    /// Explicit `--parallel`/`--serial`; `None` defers to `.config`.
    pub parallel: Option<bool>,
    /// Appended to every line of every requested group.
    pub args: Option<String>,
}

/// Full invocation from the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub request: RunRequest,
    /// Explicit definition file; otherwise the closest standard file is used.
    pub definition_file: Option<PathBuf>,
}

/// Groups resolved against a definition, ready for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRun {
    pub groups: Vec<GroupExecutor>,
    pub parallel: bool,
}

/// Resolve the requested names (or the default) into executors.
///
/// `.default` is only consulted for an empty request, and an undefined default
/// fails the same way as an unknown explicit name.
///
/// Group settings are merged over document settings one key at a time; nested
/// values are not merged.
pub fn resolve_run(file: &DefinitionFile, request: &RunRequest) -> Result<ResolvedRun> {
    let definition = &file.definition;
    let names = requested_names(definition, request)?;
    let defaults = group_defaults(definition);

    let mut groups = Vec::with_capacity(names.len());
    for name in names {
        let group = definition.group(&name).ok_or_else(|| {
            Error::config(format!(
                "Command \"{name}\" not found in \"{}\", options: {}",
                file.path.display(),
                definition.group_names().join(", ")
            ))
        })?;
        let mut settings = definition.settings.clone();
        settings.extend(group.settings.clone());
        groups.push(GroupExecutor::new(
            group,
            request.args.as_deref(),
            settings,
            &defaults,
        )?);
    }

    Ok(ResolvedRun {
        groups,
        parallel: request
            .parallel
            .or(definition.config.parallel)
            .unwrap_or(false),
    })
}

fn requested_names(definition: &Definition, request: &RunRequest) -> Result<Vec<String>> {
    if !request.commands.is_empty() {
        return Ok(request.commands.clone());
    }
    match &definition.default_group {
        Some(name) => Ok(vec![name.clone()]),
        None => Err(Error::config(
            "no commands supplied and default command not set",
        )),
    }
}

fn group_defaults(definition: &Definition) -> GroupDefaults {
    let mut defaults = GroupDefaults::default();
    if let Some(interpreter) = &definition.config.interpreter {
        defaults.interpreter = interpreter.clone();
    }
    if let Some(script_mode) = definition.config.script_mode {
        defaults.script_mode = script_mode;
    }
    defaults
}

/// Resolve and run the request, turning non-zero codes into
/// [`Error::RunFailure`].
#[instrument(skip_all, fields(path = %file.path.display()))]
pub async fn run_definition<R: CommandRunner>(
    file: &DefinitionFile,
    request: &RunRequest,
    runner: &R,
    sink: &dyn EventSink,
) -> Result<RunVerdict> {
    let resolved = resolve_run(file, request)?;
    let scheduler = Scheduler::new(runner, sink);
    let verdict = scheduler.run(&resolved.groups, resolved.parallel).await?;
    match verdict.first_failure() {
        None => Ok(verdict),
        Some(exit_code) => Err(Error::RunFailure {
            message: verdict.summary(),
            codes: verdict.codes(),
            exit_code,
        }),
    }
}

/// Validate the definition without running anything.
pub fn check_definition(file: &DefinitionFile) {
    info!(
        path = %file.path.display(),
        groups = %file.definition.group_names().join(", "),
        "definition file is valid"
    );
}

/// Entry point used by the CLI.
///
/// Locates and validates the definition file, then runs the requested groups
/// on a single-threaded runtime. A request containing [`CHECK_COMMAND`] only
/// validates.
pub fn execute(options: &ExecuteOptions, cwd: &Path) -> Result<RunVerdict> {
    let file = resolve_definition(options.definition_file.as_deref(), cwd)?;
    if options
        .request
        .commands
        .iter()
        .any(|command| command == CHECK_COMMAND)
    {
        check_definition(&file);
        return Ok(RunVerdict::default());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build async runtime")?;
    let sink = TracingSink;
    let runner = ShellRunner::new(&sink);
    runtime.block_on(run_definition(&file, &options.request, &runner, &sink))
}
