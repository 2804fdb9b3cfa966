//! Execution of one named group.

use std::time::{Duration, Instant};

use anyhow::Context;
use futures::future::join_all;
use tracing::{debug, instrument};

use crate::core::definition::{GroupDefinition, Settings};
use crate::core::plan::{DEFAULT_INTERPRETER, ExecutionPlan, ShellCommand};
use crate::core::token::{DisplayToken, TokenRotation};
use crate::core::types::{CommandResult, GroupResult};
use crate::error::{Error, Result};
use crate::io::events::{EventSink, RunEvent};
use crate::io::shell::{CommandRequest, CommandRunner};

/// Pause after a unit finishes, before its completion line is logged.
///
/// Gives late output lines of concurrent units a chance to land before the
/// completion line. Ordering never depends on it.
pub const OUTPUT_SETTLE_DELAY: Duration = Duration::from_millis(20);

/// Options a group inherits when it does not set them itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDefaults {
    pub interpreter: String,
    pub script_mode: bool,
}

impl Default for GroupDefaults {
    fn default() -> Self {
        Self {
            interpreter: DEFAULT_INTERPRETER.to_string(),
            script_mode: false,
        }
    }
}

/// Everything a group needs from the scheduler to run.
pub struct UnitContext<'a, R> {
    pub runner: &'a R,
    pub sink: &'a dyn EventSink,
    pub tokens: &'a TokenRotation,
    /// Hand out display tokens; false when the whole run is a single unit.
    pub tracking: bool,
}

impl<R> UnitContext<'_, R> {
    fn acquire_token(&self) -> Option<DisplayToken> {
        self.tracking.then(|| self.tokens.next_token())
    }
}

/// A group turned into an [`ExecutionPlan`], ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupExecutor {
    name: String,
    plan: ExecutionPlan,
    settings: Settings,
    parallel: bool,
}

impl GroupExecutor {
    /// Build the executor for `group`.
    ///
    /// `settings` is the already merged environment for the group. Fails with a
    /// configuration error when extra arguments meet script mode.
    pub fn new(
        group: &GroupDefinition,
        args: Option<&str>,
        settings: Settings,
        defaults: &GroupDefaults,
    ) -> Result<Self> {
        let interpreter = group
            .interpreter
            .as_deref()
            .unwrap_or(&defaults.interpreter);
        let script_mode = group.script_mode.unwrap_or(defaults.script_mode);
        let plan = ExecutionPlan::build(&group.run, args, interpreter, script_mode)
            .map_err(|err| Error::config(format!("{}: {err}", group.name)))?;

        Ok(Self {
            name: group.name.clone(),
            plan,
            settings,
            parallel: group.parallel.unwrap_or(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &[ShellCommand] {
        &self.plan.commands
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Number of child processes this group will spawn at most.
    pub fn command_count(&self) -> usize {
        self.plan.len()
    }

    /// Number of independently logged units: one per command when the group
    /// fans out, otherwise the whole group.
    pub fn unit_count(&self) -> usize {
        if self.fans_out() { self.plan.len() } else { 1 }
    }

    fn fans_out(&self) -> bool {
        self.parallel && self.plan.len() > 1
    }

    /// Run the group.
    ///
    /// Sequential groups stop at the first non-zero exit code. Parallel groups
    /// launch every command and wait for all of them.
    #[instrument(skip_all, fields(group = %self.name, parallel = self.parallel))]
    pub async fn execute<R: CommandRunner>(&self, ctx: &UnitContext<'_, R>) -> Result<GroupResult> {
        let results = if self.fans_out() {
            let units = self.plan.commands.iter().map(|command| {
                let display_name = format!("{}: {}", self.name, command.body);
                self.run_unit(ctx, display_name, std::slice::from_ref(command))
            });
            let mut results = Vec::with_capacity(self.plan.len());
            for outcome in join_all(units).await {
                results.extend(outcome?);
            }
            results
        } else {
            self.run_unit(ctx, self.name.clone(), &self.plan.commands)
                .await?
        };

        Ok(GroupResult {
            name: self.name.clone(),
            results,
        })
    }

    async fn run_unit<R: CommandRunner>(
        &self,
        ctx: &UnitContext<'_, R>,
        display_name: String,
        commands: &[ShellCommand],
    ) -> Result<Vec<CommandResult>> {
        let token = ctx.acquire_token();
        ctx.sink.emit(RunEvent::Started {
            display_name: display_name.clone(),
            token,
        });

        let start = Instant::now();
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            let started = Instant::now();
            let exit_code = ctx
                .runner
                .run(CommandRequest {
                    command,
                    env: &self.settings,
                    token,
                })
                .await
                .with_context(|| format!("run \"{display_name}\""))?;
            results.push(CommandResult {
                exit_code,
                duration: started.elapsed(),
            });
            if exit_code != 0 {
                debug!(exit_code, "command failed, skipping the rest of the unit");
                break;
            }
        }
        let duration = start.elapsed();

        tokio::time::sleep(OUTPUT_SETTLE_DELAY).await;
        ctx.sink.emit(RunEvent::Finished {
            display_name,
            token,
            duration,
            codes: results.iter().map(|result| result.exit_code).collect(),
        });
        Ok(results)
    }
}
