//! Running an ordered list of groups, sequentially or concurrently.

use futures::future::join_all;
use tracing::{debug, instrument};

use crate::core::token::TokenRotation;
use crate::core::verdict::RunVerdict;
use crate::error::Result;
use crate::group::{GroupExecutor, UnitContext};
use crate::io::events::EventSink;
use crate::io::shell::CommandRunner;

/// Drives groups and owns the display token rotation for its runs.
pub struct Scheduler<'a, R> {
    runner: &'a R,
    sink: &'a dyn EventSink,
    tokens: TokenRotation,
}

impl<'a, R: CommandRunner> Scheduler<'a, R> {
    pub fn new(runner: &'a R, sink: &'a dyn EventSink) -> Self {
        Self {
            runner,
            sink,
            tokens: TokenRotation::new(),
        }
    }

    /// Run `groups` and flatten their results in declaration order.
    ///
    /// Parallel: every group runs to completion regardless of failures.
    /// Sequential: stops after the first group with a non-zero code; later
    /// groups are absent from the verdict.
    #[instrument(skip_all, fields(groups = groups.len(), parallel))]
    pub async fn run(&self, groups: &[GroupExecutor], parallel: bool) -> Result<RunVerdict> {
        self.tokens.reset();
        let units: usize = groups.iter().map(GroupExecutor::unit_count).sum();
        let ctx = UnitContext {
            runner: self.runner,
            sink: self.sink,
            tokens: &self.tokens,
            tracking: units > 1,
        };

        let mut results = Vec::with_capacity(groups.len());
        if parallel {
            for outcome in join_all(groups.iter().map(|group| group.execute(&ctx))).await {
                results.push(outcome?);
            }
        } else {
            for group in groups {
                let result = group.execute(&ctx).await?;
                let failed = !result.success();
                results.push(result);
                if failed {
                    debug!(group = group.name(), "group failed, skipping remaining groups");
                    break;
                }
            }
        }
        Ok(RunVerdict::new(results))
    }
}
