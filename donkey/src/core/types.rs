//! Result types shared by the executor, scheduler and verdict.

use std::time::Duration;

/// Outcome of one child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Outcome of one group.
///
/// `results` holds only the commands that were actually attempted: declaration
/// order for a sequential group, launch order for a parallel one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupResult {
    /// Bare group name. Fanned-out commands are labelled `"<group>: <command>"`
    /// only in their run events, never here.
    pub name: String,
    pub results: Vec<CommandResult>,
}

impl GroupResult {
    pub fn codes(&self) -> impl Iterator<Item = i32> + '_ {
        self.results.iter().map(|result| result.exit_code)
    }

    pub fn success(&self) -> bool {
        self.results.iter().all(CommandResult::success)
    }
}
