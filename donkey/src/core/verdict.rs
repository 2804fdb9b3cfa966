//! Aggregated outcome of one invocation.

use crate::core::types::GroupResult;

/// Every executed group's result, in command-line order.
///
/// Groups skipped after a sequential failure are absent, never zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunVerdict {
    pub groups: Vec<GroupResult>,
}

impl RunVerdict {
    pub fn new(groups: Vec<GroupResult>) -> Self {
        Self { groups }
    }

    /// Flattened exit codes in group order.
    pub fn codes(&self) -> Vec<i32> {
        self.groups.iter().flat_map(GroupResult::codes).collect()
    }

    pub fn success(&self) -> bool {
        self.groups.iter().all(GroupResult::success)
    }

    /// First non-zero code in group order; the suggested process exit status.
    pub fn first_failure(&self) -> Option<i32> {
        self.groups
            .iter()
            .flat_map(GroupResult::codes)
            .find(|code| *code != 0)
    }

    /// Human summary listing every code, sorted.
    pub fn summary(&self) -> String {
        let mut codes = self.codes();
        codes.sort_unstable();
        let codes: Vec<String> = codes.iter().map(i32::to_string).collect();
        format!("commands failed, return codes: {}", codes.join(", "))
    }
}
