//! Stable exit codes for the donkey CLI.
//!
//! A run failure exits with the first non-zero code of the failed commands
//! instead of a fixed value.

/// Every requested command succeeded (or `check` passed).
pub const OK: i32 = 0;
/// Unexpected failure, e.g. the interpreter could not be spawned.
pub const FATAL: i32 = 1;
/// Invalid definition file, unknown group, or invalid option combination.
pub const CONFIG: i32 = 2;
