//! Like make, but for the 21st century.
//!
//! donkey reads a YAML definition of named command groups and runs the
//! requested groups as shell processes, sequentially or in parallel, with
//! their interleaved output attributed to the unit that produced it. The
//! architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (definition validation, plans,
//!   display tokens, verdicts). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (definition files, child processes,
//!   event sinks). Isolated behind traits so tests can script them.
//!
//! Execution modules ([`group`], [`scheduler`], [`orchestrator`]) coordinate
//! core logic with I/O to implement a run.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod group;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{Error, Result};
