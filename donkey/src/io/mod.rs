//! I/O helpers for donkey: definition files, child processes, event sinks.

pub mod definition_file;
pub mod events;
pub mod shell;
