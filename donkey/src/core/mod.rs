//! Deterministic, pure logic shared by the donkey core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod definition;
pub mod plan;
pub mod token;
pub mod types;
pub mod verdict;
