//! Deterministic, pure logic shared by the autopilot core.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod document;
pub mod mode;
pub mod router;
pub mod scorer;
pub mod selector;
pub mod subdivider;
pub mod types;
