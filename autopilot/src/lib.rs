//! Unattended roadmap execution loop.
//!
//! Autopilot mines a human-edited Markdown roadmap for open checklist items,
//! ranks them, executes one at a time through category handlers, and records
//! progress locally. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (document model, scoring,
//!   subdivision, routing, mode decisions). No I/O.
//! - **[`io`]**: Side-effecting adapters (roadmap file, telemetry, processes,
//!   git, clock, notifier). Isolated behind traits where tests need doubles.
//! - **[`handlers`]**: One action per routing category.
//!
//! [`scheduler`] drives the loop; [`plan`] and [`commit`] support it.

pub mod commit;
pub mod core;
pub mod exit_codes;
pub mod handlers;
pub mod io;
pub mod logging;
pub mod plan;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
