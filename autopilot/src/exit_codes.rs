//! Stable exit codes for autopilot CLI commands.

/// Command succeeded (or the loop stopped on request).
pub const OK: i32 = 0;
/// Invalid config, unreadable roadmap, or any other fatal error.
pub const INVALID: i32 = 1;
/// `autopilot plan` found nothing actionable.
pub const IDLE: i32 = 2;
