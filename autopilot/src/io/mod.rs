//! Side-effecting adapters: filesystem state, processes, git, time, notifications.

pub mod activity_log;
pub mod clock;
pub mod config;
pub mod git;
pub mod init;
pub mod notifier;
pub mod process;
pub mod roadmap_store;
pub mod session;
