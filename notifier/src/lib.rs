//! Nomad Deploy Notifier Library
//!
//! Keeps one Slack message per Nomad deployment up to date with the
//! deployment's progress.

pub mod app;
pub mod errors;
pub mod logs;
pub mod nomad;
pub mod notify;
pub mod server;
pub mod settings;
pub mod slack;
pub mod utils;
pub mod workers;
