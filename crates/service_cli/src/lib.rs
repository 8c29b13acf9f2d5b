//! Exposure CLI library: run configuration, pipeline and CSV reports.
//!
//! The `exposure` binary is a thin clap wrapper over [`commands`]; the
//! pipeline itself is [`commands::run::execute`], usable without touching
//! the filesystem.

pub mod commands;
pub mod config;
pub mod error;
pub mod report;

pub use config::RunConfig;
pub use error::{CliError, Result};
