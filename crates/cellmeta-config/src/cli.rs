//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, SchedulerMode};

/// Command-line arguments shared by cellmeta binaries.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "cellmeta", about = "Per-cell metadata service")]
pub struct CliArgs {
    /// Scheduler mode (global, region).
    #[arg(long)]
    pub scheduler: Option<SchedulerMode>,

    /// Additional tenant namespace to reconcile; may be repeated.
    #[arg(long = "register")]
    pub register: Vec<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(mode) = args.scheduler {
            self.scheduler.mode = mode;
        }
        for namespace in &args.register {
            if !self.reconciler.auto_register.contains(namespace) {
                self.reconciler.auto_register.push(namespace.clone());
            }
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
