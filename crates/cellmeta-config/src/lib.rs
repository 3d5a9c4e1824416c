//! Configuration for the cellmeta services.
//!
//! Settings persist to disk as `config.ron`, can be overridden from the
//! command line via clap, and tolerate missing or unknown fields so older and
//! newer files keep loading.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, ReconcilerConfig, SchedulerConfig, SchedulerMode, default_config_dir,
};
pub use error::ConfigError;
