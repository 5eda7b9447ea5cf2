//! CLI module - argument parsing and subcommands

pub mod apply;
pub mod args;
pub mod fit;

pub use apply::run_transform;
pub use args::{Cli, Commands, FitArgs, TransformArgs};
pub use fit::{build_config, run_fit};
