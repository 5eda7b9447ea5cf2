//! Terminal helpers shared by the CLI and the fitting progress bar

pub mod progress;
pub mod styling;

pub use progress::*;
pub use styling::*;
