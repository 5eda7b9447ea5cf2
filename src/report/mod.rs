//! Report module - summaries, binning tables and JSON export

pub mod binning_table;
pub mod export;
pub mod information;
pub mod summary;

pub use binning_table::*;
pub use export::*;
pub use information::*;
pub use summary::*;
