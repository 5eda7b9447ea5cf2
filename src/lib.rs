//! binphi: optimal binning library
//!
//! Partitions every variable of a dataset into bins that best separate a
//! shared target, under size, count and monotonicity constraints, and
//! encodes new data with the fitted bins.

pub mod cli;
pub mod pipeline;
pub mod report;
pub mod utils;
