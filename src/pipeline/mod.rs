//! Pipeline module - data model, solvers and the binning process

pub mod binner;
pub mod categorical;
pub mod config;
pub mod dataset;
pub mod encoding;
pub mod error;
pub mod loader;
pub mod process;
pub mod quality;
pub mod solver;
pub mod stats;
pub mod target;
pub mod transform;

pub use binner::{fit_variable, BinLocation, BinLocator, BinSet, FitContext, UnseenRoute, VariableFitResult};
pub use categorical::{solve_categorical, CategoricalSolution, LevelGroup};
pub use config::*;
pub use dataset::{ColumnValues, Dataset, VariableDtype, VariableSpec};
pub use encoding::*;
pub use error::{BinningError, Result};
pub use loader::*;
pub use process::{BinningProcess, FittedProcess, ProcessState};
pub use quality::*;
pub use solver::{solve_numerical, FitStatus, MonotonicTrend, NumericalSolution};
pub use stats::*;
pub use target::*;
pub use transform::*;
