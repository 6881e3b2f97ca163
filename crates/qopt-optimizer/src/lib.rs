//! # qopt-optimizer
//!
//! Parameter space model for tuning ranking-query parameters.
//!
//! Parses declarative search space configurations into typed dimensions,
//! selects between grid and bayesian search, merges partial parameter sets
//! into complete ones, and drives trials against a caller-supplied evaluator.

mod config;
mod dimension;
mod driver;
mod merge;
mod search;
mod space;
mod trial;

pub use config::Config;
pub use dimension::{Categories, Dimension, DimensionKind, Encoding, DEFAULT_BASE, DEFAULT_DISTRIBUTION};
pub use driver::{optimize_config, optimize_space, ConfigOutcome, Evaluator, SpaceOutcome};
pub use merge::{merge_param_train, merge_param_values};
pub use search::{build_strategy, BayesianSearch, GridSearch, Proposal, SearchStrategy, LOG_UNIFORM};
pub use space::{Method, ParameterSpace, SearchMethod, DEFAULT_NUM_ITERATIONS};
pub use trial::{
    ObjectiveDirection, OptimizationRun, OptimizationSettings, RunId, RunState, Trial, TrialStatus,
};
