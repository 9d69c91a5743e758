//! `${var}` substitution and tabular dataset iteration
//!
//! Step values may reference variables (`${amount}`, `${stage|Prospecting}`,
//! `${@env:API_USER}`). Resolution happens at plan compilation; an
//! unresolved variable fails the compile, never the run.

pub mod compile;
pub mod dataset;
pub mod render;

pub use compile::compile_plan;
pub use dataset::Dataset;
pub use render::{render, VarContext};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unresolved variable `{0}`")]
    Unresolved(String),

    #[error("environment variable `{0}` is not set")]
    MissingEnv(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("intent {index}: action `{action}` requires a value")]
    MissingValue { index: usize, action: String },
}
