use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::config::ConfigError;
use crate::generation::GenerationError;
use crate::input::InputError;

/// Top-level error for one optimizer invocation. Each variant keeps the
/// layer's own error as its source.
#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("configuration error")]
    Config(#[from] ConfigError),

    #[error("input error")]
    Input(#[from] InputError),

    #[error("analysis error")]
    Analysis(#[from] AnalysisError),

    #[error("document generation error")]
    Generation(#[from] GenerationError),
}
