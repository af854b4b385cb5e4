use thiserror::Error;

/// Errors a verification strategy may return.
///
/// The check template never propagates these; each one becomes an
/// error-severity finding.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// The rule definition lacks a field the strategy needs.
    #[error("invalid rule definition: {0}")]
    InvalidRule(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("strategy failed: {0}")]
    Failed(String),
}

pub type StrategyResult<T> = Result<T, StrategyError>;
