//! Error handling for PipeQuery

use thiserror::Error;

/// Main error type for PipeQuery operations.
///
/// Compile-time failures (`PlanCompile`, `FieldNotFound`, `Unsupported` and
/// most `TypeMismatch` cases) are raised before any row is produced; only
/// genuinely data-dependent failures surface as `Evaluation` errors during
/// iteration.
#[derive(Error, Debug)]
pub enum PipeQueryError {
    #[error("Plan compile error: {0}")]
    PlanCompile(String),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PipeQueryError>;

/// Result type alias for PipeQuery operations (alias for Result)
pub type PipeQueryResult<T> = std::result::Result<T, PipeQueryError>;

/// Macro for creating plan compile errors
#[macro_export]
macro_rules! compile_err {
    ($msg:expr) => {
        $crate::common::error::PipeQueryError::PlanCompile($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::common::error::PipeQueryError::PlanCompile(format!($fmt, $($arg)*))
    };
}

/// Macro for creating evaluation errors
#[macro_export]
macro_rules! eval_err {
    ($msg:expr) => {
        $crate::common::error::PipeQueryError::Evaluation($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::common::error::PipeQueryError::Evaluation(format!($fmt, $($arg)*))
    };
}
