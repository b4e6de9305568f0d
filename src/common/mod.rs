//! Common utilities and error types

pub mod error;

pub use error::{PipeQueryError, PipeQueryResult, Result};
