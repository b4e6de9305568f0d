//! Value and type model

pub mod types;
pub mod value;

pub use types::ExprType;
pub use value::ExprValue;
