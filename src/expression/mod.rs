//! Expression tree, scalar and aggregate functions, and window machinery.

pub mod aggregate;
pub mod expression;
pub mod function;
pub mod window;

pub use aggregate::{Accumulator, AggregateFunction, NamedAggregator};
pub use expression::{
    Expression, FunctionExpression, NamedExpression, ReferenceExpression, SortOption,
    WindowExpression,
};
pub use function::{FunctionRegistry, ScalarFunction};
pub use window::{
    CurrentRowWindowFrame, RankingFunction, WindowDefinition, resolve_window_function,
};
