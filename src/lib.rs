//! PipeQuery - Pipeline Query Processing Core
//!
//! PipeQuery turns a logical query plan into rows: plans are rewritten by a
//! rule-based optimizer that merges work into capable storage, compiled
//! into a tree of pull-iterator operators, and executed over tuples whose
//! fields distinguish NULL from MISSING.

pub mod common;
pub mod data;
pub mod executor;
pub mod expression;
pub mod planner;
pub mod storage;

// Re-export common types for convenience
pub use common::{PipeQueryError, PipeQueryResult, Result};

// Re-export the value model for convenience
pub use data::{ExprType, ExprValue};

// Re-export the expression system for convenience
pub use expression::{
    AggregateFunction, Expression, FunctionRegistry, NamedAggregator, NamedExpression, SortOption,
    WindowDefinition,
};

// Re-export planning and execution entry points for convenience
pub use executor::{execute, PhysicalOperator};
pub use planner::{LogicalOptimizer, LogicalPlan, PhysicalPlanner};
pub use storage::{BindingTuple, Capability, InMemoryTable, Pushdown, Table};

/// Optimize, compile, and run a logical plan to completion
pub fn run(plan: LogicalPlan) -> PipeQueryResult<Vec<ExprValue>> {
    let optimized = LogicalOptimizer::new().optimize(plan)?;
    let mut operator = PhysicalPlanner::new().compile(&optimized)?;
    execute(operator.as_mut())
}
