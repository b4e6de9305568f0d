//! Logical planning: the plan tree, the rule-based optimizer, and the
//! compiler from logical plans to physical operators.

pub mod logical_plan;
pub mod optimizer;
pub mod physical_planner;

pub use logical_plan::{
    Aggregation, Column, CommandType, Dedupe, Eval, Filter, Limit, LogicalPlan, Project, RareTopN,
    Relation, Remove, Rename, Sort, SortKey, Values, Window, DEFAULT_RARE_TOP_N,
};
pub use optimizer::{LogicalOptimizer, RewriteOutcome, RewriteRule};
pub use physical_planner::PhysicalPlanner;
