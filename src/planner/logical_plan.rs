//! Logical plan tree.
//!
//! Each operator is a struct wrapped by the `LogicalPlan` enum, so the
//! optimizer and the physical planner both dispatch by exhaustive match.
//! Plans compare structurally; a relation compares by table name and its
//! accumulated pushdown, not by table identity.

use crate::data::value::ExprValue;
use crate::expression::aggregate::NamedAggregator;
use crate::expression::expression::{Expression, NamedExpression, SortOption};
use crate::expression::window::WindowDefinition;
use crate::storage::table::{Pushdown, Table};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    Relation(Relation),
    Filter(Filter),
    Project(Project),
    Remove(Remove),
    Rename(Rename),
    Eval(Eval),
    Aggregation(Aggregation),
    Window(Window),
    RareTopN(RareTopN),
    Dedupe(Dedupe),
    Sort(Sort),
    Limit(Limit),
    Values(Values),
}

impl LogicalPlan {
    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::Relation(_) | LogicalPlan::Values(_) => vec![],
            LogicalPlan::Filter(node) => vec![&node.child],
            LogicalPlan::Project(node) => vec![&node.child],
            LogicalPlan::Remove(node) => vec![&node.child],
            LogicalPlan::Rename(node) => vec![&node.child],
            LogicalPlan::Eval(node) => vec![&node.child],
            LogicalPlan::Aggregation(node) => vec![&node.child],
            LogicalPlan::Window(node) => vec![&node.child],
            LogicalPlan::RareTopN(node) => vec![&node.child],
            LogicalPlan::Dedupe(node) => vec![&node.child],
            LogicalPlan::Sort(node) => vec![&node.child],
            LogicalPlan::Limit(node) => vec![&node.child],
        }
    }

    /// Field names this operator emits, in output order
    pub fn output_fields(&self) -> Vec<String> {
        match self {
            LogicalPlan::Relation(node) => node.output_fields(),
            LogicalPlan::Filter(node) => node.child.output_fields(),
            LogicalPlan::Project(node) => node
                .projections
                .iter()
                .map(|p| p.name_or_alias().to_string())
                .collect(),
            LogicalPlan::Remove(node) => node
                .child
                .output_fields()
                .into_iter()
                .filter(|field| !node.fields.contains(field))
                .collect(),
            LogicalPlan::Rename(node) => node
                .child
                .output_fields()
                .into_iter()
                .map(|field| {
                    node.mappings
                        .iter()
                        .find(|(source, _)| *source == field)
                        .map(|(_, target)| target.clone())
                        .unwrap_or(field)
                })
                .collect(),
            LogicalPlan::Eval(node) => {
                let mut fields = node.child.output_fields();
                for expr in &node.expressions {
                    let name = expr.name_or_alias().to_string();
                    if !fields.contains(&name) {
                        fields.push(name);
                    }
                }
                fields
            }
            LogicalPlan::Aggregation(node) => node
                .aggregators
                .iter()
                .map(|agg| agg.name.clone())
                .chain(node.group_by.iter().map(|g| g.name_or_alias().to_string()))
                .collect(),
            LogicalPlan::Window(node) => {
                let mut fields = node.child.output_fields();
                if !fields.contains(&node.output_name) {
                    fields.push(node.output_name.clone());
                }
                fields
            }
            LogicalPlan::RareTopN(node) => node
                .group_by
                .iter()
                .map(|g| g.name_or_alias().to_string())
                .chain(node.fields.iter().map(|f| f.name_or_alias().to_string()))
                .collect(),
            LogicalPlan::Dedupe(node) => node.child.output_fields(),
            LogicalPlan::Sort(node) => node.child.output_fields(),
            LogicalPlan::Limit(node) => node.child.output_fields(),
            LogicalPlan::Values(node) => node.field_names.clone(),
        }
    }
}

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalPlan::Relation(node) => write!(f, "Relation[{}]", node.table_name),
            LogicalPlan::Filter(node) => write!(f, "Filter[{}]", node.condition),
            LogicalPlan::Project(_) => f.write_str("Project"),
            LogicalPlan::Remove(_) => f.write_str("Remove"),
            LogicalPlan::Rename(_) => f.write_str("Rename"),
            LogicalPlan::Eval(_) => f.write_str("Eval"),
            LogicalPlan::Aggregation(_) => f.write_str("Aggregation"),
            LogicalPlan::Window(node) => write!(f, "Window[{}]", node.function_name),
            LogicalPlan::RareTopN(node) => write!(f, "RareTopN[{:?}, {}]", node.command, node.n),
            LogicalPlan::Dedupe(_) => f.write_str("Dedupe"),
            LogicalPlan::Sort(_) => f.write_str("Sort"),
            LogicalPlan::Limit(node) => write!(f, "Limit[{}, {}]", node.limit, node.offset),
            LogicalPlan::Values(_) => f.write_str("Values"),
        }
    }
}

/// Column of a relation schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub expr_type: crate::data::types::ExprType,
}

impl Column {
    pub fn new(name: impl Into<String>, expr_type: crate::data::types::ExprType) -> Self {
        Self {
            name: name.into(),
            expr_type,
        }
    }
}

/// One sort requirement: expression plus direction and null placement
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub expr: Expression,
    pub option: SortOption,
}

impl SortKey {
    pub fn new(expr: Expression, option: SortOption) -> Self {
        Self { expr, option }
    }
}

/// Scan of a named table, carrying the operations merged into it by the
/// optimizer
#[derive(Debug, Clone)]
pub struct Relation {
    pub table_name: String,
    pub table: Arc<dyn Table>,
    pub pushdown: Pushdown,
}

impl Relation {
    pub fn new(table_name: impl Into<String>, table: Arc<dyn Table>) -> LogicalPlan {
        LogicalPlan::Relation(Self {
            table_name: table_name.into(),
            table,
            pushdown: Pushdown::default(),
        })
    }

    pub fn output_fields(&self) -> Vec<String> {
        if let Some((aggregators, group_by)) = &self.pushdown.aggregation {
            return aggregators
                .iter()
                .map(|agg| agg.name.clone())
                .chain(group_by.iter().map(|g| g.name_or_alias().to_string()))
                .collect();
        }
        if let Some(projections) = &self.pushdown.projections {
            return projections.clone();
        }
        self.table
            .schema()
            .into_iter()
            .map(|column| column.name)
            .collect()
    }
}

impl PartialEq for Relation {
    fn eq(&self, other: &Self) -> bool {
        self.table_name == other.table_name && self.pushdown == other.pushdown
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub child: Box<LogicalPlan>,
    pub condition: Expression,
}

impl Filter {
    pub fn new(child: LogicalPlan, condition: Expression) -> LogicalPlan {
        LogicalPlan::Filter(Self {
            child: Box::new(child),
            condition,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub child: Box<LogicalPlan>,
    pub projections: Vec<NamedExpression>,
}

impl Project {
    pub fn new(child: LogicalPlan, projections: Vec<NamedExpression>) -> LogicalPlan {
        LogicalPlan::Project(Self {
            child: Box::new(child),
            projections,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Remove {
    pub child: Box<LogicalPlan>,
    pub fields: Vec<String>,
}

impl Remove {
    pub fn new(child: LogicalPlan, fields: Vec<String>) -> LogicalPlan {
        LogicalPlan::Remove(Self {
            child: Box::new(child),
            fields,
        })
    }
}

/// Field renames as (source, target) pairs
#[derive(Debug, Clone, PartialEq)]
pub struct Rename {
    pub child: Box<LogicalPlan>,
    pub mappings: Vec<(String, String)>,
}

impl Rename {
    pub fn new(child: LogicalPlan, mappings: Vec<(String, String)>) -> LogicalPlan {
        LogicalPlan::Rename(Self {
            child: Box::new(child),
            mappings,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Eval {
    pub child: Box<LogicalPlan>,
    pub expressions: Vec<NamedExpression>,
}

impl Eval {
    pub fn new(child: LogicalPlan, expressions: Vec<NamedExpression>) -> LogicalPlan {
        LogicalPlan::Eval(Self {
            child: Box::new(child),
            expressions,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub child: Box<LogicalPlan>,
    pub aggregators: Vec<NamedAggregator>,
    pub group_by: Vec<NamedExpression>,
}

impl Aggregation {
    pub fn new(
        child: LogicalPlan,
        aggregators: Vec<NamedAggregator>,
        group_by: Vec<NamedExpression>,
    ) -> LogicalPlan {
        LogicalPlan::Aggregation(Self {
            child: Box::new(child),
            aggregators,
            group_by,
        })
    }
}

/// Window function application producing one extra named column
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub child: Box<LogicalPlan>,
    pub output_name: String,
    pub function_name: String,
    pub definition: WindowDefinition,
}

impl Window {
    pub fn new(
        child: LogicalPlan,
        output_name: impl Into<String>,
        function_name: impl Into<String>,
        definition: WindowDefinition,
    ) -> LogicalPlan {
        LogicalPlan::Window(Self {
            child: Box::new(child),
            output_name: output_name.into(),
            function_name: function_name.into(),
            definition,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Rare,
    Top,
}

pub const DEFAULT_RARE_TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct RareTopN {
    pub child: Box<LogicalPlan>,
    pub command: CommandType,
    pub n: usize,
    pub fields: Vec<NamedExpression>,
    pub group_by: Vec<NamedExpression>,
}

impl RareTopN {
    /// Top-N with the default of ten values per group
    pub fn top(
        child: LogicalPlan,
        fields: Vec<NamedExpression>,
        group_by: Vec<NamedExpression>,
    ) -> LogicalPlan {
        Self::new(child, CommandType::Top, DEFAULT_RARE_TOP_N, fields, group_by)
    }

    /// Rare-N with the default of ten values per group
    pub fn rare(
        child: LogicalPlan,
        fields: Vec<NamedExpression>,
        group_by: Vec<NamedExpression>,
    ) -> LogicalPlan {
        Self::new(child, CommandType::Rare, DEFAULT_RARE_TOP_N, fields, group_by)
    }

    pub fn new(
        child: LogicalPlan,
        command: CommandType,
        n: usize,
        fields: Vec<NamedExpression>,
        group_by: Vec<NamedExpression>,
    ) -> LogicalPlan {
        LogicalPlan::RareTopN(Self {
            child: Box::new(child),
            command,
            n,
            fields,
            group_by,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dedupe {
    pub child: Box<LogicalPlan>,
    pub fields: Vec<Expression>,
    pub allowed_duplication: usize,
    pub keep_empty: bool,
    pub consecutive: bool,
}

impl Dedupe {
    pub fn new(child: LogicalPlan, fields: Vec<Expression>) -> LogicalPlan {
        Self::with_options(child, fields, 1, false, false)
    }

    pub fn with_options(
        child: LogicalPlan,
        fields: Vec<Expression>,
        allowed_duplication: usize,
        keep_empty: bool,
        consecutive: bool,
    ) -> LogicalPlan {
        LogicalPlan::Dedupe(Self {
            child: Box::new(child),
            fields,
            allowed_duplication,
            keep_empty,
            consecutive,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub child: Box<LogicalPlan>,
    pub sort_list: Vec<SortKey>,
}

impl Sort {
    pub fn new(child: LogicalPlan, sort_list: Vec<SortKey>) -> LogicalPlan {
        LogicalPlan::Sort(Self {
            child: Box::new(child),
            sort_list,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub child: Box<LogicalPlan>,
    pub limit: usize,
    pub offset: usize,
}

impl Limit {
    pub fn new(child: LogicalPlan, limit: usize, offset: usize) -> LogicalPlan {
        LogicalPlan::Limit(Self {
            child: Box::new(child),
            limit,
            offset,
        })
    }
}

/// Leaf of literal rows; never takes a child
#[derive(Debug, Clone, PartialEq)]
pub struct Values {
    pub field_names: Vec<String>,
    pub rows: Vec<Vec<ExprValue>>,
}

impl Values {
    pub fn new(field_names: Vec<String>, rows: Vec<Vec<ExprValue>>) -> LogicalPlan {
        LogicalPlan::Values(Self { field_names, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::ExprType;
    use crate::expression::expression::ReferenceExpression;
    use crate::storage::table::InMemoryTable;

    fn reference(name: &str) -> Expression {
        Expression::Reference(ReferenceExpression::new(name, ExprType::Integer))
    }

    fn table() -> Arc<dyn Table> {
        Arc::new(InMemoryTable::new(
            vec![
                Column::new("a", ExprType::Integer),
                Column::new("b", ExprType::Integer),
            ],
            vec![],
        ))
    }

    #[test]
    fn test_structural_equality() {
        let left = Filter::new(Relation::new("t", table()), reference("a"));
        let right = Filter::new(Relation::new("t", table()), reference("a"));
        assert_eq!(left, right);
        let other = Filter::new(Relation::new("t", table()), reference("b"));
        assert_ne!(left, other);
    }

    #[test]
    fn test_output_fields_through_rename_and_remove() {
        let plan = Remove::new(
            Rename::new(
                Relation::new("t", table()),
                vec![("a".to_string(), "x".to_string())],
            ),
            vec!["b".to_string()],
        );
        assert_eq!(plan.output_fields(), vec!["x".to_string()]);
    }

    #[test]
    fn test_eval_appends_new_fields_only() {
        let plan = Eval::new(
            Relation::new("t", table()),
            vec![
                NamedExpression::new("a", reference("a")),
                NamedExpression::new("c", reference("b")),
            ],
        );
        assert_eq!(
            plan.output_fields(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
