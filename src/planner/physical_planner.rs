//! Compiles a logical plan into a physical operator tree.
//!
//! Compilation validates every field reference against the fields the
//! child operator emits, so a reference to a field that cannot exist fails
//! here instead of producing MISSING at runtime. Compilation is pure: the
//! same plan always compiles to an operator tree with the same behavior.

use crate::common::error::{PipeQueryError, PipeQueryResult};
use crate::executor::operators::{
    AggregationOperator, DedupeOperator, EvalOperator, FilterOperator, LimitOperator,
    ProjectOperator, RareTopNOperator, RemoveOperator, RenameOperator, SortOperator,
    ValuesOperator, WindowOperator,
};
use crate::executor::PhysicalOperator;
use crate::expression::expression::Expression;
use crate::expression::window::{resolve_window_function, CurrentRowWindowFrame};
use crate::planner::logical_plan::{LogicalPlan, SortKey};

pub struct PhysicalPlanner;

impl PhysicalPlanner {
    pub fn new() -> Self {
        Self
    }

    pub fn compile(&self, plan: &LogicalPlan) -> PipeQueryResult<Box<dyn PhysicalOperator>> {
        match plan {
            LogicalPlan::Relation(node) => node.table.scan(&node.pushdown),
            LogicalPlan::Values(node) => {
                for row in &node.rows {
                    if row.len() != node.field_names.len() {
                        return Err(PipeQueryError::PlanCompile(format!(
                            "Values row has {} values for {} fields",
                            row.len(),
                            node.field_names.len()
                        )));
                    }
                }
                Ok(Box::new(ValuesOperator::new(
                    node.field_names.clone(),
                    node.rows.clone(),
                )))
            }
            LogicalPlan::Filter(node) => {
                let fields = node.child.output_fields();
                validate_expression(&node.condition, &fields)?;
                Ok(Box::new(FilterOperator::new(
                    self.compile(&node.child)?,
                    node.condition.clone(),
                )))
            }
            LogicalPlan::Project(node) => {
                let fields = node.child.output_fields();
                for projection in &node.projections {
                    validate_expression(&projection.delegate, &fields)?;
                }
                Ok(Box::new(ProjectOperator::new(
                    self.compile(&node.child)?,
                    node.projections.clone(),
                )))
            }
            LogicalPlan::Remove(node) => {
                let fields = node.child.output_fields();
                validate_names(&node.fields, &fields)?;
                Ok(Box::new(RemoveOperator::new(
                    self.compile(&node.child)?,
                    node.fields.clone(),
                )))
            }
            LogicalPlan::Rename(node) => {
                let fields = node.child.output_fields();
                let sources: Vec<String> =
                    node.mappings.iter().map(|(source, _)| source.clone()).collect();
                validate_names(&sources, &fields)?;
                Ok(Box::new(RenameOperator::new(
                    self.compile(&node.child)?,
                    node.mappings.clone(),
                )))
            }
            LogicalPlan::Eval(node) => {
                // Each expression may reference the results before it
                let mut fields = node.child.output_fields();
                for expression in &node.expressions {
                    validate_expression(&expression.delegate, &fields)?;
                    let name = expression.name_or_alias().to_string();
                    if !fields.contains(&name) {
                        fields.push(name);
                    }
                }
                Ok(Box::new(EvalOperator::new(
                    self.compile(&node.child)?,
                    node.expressions.clone(),
                )))
            }
            LogicalPlan::Aggregation(node) => {
                let fields = node.child.output_fields();
                for aggregator in &node.aggregators {
                    validate_expression(&aggregator.argument, &fields)?;
                    aggregator
                        .function
                        .return_type(aggregator.argument.expr_type())?;
                }
                for group in &node.group_by {
                    validate_expression(&group.delegate, &fields)?;
                }
                Ok(Box::new(AggregationOperator::new(
                    self.compile(&node.child)?,
                    node.aggregators.clone(),
                    node.group_by.clone(),
                )))
            }
            LogicalPlan::Window(node) => {
                let fields = node.child.output_fields();
                for expr in &node.definition.partition_by {
                    validate_expression(expr, &fields)?;
                }
                for (_, expr) in &node.definition.sort_list {
                    validate_expression(expr, &fields)?;
                }
                let function = resolve_window_function(&node.function_name)?;
                let required: Vec<SortKey> = node
                    .definition
                    .all_sort_items()
                    .into_iter()
                    .map(|(option, expr)| SortKey::new(expr, option))
                    .collect();
                let input = self.compile_window_input(&node.child, required)?;
                Ok(Box::new(WindowOperator::new(
                    input,
                    node.output_name.clone(),
                    function,
                    CurrentRowWindowFrame::new(node.definition.clone()),
                )))
            }
            LogicalPlan::RareTopN(node) => {
                if node.n == 0 {
                    return Err(crate::compile_err!("Rare/top N must be at least 1"));
                }
                let fields = node.child.output_fields();
                for field in &node.fields {
                    validate_expression(&field.delegate, &fields)?;
                }
                for group in &node.group_by {
                    validate_expression(&group.delegate, &fields)?;
                }
                Ok(Box::new(RareTopNOperator::new(
                    self.compile(&node.child)?,
                    node.command,
                    node.n,
                    node.fields.clone(),
                    node.group_by.clone(),
                )))
            }
            LogicalPlan::Dedupe(node) => {
                if node.allowed_duplication == 0 {
                    return Err(crate::compile_err!(
                        "Dedupe allowed duplication must be at least 1"
                    ));
                }
                let fields = node.child.output_fields();
                for field in &node.fields {
                    validate_expression(field, &fields)?;
                }
                Ok(Box::new(DedupeOperator::new(
                    self.compile(&node.child)?,
                    node.fields.clone(),
                    node.allowed_duplication,
                    node.keep_empty,
                    node.consecutive,
                )))
            }
            LogicalPlan::Sort(node) => {
                let fields = node.child.output_fields();
                for key in &node.sort_list {
                    validate_expression(&key.expr, &fields)?;
                }
                Ok(Box::new(SortOperator::new(
                    self.compile(&node.child)?,
                    node.sort_list.clone(),
                )))
            }
            LogicalPlan::Limit(node) => Ok(Box::new(LimitOperator::new(
                self.compile(&node.child)?,
                node.limit,
                node.offset,
            ))),
        }
    }

    /// Compile a window's input, inserting a sort when the child does not
    /// already deliver the required order
    fn compile_window_input(
        &self,
        child: &LogicalPlan,
        required: Vec<SortKey>,
    ) -> PipeQueryResult<Box<dyn PhysicalOperator>> {
        if required.is_empty() {
            return self.compile(child);
        }
        if let LogicalPlan::Sort(sort) = child {
            if sort.sort_list == required {
                return self.compile(child);
            }
        }
        Ok(Box::new(SortOperator::new(self.compile(child)?, required)))
    }
}

impl Default for PhysicalPlanner {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_expression(expr: &Expression, available: &[String]) -> PipeQueryResult<()> {
    for name in expr.references() {
        if !available.contains(&name) {
            return Err(PipeQueryError::FieldNotFound(name));
        }
    }
    Ok(())
}

fn validate_names(names: &[String], available: &[String]) -> PipeQueryResult<()> {
    for name in names {
        if !available.contains(name) {
            return Err(PipeQueryError::FieldNotFound(name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::ExprType;
    use crate::data::value::ExprValue;
    use crate::executor::execute;
    use crate::expression::expression::SortOption;
    use crate::expression::window::WindowDefinition;
    use crate::planner::logical_plan::{Filter, Values, Window};

    fn values_plan() -> LogicalPlan {
        Values::new(
            vec!["a".to_string()],
            vec![
                vec![ExprValue::Integer(30)],
                vec![ExprValue::Integer(10)],
                vec![ExprValue::Integer(10)],
                vec![ExprValue::Integer(20)],
            ],
        )
    }

    #[test]
    fn test_unknown_field_fails_compilation() {
        let plan = Filter::new(
            values_plan(),
            Expression::function(
                ">",
                vec![
                    Expression::reference("missing_field", ExprType::Integer),
                    Expression::literal(1),
                ],
            )
            .unwrap(),
        );
        let result = PhysicalPlanner::new().compile(&plan);
        assert!(matches!(result, Err(PipeQueryError::FieldNotFound(_))));
    }

    #[test]
    fn test_window_inserts_sort_below() {
        let plan = Window::new(
            values_plan(),
            "rnk",
            "rank",
            WindowDefinition::new(
                vec![],
                vec![(
                    SortOption::asc(),
                    Expression::reference("a", ExprType::Integer),
                )],
            ),
        );
        let mut operator = PhysicalPlanner::new().compile(&plan).unwrap();
        let rows = execute(operator.as_mut()).unwrap();
        let ranks: Vec<ExprValue> = rows
            .iter()
            .map(|row| row.tuple_get("rnk").unwrap())
            .collect();
        assert_eq!(
            ranks,
            vec![
                ExprValue::Integer(1),
                ExprValue::Integer(1),
                ExprValue::Integer(3),
                ExprValue::Integer(4),
            ]
        );
    }

    #[test]
    fn test_values_row_width_checked() {
        let plan = Values::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![ExprValue::Integer(1)]],
        );
        let result = PhysicalPlanner::new().compile(&plan);
        assert!(matches!(result, Err(PipeQueryError::PlanCompile(_))));
    }
}
