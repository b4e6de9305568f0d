//! Window definitions, the current-row frame, and ranking functions.
//!
//! The frame tracks exactly the previous and current rows, which is enough
//! state for the ranking family: a new partition resets the function, and a
//! change in the sort key advances RANK past any accumulated peers.

use crate::common::error::{PipeQueryError, PipeQueryResult};
use crate::data::value::ExprValue;
use crate::expression::expression::{Expression, SortOption};
use crate::storage::binding::BindingTuple;
use std::fmt;

/// Partition and ordering specification of a window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowDefinition {
    pub partition_by: Vec<Expression>,
    pub sort_list: Vec<(SortOption, Expression)>,
}

impl WindowDefinition {
    pub fn new(partition_by: Vec<Expression>, sort_list: Vec<(SortOption, Expression)>) -> Self {
        Self {
            partition_by,
            sort_list,
        }
    }

    /// Full sort requirement of the window: partition keys ascending,
    /// followed by the explicit sort list
    pub fn all_sort_items(&self) -> Vec<(SortOption, Expression)> {
        let mut items: Vec<(SortOption, Expression)> = self
            .partition_by
            .iter()
            .map(|expr| (SortOption::asc(), expr.clone()))
            .collect();
        items.extend(self.sort_list.iter().cloned());
        items
    }
}

impl fmt::Display for WindowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let partitions: Vec<String> = self.partition_by.iter().map(|e| e.to_string()).collect();
        let sorts: Vec<String> = self
            .sort_list
            .iter()
            .map(|(_, e)| e.to_string())
            .collect();
        write!(
            f,
            "partition by [{}] sort by [{}]",
            partitions.join(", "),
            sorts.join(", ")
        )
    }
}

/// Sliding frame holding the previous and current row of a sorted input
#[derive(Debug)]
pub struct CurrentRowWindowFrame {
    definition: WindowDefinition,
    previous: Option<ExprValue>,
    current: Option<ExprValue>,
}

impl CurrentRowWindowFrame {
    pub fn new(definition: WindowDefinition) -> Self {
        Self {
            definition,
            previous: None,
            current: None,
        }
    }

    /// Advance the frame by one row
    pub fn load(&mut self, row: ExprValue) {
        self.previous = self.current.take();
        self.current = Some(row);
    }

    pub fn current_row(&self) -> PipeQueryResult<&ExprValue> {
        self.current
            .as_ref()
            .ok_or_else(|| PipeQueryError::Evaluation("Window frame has no current row".into()))
    }

    /// True when the current row starts a new partition
    pub fn is_new_partition(&self) -> PipeQueryResult<bool> {
        let current = match &self.current {
            Some(row) => row,
            None => return Ok(false),
        };
        let previous = match &self.previous {
            Some(row) => row,
            None => return Ok(true),
        };
        Ok(self.evaluate_keys(&self.definition.partition_by, previous)?
            != self.evaluate_keys(&self.definition.partition_by, current)?)
    }

    /// True when the sort key of the current row differs from the previous
    /// row's. The first row of the input reports a change.
    pub fn is_sort_value_changed(&self) -> PipeQueryResult<bool> {
        let current = match &self.current {
            Some(row) => row,
            None => return Ok(false),
        };
        let previous = match &self.previous {
            Some(row) => row,
            None => return Ok(true),
        };
        let sort_exprs: Vec<Expression> = self
            .definition
            .sort_list
            .iter()
            .map(|(_, expr)| expr.clone())
            .collect();
        Ok(self.evaluate_keys(&sort_exprs, previous)? != self.evaluate_keys(&sort_exprs, current)?)
    }

    fn evaluate_keys(
        &self,
        exprs: &[Expression],
        row: &ExprValue,
    ) -> PipeQueryResult<Vec<ExprValue>> {
        let binding = BindingTuple::new(row.clone());
        exprs.iter().map(|expr| expr.value_of(&binding)).collect()
    }
}

/// Per-row ranking state driven by the current-row frame
pub trait RankingFunction: fmt::Debug {
    fn name(&self) -> &str;

    /// Rank of the frame's current row
    fn rank(&mut self, frame: &CurrentRowWindowFrame) -> PipeQueryResult<ExprValue>;
}

/// Resolve a window function by name at plan compile time
pub fn resolve_window_function(name: &str) -> PipeQueryResult<Box<dyn RankingFunction>> {
    match name {
        "row_number" => Ok(Box::new(RowNumberFunction::new())),
        "rank" => Ok(Box::new(RankFunction::new())),
        "dense_rank" => Ok(Box::new(DenseRankFunction::new())),
        other => Err(PipeQueryError::PlanCompile(format!(
            "Unresolved window function: {}",
            other
        ))),
    }
}

/// Sequential row number within each partition
#[derive(Debug)]
pub struct RowNumberFunction {
    row_number: i32,
}

impl RowNumberFunction {
    pub fn new() -> Self {
        Self { row_number: 0 }
    }
}

impl Default for RowNumberFunction {
    fn default() -> Self {
        Self::new()
    }
}

impl RankingFunction for RowNumberFunction {
    fn name(&self) -> &str {
        "row_number"
    }

    fn rank(&mut self, frame: &CurrentRowWindowFrame) -> PipeQueryResult<ExprValue> {
        if frame.is_new_partition()? {
            self.row_number = 1;
        } else {
            self.row_number += 1;
        }
        Ok(ExprValue::Integer(self.row_number))
    }
}

/// Standard RANK: peers share a rank and the next distinct sort value jumps
/// to the running row count
#[derive(Debug)]
pub struct RankFunction {
    total: i32,
    rank: i32,
}

impl RankFunction {
    pub fn new() -> Self {
        Self { total: 0, rank: 0 }
    }
}

impl Default for RankFunction {
    fn default() -> Self {
        Self::new()
    }
}

impl RankingFunction for RankFunction {
    fn name(&self) -> &str {
        "rank"
    }

    fn rank(&mut self, frame: &CurrentRowWindowFrame) -> PipeQueryResult<ExprValue> {
        if frame.is_new_partition()? {
            self.total = 1;
            self.rank = 1;
        } else {
            self.total += 1;
            if frame.is_sort_value_changed()? {
                self.rank = self.total;
            }
        }
        Ok(ExprValue::Integer(self.rank))
    }
}

/// DENSE_RANK: peers share a rank and the next distinct sort value advances
/// by exactly one
#[derive(Debug)]
pub struct DenseRankFunction {
    rank: i32,
}

impl DenseRankFunction {
    pub fn new() -> Self {
        Self { rank: 0 }
    }
}

impl Default for DenseRankFunction {
    fn default() -> Self {
        Self::new()
    }
}

impl RankingFunction for DenseRankFunction {
    fn name(&self) -> &str {
        "dense_rank"
    }

    fn rank(&mut self, frame: &CurrentRowWindowFrame) -> PipeQueryResult<ExprValue> {
        if frame.is_new_partition()? {
            self.rank = 1;
        } else if frame.is_sort_value_changed()? {
            self.rank += 1;
        }
        Ok(ExprValue::Integer(self.rank))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::ExprType;
    use crate::expression::expression::ReferenceExpression;

    fn row(value: i32) -> ExprValue {
        ExprValue::Tuple(vec![("score".to_string(), ExprValue::Integer(value))])
    }

    fn frame() -> CurrentRowWindowFrame {
        let sort_key = Expression::Reference(ReferenceExpression::new("score", ExprType::Integer));
        CurrentRowWindowFrame::new(WindowDefinition::new(
            vec![],
            vec![(SortOption::asc(), sort_key)],
        ))
    }

    fn ranks(function: &mut dyn RankingFunction, values: &[i32]) -> Vec<ExprValue> {
        let mut frame = frame();
        values
            .iter()
            .map(|value| {
                frame.load(row(*value));
                function.rank(&frame).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_rank_skips_after_peers() {
        let mut rank = RankFunction::new();
        assert_eq!(
            ranks(&mut rank, &[10, 10, 20, 30]),
            vec![
                ExprValue::Integer(1),
                ExprValue::Integer(1),
                ExprValue::Integer(3),
                ExprValue::Integer(4),
            ]
        );
    }

    #[test]
    fn test_rank_all_peers() {
        let mut rank = RankFunction::new();
        assert_eq!(
            ranks(&mut rank, &[5, 5, 5]),
            vec![
                ExprValue::Integer(1),
                ExprValue::Integer(1),
                ExprValue::Integer(1),
            ]
        );
    }

    #[test]
    fn test_dense_rank_never_skips() {
        let mut dense = DenseRankFunction::new();
        assert_eq!(
            ranks(&mut dense, &[10, 10, 20, 30]),
            vec![
                ExprValue::Integer(1),
                ExprValue::Integer(1),
                ExprValue::Integer(2),
                ExprValue::Integer(3),
            ]
        );
    }

    #[test]
    fn test_row_number_increments() {
        let mut row_number = RowNumberFunction::new();
        assert_eq!(
            ranks(&mut row_number, &[10, 10, 20]),
            vec![
                ExprValue::Integer(1),
                ExprValue::Integer(2),
                ExprValue::Integer(3),
            ]
        );
    }

    #[test]
    fn test_partition_resets_rank() {
        let partition =
            Expression::Reference(ReferenceExpression::new("dept", ExprType::String));
        let sort_key = Expression::Reference(ReferenceExpression::new("score", ExprType::Integer));
        let mut frame = CurrentRowWindowFrame::new(WindowDefinition::new(
            vec![partition],
            vec![(SortOption::asc(), sort_key)],
        ));
        let mut rank = RankFunction::new();
        let rows = [("a", 10), ("a", 20), ("b", 10)];
        let results: Vec<ExprValue> = rows
            .iter()
            .map(|(dept, score)| {
                frame.load(ExprValue::Tuple(vec![
                    ("dept".to_string(), ExprValue::String(dept.to_string())),
                    ("score".to_string(), ExprValue::Integer(*score)),
                ]));
                rank.rank(&frame).unwrap()
            })
            .collect();
        assert_eq!(
            results,
            vec![
                ExprValue::Integer(1),
                ExprValue::Integer(2),
                ExprValue::Integer(1),
            ]
        );
    }

    #[test]
    fn test_unresolved_window_function() {
        let result = resolve_window_function("ntile");
        assert!(result.is_err());
    }
}
