//! Storage adaptor surface: table capabilities, accumulated pushdown, and
//! an in-memory table used by tests and the values-backed demos.

use crate::common::error::{PipeQueryError, PipeQueryResult};
use crate::data::value::ExprValue;
use crate::executor::operators::{
    AggregationOperator, FilterOperator, LimitOperator, ProjectOperator, SortOperator,
};
use crate::executor::PhysicalOperator;
use crate::expression::aggregate::NamedAggregator;
use crate::expression::expression::{Expression, NamedExpression, ReferenceExpression};
use crate::planner::logical_plan::{Column, SortKey};
use std::fmt;

/// What a table can absorb from the plan above it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capability {
    pub filter: bool,
    pub project: bool,
    pub aggregate: bool,
    pub sort: bool,
    pub limit: bool,
}

impl Capability {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            filter: true,
            project: true,
            aggregate: true,
            sort: true,
            limit: true,
        }
    }
}

/// Operations the optimizer has merged into a relation scan
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pushdown {
    pub filter: Option<Expression>,
    pub projections: Option<Vec<String>>,
    pub aggregation: Option<(Vec<NamedAggregator>, Vec<NamedExpression>)>,
    pub sort: Option<Vec<SortKey>>,
    pub limit: Option<(usize, usize)>,
}

impl Pushdown {
    pub fn is_empty(&self) -> bool {
        self.filter.is_none()
            && self.projections.is_none()
            && self.aggregation.is_none()
            && self.sort.is_none()
            && self.limit.is_none()
    }
}

/// A scannable table behind the relation leaf
pub trait Table: fmt::Debug + Send + Sync {
    fn schema(&self) -> Vec<Column>;

    fn capability(&self) -> Capability;

    /// Whether this table can evaluate the given predicate itself. The
    /// default accepts any predicate when the filter capability is set.
    fn supports_predicate(&self, _predicate: &Expression) -> bool {
        self.capability().filter
    }

    /// Open a scan honoring every operation recorded in the pushdown
    fn scan(&self, pushdown: &Pushdown) -> PipeQueryResult<Box<dyn PhysicalOperator>>;
}

/// Table over rows held in memory. Pushed-down operations are honored by
/// running the corresponding executor operators over the stored rows, so a
/// plan produces identical output whether or not merging happened.
#[derive(Debug)]
pub struct InMemoryTable {
    schema: Vec<Column>,
    rows: Vec<ExprValue>,
    capability: Capability,
}

impl InMemoryTable {
    pub fn new(schema: Vec<Column>, rows: Vec<ExprValue>) -> Self {
        Self {
            schema,
            rows,
            capability: Capability::none(),
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }
}

impl Table for InMemoryTable {
    fn schema(&self) -> Vec<Column> {
        self.schema.clone()
    }

    fn capability(&self) -> Capability {
        self.capability
    }

    fn scan(&self, pushdown: &Pushdown) -> PipeQueryResult<Box<dyn PhysicalOperator>> {
        let mut operator: Box<dyn PhysicalOperator> =
            Box::new(InMemoryScan::new(self.rows.clone()));
        if let Some(filter) = &pushdown.filter {
            operator = Box::new(FilterOperator::new(operator, filter.clone()));
        }
        if let Some((aggregators, group_by)) = &pushdown.aggregation {
            operator = Box::new(AggregationOperator::new(
                operator,
                aggregators.clone(),
                group_by.clone(),
            ));
        }
        if let Some(sort_list) = &pushdown.sort {
            operator = Box::new(SortOperator::new(operator, sort_list.clone()));
        }
        if let Some((limit, offset)) = pushdown.limit {
            operator = Box::new(LimitOperator::new(operator, limit, offset));
        }
        if let Some(projections) = &pushdown.projections {
            let named = projections
                .iter()
                .map(|name| {
                    let expr_type = self
                        .schema
                        .iter()
                        .find(|column| column.name == *name)
                        .map(|column| column.expr_type)
                        .ok_or_else(|| PipeQueryError::FieldNotFound(name.clone()))?;
                    Ok(NamedExpression::new(
                        name.clone(),
                        Expression::Reference(ReferenceExpression::new(name.clone(), expr_type)),
                    ))
                })
                .collect::<PipeQueryResult<Vec<_>>>()?;
            operator = Box::new(ProjectOperator::new(operator, named));
        }
        Ok(operator)
    }
}

/// Leaf operator replaying in-memory rows
#[derive(Debug)]
struct InMemoryScan {
    rows: Vec<ExprValue>,
    index: usize,
    opened: bool,
}

impl InMemoryScan {
    fn new(rows: Vec<ExprValue>) -> Self {
        Self {
            rows,
            index: 0,
            opened: false,
        }
    }
}

impl PhysicalOperator for InMemoryScan {
    fn open(&mut self) -> PipeQueryResult<()> {
        self.index = 0;
        self.opened = true;
        Ok(())
    }

    fn has_next(&mut self) -> PipeQueryResult<bool> {
        Ok(self.opened && self.index < self.rows.len())
    }

    fn next(&mut self) -> PipeQueryResult<ExprValue> {
        if !self.opened || self.index >= self.rows.len() {
            return Err(PipeQueryError::Evaluation(
                "next() called on an exhausted scan".into(),
            ));
        }
        let row = self.rows[self.index].clone();
        self.index += 1;
        Ok(row)
    }

    fn close(&mut self) -> PipeQueryResult<()> {
        self.opened = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::ExprType;

    fn row(a: i32) -> ExprValue {
        ExprValue::Tuple(vec![("a".to_string(), ExprValue::Integer(a))])
    }

    fn table(rows: Vec<ExprValue>) -> InMemoryTable {
        InMemoryTable::new(vec![Column::new("a", ExprType::Integer)], rows)
            .with_capability(Capability::all())
    }

    #[test]
    fn test_plain_scan_replays_rows() {
        let table = table(vec![row(1), row(2)]);
        let mut scan = table.scan(&Pushdown::default()).unwrap();
        scan.open().unwrap();
        let mut out = vec![];
        while scan.has_next().unwrap() {
            out.push(scan.next().unwrap());
        }
        scan.close().unwrap();
        assert_eq!(out, vec![row(1), row(2)]);
    }

    #[test]
    fn test_scan_honors_pushed_filter_and_limit() {
        let table = table(vec![row(1), row(2), row(3), row(4)]);
        let condition = Expression::function(
            ">",
            vec![
                Expression::Reference(ReferenceExpression::new("a", ExprType::Integer)),
                Expression::Literal(ExprValue::Integer(1)),
            ],
        )
        .unwrap();
        let pushdown = Pushdown {
            filter: Some(condition),
            limit: Some((2, 0)),
            ..Pushdown::default()
        };
        let mut scan = table.scan(&pushdown).unwrap();
        scan.open().unwrap();
        let mut out = vec![];
        while scan.has_next().unwrap() {
            out.push(scan.next().unwrap());
        }
        scan.close().unwrap();
        assert_eq!(out, vec![row(2), row(3)]);
    }

    #[test]
    fn test_next_without_rows_is_an_error() {
        let table = table(vec![]);
        let mut scan = table.scan(&Pushdown::default()).unwrap();
        scan.open().unwrap();
        assert!(scan.next().is_err());
    }
}
