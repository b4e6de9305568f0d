//! Operator implementations.
//!
//! Streaming operators hold at most one pending row; blocking operators
//! (aggregation, sort, dedupe bookkeeping, rare/top-N) consume their whole
//! input before emitting. All state lives in memory.

use crate::common::error::{PipeQueryError, PipeQueryResult};
use crate::data::value::ExprValue;
use crate::executor::PhysicalOperator;
use crate::expression::aggregate::{Accumulator, NamedAggregator};
use crate::expression::expression::{Expression, NamedExpression, SortOption};
use crate::expression::window::{CurrentRowWindowFrame, RankingFunction};
use crate::planner::logical_plan::{CommandType, SortKey};
use crate::storage::binding::BindingTuple;
use std::cmp::Ordering;
use std::collections::HashMap;

fn no_pending_row(operator: &str) -> PipeQueryError {
    crate::eval_err!("next() called on {} without a pending row", operator)
}

/// Replace a field in place, or append it when absent
fn put_field(entries: &mut Vec<(String, ExprValue)>, name: &str, value: ExprValue) {
    if let Some(entry) = entries.iter_mut().find(|(field, _)| field == name) {
        entry.1 = value;
    } else {
        entries.push((name.to_string(), value));
    }
}

/// Keeps rows whose condition evaluates to boolean true. NULL, MISSING and
/// false all reject the row.
#[derive(Debug)]
pub struct FilterOperator {
    input: Box<dyn PhysicalOperator>,
    condition: Expression,
    pending: Option<ExprValue>,
}

impl FilterOperator {
    pub fn new(input: Box<dyn PhysicalOperator>, condition: Expression) -> Self {
        Self {
            input,
            condition,
            pending: None,
        }
    }
}

impl PhysicalOperator for FilterOperator {
    fn open(&mut self) -> PipeQueryResult<()> {
        self.pending = None;
        self.input.open()
    }

    fn has_next(&mut self) -> PipeQueryResult<bool> {
        while self.pending.is_none() && self.input.has_next()? {
            let row = self.input.next()?;
            let binding = BindingTuple::new(row.clone());
            if self.condition.value_of(&binding)? == ExprValue::Boolean(true) {
                self.pending = Some(row);
            }
        }
        Ok(self.pending.is_some())
    }

    fn next(&mut self) -> PipeQueryResult<ExprValue> {
        self.pending.take().ok_or_else(|| no_pending_row("filter"))
    }

    fn close(&mut self) -> PipeQueryResult<()> {
        self.input.close()
    }
}

/// Emits exactly the projected columns, keyed by name-or-alias
#[derive(Debug)]
pub struct ProjectOperator {
    input: Box<dyn PhysicalOperator>,
    projections: Vec<NamedExpression>,
}

impl ProjectOperator {
    pub fn new(input: Box<dyn PhysicalOperator>, projections: Vec<NamedExpression>) -> Self {
        Self { input, projections }
    }
}

impl PhysicalOperator for ProjectOperator {
    fn open(&mut self) -> PipeQueryResult<()> {
        self.input.open()
    }

    fn has_next(&mut self) -> PipeQueryResult<bool> {
        self.input.has_next()
    }

    fn next(&mut self) -> PipeQueryResult<ExprValue> {
        let row = self.input.next()?;
        let binding = BindingTuple::new(row);
        let mut entries = Vec::with_capacity(self.projections.len());
        for projection in &self.projections {
            let value = projection.value_of(&binding)?;
            entries.push((projection.name_or_alias().to_string(), value));
        }
        Ok(ExprValue::tuple(entries))
    }

    fn close(&mut self) -> PipeQueryResult<()> {
        self.input.close()
    }
}

/// Renames fields by (source, target) pairs; absent sources pass through
#[derive(Debug)]
pub struct RenameOperator {
    input: Box<dyn PhysicalOperator>,
    mappings: Vec<(String, String)>,
}

impl RenameOperator {
    pub fn new(input: Box<dyn PhysicalOperator>, mappings: Vec<(String, String)>) -> Self {
        Self { input, mappings }
    }
}

impl PhysicalOperator for RenameOperator {
    fn open(&mut self) -> PipeQueryResult<()> {
        self.input.open()
    }

    fn has_next(&mut self) -> PipeQueryResult<bool> {
        self.input.has_next()
    }

    fn next(&mut self) -> PipeQueryResult<ExprValue> {
        let row = self.input.next()?;
        let mut entries = row.tuple_value()?.to_vec();
        for (source, target) in &self.mappings {
            if let Some(entry) = entries.iter_mut().find(|(field, _)| field == source) {
                entry.0 = target.clone();
            }
        }
        Ok(ExprValue::tuple(entries))
    }

    fn close(&mut self) -> PipeQueryResult<()> {
        self.input.close()
    }
}

/// Drops the named fields from every row
#[derive(Debug)]
pub struct RemoveOperator {
    input: Box<dyn PhysicalOperator>,
    fields: Vec<String>,
}

impl RemoveOperator {
    pub fn new(input: Box<dyn PhysicalOperator>, fields: Vec<String>) -> Self {
        Self { input, fields }
    }
}

impl PhysicalOperator for RemoveOperator {
    fn open(&mut self) -> PipeQueryResult<()> {
        self.input.open()
    }

    fn has_next(&mut self) -> PipeQueryResult<bool> {
        self.input.has_next()
    }

    fn next(&mut self) -> PipeQueryResult<ExprValue> {
        let row = self.input.next()?;
        let entries = row
            .tuple_value()?
            .iter()
            .filter(|(field, _)| !self.fields.contains(field))
            .cloned()
            .collect();
        Ok(ExprValue::tuple(entries))
    }

    fn close(&mut self) -> PipeQueryResult<()> {
        self.input.close()
    }
}

/// Evaluates expressions left to right, each one seeing the results of the
/// expressions before it. Existing fields are overwritten in place, new
/// fields appended.
#[derive(Debug)]
pub struct EvalOperator {
    input: Box<dyn PhysicalOperator>,
    expressions: Vec<NamedExpression>,
}

impl EvalOperator {
    pub fn new(input: Box<dyn PhysicalOperator>, expressions: Vec<NamedExpression>) -> Self {
        Self { input, expressions }
    }
}

impl PhysicalOperator for EvalOperator {
    fn open(&mut self) -> PipeQueryResult<()> {
        self.input.open()
    }

    fn has_next(&mut self) -> PipeQueryResult<bool> {
        self.input.has_next()
    }

    fn next(&mut self) -> PipeQueryResult<ExprValue> {
        let row = self.input.next()?;
        let mut entries = row.tuple_value()?.to_vec();
        for expression in &self.expressions {
            let binding = BindingTuple::new(ExprValue::tuple(entries.clone()));
            let value = expression.value_of(&binding)?;
            put_field(&mut entries, expression.name_or_alias(), value);
        }
        Ok(ExprValue::tuple(entries))
    }

    fn close(&mut self) -> PipeQueryResult<()> {
        self.input.close()
    }
}

/// Hash aggregation. Groups appear in output in the order their key was
/// first encountered in the input.
#[derive(Debug)]
pub struct AggregationOperator {
    input: Box<dyn PhysicalOperator>,
    aggregators: Vec<NamedAggregator>,
    group_by: Vec<NamedExpression>,
    results: Vec<ExprValue>,
    index: usize,
}

impl AggregationOperator {
    pub fn new(
        input: Box<dyn PhysicalOperator>,
        aggregators: Vec<NamedAggregator>,
        group_by: Vec<NamedExpression>,
    ) -> Self {
        Self {
            input,
            aggregators,
            group_by,
            results: Vec::new(),
            index: 0,
        }
    }
}

impl PhysicalOperator for AggregationOperator {
    fn open(&mut self) -> PipeQueryResult<()> {
        self.input.open()?;
        self.results.clear();
        self.index = 0;

        let mut positions: HashMap<Vec<ExprValue>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<ExprValue>, Vec<Box<dyn Accumulator>>)> = Vec::new();
        while self.input.has_next()? {
            let row = self.input.next()?;
            let binding = BindingTuple::new(row);
            let key = self
                .group_by
                .iter()
                .map(|group| group.value_of(&binding))
                .collect::<PipeQueryResult<Vec<_>>>()?;
            let position = match positions.get(&key) {
                Some(position) => *position,
                None => {
                    let accumulators = self
                        .aggregators
                        .iter()
                        .map(|agg| agg.function.create_accumulator())
                        .collect();
                    positions.insert(key.clone(), groups.len());
                    groups.push((key, accumulators));
                    groups.len() - 1
                }
            };
            for (aggregator, accumulator) in
                self.aggregators.iter().zip(groups[position].1.iter_mut())
            {
                let value = aggregator.argument.value_of(&binding)?;
                accumulator.accumulate(&value)?;
            }
        }

        // A grand aggregation over empty input still yields one row
        if groups.is_empty() && self.group_by.is_empty() {
            let accumulators = self
                .aggregators
                .iter()
                .map(|agg| agg.function.create_accumulator())
                .collect();
            groups.push((Vec::new(), accumulators));
        }

        for (key, accumulators) in groups {
            let mut entries = Vec::with_capacity(self.aggregators.len() + key.len());
            for (aggregator, accumulator) in self.aggregators.iter().zip(accumulators.iter()) {
                entries.push((aggregator.name.clone(), accumulator.result()?));
            }
            for (group, value) in self.group_by.iter().zip(key) {
                entries.push((group.name_or_alias().to_string(), value));
            }
            self.results.push(ExprValue::tuple(entries));
        }
        Ok(())
    }

    fn has_next(&mut self) -> PipeQueryResult<bool> {
        Ok(self.index < self.results.len())
    }

    fn next(&mut self) -> PipeQueryResult<ExprValue> {
        if self.index >= self.results.len() {
            return Err(no_pending_row("aggregation"));
        }
        let row = self.results[self.index].clone();
        self.index += 1;
        Ok(row)
    }

    fn close(&mut self) -> PipeQueryResult<()> {
        self.results.clear();
        self.input.close()
    }
}

/// Applies a ranking function over sorted input, appending the rank as a
/// named column. The input must already be sorted by the window's partition
/// keys and sort list.
#[derive(Debug)]
pub struct WindowOperator {
    input: Box<dyn PhysicalOperator>,
    output_name: String,
    function: Box<dyn RankingFunction>,
    frame: CurrentRowWindowFrame,
}

impl WindowOperator {
    pub fn new(
        input: Box<dyn PhysicalOperator>,
        output_name: impl Into<String>,
        function: Box<dyn RankingFunction>,
        frame: CurrentRowWindowFrame,
    ) -> Self {
        Self {
            input,
            output_name: output_name.into(),
            function,
            frame,
        }
    }
}

impl PhysicalOperator for WindowOperator {
    fn open(&mut self) -> PipeQueryResult<()> {
        self.input.open()
    }

    fn has_next(&mut self) -> PipeQueryResult<bool> {
        self.input.has_next()
    }

    fn next(&mut self) -> PipeQueryResult<ExprValue> {
        let row = self.input.next()?;
        self.frame.load(row);
        let rank = self.function.rank(&self.frame)?;
        let mut entries = self.frame.current_row()?.tuple_value()?.to_vec();
        put_field(&mut entries, &self.output_name, rank);
        Ok(ExprValue::tuple(entries))
    }

    fn close(&mut self) -> PipeQueryResult<()> {
        self.input.close()
    }
}

/// Most or least frequent field values, per group. Output carries the group
/// columns followed by the field columns; ties keep first-encounter order.
#[derive(Debug)]
pub struct RareTopNOperator {
    input: Box<dyn PhysicalOperator>,
    command: CommandType,
    n: usize,
    fields: Vec<NamedExpression>,
    group_by: Vec<NamedExpression>,
    results: Vec<ExprValue>,
    index: usize,
}

impl RareTopNOperator {
    pub fn new(
        input: Box<dyn PhysicalOperator>,
        command: CommandType,
        n: usize,
        fields: Vec<NamedExpression>,
        group_by: Vec<NamedExpression>,
    ) -> Self {
        Self {
            input,
            command,
            n,
            fields,
            group_by,
            results: Vec::new(),
            index: 0,
        }
    }
}

impl PhysicalOperator for RareTopNOperator {
    fn open(&mut self) -> PipeQueryResult<()> {
        self.input.open()?;
        self.results.clear();
        self.index = 0;

        let mut group_order: Vec<Vec<ExprValue>> = Vec::new();
        let mut counts: HashMap<Vec<ExprValue>, (Vec<Vec<ExprValue>>, HashMap<Vec<ExprValue>, usize>)> =
            HashMap::new();
        while self.input.has_next()? {
            let row = self.input.next()?;
            let binding = BindingTuple::new(row);
            let group_key = self
                .group_by
                .iter()
                .map(|group| group.value_of(&binding))
                .collect::<PipeQueryResult<Vec<_>>>()?;
            let field_key = self
                .fields
                .iter()
                .map(|field| field.value_of(&binding))
                .collect::<PipeQueryResult<Vec<_>>>()?;
            if !counts.contains_key(&group_key) {
                group_order.push(group_key.clone());
            }
            let (field_order, field_counts) = counts.entry(group_key).or_default();
            if !field_counts.contains_key(&field_key) {
                field_order.push(field_key.clone());
            }
            *field_counts.entry(field_key).or_insert(0) += 1;
        }

        for group_key in group_order {
            let (field_order, field_counts) = counts.remove(&group_key).unwrap_or_default();
            let mut ranked: Vec<(Vec<ExprValue>, usize)> = field_order
                .into_iter()
                .map(|key| {
                    let count = field_counts[&key];
                    (key, count)
                })
                .collect();
            // Stable sort, so equal counts stay in first-encounter order
            match self.command {
                CommandType::Top => ranked.sort_by(|a, b| b.1.cmp(&a.1)),
                CommandType::Rare => ranked.sort_by(|a, b| a.1.cmp(&b.1)),
            }
            for (field_key, _) in ranked.into_iter().take(self.n) {
                let mut entries = Vec::with_capacity(self.group_by.len() + self.fields.len());
                for (group, value) in self.group_by.iter().zip(group_key.iter()) {
                    entries.push((group.name_or_alias().to_string(), value.clone()));
                }
                for (field, value) in self.fields.iter().zip(field_key) {
                    entries.push((field.name_or_alias().to_string(), value));
                }
                self.results.push(ExprValue::tuple(entries));
            }
        }
        Ok(())
    }

    fn has_next(&mut self) -> PipeQueryResult<bool> {
        Ok(self.index < self.results.len())
    }

    fn next(&mut self) -> PipeQueryResult<ExprValue> {
        if self.index >= self.results.len() {
            return Err(no_pending_row("rare/top"));
        }
        let row = self.results[self.index].clone();
        self.index += 1;
        Ok(row)
    }

    fn close(&mut self) -> PipeQueryResult<()> {
        self.results.clear();
        self.input.close()
    }
}

/// Drops rows whose dedupe key was already seen more than the allowed
/// number of times. Keys containing NULL or MISSING either bypass the
/// bookkeeping (`keep_empty`) or reject the row outright.
#[derive(Debug)]
pub struct DedupeOperator {
    input: Box<dyn PhysicalOperator>,
    fields: Vec<Expression>,
    allowed_duplication: usize,
    keep_empty: bool,
    consecutive: bool,
    seen: HashMap<Vec<ExprValue>, usize>,
    last_key: Option<Vec<ExprValue>>,
    pending: Option<ExprValue>,
}

impl DedupeOperator {
    pub fn new(
        input: Box<dyn PhysicalOperator>,
        fields: Vec<Expression>,
        allowed_duplication: usize,
        keep_empty: bool,
        consecutive: bool,
    ) -> Self {
        Self {
            input,
            fields,
            allowed_duplication,
            keep_empty,
            consecutive,
            seen: HashMap::new(),
            last_key: None,
            pending: None,
        }
    }
}

impl PhysicalOperator for DedupeOperator {
    fn open(&mut self) -> PipeQueryResult<()> {
        self.seen.clear();
        self.last_key = None;
        self.pending = None;
        self.input.open()
    }

    fn has_next(&mut self) -> PipeQueryResult<bool> {
        while self.pending.is_none() && self.input.has_next()? {
            let row = self.input.next()?;
            let binding = BindingTuple::new(row.clone());
            let key = self
                .fields
                .iter()
                .map(|field| field.value_of(&binding))
                .collect::<PipeQueryResult<Vec<_>>>()?;
            if key.iter().any(|value| value.is_absent()) {
                if self.keep_empty {
                    self.pending = Some(row);
                }
                continue;
            }
            if self.consecutive && self.last_key.as_ref() != Some(&key) {
                self.seen.clear();
            }
            self.last_key = Some(key.clone());
            let count = self.seen.entry(key).or_insert(0);
            *count += 1;
            if *count <= self.allowed_duplication {
                self.pending = Some(row);
            }
        }
        Ok(self.pending.is_some())
    }

    fn next(&mut self) -> PipeQueryResult<ExprValue> {
        self.pending.take().ok_or_else(|| no_pending_row("dedupe"))
    }

    fn close(&mut self) -> PipeQueryResult<()> {
        self.seen.clear();
        self.input.close()
    }
}

/// Blocking stable sort. Absent sort keys obey the null placement of each
/// key's sort option, with MISSING ordered before NULL.
#[derive(Debug)]
pub struct SortOperator {
    input: Box<dyn PhysicalOperator>,
    sort_list: Vec<SortKey>,
    sorted: Vec<ExprValue>,
    index: usize,
}

impl SortOperator {
    pub fn new(input: Box<dyn PhysicalOperator>, sort_list: Vec<SortKey>) -> Self {
        Self {
            input,
            sort_list,
            sorted: Vec::new(),
            index: 0,
        }
    }
}

impl PhysicalOperator for SortOperator {
    fn open(&mut self) -> PipeQueryResult<()> {
        self.input.open()?;
        self.sorted.clear();
        self.index = 0;

        let mut decorated: Vec<(Vec<ExprValue>, ExprValue)> = Vec::new();
        while self.input.has_next()? {
            let row = self.input.next()?;
            let binding = BindingTuple::new(row.clone());
            let keys = self
                .sort_list
                .iter()
                .map(|key| key.expr.value_of(&binding))
                .collect::<PipeQueryResult<Vec<_>>>()?;
            decorated.push((keys, row));
        }

        let mut compare_error: Option<PipeQueryError> = None;
        decorated.sort_by(|left, right| {
            for (index, sort_key) in self.sort_list.iter().enumerate() {
                match ordering_for(&left.0[index], &right.0[index], &sort_key.option) {
                    Ok(Ordering::Equal) => continue,
                    Ok(ordering) => return ordering,
                    Err(error) => {
                        if compare_error.is_none() {
                            compare_error = Some(error);
                        }
                        return Ordering::Equal;
                    }
                }
            }
            Ordering::Equal
        });
        if let Some(error) = compare_error {
            return Err(error);
        }
        self.sorted = decorated.into_iter().map(|(_, row)| row).collect();
        Ok(())
    }

    fn has_next(&mut self) -> PipeQueryResult<bool> {
        Ok(self.index < self.sorted.len())
    }

    fn next(&mut self) -> PipeQueryResult<ExprValue> {
        if self.index >= self.sorted.len() {
            return Err(no_pending_row("sort"));
        }
        let row = self.sorted[self.index].clone();
        self.index += 1;
        Ok(row)
    }

    fn close(&mut self) -> PipeQueryResult<()> {
        self.sorted.clear();
        self.input.close()
    }
}

fn ordering_for(
    left: &ExprValue,
    right: &ExprValue,
    option: &SortOption,
) -> PipeQueryResult<Ordering> {
    fn absent_rank(value: &ExprValue) -> u8 {
        if value.is_missing() {
            0
        } else {
            1
        }
    }
    match (left.is_absent(), right.is_absent()) {
        (true, true) => Ok(absent_rank(left).cmp(&absent_rank(right))),
        (true, false) => Ok(if option.null_first {
            Ordering::Less
        } else {
            Ordering::Greater
        }),
        (false, true) => Ok(if option.null_first {
            Ordering::Greater
        } else {
            Ordering::Less
        }),
        (false, false) => {
            let ordering = left.compare(right)?;
            Ok(if option.ascending {
                ordering
            } else {
                ordering.reverse()
            })
        }
    }
}

/// Skips `offset` rows then passes through at most `limit` rows, without
/// draining the rest of the input
#[derive(Debug)]
pub struct LimitOperator {
    input: Box<dyn PhysicalOperator>,
    limit: usize,
    offset: usize,
    skipped: usize,
    returned: usize,
}

impl LimitOperator {
    pub fn new(input: Box<dyn PhysicalOperator>, limit: usize, offset: usize) -> Self {
        Self {
            input,
            limit,
            offset,
            skipped: 0,
            returned: 0,
        }
    }
}

impl PhysicalOperator for LimitOperator {
    fn open(&mut self) -> PipeQueryResult<()> {
        self.skipped = 0;
        self.returned = 0;
        self.input.open()
    }

    fn has_next(&mut self) -> PipeQueryResult<bool> {
        if self.returned >= self.limit {
            return Ok(false);
        }
        while self.skipped < self.offset && self.input.has_next()? {
            self.input.next()?;
            self.skipped += 1;
        }
        if self.skipped < self.offset {
            return Ok(false);
        }
        self.input.has_next()
    }

    fn next(&mut self) -> PipeQueryResult<ExprValue> {
        if self.returned >= self.limit {
            return Err(no_pending_row("limit"));
        }
        let row = self.input.next()?;
        self.returned += 1;
        Ok(row)
    }

    fn close(&mut self) -> PipeQueryResult<()> {
        self.input.close()
    }
}

/// Leaf emitting literal rows as named tuples
#[derive(Debug)]
pub struct ValuesOperator {
    field_names: Vec<String>,
    rows: Vec<Vec<ExprValue>>,
    index: usize,
    opened: bool,
}

impl ValuesOperator {
    pub fn new(field_names: Vec<String>, rows: Vec<Vec<ExprValue>>) -> Self {
        Self {
            field_names,
            rows,
            index: 0,
            opened: false,
        }
    }
}

impl PhysicalOperator for ValuesOperator {
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
            return Err(no_pending_row("values"));
        }
        let row = &self.rows[self.index];
        self.index += 1;
        let entries = self
            .field_names
            .iter()
            .cloned()
            .zip(row.iter().cloned())
            .collect();
        Ok(ExprValue::tuple(entries))
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
    use crate::executor::execute;
    use crate::expression::aggregate::AggregateFunction;
    use crate::expression::window::{resolve_window_function, WindowDefinition};

    fn values(field: &str, data: &[i32]) -> Box<dyn PhysicalOperator> {
        Box::new(ValuesOperator::new(
            vec![field.to_string()],
            data.iter().map(|v| vec![ExprValue::Integer(*v)]).collect(),
        ))
    }

    fn field_values(rows: &[ExprValue], field: &str) -> Vec<ExprValue> {
        rows.iter().map(|row| row.tuple_get(field).unwrap()).collect()
    }

    fn int_ref(name: &str) -> Expression {
        Expression::reference(name, ExprType::Integer)
    }

    #[test]
    fn test_filter_rejects_false_null_and_missing() {
        let condition = Expression::function(
            ">",
            vec![int_ref("a"), Expression::literal(2)],
        )
        .unwrap();
        let mut operator = FilterOperator::new(values("a", &[1, 3, 2, 4]), condition);
        let rows = execute(&mut operator).unwrap();
        assert_eq!(
            field_values(&rows, "a"),
            vec![ExprValue::Integer(3), ExprValue::Integer(4)]
        );
    }

    #[test]
    fn test_eval_sees_earlier_results() {
        let doubled = Expression::function(
            "*",
            vec![int_ref("a"), Expression::literal(2)],
        )
        .unwrap();
        let plus_one = Expression::function(
            "+",
            vec![int_ref("b"), Expression::literal(1)],
        )
        .unwrap();
        let mut operator = EvalOperator::new(
            values("a", &[3]),
            vec![
                NamedExpression::new("b", doubled),
                NamedExpression::new("c", plus_one),
            ],
        );
        let rows = execute(&mut operator).unwrap();
        assert_eq!(rows[0].tuple_get("b").unwrap(), ExprValue::Integer(6));
        assert_eq!(rows[0].tuple_get("c").unwrap(), ExprValue::Integer(7));
    }

    #[test]
    fn test_aggregation_first_encounter_order() {
        let rows_in = vec![
            vec![ExprValue::String("b".into()), ExprValue::Integer(1)],
            vec![ExprValue::String("a".into()), ExprValue::Integer(2)],
            vec![ExprValue::String("b".into()), ExprValue::Integer(3)],
        ];
        let input = Box::new(ValuesOperator::new(
            vec!["k".to_string(), "v".to_string()],
            rows_in,
        ));
        let mut operator = AggregationOperator::new(
            input,
            vec![NamedAggregator::new(
                "total",
                AggregateFunction::Sum,
                int_ref("v"),
            )],
            vec![NamedExpression::new(
                "k",
                Expression::reference("k", ExprType::String),
            )],
        );
        let rows = execute(&mut operator).unwrap();
        assert_eq!(
            field_values(&rows, "k"),
            vec![ExprValue::String("b".into()), ExprValue::String("a".into())]
        );
        assert_eq!(
            field_values(&rows, "total"),
            vec![ExprValue::Long(4), ExprValue::Long(2)]
        );
    }

    #[test]
    fn test_dedupe_default_single_occurrence() {
        let mut operator = DedupeOperator::new(
            values("a", &[1, 1, 2, 1]),
            vec![int_ref("a")],
            1,
            false,
            false,
        );
        let rows = execute(&mut operator).unwrap();
        assert_eq!(
            field_values(&rows, "a"),
            vec![ExprValue::Integer(1), ExprValue::Integer(2)]
        );
    }

    #[test]
    fn test_dedupe_consecutive_resets_on_key_change() {
        let mut operator = DedupeOperator::new(
            values("a", &[1, 1, 2, 1]),
            vec![int_ref("a")],
            1,
            false,
            true,
        );
        let rows = execute(&mut operator).unwrap();
        assert_eq!(
            field_values(&rows, "a"),
            vec![
                ExprValue::Integer(1),
                ExprValue::Integer(2),
                ExprValue::Integer(1),
            ]
        );
    }

    #[test]
    fn test_dedupe_keep_empty_bypasses_bookkeeping() {
        let input = Box::new(ValuesOperator::new(
            vec!["a".to_string()],
            vec![
                vec![ExprValue::Integer(1)],
                vec![ExprValue::Null],
                vec![ExprValue::Integer(1)],
                vec![ExprValue::Null],
            ],
        ));
        let mut operator =
            DedupeOperator::new(input, vec![int_ref("a")], 1, true, false);
        let rows = execute(&mut operator).unwrap();
        assert_eq!(
            field_values(&rows, "a"),
            vec![ExprValue::Integer(1), ExprValue::Null, ExprValue::Null]
        );
    }

    #[test]
    fn test_sort_descending_with_null_last() {
        let input = Box::new(ValuesOperator::new(
            vec!["a".to_string()],
            vec![
                vec![ExprValue::Integer(2)],
                vec![ExprValue::Null],
                vec![ExprValue::Integer(3)],
                vec![ExprValue::Integer(1)],
            ],
        ));
        let mut operator = SortOperator::new(
            input,
            vec![SortKey::new(int_ref("a"), SortOption::desc())],
        );
        let rows = execute(&mut operator).unwrap();
        assert_eq!(
            field_values(&rows, "a"),
            vec![
                ExprValue::Integer(3),
                ExprValue::Integer(2),
                ExprValue::Integer(1),
                ExprValue::Null,
            ]
        );
    }

    #[test]
    fn test_sort_missing_before_null_when_null_first() {
        let input = Box::new(ValuesOperator::new(
            vec!["a".to_string()],
            vec![
                vec![ExprValue::Null],
                vec![ExprValue::Integer(1)],
                vec![ExprValue::Missing],
            ],
        ));
        let mut operator = SortOperator::new(
            input,
            vec![SortKey::new(int_ref("a"), SortOption::asc())],
        );
        let rows = execute(&mut operator).unwrap();
        assert_eq!(
            field_values(&rows, "a"),
            vec![ExprValue::Missing, ExprValue::Null, ExprValue::Integer(1)]
        );
    }

    #[test]
    fn test_limit_with_offset() {
        let mut operator = LimitOperator::new(values("a", &[1, 2, 3, 4]), 1, 1);
        let rows = execute(&mut operator).unwrap();
        assert_eq!(field_values(&rows, "a"), vec![ExprValue::Integer(2)]);
    }

    #[test]
    fn test_rare_top_n() {
        let data: Vec<Vec<ExprValue>> = ["a", "a", "a", "b", "b", "c"]
            .iter()
            .map(|v| vec![ExprValue::String((*v).into())])
            .collect();
        let fields = vec![NamedExpression::new(
            "k",
            Expression::reference("k", ExprType::String),
        )];
        let mut top = RareTopNOperator::new(
            Box::new(ValuesOperator::new(vec!["k".to_string()], data.clone())),
            CommandType::Top,
            1,
            fields.clone(),
            vec![],
        );
        let rows = execute(&mut top).unwrap();
        assert_eq!(field_values(&rows, "k"), vec![ExprValue::String("a".into())]);

        let mut rare = RareTopNOperator::new(
            Box::new(ValuesOperator::new(vec!["k".to_string()], data)),
            CommandType::Rare,
            1,
            fields,
            vec![],
        );
        let rows = execute(&mut rare).unwrap();
        assert_eq!(field_values(&rows, "k"), vec![ExprValue::String("c".into())]);
    }

    #[test]
    fn test_window_rank_over_sorted_input() {
        let definition = WindowDefinition::new(
            vec![],
            vec![(SortOption::asc(), int_ref("a"))],
        );
        let frame = CurrentRowWindowFrame::new(definition);
        let mut operator = WindowOperator::new(
            values("a", &[10, 10, 20, 30]),
            "rnk",
            resolve_window_function("rank").unwrap(),
            frame,
        );
        let rows = execute(&mut operator).unwrap();
        assert_eq!(
            field_values(&rows, "rnk"),
            vec![
                ExprValue::Integer(1),
                ExprValue::Integer(1),
                ExprValue::Integer(3),
                ExprValue::Integer(4),
            ]
        );
    }

    #[test]
    fn test_early_close_does_not_drain() {
        let mut operator = LimitOperator::new(values("a", &[1, 2, 3]), 1, 0);
        operator.open().unwrap();
        assert!(operator.has_next().unwrap());
        operator.next().unwrap();
        assert!(!operator.has_next().unwrap());
        operator.close().unwrap();
    }
}
