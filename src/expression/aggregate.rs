//! Aggregate functions and their per-group accumulators.
//!
//! Accumulators skip NULL and MISSING inputs. Over an empty or all-absent
//! group COUNT yields 0 and every other function yields NULL.

use crate::common::error::{PipeQueryError, PipeQueryResult};
use crate::data::types::ExprType;
use crate::data::value::ExprValue;
use crate::expression::expression::Expression;
use std::cmp::Ordering;
use std::fmt;

/// Builtin aggregate function set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    /// Resolve an aggregate function by name at plan compile time
    pub fn resolve(name: &str) -> PipeQueryResult<Self> {
        match name {
            "count" => Ok(Self::Count),
            "sum" => Ok(Self::Sum),
            "avg" => Ok(Self::Avg),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            other => Err(PipeQueryError::PlanCompile(format!(
                "Unresolved aggregate function: {}",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Static result type for the given input type
    pub fn return_type(&self, input: ExprType) -> PipeQueryResult<ExprType> {
        match self {
            Self::Count => Ok(ExprType::Integer),
            Self::Avg => self.require_numeric(input, ExprType::Double),
            Self::Sum => {
                let wide = match input {
                    ExprType::Integer | ExprType::Long => ExprType::Long,
                    ExprType::Float | ExprType::Double => ExprType::Double,
                    ExprType::Undefined => ExprType::Undefined,
                    _ => {
                        return Err(self.type_error(input));
                    }
                };
                Ok(wide)
            }
            Self::Min | Self::Max => match input {
                ExprType::Tuple | ExprType::Array => Err(PipeQueryError::Unsupported(format!(
                    "Aggregate '{}' cannot order {} values",
                    self.name(),
                    input
                ))),
                other => Ok(other),
            },
        }
    }

    fn require_numeric(&self, input: ExprType, result: ExprType) -> PipeQueryResult<ExprType> {
        if input.is_numeric() || input == ExprType::Undefined {
            Ok(result)
        } else {
            Err(self.type_error(input))
        }
    }

    fn type_error(&self, input: ExprType) -> PipeQueryError {
        PipeQueryError::TypeMismatch(format!(
            "Aggregate '{}' does not accept {} input",
            self.name(),
            input
        ))
    }

    pub fn create_accumulator(&self) -> Box<dyn Accumulator> {
        match self {
            Self::Count => Box::new(CountAccumulator::default()),
            Self::Sum => Box::new(SumAccumulator::default()),
            Self::Avg => Box::new(AvgAccumulator::default()),
            Self::Min => Box::new(ExtremeAccumulator::min()),
            Self::Max => Box::new(ExtremeAccumulator::max()),
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Running aggregate state for one group
pub trait Accumulator: fmt::Debug {
    /// Fold one input value into the state; absent values are ignored
    fn accumulate(&mut self, value: &ExprValue) -> PipeQueryResult<()>;

    fn result(&self) -> PipeQueryResult<ExprValue>;
}

/// Aggregate call bound to an output name and argument expression
#[derive(Debug, Clone, PartialEq)]
pub struct NamedAggregator {
    pub name: String,
    pub function: AggregateFunction,
    pub argument: Expression,
}

impl NamedAggregator {
    pub fn new(name: impl Into<String>, function: AggregateFunction, argument: Expression) -> Self {
        Self {
            name: name.into(),
            function,
            argument,
        }
    }
}

impl fmt::Display for NamedAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}({})", self.name, self.function, self.argument)
    }
}

#[derive(Debug, Default)]
struct CountAccumulator {
    count: i64,
}

impl Accumulator for CountAccumulator {
    fn accumulate(&mut self, value: &ExprValue) -> PipeQueryResult<()> {
        if !value.is_absent() {
            self.count += 1;
        }
        Ok(())
    }

    fn result(&self) -> PipeQueryResult<ExprValue> {
        // Counts past i32 range widen, matching scalar arithmetic
        match i32::try_from(self.count) {
            Ok(narrow) => Ok(ExprValue::Integer(narrow)),
            Err(_) => Ok(ExprValue::Long(self.count)),
        }
    }
}

#[derive(Debug, Default)]
struct SumAccumulator {
    integral: i64,
    fractional: f64,
    seen_float: bool,
    count: usize,
}

impl Accumulator for SumAccumulator {
    fn accumulate(&mut self, value: &ExprValue) -> PipeQueryResult<()> {
        match value {
            ExprValue::Null | ExprValue::Missing => {}
            ExprValue::Integer(_) | ExprValue::Long(_) => {
                self.integral = self
                    .integral
                    .checked_add(value.long_value()?)
                    .ok_or_else(|| crate::eval_err!("Integer overflow in sum"))?;
                self.count += 1;
            }
            _ => {
                self.fractional += value.double_value()?;
                self.seen_float = true;
                self.count += 1;
            }
        }
        Ok(())
    }

    fn result(&self) -> PipeQueryResult<ExprValue> {
        if self.count == 0 {
            return Ok(ExprValue::Null);
        }
        if self.seen_float {
            Ok(ExprValue::Double(self.fractional + self.integral as f64))
        } else {
            Ok(ExprValue::Long(self.integral))
        }
    }
}

#[derive(Debug, Default)]
struct AvgAccumulator {
    sum: f64,
    count: usize,
}

impl Accumulator for AvgAccumulator {
    fn accumulate(&mut self, value: &ExprValue) -> PipeQueryResult<()> {
        if !value.is_absent() {
            self.sum += value.double_value()?;
            self.count += 1;
        }
        Ok(())
    }

    fn result(&self) -> PipeQueryResult<ExprValue> {
        if self.count == 0 {
            Ok(ExprValue::Null)
        } else {
            Ok(ExprValue::Double(self.sum / self.count as f64))
        }
    }
}

#[derive(Debug)]
struct ExtremeAccumulator {
    keep: Ordering,
    best: Option<ExprValue>,
}

impl ExtremeAccumulator {
    fn min() -> Self {
        Self {
            keep: Ordering::Less,
            best: None,
        }
    }

    fn max() -> Self {
        Self {
            keep: Ordering::Greater,
            best: None,
        }
    }
}

impl Accumulator for ExtremeAccumulator {
    fn accumulate(&mut self, value: &ExprValue) -> PipeQueryResult<()> {
        if value.is_absent() {
            return Ok(());
        }
        match &self.best {
            None => self.best = Some(value.clone()),
            Some(best) => {
                if value.compare(best)? == self.keep {
                    self.best = Some(value.clone());
                }
            }
        }
        Ok(())
    }

    fn result(&self) -> PipeQueryResult<ExprValue> {
        Ok(self.best.clone().unwrap_or(ExprValue::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(function: AggregateFunction, values: &[ExprValue]) -> ExprValue {
        let mut acc = function.create_accumulator();
        for value in values {
            acc.accumulate(value).unwrap();
        }
        acc.result().unwrap()
    }

    #[test]
    fn test_count_skips_absent() {
        let values = [
            ExprValue::Integer(1),
            ExprValue::Null,
            ExprValue::Missing,
            ExprValue::Integer(2),
        ];
        assert_eq!(fold(AggregateFunction::Count, &values), ExprValue::Integer(2));
    }

    #[test]
    fn test_sum_integer_stays_integral() {
        let values = [ExprValue::Integer(1), ExprValue::Long(2)];
        assert_eq!(fold(AggregateFunction::Sum, &values), ExprValue::Long(3));
    }

    #[test]
    fn test_sum_widens_on_float() {
        let values = [ExprValue::Integer(1), ExprValue::Double(0.5)];
        assert_eq!(fold(AggregateFunction::Sum, &values), ExprValue::Double(1.5));
    }

    #[test]
    fn test_empty_group_results() {
        assert_eq!(fold(AggregateFunction::Count, &[]), ExprValue::Integer(0));
        assert_eq!(fold(AggregateFunction::Sum, &[]), ExprValue::Null);
        assert_eq!(fold(AggregateFunction::Avg, &[]), ExprValue::Null);
        assert_eq!(fold(AggregateFunction::Min, &[]), ExprValue::Null);
    }

    #[test]
    fn test_min_max() {
        let values = [
            ExprValue::Integer(3),
            ExprValue::Null,
            ExprValue::Integer(1),
            ExprValue::Integer(2),
        ];
        assert_eq!(fold(AggregateFunction::Min, &values), ExprValue::Integer(1));
        assert_eq!(fold(AggregateFunction::Max, &values), ExprValue::Integer(3));
    }

    #[test]
    fn test_avg() {
        let values = [ExprValue::Integer(1), ExprValue::Integer(2)];
        assert_eq!(fold(AggregateFunction::Avg, &values), ExprValue::Double(1.5));
    }

    #[test]
    fn test_sum_overflow_is_an_error() {
        let mut acc = AggregateFunction::Sum.create_accumulator();
        acc.accumulate(&ExprValue::Long(i64::MAX)).unwrap();
        let overflow = acc.accumulate(&ExprValue::Long(1));
        assert!(matches!(overflow, Err(PipeQueryError::Evaluation(_))));
    }

    #[test]
    fn test_min_over_tuple_is_unsupported() {
        let result = AggregateFunction::Min.return_type(ExprType::Tuple);
        assert!(matches!(result, Err(PipeQueryError::Unsupported(_))));
        let result = AggregateFunction::Max.return_type(ExprType::Array);
        assert!(matches!(result, Err(PipeQueryError::Unsupported(_))));
    }

    #[test]
    fn test_unresolved_aggregate() {
        assert!(AggregateFunction::resolve("median").is_err());
    }
}
