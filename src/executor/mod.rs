//! Physical execution: the pull-iterator operator contract and the
//! operator implementations.
//!
//! Operators follow an open/has_next/next/close lifecycle. `open`
//! propagates to the leaves before any row flows, `next` is only valid
//! after `has_next` reported a row, and `close` releases the whole chain
//! even when iteration stops early.

pub mod operators;

use crate::common::error::PipeQueryResult;
use crate::data::value::ExprValue;
use std::fmt;

pub trait PhysicalOperator: fmt::Debug {
    fn open(&mut self) -> PipeQueryResult<()>;

    fn has_next(&mut self) -> PipeQueryResult<bool>;

    /// Produce the next row. Calling without a preceding successful
    /// `has_next` is an evaluation error.
    fn next(&mut self) -> PipeQueryResult<ExprValue>;

    fn close(&mut self) -> PipeQueryResult<()>;
}

/// Drive an operator tree to completion, closing it on both the success
/// and the error path
pub fn execute(operator: &mut dyn PhysicalOperator) -> PipeQueryResult<Vec<ExprValue>> {
    operator.open()?;
    let mut rows = Vec::new();
    let outcome = drain(operator, &mut rows);
    let closed = operator.close();
    outcome?;
    closed?;
    Ok(rows)
}

fn drain(operator: &mut dyn PhysicalOperator, rows: &mut Vec<ExprValue>) -> PipeQueryResult<()> {
    while operator.has_next()? {
        rows.push(operator.next()?);
    }
    Ok(())
}
