//! Binding environment: resolves field references against one row.
//!
//! A `BindingTuple` is owned by the operator that produced the row and passed
//! by reference to expression evaluation. The lazy variant defers building
//! the row until the first field is resolved, then memoizes it for the
//! lifetime of the tuple.

use crate::common::error::{PipeQueryError, PipeQueryResult};
use crate::data::value::ExprValue;
use crate::expression::expression::ReferenceExpression;
use std::cell::OnceCell;

/// One row's field-name-to-value resolution context
pub enum BindingTuple {
    /// Wraps a fully materialized tuple value
    Eager(ExprValue),
    /// Wraps a supplier invoked at most once, at first resolve call
    Lazy {
        supplier: Box<dyn Fn() -> ExprValue>,
        cache: OnceCell<ExprValue>,
    },
}

impl BindingTuple {
    /// Create an eager binding over a materialized tuple row
    pub fn new(row: ExprValue) -> Self {
        BindingTuple::Eager(row)
    }

    /// Create a lazy binding; `supplier` runs at most once per row
    pub fn lazy(supplier: impl Fn() -> ExprValue + 'static) -> Self {
        BindingTuple::Lazy {
            supplier: Box::new(supplier),
            cache: OnceCell::new(),
        }
    }

    /// The underlying tuple row, materializing the lazy supplier on first use
    pub fn row(&self) -> &ExprValue {
        match self {
            BindingTuple::Eager(row) => row,
            BindingTuple::Lazy { supplier, cache } => cache.get_or_init(supplier),
        }
    }

    /// Resolve a field reference to its value. A field present in the row
    /// resolves to its value (possibly NULL); a field not present resolves to
    /// MISSING. Fails only when the row is not a tuple.
    pub fn resolve(&self, reference: &ReferenceExpression) -> PipeQueryResult<ExprValue> {
        self.resolve_name(&reference.name)
    }

    /// Resolve by bare field name
    pub fn resolve_name(&self, name: &str) -> PipeQueryResult<ExprValue> {
        match self.row() {
            row @ ExprValue::Tuple(_) => row.tuple_get(name),
            other => Err(PipeQueryError::Evaluation(format!(
                "Cannot resolve field '{}' against non-tuple row {}",
                name, other
            ))),
        }
    }
}
