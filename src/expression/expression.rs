//! Core expression types for PipeQuery
//!
//! Expressions are immutable, side-effect free, and safely re-evaluable.
//! Every expression reports its static type without evaluating, and
//! evaluates against a `BindingTuple` to produce exactly one `ExprValue`.

use crate::common::error::{PipeQueryError, PipeQueryResult};
use crate::data::types::ExprType;
use crate::data::value::ExprValue;
use crate::expression::function::{FunctionRegistry, ScalarFunction};
use crate::expression::window::WindowDefinition;
use crate::storage::binding::BindingTuple;
use std::fmt;
use std::sync::Arc;

/// Typed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant value
    Literal(ExprValue),
    /// Reference to a named field of the current row
    Reference(ReferenceExpression),
    /// Call to a scalar function, resolved at plan-build time
    Function(FunctionExpression),
    /// Expression with a name and optional alias
    Named(Box<NamedExpression>),
    /// Window function over a partition/sort definition; evaluated by the
    /// window operator, never directly
    Window(Box<WindowExpression>),
}

impl Expression {
    /// Shorthand for a literal expression
    pub fn literal(value: impl Into<ExprValue>) -> Self {
        Expression::Literal(value.into())
    }

    /// Shorthand for a field reference
    pub fn reference(name: impl Into<String>, expr_type: ExprType) -> Self {
        Expression::Reference(ReferenceExpression::new(name, expr_type))
    }

    /// Shorthand for a function call resolved against the builtin registry
    pub fn function(name: &str, args: Vec<Expression>) -> PipeQueryResult<Self> {
        let registry = FunctionRegistry::builtin();
        Ok(Expression::Function(FunctionExpression::resolve(
            name, args, &registry,
        )?))
    }

    /// Evaluate this expression against one row's binding environment
    pub fn value_of(&self, env: &BindingTuple) -> PipeQueryResult<ExprValue> {
        match self {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Reference(reference) => env.resolve(reference),
            Expression::Function(function) => function.value_of(env),
            Expression::Named(named) => named.delegate.value_of(env),
            Expression::Window(window) => Err(PipeQueryError::Evaluation(format!(
                "Window function '{}' evaluated outside a window operator",
                window.function_name
            ))),
        }
    }

    /// Static type of this expression, available without evaluation
    pub fn expr_type(&self) -> ExprType {
        match self {
            Expression::Literal(value) => value.expr_type(),
            Expression::Reference(reference) => reference.expr_type,
            Expression::Function(function) => function.return_type,
            Expression::Named(named) => named.delegate.expr_type(),
            // Ranking window functions all produce integer ranks
            Expression::Window(_) => ExprType::Integer,
        }
    }

    /// Collect the names of all fields this expression references
    pub fn references(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_references(&mut names);
        names
    }

    fn collect_references(&self, names: &mut Vec<String>) {
        match self {
            Expression::Literal(_) => {}
            Expression::Reference(reference) => {
                if !names.contains(&reference.name) {
                    names.push(reference.name.clone());
                }
            }
            Expression::Function(function) => {
                for arg in &function.args {
                    arg.collect_references(names);
                }
            }
            Expression::Named(named) => named.delegate.collect_references(names),
            Expression::Window(window) => {
                for expr in &window.definition.partition_by {
                    expr.collect_references(names);
                }
                for (_, expr) in &window.definition.sort_list {
                    expr.collect_references(names);
                }
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::Reference(reference) => write!(f, "{}", reference.name),
            Expression::Function(function) => {
                write!(f, "{}(", function.name)?;
                for (i, arg) in function.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expression::Named(named) => write!(f, "{}", named.name_or_alias()),
            Expression::Window(window) => write!(f, "{}() over (...)", window.function_name),
        }
    }
}

/// Reference to a named field with its declared static type
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceExpression {
    pub name: String,
    pub expr_type: ExprType,
}

impl ReferenceExpression {
    pub fn new(name: impl Into<String>, expr_type: ExprType) -> Self {
        Self {
            name: name.into(),
            expr_type,
        }
    }
}

/// Scalar function call bound to a registered implementation.
///
/// Resolution happens at build time: an unresolvable function name fails
/// plan compilation, not per-row evaluation.
#[derive(Debug, Clone)]
pub struct FunctionExpression {
    pub name: String,
    pub args: Vec<Expression>,
    pub return_type: ExprType,
    function: Arc<dyn ScalarFunction>,
}

impl FunctionExpression {
    /// Resolve a function call against the registry, type-checking the
    /// argument list
    pub fn resolve(
        name: &str,
        args: Vec<Expression>,
        registry: &FunctionRegistry,
    ) -> PipeQueryResult<Self> {
        let function = registry.resolve_scalar(name)?;
        let arg_types: Vec<ExprType> = args.iter().map(|arg| arg.expr_type()).collect();
        let return_type = function.return_type(&arg_types)?;
        Ok(Self {
            name: name.to_string(),
            args,
            return_type,
            function,
        })
    }

    fn value_of(&self, env: &BindingTuple) -> PipeQueryResult<ExprValue> {
        let mut values = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            values.push(arg.value_of(env)?);
        }
        // NULL/MISSING propagate to NULL for ordinary scalar functions;
        // logical connectives and null-inspection functions see the raw
        // values and apply three-valued logic themselves.
        if self.function.propagates_null() && values.iter().any(|v| v.is_absent()) {
            return Ok(ExprValue::Null);
        }
        self.function.eval(&values)
    }
}

impl PartialEq for FunctionExpression {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.args == other.args
            && self.return_type == other.return_type
    }
}

/// Named expression: a delegate with a name and optional alias. The alias,
/// when set and non-empty, becomes the output column key downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedExpression {
    pub name: String,
    pub delegate: Expression,
    pub alias: Option<String>,
}

impl NamedExpression {
    pub fn new(name: impl Into<String>, delegate: Expression) -> Self {
        Self {
            name: name.into(),
            delegate,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The alias if set and non-empty, else the base name
    pub fn name_or_alias(&self) -> &str {
        match &self.alias {
            Some(alias) if !alias.is_empty() => alias,
            _ => &self.name,
        }
    }

    pub fn value_of(&self, env: &BindingTuple) -> PipeQueryResult<ExprValue> {
        self.delegate.value_of(env)
    }

    pub fn expr_type(&self) -> ExprType {
        self.delegate.expr_type()
    }
}

/// Window function call with its window definition
#[derive(Debug, Clone, PartialEq)]
pub struct WindowExpression {
    pub function_name: String,
    pub definition: WindowDefinition,
}

impl WindowExpression {
    pub fn new(function_name: impl Into<String>, definition: WindowDefinition) -> Self {
        Self {
            function_name: function_name.into(),
            definition,
        }
    }
}

/// Sort direction and null placement for one sort key.
///
/// Default null placement follows the three-valued convention: NULLS FIRST
/// for ascending keys, NULLS LAST for descending, unless overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOption {
    pub ascending: bool,
    pub null_first: bool,
}

impl SortOption {
    pub fn asc() -> Self {
        Self {
            ascending: true,
            null_first: true,
        }
    }

    pub fn desc() -> Self {
        Self {
            ascending: false,
            null_first: false,
        }
    }

    pub fn with_null_first(mut self, null_first: bool) -> Self {
        self.null_first = null_first;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::function::FunctionRegistry;

    #[test]
    fn test_named_expression_name_or_alias() {
        let base = Expression::literal(1);
        let named = NamedExpression::new("count", base.clone());
        assert_eq!(named.name_or_alias(), "count");

        let aliased = NamedExpression::new("count", base.clone()).with_alias("total");
        assert_eq!(aliased.name_or_alias(), "total");

        let empty_alias = NamedExpression::new("count", base).with_alias("");
        assert_eq!(empty_alias.name_or_alias(), "count");
    }

    #[test]
    fn test_unresolved_function_fails_at_build_time() {
        let registry = FunctionRegistry::builtin();
        let result = FunctionExpression::resolve("no_such_fn", vec![], &registry);
        assert!(matches!(
            result,
            Err(PipeQueryError::PlanCompile(message)) if message.contains("no_such_fn")
        ));
    }

    #[test]
    fn test_literal_and_reference_evaluation() {
        let env = BindingTuple::new(ExprValue::tuple(vec![(
            "age".to_string(),
            ExprValue::Integer(30),
        )]));
        assert_eq!(
            Expression::literal(7).value_of(&env).unwrap(),
            ExprValue::Integer(7)
        );
        assert_eq!(
            Expression::reference("age", ExprType::Integer)
                .value_of(&env)
                .unwrap(),
            ExprValue::Integer(30)
        );
        assert_eq!(
            Expression::reference("unset", ExprType::Integer)
                .value_of(&env)
                .unwrap(),
            ExprValue::Missing
        );
    }

    #[test]
    fn test_references_collection() {
        let registry = FunctionRegistry::builtin();
        let expr = Expression::Function(
            FunctionExpression::resolve(
                "+",
                vec![
                    Expression::reference("a", ExprType::Integer),
                    Expression::reference("b", ExprType::Integer),
                ],
                &registry,
            )
            .unwrap(),
        );
        assert_eq!(expr.references(), vec!["a".to_string(), "b".to_string()]);
    }
}
