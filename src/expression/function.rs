//! Scalar function registry and builtin implementations.
//!
//! Function names resolve to implementations at plan-build time. Ordinary
//! scalar functions propagate NULL/MISSING arguments to NULL before their
//! body runs; the logical connectives and null-inspection functions opt out
//! and apply three-valued logic over the raw values.

use crate::common::error::{PipeQueryError, PipeQueryResult};
use crate::data::types::ExprType;
use crate::data::value::ExprValue;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A registered scalar function implementation
pub trait ScalarFunction: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Static result type for the given argument types; fails plan
    /// compilation on arity or type errors
    fn return_type(&self, arg_types: &[ExprType]) -> PipeQueryResult<ExprType>;

    /// Evaluate over already-computed argument values
    fn eval(&self, args: &[ExprValue]) -> PipeQueryResult<ExprValue>;

    /// Whether absent arguments short-circuit to NULL before `eval`
    fn propagates_null(&self) -> bool {
        true
    }
}

/// Registry of scalar functions keyed by name
pub struct FunctionRegistry {
    scalar: HashMap<String, Arc<dyn ScalarFunction>>,
}

impl FunctionRegistry {
    /// Registry pre-populated with the builtin function set
    pub fn builtin() -> Self {
        let mut registry = Self {
            scalar: HashMap::new(),
        };
        for function in builtin_functions() {
            registry.register(function);
        }
        registry
    }

    pub fn register(&mut self, function: Arc<dyn ScalarFunction>) {
        self.scalar.insert(function.name().to_string(), function);
    }

    /// Resolve a scalar function by name; unknown names are a compile error
    pub fn resolve_scalar(&self, name: &str) -> PipeQueryResult<Arc<dyn ScalarFunction>> {
        self.scalar
            .get(name)
            .cloned()
            .ok_or_else(|| PipeQueryError::PlanCompile(format!("Unresolved function: {}", name)))
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Builtin function backed by plain function pointers
struct BuiltinScalar {
    name: &'static str,
    propagates: bool,
    typer: fn(&str, &[ExprType]) -> PipeQueryResult<ExprType>,
    body: fn(&[ExprValue]) -> PipeQueryResult<ExprValue>,
}

impl fmt::Debug for BuiltinScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinScalar")
            .field("name", &self.name)
            .finish()
    }
}

impl ScalarFunction for BuiltinScalar {
    fn name(&self) -> &str {
        self.name
    }

    fn return_type(&self, arg_types: &[ExprType]) -> PipeQueryResult<ExprType> {
        (self.typer)(self.name, arg_types)
    }

    fn eval(&self, args: &[ExprValue]) -> PipeQueryResult<ExprValue> {
        (self.body)(args)
    }

    fn propagates_null(&self) -> bool {
        self.propagates
    }
}

fn builtin_functions() -> Vec<Arc<dyn ScalarFunction>> {
    let defs: Vec<BuiltinScalar> = vec![
        BuiltinScalar {
            name: "+",
            propagates: true,
            typer: arithmetic_type,
            body: |args| arithmetic(args, i64::checked_add, |a, b| a + b),
        },
        BuiltinScalar {
            name: "-",
            propagates: true,
            typer: arithmetic_type,
            body: |args| arithmetic(args, i64::checked_sub, |a, b| a - b),
        },
        BuiltinScalar {
            name: "*",
            propagates: true,
            typer: arithmetic_type,
            body: |args| arithmetic(args, i64::checked_mul, |a, b| a * b),
        },
        BuiltinScalar {
            name: "/",
            propagates: true,
            typer: arithmetic_type,
            body: |args| arithmetic(args, i64::checked_div, |a, b| a / b),
        },
        BuiltinScalar {
            name: "%",
            propagates: true,
            typer: arithmetic_type,
            body: |args| arithmetic(args, i64::checked_rem, |a, b| a % b),
        },
        BuiltinScalar {
            name: "=",
            propagates: true,
            typer: comparison_type,
            body: |args| comparison(args, |ord| ord == Ordering::Equal),
        },
        BuiltinScalar {
            name: "!=",
            propagates: true,
            typer: comparison_type,
            body: |args| comparison(args, |ord| ord != Ordering::Equal),
        },
        BuiltinScalar {
            name: "<",
            propagates: true,
            typer: comparison_type,
            body: |args| comparison(args, |ord| ord == Ordering::Less),
        },
        BuiltinScalar {
            name: "<=",
            propagates: true,
            typer: comparison_type,
            body: |args| comparison(args, |ord| ord != Ordering::Greater),
        },
        BuiltinScalar {
            name: ">",
            propagates: true,
            typer: comparison_type,
            body: |args| comparison(args, |ord| ord == Ordering::Greater),
        },
        BuiltinScalar {
            name: ">=",
            propagates: true,
            typer: comparison_type,
            body: |args| comparison(args, |ord| ord != Ordering::Less),
        },
        BuiltinScalar {
            name: "and",
            propagates: false,
            typer: connective_type,
            body: and_body,
        },
        BuiltinScalar {
            name: "or",
            propagates: false,
            typer: connective_type,
            body: or_body,
        },
        BuiltinScalar {
            name: "not",
            propagates: false,
            typer: not_type,
            body: not_body,
        },
        BuiltinScalar {
            name: "is_null",
            propagates: false,
            typer: inspection_type,
            body: |args| Ok(ExprValue::Boolean(args[0].is_absent())),
        },
        BuiltinScalar {
            name: "is_missing",
            propagates: false,
            typer: inspection_type,
            body: |args| Ok(ExprValue::Boolean(args[0].is_missing())),
        },
        BuiltinScalar {
            name: "if_null",
            propagates: false,
            typer: if_null_type,
            body: |args| {
                Ok(if args[0].is_absent() {
                    args[1].clone()
                } else {
                    args[0].clone()
                })
            },
        },
        BuiltinScalar {
            name: "abs",
            propagates: true,
            typer: abs_type,
            body: abs_body,
        },
        BuiltinScalar {
            name: "lower",
            propagates: true,
            typer: |name, args| string_type(name, args, 1),
            body: |args| Ok(ExprValue::String(args[0].string_value()?.to_lowercase())),
        },
        BuiltinScalar {
            name: "upper",
            propagates: true,
            typer: |name, args| string_type(name, args, 1),
            body: |args| Ok(ExprValue::String(args[0].string_value()?.to_uppercase())),
        },
        BuiltinScalar {
            name: "concat",
            propagates: true,
            typer: |name, args| string_type(name, args, 2),
            body: |args| {
                let mut out = args[0].string_value()?.to_string();
                out.push_str(args[1].string_value()?);
                Ok(ExprValue::String(out))
            },
        },
    ];
    defs.into_iter()
        .map(|def| Arc::new(def) as Arc<dyn ScalarFunction>)
        .collect()
}

fn expect_arity(name: &str, arg_types: &[ExprType], arity: usize) -> PipeQueryResult<()> {
    if arg_types.len() != arity {
        return Err(PipeQueryError::PlanCompile(format!(
            "Function '{}' expects {} argument(s), got {}",
            name,
            arity,
            arg_types.len()
        )));
    }
    Ok(())
}

fn arithmetic_type(name: &str, arg_types: &[ExprType]) -> PipeQueryResult<ExprType> {
    expect_arity(name, arg_types, 2)?;
    let (a, b) = (arg_types[0], arg_types[1]);
    match (a, b) {
        (ExprType::Undefined, ExprType::Undefined) => Ok(ExprType::Undefined),
        (ExprType::Undefined, other) | (other, ExprType::Undefined) if other.is_numeric() => {
            Ok(other)
        }
        _ => ExprType::widest(a, b).ok_or_else(|| {
            PipeQueryError::TypeMismatch(format!(
                "Operator '{}' requires numeric operands, got {} and {}",
                name, a, b
            ))
        }),
    }
}

fn comparison_type(name: &str, arg_types: &[ExprType]) -> PipeQueryResult<ExprType> {
    expect_arity(name, arg_types, 2)?;
    if !arg_types[0].is_compatible(&arg_types[1]) {
        return Err(PipeQueryError::TypeMismatch(format!(
            "Operator '{}' cannot compare {} and {}",
            name, arg_types[0], arg_types[1]
        )));
    }
    Ok(ExprType::Boolean)
}

fn connective_type(name: &str, arg_types: &[ExprType]) -> PipeQueryResult<ExprType> {
    expect_arity(name, arg_types, 2)?;
    for ty in arg_types {
        if *ty != ExprType::Boolean && *ty != ExprType::Undefined {
            return Err(PipeQueryError::TypeMismatch(format!(
                "Operator '{}' requires boolean operands, got {}",
                name, ty
            )));
        }
    }
    Ok(ExprType::Boolean)
}

fn not_type(name: &str, arg_types: &[ExprType]) -> PipeQueryResult<ExprType> {
    expect_arity(name, arg_types, 1)?;
    if arg_types[0] != ExprType::Boolean && arg_types[0] != ExprType::Undefined {
        return Err(PipeQueryError::TypeMismatch(format!(
            "Operator '{}' requires a boolean operand, got {}",
            name, arg_types[0]
        )));
    }
    Ok(ExprType::Boolean)
}

fn inspection_type(name: &str, arg_types: &[ExprType]) -> PipeQueryResult<ExprType> {
    expect_arity(name, arg_types, 1)?;
    Ok(ExprType::Boolean)
}

fn if_null_type(name: &str, arg_types: &[ExprType]) -> PipeQueryResult<ExprType> {
    expect_arity(name, arg_types, 2)?;
    if !arg_types[0].is_compatible(&arg_types[1]) {
        return Err(PipeQueryError::TypeMismatch(format!(
            "Function '{}' requires compatible arguments, got {} and {}",
            name, arg_types[0], arg_types[1]
        )));
    }
    Ok(if arg_types[0] == ExprType::Undefined {
        arg_types[1]
    } else {
        arg_types[0]
    })
}

fn abs_type(name: &str, arg_types: &[ExprType]) -> PipeQueryResult<ExprType> {
    expect_arity(name, arg_types, 1)?;
    if arg_types[0] == ExprType::Undefined {
        return Ok(ExprType::Undefined);
    }
    if !arg_types[0].is_numeric() {
        return Err(PipeQueryError::TypeMismatch(format!(
            "Function '{}' requires a numeric argument, got {}",
            name, arg_types[0]
        )));
    }
    Ok(arg_types[0])
}

fn string_type(name: &str, arg_types: &[ExprType], arity: usize) -> PipeQueryResult<ExprType> {
    expect_arity(name, arg_types, arity)?;
    for ty in arg_types {
        if *ty != ExprType::String && *ty != ExprType::Undefined {
            return Err(PipeQueryError::TypeMismatch(format!(
                "Function '{}' requires string arguments, got {}",
                name, ty
            )));
        }
    }
    Ok(ExprType::String)
}

/// Binary arithmetic with numeric widening. Integer and long operands run on
/// the checked integer path; floats on the double path. The result carries
/// the wider operand type.
fn arithmetic(
    args: &[ExprValue],
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> PipeQueryResult<ExprValue> {
    let (a, b) = (&args[0], &args[1]);
    let widest = ExprType::widest(a.expr_type(), b.expr_type()).ok_or_else(|| {
        PipeQueryError::TypeMismatch(format!(
            "Arithmetic requires numeric operands, got {} and {}",
            a.expr_type(),
            b.expr_type()
        ))
    })?;
    match widest {
        ExprType::Integer | ExprType::Long => {
            let (x, y) = (a.long_value()?, b.long_value()?);
            if y == 0 && int_op(1, 0).is_none() {
                return Err(PipeQueryError::Evaluation(format!(
                    "Division by zero: {} and {}",
                    a, b
                )));
            }
            let result = int_op(x, y).ok_or_else(|| {
                PipeQueryError::Evaluation(format!("Integer overflow on {} and {}", a, b))
            })?;
            if widest == ExprType::Integer {
                match i32::try_from(result) {
                    Ok(narrow) => Ok(ExprValue::Integer(narrow)),
                    Err(_) => Ok(ExprValue::Long(result)),
                }
            } else {
                Ok(ExprValue::Long(result))
            }
        }
        ExprType::Float => {
            let result = float_op(a.double_value()?, b.double_value()?);
            Ok(ExprValue::Float(result as f32))
        }
        _ => Ok(ExprValue::Double(float_op(
            a.double_value()?,
            b.double_value()?,
        ))),
    }
}

fn comparison(args: &[ExprValue], test: fn(Ordering) -> bool) -> PipeQueryResult<ExprValue> {
    let ordering = args[0].compare(&args[1])?;
    Ok(ExprValue::Boolean(test(ordering)))
}

// Kleene three-valued logic: absent operands are UNKNOWN.
fn and_body(args: &[ExprValue]) -> PipeQueryResult<ExprValue> {
    let (a, b) = (truth(&args[0])?, truth(&args[1])?);
    Ok(match (a, b) {
        (Some(false), _) | (_, Some(false)) => ExprValue::Boolean(false),
        (Some(true), Some(true)) => ExprValue::Boolean(true),
        _ => ExprValue::Null,
    })
}

fn or_body(args: &[ExprValue]) -> PipeQueryResult<ExprValue> {
    let (a, b) = (truth(&args[0])?, truth(&args[1])?);
    Ok(match (a, b) {
        (Some(true), _) | (_, Some(true)) => ExprValue::Boolean(true),
        (Some(false), Some(false)) => ExprValue::Boolean(false),
        _ => ExprValue::Null,
    })
}

fn not_body(args: &[ExprValue]) -> PipeQueryResult<ExprValue> {
    Ok(match truth(&args[0])? {
        Some(value) => ExprValue::Boolean(!value),
        None => ExprValue::Null,
    })
}

fn truth(value: &ExprValue) -> PipeQueryResult<Option<bool>> {
    if value.is_absent() {
        Ok(None)
    } else {
        Ok(Some(value.boolean_value()?))
    }
}

fn abs_body(args: &[ExprValue]) -> PipeQueryResult<ExprValue> {
    match &args[0] {
        ExprValue::Integer(i) => Ok(ExprValue::Integer(i.abs())),
        ExprValue::Long(i) => Ok(ExprValue::Long(i.abs())),
        ExprValue::Float(f) => Ok(ExprValue::Float(f.abs())),
        ExprValue::Double(f) => Ok(ExprValue::Double(f.abs())),
        other => Err(PipeQueryError::TypeMismatch(format!(
            "Function 'abs' requires a numeric argument, got {}",
            other.expr_type()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(name: &str, args: &[ExprValue]) -> PipeQueryResult<ExprValue> {
        FunctionRegistry::builtin()
            .resolve_scalar(name)
            .unwrap()
            .eval(args)
    }

    #[test]
    fn test_arithmetic_widening() {
        assert_eq!(
            eval("+", &[ExprValue::Integer(1), ExprValue::Integer(2)]).unwrap(),
            ExprValue::Integer(3)
        );
        assert_eq!(
            eval("+", &[ExprValue::Integer(1), ExprValue::Long(2)]).unwrap(),
            ExprValue::Long(3)
        );
        assert_eq!(
            eval("*", &[ExprValue::Integer(2), ExprValue::Double(1.5)]).unwrap(),
            ExprValue::Double(3.0)
        );
    }

    #[test]
    fn test_integer_division_by_zero() {
        let result = eval("/", &[ExprValue::Integer(1), ExprValue::Integer(0)]);
        assert!(matches!(result, Err(PipeQueryError::Evaluation(_))));
    }

    #[test]
    fn test_three_valued_and_or() {
        let t = ExprValue::Boolean(true);
        let f = ExprValue::Boolean(false);
        assert_eq!(
            eval("and", &[f.clone(), ExprValue::Null]).unwrap(),
            ExprValue::Boolean(false)
        );
        assert_eq!(eval("and", &[t.clone(), ExprValue::Null]).unwrap(), ExprValue::Null);
        assert_eq!(
            eval("or", &[t.clone(), ExprValue::Missing]).unwrap(),
            ExprValue::Boolean(true)
        );
        assert_eq!(eval("or", &[f, ExprValue::Missing]).unwrap(), ExprValue::Null);
        assert_eq!(eval("not", &[ExprValue::Null]).unwrap(), ExprValue::Null);
        assert_eq!(eval("not", &[t]).unwrap(), ExprValue::Boolean(false));
    }

    #[test]
    fn test_null_inspection() {
        assert_eq!(
            eval("is_null", &[ExprValue::Null]).unwrap(),
            ExprValue::Boolean(true)
        );
        assert_eq!(
            eval("is_missing", &[ExprValue::Null]).unwrap(),
            ExprValue::Boolean(false)
        );
        assert_eq!(
            eval("is_missing", &[ExprValue::Missing]).unwrap(),
            ExprValue::Boolean(true)
        );
        assert_eq!(
            eval("if_null", &[ExprValue::Null, ExprValue::Integer(3)]).unwrap(),
            ExprValue::Integer(3)
        );
    }

    #[test]
    fn test_comparison_type_check_rejects_incompatible() {
        let registry = FunctionRegistry::builtin();
        let function = registry.resolve_scalar("=").unwrap();
        let result = function.return_type(&[ExprType::Integer, ExprType::String]);
        assert!(matches!(result, Err(PipeQueryError::TypeMismatch(_))));
    }
}
