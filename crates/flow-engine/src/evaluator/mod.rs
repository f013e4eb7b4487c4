//! Condition evaluation and template interpolation
//!
//! Conditions are small boolean expressions written against context variable
//! names, e.g. `result.status === 'ok' && hasNodeResult('fetch')`. They are
//! parsed and interpreted here; the only bindings an expression can reach are
//! those exposed by an [`ExpressionScope`]: the context's variables and the two
//! helpers `getNodeResult(id)` and `hasNodeResult(id)`.
//!
//! Values follow JavaScript-like rules for truthiness, loose/strict equality,
//! and `+` on strings, since that is what graph authors write.

pub mod lexer;
pub mod parser;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::context::VariableContext;
use crate::error::{FlowError, Result};
use parser::{BinaryOp, Expr, UnaryOp};

/// Variable name used when a node's output is not an object
pub const SCALAR_OUTPUT_KEY: &str = "result";

const HELPER_GET_NODE_RESULT: &str = "getNodeResult";
const HELPER_HAS_NODE_RESULT: &str = "hasNodeResult";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("placeholder pattern is valid")
});

/// The complete set of bindings visible to a condition expression
pub trait ExpressionScope {
    /// Look up a context variable
    fn variable(&self, name: &str) -> Option<&Value>;

    /// Full output of a previously executed node
    fn node_output(&self, node_id: &str) -> Option<&Value>;

    /// Whether a node has executed in this run
    fn has_node_result(&self, node_id: &str) -> bool;
}

/// Evaluate a boolean expression against a scope
pub fn evaluate_condition<S: ExpressionScope + ?Sized>(expression: &str, scope: &S) -> Result<bool> {
    let tokens = lexer::tokenize(expression).map_err(|e| FlowError::expression(expression, e))?;
    let expr = parser::parse(&tokens).map_err(|e| FlowError::expression(expression, e))?;
    let value = eval(&expr, scope).map_err(|e| FlowError::expression(expression, e))?;
    Ok(is_truthy(&value))
}

/// Replace `{{name}}` placeholders with variable values.
///
/// Unknown names are left verbatim.
pub fn interpolate_variables(template: &str, variables: &VariableContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| match variables.get(&caps[1]) {
            Some(value) => to_display_string(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Turn a node output into context variables.
///
/// Objects contribute one variable per top-level field (nested values kept
/// as-is). Any other non-null value is stored under [`SCALAR_OUTPUT_KEY`].
pub fn extract_variables(output: &Value) -> Map<String, Value> {
    match output {
        Value::Object(fields) => fields.clone(),
        Value::Null => Map::new(),
        other => {
            let mut vars = Map::new();
            vars.insert(SCALAR_OUTPUT_KEY.to_string(), other.clone());
            vars
        }
    }
}

/// JavaScript truthiness
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String form used by templates and string concatenation
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format_number(f),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// JSON value for a computed number; whole numbers become integers
pub(crate) fn number(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn format_number(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => f64::NAN,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_))
        | (Value::Bool(_), _)
        | (_, Value::Bool(_)) => to_number(a) == to_number(b),
        _ => strict_eq(a, b),
    }
}

fn compare(op: BinaryOp, a: &Value, b: &Value) -> bool {
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return match op {
            BinaryOp::Lt => x < y,
            BinaryOp::Le => x <= y,
            BinaryOp::Gt => x > y,
            _ => x >= y,
        };
    }
    let (x, y) = (to_number(a), to_number(b));
    match op {
        BinaryOp::Lt => x < y,
        BinaryOp::Le => x <= y,
        BinaryOp::Gt => x > y,
        _ => x >= y,
    }
}

fn binary(op: BinaryOp, a: &Value, b: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            let stringy = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
            if stringy(a) || stringy(b) {
                Value::String(format!("{}{}", to_display_string(a), to_display_string(b)))
            } else {
                number(to_number(a) + to_number(b))
            }
        }
        BinaryOp::Sub => number(to_number(a) - to_number(b)),
        BinaryOp::Mul => number(to_number(a) * to_number(b)),
        BinaryOp::Div => number(to_number(a) / to_number(b)),
        BinaryOp::Rem => number(to_number(a) % to_number(b)),
        BinaryOp::StrictEq => Value::Bool(strict_eq(a, b)),
        BinaryOp::StrictNe => Value::Bool(!strict_eq(a, b)),
        BinaryOp::LooseEq => Value::Bool(loose_eq(a, b)),
        BinaryOp::LooseNe => Value::Bool(!loose_eq(a, b)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => Value::Bool(compare(op, a, b)),
    }
}

fn property(target: &Value, key: &Value) -> std::result::Result<Value, String> {
    match (target, key) {
        (Value::Null, _) => Err(format!(
            "cannot read property '{}' of undefined",
            to_display_string(key)
        )),
        (Value::Object(fields), _) => Ok(fields.get(&to_display_string(key)).cloned().unwrap_or(Value::Null)),
        (Value::Array(items), Value::String(k)) if k == "length" => Ok(Value::from(items.len())),
        (Value::String(s), Value::String(k)) if k == "length" => Ok(Value::from(s.chars().count())),
        (Value::Array(items), Value::Number(n)) => Ok(n
            .as_u64()
            .and_then(|i| items.get(i as usize))
            .cloned()
            .unwrap_or(Value::Null)),
        (Value::String(s), Value::Number(n)) => Ok(n
            .as_u64()
            .and_then(|i| s.chars().nth(i as usize))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Null)),
        _ => Ok(Value::Null),
    }
}

fn string_arg<S: ExpressionScope + ?Sized>(
    name: &str,
    args: &[Expr],
    scope: &S,
) -> std::result::Result<String, String> {
    match args {
        [arg] => match eval(arg, scope)? {
            Value::String(s) => Ok(s),
            other => Err(format!("{}() expects a node id string, got {}", name, other)),
        },
        _ => Err(format!("{}() takes exactly one argument", name)),
    }
}

fn eval<S: ExpressionScope + ?Sized>(expr: &Expr, scope: &S) -> std::result::Result<Value, String> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Undefined => Ok(Value::Null),
        Expr::Variable(name) => Ok(scope.variable(name).cloned().unwrap_or(Value::Null)),
        Expr::Member(target, name) => {
            let target = eval(target, scope)?;
            property(&target, &Value::String(name.clone()))
        }
        Expr::Index(target, index) => {
            let target = eval(target, scope)?;
            let index = eval(index, scope)?;
            property(&target, &index)
        }
        Expr::Call(name, args) => match name.as_str() {
            HELPER_GET_NODE_RESULT => {
                let id = string_arg(name, args, scope)?;
                Ok(scope.node_output(&id).cloned().unwrap_or(Value::Null))
            }
            HELPER_HAS_NODE_RESULT => {
                let id = string_arg(name, args, scope)?;
                Ok(Value::Bool(scope.has_node_result(&id)))
            }
            other => Err(format!("'{}' is not a function", other)),
        },
        Expr::Unary(UnaryOp::Not, operand) => Ok(Value::Bool(!is_truthy(&eval(operand, scope)?))),
        Expr::Unary(UnaryOp::Neg, operand) => Ok(number(-to_number(&eval(operand, scope)?))),
        Expr::Binary(op, left, right) => {
            let left = eval(left, scope)?;
            let right = eval(right, scope)?;
            Ok(binary(*op, &left, &right))
        }
        Expr::And(left, right) => {
            let left = eval(left, scope)?;
            if is_truthy(&left) {
                eval(right, scope)
            } else {
                Ok(left)
            }
        }
        Expr::Or(left, right) => {
            let left = eval(left, scope)?;
            if is_truthy(&left) {
                Ok(left)
            } else {
                eval(right, scope)
            }
        }
        Expr::Conditional(test, then, otherwise) => {
            if is_truthy(&eval(test, scope)?) {
                eval(then, scope)
            } else {
                eval(otherwise, scope)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    /// Scope with explicit node outputs for helper tests
    struct TestScope {
        vars: VariableContext,
        outputs: HashMap<String, Value>,
    }

    impl ExpressionScope for TestScope {
        fn variable(&self, name: &str) -> Option<&Value> {
            self.vars.get(name)
        }

        fn node_output(&self, node_id: &str) -> Option<&Value> {
            self.outputs.get(node_id)
        }

        fn has_node_result(&self, node_id: &str) -> bool {
            self.outputs.contains_key(node_id)
        }
    }

    fn vars(value: Value) -> VariableContext {
        match value {
            Value::Object(map) => VariableContext::from(map),
            _ => panic!("test variables must be an object"),
        }
    }

    #[test]
    fn test_member_equality() {
        let ctx = vars(json!({"result": {"status": "ok"}}));
        assert!(evaluate_condition("result.status === 'ok'", &ctx).unwrap());
        assert!(!evaluate_condition("result.status === 'failed'", &ctx).unwrap());
    }

    #[test]
    fn test_comparisons_and_logic() {
        let ctx = vars(json!({"count": 7, "name": "alpha", "items": [1, 2, 3]}));
        assert!(evaluate_condition("count > 5 && count <= 7", &ctx).unwrap());
        assert!(evaluate_condition("count % 2 == 1", &ctx).unwrap());
        assert!(evaluate_condition("items.length === 3", &ctx).unwrap());
        assert!(evaluate_condition("items[1] === 2", &ctx).unwrap());
        assert!(evaluate_condition("name + '-' + count === 'alpha-7'", &ctx).unwrap());
        assert!(evaluate_condition("!(count < 0) || missing", &ctx).unwrap());
        assert!(evaluate_condition("count == '7'", &ctx).unwrap());
        assert!(!evaluate_condition("count === '7'", &ctx).unwrap());
        assert!(evaluate_condition("count > 10 ? false : true", &ctx).unwrap());
    }

    #[test]
    fn test_unknown_variable_is_undefined() {
        let ctx = VariableContext::new();
        assert!(!evaluate_condition("missing", &ctx).unwrap());
        assert!(evaluate_condition("missing === undefined", &ctx).unwrap());
        assert!(evaluate_condition("missing == null", &ctx).unwrap());
    }

    #[test]
    fn test_property_of_undefined_is_error() {
        let ctx = VariableContext::new();
        let err = evaluate_condition("missing.status === 'ok'", &ctx).unwrap_err();
        assert!(err.to_string().contains("missing.status === 'ok'"));
    }

    #[test]
    fn test_deep_nesting_is_reported() {
        let ctx = VariableContext::new();
        let expression = format!("{}true", "!".repeat(10_000));
        match evaluate_condition(&expression, &ctx) {
            Err(FlowError::Expression { message, .. }) => {
                assert!(message.contains("nested too deeply"));
            }
            other => panic!("Expected expression error, got {:?}", other),
        }
    }

    #[test]
    fn test_helpers() {
        let scope = TestScope {
            vars: VariableContext::new(),
            outputs: HashMap::from([("fetch".to_string(), json!({"status": 200}))]),
        };
        assert!(evaluate_condition("hasNodeResult('fetch')", &scope).unwrap());
        assert!(!evaluate_condition("hasNodeResult('other')", &scope).unwrap());
        assert!(evaluate_condition("getNodeResult('fetch').status === 200", &scope).unwrap());
        assert!(evaluate_condition("getNodeResult('other') === null", &scope).unwrap());
    }

    #[test]
    fn test_no_ambient_functions() {
        let ctx = vars(json!({"x": 1}));
        let err = evaluate_condition("eval('1')", &ctx).unwrap_err();
        assert!(matches!(err, FlowError::Expression { .. }));
        assert!(evaluate_condition("hasNodeResult(1)", &ctx).is_err());
        assert!(evaluate_condition("hasNodeResult()", &ctx).is_err());
    }

    #[test]
    fn test_malformed_expression_is_reported() {
        let ctx = VariableContext::new();
        let err = evaluate_condition("a === (b", &ctx).unwrap_err();
        match err {
            FlowError::Expression { expression, .. } => assert_eq!(expression, "a === (b"),
            other => panic!("Expected Expression error, got {:?}", other),
        }
    }

    #[test]
    fn test_interpolation() {
        let ctx = vars(json!({"a": 1, "b": "x"}));
        assert_eq!(interpolate_variables("{{a}}-{{b}}", &ctx), "1-x");
        assert_eq!(interpolate_variables("id={{z}}", &ctx), "id={{z}}");
        assert_eq!(interpolate_variables("no placeholders", &ctx), "no placeholders");
    }

    #[test]
    fn test_interpolation_of_structured_values() {
        let ctx = vars(json!({"user": {"id": 4}, "ratio": 2.5, "flag": true, "none": null}));
        assert_eq!(interpolate_variables("{{user}}", &ctx), r#"{"id":4}"#);
        assert_eq!(interpolate_variables("{{ratio}}|{{flag}}|{{none}}", &ctx), "2.5|true|null");
        assert_eq!(interpolate_variables("{{ user }}", &ctx), "{{ user }}");
    }

    #[test]
    fn test_extract_variables() {
        let vars = extract_variables(&json!({"a": 1, "nested": {"b": 2}}));
        assert_eq!(vars.len(), 2);
        assert_eq!(vars["nested"], json!({"b": 2}));

        let scalar = extract_variables(&json!("plain text"));
        assert_eq!(scalar[SCALAR_OUTPUT_KEY], json!("plain text"));

        assert!(extract_variables(&Value::Null).is_empty());
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("false")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
    }

    #[test]
    fn test_number_normalization() {
        assert_eq!(number(3.0), json!(3));
        assert_eq!(number(0.5), json!(0.5));
        assert_eq!(number(f64::NAN), Value::Null);
        assert_eq!(to_display_string(&json!(2.0)), "2");
    }
}
