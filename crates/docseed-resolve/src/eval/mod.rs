//! Sandboxed evaluator for `$eval` expressions.
//!
//! Expressions use a small JavaScript-like grammar: literals, `this` member
//! access, arithmetic, comparison, logical operators, the conditional
//! operator and a fixed set of built-in functions and methods. Nothing in an
//! expression can reach the filesystem, the store or the rest of the tree.

mod parser;

use docseed_core::{Document, Error, Mapping, Result};
use serde_json::{Number, Value};

use self::parser::Expr;

/// Evaluates an expression against the mapping bound as `this`.
pub trait Evaluator {
    fn evaluate(&self, source: &str, context: &Mapping) -> Result<Document>;
}

/// Default [`Evaluator`] backed by the built-in expression interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionEvaluator;

impl Evaluator for ExpressionEvaluator {
    fn evaluate(&self, source: &str, context: &Mapping) -> Result<Document> {
        evaluate(source, context)
    }
}

/// Parse and evaluate `source` with `context` bound as `this`.
pub fn evaluate(source: &str, context: &Mapping) -> Result<Document> {
    let fail = |message: String| Error::Evaluation {
        expression: source.to_string(),
        message,
    };
    let expr = parser::parse(source).map_err(fail)?;
    let this = Value::Object(context.clone());
    eval_expr(&expr, &this).map_err(fail)
}

type EvalResult<T> = std::result::Result<T, String>;

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Largest string an expression may build in one step.
const MAX_STRING_BYTES: usize = 16 * 1024 * 1024;

fn eval_expr(expr: &Expr, this: &Value) -> EvalResult<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::This => Ok(this.clone()),
        Expr::Global(name) => match name.as_str() {
            "Math" | "JSON" | "String" | "Number" | "Boolean" | "parseInt" | "parseFloat" => {
                Err(format!("{name} can only be called or dereferenced"))
            }
            _ => Err(format!("{name} is not defined")),
        },
        Expr::Array(items) => items
            .iter()
            .map(|item| eval_expr(item, this))
            .collect::<EvalResult<Vec<_>>>()
            .map(Value::Array),
        Expr::Object(entries) => {
            let mut map = Mapping::new();
            for (key, value) in entries {
                map.insert(key.clone(), eval_expr(value, this)?);
            }
            Ok(Value::Object(map))
        }
        Expr::Member(object, property) => {
            if let Expr::Global(name) = object.as_ref()
                && name == "Math"
            {
                return match property.as_str() {
                    "PI" => Ok(number_value(std::f64::consts::PI)),
                    "E" => Ok(number_value(std::f64::consts::E)),
                    _ => Err(format!("Math.{property} is not a constant")),
                };
            }
            let object = eval_expr(object, this)?;
            Ok(member(&object, property))
        }
        Expr::Index(object, index) => {
            let object = eval_expr(object, this)?;
            let index = eval_expr(index, this)?;
            Ok(match (&object, &index) {
                (Value::Array(items), Value::Number(_)) => {
                    let idx = to_number(&index);
                    if idx >= 0.0 && idx.fract() == 0.0 {
                        items.get(idx as usize).cloned().unwrap_or(Value::Null)
                    } else {
                        Value::Null
                    }
                }
                _ => member(&object, &to_display(&index)),
            })
        }
        Expr::Call(callee, args) => {
            let args = args
                .iter()
                .map(|arg| eval_expr(arg, this))
                .collect::<EvalResult<Vec<_>>>()?;
            match callee.as_ref() {
                Expr::Global(name) => call_global(name, &args),
                Expr::Member(object, method) => match object.as_ref() {
                    Expr::Global(namespace) if namespace == "Math" => call_math(method, &args),
                    Expr::Global(namespace) if namespace == "JSON" => call_json(method, &args),
                    _ => {
                        let receiver = eval_expr(object, this)?;
                        call_method(&receiver, method, &args)
                    }
                },
                _ => Err("expression is not callable".to_string()),
            }
        }
        Expr::Unary(op, operand) => {
            let value = eval_expr(operand, this)?;
            Ok(match *op {
                "!" => Value::Bool(!truthy(&value)),
                "-" => number_value(-to_number(&value)),
                "+" => number_value(to_number(&value)),
                _ => Value::String(type_of(&value).to_string()),
            })
        }
        Expr::Binary(head, _, rest) => {
            let mut acc = eval_expr(head, this)?;
            for (op, operand) in rest {
                acc = match *op {
                    "&&" if truthy(&acc) => eval_expr(operand, this)?,
                    "||" if !truthy(&acc) => eval_expr(operand, this)?,
                    "??" if acc.is_null() => eval_expr(operand, this)?,
                    "&&" | "||" | "??" => acc,
                    _ => eval_binary(op, acc, eval_expr(operand, this)?)?,
                };
            }
            Ok(acc)
        }
        Expr::Conditional(test, consequent, alternate) => {
            if truthy(&eval_expr(test, this)?) {
                eval_expr(consequent, this)
            } else {
                eval_expr(alternate, this)
            }
        }
    }
}

fn eval_binary(op: &str, left: Value, right: Value) -> EvalResult<Value> {
    Ok(match op {
        "+" if left.is_string() || right.is_string() || is_compound(&left) || is_compound(&right) => {
            Value::String(format!("{}{}", to_display(&left), to_display(&right)))
        }
        "+" => number_value(to_number(&left) + to_number(&right)),
        "-" => number_value(to_number(&left) - to_number(&right)),
        "*" => number_value(to_number(&left) * to_number(&right)),
        "/" => number_value(to_number(&left) / to_number(&right)),
        "%" => number_value(to_number(&left) % to_number(&right)),
        "===" => Value::Bool(strict_equals(&left, &right)),
        "!==" => Value::Bool(!strict_equals(&left, &right)),
        "==" => Value::Bool(loose_equals(&left, &right)),
        "!=" => Value::Bool(!loose_equals(&left, &right)),
        "<" | "<=" | ">" | ">=" => Value::Bool(compare(op, &left, &right)),
        _ => return Err(format!("unsupported operator '{op}'")),
    })
}

fn member(object: &Value, property: &str) -> Value {
    match object {
        Value::Object(map) => map.get(property).cloned().unwrap_or(Value::Null),
        Value::Array(items) => match property {
            "length" => Value::from(items.len()),
            _ => property
                .parse::<usize>()
                .ok()
                .and_then(|idx| items.get(idx).cloned())
                .unwrap_or(Value::Null),
        },
        Value::String(text) => match property {
            "length" => Value::from(text.chars().count()),
            _ => property
                .parse::<usize>()
                .ok()
                .and_then(|idx| text.chars().nth(idx))
                .map(|ch| Value::String(ch.to_string()))
                .unwrap_or(Value::Null),
        },
        _ => Value::Null,
    }
}

fn call_global(name: &str, args: &[Value]) -> EvalResult<Value> {
    let first = args.first().unwrap_or(&Value::Null);
    match name {
        "String" => Ok(Value::String(to_display(first))),
        "Number" => Ok(number_value(to_number(first))),
        "Boolean" => Ok(Value::Bool(truthy(first))),
        "parseFloat" => Ok(number_value(parse_leading_float(&to_display(first)))),
        "parseInt" => {
            let parsed = parse_leading_float(&to_display(first));
            Ok(number_value(parsed.trunc()))
        }
        _ => Err(format!("{name} is not a function")),
    }
}

fn call_math(method: &str, args: &[Value]) -> EvalResult<Value> {
    let numbers: Vec<f64> = args.iter().map(to_number).collect();
    let first = numbers.first().copied().unwrap_or(f64::NAN);
    let result = match method {
        "floor" => first.floor(),
        "ceil" => first.ceil(),
        "round" => (first + 0.5).floor(),
        "trunc" => first.trunc(),
        "abs" => first.abs(),
        "sign" => {
            if first == 0.0 {
                0.0
            } else {
                first.signum()
            }
        }
        "sqrt" => first.sqrt(),
        "pow" => first.powf(numbers.get(1).copied().unwrap_or(f64::NAN)),
        "min" => numbers.iter().copied().fold(f64::INFINITY, f64::min),
        "max" => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        _ => return Err(format!("Math.{method} is not a function")),
    };
    Ok(number_value(result))
}

fn call_json(method: &str, args: &[Value]) -> EvalResult<Value> {
    let first = args.first().unwrap_or(&Value::Null);
    match method {
        "stringify" => serde_json::to_string(first)
            .map(Value::String)
            .map_err(|err| err.to_string()),
        "parse" => serde_json::from_str(&to_display(first)).map_err(|err| err.to_string()),
        _ => Err(format!("JSON.{method} is not a function")),
    }
}

fn call_method(receiver: &Value, method: &str, args: &[Value]) -> EvalResult<Value> {
    let arg = |idx: usize| args.get(idx).unwrap_or(&Value::Null);
    match receiver {
        Value::String(text) => {
            let chars: Vec<char> = text.chars().collect();
            Ok(match method {
                "toUpperCase" => Value::String(text.to_uppercase()),
                "toLowerCase" => Value::String(text.to_lowercase()),
                "trim" => Value::String(text.trim().to_string()),
                "toString" => Value::String(text.clone()),
                "includes" => Value::Bool(text.contains(&to_display(arg(0)))),
                "startsWith" => Value::Bool(text.starts_with(&to_display(arg(0)))),
                "endsWith" => Value::Bool(text.ends_with(&to_display(arg(0)))),
                "indexOf" => {
                    let needle = to_display(arg(0));
                    match text.find(&needle) {
                        Some(byte_idx) => Value::from(text[..byte_idx].chars().count()),
                        None => Value::from(-1),
                    }
                }
                "slice" => {
                    let (start, end) = slice_bounds(chars.len(), args);
                    Value::String(chars[start..end].iter().collect())
                }
                "split" => {
                    let separator = to_display(arg(0));
                    let parts: Vec<Value> = if separator.is_empty() {
                        chars.iter().map(|ch| Value::String(ch.to_string())).collect()
                    } else {
                        text.split(separator.as_str())
                            .map(|part| Value::String(part.to_string()))
                            .collect()
                    };
                    Value::Array(parts)
                }
                "concat" => {
                    let mut joined = text.clone();
                    for value in args {
                        joined.push_str(&to_display(value));
                    }
                    Value::String(joined)
                }
                "repeat" => {
                    let count = to_number(arg(0));
                    if !(count >= 0.0 && count.is_finite()) {
                        return Err("invalid repeat count".to_string());
                    }
                    let count = count as usize;
                    match text.len().checked_mul(count) {
                        Some(bytes) if bytes <= MAX_STRING_BYTES => Value::String(text.repeat(count)),
                        _ => {
                            return Err(format!(
                                "repeat result would exceed {MAX_STRING_BYTES} bytes"
                            ));
                        }
                    }
                }
                _ => return Err(format!("string has no method '{method}'")),
            })
        }
        Value::Array(items) => Ok(match method {
            "includes" => Value::Bool(items.iter().any(|item| strict_equals(item, arg(0)))),
            "indexOf" => match items.iter().position(|item| strict_equals(item, arg(0))) {
                Some(idx) => Value::from(idx),
                None => Value::from(-1),
            },
            "join" => {
                let separator = match arg(0) {
                    Value::Null => ",".to_string(),
                    other => to_display(other),
                };
                Value::String(
                    items
                        .iter()
                        .map(display_element)
                        .collect::<Vec<_>>()
                        .join(&separator),
                )
            }
            "slice" => {
                let (start, end) = slice_bounds(items.len(), args);
                Value::Array(items[start..end].to_vec())
            }
            "concat" => {
                let mut joined = items.clone();
                for value in args {
                    match value {
                        Value::Array(more) => joined.extend(more.iter().cloned()),
                        other => joined.push(other.clone()),
                    }
                }
                Value::Array(joined)
            }
            _ => return Err(format!("array has no method '{method}'")),
        }),
        Value::Number(_) => {
            let number = to_number(receiver);
            match method {
                "toString" => Ok(Value::String(to_display(receiver))),
                "toFixed" => {
                    let digits = match arg(0) {
                        Value::Null => 0.0,
                        other => to_number(other),
                    };
                    if !(0.0..=100.0).contains(&digits) {
                        return Err("toFixed() digits must be between 0 and 100".to_string());
                    }
                    let digits = digits as usize;
                    Ok(Value::String(format!("{number:.digits$}")))
                }
                _ => Err(format!("number has no method '{method}'")),
            }
        }
        Value::Null => Err(format!("cannot call '{method}' on null")),
        _ => Err(format!("{} has no method '{method}'", type_of(receiver))),
    }
}

fn slice_bounds(len: usize, args: &[Value]) -> (usize, usize) {
    let resolve = |value: Option<&Value>, default: usize| -> usize {
        match value {
            None | Some(Value::Null) => default,
            Some(value) => {
                let idx = to_number(value);
                if idx.is_nan() {
                    0
                } else if idx < 0.0 {
                    len.saturating_sub((-idx) as usize)
                } else {
                    (idx as usize).min(len)
                }
            }
        }
    };
    let start = resolve(args.first(), 0);
    let end = resolve(args.get(1), len);
    (start, end.max(start))
}

fn parse_leading_float(text: &str) -> f64 {
    let trimmed = text.trim();
    let mut end = 0;
    let mut seen_dot = false;
    for (idx, ch) in trimmed.char_indices() {
        let accepted = ch.is_ascii_digit()
            || (idx == 0 && (ch == '-' || ch == '+'))
            || (ch == '.' && !seen_dot);
        if !accepted {
            break;
        }
        seen_dot |= ch == '.';
        end = idx + ch.len_utf8();
    }
    trimmed[..end].parse::<f64>().unwrap_or(f64::NAN)
}

fn is_compound(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "object",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) | Value::Object(_) => "object",
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(_) => {
            let number = to_number(value);
            number != 0.0 && !number.is_nan()
        }
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(flag) => f64::from(u8::from(*flag)),
        Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Value::Array(items) if items.is_empty() => 0.0,
        Value::Array(items) if items.len() == 1 => to_number(&Value::String(to_display(&items[0]))),
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

/// Convert a computed float back into a JSON value the way `JSON.stringify`
/// would print it: integral values become integers, non-finite ones `null`.
fn number_value(number: f64) -> Value {
    if !number.is_finite() {
        return Value::Null;
    }
    if number.fract() == 0.0 && number.abs() <= MAX_SAFE_INTEGER {
        return Value::from(number as i64);
    }
    Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null)
}

fn to_display(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => match number.as_f64() {
            Some(float) if float.fract() == 0.0 && float.abs() <= MAX_SAFE_INTEGER => {
                format!("{}", float as i64)
            }
            _ => number.to_string(),
        },
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_element)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn display_element(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => to_display(other),
    }
}

fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => to_number(left) == to_number(right),
        _ => left == right,
    }
}

fn loose_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_) | Value::String(_) | Value::Bool(_), Value::Number(_) | Value::Bool(_))
        | (Value::Number(_) | Value::Bool(_), Value::String(_)) => {
            to_number(left) == to_number(right)
        }
        _ => strict_equals(left, right),
    }
}

fn compare(op: &str, left: &Value, right: &Value) -> bool {
    if let (Value::String(left), Value::String(right)) = (left, right) {
        return match op {
            "<" => left < right,
            "<=" => left <= right,
            ">" => left > right,
            _ => left >= right,
        };
    }
    let (left, right) = (to_number(left), to_number(right));
    match op {
        "<" => left < right,
        "<=" => left <= right,
        ">" => left > right,
        _ => left >= right,
    }
}
