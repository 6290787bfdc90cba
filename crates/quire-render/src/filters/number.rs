//! Arithmetic filters.
//!
//! Integer operands stay integers; any float operand makes the result a
//! float. Division and modulo follow floor semantics, so the remainder takes
//! the sign of the divisor.

use liquid_core::model::{Value, ValueView};
use liquid_core::Result;

use super::{FnFilter, arg, arg_int, invalid_argument};

/// A numeric operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Self::Int(i) => Value::scalar(i),
            Self::Float(f) => Value::scalar(f),
        }
    }
}

/// Read a scalar as a number. Numeric strings count.
pub(crate) fn parse(value: &dyn ValueView) -> Option<Number> {
    value.as_scalar()?;
    let text = value.to_kstr();
    let text = text.as_str().trim();
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::Int(i));
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Number::Float)
}

fn operand(filter: &str, value: Option<&Value>) -> Result<Number> {
    value
        .and_then(|v| parse(v))
        .ok_or_else(|| invalid_argument(filter, "expected a number"))
}

/// Input as a number; anything non-numeric counts as zero.
fn input(value: &dyn ValueView) -> Number {
    parse(value).unwrap_or(Number::Int(0))
}

fn arithmetic(
    a: Number,
    b: Number,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Number {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            int(x, y).map_or_else(|| Number::Float(float(a.as_f64(), b.as_f64())), Number::Int)
        }
        _ => Number::Float(float(a.as_f64(), b.as_f64())),
    }
}

fn binary(
    name: &'static str,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> FnFilter {
    FnFilter::new(name, move |value, args| {
        let b = operand(name, arg(args, 0))?;
        Ok(arithmetic(input(value), b, int, float).into_value())
    })
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

fn float_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

fn divided_by(value: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let b = operand("divided_by", arg(args, 0))?;
    if b.as_f64() == 0.0 {
        return Err(invalid_argument("divided_by", "divided by 0"));
    }
    Ok(arithmetic(input(value), b, floor_div, |x, y| x / y).into_value())
}

fn modulo(value: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let b = operand("modulo", arg(args, 0))?;
    if b.as_f64() == 0.0 {
        return Err(invalid_argument("modulo", "divided by 0"));
    }
    Ok(arithmetic(input(value), b, floor_mod, float_mod).into_value())
}

#[allow(clippy::cast_possible_truncation)]
fn to_int(f: f64) -> Number {
    if f.is_finite() && f.abs() < 9.0e18 {
        Number::Int(f as i64)
    } else {
        Number::Float(f)
    }
}

fn round(value: &dyn ValueView, args: &[Value]) -> Result<Value> {
    let digits = arg_int(args, 0).unwrap_or(0);
    Ok(match input(value) {
        Number::Int(i) => Number::Int(i),
        Number::Float(f) if digits <= 0 => to_int(f.round()),
        Number::Float(f) => {
            let scale = 10f64.powi(i32::try_from(digits).unwrap_or(15).min(15));
            Number::Float((f * scale).round() / scale)
        }
    }
    .into_value())
}

fn unary(name: &'static str, op: fn(f64) -> f64) -> FnFilter {
    FnFilter::new(name, move |value, _args| {
        Ok(match input(value) {
            Number::Int(i) => Number::Int(i),
            Number::Float(f) => to_int(op(f)),
        }
        .into_value())
    })
}

fn bound(name: &'static str, keep_max: bool) -> FnFilter {
    FnFilter::new(name, move |value, args| {
        let a = input(value);
        let b = operand(name, arg(args, 0))?;
        let pick_b = if keep_max {
            b.as_f64() > a.as_f64()
        } else {
            b.as_f64() < a.as_f64()
        };
        Ok(if pick_b { b } else { a }.into_value())
    })
}

fn abs(value: &dyn ValueView, _args: &[Value]) -> Result<Value> {
    Ok(match input(value) {
        Number::Int(i) => i.checked_abs().map_or(Number::Float(i.unsigned_abs() as f64), Number::Int),
        Number::Float(f) => Number::Float(f.abs()),
    }
    .into_value())
}

fn to_integer(value: &dyn ValueView, _args: &[Value]) -> Result<Value> {
    Ok(match parse(value) {
        Some(Number::Int(i)) => Value::scalar(i),
        Some(Number::Float(f)) => match to_int(f.trunc()) {
            Number::Int(i) => Value::scalar(i),
            Number::Float(_) => Value::scalar(0i64),
        },
        None => Value::scalar(0i64),
    })
}

pub(super) fn filters() -> Vec<FnFilter> {
    vec![
        binary("plus", i64::checked_add, |a, b| a + b),
        binary("minus", i64::checked_sub, |a, b| a - b),
        binary("times", i64::checked_mul, |a, b| a * b),
        FnFilter::new("divided_by", divided_by),
        FnFilter::new("modulo", modulo),
        FnFilter::new("round", round),
        unary("ceil", f64::ceil),
        unary("floor", f64::floor),
        bound("at_least", true),
        bound("at_most", false),
        FnFilter::new("abs", abs),
        FnFilter::new("to_integer", to_integer),
    ]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::filters::test_support::{apply, s};
    use liquid_core::model::{Value, ValueView};

    fn run(name: &str, input: Value, args: &[Value]) -> String {
        apply(name, &input, args).to_kstr().to_string()
    }

    #[test]
    fn test_integer_arithmetic_stays_integer() {
        assert_eq!(run("plus", Value::scalar(2i64), &[Value::scalar(3i64)]), "5");
        assert_eq!(run("minus", s("10"), &[Value::scalar(4i64)]), "6");
        assert_eq!(run("times", Value::scalar(3i64), &[Value::scalar(4i64)]), "12");
    }

    #[test]
    fn test_float_operand_gives_float() {
        assert_eq!(run("plus", Value::scalar(1.5), &[Value::scalar(1i64)]), "2.5");
        assert_eq!(run("divided_by", Value::scalar(7i64), &[Value::scalar(2.0)]), "3.5");
    }

    #[test]
    fn test_floor_division_and_modulo() {
        assert_eq!(run("divided_by", Value::scalar(7i64), &[Value::scalar(2i64)]), "3");
        assert_eq!(run("divided_by", Value::scalar(-7i64), &[Value::scalar(2i64)]), "-4");
        assert_eq!(run("modulo", Value::scalar(-7i64), &[Value::scalar(3i64)]), "2");
        assert_eq!(run("modulo", Value::scalar(7i64), &[Value::scalar(-3i64)]), "-2");
    }

    #[test]
    fn test_rounding() {
        assert_eq!(run("round", Value::scalar(2.5), &[]), "3");
        assert_eq!(run("round", Value::scalar(1.23456), &[Value::scalar(2i64)]), "1.23");
        assert_eq!(run("ceil", Value::scalar(1.2), &[]), "2");
        assert_eq!(run("floor", s("1.8"), &[]), "1");
    }

    #[test]
    fn test_bounds_and_abs() {
        assert_eq!(run("at_least", Value::scalar(3i64), &[Value::scalar(5i64)]), "5");
        assert_eq!(run("at_most", Value::scalar(3i64), &[Value::scalar(5i64)]), "3");
        assert_eq!(run("abs", Value::scalar(-4i64), &[]), "4");
    }

    #[test]
    fn test_to_integer() {
        assert_eq!(run("to_integer", s("42"), &[]), "42");
        assert_eq!(run("to_integer", Value::scalar(3.9), &[]), "3");
        assert_eq!(run("to_integer", s("abc"), &[]), "0");
        assert_eq!(run("to_integer", Value::Nil, &[]), "0");
    }
}
