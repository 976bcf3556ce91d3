use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::host::{
    Host,
    error::HostError,
    types::HostType,
    value::{NativeFn, Rational, Value},
};

/// Functions available in the `Base` namespace.
pub const BASE_FUNCTIONS: &[(&str, NativeFn)] = &[
    ("+", base_add),
    ("-", base_sub),
    ("*", base_mul),
    ("//", base_rational),
    ("length", base_length),
    ("push!", base_push),
    ("pop!", base_pop),
    ("getindex", base_getindex),
    ("setindex!", base_setindex),
    ("string", base_string),
    ("identity", base_identity),
    ("error", base_error),
    ("typeof", base_typeof),
];

fn expect_arity(name: &str, args: &[Value], arity: usize) -> Result<(), HostError> {
    if args.len() == arity {
        Ok(())
    } else {
        Err(HostError::method_error(name, args))
    }
}

#[derive(Clone, Copy)]
enum ArithOp {
    Add,
    Sub,
    Mul,
}

impl ArithOp {
    fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
        }
    }

    fn int64(self, a: i64, b: i64) -> i64 {
        match self {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
        }
    }

    fn float(self, a: f64, b: f64) -> f64 {
        match self {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
        }
    }

    fn big(self, a: &BigInt, b: &BigInt) -> BigInt {
        match self {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
        }
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float64(v) => Some(*v),
        Value::Float32(v) => Some(*v as f64),
        Value::Rational(r) => match (r.num().to_f64(), r.den().to_f64()) {
            (Some(n), Some(d)) => Some(n / d),
            _ => None,
        },
        other => other.as_bigint().and_then(|v| v.to_f64()),
    }
}

fn as_rational(value: &Value) -> Option<(BigInt, BigInt)> {
    match value {
        Value::Rational(r) => Some((r.num().clone(), r.den().clone())),
        other => other.as_bigint().map(|v| (v, BigInt::from(1))),
    }
}

/// Normalises an integer result: `Int64` when it fits, `BigInt` otherwise.
fn int_result(value: BigInt) -> Value {
    match value.to_i64() {
        Some(small) => Value::Int64(small),
        None => Value::bigint(value),
    }
}

fn rational_result(num: BigInt, den: BigInt) -> Result<Value, HostError> {
    Rational::new(num, den)
        .map(|r| Value::Rational(r.into()))
        .ok_or_else(|| HostError::ArgumentError("invalid rational: zero(Int64)//zero(Int64)".into()))
}

/// Integer kinds other than `Int64` promote to `BigInt`; any float makes the
/// result `Float64`; any rational makes it a rational.
fn arith(op: ArithOp, args: &[Value]) -> Result<Value, HostError> {
    let (a, b) = match args {
        [a, b] => (a, b),
        _ => return Err(HostError::method_error(op.name(), args)),
    };
    match (a, b) {
        (Value::Int64(x), Value::Int64(y)) => Ok(Value::Int64(op.int64(*x, *y))),
        (Value::Float64(_) | Value::Float32(_), _) | (_, Value::Float64(_) | Value::Float32(_)) => {
            match (as_f64(a), as_f64(b)) {
                (Some(x), Some(y)) => Ok(Value::Float64(op.float(x, y))),
                _ => Err(HostError::method_error(op.name(), args)),
            }
        }
        (Value::Rational(_), _) | (_, Value::Rational(_)) => match (as_rational(a), as_rational(b)) {
            (Some((an, ad)), Some((bn, bd))) => match op {
                ArithOp::Mul => rational_result(an * bn, ad * bd),
                _ => rational_result(op.big(&(&an * &bd), &(&bn * &ad)), ad * bd),
            },
            _ => Err(HostError::method_error(op.name(), args)),
        },
        _ => match (a.as_bigint(), b.as_bigint()) {
            (Some(x), Some(y)) => Ok(int_result(op.big(&x, &y))),
            _ => Err(HostError::method_error(op.name(), args)),
        },
    }
}

fn base_add(_host: &mut Host, args: &[Value]) -> Result<Value, HostError> {
    arith(ArithOp::Add, args)
}

fn base_sub(_host: &mut Host, args: &[Value]) -> Result<Value, HostError> {
    if let [value] = args {
        return match value {
            Value::Int64(v) => Ok(Value::Int64(v.wrapping_neg())),
            Value::Float64(v) => Ok(Value::Float64(-v)),
            Value::Float32(v) => Ok(Value::Float32(-v)),
            Value::Rational(r) => rational_result(-r.num().clone(), r.den().clone()),
            other => match other.as_bigint() {
                Some(v) => Ok(int_result(-v)),
                None => Err(HostError::method_error("-", args)),
            },
        };
    }
    arith(ArithOp::Sub, args)
}

fn base_mul(_host: &mut Host, args: &[Value]) -> Result<Value, HostError> {
    arith(ArithOp::Mul, args)
}

fn base_rational(_host: &mut Host, args: &[Value]) -> Result<Value, HostError> {
    expect_arity("//", args, 2)?;
    match (as_rational(&args[0]), as_rational(&args[1])) {
        (Some((an, ad)), Some((bn, bd))) => {
            if bn.is_zero() && an.is_zero() {
                return Err(HostError::ArgumentError(
                    "invalid rational: zero(Int64)//zero(Int64)".into(),
                ));
            }
            rational_result(an * bd, ad * bn)
        }
        _ => Err(HostError::method_error("//", args)),
    }
}

fn base_length(_host: &mut Host, args: &[Value]) -> Result<Value, HostError> {
    expect_arity("length", args, 1)?;
    let len = match &args[0] {
        Value::Array(array) => array.items.borrow().len(),
        Value::Dict(dict) => dict.entries.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::String(s) => s.chars().count(),
        _ => return Err(HostError::method_error("length", args)),
    };
    Ok(Value::Int64(len as i64))
}

fn base_push(_host: &mut Host, args: &[Value]) -> Result<Value, HostError> {
    expect_arity("push!", args, 2)?;
    let Value::Array(array) = &args[0] else {
        return Err(HostError::method_error("push!", args));
    };
    if !array.eltype.accepts(&args[1]) {
        return Err(HostError::ArgumentError(format!(
            "cannot push a {} into a Vector{{{}}}",
            args[1].type_name(),
            array.eltype
        )));
    }
    array.items.borrow_mut().push(args[1].clone());
    Ok(args[0].clone())
}

fn base_pop(_host: &mut Host, args: &[Value]) -> Result<Value, HostError> {
    expect_arity("pop!", args, 1)?;
    let Value::Array(array) = &args[0] else {
        return Err(HostError::method_error("pop!", args));
    };
    array
        .items
        .borrow_mut()
        .pop()
        .ok_or_else(|| HostError::ArgumentError("array must be non-empty".into()))
}

fn index_of(args: &[Value], position: usize, len: usize) -> Result<usize, HostError> {
    let index = match &args[position] {
        Value::Int64(i) => *i,
        other => match other.as_bigint().and_then(|v| v.to_i64()) {
            Some(i) => i,
            None => return Err(HostError::method_error("getindex", args)),
        },
    };
    if index >= 1 && (index as usize) <= len {
        Ok(index as usize - 1)
    } else {
        Err(HostError::BoundsError { len, index })
    }
}

fn base_getindex(_host: &mut Host, args: &[Value]) -> Result<Value, HostError> {
    expect_arity("getindex", args, 2)?;
    match &args[0] {
        Value::Array(array) => {
            let items = array.items.borrow();
            let i = index_of(args, 1, items.len())?;
            Ok(items[i].clone())
        }
        Value::Tuple(items) => {
            let i = index_of(args, 1, items.len())?;
            Ok(items[i].clone())
        }
        Value::Dict(dict) => dict
            .get(&args[1])
            .ok_or_else(|| HostError::ErrorException(format!("key {} not found", args[1]))),
        _ => Err(HostError::method_error("getindex", args)),
    }
}

fn base_setindex(_host: &mut Host, args: &[Value]) -> Result<Value, HostError> {
    expect_arity("setindex!", args, 3)?;
    match &args[0] {
        Value::Array(array) => {
            if !array.eltype.accepts(&args[1]) {
                return Err(HostError::method_error("setindex!", args));
            }
            let mut items = array.items.borrow_mut();
            let i = index_of(args, 2, items.len())?;
            items[i] = args[1].clone();
        }
        Value::Dict(dict) => {
            if !dict.keytype.accepts(&args[2]) || !dict.valtype.accepts(&args[1]) {
                return Err(HostError::method_error("setindex!", args));
            }
            dict.insert(args[2].clone(), args[1].clone());
        }
        _ => return Err(HostError::method_error("setindex!", args)),
    }
    Ok(args[0].clone())
}

fn base_string(_host: &mut Host, args: &[Value]) -> Result<Value, HostError> {
    let text: String = args.iter().map(Value::to_string_value).collect();
    Ok(Value::string(&text))
}

fn base_identity(_host: &mut Host, args: &[Value]) -> Result<Value, HostError> {
    expect_arity("identity", args, 1)?;
    Ok(args[0].clone())
}

fn base_error(_host: &mut Host, args: &[Value]) -> Result<Value, HostError> {
    let text: String = args.iter().map(Value::to_string_value).collect();
    Err(HostError::ErrorException(text))
}

fn base_typeof(_host: &mut Host, args: &[Value]) -> Result<Value, HostError> {
    expect_arity("typeof", args, 1)?;
    Ok(Value::string(&HostType::of(&args[0]).to_string()))
}
