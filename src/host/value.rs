use std::{cell::RefCell, collections::HashSet, fmt, rc::Rc};

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, Zero};

use crate::host::{Host, error::HostError, types::HostType};

/// Native implementation of a host function.
pub type NativeFn = fn(&mut Host, &[Value]) -> Result<Value, HostError>;

/// Host callable.
pub struct Function {
    pub name: Rc<str>,
    pub body: NativeFn,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name)
    }
}

/// Exact fraction with arbitrary precision parts.
///
/// Always reduced with a non-negative denominator. A zero denominator is
/// allowed and encodes the signed infinities `1//0` and `-1//0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rational {
    num: BigInt,
    den: BigInt,
}

impl Rational {
    /// Returns `None` for `0//0`.
    pub fn new(num: BigInt, den: BigInt) -> Option<Rational> {
        if den.is_zero() {
            if num.is_zero() {
                return None;
            }
            let num = if num.is_negative() { -1 } else { 1 };
            return Some(Rational {
                num: BigInt::from(num),
                den,
            });
        }
        let gcd = num.gcd(&den);
        let (mut num, mut den) = (num / &gcd, den / &gcd);
        if den.is_negative() {
            num = -num;
            den = -den;
        }
        Some(Rational { num, den })
    }

    pub fn num(&self) -> &BigInt {
        &self.num
    }

    pub fn den(&self) -> &BigInt {
        &self.den
    }

    pub fn is_infinite(&self) -> bool {
        self.den.is_zero()
    }
}

/// Growable one-dimensional array with reference identity.
#[derive(Debug)]
pub struct Array {
    pub eltype: HostType,
    pub items: RefCell<Vec<Value>>,
}

/// Dictionary with reference identity; entries keep insertion order.
#[derive(Debug)]
pub struct Dict {
    pub keytype: HostType,
    pub valtype: HostType,
    pub entries: RefCell<Vec<(Value, Value)>>,
}

impl Dict {
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn insert(&self, key: Value, value: Value) {
        let mut entries = self.entries.borrow_mut();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => entries.push((key, value)),
        }
    }
}

/// Host runtime value.
///
/// Heap-backed variants are reference counted; a value stays alive as long
/// as any strong reference to it exists. Arrays and dicts are mutable
/// through interior mutability and may therefore form cycles.
#[derive(Debug, Clone)]
pub enum Value {
    Nothing,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    BigInt(Rc<BigInt>),
    Rational(Rc<Rational>),
    Float64(f64),
    Float32(f32),
    Char(char),
    String(Rc<str>),
    Symbol(Rc<str>),
    Array(Rc<Array>),
    Dict(Rc<Dict>),
    Tuple(Rc<[Value]>),
    Function(Rc<Function>),
}

/// Address identifying a reference-counted host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl Value {
    pub fn string(text: &str) -> Value {
        Value::String(Rc::from(text))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Rc::from(name))
    }

    pub fn bigint(value: BigInt) -> Value {
        Value::BigInt(Rc::new(value))
    }

    pub fn array(eltype: HostType, items: Vec<Value>) -> Value {
        Value::Array(Rc::new(Array {
            eltype,
            items: RefCell::new(items),
        }))
    }

    pub fn dict(keytype: HostType, valtype: HostType, entries: Vec<(Value, Value)>) -> Value {
        Value::Dict(Rc::new(Dict {
            keytype,
            valtype,
            entries: RefCell::new(entries),
        }))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::from(items))
    }

    /// Returns the canonical host type label.
    pub fn type_name(&self) -> String {
        HostType::of(self).to_string()
    }

    /// Identity of heap-backed values whose sharing matters to conversion.
    pub fn identity(&self) -> Option<NodeId> {
        let ptr = match self {
            Value::String(s) => Rc::as_ptr(s) as *const u8 as usize,
            Value::Array(a) => Rc::as_ptr(a) as usize,
            Value::Dict(d) => Rc::as_ptr(d) as usize,
            Value::Tuple(t) => Rc::as_ptr(t) as *const Value as usize,
            _ => return None,
        };
        Some(NodeId(ptr))
    }

    /// Reference identity (`===`) for heap-backed values, equality otherwise.
    pub fn same(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self == other,
            _ => false,
        }
    }

    /// Integer value of any fixed-width or big integer.
    pub fn as_bigint(&self) -> Option<BigInt> {
        match self {
            Value::Int8(v) => Some(BigInt::from(*v)),
            Value::Int16(v) => Some(BigInt::from(*v)),
            Value::Int32(v) => Some(BigInt::from(*v)),
            Value::Int64(v) => Some(BigInt::from(*v)),
            Value::UInt8(v) => Some(BigInt::from(*v)),
            Value::UInt16(v) => Some(BigInt::from(*v)),
            Value::UInt32(v) => Some(BigInt::from(*v)),
            Value::UInt64(v) => Some(BigInt::from(*v)),
            Value::BigInt(v) => Some(BigInt::clone(v)),
            _ => None,
        }
    }

    /// Text used when values are concatenated into strings.
    pub fn to_string_value(&self) -> String {
        match self {
            Value::String(s) => s.to_string(),
            Value::Symbol(s) => s.to_string(),
            Value::Char(c) => c.to_string(),
            other => other.to_string(),
        }
    }

    fn fmt_with(&self, f: &mut fmt::Formatter<'_>, active: &mut HashSet<NodeId>) -> fmt::Result {
        let id = match self {
            Value::Array(_) | Value::Dict(_) => self.identity(),
            _ => None,
        };
        if let Some(id) = id {
            if !active.insert(id) {
                return f.write_str("#= circular reference =#");
            }
        }
        let result = match self {
            Value::Nothing => f.write_str("nothing"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int8(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt8(v) => write!(f, "0x{:02x}", v),
            Value::UInt16(v) => write!(f, "0x{:04x}", v),
            Value::UInt32(v) => write!(f, "0x{:08x}", v),
            Value::UInt64(v) => write!(f, "0x{:016x}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Rational(r) => write!(f, "{}//{}", r.num, r.den),
            Value::Float64(v) => write!(f, "{:?}", v),
            Value::Float32(v) => write!(f, "{:?}f0", v),
            Value::Char(c) => write!(f, "{:?}", c),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Symbol(s) => write!(f, ":{}", s),
            Value::Function(func) => write!(f, "{}", func.name),
            Value::Array(array) => {
                write!(f, "{}[", array.eltype)?;
                for (i, item) in array.items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_with(f, active)?;
                }
                f.write_str("]")
            }
            Value::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_with(f, active)?;
                }
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Value::Dict(dict) => {
                write!(f, "Dict{{{}, {}}}(", dict.keytype, dict.valtype)?;
                for (i, (key, value)) in dict.entries.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    key.fmt_with(f, active)?;
                    f.write_str(" => ")?;
                    value.fmt_with(f, active)?;
                }
                f.write_str(")")
            }
        };
        if let Some(id) = id {
            active.remove(&id);
        }
        result
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with(f, &mut HashSet::new())
    }
}

/// Structural equality (`==`). Values of different runtime types are never
/// equal, and comparing cyclic containers does not terminate.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nothing, Value::Nothing) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int8(a), Value::Int8(b)) => a == b,
            (Value::Int16(a), Value::Int16(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt8(a), Value::UInt8(b)) => a == b,
            (Value::UInt16(a), Value::UInt16(b)) => a == b,
            (Value::UInt32(a), Value::UInt32(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Rational(a), Value::Rational(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                Rc::ptr_eq(a, b) || *a.items.borrow() == *b.items.borrow()
            }
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (ea, eb) = (a.entries.borrow(), b.entries.borrow());
                ea.len() == eb.len() && ea.iter().all(|(k, v)| b.get(k).as_ref() == Some(v))
            }
            _ => false,
        }
    }
}
