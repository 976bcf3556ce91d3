use std::fmt;

use crate::host::value::Value;

/// Type descriptor on the host side.
///
/// Describes the runtime type of host values (array element types, dict key
/// and value types) and doubles as the target descriptor when converting
/// kernel objects into host values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostType {
    Any,
    Nothing,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    BigInt,
    Rational,
    Float64,
    Float32,
    Char,
    String,
    Symbol,
    Function,
    /// One-dimensional array with the given element type.
    Array(Box<HostType>),
    /// Tuple with one descriptor per position.
    Tuple(Vec<HostType>),
    /// Dictionary with the given key and value types.
    Dict(Box<HostType>, Box<HostType>),
}

impl HostType {
    pub fn array(element: HostType) -> HostType {
        HostType::Array(Box::new(element))
    }

    pub fn dict(key: HostType, value: HostType) -> HostType {
        HostType::Dict(Box::new(key), Box::new(value))
    }

    /// Returns the runtime type of `value`.
    pub fn of(value: &Value) -> HostType {
        match value {
            Value::Nothing => HostType::Nothing,
            Value::Bool(_) => HostType::Bool,
            Value::Int8(_) => HostType::Int8,
            Value::Int16(_) => HostType::Int16,
            Value::Int32(_) => HostType::Int32,
            Value::Int64(_) => HostType::Int64,
            Value::UInt8(_) => HostType::UInt8,
            Value::UInt16(_) => HostType::UInt16,
            Value::UInt32(_) => HostType::UInt32,
            Value::UInt64(_) => HostType::UInt64,
            Value::BigInt(_) => HostType::BigInt,
            Value::Rational(_) => HostType::Rational,
            Value::Float64(_) => HostType::Float64,
            Value::Float32(_) => HostType::Float32,
            Value::Char(_) => HostType::Char,
            Value::String(_) => HostType::String,
            Value::Symbol(_) => HostType::Symbol,
            Value::Function(_) => HostType::Function,
            Value::Array(array) => HostType::Array(Box::new(array.eltype.clone())),
            Value::Tuple(items) => HostType::Tuple(items.iter().map(HostType::of).collect()),
            Value::Dict(dict) => HostType::Dict(
                Box::new(dict.keytype.clone()),
                Box::new(dict.valtype.clone()),
            ),
        }
    }

    /// Returns `true` when `value` may be stored in a container slot of this
    /// type. Arrays and dicts are invariant, tuples are covariant.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (HostType::Any, _) => true,
            (HostType::Tuple(types), Value::Tuple(items)) => {
                types.len() == items.len()
                    && types.iter().zip(items.iter()).all(|(ty, item)| ty.accepts(item))
            }
            _ => *self == HostType::of(value),
        }
    }

    /// Returns the narrowest element type that accepts every value.
    pub fn common(values: &[Value]) -> HostType {
        let Some(first) = values.first() else {
            return HostType::Any;
        };
        let ty = HostType::of(first);
        if values[1..].iter().all(|value| HostType::of(value) == ty) {
            ty
        } else {
            HostType::Any
        }
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostType::Any => f.write_str("Any"),
            HostType::Nothing => f.write_str("Nothing"),
            HostType::Bool => f.write_str("Bool"),
            HostType::Int8 => f.write_str("Int8"),
            HostType::Int16 => f.write_str("Int16"),
            HostType::Int32 => f.write_str("Int32"),
            HostType::Int64 => f.write_str("Int64"),
            HostType::UInt8 => f.write_str("UInt8"),
            HostType::UInt16 => f.write_str("UInt16"),
            HostType::UInt32 => f.write_str("UInt32"),
            HostType::UInt64 => f.write_str("UInt64"),
            HostType::BigInt => f.write_str("BigInt"),
            HostType::Rational => f.write_str("Rational{BigInt}"),
            HostType::Float64 => f.write_str("Float64"),
            HostType::Float32 => f.write_str("Float32"),
            HostType::Char => f.write_str("Char"),
            HostType::String => f.write_str("String"),
            HostType::Symbol => f.write_str("Symbol"),
            HostType::Function => f.write_str("Function"),
            HostType::Array(element) => write!(f, "Vector{{{}}}", element),
            HostType::Tuple(types) => {
                let items: Vec<String> = types.iter().map(|t| t.to_string()).collect();
                write!(f, "Tuple{{{}}}", items.join(", "))
            }
            HostType::Dict(key, value) => write!(f, "Dict{{{}, {}}}", key, value),
        }
    }
}
