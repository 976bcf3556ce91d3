use num_traits::Signed;

use crate::{
    bridge::{
        convert::{
            ConvertError, KernelType,
            memo::{ConversionMemo, MemoEntry},
        },
        handles::ForeignTypes,
    },
    host::value::{NodeId, Rational, Value},
    kernel::{Kernel, obj::Obj},
};

/// Converts a host value into a kernel object of kind `target`.
///
/// Host tuples become plain lists. Lists are mutable on the kernel side, so
/// unlike the reverse direction every container here is memoised before its
/// elements and any cycle is reproduced.
pub fn to_kernel(
    kernel: &mut Kernel,
    types: &ForeignTypes,
    value: &Value,
    target: &KernelType,
) -> Result<Obj, ConvertError> {
    HostToKernel {
        kernel,
        types,
        memo: ConversionMemo::new(),
    }
    .convert(value, target)
}

struct HostToKernel<'a> {
    kernel: &'a mut Kernel,
    types: &'a ForeignTypes,
    memo: ConversionMemo<(NodeId, KernelType), Obj>,
}

fn mismatch(value: &Value, target: &KernelType) -> ConvertError {
    ConvertError::TypeMismatch {
        expected: target.to_string(),
        found: value.type_name(),
    }
}

impl HostToKernel<'_> {
    fn memoised(&self, key: &(NodeId, KernelType)) -> Option<Obj> {
        match self.memo.lookup(key) {
            Some(MemoEntry::Done(obj)) => Some(*obj),
            // Containers are recorded as done before their children.
            Some(MemoEntry::InProgress) | None => None,
        }
    }

    fn convert(&mut self, value: &Value, target: &KernelType) -> Result<Obj, ConvertError> {
        match target {
            KernelType::Any => self.natural(value),
            KernelType::Opaque => Ok(self.types.new_value_handle(self.kernel, value.clone())),
            KernelType::Integer => self.integer(value).ok_or_else(|| mismatch(value, target)),
            KernelType::Rational => match value {
                Value::Rational(r) => self.rational(r),
                _ => self.integer(value).ok_or_else(|| mismatch(value, target)),
            },
            KernelType::Float => match value {
                Value::Float64(v) => Ok(Obj::Float(*v)),
                Value::Float32(v) => Ok(Obj::Float(*v as f64)),
                _ => Err(mismatch(value, target)),
            },
            KernelType::Char => match value {
                Value::Char(c) => char_obj(*c),
                _ => Err(mismatch(value, target)),
            },
            KernelType::String => self.string(value, target),
            KernelType::Bool => match value {
                Value::Bool(b) => Ok(Obj::bool(*b)),
                _ => Err(mismatch(value, target)),
            },
            KernelType::List(element) => self.list(value, element, target),
            KernelType::Record(component) => self.record(value, component, target),
        }
    }

    fn natural(&mut self, value: &Value) -> Result<Obj, ConvertError> {
        match value {
            Value::Nothing => Err(ConvertError::Unsupported("Nothing".to_string())),
            Value::Bool(b) => Ok(Obj::bool(*b)),
            Value::Rational(r) => self.rational(r),
            Value::Float64(v) => Ok(Obj::Float(*v)),
            Value::Float32(v) => Ok(Obj::Float(*v as f64)),
            Value::Char(c) => char_obj(*c),
            Value::String(_) | Value::Symbol(_) => self.string(value, &KernelType::String),
            Value::Array(_) | Value::Tuple(_) => {
                self.list(value, &KernelType::Any, &KernelType::list(KernelType::Any))
            }
            Value::Dict(_) => {
                self.record(value, &KernelType::Any, &KernelType::record(KernelType::Any))
            }
            Value::Function(func) => Ok(self.types.new_function_handle(self.kernel, func.clone())),
            _ => self
                .integer(value)
                .ok_or_else(|| ConvertError::Unsupported(value.type_name())),
        }
    }

    fn integer(&mut self, value: &Value) -> Option<Obj> {
        let kernel = &mut *self.kernel;
        let obj = match value {
            Value::Int8(v) => Obj::Int(*v as i64),
            Value::Int16(v) => Obj::Int(*v as i64),
            Value::Int32(v) => Obj::Int(*v as i64),
            Value::Int64(v) => kernel.make_int(*v as i128),
            Value::UInt8(v) => Obj::Int(*v as i64),
            Value::UInt16(v) => Obj::Int(*v as i64),
            Value::UInt32(v) => Obj::Int(*v as i64),
            Value::UInt64(v) => kernel.make_int(*v as i128),
            Value::BigInt(v) => kernel.bigint_to_int(v),
            _ => return None,
        };
        Some(obj)
    }

    /// Zero denominators become the signed infinities.
    fn rational(&mut self, r: &Rational) -> Result<Obj, ConvertError> {
        if r.is_infinite() {
            return Ok(if r.num().is_negative() {
                Obj::NegInfinity
            } else {
                Obj::Infinity
            });
        }
        Ok(self.kernel.make_rational(r.num(), r.den())?)
    }

    fn string(&mut self, value: &Value, target: &KernelType) -> Result<Obj, ConvertError> {
        let (Value::String(text) | Value::Symbol(text)) = value else {
            return Err(mismatch(value, target));
        };
        let key = value.identity().map(|id| (id, target.clone()));
        if let Some(obj) = key.as_ref().and_then(|key| self.memoised(key)) {
            return Ok(obj);
        }
        let obj = self.kernel.new_string(text.to_string());
        if let Some(key) = key {
            self.memo.insert(key, obj);
        }
        Ok(obj)
    }

    fn list(
        &mut self,
        value: &Value,
        element: &KernelType,
        target: &KernelType,
    ) -> Result<Obj, ConvertError> {
        let Some(id) = value.identity() else {
            return Err(mismatch(value, target));
        };
        let key = (id, target.clone());
        if let Some(obj) = self.memoised(&key) {
            return Ok(obj);
        }

        match value {
            Value::Array(array) => {
                let list = self.kernel.new_plist(Vec::with_capacity(array.items.borrow().len()));
                self.memo.insert(key, list);
                for item in array.items.borrow().iter() {
                    let obj = self.convert(item, element)?;
                    self.kernel.list_push(list, obj);
                }
                Ok(list)
            }
            Value::Tuple(items) => {
                let list = self.kernel.new_plist(Vec::with_capacity(items.len()));
                self.memo.insert(key, list);
                for item in items.iter() {
                    let obj = self.convert(item, element)?;
                    self.kernel.list_push(list, obj);
                }
                Ok(list)
            }
            _ => Err(mismatch(value, target)),
        }
    }

    fn record(
        &mut self,
        value: &Value,
        component: &KernelType,
        target: &KernelType,
    ) -> Result<Obj, ConvertError> {
        let Value::Dict(dict) = value else {
            return Err(mismatch(value, target));
        };
        let Some(id) = value.identity() else {
            return Err(mismatch(value, target));
        };
        let key = (id, target.clone());
        if let Some(obj) = self.memoised(&key) {
            return Ok(obj);
        }

        let record = self.kernel.new_record(Vec::with_capacity(dict.entries.borrow().len()));
        self.memo.insert(key, record);
        for (name, item) in dict.entries.borrow().iter() {
            let name = match name {
                Value::Symbol(name) | Value::String(name) => name.to_string(),
                other => {
                    return Err(ConvertError::TypeMismatch {
                        expected: "Symbol or String key".to_string(),
                        found: other.type_name(),
                    });
                }
            };
            let obj = self.convert(item, component)?;
            self.kernel.record_assign(record, &name, obj);
        }
        Ok(record)
    }
}

/// Kernel characters are single bytes.
fn char_obj(c: char) -> Result<Obj, ConvertError> {
    u8::try_from(u32::from(c))
        .map(Obj::Char)
        .map_err(|_| ConvertError::Unsupported(format!("Char {:?} outside the 8-bit range", c)))
}
