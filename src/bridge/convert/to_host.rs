use std::{cell::RefCell, collections::HashSet, rc::Rc};

use num_bigint::BigInt;
use num_traits::{One, ToPrimitive, Zero};

use crate::{
    bridge::{
        convert::{
            ConvertError,
            memo::{ConversionMemo, MemoEntry},
        },
        handles::ForeignTypes,
    },
    host::{
        types::HostType,
        value::{Array, Dict, Rational, Value},
    },
    kernel::{
        Kernel,
        obj::{BagRef, Obj, TNum},
    },
};

/// Converts a kernel object into a host value of type `target`.
///
/// Fixed-width integer targets keep the low bits of the two's complement
/// representation, so out-of-range integers wrap instead of failing.
pub fn to_host(
    kernel: &Kernel,
    types: &ForeignTypes,
    obj: Obj,
    target: &HostType,
) -> Result<Value, ConvertError> {
    KernelToHost {
        kernel,
        types,
        memo: ConversionMemo::new(),
        open_tuples: HashSet::new(),
    }
    .convert(obj, target)
}

struct KernelToHost<'a> {
    kernel: &'a Kernel,
    types: &'a ForeignTypes,
    memo: ConversionMemo<(BagRef, HostType), Value>,
    /// Bags whose tuple is under construction, whatever the target.
    open_tuples: HashSet<BagRef>,
}

impl KernelToHost<'_> {
    fn mismatch(&self, obj: Obj, target: &HostType) -> ConvertError {
        ConvertError::TypeMismatch {
            expected: target.to_string(),
            found: self.kernel.type_name(obj).to_string(),
        }
    }

    fn memoised(&self, key: &(BagRef, HostType)) -> Result<Option<Value>, ConvertError> {
        match self.memo.lookup(key) {
            Some(MemoEntry::Done(value)) => Ok(Some(value.clone())),
            Some(MemoEntry::InProgress) => Err(ConvertError::CyclicStructure),
            None => Ok(None),
        }
    }

    fn convert(&mut self, obj: Obj, target: &HostType) -> Result<Value, ConvertError> {
        if let Some(value) = self.types.value_of(self.kernel, obj) {
            if !target.accepts(&value) {
                return Err(ConvertError::TypeMismatch {
                    expected: target.to_string(),
                    found: value.type_name(),
                });
            }
            return Ok(value);
        }
        if obj.as_bag().is_some_and(|bag| self.open_tuples.contains(&bag)) {
            return Err(ConvertError::CyclicStructure);
        }

        match target {
            HostType::Any => self.natural(obj),
            HostType::Int8 => self.low_bits(obj, target).map(|b| Value::Int8(b as i8)),
            HostType::Int16 => self.low_bits(obj, target).map(|b| Value::Int16(b as i16)),
            HostType::Int32 => self.low_bits(obj, target).map(|b| Value::Int32(b as i32)),
            HostType::Int64 => self.low_bits(obj, target).map(|b| Value::Int64(b as i64)),
            HostType::UInt8 => self.low_bits(obj, target).map(|b| Value::UInt8(b as u8)),
            HostType::UInt16 => self.low_bits(obj, target).map(|b| Value::UInt16(b as u16)),
            HostType::UInt32 => self.low_bits(obj, target).map(|b| Value::UInt32(b as u32)),
            HostType::UInt64 => self.low_bits(obj, target).map(Value::UInt64),
            HostType::BigInt => self
                .kernel
                .int_to_bigint(obj)
                .map(Value::bigint)
                .ok_or_else(|| self.mismatch(obj, target)),
            HostType::Rational => self
                .rational(obj)
                .ok_or_else(|| self.mismatch(obj, target)),
            HostType::Float64 => self
                .float(obj)
                .map(Value::Float64)
                .ok_or_else(|| self.mismatch(obj, target)),
            HostType::Float32 => self
                .float(obj)
                .map(|v| Value::Float32(v as f32))
                .ok_or_else(|| self.mismatch(obj, target)),
            HostType::Char => match obj {
                Obj::Char(c) => Ok(Value::Char(c as char)),
                _ => Err(self.mismatch(obj, target)),
            },
            HostType::Bool => match obj {
                Obj::True => Ok(Value::Bool(true)),
                Obj::False => Ok(Value::Bool(false)),
                _ => Err(self.mismatch(obj, target)),
            },
            HostType::String | HostType::Symbol => self.string(obj, target),
            HostType::Function => self
                .types
                .function_of(self.kernel, obj)
                .map(Value::Function)
                .ok_or_else(|| self.mismatch(obj, target)),
            HostType::Nothing => Err(self.mismatch(obj, target)),
            HostType::Array(element) => self.array(obj, element, target),
            HostType::Tuple(elements) => self.tuple(obj, elements, target),
            HostType::Dict(key, value) => self.dict(obj, key, value, target),
        }
    }

    /// Undirected conversion: the host kind that naturally matches `obj`.
    fn natural(&mut self, obj: Obj) -> Result<Value, ConvertError> {
        match obj {
            Obj::Int(v) => return Ok(Value::Int64(v)),
            Obj::Char(c) => return Ok(Value::Char(c as char)),
            Obj::True => return Ok(Value::Bool(true)),
            Obj::False => return Ok(Value::Bool(false)),
            Obj::Float(v) => return Ok(Value::Float64(v)),
            Obj::Infinity | Obj::NegInfinity => {
                return self
                    .rational(obj)
                    .ok_or_else(|| self.mismatch(obj, &HostType::Rational));
            }
            Obj::Fail => return Err(ConvertError::Unsupported("fail".to_string())),
            Obj::Bag(_) => {}
        }

        match self.kernel.tnum_of(obj) {
            TNum::INTPOS | TNum::INTNEG => self.convert(obj, &HostType::BigInt),
            TNum::RAT => self.convert(obj, &HostType::Rational),
            TNum::STRING => self.string(obj, &HostType::String),
            TNum::PLIST => self.array(obj, &HostType::Any, &HostType::array(HostType::Any)),
            TNum::PREC => self.dict(
                obj,
                &HostType::Symbol,
                &HostType::Any,
                &HostType::dict(HostType::Symbol, HostType::Any),
            ),
            // Permutations become one-based images, the host's indexing.
            TNum::PERM2 | TNum::PERM4 => {
                self.array(obj, &HostType::Int64, &HostType::array(HostType::Int64))
            }
            tnum if tnum == self.types.function_tnum() => self.convert(obj, &HostType::Function),
            _ => Err(ConvertError::Unsupported(self.kernel.type_name(obj).to_string())),
        }
    }

    fn low_bits(&self, obj: Obj, target: &HostType) -> Result<u64, ConvertError> {
        self.kernel
            .int_low_bits(obj)
            .ok_or_else(|| self.mismatch(obj, target))
    }

    /// Numerator and denominator of an integer, rational or infinity.
    fn fraction(&self, obj: Obj) -> Option<(BigInt, BigInt)> {
        match obj {
            Obj::Infinity => Some((BigInt::one(), BigInt::zero())),
            Obj::NegInfinity => Some((-BigInt::one(), BigInt::zero())),
            _ => match self.kernel.rational_parts(obj) {
                Some((num, den)) => Some((
                    self.kernel.int_to_bigint(num)?,
                    self.kernel.int_to_bigint(den)?,
                )),
                None => Some((self.kernel.int_to_bigint(obj)?, BigInt::one())),
            },
        }
    }

    fn rational(&self, obj: Obj) -> Option<Value> {
        let (num, den) = self.fraction(obj)?;
        Rational::new(num, den).map(|r| Value::Rational(Rc::new(r)))
    }

    fn float(&self, obj: Obj) -> Option<f64> {
        match obj {
            Obj::Float(v) => Some(v),
            Obj::Infinity => Some(f64::INFINITY),
            Obj::NegInfinity => Some(f64::NEG_INFINITY),
            _ => {
                let (num, den) = self.fraction(obj)?;
                Some(ratio_to_f64(&num, &den))
            }
        }
    }

    fn string(&mut self, obj: Obj, target: &HostType) -> Result<Value, ConvertError> {
        let kernel = self.kernel;
        let Some(bag) = obj.as_bag() else {
            return Err(self.mismatch(obj, target));
        };
        let key = (bag, target.clone());
        if let Some(value) = self.memoised(&key)? {
            return Ok(value);
        }
        let text = kernel
            .string_value(obj)
            .ok_or_else(|| self.mismatch(obj, target))?;
        let value = match target {
            HostType::Symbol => Value::symbol(text),
            _ => Value::string(text),
        };
        self.memo.insert(key, value.clone());
        Ok(value)
    }

    fn array(
        &mut self,
        obj: Obj,
        element: &HostType,
        target: &HostType,
    ) -> Result<Value, ConvertError> {
        let kernel = self.kernel;
        let Some(bag) = obj.as_bag() else {
            return Err(self.mismatch(obj, target));
        };
        let key = (bag, target.clone());
        if let Some(value) = self.memoised(&key)? {
            return Ok(value);
        }

        if let Some(images) = kernel.perm_images(obj) {
            let items = images
                .iter()
                .map(|&image| self.convert(Obj::Int(image as i64 + 1), element))
                .collect::<Result<Vec<_>, _>>()?;
            let value = Value::array(element.clone(), items);
            self.memo.insert(key, value.clone());
            return Ok(value);
        }

        let items = kernel
            .list_items(obj)
            .ok_or_else(|| self.mismatch(obj, target))?;
        let array = Rc::new(Array {
            eltype: element.clone(),
            items: RefCell::new(Vec::with_capacity(items.len())),
        });
        let value = Value::Array(Rc::clone(&array));
        self.memo.insert(key, value.clone());
        for &item in items {
            let converted = self.convert(item, element)?;
            array.items.borrow_mut().push(converted);
        }
        Ok(value)
    }

    fn tuple(
        &mut self,
        obj: Obj,
        elements: &[HostType],
        target: &HostType,
    ) -> Result<Value, ConvertError> {
        let kernel = self.kernel;
        let Some(bag) = obj.as_bag() else {
            return Err(self.mismatch(obj, target));
        };
        let key = (bag, target.clone());
        if let Some(value) = self.memoised(&key)? {
            return Ok(value);
        }
        let items = kernel
            .list_items(obj)
            .ok_or_else(|| self.mismatch(obj, target))?;
        if items.len() != elements.len() {
            return Err(ConvertError::TypeMismatch {
                expected: target.to_string(),
                found: format!("list of length {}", items.len()),
            });
        }

        let slot = self.memo.begin(key);
        self.open_tuples.insert(bag);
        let values = items
            .iter()
            .zip(elements)
            .map(|(&item, element)| self.convert(item, element))
            .collect::<Result<Vec<_>, _>>()?;
        self.open_tuples.remove(&bag);
        let value = Value::tuple(values);
        self.memo.finish(slot, value.clone());
        Ok(value)
    }

    fn dict(
        &mut self,
        obj: Obj,
        key_type: &HostType,
        value_type: &HostType,
        target: &HostType,
    ) -> Result<Value, ConvertError> {
        let kernel = self.kernel;
        let key_is_string = match key_type {
            HostType::String => true,
            HostType::Symbol | HostType::Any => false,
            _ => return Err(self.mismatch(obj, target)),
        };
        let Some(bag) = obj.as_bag() else {
            return Err(self.mismatch(obj, target));
        };
        let key = (bag, target.clone());
        if let Some(value) = self.memoised(&key)? {
            return Ok(value);
        }
        let components = kernel
            .record_components(obj)
            .ok_or_else(|| self.mismatch(obj, target))?;

        let dict = Rc::new(Dict {
            keytype: key_type.clone(),
            valtype: value_type.clone(),
            entries: RefCell::new(Vec::with_capacity(components.len())),
        });
        let value = Value::Dict(Rc::clone(&dict));
        self.memo.insert(key, value.clone());
        for (name, component) in components {
            let name = if key_is_string {
                Value::string(name)
            } else {
                Value::symbol(name)
            };
            let converted = self.convert(*component, value_type)?;
            dict.entries.borrow_mut().push((name, converted));
        }
        Ok(value)
    }
}

/// `num / den` for a positive `den`, without overflowing either part.
///
/// The quotient is taken with 64 significant bits and scaled back by a
/// power of two, so huge numerators and denominators still divide exactly.
fn ratio_to_f64(num: &BigInt, den: &BigInt) -> f64 {
    if num.is_zero() {
        return 0.0;
    }
    let shift = 64 + den.bits() as i64 - num.bits() as i64;
    let quotient = if shift >= 0 {
        (num << shift as usize) / den
    } else {
        num / (den << (-shift) as usize)
    };
    let mantissa = quotient.to_f64().unwrap_or(f64::NAN);
    // Past these bounds the result is infinite or zero anyway.
    let exponent = (-shift).clamp(-1200, 1100) as i32;
    mantissa * 2f64.powi(exponent / 2) * 2f64.powi(exponent - exponent / 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::pin::PinTable;

    fn setup() -> (Kernel, ForeignTypes) {
        let mut kernel = Kernel::new();
        let types = ForeignTypes::register(&mut kernel, PinTable::new()).unwrap();
        (kernel, types)
    }

    #[test]
    fn test_natural_scalars() {
        let (mut kernel, types) = setup();
        let convert = |kernel: &Kernel, obj| to_host(kernel, &types, obj, &HostType::Any).unwrap();
        assert_eq!(convert(&kernel, Obj::Int(-7)), Value::Int64(-7));
        assert_eq!(convert(&kernel, Obj::Char(b'z')), Value::Char('z'));
        assert_eq!(convert(&kernel, Obj::Float(0.25)), Value::Float64(0.25));
        assert_eq!(convert(&kernel, Obj::NegInfinity).to_string(), "-1//0");
        let big = kernel.make_int(-(1_i128 << 100));
        assert_eq!(
            convert(&kernel, big).to_string(),
            "-1267650600228229401496703205376"
        );
        let third = kernel
            .make_rational(&BigInt::from(1), &BigInt::from(3))
            .unwrap();
        assert_eq!(convert(&kernel, third).to_string(), "1//3");
    }

    #[test]
    fn test_truncating_integer_targets() {
        let (mut kernel, types) = setup();
        let to = |kernel: &Kernel, obj, target: HostType| to_host(kernel, &types, obj, &target);
        assert_eq!(to(&kernel, Obj::Int(300), HostType::Int8), Ok(Value::Int8(44)));
        assert_eq!(to(&kernel, Obj::Int(-1), HostType::UInt16), Ok(Value::UInt16(0xffff)));
        let big = kernel.make_int((1_i128 << 64) + 5);
        assert_eq!(to(&kernel, big, HostType::Int32), Ok(Value::Int32(5)));
        assert!(matches!(
            to(&kernel, Obj::Float(1.0), HostType::Int64),
            Err(ConvertError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_float_target_handles_huge_rationals() {
        let (mut kernel, types) = setup();
        let scale = BigInt::one() << 1100;
        let num = BigInt::from(3) * &scale + 1;
        let nearly_three = kernel.make_rational(&num, &scale).unwrap();
        assert_eq!(
            to_host(&kernel, &types, nearly_three, &HostType::Float64),
            Ok(Value::Float64(3.0))
        );
        let tiny = kernel.make_rational(&BigInt::from(-1), &scale).unwrap();
        assert_eq!(
            to_host(&kernel, &types, tiny, &HostType::Float64),
            Ok(Value::Float64(-0.0))
        );
        let huge = kernel.bigint_to_int(&scale);
        assert_eq!(
            to_host(&kernel, &types, huge, &HostType::Float64),
            Ok(Value::Float64(f64::INFINITY))
        );
    }

    #[test]
    fn test_ratio_to_f64_is_exact_for_small_parts() {
        let ratio = |n: i64, d: i64| ratio_to_f64(&BigInt::from(n), &BigInt::from(d));
        assert_eq!(ratio(1, 4), 0.25);
        assert_eq!(ratio(-7, 2), -3.5);
        assert_eq!(ratio(0, 5), 0.0);
        assert_eq!(ratio(1, 3), 1.0 / 3.0);
    }

    #[test]
    fn test_permutation_is_one_based() {
        let (mut kernel, types) = setup();
        let perm = kernel.new_perm(vec![2, 0, 1]).unwrap();
        let value = to_host(&kernel, &types, perm, &HostType::Any).unwrap();
        assert_eq!(value.to_string(), "Int64[3, 1, 2]");
    }

    #[test]
    fn test_record_to_dict() {
        let (mut kernel, types) = setup();
        let name = kernel.new_string("x");
        let record = kernel.new_record(vec![("a".into(), Obj::Int(1)), ("b".into(), name)]);
        let value = to_host(&kernel, &types, record, &HostType::Any).unwrap();
        assert_eq!(value.to_string(), r#"Dict{Symbol, Any}(:a => 1, :b => "x")"#);

        let target = HostType::dict(HostType::String, HostType::Any);
        let value = to_host(&kernel, &types, record, &target).unwrap();
        assert_eq!(value.type_name(), "Dict{String, Any}");
    }

    #[test]
    fn test_tuple_target() {
        let (mut kernel, types) = setup();
        let s = kernel.new_string("s");
        let list = kernel.new_plist(vec![Obj::Int(1), s]);
        let target = HostType::Tuple(vec![HostType::Int16, HostType::Symbol]);
        let value = to_host(&kernel, &types, list, &target).unwrap();
        assert_eq!(value.to_string(), "(1, :s)");

        let short = HostType::Tuple(vec![HostType::Any]);
        assert!(matches!(
            to_host(&kernel, &types, list, &short),
            Err(ConvertError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_cycle_into_tuple_fails() {
        let (mut kernel, types) = setup();
        let list = kernel.new_plist(vec![]);
        kernel.list_push(list, list);
        let target = HostType::Tuple(vec![HostType::Any]);
        assert_eq!(
            to_host(&kernel, &types, list, &target),
            Err(ConvertError::CyclicStructure)
        );
    }

    #[test]
    fn test_unsupported_kinds() {
        let (kernel, types) = setup();
        let length = kernel.global("Length").unwrap();
        assert_eq!(
            to_host(&kernel, &types, length, &HostType::Any),
            Err(ConvertError::Unsupported("function".to_string()))
        );
        assert_eq!(
            to_host(&kernel, &types, Obj::Fail, &HostType::Any),
            Err(ConvertError::Unsupported("fail".to_string()))
        );
    }

    #[test]
    fn test_value_handle_unwraps() {
        let (mut kernel, types) = setup();
        let handle = types.new_value_handle(&mut kernel, Value::symbol("wrapped"));
        assert_eq!(
            to_host(&kernel, &types, handle, &HostType::Any),
            Ok(Value::symbol("wrapped"))
        );
        assert!(to_host(&kernel, &types, handle, &HostType::String).is_err());
    }
}
