//! Integer and rational representation in the kernel.
//!
//! Integers in the immediate range are `Obj::Int`; everything else is a
//! `LargeInt` bag holding the sign and the little-endian 64-bit limbs of the
//! magnitude. Large integers are always normalised: no trailing zero limbs,
//! and never a value that would fit the immediate range.

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::kernel::{Kernel, error::KernelError, heap_object::HeapObject, obj::Obj};

/// Splits 64-bit limbs into the 32-bit digits `num-bigint` is built from.
pub(crate) fn limbs_to_biguint(limbs: &[u64]) -> BigUint {
    let mut digits = Vec::with_capacity(limbs.len() * 2);
    for limb in limbs {
        digits.push(*limb as u32);
        digits.push((*limb >> 32) as u32);
    }
    BigUint::new(digits)
}

impl Kernel {
    /// Returns the kernel integer for `value`, immediate when it fits.
    pub fn make_int(&mut self, value: i128) -> Obj {
        if Obj::fits_immediate(value) {
            return Obj::Int(value as i64);
        }
        let negative = value < 0;
        let magnitude = value.unsigned_abs();
        self.make_large_int(negative, vec![magnitude as u64, (magnitude >> 64) as u64])
    }

    /// Builds an integer from a sign and little-endian magnitude limbs,
    /// normalising the representation.
    pub fn make_large_int(&mut self, negative: bool, mut limbs: Vec<u64>) -> Obj {
        while limbs.last() == Some(&0) {
            limbs.pop();
        }
        match limbs.as_slice() {
            [] => return Obj::Int(0),
            [single] => {
                let magnitude = *single as i128;
                let value = if negative { -magnitude } else { magnitude };
                if Obj::fits_immediate(value) {
                    return Obj::Int(value as i64);
                }
            }
            _ => {}
        }
        Obj::Bag(self.heap.alloc(HeapObject::LargeInt { negative, limbs }))
    }

    /// Returns the sign and magnitude limbs of a large integer bag.
    pub fn large_int_parts(&self, obj: Obj) -> Option<(bool, &[u64])> {
        match self.bag_object(obj)? {
            HeapObject::LargeInt { negative, limbs } => Some((*negative, limbs.as_slice())),
            _ => None,
        }
    }

    pub fn is_int(&self, obj: Obj) -> bool {
        matches!(obj, Obj::Int(_)) || self.large_int_parts(obj).is_some()
    }

    pub fn is_rational(&self, obj: Obj) -> bool {
        matches!(self.bag_object(obj), Some(HeapObject::Rational { .. }))
    }

    /// Returns the integer value of `obj` as a `BigInt`.
    pub fn int_to_bigint(&self, obj: Obj) -> Option<BigInt> {
        match obj {
            Obj::Int(v) => Some(BigInt::from(v)),
            _ => {
                let (negative, limbs) = self.large_int_parts(obj)?;
                let sign = if negative { Sign::Minus } else { Sign::Plus };
                Some(BigInt::from_biguint(sign, limbs_to_biguint(limbs)))
            }
        }
    }

    pub fn bigint_to_int(&mut self, value: &BigInt) -> Obj {
        if let Some(small) = value.to_i128() {
            return self.make_int(small);
        }
        self.make_large_int(value.is_negative(), value.magnitude().to_u64_digits())
    }

    /// Returns the low 64 bits of the two's complement representation of an
    /// integer, whatever its size.
    pub fn int_low_bits(&self, obj: Obj) -> Option<u64> {
        match obj {
            Obj::Int(v) => Some(v as u64),
            _ => {
                let (negative, limbs) = self.large_int_parts(obj)?;
                let low = limbs.first().copied().unwrap_or(0);
                Some(if negative { low.wrapping_neg() } else { low })
            }
        }
    }

    /// Builds the rational `num / den`, reduced, collapsing to an integer
    /// when the denominator becomes one.
    pub fn make_rational(&mut self, num: &BigInt, den: &BigInt) -> Result<Obj, KernelError> {
        if den.is_zero() {
            return Err(self.raise("Rational operations: <divisor> must not be zero"));
        }
        let gcd = num.gcd(den);
        let (mut num, mut den) = (num / &gcd, den / &gcd);
        if den.is_negative() {
            num = -num;
            den = -den;
        }
        if den.is_one() {
            return Ok(self.bigint_to_int(&num));
        }
        let num = self.bigint_to_int(&num);
        let den = self.bigint_to_int(&den);
        Ok(Obj::Bag(self.heap.alloc(HeapObject::Rational { num, den })))
    }

    /// Returns numerator and denominator objects of a rational bag.
    pub fn rational_parts(&self, obj: Obj) -> Option<(Obj, Obj)> {
        match self.bag_object(obj)? {
            HeapObject::Rational { num, den } => Some((*num, *den)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::obj::INT_IMMEDIATE_MAX;

    #[test]
    fn test_make_int_immediate_and_large() {
        let mut kernel = Kernel::new();
        assert_eq!(kernel.make_int(12345), Obj::Int(12345));

        let large = kernel.make_int(INT_IMMEDIATE_MAX as i128 + 1);
        assert_eq!(kernel.large_int_parts(large), Some((false, &[1u64 << 60][..])));

        let negative = kernel.make_int(-(1i128 << 100));
        let (neg, limbs) = kernel.large_int_parts(negative).unwrap();
        assert!(neg);
        assert_eq!(limbs, &[0, 1 << 36]);
    }

    #[test]
    fn test_large_int_normalises_to_immediate() {
        let mut kernel = Kernel::new();
        assert_eq!(kernel.make_large_int(true, vec![7, 0, 0]), Obj::Int(-7));
        assert_eq!(kernel.make_large_int(false, vec![]), Obj::Int(0));
    }

    #[test]
    fn test_bigint_round_trip() {
        let mut kernel = Kernel::new();
        let value: BigInt = "-1234567890123456789012345678901234567890".parse().unwrap();
        let obj = kernel.bigint_to_int(&value);
        assert!(matches!(obj, Obj::Bag(_)));
        assert_eq!(kernel.int_to_bigint(obj), Some(value));
    }

    #[test]
    fn test_int_low_bits() {
        let mut kernel = Kernel::new();
        assert_eq!(kernel.int_low_bits(Obj::Int(-1)), Some(u64::MAX));
        let big = kernel.make_int((1i128 << 64) + 300);
        assert_eq!(kernel.int_low_bits(big), Some(300));
        let neg = kernel.make_int(-((1i128 << 64) + 300));
        assert_eq!(kernel.int_low_bits(neg), Some(300u64.wrapping_neg()));
    }

    #[test]
    fn test_make_rational_reduces() {
        let mut kernel = Kernel::new();
        let r = kernel
            .make_rational(&BigInt::from(6), &BigInt::from(-4))
            .unwrap();
        assert_eq!(kernel.rational_parts(r), Some((Obj::Int(-3), Obj::Int(2))));

        let whole = kernel
            .make_rational(&BigInt::from(8), &BigInt::from(4))
            .unwrap();
        assert_eq!(whole, Obj::Int(2));
    }

    #[test]
    fn test_make_rational_zero_denominator_raises() {
        let mut kernel = Kernel::new();
        let err = kernel
            .make_rational(&BigInt::from(1), &BigInt::zero())
            .unwrap_err();
        assert!(err.message.contains("must not be zero"));
    }
}
