use std::{any::Any, fmt, rc::Rc};

use crate::kernel::{Kernel, error::KernelError, obj::Obj, obj::TNum};

/// Native handler behind a kernel function object.
///
/// Returning `Ok(None)` means the function produced no value.
pub type KernelHandler = Rc<dyn Fn(&mut Kernel, &[Obj]) -> Result<Option<Obj>, KernelError>>;

/// Function object callable from kernel code.
#[derive(Clone)]
pub struct KernelFunction {
    pub name: String,
    /// Number of arguments, or `None` for a variadic function.
    pub arity: Option<usize>,
    pub params: Vec<String>,
    pub handler: KernelHandler,
}

impl fmt::Debug for KernelFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KernelFunction({})", self.name)
    }
}

/// Objects that live on the kernel heap.
pub enum HeapObject {
    /// Integer outside the immediate range; `limbs` is the little-endian
    /// magnitude without trailing zero limbs.
    LargeInt { negative: bool, limbs: Vec<u64> },
    /// Reduced fraction with a positive denominator other than one.
    Rational { num: Obj, den: Obj },
    String(String),
    /// Permutation with 16-bit zero-based point images.
    Perm2(Vec<u16>),
    /// Permutation with 32-bit zero-based point images.
    Perm4(Vec<u32>),
    /// Plain list of objects.
    PList(Vec<Obj>),
    /// Record with components in insertion order.
    Record(Vec<(String, Obj)>),
    Function(KernelFunction),
    /// Bag of a type registered at run time.
    Package { tnum: TNum, payload: Box<dyn Any> },
}

impl HeapObject {
    pub fn tnum(&self) -> TNum {
        match self {
            HeapObject::LargeInt { negative: false, .. } => TNum::INTPOS,
            HeapObject::LargeInt { negative: true, .. } => TNum::INTNEG,
            HeapObject::Rational { .. } => TNum::RAT,
            HeapObject::String(_) => TNum::STRING,
            HeapObject::Perm2(_) => TNum::PERM2,
            HeapObject::Perm4(_) => TNum::PERM4,
            HeapObject::PList(_) => TNum::PLIST,
            HeapObject::Record(_) => TNum::PREC,
            HeapObject::Function(_) => TNum::FUNCTION,
            HeapObject::Package { tnum, .. } => *tnum,
        }
    }

    /// Pushes every object this bag references onto `out`.
    pub(crate) fn children(&self, out: &mut Vec<Obj>) {
        match self {
            HeapObject::Rational { num, den } => {
                out.push(*num);
                out.push(*den);
            }
            HeapObject::PList(items) => out.extend(items.iter().copied()),
            HeapObject::Record(components) => {
                out.extend(components.iter().map(|(_, value)| *value));
            }
            // Leaf types: no kernel references
            HeapObject::LargeInt { .. }
            | HeapObject::String(_)
            | HeapObject::Perm2(_)
            | HeapObject::Perm4(_)
            | HeapObject::Function(_)
            | HeapObject::Package { .. } => {}
        }
    }
}

impl fmt::Debug for HeapObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapObject::LargeInt { negative, limbs } => f
                .debug_struct("LargeInt")
                .field("negative", negative)
                .field("limbs", limbs)
                .finish(),
            HeapObject::Rational { num, den } => {
                f.debug_struct("Rational").field("num", num).field("den", den).finish()
            }
            HeapObject::String(s) => f.debug_tuple("String").field(s).finish(),
            HeapObject::Perm2(images) => f.debug_tuple("Perm2").field(images).finish(),
            HeapObject::Perm4(images) => f.debug_tuple("Perm4").field(images).finish(),
            HeapObject::PList(items) => f.debug_tuple("PList").field(items).finish(),
            HeapObject::Record(components) => f.debug_tuple("Record").field(components).finish(),
            HeapObject::Function(func) => func.fmt(f),
            HeapObject::Package { tnum, .. } => write!(f, "Package({})", tnum.raw()),
        }
    }
}
