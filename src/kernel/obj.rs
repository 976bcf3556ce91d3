use std::fmt;

/// Smallest integer stored as an immediate `Obj::Int`.
pub const INT_IMMEDIATE_MIN: i64 = -(1 << 60);
/// Largest integer stored as an immediate `Obj::Int`.
pub const INT_IMMEDIATE_MAX: i64 = (1 << 60) - 1;

/// Permutations of degree up to this bound use 16-bit point images.
pub const MAX_DEG_PERM2: usize = 1 << 16;

/// Reference to a bag on the kernel heap.
///
/// A `BagRef` is a copyable slot index. It stays valid until the collector
/// sweeps the bag; using it afterwards is a contract violation and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BagRef(pub(crate) u32);

impl BagRef {
    /// Returns the raw heap slot index backing this reference.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Type number of a kernel object.
///
/// Built-in kinds use the constants below; package kinds registered at run
/// time receive numbers starting at [`TNum::FIRST_PACKAGE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TNum(pub(crate) u16);

impl TNum {
    pub const INT: TNum = TNum(0);
    pub const INTPOS: TNum = TNum(1);
    pub const INTNEG: TNum = TNum(2);
    pub const RAT: TNum = TNum(3);
    pub const MACFLOAT: TNum = TNum(4);
    pub const CHAR: TNum = TNum(5);
    pub const BOOL: TNum = TNum(6);
    pub const INFINITY: TNum = TNum(7);
    pub const STRING: TNum = TNum(8);
    pub const PERM2: TNum = TNum(9);
    pub const PERM4: TNum = TNum(10);
    pub const PLIST: TNum = TNum(11);
    pub const PREC: TNum = TNum(12);
    pub const FUNCTION: TNum = TNum(13);
    pub const FIRST_PACKAGE: TNum = TNum(64);

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn is_package(self) -> bool {
        self >= TNum::FIRST_PACKAGE
    }
}

/// A kernel value: either an immediate or a reference to a heap bag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Obj {
    /// Immediate integer in `[INT_IMMEDIATE_MIN, INT_IMMEDIATE_MAX]`.
    Int(i64),
    /// Single byte character.
    Char(u8),
    True,
    False,
    /// The kernel's failure value.
    Fail,
    /// Machine float.
    Float(f64),
    Infinity,
    NegInfinity,
    Bag(BagRef),
}

impl Obj {
    pub fn bool(value: bool) -> Obj {
        if value { Obj::True } else { Obj::False }
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Obj::Fail)
    }

    pub fn as_bag(&self) -> Option<BagRef> {
        match self {
            Obj::Bag(bag) => Some(*bag),
            _ => None,
        }
    }

    /// Returns `true` when `value` fits the immediate integer range.
    pub fn fits_immediate(value: i128) -> bool {
        value >= INT_IMMEDIATE_MIN as i128 && value <= INT_IMMEDIATE_MAX as i128
    }
}

impl fmt::Display for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Obj::Int(v) => write!(f, "{}", v),
            Obj::Char(c) => write!(f, "'{}'", *c as char),
            Obj::True => f.write_str("true"),
            Obj::False => f.write_str("false"),
            Obj::Fail => f.write_str("fail"),
            Obj::Float(v) => write!(f, "{}", v),
            Obj::Infinity => f.write_str("infinity"),
            Obj::NegInfinity => f.write_str("-infinity"),
            Obj::Bag(bag) => write!(f, "<bag {}>", bag.0),
        }
    }
}
