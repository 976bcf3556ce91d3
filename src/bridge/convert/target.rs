use std::fmt;

/// Target descriptor for host-to-kernel conversion.
///
/// The reverse direction uses [`crate::host::types::HostType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KernelType {
    /// Pick the natural kernel kind for the source value.
    Any,
    Integer,
    Rational,
    Float,
    Char,
    String,
    Bool,
    /// Plain list with every element converted to the given type.
    List(Box<KernelType>),
    /// Record with every component converted to the given type.
    Record(Box<KernelType>),
    /// Wrap the value in a value handle without converting it.
    Opaque,
}

impl KernelType {
    pub fn list(element: KernelType) -> KernelType {
        KernelType::List(Box::new(element))
    }

    pub fn record(component: KernelType) -> KernelType {
        KernelType::Record(Box::new(component))
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelType::Any => f.write_str("object"),
            KernelType::Integer => f.write_str("integer"),
            KernelType::Rational => f.write_str("rational"),
            KernelType::Float => f.write_str("float"),
            KernelType::Char => f.write_str("character"),
            KernelType::String => f.write_str("string"),
            KernelType::Bool => f.write_str("boolean"),
            KernelType::List(element) => write!(f, "list of {}", element),
            KernelType::Record(component) => write!(f, "record of {}", component),
            KernelType::Opaque => f.write_str("host object"),
        }
    }
}
