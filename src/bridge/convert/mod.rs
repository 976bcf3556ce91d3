//! Recursive, target-directed conversion between kernel objects and host
//! values.
//!
//! Each top-level call owns a fresh identity memo. Shared sub-objects come
//! out shared, and cycles through mutable containers come out as cycles:
//! lists, records, arrays and dicts are memoised before their children are
//! converted. Host tuples are immutable, so a cycle that runs back into a
//! tuple still under construction cannot be reproduced and is reported as
//! [`ConvertError::CyclicStructure`].

use std::fmt;

use crate::{host::error::HostError, kernel::error::KernelError};

pub mod memo;
pub mod target;
pub mod to_host;
pub mod to_kernel;

pub use target::KernelType;
pub use to_host::to_host;
pub use to_kernel::to_kernel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// The source kind cannot become the requested target kind.
    TypeMismatch { expected: String, found: String },
    /// No conversion exists for this kind at all.
    Unsupported(String),
    /// A tuple is reachable from itself.
    CyclicStructure,
    /// The kernel refused to build the destination object.
    Kernel(KernelError),
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::TypeMismatch { expected, found } => {
                write!(f, "cannot convert {} to {}", found, expected)
            }
            ConvertError::Unsupported(kind) => write!(f, "no conversion for {}", kind),
            ConvertError::CyclicStructure => {
                f.write_str("cyclic structure cannot be converted to a tuple")
            }
            ConvertError::Kernel(error) => f.write_str(&error.message),
        }
    }
}

impl std::error::Error for ConvertError {}

impl From<KernelError> for ConvertError {
    fn from(error: KernelError) -> Self {
        ConvertError::Kernel(error)
    }
}

impl From<ConvertError> for HostError {
    fn from(error: ConvertError) -> Self {
        HostError::ArgumentError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let mismatch = ConvertError::TypeMismatch {
            expected: "Int8".to_string(),
            found: "string".to_string(),
        };
        assert_eq!(mismatch.to_string(), "cannot convert string to Int8");
        assert_eq!(
            HostError::from(ConvertError::Unsupported("fail".to_string())).to_string(),
            "ArgumentError: no conversion for fail"
        );
    }
}
