use std::fmt;

/// An error raised inside the kernel.
///
/// By the time a `KernelError` exists its text has already been written to
/// the kernel's error stream; the value itself only carries the message so
/// callers that suppress error translation can still report something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelError {
    pub message: String,
}

impl KernelError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error, {}", self.message)
    }
}

impl std::error::Error for KernelError {}
