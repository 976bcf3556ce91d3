use std::fmt;

/// Error raised inside the host runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// A name with no binding.
    UndefVar(String),
    /// No method of `function` accepts arguments of these types.
    MethodError { function: String, args: Vec<String> },
    ArgumentError(String),
    BoundsError { len: usize, index: i64 },
    /// Generic error carrying only a message, as raised by `error(...)` and
    /// by errors translated from the kernel.
    ErrorException(String),
    ParseError(String),
}

impl HostError {
    pub fn method_error(function: &str, args: &[crate::host::value::Value]) -> Self {
        HostError::MethodError {
            function: function.to_string(),
            args: args.iter().map(|arg| arg.type_name()).collect(),
        }
    }

    /// Message text without the error kind prefix.
    pub fn message(&self) -> String {
        match self {
            HostError::ErrorException(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::UndefVar(name) => write!(f, "UndefVarError: `{}` not defined", name),
            HostError::MethodError { function, args } => write!(
                f,
                "MethodError: no method matching {}({})",
                function,
                args.iter()
                    .map(|arg| format!("::{}", arg))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            HostError::ArgumentError(message) => write!(f, "ArgumentError: {}", message),
            HostError::BoundsError { len, index } => write!(
                f,
                "BoundsError: attempt to access {}-element collection at index [{}]",
                len, index
            ),
            HostError::ErrorException(message) => f.write_str(message),
            HostError::ParseError(message) => write!(f, "ParseError: {}", message),
        }
    }
}

impl std::error::Error for HostError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::value::Value;

    #[test]
    fn test_display() {
        assert_eq!(
            HostError::method_error("+", &[Value::Int64(1), Value::string("a")]).to_string(),
            "MethodError: no method matching +(::Int64, ::String)"
        );
        assert_eq!(
            HostError::UndefVar("x".to_string()).to_string(),
            "UndefVarError: `x` not defined"
        );
        assert_eq!(HostError::ErrorException("boom".to_string()).message(), "boom");
    }
}
