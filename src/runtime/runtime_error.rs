/// A fatal error raised by the VM. Execution aborts on the first one.
///
/// The message is the whole contract: the REPL and the tests match these
/// strings verbatim, so constructors below are the only places that
/// format them.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        RuntimeError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RuntimeError {}

pub fn stack_overflow() -> RuntimeError {
    RuntimeError::new("stack overflow")
}

pub fn stack_underflow() -> RuntimeError {
    RuntimeError::new("stack underflow")
}

pub fn frame_overflow() -> RuntimeError {
    RuntimeError::new("frame overflow")
}

pub fn calling_non_function() -> RuntimeError {
    RuntimeError::new("calling non-function")
}

pub fn wrong_number_of_arguments(want: usize, got: usize) -> RuntimeError {
    RuntimeError::new(format!(
        "wrong number of arguments: want={}, got={}",
        want, got
    ))
}

pub fn unsupported_binary_types(left: &str, right: &str) -> RuntimeError {
    RuntimeError::new(format!(
        "unsupported types for binary operation: {} {}",
        left, right
    ))
}

pub fn unknown_string_operator(code: u8) -> RuntimeError {
    RuntimeError::new(format!("unknown string operator: {}", code))
}

pub fn unknown_integer_operator(code: u8) -> RuntimeError {
    RuntimeError::new(format!("unknown integer operator: {}", code))
}

pub fn unknown_comparison_operator(code: u8, left: &str, right: &str) -> RuntimeError {
    RuntimeError::new(format!("unknown operator: {} ({} {})", code, left, right))
}

pub fn unsupported_negation(kind: &str) -> RuntimeError {
    RuntimeError::new(format!("unsupported type for negation: {}", kind))
}

pub fn index_not_supported(kind: &str) -> RuntimeError {
    RuntimeError::new(format!("index operator not supported: {}", kind))
}

pub fn unusable_hash_key(kind: &str) -> RuntimeError {
    RuntimeError::new(format!("unusable as hash key: {}", kind))
}

pub fn division_by_zero() -> RuntimeError {
    RuntimeError::new("division by zero")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_stable() {
        assert_eq!(stack_overflow().to_string(), "stack overflow");
        assert_eq!(frame_overflow().to_string(), "frame overflow");
        assert_eq!(calling_non_function().to_string(), "calling non-function");
        assert_eq!(
            wrong_number_of_arguments(2, 1).to_string(),
            "wrong number of arguments: want=2, got=1"
        );
        assert_eq!(
            unsupported_binary_types("INTEGER", "BOOLEAN").to_string(),
            "unsupported types for binary operation: INTEGER BOOLEAN"
        );
        assert_eq!(
            unusable_hash_key("FLOAT").to_string(),
            "unusable as hash key: FLOAT"
        );
    }
}
