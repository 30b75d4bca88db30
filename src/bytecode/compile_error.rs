#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// An identifier that resolves to nothing in any enclosing scope.
    UndefinedVariable(String),
    /// A prefix or infix operator the compiler has no lowering for.
    UnknownOperator(String),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::UndefinedVariable(name) => {
                write!(f, "undefined variable: {}", name)
            }
            CompileError::UnknownOperator(op) => {
                write!(f, "unknown operator: {}", op)
            }
        }
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_the_stable_message() {
        assert_eq!(
            CompileError::UndefinedVariable("x".to_string()).to_string(),
            "undefined variable: x"
        );
        assert_eq!(
            CompileError::UnknownOperator("~".to_string()).to_string(),
            "unknown operator: ~"
        );
    }

    #[test]
    fn test_implements_std_error() {
        let err = CompileError::UndefinedVariable("y".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
