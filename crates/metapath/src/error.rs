use std::fmt;

use metaschema_datatypes::DataTypeError;
use thiserror::Error;

/// Whether an error was raised while compiling or while evaluating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Static,
    Dynamic,
}

/// A stable `<PREFIX><4-digit>` error identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    prefix: &'static str,
    number: u16,
}

impl ErrorCode {
    pub const XPST0003: ErrorCode = ErrorCode::new("XPST", 3);
    pub const XPST0008: ErrorCode = ErrorCode::new("XPST", 8);
    pub const XPST0010: ErrorCode = ErrorCode::new("XPST", 10);
    pub const XPST0017: ErrorCode = ErrorCode::new("XPST", 17);
    pub const XPST0051: ErrorCode = ErrorCode::new("XPST", 51);
    pub const XPST0080: ErrorCode = ErrorCode::new("XPST", 80);
    pub const XPST0081: ErrorCode = ErrorCode::new("XPST", 81);
    pub const XPTY0004: ErrorCode = ErrorCode::new("XPTY", 4);
    pub const XPTY0018: ErrorCode = ErrorCode::new("XPTY", 18);
    pub const XPTY0019: ErrorCode = ErrorCode::new("XPTY", 19);
    pub const XPTY0020: ErrorCode = ErrorCode::new("XPTY", 20);
    pub const XPDY0002: ErrorCode = ErrorCode::new("XPDY", 2);
    pub const XPDY0050: ErrorCode = ErrorCode::new("XPDY", 50);
    pub const XQDY0137: ErrorCode = ErrorCode::new("XQDY", 137);
    pub const FOAY0001: ErrorCode = ErrorCode::new("FOAY", 1);
    pub const FOAY0002: ErrorCode = ErrorCode::new("FOAY", 2);
    pub const FOAR0001: ErrorCode = ErrorCode::new("FOAR", 1);
    pub const FOAR0002: ErrorCode = ErrorCode::new("FOAR", 2);
    pub const FOCA0002: ErrorCode = ErrorCode::new("FOCA", 2);
    pub const FOER0000: ErrorCode = ErrorCode::new("FOER", 0);
    pub const FORG0001: ErrorCode = ErrorCode::new("FORG", 1);
    pub const FORG0003: ErrorCode = ErrorCode::new("FORG", 3);
    pub const FORG0004: ErrorCode = ErrorCode::new("FORG", 4);
    pub const FORG0005: ErrorCode = ErrorCode::new("FORG", 5);
    pub const FORG0006: ErrorCode = ErrorCode::new("FORG", 6);
    pub const FORX0002: ErrorCode = ErrorCode::new("FORX", 2);
    pub const FORX0003: ErrorCode = ErrorCode::new("FORX", 3);
    pub const FOTY0012: ErrorCode = ErrorCode::new("FOTY", 12);
    pub const FOTY0013: ErrorCode = ErrorCode::new("FOTY", 13);

    pub const fn new(prefix: &'static str, number: u16) -> Self {
        Self { prefix, number }
    }

    /// The error family, e.g. `FOAY`.
    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    pub fn number(&self) -> u16 {
        self.number
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:04}", self.prefix, self.number)
    }
}

/// The single error type raised by compilation and evaluation.
///
/// Callers branch on [`MetapathError::code`]; the message is informational.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct MetapathError {
    kind: ErrorKind,
    code: ErrorCode,
    message: String,
}

impl MetapathError {
    pub fn new(kind: ErrorKind, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    pub fn static_error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Static, code, message)
    }

    pub fn dynamic(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Dynamic, code, message)
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::static_error(ErrorCode::XPST0003, message)
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::static_error(ErrorCode::XPST0010, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::dynamic(ErrorCode::XPTY0004, message)
    }

    pub fn more_than_one_item(count: usize) -> Self {
        Self::type_error(format!(
            "expected at most one item but the sequence has {count} items"
        ))
    }

    pub fn context_absent() -> Self {
        Self::dynamic(ErrorCode::XPDY0002, "the context item is absent")
    }

    pub fn invalid_cast(from: impl fmt::Display, to: impl fmt::Display) -> Self {
        Self::type_error(format!("cannot cast {from} to {to}"))
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_static(&self) -> bool {
        self.kind == ErrorKind::Static
    }
}

impl From<DataTypeError> for MetapathError {
    fn from(err: DataTypeError) -> Self {
        match err {
            DataTypeError::Incomparable { .. } | DataTypeError::Representation { .. } => {
                MetapathError::type_error(err.to_string())
            }
            DataTypeError::InvalidLexical { .. } | DataTypeError::OutOfRange { .. } => {
                MetapathError::dynamic(ErrorCode::FORG0001, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_formatting() {
        assert_eq!(ErrorCode::FOAY0001.to_string(), "FOAY0001");
        assert_eq!(ErrorCode::XQDY0137.to_string(), "XQDY0137");
        assert_eq!(ErrorCode::FOAY0001.prefix(), "FOAY");
        assert_eq!(ErrorCode::FOAY0001.number(), 1);
    }

    #[test]
    fn test_display_leads_with_code() {
        let err = MetapathError::syntax("unexpected token");
        assert_eq!(err.to_string(), "XPST0003: unexpected token");
        assert!(err.is_static());
    }

    #[test]
    fn test_datatype_errors_map_to_cast_failures() {
        let err: MetapathError = metaschema_datatypes::DataType::Integer
            .parse("abc")
            .unwrap_err()
            .into();
        assert_eq!(err.code(), ErrorCode::FORG0001);
        assert_eq!(err.kind(), ErrorKind::Dynamic);
    }
}
