use crate::error::{ErrorCode, MetapathError};
use crate::item::Sequence;

use super::string_arg;

/// Raises `FOER0000`; the optional code and description become the message.
pub fn fn_error<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let code = string_arg(args, 0);
    let description = string_arg(args, 1);
    let message = match (code.is_empty(), description.is_empty()) {
        (true, true) => "error() called".to_string(),
        (false, true) => code,
        (true, false) => description,
        (false, false) => format!("{code}: {description}"),
    };
    Err(MetapathError::dynamic(ErrorCode::FOER0000, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaschema_datatypes::AtomicValue;

    #[test]
    fn test_error_always_fails() {
        let err = fn_error::<()>(&[]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FOER0000);
        let err = fn_error::<()>(&[
            Sequence::from_atomic(AtomicValue::string("E1")),
            Sequence::from_atomic(AtomicValue::string("bad input")),
        ])
        .unwrap_err();
        assert_eq!(err.message(), "E1: bad input");
    }
}
