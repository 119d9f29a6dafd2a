use chrono::NaiveTime;
use metaschema_datatypes::{AtomicValue, DataType, DataTypeError, DateTimeValue, Value};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{ErrorCode, MetapathError};
use crate::types::AtomicOrUnionType;

/// Casts to a leaf type, or to the first member of a union type that
/// accepts the value.
pub(crate) fn cast(
    value: &AtomicValue,
    target: &AtomicOrUnionType,
) -> Result<AtomicValue, MetapathError> {
    if let AtomicOrUnionType::Leaf(datatype) = target {
        return cast_to(value, *datatype);
    }
    if target.is_instance(value) {
        return Ok(value.clone());
    }
    let mut failure = None;
    for member in target.members() {
        match cast_to(value, member) {
            Ok(cast) => return Ok(cast),
            Err(err) => failure = Some(err),
        }
    }
    Err(failure.unwrap_or_else(|| MetapathError::invalid_cast(value.datatype(), target)))
}

fn cast_to(value: &AtomicValue, target: DataType) -> Result<AtomicValue, MetapathError> {
    let source = value.datatype();
    if source == target {
        return Ok(value.clone());
    }
    if source.is_textual() || target.is_textual() {
        return Ok(target.parse(&value.to_string())?);
    }

    let converted = match (value.value(), target) {
        (Value::Boolean(b), DataType::Decimal) => {
            Value::Decimal(if *b { Decimal::new(10, 1) } else { Decimal::new(0, 1) })
        }
        (Value::Boolean(b), t) if t.derives_from(DataType::Integer) => Value::Integer(i64::from(*b)),
        (Value::Integer(i), DataType::Boolean) => Value::Boolean(*i != 0),
        (Value::Decimal(d), DataType::Boolean) => Value::Boolean(!d.is_zero()),
        (Value::Integer(i), DataType::Decimal) => Value::Decimal(Decimal::from(*i)),
        (Value::Decimal(d), t) if t.derives_from(DataType::Integer) => {
            Value::Integer(d.trunc().to_i64().ok_or_else(|| {
                MetapathError::dynamic(
                    ErrorCode::FOCA0002,
                    format!("{d} is outside the range of {}", t.name()),
                )
            })?)
        }
        (Value::DateTime(dt), DataType::Date | DataType::DateWithTimezone) => {
            Value::Date(dt.date())
        }
        (Value::Date(d), DataType::DateTime | DataType::DateTimeWithTimezone) => Value::DateTime(
            DateTimeValue::new(d.date.and_time(NaiveTime::MIN), d.offset),
        ),
        _ => return retag(value, target),
    };
    Ok(AtomicValue::new(target, converted)?)
}

/// Moves a value to another datatype with the same representation, such as
/// `integer` to `positive-integer` or `date` to `date-with-timezone`.
fn retag(value: &AtomicValue, target: DataType) -> Result<AtomicValue, MetapathError> {
    value.with_datatype(target).map_err(|err| match err {
        DataTypeError::Representation { .. } => {
            MetapathError::invalid_cast(value.datatype(), target)
        }
        other => other.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{eval, text};
    use super::*;

    fn leaf(datatype: DataType) -> AtomicOrUnionType {
        AtomicOrUnionType::Leaf(datatype)
    }

    #[test]
    fn test_boolean_to_decimal_encoding() {
        let one = cast(&AtomicValue::boolean(true), &leaf(DataType::Decimal)).unwrap();
        assert_eq!(one.to_string(), "1.0");
        let zero = cast(&AtomicValue::boolean(false), &leaf(DataType::Decimal)).unwrap();
        assert_eq!(zero.to_string(), "0.0");
        assert_eq!(text(&eval("true() cast as meta:decimal").unwrap()), "1.0");
    }

    #[test]
    fn test_numeric_casts() {
        let decimal = DataType::Decimal.parse("-2.7").unwrap();
        assert_eq!(cast(&decimal, &leaf(DataType::Integer)).unwrap(), AtomicValue::integer(-2));
        assert_eq!(
            cast(&AtomicValue::integer(0), &leaf(DataType::Boolean)).unwrap(),
            AtomicValue::boolean(false)
        );
        assert_eq!(
            cast(&AtomicValue::integer(-1), &leaf(DataType::PositiveInteger))
                .unwrap_err()
                .code(),
            ErrorCode::FORG0001
        );
    }

    #[test]
    fn test_text_casts_parse_lexical_forms() {
        let date = cast(&AtomicValue::string("2024-02-29"), &leaf(DataType::Date)).unwrap();
        assert_eq!(date.datatype(), DataType::Date);
        assert_eq!(
            cast(&AtomicValue::string("abc"), &leaf(DataType::Integer))
                .unwrap_err()
                .code(),
            ErrorCode::FORG0001
        );
        let back = cast(&AtomicValue::integer(42), &leaf(DataType::String)).unwrap();
        assert_eq!(back, AtomicValue::string("42"));
    }

    #[test]
    fn test_temporal_casts() {
        let dt = DataType::DateTime.parse("2024-05-01T12:30:00Z").unwrap();
        let date = cast(&dt, &leaf(DataType::DateWithTimezone)).unwrap();
        assert_eq!(date.to_string(), "2024-05-01Z");
        let date = DataType::Date.parse("2024-05-01").unwrap();
        assert_eq!(
            cast(&date, &leaf(DataType::DateTime)).unwrap().to_string(),
            "2024-05-01T00:00:00"
        );
    }

    #[test]
    fn test_union_targets_try_members_in_order() {
        let numeric = cast(&AtomicValue::string("12"), &AtomicOrUnionType::Numeric).unwrap();
        assert_eq!(numeric.datatype(), DataType::Integer);
        let numeric = cast(&AtomicValue::string("1.5"), &AtomicOrUnionType::Numeric).unwrap();
        assert_eq!(numeric.datatype(), DataType::Decimal);
        let kept = cast(&AtomicValue::integer(3), &AtomicOrUnionType::Numeric).unwrap();
        assert_eq!(kept, AtomicValue::integer(3));
    }

    #[test]
    fn test_unsupported_pairs_are_invalid_casts() {
        let duration = DataType::DayTimeDuration.parse("PT1H").unwrap();
        assert_eq!(
            cast(&duration, &leaf(DataType::Integer)).unwrap_err().code(),
            ErrorCode::XPTY0004
        );
    }
}
