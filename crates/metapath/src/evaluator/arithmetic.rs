//! Arithmetic over numbers, dates and durations.

use chrono::{Months, NaiveDate, NaiveDateTime, TimeDelta};
use metaschema_datatypes::{AtomicValue, DateTimeValue, DateValue, Value};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::cst::ArithmeticOperator;
use crate::error::{ErrorCode, MetapathError};

use ArithmeticOperator::*;

fn overflow(what: &str) -> MetapathError {
    MetapathError::dynamic(ErrorCode::FOAR0002, format!("{what} overflow"))
}

fn division_by_zero() -> MetapathError {
    MetapathError::dynamic(ErrorCode::FOAR0001, "division by zero")
}

fn unsupported(left: &AtomicValue, operator: ArithmeticOperator, right: &AtomicValue) -> MetapathError {
    MetapathError::type_error(format!(
        "operator '{}' is not defined for {} and {}",
        operator.symbol(),
        left.datatype(),
        right.datatype()
    ))
}

/// Applies a binary arithmetic operator to two atomic operands.
pub(crate) fn apply(
    left: &AtomicValue,
    operator: ArithmeticOperator,
    right: &AtomicValue,
) -> Result<AtomicValue, MetapathError> {
    let fail = || unsupported(left, operator, right);
    match (left.value(), right.value()) {
        (Value::Integer(a), Value::Integer(b)) => integer_op(*a, operator, *b),
        _ if left.is_numeric() && right.is_numeric() => {
            match (left.as_decimal(), right.as_decimal()) {
                (Some(a), Some(b)) => decimal_op(a, operator, b),
                _ => Err(fail()),
            }
        }

        (Value::Date(date), Value::DayTimeDuration(delta)) => match operator {
            Add => shift_date(left, date, *delta),
            Subtract => shift_date(left, date, -*delta),
            _ => Err(fail()),
        },
        (Value::DayTimeDuration(delta), Value::Date(date)) if operator == Add => {
            shift_date(right, date, *delta)
        }
        (Value::DateTime(dt), Value::DayTimeDuration(delta)) => match operator {
            Add => shift_date_time(left, dt, *delta),
            Subtract => shift_date_time(left, dt, -*delta),
            _ => Err(fail()),
        },
        (Value::DayTimeDuration(delta), Value::DateTime(dt)) if operator == Add => {
            shift_date_time(right, dt, *delta)
        }
        (Value::Date(date), Value::YearMonthDuration(months)) => match operator {
            Add => add_months_to_date(left, date, *months),
            Subtract => add_months_to_date(left, date, -*months),
            _ => Err(fail()),
        },
        (Value::DateTime(dt), Value::YearMonthDuration(months)) => match operator {
            Add => add_months_to_date_time(left, dt, *months),
            Subtract => add_months_to_date_time(left, dt, -*months),
            _ => Err(fail()),
        },
        (Value::Date(a), Value::Date(b)) if operator == Subtract => {
            Ok(AtomicValue::day_time_duration(a.to_utc() - b.to_utc()))
        }
        (Value::DateTime(a), Value::DateTime(b)) if operator == Subtract => {
            Ok(AtomicValue::day_time_duration(a.to_utc() - b.to_utc()))
        }

        (Value::DayTimeDuration(a), Value::DayTimeDuration(b)) => match operator {
            Add => a
                .checked_add(b)
                .map(AtomicValue::day_time_duration)
                .ok_or_else(|| overflow("duration")),
            Subtract => a
                .checked_sub(b)
                .map(AtomicValue::day_time_duration)
                .ok_or_else(|| overflow("duration")),
            Divide => decimal_op(nanos(*a)?, Divide, nanos(*b)?),
            _ => Err(fail()),
        },
        (Value::YearMonthDuration(a), Value::YearMonthDuration(b)) => match operator {
            Add => a
                .checked_add(*b)
                .map(AtomicValue::year_month_duration)
                .ok_or_else(|| overflow("duration")),
            Subtract => a
                .checked_sub(*b)
                .map(AtomicValue::year_month_duration)
                .ok_or_else(|| overflow("duration")),
            Divide => decimal_op(Decimal::from(*a), Divide, Decimal::from(*b)),
            _ => Err(fail()),
        },
        (Value::DayTimeDuration(delta), _) if right.is_numeric() => {
            scale_day_time(*delta, operator, right).ok_or_else(fail)?
        }
        (_, Value::DayTimeDuration(delta)) if left.is_numeric() && operator == Multiply => {
            scale_day_time(*delta, operator, left).ok_or_else(fail)?
        }
        (Value::YearMonthDuration(months), _) if right.is_numeric() => {
            scale_year_month(*months, operator, right).ok_or_else(fail)?
        }
        (_, Value::YearMonthDuration(months)) if left.is_numeric() && operator == Multiply => {
            scale_year_month(*months, operator, left).ok_or_else(fail)?
        }
        _ => Err(fail()),
    }
}

fn integer_op(a: i64, operator: ArithmeticOperator, b: i64) -> Result<AtomicValue, MetapathError> {
    let result = match operator {
        Add => a.checked_add(b),
        Subtract => a.checked_sub(b),
        Multiply => a.checked_mul(b),
        Divide => return decimal_op(Decimal::from(a), Divide, Decimal::from(b)),
        IntegerDivide => {
            if b == 0 {
                return Err(division_by_zero());
            }
            a.checked_div(b)
        }
        Modulo => {
            if b == 0 {
                return Err(division_by_zero());
            }
            a.checked_rem(b)
        }
    };
    result
        .map(AtomicValue::integer)
        .ok_or_else(|| overflow("integer"))
}

fn decimal_op(
    a: Decimal,
    operator: ArithmeticOperator,
    b: Decimal,
) -> Result<AtomicValue, MetapathError> {
    if matches!(operator, Divide | IntegerDivide | Modulo) && b.is_zero() {
        return Err(division_by_zero());
    }
    let result = match operator {
        Add => a.checked_add(b),
        Subtract => a.checked_sub(b),
        Multiply => a.checked_mul(b),
        Divide => a.checked_div(b).map(|d| d.normalize()),
        Modulo => a.checked_rem(b),
        IntegerDivide => {
            return a
                .checked_div(b)
                .and_then(|q| q.trunc().to_i64())
                .map(AtomicValue::integer)
                .ok_or_else(|| overflow("integer"));
        }
    };
    result
        .map(AtomicValue::decimal)
        .ok_or_else(|| overflow("decimal"))
}

/// Keeps the datatype of the temporal operand (`date` or `date-with-timezone`).
fn retag(original: &AtomicValue, value: Value) -> Result<AtomicValue, MetapathError> {
    Ok(AtomicValue::new(original.datatype(), value)?)
}

fn shift_date(
    original: &AtomicValue,
    date: &DateValue,
    delta: TimeDelta,
) -> Result<AtomicValue, MetapathError> {
    let shifted = date
        .date
        .and_time(Default::default())
        .checked_add_signed(delta)
        .ok_or_else(|| overflow("date"))?;
    retag(original, Value::Date(DateValue::new(shifted.date(), date.offset)))
}

fn shift_date_time(
    original: &AtomicValue,
    dt: &DateTimeValue,
    delta: TimeDelta,
) -> Result<AtomicValue, MetapathError> {
    let shifted = dt
        .date_time
        .checked_add_signed(delta)
        .ok_or_else(|| overflow("date-time"))?;
    retag(original, Value::DateTime(DateTimeValue::new(shifted, dt.offset)))
}

fn add_months(date: NaiveDate, months: i32) -> Result<NaiveDate, MetapathError> {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.ok_or_else(|| overflow("date"))
}

fn add_months_to_date(
    original: &AtomicValue,
    date: &DateValue,
    months: i32,
) -> Result<AtomicValue, MetapathError> {
    let shifted = add_months(date.date, months)?;
    retag(original, Value::Date(DateValue::new(shifted, date.offset)))
}

fn add_months_to_date_time(
    original: &AtomicValue,
    dt: &DateTimeValue,
    months: i32,
) -> Result<AtomicValue, MetapathError> {
    let date = add_months(dt.date_time.date(), months)?;
    let shifted = NaiveDateTime::new(date, dt.date_time.time());
    retag(original, Value::DateTime(DateTimeValue::new(shifted, dt.offset)))
}

fn nanos(delta: TimeDelta) -> Result<Decimal, MetapathError> {
    delta
        .num_nanoseconds()
        .map(Decimal::from)
        .ok_or_else(|| overflow("duration"))
}

/// `duration * n` and `duration div n`; `None` for other operators.
fn scale_day_time(
    delta: TimeDelta,
    operator: ArithmeticOperator,
    factor: &AtomicValue,
) -> Option<Result<AtomicValue, MetapathError>> {
    let factor = factor.as_decimal()?;
    let scaled = match operator {
        Multiply => nanos(delta).map(|n| n.checked_mul(factor)),
        Divide if factor.is_zero() => return Some(Err(division_by_zero())),
        Divide => nanos(delta).map(|n| n.checked_div(factor)),
        _ => return None,
    };
    Some(scaled.and_then(|n| {
        n.and_then(|n| n.round().to_i64())
            .map(|n| AtomicValue::day_time_duration(TimeDelta::nanoseconds(n)))
            .ok_or_else(|| overflow("duration"))
    }))
}

fn scale_year_month(
    months: i32,
    operator: ArithmeticOperator,
    factor: &AtomicValue,
) -> Option<Result<AtomicValue, MetapathError>> {
    let factor = factor.as_decimal()?;
    let months = Decimal::from(months);
    let scaled = match operator {
        Multiply => months.checked_mul(factor),
        Divide if factor.is_zero() => return Some(Err(division_by_zero())),
        Divide => months.checked_div(factor),
        _ => return None,
    };
    Some(
        scaled
            .and_then(|m| m.round().to_i32())
            .map(AtomicValue::year_month_duration)
            .ok_or_else(|| overflow("duration")),
    )
}

/// Unary minus.
pub(crate) fn negate(value: &AtomicValue) -> Result<AtomicValue, MetapathError> {
    match value.value() {
        Value::Integer(i) => i
            .checked_neg()
            .map(AtomicValue::integer)
            .ok_or_else(|| overflow("integer")),
        Value::Decimal(d) => Ok(AtomicValue::decimal(-*d)),
        Value::DayTimeDuration(delta) => Ok(AtomicValue::day_time_duration(-*delta)),
        Value::YearMonthDuration(months) => months
            .checked_neg()
            .map(AtomicValue::year_month_duration)
            .ok_or_else(|| overflow("duration")),
        _ => Err(MetapathError::type_error(format!(
            "unary minus is not defined for {}",
            value.datatype()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaschema_datatypes::DataType;

    fn parse(datatype: DataType, text: &str) -> AtomicValue {
        datatype.parse(text).unwrap()
    }

    #[test]
    fn test_integer_arithmetic_stays_integer() {
        let seven = AtomicValue::integer(7);
        let two = AtomicValue::integer(2);
        assert_eq!(apply(&seven, Add, &two).unwrap(), AtomicValue::integer(9));
        assert_eq!(apply(&seven, IntegerDivide, &two).unwrap(), AtomicValue::integer(3));
        assert_eq!(apply(&seven, Modulo, &two).unwrap(), AtomicValue::integer(1));
        let quotient = apply(&seven, Divide, &two).unwrap();
        assert_eq!(quotient.datatype(), DataType::Decimal);
        assert_eq!(quotient.to_string(), "3.5");
    }

    #[test]
    fn test_division_by_zero_and_overflow() {
        let zero = AtomicValue::integer(0);
        let one = AtomicValue::integer(1);
        assert_eq!(apply(&one, Divide, &zero).unwrap_err().code(), ErrorCode::FOAR0001);
        assert_eq!(apply(&one, Modulo, &zero).unwrap_err().code(), ErrorCode::FOAR0001);
        let max = AtomicValue::integer(i64::MAX);
        assert_eq!(apply(&max, Add, &one).unwrap_err().code(), ErrorCode::FOAR0002);
        assert_eq!(
            negate(&AtomicValue::integer(i64::MIN)).unwrap_err().code(),
            ErrorCode::FOAR0002
        );
    }

    #[test]
    fn test_mixed_numeric_promotes_to_decimal() {
        let sum = apply(&AtomicValue::integer(1), Add, &parse(DataType::Decimal, "0.5")).unwrap();
        assert_eq!(sum, AtomicValue::decimal(Decimal::new(15, 1)));
        let quotient = apply(
            &parse(DataType::Decimal, "1.50"),
            Divide,
            &parse(DataType::Decimal, "0.5"),
        )
        .unwrap();
        assert_eq!(quotient.to_string(), "3");
    }

    #[test]
    fn test_date_and_duration_arithmetic() {
        let date = parse(DataType::Date, "2024-01-31");
        let month = parse(DataType::YearMonthDuration, "P1M");
        assert_eq!(apply(&date, Add, &month).unwrap().to_string(), "2024-02-29");
        let day = parse(DataType::DayTimeDuration, "P1D");
        assert_eq!(apply(&date, Subtract, &day).unwrap().to_string(), "2024-01-30");
        let later = parse(DataType::Date, "2024-02-02");
        let between = apply(&later, Subtract, &date).unwrap();
        assert_eq!(between, AtomicValue::day_time_duration(TimeDelta::days(2)));
    }

    #[test]
    fn test_duration_scaling() {
        let hour = parse(DataType::DayTimeDuration, "PT1H");
        let doubled = apply(&hour, Multiply, &AtomicValue::integer(2)).unwrap();
        assert_eq!(doubled, AtomicValue::day_time_duration(TimeDelta::hours(2)));
        let ratio = apply(&doubled, Divide, &hour).unwrap();
        assert!(ratio.value_equals(&AtomicValue::integer(2)));
    }

    #[test]
    fn test_text_operands_are_type_errors() {
        let err = apply(&AtomicValue::string("1"), Add, &AtomicValue::integer(1)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::XPTY0004);
    }
}
