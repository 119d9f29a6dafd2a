use std::cmp::Ordering;

use metaschema_datatypes::{AtomicValue, Value};
use rust_decimal::Decimal;

use crate::cst::ArithmeticOperator;
use crate::error::{ErrorCode, MetapathError};
use crate::evaluator::arithmetic;
use crate::item::{Item, Sequence};

/// Rounds to the nearest integer, with halves rounded towards positive infinity.
pub(crate) fn round_half_up(value: Decimal) -> Decimal {
    value
        .checked_add(Decimal::new(5, 1))
        .map_or(value, |shifted| shifted.floor())
}

fn unary<N: Clone>(
    args: &[Sequence<N>],
    name: &str,
    op: impl Fn(Decimal) -> Decimal,
) -> Result<Sequence<N>, MetapathError> {
    let Some(value) = super::atomic_arg(args, 0) else {
        return Ok(Sequence::empty());
    };
    let result = match value.value() {
        Value::Integer(i) => op(Decimal::from(*i))
            .try_into()
            .map(AtomicValue::integer)
            .map_err(|_| MetapathError::dynamic(ErrorCode::FOAR0002, "integer overflow"))?,
        Value::Decimal(d) => AtomicValue::decimal(op(*d)),
        _ => {
            return Err(MetapathError::type_error(format!(
                "{name}() expects a numeric argument, found {}",
                value.datatype()
            )));
        }
    };
    Ok(Sequence::from_atomic(result))
}

pub fn fn_abs<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    unary(args, "abs", |d| d.abs())
}

pub fn fn_ceiling<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    unary(args, "ceiling", |d| d.ceil())
}

pub fn fn_floor<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    unary(args, "floor", |d| d.floor())
}

pub fn fn_round<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    unary(args, "round", round_half_up)
}

fn values<N>(args: &[Sequence<N>]) -> impl Iterator<Item = &AtomicValue> {
    args.first()
        .into_iter()
        .flat_map(|arg| arg.iter().filter_map(Item::as_atomic))
}

/// Operand types that cannot be summed are reported as invalid arguments.
fn invalid_argument(function: &str) -> impl Fn(MetapathError) -> MetapathError + '_ {
    move |err| {
        if err.code() == ErrorCode::XPTY0004 {
            MetapathError::dynamic(
                ErrorCode::FORG0006,
                format!("{function}(): {}", err.message()),
            )
        } else {
            err
        }
    }
}

fn total<'v>(
    mut values: impl Iterator<Item = &'v AtomicValue>,
) -> Result<Option<AtomicValue>, MetapathError> {
    let Some(first) = values.next() else {
        return Ok(None);
    };
    values
        .try_fold(first.clone(), |sum, value| {
            arithmetic::apply(&sum, ArithmeticOperator::Add, value)
        })
        .map(Some)
}

pub fn fn_sum<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let sum = total(values(args)).map_err(invalid_argument("sum"))?;
    Ok(Sequence::from_atomic(
        sum.unwrap_or_else(|| AtomicValue::integer(0)),
    ))
}

pub fn fn_avg<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let count = values(args).count();
    let Some(sum) = total(values(args)).map_err(invalid_argument("avg"))? else {
        return Ok(Sequence::empty());
    };
    let average = arithmetic::apply(
        &sum,
        ArithmeticOperator::Divide,
        &AtomicValue::integer(count as i64),
    )
    .map_err(invalid_argument("avg"))?;
    Ok(Sequence::from_atomic(average))
}

fn extreme<N: Clone>(
    args: &[Sequence<N>],
    function: &str,
    keep: Ordering,
) -> Result<Sequence<N>, MetapathError> {
    let mut best: Option<&AtomicValue> = None;
    for value in values(args) {
        best = match best {
            Some(current) => {
                let ordering = value.compare_to(current).map_err(|err| {
                    MetapathError::dynamic(ErrorCode::FORG0006, format!("{function}(): {err}"))
                })?;
                if ordering == keep {
                    Some(value)
                } else {
                    Some(current)
                }
            }
            None => Some(value),
        };
    }
    Ok(best.cloned().map(Sequence::from_atomic).unwrap_or_else(Sequence::empty))
}

pub fn fn_min<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    extreme(args, "min", Ordering::Less)
}

pub fn fn_max<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    extreme(args, "max", Ordering::Greater)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaschema_datatypes::DataType;

    type Seq = Sequence<()>;

    fn seq(values: Vec<AtomicValue>) -> Seq {
        values.into_iter().map(Item::Atomic).collect()
    }

    fn single(result: Seq) -> AtomicValue {
        result.first().and_then(Item::as_atomic).cloned().unwrap()
    }

    fn decimal(text: &str) -> AtomicValue {
        DataType::Decimal.parse(text).unwrap()
    }

    #[test]
    fn test_round_half_towards_positive_infinity() {
        assert_eq!(single(fn_round(&[seq(vec![decimal("2.5")])]).unwrap()).to_string(), "3");
        assert_eq!(single(fn_round(&[seq(vec![decimal("-2.5")])]).unwrap()).to_string(), "-2");
        assert_eq!(
            single(fn_round(&[seq(vec![AtomicValue::integer(4)])]).unwrap()),
            AtomicValue::integer(4)
        );
        assert!(fn_round(&[Seq::empty()]).unwrap().is_empty());
    }

    #[test]
    fn test_abs_floor_ceiling() {
        assert_eq!(
            single(fn_abs(&[seq(vec![AtomicValue::integer(-3)])]).unwrap()),
            AtomicValue::integer(3)
        );
        assert_eq!(single(fn_floor(&[seq(vec![decimal("1.7")])]).unwrap()).to_string(), "1");
        assert_eq!(single(fn_ceiling(&[seq(vec![decimal("1.2")])]).unwrap()).to_string(), "2");
    }

    #[test]
    fn test_sum_and_avg() {
        let numbers = seq(vec![AtomicValue::integer(1), AtomicValue::integer(2), decimal("1.5")]);
        assert_eq!(single(fn_sum(&[numbers.clone()]).unwrap()).to_string(), "4.5");
        assert_eq!(single(fn_avg(&[numbers]).unwrap()).to_string(), "1.5");
        assert_eq!(single(fn_sum(&[Seq::empty()]).unwrap()), AtomicValue::integer(0));
        assert!(fn_avg(&[Seq::empty()]).unwrap().is_empty());
        let mixed = seq(vec![AtomicValue::integer(1), AtomicValue::string("x")]);
        assert_eq!(fn_sum(&[mixed]).unwrap_err().code(), ErrorCode::FORG0006);
    }

    #[test]
    fn test_min_max() {
        let numbers = seq(vec![AtomicValue::integer(3), decimal("0.5"), AtomicValue::integer(7)]);
        assert_eq!(single(fn_min(&[numbers.clone()]).unwrap()), decimal("0.5"));
        assert_eq!(single(fn_max(&[numbers]).unwrap()), AtomicValue::integer(7));
        let words = seq(vec![AtomicValue::string("pear"), AtomicValue::string("apple")]);
        assert_eq!(single(fn_min(&[words]).unwrap()), AtomicValue::string("apple"));
        let mixed = seq(vec![AtomicValue::integer(1), AtomicValue::string("x")]);
        assert_eq!(fn_max(&[mixed]).unwrap_err().code(), ErrorCode::FORG0006);
    }
}
