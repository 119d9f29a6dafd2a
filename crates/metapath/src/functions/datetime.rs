use std::hash::Hash;

use chrono::{Datelike, TimeDelta};
use metaschema_datatypes::{AtomicValue, DataType, DateTimeValue, DateValue, Value};

use crate::context::DynamicContext;
use crate::error::MetapathError;
use crate::item::Sequence;

pub fn fn_current_date_time<N: Clone + Eq + Hash>(
    ctx: &DynamicContext<N>,
) -> Result<Sequence<N>, MetapathError> {
    let now = ctx.current_date_time();
    let value = DateTimeValue::new(now.naive_local(), Some(*now.offset()));
    Ok(Sequence::from_atomic(AtomicValue::new(
        DataType::DateTimeWithTimezone,
        Value::DateTime(value),
    )?))
}

pub fn fn_current_date<N: Clone + Eq + Hash>(
    ctx: &DynamicContext<N>,
) -> Result<Sequence<N>, MetapathError> {
    let now = ctx.current_date_time();
    let value = DateValue::new(now.date_naive(), Some(*now.offset()));
    Ok(Sequence::from_atomic(AtomicValue::new(
        DataType::DateWithTimezone,
        Value::Date(value),
    )?))
}

pub fn fn_implicit_timezone<N: Clone + Eq + Hash>(ctx: &DynamicContext<N>) -> Sequence<N> {
    let offset = ctx.implicit_timezone().local_minus_utc();
    Sequence::from_atomic(AtomicValue::day_time_duration(TimeDelta::seconds(
        i64::from(offset),
    )))
}

fn date_component<N: Clone>(
    args: &[Sequence<N>],
    component: impl Fn(&DateValue) -> i64,
) -> Result<Sequence<N>, MetapathError> {
    let Some(value) = super::atomic_arg(args, 0) else {
        return Ok(Sequence::empty());
    };
    match value.value() {
        Value::Date(date) => Ok(Sequence::from_atomic(AtomicValue::integer(component(date)))),
        _ => Err(MetapathError::type_error(format!(
            "expected a date, found {}",
            value.datatype()
        ))),
    }
}

pub fn fn_year_from_date<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    date_component(args, |d| i64::from(d.date.year()))
}

pub fn fn_month_from_date<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    date_component(args, |d| i64::from(d.date.month()))
}

pub fn fn_day_from_date<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    date_component(args, |d| i64::from(d.date.day()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, FixedOffset};
    use metaschema_model::Node;

    use super::*;
    use crate::context::StaticContext;
    use crate::item::Item;

    fn context() -> DynamicContext<Node<'static>> {
        let now = DateTime::<FixedOffset>::parse_from_rfc3339("2024-03-05T10:30:00+02:00").unwrap();
        DynamicContext::builder(Arc::new(StaticContext::default()))
            .current_date_time(now)
            .build()
    }

    fn single(seq: Sequence<Node<'static>>) -> AtomicValue {
        seq.first().and_then(Item::as_atomic).cloned().unwrap()
    }

    #[test]
    fn test_clock_is_fixed_per_context() {
        let ctx = context();
        let now = single(fn_current_date_time(&ctx).unwrap());
        assert_eq!(now.datatype(), DataType::DateTimeWithTimezone);
        assert_eq!(now.to_string(), "2024-03-05T10:30:00+02:00");
        assert_eq!(single(fn_current_date_time(&ctx).unwrap()), now);
        assert_eq!(single(fn_current_date(&ctx).unwrap()).to_string(), "2024-03-05+02:00");
        assert_eq!(single(fn_implicit_timezone(&ctx)).to_string(), "PT2H");
    }

    #[test]
    fn test_date_components() {
        let date = [Sequence::<()>::from_atomic(DataType::Date.parse("2021-12-24").unwrap())];
        assert_eq!(
            fn_year_from_date(&date).unwrap().first().and_then(Item::as_atomic),
            Some(&AtomicValue::integer(2021))
        );
        assert_eq!(
            fn_month_from_date(&date).unwrap().first().and_then(Item::as_atomic),
            Some(&AtomicValue::integer(12))
        );
        assert_eq!(
            fn_day_from_date(&date).unwrap().first().and_then(Item::as_atomic),
            Some(&AtomicValue::integer(24))
        );
        assert!(fn_year_from_date::<()>(&[Sequence::empty()]).unwrap().is_empty());
    }
}
