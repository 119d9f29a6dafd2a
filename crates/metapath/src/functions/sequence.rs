use std::collections::HashSet;

use metaschema_datatypes::AtomicValue;
use metaschema_model::NodeItem;
use rust_decimal::Decimal;

use crate::error::{ErrorCode, MetapathError};
use crate::item::{Item, MapKey, Sequence};

use super::numeric::round_half_up;

fn first_arg<N>(args: &[Sequence<N>]) -> &[Item<N>] {
    args.first().map(Sequence::as_slice).unwrap_or(&[])
}

pub fn fn_count<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    Sequence::from_atomic(AtomicValue::integer(first_arg(args).len() as i64))
}

pub fn fn_empty<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    Sequence::boolean(first_arg(args).is_empty())
}

pub fn fn_exists<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    Sequence::boolean(!first_arg(args).is_empty())
}

pub fn fn_head<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    match first_arg(args).first() {
        Some(item) => Sequence::singleton(item.clone()),
        None => Sequence::empty(),
    }
}

pub fn fn_tail<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    first_arg(args).iter().skip(1).cloned().collect()
}

pub fn fn_reverse<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    first_arg(args).iter().rev().cloned().collect()
}

/// Keeps the first of each group of equal values; numbers compare by value
/// and textual values by code point.
pub fn fn_distinct_values<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    let mut seen = HashSet::new();
    first_arg(args)
        .iter()
        .filter(|item| match item.as_atomic() {
            Some(value) => seen.insert(MapKey::new(value.clone())),
            None => false,
        })
        .cloned()
        .collect()
}

/// Rounded position argument; out-of-range values saturate.
fn position_arg<N>(args: &[Sequence<N>], index: usize) -> Option<Decimal> {
    super::atomic_arg(args, index)
        .and_then(AtomicValue::as_decimal)
        .map(round_half_up)
}

/// Items whose 1-based position `p` satisfies `start <= p < start + length`
/// after both bounds are rounded.
pub fn fn_subsequence<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    let Some(start) = position_arg(args, 1) else {
        return Sequence::empty();
    };
    let end = match args.get(2) {
        Some(_) => position_arg(args, 2).map(|length| start.saturating_add(length)),
        None => None,
    };
    first_arg(args)
        .iter()
        .enumerate()
        .filter(|(index, _)| {
            let position = Decimal::from(*index + 1);
            position >= start && end.is_none_or(|end| position < end)
        })
        .map(|(_, item)| item.clone())
        .collect()
}

pub fn fn_insert_before<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    let target = first_arg(args);
    let inserts = args.get(2).map(Sequence::as_slice).unwrap_or(&[]);
    let position = super::atomic_arg(args, 1)
        .and_then(AtomicValue::as_integer)
        .unwrap_or(1);
    let at = (position.max(1) as usize - 1).min(target.len());
    target[..at]
        .iter()
        .chain(inserts)
        .chain(&target[at..])
        .cloned()
        .collect()
}

/// Drops the item at a 1-based position; other positions leave the
/// sequence unchanged.
pub fn fn_remove<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    let position = super::atomic_arg(args, 1).and_then(AtomicValue::as_integer);
    first_arg(args)
        .iter()
        .enumerate()
        .filter(|(index, _)| position != Some(*index as i64 + 1))
        .map(|(_, item)| item.clone())
        .collect()
}

pub fn fn_index_of<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    let Some(search) = super::atomic_arg(args, 1) else {
        return Sequence::empty();
    };
    first_arg(args)
        .iter()
        .enumerate()
        .filter(|(_, item)| item.as_atomic().is_some_and(|v| v.value_equals(search)))
        .map(|(index, _)| Item::Atomic(AtomicValue::integer(index as i64 + 1)))
        .collect()
}

pub fn fn_zero_or_one<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    check_cardinality(args, ErrorCode::FORG0003, "zero-or-one", |n| n <= 1)
}

pub fn fn_one_or_more<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    check_cardinality(args, ErrorCode::FORG0004, "one-or-more", |n| n >= 1)
}

pub fn fn_exactly_one<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    check_cardinality(args, ErrorCode::FORG0005, "exactly-one", |n| n == 1)
}

fn check_cardinality<N: Clone>(
    args: &[Sequence<N>],
    code: ErrorCode,
    function: &str,
    allowed: impl Fn(usize) -> bool,
) -> Result<Sequence<N>, MetapathError> {
    let sequence = args.first().cloned().unwrap_or_else(Sequence::empty);
    if allowed(sequence.len()) {
        Ok(sequence)
    } else {
        Err(MetapathError::dynamic(
            code,
            format!("{function}() called with a sequence of {} items", sequence.len()),
        ))
    }
}

/// Atomizes the argument, or the context item when called without one.
pub fn fn_data<'a, N: NodeItem<'a>>(
    args: &[Sequence<N>],
    focus: Option<&Item<N>>,
) -> Result<Sequence<N>, MetapathError> {
    let values = match args.first() {
        Some(arg) => arg.atomize()?,
        None => {
            let mut out = Vec::new();
            focus
                .ok_or_else(MetapathError::context_absent)?
                .atomize_into(&mut out)?;
            out
        }
    };
    Ok(values.into_iter().map(Item::Atomic).collect())
}
