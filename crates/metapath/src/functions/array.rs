use std::sync::Arc;

use metaschema_datatypes::AtomicValue;

use crate::error::MetapathError;
use crate::item::{ArrayItem, Item, Sequence};

use super::integer_arg;

fn array_at<N>(args: &[Sequence<N>], index: usize) -> Result<&Arc<ArrayItem<N>>, MetapathError> {
    match args.get(index).and_then(Sequence::first) {
        Some(Item::Array(array)) => Ok(array),
        other => Err(MetapathError::type_error(format!(
            "expected an array, found {}",
            other.map_or("an empty sequence", Item::kind_name)
        ))),
    }
}

fn array_result<N: Clone>(array: ArrayItem<N>) -> Sequence<N> {
    Sequence::singleton(Item::Array(Arc::new(array)))
}

fn member_arg<N: Clone>(args: &[Sequence<N>], index: usize) -> Sequence<N> {
    args.get(index).cloned().unwrap_or_else(Sequence::empty)
}

pub fn array_size<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let size = array_at(args, 0)?.size();
    Ok(Sequence::from_atomic(AtomicValue::integer(size as i64)))
}

pub fn array_get<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    Ok(array_at(args, 0)?.get(integer_arg(args, 1)?)?.clone())
}

pub fn array_put<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let array = array_at(args, 0)?;
    Ok(array_result(array.put(integer_arg(args, 1)?, member_arg(args, 2))?))
}

pub fn array_append<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    Ok(array_result(array_at(args, 0)?.append(member_arg(args, 1))))
}

pub fn array_head<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    Ok(array_at(args, 0)?.head()?.clone())
}

pub fn array_tail<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    Ok(array_result(array_at(args, 0)?.tail()?))
}

pub fn array_subarray<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let array = array_at(args, 0)?;
    let length = if args.len() > 2 {
        Some(integer_arg(args, 2)?)
    } else {
        None
    };
    Ok(array_result(array.subarray(integer_arg(args, 1)?, length)?))
}

pub fn array_remove<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let array = array_at(args, 0)?;
    let positions: Vec<i64> = args
        .get(1)
        .into_iter()
        .flat_map(|positions| positions.iter())
        .filter_map(|item| item.as_atomic().and_then(AtomicValue::as_integer))
        .collect();
    Ok(array_result(array.remove(&positions)?))
}

pub fn array_insert_before<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let array = array_at(args, 0)?;
    Ok(array_result(
        array.insert_before(integer_arg(args, 1)?, member_arg(args, 2))?,
    ))
}

pub fn array_reverse<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    Ok(array_result(array_at(args, 0)?.reverse()))
}

pub fn array_join<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let arrays = args.first().map(Sequence::as_slice).unwrap_or(&[]);
    let mut members = Vec::with_capacity(arrays.len());
    for item in arrays {
        match item {
            Item::Array(array) => members.push(array.as_ref()),
            other => {
                return Err(MetapathError::type_error(format!(
                    "array:join() expects arrays, found a {}",
                    other.kind_name()
                )));
            }
        }
    }
    Ok(array_result(ArrayItem::join(members)))
}

/// Replaces every array, at any depth, by its members.
pub fn array_flatten<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    fn flatten_into<N: Clone>(items: &[Item<N>], out: &mut Vec<Item<N>>) {
        for item in items {
            match item {
                Item::Array(array) => {
                    for member in array.members() {
                        flatten_into(member.as_slice(), out);
                    }
                }
                other => out.push(other.clone()),
            }
        }
    }

    let mut out = Vec::new();
    if let Some(arg) = args.first() {
        flatten_into(arg.as_slice(), &mut out);
    }
    Sequence::from_vec(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    type Seq = Sequence<()>;

    fn n(value: i64) -> Seq {
        Seq::from_atomic(AtomicValue::integer(value))
    }

    fn array_of(values: &[i64]) -> Seq {
        array_result(ArrayItem::new(values.iter().map(|v| n(*v)).collect()))
    }

    fn ints(seq: &Seq) -> Vec<i64> {
        seq.iter()
            .filter_map(|item| item.as_atomic().and_then(AtomicValue::as_integer))
            .collect()
    }

    fn size(seq: &Seq) -> i64 {
        ints(&array_size(&[seq.clone()]).unwrap())[0]
    }

    #[test]
    fn test_get_and_bounds() {
        let array = array_of(&[10, 20, 30]);
        assert_eq!(ints(&array_get(&[array.clone(), n(2)]).unwrap()), vec![20]);
        assert_eq!(
            array_get(&[array, n(4)]).unwrap_err().code(),
            ErrorCode::FOAY0001
        );
    }

    #[test]
    fn test_updates() {
        let array = array_of(&[1, 2, 3]);
        let put = array_put(&[array.clone(), n(1), n(9)]).unwrap();
        assert_eq!(ints(&array_head(&[put]).unwrap()), vec![9]);
        assert_eq!(size(&array_append(&[array.clone(), Seq::empty()]).unwrap()), 4);
        assert_eq!(size(&array_remove(&[array.clone(), n(2)]).unwrap()), 2);
        assert_eq!(size(&array_insert_before(&[array.clone(), n(4), n(0)]).unwrap()), 4);
        assert_eq!(size(&array_subarray(&[array.clone(), n(2)]).unwrap()), 2);
        assert_eq!(size(&array_subarray(&[array.clone(), n(1), n(1)]).unwrap()), 1);
        assert_eq!(size(&array_tail(&[array]).unwrap()), 2);
    }

    #[test]
    fn test_join_reverse_and_flatten() {
        let joined = array_join(&[Seq::concat([array_of(&[1]), array_of(&[2, 3])])]).unwrap();
        assert_eq!(size(&joined), 3);
        let reversed = array_reverse(&[joined.clone()]).unwrap();
        assert_eq!(ints(&array_head(&[reversed]).unwrap()), vec![3]);
        let nested = array_result(ArrayItem::new(vec![n(1), joined]));
        assert_eq!(ints(&array_flatten(&[Seq::concat([nested, n(7)])])), vec![1, 1, 2, 3, 7]);
    }
}
