use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use metaschema_datatypes::AtomicValue;

use crate::error::{ErrorCode, MetapathError};
use crate::item::{Item, MapItem, MapKey, Sequence};

use super::{atomic_arg, string_arg};

fn map_at<N>(args: &[Sequence<N>], index: usize) -> Result<&Arc<MapItem<N>>, MetapathError> {
    match args.get(index).and_then(Sequence::first) {
        Some(Item::Map(map)) => Ok(map),
        other => Err(MetapathError::type_error(format!(
            "expected a map, found {}",
            other.map_or("an empty sequence", Item::kind_name)
        ))),
    }
}

fn key_at<N>(args: &[Sequence<N>], index: usize) -> Result<&AtomicValue, MetapathError> {
    atomic_arg(args, index).ok_or_else(|| MetapathError::type_error("a map key is required"))
}

fn map_result<N: Clone>(map: MapItem<N>) -> Sequence<N> {
    Sequence::singleton(Item::Map(Arc::new(map)))
}

pub fn map_size<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let size = map_at(args, 0)?.size();
    Ok(Sequence::from_atomic(AtomicValue::integer(size as i64)))
}

pub fn map_keys<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    Ok(map_at(args, 0)?
        .keys()
        .map(|key| Item::Atomic(key.clone()))
        .collect())
}

pub fn map_contains<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let map = map_at(args, 0)?;
    Ok(Sequence::boolean(map.contains(key_at(args, 1)?)))
}

/// The value bound to the key; an absent key gives the empty sequence.
pub fn map_get<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let map = map_at(args, 0)?;
    Ok(map.get(key_at(args, 1)?).cloned().unwrap_or_else(Sequence::empty))
}

pub fn map_put<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let map = map_at(args, 0)?;
    let value = args.get(2).cloned().unwrap_or_else(Sequence::empty);
    Ok(map_result(map.put(key_at(args, 1)?.clone(), value)))
}

pub fn map_remove<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let map = map_at(args, 0)?;
    let keys = args
        .get(1)
        .into_iter()
        .flat_map(|keys| keys.iter().filter_map(Item::as_atomic));
    Ok(map_result(map.remove(keys)))
}

pub fn map_entry<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let value = args.get(1).cloned().unwrap_or_else(Sequence::empty);
    Ok(map_result(MapItem::default().put(key_at(args, 0)?.clone(), value)))
}

/// How `map:merge` resolves a key present in more than one input map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Duplicates {
    UseFirst,
    UseLast,
    Reject,
    Combine,
}

impl Duplicates {
    fn from_options<N: Clone>(args: &[Sequence<N>]) -> Result<Self, MetapathError> {
        if args.len() < 2 {
            return Ok(Duplicates::UseFirst);
        }
        let options = map_at(args, 1)?;
        let Some(policy) = options.get(&AtomicValue::string("duplicates")) else {
            return Ok(Duplicates::UseFirst);
        };
        match string_arg(std::slice::from_ref(policy), 0).as_str() {
            "use-first" | "use-any" => Ok(Duplicates::UseFirst),
            "use-last" => Ok(Duplicates::UseLast),
            "reject" => Ok(Duplicates::Reject),
            "combine" => Ok(Duplicates::Combine),
            other => Err(MetapathError::dynamic(
                ErrorCode::FORG0006,
                format!("unknown duplicates policy '{other}'"),
            )),
        }
    }
}

pub fn map_merge<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let policy = Duplicates::from_options(args)?;
    let mut entries: IndexMap<MapKey, Sequence<N>> = IndexMap::new();
    let maps = args.first().map(Sequence::as_slice).unwrap_or(&[]);
    for item in maps {
        let Item::Map(map) = item else {
            return Err(MetapathError::type_error(format!(
                "map:merge() expects maps, found a {}",
                item.kind_name()
            )));
        };
        for (key, value) in map.entries() {
            match entries.entry(MapKey::new(key.clone())) {
                Entry::Vacant(slot) => {
                    slot.insert(value.clone());
                }
                Entry::Occupied(mut slot) => match policy {
                    Duplicates::UseFirst => {}
                    Duplicates::UseLast => {
                        slot.insert(value.clone());
                    }
                    Duplicates::Combine => {
                        let combined = Sequence::concat([slot.get().clone(), value.clone()]);
                        slot.insert(combined);
                    }
                    Duplicates::Reject => {
                        return Err(MetapathError::dynamic(
                            ErrorCode::XQDY0137,
                            format!("duplicate key '{key}' in map:merge()"),
                        ));
                    }
                },
            }
        }
    }
    Ok(map_result(MapItem::new(entries)))
}
