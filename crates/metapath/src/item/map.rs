use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use metaschema_datatypes::{AtomicValue, Value};
use rust_decimal::Decimal;

use super::Sequence;

/// A map key compared with same-key semantics: numbers by numeric value,
/// text by code points regardless of the textual datatype, everything else
/// by its representation.
#[derive(Debug, Clone)]
pub struct MapKey(AtomicValue);

#[derive(PartialEq, Eq, Hash)]
enum KeyRepr<'k> {
    Numeric(Decimal),
    Text(&'k str),
    Other(&'k Value),
}

impl MapKey {
    pub fn new(value: AtomicValue) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &AtomicValue {
        &self.0
    }

    fn repr(&self) -> KeyRepr<'_> {
        match self.0.value() {
            Value::Integer(i) => KeyRepr::Numeric(Decimal::from(*i).normalize()),
            Value::Decimal(d) => KeyRepr::Numeric(d.normalize()),
            Value::Text(text) => KeyRepr::Text(text),
            other => KeyRepr::Other(other),
        }
    }
}

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        self.repr() == other.repr()
    }
}

impl Eq for MapKey {}

impl Hash for MapKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.repr().hash(state);
    }
}

/// An immutable map from atomic keys to sequences. Iteration follows
/// insertion order.
#[derive(Debug, Clone)]
pub struct MapItem<N> {
    entries: IndexMap<MapKey, Sequence<N>>,
}

impl<N> Default for MapItem<N> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<N: Clone> MapItem<N> {
    pub fn new(entries: IndexMap<MapKey, Sequence<N>>) -> Self {
        Self { entries }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &AtomicValue) -> Option<&Sequence<N>> {
        self.entries.get(&MapKey::new(key.clone()))
    }

    pub fn contains(&self, key: &AtomicValue) -> bool {
        self.entries.contains_key(&MapKey::new(key.clone()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &AtomicValue> {
        self.entries.keys().map(MapKey::value)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&AtomicValue, &Sequence<N>)> {
        self.entries.iter().map(|(k, v)| (k.value(), v))
    }

    /// A copy of this map with `key` bound to `value`, replacing any
    /// existing entry for the same key.
    pub fn put(&self, key: AtomicValue, value: Sequence<N>) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(MapKey::new(key), value);
        Self { entries }
    }

    pub fn remove<'k, I: IntoIterator<Item = &'k AtomicValue>>(&self, keys: I) -> Self {
        let mut entries = self.entries.clone();
        for key in keys {
            entries.shift_remove(&MapKey::new(key.clone()));
        }
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaschema_datatypes::DataType;
    use metaschema_model::Node;

    type Map = MapItem<Node<'static>>;

    #[test]
    fn test_numeric_keys_share_value_space() {
        let map = Map::default().put(
            AtomicValue::integer(1),
            Sequence::from_atomic(AtomicValue::string("one")),
        );
        let decimal = DataType::Decimal.parse("1.0").unwrap();
        assert!(map.contains(&decimal));
        let replaced = map.put(decimal, Sequence::empty());
        assert_eq!(replaced.size(), 1);
        assert!(replaced.get(&AtomicValue::integer(1)).unwrap().is_empty());
    }

    #[test]
    fn test_textual_keys_ignore_datatype() {
        let token = DataType::Token.parse("a").unwrap();
        let map = Map::default().put(token, Sequence::boolean(true));
        assert!(map.contains(&AtomicValue::string("a")));
        assert!(!map.contains(&AtomicValue::integer(1)));
    }

    #[test]
    fn test_remove_keeps_order() {
        let map = Map::default()
            .put(AtomicValue::string("a"), Sequence::empty())
            .put(AtomicValue::string("b"), Sequence::empty())
            .put(AtomicValue::string("c"), Sequence::empty());
        let removed = map.remove([&AtomicValue::string("b")]);
        let keys: Vec<String> = removed.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["a", "c"]);
        assert_eq!(map.size(), 3);
    }
}
