//! Items and sequences produced by evaluation.

mod array;
mod function;
mod map;

use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::Arc;

use metaschema_datatypes::{AtomicValue, Value};
use metaschema_model::NodeItem;

use crate::error::{ErrorCode, MetapathError};

pub use array::ArrayItem;
pub use function::FunctionItem;
pub use map::{MapItem, MapKey};

/// One member of a sequence.
#[derive(Debug, Clone)]
pub enum Item<N> {
    Node(N),
    Atomic(AtomicValue),
    Map(Arc<MapItem<N>>),
    Array(Arc<ArrayItem<N>>),
    Function(Arc<FunctionItem<N>>),
}

impl<N> Item<N> {
    pub fn is_node(&self) -> bool {
        matches!(self, Item::Node(_))
    }

    pub fn as_node(&self) -> Option<&N> {
        match self {
            Item::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_atomic(&self) -> Option<&AtomicValue> {
        match self {
            Item::Atomic(value) => Some(value),
            _ => None,
        }
    }

    /// Short description used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Item::Node(_) => "node",
            Item::Atomic(_) => "atomic value",
            Item::Map(_) => "map",
            Item::Array(_) => "array",
            Item::Function(_) => "function",
        }
    }
}

impl<N: Clone> Item<N> {
    /// Appends the typed values of this item to `out`.
    ///
    /// Nodes contribute their value, arrays are flattened, and nodes without
    /// a value (documents, assemblies) or function items cannot be atomized.
    pub fn atomize_into<'a>(&self, out: &mut Vec<AtomicValue>) -> Result<(), MetapathError>
    where
        N: NodeItem<'a>,
    {
        match self {
            Item::Atomic(value) => out.push(value.clone()),
            Item::Node(node) => match node.value() {
                Some(value) => out.push(value.clone()),
                None => {
                    return Err(MetapathError::dynamic(
                        ErrorCode::FOTY0012,
                        format!("{} node '{}' has no typed value", node.node_kind(), node.metapath()),
                    ));
                }
            },
            Item::Array(array) => {
                for member in array.members() {
                    for item in member.iter() {
                        item.atomize_into(out)?;
                    }
                }
            }
            Item::Map(_) | Item::Function(_) => {
                return Err(MetapathError::dynamic(
                    ErrorCode::FOTY0013,
                    format!("a {} cannot be atomized", self.kind_name()),
                ));
            }
        }
        Ok(())
    }

    pub fn string_value<'a>(&self) -> Result<String, MetapathError>
    where
        N: NodeItem<'a>,
    {
        match self {
            Item::Atomic(value) => Ok(value.to_string()),
            Item::Node(node) => Ok(node.string_value()),
            _ => Err(MetapathError::dynamic(
                ErrorCode::FOTY0013,
                format!("a {} has no string value", self.kind_name()),
            )),
        }
    }
}

/// Node identity for nodes, strict value equality for atomics, and reference
/// identity for maps, arrays and functions.
impl<N: PartialEq> PartialEq for Item<N> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Item::Node(a), Item::Node(b)) => a == b,
            (Item::Atomic(a), Item::Atomic(b)) => a == b,
            (Item::Map(a), Item::Map(b)) => Arc::ptr_eq(a, b),
            (Item::Array(a), Item::Array(b)) => Arc::ptr_eq(a, b),
            (Item::Function(a), Item::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<N: Eq> Eq for Item<N> {}

impl<N: Hash> Hash for Item<N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Item::Node(node) => node.hash(state),
            Item::Atomic(value) => value.hash(state),
            Item::Map(map) => Arc::as_ptr(map).hash(state),
            Item::Array(array) => Arc::as_ptr(array).hash(state),
            Item::Function(function) => Arc::as_ptr(function).hash(state),
        }
    }
}

impl<N> From<AtomicValue> for Item<N> {
    fn from(value: AtomicValue) -> Self {
        Item::Atomic(value)
    }
}

/// An immutable, ordered sequence of items.
///
/// Cloning shares the backing slice, so a sequence can be bound to a variable
/// and iterated any number of times. The empty sequence holds no allocation.
#[derive(Debug, Clone)]
pub struct Sequence<N> {
    items: Option<Arc<[Item<N>]>>,
}

impl<N> Sequence<N> {
    pub fn empty() -> Self {
        Self { items: None }
    }

    pub fn len(&self) -> usize {
        self.items.as_ref().map_or(0, |items| items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_none()
    }

    pub fn as_slice(&self) -> &[Item<N>] {
        self.items.as_deref().unwrap_or(&[])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item<N>> {
        self.as_slice().iter()
    }

    pub fn first(&self) -> Option<&Item<N>> {
        self.as_slice().first()
    }

    /// The first item, or `None` for the empty sequence. With
    /// `require_single`, a sequence of more than one item is a type error.
    pub fn first_item(&self, require_single: bool) -> Result<Option<&Item<N>>, MetapathError> {
        if require_single && self.len() > 1 {
            return Err(MetapathError::more_than_one_item(self.len()));
        }
        Ok(self.first())
    }

    /// Effective boolean value.
    pub fn effective_boolean_value(&self) -> Result<bool, MetapathError> {
        let items = self.as_slice();
        let Some(first) = items.first() else {
            return Ok(false);
        };
        if first.is_node() {
            return Ok(true);
        }
        if items.len() > 1 {
            return Err(ebv_error("a sequence of more than one non-node item"));
        }
        match first {
            Item::Atomic(value) => match value.value() {
                Value::Boolean(b) => Ok(*b),
                Value::Text(text) => Ok(!text.is_empty()),
                Value::Integer(i) => Ok(*i != 0),
                Value::Decimal(d) => Ok(!d.is_zero()),
                _ => Err(ebv_error(&format!("a {} value", value.datatype()))),
            },
            other => Err(ebv_error(&format!("a {}", other.kind_name()))),
        }
    }
}

impl<N: Clone> Sequence<N> {
    pub fn singleton(item: Item<N>) -> Self {
        Self {
            items: Some(Arc::from(vec![item])),
        }
    }

    pub fn from_vec(items: Vec<Item<N>>) -> Self {
        if items.is_empty() {
            Self::empty()
        } else {
            Self {
                items: Some(Arc::from(items)),
            }
        }
    }

    pub fn from_atomic(value: AtomicValue) -> Self {
        Self::singleton(Item::Atomic(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::from_atomic(AtomicValue::boolean(value))
    }

    pub fn to_vec(&self) -> Vec<Item<N>> {
        self.as_slice().to_vec()
    }

    /// Concatenates sequences in order.
    pub fn concat<I: IntoIterator<Item = Sequence<N>>>(sequences: I) -> Self {
        let mut parts: Vec<Sequence<N>> = sequences.into_iter().filter(|s| !s.is_empty()).collect();
        match parts.len() {
            0 => Self::empty(),
            1 => parts.remove(0),
            _ => parts.iter().flat_map(|s| s.iter().cloned()).collect(),
        }
    }

    pub fn atomize<'a>(&self) -> Result<Vec<AtomicValue>, MetapathError>
    where
        N: NodeItem<'a>,
    {
        let mut out = Vec::with_capacity(self.len());
        for item in self.iter() {
            item.atomize_into(&mut out)?;
        }
        Ok(out)
    }

    /// Atomizes and requires at most one value.
    pub fn atomize_optional<'a>(&self) -> Result<Option<AtomicValue>, MetapathError>
    where
        N: NodeItem<'a>,
    {
        let mut values = self.atomize()?;
        match values.len() {
            0 => Ok(None),
            1 => Ok(values.pop()),
            n => Err(MetapathError::more_than_one_item(n)),
        }
    }
}

fn ebv_error(what: &str) -> MetapathError {
    MetapathError::dynamic(
        ErrorCode::FORG0006,
        format!("effective boolean value is not defined for {what}"),
    )
}

impl<N: Clone> FromIterator<Item<N>> for Sequence<N> {
    fn from_iter<I: IntoIterator<Item = Item<N>>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<N: Clone> From<Vec<Item<N>>> for Sequence<N> {
    fn from(items: Vec<Item<N>>) -> Self {
        Self::from_vec(items)
    }
}

impl<'s, N> IntoIterator for &'s Sequence<N> {
    type Item = &'s Item<N>;
    type IntoIter = std::slice::Iter<'s, Item<N>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<N: PartialEq> PartialEq for Sequence<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<N: Eq> Eq for Sequence<N> {}

impl<N: Hash> Hash for Sequence<N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaschema_datatypes::DataType;
    use metaschema_model::Node;

    type Seq = Sequence<Node<'static>>;

    #[test]
    fn test_empty_sequence_has_no_allocation() {
        let empty = Seq::from_vec(vec![]);
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);
        assert!(empty.first().is_none());
    }

    #[test]
    fn test_effective_boolean_value() {
        assert!(!Seq::empty().effective_boolean_value().unwrap());
        assert!(Seq::boolean(true).effective_boolean_value().unwrap());
        assert!(!Seq::from_atomic(AtomicValue::string("")).effective_boolean_value().unwrap());
        assert!(Seq::from_atomic(AtomicValue::integer(3)).effective_boolean_value().unwrap());
        let two: Seq = vec![Item::Atomic(AtomicValue::integer(1)), Item::Atomic(AtomicValue::integer(2))].into();
        assert_eq!(
            two.effective_boolean_value().unwrap_err().code(),
            ErrorCode::FORG0006
        );
        let date = Seq::from_atomic(DataType::Date.parse("2020-01-01").unwrap());
        assert!(date.effective_boolean_value().is_err());
    }

    #[test]
    fn test_first_item_cardinality() {
        let two: Seq = vec![Item::Atomic(AtomicValue::integer(1)), Item::Atomic(AtomicValue::integer(2))].into();
        assert!(two.first_item(false).unwrap().is_some());
        assert_eq!(
            two.first_item(true).unwrap_err().code(),
            ErrorCode::XPTY0004
        );
        assert!(Seq::empty().first_item(true).unwrap().is_none());
    }

    #[test]
    fn test_repeatable_iteration_and_concat() {
        let seq: Seq = (1..=3).map(|i| Item::Atomic(AtomicValue::integer(i))).collect();
        assert_eq!(seq.iter().count(), 3);
        assert_eq!(seq.iter().count(), 3);
        let joined = Seq::concat([seq.clone(), Seq::empty(), seq]);
        assert_eq!(joined.len(), 6);
    }

    #[test]
    fn test_atomize_flattens_arrays() {
        let array = ArrayItem::new(vec![
            Seq::from_atomic(AtomicValue::integer(1)),
            vec![Item::Atomic(AtomicValue::integer(2)), Item::Atomic(AtomicValue::integer(3))].into(),
        ]);
        let seq = Seq::singleton(Item::Array(Arc::new(array)));
        assert_eq!(seq.atomize().unwrap().len(), 3);
    }
}
