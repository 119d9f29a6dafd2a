use std::fmt;

use metaschema_model::{NodeItem, NodeKind, QName};

use crate::item::Item;

use super::atomic::AtomicOrUnionType;
use super::sequence_type::SequenceType;

/// The name part of a name test or kind test.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameTest {
    /// `*`
    Any,
    Name(QName),
    /// `prefix:*` or `Q{uri}*`, holding the namespace (`None` for no namespace).
    AnyLocalName(Option<String>),
    /// `*:local`
    AnyNamespace(String),
}

impl NameTest {
    pub fn matches(&self, name: Option<&QName>) -> bool {
        let Some(name) = name else {
            return false;
        };
        match self {
            NameTest::Any => true,
            NameTest::Name(expected) => expected == name,
            NameTest::AnyLocalName(namespace) => namespace.as_deref() == name.namespace(),
            NameTest::AnyNamespace(local) => local == name.local_name(),
        }
    }
}

impl fmt::Display for NameTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameTest::Any => f.write_str("*"),
            NameTest::Name(name) => write!(f, "{name}"),
            NameTest::AnyLocalName(Some(ns)) => write!(f, "Q{{{ns}}}*"),
            NameTest::AnyLocalName(None) => f.write_str("Q{}*"),
            NameTest::AnyNamespace(local) => write!(f, "*:{local}"),
        }
    }
}

/// Tests on the kind, name and value type of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KindTest {
    /// `node()`
    AnyNode,
    /// `document-node()` or `document-node(assembly(...))`
    Document(Option<Box<KindTest>>),
    Assembly(NameTest),
    Field {
        name: NameTest,
        value_type: Option<AtomicOrUnionType>,
    },
    Flag {
        name: NameTest,
        value_type: Option<AtomicOrUnionType>,
    },
}

impl KindTest {
    pub fn matches<'a, N: NodeItem<'a>>(&self, node: &N) -> bool {
        match self {
            KindTest::AnyNode => true,
            KindTest::Document(root_test) => {
                node.node_kind() == NodeKind::Document
                    && root_test.as_ref().is_none_or(|test| {
                        node.root_assembly().is_some_and(|root| test.matches(&root))
                    })
            }
            KindTest::Assembly(name) => {
                node.node_kind() == NodeKind::Assembly && name.matches(node.qname())
            }
            KindTest::Field { name, value_type } => {
                node.node_kind() == NodeKind::Field
                    && name.matches(node.qname())
                    && value_matches(node, value_type.as_ref())
            }
            KindTest::Flag { name, value_type } => {
                node.node_kind() == NodeKind::Flag
                    && name.matches(node.qname())
                    && value_matches(node, value_type.as_ref())
            }
        }
    }
}

fn value_matches<'a, N: NodeItem<'a>>(node: &N, value_type: Option<&AtomicOrUnionType>) -> bool {
    match value_type {
        None => true,
        Some(expected) => node.value().is_some_and(|value| expected.is_instance(value)),
    }
}

impl fmt::Display for KindTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindTest::AnyNode => f.write_str("node()"),
            KindTest::Document(None) => f.write_str("document-node()"),
            KindTest::Document(Some(inner)) => write!(f, "document-node({inner})"),
            KindTest::Assembly(NameTest::Any) => f.write_str("assembly()"),
            KindTest::Assembly(name) => write!(f, "assembly({name})"),
            KindTest::Field { name, value_type } => write_typed(f, "field", name, value_type),
            KindTest::Flag { name, value_type } => write_typed(f, "flag", name, value_type),
        }
    }
}

fn write_typed(
    f: &mut fmt::Formatter<'_>,
    kind: &str,
    name: &NameTest,
    value_type: &Option<AtomicOrUnionType>,
) -> fmt::Result {
    match (name, value_type) {
        (NameTest::Any, None) => write!(f, "{kind}()"),
        (name, None) => write!(f, "{kind}({name})"),
        (name, Some(t)) => write!(f, "{kind}({name}, {t})"),
    }
}

/// The item part of a sequence type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemType {
    /// `item()`
    AnyItem,
    Atomic(AtomicOrUnionType),
    Kind(KindTest),
    /// `map(*)`
    AnyMap,
    Map {
        key: AtomicOrUnionType,
        value: Box<SequenceType>,
    },
    /// `array(*)`
    AnyArray,
    Array(Box<SequenceType>),
    /// `function(*)`; maps and arrays are functions too.
    AnyFunction,
}

impl ItemType {
    pub fn matches<'a, N: NodeItem<'a>>(&self, item: &Item<N>) -> bool {
        match (self, item) {
            (ItemType::AnyItem, _) => true,
            (ItemType::Atomic(expected), Item::Atomic(value)) => expected.is_instance(value),
            (ItemType::Kind(test), Item::Node(node)) => test.matches(node),
            (ItemType::AnyMap, Item::Map(_)) => true,
            (ItemType::Map { key, value }, Item::Map(map)) => map
                .entries()
                .all(|(k, v)| key.is_instance(k) && value.matches(v)),
            (ItemType::AnyArray, Item::Array(_)) => true,
            (ItemType::Array(member), Item::Array(array)) => {
                array.members().iter().all(|m| member.matches(m))
            }
            (ItemType::AnyFunction, Item::Function(_) | Item::Map(_) | Item::Array(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::AnyItem => f.write_str("item()"),
            ItemType::Atomic(t) => write!(f, "{t}"),
            ItemType::Kind(test) => write!(f, "{test}"),
            ItemType::AnyMap => f.write_str("map(*)"),
            ItemType::Map { key, value } => write!(f, "map({key}, {value})"),
            ItemType::AnyArray => f.write_str("array(*)"),
            ItemType::Array(member) => write!(f, "array({member})"),
            ItemType::AnyFunction => f.write_str("function(*)"),
        }
    }
}
