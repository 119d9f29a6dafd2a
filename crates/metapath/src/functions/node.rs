//! Accessors over node items. Each takes an optional node argument and
//! falls back to the context item when called without one.

use metaschema_datatypes::{AtomicValue, DataType};
use metaschema_model::{NodeItem, NodeKind};

use crate::error::MetapathError;
use crate::item::{Item, Sequence};

use super::node_arg;

fn text<N: Clone>(value: &str) -> Sequence<N> {
    Sequence::from_atomic(AtomicValue::string(value))
}

fn uri<N: Clone>(value: Option<&str>) -> Result<Sequence<N>, MetapathError> {
    match value {
        Some(uri) => Ok(Sequence::from_atomic(DataType::UriReference.parse(uri)?)),
        None => Ok(Sequence::empty()),
    }
}

/// Names are reported without a prefix; the static context that would
/// supply one is not available at run time.
pub fn fn_name<'a, N: NodeItem<'a>>(
    args: &[Sequence<N>],
    focus: Option<&Item<N>>,
) -> Result<Sequence<N>, MetapathError> {
    fn_local_name(args, focus)
}

pub fn fn_local_name<'a, N: NodeItem<'a>>(
    args: &[Sequence<N>],
    focus: Option<&Item<N>>,
) -> Result<Sequence<N>, MetapathError> {
    let name = node_arg(args, 0, focus)?.and_then(|node| node.qname());
    Ok(text(name.map(|q| q.local_name()).unwrap_or_default()))
}

pub fn fn_namespace_uri<'a, N: NodeItem<'a>>(
    args: &[Sequence<N>],
    focus: Option<&Item<N>>,
) -> Result<Sequence<N>, MetapathError> {
    let name = node_arg(args, 0, focus)?.and_then(|node| node.qname());
    Ok(text(name.and_then(|q| q.namespace()).unwrap_or_default()))
}

/// The location path that selects the node.
pub fn fn_path<'a, N: NodeItem<'a>>(
    args: &[Sequence<N>],
    focus: Option<&Item<N>>,
) -> Result<Sequence<N>, MetapathError> {
    Ok(match node_arg(args, 0, focus)? {
        Some(node) => text(&node.metapath()),
        None => Sequence::empty(),
    })
}

pub fn fn_root<'a, N: NodeItem<'a>>(
    args: &[Sequence<N>],
    focus: Option<&Item<N>>,
) -> Result<Sequence<N>, MetapathError> {
    Ok(match node_arg(args, 0, focus)? {
        Some(node) => Sequence::singleton(Item::Node(node.document_node())),
        None => Sequence::empty(),
    })
}

pub fn fn_base_uri<'a, N: NodeItem<'a>>(
    args: &[Sequence<N>],
    focus: Option<&Item<N>>,
) -> Result<Sequence<N>, MetapathError> {
    uri(node_arg(args, 0, focus)?.and_then(|node| node.base_uri()))
}

/// Only document nodes have a document URI.
pub fn fn_document_uri<'a, N: NodeItem<'a>>(
    args: &[Sequence<N>],
    focus: Option<&Item<N>>,
) -> Result<Sequence<N>, MetapathError> {
    uri(node_arg(args, 0, focus)?
        .filter(|node| node.node_kind() == NodeKind::Document)
        .and_then(|node| node.base_uri()))
}

pub fn fn_has_children<'a, N: NodeItem<'a>>(
    args: &[Sequence<N>],
    focus: Option<&Item<N>>,
) -> Result<Sequence<N>, MetapathError> {
    let has_children = node_arg(args, 0, focus)?
        .is_some_and(|node| node.model_items().next().is_some());
    Ok(Sequence::boolean(has_children))
}
