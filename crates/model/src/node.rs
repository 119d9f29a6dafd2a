//! The node-item contract queried by Metapath.
use std::fmt;
use std::hash::Hash;

use metaschema_datatypes::AtomicValue;

use crate::qname::QName;

/// Opens the location part of a node signature.
pub const SIGNATURE_METAPATH_START: char = '\u{2045}';
/// Closes the location part of a node signature.
pub const SIGNATURE_METAPATH_END: char = '\u{2046}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Assembly,
    Field,
    Flag,
}

impl NodeKind {
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Document => "document",
            NodeKind::Assembly => "assembly",
            NodeKind::Field => "field",
            NodeKind::Flag => "flag",
        }
    }

    /// Fields and assemblies are the model items of their parent assembly.
    pub fn is_model_item(self) -> bool {
        matches!(self, NodeKind::Assembly | NodeKind::Field)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A read-only position in a Metaschema document tree.
///
/// `'a` is the lifetime of the underlying tree. Handles are cheap copies;
/// ordering between handles of the same tree is document order.
pub trait NodeItem<'a>:
    fmt::Debug + Clone + Copy + PartialEq + Eq + Hash + PartialOrd + Ord + 'a
{
    fn node_kind(&self) -> NodeKind;

    /// The node's name. `None` for the document node.
    fn qname(&self) -> Option<&'a QName>;

    /// The owning node. The root assembly's parent is the document node; the
    /// document node has no parent.
    fn parent(&self) -> Option<Self>;

    /// Flags in definition order. Empty for documents and flags.
    fn flags(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    fn flag_by_name(&self, name: &QName) -> Option<Self>;

    /// Model items grouped by name: every instance of the first name in
    /// insertion order, then every instance of the second name, and so on.
    /// The document node yields its root assembly.
    fn model_items(&self) -> Box<dyn Iterator<Item = Self> + 'a>;

    /// Instances of one named model item, in insertion order.
    fn model_items_by_name(&self, name: &QName) -> Box<dyn Iterator<Item = Self> + 'a>;

    fn base_uri(&self) -> Option<&'a str>;

    /// Typed value of a field or flag.
    fn value(&self) -> Option<&'a AtomicValue>;

    fn document_node(&self) -> Self;

    /// The top-level assembly of the containing document.
    fn root_assembly(&self) -> Option<Self>;

    fn string_value(&self) -> String {
        self.value().map(|v| v.to_string()).unwrap_or_default()
    }

    /// 1-based index among same-named siblings, computed by scanning the
    /// parent's name group. `None` for documents and flags.
    fn position(&self) -> Option<usize> {
        if !self.node_kind().is_model_item() {
            return None;
        }
        let parent = self.parent()?;
        if parent.node_kind() == NodeKind::Document {
            return Some(1);
        }
        let name = self.qname()?;
        parent
            .model_items_by_name(name)
            .position(|sibling| sibling == *self)
            .map(|index| index + 1)
    }

    /// Location path that selects exactly this node, e.g. `/catalog/group[2]/@id`.
    fn metapath(&self) -> String {
        let name = self.qname().map(QName::local_name).unwrap_or_default();
        match self.node_kind() {
            NodeKind::Document => "/".to_string(),
            NodeKind::Flag => {
                let parent = self.parent().map(|p| p.metapath()).unwrap_or_default();
                format!("{}/@{}", parent.trim_end_matches('/'), name)
            }
            NodeKind::Assembly | NodeKind::Field => match self.parent() {
                Some(parent) if parent.node_kind() != NodeKind::Document => format!(
                    "{}/{}[{}]",
                    parent.metapath(),
                    name,
                    self.position().unwrap_or(1)
                ),
                _ => format!("/{name}"),
            },
        }
    }

    /// Canonical identity string: `kind(name, type)⁅metapath⁆(value)`.
    fn to_signature(&self) -> String {
        let kind = self.node_kind();
        let mut signature = match (self.qname(), self.value()) {
            (Some(name), Some(value)) => format!("{kind}({name}, {})", value.datatype()),
            (Some(name), None) => format!("{kind}({name})"),
            (None, _) => format!("{kind}()"),
        };
        signature.push(SIGNATURE_METAPATH_START);
        signature.push_str(&self.metapath());
        signature.push(SIGNATURE_METAPATH_END);
        if let Some(value) = self.value() {
            signature.push_str(&format!("({value})"));
        }
        signature
    }

    /// All model items below this node in document order, flags excluded.
    fn descendants(&self) -> Vec<Self> {
        let mut result = Vec::new();
        let mut stack: Vec<Self> = self.model_items().collect();
        stack.reverse();
        while let Some(node) = stack.pop() {
            result.push(node);
            let mut children: Vec<Self> = node.model_items().collect();
            children.reverse();
            stack.extend(children);
        }
        result
    }

    /// Parent, grandparent, ... up to and including the document node.
    fn ancestors(&self) -> Vec<Self> {
        let mut result = Vec::new();
        let mut current = self.parent();
        while let Some(node) = current {
            result.push(node);
            current = node.parent();
        }
        result
    }
}
