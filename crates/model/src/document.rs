//! Arena-backed documents.
//!
//! Nodes live in one vector addressed by [`NodeId`]. A [`DocumentBuilder`]
//! accepts insertions from several threads behind a short-lived lock; calling
//! [`DocumentBuilder::build`] freezes the arena into a read-only [`Document`]
//! and records each node's document-order rank.
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, PoisonError};

use indexmap::IndexMap;
use indexmap::map::Entry;
use log::debug;
use metaschema_datatypes::AtomicValue;

use crate::error::ModelError;
use crate::node::{NodeItem, NodeKind};
use crate::qname::QName;

const DOCUMENT_ID: NodeId = NodeId(0);
const ROOT_ID: NodeId = NodeId(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    name: Option<QName>,
    parent: Option<NodeId>,
    value: Option<AtomicValue>,
    flags: IndexMap<QName, NodeId>,
    model: IndexMap<QName, Vec<NodeId>>,
    rank: usize,
}

impl NodeData {
    fn new(kind: NodeKind, name: Option<QName>, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            name,
            parent,
            value: None,
            flags: IndexMap::new(),
            model: IndexMap::new(),
            rank: 0,
        }
    }
}

/// Constructs a document. Insertion methods take `&self` so sibling subtrees
/// can be populated from several threads.
#[derive(Debug)]
pub struct DocumentBuilder {
    uri: Option<String>,
    arena: Mutex<Vec<NodeData>>,
}

impl DocumentBuilder {
    pub fn new(uri: Option<&str>, root_name: QName) -> Self {
        let mut document = NodeData::new(NodeKind::Document, None, None);
        let root = NodeData::new(NodeKind::Assembly, Some(root_name.clone()), Some(DOCUMENT_ID));
        document.model.insert(root_name, vec![ROOT_ID]);

        Self {
            uri: uri.map(str::to_string),
            arena: Mutex::new(vec![document, root]),
        }
    }

    /// The root assembly created with the builder.
    pub fn root(&self) -> NodeId {
        ROOT_ID
    }

    /// Adds a flag to an assembly or field. Flag names are unique per parent.
    pub fn new_flag(
        &self,
        parent: NodeId,
        name: QName,
        value: AtomicValue,
    ) -> Result<NodeId, ModelError> {
        let mut arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        let id = NodeId(arena.len());
        let owner = arena
            .get_mut(parent.0)
            .ok_or(ModelError::UnknownNode(parent.0))?;
        if !owner.kind.is_model_item() {
            return Err(ModelError::InvalidParent {
                kind: owner.kind.name(),
                child: "flag",
            });
        }
        match owner.flags.entry(name.clone()) {
            Entry::Occupied(_) => return Err(ModelError::DuplicateFlag { name }),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let mut flag = NodeData::new(NodeKind::Flag, Some(name), Some(parent));
        flag.value = Some(value);
        arena.push(flag);
        Ok(id)
    }

    /// Appends a field to the named group of an assembly's model items.
    pub fn new_field(
        &self,
        parent: NodeId,
        name: QName,
        value: Option<AtomicValue>,
    ) -> Result<NodeId, ModelError> {
        self.new_model_item(parent, NodeKind::Field, name, value)
    }

    /// Appends an assembly to the named group of an assembly's model items.
    pub fn new_assembly(&self, parent: NodeId, name: QName) -> Result<NodeId, ModelError> {
        self.new_model_item(parent, NodeKind::Assembly, name, None)
    }

    fn new_model_item(
        &self,
        parent: NodeId,
        kind: NodeKind,
        name: QName,
        value: Option<AtomicValue>,
    ) -> Result<NodeId, ModelError> {
        let mut arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        let id = NodeId(arena.len());
        let owner = arena
            .get_mut(parent.0)
            .ok_or(ModelError::UnknownNode(parent.0))?;
        if owner.kind != NodeKind::Assembly {
            return Err(ModelError::InvalidParent {
                kind: owner.kind.name(),
                child: kind.name(),
            });
        }
        owner.model.entry(name.clone()).or_default().push(id);

        let mut node = NodeData::new(kind, Some(name), Some(parent));
        node.value = value;
        arena.push(node);
        Ok(id)
    }

    /// Freezes the tree and assigns document-order ranks.
    pub fn build(self) -> Document {
        let mut nodes = self
            .arena
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        let mut rank = 0;
        let mut stack = vec![DOCUMENT_ID];
        while let Some(id) = stack.pop() {
            let data = &mut nodes[id.0];
            data.rank = rank;
            rank += 1;
            let children: Vec<NodeId> = data.model.values().flatten().rev().copied().collect();
            let flags: Vec<NodeId> = data.flags.values().rev().copied().collect();
            stack.extend(children);
            // Flags come off the stack before model items.
            stack.extend(flags);
        }

        debug!(
            "built document {} with {} nodes",
            self.uri.as_deref().unwrap_or("<anonymous>"),
            nodes.len()
        );
        Document {
            uri: self.uri,
            nodes,
        }
    }
}

/// A frozen document tree.
#[derive(Debug)]
pub struct Document {
    uri: Option<String>,
    nodes: Vec<NodeData>,
}

impl Document {
    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn document_node(&self) -> Node<'_> {
        Node {
            document: self,
            id: DOCUMENT_ID,
        }
    }

    pub fn root_node(&self) -> Node<'_> {
        Node {
            document: self,
            id: ROOT_ID,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<Node<'_>> {
        (id.0 < self.nodes.len()).then_some(Node { document: self, id })
    }

    /// Number of nodes, the document node included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Handle to a node of a [`Document`].
#[derive(Clone, Copy)]
pub struct Node<'a> {
    document: &'a Document,
    id: NodeId,
}

impl<'a> Node<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    fn data(&self) -> &'a NodeData {
        &self.document.nodes[self.id.0]
    }

    fn at(&self, id: NodeId) -> Node<'a> {
        Node {
            document: self.document,
            id,
        }
    }
}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        match &data.name {
            Some(name) => write!(f, "Node({} {} #{})", data.kind, name, self.id.0),
            None => write!(f, "Node({} #{})", data.kind, self.id.0),
        }
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.document, other.document) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl Hash for Node<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.document, state);
        self.id.hash(state);
    }
}

impl PartialOrd for Node<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Document order within one document; documents are ordered by address.
impl Ord for Node<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        let this = self.document as *const Document as usize;
        let that = other.document as *const Document as usize;
        this.cmp(&that)
            .then_with(|| self.data().rank.cmp(&other.data().rank))
    }
}

impl<'a> NodeItem<'a> for Node<'a> {
    fn node_kind(&self) -> NodeKind {
        self.data().kind
    }

    fn qname(&self) -> Option<&'a QName> {
        self.data().name.as_ref()
    }

    fn parent(&self) -> Option<Self> {
        self.data().parent.map(|id| self.at(id))
    }

    fn flags(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        let document = self.document;
        Box::new(
            self.data()
                .flags
                .values()
                .map(move |&id| Node { document, id }),
        )
    }

    fn flag_by_name(&self, name: &QName) -> Option<Self> {
        self.data().flags.get(name).map(|&id| self.at(id))
    }

    fn model_items(&self) -> Box<dyn Iterator<Item = Self> + 'a> {
        let document = self.document;
        Box::new(
            self.data()
                .model
                .values()
                .flatten()
                .map(move |&id| Node { document, id }),
        )
    }

    fn model_items_by_name(&self, name: &QName) -> Box<dyn Iterator<Item = Self> + 'a> {
        let document = self.document;
        match self.data().model.get(name) {
            Some(ids) => Box::new(ids.iter().map(move |&id| Node { document, id })),
            None => Box::new(std::iter::empty()),
        }
    }

    fn base_uri(&self) -> Option<&'a str> {
        self.document.uri.as_deref()
    }

    fn value(&self) -> Option<&'a AtomicValue> {
        self.data().value.as_ref()
    }

    fn document_node(&self) -> Self {
        self.at(DOCUMENT_ID)
    }

    fn root_assembly(&self) -> Option<Self> {
        Some(self.at(ROOT_ID))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaschema_datatypes::DataType;

    fn q(name: &str) -> QName {
        QName::local(name)
    }

    fn sample() -> Document {
        let builder = DocumentBuilder::new(Some("file:///catalog.json"), q("catalog"));
        let root = builder.root();
        builder
            .new_flag(root, q("uuid"), AtomicValue::string("abc"))
            .unwrap();
        let group = builder.new_assembly(root, q("group")).unwrap();
        builder
            .new_flag(group, q("id"), DataType::Token.parse("g1").unwrap())
            .unwrap();
        builder
            .new_field(group, q("title"), Some(AtomicValue::string("First")))
            .unwrap();
        let second = builder.new_assembly(root, q("group")).unwrap();
        builder
            .new_field(second, q("title"), Some(AtomicValue::string("Second")))
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_parent_chain() {
        let doc = sample();
        let root = doc.root_node();
        assert_eq!(root.parent(), Some(doc.document_node()));
        assert_eq!(doc.document_node().parent(), None);
        assert_eq!(root.ancestors(), vec![doc.document_node()]);
    }

    #[test]
    fn test_sibling_order_is_insertion_order() {
        let builder = DocumentBuilder::new(None, q("root"));
        let root = builder.root();
        for i in 0..10 {
            builder
                .new_field(root, q("item"), Some(AtomicValue::integer(i)))
                .unwrap();
        }
        let doc = builder.build();
        let values: Vec<String> = doc
            .root_node()
            .model_items_by_name(&q("item"))
            .map(|n| n.string_value())
            .collect();
        let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_duplicate_flag_rejected() {
        let builder = DocumentBuilder::new(None, q("root"));
        let root = builder.root();
        builder
            .new_flag(root, q("id"), AtomicValue::string("a"))
            .unwrap();
        let err = builder
            .new_flag(root, q("id"), AtomicValue::string("b"))
            .unwrap_err();
        assert_eq!(err, ModelError::DuplicateFlag { name: q("id") });
    }

    #[test]
    fn test_fields_cannot_own_model_items() {
        let builder = DocumentBuilder::new(None, q("root"));
        let field = builder.new_field(builder.root(), q("f"), None).unwrap();
        assert!(matches!(
            builder.new_field(field, q("g"), None),
            Err(ModelError::InvalidParent { .. })
        ));
        assert!(builder
            .new_flag(field, q("lang"), AtomicValue::string("en"))
            .is_ok());
    }

    #[test]
    fn test_position_and_metapath() {
        let doc = sample();
        let root = doc.root_node();
        let groups: Vec<Node<'_>> = root.model_items_by_name(&q("group")).collect();
        assert_eq!(groups[1].position(), Some(2));
        assert_eq!(groups[1].metapath(), "/catalog/group[2]");
        let id = groups[0].flag_by_name(&q("id")).unwrap();
        assert_eq!(id.metapath(), "/catalog/group[1]/@id");
        assert_eq!(id.position(), None);
        assert_eq!(root.metapath(), "/catalog");
        assert_eq!(doc.document_node().metapath(), "/");
    }

    #[test]
    fn test_signature_uses_sentinels() {
        let doc = sample();
        let group = doc.root_node().model_items().next().unwrap();
        let id = group.flag_by_name(&q("id")).unwrap();
        assert_eq!(id.to_signature(), "flag(id, token)⁅/catalog/group[1]/@id⁆(g1)");
        assert_eq!(group.to_signature(), "assembly(group)⁅/catalog/group[1]⁆");
    }

    #[test]
    fn test_document_order() {
        let doc = sample();
        let root = doc.root_node();
        let uuid = root.flag_by_name(&q("uuid")).unwrap();
        let descendants = root.descendants();
        assert!(doc.document_node() < root);
        assert!(root < uuid);
        assert!(uuid < descendants[0]);
        let mut sorted = descendants.clone();
        sorted.sort();
        assert_eq!(sorted, descendants);
        let group = descendants[0];
        let id = group.flag_by_name(&q("id")).unwrap();
        assert!(group < id && id < descendants[1]);
    }

    #[test]
    fn test_base_uri_inherited() {
        let doc = sample();
        let title = doc.root_node().descendants()[1];
        assert_eq!(title.base_uri(), Some("file:///catalog.json"));
    }

    #[test]
    fn test_concurrent_insertion_keeps_group_order() {
        let builder = DocumentBuilder::new(None, q("root"));
        let root = builder.root();
        let left = builder.new_assembly(root, q("left")).unwrap();
        let right = builder.new_assembly(root, q("right")).unwrap();
        std::thread::scope(|scope| {
            for parent in [left, right] {
                let builder = &builder;
                scope.spawn(move || {
                    for i in 0..50 {
                        builder
                            .new_field(parent, q("n"), Some(AtomicValue::integer(i)))
                            .unwrap();
                    }
                });
            }
        });
        let doc = builder.build();
        for node in doc.root_node().model_items() {
            let values: Vec<i64> = node
                .model_items_by_name(&q("n"))
                .filter_map(|n| n.value().and_then(AtomicValue::as_integer))
                .collect();
            assert_eq!(values, (0..50).collect::<Vec<_>>());
        }
    }
}
