//! Node-item tree for Metaschema documents.
//!
//! A document is a tree of four node kinds: the document itself, assemblies,
//! fields and flags. Query engines are written against the [`NodeItem`] trait
//! so any tree that satisfies it can be navigated; [`Document`] is the
//! arena-backed implementation built with a [`DocumentBuilder`].
//!
//! # Example
//!
//! ```
//! use metaschema_datatypes::AtomicValue;
//! use metaschema_model::{DocumentBuilder, NodeItem, QName};
//!
//! let builder = DocumentBuilder::new(Some("file:///doc.json"), QName::local("root"));
//! let root = builder.root();
//! builder.new_field(root, QName::local("f"), Some(AtomicValue::string("hello"))).unwrap();
//! let document = builder.build();
//!
//! let root = document.root_node();
//! let f = root.model_items_by_name(&QName::local("f")).next().unwrap();
//! assert_eq!(f.string_value(), "hello");
//! assert_eq!(f.metapath(), "/root/f[1]");
//! ```

mod document;
mod error;
mod node;
mod qname;

pub use document::{Document, DocumentBuilder, Node, NodeId};
pub use error::ModelError;
pub use node::{NodeItem, NodeKind, SIGNATURE_METAPATH_END, SIGNATURE_METAPATH_START};
pub use qname::QName;
