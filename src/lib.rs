//! Metaschema document model with the Metapath query language.
//!
//! This package ties the workspace crates together:
//!
//! - [`datatypes`]: atomic datatypes and values
//! - [`model`]: the node-item tree and its builder
//! - [`metapath`]: the Metapath compiler, type system and evaluator
//!
//! # Example
//!
//! ```
//! use metaschema::{AtomicValue, DocumentBuilder, QName, query};
//!
//! let builder = DocumentBuilder::new(None, QName::local("root"));
//! let root = builder.root();
//! builder.new_field(root, QName::local("f"), Some(AtomicValue::string("hello"))).unwrap();
//! let document = builder.build();
//!
//! let result = query(&document, "/root/f").unwrap();
//! assert_eq!(result.len(), 1);
//! ```

use std::sync::Arc;

use log::debug;

pub use metaschema_datatypes as datatypes;
pub use metaschema_metapath as metapath;
pub use metaschema_model as model;

pub use metaschema_datatypes::{AtomicValue, DataType, DataTypeError};
pub use metaschema_metapath::{
    DynamicContext, ErrorCode, Item, LazyMetapathExpression, MetapathError, MetapathExpression,
    Sequence, StaticContext, StaticContextBuilder, StaticContextConfig, StaticContextRegistry,
};
pub use metaschema_model::{
    Document, DocumentBuilder, ModelError, Node, NodeId, NodeItem, NodeKind, QName,
};

/// Evaluates `text` with the default static context, using the document node
/// of `document` as the context item.
pub fn query<'d>(document: &'d Document, text: &str) -> Result<Sequence<Node<'d>>, MetapathError> {
    debug!("querying {} with '{text}'", document.uri().unwrap_or("<anonymous document>"));
    let static_context = Arc::new(StaticContext::default());
    let expr = MetapathExpression::compile(text, &static_context)?;
    expr.evaluate(
        &DynamicContext::new(static_context),
        Some(Item::Node(document.document_node())),
    )
}
