//! Metapath: an XPath 3.1 dialect for querying Metaschema documents.
//!
//! Expression text is parsed into a [`ParseNode`] tree, compiled against a
//! [`StaticContext`] into an [`Expr`] with every name resolved, and then
//! evaluated over any tree that implements [`NodeItem`].
//!
//! # Key Types
//!
//! - [`MetapathExpression`]: compiled expression, the usual entry point
//! - [`Expr`]: the compiled expression tree
//! - [`Sequence`] / [`Item`]: evaluation results (nodes, atomics, maps, arrays, functions)
//! - [`StaticContext`]: namespaces, default namespaces and the function library
//! - [`DynamicContext`]: variables, clock and the function result cache
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use metaschema_datatypes::AtomicValue;
//! use metaschema_metapath::{DynamicContext, Item, MetapathExpression, StaticContext};
//! use metaschema_model::{DocumentBuilder, QName};
//!
//! let builder = DocumentBuilder::new(None, QName::local("catalog"));
//! let root = builder.root();
//! for title in ["One", "Two"] {
//!     let control = builder.new_assembly(root, QName::local("control")).unwrap();
//!     builder
//!         .new_field(control, QName::local("title"), Some(AtomicValue::string(title)))
//!         .unwrap();
//! }
//! let document = builder.build();
//!
//! let static_context = Arc::new(StaticContext::default());
//! let expr = MetapathExpression::compile("string-join(//title, ', ')", &static_context).unwrap();
//! let ctx = DynamicContext::new(static_context);
//! let focus = Some(Item::Node(document.document_node()));
//! assert_eq!(expr.evaluate_as_string(&ctx, focus).unwrap(), "One, Two");
//! ```

pub mod compiler;
pub mod context;
pub mod cst;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod functions;
pub mod item;
pub mod namespaces;
pub mod parser;
pub mod types;

pub use compiler::compile_expression;
pub use context::{
    CallingContext, ConfigError, DynamicContext, DynamicContextBuilder, StaticContext,
    StaticContextBuilder, StaticContextConfig, StaticContextRegistry,
};
pub use cst::Expr;
pub use error::{ErrorCode, ErrorKind, MetapathError};
pub use evaluator::evaluate;
pub use expression::{LazyMetapathExpression, MetapathExpression};
pub use functions::{FunctionDef, FunctionLibrary, FunctionSignature};
pub use item::{ArrayItem, FunctionItem, Item, MapItem, MapKey, Sequence};
pub use parser::ParseNode;
pub use types::{AtomicOrUnionType, ItemType, KindTest, Occurrence, SequenceType};

pub use metaschema_model::{NodeItem, NodeKind, QName};
