//! Shared fixtures for the evaluator tests.

use std::sync::Arc;

use metaschema_datatypes::{AtomicValue, DataType};
use metaschema_model::{Document, DocumentBuilder, Node, NodeItem, QName};

use crate::compiler::compile_expression;
use crate::context::{DynamicContext, StaticContext};
use crate::error::MetapathError;
use crate::item::{Item, Sequence};

use super::evaluate;

/// ```text
/// catalog
///   metadata/title "Example Catalog"
///   group @id=g1
///     control @id=c1 /title "One"
///     control @id=c2 /title "Two"
///   group @id=g2
///     control @id=c3
/// ```
pub(crate) fn catalog() -> Document {
    let q = QName::local;
    let token = |text: &str| DataType::Token.parse(text).unwrap();
    let builder = DocumentBuilder::new(Some("file:///catalog.json"), q("catalog"));
    let root = builder.root();
    let metadata = builder.new_assembly(root, q("metadata")).unwrap();
    builder
        .new_field(metadata, q("title"), Some(AtomicValue::string("Example Catalog")))
        .unwrap();
    let groups = [
        ("g1", vec![("c1", Some("One")), ("c2", Some("Two"))]),
        ("g2", vec![("c3", None)]),
    ];
    for (group_id, controls) in groups {
        let group = builder.new_assembly(root, q("group")).unwrap();
        builder.new_flag(group, q("id"), token(group_id)).unwrap();
        for (control_id, title) in controls {
            let control = builder.new_assembly(group, q("control")).unwrap();
            builder.new_flag(control, q("id"), token(control_id)).unwrap();
            if let Some(title) = title {
                builder
                    .new_field(control, q("title"), Some(AtomicValue::string(title)))
                    .unwrap();
            }
        }
    }
    builder.build()
}

/// Evaluates without a context item.
pub(crate) fn eval(text: &str) -> Result<Sequence<Node<'static>>, MetapathError> {
    let ctx = DynamicContext::new(Arc::new(StaticContext::default()));
    let expr = compile_expression(text, ctx.static_context())?;
    evaluate(&expr, &ctx, &Sequence::empty())
}

/// Evaluates with the document node of `doc` as the context item.
pub(crate) fn eval_on<'d>(doc: &'d Document, text: &str) -> Result<Sequence<Node<'d>>, MetapathError> {
    let ctx = DynamicContext::new(Arc::new(StaticContext::default()));
    let expr = compile_expression(text, ctx.static_context())?;
    evaluate(&expr, &ctx, &Sequence::singleton(Item::Node(doc.document_node())))
}

/// The atomic items of a result, as text, separated by spaces.
pub(crate) fn text<N>(seq: &Sequence<N>) -> String {
    seq.iter()
        .filter_map(Item::as_atomic)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn integers<N>(seq: &Sequence<N>) -> Vec<i64> {
    seq.iter()
        .filter_map(|item| item.as_atomic().and_then(AtomicValue::as_integer))
        .collect()
}

/// String values of the nodes of a result.
pub(crate) fn flag_values(seq: &Sequence<Node<'_>>) -> Vec<String> {
    seq.iter()
        .filter_map(Item::as_node)
        .map(|node| node.string_value())
        .collect()
}
