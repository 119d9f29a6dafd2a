pub mod fixtures;

use std::sync::{Arc, Once};

use metaschema::{
    Document, DynamicContext, Item, MetapathError, MetapathExpression, Node, Sequence,
    StaticContext,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

static LOGGER: Once = Once::new();

/// Installs a test logger once per test binary; `RUST_LOG` controls output.
pub fn init_logging() {
    LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Evaluates `text` with no context item.
pub fn eval(text: &str) -> Result<Sequence<Node<'static>>, MetapathError> {
    init_logging();
    let static_context = Arc::new(StaticContext::default());
    let expr = MetapathExpression::compile(text, &static_context)?;
    expr.evaluate(&DynamicContext::new(static_context), None)
}

/// Evaluates `text` with `focus` as the context item.
pub fn eval_at<'d>(focus: Node<'d>, text: &str) -> Result<Sequence<Node<'d>>, MetapathError> {
    init_logging();
    let static_context = Arc::new(StaticContext::default());
    let expr = MetapathExpression::compile(text, &static_context)?;
    expr.evaluate(&DynamicContext::new(static_context), Some(Item::Node(focus)))
}

/// Evaluates `text` against the document node of `document`.
pub fn eval_doc<'d>(document: &'d Document, text: &str) -> Result<Sequence<Node<'d>>, MetapathError> {
    eval_at(document.document_node(), text)
}

/// The string values of every item in `sequence`.
pub fn strings(sequence: &Sequence<Node<'_>>) -> Vec<String> {
    sequence
        .iter()
        .map(|item| item.string_value().expect("item has a string value"))
        .collect()
}

pub fn truth(text: &str) -> bool {
    eval(text)
        .and_then(|result| result.effective_boolean_value())
        .unwrap_or_else(|err| panic!("'{text}' failed: {err}"))
}
