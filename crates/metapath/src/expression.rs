//! Compiled expressions: the entry point most callers use.

use std::fmt;
use std::sync::{Arc, OnceLock};

use log::trace;
use metaschema_model::NodeItem;

use crate::compiler::compile_expression;
use crate::context::{DynamicContext, StaticContext};
use crate::cst::Expr;
use crate::error::MetapathError;
use crate::evaluator;
use crate::item::{Item, Sequence};

/// Expression text compiled against a static context.
///
/// The compiled tree is immutable and shared, so cloning is cheap and one
/// expression can be evaluated against any number of documents.
#[derive(Debug, Clone)]
pub struct MetapathExpression {
    path: Arc<str>,
    expr: Arc<Expr>,
}

impl MetapathExpression {
    pub fn compile(text: &str, context: &StaticContext) -> Result<Self, MetapathError> {
        let expr = compile_expression(text, context)?;
        Ok(Self {
            path: Arc::from(text),
            expr: Arc::new(expr),
        })
    }

    /// The text the expression was compiled from.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn cst(&self) -> &Expr {
        &self.expr
    }

    /// Evaluates with `focus` as the context item, or with no context item.
    pub fn evaluate<'a, N: NodeItem<'a>>(
        &self,
        context: &DynamicContext<N>,
        focus: Option<Item<N>>,
    ) -> Result<Sequence<N>, MetapathError> {
        trace!("evaluating '{}'", self.path);
        let focus = focus.map_or_else(Sequence::empty, Sequence::singleton);
        evaluator::evaluate(&self.expr, context, &focus)
    }

    /// The effective boolean value of the result.
    pub fn evaluate_as_boolean<'a, N: NodeItem<'a>>(
        &self,
        context: &DynamicContext<N>,
        focus: Option<Item<N>>,
    ) -> Result<bool, MetapathError> {
        self.evaluate(context, focus)?.effective_boolean_value()
    }

    /// The string value of the single result item; the empty string when the
    /// result is empty.
    pub fn evaluate_as_string<'a, N: NodeItem<'a>>(
        &self,
        context: &DynamicContext<N>,
        focus: Option<Item<N>>,
    ) -> Result<String, MetapathError> {
        match self.evaluate(context, focus)?.first_item(true)? {
            Some(item) => item.string_value(),
            None => Ok(String::new()),
        }
    }

    /// The single result item, if any. More than one item is an error.
    pub fn evaluate_as_item<'a, N: NodeItem<'a>>(
        &self,
        context: &DynamicContext<N>,
        focus: Option<Item<N>>,
    ) -> Result<Option<Item<N>>, MetapathError> {
        Ok(self.evaluate(context, focus)?.first_item(true)?.cloned())
    }
}

impl fmt::Display for MetapathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Expression text that is compiled the first time it is needed.
///
/// The outcome, success or failure, is computed once and shared by every
/// later caller.
#[derive(Debug)]
pub struct LazyMetapathExpression {
    path: String,
    context: Arc<StaticContext>,
    compiled: OnceLock<Result<MetapathExpression, MetapathError>>,
}

impl LazyMetapathExpression {
    pub fn new(path: impl Into<String>, context: Arc<StaticContext>) -> Self {
        Self {
            path: path.into(),
            context,
            compiled: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// The compiled expression, compiling it on first use.
    pub fn get(&self) -> Result<&MetapathExpression, MetapathError> {
        self.compiled
            .get_or_init(|| MetapathExpression::compile(&self.path, &self.context))
            .as_ref()
            .map_err(Clone::clone)
    }
}

#[cfg(test)]
mod tests {
    use metaschema_model::Node;

    use super::*;
    use crate::error::ErrorCode;
    use crate::evaluator::test_support::catalog;

    fn context<'d>() -> DynamicContext<Node<'d>> {
        DynamicContext::new(Arc::new(StaticContext::default()))
    }

    #[test]
    fn test_compile_keeps_text_and_tree() {
        let expr = MetapathExpression::compile("1 + 2", &StaticContext::default()).unwrap();
        assert_eq!(expr.path(), "1 + 2");
        assert_eq!(expr.to_string(), "1 + 2");
        assert_eq!(expr.cst().kind_name(), "Arithmetic");
        assert_eq!(expr.cst().children().len(), 2);
    }

    #[test]
    fn test_compile_errors_surface() {
        let err = MetapathExpression::compile("1 +", &StaticContext::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::XPST0003);
    }

    #[test]
    fn test_evaluate_against_a_document() {
        let doc = catalog();
        let focus = Some(Item::Node(doc.document_node()));
        let ctx = context();
        let expr =
            MetapathExpression::compile("count(//control)", &StaticContext::default()).unwrap();
        assert_eq!(expr.evaluate_as_string(&ctx, focus.clone()).unwrap(), "3");

        let expr = MetapathExpression::compile("/catalog/metadata/title", &StaticContext::default())
            .unwrap();
        assert_eq!(expr.evaluate_as_string(&ctx, focus.clone()).unwrap(), "Example Catalog");
        let item = expr.evaluate_as_item(&ctx, focus.clone()).unwrap().unwrap();
        assert!(item.is_node());

        let expr =
            MetapathExpression::compile("exists(group[@id = 'g2'])", &StaticContext::default())
                .unwrap();
        let root = doc.root_node();
        assert!(expr.evaluate_as_boolean(&ctx, Some(Item::Node(root))).unwrap());
    }

    #[test]
    fn test_single_item_accessors() {
        let ctx = context();
        let expr = MetapathExpression::compile("()", &StaticContext::default()).unwrap();
        assert_eq!(expr.evaluate_as_string(&ctx, None).unwrap(), "");
        assert!(expr.evaluate_as_item(&ctx, None).unwrap().is_none());
        assert!(!expr.evaluate_as_boolean(&ctx, None).unwrap());

        let expr = MetapathExpression::compile("(1, 2)", &StaticContext::default()).unwrap();
        assert_eq!(
            expr.evaluate_as_item(&ctx, None).unwrap_err().code(),
            ErrorCode::XPTY0004
        );
    }

    #[test]
    fn test_lazy_expression_compiles_once() {
        let lazy = LazyMetapathExpression::new("2 * 21", Arc::new(StaticContext::default()));
        assert!(!lazy.is_compiled());
        let first = lazy.get().unwrap() as *const MetapathExpression;
        let second = lazy.get().unwrap() as *const MetapathExpression;
        assert!(lazy.is_compiled());
        assert_eq!(first, second);
        let ctx = context();
        assert_eq!(lazy.get().unwrap().evaluate_as_string(&ctx, None).unwrap(), "42");
    }

    #[test]
    fn test_lazy_expression_keeps_its_failure() {
        let lazy = LazyMetapathExpression::new("unknown-fn()", Arc::new(StaticContext::default()));
        let first = lazy.get().unwrap_err();
        let second = lazy.get().unwrap_err();
        assert_eq!(first.code(), second.code());
        assert_eq!(first.code(), ErrorCode::XPST0017);
    }
}
