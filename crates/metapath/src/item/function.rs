use std::collections::HashMap;
use std::sync::Arc;

use metaschema_model::QName;

use crate::cst::InlineFunction;
use crate::functions::FunctionDef;

use super::Sequence;

/// A function value: a named library function or an inline function closed
/// over the variables in scope where it was created.
#[derive(Debug, Clone)]
pub enum FunctionItem<N> {
    /// A library function fixed at one of its arities, as produced by `name#arity`.
    Builtin {
        function: Arc<FunctionDef>,
        arity: usize,
    },
    Inline {
        function: Arc<InlineFunction>,
        captured: HashMap<QName, Sequence<N>>,
    },
}

impl<N> FunctionItem<N> {
    pub fn name(&self) -> Option<&QName> {
        match self {
            FunctionItem::Builtin { function, .. } => Some(function.name()),
            FunctionItem::Inline { .. } => None,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            FunctionItem::Builtin { arity, .. } => *arity,
            FunctionItem::Inline { function, .. } => function.parameters.len(),
        }
    }
}
