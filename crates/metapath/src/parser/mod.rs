//! Untyped parse tree for Metapath expression text.
//!
//! The grammar knows nothing about namespaces, types or functions. It turns
//! text into a tree of [`ParseNode`]s tagged with the [`Rule`] that produced
//! them; the compiler gives the tree its meaning.

mod grammar;

use std::fmt;

use crate::error::MetapathError;

/// The grammar production a [`ParseNode`] was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Comma-separated expressions, two or more.
    Expr,
    For,
    Let,
    Quantified,
    /// `$name in expr` or `$name := expr`; text is the variable name.
    VarBinding,
    If,
    Or,
    And,
    /// Text is the operator.
    Comparison,
    StringConcat,
    Range,
    /// Text is the operator.
    Arithmetic,
    Union,
    /// Text is `intersect` or `except`.
    IntersectExcept,
    InstanceOf,
    Treat,
    Castable,
    Cast,
    /// Text is the type name; an [`Rule::Occurrence`] child marks `?`.
    SingleType,
    Arrow,
    ArrowStaticCall,
    ArrowDynamicCall,
    /// Text is the net sign.
    Unary,
    SimpleMap,
    RootSlashOnly,
    RootSlash,
    RootDoubleSlash,
    RelativeSlash,
    RelativeDoubleSlash,
    /// Text is the axis name; children are the node test then predicates.
    AxisStep,
    NameTest,
    Predicate,
    Filter,
    DynamicCall,
    Lookup,
    UnaryLookup,
    KeyWildcard,
    KeyName,
    KeyInteger,
    KeyParenthesized,
    StringLiteral,
    IntegerLiteral,
    DecimalLiteral,
    VarRef,
    ContextItem,
    EmptySequence,
    FunctionCall,
    NamedFunctionRef,
    InlineFunction,
    Param,
    ReturnType,
    FunctionBody,
    MapConstructor,
    MapEntry,
    SquareArray,
    CurlyArray,
    SequenceType,
    EmptySequenceType,
    Occurrence,
    AnyItemType,
    AtomicType,
    AnyKindTest,
    DocumentTest,
    AssemblyTest,
    FieldTest,
    FlagTest,
    AnyMapTest,
    TypedMapTest,
    AnyArrayTest,
    TypedArrayTest,
    AnyFunctionTest,
    TypedFunctionTest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNode {
    rule: Rule,
    text: String,
    children: Vec<ParseNode>,
}

impl ParseNode {
    pub fn new(rule: Rule, text: impl Into<String>, children: Vec<ParseNode>) -> Self {
        Self {
            rule,
            text: text.into(),
            children,
        }
    }

    pub fn leaf(rule: Rule, text: impl Into<String>) -> Self {
        Self::new(rule, text, Vec::new())
    }

    pub fn branch(rule: Rule, children: Vec<ParseNode>) -> Self {
        Self::new(rule, "", children)
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn children(&self) -> &[ParseNode] {
        &self.children
    }

    /// The child at `index`; a missing child means the tree is malformed.
    pub fn child(&self, index: usize) -> Result<&ParseNode, MetapathError> {
        self.children.get(index).ok_or_else(|| {
            MetapathError::syntax(format!("{:?} node is missing child {index}", self.rule))
        })
    }

    pub fn find_child(&self, rule: Rule) -> Option<&ParseNode> {
        self.children.iter().find(|c| c.rule == rule)
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}{:?}", "", self.rule, indent = depth * 2)?;
        if !self.text.is_empty() {
            write!(f, " {:?}", self.text)?;
        }
        writeln!(f)?;
        for child in &self.children {
            child.write_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

/// Indented tree dump, one node per line.
impl fmt::Display for ParseNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

/// Parses a complete expression.
pub fn parse(text: &str) -> Result<ParseNode, MetapathError> {
    grammar::finish(text, grammar::expression(text))
}

/// Parses a standalone sequence type such as `meta:string+`.
pub fn parse_sequence_type(text: &str) -> Result<ParseNode, MetapathError> {
    grammar::finish(text, grammar::standalone_sequence_type(text))
}
