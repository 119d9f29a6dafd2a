//! The typed expression tree produced by compilation.
//!
//! [`Expr`] is a closed set of variants. Every name in the tree has already
//! been resolved: functions point at their library definition, types are
//! type descriptors and variable references carry expanded names.

mod printer;

use std::fmt;
use std::sync::Arc;

use metaschema_datatypes::{AtomicValue, DataType};
use metaschema_model::QName;

use crate::functions::FunctionDef;
use crate::types::{AtomicOrUnionType, ItemType, KindTest, NameTest, SequenceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfAxis,
    Parent,
    Ancestor,
    AncestorOrSelf,
    Flag,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "self" => Axis::SelfAxis,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "flag" => Axis::Flag,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::SelfAxis => "self",
            Axis::Parent => "parent",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::Flag => "flag",
        }
    }
}

/// The node test of an axis step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StepTest {
    Name(NameTest),
    Kind(KindTest),
}

impl fmt::Display for StepTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepTest::Name(test) => write!(f, "{test}"),
            StepTest::Kind(test) => write!(f, "{test}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl ComparisonOperator {
    /// Parses either the general (`=`) or value (`eq`) spelling.
    pub fn from_token(token: &str) -> Option<(Self, bool)> {
        use ComparisonOperator::*;
        Some(match token {
            "=" => (Equal, true),
            "!=" => (NotEqual, true),
            "<" => (Less, true),
            "<=" => (LessOrEqual, true),
            ">" => (Greater, true),
            ">=" => (GreaterOrEqual, true),
            "eq" => (Equal, false),
            "ne" => (NotEqual, false),
            "lt" => (Less, false),
            "le" => (LessOrEqual, false),
            "gt" => (Greater, false),
            "ge" => (GreaterOrEqual, false),
            _ => return None,
        })
    }

    pub fn general_symbol(self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "!=",
            ComparisonOperator::Less => "<",
            ComparisonOperator::LessOrEqual => "<=",
            ComparisonOperator::Greater => ">",
            ComparisonOperator::GreaterOrEqual => ">=",
        }
    }

    pub fn value_symbol(self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "eq",
            ComparisonOperator::NotEqual => "ne",
            ComparisonOperator::Less => "lt",
            ComparisonOperator::LessOrEqual => "le",
            ComparisonOperator::Greater => "gt",
            ComparisonOperator::GreaterOrEqual => "ge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    IntegerDivide,
    Modulo,
}

impl ArithmeticOperator {
    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "+" => ArithmeticOperator::Add,
            "-" => ArithmeticOperator::Subtract,
            "*" => ArithmeticOperator::Multiply,
            "div" => ArithmeticOperator::Divide,
            "idiv" => ArithmeticOperator::IntegerDivide,
            "mod" => ArithmeticOperator::Modulo,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOperator::Add => "+",
            ArithmeticOperator::Subtract => "-",
            ArithmeticOperator::Multiply => "*",
            ArithmeticOperator::Divide => "div",
            ArithmeticOperator::IntegerDivide => "idiv",
            ArithmeticOperator::Modulo => "mod",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantifier {
    Some,
    Every,
}

/// The key of a `?` lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySpecifier {
    Wildcard,
    Name(String),
    Integer(i64),
    Expr(Box<Expr>),
}

/// An inline function: parameters, declared result type and body.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineFunction {
    pub parameters: Vec<(QName, SequenceType)>,
    pub return_type: SequenceType,
    pub body: Expr,
    /// Variables of enclosing scopes that the body refers to.
    pub captures: Vec<QName>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(AtomicValue),
    EmptySequence,
    /// `(a, b, ...)`
    Sequence(Vec<Expr>),
    ContextItem,
    VariableRef(QName),

    /// `/`: the document node of each focus item.
    RootSlashOnly,
    /// `/expr`
    RootSlash(Box<Expr>),
    /// `//expr`
    RootDoubleSlash(Box<Expr>),
    RelativeSlash {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    RelativeDoubleSlash {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// A flag of the focus, by name.
    Flag(NameTest),
    /// A field or assembly child of the focus, by name.
    ModelInstance(NameTest),
    /// Any other axis step.
    Step {
        axis: Axis,
        test: StepTest,
    },
    Filter {
        base: Box<Expr>,
        predicate: Box<Expr>,
    },

    GeneralComparison {
        left: Box<Expr>,
        operator: ComparisonOperator,
        right: Box<Expr>,
    },
    ValueComparison {
        left: Box<Expr>,
        operator: ComparisonOperator,
        right: Box<Expr>,
    },
    Or(Vec<Expr>),
    And(Vec<Expr>),

    Arithmetic {
        left: Box<Expr>,
        operator: ArithmeticOperator,
        right: Box<Expr>,
    },
    Unary {
        operand: Box<Expr>,
        negate: bool,
    },
    StringConcat(Vec<Expr>),
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
    },
    Union(Vec<Expr>),
    Intersect {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Except {
        left: Box<Expr>,
        right: Box<Expr>,
    },

    InstanceOf {
        expr: Box<Expr>,
        sequence_type: SequenceType,
    },
    Treat {
        expr: Box<Expr>,
        sequence_type: SequenceType,
    },
    Cast {
        expr: Box<Expr>,
        target: AtomicOrUnionType,
        allow_empty: bool,
    },
    Castable {
        expr: Box<Expr>,
        target: AtomicOrUnionType,
        allow_empty: bool,
    },

    FunctionCall {
        function: Arc<FunctionDef>,
        arguments: Vec<Expr>,
    },
    /// Calls a function, map or array value.
    DynamicFunctionCall {
        base: Box<Expr>,
        arguments: Vec<Expr>,
    },
    Lookup {
        base: Box<Expr>,
        key: KeySpecifier,
    },
    UnaryLookup(KeySpecifier),
    NamedFunctionRef {
        function: Arc<FunctionDef>,
        arity: usize,
    },
    InlineFunction(Arc<InlineFunction>),

    MapConstructor(Vec<(Expr, Expr)>),
    /// `[a, b]`: one member per expression.
    ArrayConstructor(Vec<Expr>),
    /// `array { expr }`: one member per item.
    CurlyArrayConstructor(Option<Box<Expr>>),

    Let {
        name: QName,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    For {
        name: QName,
        sequence: Box<Expr>,
        body: Box<Expr>,
    },
    Quantified {
        quantifier: Quantifier,
        bindings: Vec<(QName, Expr)>,
        satisfies: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// `a ! b`
    SimpleMap(Vec<Expr>),
}

impl Expr {
    /// Variant name, as shown by the CST printer.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Literal(_) => "Literal",
            Expr::EmptySequence => "EmptySequence",
            Expr::Sequence(_) => "Sequence",
            Expr::ContextItem => "ContextItem",
            Expr::VariableRef(_) => "VariableReference",
            Expr::RootSlashOnly => "RootSlashOnlyPath",
            Expr::RootSlash(_) => "RootSlashPath",
            Expr::RootDoubleSlash(_) => "RootDoubleSlashPath",
            Expr::RelativeSlash { .. } => "RelativeSlashPath",
            Expr::RelativeDoubleSlash { .. } => "RelativeDoubleSlashPath",
            Expr::Flag(_) => "Flag",
            Expr::ModelInstance(_) => "ModelInstance",
            Expr::Step { .. } => "Step",
            Expr::Filter { .. } => "Filter",
            Expr::GeneralComparison { .. } => "GeneralComparison",
            Expr::ValueComparison { .. } => "ValueComparison",
            Expr::Or(_) => "Or",
            Expr::And(_) => "And",
            Expr::Arithmetic { .. } => "Arithmetic",
            Expr::Unary { .. } => "Unary",
            Expr::StringConcat(_) => "StringConcat",
            Expr::Range { .. } => "Range",
            Expr::Union(_) => "Union",
            Expr::Intersect { .. } => "Intersect",
            Expr::Except { .. } => "Except",
            Expr::InstanceOf { .. } => "InstanceOf",
            Expr::Treat { .. } => "Treat",
            Expr::Cast { .. } => "Cast",
            Expr::Castable { .. } => "Castable",
            Expr::FunctionCall { .. } => "FunctionCall",
            Expr::DynamicFunctionCall { .. } => "DynamicFunctionCall",
            Expr::Lookup { .. } => "Lookup",
            Expr::UnaryLookup(_) => "UnaryLookup",
            Expr::NamedFunctionRef { .. } => "NamedFunctionReference",
            Expr::InlineFunction(_) => "InlineFunction",
            Expr::MapConstructor(_) => "MapConstructor",
            Expr::ArrayConstructor(_) => "ArraySquareConstructor",
            Expr::CurlyArrayConstructor(_) => "ArrayCurlyConstructor",
            Expr::Let { .. } => "Let",
            Expr::For { .. } => "For",
            Expr::Quantified { .. } => "Quantified",
            Expr::If { .. } => "If",
            Expr::SimpleMap(_) => "SimpleMap",
        }
    }

    /// Direct sub-expressions in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal(_)
            | Expr::EmptySequence
            | Expr::ContextItem
            | Expr::VariableRef(_)
            | Expr::RootSlashOnly
            | Expr::Flag(_)
            | Expr::ModelInstance(_)
            | Expr::Step { .. }
            | Expr::NamedFunctionRef { .. } => Vec::new(),
            Expr::Sequence(items)
            | Expr::Or(items)
            | Expr::And(items)
            | Expr::StringConcat(items)
            | Expr::Union(items)
            | Expr::SimpleMap(items)
            | Expr::ArrayConstructor(items) => items.iter().collect(),
            Expr::RootSlash(inner) | Expr::RootDoubleSlash(inner) => vec![inner],
            Expr::RelativeSlash { left, right }
            | Expr::RelativeDoubleSlash { left, right }
            | Expr::GeneralComparison { left, right, .. }
            | Expr::ValueComparison { left, right, .. }
            | Expr::Arithmetic { left, right, .. }
            | Expr::Intersect { left, right }
            | Expr::Except { left, right } => vec![left, right],
            Expr::Range { start, end } => vec![start, end],
            Expr::Filter { base, predicate } => vec![base, predicate],
            Expr::Unary { operand, .. } => vec![operand],
            Expr::InstanceOf { expr, .. }
            | Expr::Treat { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::Castable { expr, .. } => vec![expr],
            Expr::FunctionCall { arguments, .. } => arguments.iter().collect(),
            Expr::DynamicFunctionCall { base, arguments } => {
                std::iter::once(base.as_ref()).chain(arguments).collect()
            }
            Expr::Lookup { base, key } => {
                let mut children = vec![base.as_ref()];
                if let KeySpecifier::Expr(key) = key {
                    children.push(key);
                }
                children
            }
            Expr::UnaryLookup(key) => match key {
                KeySpecifier::Expr(key) => vec![key],
                _ => Vec::new(),
            },
            Expr::InlineFunction(function) => vec![&function.body],
            Expr::MapConstructor(entries) => {
                entries.iter().flat_map(|(k, v)| [k, v]).collect()
            }
            Expr::CurlyArrayConstructor(content) => content.iter().map(|c| c.as_ref()).collect(),
            Expr::Let { value, body, .. } => vec![value, body],
            Expr::For { sequence, body, .. } => vec![sequence, body],
            Expr::Quantified {
                bindings,
                satisfies,
                ..
            } => bindings
                .iter()
                .map(|(_, e)| e)
                .chain(std::iter::once(satisfies.as_ref()))
                .collect(),
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => vec![condition, then_branch, else_branch],
        }
    }

    /// The item type every result item is known to have before evaluation.
    pub fn static_result_type(&self) -> ItemType {
        let boolean = ItemType::Atomic(AtomicOrUnionType::Leaf(DataType::Boolean));
        match self {
            Expr::Literal(value) => ItemType::Atomic(AtomicOrUnionType::Leaf(value.datatype())),
            Expr::GeneralComparison { .. }
            | Expr::ValueComparison { .. }
            | Expr::Or(_)
            | Expr::And(_)
            | Expr::InstanceOf { .. }
            | Expr::Castable { .. }
            | Expr::Quantified { .. } => boolean,
            Expr::StringConcat(_) => ItemType::Atomic(AtomicOrUnionType::Leaf(DataType::String)),
            Expr::Range { .. } => ItemType::Atomic(AtomicOrUnionType::Leaf(DataType::Integer)),
            Expr::Arithmetic { .. } | Expr::Unary { .. } => {
                ItemType::Atomic(AtomicOrUnionType::AnyAtomic)
            }
            Expr::Cast { target, .. } => ItemType::Atomic(*target),
            Expr::Treat { sequence_type, .. } => sequence_type.item_type().clone(),
            Expr::RootSlashOnly => ItemType::Kind(KindTest::Document(None)),
            Expr::Flag(name) => ItemType::Kind(KindTest::Flag {
                name: name.clone(),
                value_type: None,
            }),
            Expr::ModelInstance(_)
            | Expr::Step { .. }
            | Expr::RootSlash(_)
            | Expr::RootDoubleSlash(_)
            | Expr::RelativeDoubleSlash { .. }
            | Expr::Intersect { .. }
            | Expr::Except { .. } => ItemType::Kind(KindTest::AnyNode),
            Expr::RelativeSlash { right, .. } => right.static_result_type(),
            Expr::Filter { base, .. } => base.static_result_type(),
            Expr::MapConstructor(_) => ItemType::AnyMap,
            Expr::ArrayConstructor(_) | Expr::CurlyArrayConstructor(_) => ItemType::AnyArray,
            Expr::InlineFunction(_) | Expr::NamedFunctionRef { .. } => ItemType::AnyFunction,
            Expr::FunctionCall { function, .. } => {
                function.signature().return_type().item_type().clone()
            }
            Expr::Let { body, .. } | Expr::For { body, .. } => body.static_result_type(),
            _ => ItemType::AnyItem,
        }
    }

    /// Indented dump of the tree, one node per line.
    pub fn to_cst_string(&self) -> String {
        printer::print(self)
    }
}
