//! Turns a [`ParseNode`] tree into a typed [`Expr`].
//!
//! Every name is resolved here: namespace prefixes against the static
//! context, function calls against the function library, type names against
//! the built-in atomic types. Evaluation never looks anything up by name.

mod types;

use std::sync::Arc;

use log::debug;
use metaschema_datatypes::{AtomicValue, DataType};
use metaschema_model::QName;

use crate::context::StaticContext;
use crate::cst::{
    ArithmeticOperator, Axis, ComparisonOperator, Expr, InlineFunction, KeySpecifier, Quantifier,
    StepTest,
};
use crate::error::{ErrorCode, MetapathError};
use crate::functions::FunctionDef;
use crate::namespaces;
use crate::parser::{self, ParseNode, Rule};
use crate::types::{SequenceType, lookup_cast_target};

/// Compiles expression text against a static context.
pub fn compile_expression(text: &str, context: &StaticContext) -> Result<Expr, MetapathError> {
    debug!("compiling metapath '{text}'");
    let tree = parser::parse(text)?;
    let expr = Compiler::new(context).compile(&tree)?;
    debug!("compiled '{text}' to {}", expr.kind_name());
    Ok(expr)
}

/// Compiles a standalone sequence type such as `meta:string+`.
pub(crate) fn compile_sequence_type(
    text: &str,
    context: &StaticContext,
) -> Result<SequenceType, MetapathError> {
    let tree = parser::parse_sequence_type(text)?;
    Compiler::new(context).sequence_type(&tree)
}

/// Variables an inline function body reads from enclosing scopes.
struct FunctionFrame {
    /// Scope depth at which the function's own parameters start.
    boundary: usize,
    captures: Vec<QName>,
}

pub(crate) struct Compiler<'c> {
    context: &'c StaticContext,
    scope: Vec<QName>,
    frames: Vec<FunctionFrame>,
}

impl<'c> Compiler<'c> {
    pub(crate) fn new(context: &'c StaticContext) -> Self {
        Self {
            context,
            scope: Vec::new(),
            frames: Vec::new(),
        }
    }

    pub(crate) fn context(&self) -> &StaticContext {
        self.context
    }

    pub(crate) fn compile(&mut self, node: &ParseNode) -> Result<Expr, MetapathError> {
        match node.rule() {
            Rule::Expr => Ok(Expr::Sequence(self.compile_all(node.children())?)),
            Rule::For => self.for_expr(node),
            Rule::Let => self.let_expr(node),
            Rule::Quantified => self.quantified(node),
            Rule::If => Ok(Expr::If {
                condition: self.boxed(node.child(0)?)?,
                then_branch: self.boxed(node.child(1)?)?,
                else_branch: self.boxed(node.child(2)?)?,
            }),
            Rule::Or => Ok(Expr::Or(self.compile_all(node.children())?)),
            Rule::And => Ok(Expr::And(self.compile_all(node.children())?)),
            Rule::Comparison => self.comparison(node),
            Rule::StringConcat => Ok(Expr::StringConcat(self.compile_all(node.children())?)),
            Rule::Range => Ok(Expr::Range {
                start: self.boxed(node.child(0)?)?,
                end: self.boxed(node.child(1)?)?,
            }),
            Rule::Arithmetic => {
                let operator = ArithmeticOperator::from_token(node.text()).ok_or_else(|| {
                    MetapathError::syntax(format!("unknown operator '{}'", node.text()))
                })?;
                Ok(Expr::Arithmetic {
                    left: self.boxed(node.child(0)?)?,
                    operator,
                    right: self.boxed(node.child(1)?)?,
                })
            }
            Rule::Union => Ok(Expr::Union(self.compile_all(node.children())?)),
            Rule::IntersectExcept => {
                let left = self.boxed(node.child(0)?)?;
                let right = self.boxed(node.child(1)?)?;
                Ok(match node.text() {
                    "intersect" => Expr::Intersect { left, right },
                    _ => Expr::Except { left, right },
                })
            }
            Rule::InstanceOf => Ok(Expr::InstanceOf {
                expr: self.boxed(node.child(0)?)?,
                sequence_type: self.sequence_type(node.child(1)?)?,
            }),
            Rule::Treat => Ok(Expr::Treat {
                expr: self.boxed(node.child(0)?)?,
                sequence_type: self.sequence_type(node.child(1)?)?,
            }),
            Rule::Cast | Rule::Castable => {
                let expr = self.boxed(node.child(0)?)?;
                let single = node.child(1)?;
                let target = lookup_cast_target(&self.context.expand_type_name(single.text())?)?;
                let allow_empty = single.find_child(Rule::Occurrence).is_some();
                Ok(if node.rule() == Rule::Cast {
                    Expr::Cast {
                        expr,
                        target,
                        allow_empty,
                    }
                } else {
                    Expr::Castable {
                        expr,
                        target,
                        allow_empty,
                    }
                })
            }
            Rule::Arrow => self.arrow(node),
            Rule::Unary => Ok(Expr::Unary {
                operand: self.boxed(node.child(0)?)?,
                negate: node.text() == "-",
            }),
            Rule::SimpleMap => Ok(Expr::SimpleMap(self.compile_all(node.children())?)),

            Rule::RootSlashOnly => Ok(Expr::RootSlashOnly),
            Rule::RootSlash => Ok(Expr::RootSlash(self.boxed(node.child(0)?)?)),
            Rule::RootDoubleSlash => Ok(Expr::RootDoubleSlash(self.boxed(node.child(0)?)?)),
            Rule::RelativeSlash => Ok(Expr::RelativeSlash {
                left: self.boxed(node.child(0)?)?,
                right: self.boxed(node.child(1)?)?,
            }),
            Rule::RelativeDoubleSlash => Ok(Expr::RelativeDoubleSlash {
                left: self.boxed(node.child(0)?)?,
                right: self.boxed(node.child(1)?)?,
            }),
            Rule::AxisStep => self.axis_step(node),
            Rule::Filter => Ok(Expr::Filter {
                base: self.boxed(node.child(0)?)?,
                predicate: self.boxed(node.child(1)?.child(0)?)?,
            }),
            Rule::DynamicCall => Ok(Expr::DynamicFunctionCall {
                base: self.boxed(node.child(0)?)?,
                arguments: self.compile_all(&node.children()[1..])?,
            }),
            Rule::Lookup => Ok(Expr::Lookup {
                base: self.boxed(node.child(0)?)?,
                key: self.key_specifier(node.child(1)?)?,
            }),
            Rule::UnaryLookup => Ok(Expr::UnaryLookup(self.key_specifier(node.child(0)?)?)),

            Rule::StringLiteral => Ok(Expr::Literal(AtomicValue::string(node.text()))),
            Rule::IntegerLiteral => Ok(Expr::Literal(literal(DataType::Integer, node.text())?)),
            Rule::DecimalLiteral => Ok(Expr::Literal(literal(DataType::Decimal, node.text())?)),
            Rule::VarRef => self.variable_ref(node),
            Rule::ContextItem => Ok(Expr::ContextItem),
            Rule::EmptySequence => Ok(Expr::EmptySequence),
            Rule::FunctionCall => {
                let mut arguments = self.compile_all(node.children())?;
                let name = self.context.expand_function_name(node.text())?;
                // `meta:date('2024-01-01')` constructs a value by casting.
                if name.namespace() == Some(namespaces::METAPATH_TYPES) && arguments.len() == 1 {
                    return Ok(Expr::Cast {
                        expr: Box::new(arguments.remove(0)),
                        target: lookup_cast_target(&name)?,
                        allow_empty: true,
                    });
                }
                let function = self.resolve_function(node.text(), arguments.len())?;
                Ok(Expr::FunctionCall {
                    function,
                    arguments,
                })
            }
            Rule::NamedFunctionRef => {
                let arity: usize = node.child(0)?.text().parse().map_err(|_| {
                    MetapathError::syntax(format!("invalid arity in '{}'", node.text()))
                })?;
                let function = self.resolve_function(node.text(), arity)?;
                Ok(Expr::NamedFunctionRef { function, arity })
            }
            Rule::InlineFunction => self.inline_function(node),
            Rule::MapConstructor => {
                let entries = node
                    .children()
                    .iter()
                    .map(|entry| Ok((self.compile(entry.child(0)?)?, self.compile(entry.child(1)?)?)))
                    .collect::<Result<Vec<_>, MetapathError>>()?;
                Ok(Expr::MapConstructor(entries))
            }
            Rule::SquareArray => Ok(Expr::ArrayConstructor(self.compile_all(node.children())?)),
            Rule::CurlyArray => Ok(Expr::CurlyArrayConstructor(match node.children().first() {
                Some(content) => Some(self.boxed(content)?),
                None => None,
            })),
            other => Err(MetapathError::syntax(format!(
                "{other:?} cannot appear as an expression"
            ))),
        }
    }

    fn boxed(&mut self, node: &ParseNode) -> Result<Box<Expr>, MetapathError> {
        self.compile(node).map(Box::new)
    }

    fn compile_all(&mut self, nodes: &[ParseNode]) -> Result<Vec<Expr>, MetapathError> {
        nodes.iter().map(|n| self.compile(n)).collect()
    }

    /// Splits `for`/`let`/quantified children into bindings and the trailing body.
    fn split_bindings(node: &ParseNode) -> Result<(&[ParseNode], &ParseNode), MetapathError> {
        match node.children().split_last() {
            Some((body, bindings)) if !bindings.is_empty() => Ok((bindings, body)),
            _ => Err(MetapathError::syntax(format!(
                "{:?} needs at least one binding",
                node.rule()
            ))),
        }
    }

    /// Compiles the bound expression, then brings the name into scope.
    fn bind(&mut self, binding: &ParseNode) -> Result<(QName, Expr), MetapathError> {
        let value = self.compile(binding.child(0)?)?;
        let name = self.context.expand_variable_name(binding.text())?;
        self.scope.push(name.clone());
        Ok((name, value))
    }

    fn for_expr(&mut self, node: &ParseNode) -> Result<Expr, MetapathError> {
        let depth = self.scope.len();
        let (bindings, body) = Self::split_bindings(node)?;
        let mut bound = Vec::with_capacity(bindings.len());
        for binding in bindings {
            bound.push(self.bind(binding)?);
        }
        let body = self.compile(body)?;
        self.scope.truncate(depth);
        Ok(bound
            .into_iter()
            .rev()
            .fold(body, |body, (name, sequence)| Expr::For {
                name,
                sequence: Box::new(sequence),
                body: Box::new(body),
            }))
    }

    fn let_expr(&mut self, node: &ParseNode) -> Result<Expr, MetapathError> {
        let depth = self.scope.len();
        let (bindings, body) = Self::split_bindings(node)?;
        let mut bound = Vec::with_capacity(bindings.len());
        for binding in bindings {
            bound.push(self.bind(binding)?);
        }
        let body = self.compile(body)?;
        self.scope.truncate(depth);
        Ok(bound
            .into_iter()
            .rev()
            .fold(body, |body, (name, value)| Expr::Let {
                name,
                value: Box::new(value),
                body: Box::new(body),
            }))
    }

    fn quantified(&mut self, node: &ParseNode) -> Result<Expr, MetapathError> {
        let quantifier = match node.text() {
            "every" => Quantifier::Every,
            _ => Quantifier::Some,
        };
        let depth = self.scope.len();
        let (bindings, test) = Self::split_bindings(node)?;
        let mut bound = Vec::with_capacity(bindings.len());
        for binding in bindings {
            bound.push(self.bind(binding)?);
        }
        let satisfies = self.boxed(test)?;
        self.scope.truncate(depth);
        Ok(Expr::Quantified {
            quantifier,
            bindings: bound,
            satisfies,
        })
    }

    fn comparison(&mut self, node: &ParseNode) -> Result<Expr, MetapathError> {
        let (operator, general) = ComparisonOperator::from_token(node.text()).ok_or_else(|| {
            MetapathError::syntax(format!("unknown comparison '{}'", node.text()))
        })?;
        let left = self.boxed(node.child(0)?)?;
        let right = self.boxed(node.child(1)?)?;
        Ok(if general {
            Expr::GeneralComparison {
                left,
                operator,
                right,
            }
        } else {
            Expr::ValueComparison {
                left,
                operator,
                right,
            }
        })
    }

    /// `a => f(b)` is `f(a, b)`.
    fn arrow(&mut self, node: &ParseNode) -> Result<Expr, MetapathError> {
        let mut result = self.compile(node.child(0)?)?;
        for call in &node.children()[1..] {
            match call.rule() {
                Rule::ArrowStaticCall => {
                    let mut arguments = vec![result];
                    arguments.extend(self.compile_all(call.children())?);
                    let function = self.resolve_function(call.text(), arguments.len())?;
                    result = Expr::FunctionCall {
                        function,
                        arguments,
                    };
                }
                _ => {
                    let base = self.boxed(call.child(0)?)?;
                    let mut arguments = vec![result];
                    arguments.extend(self.compile_all(&call.children()[1..])?);
                    result = Expr::DynamicFunctionCall { base, arguments };
                }
            }
        }
        Ok(result)
    }

    fn axis_step(&mut self, node: &ParseNode) -> Result<Expr, MetapathError> {
        let axis = Axis::from_name(node.text())
            .ok_or_else(|| MetapathError::syntax(format!("unknown axis '{}'", node.text())))?;
        let test_node = node.child(0)?;
        let test = if test_node.rule() == Rule::NameTest {
            let default = match axis {
                Axis::Flag => None,
                _ => self.context.default_model_namespace(),
            };
            StepTest::Name(self.name_test(test_node.text(), default)?)
        } else {
            StepTest::Kind(self.kind_test(test_node)?)
        };

        let mut step = match (axis, test) {
            (Axis::Flag, StepTest::Name(name)) => Expr::Flag(name),
            (Axis::Child, StepTest::Name(name)) => Expr::ModelInstance(name),
            (axis, test) => Expr::Step { axis, test },
        };
        for predicate in &node.children()[1..] {
            step = Expr::Filter {
                base: Box::new(step),
                predicate: self.boxed(predicate.child(0)?)?,
            };
        }
        Ok(step)
    }

    fn key_specifier(&mut self, node: &ParseNode) -> Result<KeySpecifier, MetapathError> {
        match node.rule() {
            Rule::KeyWildcard => Ok(KeySpecifier::Wildcard),
            Rule::KeyName => Ok(KeySpecifier::Name(node.text().to_string())),
            Rule::KeyInteger => {
                let index = node.text().parse().map_err(|_| {
                    MetapathError::syntax(format!("lookup index '{}' is out of range", node.text()))
                })?;
                Ok(KeySpecifier::Integer(index))
            }
            _ => {
                let key = match node.children().first() {
                    Some(inner) => self.compile(inner)?,
                    None => Expr::EmptySequence,
                };
                Ok(KeySpecifier::Expr(Box::new(key)))
            }
        }
    }

    fn variable_ref(&mut self, node: &ParseNode) -> Result<Expr, MetapathError> {
        let name = self.context.expand_variable_name(node.text())?;
        if let Some(depth) = self.scope.iter().rposition(|bound| *bound == name) {
            for frame in self.frames.iter_mut().filter(|f| depth < f.boundary) {
                if !frame.captures.contains(&name) {
                    frame.captures.push(name.clone());
                }
            }
            return Ok(Expr::VariableRef(name));
        }
        if self.context.is_declared_variable(&name) {
            return Ok(Expr::VariableRef(name));
        }
        Err(MetapathError::static_error(
            ErrorCode::XPST0008,
            format!("variable '${name}' is not in scope"),
        ))
    }

    fn resolve_function(&self, lexical: &str, arity: usize) -> Result<Arc<FunctionDef>, MetapathError> {
        let name = self.context.expand_function_name(lexical)?;
        self.context
            .function_library()
            .lookup(&name, arity)
            .ok_or_else(|| {
                MetapathError::static_error(
                    ErrorCode::XPST0017,
                    format!("no function '{name}' with arity {arity}"),
                )
            })
    }

    fn inline_function(&mut self, node: &ParseNode) -> Result<Expr, MetapathError> {
        let mut parameters = Vec::new();
        let mut return_type = SequenceType::any();
        let mut body_node = None;
        for child in node.children() {
            match child.rule() {
                Rule::Param => {
                    let name = self.context.expand_variable_name(child.text())?;
                    if parameters.iter().any(|(existing, _)| *existing == name) {
                        return Err(MetapathError::static_error(
                            ErrorCode::XPST0003,
                            format!("duplicate parameter '${name}'"),
                        ));
                    }
                    let declared = match child.children().first() {
                        Some(t) => self.sequence_type(t)?,
                        None => SequenceType::any(),
                    };
                    parameters.push((name, declared));
                }
                Rule::ReturnType => return_type = self.sequence_type(child.child(0)?)?,
                _ => body_node = Some(child),
            }
        }

        let depth = self.scope.len();
        self.frames.push(FunctionFrame {
            boundary: depth,
            captures: Vec::new(),
        });
        self.scope.extend(parameters.iter().map(|(name, _)| name.clone()));
        let body = match body_node.and_then(|b| b.children().first()) {
            Some(expr) => self.compile(expr),
            None => Ok(Expr::EmptySequence),
        };
        self.scope.truncate(depth);
        let frame = self.frames.pop();
        let body = body?;

        Ok(Expr::InlineFunction(Arc::new(InlineFunction {
            parameters,
            return_type,
            body,
            captures: frame.map(|f| f.captures).unwrap_or_default(),
        })))
    }
}

fn literal(datatype: DataType, text: &str) -> Result<AtomicValue, MetapathError> {
    datatype.parse(text).map_err(|err| {
        MetapathError::static_error(ErrorCode::XPST0003, format!("invalid literal: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AtomicOrUnionType, NameTest};

    fn compile(text: &str) -> Result<Expr, MetapathError> {
        compile_expression(text, &StaticContext::default())
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            compile("42").unwrap(),
            Expr::Literal(AtomicValue::integer(42))
        );
        assert_eq!(
            compile("'it''s'").unwrap(),
            Expr::Literal(AtomicValue::string("it's"))
        );
        assert!(matches!(compile("1.5").unwrap(), Expr::Literal(v) if v.datatype() == DataType::Decimal));
    }

    #[test]
    fn test_integer_literal_overflow_is_static() {
        let err = compile("99999999999999999999").unwrap_err();
        assert!(err.is_static());
        assert_eq!(err.code(), ErrorCode::XPST0003);
    }

    #[test]
    fn test_child_and_flag_steps() {
        let expr = compile("a/@id").unwrap();
        let Expr::RelativeSlash { left, right } = expr else {
            panic!("expected a relative path");
        };
        assert_eq!(*left, Expr::ModelInstance(NameTest::Name(QName::local("a"))));
        assert_eq!(*right, Expr::Flag(NameTest::Name(QName::local("id"))));
    }

    #[test]
    fn test_default_model_namespace_applies_to_steps_not_flags() {
        let context = StaticContext::builder()
            .default_model_namespace("urn:model")
            .build();
        let expr = compile_expression("a/@id", &context).unwrap();
        let Expr::RelativeSlash { left, right } = expr else {
            panic!("expected a relative path");
        };
        assert_eq!(
            *left,
            Expr::ModelInstance(NameTest::Name(QName::namespaced("urn:model", "a")))
        );
        assert_eq!(*right, Expr::Flag(NameTest::Name(QName::local("id"))));
    }

    #[test]
    fn test_wildcard_name_tests() {
        assert_eq!(compile("*").unwrap(), Expr::ModelInstance(NameTest::Any));
        assert_eq!(
            compile("*:x").unwrap(),
            Expr::ModelInstance(NameTest::AnyNamespace("x".to_string()))
        );
        assert_eq!(
            compile("Q{urn:a}*").unwrap(),
            Expr::ModelInstance(NameTest::AnyLocalName(Some("urn:a".to_string())))
        );
    }

    #[test]
    fn test_predicates_wrap_steps() {
        let expr = compile("a[1][@id]").unwrap();
        let Expr::Filter { base, .. } = expr else {
            panic!("expected a filter");
        };
        assert!(matches!(*base, Expr::Filter { .. }));
    }

    #[test]
    fn test_unknown_prefix() {
        let err = compile("x:a").unwrap_err();
        assert_eq!(err.code(), ErrorCode::XPST0081);
        assert!(err.is_static());
    }

    #[test]
    fn test_unknown_function_and_arity() {
        assert_eq!(compile("nope()").unwrap_err().code(), ErrorCode::XPST0017);
        assert_eq!(compile("true(1)").unwrap_err().code(), ErrorCode::XPST0017);
        assert!(matches!(
            compile("fn:count((1, 2))").unwrap(),
            Expr::FunctionCall { .. }
        ));
    }

    #[test]
    fn test_variable_scoping() {
        assert_eq!(compile("$x").unwrap_err().code(), ErrorCode::XPST0008);
        assert!(compile("let $x := 1 return $x").is_ok());
        assert_eq!(
            compile("(let $x := 1 return $x), $x").unwrap_err().code(),
            ErrorCode::XPST0008
        );
        let context = StaticContext::builder()
            .declare_variable(QName::local("x"))
            .build();
        assert!(compile_expression("$x", &context).is_ok());
    }

    #[test]
    fn test_let_nests_left_to_right() {
        let expr = compile("let $a := 1, $b := $a return $b").unwrap();
        let Expr::Let { name, body, .. } = expr else {
            panic!("expected let");
        };
        assert_eq!(name, QName::local("a"));
        assert!(matches!(*body, Expr::Let { .. }));
    }

    #[test]
    fn test_inline_function_captures_outer_variables() {
        let expr = compile("let $n := 1, $m := 2 return function($x) { $x + $n }").unwrap();
        let mut current = &expr;
        while let Expr::Let { body, .. } = current {
            current = body;
        }
        let Expr::InlineFunction(function) = current else {
            panic!("expected inline function");
        };
        assert_eq!(function.captures, vec![QName::local("n")]);
        assert_eq!(function.parameters.len(), 1);
    }

    #[test]
    fn test_cast_targets() {
        let expr = compile("'1' cast as meta:integer?").unwrap();
        assert!(matches!(
            expr,
            Expr::Cast {
                target: AtomicOrUnionType::Leaf(DataType::Integer),
                allow_empty: true,
                ..
            }
        ));
        assert_eq!(
            compile("1 castable as any-atomic-type").unwrap_err().code(),
            ErrorCode::XPST0080
        );
        assert_eq!(
            compile("1 cast as meta:nothing").unwrap_err().code(),
            ErrorCode::XPST0051
        );
    }

    #[test]
    fn test_type_constructor_becomes_cast() {
        let expr = compile("meta:date('2024-01-01')").unwrap();
        assert!(matches!(
            expr,
            Expr::Cast {
                target: AtomicOrUnionType::Leaf(DataType::Date),
                ..
            }
        ));
        assert_eq!(
            compile("meta:any-atomic-type(1)").unwrap_err().code(),
            ErrorCode::XPST0080
        );
    }

    #[test]
    fn test_arrow_becomes_call() {
        let expr = compile("'abc' => upper-case()").unwrap();
        let Expr::FunctionCall { arguments, function } = expr else {
            panic!("expected call");
        };
        assert_eq!(arguments.len(), 1);
        assert_eq!(function.name().local_name(), "upper-case");
    }

    #[test]
    fn test_general_and_value_comparisons() {
        assert!(matches!(compile("1 = 2").unwrap(), Expr::GeneralComparison { .. }));
        assert!(matches!(compile("1 eq 2").unwrap(), Expr::ValueComparison { .. }));
    }

    #[test]
    fn test_typed_function_test_is_not_supported() {
        let err = compile("1 instance of function(item()) as item()").unwrap_err();
        assert_eq!(err.code(), ErrorCode::XPST0010);
    }
}
