//! Tree-walking evaluation of a compiled [`Expr`].
//!
//! Entry point: [`evaluate`], which takes the dynamic context and the focus
//! (the context item as a sequence of zero or one items) and returns the
//! result sequence. Evaluation never mutates the document.

pub(crate) mod arithmetic;
pub(crate) mod cast;
mod compare;
mod path;
#[cfg(test)]
pub(crate) mod test_support;

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use metaschema_datatypes::AtomicValue;
use metaschema_model::{NodeItem, QName};

use crate::context::DynamicContext;
use crate::cst::{Expr, InlineFunction, KeySpecifier, Quantifier};
use crate::error::{ErrorCode, MetapathError};
use crate::functions;
use crate::item::{ArrayItem, FunctionItem, Item, MapItem, MapKey, Sequence};
use crate::types::{AtomicOrUnionType, ItemType, SequenceType};

pub fn evaluate<'a, N: NodeItem<'a>>(
    expr: &Expr,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    match expr {
        Expr::Literal(value) => Ok(Sequence::from_atomic(value.clone())),
        Expr::EmptySequence => Ok(Sequence::empty()),
        Expr::Sequence(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                parts.push(evaluate(item, ctx, focus)?);
            }
            Ok(Sequence::concat(parts))
        }
        Expr::ContextItem => {
            if focus.is_empty() {
                return Err(MetapathError::context_absent());
            }
            Ok(focus.clone())
        }
        Expr::VariableRef(name) => evaluate_variable(name, ctx),

        Expr::RootSlashOnly => path::evaluate_root_slash_only(focus),
        Expr::RootSlash(step) => path::evaluate_root_slash(step, ctx, focus),
        Expr::RootDoubleSlash(step) => path::evaluate_root_double_slash(step, ctx, focus),
        Expr::RelativeSlash { left, right } => {
            path::evaluate_relative_slash(left, right, ctx, focus)
        }
        Expr::RelativeDoubleSlash { left, right } => {
            path::evaluate_relative_double_slash(left, right, ctx, focus)
        }
        Expr::Flag(test) => path::evaluate_flag(test, focus),
        Expr::ModelInstance(test) => path::evaluate_model_instance(test, focus),
        Expr::Step { axis, test } => path::evaluate_step(*axis, test, focus),
        Expr::Filter { base, predicate } => path::evaluate_filter(base, predicate, ctx, focus),

        Expr::GeneralComparison {
            left,
            operator,
            right,
        } => {
            let left = evaluate(left, ctx, focus)?;
            let right = evaluate(right, ctx, focus)?;
            Ok(Sequence::boolean(compare::general_compare(
                &left, *operator, &right,
            )?))
        }
        Expr::ValueComparison {
            left,
            operator,
            right,
        } => {
            let left = evaluate(left, ctx, focus)?;
            let right = evaluate(right, ctx, focus)?;
            compare::value_compare(&left, *operator, &right)
        }
        Expr::Or(operands) => {
            for operand in operands {
                if evaluate(operand, ctx, focus)?.effective_boolean_value()? {
                    return Ok(Sequence::boolean(true));
                }
            }
            Ok(Sequence::boolean(false))
        }
        Expr::And(operands) => {
            for operand in operands {
                if !evaluate(operand, ctx, focus)?.effective_boolean_value()? {
                    return Ok(Sequence::boolean(false));
                }
            }
            Ok(Sequence::boolean(true))
        }

        Expr::Arithmetic {
            left,
            operator,
            right,
        } => {
            let left = evaluate(left, ctx, focus)?.atomize_optional()?;
            let right = evaluate(right, ctx, focus)?.atomize_optional()?;
            match (left, right) {
                (Some(left), Some(right)) => Ok(Sequence::from_atomic(arithmetic::apply(
                    &left, *operator, &right,
                )?)),
                _ => Ok(Sequence::empty()),
            }
        }
        Expr::Unary { operand, negate } => evaluate_unary(operand, *negate, ctx, focus),
        Expr::StringConcat(operands) => {
            let mut joined = String::new();
            for operand in operands {
                if let Some(value) = evaluate(operand, ctx, focus)?.atomize_optional()? {
                    joined.push_str(&value.to_string());
                }
            }
            Ok(Sequence::from_atomic(AtomicValue::string(joined)))
        }
        Expr::Range { start, end } => evaluate_range(start, end, ctx, focus),
        Expr::Union(operands) => path::evaluate_union(operands, ctx, focus),
        Expr::Intersect { left, right } => {
            path::evaluate_node_difference(left, right, true, ctx, focus)
        }
        Expr::Except { left, right } => {
            path::evaluate_node_difference(left, right, false, ctx, focus)
        }

        Expr::InstanceOf {
            expr,
            sequence_type,
        } => {
            let value = evaluate(expr, ctx, focus)?;
            Ok(Sequence::boolean(sequence_type.matches(&value)))
        }
        Expr::Treat {
            expr,
            sequence_type,
        } => evaluate_treat(expr, sequence_type, ctx, focus),
        Expr::Cast {
            expr,
            target,
            allow_empty,
        } => evaluate_cast(expr, target, *allow_empty, ctx, focus),
        Expr::Castable {
            expr,
            target,
            allow_empty,
        } => Ok(Sequence::boolean(
            evaluate_cast(expr, target, *allow_empty, ctx, focus).is_ok(),
        )),

        Expr::FunctionCall {
            function,
            arguments,
        } => {
            let arguments = evaluate_all(arguments, ctx, focus)?;
            functions::invoke(function, arguments, ctx, focus)
        }
        Expr::DynamicFunctionCall { base, arguments } => {
            evaluate_dynamic_function_call(base, arguments, ctx, focus)
        }
        Expr::Lookup { base, key } => {
            let base = evaluate(base, ctx, focus)?;
            evaluate_lookup(&base, key, ctx, focus)
        }
        Expr::UnaryLookup(key) => {
            if focus.is_empty() {
                return Err(MetapathError::context_absent());
            }
            evaluate_lookup(focus, key, ctx, focus)
        }
        Expr::NamedFunctionRef { function, arity } => {
            Ok(Sequence::singleton(Item::Function(Arc::new(
                FunctionItem::Builtin {
                    function: Arc::clone(function),
                    arity: *arity,
                },
            ))))
        }
        Expr::InlineFunction(function) => evaluate_inline_function(function, ctx),

        Expr::MapConstructor(entries) => evaluate_map_constructor(entries, ctx, focus),
        Expr::ArrayConstructor(members) => {
            let members = evaluate_all(members, ctx, focus)?;
            Ok(Sequence::singleton(Item::Array(Arc::new(ArrayItem::new(
                members,
            )))))
        }
        Expr::CurlyArrayConstructor(content) => {
            let members = match content {
                Some(content) => evaluate(content, ctx, focus)?
                    .iter()
                    .map(|item| Sequence::singleton(item.clone()))
                    .collect(),
                None => Vec::new(),
            };
            Ok(Sequence::singleton(Item::Array(Arc::new(ArrayItem::new(
                members,
            )))))
        }

        Expr::Let { name, value, body } => {
            let value = evaluate(value, ctx, focus)?;
            evaluate(body, &ctx.bind_variable(name.clone(), value), focus)
        }
        Expr::For {
            name,
            sequence,
            body,
        } => {
            let sequence = evaluate(sequence, ctx, focus)?;
            let mut results = Vec::with_capacity(sequence.len());
            for item in sequence.iter() {
                let scope = ctx.bind_variable(name.clone(), Sequence::singleton(item.clone()));
                results.push(evaluate(body, &scope, focus)?);
            }
            Ok(Sequence::concat(results))
        }
        Expr::Quantified {
            quantifier,
            bindings,
            satisfies,
        } => Ok(Sequence::boolean(evaluate_quantified(
            *quantifier,
            bindings,
            satisfies,
            ctx,
            focus,
        )?)),
        Expr::If {
            condition,
            then_branch,
            else_branch,
        } => {
            if evaluate(condition, ctx, focus)?.effective_boolean_value()? {
                evaluate(then_branch, ctx, focus)
            } else {
                evaluate(else_branch, ctx, focus)
            }
        }
        Expr::SimpleMap(steps) => evaluate_simple_map(steps, ctx, focus),
    }
}

fn evaluate_all<'a, N: NodeItem<'a>>(
    exprs: &[Expr],
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Vec<Sequence<N>>, MetapathError> {
    exprs.iter().map(|expr| evaluate(expr, ctx, focus)).collect()
}

fn evaluate_variable<'a, N: NodeItem<'a>>(
    name: &QName,
    ctx: &DynamicContext<N>,
) -> Result<Sequence<N>, MetapathError> {
    ctx.variable(name).cloned().ok_or_else(|| {
        MetapathError::dynamic(
            ErrorCode::XPDY0002,
            format!("variable '${name}' has no value"),
        )
    })
}

fn evaluate_unary<'a, N: NodeItem<'a>>(
    operand: &Expr,
    negate: bool,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let Some(value) = evaluate(operand, ctx, focus)?.atomize_optional()? else {
        return Ok(Sequence::empty());
    };
    if negate {
        return Ok(Sequence::from_atomic(arithmetic::negate(&value)?));
    }
    if !value.is_numeric() {
        return Err(MetapathError::type_error(format!(
            "unary plus is not defined for {}",
            value.datatype()
        )));
    }
    Ok(Sequence::from_atomic(value))
}

fn evaluate_range<'a, N: NodeItem<'a>>(
    start: &Expr,
    end: &Expr,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let bound = |expr: &Expr| -> Result<Option<i64>, MetapathError> {
        match evaluate(expr, ctx, focus)?.atomize_optional()? {
            None => Ok(None),
            Some(value) => value.as_integer().map(Some).ok_or_else(|| {
                MetapathError::type_error(format!(
                    "range bounds must be integers, found {}",
                    value.datatype()
                ))
            }),
        }
    };
    let (Some(start), Some(end)) = (bound(start)?, bound(end)?) else {
        return Ok(Sequence::empty());
    };
    Ok((start..=end)
        .map(|i| Item::Atomic(AtomicValue::integer(i)))
        .collect())
}

fn evaluate_treat<'a, N: NodeItem<'a>>(
    expr: &Expr,
    sequence_type: &SequenceType,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let value = evaluate(expr, ctx, focus)?;
    if sequence_type.matches(&value) {
        Ok(value)
    } else {
        Err(MetapathError::dynamic(
            ErrorCode::XPDY0050,
            format!("the value does not match the sequence type {sequence_type}"),
        ))
    }
}

fn evaluate_cast<'a, N: NodeItem<'a>>(
    expr: &Expr,
    target: &AtomicOrUnionType,
    allow_empty: bool,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let values = evaluate(expr, ctx, focus)?.atomize()?;
    match values.as_slice() {
        [] if allow_empty => Ok(Sequence::empty()),
        [] => Err(MetapathError::type_error(format!(
            "an empty sequence cannot be cast to {target}"
        ))),
        [value] => Ok(Sequence::from_atomic(cast::cast(value, target)?)),
        _ => Err(MetapathError::more_than_one_item(values.len())),
    }
}

/// Applies a function value to already evaluated arguments.
fn call_function<'a, N: NodeItem<'a>>(
    function: &FunctionItem<N>,
    arguments: Vec<Sequence<N>>,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    if arguments.len() != function.arity() {
        return Err(MetapathError::type_error(format!(
            "function expects {} arguments but was called with {}",
            function.arity(),
            arguments.len()
        )));
    }
    match function {
        FunctionItem::Builtin { function, .. } => {
            functions::invoke(function, arguments, ctx, focus)
        }
        FunctionItem::Inline { function, captured } => {
            let mut scope = ctx.clone();
            for (name, value) in captured {
                scope = scope.bind_variable(name.clone(), value.clone());
            }
            for ((name, declared), argument) in function.parameters.iter().zip(arguments) {
                let argument = match declared.item_type() {
                    ItemType::Atomic(_) => argument
                        .atomize()?
                        .into_iter()
                        .map(Item::Atomic)
                        .collect(),
                    _ => argument,
                };
                if !declared.matches(&argument) {
                    return Err(MetapathError::type_error(format!(
                        "argument ${name} does not match {declared}"
                    )));
                }
                scope = scope.bind_variable(name.clone(), argument);
            }
            let result = evaluate(&function.body, &scope, &Sequence::empty())?;
            if !function.return_type.matches(&result) {
                return Err(MetapathError::type_error(format!(
                    "function result does not match {}",
                    function.return_type
                )));
            }
            Ok(result)
        }
    }
}

/// The single key or index argument used to call a map or an array.
fn accessor_key<N: Clone>(arguments: &[Sequence<N>]) -> Result<&AtomicValue, MetapathError> {
    match arguments {
        [key] => match key.first_item(true)? {
            Some(Item::Atomic(value)) => Ok(value),
            Some(other) => Err(MetapathError::type_error(format!(
                "a {} cannot be used as a key",
                other.kind_name()
            ))),
            None => Err(MetapathError::type_error("no key or index was provided")),
        },
        _ => Err(MetapathError::type_error(format!(
            "maps and arrays take one argument, not {}",
            arguments.len()
        ))),
    }
}

fn array_index(value: &AtomicValue) -> Result<i64, MetapathError> {
    value.as_integer().ok_or_else(|| {
        MetapathError::type_error(format!(
            "an array index must be an integer, found {}",
            value.datatype()
        ))
    })
}

fn evaluate_dynamic_function_call<'a, N: NodeItem<'a>>(
    base: &Expr,
    arguments: &[Expr],
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let base = evaluate(base, ctx, focus)?;
    let arguments = evaluate_all(arguments, ctx, focus)?;
    match base.first_item(true)? {
        Some(Item::Map(map)) => {
            let key = accessor_key(&arguments)?;
            Ok(map.get(key).cloned().unwrap_or_else(Sequence::empty))
        }
        Some(Item::Array(array)) => {
            let index = array_index(accessor_key(&arguments)?)?;
            Ok(array.get(index)?.clone())
        }
        Some(Item::Function(function)) => call_function(function, arguments, ctx, focus),
        other => Err(MetapathError::type_error(format!(
            "{} cannot be called as a function",
            other.map_or("an empty sequence", Item::kind_name)
        ))),
    }
}

fn lookup_keys<'a, N: NodeItem<'a>>(
    key: &KeySpecifier,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Option<Vec<AtomicValue>>, MetapathError> {
    Ok(match key {
        KeySpecifier::Wildcard => None,
        KeySpecifier::Name(name) => Some(vec![AtomicValue::string(name.as_str())]),
        KeySpecifier::Integer(index) => Some(vec![AtomicValue::integer(*index)]),
        KeySpecifier::Expr(expr) => Some(evaluate(expr, ctx, focus)?.atomize()?),
    })
}

/// `?key` applied to every map or array in `bases`.
fn evaluate_lookup<'a, N: NodeItem<'a>>(
    bases: &Sequence<N>,
    key: &KeySpecifier,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let keys = lookup_keys(key, ctx, focus)?;
    let mut results = Vec::new();
    for base in bases.iter() {
        match (base, &keys) {
            (Item::Map(map), None) => results.extend(map.entries().map(|(_, v)| v.clone())),
            (Item::Map(map), Some(keys)) => {
                results.extend(keys.iter().filter_map(|k| map.get(k).cloned()));
            }
            (Item::Array(array), None) => results.extend(array.members().iter().cloned()),
            (Item::Array(array), Some(keys)) => {
                for key in keys {
                    results.push(array.get(array_index(key)?)?.clone());
                }
            }
            (other, _) => {
                return Err(MetapathError::type_error(format!(
                    "lookup requires a map or an array, found a {}",
                    other.kind_name()
                )));
            }
        }
    }
    Ok(Sequence::concat(results))
}

fn evaluate_inline_function<'a, N: NodeItem<'a>>(
    function: &Arc<InlineFunction>,
    ctx: &DynamicContext<N>,
) -> Result<Sequence<N>, MetapathError> {
    let mut captured = HashMap::with_capacity(function.captures.len());
    for name in &function.captures {
        captured.insert(name.clone(), evaluate_variable(name, ctx)?);
    }
    Ok(Sequence::singleton(Item::Function(Arc::new(
        FunctionItem::Inline {
            function: Arc::clone(function),
            captured,
        },
    ))))
}

fn evaluate_map_constructor<'a, N: NodeItem<'a>>(
    entries: &[(Expr, Expr)],
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let mut map = IndexMap::with_capacity(entries.len());
    for (key, value) in entries {
        let mut keys = evaluate(key, ctx, focus)?.atomize()?;
        let key = match keys.len() {
            1 => keys.remove(0),
            n => {
                return Err(MetapathError::type_error(format!(
                    "a map key must be a single atomic value, found {n} values"
                )));
            }
        };
        let value = evaluate(value, ctx, focus)?;
        match map.entry(MapKey::new(key)) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(slot) => {
                return Err(MetapathError::dynamic(
                    ErrorCode::XQDY0137,
                    format!("duplicate map key '{}'", slot.key().value()),
                ));
            }
        }
    }
    Ok(Sequence::singleton(Item::Map(Arc::new(MapItem::new(map)))))
}

/// Binds one variable at a time; stops at the first item that decides the
/// outcome.
fn evaluate_quantified<'a, N: NodeItem<'a>>(
    quantifier: Quantifier,
    bindings: &[(QName, Expr)],
    satisfies: &Expr,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<bool, MetapathError> {
    let Some(((name, domain), rest)) = bindings.split_first() else {
        return evaluate(satisfies, ctx, focus)?.effective_boolean_value();
    };
    let domain = evaluate(domain, ctx, focus)?;
    for item in domain.iter() {
        let scope = ctx.bind_variable(name.clone(), Sequence::singleton(item.clone()));
        let outcome = evaluate_quantified(quantifier, rest, satisfies, &scope, focus)?;
        match quantifier {
            Quantifier::Some if outcome => return Ok(true),
            Quantifier::Every if !outcome => return Ok(false),
            _ => {}
        }
    }
    Ok(quantifier == Quantifier::Every)
}

/// `a ! b`: evaluates each step once per item of the previous result.
fn evaluate_simple_map<'a, N: NodeItem<'a>>(
    steps: &[Expr],
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let Some((first, rest)) = steps.split_first() else {
        return Ok(Sequence::empty());
    };
    let mut current = evaluate(first, ctx, focus)?;
    for step in rest {
        let mut results = Vec::with_capacity(current.len());
        for item in current.iter() {
            results.push(evaluate(step, ctx, &Sequence::singleton(item.clone()))?);
        }
        current = Sequence::concat(results);
    }
    Ok(current)
}
