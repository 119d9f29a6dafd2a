//! Path expressions, axis steps, predicates and node-set operators.
//!
//! Every path result made only of nodes is returned de-duplicated and in
//! document order.

use std::collections::HashSet;
use std::iter;

use metaschema_model::{NodeItem, NodeKind};
use rust_decimal::Decimal;

use crate::context::DynamicContext;
use crate::cst::{Axis, Expr, StepTest};
use crate::error::{ErrorCode, MetapathError};
use crate::item::{Item, Sequence};
use crate::types::NameTest;

use super::evaluate;

fn into_document_order<'a, N: NodeItem<'a>>(mut nodes: Vec<N>) -> Vec<N> {
    nodes.sort();
    nodes.dedup();
    nodes
}

fn node_sequence<'a, N: NodeItem<'a>>(nodes: Vec<N>) -> Sequence<N> {
    nodes.into_iter().map(Item::Node).collect()
}

/// The focus of a step as nodes. An absent focus or a non-node is an error.
fn step_focus<'a, N: NodeItem<'a>>(focus: &Sequence<N>) -> Result<Vec<N>, MetapathError> {
    if focus.is_empty() {
        return Err(MetapathError::context_absent());
    }
    focus
        .iter()
        .map(|item| match item {
            Item::Node(node) => Ok(*node),
            other => Err(MetapathError::dynamic(
                ErrorCode::XPTY0020,
                format!("the focus of an axis step must be a node, found a {}", other.kind_name()),
            )),
        })
        .collect()
}

/// The left-hand side of `/` or `//`, which must be made of nodes.
fn path_operand<'a, N: NodeItem<'a>>(operand: &Sequence<N>) -> Result<Vec<N>, MetapathError> {
    operand
        .iter()
        .map(|item| match item {
            Item::Node(node) => Ok(*node),
            other => Err(MetapathError::dynamic(
                ErrorCode::XPTY0019,
                format!("the left side of a path must be nodes, found a {}", other.kind_name()),
            )),
        })
        .collect()
}

fn document_nodes<'a, N: NodeItem<'a>>(focus: &Sequence<N>) -> Result<Vec<N>, MetapathError> {
    let nodes = step_focus(focus)?;
    Ok(into_document_order(
        nodes.iter().map(NodeItem::document_node).collect(),
    ))
}

fn with_descendants<'a, N: NodeItem<'a>>(nodes: Vec<N>) -> Vec<N> {
    let expanded = nodes
        .into_iter()
        .flat_map(|node| iter::once(node).chain(node.descendants()))
        .collect();
    into_document_order(expanded)
}

/// Evaluates `step` once per node and merges the results.
fn apply_step<'a, N: NodeItem<'a>>(
    step: &Expr,
    ctx: &DynamicContext<N>,
    nodes: Vec<N>,
) -> Result<Sequence<N>, MetapathError> {
    let mut items = Vec::new();
    for node in nodes {
        let result = evaluate(step, ctx, &Sequence::singleton(Item::Node(node)))?;
        items.extend(result.iter().cloned());
    }
    path_result(items)
}

fn path_result<'a, N: NodeItem<'a>>(items: Vec<Item<N>>) -> Result<Sequence<N>, MetapathError> {
    let node_count = items.iter().filter(|item| item.is_node()).count();
    if node_count == 0 {
        return Ok(Sequence::from_vec(items));
    }
    if node_count < items.len() {
        return Err(MetapathError::dynamic(
            ErrorCode::XPTY0018,
            "a path step returned both nodes and non-node items",
        ));
    }
    let nodes = items.iter().filter_map(Item::as_node).copied().collect();
    Ok(node_sequence(into_document_order(nodes)))
}

pub(super) fn evaluate_root_slash_only<'a, N: NodeItem<'a>>(
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    Ok(node_sequence(document_nodes(focus)?))
}

pub(super) fn evaluate_root_slash<'a, N: NodeItem<'a>>(
    step: &Expr,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    apply_step(step, ctx, document_nodes(focus)?)
}

pub(super) fn evaluate_root_double_slash<'a, N: NodeItem<'a>>(
    step: &Expr,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    apply_step(step, ctx, with_descendants(document_nodes(focus)?))
}

pub(super) fn evaluate_relative_slash<'a, N: NodeItem<'a>>(
    left: &Expr,
    right: &Expr,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let nodes = path_operand(&evaluate(left, ctx, focus)?)?;
    apply_step(right, ctx, nodes)
}

pub(super) fn evaluate_relative_double_slash<'a, N: NodeItem<'a>>(
    left: &Expr,
    right: &Expr,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let nodes = path_operand(&evaluate(left, ctx, focus)?)?;
    apply_step(right, ctx, with_descendants(nodes))
}

pub(super) fn evaluate_flag<'a, N: NodeItem<'a>>(
    test: &NameTest,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let mut flags = Vec::new();
    for node in step_focus(focus)? {
        match test {
            NameTest::Name(name) => flags.extend(node.flag_by_name(name)),
            _ => flags.extend(node.flags().filter(|flag| test.matches(flag.qname()))),
        }
    }
    Ok(node_sequence(into_document_order(flags)))
}

pub(super) fn evaluate_model_instance<'a, N: NodeItem<'a>>(
    test: &NameTest,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let mut children = Vec::new();
    for node in step_focus(focus)? {
        match test {
            NameTest::Name(name) => children.extend(node.model_items_by_name(name)),
            _ => children.extend(node.model_items().filter(|child| test.matches(child.qname()))),
        }
    }
    Ok(node_sequence(into_document_order(children)))
}

fn axis_nodes<'a, N: NodeItem<'a>>(node: N, axis: Axis) -> Vec<N> {
    match axis {
        Axis::Child => node.model_items().collect(),
        Axis::Descendant => node.descendants(),
        Axis::DescendantOrSelf => iter::once(node).chain(node.descendants()).collect(),
        Axis::SelfAxis => vec![node],
        Axis::Parent => node.parent().into_iter().collect(),
        Axis::Ancestor => node.ancestors(),
        Axis::AncestorOrSelf => iter::once(node).chain(node.ancestors()).collect(),
        Axis::Flag => node.flags().collect(),
    }
}

/// Name tests select the principal node kind of the axis: flags on the flag
/// axis, fields and assemblies everywhere else.
fn step_matches<'a, N: NodeItem<'a>>(node: &N, axis: Axis, test: &StepTest) -> bool {
    match test {
        StepTest::Kind(kind) => kind.matches(node),
        StepTest::Name(name) => {
            let principal = match axis {
                Axis::Flag => node.node_kind() == NodeKind::Flag,
                _ => node.node_kind().is_model_item(),
            };
            principal && name.matches(node.qname())
        }
    }
}

pub(super) fn evaluate_step<'a, N: NodeItem<'a>>(
    axis: Axis,
    test: &StepTest,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let mut selected = Vec::new();
    for node in step_focus(focus)? {
        selected.extend(
            axis_nodes(node, axis)
                .into_iter()
                .filter(|candidate| step_matches(candidate, axis, test)),
        );
    }
    Ok(node_sequence(into_document_order(selected)))
}

/// Positions on the reverse axes count from the focus outwards.
fn is_reverse_step(expr: &Expr) -> bool {
    match expr {
        Expr::Step { axis, .. } => {
            matches!(axis, Axis::Parent | Axis::Ancestor | Axis::AncestorOrSelf)
        }
        Expr::Filter { base, .. } => is_reverse_step(base),
        _ => false,
    }
}

fn predicate_selects<N>(result: &Sequence<N>, position: usize) -> Result<bool, MetapathError> {
    if let [Item::Atomic(value)] = result.as_slice()
        && value.is_numeric()
    {
        return Ok(value.as_decimal() == Some(Decimal::from(position)));
    }
    result.effective_boolean_value()
}

pub(super) fn evaluate_filter<'a, N: NodeItem<'a>>(
    base: &Expr,
    predicate: &Expr,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let candidates = evaluate(base, ctx, focus)?;
    let reverse = is_reverse_step(base);
    let size = candidates.len();
    let mut selected = Vec::new();
    for (index, item) in candidates.iter().enumerate() {
        let position = if reverse { size - index } else { index + 1 };
        let result = evaluate(predicate, ctx, &Sequence::singleton(item.clone()))?;
        if predicate_selects(&result, position)? {
            selected.push(item.clone());
        }
    }
    Ok(Sequence::from_vec(selected))
}

fn operand_nodes<'a, N: NodeItem<'a>>(
    operand: &Sequence<N>,
    operator: &str,
) -> Result<Vec<N>, MetapathError> {
    operand
        .iter()
        .map(|item| match item {
            Item::Node(node) => Ok(*node),
            other => Err(MetapathError::type_error(format!(
                "operands of '{operator}' must be nodes, found a {}",
                other.kind_name()
            ))),
        })
        .collect()
}

pub(super) fn evaluate_union<'a, N: NodeItem<'a>>(
    operands: &[Expr],
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let mut nodes = Vec::new();
    for operand in operands {
        nodes.extend(operand_nodes(&evaluate(operand, ctx, focus)?, "union")?);
    }
    Ok(node_sequence(into_document_order(nodes)))
}

/// `intersect` when `keep_shared`, `except` otherwise.
pub(super) fn evaluate_node_difference<'a, N: NodeItem<'a>>(
    left: &Expr,
    right: &Expr,
    keep_shared: bool,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let operator = if keep_shared { "intersect" } else { "except" };
    let left = operand_nodes(&evaluate(left, ctx, focus)?, operator)?;
    let right: HashSet<N> = operand_nodes(&evaluate(right, ctx, focus)?, operator)?
        .into_iter()
        .collect();
    let kept = left
        .into_iter()
        .filter(|node| right.contains(node) == keep_shared)
        .collect();
    Ok(node_sequence(into_document_order(kept)))
}

#[cfg(test)]
mod tests {
    use metaschema_model::Node;

    use super::super::test_support::{catalog, eval_on, flag_values};
    use super::*;

    #[test]
    fn test_root_slash_yields_document_node() {
        let doc = catalog();
        let result = eval_on(&doc, "/").unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.first().and_then(Item::as_node), Some(&doc.document_node()));
    }

    #[test]
    fn test_absolute_and_relative_paths() {
        let doc = catalog();
        let titles = eval_on(&doc, "/catalog/group/control/title").unwrap();
        assert_eq!(titles.len(), 2);
        let ids = eval_on(&doc, "/catalog/group/control/@id").unwrap();
        assert_eq!(flag_values(&ids), vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_double_slash_searches_descendants() {
        let doc = catalog();
        assert_eq!(eval_on(&doc, "//control").unwrap().len(), 3);
        assert_eq!(eval_on(&doc, "/catalog//title").unwrap().len(), 3);
        let ids = eval_on(&doc, "//@id").unwrap();
        assert_eq!(flag_values(&ids), vec!["g1", "c1", "c2", "g2", "c3"]);
    }

    #[test]
    fn test_results_are_deduplicated_in_document_order() {
        let doc = catalog();
        let parents = eval_on(&doc, "//control/..").unwrap();
        assert_eq!(parents.len(), 2);
        let nodes: Vec<Node<'_>> = parents.iter().filter_map(Item::as_node).copied().collect();
        assert!(nodes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_wildcards_and_kind_tests() {
        let doc = catalog();
        assert_eq!(eval_on(&doc, "/catalog/*").unwrap().len(), 3);
        assert_eq!(eval_on(&doc, "/catalog/group[1]/@*").unwrap().len(), 1);
        assert_eq!(eval_on(&doc, "//field()").unwrap().len(), 3);
        assert_eq!(eval_on(&doc, "/catalog/child::assembly(group)").unwrap().len(), 2);
        assert_eq!(eval_on(&doc, "//control/flag::id").unwrap().len(), 3);
    }

    #[test]
    fn test_predicates_by_position_and_value() {
        let doc = catalog();
        let second = eval_on(&doc, "//group[1]/control[2]/@id").unwrap();
        assert_eq!(flag_values(&second), vec!["c2"]);
        let matching = eval_on(&doc, "//control[@id = 'c3']/@id").unwrap();
        assert_eq!(flag_values(&matching), vec!["c3"]);
        let with_title = eval_on(&doc, "//control[title]/@id").unwrap();
        assert_eq!(flag_values(&with_title), vec!["c1", "c2"]);
        let nearest = eval_on(&doc, "//control[@id = 'c1']/ancestor::*[1]/@id").unwrap();
        assert_eq!(flag_values(&nearest), vec!["g1"]);
    }

    #[test]
    fn test_node_set_operators() {
        let doc = catalog();
        assert_eq!(eval_on(&doc, "//group | //control").unwrap().len(), 5);
        assert_eq!(eval_on(&doc, "//control intersect //group[1]/control").unwrap().len(), 2);
        assert_eq!(eval_on(&doc, "//control except //group[1]/control").unwrap().len(), 1);
        assert_eq!(
            eval_on(&doc, "(1, 2) union //control").unwrap_err().code(),
            ErrorCode::XPTY0004
        );
    }

    #[test]
    fn test_path_errors() {
        let doc = catalog();
        assert_eq!(eval_on(&doc, "(1, 2)/title").unwrap_err().code(), ErrorCode::XPTY0019);
        assert_eq!(
            eval_on(&doc, "//control/(if (@id = 'c1') then . else 1)")
                .unwrap_err()
                .code(),
            ErrorCode::XPTY0018
        );
        assert_eq!(
            eval_on(&doc, "//control/@id/string()").unwrap().len(),
            3
        );
    }
}
