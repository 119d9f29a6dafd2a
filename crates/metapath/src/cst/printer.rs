use std::fmt::Write;

use itertools::Itertools;

use super::{Expr, KeySpecifier, Quantifier};

pub(super) fn print(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, 0);
    out
}

fn write_expr(out: &mut String, expr: &Expr, depth: usize) {
    let _ = write!(out, "{:indent$}{}", "", expr.kind_name(), indent = depth * 2);
    if let Some(details) = details(expr) {
        let _ = write!(out, "[{details}]");
    }
    out.push('\n');
    for child in expr.children() {
        write_expr(out, child, depth + 1);
    }
}

fn details(expr: &Expr) -> Option<String> {
    let text = match expr {
        Expr::Literal(value) => format!("{}={}", value.datatype(), value),
        Expr::VariableRef(name) => format!("name={name}"),
        Expr::Flag(test) | Expr::ModelInstance(test) => format!("test={test}"),
        Expr::Step { axis, test } => format!("axis={}, test={test}", axis.name()),
        Expr::GeneralComparison { operator, .. } => {
            format!("operator={}", operator.general_symbol())
        }
        Expr::ValueComparison { operator, .. } => format!("operator={}", operator.value_symbol()),
        Expr::Arithmetic { operator, .. } => format!("operator={}", operator.symbol()),
        Expr::Unary { negate, .. } => format!("operator={}", if *negate { "-" } else { "+" }),
        Expr::InstanceOf { sequence_type, .. } | Expr::Treat { sequence_type, .. } => {
            format!("type={sequence_type}")
        }
        Expr::Cast {
            target,
            allow_empty,
            ..
        }
        | Expr::Castable {
            target,
            allow_empty,
            ..
        } => format!("type={target}{}", if *allow_empty { "?" } else { "" }),
        Expr::FunctionCall { function, arguments } => {
            format!("name={}, arity={}", function.name(), arguments.len())
        }
        Expr::NamedFunctionRef { function, arity } => {
            format!("name={}, arity={arity}", function.name())
        }
        Expr::Lookup { key, .. } | Expr::UnaryLookup(key) => match key {
            KeySpecifier::Wildcard => "key=*".to_string(),
            KeySpecifier::Name(name) => format!("key={name}"),
            KeySpecifier::Integer(index) => format!("key={index}"),
            KeySpecifier::Expr(_) => return None,
        },
        Expr::InlineFunction(function) => {
            let parameters = function
                .parameters
                .iter()
                .map(|(name, t)| format!("${name} as {t}"))
                .join(", ");
            format!("({parameters}) as {}", function.return_type)
        }
        Expr::Let { name, .. } | Expr::For { name, .. } => format!("name={name}"),
        Expr::Quantified {
            quantifier,
            bindings,
            ..
        } => {
            let names = bindings.iter().map(|(n, _)| format!("${n}")).join(", ");
            let q = match quantifier {
                Quantifier::Some => "some",
                Quantifier::Every => "every",
            };
            format!("{q} {names}")
        }
        _ => return None,
    };
    Some(text)
}
