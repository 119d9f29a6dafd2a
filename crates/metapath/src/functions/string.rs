use itertools::Itertools;
use metaschema_datatypes::AtomicValue;
use metaschema_model::NodeItem;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{ErrorCode, MetapathError};
use crate::item::{Item, Sequence};

use super::numeric::round_half_up;
use super::string_arg;

fn string_result<N: Clone>(value: impl Into<String>) -> Sequence<N> {
    Sequence::from_atomic(AtomicValue::string(value))
}

/// The string argument at `index`, or the string value of the context item
/// when the function was called without it.
fn string_or_focus<'a, N: NodeItem<'a>>(
    args: &[Sequence<N>],
    index: usize,
    focus: Option<&Item<N>>,
) -> Result<String, MetapathError> {
    match args.get(index) {
        Some(arg) => match arg.first() {
            Some(item) => item.string_value(),
            None => Ok(String::new()),
        },
        None => focus
            .ok_or_else(MetapathError::context_absent)?
            .string_value(),
    }
}

pub fn fn_string<'a, N: NodeItem<'a>>(
    args: &[Sequence<N>],
    focus: Option<&Item<N>>,
) -> Result<Sequence<N>, MetapathError> {
    Ok(string_result(string_or_focus(args, 0, focus)?))
}

pub fn fn_concat<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    let joined: String = (0..args.len()).map(|i| string_arg(args, i)).collect();
    string_result(joined)
}

pub fn fn_string_length<'a, N: NodeItem<'a>>(
    args: &[Sequence<N>],
    focus: Option<&Item<N>>,
) -> Result<Sequence<N>, MetapathError> {
    let length = string_or_focus(args, 0, focus)?.chars().count();
    Ok(Sequence::from_atomic(AtomicValue::integer(length as i64)))
}

fn rounded<N>(args: &[Sequence<N>], index: usize) -> Option<Decimal> {
    super::atomic_arg(args, index)
        .and_then(AtomicValue::as_decimal)
        .map(round_half_up)
}

/// Characters at 1-based positions `p` with `start <= p < start + length`,
/// both bounds rounded first.
pub fn fn_substring<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    let source = string_arg(args, 0);
    let Some(start) = rounded(args, 1) else {
        return string_result("");
    };
    let end = if args.len() > 2 {
        match rounded(args, 2) {
            Some(length) => Some(start.saturating_add(length)),
            None => return string_result(""),
        }
    } else {
        None
    };
    let result: String = source
        .chars()
        .enumerate()
        .filter(|(index, _)| {
            let position = Decimal::from(*index + 1);
            position >= start && end.is_none_or(|end| position < end)
        })
        .map(|(_, c)| c)
        .collect();
    string_result(result)
}

pub fn fn_contains<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    Sequence::boolean(string_arg(args, 0).contains(&string_arg(args, 1)))
}

pub fn fn_starts_with<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    Sequence::boolean(string_arg(args, 0).starts_with(&string_arg(args, 1)))
}

pub fn fn_ends_with<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    Sequence::boolean(string_arg(args, 0).ends_with(&string_arg(args, 1)))
}

pub fn fn_upper_case<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    string_result(string_arg(args, 0).to_uppercase())
}

pub fn fn_lower_case<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    string_result(string_arg(args, 0).to_lowercase())
}

pub fn fn_normalize_space<'a, N: NodeItem<'a>>(
    args: &[Sequence<N>],
    focus: Option<&Item<N>>,
) -> Result<Sequence<N>, MetapathError> {
    let text = string_or_focus(args, 0, focus)?;
    Ok(string_result(text.split_whitespace().join(" ")))
}

pub fn fn_string_join<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    let separator = string_arg(args, 1);
    let joined = args
        .first()
        .map(|arg| arg.iter().filter_map(Item::as_atomic).join(&separator))
        .unwrap_or_default();
    string_result(joined)
}

pub fn fn_substring_before<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    let source = string_arg(args, 0);
    let search = string_arg(args, 1);
    let before = source
        .find(&search)
        .filter(|_| !search.is_empty())
        .map_or("", |at| &source[..at]);
    string_result(before)
}

pub fn fn_substring_after<N: Clone>(args: &[Sequence<N>]) -> Sequence<N> {
    let source = string_arg(args, 0);
    let search = string_arg(args, 1);
    if search.is_empty() {
        return string_result(source);
    }
    let after = source.find(&search).map_or("", |at| &source[at + search.len()..]);
    string_result(after)
}

fn compile_pattern(pattern: &str) -> Result<Regex, MetapathError> {
    Regex::new(pattern).map_err(|e| {
        MetapathError::dynamic(
            ErrorCode::FORX0002,
            format!("invalid regular expression '{pattern}': {e}"),
        )
    })
}

/// Patterns used to split or rewrite input must consume at least one character.
fn compile_consuming_pattern(pattern: &str) -> Result<Regex, MetapathError> {
    let regex = compile_pattern(pattern)?;
    if regex.is_match("") {
        return Err(MetapathError::dynamic(
            ErrorCode::FORX0003,
            format!("regular expression '{pattern}' matches the empty string"),
        ));
    }
    Ok(regex)
}

pub fn fn_matches<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let regex = compile_pattern(&string_arg(args, 1))?;
    Ok(Sequence::boolean(regex.is_match(&string_arg(args, 0))))
}

/// Rewrites `$n` group references and `\$`, `\\` escapes into the syntax
/// the regex engine expects.
fn replacement_template(replacement: &str) -> Result<String, MetapathError> {
    let mut template = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('$') => template.push_str("$$"),
                Some('\\') => template.push('\\'),
                _ => return Err(invalid_replacement(replacement)),
            },
            '$' => {
                let mut group = String::new();
                while let Some(digit) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    group.push(*digit);
                    chars.next();
                }
                if group.is_empty() {
                    return Err(invalid_replacement(replacement));
                }
                template.push_str(&format!("${{{group}}}"));
            }
            other => template.push(other),
        }
    }
    Ok(template)
}

fn invalid_replacement(replacement: &str) -> MetapathError {
    MetapathError::dynamic(
        ErrorCode::FORX0002,
        format!("invalid replacement string '{replacement}'"),
    )
}

pub fn fn_replace<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let regex = compile_consuming_pattern(&string_arg(args, 1))?;
    let template = replacement_template(&string_arg(args, 2))?;
    let input = string_arg(args, 0);
    Ok(string_result(regex.replace_all(&input, template.as_str())))
}

pub fn fn_tokenize<N: Clone>(args: &[Sequence<N>]) -> Result<Sequence<N>, MetapathError> {
    let input = string_arg(args, 0);
    let tokens: Vec<String> = if args.len() < 2 {
        input.split_whitespace().map(str::to_string).collect()
    } else if input.is_empty() {
        Vec::new()
    } else {
        let regex = compile_consuming_pattern(&string_arg(args, 1))?;
        regex.split(&input).map(str::to_string).collect()
    };
    Ok(tokens
        .into_iter()
        .map(|t| Item::Atomic(AtomicValue::string(t)))
        .collect())
}
