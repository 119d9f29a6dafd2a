//! Built-in functions: definitions, the library that resolves them by
//! name and arity, and their implementations.

mod array;
mod boolean;
mod datetime;
mod error;
mod library;
mod map;
mod node;
mod numeric;
mod sequence;
mod signature;
mod string;

use metaschema_datatypes::AtomicValue;
use metaschema_model::{NodeItem, QName};

use crate::context::{CallingContext, DynamicContext};
use crate::error::{ErrorCode, MetapathError};
use crate::item::{Item, Sequence};
use crate::namespaces;

pub use library::FunctionLibrary;
pub use signature::{
    Argument, ArgumentBuilder, DefinitionError, FunctionProperties, FunctionSignature,
};

/// The namespace a built-in lives in; selects its implementation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Family {
    Fn,
    Map,
    Array,
}

impl Family {
    fn namespace(self) -> &'static str {
        match self {
            Family::Fn => namespaces::FUNCTIONS,
            Family::Map => namespaces::MAP_FUNCTIONS,
            Family::Array => namespaces::ARRAY_FUNCTIONS,
        }
    }
}

/// A resolved built-in function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    name: QName,
    family: Family,
    signature: FunctionSignature,
}

impl FunctionDef {
    pub(crate) fn new(family: Family, local_name: &str, signature: FunctionSignature) -> Self {
        Self {
            name: QName::namespaced(family.namespace(), local_name),
            family,
            signature,
        }
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn signature(&self) -> &FunctionSignature {
        &self.signature
    }
}

/// Calls a built-in: converts the arguments, then answers from the
/// function-result cache when the function's properties allow it.
pub(crate) fn invoke<'a, N: NodeItem<'a>>(
    function: &FunctionDef,
    arguments: Vec<Sequence<N>>,
    ctx: &DynamicContext<N>,
    focus: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let signature = function.signature();
    if !signature.accepts_arity(arguments.len()) {
        return Err(MetapathError::type_error(format!(
            "{}() does not accept {} arguments",
            function.name(),
            arguments.len()
        )));
    }
    let arguments = signature.convert_arguments(function.name().local_name(), arguments)?;
    let properties = signature.properties();
    let context_item = if properties.focus_dependent {
        Some(
            focus
                .first_item(true)?
                .cloned()
                .ok_or_else(MetapathError::context_absent)?,
        )
    } else {
        None
    };

    if !properties.is_cacheable() {
        return call(function, &arguments, ctx, context_item.as_ref());
    }
    let key = CallingContext::new(function.name().clone(), arguments, context_item);
    if let Some(result) = ctx.cached_result(&key) {
        return Ok(result);
    }
    let result = call(function, key.arguments(), ctx, key.context_item())?;
    ctx.cache_result(key, result.clone());
    Ok(result)
}

fn call<'a, N: NodeItem<'a>>(
    function: &FunctionDef,
    args: &[Sequence<N>],
    ctx: &DynamicContext<N>,
    focus: Option<&Item<N>>,
) -> Result<Sequence<N>, MetapathError> {
    let local = function.name().local_name();
    match (function.family, local) {
        (Family::Fn, "true") => Ok(boolean::fn_true()),
        (Family::Fn, "false") => Ok(boolean::fn_false()),
        (Family::Fn, "not") => boolean::fn_not(args),
        (Family::Fn, "boolean") => boolean::fn_boolean(args),

        (Family::Fn, "count") => Ok(sequence::fn_count(args)),
        (Family::Fn, "empty") => Ok(sequence::fn_empty(args)),
        (Family::Fn, "exists") => Ok(sequence::fn_exists(args)),
        (Family::Fn, "head") => Ok(sequence::fn_head(args)),
        (Family::Fn, "tail") => Ok(sequence::fn_tail(args)),
        (Family::Fn, "reverse") => Ok(sequence::fn_reverse(args)),
        (Family::Fn, "distinct-values") => Ok(sequence::fn_distinct_values(args)),
        (Family::Fn, "subsequence") => Ok(sequence::fn_subsequence(args)),
        (Family::Fn, "insert-before") => Ok(sequence::fn_insert_before(args)),
        (Family::Fn, "remove") => Ok(sequence::fn_remove(args)),
        (Family::Fn, "index-of") => Ok(sequence::fn_index_of(args)),
        (Family::Fn, "zero-or-one") => sequence::fn_zero_or_one(args),
        (Family::Fn, "one-or-more") => sequence::fn_one_or_more(args),
        (Family::Fn, "exactly-one") => sequence::fn_exactly_one(args),
        (Family::Fn, "data") => sequence::fn_data(args, focus),

        (Family::Fn, "string") => string::fn_string(args, focus),
        (Family::Fn, "concat") => Ok(string::fn_concat(args)),
        (Family::Fn, "string-length") => string::fn_string_length(args, focus),
        (Family::Fn, "substring") => Ok(string::fn_substring(args)),
        (Family::Fn, "contains") => Ok(string::fn_contains(args)),
        (Family::Fn, "starts-with") => Ok(string::fn_starts_with(args)),
        (Family::Fn, "ends-with") => Ok(string::fn_ends_with(args)),
        (Family::Fn, "upper-case") => Ok(string::fn_upper_case(args)),
        (Family::Fn, "lower-case") => Ok(string::fn_lower_case(args)),
        (Family::Fn, "normalize-space") => string::fn_normalize_space(args, focus),
        (Family::Fn, "string-join") => Ok(string::fn_string_join(args)),
        (Family::Fn, "substring-before") => Ok(string::fn_substring_before(args)),
        (Family::Fn, "substring-after") => Ok(string::fn_substring_after(args)),
        (Family::Fn, "matches") => string::fn_matches(args),
        (Family::Fn, "replace") => string::fn_replace(args),
        (Family::Fn, "tokenize") => string::fn_tokenize(args),

        (Family::Fn, "abs") => numeric::fn_abs(args),
        (Family::Fn, "ceiling") => numeric::fn_ceiling(args),
        (Family::Fn, "floor") => numeric::fn_floor(args),
        (Family::Fn, "round") => numeric::fn_round(args),
        (Family::Fn, "sum") => numeric::fn_sum(args),
        (Family::Fn, "avg") => numeric::fn_avg(args),
        (Family::Fn, "min") => numeric::fn_min(args),
        (Family::Fn, "max") => numeric::fn_max(args),

        (Family::Fn, "name") => node::fn_name(args, focus),
        (Family::Fn, "local-name") => node::fn_local_name(args, focus),
        (Family::Fn, "namespace-uri") => node::fn_namespace_uri(args, focus),
        (Family::Fn, "path") => node::fn_path(args, focus),
        (Family::Fn, "root") => node::fn_root(args, focus),
        (Family::Fn, "base-uri") => node::fn_base_uri(args, focus),
        (Family::Fn, "document-uri") => node::fn_document_uri(args, focus),
        (Family::Fn, "has-children") => node::fn_has_children(args, focus),

        (Family::Fn, "current-date-time") => datetime::fn_current_date_time(ctx),
        (Family::Fn, "current-date") => datetime::fn_current_date(ctx),
        (Family::Fn, "implicit-timezone") => Ok(datetime::fn_implicit_timezone(ctx)),
        (Family::Fn, "year-from-date") => datetime::fn_year_from_date(args),
        (Family::Fn, "month-from-date") => datetime::fn_month_from_date(args),
        (Family::Fn, "day-from-date") => datetime::fn_day_from_date(args),

        (Family::Fn, "error") => error::fn_error(args),

        (Family::Map, "size") => map::map_size(args),
        (Family::Map, "keys") => map::map_keys(args),
        (Family::Map, "contains") => map::map_contains(args),
        (Family::Map, "get") => map::map_get(args),
        (Family::Map, "put") => map::map_put(args),
        (Family::Map, "remove") => map::map_remove(args),
        (Family::Map, "entry") => map::map_entry(args),
        (Family::Map, "merge") => map::map_merge(args),

        (Family::Array, "size") => array::array_size(args),
        (Family::Array, "get") => array::array_get(args),
        (Family::Array, "put") => array::array_put(args),
        (Family::Array, "append") => array::array_append(args),
        (Family::Array, "head") => array::array_head(args),
        (Family::Array, "tail") => array::array_tail(args),
        (Family::Array, "subarray") => array::array_subarray(args),
        (Family::Array, "remove") => array::array_remove(args),
        (Family::Array, "insert-before") => array::array_insert_before(args),
        (Family::Array, "reverse") => array::array_reverse(args),
        (Family::Array, "join") => array::array_join(args),
        (Family::Array, "flatten") => Ok(array::array_flatten(args)),

        _ => Err(MetapathError::static_error(
            ErrorCode::XPST0017,
            format!("function {} has no implementation", function.name()),
        )),
    }
}

/// The atomic value of an already converted, optional argument.
fn atomic_arg<N>(args: &[Sequence<N>], index: usize) -> Option<&AtomicValue> {
    args.get(index)?.first()?.as_atomic()
}

/// String argument; the empty sequence reads as the empty string.
fn string_arg<N>(args: &[Sequence<N>], index: usize) -> String {
    atomic_arg(args, index)
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn integer_arg<N>(args: &[Sequence<N>], index: usize) -> Result<i64, MetapathError> {
    atomic_arg(args, index)
        .and_then(AtomicValue::as_integer)
        .ok_or_else(|| MetapathError::type_error(format!("argument {} must be an integer", index + 1)))
}

/// The node argument at `index`, or the context node when the function was
/// called without it.
fn node_arg<'a, N: NodeItem<'a>>(
    args: &[Sequence<N>],
    index: usize,
    focus: Option<&Item<N>>,
) -> Result<Option<N>, MetapathError> {
    let item = match args.get(index) {
        Some(arg) => arg.first(),
        None => Some(focus.ok_or_else(MetapathError::context_absent)?),
    };
    match item {
        None => Ok(None),
        Some(Item::Node(node)) => Ok(Some(*node)),
        Some(other) => Err(MetapathError::type_error(format!(
            "expected a node but found a {}",
            other.kind_name()
        ))),
    }
}
