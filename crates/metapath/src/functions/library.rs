use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use metaschema_datatypes::DataType;
use metaschema_model::QName;

use crate::types::{AtomicOrUnionType, ItemType, KindTest, Occurrence, SequenceType};

use super::signature::{ArgumentBuilder, DefinitionError, FunctionProperties, FunctionSignature};
use super::{Family, FunctionDef};

static STANDARD: LazyLock<Arc<FunctionLibrary>> = LazyLock::new(|| {
    let mut library = FunctionLibrary::new();
    for function in standard_functions().expect("BUG: invalid built-in function definition") {
        library
            .register(Arc::new(function))
            .expect("BUG: duplicate built-in function definition");
    }
    Arc::new(library)
});

/// Functions addressable by `(name, arity)`.
#[derive(Debug, Default, Clone)]
pub struct FunctionLibrary {
    functions: HashMap<QName, Vec<Arc<FunctionDef>>>,
}

impl FunctionLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in `fn`, `map` and `array` functions, shared process-wide.
    pub fn standard() -> Arc<FunctionLibrary> {
        Arc::clone(&STANDARD)
    }

    /// Adds a function; its arities must not overlap an existing overload.
    pub fn register(&mut self, function: Arc<FunctionDef>) -> Result<(), DefinitionError> {
        let overloads = self.functions.entry(function.name().clone()).or_default();
        let signature = function.signature();
        let min_arity = signature.arguments().len();
        if let Some(clash) = overloads.iter().find(|existing| {
            existing.signature().accepts_arity(min_arity)
                || (signature.is_variadic()
                    && existing.signature().arguments().len() >= min_arity)
        }) {
            return Err(DefinitionError::Duplicate {
                name: clash.name().to_string(),
                arity: min_arity,
            });
        }
        overloads.push(function);
        Ok(())
    }

    pub fn lookup(&self, name: &QName, arity: usize) -> Option<Arc<FunctionDef>> {
        self.functions
            .get(name)?
            .iter()
            .find(|f| f.signature().accepts_arity(arity))
            .cloned()
    }

    pub fn functions(&self) -> impl Iterator<Item = &Arc<FunctionDef>> {
        self.functions.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.functions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

fn atomic(datatype: DataType) -> ItemType {
    ItemType::Atomic(AtomicOrUnionType::Leaf(datatype))
}

fn any_atomic() -> ItemType {
    ItemType::Atomic(AtomicOrUnionType::AnyAtomic)
}

fn numeric() -> ItemType {
    ItemType::Atomic(AtomicOrUnionType::Numeric)
}

fn node() -> ItemType {
    ItemType::Kind(KindTest::AnyNode)
}

fn one(item_type: ItemType) -> SequenceType {
    SequenceType::new(item_type, Occurrence::One)
}

fn optional(item_type: ItemType) -> SequenceType {
    SequenceType::new(item_type, Occurrence::ZeroOrOne)
}

fn many(item_type: ItemType) -> SequenceType {
    SequenceType::new(item_type, Occurrence::ZeroOrMore)
}

fn arg(name: &str) -> ArgumentBuilder {
    ArgumentBuilder::new(name)
}

/// Collects definitions; arguments are validated as they are added.
struct Definitions {
    family: Family,
    functions: Vec<FunctionDef>,
}

impl Definitions {
    fn define(
        &mut self,
        name: &str,
        arguments: Vec<ArgumentBuilder>,
        return_type: SequenceType,
        properties: FunctionProperties,
    ) -> Result<&mut Self, DefinitionError> {
        let arguments = arguments
            .into_iter()
            .map(ArgumentBuilder::build)
            .collect::<Result<Vec<_>, _>>()?;
        self.functions.push(FunctionDef::new(
            self.family,
            name,
            FunctionSignature::new(arguments, return_type, properties),
        ));
        Ok(self)
    }

    fn define_variadic(
        &mut self,
        name: &str,
        arguments: Vec<ArgumentBuilder>,
        return_type: SequenceType,
    ) -> Result<&mut Self, DefinitionError> {
        self.define(name, arguments, return_type, FunctionProperties::PURE)?;
        if let Some(last) = self.functions.pop() {
            let signature = last.signature().clone().variadic();
            self.functions.push(FunctionDef::new(self.family, name, signature));
        }
        Ok(self)
    }

    /// `name#0` reading the context item and `name#1` taking it explicitly.
    fn define_focus_pair(
        &mut self,
        name: &str,
        argument: ArgumentBuilder,
        return_type: SequenceType,
    ) -> Result<&mut Self, DefinitionError> {
        self.define(name, vec![], return_type.clone(), FunctionProperties::FOCUS)?
            .define(name, vec![argument], return_type, FunctionProperties::PURE)
    }
}

fn standard_functions() -> Result<Vec<FunctionDef>, DefinitionError> {
    use FunctionProperties as P;

    let string = || atomic(DataType::String);
    let boolean = || one(atomic(DataType::Boolean));
    let integer = || atomic(DataType::Integer);
    let items = || arg("arg").zero_or_more();
    let optional_string = |name: &str| arg(name).atomic(DataType::String).zero_or_one();
    let optional_node = || arg("arg").item_type(node()).zero_or_one();

    let mut fns = Definitions {
        family: Family::Fn,
        functions: Vec::new(),
    };
    fns.define("true", vec![], boolean(), P::PURE)?
        .define("false", vec![], boolean(), P::PURE)?
        .define("not", vec![items()], boolean(), P::PURE)?
        .define("boolean", vec![items()], boolean(), P::PURE)?;

    fns.define("count", vec![items()], one(integer()), P::PURE)?
        .define("empty", vec![items()], boolean(), P::PURE)?
        .define("exists", vec![items()], boolean(), P::PURE)?
        .define("head", vec![items()], optional(ItemType::AnyItem), P::PURE)?
        .define("tail", vec![items()], SequenceType::any(), P::PURE)?
        .define("reverse", vec![items()], SequenceType::any(), P::PURE)?
        .define(
            "distinct-values",
            vec![arg("arg").any_atomic().zero_or_more()],
            many(any_atomic()),
            P::PURE,
        )?
        .define(
            "subsequence",
            vec![arg("source").zero_or_more(), arg("start").item_type(numeric())],
            SequenceType::any(),
            P::PURE,
        )?
        .define(
            "subsequence",
            vec![
                arg("source").zero_or_more(),
                arg("start").item_type(numeric()),
                arg("length").item_type(numeric()),
            ],
            SequenceType::any(),
            P::PURE,
        )?
        .define(
            "insert-before",
            vec![
                arg("target").zero_or_more(),
                arg("position").item_type(integer()),
                arg("inserts").zero_or_more(),
            ],
            SequenceType::any(),
            P::PURE,
        )?
        .define(
            "remove",
            vec![arg("target").zero_or_more(), arg("position").item_type(integer())],
            SequenceType::any(),
            P::PURE,
        )?
        .define(
            "index-of",
            vec![arg("seq").any_atomic().zero_or_more(), arg("search").any_atomic()],
            many(integer()),
            P::PURE,
        )?
        .define("zero-or-one", vec![items()], optional(ItemType::AnyItem), P::PURE)?
        .define(
            "one-or-more",
            vec![items()],
            SequenceType::new(ItemType::AnyItem, Occurrence::OneOrMore),
            P::PURE,
        )?
        .define("exactly-one", vec![items()], one(ItemType::AnyItem), P::PURE)?
        .define_focus_pair("data", items(), many(any_atomic()))?;

    fns.define_focus_pair("string", arg("arg").zero_or_one(), one(string()))?
        .define_variadic("concat", vec![
            arg("arg").any_atomic().zero_or_one(),
            arg("arg").any_atomic().zero_or_one(),
        ], one(string()))?
        .define_focus_pair("string-length", optional_string("arg"), one(integer()))?
        .define(
            "substring",
            vec![optional_string("source"), arg("start").item_type(numeric())],
            one(string()),
            P::PURE,
        )?
        .define(
            "substring",
            vec![
                optional_string("source"),
                arg("start").item_type(numeric()),
                arg("length").item_type(numeric()),
            ],
            one(string()),
            P::PURE,
        )?;
    for name in ["contains", "starts-with", "ends-with"] {
        fns.define(
            name,
            vec![optional_string("arg1"), optional_string("arg2")],
            boolean(),
            P::PURE,
        )?;
    }
    for name in ["substring-before", "substring-after"] {
        fns.define(
            name,
            vec![optional_string("arg1"), optional_string("arg2")],
            one(string()),
            P::PURE,
        )?;
    }
    fns.define("upper-case", vec![optional_string("arg")], one(string()), P::PURE)?
        .define("lower-case", vec![optional_string("arg")], one(string()), P::PURE)?
        .define_focus_pair("normalize-space", optional_string("arg"), one(string()))?
        .define(
            "string-join",
            vec![arg("arg").any_atomic().zero_or_more()],
            one(string()),
            P::PURE,
        )?
        .define(
            "string-join",
            vec![
                arg("arg").any_atomic().zero_or_more(),
                arg("separator").atomic(DataType::String),
            ],
            one(string()),
            P::PURE,
        )?
        .define(
            "matches",
            vec![optional_string("input"), arg("pattern").atomic(DataType::String)],
            boolean(),
            P::PURE,
        )?
        .define(
            "replace",
            vec![
                optional_string("input"),
                arg("pattern").atomic(DataType::String),
                arg("replacement").atomic(DataType::String),
            ],
            one(string()),
            P::PURE,
        )?
        .define("tokenize", vec![optional_string("input")], many(string()), P::PURE)?
        .define(
            "tokenize",
            vec![optional_string("input"), arg("pattern").atomic(DataType::String)],
            many(string()),
            P::PURE,
        )?;

    for name in ["abs", "ceiling", "floor", "round"] {
        fns.define(
            name,
            vec![arg("arg").item_type(numeric()).zero_or_one()],
            optional(numeric()),
            P::PURE,
        )?;
    }
    fns.define(
        "sum",
        vec![arg("arg").any_atomic().zero_or_more()],
        one(any_atomic()),
        P::PURE,
    )?;
    for name in ["avg", "min", "max"] {
        fns.define(
            name,
            vec![arg("arg").any_atomic().zero_or_more()],
            optional(any_atomic()),
            P::PURE,
        )?;
    }

    for name in ["name", "local-name", "namespace-uri"] {
        fns.define_focus_pair(name, optional_node(), one(string()))?;
    }
    fns.define_focus_pair("path", optional_node(), optional(string()))?
        .define_focus_pair("root", optional_node(), optional(node()))?
        .define_focus_pair("base-uri", optional_node(), optional(atomic(DataType::UriReference)))?
        .define_focus_pair(
            "document-uri",
            optional_node(),
            optional(atomic(DataType::UriReference)),
        )?
        .define_focus_pair("has-children", optional_node(), boolean())?;

    fns.define(
        "current-date-time",
        vec![],
        one(atomic(DataType::DateTimeWithTimezone)),
        P::CONTEXT,
    )?
    .define(
        "current-date",
        vec![],
        one(atomic(DataType::DateWithTimezone)),
        P::CONTEXT,
    )?
    .define(
        "implicit-timezone",
        vec![],
        one(atomic(DataType::DayTimeDuration)),
        P::CONTEXT,
    )?;
    for name in ["year-from-date", "month-from-date", "day-from-date"] {
        fns.define(
            name,
            vec![arg("arg").atomic(DataType::Date).zero_or_one()],
            optional(integer()),
            P::PURE,
        )?;
    }

    fns.define("error", vec![], SequenceType::empty(), P::NONDETERMINISTIC)?
        .define(
            "error",
            vec![optional_string("code")],
            SequenceType::empty(),
            P::NONDETERMINISTIC,
        )?
        .define(
            "error",
            vec![optional_string("code"), arg("description").atomic(DataType::String)],
            SequenceType::empty(),
            P::NONDETERMINISTIC,
        )?;

    let map_arg = || arg("map").item_type(ItemType::AnyMap);
    let key_arg = || arg("key").any_atomic();
    let mut maps = Definitions {
        family: Family::Map,
        functions: Vec::new(),
    };
    maps.define("size", vec![map_arg()], one(integer()), P::PURE)?
        .define("keys", vec![map_arg()], many(any_atomic()), P::PURE)?
        .define("contains", vec![map_arg(), key_arg()], boolean(), P::PURE)?
        .define("get", vec![map_arg(), key_arg()], SequenceType::any(), P::PURE)?
        .define(
            "put",
            vec![map_arg(), key_arg(), arg("value").zero_or_more()],
            one(ItemType::AnyMap),
            P::PURE,
        )?
        .define(
            "remove",
            vec![map_arg(), arg("keys").any_atomic().zero_or_more()],
            one(ItemType::AnyMap),
            P::PURE,
        )?
        .define(
            "entry",
            vec![key_arg(), arg("value").zero_or_more()],
            one(ItemType::AnyMap),
            P::PURE,
        )?
        .define(
            "merge",
            vec![arg("maps").item_type(ItemType::AnyMap).zero_or_more()],
            one(ItemType::AnyMap),
            P::PURE,
        )?
        .define(
            "merge",
            vec![
                arg("maps").item_type(ItemType::AnyMap).zero_or_more(),
                arg("options").item_type(ItemType::AnyMap),
            ],
            one(ItemType::AnyMap),
            P::PURE,
        )?;

    let array_arg = || arg("array").item_type(ItemType::AnyArray);
    let position = || arg("position").item_type(integer());
    let array = || one(ItemType::AnyArray);
    let mut arrays = Definitions {
        family: Family::Array,
        functions: Vec::new(),
    };
    arrays
        .define("size", vec![array_arg()], one(integer()), P::PURE)?
        .define("get", vec![array_arg(), position()], SequenceType::any(), P::PURE)?
        .define(
            "put",
            vec![array_arg(), position(), arg("member").zero_or_more()],
            array(),
            P::PURE,
        )?
        .define(
            "append",
            vec![array_arg(), arg("appendage").zero_or_more()],
            array(),
            P::PURE,
        )?
        .define("head", vec![array_arg()], SequenceType::any(), P::PURE)?
        .define("tail", vec![array_arg()], array(), P::PURE)?
        .define(
            "subarray",
            vec![array_arg(), arg("start").item_type(integer())],
            array(),
            P::PURE,
        )?
        .define(
            "subarray",
            vec![
                array_arg(),
                arg("start").item_type(integer()),
                arg("length").item_type(integer()),
            ],
            array(),
            P::PURE,
        )?
        .define(
            "remove",
            vec![array_arg(), arg("positions").item_type(integer()).zero_or_more()],
            array(),
            P::PURE,
        )?
        .define(
            "insert-before",
            vec![array_arg(), position(), arg("member").zero_or_more()],
            array(),
            P::PURE,
        )?
        .define("reverse", vec![array_arg()], array(), P::PURE)?
        .define(
            "join",
            vec![arg("arrays").item_type(ItemType::AnyArray).zero_or_more()],
            array(),
            P::PURE,
        )?
        .define("flatten", vec![items()], SequenceType::any(), P::PURE)?;

    let mut functions = fns.functions;
    functions.extend(maps.functions);
    functions.extend(arrays.functions);
    Ok(functions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces;

    fn fn_name(local: &str) -> QName {
        QName::namespaced(namespaces::FUNCTIONS, local)
    }

    #[test]
    fn test_lookup_by_name_and_arity() {
        let library = FunctionLibrary::standard();
        assert!(library.lookup(&fn_name("substring"), 2).is_some());
        assert!(library.lookup(&fn_name("substring"), 3).is_some());
        assert!(library.lookup(&fn_name("substring"), 4).is_none());
        assert!(library.lookup(&fn_name("no-such-function"), 0).is_none());
    }

    #[test]
    fn test_variadic_concat() {
        let library = FunctionLibrary::standard();
        assert!(library.lookup(&fn_name("concat"), 1).is_none());
        assert!(library.lookup(&fn_name("concat"), 2).is_some());
        assert!(library.lookup(&fn_name("concat"), 9).is_some());
    }

    #[test]
    fn test_focus_pairs_have_distinct_properties() {
        let library = FunctionLibrary::standard();
        let zero = library.lookup(&fn_name("string"), 0).unwrap();
        let one = library.lookup(&fn_name("string"), 1).unwrap();
        assert!(zero.signature().properties().focus_dependent);
        assert!(!one.signature().properties().focus_dependent);
    }

    #[test]
    fn test_map_and_array_namespaces() {
        let library = FunctionLibrary::standard();
        let size = QName::namespaced(namespaces::MAP_FUNCTIONS, "size");
        assert!(library.lookup(&size, 1).is_some());
        let flatten = QName::namespaced(namespaces::ARRAY_FUNCTIONS, "flatten");
        assert!(library.lookup(&flatten, 1).is_some());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let library = FunctionLibrary::standard();
        let existing = library.lookup(&fn_name("count"), 1).unwrap();
        let mut copy = FunctionLibrary::new();
        copy.register(Arc::clone(&existing)).unwrap();
        assert!(matches!(
            copy.register(existing),
            Err(DefinitionError::Duplicate { arity: 1, .. })
        ));
        assert_eq!(copy.len(), 1);
    }
}
