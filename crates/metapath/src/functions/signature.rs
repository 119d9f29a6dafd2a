use metaschema_datatypes::{AtomicValue, DataType};
use metaschema_model::NodeItem;
use thiserror::Error;

use crate::error::MetapathError;
use crate::item::{Item, Sequence};
use crate::types::{AtomicOrUnionType, ItemType, Occurrence, SequenceType};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("argument names must not be blank")]
    BlankArgumentName,

    #[error("function '{name}' with arity {arity} is already defined")]
    Duplicate { name: String, arity: usize },
}

/// One declared parameter of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    name: String,
    sequence_type: SequenceType,
}

impl Argument {
    pub fn builder(name: impl Into<String>) -> ArgumentBuilder {
        ArgumentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequence_type(&self) -> &SequenceType {
        &self.sequence_type
    }
}

/// Builds an [`Argument`]. The default type is `item()` with exactly one item.
#[derive(Debug, Clone)]
pub struct ArgumentBuilder {
    name: String,
    item_type: ItemType,
    occurrence: Occurrence,
}

impl ArgumentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            item_type: ItemType::AnyItem,
            occurrence: Occurrence::One,
        }
    }

    pub fn item_type(mut self, item_type: ItemType) -> Self {
        self.item_type = item_type;
        self
    }

    pub fn atomic(self, datatype: DataType) -> Self {
        self.item_type(ItemType::Atomic(AtomicOrUnionType::Leaf(datatype)))
    }

    pub fn any_atomic(self) -> Self {
        self.item_type(ItemType::Atomic(AtomicOrUnionType::AnyAtomic))
    }

    pub fn occurrence(mut self, occurrence: Occurrence) -> Self {
        self.occurrence = occurrence;
        self
    }

    pub fn one(self) -> Self {
        self.occurrence(Occurrence::One)
    }

    pub fn zero_or_one(self) -> Self {
        self.occurrence(Occurrence::ZeroOrOne)
    }

    pub fn zero_or_more(self) -> Self {
        self.occurrence(Occurrence::ZeroOrMore)
    }

    pub fn one_or_more(self) -> Self {
        self.occurrence(Occurrence::OneOrMore)
    }

    pub fn build(self) -> Result<Argument, DefinitionError> {
        if self.name.trim().is_empty() {
            return Err(DefinitionError::BlankArgumentName);
        }
        Ok(Argument {
            name: self.name,
            sequence_type: SequenceType::new(self.item_type, self.occurrence),
        })
    }
}

/// What a function's result may depend on besides its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionProperties {
    /// Repeated calls with the same arguments return the same result.
    pub deterministic: bool,
    /// Reads the dynamic context (clock, timezone, variables).
    pub context_dependent: bool,
    /// Reads the context item.
    pub focus_dependent: bool,
}

impl FunctionProperties {
    pub const PURE: Self = Self {
        deterministic: true,
        context_dependent: false,
        focus_dependent: false,
    };

    pub const FOCUS: Self = Self {
        deterministic: true,
        context_dependent: false,
        focus_dependent: true,
    };

    pub const CONTEXT: Self = Self {
        deterministic: true,
        context_dependent: true,
        focus_dependent: false,
    };

    pub const NONDETERMINISTIC: Self = Self {
        deterministic: false,
        context_dependent: false,
        focus_dependent: false,
    };

    /// Results may be memoized per calling context.
    pub fn is_cacheable(self) -> bool {
        self.deterministic && !self.context_dependent
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    arguments: Vec<Argument>,
    /// The last argument repeats without bound.
    variadic: bool,
    return_type: SequenceType,
    properties: FunctionProperties,
}

impl FunctionSignature {
    pub fn new(
        arguments: Vec<Argument>,
        return_type: SequenceType,
        properties: FunctionProperties,
    ) -> Self {
        Self {
            arguments,
            variadic: false,
            return_type,
            properties,
        }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = !self.arguments.is_empty();
        self
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn return_type(&self) -> &SequenceType {
        &self.return_type
    }

    pub fn properties(&self) -> FunctionProperties {
        self.properties
    }

    pub fn accepts_arity(&self, arity: usize) -> bool {
        if self.variadic {
            arity >= self.arguments.len()
        } else {
            arity == self.arguments.len()
        }
    }

    fn argument_at(&self, index: usize) -> Option<&Argument> {
        self.arguments.get(index).or_else(|| {
            if self.variadic {
                self.arguments.last()
            } else {
                None
            }
        })
    }

    /// Applies the function conversion rules to each argument: atomic
    /// parameters are atomized, then cardinality and item types are checked.
    pub(crate) fn convert_arguments<'a, N: NodeItem<'a>>(
        &self,
        function: &str,
        arguments: Vec<Sequence<N>>,
    ) -> Result<Vec<Sequence<N>>, MetapathError> {
        arguments
            .into_iter()
            .enumerate()
            .map(|(index, value)| match self.argument_at(index) {
                Some(argument) => convert(function, argument, value),
                None => Ok(value),
            })
            .collect()
    }
}

fn convert<'a, N: NodeItem<'a>>(
    function: &str,
    argument: &Argument,
    value: Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let expected = argument.sequence_type();
    let converted = match expected.item_type() {
        ItemType::Atomic(target) => value
            .atomize()?
            .into_iter()
            .map(|v| promote(v, target).map(Item::Atomic))
            .collect::<Result<Sequence<N>, _>>()
            .map_err(|found| {
                MetapathError::type_error(format!(
                    "argument ${} of {function}() expects {}, found {found}",
                    argument.name(),
                    expected
                ))
            })?,
        item_type => {
            if let Some(bad) = value.iter().find(|item| !item_type.matches(*item)) {
                return Err(MetapathError::type_error(format!(
                    "argument ${} of {function}() expects {}, found a {}",
                    argument.name(),
                    expected,
                    bad.kind_name()
                )));
            }
            value
        }
    };
    if !expected.occurrence().allows(converted.len()) {
        return Err(MetapathError::type_error(format!(
            "argument ${} of {function}() expects {}, found {} items",
            argument.name(),
            expected,
            converted.len()
        )));
    }
    Ok(converted)
}

/// Accepts instances of `target`; textual values are promoted to `string`.
fn promote(value: AtomicValue, target: &AtomicOrUnionType) -> Result<AtomicValue, DataType> {
    if target.is_instance(&value) {
        return Ok(value);
    }
    if value.is_textual() && AtomicOrUnionType::Leaf(DataType::String).is_subtype_of(target) {
        return Ok(AtomicValue::string(value.to_string()));
    }
    Err(value.datatype())
}
