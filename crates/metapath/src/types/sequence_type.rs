use std::fmt;

use metaschema_model::NodeItem;

use crate::context::StaticContext;
use crate::error::MetapathError;
use crate::item::Sequence;

use super::item_type::ItemType;

/// How many items a sequence type admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occurrence {
    /// `?`
    ZeroOrOne,
    /// no indicator
    One,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
    /// `empty-sequence()`
    Empty,
}

impl Occurrence {
    pub fn from_indicator(indicator: Option<&str>) -> Result<Self, MetapathError> {
        match indicator {
            None | Some("") => Ok(Occurrence::One),
            Some("?") => Ok(Occurrence::ZeroOrOne),
            Some("*") => Ok(Occurrence::ZeroOrMore),
            Some("+") => Ok(Occurrence::OneOrMore),
            Some(other) => Err(MetapathError::syntax(format!(
                "unknown occurrence indicator '{other}'"
            ))),
        }
    }

    pub fn indicator(self) -> &'static str {
        match self {
            Occurrence::ZeroOrOne => "?",
            Occurrence::ZeroOrMore => "*",
            Occurrence::OneOrMore => "+",
            Occurrence::One | Occurrence::Empty => "",
        }
    }

    pub fn allows(self, count: usize) -> bool {
        match self {
            Occurrence::ZeroOrOne => count <= 1,
            Occurrence::One => count == 1,
            Occurrence::ZeroOrMore => true,
            Occurrence::OneOrMore => count >= 1,
            Occurrence::Empty => count == 0,
        }
    }
}

/// An item type with an occurrence indicator, e.g. `meta:string*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceType {
    item_type: ItemType,
    occurrence: Occurrence,
}

impl SequenceType {
    pub fn new(item_type: ItemType, occurrence: Occurrence) -> Self {
        Self {
            item_type,
            occurrence,
        }
    }

    pub fn empty() -> Self {
        Self::new(ItemType::AnyItem, Occurrence::Empty)
    }

    /// `item()*`, the type every sequence matches.
    pub fn any() -> Self {
        Self::new(ItemType::AnyItem, Occurrence::ZeroOrMore)
    }

    pub fn one(item_type: ItemType) -> Self {
        Self::new(item_type, Occurrence::One)
    }

    pub fn item_type(&self) -> &ItemType {
        &self.item_type
    }

    pub fn occurrence(&self) -> Occurrence {
        self.occurrence
    }

    /// Parses a standalone sequence type such as `meta:integer+`.
    pub fn parse(text: &str, context: &StaticContext) -> Result<Self, MetapathError> {
        crate::compiler::compile_sequence_type(text, context)
    }

    pub fn matches<'a, N: NodeItem<'a>>(&self, sequence: &Sequence<N>) -> bool {
        self.occurrence.allows(sequence.len())
            && sequence.iter().all(|item| self.item_type.matches(item))
    }

    pub fn signature(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.occurrence == Occurrence::Empty {
            return f.write_str("empty-sequence()");
        }
        write!(f, "{}{}", self.item_type, self.occurrence.indicator())
    }
}
