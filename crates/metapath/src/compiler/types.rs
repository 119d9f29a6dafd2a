//! Sequence types, item types and kind tests.
//!
//! Item types and kind tests are compiled through handler tables keyed by
//! the parse rule, so a new type form only adds an entry.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::{ErrorCode, MetapathError};
use crate::parser::{ParseNode, Rule};
use crate::types::{
    AtomicOrUnionType, ItemType, KindTest, NameTest, Occurrence, SequenceType, lookup_atomic_type,
};

use super::Compiler;

type ItemTypeHandler = fn(&Compiler<'_>, &ParseNode) -> Result<ItemType, MetapathError>;
type KindTestHandler = fn(&Compiler<'_>, &ParseNode) -> Result<KindTest, MetapathError>;

static ITEM_TYPE_HANDLERS: LazyLock<HashMap<Rule, ItemTypeHandler>> = LazyLock::new(|| {
    let mut handlers: HashMap<Rule, ItemTypeHandler> = HashMap::new();
    handlers.insert(Rule::AnyItemType, |_, _| Ok(ItemType::AnyItem));
    handlers.insert(Rule::AtomicType, |c, node| {
        Ok(ItemType::Atomic(c.atomic_type(node)?))
    });
    for rule in [
        Rule::AnyKindTest,
        Rule::DocumentTest,
        Rule::AssemblyTest,
        Rule::FieldTest,
        Rule::FlagTest,
    ] {
        handlers.insert(rule, |c, node| Ok(ItemType::Kind(c.kind_test(node)?)));
    }
    handlers.insert(Rule::AnyMapTest, |_, _| Ok(ItemType::AnyMap));
    handlers.insert(Rule::TypedMapTest, |c, node| {
        Ok(ItemType::Map {
            key: c.atomic_type(node.child(0)?)?,
            value: Box::new(c.sequence_type(node.child(1)?)?),
        })
    });
    handlers.insert(Rule::AnyArrayTest, |_, _| Ok(ItemType::AnyArray));
    handlers.insert(Rule::TypedArrayTest, |c, node| {
        Ok(ItemType::Array(Box::new(c.sequence_type(node.child(0)?)?)))
    });
    handlers.insert(Rule::AnyFunctionTest, |_, _| Ok(ItemType::AnyFunction));
    handlers.insert(Rule::TypedFunctionTest, |_, _| {
        Err(MetapathError::not_supported(
            "function tests with argument types are not supported; use function(*)",
        ))
    });
    handlers
});

static KIND_TEST_HANDLERS: LazyLock<HashMap<Rule, KindTestHandler>> = LazyLock::new(|| {
    let mut handlers: HashMap<Rule, KindTestHandler> = HashMap::new();
    handlers.insert(Rule::AnyKindTest, |_, _| Ok(KindTest::AnyNode));
    handlers.insert(Rule::DocumentTest, |c, node| {
        let root = match node.children().first() {
            Some(inner) => Some(Box::new(c.kind_test(inner)?)),
            None => None,
        };
        Ok(KindTest::Document(root))
    });
    handlers.insert(Rule::AssemblyTest, |c, node| {
        let default = c.context().default_model_namespace();
        Ok(KindTest::Assembly(c.name_test(node.text(), default)?))
    });
    handlers.insert(Rule::FieldTest, |c, node| {
        let default = c.context().default_model_namespace();
        Ok(KindTest::Field {
            name: c.name_test(node.text(), default)?,
            value_type: c.value_type(node)?,
        })
    });
    handlers.insert(Rule::FlagTest, |c, node| {
        Ok(KindTest::Flag {
            name: c.name_test(node.text(), None)?,
            value_type: c.value_type(node)?,
        })
    });
    handlers
});

impl Compiler<'_> {
    pub(crate) fn sequence_type(&self, node: &ParseNode) -> Result<SequenceType, MetapathError> {
        match node.rule() {
            Rule::EmptySequenceType => Ok(SequenceType::empty()),
            Rule::SequenceType => {
                let item_type = self.item_type(node.child(0)?)?;
                let indicator = node.find_child(Rule::Occurrence).map(ParseNode::text);
                Ok(SequenceType::new(
                    item_type,
                    Occurrence::from_indicator(indicator)?,
                ))
            }
            other => Err(MetapathError::syntax(format!(
                "{other:?} is not a sequence type"
            ))),
        }
    }

    pub(crate) fn item_type(&self, node: &ParseNode) -> Result<ItemType, MetapathError> {
        let handler = ITEM_TYPE_HANDLERS.get(&node.rule()).ok_or_else(|| {
            MetapathError::syntax(format!("{:?} is not an item type", node.rule()))
        })?;
        handler(self, node)
    }

    pub(crate) fn kind_test(&self, node: &ParseNode) -> Result<KindTest, MetapathError> {
        let handler = KIND_TEST_HANDLERS.get(&node.rule()).ok_or_else(|| {
            MetapathError::syntax(format!("{:?} is not a kind test", node.rule()))
        })?;
        handler(self, node)
    }

    fn atomic_type(&self, node: &ParseNode) -> Result<AtomicOrUnionType, MetapathError> {
        lookup_atomic_type(&self.context().expand_type_name(node.text())?)
    }

    fn value_type(&self, node: &ParseNode) -> Result<Option<AtomicOrUnionType>, MetapathError> {
        node.find_child(Rule::AtomicType)
            .map(|t| self.atomic_type(t))
            .transpose()
    }

    /// Wildcard forms (`*`, `*:local`, `prefix:*`, `Q{uri}*`) or a name.
    pub(crate) fn name_test(
        &self,
        text: &str,
        default_namespace: Option<&str>,
    ) -> Result<NameTest, MetapathError> {
        if text == "*" {
            return Ok(NameTest::Any);
        }
        if let Some(local) = text.strip_prefix("*:") {
            return Ok(NameTest::AnyNamespace(local.to_string()));
        }
        if let Some(uri) = text
            .strip_prefix("Q{")
            .and_then(|rest| rest.strip_suffix("}*"))
        {
            let namespace = (!uri.is_empty()).then(|| uri.to_string());
            return Ok(NameTest::AnyLocalName(namespace));
        }
        if let Some(prefix) = text.strip_suffix(":*") {
            let uri = self.context().namespace_for_prefix(prefix).ok_or_else(|| {
                MetapathError::static_error(
                    ErrorCode::XPST0081,
                    format!("namespace prefix '{prefix}' is not bound"),
                )
            })?;
            return Ok(NameTest::AnyLocalName(Some(uri.to_string())));
        }
        Ok(NameTest::Name(
            self.context().expand_name(text, default_namespace)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use metaschema_datatypes::DataType;
    use metaschema_model::QName;

    use crate::context::StaticContext;
    use crate::error::ErrorCode;
    use crate::types::{AtomicOrUnionType, ItemType, KindTest, NameTest, Occurrence, SequenceType};

    fn parse(text: &str) -> Result<SequenceType, crate::error::MetapathError> {
        SequenceType::parse(text, &StaticContext::default())
    }

    #[test]
    fn test_occurrence_round_trip() {
        for text in ["meta:string", "meta:string?", "meta:string*", "meta:string+"] {
            let parsed = parse(text).unwrap();
            let reparsed = parse(&parsed.signature()).unwrap();
            assert_eq!(parsed, reparsed, "{text}");
        }
        assert_eq!(parse("item()+").unwrap().occurrence(), Occurrence::OneOrMore);
        assert_eq!(parse("empty-sequence()").unwrap(), SequenceType::empty());
    }

    #[test]
    fn test_unprefixed_types_use_type_namespace() {
        let parsed = parse("integer").unwrap();
        assert_eq!(
            parsed.item_type(),
            &ItemType::Atomic(AtomicOrUnionType::Leaf(DataType::Integer))
        );
    }

    #[test]
    fn test_map_and_array_tests() {
        let parsed = parse("map(meta:string, array(meta:integer*))").unwrap();
        let ItemType::Map { key, value } = parsed.item_type() else {
            panic!("expected a map test");
        };
        assert_eq!(*key, AtomicOrUnionType::Leaf(DataType::String));
        assert!(matches!(value.item_type(), ItemType::Array(_)));
        assert_eq!(parse("map(*)").unwrap().item_type(), &ItemType::AnyMap);
        assert_eq!(parse("array(*)").unwrap().item_type(), &ItemType::AnyArray);
    }

    #[test]
    fn test_kind_tests() {
        assert_eq!(
            parse("document-node(assembly(catalog))").unwrap().item_type(),
            &ItemType::Kind(KindTest::Document(Some(Box::new(KindTest::Assembly(
                NameTest::Name(QName::local("catalog"))
            )))))
        );
        assert_eq!(
            parse("flag(id, meta:token)").unwrap().item_type(),
            &ItemType::Kind(KindTest::Flag {
                name: NameTest::Name(QName::local("id")),
                value_type: Some(AtomicOrUnionType::Leaf(DataType::Token)),
            })
        );
        assert_eq!(
            parse("field()").unwrap().item_type(),
            &ItemType::Kind(KindTest::Field {
                name: NameTest::Any,
                value_type: None,
            })
        );
    }

    #[test]
    fn test_errors_are_static() {
        let unknown = parse("meta:bogus").unwrap_err();
        assert_eq!(unknown.code(), ErrorCode::XPST0051);
        assert!(unknown.is_static());
        assert_eq!(parse("x:string").unwrap_err().code(), ErrorCode::XPST0081);
        assert_eq!(
            parse("function(item()) as item()").unwrap_err().code(),
            ErrorCode::XPST0010
        );
    }
}
