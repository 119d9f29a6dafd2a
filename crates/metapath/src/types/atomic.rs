use std::fmt;

use metaschema_datatypes::{AtomicValue, DataType};
use metaschema_model::QName;

use crate::error::{ErrorCode, MetapathError};
use crate::namespaces;

/// A named atomic type: a leaf datatype or one of the abstract unions over them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicOrUnionType {
    /// The universal supertype of every atomic value.
    AnyAtomic,
    Leaf(DataType),
    Numeric,
    Temporal,
    Duration,
    IpAddress,
    Markup,
    AnyUri,
}

const UNIONS: [AtomicOrUnionType; 7] = [
    AtomicOrUnionType::AnyAtomic,
    AtomicOrUnionType::Numeric,
    AtomicOrUnionType::Temporal,
    AtomicOrUnionType::Duration,
    AtomicOrUnionType::IpAddress,
    AtomicOrUnionType::Markup,
    AtomicOrUnionType::AnyUri,
];

impl AtomicOrUnionType {
    pub fn name(&self) -> &'static str {
        match self {
            AtomicOrUnionType::AnyAtomic => "any-atomic-type",
            AtomicOrUnionType::Leaf(datatype) => datatype.name(),
            AtomicOrUnionType::Numeric => "numeric",
            AtomicOrUnionType::Temporal => "temporal",
            AtomicOrUnionType::Duration => "duration",
            AtomicOrUnionType::IpAddress => "ip-address",
            AtomicOrUnionType::Markup => "markup",
            AtomicOrUnionType::AnyUri => "any-uri",
        }
    }

    pub fn from_local_name(name: &str) -> Option<Self> {
        DataType::from_name(name)
            .map(AtomicOrUnionType::Leaf)
            .or_else(|| UNIONS.iter().copied().find(|t| t.name() == name))
    }

    /// The concrete datatypes a cast to this type tries, in order.
    pub fn members(&self) -> Vec<DataType> {
        match self {
            AtomicOrUnionType::AnyAtomic => DataType::ALL.to_vec(),
            AtomicOrUnionType::Leaf(datatype) => vec![*datatype],
            AtomicOrUnionType::Numeric => vec![DataType::Integer, DataType::Decimal],
            AtomicOrUnionType::Temporal => vec![DataType::DateTime, DataType::Date],
            AtomicOrUnionType::Duration => {
                vec![DataType::DayTimeDuration, DataType::YearMonthDuration]
            }
            AtomicOrUnionType::IpAddress => vec![DataType::IpV4Address, DataType::IpV6Address],
            AtomicOrUnionType::Markup => vec![DataType::MarkupLine, DataType::MarkupMultiline],
            AtomicOrUnionType::AnyUri => vec![DataType::Uri, DataType::UriReference],
        }
    }

    pub fn is_union(&self) -> bool {
        !matches!(self, AtomicOrUnionType::Leaf(_))
    }

    pub fn is_instance(&self, value: &AtomicValue) -> bool {
        let datatype = value.datatype();
        match self {
            AtomicOrUnionType::AnyAtomic => true,
            AtomicOrUnionType::Leaf(leaf) => datatype.derives_from(*leaf),
            _ => self.members().iter().any(|m| datatype.derives_from(*m)),
        }
    }

    /// True when every instance of `self` is an instance of `other`.
    pub fn is_subtype_of(&self, other: &AtomicOrUnionType) -> bool {
        match (self, other) {
            (_, AtomicOrUnionType::AnyAtomic) => true,
            (AtomicOrUnionType::AnyAtomic, _) => false,
            (a, b) if a == b => true,
            (AtomicOrUnionType::Leaf(leaf), _) => other
                .members()
                .iter()
                .any(|member| leaf.derives_from(*member)),
            _ => self
                .members()
                .iter()
                .all(|m| AtomicOrUnionType::Leaf(*m).is_subtype_of(other)),
        }
    }
}

impl fmt::Display for AtomicOrUnionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolves an expanded type name to a built-in atomic or union type.
pub fn lookup_atomic_type(name: &QName) -> Result<AtomicOrUnionType, MetapathError> {
    if name.namespace() == Some(namespaces::METAPATH_TYPES) {
        if let Some(found) = AtomicOrUnionType::from_local_name(name.local_name()) {
            return Ok(found);
        }
    }
    Err(MetapathError::static_error(
        ErrorCode::XPST0051,
        format!("unknown atomic type '{name}'"),
    ))
}

/// Like [`lookup_atomic_type`], for contexts such as cast targets that forbid
/// the universal `any-atomic-type`.
pub fn lookup_cast_target(name: &QName) -> Result<AtomicOrUnionType, MetapathError> {
    match lookup_atomic_type(name)? {
        AtomicOrUnionType::AnyAtomic => Err(MetapathError::static_error(
            ErrorCode::XPST0080,
            "any-atomic-type cannot be the target of a cast",
        )),
        found => Ok(found),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str) -> QName {
        QName::namespaced(namespaces::METAPATH_TYPES, name)
    }

    #[test]
    fn test_lookup() {
        assert_eq!(
            lookup_atomic_type(&meta("integer")).unwrap(),
            AtomicOrUnionType::Leaf(DataType::Integer)
        );
        assert_eq!(
            lookup_atomic_type(&meta("numeric")).unwrap(),
            AtomicOrUnionType::Numeric
        );
        let err = lookup_atomic_type(&meta("double")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::XPST0051);
        let err = lookup_atomic_type(&QName::local("integer")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::XPST0051);
    }

    #[test]
    fn test_any_atomic_forbidden_as_cast_target() {
        let err = lookup_cast_target(&meta("any-atomic-type")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::XPST0080);
        assert!(err.is_static());
    }

    #[test]
    fn test_union_membership() {
        let date = DataType::DateWithTimezone.parse("2020-01-01Z").unwrap();
        assert!(AtomicOrUnionType::Temporal.is_instance(&date));
        assert!(!AtomicOrUnionType::Numeric.is_instance(&date));
        assert!(AtomicOrUnionType::Numeric.is_instance(&AtomicValue::integer(3)));
        assert!(AtomicOrUnionType::Leaf(DataType::Decimal).is_instance(&AtomicValue::integer(3)));
    }

    #[test]
    fn test_subtyping() {
        let integer = AtomicOrUnionType::Leaf(DataType::Integer);
        assert!(integer.is_subtype_of(&AtomicOrUnionType::Numeric));
        assert!(integer.is_subtype_of(&AtomicOrUnionType::AnyAtomic));
        assert!(!AtomicOrUnionType::Numeric.is_subtype_of(&integer));
        assert!(AtomicOrUnionType::Numeric.is_subtype_of(&AtomicOrUnionType::Leaf(DataType::Decimal)));
    }
}
