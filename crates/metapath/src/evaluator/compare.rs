use std::cmp::Ordering;

use metaschema_datatypes::AtomicValue;
use metaschema_model::NodeItem;

use crate::cst::ComparisonOperator;
use crate::error::MetapathError;
use crate::item::Sequence;

fn satisfies(ordering: Ordering, operator: ComparisonOperator) -> bool {
    match operator {
        ComparisonOperator::Equal => ordering.is_eq(),
        ComparisonOperator::NotEqual => ordering.is_ne(),
        ComparisonOperator::Less => ordering.is_lt(),
        ComparisonOperator::LessOrEqual => ordering.is_le(),
        ComparisonOperator::Greater => ordering.is_gt(),
        ComparisonOperator::GreaterOrEqual => ordering.is_ge(),
    }
}

/// Compares two atomic values; values of unrelated types are a type error.
pub(super) fn compare_atomic(
    left: &AtomicValue,
    operator: ComparisonOperator,
    right: &AtomicValue,
) -> Result<bool, MetapathError> {
    Ok(satisfies(left.compare_to(right)?, operator))
}

/// A text operand facing a typed one is read as the other's datatype. Text
/// that is not a valid lexical form of that datatype matches nothing.
fn general_pair(
    left: &AtomicValue,
    operator: ComparisonOperator,
    right: &AtomicValue,
) -> Result<bool, MetapathError> {
    if let Some(text) = left.as_text()
        && !right.is_textual()
    {
        return match right.datatype().parse(text) {
            Ok(left) => compare_atomic(&left, operator, right),
            Err(_) => Ok(false),
        };
    }
    if let Some(text) = right.as_text()
        && !left.is_textual()
    {
        return match left.datatype().parse(text) {
            Ok(right) => compare_atomic(left, operator, &right),
            Err(_) => Ok(false),
        };
    }
    compare_atomic(left, operator, right)
}

/// `=`, `!=`, ...: true when some pair from the two atomized operands
/// satisfies the operator.
pub(super) fn general_compare<'a, N: NodeItem<'a>>(
    left: &Sequence<N>,
    operator: ComparisonOperator,
    right: &Sequence<N>,
) -> Result<bool, MetapathError> {
    let left = left.atomize()?;
    let right = right.atomize()?;
    for l in &left {
        for r in &right {
            if general_pair(l, operator, r)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// `eq`, `ne`, ...: each operand is at most one value; an empty operand
/// gives the empty sequence.
pub(super) fn value_compare<'a, N: NodeItem<'a>>(
    left: &Sequence<N>,
    operator: ComparisonOperator,
    right: &Sequence<N>,
) -> Result<Sequence<N>, MetapathError> {
    let (Some(left), Some(right)) = (left.atomize_optional()?, right.atomize_optional()?) else {
        return Ok(Sequence::empty());
    };
    Ok(Sequence::boolean(compare_atomic(&left, operator, &right)?))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::eval;
    use crate::error::ErrorCode;

    fn truth(text: &str) -> bool {
        eval(text).unwrap().effective_boolean_value().unwrap()
    }

    #[test]
    fn test_general_comparison_is_existential() {
        assert!(truth("(1, 2) = (2, 3)"));
        assert!(!truth("(1, 2) = (3, 4)"));
        assert!(truth("(1, 2) != (1, 1)"));
        assert!(!truth("() = ()"));
        assert!(truth("(5, 10) > 7"));
    }

    #[test]
    fn test_general_comparison_reads_text_as_other_type() {
        assert!(truth("'10' = 10"));
        assert!(truth("10.0 = '10'"));
        assert!(!truth("'ten' = 10"));
        assert!(truth("'2024-01-01' < meta:date('2024-06-01')"));
    }

    #[test]
    fn test_value_comparison_requires_single_items() {
        assert!(truth("1 eq 1.0"));
        assert!(truth("'a' lt 'b'"));
        assert!(eval("() eq 1").unwrap().is_empty());
        assert_eq!(eval("(1, 2) eq 1").unwrap_err().code(), ErrorCode::XPTY0004);
        assert_eq!(eval("'1' eq 1").unwrap_err().code(), ErrorCode::XPTY0004);
    }

    #[test]
    fn test_temporal_ordering() {
        assert!(truth(
            "meta:date-time('2024-01-01T10:00:00+02:00') eq meta:date-time('2024-01-01T08:00:00Z')"
        ));
        assert!(truth("meta:day-time-duration('PT1H') lt meta:day-time-duration('PT90M')"));
    }
}
