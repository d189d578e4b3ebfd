//! Criteria expression trees for filters, auto-filters and graphical
//! indicators.
use chrono::NaiveDateTime;

use crate::model::fields::{DataType, FieldRef, TimeUnit};

/// Comparison operator in a criteria leaf.
///
/// Stored values above 0x3E6 encode `value - 0x3E7` as the operator
/// ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOperator {
    IsAnyValue,
    Equals,
    DoesNotEqual,
    IsGreaterThan,
    IsGreaterThanOrEqualTo,
    IsLessThan,
    IsLessThanOrEqualTo,
    IsWithin,
    IsNotWithin,
    Contains,
    DoesNotContain,
    ContainsExactly,
}

impl TestOperator {
    /// Decode an operator ordinal.
    pub fn from_ordinal(value: i32) -> Option<Self> {
        match value {
            0 => Some(TestOperator::IsAnyValue),
            1 => Some(TestOperator::Equals),
            2 => Some(TestOperator::DoesNotEqual),
            3 => Some(TestOperator::IsGreaterThan),
            4 => Some(TestOperator::IsGreaterThanOrEqualTo),
            5 => Some(TestOperator::IsLessThan),
            6 => Some(TestOperator::IsLessThanOrEqualTo),
            7 => Some(TestOperator::IsWithin),
            8 => Some(TestOperator::IsNotWithin),
            9 => Some(TestOperator::Contains),
            10 => Some(TestOperator::DoesNotContain),
            11 => Some(TestOperator::ContainsExactly),
            _ => None,
        }
    }

    /// True for operators that compare against two operands.
    pub fn is_range(self) -> bool {
        matches!(self, TestOperator::IsWithin | TestOperator::IsNotWithin)
    }
}

/// Combinator in a criteria branch node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

/// A prompt placeholder: the value is supplied interactively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub data_type: DataType,
    pub text: String,
}

/// An operand on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaValue {
    /// Compare against another field of the same entity.
    Field(FieldRef),
    /// A duration constant in minutes, plus its display unit.
    Duration { minutes: f64, unit: TimeUnit },
    Number(f64),
    Percentage(f64),
    Currency(f64),
    Text(String),
    Boolean(bool),
    Date(Option<NaiveDateTime>),
    Prompt(Prompt),
}

/// A node in a criteria expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaNode {
    /// `field operator operand [operand]`
    Comparison {
        field: FieldRef,
        operator: TestOperator,
        operands: [Option<CriteriaValue>; 2],
    },
    /// A combinator over child expressions.
    Logical {
        operator: LogicalOperator,
        children: Vec<CriteriaNode>,
    },
}

impl CriteriaNode {
    /// Walk the tree, yielding each comparison leaf in order.
    pub fn comparisons(&self) -> Vec<&CriteriaNode> {
        let mut result = Vec::new();
        self.collect_comparisons(&mut result);
        result
    }

    fn collect_comparisons<'a>(&'a self, into: &mut Vec<&'a CriteriaNode>) {
        match self {
            CriteriaNode::Comparison { .. } => into.push(self),
            CriteriaNode::Logical { children, .. } => {
                for child in children {
                    child.collect_comparisons(into);
                }
            }
        }
    }
}
