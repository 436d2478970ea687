//! Argument comparison operators and condition translation

use crate::model::ArgCondition;
use policy_core::{PolicyError, Result};
use seccompiler::{SeccompCmpArgLen, SeccompCmpOp, SeccompCondition};
use std::fmt;
use std::str::FromStr;

/// Comparison applied to a syscall argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    /// `(arg & value_two) == value`
    MaskedEqual,
}

impl Operator {
    pub const ALL: [Operator; 7] = [
        Operator::Equal,
        Operator::NotEqual,
        Operator::GreaterThan,
        Operator::GreaterOrEqual,
        Operator::LessThan,
        Operator::LessOrEqual,
        Operator::MaskedEqual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "SCMP_CMP_EQ",
            Operator::NotEqual => "SCMP_CMP_NE",
            Operator::GreaterThan => "SCMP_CMP_GT",
            Operator::GreaterOrEqual => "SCMP_CMP_GE",
            Operator::LessThan => "SCMP_CMP_LT",
            Operator::LessOrEqual => "SCMP_CMP_LE",
            Operator::MaskedEqual => "SCMP_CMP_MASKED_EQ",
        }
    }

    /// Concrete comparison; `mask` is only used by `MaskedEqual`.
    pub fn to_cmp_op(self, mask: u64) -> SeccompCmpOp {
        match self {
            Operator::Equal => SeccompCmpOp::Eq,
            Operator::NotEqual => SeccompCmpOp::Ne,
            Operator::GreaterThan => SeccompCmpOp::Gt,
            Operator::GreaterOrEqual => SeccompCmpOp::Ge,
            Operator::LessThan => SeccompCmpOp::Lt,
            Operator::LessOrEqual => SeccompCmpOp::Le,
            Operator::MaskedEqual => SeccompCmpOp::MaskedEq(mask),
        }
    }
}

impl FromStr for Operator {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| PolicyError::InvalidOperator { op: s.to_string() })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translate one policy argument comparison into a seccomp condition.
///
/// Arguments are compared as full 64-bit values.
pub fn translate_condition(arg: Option<&ArgCondition>) -> Result<SeccompCondition> {
    translate_indexed(arg).map(|(_, condition)| condition)
}

/// Like [`translate_condition`], also returning the checked argument index
pub(crate) fn translate_indexed(arg: Option<&ArgCondition>) -> Result<(u8, SeccompCondition)> {
    let arg = arg.ok_or(PolicyError::NilCondition)?;
    let op: Operator = arg.op.parse()?;

    let index = u8::try_from(arg.index).map_err(|e| PolicyError::ConditionConstruction {
        index: arg.index,
        source: Box::new(e),
    })?;

    let condition = SeccompCondition::new(
        index,
        SeccompCmpArgLen::Qword,
        op.to_cmp_op(arg.value_two),
        arg.value,
    )
    .map_err(|e| PolicyError::ConditionConstruction {
        index: arg.index,
        source: Box::new(e),
    })?;

    Ok((index, condition))
}
