//! 规则操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 条件操作符
///
/// 未识别的操作符名称不会在解析阶段失败，而是保留为 `Unknown`，
/// 由 [`UnknownOperatorPolicy`](crate::config::UnknownOperatorPolicy) 决定评估结果。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    // 包含检查
    Contains,
    NotContains,
    In,
    NotIn,

    // 通用比较
    Equal,
    NotEqual,

    // 数值比较
    GreaterThan,
    GreaterThanInclusive,
    LessThan,
    LessThanInclusive,

    Unknown(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Contains => "contains",
            Self::NotContains => "notContains",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::Equal => "equal",
            Self::NotEqual => "notEqual",
            Self::GreaterThan => "greaterThan",
            Self::GreaterThanInclusive => "greaterThanInclusive",
            Self::LessThan => "lessThan",
            Self::LessThanInclusive => "lessThanInclusive",
            Self::Unknown(name) => name,
        }
    }
}

impl From<&str> for Operator {
    fn from(name: &str) -> Self {
        match name {
            "contains" => Self::Contains,
            "notContains" => Self::NotContains,
            "in" => Self::In,
            "notIn" => Self::NotIn,
            "equal" => Self::Equal,
            "notEqual" => Self::NotEqual,
            "greaterThan" => Self::GreaterThan,
            "greaterThanInclusive" => Self::GreaterThanInclusive,
            "lessThan" => Self::LessThan,
            "lessThanInclusive" => Self::LessThanInclusive,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for Operator {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        match op {
            Operator::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 逻辑组类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    /// AND：全部子条件为真
    Every,
    /// OR：任一子条件为真
    Some,
    /// NOR：没有任何子条件为真
    Not,
}

impl GroupKind {
    /// 合并子条件结果
    ///
    /// 空组：`every` 为真，`some` 为假，`not` 为真。
    pub fn combine<I>(self, results: I) -> bool
    where
        I: IntoIterator<Item = bool>,
    {
        let mut results = results.into_iter();
        match self {
            Self::Every => results.all(|r| r),
            Self::Some => results.any(|r| r),
            Self::Not => !results.any(|r| r),
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Every => write!(f, "every"),
            Self::Some => write!(f, "some"),
            Self::Not => write!(f, "not"),
        }
    }
}
