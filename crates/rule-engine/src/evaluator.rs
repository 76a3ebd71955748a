//! 操作符评估器
//!
//! 叶子条件的语义：(事实值, 操作符, 比较值) → bool。
//! 类型不满足操作符前提时返回 `RuleError::TypeMismatch`，不会吞成 false。

use crate::config::UnknownOperatorPolicy;
use crate::error::{Result, RuleError};
use crate::operators::Operator;
use crate::value::{type_name_of, FactValue};
use tracing::warn;

/// 操作符评估器
#[derive(Debug, Clone, Copy, Default)]
pub struct OperatorEvaluator {
    unknown_operator: UnknownOperatorPolicy,
}

impl OperatorEvaluator {
    pub fn new(unknown_operator: UnknownOperatorPolicy) -> Self {
        Self { unknown_operator }
    }

    /// 评估条件
    ///
    /// # Arguments
    /// * `fact_value` - 从事实存储中解析到的值，缺失时为 None
    /// * `operator` - 操作符
    /// * `compare_value` - 规则中定义的比较值
    pub fn evaluate(
        &self,
        fact_value: Option<&FactValue>,
        operator: &Operator,
        compare_value: &FactValue,
    ) -> Result<bool> {
        match operator {
            Operator::Contains => Self::contains(fact_value, compare_value, operator),
            Operator::NotContains => Self::contains(fact_value, compare_value, operator).map(|r| !r),
            Operator::In => Self::in_list(fact_value, compare_value, operator),
            Operator::NotIn => Self::in_list(fact_value, compare_value, operator).map(|r| !r),
            Operator::Equal => Ok(Self::eq(fact_value, compare_value)),
            Operator::NotEqual => Ok(!Self::eq(fact_value, compare_value)),
            Operator::GreaterThan => Self::compare(fact_value, compare_value, operator, |a, b| a > b),
            Operator::GreaterThanInclusive => {
                Self::compare(fact_value, compare_value, operator, |a, b| a >= b)
            }
            Operator::LessThan => Self::compare(fact_value, compare_value, operator, |a, b| a < b),
            Operator::LessThanInclusive => {
                Self::compare(fact_value, compare_value, operator, |a, b| a <= b)
            }
            Operator::Unknown(name) => self.unknown(name),
        }
    }

    fn unknown(&self, name: &str) -> Result<bool> {
        match self.unknown_operator {
            UnknownOperatorPolicy::Allow => {
                warn!(operator = %name, "operator not supported, returning true");
                Ok(true)
            }
            UnknownOperatorPolicy::Deny => {
                warn!(operator = %name, "operator not supported, returning false");
                Ok(false)
            }
            UnknownOperatorPolicy::Error => Err(RuleError::UnknownOperator(name.to_string())),
        }
    }

    /// 深度相等；缺失的事实按 null 比较
    fn eq(fact: Option<&FactValue>, expected: &FactValue) -> bool {
        fact.unwrap_or(&FactValue::Null) == expected
    }

    /// 数组包含检查 (contains)
    fn contains(fact: Option<&FactValue>, expected: &FactValue, operator: &Operator) -> Result<bool> {
        let items = fact
            .and_then(FactValue::as_array)
            .ok_or_else(|| Self::mismatch(operator, "array", type_name_of(fact)))?;

        Ok(items.iter().any(|item| item == expected))
    }

    /// 列表包含检查 (in)
    fn in_list(fact: Option<&FactValue>, expected: &FactValue, operator: &Operator) -> Result<bool> {
        let items = expected
            .as_array()
            .ok_or_else(|| Self::mismatch(operator, "array", expected.type_name()))?;

        Ok(fact.is_some_and(|value| items.contains(value)))
    }

    /// 数值比较
    fn compare<F>(
        fact: Option<&FactValue>,
        expected: &FactValue,
        operator: &Operator,
        cmp: F,
    ) -> Result<bool>
    where
        F: Fn(f64, f64) -> bool,
    {
        let fact_num = fact
            .and_then(FactValue::as_f64)
            .ok_or_else(|| Self::mismatch(operator, "number", type_name_of(fact)))?;

        let expected_num = expected
            .as_f64()
            .ok_or_else(|| Self::mismatch(operator, "number", expected.type_name()))?;

        Ok(cmp(fact_num, expected_num))
    }

    fn mismatch(operator: &Operator, expected: &str, actual: &str) -> RuleError {
        RuleError::TypeMismatch {
            operator: operator.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
