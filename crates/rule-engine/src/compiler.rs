//! 规则编译器
//!
//! 将宽松的 JSON 条件形态（`every`/`some`/`not`/`fact` 四个可选字段并存）
//! 编译成标签化的 [`Condition`] 树。
//!
//! 形态优先级：`every` > `some` > `not` > 叶子，取第一个非空的形态；空数组视为未填写。
//! 严格模式下，多种形态并存或没有任何形态的节点会在编译时被拒绝。

use crate::config::ShapePolicy;
use crate::error::{Result, RuleError};
use crate::models::{Condition, LeafCondition, Rule, RuleEvent};
use crate::operators::{GroupKind, Operator};
use crate::value::FactValue;
use serde::Deserialize;
use tracing::warn;

/// 宽松形态的条件节点
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCondition {
    #[serde(default)]
    pub every: Option<Vec<RawCondition>>,
    #[serde(default)]
    pub some: Option<Vec<RawCondition>>,
    #[serde(default)]
    pub not: Option<Vec<RawCondition>>,
    #[serde(default)]
    pub fact: Option<String>,
    #[serde(default)]
    pub operator: Option<Operator>,
    #[serde(default)]
    pub value: Option<FactValue>,
}

/// 宽松形态的规则
#[derive(Debug, Clone, Deserialize)]
pub struct RawRule {
    #[serde(default)]
    pub name: Option<String>,
    pub conditions: RawCondition,
    #[serde(default)]
    pub event: Option<RuleEvent>,
    #[serde(default)]
    pub priority: i32,
}

/// 规则编译器
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleCompiler {
    shape_policy: ShapePolicy,
}

impl RuleCompiler {
    pub fn new(shape_policy: ShapePolicy) -> Self {
        Self { shape_policy }
    }

    /// 从 JSON 字符串编译规则（单条规则或规则数组）
    pub fn compile_from_json(&self, json: &str) -> Result<Vec<Rule>> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let raws: Vec<RawRule> = if value.is_array() {
            serde_json::from_value(value)?
        } else {
            vec![serde_json::from_value(value)?]
        };

        raws.into_iter().map(|raw| self.compile(raw)).collect()
    }

    /// 编译规则
    pub fn compile(&self, raw: RawRule) -> Result<Rule> {
        let conditions = self.compile_condition(raw.conditions, "conditions")?;

        Ok(Rule {
            name: raw.name,
            conditions,
            event: raw.event,
            priority: raw.priority,
        })
    }

    /// 编译条件节点
    pub fn compile_condition(&self, raw: RawCondition, path: &str) -> Result<Condition> {
        let RawCondition {
            every,
            some,
            not,
            fact,
            operator,
            value,
        } = raw;

        let mut groups = [
            (GroupKind::Every, non_empty(every)),
            (GroupKind::Some, non_empty(some)),
            (GroupKind::Not, non_empty(not)),
        ]
        .into_iter()
        .filter_map(|(kind, children)| children.map(|c| (kind, c)));

        let first = groups.next();
        let shapes = usize::from(first.is_some()) + groups.count() + usize::from(fact.is_some());

        if shapes > 1 {
            match self.shape_policy {
                ShapePolicy::Strict => {
                    return Err(RuleError::AmbiguousCondition {
                        path: path.to_string(),
                    });
                }
                ShapePolicy::Precedence => {
                    warn!(path = %path, "condition declares more than one shape, using precedence");
                }
            }
        }

        if let Some((kind, children)) = first {
            let children = children
                .into_iter()
                .enumerate()
                .map(|(i, child)| self.compile_condition(child, &format!("{}.{}[{}]", path, kind, i)))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Condition::group(kind, children));
        }

        // 缺少 fact 的叶子在宽松模式下保留到评估时报错，只影响所在规则
        if fact.is_none() && self.shape_policy == ShapePolicy::Strict {
            return Err(RuleError::ParseError(format!(
                "条件 '{}' 既不是逻辑组也没有 fact",
                path
            )));
        }

        Ok(Condition::Leaf(LeafCondition {
            fact: fact.unwrap_or_default(),
            operator: operator.unwrap_or_else(|| Operator::Unknown(String::new())),
            value: value.unwrap_or_default(),
        }))
    }
}

fn non_empty(children: Option<Vec<RawCondition>>) -> Option<Vec<RawCondition>> {
    children.filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawCondition {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_compile_nested_rule() {
        let rules = RuleCompiler::default()
            .compile_from_json(
                r#"
                {
                    "name": "test",
                    "priority": 5,
                    "conditions": {
                        "some": [
                            {
                                "every": [
                                    { "fact": "testId", "operator": "greaterThan", "value": 4 },
                                    { "fact": "testId", "operator": "lessThan", "value": 6 }
                                ]
                            },
                            { "fact": "asyncFact", "operator": "contains", "value": 5 }
                        ]
                    },
                    "event": { "type": "success", "data": { "msg": "this is my message" } }
                }
                "#,
            )
            .unwrap();

        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.priority, 5);
        assert_eq!(
            rule.conditions,
            Condition::some(vec![
                Condition::every(vec![
                    Condition::leaf("testId", Operator::GreaterThan, 4),
                    Condition::leaf("testId", Operator::LessThan, 6),
                ]),
                Condition::leaf("asyncFact", Operator::Contains, 5),
            ])
        );
    }

    #[test]
    fn test_compile_rule_array() {
        let rules = RuleCompiler::default()
            .compile_from_json(
                r#"[
                    { "conditions": { "fact": "a", "operator": "equal", "value": 1 } },
                    { "conditions": { "fact": "b", "operator": "equal", "value": 2 }, "priority": -1 }
                ]"#,
            )
            .unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].priority, -1);
    }

    #[test]
    fn test_precedence_every_over_some_over_not_over_leaf() {
        let compiler = RuleCompiler::default();
        let node = raw(
            r#"{
                "every": [{ "fact": "e", "operator": "equal", "value": 1 }],
                "some": [{ "fact": "s", "operator": "equal", "value": 1 }],
                "not": [{ "fact": "n", "operator": "equal", "value": 1 }],
                "fact": "leaf", "operator": "equal", "value": 1
            }"#,
        );
        let Condition::Group(group) = compiler.compile_condition(node, "root").unwrap() else {
            panic!("expected group");
        };
        assert_eq!(group.kind, GroupKind::Every);

        let node = raw(
            r#"{
                "some": [{ "fact": "s", "operator": "equal", "value": 1 }],
                "not": [{ "fact": "n", "operator": "equal", "value": 1 }],
                "fact": "leaf"
            }"#,
        );
        let Condition::Group(group) = compiler.compile_condition(node, "root").unwrap() else {
            panic!("expected group");
        };
        assert_eq!(group.kind, GroupKind::Some);

        let node = raw(r#"{ "not": [{ "fact": "n", "operator": "equal" }], "fact": "leaf" }"#);
        let Condition::Group(group) = compiler.compile_condition(node, "root").unwrap() else {
            panic!("expected group");
        };
        assert_eq!(group.kind, GroupKind::Not);
    }

    #[test]
    fn test_empty_group_falls_through() {
        let node = raw(r#"{ "every": [], "fact": "x", "operator": "equal", "value": 1 }"#);
        let condition = RuleCompiler::default().compile_condition(node, "root").unwrap();
        assert_eq!(condition, Condition::leaf("x", Operator::Equal, 1));
    }

    #[test]
    fn test_strict_rejects_ambiguous_node() {
        let node = raw(
            r#"{
                "every": [{ "fact": "e", "operator": "equal", "value": 1 }],
                "fact": "leaf"
            }"#,
        );
        let err = RuleCompiler::new(ShapePolicy::Strict)
            .compile_condition(node, "conditions")
            .unwrap_err();
        assert!(matches!(err, RuleError::AmbiguousCondition { path } if path == "conditions"));
    }

    #[test]
    fn test_strict_reports_nested_path() {
        let node = raw(
            r#"{
                "some": [
                    { "fact": "ok", "operator": "equal", "value": 1 },
                    { "not": [{ "fact": "n" }], "some": [{ "fact": "s" }] }
                ]
            }"#,
        );
        let err = RuleCompiler::new(ShapePolicy::Strict)
            .compile_condition(node, "conditions")
            .unwrap_err();
        assert!(matches!(err, RuleError::AmbiguousCondition { path } if path == "conditions.some[1]"));
    }

    #[test]
    fn test_missing_fact_is_deferred_in_precedence_mode() {
        let condition = RuleCompiler::default()
            .compile_condition(raw(r#"{ "operator": "equal", "value": 1 }"#), "root")
            .unwrap();
        let Condition::Leaf(leaf) = condition else {
            panic!("expected leaf");
        };
        assert!(leaf.fact.is_empty());

        let err = RuleCompiler::new(ShapePolicy::Strict)
            .compile_condition(raw(r#"{ "operator": "equal", "value": 1 }"#), "root")
            .unwrap_err();
        assert!(matches!(err, RuleError::ParseError(_)));
    }

    #[test]
    fn test_missing_operator_becomes_unknown() {
        let condition = RuleCompiler::default()
            .compile_condition(raw(r#"{ "fact": "x" }"#), "root")
            .unwrap();
        let Condition::Leaf(leaf) = condition else {
            panic!("expected leaf");
        };
        assert_eq!(leaf.operator, Operator::Unknown(String::new()));
        assert_eq!(leaf.value, FactValue::Null);
    }
}
