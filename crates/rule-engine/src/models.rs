//! 规则引擎领域模型

use crate::operators::{GroupKind, Operator};
use crate::value::FactValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 规则定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub conditions: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<RuleEvent>,
    /// 越小越靠前
    #[serde(default)]
    pub priority: i32,
}

impl Rule {
    pub fn new(conditions: Condition) -> Self {
        Self {
            name: None,
            conditions,
            event: None,
            priority: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_event(mut self, event: RuleEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 用于日志的规则标签
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

/// 规则事件，规则根条件为真时触发
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl RuleEvent {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }
}

/// 条件节点（逻辑组或叶子条件）
///
/// 标签化的变体保证一个节点只有一种形态；宽松的 JSON 形态由
/// [`RuleCompiler`](crate::compiler::RuleCompiler) 转换而来。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Group(ConditionGroup),
    Leaf(LeafCondition),
}

impl Condition {
    pub fn group(kind: GroupKind, children: Vec<Condition>) -> Self {
        Self::Group(ConditionGroup { kind, children })
    }

    pub fn every(children: Vec<Condition>) -> Self {
        Self::group(GroupKind::Every, children)
    }

    pub fn some(children: Vec<Condition>) -> Self {
        Self::group(GroupKind::Some, children)
    }

    pub fn not(children: Vec<Condition>) -> Self {
        Self::group(GroupKind::Not, children)
    }

    pub fn leaf(fact: impl Into<String>, operator: Operator, value: impl Into<FactValue>) -> Self {
        Self::Leaf(LeafCondition {
            fact: fact.into(),
            operator,
            value: value.into(),
        })
    }
}

/// 逻辑组节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub kind: GroupKind,
    pub children: Vec<Condition>,
}

/// 叶子条件：将一个事实与字面值比较
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafCondition {
    pub fact: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: FactValue,
}

/// 评估后的条件节点，与输入树同构
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvaluatedCondition {
    Group(EvaluatedGroup),
    Leaf(EvaluatedLeaf),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedGroup {
    pub kind: GroupKind,
    pub children: Vec<EvaluatedCondition>,
    pub result: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedLeaf {
    pub fact: String,
    pub operator: Operator,
    pub value: FactValue,
    /// 评估时解析到的事实值，缺失时为 None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fact_value: Option<FactValue>,
    pub result: bool,
}

impl EvaluatedCondition {
    pub fn result(&self) -> bool {
        match self {
            Self::Group(group) => group.result,
            Self::Leaf(leaf) => leaf.result,
        }
    }

    /// 去掉评估注解，还原出输入条件树
    pub fn to_condition(&self) -> Condition {
        match self {
            Self::Group(group) => Condition::group(
                group.kind,
                group.children.iter().map(Self::to_condition).collect(),
            ),
            Self::Leaf(leaf) => Condition::Leaf(LeafCondition {
                fact: leaf.fact.clone(),
                operator: leaf.operator.clone(),
                value: leaf.value.clone(),
            }),
        }
    }
}

/// 评估后的规则
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub conditions: EvaluatedCondition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<RuleEvent>,
    pub priority: i32,
    pub result: bool,
}

impl EvaluatedRule {
    pub fn new(rule: &Rule, conditions: EvaluatedCondition) -> Self {
        Self {
            name: rule.name.clone(),
            result: conditions.result(),
            conditions,
            event: rule.event.clone(),
            priority: rule.priority,
        }
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_serialization() {
        let rule = Rule::new(Condition::every(vec![
            Condition::leaf("testId", Operator::GreaterThan, 4),
            Condition::leaf("testId", Operator::LessThan, 6),
        ]))
        .with_name("test_rule")
        .with_priority(5);

        let json = serde_json::to_string_pretty(&rule).unwrap();
        let parsed: Rule = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rule);
    }

    #[test]
    fn test_rule_deserialization() {
        let json = r#"
        {
            "name": "purchase",
            "conditions": {
                "type": "group",
                "kind": "some",
                "children": [
                    {
                        "type": "leaf",
                        "fact": "tags",
                        "operator": "contains",
                        "value": "vip"
                    },
                    {
                        "type": "leaf",
                        "fact": "amount",
                        "operator": "greaterThanInclusive",
                        "value": 500
                    }
                ]
            },
            "event": { "type": "success", "data": { "msg": "hi" } }
        }
        "#;

        let rule: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.label(), "purchase");
        assert_eq!(rule.priority, 0);
        assert_eq!(rule.event.as_ref().map(|e| e.event_type.as_str()), Some("success"));

        let Condition::Group(group) = &rule.conditions else {
            panic!("expected group");
        };
        assert_eq!(group.kind, GroupKind::Some);
        assert_eq!(group.children.len(), 2);
    }

    #[test]
    fn test_evaluated_leaf_serializes_fact_value() {
        let leaf = EvaluatedCondition::Leaf(EvaluatedLeaf {
            fact: "testId".to_string(),
            operator: Operator::Equal,
            value: FactValue::from(5),
            fact_value: Some(FactValue::from(5)),
            result: true,
        });

        let value = serde_json::to_value(&leaf).unwrap();
        assert_eq!(value["type"], json!("leaf"));
        assert_eq!(value["factValue"], json!(5.0));
        assert_eq!(value["result"], json!(true));
    }

    #[test]
    fn test_to_condition_strips_annotations() {
        let evaluated = EvaluatedCondition::Group(EvaluatedGroup {
            kind: GroupKind::Not,
            children: vec![EvaluatedCondition::Leaf(EvaluatedLeaf {
                fact: "missing".to_string(),
                operator: Operator::In,
                value: FactValue::from(vec![1, 2]),
                fact_value: None,
                result: false,
            })],
            result: true,
        });

        assert_eq!(
            evaluated.to_condition(),
            Condition::not(vec![Condition::leaf("missing", Operator::In, vec![1, 2])])
        );
    }
}
