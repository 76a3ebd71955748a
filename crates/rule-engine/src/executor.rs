//! 条件执行器
//!
//! 递归遍历条件树：逻辑组的所有子节点并发评估，且不做短路，
//! 完整的评估树会作为审计轨迹返回给调用方。叶子节点只在解析异步事实时挂起。

use crate::error::{Result, RuleError};
use crate::evaluator::OperatorEvaluator;
use crate::models::{
    Condition, ConditionGroup, EvaluatedCondition, EvaluatedGroup, EvaluatedLeaf, LeafCondition,
};
use crate::store::FactStore;
use futures::future::{try_join_all, BoxFuture, FutureExt};
use tracing::trace;

/// 条件执行器
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionExecutor {
    operators: OperatorEvaluator,
}

impl ConditionExecutor {
    pub fn new(operators: OperatorEvaluator) -> Self {
        Self { operators }
    }

    /// 评估条件树，返回与输入同构的评估树
    pub fn evaluate<'a>(
        &'a self,
        node: &'a Condition,
        store: &'a FactStore,
    ) -> BoxFuture<'a, Result<EvaluatedCondition>> {
        async move {
            match node {
                Condition::Group(group) => self.evaluate_group(group, store).await,
                Condition::Leaf(leaf) => self.evaluate_leaf(leaf, store).await,
            }
        }
        .boxed()
    }

    /// 评估逻辑组节点（并发，不短路）
    async fn evaluate_group(
        &self,
        group: &ConditionGroup,
        store: &FactStore,
    ) -> Result<EvaluatedCondition> {
        let children =
            try_join_all(group.children.iter().map(|child| self.evaluate(child, store))).await?;

        let result = group.kind.combine(children.iter().map(EvaluatedCondition::result));
        trace!(kind = %group.kind, children = children.len(), result, "group evaluated");

        Ok(EvaluatedCondition::Group(EvaluatedGroup {
            kind: group.kind,
            children,
            result,
        }))
    }

    /// 评估叶子条件
    async fn evaluate_leaf(
        &self,
        leaf: &LeafCondition,
        store: &FactStore,
    ) -> Result<EvaluatedCondition> {
        if leaf.fact.is_empty() {
            return Err(RuleError::MissingFactKey);
        }

        let fact_value = store.get_fact(&leaf.fact).await?;
        let result = self
            .operators
            .evaluate(fact_value.as_ref(), &leaf.operator, &leaf.value)?;

        trace!(
            fact = %leaf.fact,
            operator = %leaf.operator,
            value = %leaf.value,
            result,
            "leaf evaluated"
        );

        Ok(EvaluatedCondition::Leaf(EvaluatedLeaf {
            fact: leaf.fact.clone(),
            operator: leaf.operator.clone(),
            value: leaf.value.clone(),
            fact_value,
            result,
        }))
    }
}
