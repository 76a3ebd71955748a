//! 规则引擎
//!
//! 注册事实、异步事实解析器、规则和事件处理器，然后并发执行全部规则。
//! 每次运行创建独立的 [`FactStore`]，运行之间不共享事实。

use crate::compiler::RuleCompiler;
use crate::config::EngineConfig;
use crate::error::{Result, RuleError, RuleFailure};
use crate::evaluator::OperatorEvaluator;
use crate::events::{EventHandlers, HandlerFailure};
use crate::executor::ConditionExecutor;
use crate::models::{EvaluatedRule, Rule, RuleEvent};
use crate::store::{resolver, FactResolver, FactStore};
use crate::value::FactValue;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// 一次运行的结果
#[derive(Debug)]
pub struct RunReport {
    /// 评估成功的规则，按优先级升序（稳定）排列
    pub results: Vec<EvaluatedRule>,
    /// 评估失败的规则
    pub failures: Vec<RuleFailure>,
    /// 事件处理器失败
    pub handler_failures: Vec<HandlerFailure>,
    /// 运行结束时的事实存储，包含运行期间解析的异步事实
    pub fact_store: FactStore,
}

impl RunReport {
    /// 任一规则失败时返回聚合错误
    pub fn into_result(self) -> Result<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(RuleError::RulesFailed(self.failures))
        }
    }

    /// 根条件为真的规则
    pub fn matched(&self) -> impl Iterator<Item = &EvaluatedRule> {
        self.results.iter().filter(|r| r.result)
    }
}

/// 规则引擎
#[derive(Default)]
pub struct RuleEngine {
    config: EngineConfig,
    rules: Vec<Rule>,
    facts: HashMap<String, FactValue>,
    resolvers: HashMap<String, FactResolver>,
    handlers: EventHandlers,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// 添加已知事实
    pub fn add_fact(mut self, name: impl Into<String>, value: impl Into<FactValue>) -> Self {
        self.facts.insert(name.into(), value.into());
        self
    }

    /// 批量添加已知事实
    pub fn add_facts<I, K, V>(mut self, facts: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FactValue>,
    {
        self.facts
            .extend(facts.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// 添加异步事实解析器
    pub fn add_async_fact<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(FactStore) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<FactValue>>> + Send + 'static,
    {
        self.resolvers.insert(name.into(), resolver(f));
        self
    }

    /// 批量添加异步事实解析器
    pub fn add_async_facts(
        mut self,
        resolvers: impl IntoIterator<Item = (String, FactResolver)>,
    ) -> Self {
        self.resolvers.extend(resolvers);
        self
    }

    pub fn add_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn add_rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// 从宽松 JSON 形态加载规则，按配置的形态策略编译
    pub fn add_rules_from_json(self, json: &str) -> Result<Self> {
        let rules = RuleCompiler::new(self.config.condition_shape).compile_from_json(json)?;
        Ok(self.add_rules(rules))
    }

    /// 注册事件处理器，同一事件类型可注册多个，按注册顺序调用
    pub fn on_event<F>(mut self, event_type: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&RuleEvent, &FactStore, &EvaluatedRule) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.register(event_type, handler);
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// 执行全部规则
    ///
    /// 所有规则并发评估。返回的结果按优先级升序排列（相同优先级保持注册顺序），
    /// 而事件在各规则评估完成时立即分发，因此事件顺序是完成顺序，不是优先级顺序。
    pub async fn run(&self) -> Result<RunReport> {
        self.run_with_cancellation(CancellationToken::new()).await
    }

    /// 执行全部规则，可通过 `cancel` 协作式取消
    ///
    /// 取消时尚未完成的事实解析与规则评估会被丢弃，返回 `RuleError::Cancelled`。
    #[instrument(skip_all, fields(rules = self.rules.len()))]
    pub async fn run_with_cancellation(&self, cancel: CancellationToken) -> Result<RunReport> {
        let store = FactStore::new(self.facts.clone(), self.resolvers.clone());
        let executor =
            ConditionExecutor::new(OperatorEvaluator::new(self.config.unknown_operator));

        let mut ordered: Vec<&Rule> = self.rules.iter().collect();
        ordered.sort_by_key(|rule| rule.priority);

        let handler_failures = Mutex::new(Vec::new());
        let evaluations = ordered
            .iter()
            .map(|rule| self.evaluate_rule(rule, &executor, &store, &handler_failures));

        let outcomes = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("rule run cancelled");
                return Err(RuleError::Cancelled);
            }
            outcomes = join_all(evaluations) => outcomes,
        };

        let mut results = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for (position, (rule, outcome)) in ordered.iter().zip(outcomes).enumerate() {
            match outcome {
                Ok(evaluated) => results.push(evaluated),
                Err(error) => {
                    warn!(rule = rule.label(), position, error = %error, "rule evaluation failed");
                    failures.push(RuleFailure {
                        rule: rule.name.clone(),
                        position,
                        priority: rule.priority,
                        error: Box::new(error),
                    });
                }
            }
        }

        if !ordered.is_empty() && results.is_empty() {
            return Err(RuleError::AllRulesFailed(failures));
        }

        info!(
            evaluated = results.len(),
            failed = failures.len(),
            matched = results.iter().filter(|r| r.result).count(),
            "rule run complete"
        );

        Ok(RunReport {
            results,
            failures,
            handler_failures: handler_failures.into_inner(),
            fact_store: store,
        })
    }

    /// 评估单条规则，根条件为真且带事件时立即分发
    async fn evaluate_rule(
        &self,
        rule: &Rule,
        executor: &ConditionExecutor,
        store: &FactStore,
        handler_failures: &Mutex<Vec<HandlerFailure>>,
    ) -> Result<EvaluatedRule> {
        debug!(rule = rule.label(), priority = rule.priority, "evaluating rule");

        let conditions = executor.evaluate(&rule.conditions, store).await?;
        let evaluated = EvaluatedRule::new(rule, conditions);

        if evaluated.result {
            if let Some(event) = &evaluated.event {
                debug!(rule = rule.label(), event_type = %event.event_type, "dispatching event");
                let failed = self.handlers.dispatch(event, store, &evaluated);
                handler_failures.lock().extend(failed);
            }
        }

        Ok(evaluated)
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("config", &self.config)
            .field("rules", &self.rules.len())
            .field("facts", &self.facts.len())
            .field("async_facts", &self.resolvers.keys().collect::<Vec<_>>())
            .field("handlers", &self.handlers)
            .finish()
    }
}
