//! 异步事实规则引擎
//!
//! 提供可复用的规则评估能力，支持：
//! - 已知事实与按需解析的异步事实（single-flight 缓存）
//! - every / some / not 条件树的并发评估，返回完整的审计树
//! - 按优先级排序输出、规则级错误隔离与协作式取消
//! - 按事件类型分发到注册的处理器

pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod executor;
pub mod models;
pub mod observability;
pub mod operators;
pub mod store;
pub mod value;

pub use compiler::{RawCondition, RawRule, RuleCompiler};
pub use config::{EngineConfig, ObservabilityConfig, ShapePolicy, UnknownOperatorPolicy};
pub use engine::{RuleEngine, RunReport};
pub use error::{Result, RuleError, RuleFailure};
pub use evaluator::OperatorEvaluator;
pub use events::{EventHandler, EventHandlers, HandlerFailure};
pub use executor::ConditionExecutor;
pub use models::{
    Condition, ConditionGroup, EvaluatedCondition, EvaluatedGroup, EvaluatedLeaf, EvaluatedRule,
    LeafCondition, Rule, RuleEvent,
};
pub use operators::{GroupKind, Operator};
pub use store::{resolver, FactFuture, FactResolver, FactStore};
pub use value::FactValue;
pub use tokio_util::sync::CancellationToken;
