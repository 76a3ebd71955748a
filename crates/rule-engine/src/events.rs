//! 事件处理器注册表
//!
//! 按事件类型保存处理器，同一类型可注册多个，按注册顺序同步调用。
//! 单个处理器失败不会阻止其他处理器执行，失败会被收集后返回给调用方。

use crate::models::{EvaluatedRule, RuleEvent};
use crate::store::FactStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// 事件处理器
pub type EventHandler =
    Arc<dyn Fn(&RuleEvent, &FactStore, &EvaluatedRule) -> anyhow::Result<()> + Send + Sync>;

/// 处理器失败记录
#[derive(Debug)]
pub struct HandlerFailure {
    pub event_type: String,
    pub rule: Option<String>,
    /// 处理器在该事件类型下的注册序号
    pub handler_index: usize,
    pub error: anyhow::Error,
}

/// 事件处理器注册表
#[derive(Clone, Default)]
pub struct EventHandlers {
    handlers: HashMap<String, Vec<EventHandler>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理器
    pub fn register<F>(&mut self, event_type: impl Into<String>, handler: F)
    where
        F: Fn(&RuleEvent, &FactStore, &EvaluatedRule) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers
            .entry(event_type.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// 该事件类型已注册的处理器数量
    pub fn count(&self, event_type: &str) -> usize {
        self.handlers.get(event_type).map_or(0, Vec::len)
    }

    /// 分发事件，返回失败的处理器
    pub fn dispatch(
        &self,
        event: &RuleEvent,
        store: &FactStore,
        rule: &EvaluatedRule,
    ) -> Vec<HandlerFailure> {
        let Some(handlers) = self.handlers.get(&event.event_type) else {
            debug!(event_type = %event.event_type, "no handlers registered");
            return Vec::new();
        };

        handlers
            .iter()
            .enumerate()
            .filter_map(|(handler_index, handler)| {
                handler(event, store, rule).err().map(|error| {
                    warn!(
                        event_type = %event.event_type,
                        rule = rule.label(),
                        handler_index,
                        error = %error,
                        "event handler failed"
                    );
                    HandlerFailure {
                        event_type: event.event_type.clone(),
                        rule: rule.name.clone(),
                        handler_index,
                        error,
                    }
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&str, usize> = self
            .handlers
            .iter()
            .map(|(k, v)| (k.as_str(), v.len()))
            .collect();
        f.debug_struct("EventHandlers").field("handlers", &counts).finish()
    }
}
