//! 事实存储
//!
//! 每次运行持有一个 `FactStore`，由所有并发评估的条件子树共享。
//! 已知事实使用 DashMap 分片存储，不同键之间的读取互不干扰；
//! 异步事实按键做 single-flight：同一个键的解析器在一次运行中最多执行一次，
//! 并发请求方等待同一个进行中的解析结果。
//!
//! 解析器之间的等待关系记录在一张等待图中，出现环时请求方立即失败，
//! 而不是永远挂起。

use crate::error::{Result, RuleError};
use crate::value::FactValue;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// 异步事实解析器返回的 future
pub type FactFuture = BoxFuture<'static, anyhow::Result<Option<FactValue>>>;

/// 异步事实解析器
///
/// 接收事实存储本身，因此可以递归查询其他事实。
/// 查询链成环（包括查询自己负责的事实）时，成环的那次查询返回
/// `RuleError::FactResolution`。解析器内部 `tokio::spawn` 出去的任务不在检测范围内。
/// 解析器 panic 会被捕获并转为解析失败。
pub type FactResolver = Arc<dyn Fn(FactStore) -> FactFuture + Send + Sync>;

/// 将异步闭包包装为 [`FactResolver`]
pub fn resolver<F, Fut>(f: F) -> FactResolver
where
    F: Fn(FactStore) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Option<FactValue>>> + Send + 'static,
{
    Arc::new(move |store| f(store).boxed())
}

/// 进行中或已完成的解析；错误以字符串共享给所有等待方
type Resolution = Shared<BoxFuture<'static, std::result::Result<Option<FactValue>, String>>>;

const CYCLE_REASON: &str = "cyclic fact dependency";

tokio::task_local! {
    /// 当前正在执行的解析器负责的事实
    static RESOLVING: String;
}

/// 解析器之间的等待图：`edges[a][b]` 为解析 a 时正在等待 b 的次数
#[derive(Default)]
struct WaitGraph {
    edges: HashMap<String, HashMap<String, usize>>,
}

impl WaitGraph {
    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if seen.insert(node) {
                if let Some(next) = self.edges.get(node) {
                    stack.extend(next.keys().map(String::as_str));
                }
            }
        }
        false
    }
}

/// 等待期间持有的一条依赖边，释放时从等待图中移除
struct WaitEdge<'a> {
    store: &'a FactStore,
    from: String,
    to: String,
}

impl Drop for WaitEdge<'_> {
    fn drop(&mut self) {
        let mut graph = self.store.inner.waits.lock();
        let emptied = match graph.edges.get_mut(&self.from) {
            Some(targets) => {
                if let Some(count) = targets.get_mut(&self.to) {
                    *count -= 1;
                    if *count == 0 {
                        targets.remove(&self.to);
                    }
                }
                targets.is_empty()
            }
            None => false,
        };
        if emptied {
            graph.edges.remove(&self.from);
        }
    }
}

struct Inner {
    known: DashMap<String, FactValue>,
    resolvers: HashMap<String, FactResolver>,
    resolutions: DashMap<String, Resolution>,
    waits: Mutex<WaitGraph>,
}

/// 事实存储
#[derive(Clone)]
pub struct FactStore {
    inner: Arc<Inner>,
}

impl FactStore {
    /// 创建新的事实存储
    pub fn new(
        known: impl IntoIterator<Item = (String, FactValue)>,
        resolvers: HashMap<String, FactResolver>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                known: known.into_iter().collect(),
                resolvers,
                resolutions: DashMap::new(),
                waits: Mutex::new(WaitGraph::default()),
            }),
        }
    }

    /// 获取事实值
    ///
    /// - 已知事实直接返回，不挂起
    /// - 有异步解析器时执行解析（每次运行最多一次），并写回已知事实
    /// - 否则返回 None（不是错误）
    #[instrument(skip(self), level = "trace")]
    pub async fn get_fact(&self, name: &str) -> Result<Option<FactValue>> {
        if let Some(value) = self.inner.known.get(name) {
            return Ok(Some(value.clone()));
        }

        let Some(resolver) = self.inner.resolvers.get(name).cloned() else {
            return Ok(None);
        };

        let _waiting = self.enter_wait(name)?;
        self.resolution(name, resolver)
            .await
            .map_err(|reason| RuleError::FactResolution {
                fact: name.to_string(),
                reason,
            })
    }

    /// 在解析器内部请求其他事实时登记等待边；若会成环则拒绝
    fn enter_wait(&self, target: &str) -> Result<Option<WaitEdge<'_>>> {
        let Ok(from) = RESOLVING.try_with(Clone::clone) else {
            return Ok(None);
        };

        let mut graph = self.inner.waits.lock();
        if graph.reaches(target, &from) {
            warn!(fact = %from, dependency = %target, "cyclic fact dependency");
            return Err(RuleError::FactResolution {
                fact: target.to_string(),
                reason: CYCLE_REASON.to_string(),
            });
        }
        *graph
            .edges
            .entry(from.clone())
            .or_default()
            .entry(target.to_string())
            .or_default() += 1;

        Ok(Some(WaitEdge {
            store: self,
            from,
            to: target.to_string(),
        }))
    }

    /// 取得该键的共享解析 future，首个请求方负责创建
    fn resolution(&self, name: &str, resolver: FactResolver) -> Resolution {
        let entry = self
            .inner
            .resolutions
            .entry(name.to_string())
            .or_insert_with(|| {
                let store = self.clone();
                let name = name.to_string();
                async move {
                    debug!(fact = %name, "resolving async fact");
                    let resolving = RESOLVING.scope(name.clone(), resolver(store.clone()));
                    match AssertUnwindSafe(resolving).catch_unwind().await {
                        Ok(Ok(Some(value))) => Ok(Some(store.write_back(name, value))),
                        Ok(Ok(None)) => {
                            debug!(fact = %name, "async fact resolved to absent");
                            Ok(None)
                        }
                        Ok(Err(e)) => {
                            warn!(fact = %name, error = %e, "async fact resolution failed");
                            Err(format!("{:#}", e))
                        }
                        Err(panic) => {
                            let message = panic_message(panic.as_ref());
                            warn!(fact = %name, panic = message, "async fact resolver panicked");
                            Err(format!("resolver panicked: {message}"))
                        }
                    }
                }
                .boxed()
                .shared()
            });

        entry.value().clone()
    }

    /// 写回解析结果；若期间已有更新的已知值，保留已有值并返回它
    fn write_back(&self, name: String, value: FactValue) -> FactValue {
        match self.inner.known.entry(name) {
            Entry::Occupied(existing) => {
                debug!(fact = %existing.key(), "discarding stale async resolution");
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                debug!(fact = %slot.key(), "async fact written back");
                slot.insert(value).value().clone()
            }
        }
    }

    /// 写入运行时事实（无条件覆盖）
    pub fn add_runtime_fact(&self, name: impl Into<String>, value: impl Into<FactValue>) {
        self.inner.known.insert(name.into(), value.into());
    }

    /// 已知事实的快照
    pub fn known_facts(&self) -> HashMap<String, FactValue> {
        self.inner
            .known
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// 检查是否已有已知值（不会触发解析）
    pub fn is_known(&self, name: &str) -> bool {
        self.inner.known.contains_key(name)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl Default for FactStore {
    fn default() -> Self {
        Self::new(Vec::new(), HashMap::new())
    }
}

impl std::fmt::Debug for FactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactStore")
            .field("known", &self.inner.known.len())
            .field("resolvers", &self.inner.resolvers.len())
            .field("resolutions", &self.inner.resolutions.len())
            .finish()
    }
}
