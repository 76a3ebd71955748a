//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("规则解析失败: {0}")]
    ParseError(String),

    #[error("叶子条件缺少 fact 键: 请提供要比较的事实名称")]
    MissingFactKey,

    #[error("条件 '{path}' 同时声明了多种形态")]
    AmbiguousCondition { path: String },

    #[error("类型不匹配: {operator} 期望 {expected}, 实际 {actual}")]
    TypeMismatch {
        operator: String,
        expected: String,
        actual: String,
    },

    #[error("不支持的操作符: {0}")]
    UnknownOperator(String),

    #[error("事实解析失败: {fact}: {reason}")]
    FactResolution { fact: String, reason: String },

    #[error("{} 条规则评估失败: {}", .0.len(), summarize(.0))]
    RulesFailed(Vec<RuleFailure>),

    #[error("全部 {} 条规则评估失败: {}", .0.len(), summarize(.0))]
    AllRulesFailed(Vec<RuleFailure>),

    #[error("规则执行已取消")]
    Cancelled,

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("配置加载失败: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, RuleError>;

/// 单条规则的失败记录
#[derive(Debug)]
pub struct RuleFailure {
    /// 规则名称（可选）
    pub rule: Option<String>,
    /// 规则在优先级排序后的位置
    pub position: usize,
    pub priority: i32,
    pub error: Box<RuleError>,
}

impl RuleFailure {
    pub fn label(&self) -> &str {
        self.rule.as_deref().unwrap_or("<unnamed>")
    }
}

fn summarize(failures: &[RuleFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("[{}#{}] {}", f.label(), f.position, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}
