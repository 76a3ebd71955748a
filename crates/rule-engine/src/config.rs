//! 配置管理模块
//!
//! 支持 TOML 配置文件加载与环境变量覆盖。

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::error::Result;

/// 未识别操作符的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownOperatorPolicy {
    /// 记录警告并返回 true
    #[default]
    Allow,
    /// 记录警告并返回 false
    Deny,
    /// 以 `RuleError::UnknownOperator` 失败
    Error,
}

/// 宽松条件形态的编译策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapePolicy {
    /// every > some > not > 叶子，取第一个非空形态
    #[default]
    Precedence,
    /// 拒绝多种形态并存或没有任何形态的节点
    Strict,
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// 规则引擎配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub unknown_operator: UnknownOperatorPolicy,
    pub condition_shape: ShapePolicy,
    pub observability: ObservabilityConfig,
}

impl EngineConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. {CONFIG_DIR}/default.toml
    /// 2. {CONFIG_DIR}/{name}.toml
    /// 3. 环境变量（RULE_ENGINE 前缀，`__` 分隔，如 RULE_ENGINE__UNKNOWN_OPERATOR -> unknown_operator）
    pub fn load(name: &str) -> Result<Self> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let config = Config::builder()
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", name))).required(false),
            )
            .add_source(
                Environment::with_prefix("RULE_ENGINE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> EngineConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_toml("");
        assert_eq!(config.unknown_operator, UnknownOperatorPolicy::Allow);
        assert_eq!(config.condition_shape, ShapePolicy::Precedence);
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.observability.log_format, "pretty");
    }

    #[test]
    fn test_overrides() {
        let config = from_toml(
            r#"
            unknown_operator = "error"
            condition_shape = "strict"

            [observability]
            log_format = "json"
            "#,
        );
        assert_eq!(config.unknown_operator, UnknownOperatorPolicy::Error);
        assert_eq!(config.condition_shape, ShapePolicy::Strict);
        assert_eq!(config.observability.log_format, "json");
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_load_without_files_uses_defaults() {
        let config = EngineConfig::load("nonexistent-service").unwrap();
        assert_eq!(config.condition_shape, ShapePolicy::Precedence);
    }
}
