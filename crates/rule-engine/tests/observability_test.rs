//! 日志初始化测试
//!
//! 全局 subscriber 只能安装一次，放在独立的测试二进制中，避免影响其他测试的输出。

use rule_engine::{observability, ObservabilityConfig};

#[test]
fn test_second_init_is_an_error_not_a_panic() {
    let config = ObservabilityConfig {
        log_level: "warn".to_string(),
        ..ObservabilityConfig::default()
    };

    assert!(observability::init(&config).is_ok());
    assert!(observability::init(&config).is_err());
}
