//! 规则引擎演示程序
//!
//! 一个已知事实、一个依赖它的异步事实、两条不同优先级的规则和一个 success 事件处理器。

use anyhow::Result;
use rule_engine::{
    observability, Condition, EngineConfig, FactValue, Operator, Rule, RuleEngine, RuleEvent,
};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = EngineConfig::load("rule-engine").unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        EngineConfig::default()
    });
    observability::init(&config.observability)?;

    info!("Starting rule engine demo...");

    let rule = Rule::new(Condition::some(vec![
        Condition::every(vec![
            Condition::leaf("testId", Operator::GreaterThan, 4),
            Condition::leaf("testId", Operator::LessThan, 6),
        ]),
        Condition::leaf("asyncFact", Operator::Contains, 5),
    ]))
    .with_name("test")
    .with_priority(5)
    .with_event(RuleEvent::new("success", json!({ "msg": "this is my message" })));

    let first_rule = Rule::new(Condition::some(vec![Condition::leaf(
        "testId",
        Operator::LessThan,
        50,
    )]))
    .with_name("first rule")
    .with_priority(1)
    .with_event(RuleEvent::new(
        "success",
        json!({ "msg": "this is my message from first rule" }),
    ));

    let engine = RuleEngine::with_config(config)
        .add_fact("testId", 5)
        .add_rules([rule, first_rule])
        .on_event("success", |event, _, rule| {
            info!(rule = rule.label(), msg = %event.data["msg"], "success event");
            Ok(())
        })
        .add_async_fact("asyncFact", |facts| async move {
            let known = facts.get_fact("testId").await?;
            if known == Some(FactValue::from(5)) {
                tokio::time::sleep(Duration::from_millis(800)).await;
                return Ok(Some(FactValue::from(vec![1, 2, 3, 4, 5])));
            }
            Ok(None)
        });

    let report = engine.run().await?;

    for failure in &report.failures {
        warn!(rule = failure.label(), error = %failure.error, "rule failed");
    }

    println!("{}", serde_json::to_string_pretty(&report.results)?);
    println!("{}", serde_json::to_string_pretty(&report.fact_store.known_facts())?);

    Ok(())
}
