//! 事实值类型
//!
//! 事实值与比较值都使用同一个封闭的和类型表示，操作符可以穷尽匹配而无需运行时类型探测。
//! 缺失的事实用 `Option::None` 表示，而不是 `FactValue` 的某个变体。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// 事实值
///
/// 相等比较是深度结构比较；数值统一为 `f64`，因此 `5` 与 `5.0` 相等。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<FactValue>),
    Object(BTreeMap<String, FactValue>),
}

impl FactValue {
    /// 获取值的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    pub fn as_array(&self) -> Option<&[FactValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// 尝试转换为 f64（数字字符串也视为数值）
    ///
    /// NaN 不是数值；字符串只接受有限值，`"NaN"`、`"inf"` 之类的字面量不算数字。
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) if !n.is_nan() => Some(*n),
            Self::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }
}

/// 可选事实值的类型名称，缺失时为 "absent"
pub fn type_name_of(value: Option<&FactValue>) -> &'static str {
    value.map_or("absent", FactValue::type_name)
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

impl From<Value> for FactValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            // serde_json 的数字总能转换为 f64（可能损失精度）
            Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<FactValue> for Value {
    fn from(value: FactValue) -> Self {
        match value {
            FactValue::Null => Value::Null,
            FactValue::Bool(b) => Value::Bool(b),
            FactValue::Number(n) => serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number),
            FactValue::String(s) => Value::String(s),
            FactValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            FactValue::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for FactValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for FactValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FactValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for FactValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for FactValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FactValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<FactValue>> From<Vec<T>> for FactValue {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_value() {
        let value = FactValue::from(json!({
            "ids": [1, 2, 3],
            "name": "gold",
            "vip": true,
            "parent": null
        }));

        let FactValue::Object(map) = &value else {
            panic!("expected object, got {value:?}");
        };
        assert_eq!(map["ids"], FactValue::from(vec![1, 2, 3]));
        assert_eq!(map["name"], FactValue::from("gold"));
        assert_eq!(map["vip"], FactValue::Bool(true));
        assert_eq!(map["parent"], FactValue::Null);
    }

    #[test]
    fn test_deep_equality_ignores_integer_float_split() {
        assert_eq!(FactValue::from(json!([1, [2, 3]])), FactValue::from(json!([1.0, [2.0, 3]])));
        assert_ne!(FactValue::from(json!([1, 2])), FactValue::from(json!([2, 1])));
    }

    #[test]
    fn test_deserialize_untagged() {
        let value: FactValue = serde_json::from_str(r#"[5, "a", false, {"k": null}]"#).unwrap();
        assert_eq!(value.type_name(), "array");
        assert_eq!(value.as_array().map(<[FactValue]>::len), Some(4));
    }

    #[test]
    fn test_as_f64() {
        assert_eq!(FactValue::from(5).as_f64(), Some(5.0));
        assert_eq!(FactValue::from("4.5").as_f64(), Some(4.5));
        assert_eq!(FactValue::from("abc").as_f64(), None);
        assert_eq!(FactValue::Bool(true).as_f64(), None);
        assert_eq!(FactValue::from("NaN").as_f64(), None);
        assert_eq!(FactValue::from("infinity").as_f64(), None);
        assert_eq!(FactValue::Number(f64::NAN).as_f64(), None);
        assert_eq!(FactValue::Number(f64::INFINITY).as_f64(), Some(f64::INFINITY));
        assert_eq!(type_name_of(None), "absent");
    }
}
