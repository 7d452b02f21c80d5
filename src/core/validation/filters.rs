//! Post-coercion handlers
//!
//! A handler receives the argument name and its coerced value and returns the
//! value that validators will see. Returning an error stops validation of the
//! field with the error text as message.

use anyhow::{Result, bail};
use serde_json::{Value, json};
use std::sync::Arc;

/// Type-erased handler stored on an [`Argument`](super::parser::Argument)
pub type Handler = Arc<dyn Fn(&str, Value) -> Result<Value> + Send + Sync>;

/// Strip surrounding whitespace from strings
pub fn trim() -> impl Fn(&str, Value) -> Result<Value> + Send + Sync + Clone {
    |_: &str, value: Value| match value {
        Value::String(s) => Ok(Value::String(s.trim().to_string())),
        other => Ok(other),
    }
}

pub fn lowercase() -> impl Fn(&str, Value) -> Result<Value> + Send + Sync + Clone {
    |_: &str, value: Value| match value {
        Value::String(s) => Ok(Value::String(s.to_lowercase())),
        other => Ok(other),
    }
}

pub fn uppercase() -> impl Fn(&str, Value) -> Result<Value> + Send + Sync + Clone {
    |_: &str, value: Value| match value {
        Value::String(s) => Ok(Value::String(s.to_uppercase())),
        other => Ok(other),
    }
}

/// Round numbers to `decimals` places; non-finite results are rejected
pub fn round_decimals(decimals: u32) -> impl Fn(&str, Value) -> Result<Value> + Send + Sync + Clone {
    move |field: &str, value: Value| {
        let Some(number) = value.as_f64() else {
            return Ok(value);
        };
        let factor = 10_f64.powi(decimals as i32);
        let rounded = (number * factor).round() / factor;
        if !rounded.is_finite() {
            bail!("'{}' cannot be rounded to {} decimals", field, decimals);
        }
        Ok(json!(rounded))
    }
}
