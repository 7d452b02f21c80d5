//! Declarative request parsing
//!
//! An [`Argument`] describes one expected field: how to coerce it, how to
//! transform it and which validators it must pass. A [`JsonParser`] evaluates
//! a set of arguments against a decoded JSON object and either yields a
//! [`ParsedForm`] or the complete [`FormErrors`] for the submission.
//!
//! # Example
//!
//! ```rust,ignore
//! let parser = JsonParser::new()
//!     .argument(
//!         Argument::new("username")
//!             .required()
//!             .string()
//!             .handler(filters::trim())
//!             .validate(Length::between(3, 25)),
//!     )
//!     .argument(Argument::new("page").integer().default_value(1));
//!
//! let form = parser.parse(&json!({"username": " alice "}))?;
//! assert_eq!(form.str("username"), Some("alice"));
//! assert_eq!(form.i64("page"), Some(1));
//! ```

use super::errors::{FormErrors, ValidationFailure};
use super::filters::Handler;
use super::validators::{BoxedValidator, Validator};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::Arc;

/// Key used when the body itself is unusable
pub const BODY_FIELD: &str = "_body";

const MISSING_MESSAGE: &str = "This field is required.";

/// Caller-supplied coercion
pub type Coercion = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Coercion applied to a raw value before handlers and validators run
#[derive(Clone, Default)]
pub enum ArgType {
    #[default]
    Any,
    String,
    Integer,
    Float,
    Boolean,
    Custom(Coercion),
}

impl fmt::Debug for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArgType::Any => "Any",
            ArgType::String => "String",
            ArgType::Integer => "Integer",
            ArgType::Float => "Float",
            ArgType::Boolean => "Boolean",
            ArgType::Custom(_) => "Custom",
        };
        f.write_str(name)
    }
}

impl ArgType {
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        match self {
            ArgType::Any => Ok(value),
            ArgType::String => match value {
                Value::String(_) => Ok(value),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err("Expected a string.".to_string()),
            },
            ArgType::Integer => coerce_integer(&value)
                .map(Value::from)
                .ok_or_else(|| "Expected an integer.".to_string()),
            ArgType::Float => coerce_float(&value)
                .map(|f| json!(f))
                .ok_or_else(|| "Expected a number.".to_string()),
            ArgType::Boolean => coerce_bool(&value)
                .map(Value::Bool)
                .ok_or_else(|| "Expected a boolean.".to_string()),
            ArgType::Custom(coerce) => coerce(value),
        }
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// One expected input field
#[derive(Clone)]
pub struct Argument {
    name: String,
    required: bool,
    arg_type: ArgType,
    handler: Option<Handler>,
    validators: Vec<BoxedValidator>,
    default: Option<Value>,
    help: Option<String>,
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Argument")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("arg_type", &self.arg_type)
            .field("validators", &self.validators.len())
            .field("default", &self.default)
            .finish()
    }
}

impl Argument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            arg_type: ArgType::Any,
            handler: None,
            validators: Vec::new(),
            default: None,
            help: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn arg_type(mut self, arg_type: ArgType) -> Self {
        self.arg_type = arg_type;
        self
    }

    pub fn string(self) -> Self {
        self.arg_type(ArgType::String)
    }

    pub fn integer(self) -> Self {
        self.arg_type(ArgType::Integer)
    }

    pub fn float(self) -> Self {
        self.arg_type(ArgType::Float)
    }

    pub fn boolean(self) -> Self {
        self.arg_type(ArgType::Boolean)
    }

    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Append a validator; validators run in declaration order
    pub fn validate<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Value used when the field is absent (only for optional arguments)
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Message reported when a required field is missing
    pub fn help(mut self, message: impl Into<String>) -> Self {
        self.help = Some(message.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Evaluate the raw value of this field
    ///
    /// `Ok(None)` means the field is absent and optional without default.
    pub fn evaluate(&self, raw: Option<&Value>) -> Result<Option<Value>, Vec<String>> {
        let raw = raw.filter(|v| !v.is_null());

        let Some(raw) = raw else {
            if self.required {
                let message = self.help.as_deref().unwrap_or(MISSING_MESSAGE);
                return Err(vec![message.to_string()]);
            }
            return Ok(self.default.clone());
        };

        let mut value = self.arg_type.coerce(raw.clone()).map_err(|e| vec![e])?;

        if let Some(handler) = &self.handler {
            value = handler(&self.name, value).map_err(|e| vec![e.to_string()])?;
        }

        let mut messages = Vec::new();
        for validator in &self.validators {
            match validator.validate(&value) {
                Ok(()) => {}
                Err(ValidationFailure::Invalid(msg)) => messages.push(msg),
                Err(ValidationFailure::Stop(msg)) => {
                    if !msg.is_empty() {
                        messages.push(msg);
                    }
                    break;
                }
            }
        }

        if messages.is_empty() {
            Ok(Some(value))
        } else {
            Err(messages)
        }
    }
}

/// A set of arguments evaluated together against one submission
#[derive(Clone, Debug, Default)]
pub struct JsonParser {
    arguments: Vec<Argument>,
}

impl JsonParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Parse a decoded JSON body
    ///
    /// `null` is treated as an empty object; any other non-object body fails
    /// as a whole under [`BODY_FIELD`].
    pub fn parse(&self, body: &Value) -> Result<ParsedForm, FormErrors> {
        match body {
            Value::Object(map) => self.parse_map(map),
            Value::Null => self.parse_map(&Map::new()),
            _ => Err(FormErrors::single(BODY_FIELD, "Expected a JSON object.")),
        }
    }

    pub fn parse_map(&self, mapping: &Map<String, Value>) -> Result<ParsedForm, FormErrors> {
        let mut errors = FormErrors::new();
        let mut values = Map::new();

        for argument in &self.arguments {
            match argument.evaluate(mapping.get(argument.name())) {
                Ok(Some(value)) => {
                    values.insert(argument.name().to_string(), value);
                }
                Ok(None) => {}
                Err(messages) => {
                    for message in messages {
                        errors.push(argument.name(), message);
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(ParsedForm { values })
        } else {
            Err(errors)
        }
    }
}

/// Values that passed parsing, keyed by argument name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedForm {
    values: Map<String, Value>,
}

impl ParsedForm {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Deserialize the parsed values into a typed struct
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.values))
    }

    pub fn into_record(self) -> Map<String, Value> {
        self.values
    }
}
