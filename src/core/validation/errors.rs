//! Validation outcomes
//!
//! A single validator either passes, reports an accumulating failure
//! (the next validator for the field still runs) or stops the chain for
//! that field.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Failure raised by one validator for one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// Record the message and skip the remaining validators of the field
    Stop(String),
    /// Record the message and keep validating the field
    Invalid(String),
}

impl ValidationFailure {
    pub fn stop(message: impl Into<String>) -> Self {
        ValidationFailure::Stop(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ValidationFailure::Invalid(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            ValidationFailure::Stop(msg) | ValidationFailure::Invalid(msg) => msg,
        }
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, ValidationFailure::Stop(_))
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ValidationFailure {}

/// Field name to messages, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors {
    fields: IndexMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors for a single field
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn merge(&mut self, other: FormErrors) {
        for (field, messages) in other.fields {
            self.fields.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.fields.iter()
    }

    /// Flatten into one line: `field: msg; msg, other: msg`
    pub fn describe(&self) -> String {
        self.fields
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join("; ")))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed: {}", self.describe())
    }
}

impl std::error::Error for FormErrors {}
