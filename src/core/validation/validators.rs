//! Reusable field validators
//!
//! Each validator inspects one JSON value and either accepts it or returns a
//! [`ValidationFailure`]. Messages can be overridden with `with_message`;
//! `{min}`, `{max}`, `{length}` and `{values}` placeholders are substituted
//! where the validator knows them.

use super::errors::ValidationFailure;
use chrono::NaiveDateTime;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use validator::{ValidateEmail, ValidateIp};

static MAC_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9a-fA-F]{2}:){5}[0-9a-fA-F]{2}$").expect("mac address pattern")
});

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z]+://(?P<host>[^/?:]+)(?P<port>:[0-9]+)?(?P<path>/.*?)?(?P<query>\?.*)?$")
        .expect("url pattern")
});

static HOSTNAME_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(xn-|[a-z0-9_]+)(-[a-z0-9_-]+)*$").expect("hostname label pattern")
});

static TLD_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z]{2,20}|xn--([a-z0-9]+-)*[a-z0-9]+)$").expect("tld pattern")
});

/// A check over a single submitted value
pub trait Validator: Send + Sync {
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure>;
}

impl<F> Validator for F
where
    F: Fn(&Value) -> Result<(), ValidationFailure> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure> {
        self(value)
    }
}

/// Shared handle used by argument declarations
pub type BoxedValidator = Arc<dyn Validator>;

fn interpolate(template: &str, pairs: &[(&str, String)]) -> String {
    pairs.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}

/// Human rendering of a JSON value inside a message (strings unquoted)
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_list(values: &[Value]) -> String {
    values.iter().map(render).collect::<Vec<_>>().join(", ")
}

fn render_number(value: f64) -> String {
    format!("{}", value)
}

/// Python-style truthiness: null, false, 0, "" and empty containers are falsy
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

// =============================================================================
// Length / NumberRange
// =============================================================================

/// Length bounds in characters (strings) or items (arrays and objects)
///
/// `null` counts as length zero; other scalars are measured on their JSON text.
#[derive(Debug, Clone)]
pub struct Length {
    min: Option<usize>,
    max: Option<usize>,
    message: Option<String>,
}

impl Length {
    pub fn min(min: usize) -> Self {
        Self {
            min: Some(min),
            max: None,
            message: None,
        }
    }

    pub fn max(max: usize) -> Self {
        Self {
            min: None,
            max: Some(max),
            message: None,
        }
    }

    /// # Panics
    ///
    /// Panics when `min > max`; bounds are declared once at startup.
    pub fn between(min: usize, max: usize) -> Self {
        assert!(min <= max, "Length: min ({}) must not exceed max ({})", min, max);
        Self {
            min: Some(min),
            max: Some(max),
            message: None,
        }
    }

    pub fn exactly(length: usize) -> Self {
        Self::between(length, length)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn measure(value: &Value) -> usize {
        match value {
            Value::Null => 0,
            Value::String(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            other => other.to_string().chars().count(),
        }
    }

    fn default_message(&self) -> &'static str {
        match (self.min, self.max) {
            (_, None) => "Field must be at least {min} characters long.",
            (None, Some(_)) => "Field cannot be longer than {max} characters.",
            (Some(min), Some(max)) if min == max => "Field must be exactly {max} characters long.",
            _ => "Field must be between {min} and {max} characters long.",
        }
    }
}

impl Validator for Length {
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure> {
        let length = Self::measure(value);
        let above_min = self.min.is_none_or(|min| length >= min);
        let below_max = self.max.is_none_or(|max| length <= max);
        if above_min && below_max {
            return Ok(());
        }

        let template = self.message.as_deref().unwrap_or(self.default_message());
        Err(ValidationFailure::invalid(interpolate(
            template,
            &[
                ("min", self.min.map(|m| m.to_string()).unwrap_or_default()),
                ("max", self.max.map(|m| m.to_string()).unwrap_or_default()),
                ("length", length.to_string()),
            ],
        )))
    }
}

/// Inclusive numeric bounds; non-numbers always fail
#[derive(Debug, Clone)]
pub struct NumberRange {
    min: Option<f64>,
    max: Option<f64>,
    message: Option<String>,
}

impl NumberRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            message: None,
        }
    }

    pub fn at_least(min: f64) -> Self {
        Self::new(Some(min), None)
    }

    pub fn at_most(max: f64) -> Self {
        Self::new(None, Some(max))
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self::new(Some(min), Some(max))
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn default_message(&self) -> &'static str {
        match (self.min, self.max) {
            (Some(_), None) => "Number must be at least {min}.",
            (None, Some(_)) => "Number must be at most {max}.",
            _ => "Number must be between {min} and {max}.",
        }
    }
}

impl Validator for NumberRange {
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure> {
        if let Some(number) = value.as_f64() {
            let above_min = self.min.is_none_or(|min| number >= min);
            let below_max = self.max.is_none_or(|max| number <= max);
            if above_min && below_max {
                return Ok(());
            }
        }

        let template = self.message.as_deref().unwrap_or(self.default_message());
        Err(ValidationFailure::invalid(interpolate(
            template,
            &[
                ("min", self.min.map(render_number).unwrap_or_default()),
                ("max", self.max.map(render_number).unwrap_or_default()),
            ],
        )))
    }
}

// =============================================================================
// DataRequired
// =============================================================================

/// Rejects falsy and whitespace-only values, stopping the chain
#[derive(Debug, Clone, Default)]
pub struct DataRequired {
    message: Option<String>,
}

impl DataRequired {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for DataRequired {
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure> {
        let present = match value {
            Value::String(s) => !s.trim().is_empty(),
            other => is_truthy(other),
        };
        if present {
            Ok(())
        } else {
            Err(ValidationFailure::stop(
                self.message.as_deref().unwrap_or("This field is required."),
            ))
        }
    }
}

// =============================================================================
// Pattern-based validators
// =============================================================================

/// Regex that must match at the start of the string
#[derive(Debug, Clone)]
pub struct Regexp {
    regex: Regex,
    message: Option<String>,
}

impl Regexp {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::from_regex(Regex::new(pattern)?))
    }

    pub fn from_regex(regex: Regex) -> Self {
        Self {
            regex,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for Regexp {
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure> {
        let matched = match value {
            Value::String(s) => self.regex.find(s).is_some_and(|m| m.start() == 0),
            Value::Null => self.regex.find("").is_some_and(|m| m.start() == 0),
            _ => false,
        };
        if matched {
            Ok(())
        } else {
            Err(ValidationFailure::invalid(
                self.message.as_deref().unwrap_or("Invalid input."),
            ))
        }
    }
}

/// Email address: a valid local part, `@`, and a dotted domain
#[derive(Debug, Clone, Default)]
pub struct Email {
    message: Option<String>,
}

impl Email {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn accepts(candidate: &str) -> bool {
        if !candidate.validate_email() {
            return false;
        }
        match candidate.rsplit_once('@') {
            Some((_, domain)) => {
                domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
            }
            None => false,
        }
    }
}

impl Validator for Email {
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure> {
        match value.as_str() {
            Some(s) if Self::accepts(s) => Ok(()),
            _ => Err(ValidationFailure::invalid(
                self.message.as_deref().unwrap_or("Invalid email address."),
            )),
        }
    }
}

/// IPv4 and/or IPv6 address
///
/// The constructors always enable at least one family.
#[derive(Debug, Clone)]
pub struct IpAddress {
    ipv4: bool,
    ipv6: bool,
    message: Option<String>,
}

impl IpAddress {
    pub fn v4() -> Self {
        Self {
            ipv4: true,
            ipv6: false,
            message: None,
        }
    }

    pub fn v6() -> Self {
        Self {
            ipv4: false,
            ipv6: true,
            message: None,
        }
    }

    pub fn any() -> Self {
        Self {
            ipv4: true,
            ipv6: true,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn check(&self, candidate: &str) -> bool {
        (self.ipv4 && candidate.validate_ipv4()) || (self.ipv6 && candidate.validate_ipv6())
    }
}

impl Default for IpAddress {
    fn default() -> Self {
        Self::v4()
    }
}

impl Validator for IpAddress {
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure> {
        match value.as_str() {
            Some(s) if self.check(s) => Ok(()),
            _ => Err(ValidationFailure::invalid(
                self.message.as_deref().unwrap_or("Invalid IP address."),
            )),
        }
    }
}

/// Six colon-separated hex pairs
#[derive(Debug, Clone, Default)]
pub struct MacAddress {
    message: Option<String>,
}

impl MacAddress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for MacAddress {
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure> {
        match value.as_str() {
            Some(s) if MAC_ADDRESS.is_match(s) => Ok(()),
            _ => Err(ValidationFailure::invalid(
                self.message.as_deref().unwrap_or("Invalid Mac address."),
            )),
        }
    }
}

// =============================================================================
// URL
// =============================================================================

/// Hostname rules shared by [`Url`]
///
/// Labels are ASCII only; internationalized names must arrive in their
/// `xn--` form.
#[derive(Debug, Clone, Copy)]
pub struct HostnameValidation {
    pub require_tld: bool,
    pub allow_ip: bool,
}

impl HostnameValidation {
    pub fn new(require_tld: bool, allow_ip: bool) -> Self {
        Self {
            require_tld,
            allow_ip,
        }
    }

    pub fn check(&self, hostname: &str) -> bool {
        if self.allow_ip && IpAddress::any().check(hostname) {
            return true;
        }
        if !hostname.is_ascii() {
            return false;
        }

        let hostname = hostname.strip_suffix('.').unwrap_or(hostname);
        if hostname.len() > 253 {
            return false;
        }

        let parts: Vec<&str> = hostname.split('.').collect();
        for part in &parts {
            if part.is_empty() || part.len() > 63 || !HOSTNAME_PART.is_match(part) {
                return false;
            }
        }

        if self.require_tld {
            let tld_ok = parts.last().is_some_and(|tld| TLD_PART.is_match(tld));
            if parts.len() < 2 || !tld_ok {
                return false;
            }
        }
        true
    }
}

/// `scheme://host[:port][/path][?query]` with a valid host
#[derive(Debug, Clone)]
pub struct Url {
    hostname: HostnameValidation,
    message: Option<String>,
}

impl Url {
    pub fn new() -> Self {
        Self {
            hostname: HostnameValidation::new(true, true),
            message: None,
        }
    }

    /// Accept single-label hosts such as `localhost`
    pub fn without_tld(mut self) -> Self {
        self.hostname.require_tld = false;
        self
    }

    pub fn deny_ip(mut self) -> Self {
        self.hostname.allow_ip = false;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Default for Url {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for Url {
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure> {
        let valid = value
            .as_str()
            .and_then(|s| URL.captures(s))
            .and_then(|caps| caps.name("host").map(|m| m.as_str().to_string()))
            .is_some_and(|host| self.hostname.check(&host));
        if valid {
            Ok(())
        } else {
            Err(ValidationFailure::invalid(
                self.message.as_deref().unwrap_or("Invalid URL."),
            ))
        }
    }
}

// =============================================================================
// UUID / datetime
// =============================================================================

/// Any textual UUID form accepted by `uuid::Uuid::parse_str`
#[derive(Debug, Clone, Default)]
pub struct UuidFormat {
    message: Option<String>,
}

impl UuidFormat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for UuidFormat {
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure> {
        match value.as_str().map(uuid::Uuid::parse_str) {
            Some(Ok(_)) => Ok(()),
            _ => Err(ValidationFailure::invalid(
                self.message.as_deref().unwrap_or("Invalid UUID."),
            )),
        }
    }
}

/// Strings must parse with the configured `strftime` format
///
/// Non-string values are left to other validators.
#[derive(Debug, Clone)]
pub struct DateTimeFormat {
    format: String,
    message: Option<String>,
}

impl DateTimeFormat {
    pub fn new() -> Self {
        Self::with_format(crate::core::response::DATETIME_FORMAT)
    }

    pub fn with_format(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Default for DateTimeFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for DateTimeFormat {
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure> {
        let Some(raw) = value.as_str() else {
            return Ok(());
        };
        NaiveDateTime::parse_from_str(raw, &self.format)
            .map(|_| ())
            .map_err(|_| {
                ValidationFailure::invalid(self.message.as_deref().unwrap_or("Invalid datetime."))
            })
    }
}

// =============================================================================
// Membership
// =============================================================================

/// Value must equal one of the listed values
#[derive(Debug, Clone)]
pub struct AnyOf {
    values: Vec<Value>,
    message: Option<String>,
}

impl AnyOf {
    pub fn new<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for AnyOf {
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure> {
        if self.values.contains(value) {
            return Ok(());
        }
        let template = self
            .message
            .as_deref()
            .unwrap_or("Invalid value, must be one of: {values}.");
        Err(ValidationFailure::invalid(interpolate(
            template,
            &[("values", render_list(&self.values))],
        )))
    }
}

/// Value must differ from every listed value
#[derive(Debug, Clone)]
pub struct NoneOf {
    values: Vec<Value>,
    message: Option<String>,
}

impl NoneOf {
    pub fn new<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for NoneOf {
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure> {
        if !self.values.contains(value) {
            return Ok(());
        }
        let template = self
            .message
            .as_deref()
            .unwrap_or("Invalid value, can't be any of: {values}.");
        Err(ValidationFailure::invalid(interpolate(
            template,
            &[("values", render_list(&self.values))],
        )))
    }
}

/// Select-style field: value must be one of the offered choices
#[derive(Debug, Clone)]
pub struct Choice {
    choices: Vec<Value>,
    message: Option<String>,
}

impl Choice {
    pub fn new<I, V>(choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            choices: choices.into_iter().map(Into::into).collect(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Validator for Choice {
    fn validate(&self, value: &Value) -> Result<(), ValidationFailure> {
        if self.choices.contains(value) {
            Ok(())
        } else {
            Err(ValidationFailure::invalid(
                self.message.as_deref().unwrap_or("Invalid choice."),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(result: Result<(), ValidationFailure>) -> String {
        result.unwrap_err().message().to_string()
    }

    // === Length ===

    #[test]
    fn test_length_messages() {
        assert_eq!(
            message(Length::min(3).validate(&json!("ab"))),
            "Field must be at least 3 characters long."
        );
        assert_eq!(
            message(Length::max(2).validate(&json!("abc"))),
            "Field cannot be longer than 2 characters."
        );
        assert_eq!(
            message(Length::exactly(4).validate(&json!("abc"))),
            "Field must be exactly 4 characters long."
        );
        assert_eq!(
            message(Length::between(3, 25).validate(&json!("ab"))),
            "Field must be between 3 and 25 characters long."
        );
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        assert!(Length::max(3).validate(&json!("héé")).is_ok());
        assert!(Length::between(1, 2).validate(&json!(["a", "b"])).is_ok());
    }

    #[test]
    fn test_length_null_is_zero() {
        assert!(Length::max(5).validate(&json!(null)).is_ok());
        assert!(Length::min(1).validate(&json!(null)).is_err());
    }

    #[test]
    fn test_length_custom_message_placeholders() {
        let v = Length::min(5).with_message("need {min}, got {length}");
        assert_eq!(message(v.validate(&json!("abc"))), "need 5, got 3");
    }

    #[test]
    #[should_panic]
    fn test_length_inverted_bounds_panics() {
        let _ = Length::between(5, 1);
    }

    // === NumberRange ===

    #[test]
    fn test_number_range() {
        assert!(NumberRange::between(1.0, 10.0).validate(&json!(5)).is_ok());
        assert!(NumberRange::at_least(1.0).validate(&json!(1)).is_ok());
        assert_eq!(
            message(NumberRange::at_least(1.0).validate(&json!(0))),
            "Number must be at least 1."
        );
        assert_eq!(
            message(NumberRange::at_most(2.5).validate(&json!(3))),
            "Number must be at most 2.5."
        );
        assert_eq!(
            message(NumberRange::between(1.0, 100.0).validate(&json!("7"))),
            "Number must be between 1 and 100."
        );
    }

    // === DataRequired ===

    #[test]
    fn test_data_required_stops() {
        for empty in [json!(null), json!(""), json!("   "), json!(false), json!(0), json!([])] {
            let failure = DataRequired::new().validate(&empty).unwrap_err();
            assert!(failure.is_stop());
            assert_eq!(failure.message(), "This field is required.");
        }
        assert!(DataRequired::new().validate(&json!("x")).is_ok());
        assert!(DataRequired::new().validate(&json!(3)).is_ok());
    }

    // === Regexp ===

    #[test]
    fn test_regexp_matches_at_start_only() {
        let v = Regexp::new(r"[a-z]+").unwrap();
        assert!(v.validate(&json!("abc123")).is_ok());
        assert_eq!(message(v.validate(&json!("123abc"))), "Invalid input.");
        assert!(v.validate(&json!(12)).is_err());
    }

    #[test]
    fn test_regexp_invalid_pattern() {
        assert!(Regexp::new("(unclosed").is_err());
    }

    // === Email ===

    #[test]
    fn test_email_accepts_well_formed() {
        for ok in ["foo@bar.com", "first.last+tag@sub.example.org", "a_b@x.io"] {
            assert!(Email::new().validate(&json!(ok)).is_ok(), "{}", ok);
        }
    }

    #[test]
    fn test_email_rejects_missing_parts() {
        for bad in ["foo", "foo@", "@bar.com", "foo@bar", "foo@.com", "", "foo bar@baz.com"] {
            assert_eq!(
                message(Email::new().validate(&json!(bad))),
                "Invalid email address.",
                "{}",
                bad
            );
        }
        assert!(Email::new().validate(&json!(null)).is_err());
    }

    // === IpAddress ===

    #[test]
    fn test_ip_address_families() {
        assert!(IpAddress::default().validate(&json!("127.0.0.1")).is_ok());
        assert!(IpAddress::default().validate(&json!("::1")).is_err());
        assert!(IpAddress::v6().validate(&json!("::1")).is_ok());
        assert!(IpAddress::v6().validate(&json!("10.0.0.1")).is_err());
        assert!(IpAddress::any().validate(&json!("fe80::1")).is_ok());
        assert_eq!(
            message(IpAddress::any().validate(&json!("300.1.1.1"))),
            "Invalid IP address."
        );
    }

    // === MacAddress ===

    #[test]
    fn test_mac_address() {
        assert!(MacAddress::new().validate(&json!("01:23:45:67:ab:CD")).is_ok());
        assert_eq!(
            message(MacAddress::new().validate(&json!("01:23:45:67:ab"))),
            "Invalid Mac address."
        );
        assert!(MacAddress::new().validate(&json!("01-23-45-67-ab-cd")).is_err());
    }

    // === Url ===

    #[test]
    fn test_url_accepts() {
        for ok in [
            "http://example.com",
            "https://sub.example.co.uk:8443/path?q=1",
            "ftp://127.0.0.1/file",
            "http://xn--bcher-kva.example/",
        ] {
            assert!(Url::new().validate(&json!(ok)).is_ok(), "{}", ok);
        }
    }

    #[test]
    fn test_url_rejects() {
        for bad in ["example.com", "http://", "http://localhost", "http://exa mple.com", "http://-bad.com"] {
            assert_eq!(message(Url::new().validate(&json!(bad))), "Invalid URL.", "{}", bad);
        }
    }

    #[test]
    fn test_url_options() {
        assert!(Url::new().without_tld().validate(&json!("http://localhost:5000/")).is_ok());
        assert!(Url::new().deny_ip().validate(&json!("http://10.0.0.1/")).is_err());
    }

    #[test]
    fn test_hostname_label_limits() {
        let rules = HostnameValidation::new(true, false);
        let long_label = "a".repeat(64);
        assert!(!rules.check(&format!("{}.com", long_label)));
        assert!(rules.check(&format!("{}.com", "a".repeat(63))));
        assert!(rules.check("example.com."));
        assert!(!rules.check("bücher.de"));
    }

    // === UUID / datetime ===

    #[test]
    fn test_uuid_format() {
        assert!(UuidFormat::new()
            .validate(&json!("67e55044-10b1-426f-9247-bb680e5fe0c8"))
            .is_ok());
        assert_eq!(message(UuidFormat::new().validate(&json!("not-a-uuid"))), "Invalid UUID.");
    }

    #[test]
    fn test_datetime_format() {
        assert!(DateTimeFormat::new().validate(&json!("2024-01-31 23:59:59")).is_ok());
        assert_eq!(
            message(DateTimeFormat::new().validate(&json!("2024-01-31"))),
            "Invalid datetime."
        );
        assert!(DateTimeFormat::with_format("%Y-%m-%dT%H:%M")
            .validate(&json!("2024-01-31T10:00"))
            .is_ok());
        assert!(DateTimeFormat::new().validate(&json!(42)).is_ok());
    }

    // === Membership ===

    #[test]
    fn test_any_of_and_none_of() {
        let any = AnyOf::new(["red", "green"]);
        assert!(any.validate(&json!("red")).is_ok());
        assert_eq!(
            message(any.validate(&json!("blue"))),
            "Invalid value, must be one of: red, green."
        );

        let none = NoneOf::new([1, 2]);
        assert!(none.validate(&json!(3)).is_ok());
        assert_eq!(
            message(none.validate(&json!(2))),
            "Invalid value, can't be any of: 1, 2."
        );
    }

    #[test]
    fn test_choice() {
        let v = Choice::new(["a", "b"]);
        assert!(v.validate(&json!("b")).is_ok());
        assert_eq!(message(v.validate(&json!("c"))), "Invalid choice.");
    }

    #[test]
    fn test_closure_validator() {
        let even = |value: &Value| match value.as_i64() {
            Some(n) if n % 2 == 0 => Ok(()),
            _ => Err(ValidationFailure::invalid("must be even")),
        };
        assert!(even.validate(&json!(4)).is_ok());
        assert!(even.validate(&json!(3)).is_err());
    }
}
