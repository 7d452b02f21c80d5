//! Axum extractors for parsed forms
//!
//! A [`Form`] names its [`JsonParser`] and any cross-field checks. The
//! [`Parsed`] extractor runs both against the JSON body, [`ParsedQuery`]
//! against the query string, so handlers only ever see accepted input.

use super::errors::FormErrors;
use super::parser::{JsonParser, ParsedForm};
use crate::core::error::{RequestError, StencilError};
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::marker::PhantomData;

/// Declarative description of a request form
pub trait Form: Send + Sync + 'static {
    fn parser() -> JsonParser;

    /// Checks spanning several fields, run after every field passed
    fn validate(_form: &ParsedForm) -> Result<(), FormErrors> {
        Ok(())
    }

    /// Parse and validate a decoded body
    fn process(body: &Value) -> Result<ParsedForm, FormErrors> {
        let form = Self::parser().parse(body)?;
        Self::validate(&form)?;
        Ok(form)
    }
}

/// Extractor yielding the accepted values of form `F` from the JSON body
///
/// # Usage
///
/// ```rust,ignore
/// pub async fn register(
///     State(ctx): State<AppContext>,
///     Parsed(form, ..): Parsed<RegisterForm>,
/// ) -> ApiResult<Envelope<UserView>> {
///     let username = form.str("username");
/// }
/// ```
pub struct Parsed<F>(pub ParsedForm, pub PhantomData<F>);

impl<F> Parsed<F> {
    pub fn into_inner(self) -> ParsedForm {
        self.0
    }
}

impl<F> std::ops::Deref for Parsed<F> {
    type Target = ParsedForm;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, F> FromRequest<S> for Parsed<F>
where
    S: Send + Sync,
    F: Form,
{
    type Rejection = StencilError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| RequestError::InvalidBody {
                message: e.to_string(),
            })?;

        // An empty body is an empty form, so required fields report normally.
        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| RequestError::InvalidJson {
                message: e.to_string(),
            })?
        };

        Ok(Parsed(F::process(&body)?, PhantomData))
    }
}

/// Extractor running form `F` against the query string
pub struct ParsedQuery<F>(pub ParsedForm, pub PhantomData<F>);

impl<F> std::ops::Deref for ParsedQuery<F> {
    type Target = ParsedForm;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, F> FromRequestParts<S> for ParsedQuery<F>
where
    S: Send + Sync,
    F: Form,
{
    type Rejection = StencilError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| RequestError::InvalidQuery {
                message: e.to_string(),
            })?;

        let mapping: Map<String, Value> = raw
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();

        Ok(ParsedQuery(F::process(&Value::Object(mapping))?, PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validation::parser::Argument;
    use crate::core::validation::validators::{DataRequired, Length};
    use axum::body::Body;
    use axum::http::StatusCode;
    use serde_json::json;

    struct Signup;

    impl Form for Signup {
        fn parser() -> JsonParser {
            JsonParser::new()
                .argument(Argument::new("name").required().validate(Length::between(2, 10)))
                .argument(Argument::new("code").validate(DataRequired::new()))
        }

        fn validate(form: &ParsedForm) -> Result<(), FormErrors> {
            if form.str("name") == Some("root") {
                return Err(FormErrors::single("name", "reserved"));
            }
            Ok(())
        }
    }

    fn request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_accepts_valid_body() {
        let Parsed(form, _) = Parsed::<Signup>::from_request(request(r#"{"name":"ann","code":"x"}"#), &())
            .await
            .unwrap();
        assert_eq!(form.str("name"), Some("ann"));
    }

    #[tokio::test]
    async fn test_field_errors_are_validation_errors() {
        let err = Parsed::<Signup>::from_request(request(r#"{"name":"a"}"#), &())
            .await
            .err()
            .unwrap();
        match err {
            StencilError::Validation(errors) => assert!(errors.contains("name")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cross_field_check_runs_after_fields() {
        let err = Parsed::<Signup>::from_request(request(r#"{"name":"root"}"#), &())
            .await
            .err()
            .unwrap();
        assert_eq!(err.payload(), json!({"name": ["reserved"]}));
    }

    #[tokio::test]
    async fn test_empty_body_reports_required_fields() {
        let err = Parsed::<Signup>::from_request(request(""), &()).await.err().unwrap();
        assert_eq!(err.payload(), json!({"name": ["This field is required."]}));
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let err = Parsed::<Signup>::from_request(request("{nope"), &()).await.err().unwrap();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
