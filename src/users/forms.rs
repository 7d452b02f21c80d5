//! Request forms of the user endpoints

use crate::core::pagination::{DEFAULT_PAGE, DEFAULT_PER_PAGE, MAX_PER_PAGE};
use crate::core::validation::filters::trim;
use crate::core::validation::validators::{DataRequired, Email, Length, NumberRange};
use crate::core::validation::{Argument, Form, FormErrors, JsonParser, ParsedForm};

pub struct RegisterForm;

impl Form for RegisterForm {
    fn parser() -> JsonParser {
        JsonParser::new()
            .argument(
                Argument::new("username")
                    .required()
                    .string()
                    .handler(trim())
                    .validate(DataRequired::new())
                    .validate(Length::between(3, 25)),
            )
            .argument(
                Argument::new("email")
                    .required()
                    .string()
                    .handler(trim())
                    .validate(DataRequired::new())
                    .validate(Email::new())
                    .validate(Length::between(6, 40)),
            )
            .argument(
                Argument::new("password")
                    .required()
                    .string()
                    .validate(DataRequired::new())
                    .validate(Length::between(6, 40)),
            )
            .argument(
                Argument::new("confirm")
                    .required()
                    .string()
                    .validate(DataRequired::new()),
            )
    }

    fn validate(form: &ParsedForm) -> Result<(), FormErrors> {
        if form.str("confirm") != form.str("password") {
            return Err(FormErrors::single("confirm", "Passwords must match"));
        }
        Ok(())
    }
}

pub struct LoginForm;

impl Form for LoginForm {
    fn parser() -> JsonParser {
        JsonParser::new()
            .argument(
                Argument::new("username")
                    .required()
                    .string()
                    .handler(trim())
                    .validate(DataRequired::new()),
            )
            .argument(
                Argument::new("password")
                    .required()
                    .string()
                    .validate(DataRequired::new()),
            )
    }
}

/// Query arguments of the user listing
pub struct ListUsersQuery;

impl Form for ListUsersQuery {
    fn parser() -> JsonParser {
        JsonParser::new()
            .argument(
                Argument::new("page")
                    .integer()
                    .default_value(DEFAULT_PAGE)
                    .validate(NumberRange::at_least(1.0)),
            )
            .argument(
                Argument::new("per_page")
                    .integer()
                    .default_value(DEFAULT_PER_PAGE)
                    .validate(NumberRange::between(1.0, MAX_PER_PAGE as f64)),
            )
            .argument(Argument::new("username").string().handler(trim()))
            .argument(Argument::new("enabled").boolean())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_accepts_valid_input() {
        let form = RegisterForm::process(&json!({
            "username": "  ann  ",
            "email": "ann@example.com",
            "password": "secret1",
            "confirm": "secret1"
        }))
        .unwrap();
        assert_eq!(form.str("username"), Some("ann"));
    }

    #[test]
    fn test_register_reports_every_field() {
        let errors = RegisterForm::process(&json!({"username": "a", "email": "nope"})).unwrap_err();
        assert!(errors.contains("username"));
        assert!(errors.contains("email"));
        assert_eq!(errors.get("password"), Some(&["This field is required.".to_string()][..]));
        assert!(errors.contains("confirm"));
    }

    #[test]
    fn test_register_password_mismatch() {
        let errors = RegisterForm::process(&json!({
            "username": "ann",
            "email": "ann@example.com",
            "password": "secret1",
            "confirm": "secret2"
        }))
        .unwrap_err();
        assert_eq!(errors.get("confirm"), Some(&["Passwords must match".to_string()][..]));
    }

    #[test]
    fn test_login_requires_both_fields() {
        let errors = LoginForm::process(&json!({"username": "ann"})).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains("password"));
    }

    #[test]
    fn test_list_query_defaults_and_bounds() {
        let form = ListUsersQuery::process(&json!({})).unwrap();
        assert_eq!(form.i64("page"), Some(1));
        assert_eq!(form.i64("per_page"), Some(100));

        let form = ListUsersQuery::process(&json!({"page": "3", "enabled": "false"})).unwrap();
        assert_eq!(form.i64("page"), Some(3));
        assert_eq!(form.bool("enabled"), Some(false));

        assert!(ListUsersQuery::process(&json!({"per_page": "500"})).is_err());
    }
}
