//! Input validation
//!
//! Field validators, value filters and the [`JsonParser`] that combines them
//! into forms. Handlers receive forms through the [`Parsed`] extractor.

pub mod errors;
pub mod extractor;
pub mod filters;
pub mod parser;
pub mod validators;

pub use errors::{FormErrors, ValidationFailure};
pub use extractor::{Form, Parsed, ParsedQuery};
pub use parser::{ArgType, Argument, JsonParser, ParsedForm};
pub use validators::{BoxedValidator, Validator};
