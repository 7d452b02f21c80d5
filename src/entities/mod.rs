//! Model declaration helpers

pub mod macros;
