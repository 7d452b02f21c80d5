//! User credentials: password hashing, JWTs and revocation

pub mod blocklist;
pub mod password;
pub mod provider;
pub mod token;

pub use blocklist::{InMemoryBlocklist, TokenBlocklist};
pub use password::{HashCost, HashError, PasswordHasher};
pub use provider::JwtAuthProvider;
pub use token::{Claims, IssuedToken, TokenError, TokenPair, TokenService};
