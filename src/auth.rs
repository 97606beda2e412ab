//! Local-instance configuration records, access tokens, and redacting secrets.

pub mod instance;
pub mod secret;
pub mod token;

pub use instance::*;
pub use secret::*;
pub use token::*;
