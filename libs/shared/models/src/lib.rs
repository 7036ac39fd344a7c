pub mod auth;
pub mod error;
pub mod identity;

pub use identity::{Caller, Role};
