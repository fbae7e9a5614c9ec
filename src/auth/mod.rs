//! Backend authentication
//!
//! The gateway reads bearer tokens from a [`TokenSource`]; [`AdminSession`]
//! fills a [`SharedToken`] through credential login.

mod admin;
mod token;

pub use admin::AdminSession;
pub use token::{SharedToken, StaticToken, TokenSource};
