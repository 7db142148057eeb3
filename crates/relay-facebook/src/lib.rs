//! relay-facebook: Facebook Messenger webhook relay
//!
//! Receives Messenger webhook events, decides on a reply and sends it back
//! through the Send API.

pub mod api;
pub mod error;
pub mod handler;
pub mod webhook;

pub use api::FacebookApi;
pub use error::{FacebookError, Result};
pub use handler::{Command, EventOutcome, MessageHandler, SkipReason};
pub use webhook::{create_router, serve};
