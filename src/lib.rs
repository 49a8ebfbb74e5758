//! mailgate — inbound-email relay core.

pub mod block;
pub mod config;
pub mod error;
pub mod forward;
pub mod intake;
pub mod message;
pub mod notify;
pub mod parser;
pub mod store;
pub mod web;
