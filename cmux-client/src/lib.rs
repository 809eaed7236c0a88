//! cmux-client: talk to a running cmux control socket
//!
//! [`Client`] speaks both protocol versions over one connection.

pub mod client;

pub use client::{alternate_spelling, Client, DEFAULT_TIMEOUT};
