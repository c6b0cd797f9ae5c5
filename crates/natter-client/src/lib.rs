//! # natter-client
//!
//! Terminal client for the natter relay. After sending its nickname the
//! client runs two flows side by side until either ends:
//!
//! - **input**: each non-empty input line is sent to the server as one
//!   message; the quit command or end of input stops the session.
//! - **receive**: each chunk read from the server is written to the output
//!   as one line; when the server closes the connection the client prints
//!   `"Disconnected from server."` and stops.

#![deny(unsafe_code)]

pub mod client;
pub mod errors;

pub use client::{ChatClient, ClientExit};
pub use errors::{ClientError, Result};
