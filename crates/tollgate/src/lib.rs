//! Stateless bearer-token authentication.
//!
//! [`auth`] holds the core: token codec, principal directory, authenticator
//! and the per-request identity layer. [`api`] wires it into an axum router,
//! and [`settings`] loads configuration for the binary.

pub mod api;
pub mod auth;
pub mod settings;
