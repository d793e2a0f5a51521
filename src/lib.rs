// This file acts as the entry point for the `keystone` library.
// The integration tests build the router through these modules instead of
// spawning the binary.
pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod session;
pub mod users;
pub mod web_server;
