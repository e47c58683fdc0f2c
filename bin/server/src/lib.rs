//! provider-link web server.
//!
//! Wires the platform-access token lifecycle into an Axum application:
//! Postgres-backed stores, the HTTP provider client, and the request guard
//! that checks the session user's provider link once per request.

pub mod auth;
pub mod config;
pub mod router;
