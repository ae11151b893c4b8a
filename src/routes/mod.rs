//! Router Module Index
//!
//! Routing split by access level. Access control is applied per module through layers in
//! `create_router`, and enforced again inside the registry.

/// Routes reachable without a session.
pub mod public;

/// Routes behind the bearer-token middleware.
pub mod authenticated;

/// Superuser-only administration routes. Authenticated by the same middleware; the
/// superuser check happens in the registry and answers 403, never 401.
pub mod admin;
