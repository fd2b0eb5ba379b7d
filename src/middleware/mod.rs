//! # Middleware Module
//!
//! Middleware functions run before the route handlers.
//!
//! ## Our Middleware
//! - `auth`: requires a student session on the self-service routes
//! - `client`: records which terminal sent the request, for the passkey throttle

pub mod auth;
pub mod client;
