//! # HTTP Request Handlers
//!
//! ## Submodules
//! - `health`: health check endpoint
//! - `kiosk`: public check-in endpoints for the shared terminal
//! - `credentials`: self-service credential and passkey management
//! - `auth`: session info and logout
//!
//! ## Handler Pattern
//! Handlers are async functions that:
//! 1. Extract data from request (state, extensions, JSON body, query)
//! 2. Call domain logic (passkey store, ceremonies, toggle engine)
//! 3. Return JSON, or an [`AppError`](crate::error::AppError) that renders itself

pub mod auth;
pub mod credentials;
pub mod health;
pub mod kiosk;
