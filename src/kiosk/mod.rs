//! # Kiosk Terminal
//!
//! The client half: what runs on the shared check-in device.
//!
//! ## Submodules
//! - `controller`: the screen state machine (`Idle → Loading → Success/Error → Idle`)
//! - `api`: talking to the check-in server
//! - `authenticator`: the device's biometric prompt
//! - `ticker`: clock and schedule banner
//! - `config`, `error`

pub mod api;
pub mod authenticator;
pub mod config;
pub mod controller;
pub mod error;
pub mod ticker;

pub use api::{HttpKioskApi, KioskApi};
pub use authenticator::{NoAuthenticator, PlatformAuthenticator};
pub use config::KioskConfig;
pub use controller::{KioskEvent, KioskHandle, KioskState, KioskView};
pub use error::KioskError;
