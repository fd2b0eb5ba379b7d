//! # WebAuthn Module
//!
//! Public-key ceremonies: biometric check-in at the kiosk and credential
//! enrolment from the self-service pages.
//!
//! ## Submodules
//! - `verifier`: the seam to the ceremony library (`webauthn-rs`)
//! - `authentication`: kiosk check-in ceremony, ending in the toggle engine
//! - `registration`: adding a credential for the signed-in student
//! - `types`: request bodies
//!
//! ## Check-in Flow
//! 1. Kiosk sends the typed passkey → `authentication::start_authentication()`
//! 2. Server resolves the student and returns options naming their credentials
//! 3. The platform authenticator signs the challenge
//! 4. Kiosk sends passkey, location and assertion →
//!    `authentication::finish_authentication()`
//! 5. Server consumes the challenge, verifies the signature and counter, then
//!    toggles attendance

pub mod authentication;
pub mod registration;
pub mod types;
pub mod verifier;

pub use verifier::{CeremonyVerifier, WebauthnVerifier};
