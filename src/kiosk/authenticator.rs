//! The device's biometric prompt.

use crate::kiosk::error::KioskError;
use async_trait::async_trait;
use serde_json::Value;

/// Platform authenticator (fingerprint reader, face unlock)
///
/// `get_assertion` receives the options from the ceremony start and returns
/// the signed assertion. The prompt belongs to the platform: it returns when
/// the user completes it, cancels it, or it is torn down, and a cancellation
/// must come back as [`KioskError::UserCancelled`].
#[async_trait]
pub trait PlatformAuthenticator: Send + Sync {
    async fn get_assertion(&self, options: Value) -> Result<Value, KioskError>;
}

/// For terminals without a biometric reader
///
/// Every prompt behaves as if the user dismissed it.
pub struct NoAuthenticator;

#[async_trait]
impl PlatformAuthenticator for NoAuthenticator {
    async fn get_assertion(&self, _options: Value) -> Result<Value, KioskError> {
        tracing::warn!("biometric check requested but this terminal has no authenticator");
        Err(KioskError::UserCancelled)
    }
}
