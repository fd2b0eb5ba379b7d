use thiserror::Error;

/// Everything that can go wrong on the terminal
///
/// The display strings are what the kiosk screen shows, so they stay short and
/// carry no internals. Variant payloads are for logs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KioskError {
    #[error("{0}")]
    Validation(String),

    #[error("Cannot reach the check-in server")]
    Network(String),

    /// The server answered with an error body (`{"error": message}`)
    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Biometric check was cancelled")]
    UserCancelled,

    #[error("The request timed out, please try again")]
    Timeout,

    #[error("Something went wrong, please try again")]
    Internal(String),
}

impl From<reqwest::Error> for KioskError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            KioskError::Timeout
        } else if e.is_decode() {
            KioskError::Internal(e.to_string())
        } else {
            KioskError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_hides_detail() {
        let network = KioskError::Network("tcp connect error: 10.0.0.1:8080".into());
        assert_eq!(network.to_string(), "Cannot reach the check-in server");

        let server = KioskError::Server {
            status: 401,
            message: "Invalid passkey".into(),
        };
        assert_eq!(server.to_string(), "Invalid passkey");

        let internal = KioskError::Internal("JoinError::Panic".into());
        assert!(!internal.to_string().contains("Panic"));
    }
}
