//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`ShutterLinkError`] when crossing a port boundary.

/// Base error for anything that crosses a port boundary.
#[derive(Debug, thiserror::Error)]
pub enum ShutterLinkError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The preference store failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The BLE or message transport failed.
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A camera address was empty or whitespace.
    #[error("camera address must not be empty")]
    EmptyAddress,

    /// A display or device name was empty or whitespace.
    #[error("name must not be empty")]
    EmptyName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_empty_name() {
        assert_eq!(ValidationError::EmptyName.to_string(), "name must not be empty");
    }

    #[test]
    fn should_wrap_validation_error() {
        let err: ShutterLinkError = ValidationError::EmptyAddress.into();
        assert!(matches!(
            err,
            ShutterLinkError::Validation(ValidationError::EmptyAddress)
        ));
    }
}
