//! BLE adapter error types.

use shutterlink_app::ports::TransportError;
use shutterlink_domain::error::ShutterLinkError;

/// Errors specific to the BLE adapter.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// No BLE adapter at the configured index.
    #[error("no BLE adapter available at index {index}")]
    NotAvailable { index: usize },

    /// A btleplug operation failed.
    #[error("BLE operation failed")]
    Backend(#[from] btleplug::Error),
}

impl From<BleError> for TransportError {
    fn from(err: BleError) -> Self {
        match err {
            BleError::NotAvailable { .. } => Self::Unavailable,
            other => Self::Backend(Box::new(other)),
        }
    }
}

impl From<BleError> for ShutterLinkError {
    fn from(err: BleError) -> Self {
        TransportError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_not_available_error() {
        let err = BleError::NotAvailable { index: 2 };
        assert_eq!(err.to_string(), "no BLE adapter available at index 2");
    }

    #[test]
    fn should_display_backend_error() {
        let err = BleError::Backend(btleplug::Error::DeviceNotFound);
        assert_eq!(err.to_string(), "BLE operation failed");
    }

    #[test]
    fn should_convert_not_available_to_unavailable_transport() {
        let err: TransportError = BleError::NotAvailable { index: 0 }.into();
        assert!(matches!(err, TransportError::Unavailable));
    }

    #[test]
    fn should_convert_backend_error_to_transport_backend() {
        let err: TransportError = BleError::Backend(btleplug::Error::NotConnected).into();
        assert!(matches!(err, TransportError::Backend(_)));
    }

    #[test]
    fn should_convert_into_domain_transport_error() {
        let err: ShutterLinkError = BleError::Backend(btleplug::Error::NotConnected).into();
        assert!(matches!(err, ShutterLinkError::Transport(_)));
    }
}
