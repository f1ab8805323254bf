//! Connection outcomes and the failure classifier.
//!
//! The session collaborator reports one [`ConnectionOutcome`] per attempt.
//! [`classify`] turns it into the decision the lifecycle controller acts on,
//! so raw connection failures never reach the host unclassified.

use crate::device::DeviceInfo;
use crate::error::AxlinkError;

/// Result of one attempt to open a session with a device.
#[derive(Debug)]
pub enum ConnectionOutcome<S> {
    /// The device accepted the connection and the credentials.
    Success { session: S, device: DeviceInfo },
    /// The device could not be reached (network partition, reboot, …).
    ConnectFailure { reason: String },
    /// The device rejected the credentials.
    AuthFailure { reason: String },
}

/// What the controller should do with a [`ConnectionOutcome`].
#[derive(Debug)]
pub enum Classification<S> {
    /// Activate the entry with this session.
    Proceed { session: S, device: DeviceInfo },
    /// Give control back to the host to retry later with backoff.
    RetryLater { reason: String },
    /// Stop; the user has to update the credentials first.
    StopAuth { reason: String },
}

/// Classify a connection outcome. Pure and total.
#[must_use]
pub fn classify<S>(outcome: ConnectionOutcome<S>) -> Classification<S> {
    match outcome {
        ConnectionOutcome::Success { session, device } => {
            Classification::Proceed { session, device }
        }
        ConnectionOutcome::ConnectFailure { reason } => Classification::RetryLater { reason },
        ConnectionOutcome::AuthFailure { reason } => Classification::StopAuth { reason },
    }
}

impl<S> Classification<S> {
    /// Convert into the session on success, or the host-facing error.
    ///
    /// # Errors
    ///
    /// [`AxlinkError::NotReady`] for [`Classification::RetryLater`] and
    /// [`AxlinkError::AuthRequired`] for [`Classification::StopAuth`].
    pub fn into_result(self) -> Result<(S, DeviceInfo), AxlinkError> {
        match self {
            Self::Proceed { session, device } => Ok((session, device)),
            Self::RetryLater { reason } => Err(AxlinkError::NotReady { reason }),
            Self::StopAuth { reason } => Err(AxlinkError::AuthRequired { reason }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceInfo {
        DeviceInfo {
            serial: "accc8e112233".to_string(),
            model: "P1448-LE".to_string(),
            name: "Garage".to_string(),
            firmware: None,
        }
    }

    #[test]
    fn should_proceed_only_on_success() {
        let outcome = ConnectionOutcome::Success {
            session: 7_u8,
            device: device(),
        };
        match classify(outcome) {
            Classification::Proceed { session, device } => {
                assert_eq!(session, 7);
                assert_eq!(device.model, "P1448-LE");
            }
            other => panic!("expected Proceed, got {other:?}"),
        }
    }

    #[test]
    fn should_retry_later_on_connect_failure() {
        let outcome: ConnectionOutcome<u8> = ConnectionOutcome::ConnectFailure {
            reason: "connection refused".to_string(),
        };
        assert!(matches!(
            classify(outcome),
            Classification::RetryLater { reason } if reason == "connection refused"
        ));
    }

    #[test]
    fn should_stop_on_auth_failure() {
        let outcome: ConnectionOutcome<u8> = ConnectionOutcome::AuthFailure {
            reason: "bad password".to_string(),
        };
        assert!(matches!(
            classify(outcome),
            Classification::StopAuth { reason } if reason == "bad password"
        ));
    }

    #[test]
    fn should_map_failures_to_host_errors() {
        let retry: Classification<u8> = Classification::RetryLater {
            reason: "timeout".to_string(),
        };
        let stop: Classification<u8> = Classification::StopAuth {
            reason: "locked".to_string(),
        };
        assert!(matches!(retry.into_result(), Err(AxlinkError::NotReady { .. })));
        assert!(matches!(stop.into_result(), Err(AxlinkError::AuthRequired { .. })));
    }
}
