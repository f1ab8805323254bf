//! Errors raised by virtual sessions.

use axlink_domain::error::AxlinkError;

#[derive(Debug, thiserror::Error)]
pub enum VirtualError {
    /// The session was released and can no longer be driven.
    #[error("session for device {serial} was released")]
    Released { serial: String },
}

impl From<VirtualError> for AxlinkError {
    fn from(err: VirtualError) -> Self {
        Self::Session(Box::new(err))
    }
}
