//! Session port: opening and driving a connection to one device.
//!
//! The wire protocol lives entirely behind these traits. The connector is
//! expected to bound its own wait: the controller applies no timeout to
//! [`SessionConnector::connect`].

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;

use axlink_domain::connection::ConnectionOutcome;
use axlink_domain::entry::{Credentials, DeviceAddress};
use axlink_domain::error::AxlinkError;
use axlink_domain::event::DeviceEvent;

/// Opens sessions with devices of this family.
pub trait SessionConnector: Send + Sync {
    /// Live session type produced on success.
    type Session: DeviceSession;

    /// Attempt to open a session.
    ///
    /// Failures are reported as [`ConnectionOutcome`] variants, never as
    /// errors, so that the classifier sees every attempt.
    fn connect(
        &self,
        address: &DeviceAddress,
        credentials: &Credentials,
    ) -> impl Future<Output = ConnectionOutcome<Self::Session>> + Send;
}

/// A live, authenticated connection to a device.
pub trait DeviceSession: Send + Sync + 'static {
    /// Subscribe to the notifications the device streams.
    fn events(&self) -> broadcast::Receiver<DeviceEvent>;

    /// Point the session at a new host without re-authenticating.
    fn set_host(&self, host: &str) -> impl Future<Output = Result<(), AxlinkError>> + Send;

    /// Stop the event stream and close the connection.
    fn release(&self) -> impl Future<Output = Result<(), AxlinkError>> + Send;
}

impl<T: SessionConnector> SessionConnector for Arc<T> {
    type Session = T::Session;

    fn connect(
        &self,
        address: &DeviceAddress,
        credentials: &Credentials,
    ) -> impl Future<Output = ConnectionOutcome<Self::Session>> + Send {
        (**self).connect(address, credentials)
    }
}
