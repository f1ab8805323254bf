//! # axlink-adapter-virtual
//!
//! Simulated device family for testing and demonstration.
//!
//! Devices are declared up front as [`VirtualDeviceConfig`]s. The
//! [`VirtualConnector`] answers connection attempts the way a real device
//! would:
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | No device declared at the host, or device marked unreachable | `ConnectFailure` |
//! | Credentials do not match | `AuthFailure` |
//! | Otherwise | `Success` with a fresh [`VirtualSession`] |
//!
//! ## Dependency rule
//!
//! Depends on `axlink-app` (port traits) and `axlink-domain` only.

mod config;
mod error;
mod session;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use axlink_app::ports::SessionConnector;
use axlink_domain::connection::ConnectionOutcome;
use axlink_domain::entry::{Credentials, DeviceAddress};

pub use config::VirtualDeviceConfig;
pub use error::VirtualError;
pub use session::VirtualSession;

/// Session connector for declared virtual devices.
pub struct VirtualConnector {
    /// Declared devices, keyed by host.
    devices: Mutex<HashMap<String, VirtualDeviceConfig>>,
    /// Last session opened per serial.
    sessions: Mutex<HashMap<String, VirtualSession>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl VirtualConnector {
    #[must_use]
    pub fn new(devices: impl IntoIterator<Item = VirtualDeviceConfig>) -> Self {
        let devices = devices
            .into_iter()
            .map(|device| (device.host.clone(), device))
            .collect();
        Self {
            devices: Mutex::new(devices),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Take a device on or off the network. Returns `false` for an unknown
    /// host.
    pub fn set_reachable(&self, host: &str, reachable: bool) -> bool {
        match lock(&self.devices).get_mut(host) {
            Some(device) => {
                device.reachable = reachable;
                true
            }
            None => false,
        }
    }

    /// Re-address a device, as a DHCP lease change would. Returns `false`
    /// when no device is declared at `from`.
    pub fn move_device(&self, from: &str, to: &str) -> bool {
        let mut devices = lock(&self.devices);
        let Some(mut device) = devices.remove(from) else {
            return false;
        };
        device.host = to.to_string();
        devices.insert(to.to_string(), device);
        true
    }

    /// The last session opened with the device `serial`.
    #[must_use]
    pub fn session(&self, serial: &str) -> Option<VirtualSession> {
        lock(&self.sessions).get(serial).cloned()
    }

    fn open(
        &self,
        address: &DeviceAddress,
        credentials: &Credentials,
    ) -> ConnectionOutcome<VirtualSession> {
        let device = match lock(&self.devices).get(&address.host) {
            Some(device) if device.reachable => device.clone(),
            Some(_) => {
                return ConnectionOutcome::ConnectFailure {
                    reason: format!("{address} is not responding"),
                };
            }
            None => {
                return ConnectionOutcome::ConnectFailure {
                    reason: format!("no device at {address}"),
                };
            }
        };
        if device.username != credentials.username || device.password != credentials.password {
            return ConnectionOutcome::AuthFailure {
                reason: format!("credentials rejected by {address}"),
            };
        }

        let session = VirtualSession::new(&device.serial, &address.host);
        lock(&self.sessions).insert(device.serial.clone(), session.clone());
        tracing::debug!(%address, serial = %device.serial, "virtual session opened");
        ConnectionOutcome::Success {
            session,
            device: device.info(),
        }
    }
}

impl SessionConnector for VirtualConnector {
    type Session = VirtualSession;

    fn connect(
        &self,
        address: &DeviceAddress,
        credentials: &Credentials,
    ) -> impl Future<Output = ConnectionOutcome<VirtualSession>> + Send {
        let outcome = self.open(address, credentials);
        async move { outcome }
    }
}

#[cfg(test)]
mod tests {
    use axlink_domain::entry::Protocol;

    use super::*;

    fn garage() -> VirtualDeviceConfig {
        VirtualDeviceConfig {
            host: "10.0.0.5".to_string(),
            serial: "accc8e112233".to_string(),
            model: "P1448-LE".to_string(),
            name: "Garage".to_string(),
            firmware: None,
            username: "root".to_string(),
            password: "pass".to_string(),
            reachable: true,
        }
    }

    fn address(host: &str) -> DeviceAddress {
        DeviceAddress {
            protocol: Protocol::Http,
            host: host.to_string(),
            port: 80,
        }
    }

    fn credentials(password: &str) -> Credentials {
        Credentials {
            username: "root".to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn should_open_session_with_declared_device() {
        let connector = VirtualConnector::new([garage()]);

        let outcome = connector
            .connect(&address("10.0.0.5"), &credentials("pass"))
            .await;

        let ConnectionOutcome::Success { session, device } = outcome else {
            panic!("expected success");
        };
        assert_eq!(device.serial, "accc8e112233");
        assert_eq!(session.host(), "10.0.0.5");
        assert!(connector.session("accc8e112233").is_some());
    }

    #[tokio::test]
    async fn should_fail_to_connect_to_unknown_host() {
        let connector = VirtualConnector::new([garage()]);

        let outcome = connector
            .connect(&address("10.0.0.6"), &credentials("pass"))
            .await;

        assert!(matches!(outcome, ConnectionOutcome::ConnectFailure { .. }));
    }

    #[tokio::test]
    async fn should_fail_to_connect_to_unreachable_device() {
        let connector = VirtualConnector::new([garage()]);
        assert!(connector.set_reachable("10.0.0.5", false));

        let outcome = connector
            .connect(&address("10.0.0.5"), &credentials("pass"))
            .await;

        assert!(matches!(outcome, ConnectionOutcome::ConnectFailure { .. }));
    }

    #[tokio::test]
    async fn should_reject_wrong_password() {
        let connector = VirtualConnector::new([garage()]);

        let outcome = connector
            .connect(&address("10.0.0.5"), &credentials("wrong"))
            .await;

        assert!(matches!(outcome, ConnectionOutcome::AuthFailure { .. }));
        assert!(connector.session("accc8e112233").is_none());
    }

    #[tokio::test]
    async fn should_answer_at_new_host_after_move() {
        let connector = VirtualConnector::new([garage()]);
        assert!(connector.move_device("10.0.0.5", "10.0.0.42"));

        let old = connector
            .connect(&address("10.0.0.5"), &credentials("pass"))
            .await;
        let new = connector
            .connect(&address("10.0.0.42"), &credentials("pass"))
            .await;

        assert!(matches!(old, ConnectionOutcome::ConnectFailure { .. }));
        assert!(matches!(new, ConnectionOutcome::Success { .. }));
    }
}
