//! A live session with a simulated device.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use axlink_app::ports::DeviceSession;
use axlink_domain::error::AxlinkError;
use axlink_domain::event::DeviceEvent;

use crate::error::VirtualError;

const EVENT_CAPACITY: usize = 64;

struct Inner {
    serial: String,
    host: Mutex<String>,
    /// `None` once released; dropping the sender ends every event stream.
    events: Mutex<Option<broadcast::Sender<DeviceEvent>>>,
}

/// Session handle. Clones drive the same session.
#[derive(Clone)]
pub struct VirtualSession(Arc<Inner>);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl VirtualSession {
    pub(crate) fn new(serial: &str, host: &str) -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self(Arc::new(Inner {
            serial: serial.to_string(),
            host: Mutex::new(host.to_string()),
            events: Mutex::new(Some(sender)),
        }))
    }

    #[must_use]
    pub fn serial(&self) -> &str {
        &self.0.serial
    }

    /// Host the session currently talks to.
    #[must_use]
    pub fn host(&self) -> String {
        lock(&self.0.host).clone()
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        lock(&self.0.events).is_none()
    }

    /// Emit a device notification. Returns how many streams received it.
    pub fn trigger(&self, event: DeviceEvent) -> usize {
        lock(&self.0.events)
            .as_ref()
            .and_then(|sender| sender.send(event).ok())
            .unwrap_or(0)
    }
}

impl DeviceSession for VirtualSession {
    fn events(&self) -> broadcast::Receiver<DeviceEvent> {
        match lock(&self.0.events).as_ref() {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    fn set_host(&self, host: &str) -> impl Future<Output = Result<(), AxlinkError>> + Send {
        let result = if self.is_released() {
            Err(VirtualError::Released {
                serial: self.0.serial.clone(),
            }
            .into())
        } else {
            let previous = std::mem::replace(&mut *lock(&self.0.host), host.to_string());
            tracing::debug!(serial = %self.0.serial, from = %previous, to = %host, "session host changed");
            Ok(())
        };
        async move { result }
    }

    fn release(&self) -> impl Future<Output = Result<(), AxlinkError>> + Send {
        if lock(&self.0.events).take().is_some() {
            tracing::debug!(serial = %self.0.serial, "session released");
        }
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motion(active: bool) -> DeviceEvent {
        DeviceEvent {
            topic: "tns1:VideoSource/MotionAlarm".to_string(),
            source: "VideoSourceConfigurationToken".to_string(),
            source_idx: "0".to_string(),
            active,
        }
    }

    #[tokio::test]
    async fn should_stream_triggered_events() {
        let session = VirtualSession::new("accc8e112233", "10.0.0.5");
        let mut events = session.events();

        assert_eq!(session.trigger(motion(true)), 1);

        assert_eq!(events.recv().await.unwrap(), motion(true));
    }

    #[tokio::test]
    async fn should_close_streams_on_release() {
        let session = VirtualSession::new("accc8e112233", "10.0.0.5");
        let mut events = session.events();

        session.release().await.unwrap();
        session.release().await.unwrap();

        assert!(session.is_released());
        assert_eq!(session.trigger(motion(true)), 0);
        assert!(matches!(
            events.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn should_move_to_new_host() {
        let session = VirtualSession::new("accc8e112233", "10.0.0.5");

        session.set_host("10.0.0.42").await.unwrap();

        assert_eq!(session.host(), "10.0.0.42");
    }

    #[tokio::test]
    async fn should_refuse_host_change_after_release() {
        let session = VirtualSession::new("accc8e112233", "10.0.0.5");
        session.release().await.unwrap();

        let result = session.set_host("10.0.0.42").await;

        assert!(matches!(result, Err(AxlinkError::Session(_))));
        assert_eq!(session.host(), "10.0.0.5");
    }
}
