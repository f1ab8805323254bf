//! In-process platform forwarder.
//!
//! Keeps track of which entity platforms each entry has loaded. Hosts with
//! real entity adapters implement [`PlatformForwarder`] themselves.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axlink_domain::entry::Platform;
use axlink_domain::error::AxlinkError;
use axlink_domain::id::EntryId;

use crate::hub::HubHandle;
use crate::ports::{DeviceSession, PlatformForwarder};

/// Records platform setup and unload per entry.
#[derive(Default)]
pub struct InProcessPlatforms {
    loaded: Mutex<HashMap<EntryId, Vec<Platform>>>,
}

impl InProcessPlatforms {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Platforms currently loaded for `entry_id`.
    #[must_use]
    pub fn loaded(&self, entry_id: EntryId) -> Vec<Platform> {
        self.lock().get(&entry_id).cloned().unwrap_or_default()
    }

    /// Number of entries with at least one platform loaded.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EntryId, Vec<Platform>>> {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PlatformForwarder for InProcessPlatforms {
    fn forward_setup<S: DeviceSession>(
        &self,
        hub: Arc<HubHandle<S>>,
        platforms: &[Platform],
    ) -> impl Future<Output = Result<(), AxlinkError>> + Send {
        let entry_id = hub.entry_id();
        {
            let mut loaded = self.lock();
            let current = loaded.entry(entry_id).or_default();
            for platform in platforms {
                if !current.contains(platform) {
                    current.push(*platform);
                }
            }
        }
        tracing::info!(
            entry_id = %entry_id,
            device = %hub.device().name,
            count = platforms.len(),
            "platforms set up"
        );
        async { Ok(()) }
    }

    fn forward_unload(
        &self,
        entry_id: EntryId,
        platforms: &[Platform],
    ) -> impl Future<Output = Result<bool, AxlinkError>> + Send {
        let all_loaded = {
            let mut loaded = self.lock();
            match loaded.get_mut(&entry_id) {
                Some(current) => {
                    let all_loaded = platforms.iter().all(|p| current.contains(p));
                    current.retain(|p| !platforms.contains(p));
                    if current.is_empty() {
                        loaded.remove(&entry_id);
                    }
                    all_loaded
                }
                None => false,
            }
        };
        async move { Ok(all_loaded) }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast;

    use axlink_domain::device::DeviceInfo;
    use axlink_domain::entry::{EntryConfig, PLATFORMS, Payload};
    use axlink_domain::event::DeviceEvent;

    use super::*;

    struct NullSession;

    impl DeviceSession for NullSession {
        fn events(&self) -> broadcast::Receiver<DeviceEvent> {
            broadcast::channel(1).1
        }

        fn set_host(&self, _host: &str) -> impl Future<Output = Result<(), AxlinkError>> + Send {
            async { Ok(()) }
        }

        fn release(&self) -> impl Future<Output = Result<(), AxlinkError>> + Send {
            async { Ok(()) }
        }
    }

    fn hub(entry_id: EntryId) -> Arc<HubHandle<NullSession>> {
        let mut payload = Payload::new();
        payload.insert("host".into(), "10.0.0.5".into());
        payload.insert("username".into(), "root".into());
        payload.insert("password".into(), "pass".into());
        Arc::new(HubHandle::new(
            entry_id,
            NullSession,
            DeviceInfo {
                serial: "accc8e000001".to_string(),
                model: "M1065-LW".to_string(),
                name: "Porch".to_string(),
                firmware: None,
            },
            EntryConfig::from_payload(&payload).unwrap(),
        ))
    }

    #[tokio::test]
    async fn should_track_platforms_until_unloaded() {
        let platforms = InProcessPlatforms::new();
        let entry_id = EntryId::new();

        platforms.forward_setup(hub(entry_id), PLATFORMS).await.unwrap();
        assert_eq!(platforms.loaded(entry_id), PLATFORMS.to_vec());
        assert_eq!(platforms.entry_count(), 1);

        assert!(platforms.forward_unload(entry_id, PLATFORMS).await.unwrap());
        assert!(platforms.loaded(entry_id).is_empty());
        assert_eq!(platforms.entry_count(), 0);
    }

    #[tokio::test]
    async fn should_report_unload_of_unknown_entry() {
        let platforms = InProcessPlatforms::new();

        let unloaded = platforms
            .forward_unload(EntryId::new(), PLATFORMS)
            .await
            .unwrap();

        assert!(!unloaded);
    }
}
