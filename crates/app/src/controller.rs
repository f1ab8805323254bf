//! Entry lifecycle controller.
//!
//! Drives one config entry through connect, activation, reconfiguration and
//! teardown. Activation is all-or-nothing: an entry is only inserted into the
//! [`HubRegistry`] once every registration succeeded, and a connection that
//! is not classified as `Proceed` leaves no registration behind.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use axlink_domain::connection::classify;
use axlink_domain::entry::{ConfiguredEntry, DOMAIN, EntryConfig, PLATFORMS};
use axlink_domain::error::AxlinkError;
use axlink_domain::event::{DeviceEvent, Event, EventType};
use axlink_domain::id::EntryId;
use axlink_domain::migration;

use crate::hub::{ActiveEntry, HubHandle, HubRegistry};
use crate::inbox::{EntryCommand, EntryInbox};
use crate::ports::{
    DeviceRegistry, DeviceSession, EntryStore, EventPublisher, EventSubscriber, Integration,
    PlatformForwarder, SessionConnector,
};

/// What [`EntryController::reconfigure`] did with an updated payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconfiguration {
    /// Only the host changed; the live session was re-pointed in place.
    AddressUpdated,
    /// Anything else changed; the entry was torn down and set up again.
    Reloaded,
    /// The payload matches the running configuration.
    Unchanged,
    /// No hub is live for the entry.
    NotLoaded,
}

/// Outcome of [`EntryController::teardown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    Released,
    /// Nothing was registered for the entry.
    AlreadyAbsent,
}

/// Lifecycle controller for entries of this device family.
///
/// Collaborators are injected through the constructor. `commands` is the
/// sending half of the host's command channel; every update listener and
/// shutdown hook posts into it.
pub struct EntryController<C, D, F, B, St> {
    connector: C,
    devices: D,
    platforms: F,
    bus: B,
    store: St,
    commands: mpsc::UnboundedSender<EntryCommand>,
}

impl<C, D, F, B, St> EntryController<C, D, F, B, St>
where
    C: SessionConnector,
    D: DeviceRegistry,
    F: PlatformForwarder,
    B: EventPublisher + EventSubscriber + Clone + Send + Sync + 'static,
    St: EntryStore,
{
    pub fn new(
        connector: C,
        devices: D,
        platforms: F,
        bus: B,
        store: St,
        commands: mpsc::UnboundedSender<EntryCommand>,
    ) -> Self {
        Self {
            connector,
            devices,
            platforms,
            bus,
            store,
            commands,
        }
    }

    fn inbox(&self, entry_id: EntryId) -> EntryInbox {
        EntryInbox::new(entry_id, self.commands.clone())
    }

    /// Connect to the entry's device and activate it.
    ///
    /// Setting up an entry that already has a live hub is a no-op.
    ///
    /// # Errors
    ///
    /// - [`AxlinkError::Migration`] if the entry is not at the current
    ///   schema version
    /// - [`AxlinkError::Validation`] if the payload cannot be read
    /// - [`AxlinkError::NotReady`] / [`AxlinkError::AuthRequired`] from the
    ///   classified connection attempt
    /// - any error from a collaborator during activation, after rolling back
    #[tracing::instrument(skip_all, fields(entry_id = %entry.id))]
    pub async fn setup(
        &self,
        hubs: &HubRegistry<C::Session>,
        entry: &ConfiguredEntry,
    ) -> Result<(), AxlinkError> {
        migration::ensure_current(entry.version)?;
        if hubs.contains(entry.id).await {
            tracing::warn!("entry already set up");
            return Ok(());
        }
        let config = EntryConfig::from_payload(&entry.payload)?;
        let address = config.address();

        let outcome = self
            .connector
            .connect(&address, &config.credentials())
            .await;
        let (session, device) = classify(outcome).into_result().inspect_err(|err| {
            tracing::warn!(%address, error = %err, "unable to connect to device");
        })?;

        let hub = Arc::new(HubHandle::new(entry.id, session, device, config));
        let mut active = ActiveEntry::new(hub);
        if let Err(err) = self.activate(&mut active).await {
            tracing::warn!(error = %err, "activation failed, rolling back");
            self.release(active).await;
            return Err(err);
        }

        tracing::info!(
            %address,
            model = %active.hub.device().model,
            "entry set up"
        );
        if let Some(displaced) = hubs.insert(active).await {
            // Platforms are keyed by entry and now serve the new hub.
            tracing::warn!("entry was set up concurrently, detaching the older hub");
            self.detach(displaced).await;
        }
        Ok(())
    }

    async fn activate(&self, active: &mut ActiveEntry<C::Session>) -> Result<(), AxlinkError> {
        let hub = Arc::clone(&active.hub);
        let entry_id = hub.entry_id();

        self.platforms
            .forward_setup(Arc::clone(&hub), PLATFORMS)
            .await?;
        active.listener = Some(
            self.store
                .register_update_listener(self.inbox(entry_id))
                .await?,
        );
        active.subscription = Some(
            self.bus
                .listen_once(EventType::HostStop, self.inbox(entry_id))
                .await?,
        );

        // The device record cannot be rolled back, so it comes last.
        let device = self.devices.upsert_device(entry_id, hub.device()).await?;
        tracing::debug!(device_id = %device.id, "device registered");

        active.event_task = Some(self.spawn_event_forwarder(entry_id, hub.session().events()));
        Ok(())
    }

    fn spawn_event_forwarder(
        &self,
        entry_id: EntryId,
        events: broadcast::Receiver<DeviceEvent>,
    ) -> JoinHandle<()> {
        let bus = self.bus.clone();
        tokio::spawn(async move {
            let mut stream = BroadcastStream::new(events);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(raw) => {
                        if let Err(err) = bus.publish(Event::from_device(entry_id, &raw)).await {
                            tracing::warn!(%entry_id, error = %err, "failed to publish device event");
                        }
                    }
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::warn!(%entry_id, skipped, "device events dropped");
                    }
                }
            }
            tracing::debug!(%entry_id, "device event stream ended");
        })
    }

    /// Undo every registration of `active`. Failures are logged and
    /// swallowed.
    async fn release(&self, active: ActiveEntry<C::Session>) {
        let entry_id = active.hub.entry_id();
        self.detach(active).await;
        match self.platforms.forward_unload(entry_id, PLATFORMS).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(%entry_id, "some platforms did not unload"),
            Err(err) => tracing::warn!(%entry_id, error = %err, "failed to unload platforms"),
        }
    }

    /// Drop the hub's listeners, event forwarder and session.
    async fn detach(&self, active: ActiveEntry<C::Session>) {
        let entry_id = active.hub.entry_id();

        if let Some(id) = active.subscription
            && let Err(err) = self.bus.unsubscribe(id).await
        {
            tracing::warn!(%entry_id, error = %err, "failed to remove shutdown hook");
        }
        if let Some(id) = active.listener
            && let Err(err) = self.store.remove_update_listener(id).await
        {
            tracing::warn!(%entry_id, error = %err, "failed to remove update listener");
        }
        if let Some(task) = active.event_task {
            task.abort();
        }
        if let Err(err) = active.hub.session().release().await {
            tracing::warn!(%entry_id, error = %err, "failed to release session");
        }
    }

    /// Apply an updated payload to a live entry.
    ///
    /// A change of host alone is applied to the running session. Any other
    /// change tears the entry down and sets it up again.
    ///
    /// # Errors
    ///
    /// Returns the validation, session or setup error that stopped the
    /// update. After a failed reload the entry is left unloaded.
    #[tracing::instrument(skip_all, fields(entry_id = %entry.id))]
    pub async fn reconfigure(
        &self,
        hubs: &HubRegistry<C::Session>,
        entry: &ConfiguredEntry,
    ) -> Result<Reconfiguration, AxlinkError> {
        let Some(hub) = hubs.get(entry.id).await else {
            tracing::debug!("entry not loaded, ignoring update");
            return Ok(Reconfiguration::NotLoaded);
        };
        migration::ensure_current(entry.version)?;
        let updated = EntryConfig::from_payload(&entry.payload)?;
        let current = hub.config().await;

        if current == updated {
            return Ok(Reconfiguration::Unchanged);
        }
        if current.is_address_change(&updated) {
            hub.session().set_host(&updated.host).await?;
            let host = updated.host.clone();
            let previous = hub.replace_config(updated).await;
            tracing::info!(from = %previous.host, to = %host, "device address updated");
            return Ok(Reconfiguration::AddressUpdated);
        }

        tracing::info!("configuration changed, reloading entry");
        self.teardown(hubs, entry.id).await;
        self.setup(hubs, entry).await?;
        Ok(Reconfiguration::Reloaded)
    }

    /// Release everything registered for `entry_id`. Safe to call for an
    /// entry that was never set up; never fails.
    #[tracing::instrument(skip(self, hubs))]
    pub async fn teardown(&self, hubs: &HubRegistry<C::Session>, entry_id: EntryId) -> Teardown {
        let Some(active) = hubs.remove(entry_id).await else {
            tracing::debug!("entry not loaded, nothing to tear down");
            return Teardown::AlreadyAbsent;
        };
        self.release(active).await;
        tracing::info!("entry unloaded");
        Teardown::Released
    }

    /// Best-effort teardown when the host stops.
    #[tracing::instrument(skip(self, hubs, event), fields(event_id = %event.id))]
    pub async fn shutdown(&self, hubs: &HubRegistry<C::Session>, entry_id: EntryId, event: &Event) {
        tracing::info!("host stopping, releasing device session");
        self.teardown(hubs, entry_id).await;
    }

    /// Bring the entry's stored payload up to the current schema.
    ///
    /// # Errors
    ///
    /// Returns [`AxlinkError::Migration`] when the entry cannot be migrated,
    /// or a storage error if persisting the result fails.
    #[tracing::instrument(skip_all, fields(entry_id = %entry.id))]
    pub async fn migrate(&self, entry: &mut ConfiguredEntry) -> Result<(), AxlinkError> {
        tracing::debug!("migrating from version {}", entry.version);
        let migrated = migration::migrate(entry.version, &entry.payload)?;
        if migrated.changed {
            self.store
                .write(entry.id, migrated.version, migrated.payload.clone())
                .await?;
            entry.version = migrated.version;
            entry.payload = migrated.payload;
            tracing::info!("migration to version {} successful", entry.version);
        }
        Ok(())
    }

    /// Dispatch one inbox command.
    ///
    /// # Errors
    ///
    /// Returns the error of the store read or reconfiguration an update
    /// triggered.
    pub async fn handle(
        &self,
        hubs: &HubRegistry<C::Session>,
        command: EntryCommand,
    ) -> Result<(), AxlinkError> {
        match command {
            EntryCommand::Updated { entry_id } => {
                let entry = self.store.read(entry_id).await?;
                let outcome = self.reconfigure(hubs, &entry).await?;
                tracing::debug!(%entry_id, ?outcome, "entry update handled");
            }
            EntryCommand::Event { entry_id, event } => match event.event_type {
                EventType::HostStop => self.shutdown(hubs, entry_id, &event).await,
                other => tracing::debug!(%entry_id, event_type = %other, "ignoring event"),
            },
        }
        Ok(())
    }
}

impl<C, D, F, B, St> Integration for EntryController<C, D, F, B, St>
where
    C: SessionConnector,
    D: DeviceRegistry,
    F: PlatformForwarder,
    B: EventPublisher + EventSubscriber + Clone + Send + Sync + 'static,
    St: EntryStore,
{
    type Session = C::Session;

    fn domain(&self) -> &'static str {
        DOMAIN
    }

    async fn setup_entry(
        &self,
        hubs: &HubRegistry<Self::Session>,
        entry: &ConfiguredEntry,
    ) -> Result<bool, AxlinkError> {
        self.setup(hubs, entry).await?;
        Ok(true)
    }

    async fn unload_entry(
        &self,
        hubs: &HubRegistry<Self::Session>,
        entry: &ConfiguredEntry,
    ) -> Result<bool, AxlinkError> {
        self.teardown(hubs, entry.id).await;
        Ok(true)
    }

    async fn migrate_entry(&self, entry: &mut ConfiguredEntry) -> Result<bool, AxlinkError> {
        self.migrate(entry).await?;
        Ok(true)
    }

    async fn handle_command(
        &self,
        hubs: &HubRegistry<Self::Session>,
        command: EntryCommand,
    ) -> Result<(), AxlinkError> {
        self.handle(hubs, command).await
    }
}
