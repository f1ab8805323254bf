//! Host runtime: loads the stored entries, retries the ones whose device was
//! not ready, and feeds inbox commands to the integration one at a time.
//!
//! Commands for all entries arrive on a single channel, so calls into the
//! integration are serialized per entry by construction.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use axlink_app::hub::HubRegistry;
use axlink_app::inbox::EntryCommand;
use axlink_app::ports::{EntryStore, EventPublisher, Integration};
use axlink_domain::entry::{ConfiguredEntry, EntryState};
use axlink_domain::error::AxlinkError;
use axlink_domain::event::{Event, EventType};
use axlink_domain::id::EntryId;

use crate::config::{EntrySeed, RetryConfig};

/// How long [`Host::stop`] waits for each shutdown hook to report back.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Exponential delay between setup attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    /// Delay before attempt number `attempt + 1`: `initial * 2^attempt`,
    /// capped at `max`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

impl From<RetryConfig> for Backoff {
    fn from(config: RetryConfig) -> Self {
        Self {
            initial: Duration::from_secs(config.initial_delay_secs),
            max: Duration::from_secs(config.max_delay_secs),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct EntryStatus {
    state: EntryState,
    /// Consecutive transient setup failures.
    attempts: u32,
}

enum Next {
    Command(EntryCommand),
    Retry(EntryId),
}

/// Drives every stored entry of one integration.
pub struct Host<I: Integration, B, St> {
    integration: I,
    bus: B,
    store: St,
    hubs: HubRegistry<I::Session>,
    statuses: HashMap<EntryId, EntryStatus>,
    backoff: Backoff,
    commands: mpsc::UnboundedReceiver<EntryCommand>,
    retry_tx: mpsc::UnboundedSender<EntryId>,
    retry_rx: mpsc::UnboundedReceiver<EntryId>,
}

impl<I, B, St> Host<I, B, St>
where
    I: Integration,
    B: EventPublisher,
    St: EntryStore,
{
    /// `commands` is the receiving half of the channel the integration's
    /// inboxes post into.
    pub fn new(
        integration: I,
        bus: B,
        store: St,
        commands: mpsc::UnboundedReceiver<EntryCommand>,
        backoff: Backoff,
    ) -> Self {
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        Self {
            integration,
            bus,
            store,
            hubs: HubRegistry::new(),
            statuses: HashMap::new(),
            backoff,
            commands,
            retry_tx,
            retry_rx,
        }
    }

    /// Live hubs, keyed by entry id.
    #[must_use]
    pub fn hubs(&self) -> &HubRegistry<I::Session> {
        &self.hubs
    }

    /// Bookkeeping state of an entry. Unknown entries are `NotLoaded`.
    #[must_use]
    pub fn state(&self, entry_id: EntryId) -> EntryState {
        self.statuses
            .get(&entry_id)
            .map_or(EntryState::NotLoaded, |status| status.state)
    }

    fn set_state(&mut self, entry_id: EntryId, state: EntryState) {
        let status = self.statuses.entry(entry_id).or_insert(EntryStatus {
            state,
            attempts: 0,
        });
        status.state = state;
        if state != EntryState::SetupRetry {
            status.attempts = 0;
        }
    }

    /// Load every stored entry. Returns how many entries were found.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed. Failures of single
    /// entries are recorded in their state instead.
    #[tracing::instrument(skip(self), fields(domain = self.integration.domain()))]
    pub async fn start(&mut self) -> Result<usize, AxlinkError> {
        let entries = self.store.list().await?;
        let count = entries.len();
        tracing::info!(count, "loading entries");
        for entry in entries {
            self.load(entry).await;
        }
        Ok(count)
    }

    async fn load(&mut self, mut entry: ConfiguredEntry) {
        let entry_id = entry.id;
        if let Err(err) = self.integration.migrate_entry(&mut entry).await {
            tracing::error!(%entry_id, error = %err, "unable to migrate entry");
            self.set_state(entry_id, EntryState::MigrationError);
            return;
        }
        match self.integration.setup_entry(&self.hubs, &entry).await {
            Ok(_) => self.set_state(entry_id, EntryState::Loaded),
            Err(err) => self.setup_failed(entry_id, &err),
        }
    }

    fn setup_failed(&mut self, entry_id: EntryId, err: &AxlinkError) {
        if err.is_retryable() {
            let attempts = self.statuses.get(&entry_id).map_or(0, |status| {
                if status.state == EntryState::SetupRetry {
                    status.attempts
                } else {
                    0
                }
            });
            let delay = self.backoff.delay(attempts);
            self.statuses.insert(
                entry_id,
                EntryStatus {
                    state: EntryState::SetupRetry,
                    attempts: attempts.saturating_add(1),
                },
            );
            tracing::warn!(%entry_id, error = %err, ?delay, "device not ready, retrying");

            let retry_tx = self.retry_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = retry_tx.send(entry_id);
            });
        } else if matches!(err, AxlinkError::Migration(_)) {
            tracing::error!(%entry_id, error = %err, "entry needs migration");
            self.set_state(entry_id, EntryState::MigrationError);
        } else if err.requires_reauth() {
            tracing::error!(%entry_id, error = %err, "credentials rejected, reauthentication required");
            self.set_state(entry_id, EntryState::SetupError);
        } else {
            tracing::error!(%entry_id, error = %err, "setup failed");
            self.set_state(entry_id, EntryState::SetupError);
        }
    }

    async fn retry(&mut self, entry_id: EntryId) {
        if self.state(entry_id) != EntryState::SetupRetry || self.hubs.contains(entry_id).await {
            tracing::debug!(%entry_id, "retry no longer due");
            return;
        }
        match self.store.read(entry_id).await {
            Ok(entry) => self.load(entry).await,
            Err(err) => {
                tracing::warn!(%entry_id, error = %err, "entry vanished before retry");
                self.set_state(entry_id, EntryState::NotLoaded);
            }
        }
    }

    async fn dispatch(&mut self, command: EntryCommand) {
        let entry_id = command.entry_id();
        let result = self.integration.handle_command(&self.hubs, command).await;
        let live = self.hubs.contains(entry_id).await;
        match result {
            Ok(()) if live => self.set_state(entry_id, EntryState::Loaded),
            Ok(()) => {
                if self.state(entry_id) == EntryState::Loaded {
                    self.set_state(entry_id, EntryState::NotLoaded);
                }
            }
            Err(err) if live => {
                tracing::warn!(%entry_id, error = %err, "command failed");
            }
            Err(err) => self.setup_failed(entry_id, &err),
        }
    }

    async fn handle(&mut self, next: Next) {
        match next {
            Next::Command(command) => self.dispatch(command).await,
            Next::Retry(entry_id) => self.retry(entry_id).await,
        }
    }

    /// Unload an entry on request.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is not in the store.
    #[tracing::instrument(skip(self))]
    pub async fn unload(&mut self, entry_id: EntryId) -> Result<(), AxlinkError> {
        let entry = self.store.read(entry_id).await?;
        let state = match self.integration.unload_entry(&self.hubs, &entry).await {
            Ok(true) => EntryState::NotLoaded,
            Ok(false) => EntryState::FailedUnload,
            Err(err) => {
                tracing::error!(error = %err, "unload failed");
                EntryState::FailedUnload
            }
        };
        self.set_state(entry_id, state);
        Ok(())
    }

    /// Handle the next pending command or due retry. Returns `false` once
    /// both channels are closed.
    pub async fn step(&mut self) -> bool {
        let next = tokio::select! {
            Some(command) = self.commands.recv() => Next::Command(command),
            Some(entry_id) = self.retry_rx.recv() => Next::Retry(entry_id),
            else => return false,
        };
        self.handle(next).await;
        true
    }

    /// Run until `shutdown` completes, then stop every live entry.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            let next = tokio::select! {
                () = &mut shutdown => break,
                Some(command) = self.commands.recv() => Next::Command(command),
                Some(entry_id) = self.retry_rx.recv() => Next::Retry(entry_id),
                else => break,
            };
            self.handle(next).await;
        }
        self.stop().await;
    }

    /// Announce host stop and wait for the live entries to shut down.
    ///
    /// Entries whose shutdown hook does not report back within the grace
    /// period are unloaded directly.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&mut self) {
        let live = self.hubs.len().await;
        tracing::info!(live, "stopping");
        let event = Event::new(EventType::HostStop, None, json!({}));
        if let Err(err) = self.bus.publish(event).await {
            tracing::warn!(error = %err, "failed to announce host stop");
        }

        while !self.hubs.is_empty().await {
            match tokio::time::timeout(STOP_GRACE, self.commands.recv()).await {
                Ok(Some(command)) => self.dispatch(command).await,
                Ok(None) | Err(_) => break,
            }
        }

        for entry_id in self.hubs.entry_ids().await {
            tracing::warn!(%entry_id, "shutdown hook did not fire, unloading");
            if let Err(err) = self.unload(entry_id).await {
                tracing::error!(%entry_id, error = %err, "unable to unload entry");
            }
        }
        tracing::info!("stopped");
    }
}

/// Insert the configured seeds that the store does not know yet. Seeds
/// with an id are matched by id, the others by title. Returns how many
/// entries were added.
///
/// # Errors
///
/// Returns an error if the store cannot be listed or written.
pub async fn seed_entries<St: EntryStore>(
    store: &St,
    seeds: Vec<EntrySeed>,
) -> Result<usize, AxlinkError> {
    let existing = store.list().await?;
    let mut added = 0;
    for seed in seeds {
        let known = existing.iter().any(|entry| match seed.id {
            Some(id) => entry.id == id,
            None => entry.title == seed.title,
        });
        if known {
            continue;
        }

        let mut entry = ConfiguredEntry::new(seed.title, seed.version, seed.data);
        if let Some(id) = seed.id {
            entry.id = id;
        }
        tracing::debug!(entry_id = %entry.id, title = %entry.title, "seeding entry");
        store.insert(entry).await?;
        added += 1;
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> Backoff {
        Backoff {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(300),
        }
    }

    #[test]
    fn should_double_delay_per_attempt() {
        let backoff = backoff();
        assert_eq!(backoff.delay(0), Duration::from_secs(5));
        assert_eq!(backoff.delay(1), Duration::from_secs(10));
        assert_eq!(backoff.delay(3), Duration::from_secs(40));
    }

    #[test]
    fn should_cap_delay_at_max() {
        let backoff = backoff();
        assert_eq!(backoff.delay(7), Duration::from_secs(300));
        assert_eq!(backoff.delay(40), Duration::from_secs(300));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(300));
    }

    #[test]
    fn should_build_from_retry_config() {
        let backoff = Backoff::from(RetryConfig::default());
        assert_eq!(backoff, self::backoff());
    }
}
