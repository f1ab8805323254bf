//! Integration port: the entry points the host drives.
//!
//! The host calls these at fixed points of a configured device's life:
//!
//! 1. [`migrate_entry`](Integration::migrate_entry) before loading, to bring
//!    the stored payload up to the current schema
//! 2. [`setup_entry`](Integration::setup_entry) to activate the entry
//! 3. [`handle_command`](Integration::handle_command) for every command the
//!    entry's inbox receives while it is live
//! 4. [`unload_entry`](Integration::unload_entry) on removal
//!
//! Failures are reported through [`AxlinkError`], never through the `bool`
//! success flags.

use std::future::Future;

use axlink_domain::entry::ConfiguredEntry;
use axlink_domain::error::AxlinkError;

use crate::hub::HubRegistry;
use crate::inbox::EntryCommand;
use crate::ports::DeviceSession;

/// A device-family integration as seen by the host.
///
/// The host serializes calls per entry id; calls for different entries may
/// run concurrently.
pub trait Integration {
    /// Session type held by the hubs this integration creates.
    type Session: DeviceSession;

    /// Domain name tagging this integration's entries (e.g. `"axis"`).
    fn domain(&self) -> &'static str;

    /// Activate an entry that is already at the current schema version.
    ///
    /// # Errors
    ///
    /// - [`AxlinkError::NotReady`]: retry later with backoff
    /// - [`AxlinkError::AuthRequired`]: do not retry until the user acts
    /// - [`AxlinkError::Migration`]: the entry was not migrated first
    fn setup_entry(
        &self,
        hubs: &HubRegistry<Self::Session>,
        entry: &ConfiguredEntry,
    ) -> impl Future<Output = Result<bool, AxlinkError>> + Send;

    /// Deactivate an entry. Always succeeds, including for entries whose
    /// setup never completed.
    fn unload_entry(
        &self,
        hubs: &HubRegistry<Self::Session>,
        entry: &ConfiguredEntry,
    ) -> impl Future<Output = Result<bool, AxlinkError>> + Send;

    /// Bring a stored entry up to the current schema, persisting the result.
    ///
    /// # Errors
    ///
    /// Returns [`AxlinkError::Migration`] when the entry cannot be migrated
    /// by this build, or a storage error if persisting fails.
    fn migrate_entry(
        &self,
        entry: &mut ConfiguredEntry,
    ) -> impl Future<Output = Result<bool, AxlinkError>> + Send;

    /// React to a command posted to an entry's inbox.
    fn handle_command(
        &self,
        hubs: &HubRegistry<Self::Session>,
        command: EntryCommand,
    ) -> impl Future<Output = Result<(), AxlinkError>> + Send;
}
