//! Entry inbox: the command channel from host collaborators to the
//! controller.
//!
//! Update listeners and the shutdown hook do not capture controller state.
//! They post an [`EntryCommand`] into the entry's inbox and the host feeds
//! each command back through
//! [`Integration::handle_command`](crate::ports::Integration::handle_command).

use tokio::sync::mpsc;

use axlink_domain::event::Event;
use axlink_domain::id::EntryId;

/// A message addressed to one entry's controller.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryCommand {
    /// The stored payload was written; re-read it and reconfigure.
    Updated { entry_id: EntryId },
    /// A bus event the entry subscribed to fired.
    Event { entry_id: EntryId, event: Event },
}

impl EntryCommand {
    #[must_use]
    pub fn entry_id(&self) -> EntryId {
        match self {
            Self::Updated { entry_id } | Self::Event { entry_id, .. } => *entry_id,
        }
    }
}

/// Sending half of the command channel, tagged with the entry it serves.
#[derive(Debug, Clone)]
pub struct EntryInbox {
    entry_id: EntryId,
    sender: mpsc::UnboundedSender<EntryCommand>,
}

impl EntryInbox {
    #[must_use]
    pub fn new(entry_id: EntryId, sender: mpsc::UnboundedSender<EntryCommand>) -> Self {
        Self { entry_id, sender }
    }

    #[must_use]
    pub fn entry_id(&self) -> EntryId {
        self.entry_id
    }

    /// Post [`EntryCommand::Updated`]. Returns `false` once the host stopped
    /// reading commands.
    pub fn notify_updated(&self) -> bool {
        self.sender
            .send(EntryCommand::Updated {
                entry_id: self.entry_id,
            })
            .is_ok()
    }

    /// Post [`EntryCommand::Event`]. Returns `false` once the host stopped
    /// reading commands.
    pub fn deliver(&self, event: Event) -> bool {
        self.sender
            .send(EntryCommand::Event {
                entry_id: self.entry_id,
                event,
            })
            .is_ok()
    }
}

/// Sending half shared by every inbox, plus the host's receiving half.
pub fn channel() -> (
    mpsc::UnboundedSender<EntryCommand>,
    mpsc::UnboundedReceiver<EntryCommand>,
) {
    mpsc::unbounded_channel()
}
