//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod device_registry;
pub mod entry_store;
pub mod event_bus;
pub mod integration;
pub mod platform;
pub mod session;
pub mod storage;

pub use device_registry::DeviceRegistry;
pub use entry_store::EntryStore;
pub use event_bus::{EventPublisher, EventSubscriber};
pub use integration::Integration;
pub use platform::PlatformForwarder;
pub use session::{DeviceSession, SessionConnector};
pub use storage::DeviceRepository;
