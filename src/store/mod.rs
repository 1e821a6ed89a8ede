//! Event-emitting data stores.
//!
//! A [`Store`] owns a value of some serializable type, compares incoming
//! values against it, and pushes accepted changes into the component it is
//! bound to on a configurable schedule. Listeners observe the lifecycle
//! through [`EventKind`]s.

mod events;
mod options;
mod store;

pub use events::{EventKind, Listener, ListenerId, StoreEvent};
pub use options::{SetOptions, StoreConfig, StoreOptions, UpdateTiming};
pub use store::{Store, StoreData, Writer};
