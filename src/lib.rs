//! # Provision
//!
//! Event-emitting data stores for component trees.
//!
//! Provision provides two levels of abstraction:
//!
//! ## Runtime (Low-level primitives)
//!
//! A small, deterministic, single-threaded render runtime:
//! - `Runtime` - Component tree, channel propagation and a virtual-clock scheduler
//! - `Cx` - Order-based hooks (`use_state`, `use_ref`, `use_mount`, `use_effect_keyed`)
//! - `Element` - Text, lists, components and provided values
//!
//! ## Store (High-level state management)
//!
//! - `Store<T>` - Comparator-guarded data with lifecycle events
//! - Coalesced updates on the next frame, synchronously, or after a delay
//! - Providers and hooks that hand stores and their data down the tree
//!
//! # Examples
//!
//! ```
//! use provision::{use_data, Element, Runtime, Store, StoreOptions};
//!
//! Runtime::scope(|| {
//!     let runtime = Runtime::current();
//!     let counter = Store::new("counter", 0i64, StoreOptions::new());
//!
//!     let label = Element::component(|cx| {
//!         let count = use_data::<i64>(cx, "counter").unwrap_or_default();
//!         Element::text(format!("count: {count}"))
//!     });
//!
//!     runtime.render(counter.provider(label));
//!     assert_eq!(runtime.text(), "count: 0");
//!
//!     counter.update(|n| *n += 1);
//!     counter.update(|n| *n += 1);
//!     assert_eq!(runtime.text(), "count: 0");
//!     runtime.frame();
//!     assert_eq!(runtime.text(), "count: 2");
//! });
//! ```

pub mod compare;
pub mod error;
pub mod hooks;
pub mod provider;
pub mod registry;
pub mod runtime;
pub mod store;
pub mod util;

// Re-export main types for convenience
pub use compare::{deep_equal, full_equal, not_equal, shallow_equal, Compare, ComparePolicy};
pub use error::{Result, StoreError};
pub use hooks::{use_creator, use_creator_with, use_data, use_store};
pub use provider::{create_inherit_provider, create_provider, Provider, RenderProps, StoreHandle};
pub use registry::{Channel, Registry};
pub use runtime::{Cx, Element, Runtime};
pub use store::{
    EventKind, ListenerId, SetOptions, Store, StoreConfig, StoreData, StoreEvent, StoreOptions,
    UpdateTiming,
};
pub use util::{merge, random};
