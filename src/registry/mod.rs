//! Type-keyed channels and the live store index.
//!
//! Every store type (a plain string such as `"todo"`) owns two channels: one
//! carrying the store handle and one carrying its data. They are created on
//! first use and then shared by every store of that type for the registry's
//! lifetime. Lookups never fail loudly; unknown names come back as `None`.

use crate::runtime::{next_token, Element};
use crate::store::{Store, StoreData};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Identity of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

/// A propagation channel: values provided through it are visible to every
/// descendant element.
#[derive(Clone)]
pub struct Channel {
    inner: Rc<ChannelInner>,
}

struct ChannelInner {
    id: ChannelId,
    name: String,
    fallback: Option<Rc<dyn Any>>,
}

impl Channel {
    /// A channel with no fallback value.
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), None)
    }

    /// A channel that reads as `fallback` where nothing is provided.
    pub fn with_fallback<T: 'static>(name: impl Into<String>, fallback: T) -> Self {
        Self::build(name.into(), Some(Rc::new(fallback)))
    }

    fn build(name: String, fallback: Option<Rc<dyn Any>>) -> Self {
        Self {
            inner: Rc::new(ChannelInner {
                id: ChannelId(next_token()),
                name,
                fallback,
            }),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn fallback<T: Clone + 'static>(&self) -> Option<T> {
        self.inner.fallback.as_ref()?.downcast_ref::<T>().cloned()
    }

    /// Make `value` visible to every descendant of `child`.
    pub fn provide<T: 'static>(&self, value: T, child: Element) -> Element {
        self.provide_shared(Rc::new(value), next_token(), child)
    }

    /// Provide an already shared value. Descendants re-render only when
    /// `token` differs from the one they last read.
    pub(crate) fn provide_shared(&self, value: Rc<dyn Any>, token: u64, child: Element) -> Element {
        Element::provide(self.clone(), value, token, child)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("has_fallback", &self.inner.fallback.is_some())
            .finish()
    }
}

#[derive(Default)]
struct RegistryInner {
    store_channels: HashMap<String, Channel>,
    data_channels: HashMap<String, Channel>,
    instances: HashMap<String, Rc<dyn Any>>,
}

/// Lookup service from store type to channels, and from store id to the
/// live (bound) store.
///
/// Each [`Runtime`](crate::runtime::Runtime) owns one; cloning shares it.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Rc<RefCell<RegistryInner>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store channel for `store_type`, created on first use.
    pub fn ensure_store_channel(&self, store_type: &str) -> Channel {
        let mut inner = self.inner.borrow_mut();
        inner
            .store_channels
            .entry(store_type.to_owned())
            .or_insert_with(|| {
                tracing::trace!(store_type, "creating store channel");
                Channel::new(format!("store {store_type}"))
            })
            .clone()
    }

    /// The data channel for `store_type`, created on first use without a fallback.
    pub fn ensure_data_channel(&self, store_type: &str) -> Channel {
        self.ensure_data_channel_inner(store_type, || Channel::new(format!("data {store_type}")))
    }

    /// The data channel for `store_type`; `fallback` is only used if this call
    /// creates the channel.
    pub fn ensure_data_channel_with<T: 'static>(&self, store_type: &str, fallback: T) -> Channel {
        self.ensure_data_channel_inner(store_type, || {
            Channel::with_fallback(format!("data {store_type}"), fallback)
        })
    }

    fn ensure_data_channel_inner(&self, store_type: &str, create: impl FnOnce() -> Channel) -> Channel {
        let mut inner = self.inner.borrow_mut();
        inner
            .data_channels
            .entry(store_type.to_owned())
            .or_insert_with(|| {
                tracing::trace!(store_type, "creating data channel");
                create()
            })
            .clone()
    }

    pub fn store_channel(&self, store_type: &str) -> Option<Channel> {
        self.inner.borrow().store_channels.get(store_type).cloned()
    }

    pub fn data_channel(&self, store_type: &str) -> Option<Channel> {
        self.inner.borrow().data_channels.get(store_type).cloned()
    }

    pub fn set_instance<T: StoreData>(&self, store: &Store<T>) {
        self.inner
            .borrow_mut()
            .instances
            .insert(store.id().to_owned(), Rc::new(store.clone()));
    }

    pub fn delete_instance<T: StoreData>(&self, store: &Store<T>) -> bool {
        self.inner.borrow_mut().instances.remove(store.id()).is_some()
    }

    /// The live store registered under `id`, if it holds data of type `T`.
    pub fn instance<T: StoreData>(&self, id: &str) -> Option<Store<T>> {
        let instance = self.inner.borrow().instances.get(id).cloned()?;
        instance.downcast_ref::<Store<T>>().cloned()
    }

    pub fn contains_instance(&self, id: &str) -> bool {
        self.inner.borrow().instances.contains_key(id)
    }

    pub fn instance_count(&self) -> usize {
        self.inner.borrow().instances.len()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Registry")
            .field("store_channels", &inner.store_channels.len())
            .field("data_channels", &inner.data_channels.len())
            .field("instances", &inner.instances.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::store::StoreOptions;

    #[test]
    fn channels_are_memoized_per_type() {
        let registry = Registry::new();
        assert!(registry.store_channel("todo").is_none());
        assert!(registry.data_channel("todo").is_none());

        let store = registry.ensure_store_channel("todo");
        let data = registry.ensure_data_channel_with("todo", 1u32);
        assert_eq!(registry.ensure_store_channel("todo").id(), store.id());
        assert_eq!(registry.ensure_data_channel_with("todo", 2u32).id(), data.id());
        assert_eq!(registry.ensure_data_channel("todo").fallback::<u32>(), Some(1));
        assert_ne!(registry.ensure_store_channel("user").id(), store.id());
        assert_eq!(store.name(), "store todo");
        assert_eq!(data.name(), "data todo");
    }

    #[test]
    fn fallback_type_mismatch_reads_as_none() {
        let channel = Channel::with_fallback("n", 3u8);
        assert_eq!(channel.fallback::<u8>(), Some(3));
        assert_eq!(channel.fallback::<String>(), None);
    }

    #[test]
    fn instances_by_id() {
        Runtime::scope(|| {
            let registry = Runtime::current().registry().clone();
            let store = Store::new("counter", 0i64, StoreOptions::new().id("c-1"));

            assert!(registry.instance::<i64>("c-1").is_none());
            registry.set_instance(&store);
            assert!(registry.contains_instance("c-1"));
            assert_eq!(registry.instance::<i64>("c-1").map(|s| s.data()), Some(0));
            assert!(registry.instance::<String>("c-1").is_none());

            assert!(registry.delete_instance(&store));
            assert!(!registry.delete_instance(&store));
            assert_eq!(registry.instance_count(), 0);
        });
    }
}
