use super::events::{Emitter, EventKind, ListenerId, StoreEvent};
use super::options::{SetOptions, StoreOptions, UpdateTiming};
use crate::compare::Compare;
use crate::error::{Result, StoreError};
use crate::registry::Channel;
use crate::runtime::{next_token, Cx, Element, Runtime, StateSlot, TaskHandle, WeakRuntime};
use crate::util::random;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Length of generated store ids.
const STORE_ID_LENGTH: usize = 16;

/// Data a store can hold.
pub trait StoreData: Clone + Serialize + DeserializeOwned + 'static {}

impl<T> StoreData for T where T: Clone + Serialize + DeserializeOwned + 'static {}

/// An event-emitting data store that binds to one component at a time.
///
/// A store holds a current value, the value it replaced, and the default it
/// resets to. Mutations compare the new value against the current one and,
/// when they differ, update the snapshot synchronously and schedule the
/// render-visible copy to follow according to the store's [`UpdateTiming`].
///
/// Cloning a store yields another handle to the same instance.
///
/// # Examples
///
/// ```
/// use provision::{Runtime, Store, StoreOptions};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// struct Counter {
///     count: i32,
/// }
///
/// Runtime::scope(|| {
///     let store = Store::new("counter", Counter { count: 0 }, StoreOptions::new());
///     assert!(store.set(Counter { count: 1 }));
///     assert!(!store.set(Counter { count: 1 }));
///     assert_eq!(store.data().count, 1);
///     assert_eq!(store.prev_data(), Some(Counter { count: 0 }));
/// });
/// ```
pub struct Store<T> {
    inner: Rc<StoreInner<T>>,
}

struct StoreInner<T> {
    id: String,
    store_type: String,
    token: u64,
    debug: bool,
    compare: Compare<T>,
    update_timing: UpdateTiming,
    runtime: WeakRuntime,
    store_channel: Channel,
    data_channel: Channel,
    state: RefCell<StoreState<T>>,
    events: Emitter<T>,
}

struct StoreState<T> {
    default_data: T,
    data: T,
    prev_data: Option<T>,
    bound: bool,
    update_count: u64,
    pending: Option<TaskHandle>,
    slot: Option<StateSlot<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: StoreData> Store<T> {
    /// Create a store in the current runtime.
    pub fn new(store_type: impl Into<String>, default_data: T, options: StoreOptions<T>) -> Self {
        Self::new_in(&Runtime::current(), store_type, default_data, options)
    }

    /// Create a store whose channels live in `runtime`'s registry.
    pub fn new_in(
        runtime: &Runtime,
        store_type: impl Into<String>,
        default_data: T,
        options: StoreOptions<T>,
    ) -> Self {
        let store_type = store_type.into();
        let registry = runtime.registry();
        let store_channel = registry.ensure_store_channel(&store_type);
        let data_channel = registry.ensure_data_channel_with(&store_type, default_data.clone());

        let StoreOptions {
            id,
            debug,
            compare,
            update_timing,
            on_created,
            on_rendered,
            on_update_before,
            on_updated,
            on_destroy_before,
        } = options;

        let store = Self {
            inner: Rc::new(StoreInner {
                id: id.unwrap_or_else(|| random(STORE_ID_LENGTH)),
                store_type,
                token: next_token(),
                debug,
                compare,
                update_timing,
                runtime: runtime.downgrade(),
                store_channel,
                data_channel,
                state: RefCell::new(StoreState {
                    data: default_data.clone(),
                    default_data,
                    prev_data: None,
                    bound: false,
                    update_count: 0,
                    pending: None,
                    slot: None,
                }),
                events: Emitter::default(),
            }),
        };

        let events = &store.inner.events;
        if let Some(f) = on_created {
            events.add(EventKind::Created, f, true);
        }
        if let Some(f) = on_rendered {
            events.add(EventKind::Rendered, f, false);
        }
        if let Some(f) = on_update_before {
            events.add(EventKind::UpdateBefore, f, false);
        }
        if let Some(f) = on_updated {
            events.add(EventKind::Updated, f, false);
        }
        if let Some(f) = on_destroy_before {
            events.add(EventKind::DestroyBefore, f, true);
        }
        store
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn store_type(&self) -> &str {
        &self.inner.store_type
    }

    pub fn is_debug(&self) -> bool {
        self.inner.debug
    }

    pub fn update_timing(&self) -> UpdateTiming {
        self.inner.update_timing
    }

    /// The current data. Reflects every accepted mutation immediately, even
    /// before the render-visible copy catches up.
    pub fn data(&self) -> T {
        self.inner.state.borrow().data.clone()
    }

    /// The value replaced by the most recent accepted mutation.
    pub fn prev_data(&self) -> Option<T> {
        self.inner.state.borrow().prev_data.clone()
    }

    pub fn default_data(&self) -> T {
        self.inner.state.borrow().default_data.clone()
    }

    /// Read the current data without cloning it.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.inner.state.borrow().data)
    }

    /// The render-visible copy, while bound.
    pub fn rendered_data(&self) -> Option<T> {
        self.inner.state.borrow().slot.as_ref().map(StateSlot::get)
    }

    /// Number of flushes since the store was bound.
    pub fn update_count(&self) -> u64 {
        self.inner.state.borrow().update_count
    }

    pub fn is_bound(&self) -> bool {
        self.inner.state.borrow().bound
    }

    pub fn has_pending_update(&self) -> bool {
        self.inner.state.borrow().pending.is_some()
    }

    pub fn store_channel(&self) -> &Channel {
        &self.inner.store_channel
    }

    pub fn data_channel(&self) -> &Channel {
        &self.inner.data_channel
    }

    pub fn ptr_eq(&self, other: &Store<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    pub fn on(&self, kind: EventKind, listener: impl Fn(&StoreEvent<T>) + 'static) -> ListenerId {
        self.inner.events.add(kind, Rc::new(listener), false)
    }

    /// Like [`on`](Self::on), removed after its first call.
    pub fn once(&self, kind: EventKind, listener: impl Fn(&StoreEvent<T>) + 'static) -> ListenerId {
        self.inner.events.add(kind, Rc::new(listener), true)
    }

    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.inner.events.remove(kind, id)
    }

    pub fn remove_all_listeners(&self) {
        self.inner.events.clear();
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.events.count(kind)
    }

    /// Dispatch `event` to its listeners; true if there were any.
    pub fn emit(&self, event: &StoreEvent<T>) -> bool {
        if self.inner.debug {
            let data = serde_json::to_string(&event.data).unwrap_or_default();
            tracing::debug!(
                target: "provision::store",
                store_type = %self.inner.store_type,
                store_id = %self.inner.id,
                event = %event.kind,
                %data,
                "store event"
            );
        } else {
            tracing::trace!(
                target: "provision::store",
                store_type = %self.inner.store_type,
                store_id = %self.inner.id,
                event = %event.kind,
                "store event"
            );
        }
        self.inner.events.emit(event)
    }

    fn fire(&self, kind: EventKind, data: T, prev_data: Option<T>) -> bool {
        self.emit(&StoreEvent {
            kind,
            data,
            prev_data,
            store: self.clone(),
        })
    }

    // ---------------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------------

    /// Mutations with per-call comparator or timing overrides.
    pub fn using(&self, options: SetOptions<T>) -> Writer<'_, T> {
        Writer {
            store: self,
            options,
        }
    }

    fn writer(&self) -> Writer<'_, T> {
        self.using(SetOptions::default())
    }

    /// Replace the data. Returns false, with no side effect, when the
    /// comparator finds the new value equal to the current one.
    pub fn set(&self, data: T) -> bool {
        self.writer().set(data)
    }

    /// Shallow-merge the fields of `partial` into the data.
    pub fn set_part(&self, partial: impl Serialize) -> bool {
        self.writer().set_part(partial)
    }

    pub fn try_set_part(&self, partial: impl Serialize) -> Result<bool> {
        self.writer().try_set_part(partial)
    }

    /// Replace one field, by name.
    pub fn set_item(&self, key: &str, value: impl Serialize) -> bool {
        self.writer().set_item(key, value)
    }

    /// Shallow-merge `partial` into one field, by name.
    pub fn set_item_part(&self, key: &str, partial: impl Serialize) -> bool {
        self.writer().set_item_part(key, partial)
    }

    /// Replace one field, selected by accessor.
    pub fn set_field<V>(&self, field: impl FnOnce(&mut T) -> &mut V, value: V) -> bool {
        self.writer().set_field(field, value)
    }

    /// Apply `f` to a copy of the data and set the result.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        self.writer().update(f)
    }

    /// Return to the default data.
    pub fn reset(&self) -> bool {
        self.writer().reset()
    }

    /// Return to the default data with the fields of `partial` merged over it.
    pub fn reset_with(&self, partial: impl Serialize) -> bool {
        self.writer().reset_with(partial)
    }

    pub fn try_reset_with(&self, partial: impl Serialize) -> Result<bool> {
        self.writer().try_reset_with(partial)
    }

    /// Cancel any pending flush and schedule a new one.
    fn schedule_flush(&self, timing: UpdateTiming) {
        let runtime = self.inner.runtime.upgrade();
        let (previous, bound) = {
            let mut state = self.inner.state.borrow_mut();
            (state.pending.take(), state.bound)
        };
        if let (Some(handle), Some(runtime)) = (previous, &runtime) {
            runtime.cancel(handle);
        }
        if !bound {
            return;
        }
        let Some(runtime) = runtime else {
            self.flush();
            return;
        };

        let weak = Rc::downgrade(&self.inner);
        let task = move || {
            if let Some(inner) = Weak::upgrade(&weak) {
                Store { inner }.flush();
            }
        };
        let handle = match timing {
            UpdateTiming::Delay(delay) if delay.is_zero() => {
                self.flush();
                runtime.flush();
                return;
            }
            UpdateTiming::Now => {
                self.flush();
                runtime.flush();
                return;
            }
            UpdateTiming::Delay(delay) => runtime.set_timeout(delay, task),
            UpdateTiming::NextFrame => runtime.request_frame(task),
        };
        self.inner.state.borrow_mut().pending = Some(handle);
    }

    /// Push the current data into the render-visible slot.
    fn flush(&self) {
        let (slot, data) = {
            let mut state = self.inner.state.borrow_mut();
            state.pending = None;
            state.update_count += 1;
            (state.slot.clone(), state.data.clone())
        };
        if let Some(slot) = slot {
            slot.set(data);
        }
    }

    // ---------------------------------------------------------------------
    // Binding
    // ---------------------------------------------------------------------

    /// Attach the store to the component rendering `cx`.
    ///
    /// Returns the render-visible data and the store. A store may be bound by
    /// one component at a time. The first render starts from the default
    /// data; mutations made while unbound are discarded.
    ///
    /// # Panics
    ///
    /// When the component mounts while the store is already bound elsewhere.
    pub fn bind(&self, cx: &mut Cx<'_>) -> (T, Store<T>) {
        self.bind_seeded(cx, None)
    }

    fn bind_seeded(&self, cx: &mut Cx<'_>, seed: Option<T>) -> (T, Store<T>) {
        let slot = cx.use_state(|| {
            let mut state = self.inner.state.borrow_mut();
            let seed = seed.unwrap_or_else(|| state.default_data.clone());
            state.data = seed.clone();
            seed
        });
        self.inner.state.borrow_mut().slot = Some(slot.clone());

        let store = self.clone();
        cx.use_mount(move || {
            store.attach();
            move || store.detach()
        });

        let store = self.clone();
        cx.use_effect_keyed(self.update_count(), move || store.announce_render());

        (slot.get(), self.clone())
    }

    fn attach(&self) {
        if let Err(err) = self.mark_bound() {
            panic!("{err}");
        }
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.registry().set_instance(self);
        }
    }

    fn mark_bound(&self) -> Result<()> {
        let mut state = self.inner.state.borrow_mut();
        if state.bound {
            return Err(StoreError::AlreadyBound {
                id: self.inner.id.clone(),
            });
        }
        state.bound = true;
        Ok(())
    }

    fn detach(&self) {
        self.fire(EventKind::DestroyBefore, self.data(), None);
        self.inner.events.clear();
        let pending = {
            let mut state = self.inner.state.borrow_mut();
            state.bound = false;
            state.update_count = 0;
            state.data = state.default_data.clone();
            state.prev_data = None;
            state.slot = None;
            state.pending.take()
        };
        if let Some(runtime) = self.inner.runtime.upgrade() {
            if let Some(handle) = pending {
                runtime.cancel(handle);
            }
            runtime.registry().delete_instance(self);
        }
    }

    fn announce_render(&self) {
        let (count, data, prev_data) = {
            let state = self.inner.state.borrow();
            (state.update_count, state.data.clone(), state.prev_data.clone())
        };
        if count == 0 {
            self.fire(EventKind::Created, data.clone(), None);
        } else {
            self.fire(EventKind::Updated, data.clone(), prev_data);
        }
        self.fire(EventKind::Rendered, data, None);
    }

    // ---------------------------------------------------------------------
    // Providers
    // ---------------------------------------------------------------------

    /// Bind the store and provide it, and its data, to `children`.
    pub fn provider(&self, children: Element) -> Element {
        let store = self.clone();
        Element::tagged(self.inner.token, move |cx| {
            let (data, store) = store.bind(cx);
            store.wrap(data, children.clone())
        })
    }

    /// Like [`provider`](Self::provider), with children built from the
    /// render-visible data on every render.
    pub fn provider_fn<F>(&self, render: F) -> Element
    where
        F: Fn(&T, &Store<T>) -> Element + 'static,
    {
        let store = self.clone();
        Element::tagged(self.inner.token, move |cx| {
            let (data, store) = store.bind(cx);
            let children = render(&data, &store);
            store.wrap(data, children)
        })
    }

    /// Like [`provider`](Self::provider), but the first render starts from
    /// the data an enclosing store of the same type provides, falling back
    /// to this store's default.
    pub fn inherit_provider(&self, children: Element) -> Element {
        let store = self.clone();
        Element::tagged(self.inner.token, move |cx| {
            let inherited = cx.read_provided::<T>(&store.inner.data_channel);
            let (data, store) = store.bind_seeded(cx, inherited);
            store.wrap(data, children.clone())
        })
    }

    fn wrap(&self, data: T, children: Element) -> Element {
        let version = self
            .inner
            .state
            .borrow()
            .slot
            .as_ref()
            .map_or(0, StateSlot::version);
        let data = self
            .inner
            .data_channel
            .provide_shared(Rc::new(data), version, children);
        self.inner
            .store_channel
            .provide_shared(Rc::new(self.clone()), self.inner.token, data)
    }

    /// Nearest provided data of this store's type.
    pub fn use_data(&self, cx: &mut Cx<'_>) -> Option<T> {
        cx.read_channel(&self.inner.data_channel)
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("type", &self.inner.store_type)
            .field("data", &state.data)
            .field("bound", &state.bound)
            .field("update_count", &state.update_count)
            .finish_non_exhaustive()
    }
}

/// Mutation operations with per-call overrides, from [`Store::using`].
pub struct Writer<'a, T> {
    store: &'a Store<T>,
    options: SetOptions<T>,
}

impl<T: StoreData> Writer<'_, T> {
    pub fn set(&self, data: T) -> bool {
        let store = self.store;
        let equal = {
            let compare = self.options.compare.as_ref().unwrap_or(&store.inner.compare);
            store.read(|current| compare.equals(&data, current))
        };
        if equal {
            return false;
        }

        let prev = store.data();
        store.fire(EventKind::UpdateBefore, data.clone(), Some(prev.clone()));
        {
            let mut state = store.inner.state.borrow_mut();
            state.prev_data = Some(prev);
            state.data = data;
        }
        store.schedule_flush(self.options.timing.unwrap_or(store.inner.update_timing));
        true
    }

    pub fn set_part(&self, partial: impl Serialize) -> bool {
        self.or_reject(self.try_set_part(partial))
    }

    pub fn try_set_part(&self, partial: impl Serialize) -> Result<bool> {
        let current = serde_json::to_value(self.store.data())?;
        let merged = self.merge_object(current, serde_json::to_value(partial)?, "data")?;
        Ok(self.set(serde_json::from_value(merged)?))
    }

    pub fn set_item(&self, key: &str, value: impl Serialize) -> bool {
        self.or_reject(self.try_set_item(key, value))
    }

    pub fn try_set_item(&self, key: &str, value: impl Serialize) -> Result<bool> {
        let mut partial = Map::new();
        partial.insert(key.to_owned(), serde_json::to_value(value)?);
        self.try_set_part(Value::Object(partial))
    }

    pub fn set_item_part(&self, key: &str, partial: impl Serialize) -> bool {
        self.or_reject(self.try_set_item_part(key, partial))
    }

    pub fn try_set_item_part(&self, key: &str, partial: impl Serialize) -> Result<bool> {
        let current = serde_json::to_value(self.store.data())?;
        let item = match current.get(key) {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(item) => item.clone(),
        };
        let merged = self.merge_object(item, serde_json::to_value(partial)?, "item")?;
        self.try_set_item(key, merged)
    }

    pub fn set_field<V>(&self, field: impl FnOnce(&mut T) -> &mut V, value: V) -> bool {
        let mut next = self.store.data();
        *field(&mut next) = value;
        self.set(next)
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut next = self.store.data();
        f(&mut next);
        self.set(next)
    }

    pub fn reset(&self) -> bool {
        self.set(self.store.default_data())
    }

    pub fn reset_with(&self, partial: impl Serialize) -> bool {
        self.or_reject(self.try_reset_with(partial))
    }

    pub fn try_reset_with(&self, partial: impl Serialize) -> Result<bool> {
        let default = serde_json::to_value(self.store.default_data())?;
        let merged = self.merge_object(default, serde_json::to_value(partial)?, "default data")?;
        Ok(self.set(serde_json::from_value(merged)?))
    }

    /// One-level merge of `partial` over `base`.
    fn merge_object(&self, base: Value, partial: Value, what: &'static str) -> Result<Value> {
        let not_object = |what| StoreError::NotAnObject {
            store_type: self.store.inner.store_type.clone(),
            what,
        };
        let Value::Object(mut base) = base else {
            return Err(not_object(what));
        };
        let Value::Object(partial) = partial else {
            return Err(not_object("partial update"));
        };
        base.extend(partial);
        Ok(Value::Object(base))
    }

    fn or_reject(&self, result: Result<bool>) -> bool {
        result.unwrap_or_else(|err| {
            tracing::warn!(
                store_type = %self.store.inner.store_type,
                store_id = %self.store.inner.id,
                error = %err,
                "mutation rejected"
            );
            false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::ComparePolicy;
    use serde::Deserialize;
    use std::cell::Cell;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Pair {
        a: i32,
        b: i32,
    }

    fn pair(a: i32, b: i32) -> Pair {
        Pair { a, b }
    }

    /// Render a single component that binds `store` and prints `a`.
    fn mount(runtime: &Runtime, store: &Store<Pair>) {
        let store = store.clone();
        runtime.render(Element::component(move |cx| {
            let (data, _) = store.bind(cx);
            Element::text(data.a.to_string())
        }));
    }

    #[test]
    fn equal_set_is_a_no_op() {
        Runtime::scope(|| {
            let store = Store::new("pair", pair(0, 0), StoreOptions::new());
            let calls = Rc::new(Cell::new(0));
            let counter = Rc::clone(&calls);
            store.on(EventKind::UpdateBefore, move |_| counter.set(counter.get() + 1));

            assert!(!store.set(pair(0, 0)));
            assert_eq!(calls.get(), 0);
            assert_eq!(store.prev_data(), None);

            assert!(store.set(pair(1, 0)));
            assert_eq!(calls.get(), 1);
            assert_eq!(store.data(), pair(1, 0));
            assert_eq!(store.prev_data(), Some(pair(0, 0)));
        });
    }

    #[test]
    fn update_before_sees_old_data_on_store() {
        Runtime::scope(|| {
            let store = Store::new("pair", pair(0, 0), StoreOptions::new());
            let seen = Rc::new(RefCell::new(None));
            let sink = Rc::clone(&seen);
            store.on(EventKind::UpdateBefore, move |event| {
                *sink.borrow_mut() = Some((event.data.clone(), event.prev_data.clone(), event.store.data()));
            });
            store.set(pair(2, 0));
            assert_eq!(
                seen.borrow().clone(),
                Some((pair(2, 0), Some(pair(0, 0)), pair(0, 0)))
            );
        });
    }

    #[test]
    fn comparator_overrides() {
        Runtime::scope(|| {
            let store = Store::new("pair", pair(0, 0), StoreOptions::new().compare(ComparePolicy::Not));
            assert!(store.set(pair(0, 0)));

            let store = Store::new(
                "pair",
                pair(0, 0),
                StoreOptions::new().compare_with(|x: &Pair, y: &Pair| x.a == y.a),
            );
            assert!(!store.set(pair(0, 9)));
            assert!(store.using(SetOptions::new().compare(ComparePolicy::Not)).set(pair(0, 9)));
        });
    }

    #[test]
    fn partial_updates() {
        Runtime::scope(|| {
            let store = Store::new("pair", pair(0, 0), StoreOptions::new());
            assert!(store.set_part(serde_json::json!({ "b": 5 })));
            assert_eq!(store.data(), pair(0, 5));
            assert!(store.set_item("a", 3));
            assert_eq!(store.data(), pair(3, 5));
            assert!(store.set_field(|p| &mut p.b, 6));
            assert!(store.update(|p| p.a += 1));
            assert_eq!(store.data(), pair(4, 6));

            assert!(!store.set_item("a", "not a number"));
            assert!(matches!(
                store.try_set_part(7),
                Err(StoreError::NotAnObject { what: "partial update", .. })
            ));
        });
    }

    #[test]
    fn reset_merges_over_default() {
        Runtime::scope(|| {
            let store = Store::new("pair", pair(0, 0), StoreOptions::new());
            store.set(pair(4, 4));
            assert!(store.reset_with(serde_json::json!({ "a": 1 })));
            assert_eq!(store.data(), pair(1, 0));
            assert!(store.reset());
            assert!(!store.reset());
            assert_eq!(store.default_data(), pair(0, 0));
        });
    }

    #[test]
    fn set_item_part_on_nested_data() {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct Form {
            user: Pair,
        }
        Runtime::scope(|| {
            let store = Store::new("form", Form { user: pair(0, 0) }, StoreOptions::new());
            assert!(store.set_item_part("user", serde_json::json!({ "b": 2 })));
            assert_eq!(store.data().user, pair(0, 2));
            assert!(!store.set_item_part("user", serde_json::json!({ "b": 2 })));
            assert!(store.try_set_item_part("user", 5).is_err());
        });
    }

    #[test]
    fn unbound_mutation_schedules_nothing() {
        Runtime::scope(|| {
            let runtime = Runtime::current();
            let store = Store::new("pair", pair(0, 0), StoreOptions::new());
            store.set(pair(1, 1));
            assert!(!store.has_pending_update());
            assert_eq!(runtime.pending_tasks(), 0);
            assert_eq!(store.update_count(), 0);
        });
    }

    #[test]
    fn next_frame_coalesces() {
        Runtime::scope(|| {
            let runtime = Runtime::current();
            let store = Store::new("pair", pair(0, 0), StoreOptions::new());
            mount(&runtime, &store);
            assert!(store.is_bound());

            store.set(pair(1, 0));
            store.set(pair(2, 0));
            store.set(pair(3, 0));
            assert_eq!(runtime.pending_tasks(), 1);
            assert_eq!(runtime.text(), "0");

            runtime.frame();
            assert_eq!(store.update_count(), 1);
            assert_eq!(runtime.text(), "3");
            assert_eq!(store.rendered_data(), Some(pair(3, 0)));
        });
    }

    #[test]
    fn now_and_delay_timing() {
        Runtime::scope(|| {
            let runtime = Runtime::current();
            let store = Store::new("pair", pair(0, 0), StoreOptions::new().update_timing(UpdateTiming::Now));
            mount(&runtime, &store);
            store.set(pair(5, 0));
            assert_eq!(runtime.text(), "5");
            assert_eq!(store.update_count(), 1);

            store.using(SetOptions::new().timing(Duration::from_millis(20))).set(pair(6, 0));
            runtime.advance(Duration::from_millis(19));
            assert_eq!(runtime.text(), "5");
            runtime.advance(Duration::from_millis(1));
            assert_eq!(runtime.text(), "6");
        });
    }

    #[test]
    fn unmount_restores_defaults() {
        Runtime::scope(|| {
            let runtime = Runtime::current();
            let store = Store::new("pair", pair(0, 0), StoreOptions::new().id("p"));
            mount(&runtime, &store);
            assert!(runtime.registry().contains_instance("p"));

            store.set(pair(8, 8));
            runtime.frame();
            runtime.unmount();

            assert!(!store.is_bound());
            assert_eq!(store.update_count(), 0);
            assert_eq!(store.data(), pair(0, 0));
            assert_eq!(store.prev_data(), None);
            assert_eq!(store.rendered_data(), None);
            assert!(!runtime.registry().contains_instance("p"));
        });
    }

    #[test]
    fn non_finite_floats_are_real_changes() {
        Runtime::scope(|| {
            let store = Store::new("float", f64::NAN, StoreOptions::new());
            assert!(!store.set(f64::NAN));
            assert!(store.set(f64::INFINITY));
            assert_eq!(store.data(), f64::INFINITY);
            assert!(store.set(f64::NEG_INFINITY));
            assert!(store.set(-0.0));
            assert!(store.set(0.0));

            let maybe = Store::new(
                "maybe",
                Some(f64::NAN),
                StoreOptions::new().compare(ComparePolicy::Is),
            );
            assert!(maybe.set(None));
            assert_eq!(maybe.data(), None);
        });
    }

    #[test]
    fn bind_starts_from_default_data() {
        Runtime::scope(|| {
            let runtime = Runtime::current();
            let store = Store::new("pair", pair(0, 0), StoreOptions::new());
            assert!(store.set(pair(5, 0)));

            mount(&runtime, &store);
            assert_eq!(runtime.text(), "0");
            assert_eq!(store.data(), pair(0, 0));
            assert_eq!(store.rendered_data(), Some(pair(0, 0)));
        });
    }

    #[test]
    fn zero_delay_flushes_synchronously() {
        Runtime::scope(|| {
            let runtime = Runtime::current();
            let store = Store::new(
                "pair",
                pair(0, 0),
                StoreOptions::new().update_timing(UpdateTiming::Delay(Duration::ZERO)),
            );
            mount(&runtime, &store);
            store.set(pair(2, 0));
            assert_eq!(runtime.pending_tasks(), 0);
            assert_eq!(runtime.text(), "2");
        });
    }

    #[test]
    fn generated_ids_are_unique() {
        Runtime::scope(|| {
            let a = Store::new("pair", pair(0, 0), StoreOptions::new());
            let b = Store::new("pair", pair(0, 0), StoreOptions::new());
            assert_eq!(a.id().len(), STORE_ID_LENGTH);
            assert_ne!(a.id(), b.id());
            assert_eq!(a.store_channel().id(), b.store_channel().id());
        });
    }
}
