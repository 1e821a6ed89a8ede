use super::Store;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Lifecycle events a store emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// First render pass after the store was bound.
    Created,
    /// A mutation was accepted; emitted before the data changes.
    UpdateBefore,
    /// A render pass reflecting one or more accepted mutations.
    Updated,
    /// After every render pass, following `Created` or `Updated`.
    Rendered,
    /// The bound component is being torn down.
    DestroyBefore,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Created,
        EventKind::UpdateBefore,
        EventKind::Updated,
        EventKind::Rendered,
        EventKind::DestroyBefore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::UpdateBefore => "beforeUpdate",
            EventKind::Updated => "updated",
            EventKind::Rendered => "rendered",
            EventKind::DestroyBefore => "beforeDestroy",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload passed to listeners.
pub struct StoreEvent<T> {
    pub kind: EventKind,
    pub data: T,
    /// Set for `UpdateBefore` and `Updated`.
    pub prev_data: Option<T>,
    pub store: Store<T>,
}

pub type Listener<T> = Rc<dyn Fn(&StoreEvent<T>)>;

/// Returned by `on`/`once`, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry<T> {
    id: ListenerId,
    once: bool,
    listener: Listener<T>,
}

/// Listener lists keyed by event kind.
pub(crate) struct Emitter<T> {
    listeners: RefCell<HashMap<EventKind, Vec<Entry<T>>>>,
    next_id: Cell<u64>,
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
        }
    }
}

impl<T> Emitter<T> {
    pub(crate) fn add(&self, kind: EventKind, listener: Listener<T>, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(Entry { id, once, listener });
        id
    }

    pub(crate) fn remove(&self, kind: EventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(entries) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    pub(crate) fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    pub(crate) fn count(&self, kind: EventKind) -> usize {
        self.listeners.borrow().get(&kind).map_or(0, Vec::len)
    }

    /// Call the listeners for `event.kind`; true if there were any.
    ///
    /// Listeners may subscribe, unsubscribe or emit again while being called.
    pub(crate) fn emit(&self, event: &StoreEvent<T>) -> bool {
        let batch: Vec<Listener<T>> = {
            let mut listeners = self.listeners.borrow_mut();
            let Some(entries) = listeners.get_mut(&event.kind) else {
                return false;
            };
            let batch = entries.iter().map(|entry| Rc::clone(&entry.listener)).collect();
            entries.retain(|entry| !entry.once);
            batch
        };
        for listener in &batch {
            listener(event);
        }
        !batch.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names() {
        let names: Vec<_> = EventKind::ALL.iter().map(|kind| kind.as_str()).collect();
        assert_eq!(
            names,
            ["created", "beforeUpdate", "updated", "rendered", "beforeDestroy"]
        );
        assert_eq!(EventKind::UpdateBefore.to_string(), "beforeUpdate");
    }
}
