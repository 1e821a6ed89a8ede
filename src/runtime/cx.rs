use super::context::{NodeId, Teardown, WeakRuntime};
use super::element::next_token;
use super::Runtime;
use crate::registry::{Channel, ChannelId, Registry};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// The channel values visible at one point of the tree.
#[derive(Clone, Default)]
pub(crate) struct Scope(Option<Rc<Frame>>);

pub(crate) struct Frame {
    channel: ChannelId,
    value: Rc<dyn Any>,
    token: u64,
    parent: Scope,
}

impl Scope {
    pub(crate) fn with(&self, channel: ChannelId, value: Rc<dyn Any>, token: u64) -> Scope {
        Scope(Some(Rc::new(Frame {
            channel,
            value,
            token,
            parent: self.clone(),
        })))
    }

    fn lookup(&self, channel: ChannelId) -> Option<&Frame> {
        let mut current = self.0.as_deref();
        while let Some(frame) = current {
            if frame.channel == channel {
                return Some(frame);
            }
            current = frame.parent.0.as_deref();
        }
        None
    }

    /// Token of the nearest value for `channel`, or 0 if none is provided.
    pub(crate) fn token(&self, channel: ChannelId) -> u64 {
        self.lookup(channel).map_or(0, |frame| frame.token)
    }
}

/// Render context handed to a component.
///
/// Hooks are order-based: the Nth hook call of a render always refers to the
/// Nth slot of that component.
pub struct Cx<'a> {
    runtime: &'a Runtime,
    node: NodeId,
    scope: Scope,
    hooks: Vec<Box<dyn Any>>,
    index: usize,
    reads: Vec<(ChannelId, u64)>,
    teardowns: Vec<Teardown>,
}

pub(crate) struct RenderOutput {
    pub(crate) hooks: Vec<Box<dyn Any>>,
    pub(crate) reads: Vec<(ChannelId, u64)>,
    pub(crate) teardowns: Vec<Teardown>,
}

impl<'a> Cx<'a> {
    pub(crate) fn new(runtime: &'a Runtime, node: NodeId, scope: Scope, hooks: Vec<Box<dyn Any>>) -> Self {
        Self {
            runtime,
            node,
            scope,
            hooks,
            index: 0,
            reads: Vec::new(),
            teardowns: Vec::new(),
        }
    }

    pub(crate) fn finish(self) -> RenderOutput {
        RenderOutput {
            hooks: self.hooks,
            reads: self.reads,
            teardowns: self.teardowns,
        }
    }

    pub fn runtime(&self) -> &Runtime {
        self.runtime
    }

    pub fn registry(&self) -> &Registry {
        self.runtime.registry()
    }

    fn slot<S: 'static>(&mut self, init: impl FnOnce() -> S) -> &mut S {
        let index = self.index;
        self.index += 1;
        if index >= self.hooks.len() {
            self.hooks.push(Box::new(init()));
        }
        match self.hooks[index].downcast_mut::<S>() {
            Some(slot) => slot,
            None => panic!("hook {index} changed kind between renders"),
        }
    }

    /// A state slot, initialized on first render.
    pub fn use_state<T: 'static>(&mut self, init: impl FnOnce() -> T) -> StateSlot<T> {
        let node = self.node;
        let runtime = self.runtime.downgrade();
        self.slot(|| StateSlot::new(init(), node, runtime)).clone()
    }

    /// A value created once for the lifetime of this component.
    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Rc<T> {
        Rc::clone(self.slot(|| Rc::new(init())))
    }

    /// Run `setup` once after the first render; the closure it returns runs
    /// when the component is torn down.
    pub fn use_mount<F, D>(&mut self, setup: F)
    where
        F: FnOnce() -> D + 'static,
        D: FnOnce() + 'static,
    {
        let mounted = self.slot(|| false);
        if *mounted {
            return;
        }
        *mounted = true;

        let teardown: Teardown = Rc::new(RefCell::new(None));
        self.teardowns.push(Rc::clone(&teardown));
        self.runtime.queue_effect(self.node, move || {
            let cleanup = setup();
            *teardown.borrow_mut() = Some(Box::new(cleanup));
        });
    }

    /// Run `effect` after this render when `key` differs from the previous render's.
    pub fn use_effect_keyed<K, F>(&mut self, key: K, effect: F)
    where
        K: PartialEq + 'static,
        F: FnOnce() + 'static,
    {
        let last = self.slot(|| None::<K>);
        if last.as_ref() == Some(&key) {
            return;
        }
        *last = Some(key);
        self.runtime.queue_effect(self.node, effect);
    }

    /// Nearest ancestor value of `channel`, else the channel's fallback.
    pub fn read_channel<T: Clone + 'static>(&mut self, channel: &Channel) -> Option<T> {
        self.read_provided(channel).or_else(|| channel.fallback())
    }

    /// Nearest ancestor value of `channel`, ignoring the fallback.
    ///
    /// The read is recorded: the component re-renders when the provided value changes.
    pub fn read_provided<T: Clone + 'static>(&mut self, channel: &Channel) -> Option<T> {
        let Some(frame) = self.scope.lookup(channel.id()) else {
            self.reads.push((channel.id(), 0));
            return None;
        };
        self.reads.push((channel.id(), frame.token));
        let value = frame.value.downcast_ref::<T>().cloned();
        if value.is_none() {
            tracing::warn!(channel = channel.name(), "channel value has an unexpected type");
        }
        value
    }
}

/// The render-visible copy of a value, owned by one component.
///
/// Setting it marks the component for re-render on the next flush.
pub struct StateSlot<T> {
    inner: Rc<SlotInner<T>>,
}

struct SlotInner<T> {
    value: RefCell<T>,
    version: Cell<u64>,
    node: NodeId,
    runtime: WeakRuntime,
}

impl<T> StateSlot<T> {
    fn new(value: T, node: NodeId, runtime: WeakRuntime) -> Self {
        Self {
            inner: Rc::new(SlotInner {
                value: RefCell::new(value),
                version: Cell::new(next_token()),
                node,
                runtime,
            }),
        }
    }

    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.inner.version.set(next_token());
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.mark_dirty(self.inner.node);
        }
    }

    /// Changes on every `set`; unique across all slots.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }
}

impl<T: Clone> StateSlot<T> {
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T> Clone for StateSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StateSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSlot")
            .field("value", &self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}
