use super::cx::{Cx, Scope};
use super::element::Element;
use super::scheduler::{Scheduler, Task, TaskHandle};
use crate::registry::{ChannelId, Registry};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Upper bound on render/effect passes in one flush.
const MAX_RENDER_PASSES: usize = 64;

pub(crate) type Teardown = Rc<RefCell<Option<Box<dyn FnOnce()>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(u64);

struct Node {
    element: Element,
    depth: usize,
    scope: Scope,
    children: Vec<NodeId>,
    hooks: Vec<Box<dyn Any>>,
    reads: Vec<(ChannelId, u64)>,
    teardowns: Vec<Teardown>,
    dirty: bool,
}

#[derive(Default)]
struct Tree {
    nodes: HashMap<NodeId, Node>,
    root: Option<NodeId>,
    next_id: u64,
}

impl Tree {
    fn insert(&mut self, element: Element, depth: usize, scope: Scope) -> NodeId {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.nodes.insert(
            id,
            Node {
                element,
                depth,
                scope,
                children: Vec::new(),
                hooks: Vec::new(),
                reads: Vec::new(),
                teardowns: Vec::new(),
                dirty: true,
            },
        );
        id
    }
}

/// Clears the flushing flag on exit, including when a render or effect panics.
struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Inner runtime state that can be shared.
pub(crate) struct RuntimeInner {
    registry: Registry,
    scheduler: RefCell<Scheduler>,
    tree: RefCell<Tree>,
    dirty: RefCell<BTreeSet<NodeId>>,
    effects: RefCell<Vec<(NodeId, Task)>>,
    flushing: Cell<bool>,
}

/// Single-threaded render runtime: component tree, hooks, channels and a
/// virtual-clock scheduler, plus the store [`Registry`].
///
/// Supports both a per-thread global runtime (default) and scoped runtimes for
/// isolation.
///
/// # Examples
///
/// ```
/// use provision::runtime::{Element, Runtime};
///
/// Runtime::scope(|| {
///     let runtime = Runtime::current();
///     runtime.render(Element::component(|cx| {
///         let clicks = cx.use_state(|| 0);
///         Element::text(format!("clicks: {}", clicks.get()))
///     }));
///     assert_eq!(runtime.text(), "clicks: 0");
/// });
/// // Runtime and all its state is dropped here
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

/// Non-owning runtime handle held by stores and state slots.
#[derive(Clone, Default)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }
}

// Thread-local stack for scoped runtimes
thread_local! {
    static RUNTIME_STACK: RefCell<Vec<Runtime>> = const { RefCell::new(Vec::new()) };
    static GLOBAL: Runtime = Runtime::new();
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Create a new isolated runtime with its own registry.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                registry: Registry::new(),
                scheduler: RefCell::new(Scheduler::default()),
                tree: RefCell::new(Tree::default()),
                dirty: RefCell::new(BTreeSet::new()),
                effects: RefCell::new(Vec::new()),
                flushing: Cell::new(false),
            }),
        }
    }

    /// Run a function with a fresh isolated runtime.
    ///
    /// Useful for testing: every store created inside shares one registry
    /// that is dropped when the function returns.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        Self::with_runtime(Self::new(), f)
    }

    /// The per-thread runtime used when no scoped runtime is active.
    pub fn global() -> Self {
        GLOBAL.with(Runtime::clone)
    }

    /// The runtime on top of the scope stack, or the global one.
    pub fn current() -> Self {
        RUNTIME_STACK
            .with(|stack| stack.borrow().last().cloned())
            .unwrap_or_else(Self::global)
    }

    /// Run a function with a specific runtime as the current context.
    pub fn with_runtime<F, R>(runtime: Runtime, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().push(runtime);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Rc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ---------------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------------

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.inner.scheduler.borrow().now()
    }

    /// Run `task` on the next [`frame`](Self::frame).
    pub fn request_frame(&self, task: impl FnOnce() + 'static) -> TaskHandle {
        self.inner.scheduler.borrow_mut().request_frame(Box::new(task))
    }

    /// Run `task` once the clock has advanced by `delay`.
    pub fn set_timeout(&self, delay: Duration, task: impl FnOnce() + 'static) -> TaskHandle {
        self.inner
            .scheduler
            .borrow_mut()
            .set_timeout(delay, Box::new(task))
    }

    /// Cancel a frame callback or timer; false if it already ran.
    pub fn cancel(&self, handle: TaskHandle) -> bool {
        self.inner.scheduler.borrow_mut().cancel(handle)
    }

    /// Number of frame callbacks and timers still waiting.
    pub fn pending_tasks(&self) -> usize {
        self.inner.scheduler.borrow().pending()
    }

    /// Paint a frame: run the frame callbacks requested so far, then flush.
    pub fn frame(&self) {
        let cutoff = self.inner.scheduler.borrow().frame_cutoff();
        loop {
            let task = self.inner.scheduler.borrow_mut().pop_frame(cutoff);
            let Some(task) = task else { break };
            task();
        }
        self.flush();
    }

    /// Move the clock forward, firing due timers in deadline order.
    pub fn advance(&self, by: Duration) {
        let until = self.now() + by;
        loop {
            let task = self.inner.scheduler.borrow_mut().pop_due(until);
            let Some(task) = task else { break };
            task();
            self.flush();
        }
        self.inner.scheduler.borrow_mut().advance_to(until);
    }

    // ---------------------------------------------------------------------
    // Rendering
    // ---------------------------------------------------------------------

    /// Render `root` as the tree root, updating the previous root in place
    /// when it is the same kind of element, then flush.
    pub fn render(&self, root: impl Into<Element>) {
        let old = self.inner.tree.borrow().root;
        let id = self.reconcile(old, root.into(), 0, Scope::default());
        self.inner.tree.borrow_mut().root = Some(id);
        self.flush();
    }

    /// Tear the whole tree down.
    pub fn unmount(&self) {
        let root = self.inner.tree.borrow_mut().root.take();
        if let Some(root) = root {
            self.remove(root);
        }
        self.flush();
    }

    /// Re-render dirty components and run the effects they queue, until the
    /// tree settles.
    pub fn flush(&self) {
        if self.inner.flushing.replace(true) {
            return;
        }
        let _guard = FlushGuard(&self.inner.flushing);
        for _ in 0..MAX_RENDER_PASSES {
            let dirty = std::mem::take(&mut *self.inner.dirty.borrow_mut());
            let effects = std::mem::take(&mut *self.inner.effects.borrow_mut());
            if dirty.is_empty() && effects.is_empty() {
                return;
            }
            self.run_effects(effects);

            let mut order: Vec<(usize, NodeId)> = {
                let tree = self.inner.tree.borrow();
                dirty
                    .into_iter()
                    .filter_map(|id| tree.nodes.get(&id).map(|node| (node.depth, id)))
                    .collect()
            };
            order.sort();
            for (_, id) in order {
                let still_dirty = self
                    .inner
                    .tree
                    .borrow()
                    .nodes
                    .get(&id)
                    .is_some_and(|node| node.dirty);
                if still_dirty {
                    self.render_component(id);
                }
            }
            let effects = std::mem::take(&mut *self.inner.effects.borrow_mut());
            self.run_effects(effects);
        }
        tracing::error!(
            passes = MAX_RENDER_PASSES,
            "render loop did not settle; remaining updates wait for the next flush"
        );
    }

    fn run_effects(&self, effects: Vec<(NodeId, Task)>) {
        for (node, effect) in effects {
            let alive = self.inner.tree.borrow().nodes.contains_key(&node);
            if alive {
                effect();
            }
        }
    }

    pub(crate) fn queue_effect(&self, node: NodeId, effect: impl FnOnce() + 'static) {
        self.inner.effects.borrow_mut().push((node, Box::new(effect)));
    }

    pub(crate) fn mark_dirty(&self, node: NodeId) {
        let mut tree = self.inner.tree.borrow_mut();
        if let Some(node_ref) = tree.nodes.get_mut(&node) {
            node_ref.dirty = true;
            self.inner.dirty.borrow_mut().insert(node);
        }
    }

    /// Update `old` with `element` if they match, else replace it.
    fn reconcile(&self, old: Option<NodeId>, element: Element, depth: usize, scope: Scope) -> NodeId {
        if let Some(id) = old {
            let matches = self
                .inner
                .tree
                .borrow()
                .nodes
                .get(&id)
                .is_some_and(|node| node.element.same_kind(&element));
            if matches {
                self.patch(id, element, scope);
                return id;
            }
            self.remove(id);
        }
        let id = self
            .inner
            .tree
            .borrow_mut()
            .insert(element.clone(), depth, scope.clone());
        self.patch(id, element, scope);
        id
    }

    fn patch(&self, id: NodeId, element: Element, scope: Scope) {
        let (previous, depth, children, dirty, stale) = {
            let mut tree = self.inner.tree.borrow_mut();
            let Some(node) = tree.nodes.get_mut(&id) else { return };
            let stale = node
                .reads
                .iter()
                .any(|(channel, token)| scope.token(*channel) != *token);
            node.scope = scope.clone();
            let previous = std::mem::replace(&mut node.element, element.clone());
            (previous, node.depth, node.children.clone(), node.dirty, stale)
        };

        match &element {
            Element::Component(component) => {
                let unchanged = matches!(&previous, Element::Component(p) if Rc::ptr_eq(p, component));
                if unchanged && !dirty && !stale {
                    // same element, nothing read changed: only descendants may need work
                    for child in children {
                        let child_element = self.element_of(child);
                        self.patch(child, child_element, scope.clone());
                    }
                } else {
                    self.render_component(id);
                }
            }
            Element::Provide(provide) => {
                let inner = scope.with(
                    provide.channel.id(),
                    Rc::clone(&provide.value),
                    provide.token,
                );
                let child = self.reconcile(children.first().copied(), provide.child.clone(), depth + 1, inner);
                self.set_children(id, vec![child]);
            }
            Element::List(items) => {
                let children = self.reconcile_list(children, items, depth + 1, &scope);
                self.set_children(id, children);
            }
            Element::Text(_) | Element::Empty => {}
        }
    }

    fn reconcile_list(&self, old: Vec<NodeId>, items: &[Element], depth: usize, scope: &Scope) -> Vec<NodeId> {
        let mut keyed = HashMap::new();
        let mut unkeyed = VecDeque::new();
        {
            let tree = self.inner.tree.borrow();
            for id in old {
                match tree.nodes.get(&id).and_then(|node| node.element.key()) {
                    Some(key) => {
                        keyed.insert(key.to_owned(), id);
                    }
                    None => unkeyed.push_back(id),
                }
            }
        }
        let children = items
            .iter()
            .map(|item| {
                let old = match item.key() {
                    Some(key) => keyed.remove(key),
                    None => unkeyed.pop_front(),
                };
                self.reconcile(old, item.clone(), depth, scope.clone())
            })
            .collect();
        for id in keyed.into_values().chain(unkeyed) {
            self.remove(id);
        }
        children
    }

    fn render_component(&self, id: NodeId) {
        let (element, scope, hooks, depth, old_child) = {
            let mut tree = self.inner.tree.borrow_mut();
            let Some(node) = tree.nodes.get_mut(&id) else { return };
            node.dirty = false;
            (
                node.element.clone(),
                node.scope.clone(),
                std::mem::take(&mut node.hooks),
                node.depth,
                node.children.first().copied(),
            )
        };
        let Element::Component(component) = element else { return };

        let mut cx = Cx::new(self, id, scope.clone(), hooks);
        let output = (component.render)(&mut cx);
        let rendered = cx.finish();
        {
            let mut tree = self.inner.tree.borrow_mut();
            let Some(node) = tree.nodes.get_mut(&id) else { return };
            node.hooks = rendered.hooks;
            node.reads = rendered.reads;
            node.teardowns.extend(rendered.teardowns);
        }

        let child = self.reconcile(old_child, output, depth + 1, scope);
        self.set_children(id, vec![child]);
    }

    fn element_of(&self, id: NodeId) -> Element {
        self.inner
            .tree
            .borrow()
            .nodes
            .get(&id)
            .map(|node| node.element.clone())
            .unwrap_or_default()
    }

    fn set_children(&self, id: NodeId, children: Vec<NodeId>) {
        if let Some(node) = self.inner.tree.borrow_mut().nodes.get_mut(&id) {
            node.children = children;
        }
    }

    /// Remove a subtree, running teardowns parent first.
    fn remove(&self, id: NodeId) {
        let mut teardowns = Vec::new();
        {
            let mut tree = self.inner.tree.borrow_mut();
            let mut dirty = self.inner.dirty.borrow_mut();
            let mut stack = vec![id];
            while let Some(id) = stack.pop() {
                let Some(node) = tree.nodes.remove(&id) else { continue };
                dirty.remove(&id);
                teardowns.extend(node.teardowns);
                stack.extend(node.children.into_iter().rev());
            }
        }
        for teardown in teardowns {
            let cleanup = teardown.borrow_mut().take();
            if let Some(cleanup) = cleanup {
                cleanup();
            }
        }
    }

    /// Concatenated text of the rendered tree, in document order.
    pub fn text(&self) -> String {
        let tree = self.inner.tree.borrow();
        let mut out = String::new();
        let mut stack: Vec<NodeId> = tree.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = tree.nodes.get(&id) else { continue };
            if let Element::Text(text) = &node.element {
                out.push_str(text);
            }
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Number of live nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.inner.tree.borrow().nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Channel;

    #[test]
    fn scope_isolates_runtimes() {
        let outer = Runtime::current();
        Runtime::scope(|| {
            let inner = Runtime::current();
            assert!(!inner.ptr_eq(&outer));
            Runtime::scope(|| assert!(!Runtime::current().ptr_eq(&inner)));
            assert!(Runtime::current().ptr_eq(&inner));
        });
        assert!(Runtime::current().ptr_eq(&outer));
    }

    #[test]
    fn state_updates_render_on_flush() {
        let runtime = Runtime::new();
        let slot = Rc::new(RefCell::new(None));
        let captured = Rc::clone(&slot);
        runtime.render(Element::component(move |cx| {
            let count = cx.use_state(|| 1);
            *captured.borrow_mut() = Some(count.clone());
            Element::text(count.get().to_string())
        }));
        assert_eq!(runtime.text(), "1");

        let count = slot.borrow().clone().expect("rendered");
        count.set(2);
        assert_eq!(runtime.text(), "1");
        runtime.flush();
        assert_eq!(runtime.text(), "2");
    }

    #[test]
    fn mount_and_teardown_run_once() {
        let runtime = Runtime::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let child = Element::component(move |cx| {
            let sink = Rc::clone(&sink);
            cx.use_mount(move || {
                sink.borrow_mut().push("mount");
                move || sink.borrow_mut().push("unmount")
            });
            Element::empty()
        });

        runtime.render(Element::list(vec![child.clone()]));
        runtime.render(Element::list(vec![child]));
        assert_eq!(*log.borrow(), vec!["mount"]);

        runtime.unmount();
        assert_eq!(*log.borrow(), vec!["mount", "unmount"]);
        assert_eq!(runtime.node_count(), 0);
    }

    #[test]
    fn keyed_effect_runs_when_key_changes() {
        let runtime = Runtime::new();
        let runs = Rc::new(Cell::new(0));
        let slot = Rc::new(RefCell::new(None));
        let (counter, captured) = (Rc::clone(&runs), Rc::clone(&slot));
        runtime.render(Element::component(move |cx| {
            let key = cx.use_state(|| 0u32);
            *captured.borrow_mut() = Some(key.clone());
            let counter = Rc::clone(&counter);
            cx.use_effect_keyed(key.get() / 2, move || counter.set(counter.get() + 1));
            Element::empty()
        }));
        assert_eq!(runs.get(), 1);

        let key = slot.borrow().clone().expect("rendered");
        key.set(1);
        runtime.flush();
        assert_eq!(runs.get(), 1);
        key.set(2);
        runtime.flush();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn channels_reach_descendants() {
        let runtime = Runtime::new();
        let channel = Channel::with_fallback("greeting", "fallback".to_string());
        let reader = {
            let channel = channel.clone();
            Element::component(move |cx| Element::text(cx.read_channel::<String>(&channel).unwrap_or_default()))
        };

        runtime.render(Element::list(vec![
            channel.provide("hello".to_string(), reader.clone()),
            Element::text("|"),
            reader,
        ]));
        assert_eq!(runtime.text(), "hello|fallback");
    }

    #[test]
    fn unchanged_children_skip_render() {
        let runtime = Runtime::new();
        let renders = Rc::new(Cell::new(0));
        let counter = Rc::clone(&renders);
        let child = Element::component(move |_| {
            counter.set(counter.get() + 1);
            Element::empty()
        });
        let slot = Rc::new(RefCell::new(None));
        let captured = Rc::clone(&slot);
        runtime.render(Element::component(move |cx| {
            let tick = cx.use_state(|| 0);
            *captured.borrow_mut() = Some(tick.clone());
            Element::list(vec![Element::text(tick.get().to_string()), child.clone()])
        }));
        assert_eq!(renders.get(), 1);

        let tick = slot.borrow().clone().expect("rendered");
        tick.set(1);
        runtime.flush();
        assert_eq!(runtime.text(), "1");
        assert_eq!(renders.get(), 1);
    }

    #[test]
    fn flush_recovers_after_a_panicking_effect() {
        let runtime = Runtime::new();
        let failing = Element::component(|cx| {
            cx.use_mount(|| -> fn() { panic!("mount failed") });
            Element::empty()
        });
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| runtime.render(failing)));
        assert!(result.is_err());

        let slot = Rc::new(RefCell::new(None));
        let captured = Rc::clone(&slot);
        runtime.render(Element::component(move |cx| {
            let count = cx.use_state(|| 0);
            *captured.borrow_mut() = Some(count.clone());
            Element::text(count.get().to_string())
        }));
        let count = slot.borrow().clone().expect("rendered");
        count.set(1);
        runtime.flush();
        assert_eq!(runtime.text(), "1");
    }

    #[test]
    fn frames_and_timers_drive_tasks() {
        let runtime = Runtime::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (Rc::clone(&log), Rc::clone(&log));
        runtime.request_frame(move || a.borrow_mut().push("frame"));
        runtime.set_timeout(Duration::from_millis(10), move || b.borrow_mut().push("timer"));
        assert_eq!(runtime.pending_tasks(), 2);

        runtime.advance(Duration::from_millis(9));
        assert!(log.borrow().is_empty());
        runtime.frame();
        runtime.advance(Duration::from_millis(1));
        assert_eq!(*log.borrow(), vec!["frame", "timer"]);
        assert_eq!(runtime.now(), Duration::from_millis(10));
    }
}
