//! Provider components that own their store.
//!
//! [`create_provider`] turns a store constructor into a reusable component:
//! each mounted instance builds its own store from its props on first render,
//! keeps it for its lifetime, and provides it to its children.

use crate::runtime::{next_token, Element};
use crate::store::{Store, StoreData};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Imperative access to the store of a mounted provider.
///
/// Empty until the provider mounts, and again after it unmounts.
pub struct StoreHandle<T> {
    inner: Rc<RefCell<Option<Store<T>>>>,
}

impl<T> StoreHandle<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Store<T>> {
        self.inner.borrow().clone()
    }

    pub fn is_set(&self) -> bool {
        self.inner.borrow().is_some()
    }

    fn replace(&self, store: Option<Store<T>>) {
        *self.inner.borrow_mut() = store;
    }
}

impl<T> Default for StoreHandle<T> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(None)),
        }
    }
}

impl<T> Clone for StoreHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for StoreHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("set", &self.inner.borrow().is_some())
            .finish()
    }
}

/// What a provider's render function receives.
pub struct RenderProps<P, T> {
    pub props: P,
    pub store: Store<T>,
    pub children: Element,
}

type CreateFn<P, T> = dyn Fn(&P) -> Store<T>;
type RenderFn<P, T> = dyn Fn(&RenderProps<P, T>) -> Element;

/// A component factory built by [`create_provider`] or
/// [`create_inherit_provider`].
pub struct Provider<P, T> {
    create: Rc<CreateFn<P, T>>,
    render: Option<Rc<RenderFn<P, T>>>,
    inherit: bool,
    tag: u64,
}

/// A provider whose store is built by `create` from the provider's props.
///
/// # Examples
///
/// ```
/// use provision::{create_provider, use_data, Element, Runtime, Store, StoreOptions};
///
/// Runtime::scope(|| {
///     let runtime = Runtime::current();
///     let counter = create_provider(|start: &i64| Store::new("counter", *start, StoreOptions::new()));
///     let reader = Element::component(|cx| {
///         Element::text(use_data::<i64>(cx, "counter").unwrap_or_default().to_string())
///     });
///     runtime.render(counter.element(5, reader));
///     assert_eq!(runtime.text(), "5");
/// });
/// ```
pub fn create_provider<P, T, F>(create: F) -> Provider<P, T>
where
    P: Clone + 'static,
    T: StoreData,
    F: Fn(&P) -> Store<T> + 'static,
{
    Provider::build(Rc::new(create), false)
}

/// Like [`create_provider`], but the store starts from the data of an
/// enclosing provider of the same type, when there is one.
pub fn create_inherit_provider<P, T, F>(create: F) -> Provider<P, T>
where
    P: Clone + 'static,
    T: StoreData,
    F: Fn(&P) -> Store<T> + 'static,
{
    Provider::build(Rc::new(create), true)
}

impl<P, T> Provider<P, T>
where
    P: Clone + 'static,
    T: StoreData,
{
    fn build(create: Rc<CreateFn<P, T>>, inherit: bool) -> Self {
        Self {
            create,
            render: None,
            inherit,
            tag: next_token(),
        }
    }

    /// Render the provider's content with `render` instead of passing the
    /// children straight through.
    pub fn render<R>(mut self, render: R) -> Self
    where
        R: Fn(&RenderProps<P, T>) -> Element + 'static,
    {
        self.render = Some(Rc::new(render));
        self
    }

    pub fn element(&self, props: P, children: impl Into<Element>) -> Element {
        self.element_with_handle(props, children, None)
    }

    /// Like [`element`](Self::element), exposing the store through `handle`
    /// while mounted.
    pub fn element_with_handle(
        &self,
        props: P,
        children: impl Into<Element>,
        handle: Option<StoreHandle<T>>,
    ) -> Element {
        let create = Rc::clone(&self.create);
        let render = self.render.clone();
        let inherit = self.inherit;
        let children = children.into();

        Element::tagged(self.tag, move |cx| {
            let store = cx.use_ref(|| create(&props));
            if let Some(handle) = &handle {
                let (store, handle) = ((*store).clone(), handle.clone());
                cx.use_mount(move || {
                    handle.replace(Some(store));
                    move || handle.replace(None)
                });
            }

            let content = match &render {
                Some(render) => render(&RenderProps {
                    props: props.clone(),
                    store: (*store).clone(),
                    children: children.clone(),
                }),
                None => children.clone(),
            };
            if inherit {
                store.inherit_provider(content)
            } else {
                store.provider(content)
            }
        })
    }
}

impl<P, T> Clone for Provider<P, T> {
    fn clone(&self) -> Self {
        Self {
            create: Rc::clone(&self.create),
            render: self.render.clone(),
            inherit: self.inherit,
            tag: self.tag,
        }
    }
}

impl<P, T> fmt::Debug for Provider<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("inherit", &self.inherit)
            .field("has_render", &self.render.is_some())
            .finish_non_exhaustive()
    }
}
