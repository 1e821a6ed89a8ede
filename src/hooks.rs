//! Hooks for reading stores and their data from inside components.
//!
//! Lookups go through the [`Registry`](crate::registry::Registry) of the
//! rendering runtime, keyed by store type.

use crate::runtime::Cx;
use crate::store::{Store, StoreData};

/// Data of the nearest enclosing provider of `store_type`, else the default
/// data of the first store created with that type.
///
/// The calling component re-renders whenever the provided data changes.
pub fn use_data<T: Clone + 'static>(cx: &mut Cx<'_>, store_type: &str) -> Option<T> {
    let channel = cx.registry().ensure_data_channel(store_type);
    cx.read_channel(&channel)
}

/// The nearest enclosing store of `store_type`.
///
/// Unlike [`use_data`], data changes do not re-render the caller.
pub fn use_store<T: StoreData>(cx: &mut Cx<'_>, store_type: &str) -> Option<Store<T>> {
    let channel = cx.registry().ensure_store_channel(store_type);
    cx.read_channel(&channel)
}

/// Create a store once for the lifetime of the calling component and bind it.
///
/// `create` only runs on the first render.
///
/// # Examples
///
/// ```
/// use provision::{use_creator, Element, Runtime, Store, StoreOptions};
///
/// Runtime::scope(|| {
///     let runtime = Runtime::current();
///     runtime.render(Element::component(|cx| {
///         let (count, _store) = use_creator(cx, || Store::new("count", 0u32, StoreOptions::new()));
///         Element::text(count.to_string())
///     }));
///     assert_eq!(runtime.text(), "0");
/// });
/// ```
pub fn use_creator<T, F>(cx: &mut Cx<'_>, create: F) -> (T, Store<T>)
where
    T: StoreData,
    F: FnOnce() -> Store<T>,
{
    let store = cx.use_ref(create);
    store.bind(cx)
}

/// Like [`use_creator`], passing `props` to `create` on the first render.
/// Later props are ignored.
pub fn use_creator_with<T, P, F>(cx: &mut Cx<'_>, create: F, props: P) -> (T, Store<T>)
where
    T: StoreData,
    F: FnOnce(P) -> Store<T>,
{
    use_creator(cx, move || create(props))
}
