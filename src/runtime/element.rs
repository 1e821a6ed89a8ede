use super::Cx;
use crate::registry::Channel;
use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Process-unique, non-zero token. Zero stands for "nothing provided".
pub(crate) fn next_token() -> u64 {
    NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
}

type RenderFn = dyn Fn(&mut Cx<'_>) -> Element;

/// A description of UI to render.
///
/// Elements are cheap to clone. A parent that hands back a clone of the same
/// element on re-render lets the child skip rendering.
#[derive(Clone, Default)]
pub enum Element {
    #[default]
    Empty,
    Text(Rc<str>),
    List(Rc<[Element]>),
    Component(Rc<ComponentElement>),
    Provide(Rc<ProvideElement>),
}

/// A component: a render closure plus its reconciliation identity.
pub struct ComponentElement {
    pub(crate) type_id: TypeId,
    pub(crate) tag: u64,
    pub(crate) key: Option<String>,
    pub(crate) render: Box<RenderFn>,
}

/// A value made available to every descendant through a channel.
pub struct ProvideElement {
    pub(crate) channel: Channel,
    pub(crate) value: Rc<dyn Any>,
    pub(crate) token: u64,
    pub(crate) child: Element,
}

impl Element {
    pub fn empty() -> Self {
        Element::Empty
    }

    pub fn text(text: impl Into<String>) -> Self {
        Element::Text(Rc::from(text.into()))
    }

    pub fn list(items: impl IntoIterator<Item = Element>) -> Self {
        Element::List(items.into_iter().collect())
    }

    /// A component rendered by `render`.
    ///
    /// Two component elements are the same component when they come from the
    /// same closure definition.
    pub fn component<F>(render: F) -> Self
    where
        F: Fn(&mut Cx<'_>) -> Element + 'static,
    {
        Self::build(render, 0, None)
    }

    /// A component with a key, matched by key inside lists.
    pub fn keyed<F>(key: impl Into<String>, render: F) -> Self
    where
        F: Fn(&mut Cx<'_>) -> Element + 'static,
    {
        Self::build(render, 0, Some(key.into()))
    }

    /// A component whose identity also includes `tag`, so closures built by
    /// the same factory for different owners are distinct components.
    pub(crate) fn tagged<F>(tag: u64, render: F) -> Self
    where
        F: Fn(&mut Cx<'_>) -> Element + 'static,
    {
        Self::build(render, tag, None)
    }

    fn build<F>(render: F, tag: u64, key: Option<String>) -> Self
    where
        F: Fn(&mut Cx<'_>) -> Element + 'static,
    {
        Element::Component(Rc::new(ComponentElement {
            type_id: TypeId::of::<F>(),
            tag,
            key,
            render: Box::new(render),
        }))
    }

    pub(crate) fn provide(channel: Channel, value: Rc<dyn Any>, token: u64, child: Element) -> Self {
        Element::Provide(Rc::new(ProvideElement {
            channel,
            value,
            token,
            child,
        }))
    }

    pub(crate) fn key(&self) -> Option<&str> {
        match self {
            Element::Component(c) => c.key.as_deref(),
            _ => None,
        }
    }

    /// Whether a node rendered from `self` can be updated in place with `other`.
    pub(crate) fn same_kind(&self, other: &Element) -> bool {
        match (self, other) {
            (Element::Empty, Element::Empty)
            | (Element::Text(_), Element::Text(_))
            | (Element::List(_), Element::List(_)) => true,
            (Element::Component(a), Element::Component(b)) => {
                a.type_id == b.type_id && a.tag == b.tag && a.key == b.key
            }
            (Element::Provide(a), Element::Provide(b)) => a.channel.id() == b.channel.id(),
            _ => false,
        }
    }
}

impl From<&str> for Element {
    fn from(text: &str) -> Self {
        Element::text(text)
    }
}

impl From<String> for Element {
    fn from(text: String) -> Self {
        Element::text(text)
    }
}

impl From<Vec<Element>> for Element {
    fn from(items: Vec<Element>) -> Self {
        Element::list(items)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Empty => f.write_str("Empty"),
            Element::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Element::List(items) => f.debug_list().entries(items.iter()).finish(),
            Element::Component(c) => f
                .debug_struct("Component")
                .field("key", &c.key)
                .finish_non_exhaustive(),
            Element::Provide(p) => f
                .debug_struct("Provide")
                .field("channel", &p.channel.name())
                .field("child", &p.child)
                .finish_non_exhaustive(),
        }
    }
}
