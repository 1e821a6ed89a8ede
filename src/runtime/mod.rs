//! Host render runtime.
//!
//! This module provides the primitives stores attach to: a component tree
//! with order-based hooks, channel propagation, and a virtual-clock scheduler
//! for frame and timer callbacks.

mod context;
mod cx;
mod element;
mod scheduler;

pub use context::Runtime;
pub(crate) use context::WeakRuntime;
pub use cx::{Cx, StateSlot};
pub use element::{ComponentElement, Element, ProvideElement};
pub(crate) use element::next_token;
pub use scheduler::TaskHandle;
