use super::events::{Listener, StoreEvent};
use crate::compare::{Compare, ComparePolicy};
use crate::error::{Result, StoreError};
use crate::util::merge;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

/// When an accepted mutation reaches the render-visible state.
///
/// Deserializes from `"nextFrame"`, `"now"`, or a number of milliseconds,
/// where `0` means `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "TimingRepr", into = "TimingRepr")]
pub enum UpdateTiming {
    /// On the next painted frame.
    #[default]
    NextFrame,
    /// Synchronously, inside the mutating call.
    Now,
    /// After a timer delay.
    Delay(Duration),
}

impl UpdateTiming {
    pub fn from_millis(ms: u64) -> Self {
        Duration::from_millis(ms).into()
    }
}

impl From<Duration> for UpdateTiming {
    fn from(delay: Duration) -> Self {
        if delay.is_zero() {
            UpdateTiming::Now
        } else {
            UpdateTiming::Delay(delay)
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TimingRepr {
    Millis(u64),
    Name(String),
}

impl TryFrom<TimingRepr> for UpdateTiming {
    type Error = StoreError;

    fn try_from(repr: TimingRepr) -> Result<Self> {
        match repr {
            TimingRepr::Millis(ms) => Ok(UpdateTiming::from_millis(ms)),
            TimingRepr::Name(name) => match name.as_str() {
                "nextFrame" => Ok(UpdateTiming::NextFrame),
                "now" => Ok(UpdateTiming::Now),
                _ => Err(StoreError::InvalidTiming(name)),
            },
        }
    }
}

impl From<UpdateTiming> for TimingRepr {
    fn from(timing: UpdateTiming) -> Self {
        match timing {
            UpdateTiming::NextFrame => TimingRepr::Name("nextFrame".into()),
            UpdateTiming::Now => TimingRepr::Name("now".into()),
            UpdateTiming::Delay(delay) => {
                TimingRepr::Millis(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
            }
        }
    }
}

/// The serializable part of [`StoreOptions`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub id: Option<String>,
    pub debug: bool,
    pub compare: ComparePolicy,
    pub update_timing: UpdateTiming,
}

impl StoreConfig {
    /// Read a config, filling null or missing fields from the defaults.
    pub fn from_value(value: Value) -> Result<Self> {
        let defaults = serde_json::to_value(Self::default())?;
        Ok(serde_json::from_value(merge(value, &defaults))?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }
}

/// Construction options for a [`Store`](super::Store).
pub struct StoreOptions<T> {
    pub(crate) id: Option<String>,
    pub(crate) debug: bool,
    pub(crate) compare: Compare<T>,
    pub(crate) update_timing: UpdateTiming,
    pub(crate) on_created: Option<Listener<T>>,
    pub(crate) on_rendered: Option<Listener<T>>,
    pub(crate) on_update_before: Option<Listener<T>>,
    pub(crate) on_updated: Option<Listener<T>>,
    pub(crate) on_destroy_before: Option<Listener<T>>,
}

impl<T> Default for StoreOptions<T> {
    fn default() -> Self {
        Self {
            id: None,
            debug: false,
            compare: Compare::default(),
            update_timing: UpdateTiming::default(),
            on_created: None,
            on_rendered: None,
            on_update_before: None,
            on_updated: None,
            on_destroy_before: None,
        }
    }
}

impl<T> StoreOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: StoreConfig) -> Self {
        Self {
            id: config.id,
            debug: config.debug,
            compare: config.compare.into(),
            update_timing: config.update_timing,
            ..Self::default()
        }
    }

    /// Use `id` instead of a generated one.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Log every emitted event at debug level.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn compare(mut self, compare: impl Into<Compare<T>>) -> Self {
        self.compare = compare.into();
        self
    }

    pub fn compare_with(mut self, compare: impl Fn(&T, &T) -> bool + 'static) -> Self {
        self.compare = Compare::Custom(Rc::new(compare));
        self
    }

    pub fn update_timing(mut self, timing: impl Into<UpdateTiming>) -> Self {
        self.update_timing = timing.into();
        self
    }

    /// Called once, on the first render pass.
    pub fn on_created(mut self, f: impl Fn(&StoreEvent<T>) + 'static) -> Self {
        self.on_created = Some(Rc::new(f));
        self
    }

    pub fn on_rendered(mut self, f: impl Fn(&StoreEvent<T>) + 'static) -> Self {
        self.on_rendered = Some(Rc::new(f));
        self
    }

    pub fn on_update_before(mut self, f: impl Fn(&StoreEvent<T>) + 'static) -> Self {
        self.on_update_before = Some(Rc::new(f));
        self
    }

    pub fn on_updated(mut self, f: impl Fn(&StoreEvent<T>) + 'static) -> Self {
        self.on_updated = Some(Rc::new(f));
        self
    }

    /// Called once, before teardown.
    pub fn on_destroy_before(mut self, f: impl Fn(&StoreEvent<T>) + 'static) -> Self {
        self.on_destroy_before = Some(Rc::new(f));
        self
    }
}

impl<T> fmt::Debug for StoreOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("id", &self.id)
            .field("debug", &self.debug)
            .field("compare", &self.compare)
            .field("update_timing", &self.update_timing)
            .finish_non_exhaustive()
    }
}

/// Per-call overrides for a mutation.
pub struct SetOptions<T> {
    pub(crate) compare: Option<Compare<T>>,
    pub(crate) timing: Option<UpdateTiming>,
}

impl<T> Default for SetOptions<T> {
    fn default() -> Self {
        Self {
            compare: None,
            timing: None,
        }
    }
}

impl<T> SetOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compare(mut self, compare: impl Into<Compare<T>>) -> Self {
        self.compare = Some(compare.into());
        self
    }

    pub fn timing(mut self, timing: impl Into<UpdateTiming>) -> Self {
        self.timing = Some(timing.into());
        self
    }
}

impl<T> Clone for SetOptions<T> {
    fn clone(&self) -> Self {
        Self {
            compare: self.compare.clone(),
            timing: self.timing,
        }
    }
}
