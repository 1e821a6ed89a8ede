use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

pub(crate) type Task = Box<dyn FnOnce()>;

/// Handle to a scheduled frame callback or timer, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

/// Frame callbacks and timers on a virtual clock.
///
/// Nothing runs by itself: the owning runtime drives frames and time forward,
/// which keeps every timing policy deterministic under test.
#[derive(Default)]
pub(crate) struct Scheduler {
    now: Duration,
    next_id: u64,
    frames: VecDeque<(u64, Task)>,
    // keyed by (deadline, id) so equal deadlines fire in scheduling order
    timers: BTreeMap<(Duration, u64), Task>,
}

impl Scheduler {
    pub(crate) fn now(&self) -> Duration {
        self.now
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn request_frame(&mut self, task: Task) -> TaskHandle {
        let id = self.allocate();
        self.frames.push_back((id, task));
        TaskHandle(id)
    }

    pub(crate) fn set_timeout(&mut self, delay: Duration, task: Task) -> TaskHandle {
        let id = self.allocate();
        self.timers.insert((self.now + delay, id), task);
        TaskHandle(id)
    }

    pub(crate) fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.frames.len();
        self.frames.retain(|(id, _)| *id != handle.0);
        if self.frames.len() != before {
            return true;
        }
        let key = self.timers.keys().find(|(_, id)| *id == handle.0).copied();
        key.and_then(|key| self.timers.remove(&key)).is_some()
    }

    /// Id boundary for the frame about to run; later requests wait for the next one.
    pub(crate) fn frame_cutoff(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn pop_frame(&mut self, cutoff: u64) -> Option<Task> {
        match self.frames.front() {
            Some((id, _)) if *id <= cutoff => self.frames.pop_front().map(|(_, task)| task),
            _ => None,
        }
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to it.
    pub(crate) fn pop_due(&mut self, until: Duration) -> Option<Task> {
        let key = *self.timers.keys().next()?;
        if key.0 > until {
            return None;
        }
        self.now = self.now.max(key.0);
        self.timers.remove(&key)
    }

    pub(crate) fn advance_to(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }

    pub(crate) fn pending(&self) -> usize {
        self.frames.len() + self.timers.len()
    }
}
