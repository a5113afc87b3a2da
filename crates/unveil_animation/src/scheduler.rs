//! Frame scheduler
//!
//! A single-threaded scheduler the host drives once per display refresh.
//! Controllers register work through a [`SchedulerHandle`]:
//! - per-frame callbacks (`request_frame`) that run every frame until they
//!   return [`FrameControl::Stop`] or are cancelled
//! - one-shot timeouts (`set_timeout`) that fire on the first frame at or
//!   after their due time
//!
//! Every registration returns a [`Subscription`]. Dropping or disposing it
//! cancels the callback; disposing twice is a no-op. Callbacks run with no
//! scheduler borrow held, so they may register or cancel work themselves.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a registered per-frame callback
    pub struct FrameCallbackId;
    /// Handle to a registered one-shot timeout
    pub struct TimeoutId;
}

/// Default cap on a single frame's delta, in milliseconds
pub const DEFAULT_MAX_FRAME_DT_MS: f32 = 100.0;

/// Clock information handed to callbacks
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTime {
    /// Scheduler clock after this frame's advance
    pub now_ms: f64,
    /// Clamped time since the previous frame
    pub dt_ms: f32,
    /// Frame counter, starting at 1 for the first frame
    pub frame: u64,
}

/// Returned by frame callbacks to keep or drop their registration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameControl {
    Continue,
    Stop,
}

type FrameCallback = Box<dyn FnMut(FrameTime) -> FrameControl>;
type TimeoutCallback = Box<dyn FnOnce(FrameTime)>;

struct FrameEntry {
    seq: u64,
    /// `None` while the callback is running
    callback: Option<FrameCallback>,
}

struct TimeoutEntry {
    due_ms: f64,
    seq: u64,
    callback: TimeoutCallback,
}

struct SchedulerInner {
    frames: SlotMap<FrameCallbackId, FrameEntry>,
    timeouts: SlotMap<TimeoutId, TimeoutEntry>,
    now_ms: f64,
    frame: u64,
    next_seq: u64,
    max_frame_dt_ms: f32,
}

impl SchedulerInner {
    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// The scheduler owned by the engine (or the host)
pub struct FrameScheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::with_max_frame_delta(DEFAULT_MAX_FRAME_DT_MS)
    }

    /// Frames longer than `max_frame_dt_ms` are clamped so a stalled tab does
    /// not fast-forward every animation to its end.
    pub fn with_max_frame_delta(max_frame_dt_ms: f32) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                frames: SlotMap::with_key(),
                timeouts: SlotMap::with_key(),
                now_ms: 0.0,
                frame: 0,
                next_seq: 0,
                max_frame_dt_ms: max_frame_dt_ms.max(0.0),
            })),
        }
    }

    /// Get a handle to this scheduler for passing to controllers
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn now_ms(&self) -> f64 {
        self.inner.borrow().now_ms
    }

    pub fn frame_count(&self) -> u64 {
        self.inner.borrow().frame
    }

    /// Advance the clock without running any callbacks
    ///
    /// Split from [`FrameScheduler::run_frame`] so the host can resolve
    /// visibility signals between the clock advance and the callbacks.
    pub fn begin_frame(&self, dt_ms: f32) -> FrameTime {
        let mut inner = self.inner.borrow_mut();
        let dt_ms = if dt_ms.is_finite() {
            dt_ms.clamp(0.0, inner.max_frame_dt_ms)
        } else {
            0.0
        };
        inner.now_ms += dt_ms as f64;
        inner.frame += 1;
        FrameTime {
            now_ms: inner.now_ms,
            dt_ms,
            frame: inner.frame,
        }
    }

    /// Fire due timeouts, then run every frame callback once
    ///
    /// Frame callbacks registered by a timeout run in this same frame. Any
    /// other work registered while this runs waits for the next frame.
    pub fn run_frame(&self, time: FrameTime) {
        self.run_timeouts(time);
        self.run_frame_callbacks(time);
    }

    /// Advance the clock and run callbacks
    ///
    /// Returns true if any work is still registered (needs another tick).
    pub fn tick(&self, dt_ms: f32) -> bool {
        let time = self.begin_frame(dt_ms);
        self.run_frame(time);
        self.has_pending_work()
    }

    fn run_timeouts(&self, time: FrameTime) {
        let mut due: Vec<(f64, u64, TimeoutId)> = {
            let inner = self.inner.borrow();
            inner
                .timeouts
                .iter()
                .filter(|(_, entry)| entry.due_ms <= time.now_ms)
                .map(|(id, entry)| (entry.due_ms, entry.seq, id))
                .collect()
        };
        due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        for (_, _, id) in due {
            // Removed before running: an earlier timeout may have cancelled it
            let entry = self.inner.borrow_mut().timeouts.remove(id);
            if let Some(entry) = entry {
                (entry.callback)(time);
            }
        }
    }

    fn run_frame_callbacks(&self, time: FrameTime) {
        let mut ids: Vec<(u64, FrameCallbackId)> = {
            let inner = self.inner.borrow();
            inner
                .frames
                .iter()
                .map(|(id, entry)| (entry.seq, id))
                .collect()
        };
        ids.sort_unstable_by_key(|(seq, _)| *seq);

        for (_, id) in ids {
            let callback = self
                .inner
                .borrow_mut()
                .frames
                .get_mut(id)
                .and_then(|entry| entry.callback.take());
            let Some(mut callback) = callback else {
                continue;
            };

            let control = callback(time);

            let mut inner = self.inner.borrow_mut();
            match control {
                FrameControl::Continue => {
                    // Entry is gone if the callback cancelled itself
                    if let Some(entry) = inner.frames.get_mut(id) {
                        entry.callback = Some(callback);
                    }
                }
                FrameControl::Stop => {
                    inner.frames.remove(id);
                }
            }
        }
    }

    pub fn frame_callback_count(&self) -> usize {
        self.inner.borrow().frames.len()
    }

    pub fn timeout_count(&self) -> usize {
        self.inner.borrow().timeouts.len()
    }

    pub fn has_pending_work(&self) -> bool {
        let inner = self.inner.borrow();
        !inner.frames.is_empty() || !inner.timeouts.is_empty()
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("FrameScheduler")
            .field("now_ms", &inner.now_ms)
            .field("frame", &inner.frame)
            .field("frame_callbacks", &inner.frames.len())
            .field("timeouts", &inner.timeouts.len())
            .finish()
    }
}

/// A weak handle to the scheduler
///
/// Controllers keep one of these. It won't keep the scheduler alive; once the
/// scheduler is dropped, registrations return inert subscriptions.
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Weak<RefCell<SchedulerInner>>,
}

impl SchedulerHandle {
    /// Run `callback` every frame until it returns `Stop` or is cancelled
    pub fn request_frame<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(FrameTime) -> FrameControl + 'static,
    {
        let Some(inner) = self.inner.upgrade() else {
            tracing::debug!("request_frame on a dropped scheduler");
            return Subscription::inert();
        };
        let mut guard = inner.borrow_mut();
        let seq = guard.seq();
        let id = guard.frames.insert(FrameEntry {
            seq,
            callback: Some(Box::new(callback)),
        });
        Subscription::new(self.clone(), SubscriptionKey::Frame(id))
    }

    /// Run `callback` once, on the first frame at least `delay_ms` from now
    pub fn set_timeout<F>(&self, delay_ms: f32, callback: F) -> Subscription
    where
        F: FnOnce(FrameTime) + 'static,
    {
        let Some(inner) = self.inner.upgrade() else {
            tracing::debug!("set_timeout on a dropped scheduler");
            return Subscription::inert();
        };
        let mut guard = inner.borrow_mut();
        let seq = guard.seq();
        let due_ms = guard.now_ms + delay_ms.max(0.0) as f64;
        let id = guard.timeouts.insert(TimeoutEntry {
            due_ms,
            seq,
            callback: Box::new(callback),
        });
        Subscription::new(self.clone(), SubscriptionKey::Timeout(id))
    }

    /// Current scheduler clock, if the scheduler is still alive
    pub fn now_ms(&self) -> Option<f64> {
        self.inner.upgrade().map(|inner| {
            let now_ms = inner.borrow().now_ms;
            now_ms
        })
    }

    /// Check if the scheduler is still alive
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    fn cancel(&self, key: SubscriptionKey) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        // Entries are dropped after the borrow ends: a callback may own
        // subscriptions whose drop re-enters the scheduler.
        let mut guard = inner.borrow_mut();
        let (frame, timeout) = match key {
            SubscriptionKey::Frame(id) => (guard.frames.remove(id), None),
            SubscriptionKey::Timeout(id) => (None, guard.timeouts.remove(id)),
        };
        drop(guard);
        frame.is_some() || timeout.is_some()
    }

    fn contains(&self, key: SubscriptionKey) -> bool {
        self.inner.upgrade().is_some_and(|inner| {
            let guard = inner.borrow();
            match key {
                SubscriptionKey::Frame(id) => guard.frames.contains_key(id),
                SubscriptionKey::Timeout(id) => guard.timeouts.contains_key(id),
            }
        })
    }
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SubscriptionKey {
    Frame(FrameCallbackId),
    Timeout(TimeoutId),
}

/// Owner of one scheduled callback
///
/// Cancels the callback when dropped.
pub struct Subscription {
    handle: Option<SchedulerHandle>,
    key: Cell<Option<SubscriptionKey>>,
}

impl Subscription {
    fn new(handle: SchedulerHandle, key: SubscriptionKey) -> Self {
        Self {
            handle: Some(handle),
            key: Cell::new(Some(key)),
        }
    }

    /// A subscription that owns nothing
    pub fn inert() -> Self {
        Self {
            handle: None,
            key: Cell::new(None),
        }
    }

    /// Whether the callback is still registered
    ///
    /// Timeouts stop being active once they fire; frame callbacks once they
    /// return `Stop`.
    pub fn is_active(&self) -> bool {
        match (&self.handle, self.key.get()) {
            (Some(handle), Some(key)) => handle.contains(key),
            _ => false,
        }
    }

    /// Cancel the callback. Calling this more than once is a no-op.
    pub fn dispose(&self) {
        if let (Some(handle), Some(key)) = (&self.handle, self.key.take()) {
            if handle.cancel(key) {
                tracing::trace!(?key, "subscription cancelled");
            }
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.key.get().is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_callback_runs_until_stop() {
        let scheduler = FrameScheduler::new();
        let runs = Rc::new(Cell::new(0));

        let counter = Rc::clone(&runs);
        let sub = scheduler.handle().request_frame(move |_| {
            counter.set(counter.get() + 1);
            if counter.get() == 3 {
                FrameControl::Stop
            } else {
                FrameControl::Continue
            }
        });

        for _ in 0..5 {
            scheduler.tick(16.0);
        }
        assert_eq!(runs.get(), 3);
        assert!(!sub.is_active());
        assert_eq!(scheduler.frame_callback_count(), 0);
    }

    #[test]
    fn test_dropping_subscription_cancels() {
        let scheduler = FrameScheduler::new();
        let runs = Rc::new(Cell::new(0));

        let counter = Rc::clone(&runs);
        let sub = scheduler.handle().request_frame(move |_| {
            counter.set(counter.get() + 1);
            FrameControl::Continue
        });
        scheduler.tick(16.0);
        drop(sub);
        scheduler.tick(16.0);

        assert_eq!(runs.get(), 1);
        assert!(!scheduler.has_pending_work());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let scheduler = FrameScheduler::new();
        let sub = scheduler.handle().request_frame(|_| FrameControl::Continue);
        assert!(sub.is_active());

        sub.dispose();
        sub.dispose();
        assert!(sub.is_disposed());
        assert_eq!(scheduler.frame_callback_count(), 0);
    }

    #[test]
    fn test_timeouts_fire_in_due_order() {
        let scheduler = FrameScheduler::new();
        let handle = scheduler.handle();
        let order = Rc::new(RefCell::new(Vec::new()));

        let subs: Vec<_> = [(50.0, 'b'), (10.0, 'a'), (50.0, 'c'), (200.0, 'd')]
            .into_iter()
            .map(|(delay, tag)| {
                let order = Rc::clone(&order);
                handle.set_timeout(delay, move |_| order.borrow_mut().push(tag))
            })
            .collect();

        scheduler.tick(16.0);
        assert_eq!(*order.borrow(), vec!['a']);
        for _ in 0..3 {
            scheduler.tick(16.0);
        }
        assert_eq!(*order.borrow(), vec!['a', 'b', 'c']);
        assert!(subs[3].is_active());
        assert!(!subs[0].is_active());
    }

    #[test]
    fn test_cancelled_timeout_never_fires() {
        let scheduler = FrameScheduler::new();
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let sub = scheduler
            .handle()
            .set_timeout(10.0, move |_| flag.set(true));
        sub.dispose();
        scheduler.tick(50.0);
        assert!(!fired.get());
    }

    #[test]
    fn test_callback_can_cancel_itself() {
        let scheduler = FrameScheduler::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let own = Rc::clone(&slot);
        let sub = scheduler.handle().request_frame(move |_| {
            if let Some(sub) = own.borrow().as_ref() {
                sub.dispose();
            }
            FrameControl::Continue
        });
        *slot.borrow_mut() = Some(sub);

        scheduler.tick(16.0);
        assert_eq!(scheduler.frame_callback_count(), 0);
    }

    #[test]
    fn test_callback_can_schedule_more_work() {
        let scheduler = FrameScheduler::new();
        let handle = scheduler.handle();
        let spawned: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));

        let inner_handle = handle.clone();
        let store = Rc::clone(&spawned);
        let _sub = handle.request_frame(move |_| {
            store
                .borrow_mut()
                .push(inner_handle.request_frame(|_| FrameControl::Stop));
            FrameControl::Stop
        });

        scheduler.tick(16.0);
        // Registered during the frame, runs on the next one
        assert_eq!(scheduler.frame_callback_count(), 1);
        scheduler.tick(16.0);
        assert_eq!(scheduler.frame_callback_count(), 0);
    }

    #[test]
    fn test_frame_delta_is_clamped() {
        let scheduler = FrameScheduler::with_max_frame_delta(50.0);
        let time = scheduler.begin_frame(5_000.0);
        assert_eq!(time.dt_ms, 50.0);
        assert_eq!(time.frame, 1);
        assert_eq!(scheduler.now_ms(), 50.0);

        let time = scheduler.begin_frame(f32::NAN);
        assert_eq!(time.dt_ms, 0.0);
    }

    #[test]
    fn test_handle_weak_reference() {
        let handle = {
            let scheduler = FrameScheduler::new();
            scheduler.handle()
        };

        assert!(!handle.is_alive());
        let sub = handle.request_frame(|_| FrameControl::Continue);
        assert!(!sub.is_active());
        // Dropping an inert subscription is harmless
        drop(sub);
    }
}
