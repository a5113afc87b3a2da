//! Viewport observation
//!
//! The [`ViewportObserver`] measures registered elements against the viewport
//! once per frame and reports changes to each element's listener:
//!
//! - **visibility** observations emit deduplicated `Visible` / `Hidden`
//!   signals against a threshold; one-shot observations latch on `Visible`
//! - **scroll** observations emit the element's scroll progress through the
//!   viewport (`0.0` entering at the bottom, `1.0` leaving at the top)
//!
//! An element the host can no longer measure is reported as `Detached` once
//! per disappearance. If it becomes measurable again its current reading is
//! reported afresh (a latched observation repeats its `Visible`).
//!
//! Every signal for a frame is computed before any listener runs, so a
//! listener always sees the settled visibility of the whole frame.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use slotmap::{new_key_type, SlotMap};
use unveil_core::{ConfigurationError, ElementHandle, ElementMeasure, Rect, Result};

new_key_type! {
    /// Handle to one registered observation
    pub struct ObservationId;
}

/// Ratio slack for float noise in the intersection arithmetic
const RATIO_EPSILON: f32 = 4.0 * f32::EPSILON;

/// Extra slack once a threshold is capped at the largest reachable ratio,
/// which is itself derived from rounded edges
const CAPPED_RATIO_EPSILON: f32 = 1e-4;

/// Whether an element is sufficiently inside the viewport
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VisibilityState {
    #[default]
    Hidden,
    Visible,
}

/// How an element is considered visible
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObserveOptions {
    /// Fraction of the element's area that must be inside the viewport
    pub threshold: f32,
    /// Latch permanently on the first `Visible`
    pub trigger_once: bool,
    /// Grow (or, when negative, shrink) the viewport by this many pixels
    pub margin: f32,
}

impl ObserveOptions {
    pub fn new(threshold: f32, trigger_once: bool) -> Self {
        Self {
            threshold,
            trigger_once,
            margin: 0.0,
        }
    }

    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigurationError::InvalidThreshold(self.threshold));
        }
        if !self.margin.is_finite() {
            return Err(ConfigurationError::InvalidConfig(format!(
                "viewport margin must be finite (got {})",
                self.margin
            )));
        }
        Ok(())
    }
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self::new(0.1, true)
    }
}

/// Hold an effect back until an element first becomes visible
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTrigger {
    pub element: ElementHandle,
    pub options: ObserveOptions,
}

impl ViewTrigger {
    pub fn new(element: ElementHandle) -> Self {
        Self {
            element,
            options: ObserveOptions::default(),
        }
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.options.threshold = threshold;
        self
    }

    /// Observe the trigger element once, calling `fire` on first visibility
    /// and `detached` if the element disappears first
    pub(crate) fn arm<F, D>(
        &self,
        observer: &ViewportObserver,
        fire: F,
        detached: D,
    ) -> Result<Observation>
    where
        F: Fn() + 'static,
        D: Fn() + 'static,
    {
        let options = ObserveOptions {
            trigger_once: true,
            ..self.options
        };
        observer.observe(self.element, options, move |event| match event {
            ObserverEvent::Visibility(VisibilityState::Visible) => fire(),
            ObserverEvent::Detached => detached(),
            _ => {}
        })
    }
}

/// Scroll progress of an element through the viewport
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollSample {
    pub progress: f32,
}

/// What an observation reports to its listener
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ObserverEvent {
    Visibility(VisibilityState),
    Scroll(ScrollSample),
    Detached,
}

/// Decide visibility of `bounds` inside `viewport`
///
/// Threshold `0.0` means any overlapping area counts. Thresholds an element
/// can never reach (it is larger than the viewport) are capped at the
/// largest ratio it can reach.
pub fn visibility_for(bounds: &Rect, viewport: &Rect, options: &ObserveOptions) -> VisibilityState {
    let root = viewport.outset(options.margin);
    let ratio = bounds.intersection_ratio(&root);
    if ratio <= 0.0 {
        return VisibilityState::Hidden;
    }
    let reachable = bounds.max_intersection_ratio(&root);
    let (threshold, slack) = if reachable < options.threshold {
        (reachable, CAPPED_RATIO_EPSILON)
    } else {
        (options.threshold, RATIO_EPSILON)
    };
    if ratio + slack >= threshold {
        VisibilityState::Visible
    } else {
        VisibilityState::Hidden
    }
}

/// Scroll progress: `0.0` when the element's top meets the viewport bottom,
/// `1.0` when its bottom meets the viewport top, clamped in between.
pub fn scroll_progress(bounds: &Rect, viewport: &Rect) -> f32 {
    let travel = viewport.height() + bounds.height();
    if travel <= f32::EPSILON {
        return 0.0;
    }
    ((viewport.bottom() - bounds.top()) / travel).clamp(0.0, 1.0)
}

type Listener = Rc<dyn Fn(ObserverEvent)>;

#[derive(Clone, Copy, Debug)]
enum Mode {
    Visibility {
        options: ObserveOptions,
        state: Option<VisibilityState>,
        latched: bool,
    },
    Scroll {
        last: Option<f32>,
    },
}

struct ObservedElement {
    element: ElementHandle,
    mode: Mode,
    detached: bool,
    listener: Listener,
}

impl ObservedElement {
    /// Measure and return the event to deliver, if any
    fn evaluate(&mut self, viewport: &Rect, measure: &dyn ElementMeasure) -> Option<ObserverEvent> {
        let Some(bounds) = measure.bounds(self.element) else {
            if self.detached {
                return None;
            }
            self.detached = true;
            return Some(ObserverEvent::Detached);
        };
        if self.detached {
            tracing::debug!(element = %self.element, "observed element measurable again");
            self.detached = false;
            // Report the current reading even if it matches the one before detaching
            match &mut self.mode {
                Mode::Visibility { latched: true, .. } => {
                    return Some(ObserverEvent::Visibility(VisibilityState::Visible));
                }
                Mode::Visibility { state, .. } => *state = None,
                Mode::Scroll { last } => *last = None,
            }
        }
        // Latched observations only watch for detachment
        if let Mode::Visibility { latched: true, .. } = self.mode {
            return None;
        }

        match &mut self.mode {
            Mode::Visibility {
                options,
                state,
                latched,
            } => {
                let next = visibility_for(&bounds, viewport, options);
                if *state == Some(next) {
                    return None;
                }
                *state = Some(next);
                if options.trigger_once && next == VisibilityState::Visible {
                    *latched = true;
                }
                Some(ObserverEvent::Visibility(next))
            }
            Mode::Scroll { last } => {
                let progress = scroll_progress(&bounds, viewport);
                if *last == Some(progress) {
                    return None;
                }
                *last = Some(progress);
                Some(ObserverEvent::Scroll(ScrollSample { progress }))
            }
        }
    }
}

#[derive(Default)]
struct ObserverInner {
    observations: SlotMap<ObservationId, ObservedElement>,
}

/// Tracks elements against the viewport
///
/// Cloning is cheap and yields another handle to the same observer.
#[derive(Clone, Default)]
pub struct ViewportObserver {
    inner: Rc<RefCell<ObserverInner>>,
}

impl ViewportObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe visibility of `element`
    ///
    /// The listener receives `Visibility` changes and `Detached`.
    pub fn observe<F>(
        &self,
        element: ElementHandle,
        options: ObserveOptions,
        listener: F,
    ) -> Result<Observation>
    where
        F: Fn(ObserverEvent) + 'static,
    {
        options.validate()?;
        let mode = Mode::Visibility {
            options,
            state: None,
            latched: false,
        };
        Ok(self.insert(element, mode, Rc::new(listener)))
    }

    /// Follow the scroll progress of `element`
    ///
    /// The listener receives `Scroll` samples whenever progress changes, and
    /// `Detached`.
    pub fn track<F>(&self, element: ElementHandle, listener: F) -> Observation
    where
        F: Fn(ObserverEvent) + 'static,
    {
        self.insert(element, Mode::Scroll { last: None }, Rc::new(listener))
    }

    fn insert(&self, element: ElementHandle, mode: Mode, listener: Listener) -> Observation {
        let id = self.inner.borrow_mut().observations.insert(ObservedElement {
            element,
            mode,
            detached: false,
            listener,
        });
        tracing::trace!(%element, ?id, "observing element");
        Observation {
            observer: Rc::downgrade(&self.inner),
            id: Cell::new(Some(id)),
            element,
        }
    }

    /// Measure every observation and deliver the resulting events
    ///
    /// All events are computed first and delivered afterwards. Returns the
    /// number of events delivered.
    pub fn resolve(&self, viewport: Rect, measure: &dyn ElementMeasure) -> usize {
        let events: Vec<(ObservationId, Listener, ObserverEvent)> = {
            let mut inner = self.inner.borrow_mut();
            inner
                .observations
                .iter_mut()
                .filter_map(|(id, observed)| {
                    observed
                        .evaluate(&viewport, measure)
                        .map(|event| (id, Rc::clone(&observed.listener), event))
                })
                .collect()
        };

        let mut delivered = 0;
        for (id, listener, event) in events {
            // An earlier listener may have disposed this observation
            if !self.inner.borrow().observations.contains_key(id) {
                continue;
            }
            listener(event);
            delivered += 1;
        }
        delivered
    }

    /// Last visibility reported for an observation
    pub fn state(&self, id: ObservationId) -> Option<VisibilityState> {
        match self.inner.borrow().observations.get(id)?.mode {
            Mode::Visibility { state, .. } => state,
            Mode::Scroll { .. } => None,
        }
    }

    pub fn is_observing(&self, element: ElementHandle) -> bool {
        self.inner
            .borrow()
            .observations
            .values()
            .any(|observed| observed.element == element)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().observations.is_empty()
    }
}

impl fmt::Debug for ViewportObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewportObserver")
            .field("observations", &self.len())
            .finish()
    }
}

/// Owner of one observation; unobserves on drop
pub struct Observation {
    observer: Weak<RefCell<ObserverInner>>,
    id: Cell<Option<ObservationId>>,
    element: ElementHandle,
}

impl Observation {
    pub fn id(&self) -> Option<ObservationId> {
        self.id.get()
    }

    pub fn element(&self) -> ElementHandle {
        self.element
    }

    /// Stop observing. Calling this more than once is a no-op.
    pub fn dispose(&self) {
        let Some(id) = self.id.take() else {
            return;
        };
        let Some(inner) = self.observer.upgrade() else {
            return;
        };
        // Dropped after the borrow ends
        let removed = inner.borrow_mut().observations.remove(id);
        if removed.is_some() {
            tracing::trace!(element = %self.element, ?id, "unobserved element");
        }
        drop(removed);
    }

    pub fn is_disposed(&self) -> bool {
        self.id.get().is_none()
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("element", &self.element)
            .field("id", &self.id.get())
            .finish()
    }
}
