//! Scroll-linked parallax
//!
//! An [`OffsetStream`] follows one element's scroll progress through the
//! viewport and turns it into a smoothed translation:
//!
//! ```text
//! target = progress * speed_factor * distance
//! ```
//!
//! The target is chased by an overdamped spring every frame for as long
//! as the stream is attached, so the offset never jumps even when scrolling
//! does.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use unveil_animation::{
    Emitter, FrameControl, SchedulerHandle, Spring, SpringConfig, Subscription,
};
use unveil_core::{ConfigurationError, DetachedHandleWarning, ElementHandle, Result};

use crate::viewport::{Observation, ObserverEvent, ViewportObserver};

/// Axis the offset is applied on
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallaxAxis {
    #[default]
    Vertical,
    Horizontal,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParallaxOptions {
    /// Signed multiplier; negative values move against the scroll
    pub speed_factor: f32,
    /// Offset in pixels at full progress and unit speed
    pub distance: f32,
    pub axis: ParallaxAxis,
    pub spring: SpringConfig,
}

impl ParallaxOptions {
    pub fn new(speed_factor: f32) -> Self {
        Self {
            speed_factor,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.speed_factor.is_finite() || !self.distance.is_finite() {
            return Err(ConfigurationError::InvalidConfig(format!(
                "parallax speed factor and distance must be finite (got {} and {})",
                self.speed_factor, self.distance
            )));
        }
        if self.spring.stiffness <= 0.0 || self.spring.mass <= 0.0 || self.spring.damping < 0.0 {
            return Err(ConfigurationError::InvalidConfig(
                "parallax spring constants must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Raw, unsmoothed offset for a progress value
    pub fn target(&self, progress: f32) -> f32 {
        progress * self.speed_factor * self.distance
    }
}

impl Default for ParallaxOptions {
    fn default() -> Self {
        Self {
            speed_factor: 0.5,
            distance: 100.0,
            axis: ParallaxAxis::Vertical,
            spring: SpringConfig::parallax(),
        }
    }
}

/// Translation to apply to the element this frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ParallaxOffset {
    pub x: f32,
    pub y: f32,
}

impl ParallaxOffset {
    fn along(axis: ParallaxAxis, value: f32) -> Self {
        match axis {
            ParallaxAxis::Vertical => Self { x: 0.0, y: value },
            ParallaxAxis::Horizontal => Self { x: value, y: 0.0 },
        }
    }
}

struct ParallaxState {
    options: ParallaxOptions,
    progress: Option<f32>,
    spring: Spring,
    offset: ParallaxOffset,
    frame: Option<Subscription>,
    disposed: bool,
}

struct ParallaxShared {
    element: ElementHandle,
    scheduler: SchedulerHandle,
    state: RefCell<ParallaxState>,
    offsets: Emitter<ParallaxOffset>,
}

impl ParallaxShared {
    fn on_event(self: &Rc<Self>, event: ObserverEvent) {
        match event {
            ObserverEvent::Scroll(sample) => {
                let restart = {
                    let mut state = self.state.borrow_mut();
                    // First sample snaps so a page opened mid-scroll does not drift in
                    if state.progress.is_none() {
                        let target = state.options.target(sample.progress);
                        state.spring.snap_to(target);
                    }
                    state.progress = Some(sample.progress);
                    state.frame.is_none() && !state.disposed
                };
                // Measurable again after a detach
                if restart {
                    let frame = self.schedule_frames();
                    self.state.borrow_mut().frame = Some(frame);
                }
            }
            ObserverEvent::Detached => {
                let frame = self.state.borrow_mut().frame.take();
                if frame.is_some() {
                    tracing::debug!(element = %self.element, "parallax target detached");
                }
                drop(frame);
            }
            ObserverEvent::Visibility(_) => {}
        }
    }

    fn schedule_frames(self: &Rc<Self>) -> Subscription {
        let weak: Weak<ParallaxShared> = Rc::downgrade(self);
        let element = self.element;
        self.scheduler.request_frame(move |time| match weak.upgrade() {
            Some(shared) => {
                shared.advance(time.dt_ms);
                FrameControl::Continue
            }
            None => {
                DetachedHandleWarning::emit("parallax", Some(element));
                FrameControl::Stop
            }
        })
    }

    fn advance(&self, dt_ms: f32) {
        let offset = {
            let mut state = self.state.borrow_mut();
            let Some(progress) = state.progress else {
                return;
            };
            let target = state.options.target(progress);
            state.spring.set_target(target);
            state.spring.step(dt_ms / 1000.0);
            let offset = ParallaxOffset::along(state.options.axis, state.spring.value());
            state.offset = offset;
            offset
        };
        self.offsets.emit(&offset);
    }
}

/// Builds [`OffsetStream`]s against one observer and scheduler
#[derive(Clone, Debug)]
pub struct ParallaxEngine {
    observer: ViewportObserver,
    scheduler: SchedulerHandle,
    defaults: ParallaxOptions,
}

impl ParallaxEngine {
    pub fn new(
        observer: ViewportObserver,
        scheduler: SchedulerHandle,
        defaults: ParallaxOptions,
    ) -> Self {
        Self {
            observer,
            scheduler,
            defaults,
        }
    }

    /// Attach with the default distance, axis and spring
    ///
    /// A non-finite speed factor is treated as `0.0`.
    pub fn attach(&self, element: ElementHandle, speed_factor: f32) -> OffsetStream {
        let speed_factor = if speed_factor.is_finite() {
            speed_factor
        } else {
            tracing::warn!(%element, speed_factor, "non-finite parallax speed, using 0");
            0.0
        };
        self.start(
            element,
            ParallaxOptions {
                speed_factor,
                ..self.defaults
            },
        )
    }

    pub fn attach_with(
        &self,
        element: ElementHandle,
        options: ParallaxOptions,
    ) -> Result<OffsetStream> {
        options.validate()?;
        Ok(self.start(element, options))
    }

    fn start(&self, element: ElementHandle, options: ParallaxOptions) -> OffsetStream {
        let shared = Rc::new(ParallaxShared {
            element,
            scheduler: self.scheduler.clone(),
            state: RefCell::new(ParallaxState {
                options,
                progress: None,
                spring: Spring::new(options.spring, 0.0),
                offset: ParallaxOffset::default(),
                frame: None,
                disposed: false,
            }),
            offsets: Emitter::new(),
        });

        let weak: Weak<ParallaxShared> = Rc::downgrade(&shared);
        let observation = self.observer.track(element, move |event| match weak.upgrade() {
            Some(shared) => shared.on_event(event),
            None => DetachedHandleWarning::emit("parallax observer", Some(element)),
        });

        let frame = shared.schedule_frames();
        shared.state.borrow_mut().frame = Some(frame);

        tracing::debug!(%element, speed = options.speed_factor, "parallax attached");
        OffsetStream {
            shared,
            observation,
        }
    }
}

/// Handle to one element's parallax offset
///
/// The frame loop runs until the handle is disposed or dropped, pausing
/// while the element cannot be measured.
pub struct OffsetStream {
    shared: Rc<ParallaxShared>,
    observation: Observation,
}

impl OffsetStream {
    pub fn element(&self) -> ElementHandle {
        self.shared.element
    }

    /// Smoothed offset as of the last frame
    pub fn offset(&self) -> ParallaxOffset {
        self.shared.state.borrow().offset
    }

    /// Raw scroll progress as of the last measurement
    pub fn progress(&self) -> Option<f32> {
        self.shared.state.borrow().progress
    }

    /// Unsmoothed offset the spring is chasing
    pub fn target(&self) -> Option<f32> {
        let state = self.shared.state.borrow();
        let options = state.options;
        state.progress.map(|progress| options.target(progress))
    }

    pub fn options(&self) -> ParallaxOptions {
        self.shared.state.borrow().options
    }

    /// Offsets emitted once per frame
    pub fn offsets(&self) -> &Emitter<ParallaxOffset> {
        &self.shared.offsets
    }

    pub fn is_running(&self) -> bool {
        self.shared
            .state
            .borrow()
            .frame
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Stop tracking and cancel the frame loop
    pub fn dispose(&self) {
        self.observation.dispose();
        let frame = {
            let mut state = self.shared.state.borrow_mut();
            state.disposed = true;
            state.frame.take()
        };
        drop(frame);
        self.shared.offsets.clear();
    }
}

impl Drop for OffsetStream {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for OffsetStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OffsetStream")
            .field("element", &self.element())
            .field("offset", &self.offset())
            .finish()
    }
}
