//! Scroll-triggered reveals
//!
//! A [`RevealController`] binds one element to one [`Variant`]. The element
//! starts on the variant's hidden keyframe; each visibility change starts a
//! transition toward the matching keyframe, beginning from whatever frame is
//! currently displayed so a reversal never jumps.
//!
//! ```text
//!            Visible                       Hidden (repeatable only)
//!   Hidden ----------> animating -> Visible ------> animating -> Hidden
//!                          ^                             |
//!                          +------ interrupted ----------+
//! ```
//!
//! Transition-start notifications are published from the frame loop, after
//! every visibility signal of the frame has been resolved.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use unveil_animation::{
    Emitter, FrameControl, Keyframe, SchedulerHandle, Subscription, Transition,
    TransitionPlayer,
};
use unveil_core::{DetachedHandleWarning, ElementHandle, Result};

use crate::variants::Variant;
use crate::viewport::{
    ObserveOptions, Observation, ObserverEvent, ViewportObserver, VisibilityState,
};

/// Per-reveal overrides; unset fields use the engine defaults
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RevealOptions {
    pub delay_ms: Option<f32>,
    /// Applies to timed variants only; spring variants keep their physics
    pub duration_ms: Option<f32>,
    pub threshold: Option<f32>,
    pub trigger_once: Option<bool>,
    pub margin: Option<f32>,
}

impl RevealOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(mut self, delay_ms: f32) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn duration(mut self, duration_ms: f32) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn trigger_once(mut self, once: bool) -> Self {
        self.trigger_once = Some(once);
        self
    }

    pub fn margin(mut self, margin: f32) -> Self {
        self.margin = Some(margin);
        self
    }

    /// Apply timing overrides to a variant's transition
    pub fn apply(&self, variant: &Variant) -> Result<Variant> {
        let mut transition = variant.transition();
        if let Some(delay) = self.delay_ms {
            transition = transition.with_delay(delay);
        }
        if let Some(duration) = self.duration_ms {
            if let Transition::Spring { .. } = transition {
                tracing::debug!(
                    variant = variant.name(),
                    duration,
                    "duration override ignored for spring variant"
                );
            }
            transition = transition.with_duration(duration);
        }
        transition.validate()?;
        Ok(variant.clone().with_transition(transition))
    }

    /// Observation settings after applying defaults
    pub fn observe_options(&self, defaults: ObserveOptions) -> ObserveOptions {
        ObserveOptions {
            threshold: self.threshold.unwrap_or(defaults.threshold),
            trigger_once: self.trigger_once.unwrap_or(defaults.trigger_once),
            margin: self.margin.unwrap_or(defaults.margin),
        }
    }
}

/// Published when a reveal starts a transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealTransition {
    pub element: ElementHandle,
    pub from: VisibilityState,
    pub to: VisibilityState,
}

struct RevealState {
    variant: Variant,
    visibility: VisibilityState,
    trigger_once: bool,
    current: Keyframe,
    player: Option<TransitionPlayer>,
    frame: Option<Subscription>,
    pending: SmallVec<[RevealTransition; 2]>,
    transitions_fired: u32,
    disposed: bool,
}

/// Visibility-driven keyframe animation for one element
///
/// Shared by observer-driven reveals and stagger children, which are driven
/// by the group's timers instead.
pub(crate) struct RevealCore {
    element: ElementHandle,
    scheduler: SchedulerHandle,
    state: RefCell<RevealState>,
    frames: Emitter<Keyframe>,
    transitions: Emitter<RevealTransition>,
    changes: Emitter<VisibilityState>,
}

impl RevealCore {
    pub(crate) fn new(
        element: ElementHandle,
        scheduler: SchedulerHandle,
        variant: Variant,
        trigger_once: bool,
    ) -> Rc<Self> {
        let current = variant.hidden().clone();
        Rc::new(Self {
            element,
            scheduler,
            state: RefCell::new(RevealState {
                variant,
                visibility: VisibilityState::Hidden,
                trigger_once,
                current,
                player: None,
                frame: None,
                pending: SmallVec::new(),
                transitions_fired: 0,
                disposed: false,
            }),
            frames: Emitter::new(),
            transitions: Emitter::new(),
            changes: Emitter::new(),
        })
    }

    /// Move toward `target`; returns false if nothing changed
    pub(crate) fn request(self: &Rc<Self>, target: VisibilityState) -> bool {
        {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return false;
            }
            if state.visibility == target {
                return self.resume(&mut state);
            }
            if state.trigger_once && state.visibility == VisibilityState::Visible {
                return false;
            }

            let from = state.visibility;
            state.visibility = target;
            let player = TransitionPlayer::interrupting(
                state.player.as_ref(),
                state.current.clone(),
                state.variant.keyframe(target).clone(),
                state.variant.transition(),
            );
            state.player = Some(player);
            state.transitions_fired += 1;
            state.pending.push(RevealTransition {
                element: self.element,
                from,
                to: target,
            });
            if !state.frame.as_ref().is_some_and(Subscription::is_active) {
                state.frame = Some(self.schedule_frames());
            }
            tracing::debug!(
                element = %self.element,
                variant = state.variant.name(),
                ?from,
                to = ?target,
                "reveal transition requested"
            );
        }
        self.changes.emit(&target);
        true
    }

    /// Finish a transition cut short by a detach, without a new notification
    fn resume(self: &Rc<Self>, state: &mut RevealState) -> bool {
        let target = state.variant.keyframe(state.visibility).clone();
        if state.player.is_some() || state.current == target {
            return false;
        }
        state.player = Some(TransitionPlayer::new(
            state.current.clone(),
            target,
            state.variant.transition().with_delay(0.0),
        ));
        state.frame = Some(self.schedule_frames());
        tracing::debug!(element = %self.element, "reveal resumed");
        true
    }

    fn schedule_frames(self: &Rc<Self>) -> Subscription {
        let weak: Weak<Self> = Rc::downgrade(self);
        let element = self.element;
        self.scheduler.request_frame(move |time| {
            let Some(core) = weak.upgrade() else {
                DetachedHandleWarning::emit("reveal", Some(element));
                return FrameControl::Stop;
            };
            core.advance(time.dt_ms)
        })
    }

    fn advance(&self, dt_ms: f32) -> FrameControl {
        let (started, keyframe, control) = {
            let mut state = self.state.borrow_mut();
            let started = std::mem::take(&mut state.pending);
            let Some(player) = state.player.as_mut() else {
                state.frame = None;
                return FrameControl::Stop;
            };
            let keyframe = player.advance(dt_ms).clone();
            let finished = player.is_finished();
            state.current = keyframe.clone();
            let control = if finished {
                state.player = None;
                state.frame = None;
                FrameControl::Stop
            } else {
                FrameControl::Continue
            };
            (started, keyframe, control)
        };

        for transition in &started {
            self.transitions.emit(transition);
        }
        self.frames.emit(&keyframe);
        control
    }

    /// The element is gone: drop in-flight work, keep the last frame
    pub(crate) fn detach(&self) {
        let (player, frame) = {
            let mut state = self.state.borrow_mut();
            state.pending.clear();
            (state.player.take(), state.frame.take())
        };
        if player.is_some() {
            tracing::debug!(element = %self.element, "reveal target detached mid-transition");
        }
        drop(frame);
        drop(player);
    }

    pub(crate) fn dispose(&self) {
        let (player, frame) = {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.pending.clear();
            (state.player.take(), state.frame.take())
        };
        drop(frame);
        drop(player);
        self.frames.clear();
        self.transitions.clear();
        self.changes.clear();
    }

    pub(crate) fn element(&self) -> ElementHandle {
        self.element
    }

    pub(crate) fn changes(&self) -> &Emitter<VisibilityState> {
        &self.changes
    }

    fn visibility(&self) -> VisibilityState {
        self.state.borrow().visibility
    }

    fn keyframe(&self) -> Keyframe {
        self.state.borrow().current.clone()
    }

    fn is_animating(&self) -> bool {
        self.state.borrow().player.is_some()
    }

    fn transitions_fired(&self) -> u32 {
        self.state.borrow().transitions_fired
    }

    fn is_disposed(&self) -> bool {
        self.state.borrow().disposed
    }

    fn variant_name(&self) -> String {
        self.state.borrow().variant.name().to_string()
    }
}

/// Handle to one element's reveal animation
///
/// Dropping the handle stops observing the element and cancels any running
/// transition.
pub struct RevealController {
    core: Rc<RevealCore>,
    observation: Option<Observation>,
}

impl RevealController {
    /// Reveal `element` whenever the observer reports it visible
    pub(crate) fn observe(
        observer: &ViewportObserver,
        scheduler: SchedulerHandle,
        element: ElementHandle,
        variant: Variant,
        options: ObserveOptions,
    ) -> Result<Self> {
        options.validate()?;
        let core = RevealCore::new(element, scheduler, variant, options.trigger_once);
        let weak = Rc::downgrade(&core);
        let observation = observer.observe(element, options, move |event| {
            let Some(core) = weak.upgrade() else {
                DetachedHandleWarning::emit("reveal observer", Some(element));
                return;
            };
            match event {
                ObserverEvent::Visibility(state) => {
                    core.request(state);
                }
                ObserverEvent::Detached => core.detach(),
                ObserverEvent::Scroll(_) => {}
            }
        })?;
        Ok(Self {
            core,
            observation: Some(observation),
        })
    }

    /// A reveal driven by its owner rather than the observer
    pub(crate) fn driven(core: Rc<RevealCore>) -> Self {
        Self {
            core,
            observation: None,
        }
    }

    pub(crate) fn core(&self) -> &Rc<RevealCore> {
        &self.core
    }

    pub fn element(&self) -> ElementHandle {
        self.core.element()
    }

    pub fn variant_name(&self) -> String {
        self.core.variant_name()
    }

    /// Visibility the reveal is showing or heading toward
    pub fn state(&self) -> VisibilityState {
        self.core.visibility()
    }

    /// Frame currently displayed
    pub fn keyframe(&self) -> Keyframe {
        self.core.keyframe()
    }

    pub fn is_animating(&self) -> bool {
        self.core.is_animating()
    }

    /// Transitions started since creation
    pub fn transitions_fired(&self) -> u32 {
        self.core.transitions_fired()
    }

    /// Every animated frame, in order
    pub fn frames(&self) -> &Emitter<Keyframe> {
        &self.core.frames
    }

    /// One notification per transition start
    pub fn transitions(&self) -> &Emitter<RevealTransition> {
        &self.core.transitions
    }

    /// Stop observing and cancel any running transition
    pub fn dispose(&self) {
        if let Some(observation) = &self.observation {
            observation.dispose();
        }
        self.core.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

impl Drop for RevealController {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for RevealController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevealController")
            .field("element", &self.element())
            .field("state", &self.state())
            .field("animating", &self.is_animating())
            .finish()
    }
}
