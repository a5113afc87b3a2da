//! Animated numeric counters
//!
//! A [`CounterRun`] eases a number from a start to a target over a fixed
//! duration. The [`NumericInterpolator`] drives runs from the frame loop and
//! publishes each value through a [`ValueStream`], optionally waiting until
//! an element scrolls into view before it starts counting.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use unveil_animation::{Easing, Emitter, FrameControl, Interpolate, SchedulerHandle, Subscription};
use unveil_core::{ConfigurationError, DetachedHandleWarning, Result};

use crate::viewport::{Observation, ViewTrigger, ViewportObserver};

/// One interpolation from `start` to `target`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CounterRun {
    start: f64,
    target: f64,
    duration_ms: f32,
    easing: Easing,
    elapsed_ms: f32,
}

impl CounterRun {
    pub fn new(start: f64, target: f64, duration_ms: f32, easing: Easing) -> Result<Self> {
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            return Err(ConfigurationError::InvalidDuration(format!(
                "counter duration must be finite and non-negative (got {duration_ms})"
            )));
        }
        if !start.is_finite() || !target.is_finite() {
            return Err(ConfigurationError::InvalidConfig(format!(
                "counter endpoints must be finite (got {start} and {target})"
            )));
        }
        if !easing.is_monotonic() {
            tracing::warn!(
                ?easing,
                "counter easing overshoots; displayed values may pass the target"
            );
        }
        Ok(Self {
            start,
            target,
            duration_ms,
            easing,
            elapsed_ms: 0.0,
        })
    }

    pub fn advance(&mut self, dt_ms: f32) -> f64 {
        if dt_ms > 0.0 && !self.is_finished() {
            self.elapsed_ms = (self.elapsed_ms + dt_ms).min(self.duration_ms);
        }
        self.value()
    }

    /// Current value; exactly `target` once the duration has elapsed
    pub fn value(&self) -> f64 {
        if self.is_finished() {
            return self.target;
        }
        self.start
            .lerp(&self.target, self.easing.apply(self.progress()))
    }

    /// Linear time progress in `[0, 1]`
    pub fn progress(&self) -> f32 {
        if self.duration_ms <= 0.0 {
            1.0
        } else {
            (self.elapsed_ms / self.duration_ms).clamp(0.0, 1.0)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_ms >= self.duration_ms
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn duration_ms(&self) -> f32 {
        self.duration_ms
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    /// A fresh run from this run's current value toward `target`
    pub fn retarget(&self, target: f64) -> Result<Self> {
        Self::new(self.value(), target, self.duration_ms, self.easing)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CounterOptions {
    pub prefix: String,
    pub suffix: String,
    /// Digits after the decimal point in the display string
    pub decimals: u8,
    /// Thousands separator for the integer part
    pub separator: Option<char>,
    /// Overrides the engine's default counter easing
    pub easing: Option<Easing>,
    /// Start counting only once this element is visible
    pub trigger: Option<ViewTrigger>,
}

impl CounterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn separator(mut self, separator: char) -> Self {
        self.separator = Some(separator);
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = Some(easing);
        self
    }

    pub fn trigger(mut self, trigger: ViewTrigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Render a value with this formatting
    ///
    /// Rounds half away from zero at `decimals` places; a value that rounds to
    /// zero never shows a minus sign.
    pub fn format(&self, value: f64) -> String {
        let scale = 10f64.powi(i32::from(self.decimals));
        let mut rounded = (value * scale).round() / scale;
        if rounded == 0.0 {
            rounded = 0.0;
        }
        let digits = format!("{:.*}", self.decimals as usize, rounded);
        let digits = match self.separator {
            Some(separator) => group_thousands(&digits, separator),
            None => digits,
        };
        format!("{}{}{}", self.prefix, digits, self.suffix)
    }
}

fn group_thousands(digits: &str, separator: char) -> String {
    let (sign, unsigned) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };
    let (int_part, frac_part) = match unsigned.find('.') {
        Some(dot) => unsigned.split_at(dot),
        None => (unsigned, ""),
    };

    let mut grouped = String::with_capacity(digits.len() + int_part.len() / 3);
    grouped.push_str(sign);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(separator);
        }
        grouped.push(ch);
    }
    grouped.push_str(frac_part);
    grouped
}

/// One published counter value
#[derive(Clone, Debug, PartialEq)]
pub struct CounterFrame {
    pub value: f64,
    pub display: String,
    pub finished: bool,
}

struct CounterState {
    run: CounterRun,
    format: CounterOptions,
    armed: bool,
    frame: Option<Subscription>,
}

struct CounterShared {
    scheduler: SchedulerHandle,
    state: RefCell<CounterState>,
    values: Emitter<CounterFrame>,
    completions: Emitter<f64>,
}

impl CounterShared {
    /// Start counting if not already
    fn arm(self: &Rc<Self>) {
        let mut state = self.state.borrow_mut();
        state.armed = true;
        if state.run.is_finished() && state.run.duration_ms() > 0.0 {
            return;
        }
        if !state.frame.as_ref().is_some_and(Subscription::is_active) {
            state.frame = Some(self.schedule_frames());
        }
    }

    fn schedule_frames(self: &Rc<Self>) -> Subscription {
        let weak: Weak<Self> = Rc::downgrade(self);
        self.scheduler.request_frame(move |time| match weak.upgrade() {
            Some(shared) => shared.advance(time.dt_ms),
            None => {
                DetachedHandleWarning::emit("counter", None);
                FrameControl::Stop
            }
        })
    }

    fn advance(&self, dt_ms: f32) -> FrameControl {
        let frame = {
            let mut state = self.state.borrow_mut();
            let value = state.run.advance(dt_ms);
            let finished = state.run.is_finished();
            if finished {
                state.frame = None;
            }
            CounterFrame {
                value,
                display: state.format.format(value),
                finished,
            }
        };

        self.values.emit(&frame);
        if frame.finished {
            tracing::trace!(value = frame.value, "counter finished");
            self.completions.emit(&frame.value);
            FrameControl::Stop
        } else {
            FrameControl::Continue
        }
    }

    fn cancel(&self) {
        let frame = self.state.borrow_mut().frame.take();
        drop(frame);
    }
}

/// Starts counters against one observer and scheduler
#[derive(Clone, Debug)]
pub struct NumericInterpolator {
    observer: ViewportObserver,
    scheduler: SchedulerHandle,
    default_easing: Easing,
}

impl NumericInterpolator {
    pub fn new(
        observer: ViewportObserver,
        scheduler: SchedulerHandle,
        default_easing: Easing,
    ) -> Self {
        Self {
            observer,
            scheduler,
            default_easing,
        }
    }

    /// Count from `start` to `target` immediately
    pub fn run(
        &self,
        start: f64,
        target: f64,
        duration_ms: f32,
        easing: Easing,
    ) -> Result<ValueStream> {
        let options = CounterOptions::new().easing(easing);
        self.run_with(start, target, duration_ms, options)
    }

    pub fn run_with(
        &self,
        start: f64,
        target: f64,
        duration_ms: f32,
        options: CounterOptions,
    ) -> Result<ValueStream> {
        let easing = options.easing.unwrap_or(self.default_easing);
        let run = CounterRun::new(start, target, duration_ms, easing)?;
        let trigger = options.trigger;

        let shared = Rc::new(CounterShared {
            scheduler: self.scheduler.clone(),
            state: RefCell::new(CounterState {
                run,
                format: options,
                armed: false,
                frame: None,
            }),
            values: Emitter::new(),
            completions: Emitter::new(),
        });

        let observation = match trigger {
            Some(trigger) => {
                let element = trigger.element;
                let on_visible = Rc::downgrade(&shared);
                let on_detached = Weak::clone(&on_visible);
                Some(trigger.arm(
                    &self.observer,
                    move || match on_visible.upgrade() {
                        Some(shared) => shared.arm(),
                        None => DetachedHandleWarning::emit("counter trigger", Some(element)),
                    },
                    move || {
                        if let Some(shared) = on_detached.upgrade() {
                            shared.cancel();
                        }
                    },
                )?)
            }
            None => {
                shared.arm();
                None
            }
        };

        tracing::debug!(start, target, duration_ms, "counter created");
        Ok(ValueStream {
            shared,
            observation,
        })
    }
}

/// Handle to one running counter
pub struct ValueStream {
    shared: Rc<CounterShared>,
    observation: Option<Observation>,
}

impl ValueStream {
    /// Current interpolated value
    pub fn value(&self) -> f64 {
        self.shared.state.borrow().run.value()
    }

    /// Current value with prefix, suffix and rounding applied
    pub fn display(&self) -> String {
        let state = self.shared.state.borrow();
        state.format.format(state.run.value())
    }

    pub fn run(&self) -> CounterRun {
        self.shared.state.borrow().run
    }

    pub fn is_started(&self) -> bool {
        self.shared.state.borrow().armed
    }

    pub fn is_finished(&self) -> bool {
        self.shared.state.borrow().run.is_finished()
    }

    /// Every published value
    pub fn values(&self) -> &Emitter<CounterFrame> {
        &self.shared.values
    }

    /// Fires once per run, with the final value
    pub fn completions(&self) -> &Emitter<f64> {
        &self.shared.completions
    }

    /// Cancel the current run and count from the current value to `target`
    pub fn retarget(&self, target: f64) -> Result<()> {
        let armed = {
            let mut state = self.shared.state.borrow_mut();
            state.run = state.run.retarget(target)?;
            state.armed
        };
        if armed {
            self.shared.arm();
        }
        Ok(())
    }

    pub fn dispose(&self) {
        if let Some(observation) = &self.observation {
            observation.dispose();
        }
        self.shared.cancel();
        self.shared.values.clear();
        self.shared.completions.clear();
    }
}

impl Drop for ValueStream {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ValueStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueStream")
            .field("run", &self.run())
            .field("started", &self.is_started())
            .finish()
    }
}
