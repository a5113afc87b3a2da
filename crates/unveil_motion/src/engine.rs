//! The engine facade
//!
//! [`MotionEngine`] owns the frame scheduler and viewport observer and hands
//! out controllers bound to them. The host calls [`MotionEngine::frame`] once
//! per display frame with the elapsed time, the viewport and a way to measure
//! elements. Each frame runs in three steps:
//!
//! 1. advance the clock
//! 2. resolve every visibility and scroll signal
//! 3. fire due timers, then run frame callbacks
//!
//! Controllers are plain handles; dropping one tears down its observation,
//! timers and frame callback.

use std::fmt;
use std::sync::Arc;

use unveil_animation::{Easing, FrameScheduler, FrameTime, Keyframe, Transition};
use unveil_core::{ElementHandle, ElementMeasure, Rect, Result};

use crate::config::EngineConfig;
use crate::counter::{CounterOptions, NumericInterpolator, ValueStream};
use crate::parallax::{OffsetStream, ParallaxEngine, ParallaxOptions};
use crate::reveal::{RevealController, RevealOptions};
use crate::stagger::{StaggerChild, StaggerCoordinator, StaggerOptions, StaggerPlan};
use crate::text::{PerWordStream, SequencedTextRevealer, TextRevealOptions};
use crate::variants::{Variant, VariantRegistry};
use crate::viewport::ViewportObserver;

/// What happened during one [`MotionEngine::frame`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    pub time: FrameTime,
    /// Observer events delivered this frame
    pub signals: usize,
    /// Whether anything still needs frames
    pub pending_work: bool,
}

pub struct MotionEngine {
    config: EngineConfig,
    registry: Arc<VariantRegistry>,
    scheduler: FrameScheduler,
    observer: ViewportObserver,
    parallax: ParallaxEngine,
    counters: NumericInterpolator,
    text: SequencedTextRevealer,
}

impl MotionEngine {
    /// Engine over the built-in variants
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_registry(config, VariantRegistry::standard())
    }

    pub fn with_registry(config: EngineConfig, registry: Arc<VariantRegistry>) -> Result<Self> {
        config.validate()?;
        if !config.reveal.strict_variants {
            registry.variant(&config.reveal.fallback_variant)?;
        }

        let scheduler = FrameScheduler::with_max_frame_delta(config.scheduler.max_frame_dt_ms);
        let observer = ViewportObserver::new();
        let parallax = ParallaxEngine::new(
            observer.clone(),
            scheduler.handle(),
            config.parallax_defaults(),
        );
        let counters =
            NumericInterpolator::new(observer.clone(), scheduler.handle(), config.counter.easing);
        let text = SequencedTextRevealer::new(
            observer.clone(),
            scheduler.handle(),
            config.text_defaults(),
        );

        tracing::debug!(variants = registry.len(), "motion engine created");
        Ok(Self {
            config,
            registry,
            scheduler,
            observer,
            parallax,
            counters,
            text,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &VariantRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn observer(&self) -> &ViewportObserver {
        &self.observer
    }

    /// Resolve a variant name, applying the configured fallback
    pub fn variant(&self, name: &str) -> Result<Variant> {
        match self.registry.variant(name) {
            Ok(variant) => Ok(variant.clone()),
            Err(err) if self.config.reveal.strict_variants => Err(err),
            Err(_) => {
                let fallback = &self.config.reveal.fallback_variant;
                tracing::warn!(
                    requested = name,
                    %fallback,
                    "unknown animation variant, using fallback"
                );
                self.registry.variant(fallback).cloned()
            }
        }
    }

    /// Reveal `element` with a named variant when it scrolls into view
    pub fn reveal(
        &self,
        element: ElementHandle,
        variant: &str,
        options: RevealOptions,
    ) -> Result<RevealController> {
        let variant = options.apply(&self.variant(variant)?)?;
        RevealController::observe(
            &self.observer,
            self.scheduler.handle(),
            element,
            variant,
            options.observe_options(self.config.observe_defaults()),
        )
    }

    /// Reveal `children` one after another once `parent` scrolls into view
    pub fn stagger_group(
        &self,
        parent: ElementHandle,
        children: Vec<StaggerChild>,
        options: StaggerOptions,
    ) -> Result<StaggerCoordinator> {
        let plan = StaggerPlan::new(
            children.iter().map(|child| child.element).collect(),
            options.base_delay_ms,
            options.per_item_interval_ms,
        )?;

        let parent_variant = match &options.parent_variant {
            Some(name) => options.reveal.apply(&self.variant(name)?)?,
            None => Variant::new(
                "container",
                Keyframe::new(),
                Keyframe::new(),
                Transition::timed(0.0, Easing::Linear),
            )?,
        };
        let defaults = self.config.observe_defaults();
        let observe = options.reveal.observe_options(defaults);
        let parent = RevealController::observe(
            &self.observer,
            self.scheduler.handle(),
            parent,
            parent_variant,
            observe,
        )?;

        let children = children
            .iter()
            .map(|child| {
                let variant = child.options.apply(&self.variant(&child.variant)?)?;
                Ok((child.element, variant))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(StaggerCoordinator::new(
            parent,
            children,
            plan,
            self.scheduler.handle(),
            observe.trigger_once,
        ))
    }

    /// Parallax with the configured distance, axis and spring
    pub fn parallax(&self, element: ElementHandle, speed_factor: f32) -> OffsetStream {
        self.parallax.attach(element, speed_factor)
    }

    pub fn parallax_with(
        &self,
        element: ElementHandle,
        options: ParallaxOptions,
    ) -> Result<OffsetStream> {
        self.parallax.attach_with(element, options)
    }

    /// Count from `start` to `target` over `duration_ms`
    pub fn animate_counter(
        &self,
        start: f64,
        target: f64,
        duration_ms: f32,
        options: CounterOptions,
    ) -> Result<ValueStream> {
        self.counters.run_with(start, target, duration_ms, options)
    }

    /// Reveal `text` word by word with the configured timing
    pub fn reveal_text(&self, text: &str) -> Result<PerWordStream> {
        self.text.reveal(text, self.config.text.word_delay_ms)
    }

    pub fn reveal_text_with(
        &self,
        text: &str,
        options: TextRevealOptions,
    ) -> Result<PerWordStream> {
        self.text.reveal_with(text, options)
    }

    /// Run one display frame
    pub fn frame(&self, dt_ms: f32, viewport: Rect, measure: &dyn ElementMeasure) -> FrameReport {
        let time = self.scheduler.begin_frame(dt_ms);
        let signals = self.observer.resolve(viewport, measure);
        self.scheduler.run_frame(time);

        let pending_work = self.scheduler.has_pending_work();
        tracing::trace!(frame = time.frame, signals, pending_work, "frame complete");
        FrameReport {
            time,
            signals,
            pending_work,
        }
    }

    /// Any timers or frame callbacks still registered
    pub fn has_pending_work(&self) -> bool {
        self.scheduler.has_pending_work()
    }
}

impl fmt::Debug for MotionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionEngine")
            .field("variants", &self.registry.len())
            .field("scheduler", &self.scheduler)
            .field("observer", &self.observer)
            .finish()
    }
}
