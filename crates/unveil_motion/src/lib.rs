//! Unveil Motion
//!
//! Scroll-triggered animation for content pages. Elements fade, slide, scale
//! or blur into place as they enter the viewport; lists reveal one item at a
//! time; backgrounds drift with the scroll; numbers count up and headlines
//! appear word by word.
//!
//! # Features
//!
//! - **Viewport observation**: threshold visibility, one-shot or repeatable
//! - **Variants**: sixteen named hidden/visible keyframe pairs
//! - **Reveals**: interruptible transitions driven by visibility
//! - **Stagger**: ordered child reveals under one observed parent
//! - **Parallax**: spring-smoothed, scroll-linked offsets
//! - **Counters**: eased numeric interpolation with formatting
//! - **Text**: word-by-word reveals
//!
//! # Example
//!
//! ```rust
//! use unveil_core::{DocumentLayout, ElementHandle, Rect};
//! use unveil_motion::{EngineConfig, MotionEngine, RevealOptions, VisibilityState};
//!
//! let engine = MotionEngine::new(EngineConfig::default()).unwrap();
//! let card = ElementHandle::new(1);
//! let mut page = DocumentLayout::new();
//! page.insert(card, Rect::new(0.0, 900.0, 400.0, 200.0));
//!
//! let reveal = engine.reveal(card, "fadeUp", RevealOptions::default()).unwrap();
//! let viewport = Rect::new(0.0, 0.0, 1280.0, 720.0);
//!
//! engine.frame(16.0, viewport, &page);
//! assert_eq!(reveal.state(), VisibilityState::Hidden);
//!
//! page.scroll_by(0.0, 400.0);
//! while engine.frame(16.0, viewport, &page).pending_work {}
//! assert_eq!(reveal.state(), VisibilityState::Visible);
//! ```

pub mod config;
pub mod counter;
pub mod engine;
pub mod parallax;
pub mod reveal;
pub mod stagger;
pub mod text;
pub mod variants;
pub mod viewport;

pub use config::{
    CounterConfig, EngineConfig, ParallaxConfig, RevealConfig, SchedulerConfig, TextConfig,
};
pub use counter::{CounterFrame, CounterOptions, CounterRun, NumericInterpolator, ValueStream};
pub use engine::{FrameReport, MotionEngine};
pub use parallax::{OffsetStream, ParallaxAxis, ParallaxEngine, ParallaxOffset, ParallaxOptions};
pub use reveal::{RevealController, RevealOptions, RevealTransition};
pub use stagger::{StaggerChild, StaggerCoordinator, StaggerOptions, StaggerPlan};
pub use text::{PerWordStream, SequencedTextRevealer, TextRevealOptions, WordFrame};
pub use variants::{Variant, VariantName, VariantRegistry, VariantRegistryBuilder};
pub use viewport::{
    scroll_progress, visibility_for, ObservationId, ObserveOptions, Observation, ObserverEvent,
    ScrollSample, ViewTrigger, ViewportObserver, VisibilityState,
};
