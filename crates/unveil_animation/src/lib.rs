//! Unveil Animation System
//!
//! Spring physics, easing curves, keyframe transitions, and a host-driven
//! frame scheduler.
//!
//! # Features
//!
//! - **Spring Physics**: RK4-integrated, substepped springs with rest detection
//! - **Easing**: CSS-style named curves and `cubic-bezier`
//! - **Keyframes**: property maps (opacity, translate, scale, rotation, blur)
//! - **Transitions**: timed or spring playback, interruptible mid-flight
//! - **Scheduler**: per-frame callbacks and timeouts owned by RAII subscriptions
//! - **Emitters**: listener lists for render-ready values
//!
//! # Example
//!
//! ```rust
//! use unveil_animation::{Easing, FrameScheduler, Keyframe, Transition, TransitionPlayer};
//!
//! let mut player = TransitionPlayer::new(
//!     Keyframe::new().opacity(0.0).y(60.0),
//!     Keyframe::new().opacity(1.0).y(0.0),
//!     Transition::timed(300.0, Easing::EaseOut),
//! );
//! while !player.is_finished() {
//!     player.advance(16.0);
//! }
//! assert_eq!(player.current(), &Keyframe::new().opacity(1.0).y(0.0));
//! ```

pub mod easing;
pub mod emitter;
pub mod keyframe;
pub mod scheduler;
pub mod spring;
pub mod transition;

pub use easing::Easing;
pub use emitter::{Emitter, ListenerId};
pub use keyframe::{Interpolate, Keyframe, Property};
pub use scheduler::{
    FrameCallbackId, FrameControl, FrameScheduler, FrameTime, SchedulerHandle, Subscription,
    TimeoutId, DEFAULT_MAX_FRAME_DT_MS,
};
pub use spring::{Spring, SpringConfig, SpringState};
pub use transition::{Transition, TransitionPlayer};
