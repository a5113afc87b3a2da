//! Transition parameters and keyframe playback
//!
//! A [`TransitionPlayer`] moves a [`Keyframe`] from one state to another,
//! either on a timed easing curve or with one spring per property. Players
//! are restartable from any intermediate frame: interrupt a running player by
//! building a new one from its current keyframe.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use unveil_core::{ConfigurationError, Result};

use crate::easing::Easing;
use crate::keyframe::{Interpolate, Keyframe, Property};
use crate::spring::{Spring, SpringConfig, SpringState};

/// How a keyframe change is animated
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    Timed {
        duration_ms: f32,
        #[serde(default)]
        delay_ms: f32,
        #[serde(default)]
        easing: Easing,
    },
    Spring {
        #[serde(flatten)]
        spring: SpringConfig,
        #[serde(default)]
        delay_ms: f32,
    },
}

impl Transition {
    pub fn timed(duration_ms: f32, easing: Easing) -> Self {
        Transition::Timed {
            duration_ms,
            delay_ms: 0.0,
            easing,
        }
    }

    pub fn spring(spring: SpringConfig) -> Self {
        Transition::Spring {
            spring,
            delay_ms: 0.0,
        }
    }

    pub fn delay_ms(&self) -> f32 {
        match *self {
            Transition::Timed { delay_ms, .. } | Transition::Spring { delay_ms, .. } => delay_ms,
        }
    }

    pub fn with_delay(mut self, delay: f32) -> Self {
        match &mut self {
            Transition::Timed { delay_ms, .. } | Transition::Spring { delay_ms, .. } => {
                *delay_ms = delay
            }
        }
        self
    }

    /// Override the duration of a timed transition; springs keep their physics
    pub fn with_duration(mut self, duration: f32) -> Self {
        if let Transition::Timed { duration_ms, .. } = &mut self {
            *duration_ms = duration;
        }
        self
    }

    /// Reject negative or non-finite timings and degenerate springs
    pub fn validate(&self) -> Result<()> {
        let check = |label: &str, value: f32| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ConfigurationError::InvalidDuration(format!(
                    "{label} must be a finite, non-negative number of milliseconds (got {value})"
                )))
            }
        };
        match *self {
            Transition::Timed {
                duration_ms,
                delay_ms,
                ..
            } => {
                check("duration", duration_ms)?;
                check("delay", delay_ms)
            }
            Transition::Spring { spring, delay_ms } => {
                check("delay", delay_ms)?;
                if spring.stiffness > 0.0 && spring.mass > 0.0 && spring.damping >= 0.0 {
                    Ok(())
                } else {
                    Err(ConfigurationError::InvalidDuration(format!(
                        "spring constants must be positive (stiffness {}, damping {}, mass {})",
                        spring.stiffness, spring.damping, spring.mass
                    )))
                }
            }
        }
    }
}

impl Default for Transition {
    fn default() -> Self {
        Transition::timed(600.0, Easing::SMOOTH_OUT)
    }
}

/// Plays one transition between two keyframes
#[derive(Clone, Debug)]
pub struct TransitionPlayer {
    from: Keyframe,
    to: Keyframe,
    transition: Transition,
    elapsed_ms: f32,
    springs: SmallVec<[(Property, Spring); 4]>,
    current: Keyframe,
    finished: bool,
}

impl TransitionPlayer {
    pub fn new(from: Keyframe, to: Keyframe, transition: Transition) -> Self {
        Self::interrupting(None, from, to, transition)
    }

    /// Start a new transition from `from`, taking over from `previous`
    ///
    /// Spring transitions inherit per-property velocity from the player they
    /// replace, so a reversal mid-flight bends rather than stops dead.
    pub fn interrupting(
        previous: Option<&TransitionPlayer>,
        from: Keyframe,
        to: Keyframe,
        transition: Transition,
    ) -> Self {
        let mut springs = SmallVec::new();
        if let Transition::Spring { spring, .. } = transition {
            let mut properties: SmallVec<[Property; 8]> = from.properties().collect();
            properties.extend(to.properties().filter(|p| from.get(*p).is_none()));
            properties.sort();
            for property in properties {
                let velocity = previous
                    .and_then(|player| player.spring_velocity(property))
                    .unwrap_or(0.0);
                let state = SpringState {
                    position: from.resolve(property),
                    velocity,
                };
                springs.push((
                    property,
                    Spring::from_state(spring, state, to.resolve(property)),
                ));
            }
        }

        let finished = from == to && previous.map_or(true, |p| p.springs_at_rest());
        Self {
            current: from.clone(),
            from,
            to,
            transition,
            elapsed_ms: 0.0,
            springs,
            finished,
        }
    }

    /// Advance by `dt_ms` and return the active keyframe
    pub fn advance(&mut self, dt_ms: f32) -> &Keyframe {
        if self.finished || !(dt_ms > 0.0) {
            return &self.current;
        }

        let delay = self.transition.delay_ms();
        let before = self.elapsed_ms;
        self.elapsed_ms += dt_ms;
        if self.elapsed_ms <= delay {
            return &self.current;
        }
        let active_ms = self.elapsed_ms - before.max(delay);

        match self.transition {
            Transition::Timed {
                duration_ms,
                easing,
                ..
            } => {
                let running = self.elapsed_ms - delay;
                if running >= duration_ms {
                    self.finish();
                } else {
                    let eased = easing.apply(running / duration_ms);
                    self.current = self.from.lerp(&self.to, eased);
                }
            }
            Transition::Spring { .. } => {
                let mut keyframe = Keyframe::new();
                let mut settled = true;
                for (property, spring) in self.springs.iter_mut() {
                    spring.step(active_ms / 1000.0);
                    settled &= spring.is_settled();
                    keyframe.set(*property, spring.value());
                }
                if settled {
                    self.finish();
                } else {
                    self.current = keyframe;
                }
            }
        }
        &self.current
    }

    fn finish(&mut self) {
        self.current = self.to.clone();
        self.finished = true;
    }

    pub fn current(&self) -> &Keyframe {
        &self.current
    }

    pub fn target(&self) -> &Keyframe {
        &self.to
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    pub fn elapsed_ms(&self) -> f32 {
        self.elapsed_ms
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Still waiting out the transition's delay
    pub fn is_delayed(&self) -> bool {
        !self.finished && self.elapsed_ms <= self.transition.delay_ms()
    }

    fn spring_velocity(&self, property: Property) -> Option<f32> {
        if self.finished {
            return None;
        }
        self.springs
            .iter()
            .find(|(p, _)| *p == property)
            .map(|(_, spring)| spring.velocity())
    }

    fn springs_at_rest(&self) -> bool {
        self.finished || self.springs.iter().all(|(_, s)| s.velocity() == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hidden() -> Keyframe {
        Keyframe::new().opacity(0.0).y(60.0)
    }

    fn visible() -> Keyframe {
        Keyframe::new().opacity(1.0).y(0.0)
    }

    #[test]
    fn test_timed_player_reaches_target_exactly() {
        let mut player = TransitionPlayer::new(
            hidden(),
            visible(),
            Transition::timed(300.0, Easing::EaseOut),
        );
        for _ in 0..18 {
            player.advance(16.0);
        }
        assert!(!player.is_finished());
        player.advance(16.0);
        assert!(player.is_finished());
        assert_eq!(player.current(), &visible());
    }

    #[test]
    fn test_timed_player_honours_delay() {
        let transition = Transition::timed(100.0, Easing::Linear).with_delay(200.0);
        let mut player = TransitionPlayer::new(hidden(), visible(), transition);

        player.advance(150.0);
        assert!(player.is_delayed());
        assert_eq!(player.current(), &hidden());

        // 50ms of delay left, then 50ms of motion
        player.advance(100.0);
        let opacity = player.current().get(Property::Opacity).unwrap();
        assert!((opacity - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_spring_player_settles_on_target() {
        let transition = Transition::spring(SpringConfig::bouncy());
        let mut player = TransitionPlayer::new(hidden(), visible(), transition);
        for _ in 0..240 {
            player.advance(1000.0 / 60.0);
        }
        assert!(player.is_finished());
        assert_eq!(player.current(), &visible());
    }

    #[test]
    fn test_interrupt_starts_from_current_frame() {
        let transition = Transition::timed(400.0, Easing::Linear);
        let mut forward = TransitionPlayer::new(hidden(), visible(), transition);
        forward.advance(200.0);
        let midway = forward.current().clone();
        assert!((midway.get(Property::Opacity).unwrap() - 0.5).abs() < 1e-5);

        let mut back =
            TransitionPlayer::interrupting(Some(&forward), midway.clone(), hidden(), transition);
        assert_eq!(back.current(), &midway);
        back.advance(16.0);
        let opacity = back.current().get(Property::Opacity).unwrap();
        assert!(opacity < 0.5 && opacity > 0.4);
    }

    #[test]
    fn test_spring_interrupt_inherits_velocity() {
        let transition = Transition::spring(SpringConfig::gentle());
        let mut forward = TransitionPlayer::new(hidden(), visible(), transition);
        for _ in 0..5 {
            forward.advance(16.0);
        }
        let current = forward.current().clone();
        let mut back =
            TransitionPlayer::interrupting(Some(&forward), current.clone(), hidden(), transition);
        back.advance(16.0);
        // Still moving toward visible (y decreasing) for a moment due to momentum
        let y_before = current.get(Property::TranslateY).unwrap();
        let y_after = back.current().get(Property::TranslateY).unwrap();
        assert!(y_after < y_before);
    }

    #[test]
    fn test_identical_endpoints_finish_immediately() {
        let player = TransitionPlayer::new(visible(), visible(), Transition::default());
        assert!(player.is_finished());
    }

    #[test]
    fn test_validate_rejects_negative_duration() {
        assert!(Transition::timed(-1.0, Easing::Linear).validate().is_err());
        assert!(Transition::timed(f32::NAN, Easing::Linear)
            .validate()
            .is_err());
        assert!(Transition::default().with_delay(100.0).validate().is_ok());
        assert!(Transition::spring(SpringConfig::new(0.0, 1.0, 1.0))
            .validate()
            .is_err());
    }
}
