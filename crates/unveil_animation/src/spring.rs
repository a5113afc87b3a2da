//! Damped spring integration
//!
//! A spring pulls `position` toward `target` with
//! `acceleration = (stiffness * (target - position) - damping * velocity) / mass`.
//! Integration is RK4 with the frame delta split into small substeps, so a
//! long frame (tab switch, debugger pause) cannot blow the simulation up.

use serde::{Deserialize, Serialize};

/// Largest single integration step in seconds
const MAX_SUBSTEP: f32 = 1.0 / 120.0;

/// Spring constants plus the thresholds used to decide it has come to rest
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpringConfig {
    pub stiffness: f32,
    pub damping: f32,
    pub mass: f32,
    /// Distance from target below which the spring may rest
    pub rest_delta: f32,
    /// Speed below which the spring may rest
    pub rest_speed: f32,
}

impl SpringConfig {
    pub fn new(stiffness: f32, damping: f32, mass: f32) -> Self {
        Self {
            stiffness,
            damping,
            mass,
            ..Self::default()
        }
    }

    /// Smoothing filter for scroll-linked offsets (overdamped, never overshoots)
    pub fn parallax() -> Self {
        Self::new(100.0, 30.0, 1.0)
    }

    /// A gentle, slow spring
    pub fn gentle() -> Self {
        Self::new(120.0, 14.0, 1.0)
    }

    /// Visible overshoot, used by the `bounce` reveal
    pub fn bouncy() -> Self {
        Self::new(400.0, 10.0, 1.0)
    }

    /// A stiff, snappy spring with a hint of overshoot
    pub fn stiff() -> Self {
        Self::new(400.0, 30.0, 1.0)
    }

    pub fn with_rest_thresholds(mut self, rest_delta: f32, rest_speed: f32) -> Self {
        self.rest_delta = rest_delta;
        self.rest_speed = rest_speed;
        self
    }

    /// Damping that removes oscillation with the fastest settle
    pub fn critical_damping(&self) -> f32 {
        2.0 * (self.stiffness * self.mass).sqrt()
    }

    /// `damping / critical_damping`: below 1 oscillates, at or above 1 does not
    pub fn damping_ratio(&self) -> f32 {
        let critical = self.critical_damping();
        if critical <= f32::EPSILON {
            return f32::INFINITY;
        }
        self.damping / critical
    }

    pub fn is_underdamped(&self) -> bool {
        self.damping_ratio() < 1.0
    }
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            stiffness: 100.0,
            damping: 30.0,
            mass: 1.0,
            rest_delta: 0.001,
            rest_speed: 0.01,
        }
    }
}

/// Position and velocity of a spring at one instant
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpringState {
    pub position: f32,
    pub velocity: f32,
}

/// A spring chasing a (movable) target
#[derive(Clone, Copy, Debug)]
pub struct Spring {
    config: SpringConfig,
    state: SpringState,
    target: f32,
}

impl Spring {
    /// A spring at rest at `initial`
    pub fn new(config: SpringConfig, initial: f32) -> Self {
        Self::from_state(
            config,
            SpringState {
                position: initial,
                velocity: 0.0,
            },
            initial,
        )
    }

    /// Seed a spring with an existing state, e.g. the previous frame's
    pub fn from_state(config: SpringConfig, state: SpringState, target: f32) -> Self {
        Self {
            config,
            state,
            target,
        }
    }

    pub fn config(&self) -> SpringConfig {
        self.config
    }

    pub fn state(&self) -> SpringState {
        self.state
    }

    pub fn value(&self) -> f32 {
        self.state.position
    }

    pub fn velocity(&self) -> f32 {
        self.state.velocity
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// Move the target; velocity is kept so interruptions stay smooth
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Jump to `value` with no motion
    pub fn snap_to(&mut self, value: f32) {
        self.state = SpringState {
            position: value,
            velocity: 0.0,
        };
        self.target = value;
    }

    pub fn is_settled(&self) -> bool {
        (self.state.position - self.target).abs() <= self.config.rest_delta
            && self.state.velocity.abs() <= self.config.rest_speed
    }

    /// Advance the simulation by `dt` seconds
    pub fn step(&mut self, dt: f32) {
        if !(dt > 0.0) {
            return;
        }
        if self.is_settled() {
            self.snap_to(self.target);
            return;
        }

        let steps = (dt / MAX_SUBSTEP).ceil().max(1.0) as u32;
        let h = dt / steps as f32;
        for _ in 0..steps {
            self.rk4(h);
        }

        if self.is_settled() {
            self.snap_to(self.target);
        }
    }

    fn rk4(&mut self, h: f32) {
        let SpringState {
            position: x,
            velocity: v,
        } = self.state;

        let k1_x = v;
        let k1_v = self.acceleration(x, v);

        let k2_x = v + k1_v * h * 0.5;
        let k2_v = self.acceleration(x + k1_x * h * 0.5, k2_x);

        let k3_x = v + k2_v * h * 0.5;
        let k3_v = self.acceleration(x + k2_x * h * 0.5, k3_x);

        let k4_x = v + k3_v * h;
        let k4_v = self.acceleration(x + k3_x * h, k4_x);

        self.state.position += (k1_x + 2.0 * k2_x + 2.0 * k3_x + k4_x) * h / 6.0;
        self.state.velocity += (k1_v + 2.0 * k2_v + 2.0 * k3_v + k4_v) * h / 6.0;
    }

    fn acceleration(&self, x: f32, v: f32) -> f32 {
        let spring_force = self.config.stiffness * (self.target - x);
        let damping_force = self.config.damping * v;
        (spring_force - damping_force) / self.config.mass.max(f32::EPSILON)
    }
}
