//! Easing curves
//!
//! Map normalized progress `t ∈ [0, 1]` to eased progress. Named curves match
//! their CSS / motion-library counterparts so variant tables read naturally.

use serde::{Deserialize, Serialize};

/// Easing function applied to normalized animation progress
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    /// CSS `ease-in`
    EaseIn,
    /// CSS `ease-out`
    EaseOut,
    /// CSS `ease-in-out`
    EaseInOut,
    EaseInQuad,
    EaseOutQuad,
    EaseInOutQuad,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
    /// Fast start that eases into the target; the usual counter curve
    EaseOutExpo,
    /// Overshoots slightly before settling (not monotonic)
    EaseOutBack,
    /// CSS `cubic-bezier(x1, y1, x2, y2)`
    CubicBezier(f32, f32, f32, f32),
}

impl Easing {
    /// The "snappy settle" curve used by most reveal variants
    pub const SMOOTH_OUT: Easing = Easing::CubicBezier(0.22, 1.0, 0.36, 1.0);

    /// Apply the curve to progress `t` (clamped to `[0, 1]`)
    pub fn apply(self, t: f32) -> f32 {
        if t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        match self {
            Easing::Linear => t,
            Easing::EaseIn => cubic_bezier(0.42, 0.0, 1.0, 1.0, t),
            Easing::EaseOut => cubic_bezier(0.0, 0.0, 0.58, 1.0, t),
            Easing::EaseInOut => cubic_bezier(0.42, 0.0, 0.58, 1.0, t),
            Easing::EaseInQuad => t * t,
            Easing::EaseOutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::EaseInCubic => t * t * t,
            Easing::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::EaseOutExpo => 1.0 - 2f32.powf(-10.0 * t),
            Easing::EaseOutBack => {
                const C1: f32 = 1.70158;
                const C3: f32 = C1 + 1.0;
                1.0 + C3 * (t - 1.0).powi(3) + C1 * (t - 1.0).powi(2)
            }
            Easing::CubicBezier(x1, y1, x2, y2) => cubic_bezier(x1, y1, x2, y2, t),
        }
    }

    /// Whether the curve never decreases over `[0, 1]`
    pub fn is_monotonic(self) -> bool {
        match self {
            Easing::EaseOutBack => false,
            Easing::CubicBezier(_, y1, _, y2) => {
                (0.0..=1.0).contains(&y1) && (0.0..=1.0).contains(&y2)
            }
            _ => true,
        }
    }
}

/// Evaluate a CSS cubic-bezier timing curve at `x`
///
/// Solves `bezier_x(s) = x` with Newton steps, falling back to bisection when
/// the slope flattens out, then returns `bezier_y(s)`.
fn cubic_bezier(x1: f32, y1: f32, x2: f32, y2: f32, x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let x1 = x1.clamp(0.0, 1.0);
    let x2 = x2.clamp(0.0, 1.0);

    let sample = |a1: f32, a2: f32, s: f32| {
        let inv = 1.0 - s;
        3.0 * inv * inv * s * a1 + 3.0 * inv * s * s * a2 + s * s * s
    };
    let slope = |a1: f32, a2: f32, s: f32| {
        let inv = 1.0 - s;
        3.0 * inv * inv * a1 + 6.0 * inv * s * (a2 - a1) + 3.0 * s * s * (1.0 - a2)
    };

    let mut s = x;
    for _ in 0..8 {
        let err = sample(x1, x2, s) - x;
        if err.abs() < 1e-6 {
            return sample(y1, y2, s);
        }
        let d = slope(x1, x2, s);
        if d.abs() < 1e-6 {
            break;
        }
        s = (s - err / d).clamp(0.0, 1.0);
    }

    let (mut lo, mut hi) = (0.0f32, 1.0f32);
    s = x;
    for _ in 0..32 {
        let value = sample(x1, x2, s);
        if (value - x).abs() < 1e-6 {
            break;
        }
        if value < x {
            lo = s;
        } else {
            hi = s;
        }
        s = (lo + hi) * 0.5;
    }
    sample(y1, y2, s)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Easing; 13] = [
        Easing::Linear,
        Easing::EaseIn,
        Easing::EaseOut,
        Easing::EaseInOut,
        Easing::EaseInQuad,
        Easing::EaseOutQuad,
        Easing::EaseInOutQuad,
        Easing::EaseInCubic,
        Easing::EaseOutCubic,
        Easing::EaseInOutCubic,
        Easing::EaseOutExpo,
        Easing::EaseOutBack,
        Easing::SMOOTH_OUT,
    ];

    #[test]
    fn test_endpoints_are_exact() {
        for easing in ALL {
            assert_eq!(easing.apply(0.0), 0.0, "{easing:?} at 0");
            assert_eq!(easing.apply(1.0), 1.0, "{easing:?} at 1");
        }
    }

    #[test]
    fn test_input_is_clamped() {
        assert_eq!(Easing::EaseOutCubic.apply(-0.5), 0.0);
        assert_eq!(Easing::EaseOutCubic.apply(1.5), 1.0);
    }

    #[test]
    fn test_monotonic_curves_never_decrease() {
        for easing in ALL.into_iter().filter(|e| e.is_monotonic()) {
            let mut previous = 0.0;
            for i in 0..=200 {
                let value = easing.apply(i as f32 / 200.0);
                assert!(
                    value + 1e-5 >= previous,
                    "{easing:?} decreased at step {i}: {previous} -> {value}"
                );
                previous = value;
            }
        }
    }

    #[test]
    fn test_ease_out_back_overshoots() {
        assert!(!Easing::EaseOutBack.is_monotonic());
        let peak = (0..=100)
            .map(|i| Easing::EaseOutBack.apply(i as f32 / 100.0))
            .fold(0.0f32, f32::max);
        assert!(peak > 1.0);
    }

    #[test]
    fn test_cubic_bezier_matches_linear_diagonal() {
        let diagonal = Easing::CubicBezier(0.25, 0.25, 0.75, 0.75);
        for i in 0..=10 {
            let t = i as f32 / 10.0;
            assert!((diagonal.apply(t) - t).abs() < 1e-3);
        }
    }

    #[test]
    fn test_ease_out_is_ahead_of_linear() {
        assert!(Easing::EaseOut.apply(0.5) > 0.5);
        assert!(Easing::EaseIn.apply(0.5) < 0.5);
    }
}
