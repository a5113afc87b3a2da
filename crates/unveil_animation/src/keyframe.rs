//! Keyframes and interpolation
//!
//! A [`Keyframe`] is one end state of a transition: a small map from visual
//! [`Property`] to value. Two keyframes with the same property set can be
//! blended with [`Interpolate::lerp`].

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Trait for values that can be linearly interpolated
pub trait Interpolate: Clone {
    /// Linearly interpolate between self and other by factor t (0.0 to 1.0)
    fn lerp(&self, other: &Self, t: f32) -> Self;

    /// Check if two values are approximately equal (for settling detection)
    fn approx_eq(&self, other: &Self, epsilon: f32) -> bool;
}

impl Interpolate for f32 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }

    fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        (self - other).abs() < epsilon
    }
}

impl Interpolate for f64 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t as f64
    }

    fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        (self - other).abs() < epsilon as f64
    }
}

/// Visual properties a keyframe can drive
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Property {
    Opacity,
    TranslateX,
    TranslateY,
    Scale,
    /// Rotation about the Z axis, degrees
    Rotation,
    /// Rotation about the Y axis, degrees (card flip)
    RotationY,
    BlurRadius,
}

impl Property {
    pub const ALL: [Property; 7] = [
        Property::Opacity,
        Property::TranslateX,
        Property::TranslateY,
        Property::Scale,
        Property::Rotation,
        Property::RotationY,
        Property::BlurRadius,
    ];

    /// Value a renderer uses when a keyframe does not mention the property
    pub fn identity(self) -> f32 {
        match self {
            Property::Opacity | Property::Scale => 1.0,
            _ => 0.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Property::Opacity => "opacity",
            Property::TranslateX => "translateX",
            Property::TranslateY => "translateY",
            Property::Scale => "scale",
            Property::Rotation => "rotation",
            Property::RotationY => "rotationY",
            Property::BlurRadius => "blurRadius",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One end state of a transition
///
/// Entries are kept sorted by property so equal key sets compare equal
/// regardless of insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Keyframe {
    values: SmallVec<[(Property, f32); 4]>,
}

impl Keyframe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, property: Property, value: f32) -> Self {
        self.set(property, value);
        self
    }

    pub fn opacity(self, value: f32) -> Self {
        self.with(Property::Opacity, value)
    }

    pub fn x(self, value: f32) -> Self {
        self.with(Property::TranslateX, value)
    }

    pub fn y(self, value: f32) -> Self {
        self.with(Property::TranslateY, value)
    }

    pub fn scale(self, value: f32) -> Self {
        self.with(Property::Scale, value)
    }

    pub fn rotate(self, degrees: f32) -> Self {
        self.with(Property::Rotation, degrees)
    }

    pub fn rotate_y(self, degrees: f32) -> Self {
        self.with(Property::RotationY, degrees)
    }

    pub fn blur(self, radius: f32) -> Self {
        self.with(Property::BlurRadius, radius)
    }

    pub fn set(&mut self, property: Property, value: f32) {
        match self.values.binary_search_by_key(&property, |(p, _)| *p) {
            Ok(index) => self.values[index].1 = value,
            Err(index) => self.values.insert(index, (property, value)),
        }
    }

    pub fn get(&self, property: Property) -> Option<f32> {
        self.values
            .binary_search_by_key(&property, |(p, _)| *p)
            .ok()
            .map(|index| self.values[index].1)
    }

    /// Value of `property`, or its identity when absent
    pub fn resolve(&self, property: Property) -> f32 {
        self.get(property).unwrap_or_else(|| property.identity())
    }

    pub fn properties(&self) -> impl Iterator<Item = Property> + '_ {
        self.values.iter().map(|(p, _)| *p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Property, f32)> + '_ {
        self.values.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn same_properties(&self, other: &Keyframe) -> bool {
        self.values.len() == other.values.len()
            && self
                .properties()
                .zip(other.properties())
                .all(|(a, b)| a == b)
    }

    /// First property present in `self` but not in `other`
    pub fn first_missing_from(&self, other: &Keyframe) -> Option<Property> {
        self.properties().find(|p| other.get(*p).is_none())
    }
}

impl Interpolate for Keyframe {
    /// Blend property by property
    ///
    /// Properties missing from one side are blended against their identity
    /// value, so mismatched keyframes still produce a sensible frame.
    fn lerp(&self, other: &Self, t: f32) -> Self {
        let mut out = Keyframe::new();
        for (property, from) in self.iter() {
            let to = other.resolve(property);
            out.set(property, from.lerp(&to, t));
        }
        for (property, to) in other.iter() {
            if self.get(property).is_none() {
                out.set(property, property.identity().lerp(&to, t));
            }
        }
        out
    }

    fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.same_properties(other)
            && self
                .iter()
                .zip(other.iter())
                .all(|((_, a), (_, b))| a.approx_eq(&b, epsilon))
    }
}

impl FromIterator<(Property, f32)> for Keyframe {
    fn from_iter<I: IntoIterator<Item = (Property, f32)>>(iter: I) -> Self {
        let mut keyframe = Keyframe::new();
        for (property, value) in iter {
            keyframe.set(property, value);
        }
        keyframe
    }
}
