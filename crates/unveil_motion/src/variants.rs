//! Animation variants
//!
//! A [`Variant`] is a named pair of keyframes (hidden and visible) plus the
//! transition used between them. Variants live in a [`VariantRegistry`]; the
//! sixteen built-in variants are available process-wide through
//! [`VariantRegistry::standard`].
//!
//! Both keyframes of a variant must animate the same set of properties, so
//! any intermediate frame of a reveal can be replayed in reverse.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use unveil_animation::{Easing, Keyframe, SpringConfig, Transition};
use unveil_core::{ConfigurationError, Result};

use crate::viewport::VisibilityState;

/// Names of the built-in variants
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VariantName {
    FadeUp,
    FadeDown,
    FadeLeft,
    FadeRight,
    Scale,
    ScaleUp,
    Rotate,
    Blur,
    Flip,
    SlideUp,
    SlideDown,
    SlideLeft,
    SlideRight,
    ZoomIn,
    ZoomOut,
    Bounce,
}

impl VariantName {
    pub const ALL: [VariantName; 16] = [
        VariantName::FadeUp,
        VariantName::FadeDown,
        VariantName::FadeLeft,
        VariantName::FadeRight,
        VariantName::Scale,
        VariantName::ScaleUp,
        VariantName::Rotate,
        VariantName::Blur,
        VariantName::Flip,
        VariantName::SlideUp,
        VariantName::SlideDown,
        VariantName::SlideLeft,
        VariantName::SlideRight,
        VariantName::ZoomIn,
        VariantName::ZoomOut,
        VariantName::Bounce,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VariantName::FadeUp => "fadeUp",
            VariantName::FadeDown => "fadeDown",
            VariantName::FadeLeft => "fadeLeft",
            VariantName::FadeRight => "fadeRight",
            VariantName::Scale => "scale",
            VariantName::ScaleUp => "scaleUp",
            VariantName::Rotate => "rotate",
            VariantName::Blur => "blur",
            VariantName::Flip => "flip",
            VariantName::SlideUp => "slideUp",
            VariantName::SlideDown => "slideDown",
            VariantName::SlideLeft => "slideLeft",
            VariantName::SlideRight => "slideRight",
            VariantName::ZoomIn => "zoomIn",
            VariantName::ZoomOut => "zoomOut",
            VariantName::Bounce => "bounce",
        }
    }

    /// Hidden keyframe, visible keyframe, transition
    fn definition(self) -> (Keyframe, Keyframe, Transition) {
        let shown = Keyframe::new().opacity(1.0);
        let standard = Transition::default();
        match self {
            VariantName::FadeUp => (
                Keyframe::new().opacity(0.0).y(60.0),
                shown.y(0.0),
                standard,
            ),
            VariantName::FadeDown => (
                Keyframe::new().opacity(0.0).y(-60.0),
                shown.y(0.0),
                standard,
            ),
            VariantName::FadeLeft => (
                Keyframe::new().opacity(0.0).x(-60.0),
                shown.x(0.0),
                standard,
            ),
            VariantName::FadeRight => (
                Keyframe::new().opacity(0.0).x(60.0),
                shown.x(0.0),
                standard,
            ),
            VariantName::Scale => (
                Keyframe::new().opacity(0.0).scale(0.8),
                shown.scale(1.0),
                Transition::timed(500.0, Easing::SMOOTH_OUT),
            ),
            VariantName::ScaleUp => (
                Keyframe::new().opacity(0.0).scale(0.5).y(40.0),
                shown.scale(1.0).y(0.0),
                Transition::spring(SpringConfig::new(260.0, 20.0, 1.0)),
            ),
            VariantName::Rotate => (
                Keyframe::new().opacity(0.0).rotate(-10.0).scale(0.9),
                shown.rotate(0.0).scale(1.0),
                Transition::timed(700.0, Easing::SMOOTH_OUT),
            ),
            VariantName::Blur => (
                Keyframe::new().opacity(0.0).blur(10.0),
                shown.blur(0.0),
                Transition::timed(800.0, Easing::EaseOut),
            ),
            VariantName::Flip => (
                Keyframe::new().opacity(0.0).rotate_y(90.0),
                shown.rotate_y(0.0),
                Transition::timed(700.0, Easing::SMOOTH_OUT),
            ),
            VariantName::SlideUp => (
                Keyframe::new().opacity(0.0).y(100.0),
                shown.y(0.0),
                Transition::timed(800.0, Easing::EaseOutCubic),
            ),
            VariantName::SlideDown => (
                Keyframe::new().opacity(0.0).y(-100.0),
                shown.y(0.0),
                Transition::timed(800.0, Easing::EaseOutCubic),
            ),
            VariantName::SlideLeft => (
                Keyframe::new().opacity(0.0).x(100.0),
                shown.x(0.0),
                Transition::timed(800.0, Easing::EaseOutCubic),
            ),
            VariantName::SlideRight => (
                Keyframe::new().opacity(0.0).x(-100.0),
                shown.x(0.0),
                Transition::timed(800.0, Easing::EaseOutCubic),
            ),
            VariantName::ZoomIn => (
                Keyframe::new().opacity(0.0).scale(0.5),
                shown.scale(1.0),
                standard,
            ),
            VariantName::ZoomOut => (
                Keyframe::new().opacity(0.0).scale(1.5),
                shown.scale(1.0),
                standard,
            ),
            VariantName::Bounce => (
                Keyframe::new().opacity(0.0).y(50.0),
                shown.y(0.0),
                Transition::spring(SpringConfig::bouncy()),
            ),
        }
    }

    fn variant(self) -> Variant {
        let (hidden, visible, transition) = self.definition();
        Variant {
            name: self.as_str().to_string(),
            hidden,
            visible,
            transition,
        }
    }
}

impl fmt::Display for VariantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantName {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self> {
        VariantName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ConfigurationError::UnknownVariant {
                name: s.to_string(),
            })
    }
}

/// A named hidden/visible keyframe pair and its transition
#[derive(Clone, Debug, PartialEq)]
pub struct Variant {
    name: String,
    hidden: Keyframe,
    visible: Keyframe,
    transition: Transition,
}

impl Variant {
    /// Build a variant, checking that both keyframes animate the same properties
    pub fn new(
        name: impl Into<String>,
        hidden: Keyframe,
        visible: Keyframe,
        transition: Transition,
    ) -> Result<Self> {
        let variant = Self {
            name: name.into(),
            hidden,
            visible,
            transition,
        };
        variant.validate()?;
        Ok(variant)
    }

    fn validate(&self) -> Result<()> {
        let asymmetric = |property: unveil_animation::Property, missing_from| {
            ConfigurationError::AsymmetricKeyframes {
                variant: self.name.clone(),
                property: property.name().to_string(),
                missing_from,
            }
        };
        if let Some(property) = self.hidden.first_missing_from(&self.visible) {
            return Err(asymmetric(property, "visible"));
        }
        if let Some(property) = self.visible.first_missing_from(&self.hidden) {
            return Err(asymmetric(property, "hidden"));
        }
        self.transition.validate()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hidden(&self) -> &Keyframe {
        &self.hidden
    }

    pub fn visible(&self) -> &Keyframe {
        &self.visible
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    /// Keyframe for a visibility state
    pub fn keyframe(&self, state: VisibilityState) -> &Keyframe {
        match state {
            VisibilityState::Hidden => &self.hidden,
            VisibilityState::Visible => &self.visible,
        }
    }

    /// Same keyframes, different transition
    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = transition;
        self
    }
}

type VariantMap = IndexMap<String, Variant, FxBuildHasher>;

/// Immutable name to variant table
#[derive(Clone, Debug, Default)]
pub struct VariantRegistry {
    variants: VariantMap,
    fallback: Option<String>,
}

static STANDARD: OnceLock<Arc<VariantRegistry>> = OnceLock::new();

impl VariantRegistry {
    pub fn builder() -> VariantRegistryBuilder {
        VariantRegistryBuilder::default()
    }

    /// The sixteen built-in variants, built once per process
    ///
    /// Lookups are strict: unknown names are an error. Fallback behaviour is
    /// left to the engine configuration.
    pub fn standard() -> Arc<VariantRegistry> {
        Arc::clone(STANDARD.get_or_init(|| {
            let variants = VariantName::ALL
                .into_iter()
                .map(|name| (name.as_str().to_string(), name.variant()))
                .collect();
            tracing::debug!("built standard variant registry");
            Arc::new(VariantRegistry {
                variants,
                fallback: None,
            })
        }))
    }

    /// Look up a variant, falling back to the registry's fallback if set
    pub fn variant(&self, name: &str) -> Result<&Variant> {
        if let Some(variant) = self.variants.get(name) {
            return Ok(variant);
        }
        let fallback = self
            .fallback
            .as_deref()
            .and_then(|fallback| self.variants.get(fallback));
        match fallback {
            Some(variant) => {
                tracing::warn!(
                    requested = name,
                    fallback = variant.name(),
                    "unknown animation variant, using fallback"
                );
                Ok(variant)
            }
            None => Err(ConfigurationError::UnknownVariant {
                name: name.to_string(),
            }),
        }
    }

    pub fn get(&self, name: VariantName) -> Option<&Variant> {
        self.variants.get(name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variants.contains_key(name)
    }

    /// Variant names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.variants.keys().map(String::as_str)
    }

    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Start a new registry from this one's contents
    ///
    /// The original registry is left untouched.
    pub fn extend(&self) -> VariantRegistryBuilder {
        VariantRegistryBuilder {
            variants: self.variants.values().cloned().collect(),
            fallback: self.fallback.clone(),
        }
    }
}

/// Collects variants and validates them as a whole in [`build`](Self::build)
#[derive(Clone, Debug, Default)]
pub struct VariantRegistryBuilder {
    variants: Vec<Variant>,
    fallback: Option<String>,
}

impl VariantRegistryBuilder {
    pub fn register(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Register one of the built-in variants
    pub fn builtin(self, name: VariantName) -> Self {
        self.register(name.variant())
    }

    /// Register all sixteen built-in variants
    pub fn builtins(self) -> Self {
        VariantName::ALL
            .into_iter()
            .fold(self, |builder, name| builder.builtin(name))
    }

    /// Variant used when a lookup names an unknown variant
    pub fn fallback(mut self, name: impl Into<String>) -> Self {
        self.fallback = Some(name.into());
        self
    }

    pub fn build(self) -> Result<VariantRegistry> {
        let mut variants = VariantMap::default();
        for variant in self.variants {
            variant.validate()?;
            if variants.contains_key(variant.name()) {
                return Err(ConfigurationError::DuplicateVariant(variant.name));
            }
            variants.insert(variant.name.clone(), variant);
        }
        if let Some(fallback) = &self.fallback {
            if !variants.contains_key(fallback) {
                return Err(ConfigurationError::UnknownVariant {
                    name: fallback.clone(),
                });
            }
        }
        Ok(VariantRegistry {
            variants,
            fallback: self.fallback,
        })
    }
}
