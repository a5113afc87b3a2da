//! Engine error types
//!
//! Configuration problems are returned to the caller that builds the
//! registry, config, or handle. Runtime problems inside the frame loop are
//! never returned: they are logged as a [`DetachedHandleWarning`] and the
//! affected controller cancels itself.

use thiserror::Error;

use crate::element::ElementHandle;

/// Errors raised while configuring the engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// A consumer asked for a variant that does not exist and no fallback is set
    #[error("unknown animation variant `{name}` and no fallback configured")]
    UnknownVariant { name: String },

    /// Hidden and visible keyframes of a variant animate different properties
    #[error("variant `{variant}` has asymmetric keyframes: `{property}` is missing from the {missing_from} keyframe")]
    AsymmetricKeyframes {
        variant: String,
        property: String,
        missing_from: &'static str,
    },

    /// A variant name was registered twice
    #[error("variant `{0}` registered more than once")]
    DuplicateVariant(String),

    /// Visibility threshold outside `0.0..=1.0`
    #[error("visibility threshold {0} is outside 0.0..=1.0")]
    InvalidThreshold(f32),

    /// Stagger timing that would break list-order reveal
    #[error("invalid stagger timing: {0}")]
    InvalidStagger(String),

    /// Negative or non-finite duration
    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    /// Engine configuration could not be read or parsed
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for configuration-time operations
pub type Result<T> = std::result::Result<T, ConfigurationError>;

/// A per-frame callback ran after the controller that owned it was gone
///
/// Visual effects must never crash the host, so this is only ever logged.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{source_kind} emitted after its owner was dropped (element: {element:?})")]
pub struct DetachedHandleWarning {
    pub source_kind: &'static str,
    pub element: Option<ElementHandle>,
}

impl DetachedHandleWarning {
    pub fn new(source_kind: &'static str, element: Option<ElementHandle>) -> Self {
        Self {
            source_kind,
            element,
        }
    }

    /// Log the warning
    pub fn report(self) {
        tracing::warn!(warning = %self, "detached animation handle");
    }

    /// Build and log a warning in one step
    pub fn emit(source_kind: &'static str, element: Option<ElementHandle>) {
        Self::new(source_kind, element).report();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ConfigurationError::UnknownVariant {
            name: "wiggle".into(),
        };
        assert_eq!(
            err.to_string(),
            "unknown animation variant `wiggle` and no fallback configured"
        );

        let err = ConfigurationError::AsymmetricKeyframes {
            variant: "fadeUp".into(),
            property: "opacity".into(),
            missing_from: "hidden",
        };
        let message = err.to_string();
        assert!(message.contains("`opacity` is missing from the hidden"));
    }

    #[test]
    fn test_warning_display() {
        let warning = DetachedHandleWarning::new("counter", None);
        assert_eq!(
            warning.to_string(),
            "counter emitted after its owner was dropped (element: None)"
        );
        // Logging without a subscriber is a no-op
        warning.report();
        DetachedHandleWarning::emit("parallax", Some(ElementHandle::new(2)));
    }
}
