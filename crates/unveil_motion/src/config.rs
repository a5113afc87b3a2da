//! Engine configuration
//!
//! Defaults for every controller, loadable from a TOML file:
//!
//! ```toml
//! [reveal]
//! threshold = 0.2
//! trigger_once = false
//!
//! [parallax]
//! distance = 150.0
//!
//! [text]
//! word_delay_ms = 80.0
//! ```
//!
//! Every section and field is optional; anything missing takes its default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use unveil_animation::{Easing, SpringConfig, Transition, DEFAULT_MAX_FRAME_DT_MS};
use unveil_core::{ConfigurationError, Result};

use crate::parallax::{ParallaxAxis, ParallaxOptions};
use crate::text::TextRevealOptions;
use crate::viewport::ObserveOptions;

// =============================================================================
// Sections
// =============================================================================

/// Visibility and variant defaults for reveals
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RevealConfig {
    pub threshold: f32,
    pub trigger_once: bool,
    /// Viewport margin in pixels
    pub margin: f32,
    /// Variant used when a reveal names an unknown one
    pub fallback_variant: String,
    /// Treat unknown variant names as errors instead of falling back
    pub strict_variants: bool,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            trigger_once: true,
            margin: 0.0,
            fallback_variant: "fadeUp".to_string(),
            strict_variants: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ParallaxConfig {
    /// Pixels of travel at full progress and unit speed
    pub distance: f32,
    pub axis: ParallaxAxis,
    pub spring: SpringConfig,
}

impl Default for ParallaxConfig {
    fn default() -> Self {
        Self {
            distance: 100.0,
            axis: ParallaxAxis::Vertical,
            spring: SpringConfig::parallax(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CounterConfig {
    pub easing: Easing,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            easing: Easing::EaseOutExpo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TextConfig {
    pub word_delay_ms: f32,
    pub rise_px: f32,
    pub transition: Transition,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            word_delay_ms: 100.0,
            rise_px: 20.0,
            transition: Transition::timed(500.0, Easing::SMOOTH_OUT),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Longest frame delta fed to animations, so a backgrounded tab does not
    /// skip whole transitions
    pub max_frame_dt_ms: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_frame_dt_ms: DEFAULT_MAX_FRAME_DT_MS,
        }
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub reveal: RevealConfig,
    pub parallax: ParallaxConfig,
    pub counter: CounterConfig,
    pub text: TextConfig,
    pub scheduler: SchedulerConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| ConfigurationError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigurationError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigurationError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.observe_defaults().validate()?;
        if !self.reveal.strict_variants && self.reveal.fallback_variant.is_empty() {
            return Err(ConfigurationError::InvalidConfig(
                "fallback variant name is empty".to_string(),
            ));
        }
        self.parallax_defaults().validate()?;
        self.text_defaults().validate()?;
        let max_dt = self.scheduler.max_frame_dt_ms;
        if !max_dt.is_finite() || max_dt <= 0.0 {
            return Err(ConfigurationError::InvalidConfig(format!(
                "max_frame_dt_ms must be positive (got {max_dt})"
            )));
        }
        Ok(())
    }

    pub fn observe_defaults(&self) -> ObserveOptions {
        ObserveOptions::new(self.reveal.threshold, self.reveal.trigger_once)
            .with_margin(self.reveal.margin)
    }

    /// Parallax defaults; the speed factor is supplied per element
    pub fn parallax_defaults(&self) -> ParallaxOptions {
        ParallaxOptions {
            distance: self.parallax.distance,
            axis: self.parallax.axis,
            spring: self.parallax.spring,
            ..ParallaxOptions::default()
        }
    }

    pub fn text_defaults(&self) -> TextRevealOptions {
        TextRevealOptions {
            word_delay_ms: self.text.word_delay_ms,
            transition: self.text.transition,
            rise_px: self.text.rise_px,
            trigger: None,
        }
    }
}
