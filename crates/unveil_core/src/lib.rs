//! Unveil Core
//!
//! Foundational types shared by the Unveil animation crates:
//!
//! - **Geometry**: viewport-relative `Rect` math, including intersection ratios
//! - **Element handles**: opaque `ElementHandle`s for host-owned nodes
//! - **Host measurement**: the `ElementMeasure` trait the host implements
//! - **Errors**: `ConfigurationError` and `DetachedHandleWarning`
//!
//! # Example
//!
//! ```rust
//! use unveil_core::{DocumentLayout, ElementHandle, ElementMeasure, Rect};
//!
//! let hero = ElementHandle::new(1);
//! let mut doc = DocumentLayout::new();
//! doc.insert(hero, Rect::new(0.0, 900.0, 400.0, 200.0));
//! doc.scroll_by(0.0, 500.0);
//!
//! let viewport = Rect::new(0.0, 0.0, 800.0, 600.0);
//! let ratio = doc.bounds(hero).unwrap().intersection_ratio(&viewport);
//! assert!((ratio - 1.0).abs() < 1e-6);
//! ```

pub mod element;
pub mod error;
pub mod geometry;

pub use element::{DocumentLayout, ElementHandle, ElementMeasure};
pub use error::{ConfigurationError, DetachedHandleWarning, Result};
pub use geometry::{Point, Rect, Size};
