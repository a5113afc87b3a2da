//! Element handles and host measurement
//!
//! The engine never touches a renderable node directly. Consumers hand it an
//! opaque [`ElementHandle`] and the host answers bounding-box queries for it
//! through [`ElementMeasure`].

use std::fmt;

use rustc_hash::FxHashMap;

use crate::geometry::{Point, Rect};

/// Opaque handle to a renderable node owned by the host
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(u64);

impl ElementHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// Host primitive: measure an element relative to the current viewport
///
/// Returning `None` means the element no longer exists (unmounted or
/// destroyed). Controllers treat that as a silent detach.
pub trait ElementMeasure {
    fn bounds(&self, element: ElementHandle) -> Option<Rect>;
}

impl<F> ElementMeasure for F
where
    F: Fn(ElementHandle) -> Option<Rect>,
{
    fn bounds(&self, element: ElementHandle) -> Option<Rect> {
        self(element)
    }
}

/// A simple document model: element rects in page space plus a scroll offset
///
/// Useful for hosts that already know their layout, and for driving the
/// engine in tests.
#[derive(Clone, Debug, Default)]
pub struct DocumentLayout {
    rects: FxHashMap<ElementHandle, Rect>,
    scroll: Point,
}

impl DocumentLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place (or move) an element in page space
    pub fn insert(&mut self, element: ElementHandle, rect: Rect) {
        self.rects.insert(element, rect);
    }

    /// Remove an element, as if it were unmounted
    pub fn remove(&mut self, element: ElementHandle) -> Option<Rect> {
        self.rects.remove(&element)
    }

    /// Current scroll offset (page space → viewport space translation)
    pub fn scroll(&self) -> Point {
        self.scroll
    }

    pub fn scroll_to(&mut self, x: f32, y: f32) {
        self.scroll = Point::new(x, y);
    }

    pub fn scroll_by(&mut self, dx: f32, dy: f32) {
        self.scroll = Point::new(self.scroll.x + dx, self.scroll.y + dy);
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}

impl ElementMeasure for DocumentLayout {
    fn bounds(&self, element: ElementHandle) -> Option<Rect> {
        self.rects
            .get(&element)
            .map(|rect| rect.offset(-self.scroll.x, -self.scroll.y))
    }
}
