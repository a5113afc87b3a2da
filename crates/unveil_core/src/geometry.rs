//! Viewport geometry
//!
//! Rectangles are expressed in viewport-relative pixels with `y` growing
//! downward, matching what a host's bounding-box query returns.

/// 2D point
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// 2D size
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// 2D rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        origin: Point::ZERO,
        size: Size::ZERO,
    };

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn x(&self) -> f32 {
        self.origin.x
    }

    pub fn y(&self) -> f32 {
        self.origin.y
    }

    pub fn width(&self) -> f32 {
        self.size.width
    }

    pub fn height(&self) -> f32 {
        self.size.height
    }

    pub fn left(&self) -> f32 {
        self.origin.x
    }

    pub fn top(&self) -> f32 {
        self.origin.y
    }

    pub fn right(&self) -> f32 {
        self.origin.x + self.size.width
    }

    pub fn bottom(&self) -> f32 {
        self.origin.y + self.size.height
    }

    pub fn area(&self) -> f32 {
        self.size.area()
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }

    /// Offset the rect by a delta
    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Rect {
            origin: Point::new(self.origin.x + dx, self.origin.y + dy),
            size: self.size,
        }
    }

    /// Grow the rect by `margin` on every side (negative values shrink it)
    pub fn outset(&self, margin: f32) -> Self {
        Rect {
            origin: Point::new(self.origin.x - margin, self.origin.y - margin),
            size: Size::new(
                (self.size.width + 2.0 * margin).max(0.0),
                (self.size.height + 2.0 * margin).max(0.0),
            ),
        }
    }

    /// Overlapping region of two rects, or `None` when they do not touch.
    ///
    /// Rects sharing only an edge produce a zero-area intersection.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.left().max(other.left());
        let top = self.top().max(other.top());
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right < left || bottom < top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }

    /// Check if this rect overlaps another by a non-empty area
    pub fn intersects(&self, other: &Rect) -> bool {
        self.intersection(other)
            .map(|r| r.width() > 0.0 && r.height() > 0.0)
            .unwrap_or(false)
    }

    /// Fraction of this rect's own area that lies inside `viewport`.
    ///
    /// Degenerate (zero-area) rects report `1.0` when they sit inside the
    /// viewport and `0.0` otherwise.
    pub fn intersection_ratio(&self, viewport: &Rect) -> f32 {
        let area = self.area();
        if area <= f32::EPSILON {
            let inside = self.left() >= viewport.left()
                && self.right() <= viewport.right()
                && self.top() >= viewport.top()
                && self.bottom() <= viewport.bottom();
            return if inside { 1.0 } else { 0.0 };
        }
        match self.intersection(viewport) {
            Some(overlap) => (overlap.area() / area).clamp(0.0, 1.0),
            None => 0.0,
        }
    }

    /// Largest intersection ratio this rect could reach inside `viewport`
    ///
    /// An element taller or wider than the viewport can never be fully
    /// inside it, so thresholds are capped at this value.
    pub fn max_intersection_ratio(&self, viewport: &Rect) -> f32 {
        let fit = |extent: f32, available: f32| {
            if extent <= f32::EPSILON {
                1.0
            } else {
                (available / extent).clamp(0.0, 1.0)
            }
        };
        fit(self.width(), viewport.width()) * fit(self.height(), viewport.height())
    }
}
