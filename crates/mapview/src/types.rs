use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};

use serde::{Deserialize, Serialize};

pub type Rgba = [u8; 4];

pub const COLOR_BLACK: Rgba = [0, 0, 0, 255];

/// Integer screen/buffer coordinate in pixels (or tiles, depending on context).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Scales both components and truncates toward zero.
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            x: (self.x as f32 * factor) as i32,
            y: (self.y as f32 * factor) as i32,
        }
    }

    pub fn is_zero(self) -> bool {
        self.x == 0 && self.y == 0
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Point {
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<i32> for Point {
    type Output = Point;

    fn mul(self, rhs: i32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<i32> for Point {
    type Output = Point;

    fn div(self, rhs: i32) -> Point {
        Point::new(self.x / rhs, self.y / rhs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub const fn square(side: i32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }

    pub fn area(self) -> i32 {
        self.width * self.height
    }

    pub fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn to_point(self) -> Point {
        Point::new(self.width, self.height)
    }

    /// Fits `self` inside `bounds` keeping the aspect ratio of `self`.
    pub fn scaled_to_fit(self, bounds: Size) -> Size {
        if self.width == 0 || self.height == 0 {
            return bounds;
        }
        let width_for_bounds_height = (bounds.height * self.width) / self.height;
        if width_for_bounds_height <= bounds.width {
            Size::new(width_for_bounds_height, bounds.height)
        } else {
            Size::new(bounds.width, (bounds.width * self.height) / self.width)
        }
    }
}

impl Add for Size {
    type Output = Size;

    fn add(self, rhs: Size) -> Size {
        Size::new(self.width + rhs.width, self.height + rhs.height)
    }
}

impl Sub for Size {
    type Output = Size;

    fn sub(self, rhs: Size) -> Size {
        Size::new(self.width - rhs.width, self.height - rhs.height)
    }
}

impl Mul<i32> for Size {
    type Output = Size;

    fn mul(self, rhs: i32) -> Size {
        Size::new(self.width * rhs, self.height * rhs)
    }
}

impl Div<i32> for Size {
    type Output = Size;

    fn div(self, rhs: i32) -> Size {
        Size::new(self.width / rhs, self.height / rhs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_point_size(top_left: Point, size: Size) -> Self {
        Self::new(top_left.x, top_left.y, size.width, size.height)
    }

    pub fn top_left(self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn is_empty(self) -> bool {
        self.size().is_empty()
    }

    pub fn contains(self, point: Point) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x < self.x + self.width
            && point.y < self.y + self.height
    }
}

/// Tile margins around a center position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AwareRange {
    pub left: u16,
    pub right: u16,
    pub top: u16,
    pub bottom: u16,
}

impl Default for AwareRange {
    fn default() -> Self {
        Self {
            left: 8,
            right: 9,
            top: 6,
            bottom: 7,
        }
    }
}

impl AwareRange {
    pub fn horizontal(self) -> i32 {
        i32::from(self.left) + i32::from(self.right) + 1
    }

    pub fn vertical(self) -> i32 {
        i32::from(self.top) + i32::from(self.bottom) + 1
    }
}

/// `color` is an 8-bit palette index (6x6x6 cube).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Light {
    pub intensity: u8,
    pub color: u8,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            intensity: 0,
            color: 215,
        }
    }
}

impl Light {
    pub fn rgba(self, alpha: u8) -> Rgba {
        let c = self.color;
        [(c / 36) % 6 * 51, (c / 6) % 6 * 51, c % 6 * 51, alpha]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_aspect_fit_prefers_height_when_it_fits() {
        let visible = Size::new(480, 352);
        assert_eq!(Size::new(480, 352).scaled_to_fit(visible), visible);
        assert_eq!(Size::new(960, 704).scaled_to_fit(visible), visible);
        assert_eq!(Size::new(960, 352).scaled_to_fit(visible), Size::new(480, 176));
        assert_eq!(Size::new(100, 352).scaled_to_fit(visible), Size::new(100, 352));
    }

    #[test]
    fn point_scaling_truncates_toward_zero() {
        assert_eq!(Point::new(5, -5).scaled(0.5), Point::new(2, -2));
        assert_eq!(Point::new(32, 32).scaled(1.5), Point::new(48, 48));
    }

    #[test]
    fn aware_range_spans_include_center_tile() {
        let range = AwareRange::default();
        assert_eq!(range.horizontal(), 18);
        assert_eq!(range.vertical(), 14);
    }

    #[test]
    fn light_palette_maps_to_rgb_cube() {
        let white = Light {
            intensity: 255,
            color: 215,
        };
        assert_eq!(white.rgba(255), [255, 255, 255, 255]);
        let black = Light {
            intensity: 0,
            color: 0,
        };
        assert_eq!(black.rgba(10), [0, 0, 0, 10]);
    }
}
