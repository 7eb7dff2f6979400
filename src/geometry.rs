//! Tower Geometry
//!
//! 2D points and the axis-aligned boxes the tower reserves for each
//! toolchange. Everything is `f32`, matching the precision of the
//! emitted coordinates.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A point (or offset) in the XY plane of the print bed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, other: Point) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl Mul<f32> for Point {
    type Output = Point;

    fn mul(self, scalar: f32) -> Point {
        Point::new(self.x * scalar, self.y * scalar)
    }
}

/// Rectangular region of the tower, kept as its four named corners
///
/// `ld`/`lu` are left-down/left-up, `rd`/`ru` right-down/right-up.
/// The corners are stored separately (instead of min/max) because the
/// toolchange finish pass swaps the top and bottom pairs to mirror its
/// path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoxCoordinates {
    pub ld: Point,
    pub lu: Point,
    pub rd: Point,
    pub ru: Point,
}

impl BoxCoordinates {
    pub fn new(left: f32, bottom: f32, width: f32, height: f32) -> Self {
        Self {
            ld: Point::new(left, bottom),
            lu: Point::new(left, bottom + height),
            rd: Point::new(left + width, bottom),
            ru: Point::new(left + width, bottom + height),
        }
    }

    pub fn from_pos(pos: Point, width: f32, height: f32) -> Self {
        Self::new(pos.x, pos.y, width, height)
    }

    pub fn translate(&mut self, shift: Point) {
        self.ld += shift;
        self.lu += shift;
        self.rd += shift;
        self.ru += shift;
    }

    /// Grow the box by `offset` on every side (shrink when negative)
    pub fn expand(&mut self, offset: f32) {
        self.ld += Point::new(-offset, -offset);
        self.lu += Point::new(-offset, offset);
        self.rd += Point::new(offset, -offset);
        self.ru += Point::new(offset, offset);
    }

    /// Exchange the top and bottom corner pairs
    pub fn swap_vertical(&mut self) {
        std::mem::swap(&mut self.lu, &mut self.ld);
        std::mem::swap(&mut self.ru, &mut self.rd);
    }

    pub fn width(&self) -> f32 {
        self.rd.x - self.ld.x
    }

    pub fn height(&self) -> f32 {
        self.lu.y - self.ld.y
    }
}
