//! Arena geometry shared by the client simulator and the server referee

use crate::BLOCK_SIZE;
use serde::{Deserialize, Serialize};

/// A position in arena units. `y` grows downward.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn manhattan_distance(&self, other: &Point) -> f32 {
        (other.x - self.x).abs() + (other.y - self.y).abs()
    }

    /// Moves `distance` units toward `target` along each axis that differs.
    ///
    /// Body points are always axis-aligned with their neighbours, so in
    /// practice only one axis ever moves.
    pub fn step_towards(&self, target: &Point, distance: f32) -> Point {
        Point {
            x: self.x + distance * axis_sign(target.x - self.x),
            y: self.y + distance * axis_sign(target.y - self.y),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

// f32::signum maps 0.0 to 1.0, which would drag the tail off its axis.
fn axis_sign(delta: f32) -> f32 {
    if delta > 0.0 {
        1.0
    } else if delta < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Axis-aligned rectangle stored by its minimum corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// A `BLOCK_SIZE` square centered on `center`
    pub fn block(center: Point) -> Self {
        Self {
            x: center.x - BLOCK_SIZE / 2.0,
            y: center.y - BLOCK_SIZE / 2.0,
            width: BLOCK_SIZE,
            height: BLOCK_SIZE,
        }
    }

    /// Minimal box covering the segment `a -> b`, padded by one block on the
    /// axis the segment does not extend along.
    pub fn around_segment(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x) - BLOCK_SIZE / 2.0,
            y: a.y.min(b.y) - BLOCK_SIZE / 2.0,
            width: (b.x - a.x).abs() + BLOCK_SIZE,
            height: (b.y - a.y).abs() + BLOCK_SIZE,
        }
    }

    /// Closed overlap test: rectangles sharing only an edge still overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x <= other.x + other.width
            && self.x + self.width >= other.x
            && self.y <= other.y + other.height
            && self.y + self.height >= other.y
    }
}

/// Heading of a snake's head
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Unit displacement in arena coordinates
    pub fn unit(self) -> (f32, f32) {
        match self {
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
        }
    }

    /// Parses the lowercase wire/CLI name; unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Direction> {
        match name {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        }
    }
}
