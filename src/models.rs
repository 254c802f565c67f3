use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// True when `other` is at most `radius` pixels away on each axis.
    pub fn is_near(self, other: Position, radius: i32) -> bool {
        (self.x as i64 - other.x as i64).abs() <= radius as i64
            && (self.y as i64 - other.y as i64).abs() <= radius as i64
    }

    pub fn offset(self, d: Displacement) -> Self {
        Self {
            x: self.x.saturating_add(d.dx),
            y: self.y.saturating_add(d.dy),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Displacement {
    pub dx: i32,
    pub dy: i32,
}

impl Displacement {
    /// True when both axes stay within `magnitude` pixels.
    pub fn within(&self, magnitude: i32) -> bool {
        self.dx.abs() <= magnitude && self.dy.abs() <= magnitude
    }
}

impl fmt::Display for Displacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:+}, {:+})", self.dx, self.dy)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
}

impl RunState {
    pub fn label(self) -> &'static str {
        match self {
            RunState::Stopped => "STOPPED",
            RunState::Running => "RUNNING",
        }
    }
}
