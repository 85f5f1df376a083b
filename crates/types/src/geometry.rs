use serde::{Deserialize, Serialize};

/// Placement of a component on its canvas, in template pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: i32,
    /// Clockwise rotation in degrees around the component center.
    #[serde(default)]
    pub rotation: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn zero() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0.0 { 0.0 } else { self.width / self.height }
    }
}

/// Absolute box of a visual node in canvas space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frame {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
}

impl Frame {
    pub fn new(position: Position, size: Size) -> Self {
        Self {
            x: position.x,
            y: position.y,
            width: size.width,
            height: size.height,
            rotation: position.rotation,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Axis-aligned bounds after rotation, as `(min_x, min_y, max_x, max_y)`.
    pub fn rotated_bounds(&self) -> (f32, f32, f32, f32) {
        if self.rotation == 0.0 {
            return (self.x, self.y, self.x + self.width, self.y + self.height);
        }
        let (cx, cy) = self.center();
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let corners = [
            (-self.width / 2.0, -self.height / 2.0),
            (self.width / 2.0, -self.height / 2.0),
            (self.width / 2.0, self.height / 2.0),
            (-self.width / 2.0, self.height / 2.0),
        ];
        let mut bounds = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        for (dx, dy) in corners {
            let x = cx + dx * cos - dy * sin;
            let y = cy + dx * sin + dy * cos;
            bounds.0 = bounds.0.min(x);
            bounds.1 = bounds.1.min(y);
            bounds.2 = bounds.2.max(x);
            bounds.3 = bounds.3.max(y);
        }
        bounds
    }
}
