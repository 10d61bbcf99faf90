use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

// We keep a plain struct at the JS/JSON boundary so the wire shape does not
// depend on how glam chooses to serialize its vectors.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct SimVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SimVector {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_glam(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn from_glam(v: Vec3) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

/// Signed distance of `point` from a plane stored as `(normal, d)`, where
/// points on the plane satisfy `normal · p + d == 0`.
pub fn plane_distance(plane: Vec4, point: Vec3) -> f32 {
    plane.truncate().dot(point) + plane.w
}

/// Builds the plane through `point` with the given (already unit) normal.
pub fn plane_through(normal: Vec3, point: Vec3) -> Vec4 {
    normal.extend(-normal.dot(point))
}

/// Newell's method: a robust (unnormalized) polygon normal whose length is
/// twice the polygon's area. The loop orientation decides the sign.
pub fn newell_normal(points: &[Vec3]) -> Vec3 {
    let mut normal = Vec3::ZERO;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newell_normal_of_unit_square_points_up() {
        let square = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
        ];
        let n = newell_normal(&square);
        assert!((n - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-6);
    }
}
