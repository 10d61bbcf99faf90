use glam::{Mat4, Vec3};

use crate::error::NavError;

/// Shortest arc an actor will animate along.
const MIN_ARC_LENGTH: f32 = 1e-4;
const MIN_VECTOR_LENGTH: f32 = 1e-6;

/// A cubic Bezier segment with its arc length cached.
#[derive(Clone, Debug, PartialEq)]
pub struct Curve {
    points: [Vec3; 4],
    arc_length: f32,
}

impl Curve {
    /// Fails with [`NavError::DegenerateCurve`] when the arc is too short to
    /// animate along, e.g. all four control points coincide.
    pub fn new(points: [Vec3; 4], samples: u32) -> Result<Self, NavError> {
        let mut curve = Self {
            points,
            arc_length: 0.0,
        };
        curve.arc_length = curve.measure(samples.max(1));
        if curve.arc_length < MIN_ARC_LENGTH || !curve.arc_length.is_finite() {
            return Err(NavError::DegenerateCurve);
        }
        Ok(curve)
    }

    /// Builds the segment leaving `start` along `start_dir` and arriving at
    /// `end` along `end_dir`. Handles are a third of the chord, but never
    /// shorter than `min_handle` so that a turn-around still has room.
    pub fn hermite(
        start: Vec3,
        start_dir: Vec3,
        end: Vec3,
        end_dir: Vec3,
        min_handle: f32,
        samples: u32,
    ) -> Result<Self, NavError> {
        let handle = (start.distance(end) / 3.0).max(min_handle);
        Self::new(
            [
                start,
                start + start_dir.normalize_or_zero() * handle,
                end - end_dir.normalize_or_zero() * handle,
                end,
            ],
            samples,
        )
    }

    fn measure(&self, samples: u32) -> f32 {
        let mut length = 0.0;
        let mut prev = self.points[0];
        for i in 1..=samples {
            let next = self.position(i as f32 / samples as f32);
            length += prev.distance(next);
            prev = next;
        }
        length
    }

    pub fn points(&self) -> [Vec3; 4] {
        self.points
    }

    pub fn start(&self) -> Vec3 {
        self.points[0]
    }

    pub fn end(&self) -> Vec3 {
        self.points[3]
    }

    pub fn arc_length(&self) -> f32 {
        self.arc_length
    }

    pub fn position(&self, t: f32) -> Vec3 {
        let [p0, p1, p2, p3] = self.points;
        let u = 1.0 - t;
        p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t)
    }

    /// First derivative; not normalized.
    pub fn tangent(&self, t: f32) -> Vec3 {
        let [p0, p1, p2, p3] = self.points;
        let u = 1.0 - t;
        (p1 - p0) * (3.0 * u * u) + (p2 - p1) * (6.0 * u * t) + (p3 - p2) * (3.0 * t * t)
    }

    /// Direction of travel when arriving at the end of the segment.
    pub fn end_direction(&self) -> Vec3 {
        let arrival = self.tangent(1.0);
        if arrival.length() > MIN_VECTOR_LENGTH {
            arrival.normalize()
        } else {
            (self.points[3] - self.points[0]).normalize_or_zero()
        }
    }

    /// Local frame at `t`: X right, Y up, Z along the direction of travel,
    /// translated to the curve position.
    ///
    /// Where a handle collapses onto its endpoint the tangent vanishes, and
    /// the chord stands in for it.
    pub fn frame(&self, t: f32, up: Vec3) -> Result<Mat4, NavError> {
        let mut forward = self.tangent(t);
        if forward.length() <= MIN_VECTOR_LENGTH {
            forward = self.end() - self.start();
        }
        orient(self.position(t), forward, up)
    }
}

/// Orthonormal frame facing `forward` with `up` as the reference vertical.
///
/// Fails when either vector cannot be normalized or when they are parallel.
pub fn orient(position: Vec3, forward: Vec3, up: Vec3) -> Result<Mat4, NavError> {
    if forward.length() <= MIN_VECTOR_LENGTH || up.length() <= MIN_VECTOR_LENGTH {
        return Err(NavError::DegenerateFrame);
    }
    let forward = forward.normalize();
    let right = up.normalize().cross(forward);
    if right.length() <= MIN_VECTOR_LENGTH {
        return Err(NavError::DegenerateFrame);
    }
    let right = right.normalize();
    let up = forward.cross(right);

    Ok(Mat4::from_cols(
        right.extend(0.0),
        up.extend(0.0),
        forward.extend(0.0),
        position.extend(1.0),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coincident_points_are_degenerate() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(Curve::new([p; 4], 16), Err(NavError::DegenerateCurve));
    }

    #[test]
    fn straight_curve_measures_its_chord() {
        let curve = Curve::hermite(Vec3::ZERO, Vec3::Z, Vec3::new(0.0, 0.0, 9.0), Vec3::Z, 0.0, 16)
            .unwrap();
        assert!((curve.arc_length() - 9.0).abs() < 1e-3);
        assert!((curve.position(0.5) - Vec3::new(0.0, 0.0, 4.5)).length() < 1e-4);
    }

    #[test]
    fn frame_faces_direction_of_travel() {
        let curve = Curve::hermite(Vec3::ZERO, Vec3::X, Vec3::new(6.0, 0.0, 0.0), Vec3::X, 0.0, 8)
            .unwrap();
        let frame = curve.frame(0.5, Vec3::Y).unwrap();
        assert!((frame.z_axis.truncate() - Vec3::X).length() < 1e-5);
        assert!((frame.y_axis.truncate() - Vec3::Y).length() < 1e-5);
        assert!((frame.w_axis.truncate() - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn vertical_travel_cannot_be_oriented_against_up() {
        assert_eq!(
            orient(Vec3::ZERO, Vec3::Y, Vec3::Y),
            Err(NavError::DegenerateFrame)
        );
        assert_eq!(
            orient(Vec3::ZERO, Vec3::ZERO, Vec3::Y),
            Err(NavError::DegenerateFrame)
        );
    }

    #[test]
    fn turn_around_has_length_when_endpoints_meet() {
        let p = Vec3::new(5.0, 0.0, 5.0);
        let curve = Curve::hermite(p, Vec3::X, p, -Vec3::X, 2.0, 16).unwrap();
        assert!(curve.arc_length() > 1.0);
    }
}
