//! Actor-actor contact tests. Actors are spheres; the mover sweeps its
//! sphere along the frame's movement segment.

use glam::Vec3;

use crate::actor::ActorId;

/// Another actor the mover may bump into this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Obstacle {
    pub id: ActorId,
    pub position: Vec3,
    pub radius: f32,
}

/// First contact along a movement segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    pub other: ActorId,
    /// Fraction of the segment travelled before touching.
    pub t: f32,
    /// The mover's center at the moment of contact.
    pub point: Vec3,
}

/// Earliest parameter in `[0, 1]` at which a point moving from `start` to
/// `end` comes within `radius` of `center`.
///
/// Returns `None` when the path never gets that close, or when it starts
/// inside the sphere and is already moving away.
pub fn sweep_sphere(start: Vec3, end: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let delta = end - start;
    let offset = start - center;
    let c = offset.length_squared() - radius * radius;

    if c <= 0.0 {
        // Already touching: only a hit if we are closing the distance.
        return if delta.dot(offset) < 0.0 { Some(0.0) } else { None };
    }

    let a = delta.length_squared();
    if a <= f32::EPSILON {
        return None;
    }
    let b = 2.0 * delta.dot(offset);
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }

    let t = (-b - discriminant.sqrt()) / (2.0 * a);
    (0.0..=1.0).contains(&t).then_some(t)
}

/// Sweeps a sphere of `radius` from `from` to `to` against every obstacle
/// and returns the earliest contact. Ties keep the obstacle listed first.
pub fn first_contact(from: Vec3, to: Vec3, radius: f32, obstacles: &[Obstacle]) -> Option<Contact> {
    let mut best: Option<Contact> = None;
    for obstacle in obstacles {
        let Some(t) = sweep_sphere(from, to, obstacle.position, radius + obstacle.radius) else {
            continue;
        };
        if best.map_or(true, |b| t < b.t) {
            best = Some(Contact {
                other: obstacle.id,
                t,
                point: from.lerp(to, t),
            });
        }
    }
    best
}

/// Where the mover settles after a contact: backed off from `contact` by
/// `offset` against the direction it was travelling.
pub fn rebound_point(from: Vec3, to: Vec3, contact: Vec3, offset: f32) -> Vec3 {
    let heading = (to - from).normalize_or_zero();
    contact - heading * offset
}
