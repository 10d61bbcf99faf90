use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Tuning for one navigation world.
///
/// Every controller carries its own copy, so two worlds can run with
/// different tolerances side by side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Ratio agreement used by the point-on-edge containment test.
    pub containment_tolerance: f32,
    /// How far outside an edge's half-plane a point may sit and still count
    /// as inside the boundary.
    pub inside_tolerance: f32,
    /// Maximum out-of-plane distance accepted when validating or locating
    /// points on a boundary.
    pub planarity_tolerance: f32,
    /// Boundary switches allowed within one advance before the actor is
    /// clamped at the next crossing.
    pub max_boundary_switches: u32,
    /// Units per second.
    pub default_max_speed: f32,
    pub default_collision_radius: f32,
    pub default_rebound_offset: f32,
    /// Speed multiplier applied after an actor-actor collision.
    pub default_damping: f32,
    /// Chords used to approximate curve arc length.
    pub arc_length_samples: u32,
    pub up: Vec3,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            containment_tolerance: 0.001,
            inside_tolerance: 0.001,
            planarity_tolerance: 0.01,
            max_boundary_switches: 2,
            default_max_speed: 10.0,
            default_collision_radius: 0.5,
            default_rebound_offset: 0.25,
            default_damping: 0.5,
            arc_length_samples: 16,
            up: Vec3::Y,
        }
    }
}

impl NavConfig {
    /// Parses a JSON object; missing fields fall back to the defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = NavConfig::from_json(r#"{ "max_boundary_switches": 4 }"#).unwrap();
        assert_eq!(config.max_boundary_switches, 4);
        assert_eq!(config.containment_tolerance, 0.001);
        assert_eq!(config.up, Vec3::Y);
    }
}
