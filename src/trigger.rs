use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::actor::ActorId;
use crate::mesh::BoundaryId;

/// Index into a controller's trigger-zone table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(pub usize);

/// A scripted trigger object: handlers are registered against its name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerZone {
    pub name: String,
    pub flags: u32,
}

/// A threshold on one boundary's trigger axis, bound to a zone.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathTrigger {
    pub zone: ZoneId,
    /// Opaque value handed to the zone's handler.
    pub data: u32,
    pub distance: f32,
}

/// The axis a boundary measures trigger distances along:
/// `direction · p - offset`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerAxis {
    pub direction: Vec3,
    pub offset: f32,
}

impl TriggerAxis {
    pub fn distance(&self, point: Vec3) -> f32 {
        self.direction.dot(point) - self.offset
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerDirection {
    /// The scalar position rose past the threshold.
    Entering,
    /// The scalar position fell back to or below the threshold.
    Leaving,
}

impl PathTrigger {
    /// Strict before/after comparison: a point sitting exactly on the
    /// threshold counts as "below", so resting there never fires twice.
    pub fn crossing(&self, before: f32, after: f32) -> Option<TriggerDirection> {
        match (before > self.distance, after > self.distance) {
            (false, true) => Some(TriggerDirection::Entering),
            (true, false) => Some(TriggerDirection::Leaving),
            _ => None,
        }
    }
}

/// Everything a handler learns about one trigger firing.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggerEvent<'a> {
    pub actor: ActorId,
    pub boundary: BoundaryId,
    pub zone: ZoneId,
    pub zone_name: &'a str,
    pub namespace: &'a str,
    pub data: u32,
    pub direction: TriggerDirection,
}

/// Scripted reaction to an actor crossing a trigger threshold.
///
/// Handlers run inside `PathController::tickle` and never see the
/// controller, so they cannot add or remove actors mid-tick.
pub trait TriggerHandler {
    fn handle_trigger(&mut self, event: &TriggerEvent<'_>);
}

impl<F: FnMut(&TriggerEvent<'_>)> TriggerHandler for F {
    fn handle_trigger(&mut self, event: &TriggerEvent<'_>) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger(distance: f32) -> PathTrigger {
        PathTrigger {
            zone: ZoneId(0),
            data: 0,
            distance,
        }
    }

    #[test]
    fn rising_past_threshold_is_entering() {
        assert_eq!(trigger(5.0).crossing(3.0, 7.0), Some(TriggerDirection::Entering));
        assert_eq!(trigger(5.0).crossing(7.0, 3.0), Some(TriggerDirection::Leaving));
    }

    #[test]
    fn resting_on_threshold_does_not_fire() {
        let t = trigger(5.0);
        assert_eq!(t.crossing(3.0, 5.0), None);
        assert_eq!(t.crossing(5.0, 5.0), None);
        assert_eq!(t.crossing(5.0, 7.0), Some(TriggerDirection::Entering));
    }
}
