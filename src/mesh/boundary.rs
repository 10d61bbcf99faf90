use std::collections::BTreeSet;
use std::ops::Deref;

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::edge::DirectedEdge;
use super::{BoundaryId, EdgeId};
use crate::actor::ActorId;
use crate::error::NavError;
use crate::math::plane_distance;
use crate::trigger::{PathTrigger, TriggerAxis, TriggerDirection};

/// Opaque handle for an animation presenter bound to one or more boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PresenterId(pub u32);

// ============================================================================
// GeometryEdge: the immutable face geometry
// ============================================================================

/// Geometry of one boundary, computed once when the mesh is validated.
///
/// Only `enabled` changes afterwards.
#[derive(Clone, Debug)]
pub struct GeometryEdge {
    pub(super) name: String,
    pub(super) enabled: bool,
    /// Edges in counterclockwise order around `plane`'s normal.
    pub(super) edges: Vec<EdgeId>,
    /// `vertices[i]` is where `edges[i]` starts in counterclockwise order.
    pub(super) vertices: Vec<Vec3>,
    pub(super) plane: Vec4,
    /// One inward-facing plane per edge, perpendicular to the face.
    pub(super) edge_planes: Vec<Vec4>,
    pub(super) center: Vec3,
    pub(super) radius_sq: f32,
    pub(super) triggers: Vec<PathTrigger>,
    pub(super) trigger_axis: Option<TriggerAxis>,
}

impl GeometryEdge {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn normal(&self) -> Vec3 {
        self.plane.truncate()
    }

    pub fn plane(&self) -> Vec4 {
        self.plane
    }

    pub fn edge_planes(&self) -> &[Vec4] {
        &self.edge_planes
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius_sq(&self) -> f32 {
        self.radius_sq
    }

    pub fn triggers(&self) -> &[PathTrigger] {
        &self.triggers
    }

    pub fn trigger_axis(&self) -> Option<TriggerAxis> {
        self.trigger_axis
    }

    /// Position of `edge` within this boundary's loop.
    pub fn edge_position(&self, edge: EdgeId) -> Option<usize> {
        self.edges.iter().position(|&e| e == edge)
    }

    /// Outward-facing unit normal of the edge at `position`, in the face plane.
    pub fn outward_normal(&self, position: usize) -> Option<Vec3> {
        self.edge_planes.get(position).map(|p| -p.truncate())
    }

    /// Inside test: within `plane_tolerance` of the face plane and no more
    /// than `tolerance` outside any edge.
    pub fn contains_point(&self, point: Vec3, tolerance: f32, plane_tolerance: f32) -> bool {
        let reach = self.radius_sq.sqrt() + tolerance.max(plane_tolerance);
        if point.distance_squared(self.center) > reach * reach {
            return false;
        }
        plane_distance(self.plane, point).abs() <= plane_tolerance
            && self
                .edge_planes
                .iter()
                .all(|&p| plane_distance(p, point) >= -tolerance)
    }
}

// ============================================================================
// Intersect
// ============================================================================

/// Where a movement segment first leaves a boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Intersection {
    /// The segment stays inside (or only runs along an edge).
    None,
    /// The segment leaves through the interior of `edge`.
    Crossing { point: Vec3, edge: EdgeId },
    /// The segment leaves at, or within tolerance of, a corner of `edge`.
    Corner { point: Vec3, edge: EdgeId },
}

impl Intersection {
    /// Classification code: 0 none, 1 interior crossing, 2 corner.
    pub fn code(&self) -> u8 {
        match self {
            Intersection::None => 0,
            Intersection::Crossing { .. } => 1,
            Intersection::Corner { .. } => 2,
        }
    }

    pub fn hit(&self) -> Option<(Vec3, EdgeId)> {
        match *self {
            Intersection::None => None,
            Intersection::Crossing { point, edge } | Intersection::Corner { point, edge } => {
                Some((point, edge))
            }
        }
    }
}

// ============================================================================
// Boundary
// ============================================================================

/// One face of the navigation mesh, plus the actors and presenters
/// currently associated with it.
#[derive(Clone, Debug)]
pub struct Boundary {
    geometry: GeometryEdge,
    actors: BTreeSet<ActorId>,
    presenters: BTreeSet<PresenterId>,
}

impl Deref for Boundary {
    type Target = GeometryEdge;

    fn deref(&self) -> &GeometryEdge {
        &self.geometry
    }
}

impl Boundary {
    pub(super) fn new(geometry: GeometryEdge) -> Self {
        Self {
            geometry,
            actors: BTreeSet::new(),
            presenters: BTreeSet::new(),
        }
    }

    pub(super) fn set_enabled(&mut self, enabled: bool) {
        self.geometry.enabled = enabled;
    }

    pub fn actors(&self) -> impl ExactSizeIterator<Item = ActorId> + '_ {
        self.actors.iter().copied()
    }

    pub fn has_actor(&self, actor: ActorId) -> bool {
        self.actors.contains(&actor)
    }

    /// Membership only; the controller keeps the actor's back-reference in
    /// step.
    pub(crate) fn add_actor(&mut self, id: BoundaryId, actor: ActorId) -> Result<(), NavError> {
        if self.actors.insert(actor) {
            Ok(())
        } else {
            Err(NavError::ActorAlreadyPresent(actor, id))
        }
    }

    pub(crate) fn remove_actor(&mut self, id: BoundaryId, actor: ActorId) -> Result<(), NavError> {
        if self.actors.remove(&actor) {
            Ok(())
        } else {
            Err(NavError::ActorNotPresent(actor, id))
        }
    }

    pub fn presenters(&self) -> impl ExactSizeIterator<Item = PresenterId> + '_ {
        self.presenters.iter().copied()
    }

    pub fn has_presenter(&self, presenter: PresenterId) -> bool {
        self.presenters.contains(&presenter)
    }

    /// Returns `false` if the presenter was already attached.
    pub fn add_presenter(&mut self, presenter: PresenterId) -> bool {
        self.presenters.insert(presenter)
    }

    /// `None` detaches every presenter. Returns how many were removed.
    pub fn remove_presenter(&mut self, presenter: Option<PresenterId>) -> usize {
        match presenter {
            Some(p) => usize::from(self.presenters.remove(&p)),
            None => {
                let count = self.presenters.len();
                self.presenters.clear();
                count
            }
        }
    }

    /// Finds where the movement `start → end` first leaves this boundary.
    ///
    /// Only edges the start point is inside of (within `tolerance`) and the
    /// end point is strictly outside of are candidates; a segment running
    /// along an edge line therefore never crosses it. The earliest exit
    /// wins, and exact ties keep the first edge in winding order.
    pub fn intersect(
        &self,
        edges: &[DirectedEdge],
        start: Vec3,
        end: Vec3,
        tolerance: f32,
    ) -> Intersection {
        let delta = end - start;
        let mut best: Option<(f32, usize)> = None;

        for (i, &plane) in self.geometry.edge_planes.iter().enumerate() {
            let s0 = plane_distance(plane, start);
            let s1 = plane_distance(plane, end);
            if s1 >= -tolerance || s0 < -tolerance {
                continue;
            }
            let t = (s0 / (s0 - s1)).clamp(0.0, 1.0);
            if best.map_or(true, |(best_t, _)| t < best_t) {
                best = Some((t, i));
            }
        }

        let Some((t, i)) = best else {
            return Intersection::None;
        };

        let point = start + delta * t;
        let edge = self.geometry.edges[i];
        let directed = &edges[edge.0];
        let a = self.geometry.vertices[i];
        let b = self.geometry.vertices[(i + 1) % self.geometry.vertices.len()];
        let span = b - a;
        let u = (point - a).dot(span) / span.length_squared().max(f32::EPSILON);

        if u <= tolerance || u >= 1.0 - tolerance || !directed.contains_point(point, tolerance) {
            Intersection::Corner { point, edge }
        } else {
            Intersection::Crossing { point, edge }
        }
    }

    /// Triggers crossed by the movement `from → to`, in registration order.
    pub fn crossed_triggers(&self, from: Vec3, to: Vec3) -> Vec<(PathTrigger, TriggerDirection)> {
        let Some(axis) = self.geometry.trigger_axis else {
            return Vec::new();
        };
        let before = axis.distance(from);
        let after = axis.distance(to);

        self.geometry
            .triggers
            .iter()
            .filter_map(|t| t.crossing(before, after).map(|dir| (*t, dir)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;
    use crate::config::NavConfig;
    use crate::mesh::{Mesh, MeshBuilder};

    fn room() -> Mesh {
        let mut builder = MeshBuilder::new();
        let bell = builder.zone("bell", 0);
        let gong = builder.zone("gong", 0);
        builder.boundary(
            "room",
            &[
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 10.0),
                Vec3::new(10.0, 0.0, 10.0),
                Vec3::new(10.0, 0.0, 0.0),
            ],
        );
        builder.set_trigger_axis(0, Vec3::X, 0.0);
        builder.add_trigger(0, gong, 1, 7.0);
        builder.add_trigger(0, bell, 2, 3.0);
        Mesh::build(builder.build(), Vec3::ZERO, &NavConfig::default()).unwrap()
    }

    #[test]
    fn intersect_classifies_exits() {
        let mesh = room();
        let face = &mesh.boundaries()[0];
        let hit = |from: Vec3, to: Vec3| face.intersect(mesh.edges(), from, to, 0.001);

        let through = hit(Vec3::new(5.0, 0.0, 5.0), Vec3::new(15.0, 0.0, 5.0));
        assert_eq!(through.code(), 1);
        let (point, edge) = through.hit().unwrap();
        assert!((point - Vec3::new(10.0, 0.0, 5.0)).length() < 1e-5);
        assert_eq!(edge, face.edges()[2]);

        let corner = hit(Vec3::new(5.0, 0.0, 5.0), Vec3::new(15.0, 0.0, 15.0));
        assert_eq!(corner.code(), 2);
        assert_eq!(corner.hit().unwrap().1, face.edges()[1]);

        let inside = hit(Vec3::new(2.0, 0.0, 2.0), Vec3::new(8.0, 0.0, 8.0));
        assert_eq!(inside, Intersection::None);
        let along = hit(Vec3::new(10.0, 0.0, 1.0), Vec3::new(10.0, 0.0, 9.0));
        assert_eq!(along.code(), 0);
    }

    #[test]
    fn triggers_fire_in_registration_order() {
        let mesh = room();
        let face = &mesh.boundaries()[0];
        let fired = face.crossed_triggers(Vec3::new(1.0, 0.0, 5.0), Vec3::new(9.0, 0.0, 5.0));
        let data: Vec<u32> = fired.iter().map(|(t, _)| t.data).collect();
        assert_eq!(data, vec![1, 2]);
        assert!(fired.iter().all(|(_, d)| *d == TriggerDirection::Entering));

        let back = face.crossed_triggers(Vec3::new(9.0, 0.0, 5.0), Vec3::new(5.0, 0.0, 5.0));
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].0.data, 1);
        assert_eq!(back[0].1, TriggerDirection::Leaving);
    }

    #[test]
    fn membership_rejects_double_add_and_missing_remove() {
        let mut mesh = room();
        let mut keys: SlotMap<ActorId, ()> = SlotMap::with_key();
        let actor = keys.insert(());
        let id = BoundaryId(0);
        let face = mesh.boundary_mut(id).unwrap();

        face.add_actor(id, actor).unwrap();
        assert_eq!(face.add_actor(id, actor), Err(NavError::ActorAlreadyPresent(actor, id)));
        assert_eq!(face.actors().len(), 1);
        face.remove_actor(id, actor).unwrap();
        assert_eq!(face.remove_actor(id, actor), Err(NavError::ActorNotPresent(actor, id)));
        assert_eq!(face.actors().len(), 0);
    }

    #[test]
    fn removing_no_presenter_detaches_all() {
        let mut mesh = room();
        let face = mesh.boundary_mut(BoundaryId(0)).unwrap();
        assert!(face.add_presenter(PresenterId(1)));
        assert!(face.add_presenter(PresenterId(2)));
        assert!(!face.add_presenter(PresenterId(2)));
        assert_eq!(face.remove_presenter(Some(PresenterId(5))), 0);
        assert_eq!(face.remove_presenter(None), 2);
        assert_eq!(face.presenters().len(), 0);
    }

    #[test]
    fn contains_point_is_edge_inclusive() {
        let mesh = room();
        let face = &mesh.boundaries()[0];
        assert!(face.contains_point(Vec3::new(10.0, 0.0, 10.0), 0.001, 0.01));
        assert!(face.contains_point(Vec3::new(5.0, 0.0, 0.0), 0.001, 0.01));
        assert!(!face.contains_point(Vec3::new(5.0, 0.0, -0.1), 0.001, 0.01));
        assert!(!face.contains_point(Vec3::new(5.0, 1.0, 5.0), 0.001, 0.01));
    }
}
