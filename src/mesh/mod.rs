//! The winged-edge navigation mesh: points, directed edges and boundaries
//! stored in flat vectors and cross-referenced by index.

mod boundary;
mod builder;
mod edge;
pub mod format;

use std::collections::HashSet;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use boundary::{Boundary, GeometryEdge, Intersection, PresenterId};
pub use builder::MeshBuilder;
pub use edge::{DirectedEdge, Edge, EdgeFlags, NavMask, NavPermissions};
pub use format::{BoundaryRecord, EdgeRecord, MeshData};

use crate::config::NavConfig;
use crate::error::{MeshError, NavError};
use crate::math::{newell_normal, plane_distance, plane_through};
use crate::trigger::{TriggerAxis, TriggerZone, ZoneId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoundaryId(pub usize);

/// Serialized indices are 16-bit with `0xFFFF` meaning "none".
pub(crate) const MAX_INDEX: usize = 0xFFFE;

// ============================================================================
// Mesh
// ============================================================================

#[derive(Clone, Debug)]
pub struct Mesh {
    origin: Vec3,
    zones: Vec<TriggerZone>,
    points: Vec<Vec3>,
    edges: Vec<DirectedEdge>,
    boundaries: Vec<Boundary>,
}

fn check_index(
    section: &'static str,
    kind: &'static str,
    index: usize,
    count: usize,
) -> Result<(), MeshError> {
    if index < count {
        Ok(())
    } else {
        Err(MeshError::IndexOutOfRange {
            section,
            kind,
            index,
            count,
        })
    }
}

fn check_size(kind: &'static str, count: usize) -> Result<(), MeshError> {
    if count > MAX_INDEX {
        Err(MeshError::TooLarge { kind, count })
    } else {
        Ok(())
    }
}

impl Mesh {
    /// Validates raw records and builds the connected mesh.
    ///
    /// `origin` is added to every point. Edge links, directions, face and
    /// edge planes, and bounding spheres are all derived here.
    pub fn build(data: MeshData, origin: Vec3, config: &NavConfig) -> Result<Self, MeshError> {
        let MeshData {
            zones,
            points,
            edges: edge_records,
            boundaries: boundary_records,
        } = data;

        check_size("zones", zones.len())?;
        check_size("points", points.len())?;
        check_size("edges", edge_records.len())?;
        check_size("boundaries", boundary_records.len())?;

        let points: Vec<Vec3> = points.into_iter().map(|p| p + origin).collect();

        // 1. Directed edges
        let mut edges = Vec::with_capacity(edge_records.len());
        for (i, record) in edge_records.iter().enumerate() {
            check_index("edge", "point", record.point_a, points.len())?;
            check_index("edge", "point", record.point_b, points.len())?;
            for face in [record.face_a, record.face_b].into_iter().flatten() {
                check_index("edge", "boundary", face, boundary_records.len())?;
            }

            let a = points[record.point_a];
            let b = points[record.point_b];
            if record.point_a == record.point_b || a.distance_squared(b) <= f32::EPSILON {
                return Err(MeshError::DegenerateEdge(i));
            }
            match (record.face_a, record.face_b) {
                (None, None) => return Err(MeshError::DetachedEdge(i)),
                (Some(fa), Some(fb)) if fa == fb => {
                    return Err(MeshError::FaceMismatch {
                        boundary: fa,
                        edge: i,
                    })
                }
                _ => {}
            }

            let edge = Edge::new(
                EdgeId(i),
                PointId(record.point_a),
                PointId(record.point_b),
                record.face_a.map(BoundaryId),
                record.face_b.map(BoundaryId),
            );
            edges.push(DirectedEdge::new(edge, record.flags, a, b));
        }

        // 2. Boundaries: winding, links, geometry
        let mut names = HashSet::new();
        let mut boundaries = Vec::with_capacity(boundary_records.len());
        for (bi, record) in boundary_records.into_iter().enumerate() {
            let id = BoundaryId(bi);
            if !names.insert(record.name.to_ascii_lowercase()) {
                return Err(MeshError::DuplicateBoundaryName(record.name));
            }
            let n = record.edges.len();
            if n < 3 {
                return Err(MeshError::NotEnoughEdges(bi));
            }
            let mismatch = |edge: usize| MeshError::FaceMismatch { boundary: bi, edge };
            for &e in &record.edges {
                check_index("boundary", "edge", e, edges.len())?;
                if !edges[e].borders(id) {
                    return Err(mismatch(e));
                }
            }

            let mut vertices = Vec::with_capacity(n);
            for k in 0..n {
                let (cur, next) = (record.edges[k], record.edges[(k + 1) % n]);
                let end = edges[cur].cw_vertex(id).map_err(|_| mismatch(cur))?;
                let start = edges[next].ccw_vertex(id).map_err(|_| mismatch(next))?;
                if end != start {
                    return Err(MeshError::BrokenWinding {
                        boundary: bi,
                        edge: cur,
                        next,
                    });
                }
                vertices.push(edges[cur].ccw_position(id).map_err(|_| mismatch(cur))?);
            }

            for k in 0..n {
                let ccw = EdgeId(record.edges[(k + 1) % n]);
                let cw = EdgeId(record.edges[(k + n - 1) % n]);
                let e = record.edges[k];
                edges[e]
                    .edge_mut()
                    .link(id, ccw, cw)
                    .map_err(|_| mismatch(e))?;
            }

            let geometry = build_geometry(bi, record, vertices, origin, zones.len(), config)?;
            boundaries.push(Boundary::new(geometry));
        }

        // 3. Every face an edge names must list that edge.
        for (i, edge) in edges.iter().enumerate() {
            for face in [edge.face_a(), edge.face_b()].into_iter().flatten() {
                if !edge.is_linked(face) {
                    return Err(MeshError::FaceMismatch {
                        boundary: face.0,
                        edge: i,
                    });
                }
            }
        }

        debug!(
            zones = zones.len(),
            points = points.len(),
            edges = edges.len(),
            boundaries = boundaries.len(),
            "navigation mesh validated"
        );

        Ok(Self {
            origin,
            zones,
            points,
            edges,
            boundaries,
        })
    }

    /// Raw records describing this mesh, with the origin offset removed.
    pub fn to_data(&self) -> MeshData {
        MeshData {
            zones: self.zones.clone(),
            points: self.points.iter().map(|&p| p - self.origin).collect(),
            edges: self
                .edges
                .iter()
                .map(|e| EdgeRecord {
                    flags: e.flags(),
                    point_a: e.point_a().0,
                    point_b: e.point_b().0,
                    face_a: e.face_a().map(|f| f.0),
                    face_b: e.face_b().map(|f| f.0),
                })
                .collect(),
            boundaries: self
                .boundaries
                .iter()
                .map(|b| BoundaryRecord {
                    name: b.name().to_string(),
                    enabled: b.is_enabled(),
                    edges: b.edges().iter().map(|e| e.0).collect(),
                    triggers: b.triggers().to_vec(),
                    trigger_axis: b.trigger_axis().map(|axis| TriggerAxis {
                        direction: axis.direction,
                        offset: axis.offset - axis.direction.dot(self.origin),
                    }),
                })
                .collect(),
        }
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn zones(&self) -> &[TriggerZone] {
        &self.zones
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn edges(&self) -> &[DirectedEdge] {
        &self.edges
    }

    pub fn boundaries(&self) -> &[Boundary] {
        &self.boundaries
    }

    pub fn edge(&self, id: EdgeId) -> Option<&DirectedEdge> {
        self.edges.get(id.0)
    }

    pub fn boundary(&self, id: BoundaryId) -> Option<&Boundary> {
        self.boundaries.get(id.0)
    }

    pub(crate) fn boundary_mut(&mut self, id: BoundaryId) -> Option<&mut Boundary> {
        self.boundaries.get_mut(id.0)
    }

    /// Case-insensitive linear search by boundary name.
    pub fn boundary_by_name(&self, name: &str) -> Option<BoundaryId> {
        self.boundaries
            .iter()
            .position(|b| b.name().eq_ignore_ascii_case(name))
            .map(BoundaryId)
    }

    pub fn zone_by_name(&self, name: &str) -> Option<ZoneId> {
        self.zones
            .iter()
            .position(|z| z.name.eq_ignore_ascii_case(name))
            .map(ZoneId)
    }

    /// Returns `false` if the edge does not exist.
    pub fn set_edge_enabled(&mut self, id: EdgeId, enabled: bool) -> bool {
        match self.edges.get_mut(id.0) {
            Some(edge) => {
                edge.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    /// Returns `false` if the boundary does not exist.
    pub fn set_boundary_enabled(&mut self, id: BoundaryId, enabled: bool) -> bool {
        match self.boundaries.get_mut(id.0) {
            Some(boundary) => {
                boundary.set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    /// First boundary containing `point`, trying `preferred` boundaries
    /// before the rest in index order. A point on a shared edge therefore
    /// always resolves to the same boundary.
    pub fn locate(
        &self,
        point: Vec3,
        preferred: impl IntoIterator<Item = BoundaryId>,
        config: &NavConfig,
    ) -> Option<BoundaryId> {
        let inside = |id: &BoundaryId| {
            self.boundary(*id).map_or(false, |b| {
                b.contains_point(point, config.inside_tolerance, config.planarity_tolerance)
            })
        };
        preferred
            .into_iter()
            .find(inside)
            .or_else(|| (0..self.boundaries.len()).map(BoundaryId).find(inside))
    }

    /// Hands an actor across `edge` into the neighbouring boundary.
    ///
    /// On entry `progress` is the actor's position along `edge` measured
    /// from its counterclockwise-first vertex in `boundary`. On success all
    /// three are rewritten: `boundary` becomes the neighbour, `edge` the exit
    /// edge the actor should head for next (the one best aligned with
    /// `heading`), and `progress` the fraction along that exit edge to aim
    /// for. The entry fraction is carried over unchanged, so an actor that
    /// crossed a third of the way along one edge heads for a third of the
    /// way along the next. A neighbour with no other exit sends the actor
    /// back toward the entry edge, with `progress` mirrored to name the
    /// same crossing point seen from the neighbour.
    ///
    /// On failure nothing is modified.
    pub fn switch_boundary(
        &self,
        nav: NavPermissions,
        heading: Vec3,
        boundary: &mut BoundaryId,
        edge: &mut EdgeId,
        progress: &mut f32,
    ) -> Result<(), NavError> {
        let entry = self.edge(*edge).ok_or(NavError::NoTransition(*edge))?;
        if !entry.permits_exit(*boundary, nav) {
            return Err(NavError::NoTransition(*edge));
        }
        let next = entry
            .other_face(*boundary)?
            .ok_or(NavError::NoTransition(*edge))?;
        let next_boundary = &self.boundaries[next.0];
        if !next_boundary.is_enabled() {
            return Err(NavError::NoTransition(*edge));
        }

        // Same physical point, seen from the other side of the edge.
        let entry_progress = 1.0 - progress.clamp(0.0, 1.0);
        let entry_point = entry.point_at(next, entry_progress)?;
        let heading = heading.normalize_or_zero();

        let mut best: Option<(f32, EdgeId)> = None;
        let mut walk = entry.counterclockwise_edge(next)?;
        for _ in 0..next_boundary.edges().len() {
            if walk == *edge {
                break;
            }
            let candidate = &self.edges[walk.0];
            if self.can_leave_through(candidate, next, nav) {
                let toward = (candidate.midpoint() - entry_point).normalize_or_zero();
                let score = toward.dot(heading);
                if best.map_or(true, |(s, _)| score > s + 1e-6) {
                    best = Some((score, walk));
                }
            }
            walk = candidate.counterclockwise_edge(next)?;
        }

        debug!(from = boundary.0, to = next.0, edge = edge.0, "switching boundary");
        *boundary = next;
        match best {
            Some((_, exit)) => {
                *edge = exit;
                *progress = progress.clamp(0.0, 1.0);
            }
            None => *progress = entry_progress,
        }
        Ok(())
    }

    /// Outward unit normal of `edge` as seen from `boundary`: the direction
    /// an actor leaving through it travels.
    pub fn exit_normal(&self, boundary: BoundaryId, edge: EdgeId) -> Result<Vec3, NavError> {
        let not_bordered = NavError::FaceNotBordered { edge, boundary };
        let face = self.boundary(boundary).ok_or(not_bordered.clone())?;
        face.edge_position(edge)
            .and_then(|slot| face.outward_normal(slot))
            .ok_or(not_bordered)
    }

    /// Exit check used by routing and boundary switches: the edge must be
    /// passable from `face` and lead into an enabled boundary.
    pub(crate) fn can_leave_through(
        &self,
        edge: &DirectedEdge,
        face: BoundaryId,
        nav: NavPermissions,
    ) -> bool {
        edge.permits_exit(face, nav)
            && matches!(
                edge.other_face(face),
                Ok(Some(other)) if self.boundaries[other.0].is_enabled()
            )
    }
}

fn build_geometry(
    index: usize,
    record: BoundaryRecord,
    vertices: Vec<Vec3>,
    origin: Vec3,
    zone_count: usize,
    config: &NavConfig,
) -> Result<GeometryEdge, MeshError> {
    let n = vertices.len();
    let normal = newell_normal(&vertices);
    if normal.length() <= 1e-6 {
        return Err(MeshError::DegenerateBoundary(index));
    }
    let normal = normal.normalize();
    let center = vertices.iter().copied().sum::<Vec3>() / n as f32;
    let plane = plane_through(normal, center);

    if vertices
        .iter()
        .any(|&v| plane_distance(plane, v).abs() > config.planarity_tolerance)
    {
        return Err(MeshError::NonPlanarBoundary(index));
    }

    let mut edge_planes = Vec::with_capacity(n);
    for k in 0..n {
        let a = vertices[k];
        let b = vertices[(k + 1) % n];
        let inward = normal.cross(b - a).normalize_or_zero();
        if inward == Vec3::ZERO {
            return Err(MeshError::DegenerateBoundary(index));
        }
        edge_planes.push(plane_through(inward, a));
    }

    let convex = edge_planes.iter().all(|&p| {
        vertices
            .iter()
            .all(|&v| plane_distance(p, v) >= -config.planarity_tolerance)
    });
    if !convex {
        return Err(MeshError::ConcaveBoundary(index));
    }

    let radius_sq = vertices
        .iter()
        .map(|v| v.distance_squared(center))
        .fold(0.0, f32::max);

    for trigger in &record.triggers {
        check_index("boundary", "trigger zone", trigger.zone.0, zone_count)?;
    }
    let trigger_axis = if record.triggers.is_empty() {
        None
    } else {
        let axis = record
            .trigger_axis
            .ok_or(MeshError::DegenerateTriggerAxis(index))?;
        let len = axis.direction.length();
        if len <= 1e-6 {
            return Err(MeshError::DegenerateTriggerAxis(index));
        }
        // Offsets are stored relative to the mesh origin.
        let direction = axis.direction / len;
        Some(TriggerAxis {
            direction,
            offset: axis.offset / len + direction.dot(origin),
        })
    };

    Ok(GeometryEdge {
        name: record.name,
        enabled: record.enabled,
        edges: record.edges.into_iter().map(EdgeId).collect(),
        vertices,
        plane,
        edge_planes,
        center,
        radius_sq,
        triggers: record.triggers,
        trigger_axis,
    })
}
