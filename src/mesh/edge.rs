use std::ops::Deref;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{BoundaryId, EdgeId, PointId};
use crate::error::NavError;

// ============================================================================
// Permissions
// ============================================================================

/// Face-side permission bits. Bit 0 covers leaving face A, bit 1 leaving
/// face B.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NavMask(pub u8);

impl NavMask {
    pub const NONE: NavMask = NavMask(0x00);
    pub const FACE_A: NavMask = NavMask(0x01);
    pub const FACE_B: NavMask = NavMask(0x02);
    pub const ALL: NavMask = NavMask(0x03);

    pub fn intersects(self, other: NavMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for NavMask {
    fn default() -> Self {
        NavMask::ALL
    }
}

/// What a moving actor (or a route request) is allowed to pass through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct NavPermissions {
    pub mask: NavMask,
    /// User-driven actors may also use edges reserved for them.
    pub user_nav: bool,
}

/// Per-edge navigation flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeFlags {
    pub enabled: bool,
    pub exit_from_a: bool,
    pub exit_from_b: bool,
    pub user_only: bool,
}

impl EdgeFlags {
    const EXIT_A: u8 = 0x01;
    const EXIT_B: u8 = 0x02;
    const USER_ONLY: u8 = 0x04;
    const DISABLED: u8 = 0x80;

    pub fn from_bits(bits: u8) -> Self {
        Self {
            enabled: bits & Self::DISABLED == 0,
            exit_from_a: bits & Self::EXIT_A != 0,
            exit_from_b: bits & Self::EXIT_B != 0,
            user_only: bits & Self::USER_ONLY != 0,
        }
    }

    pub fn to_bits(self) -> u8 {
        let mut bits = 0;
        if !self.enabled {
            bits |= Self::DISABLED;
        }
        if self.exit_from_a {
            bits |= Self::EXIT_A;
        }
        if self.exit_from_b {
            bits |= Self::EXIT_B;
        }
        if self.user_only {
            bits |= Self::USER_ONLY;
        }
        bits
    }

    /// The two face-side permission bits.
    pub fn mask(self) -> NavMask {
        NavMask(self.to_bits() & NavMask::ALL.0)
    }
}

impl Default for EdgeFlags {
    fn default() -> Self {
        Self {
            enabled: true,
            exit_from_a: true,
            exit_from_b: true,
            user_only: false,
        }
    }
}

// ============================================================================
// Edge: winged-edge connectivity
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    A,
    B,
}

/// An undirected connection between two mesh points, bordered by up to two
/// boundaries.
///
/// Face A is the boundary that walks the edge from `point_a` to `point_b`
/// in counterclockwise order; face B walks it the other way.
#[derive(Clone, Debug)]
pub struct Edge {
    id: EdgeId,
    point_a: PointId,
    point_b: PointId,
    face_a: Option<BoundaryId>,
    face_b: Option<BoundaryId>,
    ccw_a: Option<EdgeId>,
    cw_a: Option<EdgeId>,
    ccw_b: Option<EdgeId>,
    cw_b: Option<EdgeId>,
}

impl Edge {
    pub(crate) fn new(
        id: EdgeId,
        point_a: PointId,
        point_b: PointId,
        face_a: Option<BoundaryId>,
        face_b: Option<BoundaryId>,
    ) -> Self {
        Self {
            id,
            point_a,
            point_b,
            face_a,
            face_b,
            ccw_a: None,
            cw_a: None,
            ccw_b: None,
            cw_b: None,
        }
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn point_a(&self) -> PointId {
        self.point_a
    }

    pub fn point_b(&self) -> PointId {
        self.point_b
    }

    pub fn face_a(&self) -> Option<BoundaryId> {
        self.face_a
    }

    pub fn face_b(&self) -> Option<BoundaryId> {
        self.face_b
    }

    /// An edge with a single face lies on the outer rim of the mesh.
    pub fn is_border(&self) -> bool {
        self.face_a.is_none() || self.face_b.is_none()
    }

    pub fn borders(&self, face: BoundaryId) -> bool {
        self.side(face).is_ok()
    }

    fn side(&self, face: BoundaryId) -> Result<Side, NavError> {
        if self.face_a == Some(face) {
            Ok(Side::A)
        } else if self.face_b == Some(face) {
            Ok(Side::B)
        } else {
            Err(self.not_bordered(face))
        }
    }

    fn not_bordered(&self, face: BoundaryId) -> NavError {
        NavError::FaceNotBordered {
            edge: self.id,
            boundary: face,
        }
    }

    /// Next edge when walking clockwise around `face`.
    pub fn clockwise_edge(&self, face: BoundaryId) -> Result<EdgeId, NavError> {
        let link = match self.side(face)? {
            Side::A => self.cw_a,
            Side::B => self.cw_b,
        };
        link.ok_or_else(|| self.not_bordered(face))
    }

    /// Next edge when walking counterclockwise around `face`.
    pub fn counterclockwise_edge(&self, face: BoundaryId) -> Result<EdgeId, NavError> {
        let link = match self.side(face)? {
            Side::A => self.ccw_a,
            Side::B => self.ccw_b,
        };
        link.ok_or_else(|| self.not_bordered(face))
    }

    /// The endpoint reached first when walking clockwise around `face`.
    pub fn cw_vertex(&self, face: BoundaryId) -> Result<PointId, NavError> {
        Ok(match self.side(face)? {
            Side::A => self.point_b,
            Side::B => self.point_a,
        })
    }

    /// The endpoint reached first when walking counterclockwise around `face`.
    pub fn ccw_vertex(&self, face: BoundaryId) -> Result<PointId, NavError> {
        Ok(match self.side(face)? {
            Side::A => self.point_a,
            Side::B => self.point_b,
        })
    }

    /// The boundary on the far side of this edge from `known`; `None` for a
    /// rim edge.
    pub fn other_face(&self, known: BoundaryId) -> Result<Option<BoundaryId>, NavError> {
        Ok(match self.side(known)? {
            Side::A => self.face_b,
            Side::B => self.face_a,
        })
    }

    pub(crate) fn link(
        &mut self,
        face: BoundaryId,
        ccw: EdgeId,
        cw: EdgeId,
    ) -> Result<(), NavError> {
        match self.side(face)? {
            Side::A => {
                self.ccw_a = Some(ccw);
                self.cw_a = Some(cw);
            }
            Side::B => {
                self.ccw_b = Some(ccw);
                self.cw_b = Some(cw);
            }
        }
        Ok(())
    }

    pub(crate) fn is_linked(&self, face: BoundaryId) -> bool {
        match self.side(face) {
            Ok(Side::A) => self.ccw_a.is_some(),
            Ok(Side::B) => self.ccw_b.is_some(),
            Err(_) => false,
        }
    }
}

// ============================================================================
// DirectedEdge: geometry and permissions on top of connectivity
// ============================================================================

/// An [`Edge`] with its endpoint positions and direction captured at load
/// time, plus the navigation flags gameplay toggles at runtime.
#[derive(Clone, Debug)]
pub struct DirectedEdge {
    edge: Edge,
    flags: EdgeFlags,
    a: Vec3,
    b: Vec3,
    direction: Vec3,
}

impl Deref for DirectedEdge {
    type Target = Edge;

    fn deref(&self) -> &Edge {
        &self.edge
    }
}

impl DirectedEdge {
    pub(crate) fn new(edge: Edge, flags: EdgeFlags, a: Vec3, b: Vec3) -> Self {
        Self {
            edge,
            flags,
            a,
            b,
            direction: b - a,
        }
    }

    pub(crate) fn edge_mut(&mut self) -> &mut Edge {
        &mut self.edge
    }

    pub fn flags(&self) -> EdgeFlags {
        self.flags
    }

    pub fn is_enabled(&self) -> bool {
        self.flags.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.flags.enabled = enabled;
    }

    pub fn mask(&self) -> NavMask {
        self.flags.mask()
    }

    /// `b - a`, as captured at load.
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn position_a(&self) -> Vec3 {
        self.a
    }

    pub fn position_b(&self) -> Vec3 {
        self.b
    }

    pub fn length(&self) -> f32 {
        self.direction.length()
    }

    pub fn midpoint(&self) -> Vec3 {
        (self.a + self.b) * 0.5
    }

    pub fn distance_to_midpoint(&self, point: Vec3) -> f32 {
        self.midpoint().distance(point)
    }

    pub fn distance_between_midpoints(&self, other: &DirectedEdge) -> f32 {
        self.midpoint().distance(other.midpoint())
    }

    /// Whether an actor standing in `face` may leave through this edge.
    ///
    /// The enabled flag gates the edge outright; the face-side bit must be
    /// set and also allowed by the requester's mask.
    pub fn permits_exit(&self, face: BoundaryId, nav: NavPermissions) -> bool {
        if !self.flags.enabled || (self.flags.user_only && !nav.user_nav) {
            return false;
        }
        let side_bit = match self.edge.side(face) {
            Ok(Side::A) if self.flags.exit_from_a => NavMask::FACE_A,
            Ok(Side::B) if self.flags.exit_from_b => NavMask::FACE_B,
            _ => return false,
        };
        side_bit.intersects(nav.mask)
    }

    /// Point-on-segment test.
    ///
    /// Each axis with a usable direction component yields a ratio along the
    /// edge; all ratios must fall in `[0, 1]` and agree within `tolerance`.
    /// Axes where the edge does not move must instead match point A's
    /// coordinate within `tolerance`.
    pub fn contains_point(&self, point: Vec3, tolerance: f32) -> bool {
        let offset = point - self.a;
        let mut ratio: Option<f32> = None;

        for axis in 0..3 {
            let d = self.direction[axis];
            if d > tolerance || d < -tolerance {
                let r = offset[axis] / d;
                if !(0.0..=1.0).contains(&r) {
                    return false;
                }
                match ratio {
                    Some(first) if r > first + tolerance || r < first - tolerance => return false,
                    Some(_) => {}
                    None => ratio = Some(r),
                }
            } else if offset[axis] > tolerance || offset[axis] < -tolerance {
                return false;
            }
        }

        true
    }

    fn ccw_span(&self, face: BoundaryId) -> Result<(Vec3, Vec3), NavError> {
        Ok(match self.edge.side(face)? {
            Side::A => (self.a, self.b),
            Side::B => (self.b, self.a),
        })
    }

    pub fn ccw_position(&self, face: BoundaryId) -> Result<Vec3, NavError> {
        Ok(self.ccw_span(face)?.0)
    }

    pub fn cw_position(&self, face: BoundaryId) -> Result<Vec3, NavError> {
        Ok(self.ccw_span(face)?.1)
    }

    /// The point `progress` of the way along the edge, measured from its
    /// counterclockwise-first vertex as seen from `face`.
    pub fn point_at(&self, face: BoundaryId, progress: f32) -> Result<Vec3, NavError> {
        let (start, end) = self.ccw_span(face)?;
        Ok(start.lerp(end, progress))
    }

    /// Inverse of [`Self::point_at`]: projects `point` onto the edge and
    /// clamps the result to the segment.
    pub fn progress_of(&self, face: BoundaryId, point: Vec3) -> Result<f32, NavError> {
        let (start, end) = self.ccw_span(face)?;
        let span = end - start;
        let len_sq = span.length_squared();
        if len_sq <= f32::EPSILON {
            return Ok(0.0);
        }
        Ok(((point - start).dot(span) / len_sq).clamp(0.0, 1.0))
    }
}
