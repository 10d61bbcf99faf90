//! Moving entities driven by a [`crate::PathController`].

mod curve;

use std::collections::VecDeque;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

pub use curve::{orient, Curve};

use crate::config::NavConfig;
use crate::error::NavError;
use crate::mesh::{BoundaryId, EdgeId, NavMask, NavPermissions, PresenterId};
use crate::pathfinding::RouteStep;

new_key_type! {
    /// Generational handle to an actor registered with a controller.
    pub struct ActorId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorState {
    /// Registered but never placed on a boundary.
    Uninitialized,
    Normal,
    /// Skipped by `tickle` and ignored by other actors' collision checks.
    Disabled,
}

impl ActorState {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            ActorState::Uninitialized => 0,
            ActorState::Normal => 1,
            ActorState::Disabled => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ActorState::Normal,
            2 => ActorState::Disabled,
            _ => ActorState::Uninitialized,
        }
    }
}

// ============================================================================
// Collision reaction hook
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitResult {
    /// Accept the collision; the mover rebounds.
    Success,
    /// Ignore this contact and let the mover pass.
    Failure,
}

/// Describes a contact to one of its two participants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActorHit {
    /// The actor receiving the callback.
    pub actor: ActorId,
    pub other: ActorId,
    pub point: Vec3,
}

/// Game-side reaction to bumping into another actor (sound, animation,
/// score). Implementations only react: boundary and curve state stay owned
/// by the controller.
pub trait CollisionReactive {
    /// `aux_flag` is `true` for the actor that was hit, `false` for the one
    /// that moved into it.
    fn hit_actor(&mut self, _hit: &ActorHit, _aux_flag: bool) -> HitResult {
        HitResult::Success
    }
}

/// The reaction of an actor with no gameplay behaviour attached.
pub struct NoReaction;

impl CollisionReactive for NoReaction {}

impl<F: FnMut(&ActorHit, bool) -> HitResult> CollisionReactive for F {
    fn hit_actor(&mut self, hit: &ActorHit, aux_flag: bool) -> HitResult {
        self(hit, aux_flag)
    }
}

// ============================================================================
// PathActor
// ============================================================================

/// What the end of the current curve segment means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CurveGoal {
    /// Stop when the curve ends.
    Free,
    /// The curve ends on `target_edge`; autonomous actors carry on across it.
    TargetEdge,
}

/// A resolved route an autonomous actor is working through.
#[derive(Clone, Debug)]
pub(crate) struct ActiveRoute {
    pub(crate) steps: VecDeque<RouteStep>,
    pub(crate) goal: Vec3,
    pub(crate) goal_direction: Vec3,
}

pub struct PathActor {
    pub(crate) state: ActorState,
    pub(crate) boundary: Option<BoundaryId>,
    pub(crate) target_edge: Option<EdgeId>,
    /// Position along `target_edge`, measured from its counterclockwise-first
    /// vertex in `boundary`.
    pub(crate) progress: f32,
    pub(crate) curve: Option<Curve>,
    pub(crate) curve_goal: CurveGoal,
    pub(crate) segment_start: f32,
    pub(crate) duration: f32,
    pub(crate) last_time: f32,
    pub(crate) position: Vec3,
    pub(crate) direction: Vec3,
    pub(crate) transform: Mat4,
    pub(crate) user_nav: bool,
    pub(crate) collide: bool,
    pub(crate) nav_mask: NavMask,
    pub(crate) max_speed: f32,
    /// Current speed; lowered by collision damping for the rest of the
    /// rebound segment.
    pub(crate) world_speed: f32,
    pub(crate) collision_radius: f32,
    pub(crate) rebound_offset: f32,
    pub(crate) damping: f32,
    pub(crate) arc_samples: u32,
    pub(crate) presenter: Option<PresenterId>,
    pub(crate) route: Option<ActiveRoute>,
    pub(crate) reaction: Box<dyn CollisionReactive>,
}

impl Default for PathActor {
    fn default() -> Self {
        Self::from_config(&NavConfig::default())
    }
}

impl PathActor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &NavConfig) -> Self {
        Self {
            state: ActorState::Uninitialized,
            boundary: None,
            target_edge: None,
            progress: 0.0,
            curve: None,
            curve_goal: CurveGoal::Free,
            segment_start: 0.0,
            duration: 0.0,
            last_time: 0.0,
            position: Vec3::ZERO,
            direction: Vec3::Z,
            transform: Mat4::IDENTITY,
            user_nav: false,
            collide: true,
            nav_mask: NavMask::ALL,
            max_speed: config.default_max_speed,
            world_speed: config.default_max_speed,
            collision_radius: config.default_collision_radius,
            rebound_offset: config.default_rebound_offset,
            damping: config.default_damping,
            arc_samples: config.arc_length_samples,
            presenter: None,
            route: None,
            reaction: Box::new(NoReaction),
        }
    }

    pub fn with_reaction(mut self, reaction: impl CollisionReactive + 'static) -> Self {
        self.reaction = Box::new(reaction);
        self
    }

    pub fn with_user_nav(mut self, user_nav: bool) -> Self {
        self.user_nav = user_nav;
        self
    }

    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.set_max_speed(max_speed);
        self
    }

    pub fn with_collision_radius(mut self, radius: f32) -> Self {
        self.collision_radius = radius;
        self
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    pub fn state(&self) -> ActorState {
        self.state
    }

    /// Toggles between `Normal` and `Disabled`. An actor that has never been
    /// placed stays `Uninitialized`.
    pub fn set_disabled(&mut self, disabled: bool) {
        self.state = match (self.state, disabled) {
            (ActorState::Uninitialized, _) => ActorState::Uninitialized,
            (_, true) => ActorState::Disabled,
            (_, false) => ActorState::Normal,
        };
    }

    pub fn boundary(&self) -> Option<BoundaryId> {
        self.boundary
    }

    pub fn target_edge(&self) -> Option<EdgeId> {
        self.target_edge
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn last_time(&self) -> f32 {
        self.last_time
    }

    pub fn presenter(&self) -> Option<PresenterId> {
        self.presenter
    }

    /// Crossings left on the active route, if any.
    pub fn route_remaining(&self) -> Option<usize> {
        self.route.as_ref().map(|r| r.steps.len())
    }

    // ------------------------------------------------------------------------
    // Navigation flags and tuning
    // ------------------------------------------------------------------------

    pub fn user_nav(&self) -> bool {
        self.user_nav
    }

    pub fn set_user_nav(&mut self, user_nav: bool) {
        self.user_nav = user_nav;
    }

    /// `false` turns off both wall and actor-actor collision checks.
    pub fn collide(&self) -> bool {
        self.collide
    }

    /// An actor with collision off passes walls it has no exit through.
    /// Its boundary membership is only updated at crossings it is allowed
    /// to make, so once it leaves the mesh its boundary no longer matches
    /// its position.
    pub fn set_collide(&mut self, collide: bool) {
        self.collide = collide;
    }

    pub fn nav_mask(&self) -> NavMask {
        self.nav_mask
    }

    pub fn set_nav_mask(&mut self, mask: NavMask) {
        self.nav_mask = mask;
    }

    pub(crate) fn permissions(&self) -> NavPermissions {
        NavPermissions {
            mask: self.nav_mask,
            user_nav: self.user_nav,
        }
    }

    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }

    pub fn set_max_speed(&mut self, max_speed: f32) {
        self.max_speed = max_speed;
        self.world_speed = max_speed;
    }

    pub fn world_speed(&self) -> f32 {
        self.world_speed
    }

    pub fn collision_radius(&self) -> f32 {
        self.collision_radius
    }

    pub fn set_collision_radius(&mut self, radius: f32) {
        self.collision_radius = radius;
    }

    pub fn rebound_offset(&self) -> f32 {
        self.rebound_offset
    }

    pub fn set_rebound_offset(&mut self, offset: f32) {
        self.rebound_offset = offset;
    }

    pub fn damping(&self) -> f32 {
        self.damping
    }

    pub fn set_damping(&mut self, damping: f32) {
        self.damping = damping;
    }

    // ------------------------------------------------------------------------
    // Curve segment
    // ------------------------------------------------------------------------

    pub fn curve(&self) -> Option<&Curve> {
        self.curve.as_ref()
    }

    /// Seconds the current segment takes at the current speed.
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Replaces the segment the actor interpolates along, starting at
    /// `start_time`. Resets any collision damping and drops an active route.
    ///
    /// A degenerate segment clears the curve, so the actor holds still until
    /// a usable one is set.
    pub fn set_curve_segment(&mut self, points: [Vec3; 4], start_time: f32) -> Result<(), NavError> {
        self.route = None;
        self.world_speed = self.max_speed;
        match Curve::new(points, self.arc_samples) {
            Ok(curve) => {
                self.start_curve(curve, CurveGoal::Free, start_time);
                Ok(())
            }
            Err(err) => {
                self.curve = None;
                Err(err)
            }
        }
    }

    pub(crate) fn start_curve(&mut self, curve: Curve, goal: CurveGoal, start_time: f32) {
        self.duration = if self.world_speed > 0.0 {
            curve.arc_length() / self.world_speed
        } else {
            f32::INFINITY
        };
        self.curve = Some(curve);
        self.curve_goal = goal;
        self.segment_start = start_time;
    }

    /// Normalized position along the current segment at `time`.
    pub(crate) fn curve_param(&self, time: f32) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        if !self.duration.is_finite() {
            return 0.0;
        }
        ((time - self.segment_start) / self.duration).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabling_an_unplaced_actor_keeps_it_uninitialized() {
        let mut actor = PathActor::new();
        actor.set_disabled(true);
        assert_eq!(actor.state(), ActorState::Uninitialized);
    }

    #[test]
    fn degenerate_segment_clears_the_curve() {
        let mut actor = PathActor::new();
        actor
            .set_curve_segment([Vec3::ZERO, Vec3::X, Vec3::X * 2.0, Vec3::X * 3.0], 0.0)
            .unwrap();
        assert!(actor.curve().is_some());

        let p = Vec3::new(4.0, 0.0, 4.0);
        assert_eq!(
            actor.set_curve_segment([p; 4], 1.0),
            Err(NavError::DegenerateCurve)
        );
        assert!(actor.curve().is_none());
    }

    #[test]
    fn duration_follows_speed() {
        let mut actor = PathActor::new().with_max_speed(2.0);
        actor
            .set_curve_segment([Vec3::ZERO, Vec3::X, Vec3::X * 2.0, Vec3::X * 3.0], 10.0)
            .unwrap();
        assert!((actor.duration() - 1.5).abs() < 1e-3);
        assert!((actor.curve_param(10.75) - 0.5).abs() < 1e-3);
        assert_eq!(actor.curve_param(20.0), 1.0);
    }

    #[test]
    fn closures_can_react_to_hits() {
        let mut count = 0;
        {
            let mut reaction = |_: &ActorHit, aux: bool| {
                if aux {
                    count += 1;
                }
                HitResult::Failure
            };
            let hit = ActorHit {
                actor: ActorId::default(),
                other: ActorId::default(),
                point: Vec3::ZERO,
            };
            assert_eq!(reaction.hit_actor(&hit, true), HitResult::Failure);
        }
        assert_eq!(count, 1);
    }
}
