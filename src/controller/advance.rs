use glam::Vec3;
use tracing::{debug, warn};

use super::PathController;
use crate::actor::{ActorHit, ActorId, ActorState, Curve, CurveGoal, HitResult};
use crate::error::NavError;
use crate::mesh::{BoundaryId, PresenterId};
use crate::physics::{first_contact, rebound_point, Contact, Obstacle};
use crate::trigger::TriggerEvent;

/// What one advance did to an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Clean,
    /// Stopped short after bumping into another actor.
    Collided,
    /// Not moved: disabled, unplaced, no curve segment, or waiting at an
    /// edge it cannot cross yet.
    Stationary,
}

/// An actor moved onto a boundary during a tick, with the presenters bound
/// to that boundary at the time.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryEntry {
    pub actor: ActorId,
    pub boundary: BoundaryId,
    pub presenters: Vec<PresenterId>,
}

/// Summary of one [`PathController::tickle`] call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub time: f32,
    /// Actors that moved, collided or not.
    pub advanced: usize,
    pub collisions: usize,
    pub entries: Vec<BoundaryEntry>,
    /// Per-actor failures; the actor stayed put for this tick.
    pub failures: Vec<(ActorId, NavError)>,
}

/// The stretch of a movement spent on one boundary, for trigger dispatch.
struct Leg {
    boundary: BoundaryId,
    from: Vec3,
    to: Vec3,
}

impl PathController {
    /// Advances every registered actor to `time`, in registration order.
    ///
    /// Never fails as a whole: an actor that cannot advance is logged,
    /// recorded in the report and left where it was.
    pub fn tickle(&mut self, time: f32) -> TickReport {
        self.time = time;
        let mut report = TickReport {
            time,
            ..TickReport::default()
        };

        for id in self.order.clone() {
            match self.advance_actor(id, time, &mut report.entries) {
                Ok(AdvanceOutcome::Clean) => report.advanced += 1,
                Ok(AdvanceOutcome::Collided) => {
                    report.advanced += 1;
                    report.collisions += 1;
                }
                Ok(AdvanceOutcome::Stationary) => {}
                Err(err) => {
                    warn!(?id, %err, "actor failed to advance");
                    report.failures.push((id, err));
                }
            }
        }

        report
    }

    /// Advances a single actor to `time`.
    pub fn advance(&mut self, id: ActorId, time: f32) -> Result<AdvanceOutcome, NavError> {
        self.time = time;
        let mut entries = Vec::new();
        self.advance_actor(id, time, &mut entries)
    }

    fn advance_actor(
        &mut self,
        id: ActorId,
        time: f32,
        entries: &mut Vec<BoundaryEntry>,
    ) -> Result<AdvanceOutcome, NavError> {
        let actor = self.actors.get(id).ok_or(NavError::UnknownActor(id))?;
        if actor.state != ActorState::Normal {
            return Ok(AdvanceOutcome::Stationary);
        }
        let Some(curve) = actor.curve.clone() else {
            return Ok(AdvanceOutcome::Stationary);
        };
        let start_boundary = actor.boundary.ok_or(NavError::NotPlaced(id))?;

        let t = actor.curve_param(time);
        let from = actor.position;
        let collide = actor.collide;
        let radius = actor.collision_radius;
        let rebound = actor.rebound_offset;
        let nav = actor.permissions();
        // Autonomous actors heading for an edge only cross it on arrival.
        let can_cross = actor.user_nav || actor.curve_goal == CurveGoal::Free;
        let mut edge = actor.target_edge;
        let mut progress = actor.progress;

        let mut frame = curve.frame(t, self.config.up)?;
        let heading = frame.z_axis.truncate();
        let mut to = curve.position(t);

        // 1. Other actors on this boundary
        let mut collided = false;
        if collide {
            if let Some(contact) = self.find_contact(id, start_boundary, from, to, radius) {
                if self.dispatch_hit(id, contact) {
                    to = rebound_point(from, to, contact.point, rebound);
                    collided = true;
                }
            }
        }

        // 2. Edges, switching boundaries up to the configured limit
        let tolerance = self.config.containment_tolerance;
        let mut boundary = start_boundary;
        let mut leg_start = from;
        let mut legs = Vec::new();
        let mut entered = Vec::new();
        let mut switches = 0;
        loop {
            let face = self.mesh.boundary(boundary).ok_or(NavError::NotPlaced(id))?;
            let Some((point, hit_edge)) = face.intersect(self.mesh.edges(), leg_start, to, tolerance).hit()
            else {
                break;
            };

            if can_cross && switches < self.config.max_boundary_switches {
                let mut next = boundary;
                let mut next_edge = hit_edge;
                let mut next_progress = self.mesh.edges()[hit_edge.0].progress_of(boundary, point)?;
                if self
                    .mesh
                    .switch_boundary(nav, heading, &mut next, &mut next_edge, &mut next_progress)
                    .is_ok()
                {
                    legs.push(Leg {
                        boundary,
                        from: leg_start,
                        to: point,
                    });
                    boundary = next;
                    edge = Some(next_edge);
                    progress = next_progress;
                    leg_start = point;
                    switches += 1;
                    entered.push(boundary);
                    continue;
                }
            }

            if collide {
                debug!(?id, edge = hit_edge.0, "clamped at edge");
                to = point;
            }
            break;
        }
        legs.push(Leg {
            boundary,
            from: leg_start,
            to,
        });

        // 3. Triggers, then membership
        for leg in &legs {
            self.fire_triggers(id, leg);
        }
        if boundary != start_boundary {
            self.relocate(id, boundary)?;
        }
        for &b in &entered {
            self.record_entry(id, b, entries);
        }

        // 4. Commit
        frame.w_axis = to.extend(1.0);
        let actor = self.actors.get_mut(id).ok_or(NavError::UnknownActor(id))?;
        actor.target_edge = edge;
        actor.progress = progress;
        actor.position = to;
        actor.direction = heading;
        actor.transform = frame;
        actor.last_time = time;

        if collided {
            actor.world_speed *= actor.damping;
            match Curve::hermite(to, heading, curve.end(), curve.end_direction(), 0.0, actor.arc_samples) {
                Ok(resumed) => actor.start_curve(resumed, actor.curve_goal, time),
                Err(_) => actor.curve = None,
            }
            debug!(?id, speed = actor.world_speed, "actor rebounded");
            return Ok(AdvanceOutcome::Collided);
        }

        if t >= 1.0 {
            let (goal, user_nav) = (actor.curve_goal, actor.user_nav);
            match goal {
                CurveGoal::Free => actor.route = None,
                CurveGoal::TargetEdge if !user_nav => {
                    // Stays on its finished segment and retries next tick.
                    if let Err(err) = self.arrive(id, time, entries) {
                        debug!(?id, %err, "actor waiting at edge");
                        return Ok(AdvanceOutcome::Stationary);
                    }
                }
                CurveGoal::TargetEdge => {}
            }
        }

        Ok(AdvanceOutcome::Clean)
    }

    fn find_contact(
        &self,
        id: ActorId,
        boundary: BoundaryId,
        from: Vec3,
        to: Vec3,
        radius: f32,
    ) -> Option<Contact> {
        let obstacles: Vec<Obstacle> = self
            .mesh
            .boundary(boundary)?
            .actors()
            .filter(|&other| other != id)
            .filter_map(|other| {
                let actor = self.actors.get(other)?;
                (actor.state == ActorState::Normal && actor.collide).then_some(Obstacle {
                    id: other,
                    position: actor.position,
                    radius: actor.collision_radius,
                })
            })
            .collect();
        first_contact(from, to, radius, &obstacles)
    }

    /// Runs both participants' reaction hooks. The contact counts only if
    /// both accept it.
    fn dispatch_hit(&mut self, id: ActorId, contact: Contact) -> bool {
        let struck = ActorHit {
            actor: contact.other,
            other: id,
            point: contact.point,
        };
        let Some(other) = self.actors.get_mut(contact.other) else {
            return false;
        };
        let theirs = other.reaction.hit_actor(&struck, true);

        let striking = ActorHit {
            actor: id,
            other: contact.other,
            point: contact.point,
        };
        let Some(mover) = self.actors.get_mut(id) else {
            return false;
        };
        let ours = mover.reaction.hit_actor(&striking, false);

        let accepted = theirs == HitResult::Success && ours == HitResult::Success;
        debug!(?id, other = ?contact.other, accepted, "actor contact");
        accepted
    }

    fn fire_triggers(&mut self, actor: ActorId, leg: &Leg) {
        let Some(face) = self.mesh.boundary(leg.boundary) else {
            return;
        };
        for (trigger, direction) in face.crossed_triggers(leg.from, leg.to) {
            let zone_name = self
                .mesh
                .zones()
                .get(trigger.zone.0)
                .map_or("", |z| z.name.as_str());
            debug!(?actor, zone = zone_name, ?direction, "trigger crossed");
            if let Some(handler) = self.handlers.get_mut(&trigger.zone) {
                handler.handle_trigger(&TriggerEvent {
                    actor,
                    boundary: leg.boundary,
                    zone: trigger.zone,
                    zone_name,
                    namespace: &self.namespace,
                    data: trigger.data,
                    direction,
                });
            }
        }
    }

    fn record_entry(&self, actor: ActorId, boundary: BoundaryId, entries: &mut Vec<BoundaryEntry>) {
        let presenters = self
            .mesh
            .boundary(boundary)
            .map(|face| face.presenters().collect())
            .unwrap_or_default();
        entries.push(BoundaryEntry {
            actor,
            boundary,
            presenters,
        });
    }

    // ========================================================================
    // Autonomous continuation
    // ========================================================================

    /// An autonomous actor reached its target edge: cross it and start the
    /// next segment at full speed. On failure nothing is modified.
    fn arrive(&mut self, id: ActorId, time: f32, entries: &mut Vec<BoundaryEntry>) -> Result<(), NavError> {
        let routed = self.actors.get(id).map_or(false, |a| a.route.is_some());
        if routed {
            self.follow_route(id, time, entries)
        } else {
            self.continue_across(id, time, entries)
        }
    }

    /// Local navigation: let the neighbour pick the exit best aligned with
    /// the actor's heading.
    fn continue_across(
        &mut self,
        id: ActorId,
        time: f32,
        entries: &mut Vec<BoundaryEntry>,
    ) -> Result<(), NavError> {
        let actor = self.actors.get(id).ok_or(NavError::UnknownActor(id))?;
        let mut boundary = actor.boundary.ok_or(NavError::NotPlaced(id))?;
        let entry = actor.target_edge.ok_or(NavError::NotPlaced(id))?;
        let mut edge = entry;
        let mut progress = actor.progress;
        let (position, heading, samples) = (actor.position, actor.direction, actor.arc_samples);

        self.mesh
            .switch_boundary(actor.permissions(), heading, &mut boundary, &mut edge, &mut progress)?;

        let target = self.mesh.edges()[edge.0].point_at(boundary, progress)?;
        let end_dir = self.mesh.exit_normal(boundary, edge)?;
        let min_handle = if edge == entry {
            // Dead end: turn around inside the boundary.
            self.mesh.boundaries()[boundary.0].radius_sq().sqrt() * 0.5
        } else {
            0.0
        };
        let curve = Curve::hermite(position, heading, target, end_dir, min_handle, samples)?;

        self.relocate(id, boundary)?;
        self.record_entry(id, boundary, entries);
        let actor = self.actors.get_mut(id).ok_or(NavError::UnknownActor(id))?;
        actor.target_edge = Some(edge);
        actor.progress = progress;
        actor.world_speed = actor.max_speed;
        actor.start_curve(curve, CurveGoal::TargetEdge, time);
        Ok(())
    }

    /// Route navigation: cross the step's edge, then head for the next
    /// crossing or, after the last one, the goal.
    fn follow_route(
        &mut self,
        id: ActorId,
        time: f32,
        entries: &mut Vec<BoundaryEntry>,
    ) -> Result<(), NavError> {
        let actor = self.actors.get(id).ok_or(NavError::UnknownActor(id))?;
        let boundary = actor.boundary.ok_or(NavError::NotPlaced(id))?;
        let route = actor.route.as_ref().ok_or(NavError::NoRoute)?;
        let step = *route.steps.front().ok_or(NavError::NoRoute)?;
        if actor.target_edge != Some(step.edge) || step.from != boundary {
            return Err(NavError::NoRoute);
        }
        let crossing = self.mesh.edge(step.edge).ok_or(NavError::NoTransition(step.edge))?;
        if !self.mesh.can_leave_through(crossing, boundary, actor.permissions()) {
            return Err(NavError::NoTransition(step.edge));
        }
        let (position, heading, samples) = (actor.position, actor.direction, actor.arc_samples);

        let (curve, goal, target_edge, progress) = match route.steps.get(1) {
            Some(next) => {
                let end_dir = self.mesh.exit_normal(step.into, next.edge)?;
                let curve = Curve::hermite(position, heading, next.point, end_dir, 0.0, samples)?;
                let progress = self.mesh.edges()[next.edge.0].progress_of(step.into, next.point)?;
                (curve, CurveGoal::TargetEdge, next.edge, progress)
            }
            None => {
                let end_dir = if route.goal_direction.length() > 1e-6 {
                    route.goal_direction
                } else {
                    route.goal - position
                };
                let curve = Curve::hermite(position, heading, route.goal, end_dir, 0.0, samples)?;
                let progress = crossing.progress_of(step.into, position)?;
                (curve, CurveGoal::Free, step.edge, progress)
            }
        };

        self.relocate(id, step.into)?;
        self.record_entry(id, step.into, entries);
        let actor = self.actors.get_mut(id).ok_or(NavError::UnknownActor(id))?;
        if let Some(route) = actor.route.as_mut() {
            route.steps.pop_front();
        }
        actor.target_edge = Some(target_edge);
        actor.progress = progress;
        actor.world_speed = actor.max_speed;
        actor.start_curve(curve, goal, time);
        Ok(())
    }
}
