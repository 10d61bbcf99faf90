//! The per-world navigation driver: owns one mesh and every actor moving
//! on it.

mod advance;
mod persistence;

use std::collections::HashMap;

use glam::Vec3;
use slotmap::SlotMap;
use tracing::{debug, info};

pub use advance::{AdvanceOutcome, BoundaryEntry, TickReport};

use crate::actor::{orient, ActiveRoute, ActorId, ActorState, Curve, CurveGoal, PathActor};
use crate::config::NavConfig;
use crate::error::{MeshError, NavError, StorageError};
use crate::locations::LocationTable;
use crate::mesh::{Boundary, BoundaryId, EdgeId, Mesh, MeshData, NavMask, NavPermissions, PresenterId};
use crate::pathfinding::{resolve_route, Route};
use crate::storage::{MemoryStorage, Storage};
use crate::trigger::{TriggerHandler, ZoneId};

/// Owns a navigation mesh and advances the actors registered on it.
///
/// Actors are advanced in registration order. Trigger handlers and
/// collision reactions run synchronously inside [`PathController::tickle`]
/// and have no access to the controller.
pub struct PathController {
    mesh: Mesh,
    namespace: String,
    config: NavConfig,
    actors: SlotMap<ActorId, PathActor>,
    order: Vec<ActorId>,
    handlers: HashMap<ZoneId, Box<dyn TriggerHandler>>,
    locations: LocationTable,
    enabled: bool,
    time: f32,
}

impl PathController {
    // ========================================================================
    // Creation and serialization
    // ========================================================================

    /// Reads a serialized mesh from `storage` and builds a controller for it.
    ///
    /// Every point is offset by `origin`. `namespace` is handed to trigger
    /// handlers so scripts can tell worlds apart.
    pub fn create(
        storage: &mut dyn Storage,
        origin: Vec3,
        namespace: &str,
        config: NavConfig,
    ) -> Result<Self, MeshError> {
        if !storage.is_read_mode() {
            return Err(StorageError::WrongMode("reading").into());
        }
        let data = MeshData::read(storage)?;
        Self::from_data(data, origin, namespace, config)
    }

    pub fn from_bytes(
        bytes: &[u8],
        origin: Vec3,
        namespace: &str,
        config: NavConfig,
    ) -> Result<Self, MeshError> {
        let mut storage = MemoryStorage::reader(bytes.to_vec());
        Self::create(&mut storage, origin, namespace, config)
    }

    pub fn from_data(
        data: MeshData,
        origin: Vec3,
        namespace: &str,
        config: NavConfig,
    ) -> Result<Self, MeshError> {
        let mesh = Mesh::build(data, origin, &config)?;
        info!(
            namespace,
            boundaries = mesh.boundaries().len(),
            edges = mesh.edges().len(),
            zones = mesh.zones().len(),
            "path controller created"
        );
        Ok(Self {
            mesh,
            namespace: namespace.to_string(),
            config,
            actors: SlotMap::with_key(),
            order: Vec::new(),
            handlers: HashMap::new(),
            locations: LocationTable::default(),
            enabled: true,
            time: 0.0,
        })
    }

    /// Writes the mesh back out in the format [`Self::create`] reads.
    pub fn write(&self, storage: &mut dyn Storage) -> Result<(), MeshError> {
        if !storage.is_write_mode() {
            return Err(StorageError::WrongMode("writing").into());
        }
        self.mesh.to_data().write(storage)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MeshError> {
        let mut storage = MemoryStorage::writer();
        self.write(&mut storage)?;
        Ok(storage.into_bytes())
    }

    // ========================================================================
    // World state
    // ========================================================================

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Time of the most recent tick.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Pauses or resumes scheduling. Mesh and actors are untouched.
    pub fn enable(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!(namespace = %self.namespace, enabled, "path controller toggled");
        }
        self.enabled = enabled;
    }

    /// Case-insensitive boundary lookup.
    pub fn boundary_by_name(&self, name: &str) -> Option<BoundaryId> {
        self.mesh.boundary_by_name(name)
    }

    pub fn boundary(&self, id: BoundaryId) -> Option<&Boundary> {
        self.mesh.boundary(id)
    }

    /// Returns `false` if the edge does not exist.
    pub fn set_edge_enabled(&mut self, edge: EdgeId, enabled: bool) -> bool {
        let found = self.mesh.set_edge_enabled(edge, enabled);
        if found {
            info!(edge = edge.0, enabled, "edge toggled");
        }
        found
    }

    /// Returns `false` if the boundary does not exist.
    pub fn set_boundary_enabled(&mut self, boundary: BoundaryId, enabled: bool) -> bool {
        let found = self.mesh.set_boundary_enabled(boundary, enabled);
        if found {
            info!(boundary = boundary.0, enabled, "boundary toggled");
        }
        found
    }

    // ========================================================================
    // Trigger handlers, presenters and locations
    // ========================================================================

    /// Binds `handler` to the trigger zone called `zone_name`, replacing any
    /// handler bound before.
    pub fn set_trigger_handler(
        &mut self,
        zone_name: &str,
        handler: impl TriggerHandler + 'static,
    ) -> Result<ZoneId, NavError> {
        let zone = self
            .mesh
            .zone_by_name(zone_name)
            .ok_or_else(|| NavError::UnknownZone(zone_name.to_string()))?;
        self.handlers.insert(zone, Box::new(handler));
        Ok(zone)
    }

    pub fn clear_trigger_handler(&mut self, zone_name: &str) -> Option<Box<dyn TriggerHandler>> {
        let zone = self.mesh.zone_by_name(zone_name)?;
        self.handlers.remove(&zone)
    }

    pub fn add_presenter(&mut self, boundary: BoundaryId, presenter: PresenterId) -> Result<bool, NavError> {
        let face = self.mesh.boundary_mut(boundary).ok_or(NavError::OutsideMesh)?;
        Ok(face.add_presenter(presenter))
    }

    /// `None` detaches every presenter from the boundary.
    pub fn remove_presenter(
        &mut self,
        boundary: BoundaryId,
        presenter: Option<PresenterId>,
    ) -> Result<usize, NavError> {
        let face = self.mesh.boundary_mut(boundary).ok_or(NavError::OutsideMesh)?;
        Ok(face.remove_presenter(presenter))
    }

    /// Detaches every presenter from every boundary (world teardown).
    pub fn clear_presenters(&mut self) -> usize {
        let mut removed = 0;
        for i in 0..self.mesh.boundaries().len() {
            if let Some(face) = self.mesh.boundary_mut(BoundaryId(i)) {
                removed += face.remove_presenter(None);
            }
        }
        removed
    }

    /// Installs the named placements used by [`Self::place_actor_at`].
    pub fn set_locations(&mut self, locations: LocationTable) -> Result<(), NavError> {
        locations.validate(&self.mesh)?;
        self.locations = locations;
        Ok(())
    }

    pub fn locations(&self) -> &LocationTable {
        &self.locations
    }

    // ========================================================================
    // Actor registration
    // ========================================================================

    /// Registers an actor. It stays `Uninitialized`, on no boundary, until
    /// it is placed.
    pub fn insert_actor(&mut self, mut actor: PathActor) -> ActorId {
        actor.state = ActorState::Uninitialized;
        actor.boundary = None;
        actor.target_edge = None;
        actor.route = None;
        let id = self.actors.insert(actor);
        self.order.push(id);
        id
    }

    /// Detaches the actor from its boundary and unregisters it.
    pub fn remove_actor(&mut self, id: ActorId) -> Result<PathActor, NavError> {
        if !self.actors.contains_key(id) {
            return Err(NavError::UnknownActor(id));
        }
        self.detach(id)?;
        self.order.retain(|&a| a != id);
        debug!(?id, "actor removed");
        self.actors.remove(id).ok_or(NavError::UnknownActor(id))
    }

    pub fn actor_exists(&self, id: ActorId) -> bool {
        self.actors.contains_key(id)
    }

    pub fn actor(&self, id: ActorId) -> Option<&PathActor> {
        self.actors.get(id)
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut PathActor> {
        self.actors.get_mut(id)
    }

    /// Actors in registration order.
    pub fn actor_ids(&self) -> &[ActorId] {
        &self.order
    }

    // ========================================================================
    // Placement
    // ========================================================================

    /// Puts the actor on the named boundary, on a curve from a point on the
    /// `src_edge`-th edge of its loop to a point on the `dst_edge`-th. Scales
    /// run from each edge's counterclockwise-first vertex.
    pub fn place_actor(
        &mut self,
        id: ActorId,
        boundary_name: &str,
        src_edge: usize,
        src_scale: f32,
        dst_edge: usize,
        dst_scale: f32,
    ) -> Result<(), NavError> {
        let actor = self.actors.get(id).ok_or(NavError::UnknownActor(id))?;
        let boundary = self
            .mesh
            .boundary_by_name(boundary_name)
            .ok_or_else(|| NavError::UnknownBoundary(boundary_name.to_string()))?;
        let face = &self.mesh.boundaries()[boundary.0];
        let edge_at = |index: usize| {
            face.edges()
                .get(index)
                .copied()
                .ok_or(NavError::EdgeIndexOutOfRange { boundary, index })
        };
        let src = edge_at(src_edge)?;
        let dst = edge_at(dst_edge)?;
        let src_scale = src_scale.clamp(0.0, 1.0);
        let dst_scale = dst_scale.clamp(0.0, 1.0);

        let start = self.mesh.edges()[src.0].point_at(boundary, src_scale)?;
        let end = self.mesh.edges()[dst.0].point_at(boundary, dst_scale)?;
        let start_dir = -self.mesh.exit_normal(boundary, src)?;
        let end_dir = self.mesh.exit_normal(boundary, dst)?;
        let min_handle = if src == dst {
            face.radius_sq().sqrt() * 0.5
        } else {
            0.0
        };
        let curve = Curve::hermite(start, start_dir, end, end_dir, min_handle, actor.arc_samples)?;
        let transform = curve.frame(0.0, self.config.up)?;

        self.relocate(id, boundary)?;
        let time = self.time;
        let actor = self.actors.get_mut(id).ok_or(NavError::UnknownActor(id))?;
        actor.state = ActorState::Normal;
        actor.target_edge = Some(dst);
        actor.progress = dst_scale;
        actor.position = start;
        actor.direction = transform.z_axis.truncate();
        actor.transform = transform;
        actor.last_time = time;
        actor.route = None;
        actor.world_speed = actor.max_speed;
        actor.start_curve(curve, CurveGoal::TargetEdge, time);
        debug!(?id, boundary = boundary_name, "actor placed");
        Ok(())
    }

    /// Places the actor using an entry from the installed location table.
    pub fn place_actor_at(&mut self, id: ActorId, key: &str) -> Result<(), NavError> {
        let location = self
            .locations
            .get(key)
            .cloned()
            .ok_or_else(|| NavError::UnknownLocation(key.to_string()))?;
        self.place_actor(
            id,
            &location.boundary,
            location.src_edge,
            location.src_scale,
            location.dst_edge,
            location.dst_scale,
        )
    }

    /// Places the actor at an explicit world position, facing `direction`.
    ///
    /// Boundaries bound to `presenter` are searched first. The actor is left
    /// without a curve; its target edge is the one straight ahead.
    pub fn place_actor_at_position(
        &mut self,
        id: ActorId,
        presenter: Option<PresenterId>,
        position: Vec3,
        direction: Vec3,
    ) -> Result<(), NavError> {
        if !self.actors.contains_key(id) {
            return Err(NavError::UnknownActor(id));
        }
        let preferred: Vec<BoundaryId> = match presenter {
            Some(p) => (0..self.mesh.boundaries().len())
                .map(BoundaryId)
                .filter(|&b| self.mesh.boundaries()[b.0].has_presenter(p))
                .collect(),
            None => Vec::new(),
        };
        let boundary = self
            .mesh
            .locate(position, preferred, &self.config)
            .ok_or(NavError::OutsideMesh)?;
        let face = &self.mesh.boundaries()[boundary.0];

        let normal = face.normal();
        let flat = direction - normal * direction.dot(normal);
        let transform = orient(position, flat, self.config.up)?;
        let forward = transform.z_axis.truncate();

        let reach = 2.0 * face.radius_sq().sqrt() + 1.0;
        let (target_edge, progress) = match face
            .intersect(self.mesh.edges(), position, position + forward * reach, self.config.containment_tolerance)
            .hit()
        {
            Some((point, edge)) => (edge, self.mesh.edges()[edge.0].progress_of(boundary, point)?),
            None => return Err(NavError::OutsideMesh),
        };

        self.relocate(id, boundary)?;
        let time = self.time;
        let actor = self.actors.get_mut(id).ok_or(NavError::UnknownActor(id))?;
        actor.state = ActorState::Normal;
        actor.target_edge = Some(target_edge);
        actor.progress = progress;
        actor.position = position;
        actor.direction = forward;
        actor.transform = transform;
        actor.last_time = time;
        actor.presenter = presenter;
        actor.curve = None;
        actor.route = None;
        actor.world_speed = actor.max_speed;
        debug!(?id, boundary = boundary.0, "actor placed at position");
        Ok(())
    }

    // ========================================================================
    // Routing
    // ========================================================================

    /// Resolves the chain of edge crossings from `start` to `goal`.
    pub fn route(
        &self,
        start: Vec3,
        start_boundary: BoundaryId,
        goal: Vec3,
        goal_boundary: BoundaryId,
        nav: NavPermissions,
    ) -> Result<Route, NavError> {
        resolve_route(&self.mesh, start, start_boundary, goal, goal_boundary, nav)
    }

    /// Sends a placed actor to `goal` along a resolved route and returns the
    /// route length. The actor arrives facing `goal_direction` (or along its
    /// final leg when that is zero).
    pub fn route_actor(
        &mut self,
        id: ActorId,
        goal: Vec3,
        goal_direction: Vec3,
        mask: NavMask,
    ) -> Result<f32, NavError> {
        let actor = self.actors.get(id).ok_or(NavError::UnknownActor(id))?;
        let start_boundary = actor.boundary.ok_or(NavError::NotPlaced(id))?;
        let goal_boundary = self
            .mesh
            .locate(goal, [start_boundary], &self.config)
            .ok_or(NavError::OutsideMesh)?;
        let nav = NavPermissions {
            mask,
            user_nav: actor.user_nav,
        };
        let route = resolve_route(&self.mesh, actor.position, start_boundary, goal, goal_boundary, nav)?;

        let (curve, curve_goal, target_edge, progress) = match route.steps.first() {
            Some(step) => {
                let end_dir = self.mesh.exit_normal(step.from, step.edge)?;
                let curve = Curve::hermite(
                    actor.position,
                    actor.direction,
                    step.point,
                    end_dir,
                    0.0,
                    actor.arc_samples,
                )?;
                let progress = self.mesh.edges()[step.edge.0].progress_of(step.from, step.point)?;
                (curve, CurveGoal::TargetEdge, Some(step.edge), progress)
            }
            None => {
                let end_dir = if goal_direction.length() > 1e-6 {
                    goal_direction
                } else {
                    goal - actor.position
                };
                let curve = Curve::hermite(actor.position, actor.direction, goal, end_dir, 0.0, actor.arc_samples)?;
                (curve, CurveGoal::Free, actor.target_edge, actor.progress)
            }
        };

        let length = route.length;
        debug!(?id, crossings = route.steps.len(), length, "actor routed");
        let time = self.time;
        let actor = self.actors.get_mut(id).ok_or(NavError::UnknownActor(id))?;
        actor.route = Some(ActiveRoute {
            steps: route.steps.into_iter().collect(),
            goal,
            goal_direction,
        });
        actor.target_edge = target_edge;
        actor.progress = progress;
        actor.world_speed = actor.max_speed;
        actor.start_curve(curve, curve_goal, time);
        Ok(length)
    }

    // ========================================================================
    // Membership
    // ========================================================================

    /// Moves the actor's boundary membership to `to`, keeping the actor's
    /// back-reference in step.
    fn relocate(&mut self, id: ActorId, to: BoundaryId) -> Result<(), NavError> {
        let from = self.actors.get(id).ok_or(NavError::UnknownActor(id))?.boundary;
        if from == Some(to) {
            return Ok(());
        }
        if self.mesh.boundary(to).is_none() {
            return Err(NavError::OutsideMesh);
        }
        if let Some(from) = from {
            if let Some(face) = self.mesh.boundary_mut(from) {
                face.remove_actor(from, id)?;
            }
        }
        if let Some(face) = self.mesh.boundary_mut(to) {
            face.add_actor(to, id)?;
        }
        if let Some(actor) = self.actors.get_mut(id) {
            actor.boundary = Some(to);
        }
        Ok(())
    }

    fn detach(&mut self, id: ActorId) -> Result<(), NavError> {
        let from = self.actors.get(id).ok_or(NavError::UnknownActor(id))?.boundary;
        if let Some(from) = from {
            if let Some(face) = self.mesh.boundary_mut(from) {
                face.remove_actor(from, id)?;
            }
        }
        if let Some(actor) = self.actors.get_mut(id) {
            actor.boundary = None;
        }
        Ok(())
    }
}
