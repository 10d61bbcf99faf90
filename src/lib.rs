//! Path navigation for actors on a winged-edge boundary mesh.
//!
//! A [`PathController`] owns one mesh and drives the [`PathActor`]s placed
//! on it: each tick it moves them along their curve segments, hands them
//! across shared edges, stops them at walls and at each other, and fires the
//! trigger zones they cross. [`Simulation`] wraps a controller for a
//! JavaScript host.

pub mod actor;
pub mod config;
pub mod controller;
pub mod error;
pub mod locations;
pub mod math;
pub mod mesh;
pub mod pathfinding;
pub mod physics;
pub mod scheduler;
pub mod storage;
pub mod trigger;

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::warn;
use wasm_bindgen::prelude::*;

pub use crate::actor::{
    ActorHit, ActorId, ActorState, CollisionReactive, Curve, HitResult, NoReaction, PathActor,
};
pub use crate::config::NavConfig;
pub use crate::controller::{AdvanceOutcome, BoundaryEntry, PathController, TickReport};
pub use crate::error::{CommandError, MeshError, NavError, SaveStateError, StorageError};
pub use crate::locations::{LocationTable, NamedLocation};
pub use crate::math::SimVector;
pub use crate::mesh::{
    Boundary, BoundaryId, DirectedEdge, Edge, EdgeFlags, EdgeId, GeometryEdge, Intersection, Mesh,
    MeshBuilder, MeshData, NavMask, NavPermissions, PointId, PresenterId,
};
pub use crate::pathfinding::{Route, RouteStep};
pub use crate::scheduler::{ControllerId, TickleManager};
pub use crate::storage::{FileStorage, MemoryStorage, Storage};
pub use crate::trigger::{TriggerDirection, TriggerEvent, TriggerHandler, TriggerZone, ZoneId};

/// Floats per actor in the export buffer:
/// `[id, x, y, z, dir_x, dir_y, dir_z, boundary]`, boundary `-1` when unplaced.
pub const EXPORT_STRIDE: usize = 8;

// --- SNAPSHOT STRUCTS ---
// Plain data handed to JS through serde-wasm-bindgen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub id: u32,
    pub state: ActorState,
    pub boundary: Option<String>,
    pub position: SimVector,
    pub direction: SimVector,
    pub progress: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub tick_count: u64,
    pub time: f32,
    pub actors: Vec<ActorSnapshot>,
}

// Commands arrive from JS as a JSON array once per tick.
#[derive(Clone, Debug, Deserialize)]
pub struct InputCommand {
    pub id: u32,
    /// `SPAWN`, `PLACE`, `MOVE`, `ROUTE`, `REMOVE` or `EDGE`.
    pub action: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub target: Option<SimVector>,
    #[serde(default)]
    pub direction: Option<SimVector>,
    #[serde(default)]
    pub edge: Option<usize>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

// --- MAIN SIMULATION STRUCT ---
#[wasm_bindgen]
pub struct Simulation {
    tick_count: u64,
    time: f32,
    // Flat copy of actor state for zero-copy reads from JS.
    export_buffer: Vec<f32>,
    controller: PathController,
    // JS ids, ordered so the export buffer is stable between ticks.
    ids: BTreeMap<u32, ActorId>,
}

#[wasm_bindgen]
impl Simulation {
    #[wasm_bindgen(constructor)]
    pub fn new(mesh: &[u8], namespace: &str) -> Result<Simulation, JsValue> {
        console_error_panic_hook::set_once();
        Self::from_mesh(mesh, namespace).map_err(|err| JsValue::from_str(&err.to_string()))
    }

    /// Installs named placements from a JSON array.
    pub fn set_locations(&mut self, json: &str) -> Result<(), JsValue> {
        self.load_locations(json)
            .map_err(|err| JsValue::from_str(&err))
    }

    /// Applies the batch of commands, then advances every actor by `dt`
    /// seconds.
    pub fn tick(&mut self, input_json: &str, dt: f32) {
        self.step(input_json, dt);
    }

    pub fn get_snapshot(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.snapshot()).map_err(Into::into)
    }

    /// Serialized navigation state of one actor, for save games.
    pub fn save_actor(&self, id: u32) -> Result<Vec<u8>, JsValue> {
        self.save_actor_bytes(id)
            .map_err(|err| JsValue::from_str(&err))
    }

    pub fn load_actor(&mut self, id: u32, bytes: &[u8]) -> Result<(), JsValue> {
        self.load_actor_bytes(id, bytes)
            .map_err(|err| JsValue::from_str(&err))
    }

    // --- ZERO-COPY MEMORY INTEROP ---

    pub fn get_state_ptr(&self) -> *const f32 {
        self.export_buffer.as_ptr()
    }

    pub fn get_state_len(&self) -> usize {
        self.export_buffer.len()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

impl Simulation {
    pub fn from_mesh(mesh: &[u8], namespace: &str) -> Result<Self, MeshError> {
        let controller = PathController::from_bytes(mesh, Vec3::ZERO, namespace, NavConfig::default())?;
        Ok(Self::with_controller(controller))
    }

    pub fn with_controller(controller: PathController) -> Self {
        Self {
            tick_count: 0,
            time: 0.0,
            export_buffer: Vec::new(),
            controller,
            ids: BTreeMap::new(),
        }
    }

    pub fn controller(&self) -> &PathController {
        &self.controller
    }

    pub fn actor_id(&self, id: u32) -> Option<ActorId> {
        self.ids.get(&id).copied()
    }

    pub fn export_buffer(&self) -> &[f32] {
        &self.export_buffer
    }

    pub fn load_locations(&mut self, json: &str) -> Result<(), String> {
        let table = LocationTable::from_json(json).map_err(|err| err.to_string())?;
        self.controller.set_locations(table).map_err(|err| err.to_string())
    }

    /// The deterministic loop: commands first, then one controller tick.
    pub fn step(&mut self, input_json: &str, dt: f32) -> TickReport {
        self.tick_count += 1;
        self.time += dt;

        // A malformed batch is dropped as a whole.
        let inputs: Vec<InputCommand> = serde_json::from_str(input_json).unwrap_or_else(|err| {
            warn!(%err, "dropping malformed command batch");
            Vec::new()
        });
        for input in &inputs {
            if let Err(err) = self.apply(input) {
                warn!(id = input.id, action = %input.action, %err, "command failed");
            }
        }

        let report = self.controller.tickle(self.time);
        self.rebuild_export_buffer();
        report
    }

    fn apply(&mut self, input: &InputCommand) -> Result<(), CommandError> {
        let direction = input.direction.map_or(Vec3::Z, SimVector::to_glam);
        match input.action.as_str() {
            "SPAWN" => {
                let id = match self.ids.get(&input.id) {
                    Some(&id) => id,
                    None => {
                        let actor = PathActor::from_config(self.controller.config());
                        let id = self.controller.insert_actor(actor);
                        self.ids.insert(input.id, id);
                        id
                    }
                };
                match input.target {
                    Some(target) => Ok(self
                        .controller
                        .place_actor_at_position(id, None, target.to_glam(), direction)?),
                    None => Ok(()),
                }
            }
            "PLACE" => {
                let id = self.known(input.id)?;
                let key = input.location.as_deref().ok_or(CommandError::MissingField {
                    action: "PLACE",
                    field: "location",
                })?;
                Ok(self.controller.place_actor_at(id, key)?)
            }
            "MOVE" => {
                let id = self.known(input.id)?;
                let target = input
                    .target
                    .ok_or(CommandError::MissingField {
                        action: "MOVE",
                        field: "target",
                    })?
                    .to_glam();
                let time = self.time;
                let actor = self.controller.actor_mut(id).ok_or(NavError::UnknownActor(id))?;
                let start = actor.position();
                let handle = start.distance(target) / 3.0;
                let points = [
                    start,
                    start + actor.direction() * handle,
                    target - direction.normalize_or_zero() * handle,
                    target,
                ];
                Ok(actor.set_curve_segment(points, time)?)
            }
            "ROUTE" => {
                let id = self.known(input.id)?;
                let target = input
                    .target
                    .ok_or(CommandError::MissingField {
                        action: "ROUTE",
                        field: "target",
                    })?
                    .to_glam();
                let goal_direction = input.direction.map_or(Vec3::ZERO, SimVector::to_glam);
                self.controller
                    .route_actor(id, target, goal_direction, NavMask::ALL)?;
                Ok(())
            }
            "REMOVE" => {
                let id = self.known(input.id)?;
                self.controller.remove_actor(id)?;
                self.ids.remove(&input.id);
                Ok(())
            }
            "EDGE" => {
                let edge = input.edge.ok_or(CommandError::MissingField {
                    action: "EDGE",
                    field: "edge",
                })?;
                if self
                    .controller
                    .set_edge_enabled(EdgeId(edge), input.enabled.unwrap_or(true))
                {
                    Ok(())
                } else {
                    Err(CommandError::UnknownEdge(edge))
                }
            }
            other => {
                warn!(action = other, "unknown command");
                Ok(())
            }
        }
    }

    fn known(&self, id: u32) -> Result<ActorId, CommandError> {
        self.ids
            .get(&id)
            .copied()
            .ok_or(CommandError::UnknownHostActor(id))
    }

    pub fn snapshot(&self) -> SimSnapshot {
        let actors = self
            .ids
            .iter()
            .filter_map(|(&js_id, &id)| {
                let actor = self.controller.actor(id)?;
                Some(ActorSnapshot {
                    id: js_id,
                    state: actor.state(),
                    boundary: actor
                        .boundary()
                        .and_then(|b| self.controller.boundary(b))
                        .map(|b| b.name().to_string()),
                    position: SimVector::from_glam(actor.position()),
                    direction: SimVector::from_glam(actor.direction()),
                    progress: actor.progress(),
                })
            })
            .collect();
        SimSnapshot {
            tick_count: self.tick_count,
            time: self.time,
            actors,
        }
    }

    pub fn save_actor_bytes(&self, id: u32) -> Result<Vec<u8>, String> {
        let actor = self.known(id).map_err(|err| err.to_string())?;
        let mut storage = MemoryStorage::writer();
        self.controller
            .write_actor_state(actor, &mut storage)
            .map_err(|err| err.to_string())?;
        Ok(storage.into_bytes())
    }

    pub fn load_actor_bytes(&mut self, id: u32, bytes: &[u8]) -> Result<(), String> {
        let actor = self.known(id).map_err(|err| err.to_string())?;
        let mut storage = MemoryStorage::reader(bytes.to_vec());
        self.controller
            .read_actor_state(actor, &mut storage)
            .map_err(|err| err.to_string())?;
        self.rebuild_export_buffer();
        Ok(())
    }

    // --- INTERNAL HELPERS ---

    fn rebuild_export_buffer(&mut self) {
        self.export_buffer.clear();
        self.export_buffer.reserve(self.ids.len() * EXPORT_STRIDE);

        for (&js_id, &id) in &self.ids {
            let Some(actor) = self.controller.actor(id) else {
                continue;
            };
            let position = actor.position();
            let direction = actor.direction();
            self.export_buffer.extend_from_slice(&[
                js_id as f32,
                position.x,
                position.y,
                position.z,
                direction.x,
                direction.y,
                direction.z,
                actor.boundary().map_or(-1.0, |b| b.0 as f32),
            ]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor_bytes() -> Vec<u8> {
        let mut builder = MeshBuilder::new();
        builder.boundary(
            "hall",
            &[
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 10.0),
                Vec3::new(10.0, 0.0, 10.0),
                Vec3::new(10.0, 0.0, 0.0),
            ],
        );
        builder.boundary(
            "lobby",
            &[
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 10.0),
                Vec3::new(20.0, 0.0, 10.0),
                Vec3::new(20.0, 0.0, 0.0),
            ],
        );
        let mut storage = MemoryStorage::writer();
        builder.build().write(&mut storage).unwrap();
        storage.into_bytes()
    }

    #[test]
    fn spawn_and_move_across_the_shared_edge() {
        let mut sim = Simulation::from_mesh(&corridor_bytes(), "sim").unwrap();
        sim.step(
            r#"[{"id":7,"action":"SPAWN","target":{"x":5.0,"y":0.0,"z":5.0},"direction":{"x":1.0,"y":0.0,"z":0.0}}]"#,
            0.0,
        );
        assert_eq!(sim.export_buffer().len(), EXPORT_STRIDE);
        assert_eq!(sim.export_buffer()[7], 0.0);

        sim.step(
            r#"[{"id":7,"action":"MOVE","target":{"x":15.0,"y":0.0,"z":5.0},"direction":{"x":1.0,"y":0.0,"z":0.0}}]"#,
            0.0,
        );
        for _ in 0..20 {
            sim.step("[]", 0.1);
        }

        let snapshot = sim.snapshot();
        assert_eq!(snapshot.actors.len(), 1);
        assert_eq!(snapshot.actors[0].boundary.as_deref(), Some("lobby"));
        assert!((snapshot.actors[0].position.x - 15.0).abs() < 1e-3);
        assert_eq!(sim.export_buffer()[7], 1.0);
    }

    #[test]
    fn malformed_batches_are_ignored() {
        let mut sim = Simulation::from_mesh(&corridor_bytes(), "sim").unwrap();
        let report = sim.step("not json", 0.5);
        assert_eq!(report.advanced, 0);
        assert_eq!(sim.tick_count(), 1);
        assert!(sim.export_buffer().is_empty());
    }

    #[test]
    fn malformed_commands_name_what_is_wrong() {
        let mut sim = Simulation::from_mesh(&corridor_bytes(), "sim").unwrap();
        let command = |json: &str| -> InputCommand { serde_json::from_str(json).unwrap() };

        assert_eq!(
            sim.apply(&command(r#"{"id":42,"action":"REMOVE"}"#)),
            Err(CommandError::UnknownHostActor(42))
        );
        sim.apply(&command(r#"{"id":3,"action":"SPAWN","target":{"x":2.0,"y":0.0,"z":2.0}}"#))
            .unwrap();
        assert_eq!(
            sim.apply(&command(r#"{"id":3,"action":"MOVE"}"#)),
            Err(CommandError::MissingField {
                action: "MOVE",
                field: "target"
            })
        );
        assert_eq!(
            sim.apply(&command(r#"{"id":3,"action":"ROUTE"}"#)),
            Err(CommandError::MissingField {
                action: "ROUTE",
                field: "target"
            })
        );
        assert_eq!(
            sim.apply(&command(r#"{"id":0,"action":"EDGE","enabled":false}"#)),
            Err(CommandError::MissingField {
                action: "EDGE",
                field: "edge"
            })
        );
        assert_eq!(
            sim.apply(&command(r#"{"id":0,"action":"EDGE","edge":99,"enabled":false}"#)),
            Err(CommandError::UnknownEdge(99))
        );
    }

    #[test]
    fn removed_actors_leave_the_export() {
        let mut sim = Simulation::from_mesh(&corridor_bytes(), "sim").unwrap();
        sim.step(
            r#"[{"id":1,"action":"SPAWN","target":{"x":2.0,"y":0.0,"z":2.0}},{"id":2,"action":"SPAWN","target":{"x":4.0,"y":0.0,"z":4.0}}]"#,
            0.0,
        );
        assert_eq!(sim.export_buffer().len(), 2 * EXPORT_STRIDE);

        sim.step(r#"[{"id":1,"action":"REMOVE"}]"#, 0.0);
        assert_eq!(sim.export_buffer().len(), EXPORT_STRIDE);
        assert_eq!(sim.export_buffer()[0], 2.0);
        assert!(sim.actor_id(1).is_none());
    }
}
