//! Save-game support for actor navigation state.
//!
//! Record layout: boundary name (empty when unplaced), u8 position of the
//! target edge in the boundary's loop (`0xFF` for none), f32 progress,
//! vec3 position, vec3 direction, u8 state, u8 user-nav flag, f32 max speed.
//! Curves and routes are not saved; a restored actor holds still until it
//! is given a new segment.

use glam::Mat4;

use super::PathController;
use crate::actor::{orient, ActorId, ActorState};
use crate::error::{NavError, SaveStateError, StorageError};
use crate::storage::Storage;

const NO_EDGE: u8 = 0xFF;

impl PathController {
    pub fn write_actor_state(&self, id: ActorId, storage: &mut dyn Storage) -> Result<(), SaveStateError> {
        if !storage.is_write_mode() {
            return Err(StorageError::WrongMode("writing").into());
        }
        let actor = self.actors.get(id).ok_or(NavError::UnknownActor(id))?;
        let face = actor.boundary.and_then(|b| self.mesh.boundary(b));
        let slot = match (face, actor.target_edge) {
            (Some(face), Some(edge)) => face
                .edge_position(edge)
                .and_then(|p| u8::try_from(p).ok())
                .unwrap_or(NO_EDGE),
            _ => NO_EDGE,
        };

        storage.write_string(face.map_or("", |f| f.name()))?;
        storage.write_u8(slot)?;
        storage.write_f32(actor.progress)?;
        storage.write_vec3(actor.position)?;
        storage.write_vec3(actor.direction)?;
        storage.write_u8(actor.state.to_u8())?;
        storage.write_u8(u8::from(actor.user_nav))?;
        storage.write_f32(actor.max_speed)?;
        Ok(())
    }

    /// Restores a record written by [`Self::write_actor_state`] onto a
    /// registered actor, moving its boundary membership to match.
    pub fn read_actor_state(&mut self, id: ActorId, storage: &mut dyn Storage) -> Result<(), SaveStateError> {
        if !storage.is_read_mode() {
            return Err(StorageError::WrongMode("reading").into());
        }
        if !self.actors.contains_key(id) {
            return Err(NavError::UnknownActor(id).into());
        }

        let name = storage.read_string()?;
        let slot = storage.read_u8()?;
        let progress = storage.read_f32()?;
        let position = storage.read_vec3()?;
        let direction = storage.read_vec3()?;
        let state = ActorState::from_u8(storage.read_u8()?);
        let user_nav = storage.read_u8()? != 0;
        let max_speed = storage.read_f32()?;

        let boundary = if name.is_empty() {
            None
        } else {
            Some(
                self.mesh
                    .boundary_by_name(&name)
                    .ok_or(NavError::UnknownBoundary(name))?,
            )
        };
        let target_edge = match boundary {
            Some(b) if slot != NO_EDGE => {
                let index = usize::from(slot);
                let edge = self.mesh.boundaries()[b.0]
                    .edges()
                    .get(index)
                    .copied()
                    .ok_or(NavError::EdgeIndexOutOfRange { boundary: b, index })?;
                Some(edge)
            }
            _ => None,
        };

        match boundary {
            Some(b) => self.relocate(id, b)?,
            None => self.detach(id)?,
        }

        let transform =
            orient(position, direction, self.config.up).unwrap_or_else(|_| Mat4::from_translation(position));
        let time = self.time;
        let actor = self.actors.get_mut(id).ok_or(NavError::UnknownActor(id))?;
        actor.state = if boundary.is_some() {
            state
        } else {
            ActorState::Uninitialized
        };
        actor.target_edge = target_edge;
        actor.progress = progress;
        actor.position = position;
        actor.direction = direction;
        actor.transform = transform;
        actor.user_nav = user_nav;
        actor.set_max_speed(max_speed);
        actor.curve = None;
        actor.route = None;
        actor.last_time = time;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::actor::PathActor;
    use crate::config::NavConfig;
    use crate::mesh::MeshBuilder;
    use crate::storage::MemoryStorage;

    fn controller() -> PathController {
        let mut builder = MeshBuilder::new();
        builder.boundary(
            "yard",
            &[
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 4.0),
                Vec3::new(4.0, 0.0, 4.0),
                Vec3::new(4.0, 0.0, 0.0),
            ],
        );
        PathController::from_data(builder.build(), Vec3::ZERO, "save", NavConfig::default()).unwrap()
    }

    #[test]
    fn actor_state_survives_a_save() {
        let mut source = controller();
        let id = source.insert_actor(PathActor::new().with_user_nav(true).with_max_speed(3.5));
        source.place_actor(id, "yard", 0, 0.25, 2, 0.75).unwrap();

        let mut saved = MemoryStorage::writer();
        source.write_actor_state(id, &mut saved).unwrap();

        let mut target = controller();
        let restored = target.insert_actor(PathActor::new());
        let mut load = MemoryStorage::reader(saved.into_bytes());
        target.read_actor_state(restored, &mut load).unwrap();

        let before = source.actor(id).unwrap();
        let after = target.actor(restored).unwrap();
        assert_eq!(after.state(), ActorState::Normal);
        assert_eq!(after.boundary(), before.boundary());
        assert_eq!(after.target_edge(), before.target_edge());
        assert_eq!(after.progress(), before.progress());
        assert_eq!(after.position(), before.position());
        assert!(after.user_nav());
        assert_eq!(after.max_speed(), 3.5);
        assert!(target.mesh().boundaries()[0].has_actor(restored));
    }

    #[test]
    fn unknown_boundary_in_save_is_rejected() {
        let mut saved = MemoryStorage::writer();
        saved.write_string("cellar").unwrap();
        saved.write_u8(0).unwrap();
        saved.write_f32(0.5).unwrap();
        saved.write_vec3(Vec3::new(1.0, 0.0, 1.0)).unwrap();
        saved.write_vec3(Vec3::Z).unwrap();
        saved.write_u8(1).unwrap();
        saved.write_u8(0).unwrap();
        saved.write_f32(10.0).unwrap();

        let mut target = controller();
        let id = target.insert_actor(PathActor::new());
        let mut load = MemoryStorage::reader(saved.into_bytes());
        let err = target.read_actor_state(id, &mut load).unwrap_err();
        assert!(matches!(
            err,
            SaveStateError::Nav(NavError::UnknownBoundary(ref name)) if name == "cellar"
        ));
        assert_eq!(target.actor(id).unwrap().state(), ActorState::Uninitialized);
    }
}
