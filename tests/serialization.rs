mod common;

use glam::Vec3;
use legonav::{
    BoundaryId, EdgeFlags, MemoryStorage, MeshData, MeshError, NavConfig, PathActor,
    PathController, Simulation, StorageError,
};

use common::strip;

fn furnished() -> MeshData {
    let mut builder = strip(&["porch", "hall", "kitchen"], 10.0);
    let bell = builder.zone("bell", 3);
    builder.set_trigger_axis(1, Vec3::X, 10.0);
    builder.add_trigger(1, bell, 7, 2.5);
    let door = builder
        .edge_between(Vec3::new(20.0, 0.0, 0.0), Vec3::new(20.0, 0.0, 10.0))
        .unwrap();
    builder.set_edge_flags(
        door,
        EdgeFlags {
            exit_from_b: false,
            ..EdgeFlags::default()
        },
    );
    builder.build()
}

#[test]
fn test_mesh_round_trips_through_bytes() {
    let data = furnished();
    let original = PathController::from_data(data.clone(), Vec3::ZERO, "house", NavConfig::default()).unwrap();
    assert_eq!(original.mesh().to_data(), data);

    let bytes = original.to_bytes().unwrap();
    let reloaded = PathController::from_bytes(&bytes, Vec3::ZERO, "house", NavConfig::default()).unwrap();
    assert_eq!(reloaded.mesh().to_data(), data);
    assert_eq!(reloaded.to_bytes().unwrap(), bytes);
}

#[test]
fn test_origin_offset_is_not_serialized() {
    let data = furnished();
    let origin = Vec3::new(100.0, 0.0, -50.0);
    let placed = PathController::from_data(data.clone(), origin, "house", NavConfig::default()).unwrap();
    assert_eq!(placed.mesh().points()[0], data.points[0] + origin);

    let reloaded =
        PathController::from_bytes(&placed.to_bytes().unwrap(), Vec3::ZERO, "house", NavConfig::default())
            .unwrap();
    let mesh = reloaded.mesh();
    assert_eq!(mesh.boundaries().len(), 3);
    assert_eq!(mesh.boundary_by_name("Kitchen"), Some(BoundaryId(2)));
    for (edge, record) in mesh.edges().iter().zip(&data.edges) {
        assert_eq!(edge.face_a().map(|f| f.0), record.face_a);
        assert_eq!(edge.face_b().map(|f| f.0), record.face_b);
        assert_eq!(edge.flags(), record.flags);
    }
    let axis = mesh.boundaries()[1].trigger_axis().unwrap();
    assert!((axis.offset - 10.0).abs() < 1e-3);
}

#[test]
fn test_truncated_mesh_is_rejected() {
    let controller =
        PathController::from_data(furnished(), Vec3::ZERO, "house", NavConfig::default()).unwrap();
    let bytes = controller.to_bytes().unwrap();
    let result = PathController::from_bytes(&bytes[..bytes.len() / 2], Vec3::ZERO, "house", NavConfig::default());
    assert!(matches!(result, Err(MeshError::Storage(StorageError::Io(_)))));
}

#[test]
fn test_writing_to_a_reader_fails() {
    let controller =
        PathController::from_data(furnished(), Vec3::ZERO, "house", NavConfig::default()).unwrap();
    let mut reader = MemoryStorage::reader(Vec::new());
    assert!(matches!(
        controller.write(&mut reader),
        Err(MeshError::Storage(StorageError::WrongMode(_)))
    ));
}

#[test]
fn test_saved_actor_resumes_in_a_new_world() {
    let mut source =
        PathController::from_data(furnished(), Vec3::ZERO, "house", NavConfig::default()).unwrap();
    let id = source.insert_actor(PathActor::new());
    source
        .place_actor_at_position(id, None, Vec3::new(15.0, 0.0, 4.0), Vec3::Z)
        .unwrap();
    let mut saved = MemoryStorage::writer();
    source.write_actor_state(id, &mut saved).unwrap();

    let mut target =
        PathController::from_data(furnished(), Vec3::ZERO, "house", NavConfig::default()).unwrap();
    let restored = target.insert_actor(PathActor::new());
    target
        .read_actor_state(restored, &mut MemoryStorage::reader(saved.into_bytes()))
        .unwrap();

    let actor = target.actor(restored).unwrap();
    assert_eq!(actor.boundary(), Some(BoundaryId(1)));
    assert_eq!(actor.position(), Vec3::new(15.0, 0.0, 4.0));
    assert!(actor.curve().is_none());
    assert!(target.mesh().boundaries()[1].has_actor(restored));
}

#[test]
fn test_simulation_loads_a_serialized_mesh() {
    let controller =
        PathController::from_data(furnished(), Vec3::ZERO, "house", NavConfig::default()).unwrap();
    let mut sim = Simulation::from_mesh(&controller.to_bytes().unwrap(), "house").unwrap();
    sim.step(
        r#"[{"id": 1, "action": "SPAWN", "target": {"x": 5.0, "y": 0.0, "z": 5.0}, "direction": {"x": 1.0, "y": 0.0, "z": 0.0}}]"#,
        0.1,
    );
    let snapshot = sim.snapshot();
    assert_eq!(snapshot.actors.len(), 1);
    assert_eq!(snapshot.actors[0].boundary.as_deref(), Some("porch"));
}
