mod common;

use approx::assert_abs_diff_eq;
use glam::Vec3;
use legonav::{
    BoundaryId, EdgeFlags, LocationTable, NavError, NavMask, NavPermissions, PathActor,
    PathController,
};

use common::{controller, strip};

fn corridor() -> PathController {
    controller(strip(&["a", "b", "c", "d"], 10.0).build())
}

fn all() -> NavPermissions {
    NavPermissions {
        mask: NavMask::ALL,
        user_nav: false,
    }
}

#[test]
fn test_route_crosses_each_boundary_in_turn() {
    let controller = corridor();
    let start = Vec3::new(5.0, 0.0, 5.0);
    let goal = Vec3::new(35.0, 0.0, 5.0);
    let route = controller
        .route(start, BoundaryId(0), goal, BoundaryId(3), all())
        .unwrap();

    let into: Vec<BoundaryId> = route.steps.iter().map(|s| s.into).collect();
    assert_eq!(into, vec![BoundaryId(1), BoundaryId(2), BoundaryId(3)]);
    for (step, x) in route.steps.iter().zip([10.0, 20.0, 30.0]) {
        assert_abs_diff_eq!(step.point.x, x, epsilon = 1e-4);
        assert_abs_diff_eq!(step.point.z, 5.0, epsilon = 1e-4);
    }

    let legs: f32 = route
        .waypoints()
        .windows(2)
        .map(|pair| pair[0].distance(pair[1]))
        .sum();
    assert_abs_diff_eq!(route.length, legs, epsilon = 1e-4);
    assert_abs_diff_eq!(route.length, 30.0, epsilon = 1e-4);
}

#[test]
fn test_route_within_one_boundary_is_direct() {
    let controller = corridor();
    let route = controller
        .route(
            Vec3::new(11.0, 0.0, 1.0),
            BoundaryId(1),
            Vec3::new(14.0, 0.0, 5.0),
            BoundaryId(1),
            all(),
        )
        .unwrap();
    assert!(route.steps.is_empty());
    assert_abs_diff_eq!(route.length, 5.0, epsilon = 1e-4);
}

#[test]
fn test_empty_mask_finds_no_route() {
    let controller = corridor();
    let nav = NavPermissions {
        mask: NavMask::NONE,
        user_nav: false,
    };
    let result = controller.route(
        Vec3::new(5.0, 0.0, 5.0),
        BoundaryId(0),
        Vec3::new(35.0, 0.0, 5.0),
        BoundaryId(3),
        nav,
    );
    assert_eq!(result, Err(NavError::NoRoute));
}

#[test]
fn test_disabled_boundary_blocks_route() {
    let mut controller = corridor();
    assert!(controller.set_boundary_enabled(BoundaryId(2), false));
    let result = controller.route(
        Vec3::new(5.0, 0.0, 5.0),
        BoundaryId(0),
        Vec3::new(35.0, 0.0, 5.0),
        BoundaryId(3),
        all(),
    );
    assert_eq!(result, Err(NavError::NoRoute));
}

#[test]
fn test_user_only_edge_needs_user_nav() {
    let mut builder = strip(&["a", "b"], 10.0);
    let door = builder
        .edge_between(Vec3::new(10.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 10.0))
        .unwrap();
    builder.set_edge_flags(
        door,
        EdgeFlags {
            user_only: true,
            ..EdgeFlags::default()
        },
    );
    let controller = controller(builder.build());
    let start = Vec3::new(5.0, 0.0, 5.0);
    let goal = Vec3::new(15.0, 0.0, 5.0);

    assert_eq!(
        controller.route(start, BoundaryId(0), goal, BoundaryId(1), all()),
        Err(NavError::NoRoute)
    );
    let user = NavPermissions {
        mask: NavMask::ALL,
        user_nav: true,
    };
    let route = controller
        .route(start, BoundaryId(0), goal, BoundaryId(1), user)
        .unwrap();
    assert_eq!(route.steps.len(), 1);
}

#[test]
fn test_routed_actor_walks_to_goal() {
    let mut controller = corridor();
    let id = controller.insert_actor(PathActor::new());
    controller
        .place_actor_at_position(id, None, Vec3::new(5.0, 0.0, 5.0), Vec3::X)
        .unwrap();

    let goal = Vec3::new(35.0, 0.0, 5.0);
    let length = controller.route_actor(id, goal, Vec3::X, NavMask::ALL).unwrap();
    assert_abs_diff_eq!(length, 30.0, epsilon = 1e-4);
    assert_eq!(controller.actor(id).unwrap().route_remaining(), Some(3));

    let mut entered = Vec::new();
    for step in 1..=80 {
        let report = controller.tickle(step as f32 * 0.1);
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        entered.extend(report.entries.iter().map(|e| e.boundary));
    }

    let actor = controller.actor(id).unwrap();
    assert_eq!(entered, vec![BoundaryId(1), BoundaryId(2), BoundaryId(3)]);
    assert_eq!(actor.boundary(), Some(BoundaryId(3)));
    assert_eq!(actor.route_remaining(), None);
    assert_abs_diff_eq!(actor.position().x, goal.x, epsilon = 1e-3);
    assert_abs_diff_eq!(actor.position().z, goal.z, epsilon = 1e-3);
}

#[test]
fn test_route_actor_needs_placement() {
    let mut controller = corridor();
    let id = controller.insert_actor(PathActor::new());
    assert_eq!(
        controller.route_actor(id, Vec3::new(35.0, 0.0, 5.0), Vec3::ZERO, NavMask::ALL),
        Err(NavError::NotPlaced(id))
    );
}

#[test]
fn test_named_locations_place_actors() {
    let mut controller = corridor();
    let table = LocationTable::from_json(
        r#"[{"key": "Entrance", "boundary": "b", "src_edge": 0, "src_scale": 0.5, "dst_edge": 2, "dst_scale": 0.5}]"#,
    )
    .unwrap();
    controller.set_locations(table).unwrap();

    let id = controller.insert_actor(PathActor::new());
    controller.place_actor_at(id, "entrance").unwrap();
    let actor = controller.actor(id).unwrap();
    assert_eq!(actor.boundary(), Some(BoundaryId(1)));
    assert_abs_diff_eq!(actor.position().x, 10.0, epsilon = 1e-4);
    assert_abs_diff_eq!(actor.position().z, 5.0, epsilon = 1e-4);

    assert_eq!(
        controller.place_actor_at(id, "exit"),
        Err(NavError::UnknownLocation("exit".to_string()))
    );
}

#[test]
fn test_locations_naming_missing_boundaries_are_rejected() {
    let mut controller = corridor();
    let table = LocationTable::from_json(
        r#"[{"key": "roof", "boundary": "attic", "src_edge": 0, "src_scale": 0.0, "dst_edge": 1, "dst_scale": 1.0}]"#,
    )
    .unwrap();
    assert_eq!(
        controller.set_locations(table),
        Err(NavError::UnknownBoundary("attic".to_string()))
    );
    assert!(controller.locations().is_empty());
}
