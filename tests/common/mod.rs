#![allow(dead_code)]

use glam::Vec3;
use legonav::{MeshBuilder, MeshData, NavConfig, PathController};

/// Corners of the axis-aligned rectangle `[x0, x1] x [z0, z1]` at `y = 0`,
/// counterclockwise seen from above.
pub fn rect(x0: f32, z0: f32, x1: f32, z1: f32) -> [Vec3; 4] {
    [
        Vec3::new(x0, 0.0, z0),
        Vec3::new(x0, 0.0, z1),
        Vec3::new(x1, 0.0, z1),
        Vec3::new(x1, 0.0, z0),
    ]
}

/// Boundaries of `width` x 10 laid side by side along +X and named in
/// order. Each neighbouring pair shares the edge at their common `x`.
pub fn strip(names: &[&str], width: f32) -> MeshBuilder {
    let mut builder = MeshBuilder::new();
    for (i, name) in names.iter().enumerate() {
        let x0 = i as f32 * width;
        builder.boundary(name, &rect(x0, 0.0, x0 + width, 10.0));
    }
    builder
}

pub fn controller(data: MeshData) -> PathController {
    PathController::from_data(data, Vec3::ZERO, "test", NavConfig::default())
        .expect("fixture mesh is valid")
}

/// A straight curve segment from `a` to `b`.
pub fn line(a: Vec3, b: Vec3) -> [Vec3; 4] {
    [a, a.lerp(b, 1.0 / 3.0), a.lerp(b, 2.0 / 3.0), b]
}
