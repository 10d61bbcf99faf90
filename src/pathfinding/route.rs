use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::astar::{a_star, SearchResult};
use crate::error::NavError;
use crate::mesh::{BoundaryId, EdgeId, Mesh, NavPermissions};

/// One edge crossing along a route.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub edge: EdgeId,
    pub from: BoundaryId,
    pub into: BoundaryId,
    /// Where the route crosses: the edge midpoint.
    pub point: Vec3,
}

/// An ordered sequence of crossings from a start point to a goal point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub start: Vec3,
    pub start_boundary: BoundaryId,
    pub goal: Vec3,
    pub goal_boundary: BoundaryId,
    pub steps: Vec<RouteStep>,
    /// Length of the polyline start → crossing points → goal.
    pub length: f32,
}

impl Route {
    pub fn waypoints(&self) -> Vec<Vec3> {
        std::iter::once(self.start)
            .chain(self.steps.iter().map(|s| s.point))
            .chain(std::iter::once(self.goal))
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Node {
    Start,
    Crossing { edge: EdgeId, into: BoundaryId },
    Goal,
}

/// Searches the boundary graph for the shortest chain of crossings from
/// `start` (inside `start_boundary`) to `goal` (inside `goal_boundary`).
///
/// Boundaries are the nodes of the graph and shared edges the arcs; an arc
/// is usable only if [`Mesh::can_leave_through`] allows it for `nav`. Costs
/// are straight-line distances between crossing points, so the result's
/// length is the polyline length.
pub fn resolve_route(
    mesh: &Mesh,
    start: Vec3,
    start_boundary: BoundaryId,
    goal: Vec3,
    goal_boundary: BoundaryId,
    nav: NavPermissions,
) -> Result<Route, NavError> {
    if mesh.boundary(start_boundary).is_none() || mesh.boundary(goal_boundary).is_none() {
        return Err(NavError::OutsideMesh);
    }

    let position = |node: Node| match node {
        Node::Start => start,
        Node::Crossing { edge, .. } => mesh.edges()[edge.0].midpoint(),
        Node::Goal => goal,
    };

    let neighbors = |node: Node| -> Vec<(Node, f32)> {
        let (here, arrived_by) = match node {
            Node::Start => (start_boundary, None),
            Node::Crossing { edge, into } => (into, Some(edge)),
            Node::Goal => return Vec::new(),
        };
        let from = position(node);
        let boundary = &mesh.boundaries()[here.0];

        let mut out = Vec::with_capacity(boundary.edges().len() + 1);
        for &id in boundary.edges() {
            if Some(id) == arrived_by {
                continue;
            }
            let edge = &mesh.edges()[id.0];
            if !mesh.can_leave_through(edge, here, nav) {
                continue;
            }
            if let Ok(Some(into)) = edge.other_face(here) {
                out.push((Node::Crossing { edge: id, into }, from.distance(edge.midpoint())));
            }
        }
        if here == goal_boundary {
            out.push((Node::Goal, from.distance(goal)));
        }
        out
    };

    let SearchResult { cost, path } = a_star(
        Node::Start,
        neighbors,
        |node| position(node).distance(goal),
        |node| node == Node::Goal,
    )
    .ok_or(NavError::NoRoute)?;

    let mut steps = Vec::new();
    let mut current = start_boundary;
    for node in path {
        if let Node::Crossing { edge, into } = node {
            steps.push(RouteStep {
                edge,
                from: current,
                into,
                point: position(node),
            });
            current = into;
        }
    }

    Ok(Route {
        start,
        start_boundary,
        goal,
        goal_boundary,
        steps,
        length: cost,
    })
}
