pub mod astar;
mod route;

pub use route::{resolve_route, Route, RouteStep};
