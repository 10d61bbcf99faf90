//! Named placement shortcuts ("start of the race track", "pizzeria door").
//!
//! A table is built once per world, checked against the mesh it will be
//! used with, and handed to the controller.

use serde::{Deserialize, Serialize};

use crate::error::NavError;
use crate::mesh::Mesh;

/// One scripted placement: a curve from a point on `src_edge` to a point on
/// `dst_edge`, both given as positions within the boundary's edge loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamedLocation {
    pub key: String,
    pub boundary: String,
    pub src_edge: usize,
    pub src_scale: f32,
    pub dst_edge: usize,
    pub dst_scale: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationTable {
    entries: Vec<NamedLocation>,
}

impl LocationTable {
    pub fn new(entries: Vec<NamedLocation>) -> Self {
        Self { entries }
    }

    /// Parses a JSON array of locations.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedLocation> {
        self.entries.iter()
    }

    /// Case-insensitive lookup by key.
    pub fn get(&self, key: &str) -> Option<&NamedLocation> {
        self.entries.iter().find(|l| l.key.eq_ignore_ascii_case(key))
    }

    /// Checks every entry names an existing boundary and edge positions
    /// inside that boundary's loop.
    pub fn validate(&self, mesh: &Mesh) -> Result<(), NavError> {
        for location in &self.entries {
            let id = mesh
                .boundary_by_name(&location.boundary)
                .ok_or_else(|| NavError::UnknownBoundary(location.boundary.clone()))?;
            let count = mesh.boundaries()[id.0].edges().len();
            for index in [location.src_edge, location.dst_edge] {
                if index >= count {
                    return Err(NavError::EdgeIndexOutOfRange { boundary: id, index });
                }
            }
        }
        Ok(())
    }
}
