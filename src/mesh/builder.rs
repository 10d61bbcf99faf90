use std::collections::HashMap;

use glam::Vec3;

use super::edge::EdgeFlags;
use super::format::{BoundaryRecord, EdgeRecord, MeshData};
use crate::trigger::{PathTrigger, TriggerAxis, TriggerZone, ZoneId};

/// Assembles [`MeshData`] from polygon outlines.
///
/// Boundaries are given as corner loops in counterclockwise order around
/// their up side. Corners with identical coordinates become one point and
/// corner pairs walked by two boundaries become one shared edge, so
/// adjacency falls out of the outlines. Mistakes (for example two
/// boundaries walking an edge the same way) are left for
/// [`super::Mesh::build`] to reject.
#[derive(Default)]
pub struct MeshBuilder {
    data: MeshData,
    points: HashMap<[u32; 3], usize>,
    edges: HashMap<(usize, usize), usize>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zone(&mut self, name: &str, flags: u32) -> ZoneId {
        self.data.zones.push(TriggerZone {
            name: name.to_string(),
            flags,
        });
        ZoneId(self.data.zones.len() - 1)
    }

    pub fn point(&mut self, position: Vec3) -> usize {
        let key = position.to_array().map(f32::to_bits);
        *self.points.entry(key).or_insert_with(|| {
            self.data.points.push(position);
            self.data.points.len() - 1
        })
    }

    /// Adds a boundary and returns its index.
    pub fn boundary(&mut self, name: &str, corners: &[Vec3]) -> usize {
        let index = self.data.boundaries.len();
        let ids: Vec<usize> = corners.iter().map(|&c| self.point(c)).collect();

        let mut edges = Vec::with_capacity(ids.len());
        for k in 0..ids.len() {
            let a = ids[k];
            let b = ids[(k + 1) % ids.len()];
            let key = (a.min(b), a.max(b));
            let edge = match self.edges.get(&key) {
                Some(&e) => {
                    let record = &mut self.data.edges[e];
                    if record.point_a == a {
                        record.face_a = Some(index);
                    } else {
                        record.face_b = Some(index);
                    }
                    e
                }
                None => {
                    self.data.edges.push(EdgeRecord {
                        flags: EdgeFlags::default(),
                        point_a: a,
                        point_b: b,
                        face_a: Some(index),
                        face_b: None,
                    });
                    let e = self.data.edges.len() - 1;
                    self.edges.insert(key, e);
                    e
                }
            };
            edges.push(edge);
        }

        self.data.boundaries.push(BoundaryRecord {
            name: name.to_string(),
            enabled: true,
            edges,
            triggers: Vec::new(),
            trigger_axis: None,
        });
        index
    }

    /// The edge joining two corners, if any boundary has walked it.
    pub fn edge_between(&self, a: Vec3, b: Vec3) -> Option<usize> {
        let a = *self.points.get(&a.to_array().map(f32::to_bits))?;
        let b = *self.points.get(&b.to_array().map(f32::to_bits))?;
        self.edges.get(&(a.min(b), a.max(b))).copied()
    }

    pub fn set_edge_flags(&mut self, edge: usize, flags: EdgeFlags) {
        if let Some(record) = self.data.edges.get_mut(edge) {
            record.flags = flags;
        }
    }

    pub fn set_trigger_axis(&mut self, boundary: usize, direction: Vec3, offset: f32) {
        if let Some(record) = self.data.boundaries.get_mut(boundary) {
            record.trigger_axis = Some(TriggerAxis { direction, offset });
        }
    }

    pub fn add_trigger(&mut self, boundary: usize, zone: ZoneId, data: u32, distance: f32) {
        if let Some(record) = self.data.boundaries.get_mut(boundary) {
            record.triggers.push(PathTrigger {
                zone,
                data,
                distance,
            });
        }
    }

    pub fn build(self) -> MeshData {
        self.data
    }
}
