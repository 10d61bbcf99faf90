//! Binary mesh import format.
//!
//! All values are little-endian; strings carry a 16-bit length prefix and
//! no terminator; indices are 16-bit with `0xFFFF` meaning "none".
//!
//! ```text
//! u16 zone_count      zone:     string name, u32 flags
//! u16 point_count     point:    f32 x, f32 y, f32 z
//! u16 edge_count      edge:     u8 flags, u16 point_a, u16 point_b,
//!                               u16 face_a, u16 face_b
//! u16 boundary_count  boundary: string name, u8 flags, u8 edge_count,
//!                               u16 edge[edge_count],
//!                               u8 trigger_count,
//!                               { u16 zone, u32 data, f32 distance }[trigger_count],
//!                               if trigger_count > 0: vec3 axis, f32 offset
//! ```
//!
//! Everything geometric beyond point positions is derived on load.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::edge::EdgeFlags;
use super::MAX_INDEX;
use crate::error::{MeshError, StorageError};
use crate::storage::Storage;
use crate::trigger::{PathTrigger, TriggerAxis, TriggerZone, ZoneId};

const NONE_INDEX: u16 = 0xFFFF;
const BOUNDARY_DISABLED: u8 = 0x01;

/// Unvalidated mesh records, as stored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub zones: Vec<TriggerZone>,
    pub points: Vec<Vec3>,
    pub edges: Vec<EdgeRecord>,
    pub boundaries: Vec<BoundaryRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub flags: EdgeFlags,
    pub point_a: usize,
    pub point_b: usize,
    pub face_a: Option<usize>,
    pub face_b: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundaryRecord {
    pub name: String,
    pub enabled: bool,
    pub edges: Vec<usize>,
    pub triggers: Vec<PathTrigger>,
    pub trigger_axis: Option<TriggerAxis>,
}

// ============================================================================
// Reading
// ============================================================================

fn read_index(storage: &mut dyn Storage) -> Result<usize, StorageError> {
    Ok(storage.read_u16()? as usize)
}

fn read_optional_index(storage: &mut dyn Storage) -> Result<Option<usize>, StorageError> {
    let raw = storage.read_u16()?;
    Ok((raw != NONE_INDEX).then_some(raw as usize))
}

impl MeshData {
    /// Reads the sections in file order: zones, points, edges, boundaries.
    pub fn read(storage: &mut dyn Storage) -> Result<Self, MeshError> {
        let zone_count = storage.read_u16()?;
        let mut zones = Vec::with_capacity(zone_count as usize);
        for _ in 0..zone_count {
            let name = storage.read_string()?;
            let flags = storage.read_u32()?;
            zones.push(TriggerZone { name, flags });
        }

        let point_count = storage.read_u16()?;
        let mut points = Vec::with_capacity(point_count as usize);
        for _ in 0..point_count {
            points.push(storage.read_vec3()?);
        }

        let edge_count = storage.read_u16()?;
        let mut edges = Vec::with_capacity(edge_count as usize);
        for _ in 0..edge_count {
            let flags = EdgeFlags::from_bits(storage.read_u8()?);
            let point_a = read_index(storage)?;
            let point_b = read_index(storage)?;
            let face_a = read_optional_index(storage)?;
            let face_b = read_optional_index(storage)?;
            edges.push(EdgeRecord {
                flags,
                point_a,
                point_b,
                face_a,
                face_b,
            });
        }

        let boundary_count = storage.read_u16()?;
        let mut boundaries = Vec::with_capacity(boundary_count as usize);
        for _ in 0..boundary_count {
            let name = storage.read_string()?;
            let flags = storage.read_u8()?;
            let count = storage.read_u8()?;
            let mut boundary_edges = Vec::with_capacity(count as usize);
            for _ in 0..count {
                boundary_edges.push(read_index(storage)?);
            }

            let trigger_count = storage.read_u8()?;
            let mut triggers = Vec::with_capacity(trigger_count as usize);
            for _ in 0..trigger_count {
                let zone = ZoneId(read_index(storage)?);
                let data = storage.read_u32()?;
                let distance = storage.read_f32()?;
                triggers.push(PathTrigger {
                    zone,
                    data,
                    distance,
                });
            }
            let trigger_axis = if trigger_count > 0 {
                let direction = storage.read_vec3()?;
                let offset = storage.read_f32()?;
                Some(TriggerAxis { direction, offset })
            } else {
                None
            };

            boundaries.push(BoundaryRecord {
                name,
                enabled: flags & BOUNDARY_DISABLED == 0,
                edges: boundary_edges,
                triggers,
                trigger_axis,
            });
        }

        Ok(Self {
            zones,
            points,
            edges,
            boundaries,
        })
    }

    // ========================================================================
    // Writing
    // ========================================================================

    pub fn write(&self, storage: &mut dyn Storage) -> Result<(), MeshError> {
        write_count(storage, "zones", self.zones.len())?;
        for zone in &self.zones {
            storage.write_string(&zone.name)?;
            storage.write_u32(zone.flags)?;
        }

        write_count(storage, "points", self.points.len())?;
        for &point in &self.points {
            storage.write_vec3(point)?;
        }

        write_count(storage, "edges", self.edges.len())?;
        for edge in &self.edges {
            storage.write_u8(edge.flags.to_bits())?;
            write_index(storage, "points", edge.point_a)?;
            write_index(storage, "points", edge.point_b)?;
            write_optional_index(storage, edge.face_a)?;
            write_optional_index(storage, edge.face_b)?;
        }

        write_count(storage, "boundaries", self.boundaries.len())?;
        for boundary in &self.boundaries {
            storage.write_string(&boundary.name)?;
            storage.write_u8(if boundary.enabled { 0 } else { BOUNDARY_DISABLED })?;
            storage.write_u8(small_count("boundary edges", boundary.edges.len())?)?;
            for &edge in &boundary.edges {
                write_index(storage, "edges", edge)?;
            }

            storage.write_u8(small_count("triggers", boundary.triggers.len())?)?;
            for trigger in &boundary.triggers {
                write_index(storage, "zones", trigger.zone.0)?;
                storage.write_u32(trigger.data)?;
                storage.write_f32(trigger.distance)?;
            }
            if !boundary.triggers.is_empty() {
                let axis = boundary.trigger_axis.unwrap_or(TriggerAxis {
                    direction: Vec3::ZERO,
                    offset: 0.0,
                });
                storage.write_vec3(axis.direction)?;
                storage.write_f32(axis.offset)?;
            }
        }

        Ok(())
    }
}

fn write_count(storage: &mut dyn Storage, kind: &'static str, count: usize) -> Result<(), MeshError> {
    write_index(storage, kind, count)
}

fn write_index(storage: &mut dyn Storage, kind: &'static str, index: usize) -> Result<(), MeshError> {
    if index > MAX_INDEX {
        return Err(MeshError::TooLarge { kind, count: index });
    }
    Ok(storage.write_u16(index as u16)?)
}

fn write_optional_index(storage: &mut dyn Storage, index: Option<usize>) -> Result<(), MeshError> {
    match index {
        Some(i) => write_index(storage, "boundaries", i),
        None => Ok(storage.write_u16(NONE_INDEX)?),
    }
}

fn small_count(kind: &'static str, count: usize) -> Result<u8, MeshError> {
    u8::try_from(count).map_err(|_| MeshError::TooLarge { kind, count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn truncated_blob_fails_to_parse() {
        let mut storage = MemoryStorage::reader(vec![1, 0, 3, 0]);
        assert!(matches!(
            MeshData::read(&mut storage),
            Err(MeshError::Storage(_))
        ));
    }

    #[test]
    fn empty_sections_parse() {
        let mut storage = MemoryStorage::reader(vec![0; 8]);
        assert_eq!(MeshData::read(&mut storage).unwrap(), MeshData::default());
    }

    #[test]
    fn none_index_is_written_as_ffff() {
        let data = MeshData {
            points: vec![Vec3::ZERO, Vec3::X],
            edges: vec![EdgeRecord {
                flags: EdgeFlags::default(),
                point_a: 0,
                point_b: 1,
                face_a: Some(0),
                face_b: None,
            }],
            ..MeshData::default()
        };
        let mut out = MemoryStorage::writer();
        data.write(&mut out).unwrap();
        let bytes = out.into_bytes();
        // zones(2) + points(2 + 24) + edge count(2) + flags(1) + a,b,face_a(6)
        let face_b = &bytes[37..39];
        assert_eq!(face_b, &[0xFF, 0xFF]);
    }
}
