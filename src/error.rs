use thiserror::Error;

use crate::actor::ActorId;
use crate::mesh::{BoundaryId, EdgeId};

/// Failures raised by a [`crate::storage::Storage`] implementation.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("storage is not open for {0}")]
    WrongMode(&'static str),
    #[error("string of {0} bytes does not fit a 16-bit length prefix")]
    StringTooLong(usize),
    #[error("string data is not valid UTF-8")]
    InvalidString(#[from] std::string::FromUtf8Error),
}

/// A host command that could not be applied.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("no actor was spawned with host id {0}")]
    UnknownHostActor(u32),
    #[error("{action} command is missing its {field} field")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },
    #[error("mesh has no edge {0}")]
    UnknownEdge(usize),
    #[error(transparent)]
    Nav(#[from] NavError),
}

/// Failures while loading or validating a serialized navigation mesh.
///
/// All of these are fatal to the world that requested the load.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{section} section references {kind} {index}, but only {count} exist")]
    IndexOutOfRange {
        section: &'static str,
        kind: &'static str,
        index: usize,
        count: usize,
    },
    #[error("edge {0} does not border any boundary")]
    DetachedEdge(usize),
    #[error("edge {0} has both endpoints on the same point")]
    DegenerateEdge(usize),
    #[error("boundary {boundary} lists edge {edge}, but the edge does not name it as a face")]
    FaceMismatch { boundary: usize, edge: usize },
    #[error("boundary {0} has fewer than three edges")]
    NotEnoughEdges(usize),
    #[error("boundary {boundary} edges {edge} and {next} do not share a vertex in winding order")]
    BrokenWinding {
        boundary: usize,
        edge: usize,
        next: usize,
    },
    #[error("boundary {0} has zero area")]
    DegenerateBoundary(usize),
    #[error("boundary {0} is not convex")]
    ConcaveBoundary(usize),
    #[error("boundary {0} is not planar")]
    NonPlanarBoundary(usize),
    #[error("boundary {0} has a zero-length trigger axis")]
    DegenerateTriggerAxis(usize),
    #[error("boundary name {0:?} is used more than once")]
    DuplicateBoundaryName(String),
    #[error("mesh has {count} {kind}, more than a 16-bit index can address")]
    TooLarge { kind: &'static str, count: usize },
}

/// Recoverable and contract failures raised while navigating.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum NavError {
    #[error("actor {0:?} is already a member of boundary {1:?}")]
    ActorAlreadyPresent(ActorId, BoundaryId),
    #[error("actor {0:?} is not a member of boundary {1:?}")]
    ActorNotPresent(ActorId, BoundaryId),
    #[error("actor {0:?} is not registered with this controller")]
    UnknownActor(ActorId),
    #[error("no boundary is named {0:?}")]
    UnknownBoundary(String),
    #[error("no named location {0:?}")]
    UnknownLocation(String),
    #[error("no trigger zone is named {0:?}")]
    UnknownZone(String),
    #[error("boundary {boundary:?} has no edge at position {index}")]
    EdgeIndexOutOfRange { boundary: BoundaryId, index: usize },
    #[error("edge {edge:?} does not border boundary {boundary:?}")]
    FaceNotBordered { edge: EdgeId, boundary: BoundaryId },
    #[error("edge {0:?} offers no passage out of the boundary")]
    NoTransition(EdgeId),
    #[error("no route connects the start and goal under the requested mask")]
    NoRoute,
    #[error("point is not inside any boundary")]
    OutsideMesh,
    #[error("curve segment has no length")]
    DegenerateCurve,
    #[error("direction or up vector cannot be normalized")]
    DegenerateFrame,
    #[error("actor {0:?} has no current boundary")]
    NotPlaced(ActorId),
}

/// Failures while saving or restoring an actor's navigation state.
#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Nav(#[from] NavError),
}
