use serde::Serialize;
use thiserror::Error;

use crate::gmdc::chunk::{ChunkKind, ElementFormat};

/// Broad classification of a fatal decode error, for hosts that only need to
/// tell "wrong file" apart from "broken file".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    Truncated,
    Corrupt,
    Io,
}

/// Errors that abort a whole import. Nothing has been handed to the scene
/// target when one of these is returned.
#[derive(Debug, Error)]
pub enum GmdcError {
    #[error("Unsupported GMDC version {file_type:#010x}")]
    UnsupportedFormat { file_type: u32 },

    #[error("Unexpected end of data at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedInput {
        offset: u64,
        needed: usize,
        available: usize,
    },

    #[error("Chunk {kind}: expected {expected} payload bytes, found {actual}")]
    ChunkSizeMismatch {
        kind: ChunkKind,
        expected: usize,
        actual: usize,
    },

    #[error("Chunk {kind}: unknown element format code {code}")]
    UnknownFormat { kind: ChunkKind, code: u32 },

    #[error("Chunk {kind}: elements of format {format:?} are not allowed")]
    UnexpectedFormat {
        kind: ChunkKind,
        format: ElementFormat,
    },

    #[error("Invalid string at offset {offset}")]
    InvalidString { offset: u64 },

    #[error("Bone {index} '{name}' references parent {parent}, which is not an earlier bone")]
    InvalidBoneParent {
        index: usize,
        name: String,
        parent: i32,
    },

    #[error("Group '{group}': unknown primitive type {code}")]
    UnknownPrimitive { group: String, code: u32 },

    #[error("Group '{group}': {table} span {offset}+{count} exceeds table length {len}")]
    SpanOutOfRange {
        group: String,
        table: &'static str,
        offset: u32,
        count: u32,
        len: usize,
    },

    #[error("Group '{group}': {count} face indices is not a multiple of {arity}")]
    RaggedFaces {
        group: String,
        count: usize,
        arity: usize,
    },

    #[error("Parse error at offset {offset}: {message}")]
    Parse { offset: u64, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GmdcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GmdcError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            GmdcError::TruncatedInput { .. } => ErrorKind::Truncated,
            GmdcError::Io(_) => ErrorKind::Io,
            _ => ErrorKind::Corrupt,
        }
    }

    /// Convert a binrw failure at `offset`. Reads are bounds-checked before they
    /// reach binrw, so an EOF here still means the buffer ran out.
    pub(crate) fn from_binrw(err: binrw::Error, offset: u64) -> Self {
        match err {
            binrw::Error::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                GmdcError::TruncatedInput {
                    offset,
                    needed: 0,
                    available: 0,
                }
            }
            other => GmdcError::Parse {
                offset,
                message: other.to_string(),
            },
        }
    }
}

/// Per-group problems. The group is skipped and the rest of the import carries on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GroupError {
    #[error(
        "Group {group}'s vertex index counts don't match \
         (vertices {vertices}, normals {normals}, uvs {uvs}, bone assignments {assignments}, bone weights {weights})"
    )]
    Mismatch {
        group: String,
        vertices: usize,
        normals: usize,
        uvs: usize,
        assignments: usize,
        weights: usize,
    },

    #[error("Group {group}: face {face} references vertex {index}, but the group has {vertex_count} vertices")]
    FaceIndexOutOfRange {
        group: String,
        face: usize,
        index: u32,
        vertex_count: usize,
    },

    #[error("Group {group}: vertex {vertex} references bone {bone}, but only {bone_count} bone groups exist")]
    UnknownBone {
        group: String,
        vertex: usize,
        bone: usize,
        bone_count: usize,
    },

    #[error("Group {group}: vertex {vertex} has {bones} bone slots but only {weights} weights")]
    WeightSlotMismatch {
        group: String,
        vertex: usize,
        bones: usize,
        weights: usize,
    },
}

impl GroupError {
    /// Name of the group the error was raised for.
    pub fn group(&self) -> &str {
        match self {
            GroupError::Mismatch { group, .. }
            | GroupError::FaceIndexOutOfRange { group, .. }
            | GroupError::UnknownBone { group, .. }
            | GroupError::WeightSlotMismatch { group, .. } => group,
        }
    }
}

/// Non-fatal findings collected into an import report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportWarning {
    #[error("No renderable geometry found; only the skeleton was imported")]
    NoGeometry,

    #[error(transparent)]
    Group(#[from] GroupError),
}

/// Result type for decode operations
pub type Result<T> = std::result::Result<T, GmdcError>;
