pub mod chunk;
pub mod header;
pub mod reader;

use std::path::Path;

use cgmath::{Vector2, Vector3};
use tracing::{debug, info};

use crate::error::Result;

use self::{
    chunk::{decode_chunks, BoneLink, Chunk, ChunkData, GroupRecord},
    header::Header,
    reader::BinaryReader,
};

/// A GMDC file: the RCOL header followed by its framed chunks.
#[derive(Debug, Clone)]
pub struct GmdcFile {
    pub header: Header,
    pub chunks: Vec<Chunk>,
}

impl GmdcFile {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        let header = Header::read(&mut reader)?;
        let chunks = decode_chunks(&mut reader)?;
        debug!(chunks = chunks.len(), bytes = bytes.len(), "decoded GMDC file");
        Ok(GmdcFile { header, chunks })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "reading GMDC file");
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Decode every chunk and merge same-kind chunks into flat tables.
    pub fn data(&self) -> Result<GmdcData> {
        GmdcData::from_chunks(&self.chunks)
    }
}

/// The flat tables of a GMDC file. Chunks of the same kind are appended in
/// file order, so group spans index into the concatenation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GmdcData {
    pub vertices: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub uvs: Vec<Vector2<f32>>,
    pub bone_assignments: Vec<Vec<usize>>,
    pub bone_weights: Vec<Vec<f32>>,
    pub faces: Vec<u16>,
    pub bone_links: Vec<BoneLink>,
    /// `None` when the file carries no group chunk at all.
    pub groups: Option<Vec<GroupRecord>>,
}

impl GmdcData {
    pub fn from_chunks(chunks: &[Chunk]) -> Result<Self> {
        let mut data = GmdcData::default();

        for chunk in chunks {
            match chunk.data()? {
                ChunkData::Vertices(v) => data.vertices.extend(v),
                ChunkData::Normals(v) => data.normals.extend(v),
                ChunkData::UvCoordinates(v) => data.uvs.extend(v),
                ChunkData::BoneAssignments(v) => data.bone_assignments.extend(v),
                ChunkData::BoneWeights(v) => data.bone_weights.extend(v),
                ChunkData::Faces(v) => data.faces.extend(v),
                ChunkData::BoneLinks(v) => data.bone_links.extend(v),
                ChunkData::Groups(v) => data.groups.get_or_insert_with(Vec::new).extend(v),
                ChunkData::Unknown => {}
            }
        }

        debug!(
            vertices = data.vertices.len(),
            faces = data.faces.len(),
            bones = data.bone_links.len(),
            groups = data.groups.as_ref().map_or(0, Vec::len),
            "merged GMDC tables"
        );

        Ok(data)
    }
}

/// Decode a whole GMDC buffer into its flat tables.
pub fn decode(bytes: &[u8]) -> Result<GmdcData> {
    GmdcFile::from_bytes(bytes)?.data()
}
