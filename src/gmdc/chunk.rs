use std::{fmt, ops::Range};

use binrw::binread;
use cgmath::{Quaternion, Vector2, Vector3};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{GmdcError, Result};

use super::reader::BinaryReader;

pub const CHUNK_HEADER_LEN: usize = 16;

/// Marks an unused slot in a packed bone assignment.
pub const UNUSED_BONE_SLOT: u8 = 0xFF;

/// Identity of a chunk, taken from the first word of its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChunkKind {
    Vertices,
    Normals,
    UvCoordinates,
    BoneAssignments,
    BoneWeights,
    Faces,
    BoneLinks,
    Groups,
    Unknown(u32),
}

impl ChunkKind {
    pub const VERTICES: u32 = 0x5B830781;
    pub const NORMALS: u32 = 0x3B83078B;
    pub const UV_COORDINATES: u32 = 0xBB8307AB;
    pub const BONE_ASSIGNMENTS: u32 = 0xFBD70111;
    pub const BONE_WEIGHTS: u32 = 0x3BD70105;
    pub const FACES: u32 = 0x1D6F3E54;
    pub const BONE_LINKS: u32 = 0xE9E1D0A2;
    pub const GROUPS: u32 = 0x4A2C8F17;

    pub fn from_identity(identity: u32) -> Self {
        match identity {
            Self::VERTICES => ChunkKind::Vertices,
            Self::NORMALS => ChunkKind::Normals,
            Self::UV_COORDINATES => ChunkKind::UvCoordinates,
            Self::BONE_ASSIGNMENTS => ChunkKind::BoneAssignments,
            Self::BONE_WEIGHTS => ChunkKind::BoneWeights,
            Self::FACES => ChunkKind::Faces,
            Self::BONE_LINKS => ChunkKind::BoneLinks,
            Self::GROUPS => ChunkKind::Groups,
            other => ChunkKind::Unknown(other),
        }
    }

    pub fn identity(self) -> u32 {
        match self {
            ChunkKind::Vertices => Self::VERTICES,
            ChunkKind::Normals => Self::NORMALS,
            ChunkKind::UvCoordinates => Self::UV_COORDINATES,
            ChunkKind::BoneAssignments => Self::BONE_ASSIGNMENTS,
            ChunkKind::BoneWeights => Self::BONE_WEIGHTS,
            ChunkKind::Faces => Self::FACES,
            ChunkKind::BoneLinks => Self::BONE_LINKS,
            ChunkKind::Groups => Self::GROUPS,
            ChunkKind::Unknown(identity) => identity,
        }
    }

    /// Whether elements of `format` may appear in a chunk of this kind.
    pub fn accepts(self, format: ElementFormat) -> bool {
        use ElementFormat::*;
        match self {
            ChunkKind::Vertices | ChunkKind::Normals => format == Float3,
            ChunkKind::UvCoordinates => format == Float2,
            ChunkKind::BoneAssignments => format == PackedBytes,
            ChunkKind::BoneWeights => matches!(format, Float1 | Float2 | Float3),
            ChunkKind::Faces => format == Index16,
            ChunkKind::BoneLinks | ChunkKind::Groups => format == Record,
            ChunkKind::Unknown(_) => true,
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkKind::Vertices => "Vertices",
            ChunkKind::Normals => "Normals",
            ChunkKind::UvCoordinates => "UvCoordinates",
            ChunkKind::BoneAssignments => "BoneAssignments",
            ChunkKind::BoneWeights => "BoneWeights",
            ChunkKind::Faces => "Faces",
            ChunkKind::BoneLinks => "BoneLinks",
            ChunkKind::Groups => "Groups",
            ChunkKind::Unknown(_) => "Unknown",
        };
        write!(f, "{} ({:#010x})", name, self.identity())
    }
}

/// Layout of a single element inside a chunk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElementFormat {
    Float1,
    Float2,
    Float3,
    PackedBytes,
    Index16,
    /// Variable-length records; the chunk's payload length is authoritative.
    Record,
}

impl ElementFormat {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(ElementFormat::Float1),
            1 => Some(ElementFormat::Float2),
            2 => Some(ElementFormat::Float3),
            4 => Some(ElementFormat::PackedBytes),
            5 => Some(ElementFormat::Index16),
            6 => Some(ElementFormat::Record),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            ElementFormat::Float1 => 0,
            ElementFormat::Float2 => 1,
            ElementFormat::Float3 => 2,
            ElementFormat::PackedBytes => 4,
            ElementFormat::Index16 => 5,
            ElementFormat::Record => 6,
        }
    }

    /// Bytes per element, `None` for records.
    pub fn stride(self) -> Option<usize> {
        match self {
            ElementFormat::Float1 | ElementFormat::PackedBytes => Some(4),
            ElementFormat::Float2 => Some(8),
            ElementFormat::Float3 => Some(12),
            ElementFormat::Index16 => Some(2),
            ElementFormat::Record => None,
        }
    }

    /// Number of floats per element for the float formats.
    pub fn float_components(self) -> usize {
        match self {
            ElementFormat::Float1 => 1,
            ElementFormat::Float2 => 2,
            ElementFormat::Float3 => 3,
            _ => 0,
        }
    }
}

#[binread]
#[derive(Debug, Clone, Copy)]
#[br(little)]
struct ChunkHeader {
    kind: u32,
    format: u32,
    element_count: u32,
    payload_len: u32,
}

/// A framed chunk with its payload still undecoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub kind: ChunkKind,
    pub format: ElementFormat,
    pub element_count: u32,
    pub payload: Vec<u8>,
}

/// Offset and length of a group's slice of one flat table.
#[binread]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[br(little)]
pub struct Span {
    pub offset: u32,
    pub count: u32,
}

impl Span {
    pub fn new(offset: u32, count: u32) -> Self {
        Self { offset, count }
    }

    pub fn range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.count as usize
    }
}

/// How a group's face indices are grouped into polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Primitive {
    TriangleList,
    QuadList,
}

impl Primitive {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            2 => Some(Primitive::TriangleList),
            4 => Some(Primitive::QuadList),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Primitive::TriangleList => 2,
            Primitive::QuadList => 4,
        }
    }

    /// Indices per face.
    pub fn arity(self) -> usize {
        match self {
            Primitive::TriangleList => 3,
            Primitive::QuadList => 4,
        }
    }
}

/// Entry of the bone link table. `parent` is `-1` for roots.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneLink {
    pub name: String,
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub parent: i32,
}

impl BoneLink {
    fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let name = reader.read_string()?;
        let position = reader.read_vector3()?;
        let rotation = reader.read_quaternion()?;
        let parent = reader.read_i32()?;
        Ok(BoneLink {
            name,
            position,
            rotation,
            parent,
        })
    }
}

/// Group metadata: a name, a primitive type and one span per flat table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRecord {
    pub name: String,
    pub primitive: Primitive,
    pub vertices: Span,
    pub normals: Span,
    pub uvs: Span,
    pub bone_assignments: Span,
    pub bone_weights: Span,
    pub faces: Span,
}

impl GroupRecord {
    fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let name = reader.read_string()?;
        let code = reader.read_u32()?;
        let primitive = Primitive::from_code(code).ok_or_else(|| GmdcError::UnknownPrimitive {
            group: name.clone(),
            code,
        })?;

        let mut spans = [Span::default(); 6];
        for span in spans.iter_mut() {
            *span = reader.read_struct::<Span>(8)?;
        }
        let [vertices, normals, uvs, bone_assignments, bone_weights, faces] = spans;

        Ok(GroupRecord {
            name,
            primitive,
            vertices,
            normals,
            uvs,
            bone_assignments,
            bone_weights,
            faces,
        })
    }
}

/// Typed contents of one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkData {
    Vertices(Vec<Vector3<f32>>),
    Normals(Vec<Vector3<f32>>),
    UvCoordinates(Vec<Vector2<f32>>),
    BoneAssignments(Vec<Vec<usize>>),
    BoneWeights(Vec<Vec<f32>>),
    Faces(Vec<u16>),
    BoneLinks(Vec<BoneLink>),
    Groups(Vec<GroupRecord>),
    Unknown,
}

fn read_elements<'a, T>(
    reader: &mut BinaryReader<'a>,
    count: u32,
    min_size: usize,
    mut read: impl FnMut(&mut BinaryReader<'a>) -> Result<T>,
) -> Result<Vec<T>> {
    let mut items = Vec::with_capacity(reader.capacity_for(count, min_size));
    for _ in 0..count {
        items.push(read(reader)?);
    }
    Ok(items)
}

impl Chunk {
    /// Decode the payload into typed elements.
    ///
    /// The element format is checked against the kind again, since a `Chunk`
    /// may be built by hand rather than by [`decode_chunks`].
    pub fn data(&self) -> Result<ChunkData> {
        if !self.kind.accepts(self.format) {
            return Err(GmdcError::UnexpectedFormat {
                kind: self.kind,
                format: self.format,
            });
        }

        let mut reader = BinaryReader::new(&self.payload);
        let count = self.element_count;

        let data = match self.kind {
            ChunkKind::Vertices => {
                ChunkData::Vertices(read_elements(&mut reader, count, 12, |r| r.read_vector3())?)
            }
            ChunkKind::Normals => {
                ChunkData::Normals(read_elements(&mut reader, count, 12, |r| r.read_vector3())?)
            }
            ChunkKind::UvCoordinates => ChunkData::UvCoordinates(read_elements(
                &mut reader,
                count,
                8,
                |r| r.read_vector2(),
            )?),
            ChunkKind::BoneAssignments => {
                ChunkData::BoneAssignments(read_elements(&mut reader, count, 4, |r| {
                    let slots = r.read_bytes(4)?;
                    Ok(slots
                        .iter()
                        .take_while(|&&slot| slot != UNUSED_BONE_SLOT)
                        .map(|&slot| slot as usize)
                        .collect())
                })?)
            }
            ChunkKind::BoneWeights => {
                let components = self.format.float_components();
                ChunkData::BoneWeights(read_elements(&mut reader, count, components * 4, |r| {
                    (0..components).map(|_| r.read_f32()).collect()
                })?)
            }
            ChunkKind::Faces => {
                ChunkData::Faces(read_elements(&mut reader, count, 2, |r| r.read_u16())?)
            }
            ChunkKind::BoneLinks => {
                ChunkData::BoneLinks(read_elements(&mut reader, count, 33, BoneLink::read)?)
            }
            ChunkKind::Groups => {
                ChunkData::Groups(read_elements(&mut reader, count, 53, GroupRecord::read)?)
            }
            ChunkKind::Unknown(_) => return Ok(ChunkData::Unknown),
        };

        if !reader.is_empty() {
            return Err(GmdcError::ChunkSizeMismatch {
                kind: self.kind,
                expected: self.payload.len() - reader.remaining(),
                actual: self.payload.len(),
            });
        }

        Ok(data)
    }
}

/// Read chunks until the buffer is exhausted.
///
/// Unknown chunk kinds are skipped. Bytes that cannot form a chunk at the end
/// of the buffer are ignored.
pub fn decode_chunks(reader: &mut BinaryReader<'_>) -> Result<Vec<Chunk>> {
    let mut chunks = vec![];

    while !reader.is_empty() {
        if reader.remaining() < CHUNK_HEADER_LEN {
            warn!(
                trailing = reader.remaining(),
                offset = reader.position(),
                "ignoring trailing bytes after last chunk"
            );
            break;
        }

        let offset = reader.position();
        let header = reader.read_struct::<ChunkHeader>(CHUNK_HEADER_LEN)?;
        let kind = ChunkKind::from_identity(header.kind);
        let payload_len = header.payload_len as usize;

        if let ChunkKind::Unknown(identity) = kind {
            if payload_len > reader.remaining() {
                warn!(
                    identity = %format!("{:#010x}", identity),
                    offset,
                    trailing = reader.remaining() + CHUNK_HEADER_LEN,
                    "ignoring trailing bytes that do not form a chunk"
                );
                break;
            }
            debug!(%kind, payload_len, "skipping unknown chunk");
            reader.read_bytes(payload_len)?;
            continue;
        }

        let format = ElementFormat::from_code(header.format).ok_or(GmdcError::UnknownFormat {
            kind,
            code: header.format,
        })?;
        if !kind.accepts(format) {
            return Err(GmdcError::UnexpectedFormat { kind, format });
        }

        if let Some(stride) = format.stride() {
            let expected = (header.element_count as usize).checked_mul(stride);
            if expected != Some(payload_len) {
                return Err(GmdcError::ChunkSizeMismatch {
                    kind,
                    expected: expected.unwrap_or(usize::MAX),
                    actual: payload_len,
                });
            }
        }

        let payload = reader.read_bytes(payload_len)?.to_vec();
        debug!(
            %kind,
            ?format,
            elements = header.element_count,
            offset,
            "read chunk"
        );

        chunks.push(Chunk {
            kind,
            format,
            element_count: header.element_count,
            payload,
        });
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn chunk_bytes(kind: u32, format: u32, count: u32, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![];
        for v in [kind, format, count, payload.len() as u32] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.extend_from_slice(payload);
        data
    }

    fn floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn kind_identity_round_trips() {
        for kind in [
            ChunkKind::Vertices,
            ChunkKind::Normals,
            ChunkKind::UvCoordinates,
            ChunkKind::BoneAssignments,
            ChunkKind::BoneWeights,
            ChunkKind::Faces,
            ChunkKind::BoneLinks,
            ChunkKind::Groups,
        ] {
            assert_eq!(ChunkKind::from_identity(kind.identity()), kind);
        }
        assert_eq!(ChunkKind::from_identity(0x1234), ChunkKind::Unknown(0x1234));
    }

    #[test]
    fn decodes_vertex_chunk() {
        let data = chunk_bytes(
            ChunkKind::VERTICES,
            2,
            2,
            &floats(&[1.0, 2.0, 3.0, -1.0, -2.0, -3.0]),
        );
        let chunks = decode_chunks(&mut BinaryReader::new(&data)).unwrap();
        assert_eq!(chunks.len(), 1);
        match chunks[0].data().unwrap() {
            ChunkData::Vertices(v) => {
                assert_eq!(v, vec![Vector3::new(1.0, 2.0, 3.0), Vector3::new(-1.0, -2.0, -3.0)]);
            }
            other => panic!("unexpected data {:?}", other),
        }
    }

    #[test]
    fn payload_length_must_match_stride() {
        let data = chunk_bytes(ChunkKind::VERTICES, 2, 3, &floats(&[1.0, 2.0, 3.0]));
        let err = decode_chunks(&mut BinaryReader::new(&data)).unwrap_err();
        assert!(matches!(
            err,
            GmdcError::ChunkSizeMismatch {
                expected: 36,
                actual: 12,
                ..
            }
        ));
    }

    #[test]
    fn rejects_wrong_format_for_kind() {
        let data = chunk_bytes(ChunkKind::UV_COORDINATES, 2, 1, &floats(&[0.0, 0.0, 0.0]));
        let err = decode_chunks(&mut BinaryReader::new(&data)).unwrap_err();
        assert!(matches!(err, GmdcError::UnexpectedFormat { .. }));
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn skips_unknown_chunks() {
        let mut data = chunk_bytes(0xCAFEBABE, 99, 1, &[1, 2, 3, 4, 5]);
        data.extend(chunk_bytes(ChunkKind::FACES, 5, 3, &[0, 0, 1, 0, 2, 0]));
        let chunks = decode_chunks(&mut BinaryReader::new(&data)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Faces);
        assert_eq!(chunks[0].data().unwrap(), ChunkData::Faces(vec![0, 1, 2]));
    }

    #[test]
    fn ignores_short_trailing_bytes() {
        let mut data = chunk_bytes(ChunkKind::FACES, 5, 1, &[7, 0]);
        data.extend_from_slice(&[0xAA; 9]);
        let chunks = decode_chunks(&mut BinaryReader::new(&data)).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn truncated_known_chunk_is_fatal() {
        let mut data = chunk_bytes(ChunkKind::FACES, 5, 4, &[0; 8]);
        data.truncate(data.len() - 3);
        let err = decode_chunks(&mut BinaryReader::new(&data)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Truncated);
    }

    #[test]
    fn bone_assignments_stop_at_unused_slot() {
        let data = chunk_bytes(
            ChunkKind::BONE_ASSIGNMENTS,
            4,
            2,
            &[3, 1, 0xFF, 0xFF, 0, 1, 2, 3],
        );
        let chunks = decode_chunks(&mut BinaryReader::new(&data)).unwrap();
        assert_eq!(
            chunks[0].data().unwrap(),
            ChunkData::BoneAssignments(vec![vec![3, 1], vec![0, 1, 2, 3]])
        );
    }

    #[test]
    fn bone_weight_width_follows_format() {
        let data = chunk_bytes(
            ChunkKind::BONE_WEIGHTS,
            1,
            2,
            &floats(&[0.75, 0.25, 0.5, 0.5]),
        );
        let chunks = decode_chunks(&mut BinaryReader::new(&data)).unwrap();
        assert_eq!(
            chunks[0].data().unwrap(),
            ChunkData::BoneWeights(vec![vec![0.75, 0.25], vec![0.5, 0.5]])
        );
    }

    #[test]
    fn hand_built_chunk_with_wrong_format_is_rejected() {
        let chunk = Chunk {
            kind: ChunkKind::BoneWeights,
            format: ElementFormat::Index16,
            element_count: u32::MAX,
            payload: vec![],
        };
        let err = chunk.data().unwrap_err();
        assert!(matches!(
            err,
            GmdcError::UnexpectedFormat {
                kind: ChunkKind::BoneWeights,
                format: ElementFormat::Index16,
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn record_chunk_must_be_consumed_exactly() {
        let mut payload = vec![4u8];
        payload.extend_from_slice(b"root");
        payload.extend(floats(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]));
        payload.extend_from_slice(&(-1i32).to_le_bytes());
        payload.extend_from_slice(&[0, 0]);

        let data = chunk_bytes(ChunkKind::BONE_LINKS, 6, 1, &payload);
        let chunks = decode_chunks(&mut BinaryReader::new(&data)).unwrap();
        let err = chunks[0].data().unwrap_err();
        assert!(matches!(
            err,
            GmdcError::ChunkSizeMismatch {
                expected: 37,
                actual: 39,
                ..
            }
        ));
    }

    #[test]
    fn group_record_rejects_unknown_primitive() {
        let mut payload = vec![1u8, b'g'];
        payload.extend_from_slice(&9u32.to_le_bytes());
        payload.extend(std::iter::repeat(0u8).take(48));

        let data = chunk_bytes(ChunkKind::GROUPS, 6, 1, &payload);
        let chunks = decode_chunks(&mut BinaryReader::new(&data)).unwrap();
        let err = chunks[0].data().unwrap_err();
        assert!(matches!(err, GmdcError::UnknownPrimitive { code: 9, .. }));
    }
}
