// Common test utilities: builds GMDC byte buffers in memory
#![allow(dead_code)]

use gmdc_tools_lib::gmdc::{
    chunk::ChunkKind,
    header::{GMDC_BLOCK_ID, GMDC_BLOCK_NAME, GMDC_FILE_TYPE},
};

pub const FLOAT1: u32 = 0;
pub const FLOAT2: u32 = 1;
pub const FLOAT3: u32 = 2;
pub const PACKED_BYTES: u32 = 4;
pub const INDEX16: u32 = 5;
pub const RECORD: u32 = 6;

pub const TRIANGLE_LIST: u32 = 2;
pub const QUAD_LIST: u32 = 4;

/// Write a 7-bit length prefixed string
pub fn write_string(out: &mut Vec<u8>, s: &str) {
    let mut len = s.len();
    loop {
        let byte = (len & 0x7F) as u8;
        len >>= 7;
        if len == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out.extend_from_slice(s.as_bytes());
}

pub fn header_bytes(file_type: u32) -> Vec<u8> {
    let mut out = vec![];
    out.extend_from_slice(&file_type.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // links
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&GMDC_BLOCK_ID.to_le_bytes());
    write_string(&mut out, GMDC_BLOCK_NAME);
    out.extend_from_slice(&GMDC_BLOCK_ID.to_le_bytes());
    out.extend_from_slice(&4u32.to_le_bytes());
    out
}

pub fn chunk_bytes(kind: u32, format: u32, count: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![];
    for v in [kind, format, count, payload.len() as u32] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(payload);
    out
}

pub fn floats(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[derive(Debug, Clone)]
pub struct BoneSpec {
    pub name: String,
    pub position: [f32; 3],
    /// w, x, y, z
    pub rotation: [f32; 4],
    pub parent: i32,
}

impl BoneSpec {
    pub fn new(name: &str, position: [f32; 3], parent: i32) -> Self {
        Self {
            name: name.to_string(),
            position,
            rotation: [1.0, 0.0, 0.0, 0.0],
            parent,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub name: String,
    pub primitive: u32,
    pub vertices: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub bone_assign: Vec<Vec<u8>>,
    pub bone_weight: Vec<Vec<f32>>,
    pub faces: Vec<u16>,
}

impl GroupSpec {
    /// A unit quad in the z = 1 plane, fully weighted to bone 0
    pub fn quad(name: &str) -> Self {
        Self {
            name: name.to_string(),
            primitive: QUAD_LIST,
            vertices: vec![
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 1.0],
                [1.0, 1.0, 1.0],
                [0.0, 1.0, 1.0],
            ],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            bone_assign: vec![vec![0]; 4],
            bone_weight: vec![vec![1.0]; 4],
            faces: vec![0, 1, 2, 3],
        }
    }

    pub fn triangle(name: &str) -> Self {
        Self {
            name: name.to_string(),
            primitive: TRIANGLE_LIST,
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            bone_assign: vec![vec![0]; 3],
            bone_weight: vec![vec![1.0]; 3],
            faces: vec![0, 1, 2],
        }
    }
}

/// Byte-level builder for a whole GMDC file
#[derive(Debug, Clone)]
pub struct GmdcBuilder {
    pub file_type: u32,
    pub bones: Vec<BoneSpec>,
    pub groups: Vec<GroupSpec>,
    /// Emit a Groups chunk even when `groups` is empty
    pub write_groups: bool,
    /// Width of each bone weight element (1-3)
    pub weight_width: usize,
    pub extra_chunks: Vec<Vec<u8>>,
    pub trailing: Vec<u8>,
}

impl Default for GmdcBuilder {
    fn default() -> Self {
        Self {
            file_type: GMDC_FILE_TYPE,
            bones: vec![],
            groups: vec![],
            write_groups: true,
            weight_width: 3,
            extra_chunks: vec![],
            trailing: vec![],
        }
    }
}

fn span(out: &mut Vec<u8>, offset: usize, count: usize) {
    out.extend_from_slice(&(offset as u32).to_le_bytes());
    out.extend_from_slice(&(count as u32).to_le_bytes());
}

impl GmdcBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bone(mut self, bone: BoneSpec) -> Self {
        self.bones.push(bone);
        self
    }

    pub fn group(mut self, group: GroupSpec) -> Self {
        self.groups.push(group);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = header_bytes(self.file_type);

        let mut vertices = vec![];
        let mut normals = vec![];
        let mut uvs = vec![];
        let mut assign = vec![];
        let mut weights = vec![];
        let mut faces = vec![];
        let mut records = vec![];
        let (mut nv, mut nn, mut nu, mut na, mut nw, mut nf) = (0, 0, 0, 0, 0, 0);

        for g in &self.groups {
            write_string(&mut records, &g.name);
            records.extend_from_slice(&g.primitive.to_le_bytes());
            span(&mut records, nv, g.vertices.len());
            span(&mut records, nn, g.normals.len());
            span(&mut records, nu, g.uvs.len());
            span(&mut records, na, g.bone_assign.len());
            span(&mut records, nw, g.bone_weight.len());
            span(&mut records, nf, g.faces.len());

            for v in &g.vertices {
                vertices.extend(floats(v));
            }
            for n in &g.normals {
                normals.extend(floats(n));
            }
            for uv in &g.uvs {
                uvs.extend(floats(uv));
            }
            for a in &g.bone_assign {
                let mut slots = [0xFFu8; 4];
                slots[..a.len()].copy_from_slice(a);
                assign.extend_from_slice(&slots);
            }
            for w in &g.bone_weight {
                let mut padded = vec![0.0f32; self.weight_width];
                padded[..w.len()].copy_from_slice(w);
                weights.extend(floats(&padded));
            }
            for f in &g.faces {
                faces.extend_from_slice(&f.to_le_bytes());
            }

            nv += g.vertices.len();
            nn += g.normals.len();
            nu += g.uvs.len();
            na += g.bone_assign.len();
            nw += g.bone_weight.len();
            nf += g.faces.len();
        }

        if !self.bones.is_empty() {
            let mut payload = vec![];
            for b in &self.bones {
                write_string(&mut payload, &b.name);
                payload.extend(floats(&b.position));
                payload.extend(floats(&b.rotation));
                payload.extend_from_slice(&b.parent.to_le_bytes());
            }
            out.extend(chunk_bytes(
                ChunkKind::BONE_LINKS,
                RECORD,
                self.bones.len() as u32,
                &payload,
            ));
        }

        let weight_format = match self.weight_width {
            1 => FLOAT1,
            2 => FLOAT2,
            _ => FLOAT3,
        };

        if nv > 0 {
            out.extend(chunk_bytes(ChunkKind::VERTICES, FLOAT3, nv as u32, &vertices));
        }
        if nn > 0 {
            out.extend(chunk_bytes(ChunkKind::NORMALS, FLOAT3, nn as u32, &normals));
        }
        if nu > 0 {
            out.extend(chunk_bytes(ChunkKind::UV_COORDINATES, FLOAT2, nu as u32, &uvs));
        }
        if na > 0 {
            out.extend(chunk_bytes(
                ChunkKind::BONE_ASSIGNMENTS,
                PACKED_BYTES,
                na as u32,
                &assign,
            ));
        }
        if nw > 0 {
            out.extend(chunk_bytes(ChunkKind::BONE_WEIGHTS, weight_format, nw as u32, &weights));
        }
        if nf > 0 {
            out.extend(chunk_bytes(ChunkKind::FACES, INDEX16, nf as u32, &faces));
        }

        for extra in &self.extra_chunks {
            out.extend_from_slice(extra);
        }

        if self.write_groups {
            out.extend(chunk_bytes(
                ChunkKind::GROUPS,
                RECORD,
                self.groups.len() as u32,
                &records,
            ));
        }

        out.extend_from_slice(&self.trailing);
        out
    }
}

/// One root bone and one quad group
pub fn quad_scenario() -> GmdcBuilder {
    GmdcBuilder::new()
        .bone(BoneSpec::new("root", [0.0, 0.0, 0.0], -1))
        .group(GroupSpec::quad("quad"))
}

/// A root with two children, one rotated a quarter turn about z
pub fn three_bone_skeleton() -> Vec<BoneSpec> {
    let half = std::f32::consts::FRAC_1_SQRT_2;
    let mut arm = BoneSpec::new("arm", [1.0, 0.0, 0.0], 0);
    arm.rotation = [half, 0.0, 0.0, half];
    vec![
        BoneSpec::new("root", [0.0, 1.0, 0.0], -1),
        arm,
        BoneSpec::new("leg", [0.0, -1.0, 1.0], 0),
    ]
}
