use cgmath::{Vector2, Vector3};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    error::{GmdcError, GroupError, Result},
    gmdc::{
        chunk::{GroupRecord, Primitive, Span},
        GmdcData,
    },
    math::AxisReflection,
};

/// One mesh subset of a GMDC file. Every table is sliced out of the file's
/// flat tables, and face indices address `vertices` directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelGroup {
    pub name: String,
    pub primitive: Primitive,
    pub vertices: Vec<Vector3<f32>>,
    pub faces: Vec<Vec<u32>>,
    pub normals: Vec<Vector3<f32>>,
    pub uvs: Vec<Vector2<f32>>,
    pub bone_assign: Vec<Vec<usize>>,
    pub bone_weight: Vec<Vec<f32>>,
}

impl ModelGroup {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check that the per-vertex tables line up and that every face index
    /// points at a vertex of this group.
    pub fn validate(&self) -> std::result::Result<(), GroupError> {
        let vertices = self.vertices.len();
        if [
            self.normals.len(),
            self.uvs.len(),
            self.bone_assign.len(),
            self.bone_weight.len(),
        ]
        .iter()
        .any(|&len| len != vertices)
        {
            return Err(GroupError::Mismatch {
                group: self.name.clone(),
                vertices,
                normals: self.normals.len(),
                uvs: self.uvs.len(),
                assignments: self.bone_assign.len(),
                weights: self.bone_weight.len(),
            });
        }

        for (face, indices) in self.faces.iter().enumerate() {
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices) {
                return Err(GroupError::FaceIndexOutOfRange {
                    group: self.name.clone(),
                    face,
                    index,
                    vertex_count: vertices,
                });
            }
        }

        Ok(())
    }

    /// UVs expanded to one entry per face corner, in face order.
    pub fn loop_uvs(&self) -> Vec<Vector2<f32>> {
        self.faces
            .iter()
            .flatten()
            .map(|&i| {
                self.uvs
                    .get(i as usize)
                    .copied()
                    .unwrap_or_else(|| Vector2::new(0.0, 0.0))
            })
            .collect()
    }

    /// Mirror positions and normals. Face winding is left as authored.
    pub fn reflect(&mut self, reflection: &AxisReflection) {
        for v in self.vertices.iter_mut() {
            *v = reflection.point(*v);
        }
        for n in self.normals.iter_mut() {
            *n = reflection.point(*n);
        }
    }
}

fn slice_span<T: Clone>(
    table: &[T],
    span: Span,
    group: &str,
    name: &'static str,
) -> Result<Vec<T>> {
    let range = span.range();
    table
        .get(range)
        .map(<[T]>::to_vec)
        .ok_or_else(|| GmdcError::SpanOutOfRange {
            group: group.to_string(),
            table: name,
            offset: span.offset,
            count: span.count,
            len: table.len(),
        })
}

fn build_group(data: &GmdcData, record: &GroupRecord) -> Result<ModelGroup> {
    let name = record.name.as_str();

    let vertices = slice_span(&data.vertices, record.vertices, name, "vertices")?;
    let normals = slice_span(&data.normals, record.normals, name, "normals")?;
    let uvs = slice_span(&data.uvs, record.uvs, name, "uvs")?;
    let bone_assign = slice_span(
        &data.bone_assignments,
        record.bone_assignments,
        name,
        "bone assignments",
    )?;
    let bone_weight = slice_span(&data.bone_weights, record.bone_weights, name, "bone weights")?;
    let indices = slice_span(&data.faces, record.faces, name, "faces")?;

    let arity = record.primitive.arity();
    if indices.len() % arity != 0 {
        return Err(GmdcError::RaggedFaces {
            group: record.name.clone(),
            count: indices.len(),
            arity,
        });
    }
    let faces = indices
        .chunks_exact(arity)
        .map(|face| face.iter().map(|&i| i as u32).collect())
        .collect();

    Ok(ModelGroup {
        name: record.name.clone(),
        primitive: record.primitive,
        vertices,
        faces,
        normals,
        uvs,
        bone_assign,
        bone_weight,
    })
}

/// Split the flat tables into model groups.
///
/// Returns `Ok(None)` when the file has nothing to render: no group chunk, no
/// group records or an empty vertex table. Groups are not validated here; a
/// group with inconsistent counts is still returned so the caller can report
/// it by name.
pub fn assemble(data: &GmdcData) -> Result<Option<Vec<ModelGroup>>> {
    let records = match &data.groups {
        Some(records) if !records.is_empty() && !data.vertices.is_empty() => records,
        _ => {
            info!("file carries no renderable geometry");
            return Ok(None);
        }
    };

    let groups = records
        .iter()
        .map(|record| build_group(data, record))
        .collect::<Result<Vec<_>>>()?;

    for group in &groups {
        debug!(
            group = %group.name,
            vertices = group.vertex_count(),
            faces = group.face_count(),
            "assembled group"
        );
    }

    Ok(Some(groups))
}
