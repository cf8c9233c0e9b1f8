use serde::Serialize;

use crate::{error::GroupError, model::ModelGroup, skeleton::BoneGroupTable};

/// Explicit weights stored per vertex; the slot after them takes the remainder.
pub const MAX_EXPLICIT_WEIGHTS: usize = 3;

/// A single bone group contribution to one vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Influence {
    pub bone: usize,
    pub weight: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VertexWeights {
    /// Merged contributions, one per distinct bone, in first-seen order.
    pub influences: Vec<Influence>,
    /// Remainder left after the explicit weights.
    pub implicit: f32,
}

impl VertexWeights {
    pub fn total(&self) -> f32 {
        self.influences.iter().map(|i| i.weight).sum()
    }
}

/// `1 - sum` of the explicit weights.
pub fn implicit_weight(explicit: &[f32]) -> f32 {
    1.0 - explicit.iter().take(MAX_EXPLICIT_WEIGHTS).sum::<f32>()
}

/// Add `weight` to the influence on `bone`, creating it if needed.
pub fn accumulate(influences: &mut Vec<Influence>, bone: usize, weight: f32) {
    match influences.iter_mut().find(|i| i.bone == bone) {
        Some(existing) => existing.weight += weight,
        None => influences.push(Influence { bone, weight }),
    }
}

/// Pair one vertex's bone slots with its weights.
///
/// Slots with an explicit weight use it. The first slot without one receives
/// the implicit remainder. Callers reject vertices with further slots, see
/// [`assign_weights`].
pub fn normalize_vertex(bones: &[usize], explicit: &[f32]) -> VertexWeights {
    let explicit = &explicit[..explicit.len().min(MAX_EXPLICIT_WEIGHTS)];
    let implicit = implicit_weight(explicit);

    let mut influences = Vec::with_capacity(bones.len());
    for (slot, &bone) in bones.iter().enumerate() {
        let weight = match explicit.get(slot) {
            Some(&w) => w,
            None if slot == explicit.len() => implicit,
            None => break,
        };
        accumulate(&mut influences, bone, weight);
    }

    VertexWeights {
        influences,
        implicit,
    }
}

/// Resolve the weights of every vertex in `group` against `table`.
///
/// Fails when the per-vertex tables do not line up, a vertex references a
/// bone the table does not have, or a vertex has more bone slots than its
/// weights plus the implicit remainder can cover.
pub fn assign_weights(
    group: &ModelGroup,
    table: &BoneGroupTable,
) -> Result<Vec<VertexWeights>, GroupError> {
    let vertices = group.vertices.len();
    if group.bone_assign.len() != vertices || group.bone_weight.len() != vertices {
        return Err(GroupError::Mismatch {
            group: group.name.clone(),
            vertices,
            normals: group.normals.len(),
            uvs: group.uvs.len(),
            assignments: group.bone_assign.len(),
            weights: group.bone_weight.len(),
        });
    }

    group
        .bone_assign
        .iter()
        .zip(&group.bone_weight)
        .enumerate()
        .map(|(vertex, (bones, weights))| {
            if let Some(&bone) = bones.iter().find(|&&b| b >= table.len()) {
                return Err(GroupError::UnknownBone {
                    group: group.name.clone(),
                    vertex,
                    bone,
                    bone_count: table.len(),
                });
            }
            let weighted = weights.len().min(MAX_EXPLICIT_WEIGHTS);
            if bones.len() > weighted + 1 {
                return Err(GroupError::WeightSlotMismatch {
                    group: group.name.clone(),
                    vertex,
                    bones: bones.len(),
                    weights: weighted,
                });
            }
            Ok(normalize_vertex(bones, weights))
        })
        .collect()
}
