use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    math::{GmQuaternion, GmVector3},
    model::ModelGroup,
    skeleton::{BoneGroupTable, Skeleton},
};

/// Host side of an import: whatever turns decoded data into editor objects.
///
/// Calls arrive in a fixed order. `add_armature` comes first, if at all. Then
/// for each imported group: `add_mesh`, `add_bone_groups`, any number of
/// `add_weight`, and `finish_mesh`. Weights are additive: two calls for the
/// same bone group and vertex add up.
pub trait SceneTarget {
    type Mesh;

    fn add_armature(&mut self, skeleton: &Skeleton);

    fn add_mesh(&mut self, group: &ModelGroup) -> Self::Mesh;

    fn add_bone_groups(&mut self, mesh: &mut Self::Mesh, table: &BoneGroupTable);

    fn add_weight(&mut self, mesh: &mut Self::Mesh, bone_group: usize, vertex: usize, weight: f32);

    fn finish_mesh(&mut self, mesh: Self::Mesh);
}

pub const ARMATURE_NAME: &str = "Armature";
pub const UV_LAYER_NAME: &str = "UVMap";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmatureBone {
    pub name: String,
    pub head: [f32; 3],
    pub tail: [f32; 3],
    pub parent: Option<String>,
    /// Local translation in file space, not mirrored.
    pub translate: [f32; 3],
    /// Local rotation in file space, `w, x, y, z`.
    pub rotate: [f32; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmatureObject {
    pub name: String,
    pub bones: Vec<ArmatureBone>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UvLayer {
    pub name: String,
    /// One entry per face corner.
    pub uvs: Vec<[f32; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexGroup {
    pub name: String,
    pub weights: BTreeMap<usize, f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshObject {
    pub name: String,
    pub vertices: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub faces: Vec<Vec<u32>>,
    pub uv_layer: UvLayer,
    pub vertex_groups: Vec<VertexGroup>,
}

impl MeshObject {
    pub fn vertex_group(&self, name: &str) -> Option<&VertexGroup> {
        self.vertex_groups.iter().find(|g| g.name == name)
    }
}

/// In-memory scene that records everything it is handed. Used by the command
/// line tool for JSON output and by tests in place of a real editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SceneDocument {
    pub armature: Option<ArmatureObject>,
    pub meshes: Vec<MeshObject>,
}

impl SceneDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mesh(&self, name: &str) -> Option<&MeshObject> {
        self.meshes.iter().find(|m| m.name == name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl SceneTarget for SceneDocument {
    type Mesh = MeshObject;

    fn add_armature(&mut self, skeleton: &Skeleton) {
        let bones = skeleton
            .bones()
            .iter()
            .map(|bone| ArmatureBone {
                name: bone.name().to_string(),
                head: GmVector3(bone.head).to_slice(),
                tail: GmVector3(bone.tail).to_slice(),
                parent: bone
                    .parent()
                    .and_then(|p| skeleton.get(p))
                    .map(|p| p.name().to_string()),
                translate: GmVector3(bone.record.position).to_slice(),
                rotate: GmQuaternion(bone.record.rotation).to_slice(),
            })
            .collect();

        self.armature = Some(ArmatureObject {
            name: ARMATURE_NAME.to_string(),
            bones,
        });
    }

    fn add_mesh(&mut self, group: &ModelGroup) -> MeshObject {
        MeshObject {
            name: group.name.clone(),
            vertices: group.vertices.iter().map(|&v| GmVector3(v).to_slice()).collect(),
            normals: group.normals.iter().map(|&n| GmVector3(n).to_slice()).collect(),
            faces: group.faces.clone(),
            uv_layer: UvLayer {
                name: UV_LAYER_NAME.to_string(),
                uvs: group.loop_uvs().iter().map(|uv| [uv.x, uv.y]).collect(),
            },
            vertex_groups: vec![],
        }
    }

    fn add_bone_groups(&mut self, mesh: &mut MeshObject, table: &BoneGroupTable) {
        mesh.vertex_groups = table
            .names()
            .iter()
            .map(|name| VertexGroup {
                name: name.clone(),
                weights: BTreeMap::new(),
            })
            .collect();
    }

    fn add_weight(&mut self, mesh: &mut MeshObject, bone_group: usize, vertex: usize, weight: f32) {
        if let Some(group) = mesh.vertex_groups.get_mut(bone_group) {
            *group.weights.entry(vertex).or_insert(0.0) += weight;
        }
    }

    fn finish_mesh(&mut self, mesh: MeshObject) {
        self.meshes.push(mesh);
    }
}
