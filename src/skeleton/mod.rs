use std::io;

use cgmath::{InnerSpace, Quaternion, Rotation, Vector3, Zero};
use ptree::{item::StringItem, TreeBuilder};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    error::{GmdcError, Result},
    gmdc::chunk::BoneLink,
    math::{offset_at_least, AxisReflection},
};

/// Default minimum bone length along +Y for bones whose head and tail coincide.
pub const ZERO_LENGTH_EPSILON: f32 = 0.00001;

pub(crate) fn is_valid_epsilon(epsilon: f32) -> bool {
    epsilon > 0.0 && epsilon.is_finite()
}

/// A bone as stored in the file, with its parent resolved to an index into
/// the same table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoneRecord {
    pub name: String,
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub parent: Option<usize>,
}

fn normalize_rotation(q: Quaternion<f32>) -> Quaternion<f32> {
    let magnitude2 = q.magnitude2();
    if magnitude2 > 0.0 && magnitude2.is_finite() {
        q.normalize()
    } else {
        Quaternion::new(1.0, 0.0, 0.0, 0.0)
    }
}

/// Turn the bone link table into records, in file order.
///
/// A bone's index in the returned vector is its public index. Parents must
/// appear before their children; anything else is rejected.
pub fn build_bones(links: &[BoneLink]) -> Result<Vec<BoneRecord>> {
    links
        .iter()
        .enumerate()
        .map(|(index, link)| {
            let parent = match link.parent {
                -1 => None,
                p if p >= 0 && (p as usize) < index => Some(p as usize),
                p => {
                    return Err(GmdcError::InvalidBoneParent {
                        index,
                        name: link.name.clone(),
                        parent: p,
                    })
                }
            };

            Ok(BoneRecord {
                name: link.name.clone(),
                position: link.position,
                rotation: normalize_rotation(link.rotation),
                parent,
            })
        })
        .collect()
}

/// A bone placed in world space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bone {
    pub record: BoneRecord,
    pub head: Vector3<f32>,
    pub tail: Vector3<f32>,
}

impl Bone {
    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn parent(&self) -> Option<usize> {
        self.record.parent
    }

    pub fn length(&self) -> f32 {
        (self.tail - self.head).magnitude()
    }
}

/// Bones in an arena; parent links are indices into `bones`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Skeleton {
    bones: Vec<Bone>,
}

impl Skeleton {
    /// Place every bone by chaining its local transform onto its parent's tail.
    ///
    /// `zero_length_epsilon` must be positive and finite; anything else falls
    /// back to [`ZERO_LENGTH_EPSILON`].
    pub fn build(records: Vec<BoneRecord>, zero_length_epsilon: f32) -> Self {
        let epsilon = if is_valid_epsilon(zero_length_epsilon) {
            zero_length_epsilon
        } else {
            warn!(
                zero_length_epsilon,
                fallback = ZERO_LENGTH_EPSILON,
                "invalid zero-length epsilon, using default"
            );
            ZERO_LENGTH_EPSILON
        };

        let mut bones: Vec<Bone> = Vec::with_capacity(records.len());

        for record in records {
            let head = record
                .parent
                .and_then(|parent| bones.get(parent))
                .map_or_else(Vector3::zero, |parent| parent.tail);
            let mut tail = head + record.rotation.rotate_vector(record.position);

            if tail == head {
                tail.y = offset_at_least(head.y, epsilon);
                debug!(bone = %record.name, "zero-length bone, nudging tail");
            }

            bones.push(Bone { record, head, tail });
        }

        Skeleton { bones }
    }

    /// Apply the handedness correction to the world-space heads and tails.
    /// Local records keep the values read from the file.
    pub fn reflect(&mut self, reflection: &AxisReflection) {
        for bone in self.bones.iter_mut() {
            bone.head = reflection.point(bone.head);
            bone.tail = reflection.point(bone.tail);
        }
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    /// First bone called `name`.
    pub fn find(&self, name: &str) -> Option<(usize, &Bone)> {
        self.bones.iter().enumerate().find(|(_, b)| b.name() == name)
    }

    pub fn children(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(move |(_, b)| b.parent() == Some(index))
            .map(|(i, _)| i)
    }

    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(|(_, b)| b.parent().is_none())
            .map(|(i, _)| i)
    }

    /// Child indices of every bone, in file order.
    pub fn child_lists(&self) -> Vec<Vec<usize>> {
        let mut children = vec![vec![]; self.bones.len()];
        for (index, bone) in self.bones.iter().enumerate() {
            if let Some(list) = bone.parent().and_then(|p| children.get_mut(p)) {
                list.push(index);
            }
        }
        children
    }

    fn bone_label(&self, index: usize) -> String {
        format!("[{}] {}", index, self.bones[index].name())
    }

    /// The bone hierarchy as a printable tree.
    pub fn tree(&self) -> StringItem {
        let children = self.child_lists();
        let mut tree = TreeBuilder::new("bones".to_string());
        // (bone, next child to visit)
        let mut stack: Vec<(usize, usize)> = vec![];

        for root in self.roots() {
            if children[root].is_empty() {
                tree.add_empty_child(self.bone_label(root));
                continue;
            }
            tree.begin_child(self.bone_label(root));
            stack.push((root, 0));

            while let Some(&(bone, next)) = stack.last() {
                match children[bone].get(next) {
                    Some(&child) => {
                        if let Some(top) = stack.last_mut() {
                            top.1 += 1;
                        }
                        if children[child].is_empty() {
                            tree.add_empty_child(self.bone_label(child));
                        } else {
                            tree.begin_child(self.bone_label(child));
                            stack.push((child, 0));
                        }
                    }
                    None => {
                        tree.end_child();
                        stack.pop();
                    }
                }
            }
        }

        tree.build()
    }

    pub fn write_tree(&self, out: impl io::Write) -> io::Result<()> {
        ptree::write_tree(&self.tree(), out)
    }

    pub fn tree_string(&self) -> io::Result<String> {
        let mut out = vec![];
        self.write_tree(&mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// Bone names in skeleton order. Vertex bone assignments index into this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoneGroupTable {
    names: Vec<String>,
}

impl BoneGroupTable {
    pub fn from_skeleton(skeleton: &Skeleton) -> Self {
        Self {
            names: skeleton.bones().iter().map(|b| b.name().to_string()).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}
