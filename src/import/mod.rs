use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::{GroupError, ImportWarning, Result},
    gmdc::GmdcFile,
    math::{Axis, AxisReflection},
    model::{assemble, ModelGroup},
    scene::SceneTarget,
    skeleton::{build_bones, is_valid_epsilon, BoneGroupTable, Skeleton, ZERO_LENGTH_EPSILON},
    skinning::assign_weights,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Hand the skeleton to the target as an armature.
    pub import_skeleton: bool,
    /// Handedness correction; `None` keeps file coordinates.
    pub mirror: Option<Axis>,
    pub zero_length_epsilon: f32,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            import_skeleton: true,
            mirror: Some(Axis::Z),
            zero_length_epsilon: ZERO_LENGTH_EPSILON,
        }
    }
}

impl ImportOptions {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let options: Self = toml::from_str(content).context("Failed to parse import options")?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !is_valid_epsilon(self.zero_length_epsilon) {
            anyhow::bail!(
                "zero_length_epsilon must be positive and finite, got {}",
                self.zero_length_epsilon
            );
        }
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}

/// What an import did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub bone_count: usize,
    pub imported_groups: Vec<String>,
    #[serde(skip)]
    pub warnings: Vec<ImportWarning>,
}

impl ImportReport {
    /// Every group imported and geometry was present.
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn group_errors(&self) -> impl Iterator<Item = &GroupError> {
        self.warnings.iter().filter_map(|w| match w {
            ImportWarning::Group(err) => Some(err),
            ImportWarning::NoGeometry => None,
        })
    }

    /// Human-readable lines, one per imported group and one per warning.
    pub fn messages(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .imported_groups
            .iter()
            .map(|name| format!("Group {} imported.", name))
            .collect();
        lines.extend(self.warnings.iter().map(|w| match w {
            ImportWarning::Group(err) => format!("ERROR: {}", err),
            ImportWarning::NoGeometry => format!("WARNING: {}", w),
        }));
        lines
    }
}

fn import_group<T: SceneTarget>(
    target: &mut T,
    group: &ModelGroup,
    table: &BoneGroupTable,
) -> std::result::Result<(), GroupError> {
    group.validate()?;
    let weights = assign_weights(group, table)?;

    let mut mesh = target.add_mesh(group);
    target.add_bone_groups(&mut mesh, table);
    for (vertex, vertex_weights) in weights.iter().enumerate() {
        for influence in &vertex_weights.influences {
            target.add_weight(&mut mesh, influence.bone, vertex, influence.weight);
        }
    }
    target.finish_mesh(mesh);

    Ok(())
}

/// Decode a GMDC buffer and hand its skeleton and groups to `target`.
///
/// Decoding, skeleton building and assembly all finish before the target is
/// touched, so a fatal error leaves it unchanged. Groups that fail validation
/// are skipped and listed in the report.
pub fn import_bytes<T: SceneTarget>(
    bytes: &[u8],
    target: &mut T,
    options: &ImportOptions,
) -> Result<ImportReport> {
    let file = GmdcFile::from_bytes(bytes)?;
    let data = file.data()?;

    let mut skeleton = Skeleton::build(build_bones(&data.bone_links)?, options.zero_length_epsilon);
    let mut groups = assemble(&data)?;

    if let Some(axis) = options.mirror {
        let reflection = AxisReflection::new(axis);
        skeleton.reflect(&reflection);
        for group in groups.iter_mut().flatten() {
            group.reflect(&reflection);
        }
    }

    let mut report = ImportReport {
        bone_count: skeleton.len(),
        ..Default::default()
    };

    if options.import_skeleton && !skeleton.is_empty() {
        target.add_armature(&skeleton);
        info!(bones = skeleton.len(), "imported skeleton");
    }

    let table = BoneGroupTable::from_skeleton(&skeleton);

    match groups {
        Some(groups) => {
            for group in &groups {
                match import_group(target, group, &table) {
                    Ok(()) => {
                        info!(group = %group.name, "Group {} imported.", group.name);
                        report.imported_groups.push(group.name.clone());
                    }
                    Err(err) => {
                        warn!(group = %group.name, "{}", err);
                        report.warnings.push(err.into());
                    }
                }
            }
        }
        None => {
            warn!("{}", ImportWarning::NoGeometry);
            report.warnings.push(ImportWarning::NoGeometry);
        }
    }

    Ok(report)
}

/// Read `path` and import it.
pub fn import_file<T: SceneTarget>(
    path: impl AsRef<Path>,
    target: &mut T,
    options: &ImportOptions,
) -> Result<ImportReport> {
    let path = path.as_ref();
    info!(path = %path.display(), "importing GMDC file");
    let bytes = std::fs::read(path)?;
    import_bytes(&bytes, target, options)
}
