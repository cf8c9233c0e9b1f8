//! GMDC geometry importer: decodes the chunked binary container, rebuilds the
//! bone hierarchy and vertex skinning, and hands the result to a scene target.

pub mod error;
pub mod gmdc;
pub mod import;
pub mod math;
pub mod model;
pub mod scene;
pub mod skeleton;
pub mod skinning;

pub use error::{ErrorKind, GmdcError, GroupError, ImportWarning, Result};
pub use gmdc::{header::decode_header, GmdcData, GmdcFile};
pub use import::{import_bytes, import_file, ImportOptions, ImportReport};
pub use model::{assemble, ModelGroup};
pub use scene::{SceneDocument, SceneTarget};
pub use skeleton::{build_bones, BoneGroupTable, BoneRecord, Skeleton};
pub use skinning::assign_weights;
