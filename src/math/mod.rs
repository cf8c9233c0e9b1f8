use binrw::binread;
use cgmath::{Quaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

#[binread]
#[derive(Debug, Clone, Copy, PartialEq)]
#[br(little)]
pub struct GmVector3(
    #[br(map = |raw: [f32; 3]| Vector3::new(raw[0], raw[1], raw[2]))] pub Vector3<f32>,
);

impl GmVector3 {
    pub fn to_slice(&self) -> [f32; 3] {
        let v = &self.0;
        [v.x, v.y, v.z]
    }
}

#[binread]
#[derive(Debug, Clone, Copy, PartialEq)]
#[br(little)]
pub struct GmVector2(#[br(map = |raw: [f32; 2]| Vector2::new(raw[0], raw[1]))] pub Vector2<f32>);

impl Default for GmVector2 {
    fn default() -> Self {
        Self(Vector2::new(0.0, 0.0))
    }
}

/// Rotation stored scalar-first on disk: `w, x, y, z`.
#[binread]
#[derive(Debug, Clone, Copy, PartialEq)]
#[br(little)]
pub struct GmQuaternion(
    #[br(map = |raw: [f32; 4]| Quaternion::new(raw[0], raw[1], raw[2], raw[3]))]
    pub Quaternion<f32>,
);

impl GmQuaternion {
    /// Components in file order (`w, x, y, z`).
    pub fn to_slice(&self) -> [f32; 4] {
        let q = &self.0;
        [q.s, q.v.x, q.v.y, q.v.z]
    }
}

/// Coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Handedness correction: a reflection through the plane perpendicular to `axis`.
///
/// GMDC data is authored for a left-handed renderer; mirroring one axis puts it
/// into the right-handed space the editor expects. Points get the axis component
/// negated; local bone rotations stay as read from the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisReflection {
    axis: Axis,
}

impl AxisReflection {
    pub fn new(axis: Axis) -> Self {
        Self { axis }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn point(&self, v: Vector3<f32>) -> Vector3<f32> {
        match self.axis {
            Axis::X => Vector3::new(-v.x, v.y, v.z),
            Axis::Y => Vector3::new(v.x, -v.y, v.z),
            Axis::Z => Vector3::new(v.x, v.y, -v.z),
        }
    }
}

/// Smallest f32 strictly greater than `x`.
fn next_up(x: f32) -> f32 {
    if x.is_nan() || x == f32::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f32::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f32::from_bits(bits + 1)
    } else {
        f32::from_bits(bits - 1)
    }
}

/// Returns a value at least `epsilon` above `base`.
///
/// A plain `base + epsilon` can round back down when `base` is large, so the
/// result is stepped up one ulp at a time until the gap holds.
pub fn offset_at_least(base: f32, epsilon: f32) -> f32 {
    let mut value = base + epsilon;
    while value.is_finite() && value - base < epsilon {
        value = next_up(value);
    }
    value
}
