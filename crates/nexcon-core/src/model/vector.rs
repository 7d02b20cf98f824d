use serde::{Deserialize, Serialize};

/// Three-component vector used for translation directions and rotation axes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction; `None` for zero-length or non-finite input
    pub fn normalized(&self) -> Option<Vector3> {
        let m = self.magnitude();
        if m == 0.0 || !m.is_finite() {
            return None;
        }
        Some(self.scaled(1.0 / m))
    }

    pub fn scaled(&self, factor: f64) -> Vector3 {
        Vector3::new(self.x * factor, self.y * factor, self.z * factor)
    }

    /// Component-wise comparison within an absolute tolerance
    pub fn approx_eq(&self, other: &Vector3, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.z - other.z).abs() <= tolerance
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Vector3 {
    fn from(v: [f64; 3]) -> Self {
        Vector3::new(v[0], v[1], v[2])
    }
}

impl TryFrom<&[f64]> for Vector3 {
    type Error = usize;

    /// Fails with the slice length when it is not exactly 3
    fn try_from(v: &[f64]) -> Result<Self, Self::Error> {
        match v {
            [x, y, z] => Ok(Vector3::new(*x, *y, *z)),
            other => Err(other.len()),
        }
    }
}
