//! Local transform components.

use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position relative to the parent space.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct LocalPosition(pub Vec3);

impl LocalPosition {
    pub const ORIGIN: Self = Self(Vec3::ZERO);

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vec3::new(x, y, z))
    }

    pub fn translate(&mut self, delta: Vec3) {
        self.0 += delta;
    }
}

impl From<Vec3> for LocalPosition {
    fn from(value: Vec3) -> Self {
        Self(value)
    }
}

/// Rotation relative to the parent space.
///
/// Freshly created entities start zeroed; write [`LocalRotation::IDENTITY`]
/// explicitly when a valid quaternion is required.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct LocalRotation(pub Quat);

impl LocalRotation {
    pub const IDENTITY: Self = Self(Quat::IDENTITY);

    pub fn from_rotation_y(angle: f32) -> Self {
        Self(Quat::from_rotation_y(angle))
    }

    /// Rotate `point` by this rotation
    pub fn rotate(&self, point: Vec3) -> Vec3 {
        self.0 * point
    }
}

impl Default for LocalRotation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Quat> for LocalRotation {
    fn from(value: Quat) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentInfo;

    #[test]
    fn test_sizes_match_components() {
        assert_eq!(ComponentInfo::of::<LocalPosition>().size, 12);
        assert_eq!(ComponentInfo::of::<LocalRotation>().size, 16);
    }

    #[test]
    fn test_rotation_default_is_identity() {
        let rotation = LocalRotation::default();
        assert_eq!(rotation.rotate(Vec3::X), Vec3::X);
    }

    #[test]
    fn test_translate() {
        let mut position = LocalPosition::new(1.0, 2.0, 3.0);
        position.translate(Vec3::ONE);
        assert_eq!(position, LocalPosition::new(2.0, 3.0, 4.0));
    }
}
