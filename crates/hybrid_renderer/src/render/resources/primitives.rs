//! Built-in meshes used by screen-space and sky passes

use crate::foundation::math::Vec3;
use crate::render::api::{DeviceResult, GraphicsDevice, PrimitiveKind};
use crate::render::primitives::{BoundingBox, Mesh};

/// Full-screen quad and unit cube
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primitives {
    /// Quad spanning [-1, 1] in x and y
    pub quad: Mesh,
    /// Cube spanning [-0.5, 0.5]
    pub cube: Mesh,
}

impl Primitives {
    /// Upload both meshes
    pub fn load(device: &mut dyn GraphicsDevice) -> DeviceResult<Self> {
        let quad = Mesh::new(
            device.create_primitive(PrimitiveKind::Quad)?,
            4,
            6,
            BoundingBox::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 0.0)),
        );
        let cube = Mesh::new(
            device.create_primitive(PrimitiveKind::Cube)?,
            24,
            36,
            BoundingBox::new(Vec3::repeat(-0.5), Vec3::repeat(0.5)),
        );
        Ok(Self { quad, cube })
    }

    /// Release both meshes
    pub fn unload(&self, device: &mut dyn GraphicsDevice) {
        device.destroy_mesh(self.quad.handle);
        device.destroy_mesh(self.cube.handle);
    }
}
