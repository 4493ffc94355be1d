//! Mesh and model references
//!
//! Geometry is uploaded by the application before submission. The renderer
//! only needs the device handle, the element counts for statistics and the
//! local bounds; vertex data never passes through it.

use crate::foundation::math::Mat4;
use crate::render::api::MeshHandle;
use crate::render::resources::Material;

use super::frustum::BoundingBox;

/// GPU-resident mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mesh {
    /// Device handle
    pub handle: MeshHandle,
    /// Number of vertices
    pub vertex_count: u32,
    /// Number of indices, zero for non-indexed meshes
    pub index_count: u32,
    /// Local-space bounds
    pub bounds: BoundingBox,
}

impl Mesh {
    /// Wrap an uploaded mesh
    pub const fn new(handle: MeshHandle, vertex_count: u32, index_count: u32, bounds: BoundingBox) -> Self {
        Self {
            handle,
            vertex_count,
            index_count,
            bounds,
        }
    }

    /// Number of triangles the mesh rasterizes
    pub const fn triangle_count(&self) -> u32 {
        if self.index_count > 0 {
            self.index_count / 3
        } else {
            self.vertex_count / 3
        }
    }
}

/// Collection of meshes with their materials and a root transform
#[derive(Debug, Clone)]
pub struct Model {
    /// Sub-meshes
    pub meshes: Vec<Mesh>,
    /// Material table
    pub materials: Vec<Material>,
    /// Material index for each mesh
    pub mesh_material: Vec<usize>,
    /// Model root transform
    pub transform: Mat4,
}

impl Default for Model {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new(), Vec::new())
    }
}

impl Model {
    /// Build a model; every mesh must reference an existing material
    pub fn new(meshes: Vec<Mesh>, materials: Vec<Material>, mesh_material: Vec<usize>) -> Self {
        Self {
            meshes,
            materials,
            mesh_material,
            transform: Mat4::identity(),
        }
    }

    /// Single-mesh model
    pub fn from_mesh(mesh: Mesh, material: Material) -> Self {
        Self::new(vec![mesh], vec![material], vec![0])
    }

    /// Mesh and material pairs in submission order
    ///
    /// Meshes whose material index is out of range fall back to the default
    /// material.
    pub fn parts(&self) -> impl Iterator<Item = (&Mesh, Material)> + '_ {
        self.meshes.iter().enumerate().map(|(i, mesh)| {
            let material = self
                .mesh_material
                .get(i)
                .and_then(|&m| self.materials.get(m))
                .copied()
                .unwrap_or_default();
            (mesh, material)
        })
    }
}
