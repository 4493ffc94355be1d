//! View frustum and culling volumes
//!
//! Planes are extracted from a view-projection matrix (Gribb/Hartmann) and
//! normalized, so plane distances are in world units. A point is inside when
//! its signed distance to every plane is positive.

use crate::foundation::math::{Mat4, Vec3, Vec4};

/// Axis aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(Vec3::zeros(), Vec3::zeros())
    }
}

impl BoundingBox {
    /// Create a box from its corners
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all `points`, `None` when empty
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::new(first, first), |bb, p| Self::new(bb.min.inf(&p), bb.max.sup(&p))))
    }

    /// The eight corners
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Box transformed by `m`, re-fitted to stay axis aligned
    pub fn transformed(&self, m: &Mat4) -> Self {
        let corners = self.corners().map(|c| (m * c.push(1.0)).xyz());
        Self::from_points(corners).unwrap_or(*self)
    }
}

/// Screen-space rectangle in pixels, origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenRect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl ScreenRect {
    /// Create a rectangle
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Overlap test, touching edges do not count
    pub fn intersects(&self, other: &Self) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    /// Clip the rectangle to `[0, width] x [0, height]`
    #[must_use]
    pub fn clamped(mut self, width: f32, height: f32) -> Self {
        if self.x < 0.0 {
            self.width += self.x;
            self.x = 0.0;
        }
        if self.y < 0.0 {
            self.height += self.y;
            self.y = 0.0;
        }
        self.width = self.width.min(width - self.x);
        self.height = self.height.min(height - self.y);
        self
    }
}

/// Frustum plane indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrustumPlane {
    /// Right plane
    Right = 0,
    /// Left plane
    Left = 1,
    /// Top plane
    Top = 2,
    /// Bottom plane
    Bottom = 3,
    /// Far plane
    Back = 4,
    /// Near plane
    Front = 5,
}

/// Six planes stored as `(nx, ny, nz, d)` with unit normals pointing inward
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract the planes of `view_proj`
    pub fn from_matrix(view_proj: &Mat4) -> Self {
        let row = |i: usize| -> Vec4 { view_proj.row(i).transpose() };
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        let planes = [
            r3 - r0,
            r3 + r0,
            r3 - r1,
            r3 + r1,
            r3 - r2,
            r3 + r2,
        ]
        .map(normalize_plane);

        Self { planes }
    }

    /// One plane by index
    pub fn plane(&self, which: FrustumPlane) -> Vec4 {
        self.planes[which as usize]
    }

    /// Signed distance of `point` to a plane
    fn distance(plane: &Vec4, point: &Vec3) -> f32 {
        plane.xyz().dot(point) + plane.w
    }

    /// Strict containment of a point
    pub fn contains_point(&self, point: &Vec3) -> bool {
        self.planes.iter().all(|p| Self::distance(p, point) > 0.0)
    }

    /// Whether any part of the sphere may be inside
    pub fn intersects_sphere(&self, center: &Vec3, radius: f32) -> bool {
        self.planes.iter().all(|p| Self::distance(p, center) >= -radius)
    }

    /// Whether any part of the box may be inside
    ///
    /// Returns `true` as soon as one corner is inside, `false` only when all
    /// corners lie behind a single plane. Boxes straddling the frustum edge
    /// without any corner inside are reported visible.
    pub fn intersects_aabb(&self, aabb: &BoundingBox) -> bool {
        let corners = aabb.corners();
        if corners.iter().any(|c| self.contains_point(c)) {
            return true;
        }
        !self
            .planes
            .iter()
            .any(|p| corners.iter().all(|c| Self::distance(p, c) < 0.0))
    }

    /// World-space box enclosing the frustum volume
    ///
    /// `inv_view_proj` maps the NDC cube back to world space.
    pub fn world_bounds(inv_view_proj: &Mat4) -> BoundingBox {
        let ndc = BoundingBox::new(Vec3::repeat(-1.0), Vec3::repeat(1.0));
        let corners = ndc.corners().map(|c| {
            let p = inv_view_proj * c.push(1.0);
            if p.w.abs() > f32::EPSILON { p.xyz() / p.w } else { p.xyz() }
        });
        BoundingBox::from_points(corners).unwrap_or_default()
    }
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let len = plane.xyz().norm();
    if len > 0.0 { plane / len } else { plane }
}
