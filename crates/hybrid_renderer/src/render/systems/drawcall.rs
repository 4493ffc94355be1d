//! Draw-call collection
//!
//! Submissions made between `begin` and `end` are classified into one of
//! four bins, deferred or forward crossed with single or instanced. The
//! bins live for one frame and are truncated at the next `begin`.
//!
//! ## Classification
//!
//! A render-mode override wins. In auto-detect mode the blend mode decides:
//! opaque goes deferred, additive and multiply go forward, and alpha goes
//! forward only when the albedo color is translucent or the albedo texture
//! format carries alpha. Vertex-color alpha is not inspected.

use std::cmp::Ordering;

use crate::foundation::math::{utils, Mat3, Mat4, Vec2, Vec3};
use crate::render::primitives::{Color, Mesh};
use crate::render::resources::Material;

use super::state::{BillboardMode, BlendMode, RenderMode, RenderState, ShadowCastMode};

/// Render path of a draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPath {
    /// G-buffer plus screen-space lighting
    Deferred,
    /// Lit in a single pass, blended
    Forward,
}

/// Per-instance data of an instanced draw
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceData {
    /// One model matrix per instance
    pub transforms: Vec<Mat4>,
    /// Optional per-instance tint, same length as `transforms`
    pub colors: Option<Vec<Color>>,
    /// Billboard behavior applied per instance
    pub billboard_mode: BillboardMode,
}

impl InstanceData {
    /// Number of instances
    pub fn count(&self) -> usize {
        self.transforms.len()
    }
}

/// Texture coordinate transform, `uv * scale + offset`
///
/// Sprites use it to select one frame of a sheet; meshes keep the identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvTransform {
    /// Added after scaling
    pub offset: Vec2,
    /// Per-axis factor, negative to mirror
    pub scale: Vec2,
}

impl Default for UvTransform {
    fn default() -> Self {
        Self { offset: Vec2::zeros(), scale: Vec2::repeat(1.0) }
    }
}

/// One submitted draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    /// Geometry
    pub mesh: Mesh,
    /// Surface
    pub material: Material,
    /// World transform, the global transform for instanced draws
    pub transform: Mat4,
    /// Shadow casting policy at submission time
    pub shadow_cast_mode: ShadowCastMode,
    /// Blend mode used when the call is forward rendered
    pub blend_mode: BlendMode,
    /// Alpha discard threshold used when forward rendered
    pub alpha_scissor_threshold: f32,
    /// Instance data, `None` for single draws
    pub instances: Option<InstanceData>,
    /// Texture coordinate transform
    pub uv: UvTransform,
}

impl DrawCall {
    /// World-space origin of the draw
    pub fn origin(&self) -> Vec3 {
        utils::translation_of(&self.transform)
    }

    /// Whether the call is rasterized into shadow maps
    pub fn casts_shadows(&self) -> bool {
        self.shadow_cast_mode != ShadowCastMode::Disabled
    }
}

/// Blend mode a material is drawn with under `state`
pub fn effective_blend_mode(material: &Material, state: &RenderState) -> BlendMode {
    material.blend_mode.unwrap_or(state.blend_mode)
}

/// Pick the render path for a material
pub fn classify(material: &Material, state: &RenderState) -> RenderPath {
    match state.render_mode {
        RenderMode::Deferred => RenderPath::Deferred,
        RenderMode::Forward => RenderPath::Forward,
        RenderMode::AutoDetect => auto_detect(material, effective_blend_mode(material, state)),
    }
}

fn auto_detect(material: &Material, blend_mode: BlendMode) -> RenderPath {
    match blend_mode {
        BlendMode::Opaque => RenderPath::Deferred,
        BlendMode::Additive | BlendMode::Multiply => RenderPath::Forward,
        BlendMode::Alpha => {
            let alpha_color = material.albedo.color.a < 255;
            let alpha_format = material.albedo.texture.is_some_and(|t| t.format.has_alpha());
            if alpha_color || alpha_format {
                RenderPath::Forward
            } else {
                RenderPath::Deferred
            }
        }
    }
}

/// Column lengths of the upper 3x3 block
fn axis_scales(m: &Mat4) -> Vec3 {
    Vec3::new(
        m.fixed_view::<3, 1>(0, 0).norm(),
        m.fixed_view::<3, 1>(0, 1).norm(),
        m.fixed_view::<3, 1>(0, 2).norm(),
    )
}

fn compose(rotation: &Mat3, scale: &Vec3, translation: &Vec3) -> Mat4 {
    let mut out = Mat4::identity();
    for c in 0..3 {
        let column = rotation.column(c) * scale[c];
        out.fixed_view_mut::<3, 1>(0, c).copy_from(&column);
    }
    out.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
    out
}

/// Rotate `transform` to face the camera, keeping its scale and position
pub fn billboard_front(transform: &Mat4, inv_view: &Mat4) -> Mat4 {
    let camera_rotation: Mat3 = inv_view.fixed_view::<3, 3>(0, 0).into_owned();
    compose(&camera_rotation, &axis_scales(transform), &utils::translation_of(transform))
}

/// Rotate `transform` around world Y to face the camera
pub fn billboard_y_axis(transform: &Mat4, inv_view: &Mat4) -> Mat4 {
    let position = utils::translation_of(transform);
    let camera = utils::translation_of(inv_view);

    let mut forward = camera - position;
    forward.y = 0.0;
    let forward = match forward.try_normalize(1e-6) {
        Some(f) => f,
        None => return *transform,
    };
    let up = Vec3::y();
    let right = up.cross(&forward);
    let rotation = Mat3::from_columns(&[right, up, forward]);

    compose(&rotation, &axis_scales(transform), &position)
}

/// Apply a billboard mode to a transform
pub fn apply_billboard(mode: BillboardMode, transform: &Mat4, inv_view: &Mat4) -> Mat4 {
    match mode {
        BillboardMode::Disabled => *transform,
        BillboardMode::Front => billboard_front(transform, inv_view),
        BillboardMode::YAxis => billboard_y_axis(transform, inv_view),
    }
}

fn compare_distance(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// The four per-frame draw-call bins
#[derive(Debug, Default)]
pub struct DrawCallBins {
    /// Deferred, one transform
    pub deferred: Vec<DrawCall>,
    /// Deferred, instanced
    pub deferred_instanced: Vec<DrawCall>,
    /// Forward, one transform
    pub forward: Vec<DrawCall>,
    /// Forward, instanced
    pub forward_instanced: Vec<DrawCall>,
}

impl DrawCallBins {
    /// Empty bins
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all calls, keeping allocations
    pub fn clear(&mut self) {
        self.deferred.clear();
        self.deferred_instanced.clear();
        self.forward.clear();
        self.forward_instanced.clear();
    }

    /// Append a call to the bin for `path`
    pub fn push(&mut self, path: RenderPath, call: DrawCall) {
        let bin = match (path, call.instances.is_some()) {
            (RenderPath::Deferred, false) => &mut self.deferred,
            (RenderPath::Deferred, true) => &mut self.deferred_instanced,
            (RenderPath::Forward, false) => &mut self.forward,
            (RenderPath::Forward, true) => &mut self.forward_instanced,
        };
        bin.push(call);
    }

    /// Sort single draws by squared distance to `view_position`
    ///
    /// Deferred draws go front-to-back to maximize early depth rejection,
    /// forward draws back-to-front for correct blending. The sort is
    /// stable, so equal distances keep submission order.
    pub fn sort(&mut self, view_position: &Vec3) {
        let key = |call: &DrawCall| (call.origin() - view_position).norm_squared();

        self.deferred.sort_by(|a, b| compare_distance(key(a), key(b)));
        self.forward.sort_by(|a, b| compare_distance(key(b), key(a)));
    }

    /// Whether any deferred call exists
    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty() || !self.deferred_instanced.is_empty()
    }

    /// Whether any forward call exists
    pub fn has_forward(&self) -> bool {
        !self.forward.is_empty() || !self.forward_instanced.is_empty()
    }

    /// Total number of calls
    pub fn len(&self) -> usize {
        self.deferred.len() + self.deferred_instanced.len() + self.forward.len() + self.forward_instanced.len()
    }

    /// Whether all bins are empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls that cast shadows, instanced bins first
    pub fn shadow_casters(&self) -> impl Iterator<Item = &DrawCall> {
        self.deferred_instanced
            .iter()
            .chain(&self.forward_instanced)
            .chain(&self.deferred)
            .chain(&self.forward)
            .filter(|call| call.casts_shadows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{MeshHandle, TextureHandle};
    use crate::render::primitives::BoundingBox;
    use crate::render::resources::{PixelFormat, Texture};
    use approx::assert_relative_eq;

    fn mesh() -> Mesh {
        Mesh::new(MeshHandle(1), 3, 0, BoundingBox::default())
    }

    fn call_at(position: Vec3) -> DrawCall {
        DrawCall {
            mesh: mesh(),
            material: Material::default(),
            transform: Mat4::new_translation(&position),
            shadow_cast_mode: ShadowCastMode::FrontFaces,
            blend_mode: BlendMode::Alpha,
            alpha_scissor_threshold: 0.01,
            instances: None,
            uv: UvTransform::default(),
        }
    }

    #[test]
    fn test_opaque_blend_is_deferred_regardless_of_alpha() {
        let state = RenderState { blend_mode: BlendMode::Opaque, ..RenderState::default() };
        let material = Material::colored(Color::new(255, 255, 255, 10));
        assert_eq!(classify(&material, &state), RenderPath::Deferred);
    }

    #[test]
    fn test_additive_and_multiply_are_forward() {
        for blend_mode in [BlendMode::Additive, BlendMode::Multiply] {
            let state = RenderState { blend_mode, ..RenderState::default() };
            assert_eq!(classify(&Material::default(), &state), RenderPath::Forward);
        }
    }

    #[test]
    fn test_alpha_blend_checks_color_and_texture() {
        let state = RenderState::default();
        assert_eq!(classify(&Material::default(), &state), RenderPath::Deferred);

        let translucent = Material::colored(Color::new(255, 255, 255, 128));
        assert_eq!(classify(&translucent, &state), RenderPath::Forward);

        let rgba = Texture::new(TextureHandle(3), 8, 8, PixelFormat::R8G8B8A8);
        let rgb = Texture::new(TextureHandle(4), 8, 8, PixelFormat::R8G8B8);
        assert_eq!(classify(&Material::default().with_albedo_texture(rgba), &state), RenderPath::Forward);
        assert_eq!(classify(&Material::default().with_albedo_texture(rgb), &state), RenderPath::Deferred);
    }

    #[test]
    fn test_override_wins() {
        let state = RenderState { render_mode: RenderMode::Deferred, ..RenderState::default() };
        let translucent = Material::colored(Color::new(0, 0, 0, 1)).with_blend_mode(BlendMode::Additive);
        assert_eq!(classify(&translucent, &state), RenderPath::Deferred);

        let state = RenderState { render_mode: RenderMode::Forward, ..RenderState::default() };
        assert_eq!(classify(&Material::default(), &state), RenderPath::Forward);
    }

    #[test]
    fn test_material_blend_overrides_state() {
        let state = RenderState { blend_mode: BlendMode::Additive, ..RenderState::default() };
        let material = Material::default().with_blend_mode(BlendMode::Opaque);
        assert_eq!(classify(&material, &state), RenderPath::Deferred);
    }

    #[test]
    fn test_bins_by_path_and_instancing() {
        let mut bins = DrawCallBins::new();
        bins.push(RenderPath::Deferred, call_at(Vec3::zeros()));
        let mut instanced = call_at(Vec3::zeros());
        instanced.instances = Some(InstanceData {
            transforms: vec![Mat4::identity(); 3],
            colors: None,
            billboard_mode: BillboardMode::Disabled,
        });
        bins.push(RenderPath::Forward, instanced);

        assert_eq!(bins.deferred.len(), 1);
        assert_eq!(bins.forward_instanced.len(), 1);
        assert!(bins.has_deferred() && bins.has_forward());
        assert_eq!(bins.len(), 2);

        bins.clear();
        assert!(bins.is_empty());
    }

    #[test]
    fn test_sort_orders() {
        let mut bins = DrawCallBins::new();
        for z in [5.0, 1.0, 10.0] {
            bins.push(RenderPath::Deferred, call_at(Vec3::new(0.0, 0.0, z)));
            bins.push(RenderPath::Forward, call_at(Vec3::new(0.0, 0.0, z)));
        }
        bins.sort(&Vec3::zeros());

        let deferred: Vec<f32> = bins.deferred.iter().map(|c| c.origin().z).collect();
        let forward: Vec<f32> = bins.forward.iter().map(|c| c.origin().z).collect();
        assert_eq!(deferred, vec![1.0, 5.0, 10.0]);
        assert_eq!(forward, vec![10.0, 5.0, 1.0]);
    }

    #[test]
    fn test_sort_is_idempotent_and_stable() {
        let mut bins = DrawCallBins::new();
        for (i, z) in [3.0, 3.0, 1.0].iter().enumerate() {
            let mut call = call_at(Vec3::new(0.0, 0.0, *z));
            call.mesh.handle = MeshHandle(i as u64);
            bins.push(RenderPath::Deferred, call);
        }

        bins.sort(&Vec3::zeros());
        let first: Vec<u64> = bins.deferred.iter().map(|c| c.mesh.handle.0).collect();
        bins.sort(&Vec3::zeros());
        let second: Vec<u64> = bins.deferred.iter().map(|c| c.mesh.handle.0).collect();

        assert_eq!(first, vec![2, 0, 1]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_shadow_casters_skip_disabled() {
        let mut bins = DrawCallBins::new();
        bins.push(RenderPath::Deferred, call_at(Vec3::zeros()));
        let mut hidden = call_at(Vec3::zeros());
        hidden.shadow_cast_mode = ShadowCastMode::Disabled;
        bins.push(RenderPath::Forward, hidden);

        assert_eq!(bins.shadow_casters().count(), 1);
    }

    #[test]
    fn test_billboard_front_faces_camera_and_keeps_scale() {
        let inv_view = Mat4::look_at_rh(
            &Vec3::new(0.0, 0.0, 10.0).into(),
            &Vec3::zeros().into(),
            &Vec3::y(),
        )
        .try_inverse()
        .expect("invertible");
        let transform = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0)) * Mat4::new_scaling(2.0);

        let out = billboard_front(&transform, &inv_view);
        assert_relative_eq!(utils::translation_of(&out), Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(axis_scales(&out), Vec3::repeat(2.0), epsilon = 1e-5);
        // Local +Z points back at the camera
        assert_relative_eq!(out.fixed_view::<3, 1>(0, 2).normalize(), Vec3::z(), epsilon = 1e-5);
    }

    #[test]
    fn test_billboard_y_axis_stays_upright() {
        let inv_view = Mat4::new_translation(&Vec3::new(10.0, 5.0, 0.0));
        let out = billboard_y_axis(&Mat4::identity(), &inv_view);

        assert_relative_eq!(out.fixed_view::<3, 1>(0, 1).into_owned(), Vec3::y(), epsilon = 1e-6);
        assert_relative_eq!(out.fixed_view::<3, 1>(0, 2).into_owned(), Vec3::x(), epsilon = 1e-6);
    }
}
