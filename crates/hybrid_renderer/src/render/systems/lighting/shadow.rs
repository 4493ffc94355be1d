//! Shadow map allocation and light-space matrices

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use crate::render::api::{
    Attachment, CubeFace, GraphicsDevice, TextureDesc, TextureFormat, DeviceResult,
};
use crate::render::primitives::BoundingBox;

use super::light::{Light, LightType, ShadowMap};

/// Allocate a depth target suited to `light_type`
///
/// Omni maps are depth cubemaps whose faces are attached one at a time
/// while rendering; the initial attachment is the +X face.
pub fn create_shadow_map(
    device: &mut dyn GraphicsDevice,
    light_type: LightType,
    resolution: u32,
) -> DeviceResult<ShadowMap> {
    let framebuffer = device.create_framebuffer()?;

    let (desc, face) = match light_type {
        LightType::Directional | LightType::Spot => {
            (TextureDesc::texture_2d(resolution, resolution, TextureFormat::Depth16), None)
        }
        LightType::Omni => (
            TextureDesc::cubemap(resolution, TextureFormat::Depth16),
            Some(CubeFace::PositiveX),
        ),
    };

    let depth = match device.create_texture(&desc, None) {
        Ok(texture) => texture,
        Err(err) => {
            device.destroy_framebuffer(framebuffer);
            return Err(err);
        }
    };
    if let Err(err) = device.attach_texture(framebuffer, Attachment::Depth, depth, face) {
        device.destroy_texture(depth);
        device.destroy_framebuffer(framebuffer);
        return Err(err);
    }
    device.set_draw_buffers(framebuffer, 0);

    if !device.is_framebuffer_complete(framebuffer) {
        log::error!("Framebuffer creation error for the {:?} shadow map", light_type);
    }

    log::debug!("Allocated {:?} shadow map at {}x{}", light_type, resolution, resolution);

    Ok(ShadowMap {
        framebuffer,
        depth,
        resolution,
        light_type,
    })
}

/// Release the resources of a shadow map
pub fn destroy_shadow_map(device: &mut dyn GraphicsDevice, map: &ShadowMap) {
    device.destroy_texture(map.depth);
    device.destroy_framebuffer(map.framebuffer);
    log::debug!("Released {:?} shadow map", map.light_type);
}

/// View matrix of one cube face as seen from `position`
pub fn omni_face_view(position: Vec3, face: CubeFace) -> Mat4 {
    let (dir, up) = match face {
        CubeFace::PositiveX => (Vec3::x(), -Vec3::y()),
        CubeFace::NegativeX => (-Vec3::x(), -Vec3::y()),
        CubeFace::PositiveY => (Vec3::y(), Vec3::z()),
        CubeFace::NegativeY => (-Vec3::y(), -Vec3::z()),
        CubeFace::PositiveZ => (Vec3::z(), -Vec3::y()),
        CubeFace::NegativeZ => (-Vec3::z(), -Vec3::y()),
    };
    Mat4::look_at(position, position + dir, up)
}

/// 90 degree, square projection shared by all cube faces
pub fn omni_projection(light: &Light) -> Mat4 {
    Mat4::perspective(utils::deg_to_rad(90.0), 1.0, light.near, light.far())
}

/// Up vector that is not parallel to `dir`
fn stable_up(dir: &Vec3) -> Vec3 {
    if dir.y.abs() > 0.99 { Vec3::z() } else { Vec3::y() }
}

/// View and projection of a spot light
///
/// The field of view covers the full outer cone. A light without a cone
/// (cutoff of -1) gets a 90 degree frustum.
pub fn spot_view_proj(light: &Light) -> (Mat4, Mat4) {
    let dir = utils::normalize_or_zero(light.direction);
    let view = Mat4::look_at(light.position, light.position + dir, stable_up(&dir));

    let half_angle = if light.outer_cutoff > -1.0 {
        light.outer_cutoff.clamp(-1.0, 1.0).acos()
    } else {
        utils::deg_to_rad(45.0)
    };
    let fov = (2.0 * half_angle).clamp(utils::deg_to_rad(1.0), utils::deg_to_rad(179.0));

    (view, Mat4::perspective(fov, 1.0, light.near, light.far()))
}

/// View and projection of a directional light, fitted to `scene_bounds`
///
/// The light looks at the center of the bounds from outside them; the
/// orthographic box is the light-space AABB of the bounds' corners.
pub fn directional_view_proj(light: &Light, scene_bounds: &BoundingBox) -> (Mat4, Mat4) {
    let dir = utils::normalize_or_zero(light.direction);
    let dir = if dir == Vec3::zeros() { Vec3::new(0.0, 0.0, -1.0) } else { dir };

    let center = scene_bounds.center();
    let radius = (scene_bounds.max - scene_bounds.min).norm() * 0.5;
    let eye = center - dir * radius.max(1.0);
    let view = Mat4::look_at(eye, center, stable_up(&dir));

    let light_space = scene_bounds.transformed(&view);
    // View space looks down -Z: near/far are the negated z extents
    let proj = Mat4::ortho(
        light_space.min.x,
        light_space.max.x,
        light_space.min.y,
        light_space.max.y,
        -light_space.max.z,
        -light_space.min.z,
    );

    (view, proj)
}

/// View-projection used to render and sample a 2D shadow map
///
/// Omni lights render six views and return `None`.
pub fn light_view_proj(light: &Light, scene_bounds: &BoundingBox) -> Option<Mat4> {
    match light.light_type {
        LightType::Directional => {
            let (view, proj) = directional_view_proj(light, scene_bounds);
            Some(proj * view)
        }
        LightType::Spot => {
            let (view, proj) = spot_view_proj(light);
            Some(proj * view)
        }
        LightType::Omni => None,
    }
}
