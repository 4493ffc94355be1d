//! Light visibility batching
//!
//! Each frame every enabled light is reduced to a screen-space rectangle.
//! The rectangles are conservative: a light may be kept when it does not
//! actually touch the screen, but a light that does is never dropped.

use crate::foundation::math::{utils, Mat4, Vec3, Vec4};
use crate::render::api::FrameData;
use crate::render::primitives::{BoundingBox, ScreenRect};

use super::light::{Light, LightType};
use super::registry::{LightHandle, LightRegistry};

/// Beyond this half-angle a spot cone is bounded by its range sphere
const WIDE_CONE_DEGREES: f32 = 89.0;

/// A visible light and the part of the screen it may affect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchedLight {
    /// Light handle
    pub handle: LightHandle,
    /// Screen area in pixels, top-left origin, clamped to the viewport
    pub rect: ScreenRect,
}

/// Project world points and return their screen bounds
///
/// `None` means a point lies on or behind the camera plane, in which case
/// the caller should assume the whole screen is covered.
fn project_points(points: &[Vec3], view_proj: &Mat4, width: f32, height: f32) -> Option<ScreenRect> {
    let mut min = (f32::MAX, f32::MAX);
    let mut max = (f32::MIN, f32::MIN);

    for p in points {
        let clip: Vec4 = view_proj * Vec4::new(p.x, p.y, p.z, 1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        let sx = (ndc_x * 0.5 + 0.5) * width;
        let sy = (1.0 - (ndc_y * 0.5 + 0.5)) * height;
        min = (min.0.min(sx), min.1.min(sy));
        max = (max.0.max(sx), max.1.max(sy));
    }

    Some(ScreenRect::new(min.0, min.1, max.0 - min.0, max.1 - min.1))
}

/// Screen bounds of a sphere, `None` when it is outside the frustum
pub fn project_sphere(center: &Vec3, radius: f32, frame: &FrameData) -> Option<ScreenRect> {
    let (width, height) = frame.resolution_f32();
    let full = ScreenRect::new(0.0, 0.0, width, height);

    if !frame.frustum.intersects_sphere(center, radius) {
        return None;
    }
    if frame.distance_sq(center) <= radius * radius {
        return Some(full);
    }

    let cube = BoundingBox::new(center - Vec3::repeat(radius), center + Vec3::repeat(radius));
    Some(project_points(&cube.corners(), &frame.view_proj, width, height).unwrap_or(full))
}

/// Screen bounds of a spot cone, `None` when it is outside the frustum
///
/// The cone is bounded by its apex and base disk. The base radius is
/// `range * tan(angle)`, which contains the lit volume for every opening
/// angle below 90 degrees; wider cones fall back to the range sphere.
pub fn project_cone(
    apex: &Vec3,
    direction: &Vec3,
    range: f32,
    outer_cutoff_cos: f32,
    frame: &FrameData,
) -> Option<ScreenRect> {
    let dir = utils::normalize_or_zero(*direction);
    let angle = outer_cutoff_cos.clamp(-1.0, 1.0).acos();

    if dir == Vec3::zeros() || outer_cutoff_cos <= -1.0 || angle >= utils::deg_to_rad(WIDE_CONE_DEGREES) {
        return project_sphere(apex, range, frame);
    }

    let base_center = apex + dir * range;
    let base_radius = range * angle.tan();
    let extent = Vec3::new(
        base_radius * (1.0 - dir.x * dir.x).max(0.0).sqrt(),
        base_radius * (1.0 - dir.y * dir.y).max(0.0).sqrt(),
        base_radius * (1.0 - dir.z * dir.z).max(0.0).sqrt(),
    );
    let bounds = BoundingBox::new(
        apex.inf(&(base_center - extent)),
        apex.sup(&(base_center + extent)),
    );

    if !frame.frustum.intersects_aabb(&bounds) {
        return None;
    }

    let (width, height) = frame.resolution_f32();
    let full = ScreenRect::new(0.0, 0.0, width, height);
    Some(project_points(&bounds.corners(), &frame.view_proj, width, height).unwrap_or(full))
}

/// Screen rectangle a light may affect before viewport clipping
pub fn light_screen_rect(light: &Light, frame: &FrameData) -> Option<ScreenRect> {
    let (width, height) = frame.resolution_f32();
    match light.light_type {
        LightType::Directional => Some(ScreenRect::new(0.0, 0.0, width, height)),
        LightType::Spot => project_cone(&light.position, &light.direction, light.range, light.outer_cutoff, frame),
        LightType::Omni => project_sphere(&light.position, light.range, frame),
    }
}

/// Build the visible-light batch for the frame
///
/// Walks the registry in slot order. Enabled shadowed lights advance their
/// refresh policy by `dt` seconds whether or not they end up visible.
pub fn batch_lights(registry: &mut LightRegistry, frame: &FrameData, dt: f32) -> Vec<BatchedLight> {
    let (width, height) = frame.resolution_f32();
    let viewport = ScreenRect::new(0.0, 0.0, width, height);
    let mut batch = Vec::new();

    for (handle, light) in registry.iter_mut() {
        if !light.enabled {
            continue;
        }

        if light.shadow.enabled {
            light.shadow.update.process(dt);
        }

        let Some(rect) = light_screen_rect(light, frame) else {
            log::trace!("Light {:?} culled by frustum", handle);
            continue;
        };
        if !rect.intersects(&viewport) {
            log::trace!("Light {:?} projects off screen", handle);
            continue;
        }

        batch.push(BatchedLight {
            handle,
            rect: rect.clamped(width, height),
        });
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::RecordingDevice;
    use crate::render::primitives::Camera;

    fn frame_at(position: Vec3, target: Vec3) -> FrameData {
        let camera = Camera::perspective(position, target, 60.0);
        FrameData::new(&camera, 800.0 / 600.0, 0.01, 1000.0, (800, 600))
    }

    fn default_frame() -> FrameData {
        frame_at(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros())
    }

    #[test]
    fn test_directional_always_batched() {
        let mut registry = LightRegistry::new(1024);
        let h = registry.create(LightType::Directional);
        registry.set_active(h, true);

        for frame in [default_frame(), frame_at(Vec3::new(500.0, -30.0, 2.0), Vec3::new(600.0, 0.0, 0.0))] {
            let batch = batch_lights(&mut registry, &frame, 0.016);
            assert_eq!(batch.len(), 1);
            assert_eq!(batch[0].rect, ScreenRect::new(0.0, 0.0, 800.0, 600.0));
        }
    }

    #[test]
    fn test_disabled_lights_are_skipped() {
        let mut registry = LightRegistry::new(1024);
        registry.create(LightType::Directional);
        assert!(batch_lights(&mut registry, &default_frame(), 0.016).is_empty());
    }

    #[test]
    fn test_offscreen_omni_excluded() {
        let mut registry = LightRegistry::new(1024);
        let h = registry.create(LightType::Omni);
        registry.set_position(h, Vec3::new(0.0, 0.0, 50.0));
        registry.set_range(h, 5.0);
        registry.set_active(h, true);

        assert!(batch_lights(&mut registry, &default_frame(), 0.016).is_empty());
    }

    #[test]
    fn test_visible_omni_has_partial_rect() {
        let mut registry = LightRegistry::new(1024);
        let h = registry.create(LightType::Omni);
        registry.set_range(h, 1.0);
        registry.set_active(h, true);

        let batch = batch_lights(&mut registry, &default_frame(), 0.016);
        assert_eq!(batch.len(), 1);
        let rect = batch[0].rect;
        assert!(rect.width > 0.0 && rect.width < 800.0);
        assert!(rect.x > 0.0 && rect.y > 0.0);
        // Centered light
        assert!((rect.x + rect.width * 0.5 - 400.0).abs() < 1.0);
        assert!((rect.y + rect.height * 0.5 - 300.0).abs() < 1.0);
    }

    #[test]
    fn test_camera_inside_omni_range_covers_screen() {
        let frame = default_frame();
        let rect = project_sphere(&Vec3::new(0.0, 0.0, 9.0), 5.0, &frame).expect("visible");
        assert_eq!(rect, ScreenRect::new(0.0, 0.0, 800.0, 600.0));
    }

    #[test]
    fn test_spot_pointing_away_is_excluded() {
        let mut registry = LightRegistry::new(1024);
        let h = registry.create(LightType::Spot);
        registry.set_position(h, Vec3::new(0.0, 0.0, 12.0));
        registry.set_direction(h, Vec3::new(0.0, 0.0, 1.0));
        registry.set_outer_cutoff(h, 20.0);
        registry.set_range(h, 10.0);
        registry.set_active(h, true);

        assert!(batch_lights(&mut registry, &default_frame(), 0.016).is_empty());
    }

    #[test]
    fn test_spot_rect_contains_lit_spot() {
        let frame = default_frame();
        let apex = Vec3::new(0.0, 5.0, 0.0);
        let dir = Vec3::new(0.0, -1.0, 0.0);
        let rect = project_cone(&apex, &dir, 6.0, utils::deg_to_rad(30.0).cos(), &frame).expect("visible");

        // The ground point right below the apex is lit and must be inside
        let below = project_points(&[Vec3::new(0.0, -1.0, 0.0)], &frame.view_proj, 800.0, 600.0)
            .expect("in front");
        assert!(rect.x <= below.x && below.x <= rect.x + rect.width);
        assert!(rect.y <= below.y && below.y <= rect.y + rect.height);
    }

    #[test]
    fn test_wide_spot_uses_sphere() {
        let frame = default_frame();
        let apex = Vec3::zeros();
        let dir = Vec3::new(1.0, 0.0, 0.0);
        let cone = project_cone(&apex, &dir, 2.0, -1.0, &frame);
        let sphere = project_sphere(&apex, 2.0, &frame);
        assert_eq!(cone, sphere);
    }

    #[test]
    fn test_shadow_policy_advances_only_for_enabled_lights() {
        let mut registry = LightRegistry::new(1024);
        let mut device = RecordingDevice::new(800, 600);
        let h = registry.create(LightType::Directional);
        registry.enable_shadow(&mut device, h, 64).expect("enable");

        batch_lights(&mut registry, &default_frame(), 0.5);
        assert_eq!(registry.get(h).map(|l| l.shadow.update.timer), Some(0.0));

        registry.set_active(h, true);
        batch_lights(&mut registry, &default_frame(), 0.005);
        assert!(registry.get(h).map_or(0.0, |l| l.shadow.update.timer) > 0.0);
    }
}
