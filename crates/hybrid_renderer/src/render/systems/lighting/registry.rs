//! Light registry
//!
//! Lights live in a generational slot map. A handle stays valid until the
//! light is destroyed; afterwards every accessor detects the stale handle,
//! logs a warning and returns a neutral value instead of touching another
//! light that may have reused the slot.

use crate::foundation::collections::{new_key_type, SlotMap};
use crate::foundation::math::{utils, Vec3};
use crate::render::api::{DeviceResult, GraphicsDevice};
use crate::render::primitives::Color;

use super::light::{Light, LightType, ShadowUpdateMode};
use super::shadow::{create_shadow_map, destroy_shadow_map};

new_key_type! {
    /// Stable identifier of a light
    pub struct LightHandle;
}

/// Table of all lights of a renderer
#[derive(Debug)]
pub struct LightRegistry {
    lights: SlotMap<LightHandle, Light>,
    default_shadow_resolution: u32,
}

impl LightRegistry {
    /// Empty registry; `default_shadow_resolution` is used when a shadow is
    /// enabled with a resolution of zero
    pub fn new(default_shadow_resolution: u32) -> Self {
        Self {
            lights: SlotMap::with_key(),
            default_shadow_resolution,
        }
    }

    fn with_light<R>(&self, handle: LightHandle, op: &str, neutral: R, f: impl FnOnce(&Light) -> R) -> R {
        match self.lights.get(handle) {
            Some(light) => f(light),
            None => {
                log::warn!("{}: light {:?} does not exist", op, handle);
                neutral
            }
        }
    }

    fn with_light_mut(&mut self, handle: LightHandle, op: &str, f: impl FnOnce(&mut Light)) {
        match self.lights.get_mut(handle) {
            Some(light) => f(light),
            None => log::warn!("{}: light {:?} does not exist", op, handle),
        }
    }

    // === Lifecycle ===

    /// Create a disabled light of the given type
    pub fn create(&mut self, light_type: LightType) -> LightHandle {
        let handle = self.lights.insert(Light::new(light_type));
        log::debug!("Created {:?} light {:?}", light_type, handle);
        handle
    }

    /// Destroy a light and its shadow map; returns whether it existed
    pub fn destroy(&mut self, device: &mut dyn GraphicsDevice, handle: LightHandle) -> bool {
        match self.lights.remove(handle) {
            Some(light) => {
                if let Some(map) = light.shadow.map {
                    destroy_shadow_map(device, &map);
                }
                log::debug!("Destroyed light {:?}", handle);
                true
            }
            None => {
                log::warn!("destroy: light {:?} does not exist", handle);
                false
            }
        }
    }

    /// Destroy every light
    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        for (_, light) in self.lights.drain() {
            if let Some(map) = light.shadow.map {
                destroy_shadow_map(device, &map);
            }
        }
    }

    /// Whether `handle` refers to a live light
    pub fn exists(&self, handle: LightHandle) -> bool {
        self.lights.contains_key(handle)
    }

    /// Number of live lights
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// Whether no light exists
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Read access to a light
    pub fn get(&self, handle: LightHandle) -> Option<&Light> {
        self.lights.get(handle)
    }

    /// Write access to a light
    pub fn get_mut(&mut self, handle: LightHandle) -> Option<&mut Light> {
        self.lights.get_mut(handle)
    }

    /// Lights in slot order
    pub fn iter(&self) -> impl Iterator<Item = (LightHandle, &Light)> {
        self.lights.iter()
    }

    /// Mutable lights in slot order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (LightHandle, &mut Light)> {
        self.lights.iter_mut()
    }

    // === Activation ===

    /// Whether the light contributes to the frame
    pub fn is_active(&self, handle: LightHandle) -> bool {
        self.with_light(handle, "is_active", false, |l| l.enabled)
    }

    /// Enable or disable a light
    ///
    /// Re-enabling a shadowed light schedules a shadow refresh.
    pub fn set_active(&mut self, handle: LightHandle, active: bool) {
        self.with_light_mut(handle, "set_active", |l| {
            if l.enabled == active {
                return;
            }
            if active && l.shadow.enabled {
                l.shadow.update.should_update = true;
            }
            l.enabled = active;
        });
    }

    /// Flip the enabled state
    pub fn toggle(&mut self, handle: LightHandle) {
        self.with_light_mut(handle, "toggle", |l| {
            l.enabled = !l.enabled;
            if l.enabled && l.shadow.enabled {
                l.shadow.update.should_update = true;
            }
        });
    }

    // === Type ===

    /// Type of the light
    pub fn light_type(&self, handle: LightHandle) -> Option<LightType> {
        self.with_light(handle, "light_type", None, |l| Some(l.light_type))
    }

    /// Change the light type, reallocating an existing shadow map to match
    ///
    /// A shadow bias still at the old type's default moves to the new
    /// type's default. If the new map cannot be allocated, shadows are
    /// disabled for the light and the error is returned.
    pub fn set_light_type(
        &mut self,
        device: &mut dyn GraphicsDevice,
        handle: LightHandle,
        light_type: LightType,
    ) -> DeviceResult<()> {
        let Some(light) = self.lights.get_mut(handle) else {
            log::warn!("set_light_type: light {:?} does not exist", handle);
            return Ok(());
        };
        if light.light_type == light_type {
            return Ok(());
        }
        let previous = light.light_type;
        light.light_type = light_type;
        if (light.shadow.bias - previous.default_shadow_bias()).abs() <= f32::EPSILON {
            light.shadow.bias = light_type.default_shadow_bias();
        }

        if let Some(map) = light.shadow.map.take() {
            destroy_shadow_map(device, &map);
            match create_shadow_map(device, light_type, map.resolution) {
                Ok(map) => {
                    light.shadow.map = Some(map);
                    light.shadow.update.should_update = true;
                }
                Err(err) => {
                    log::error!("set_light_type: shadow map reallocation failed for {:?}: {}", handle, err);
                    light.shadow.enabled = false;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    // === Color and intensity ===

    /// Color as 8-bit channels, alpha is always opaque
    pub fn color(&self, handle: LightHandle) -> Color {
        self.with_light(handle, "color", Color::BLANK, |l| Color::from_vec3(l.color))
    }

    /// Linear color
    pub fn color_vec(&self, handle: LightHandle) -> Vec3 {
        self.with_light(handle, "color_vec", Vec3::zeros(), |l| l.color)
    }

    /// Set the color; alpha is ignored
    pub fn set_color(&mut self, handle: LightHandle, color: Color) {
        self.with_light_mut(handle, "set_color", |l| l.color = color.to_vec3());
    }

    /// Set the linear color
    pub fn set_color_vec(&mut self, handle: LightHandle, color: Vec3) {
        self.with_light_mut(handle, "set_color_vec", |l| l.color = color);
    }

    /// Intensity multiplier
    pub fn energy(&self, handle: LightHandle) -> f32 {
        self.with_light(handle, "energy", 0.0, |l| l.energy)
    }

    /// Set the intensity multiplier
    pub fn set_energy(&mut self, handle: LightHandle, energy: f32) {
        self.with_light_mut(handle, "set_energy", |l| l.energy = energy);
    }

    /// Specular contribution
    pub fn specular(&self, handle: LightHandle) -> f32 {
        self.with_light(handle, "specular", 0.0, |l| l.specular)
    }

    /// Set the specular contribution
    pub fn set_specular(&mut self, handle: LightHandle, specular: f32) {
        self.with_light_mut(handle, "set_specular", |l| l.specular = specular);
    }

    // === Placement ===

    /// World position
    pub fn position(&self, handle: LightHandle) -> Vec3 {
        self.with_light(handle, "position", Vec3::zeros(), |l| l.position)
    }

    /// Set the world position
    pub fn set_position(&mut self, handle: LightHandle, position: Vec3) {
        self.with_light_mut(handle, "set_position", |l| l.position = position);
    }

    /// Normalized direction
    pub fn direction(&self, handle: LightHandle) -> Vec3 {
        self.with_light(handle, "direction", Vec3::zeros(), |l| l.direction)
    }

    /// Set the direction; the stored value is normalized
    pub fn set_direction(&mut self, handle: LightHandle, direction: Vec3) {
        self.with_light_mut(handle, "set_direction", |l| {
            l.direction = utils::normalize_or_zero(direction);
        });
    }

    /// Point the light from its position toward `target`
    pub fn set_target(&mut self, handle: LightHandle, target: Vec3) {
        self.with_light_mut(handle, "set_target", |l| {
            l.direction = utils::normalize_or_zero(target - l.position);
        });
    }

    // === Falloff ===

    /// Reach in world units
    pub fn range(&self, handle: LightHandle) -> f32 {
        self.with_light(handle, "range", 0.0, |l| l.range)
    }

    /// Set the reach
    pub fn set_range(&mut self, handle: LightHandle, range: f32) {
        self.with_light_mut(handle, "set_range", |l| l.range = range);
    }

    /// Distance falloff exponent
    pub fn attenuation(&self, handle: LightHandle) -> f32 {
        self.with_light(handle, "attenuation", 0.0, |l| l.attenuation)
    }

    /// Set the falloff exponent
    pub fn set_attenuation(&mut self, handle: LightHandle, attenuation: f32) {
        self.with_light_mut(handle, "set_attenuation", |l| l.attenuation = attenuation);
    }

    /// Apparent source size
    pub fn size(&self, handle: LightHandle) -> f32 {
        self.with_light(handle, "size", 0.0, |l| l.size)
    }

    /// Set the apparent source size
    pub fn set_size(&mut self, handle: LightHandle, size: f32) {
        self.with_light_mut(handle, "set_size", |l| l.size = size);
    }

    /// Inner cone angle in degrees
    pub fn inner_cutoff(&self, handle: LightHandle) -> f32 {
        self.with_light(handle, "inner_cutoff", 0.0, |l| utils::rad_to_deg(l.inner_cutoff.acos()))
    }

    /// Set the inner cone angle in degrees
    pub fn set_inner_cutoff(&mut self, handle: LightHandle, degrees: f32) {
        self.with_light_mut(handle, "set_inner_cutoff", |l| {
            l.inner_cutoff = utils::deg_to_rad(degrees).cos();
        });
    }

    /// Outer cone angle in degrees
    pub fn outer_cutoff(&self, handle: LightHandle) -> f32 {
        self.with_light(handle, "outer_cutoff", 0.0, |l| utils::rad_to_deg(l.outer_cutoff.acos()))
    }

    /// Set the outer cone angle in degrees
    pub fn set_outer_cutoff(&mut self, handle: LightHandle, degrees: f32) {
        self.with_light_mut(handle, "set_outer_cutoff", |l| {
            l.outer_cutoff = utils::deg_to_rad(degrees).cos();
        });
    }

    // === Shadows ===

    /// Enable shadow casting
    ///
    /// Allocates the shadow map on first use. A positive `resolution` that
    /// differs from the current map reallocates it; zero keeps the current
    /// map or falls back to the default resolution.
    pub fn enable_shadow(
        &mut self,
        device: &mut dyn GraphicsDevice,
        handle: LightHandle,
        resolution: u32,
    ) -> DeviceResult<()> {
        let default_resolution = self.default_shadow_resolution;
        let Some(light) = self.lights.get_mut(handle) else {
            log::warn!("enable_shadow: light {:?} does not exist", handle);
            return Ok(());
        };

        match light.shadow.map {
            Some(map) if resolution > 0 && map.resolution != resolution => {
                destroy_shadow_map(device, &map);
                light.shadow.map = None;
                light.shadow.map = Some(create_shadow_map(device, light.light_type, resolution)?);
            }
            Some(_) => {}
            None => {
                let resolution = if resolution == 0 { default_resolution } else { resolution };
                light.shadow.map = Some(create_shadow_map(device, light.light_type, resolution)?);
            }
        }

        light.shadow.enabled = true;
        light.shadow.update.should_update = true;
        Ok(())
    }

    /// Stop casting shadows, optionally releasing the map
    pub fn disable_shadow(&mut self, device: &mut dyn GraphicsDevice, handle: LightHandle, destroy_map: bool) {
        let Some(light) = self.lights.get_mut(handle) else {
            log::warn!("disable_shadow: light {:?} does not exist", handle);
            return;
        };
        if destroy_map {
            if let Some(map) = light.shadow.map.take() {
                destroy_shadow_map(device, &map);
            }
        }
        light.shadow.enabled = false;
    }

    /// Whether the light casts shadows
    pub fn is_shadow_enabled(&self, handle: LightHandle) -> bool {
        self.with_light(handle, "is_shadow_enabled", false, |l| l.shadow.enabled)
    }

    /// Whether a shadow map is allocated
    pub fn has_shadow_map(&self, handle: LightHandle) -> bool {
        self.with_light(handle, "has_shadow_map", false, |l| l.shadow.map.is_some())
    }

    /// Refresh policy
    pub fn shadow_update_mode(&self, handle: LightHandle) -> ShadowUpdateMode {
        self.with_light(handle, "shadow_update_mode", ShadowUpdateMode::Manual, |l| l.shadow.update.mode)
    }

    /// Set the refresh policy
    pub fn set_shadow_update_mode(&mut self, handle: LightHandle, mode: ShadowUpdateMode) {
        self.with_light_mut(handle, "set_shadow_update_mode", |l| l.shadow.update.mode = mode);
    }

    /// Refresh period in milliseconds
    pub fn shadow_update_frequency(&self, handle: LightHandle) -> u32 {
        self.with_light(handle, "shadow_update_frequency", 0, |l| seconds_to_millis(l.shadow.update.frequency))
    }

    /// Set the refresh period in milliseconds
    pub fn set_shadow_update_frequency(&mut self, handle: LightHandle, millis: u32) {
        self.with_light_mut(handle, "set_shadow_update_frequency", |l| {
            l.shadow.update.frequency = millis as f32 / 1000.0;
        });
    }

    /// Request a refresh on the next frame
    pub fn update_shadow_map(&mut self, handle: LightHandle) {
        self.with_light_mut(handle, "update_shadow_map", |l| l.shadow.update.should_update = true);
    }

    /// Depth comparison bias
    pub fn shadow_bias(&self, handle: LightHandle) -> f32 {
        self.with_light(handle, "shadow_bias", 0.0, |l| l.shadow.bias)
    }

    /// Set the depth comparison bias
    pub fn set_shadow_bias(&mut self, handle: LightHandle, bias: f32) {
        self.with_light_mut(handle, "set_shadow_bias", |l| l.shadow.bias = bias);
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn seconds_to_millis(seconds: f32) -> u32 {
    (seconds * 1000.0).round().max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::RecordingDevice;
    use approx::assert_relative_eq;

    fn setup() -> (LightRegistry, RecordingDevice) {
        (LightRegistry::new(1024), RecordingDevice::new(800, 600))
    }

    #[test]
    fn test_create_and_destroy() {
        let (mut registry, mut device) = setup();
        let a = registry.create(LightType::Omni);
        let b = registry.create(LightType::Spot);

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert!(registry.destroy(&mut device, a));
        assert!(!registry.exists(a));
        assert!(!registry.destroy(&mut device, a));
    }

    #[test]
    fn test_stale_handle_is_not_reused() {
        let (mut registry, mut device) = setup();
        let old = registry.create(LightType::Omni);
        registry.destroy(&mut device, old);

        let new = registry.create(LightType::Omni);
        assert_ne!(old, new);
        registry.set_energy(old, 42.0);
        assert_eq!(registry.energy(new), 1.0);
        assert_eq!(registry.energy(old), 0.0);
    }

    #[test]
    fn test_direction_is_normalized() {
        let (mut registry, _) = setup();
        let h = registry.create(LightType::Directional);
        registry.set_direction(h, Vec3::new(0.0, -4.0, 3.0));
        assert_relative_eq!(registry.direction(h), Vec3::new(0.0, -0.8, 0.6), epsilon = 1e-6);
    }

    #[test]
    fn test_target_sets_direction_from_position() {
        let (mut registry, _) = setup();
        let h = registry.create(LightType::Spot);
        registry.set_position(h, Vec3::new(0.0, 10.0, 0.0));
        registry.set_target(h, Vec3::zeros());
        assert_relative_eq!(registry.direction(h), Vec3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_cutoff_round_trip() {
        let (mut registry, _) = setup();
        let h = registry.create(LightType::Spot);
        registry.set_inner_cutoff(h, 25.0);
        registry.set_outer_cutoff(h, 40.0);
        assert_relative_eq!(registry.inner_cutoff(h), 25.0, epsilon = 1e-3);
        assert_relative_eq!(registry.outer_cutoff(h), 40.0, epsilon = 1e-3);
    }

    #[test]
    fn test_color_round_trip() {
        let (mut registry, _) = setup();
        let h = registry.create(LightType::Omni);
        registry.set_color(h, Color::new(255, 128, 0, 12));
        assert_eq!(registry.color(h), Color::new(255, 128, 0, 255));
    }

    #[test]
    fn test_enable_shadow_allocates_default_resolution() {
        let (mut registry, mut device) = setup();
        let h = registry.create(LightType::Spot);

        registry.enable_shadow(&mut device, h, 0).expect("enable");
        assert!(registry.has_shadow_map(h));
        assert_eq!(registry.get(h).and_then(|l| l.shadow.map).map(|m| m.resolution), Some(1024));

        // A different positive resolution reallocates
        registry.enable_shadow(&mut device, h, 512).expect("enable");
        assert_eq!(registry.get(h).and_then(|l| l.shadow.map).map(|m| m.resolution), Some(512));
        assert_eq!(device.live_texture_count(), 1);
    }

    #[test]
    fn test_disable_shadow_keeps_or_frees_map() {
        let (mut registry, mut device) = setup();
        let h = registry.create(LightType::Directional);
        registry.enable_shadow(&mut device, h, 256).expect("enable");

        registry.disable_shadow(&mut device, h, false);
        assert!(!registry.is_shadow_enabled(h));
        assert!(registry.has_shadow_map(h));

        registry.disable_shadow(&mut device, h, true);
        assert!(!registry.has_shadow_map(h));
        assert_eq!(device.live_texture_count(), 0);
    }

    #[test]
    fn test_set_light_type_recreates_map() {
        let (mut registry, mut device) = setup();
        let h = registry.create(LightType::Spot);
        registry.enable_shadow(&mut device, h, 128).expect("enable");

        registry.set_light_type(&mut device, h, LightType::Omni).expect("retype");
        let map = registry.get(h).and_then(|l| l.shadow.map).expect("map");
        assert!(map.is_cube());
        assert_eq!(map.resolution, 128);
        assert_eq!(device.live_texture_count(), 1);
    }

    #[test]
    fn test_set_light_type_moves_default_bias_only() {
        let (mut registry, mut device) = setup();
        let lamp = registry.create(LightType::Omni);
        registry.set_light_type(&mut device, lamp, LightType::Spot).expect("retype");
        assert_eq!(registry.shadow_bias(lamp), LightType::Spot.default_shadow_bias());

        let custom = registry.create(LightType::Omni);
        registry.set_shadow_bias(custom, 0.2);
        registry.set_light_type(&mut device, custom, LightType::Directional).expect("retype");
        assert_eq!(registry.shadow_bias(custom), 0.2);
    }

    #[test]
    fn test_failed_map_reallocation_disables_shadow() {
        let (mut registry, mut device) = setup();
        let h = registry.create(LightType::Spot);
        registry.enable_shadow(&mut device, h, 128).expect("enable");

        device.limit_texture_creation(Some(0));
        assert!(registry.set_light_type(&mut device, h, LightType::Omni).is_err());

        assert_eq!(registry.light_type(h), Some(LightType::Omni));
        assert!(!registry.is_shadow_enabled(h));
        assert!(!registry.has_shadow_map(h));
        assert_eq!(device.live_texture_count(), 0);
        assert_eq!(device.live_framebuffer_count(), 0);
    }

    #[test]
    fn test_frequency_in_milliseconds() {
        let (mut registry, _) = setup();
        let h = registry.create(LightType::Spot);
        assert_eq!(registry.shadow_update_frequency(h), 16);
        registry.set_shadow_update_frequency(h, 100);
        assert_eq!(registry.shadow_update_frequency(h), 100);
        assert_relative_eq!(registry.get(h).map_or(0.0, |l| l.shadow.update.frequency), 0.1);
    }

    #[test]
    fn test_reactivation_schedules_shadow_refresh() {
        let (mut registry, mut device) = setup();
        let h = registry.create(LightType::Spot);
        registry.enable_shadow(&mut device, h, 64).expect("enable");
        registry.set_active(h, true);
        if let Some(light) = registry.get_mut(h) {
            light.shadow.update.should_update = false;
        }

        registry.set_active(h, false);
        registry.set_active(h, true);
        assert_eq!(registry.get(h).map(|l| l.shadow.update.should_update), Some(true));
    }

    #[test]
    fn test_destroy_releases_shadow_map() {
        let (mut registry, mut device) = setup();
        let h = registry.create(LightType::Omni);
        registry.enable_shadow(&mut device, h, 64).expect("enable");
        registry.destroy(&mut device, h);
        assert_eq!(device.live_texture_count(), 0);
        assert_eq!(device.live_framebuffer_count(), 0);
    }
}
