//! # Renderer
//!
//! The explicit context object of the pipeline. A `Renderer` owns its
//! graphics device and every GPU resource it creates, so several renderers
//! can coexist and tests can drive one over a [`RecordingDevice`].
//!
//! ## Frame bracket
//!
//! ```rust
//! use hybrid_renderer::foundation::math::{Mat4, Vec3};
//! use hybrid_renderer::render::api::MeshHandle;
//! use hybrid_renderer::render::backends::RecordingDevice;
//! use hybrid_renderer::render::primitives::BoundingBox;
//! use hybrid_renderer::render::{Camera, LightType, Material, Mesh, Renderer, RendererConfig};
//!
//! let device = RecordingDevice::new(320, 240);
//! let mut renderer = Renderer::init(device, RendererConfig::new(320, 240))?;
//!
//! let sun = renderer.create_light(LightType::Directional);
//! renderer.set_light_active(sun, true);
//!
//! let mesh = Mesh::new(MeshHandle(1), 24, 36, BoundingBox::default());
//! renderer.begin(&Camera::default())?;
//! renderer.draw_mesh(&mesh, &Material::default(), &Mat4::identity());
//! let stats = renderer.end()?;
//! assert!(stats.ran("geometry"));
//! # Ok::<(), hybrid_renderer::render::RenderError>(())
//! ```
//!
//! [`RecordingDevice`]: crate::render::backends::RecordingDevice

use crate::foundation::math::{Mat4, Mat4Ext, Vec2, Vec3, utils};
use crate::foundation::time::{FrameTimer, Stopwatch};
use crate::render::api::{GraphicsDevice, FrameData, IRect, RenderTarget, RendererConfig, ShaderProgram, TextureHandle};
use crate::render::passes::{reset_device_state, FrameStats, PassContext, PassSequence};
use crate::render::primitives::{Camera, Color, Mesh, Model, Sprite};
use crate::render::resources::{DefaultTextures, FramebufferSet, Material, Primitives, ShaderLibrary};
use crate::render::systems::drawcall::{
    apply_billboard, classify, effective_blend_mode, DrawCall, DrawCallBins, InstanceData, UvTransform,
};
use crate::render::systems::environment::{BloomMode, Environment, FogMode, Skybox};
use crate::render::systems::lighting::{batch_lights, LightHandle, LightRegistry, LightType};
use crate::render::systems::state::{
    BillboardMode, BlendMode, RenderFlags, RenderMode, RenderState, ShadowCastMode,
};
use crate::render::{RenderError, RenderResult};

/// Seed of the SSAO noise and kernel
const NOISE_SEED: u64 = 0x5eed_a0;

/// Intermediate buffers that can be shown for debugging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugBuffer {
    /// G-buffer base color
    Albedo,
    /// G-buffer emission
    Emission,
    /// G-buffer encoded normals
    Normal,
    /// G-buffer occlusion/roughness/metalness
    Orm,
    /// Blurred ambient occlusion
    Ssao,
    /// Bright-pass extract
    Bright,
    /// Blurred bloom
    Bloom,
}

/// Hybrid deferred/forward renderer
pub struct Renderer<D: GraphicsDevice> {
    device: D,
    config: RendererConfig,
    shaders: ShaderLibrary,
    targets: FramebufferSet,
    textures: DefaultTextures,
    primitives: Primitives,
    passes: PassSequence,

    draw_calls: DrawCallBins,
    lights: LightRegistry,
    environment: Environment,
    state: RenderState,
    output: Option<RenderTarget>,

    frame: Option<FrameData>,
    timer: FrameTimer,
}

impl<D: GraphicsDevice> std::fmt::Debug for Renderer<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("resolution", &self.targets.resolution())
            .field("flags", &self.state.flags)
            .field("lights", &self.lights.len())
            .field("in_frame", &self.frame.is_some())
            .finish_non_exhaustive()
    }
}

impl<D: GraphicsDevice> Renderer<D> {
    // === Lifecycle ===

    /// Create every always-present resource on `device`
    ///
    /// Fails if the configuration is invalid, a framebuffer is incomplete
    /// or a core shader does not link.
    pub fn init(mut device: D, config: RendererConfig) -> RenderResult<Self> {
        config.validate()?;
        log::info!("Initializing renderer at {}x{} ({:?})", config.width, config.height, config.flags);

        let targets = FramebufferSet::load(&mut device, config.width, config.height)?;
        let mut shaders = ShaderLibrary::new();
        shaders.load_core(&mut device)?;
        let textures = DefaultTextures::load(&mut device, NOISE_SEED)?;
        let primitives = Primitives::load(&mut device)?;

        let passes = PassSequence::standard();
        passes.validate()?;

        let mut renderer = Self {
            device,
            shaders,
            targets,
            textures,
            primitives,
            passes,
            draw_calls: DrawCallBins::new(),
            lights: LightRegistry::new(config.default_shadow_resolution),
            environment: Environment::default(),
            state: RenderState::new(config.flags),
            output: None,
            frame: None,
            timer: FrameTimer::new(),
            config,
        };
        reset_device_state(&mut renderer.device);
        Ok(renderer)
    }

    /// Release every resource and hand the device back
    pub fn close(mut self) -> D {
        self.lights.clear(&mut self.device);
        self.targets.unload(&mut self.device);
        self.textures.unload(&mut self.device);
        self.primitives.unload(&mut self.device);
        self.shaders.unload_all(&mut self.device);
        log::info!("Renderer closed");
        self.device
    }

    /// Replace the pass sequence, rejecting one that reads before it writes
    pub fn set_pass_sequence(&mut self, passes: PassSequence) -> RenderResult<()> {
        passes.validate()?;
        self.passes = passes;
        Ok(())
    }

    // === Frame bracket ===

    /// Start a frame seen through `camera`
    pub fn begin(&mut self, camera: &Camera) -> RenderResult<()> {
        if self.frame.is_some() {
            return Err(RenderError::FrameAlreadyBegun);
        }
        self.draw_calls.clear();

        let resolution = self.targets.resolution();
        let aspect_source = if self.state.has(RenderFlags::ASPECT_KEEP) {
            resolution
        } else {
            self.destination_size()
        };
        let aspect = aspect_source.0 as f32 / aspect_source.1.max(1) as f32;

        self.frame = Some(FrameData::new(
            camera,
            aspect,
            self.config.near_plane,
            self.config.far_plane,
            resolution,
        ));
        log::trace!("Frame begun at {:?}", camera.position);
        Ok(())
    }

    /// Finish the frame, timing light refresh with the wall clock
    pub fn end(&mut self) -> RenderResult<FrameStats> {
        let dt = self.timer.tick();
        self.end_with_delta(dt)
    }

    /// Finish the frame with an explicit elapsed time in seconds
    ///
    /// Sorts the bins, batches visible lights, runs every enabled pass and
    /// resets the device state even if a pass fails.
    pub fn end_with_delta(&mut self, dt: f32) -> RenderResult<FrameStats> {
        let frame = self.frame.take().ok_or(RenderError::FrameNotBegun)?;
        let stopwatch = Stopwatch::start_new();

        self.draw_calls.sort(&frame.view_position);
        let batch = batch_lights(&mut self.lights, &frame, dt);
        self.ensure_optional_resources()?;

        let mut stats = FrameStats {
            deferred_calls: self.draw_calls.deferred.len(),
            deferred_instanced_calls: self.draw_calls.deferred_instanced.len(),
            forward_calls: self.draw_calls.forward.len(),
            forward_instanced_calls: self.draw_calls.forward_instanced.len(),
            lights_batched: batch.len(),
            ..FrameStats::default()
        };

        let result = {
            let mut ctx = PassContext {
                device: &mut self.device,
                shaders: &mut self.shaders,
                targets: &mut self.targets,
                textures: &self.textures,
                primitives: &self.primitives,
                frame: &frame,
                draw_calls: &self.draw_calls,
                lights: &mut self.lights,
                batch: &batch,
                environment: &self.environment,
                flags: self.state.flags,
                config: &self.config,
                output: self.output,
                stats: &mut stats,
            };
            self.passes.execute(&mut ctx)
        };
        reset_device_state(&mut self.device);
        result?;

        stats.cpu_time = stopwatch.elapsed();
        log::trace!(
            "Frame ended: {} draw calls, {} lights, {} passes",
            self.draw_calls.len(),
            stats.lights_batched,
            stats.passes.len()
        );
        Ok(stats)
    }

    /// Whether `begin` was called without `end` yet
    pub const fn is_frame_active(&self) -> bool {
        self.frame.is_some()
    }

    /// Targets, kernel and shaders of features enabled since the last frame
    fn ensure_optional_resources(&mut self) -> RenderResult<()> {
        if self.environment.ssao.enabled {
            self.targets.ensure_ssao(&mut self.device)?;
            self.textures.ensure_ssao_kernel(&mut self.device)?;
            self.shaders.load(&mut self.device, ShaderProgram::Ssao)?;
        }
        if self.environment.bloom.mode != BloomMode::Disabled {
            self.targets.ensure_bloom(&mut self.device)?;
            self.shaders.load(&mut self.device, ShaderProgram::Bloom)?;
        }
        if self.environment.fog.mode != FogMode::Disabled {
            self.shaders.load(&mut self.device, ShaderProgram::Fog)?;
        }
        if self.state.has(RenderFlags::FXAA) {
            self.shaders.load(&mut self.device, ShaderProgram::Fxaa)?;
        }
        Ok(())
    }

    fn destination_size(&self) -> (u32, u32) {
        self.output
            .map_or_else(|| self.device.screen_size(), |t| (t.width, t.height))
    }

    // === Submission ===

    fn frame_for(&self, op: &str) -> Option<&FrameData> {
        if self.frame.is_none() {
            log::warn!("{}: called outside begin/end, ignored", op);
        }
        self.frame.as_ref()
    }

    fn make_call(&self, mesh: &Mesh, material: &Material, transform: Mat4, instances: Option<InstanceData>) -> DrawCall {
        DrawCall {
            mesh: *mesh,
            material: *material,
            transform,
            shadow_cast_mode: self.state.shadow_cast_mode,
            blend_mode: effective_blend_mode(material, &self.state),
            alpha_scissor_threshold: self.state.alpha_scissor_threshold,
            instances,
            uv: UvTransform::default(),
        }
    }

    /// Draw one mesh
    pub fn draw_mesh(&mut self, mesh: &Mesh, material: &Material, transform: &Mat4) {
        let Some(frame) = self.frame_for("draw_mesh") else { return };
        let transform = apply_billboard(self.state.billboard_mode, transform, &frame.inv_view);

        let path = classify(material, &self.state);
        let call = self.make_call(mesh, material, transform, None);
        self.draw_calls.push(path, call);
    }

    /// Draw a mesh once per transform
    pub fn draw_mesh_instanced(&mut self, mesh: &Mesh, material: &Material, transforms: &[Mat4]) {
        self.draw_mesh_instanced_pro(mesh, material, &Mat4::identity(), transforms, None);
    }

    /// Draw a mesh once per transform with a color per instance
    pub fn draw_mesh_instanced_ex(&mut self, mesh: &Mesh, material: &Material, transforms: &[Mat4], colors: &[Color]) {
        self.draw_mesh_instanced_pro(mesh, material, &Mat4::identity(), transforms, Some(colors));
    }

    /// Draw a mesh once per transform, all placed by a global transform
    ///
    /// Each instance ends up at `global * transforms[i]`. Colors are
    /// dropped with a warning when their count does not match.
    pub fn draw_mesh_instanced_pro(
        &mut self,
        mesh: &Mesh,
        material: &Material,
        global: &Mat4,
        transforms: &[Mat4],
        colors: Option<&[Color]>,
    ) {
        let Some(frame) = self.frame_for("draw_mesh_instanced") else { return };
        if transforms.is_empty() {
            log::warn!("draw_mesh_instanced: no instances, ignored");
            return;
        }

        let colors = match colors {
            Some(c) if c.len() != transforms.len() => {
                log::warn!("draw_mesh_instanced: {} colors for {} instances, colors ignored", c.len(), transforms.len());
                None
            }
            other => other.map(<[Color]>::to_vec),
        };

        let mode = self.state.billboard_mode;
        let (global, transforms) = match mode {
            BillboardMode::Disabled => (*global, transforms.to_vec()),
            // Billboarding needs each instance's world position, so the global
            // transform is folded into the instances
            _ => (
                Mat4::identity(),
                transforms
                    .iter()
                    .map(|t| apply_billboard(mode, &(global * t), &frame.inv_view))
                    .collect(),
            ),
        };

        let instances = InstanceData { transforms, colors, billboard_mode: mode };
        let path = classify(material, &self.state);
        let call = self.make_call(mesh, material, global, Some(instances));
        self.draw_calls.push(path, call);
    }

    /// Draw every part of a model, uniformly scaled at `position`
    pub fn draw_model(&mut self, model: &Model, position: Vec3, scale: f32) {
        self.draw_model_ex(model, position, Vec3::y(), 0.0, Vec3::repeat(scale));
    }

    /// Draw every part of a model with a full placement
    ///
    /// The model's own transform applies first, then scale, rotation of
    /// `rotation_degrees` around `rotation_axis`, then translation.
    pub fn draw_model_ex(
        &mut self,
        model: &Model,
        position: Vec3,
        rotation_axis: Vec3,
        rotation_degrees: f32,
        scale: Vec3,
    ) {
        let placement = Mat4::new_translation(&position)
            * Mat4::rotation_axis(rotation_axis, utils::deg_to_rad(rotation_degrees))
            * Mat4::new_nonuniform_scaling(&scale);
        let transform = placement * model.transform;

        for (mesh, material) in model.parts() {
            self.draw_mesh(mesh, &material, &transform);
        }
    }

    /// Draw the current frame of a sprite as a unit quad at `position`
    pub fn draw_sprite(&mut self, sprite: &Sprite, position: Vec3) {
        self.draw_sprite_pro(sprite, position, Vec2::repeat(1.0), Vec3::y(), 0.0);
    }

    /// Draw a sprite with a size and a rotation around world Y
    pub fn draw_sprite_ex(&mut self, sprite: &Sprite, position: Vec3, size: Vec2, rotation_degrees: f32) {
        self.draw_sprite_pro(sprite, position, size, Vec3::y(), rotation_degrees);
    }

    /// Draw a sprite with a size and an arbitrary rotation
    ///
    /// A negative size component mirrors the frame on that axis. The quad
    /// follows the current billboard mode and is classified like any mesh
    /// drawn with the sprite's material.
    pub fn draw_sprite_pro(
        &mut self,
        sprite: &Sprite,
        position: Vec3,
        size: Vec2,
        rotation_axis: Vec3,
        rotation_degrees: f32,
    ) {
        let Some(frame) = self.frame_for("draw_sprite") else { return };

        // The quad spans [-1, 1], so half extents give the requested size
        let scale = Vec3::new(size.x.abs() * 0.5, size.y.abs() * 0.5, 1.0);
        let transform = Mat4::new_translation(&position)
            * Mat4::rotation_axis(rotation_axis, utils::deg_to_rad(rotation_degrees))
            * Mat4::new_nonuniform_scaling(&scale);
        let transform = apply_billboard(self.state.billboard_mode, &transform, &frame.inv_view);

        let mut call = self.make_call(&self.primitives.quad, &sprite.material, transform, None);
        call.uv = sprite.uv_transform(size.x < 0.0, size.y < 0.0);

        let path = classify(&sprite.material, &self.state);
        self.draw_calls.push(path, call);
    }

    // === Render state ===

    /// Current submission state
    pub const fn state(&self) -> &RenderState {
        &self.state
    }

    /// Force a render path, or auto-detect it per material
    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.state.render_mode = mode;
    }

    /// Blend mode of materials without their own
    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.state.blend_mode = mode;
    }

    /// Shadow casting of subsequent draws
    pub fn set_shadow_cast_mode(&mut self, mode: ShadowCastMode) {
        self.state.shadow_cast_mode = mode;
    }

    /// Billboarding of subsequent draws
    pub fn set_billboard_mode(&mut self, mode: BillboardMode) {
        self.state.billboard_mode = mode;
    }

    /// Alpha below which forward fragments are discarded
    pub fn set_alpha_scissor_threshold(&mut self, threshold: f32) {
        self.state.alpha_scissor_threshold = threshold;
    }

    /// Turn pipeline flags on
    pub fn set_flags(&mut self, flags: RenderFlags) {
        self.state.flags.insert(flags);
        self.config.flags = self.state.flags;
    }

    /// Turn pipeline flags off
    pub fn clear_flags(&mut self, flags: RenderFlags) {
        self.state.flags.remove(flags);
        self.config.flags = self.state.flags;
    }

    /// Whether every flag in `flags` is on
    pub const fn has_flags(&self, flags: RenderFlags) -> bool {
        self.state.has(flags)
    }

    /// World box directional shadow projections are fitted to
    pub fn set_scene_bounds(&mut self, min: Vec3, max: Vec3) {
        self.config.scene_bounds_min = min.inf(&max);
        self.config.scene_bounds_max = min.sup(&max);
    }

    // === Output ===

    /// Internal resolution
    pub const fn resolution(&self) -> (u32, u32) {
        self.targets.resolution()
    }

    /// Rebuild every resolution-dependent target
    ///
    /// Zero sizes are rejected with a warning; an unchanged size does nothing.
    /// If the new targets cannot be created the error is returned and the
    /// previous targets stay in use.
    pub fn update_resolution(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            log::warn!("update_resolution: invalid size {}x{}, ignored", width, height);
            return Ok(());
        }
        if self.targets.resolution() == (width, height) {
            return Ok(());
        }

        self.targets.resize(&mut self.device, width, height)?;
        self.config.width = width;
        self.config.height = height;
        log::info!("Resolution changed to {}x{}", width, height);
        Ok(())
    }

    /// Send the final image to `target` instead of the screen
    pub fn set_render_target(&mut self, target: Option<RenderTarget>) {
        self.output = target;
    }

    /// Current custom destination
    pub const fn render_target(&self) -> Option<RenderTarget> {
        self.output
    }

    /// Draw an intermediate buffer into `rect` of the default framebuffer
    pub fn draw_debug_buffer(&mut self, buffer: DebugBuffer, rect: IRect) {
        let gbuffer = &self.targets.gbuffer;
        let texture: Option<TextureHandle> = match buffer {
            DebugBuffer::Albedo => Some(gbuffer.albedo),
            DebugBuffer::Emission => Some(gbuffer.emission),
            DebugBuffer::Normal => Some(gbuffer.normal),
            DebugBuffer::Orm => Some(gbuffer.orm),
            DebugBuffer::Ssao => self.targets.ssao.as_ref().map(|p| p.source().color),
            DebugBuffer::Bright => Some(self.targets.scene.bright),
            DebugBuffer::Bloom => self.targets.bloom.as_ref().map(|p| p.source().color),
        };
        let Some(texture) = texture else {
            log::warn!("draw_debug_buffer: {:?} has not been created", buffer);
            return;
        };
        self.device.bind_framebuffer(None);
        self.device.draw_texture(texture, rect);
    }

    // === Lights ===

    /// Light table, for property getters and setters
    pub const fn lights(&self) -> &LightRegistry {
        &self.lights
    }

    /// Mutable light table
    pub fn lights_mut(&mut self) -> &mut LightRegistry {
        &mut self.lights
    }

    /// Create a disabled light
    pub fn create_light(&mut self, light_type: LightType) -> LightHandle {
        self.lights.create(light_type)
    }

    /// Destroy a light and its shadow map
    pub fn destroy_light(&mut self, handle: LightHandle) -> bool {
        self.lights.destroy(&mut self.device, handle)
    }

    /// Whether `handle` is a live light
    pub fn is_light_exist(&self, handle: LightHandle) -> bool {
        self.lights.exists(handle)
    }

    /// Enable or disable a light
    pub fn set_light_active(&mut self, handle: LightHandle, active: bool) {
        self.lights.set_active(handle, active);
    }

    /// Change a light's type, reallocating its shadow map
    pub fn set_light_type(&mut self, handle: LightHandle, light_type: LightType) -> RenderResult<()> {
        self.lights.set_light_type(&mut self.device, handle, light_type)
    }

    /// Cast shadows, allocating a map of `resolution` (zero for the default)
    pub fn enable_shadow(&mut self, handle: LightHandle, resolution: u32) -> RenderResult<()> {
        self.lights.enable_shadow(&mut self.device, handle, resolution)
    }

    /// Stop casting shadows, optionally freeing the map
    pub fn disable_shadow(&mut self, handle: LightHandle, destroy_map: bool) {
        self.lights.disable_shadow(&mut self.device, handle, destroy_map);
    }

    // === Environment ===

    /// Ambient, sky and post settings
    pub const fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Mutable environment; optional resources follow on the next `end`
    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.environment
    }

    /// Flat background color
    pub fn set_background_color(&mut self, color: Color) {
        self.environment.set_background_color(color);
    }

    /// Flat ambient color used without a sky
    pub fn set_ambient_color(&mut self, color: Color) {
        self.environment.set_ambient_color(color);
    }

    /// Use a pre-built sky for background and ambient light
    pub fn enable_skybox(&mut self, skybox: Skybox) {
        self.environment.enable_skybox(skybox);
    }

    /// Return to flat colors
    pub fn disable_skybox(&mut self) {
        self.environment.disable_skybox();
    }

    /// Orient the sky from Euler angles in degrees
    pub fn set_skybox_rotation(&mut self, pitch: f32, yaw: f32, roll: f32) {
        self.environment.set_skybox_rotation(
            utils::deg_to_rad(pitch),
            utils::deg_to_rad(yaw),
            utils::deg_to_rad(roll),
        );
    }

    // === Introspection ===

    /// Device the renderer draws with
    pub const fn device(&self) -> &D {
        &self.device
    }

    /// Mutable device, for drawing after `end`
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Configuration in effect
    pub const fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Resolution-dependent targets
    pub const fn targets(&self) -> &FramebufferSet {
        &self.targets
    }

    /// Names of the passes in execution order
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.names()
    }
}
