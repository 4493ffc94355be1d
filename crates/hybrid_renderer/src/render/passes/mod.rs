//! # Pass Pipeline
//!
//! The frame is rendered by an ordered list of passes. Each pass declares
//! the resources it reads and writes, decides from the frame context
//! whether it runs at all, and records its device work through a
//! [`PassContext`] that carries every piece of renderer state it may touch.
//!
//! ## Standard order
//!
//! ```text
//! shadow -> geometry -> ssao -> lit_env -> lit_obj -> scene -> background
//!        -> depth_prepass -> forward -> post_init -> bloom -> fog -> tonemap
//!        -> adjustment -> fxaa -> final_blit
//! ```
//!
//! [`PassSequence::validate`] checks that every resource a pass reads was
//! written by an earlier pass; a custom sequence that breaks this is
//! rejected before it ever reaches the device.

pub mod background;
pub mod blit;
pub mod forward;
pub mod geometry;
pub mod lighting;
pub mod post;
pub mod shadow;
pub mod ssao;

use std::collections::HashSet;
use std::time::Duration;

use crate::foundation::math::{Mat4, Vec2, Vec4};
use crate::render::api::{
    FrameData, GraphicsDevice, IRect, RenderTarget, RendererConfig, ShaderProgram, StencilState,
    TextureHandle, TextureKind, UniformValue,
};
use crate::render::resources::{DefaultTextures, FramebufferSet, Material, Primitives, ShaderLibrary};
use crate::render::systems::drawcall::{DrawCallBins, InstanceData, UvTransform};
use crate::render::systems::environment::Environment;
use crate::render::systems::lighting::{BatchedLight, LightRegistry};
use crate::render::systems::state::RenderFlags;
use crate::render::{RenderError, RenderResult};

pub use background::BackgroundPass;
pub use blit::{letterbox, reset_device_state, FinalBlitPass};
pub use forward::{DepthPrepass, ForwardPass};
pub use geometry::GeometryPass;
pub use lighting::{EnvironmentLightPass, LightAccumulationPass, SceneCompositePass};
pub use post::{AdjustmentPass, BloomPass, FogPass, FxaaPass, PostInitPass, TonemapPass};
pub use shadow::ShadowPass;
pub use ssao::SsaoPass;

/// Render targets passes exchange data through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Depth of every shadow-casting light
    ShadowMaps,
    /// Albedo, emission, normal and ORM targets
    GBuffer,
    /// Shared depth-stencil; stencil 1 marks deferred geometry
    DepthStencil,
    /// Blurred ambient occlusion
    Ssao,
    /// Ambient and environment specular
    LitEnv,
    /// Accumulated direct diffuse and specular
    LitObj,
    /// HDR scene color
    SceneColor,
    /// Bright-pass extract
    SceneBright,
    /// Post-processing ping-pong
    Post,
    /// Blurred bloom
    Bloom,
    /// Screen or custom render target
    Output,
}

/// What a frame did, returned by `Renderer::end`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// Passes that executed, in order
    pub passes: Vec<&'static str>,
    /// Single deferred draws
    pub deferred_calls: usize,
    /// Instanced deferred draws
    pub deferred_instanced_calls: usize,
    /// Single forward draws
    pub forward_calls: usize,
    /// Instanced forward draws
    pub forward_instanced_calls: usize,
    /// Lights that passed visibility batching
    pub lights_batched: usize,
    /// Shadow maps rendered this frame
    pub shadow_maps_updated: usize,
    /// CPU time spent in `end`
    pub cpu_time: Duration,
}

impl FrameStats {
    /// Whether a pass with this name executed
    pub fn ran(&self, pass: &str) -> bool {
        self.passes.contains(&pass)
    }
}

/// Everything a pass may read or mutate during a frame
pub struct PassContext<'a> {
    /// Device receiving the commands
    pub device: &'a mut dyn GraphicsDevice,
    /// Linked programs
    pub shaders: &'a mut ShaderLibrary,
    /// Resolution-dependent targets
    pub targets: &'a mut FramebufferSet,
    /// Built-in textures
    pub textures: &'a DefaultTextures,
    /// Quad and cube meshes
    pub primitives: &'a Primitives,
    /// Camera data of the frame
    pub frame: &'a FrameData,
    /// Sorted draw calls
    pub draw_calls: &'a DrawCallBins,
    /// Light table, shadow refresh flags are cleared through it
    pub lights: &'a mut LightRegistry,
    /// Visible lights in registry order
    pub batch: &'a [BatchedLight],
    /// Ambient, sky and post settings
    pub environment: &'a Environment,
    /// Pipeline flags in effect
    pub flags: RenderFlags,
    /// Renderer configuration
    pub config: &'a RendererConfig,
    /// Custom destination, `None` for the default framebuffer
    pub output: Option<RenderTarget>,
    /// Counters filled while the frame runs
    pub stats: &'a mut FrameStats,
}

impl PassContext<'_> {
    /// Bind a linked program
    pub fn bind(&mut self, program: ShaderProgram) -> RenderResult<()> {
        self.shaders.bind(self.device, program)
    }

    /// Unbind the current program
    pub fn unbind(&mut self) {
        self.shaders.unbind(self.device);
    }

    /// Write a uniform of the bound program
    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) {
        self.shaders.set(self.device, name, value);
    }

    /// Bind a 2D texture to a sampler
    pub fn sampler(&mut self, name: &str, texture: TextureHandle) {
        self.shaders.bind_sampler(self.device, name, TextureKind::Texture2D, Some(texture));
    }

    /// Bind a cubemap to a sampler
    pub fn cube_sampler(&mut self, name: &str, texture: TextureHandle) {
        self.shaders.bind_sampler(self.device, name, TextureKind::Cubemap, Some(texture));
    }

    /// Draw the full-screen quad
    pub fn draw_quad(&mut self) {
        self.device.draw_mesh(self.primitives.quad.handle);
    }

    /// Viewport covering the internal resolution
    pub fn full_viewport(&mut self) {
        let (w, h) = self.targets.resolution();
        self.device.set_viewport(IRect::sized(w, h));
    }

    /// Stencil state restricting screen passes to deferred geometry
    pub fn geometry_stencil(&self) -> Option<StencilState> {
        self.flags.contains(RenderFlags::STENCIL_TEST).then_some(StencilState::test_equal(1))
    }

    /// One texel of the internal resolution in UV units
    pub fn texel_size(&self) -> Vec2 {
        let (w, h) = self.targets.resolution();
        Vec2::new(1.0 / w as f32, 1.0 / h as f32)
    }
}

/// Per-instance colors as normalized vectors
pub(crate) fn instance_colors(instances: &InstanceData) -> Option<Vec<Vec4>> {
    instances.colors.as_ref().map(|colors| colors.iter().map(|c| c.to_vec4()).collect())
}

/// Material parameters and maps shared by geometry and forward shading
///
/// The albedo color is left to the caller since the two paths upload it
/// with different widths.
pub(crate) fn upload_material(ctx: &mut PassContext<'_>, material: &Material) {
    let textures = ctx.textures;

    ctx.set("uValEmission", material.emission.value);
    ctx.set("uValOcclusion", material.orm.occlusion);
    ctx.set("uValRoughness", material.orm.roughness);
    ctx.set("uValMetalness", material.orm.metalness);
    ctx.set("uColEmission", material.emission.color.to_vec3());

    ctx.sampler("uTexAlbedo", material.albedo.texture.map_or(textures.white, |t| t.handle));
    ctx.sampler("uTexNormal", material.normal.texture.map_or(textures.normal, |t| t.handle));
    ctx.sampler("uTexEmission", material.emission.texture.map_or(textures.black, |t| t.handle));
    ctx.sampler("uTexORM", material.orm.texture.map_or(textures.white, |t| t.handle));
}

/// Texture coordinate transform of a single draw
pub(crate) fn upload_uv(ctx: &mut PassContext<'_>, uv: &UvTransform) {
    ctx.set("uTexCoordOffset", uv.offset);
    ctx.set("uTexCoordScale", uv.scale);
}

/// Normal matrix of a model transform
pub(crate) fn normal_matrix(model: &Mat4) -> Mat4 {
    model.try_inverse().unwrap_or_else(Mat4::identity).transpose()
}

/// One stage of the frame
pub trait RenderPass {
    /// Stable name, reported in [`FrameStats::passes`]
    fn name(&self) -> &'static str;

    /// Resources sampled by the pass
    fn reads(&self) -> &'static [Resource];

    /// Resources written by the pass
    fn writes(&self) -> &'static [Resource];

    /// Whether the pass runs this frame
    fn is_enabled(&self, ctx: &PassContext<'_>) -> bool;

    /// Record the pass
    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()>;
}

/// Ordered list of passes
pub struct PassSequence {
    passes: Vec<Box<dyn RenderPass>>,
}

impl std::fmt::Debug for PassSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl Default for PassSequence {
    fn default() -> Self {
        Self::standard()
    }
}

impl PassSequence {
    /// Sequence from an explicit list
    pub fn new(passes: Vec<Box<dyn RenderPass>>) -> Self {
        Self { passes }
    }

    /// The hybrid deferred/forward pipeline
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(ShadowPass),
            Box::new(GeometryPass),
            Box::new(SsaoPass),
            Box::new(EnvironmentLightPass),
            Box::new(LightAccumulationPass),
            Box::new(SceneCompositePass),
            Box::new(BackgroundPass),
            Box::new(DepthPrepass),
            Box::new(ForwardPass),
            Box::new(PostInitPass),
            Box::new(BloomPass),
            Box::new(FogPass),
            Box::new(TonemapPass),
            Box::new(AdjustmentPass),
            Box::new(FxaaPass),
            Box::new(FinalBlitPass),
        ])
    }

    /// Pass names in order
    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Number of passes
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Whether the sequence has no pass
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Check that every read is preceded by a write of the same resource
    pub fn validate(&self) -> RenderResult<()> {
        let mut written: HashSet<Resource> = HashSet::new();
        for pass in &self.passes {
            if let Some(missing) = pass.reads().iter().find(|r| !written.contains(r)) {
                return Err(RenderError::RenderingFailed(format!(
                    "Pass '{}' reads {:?} before any pass writes it",
                    pass.name(),
                    missing
                )));
            }
            written.extend(pass.writes().iter().copied());
        }
        Ok(())
    }

    /// Run every enabled pass in order
    ///
    /// Stops at the first failing pass. The names of the passes that ran
    /// are appended to the context's stats and returned.
    pub fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<Vec<&'static str>> {
        let mut executed = Vec::with_capacity(self.passes.len());
        for pass in &self.passes {
            if !pass.is_enabled(ctx) {
                log::trace!("Pass '{}' skipped", pass.name());
                continue;
            }
            log::trace!("Pass '{}'", pass.name());
            pass.execute(ctx).map_err(|e| {
                log::error!("Pass '{}' failed: {}", pass.name(), e);
                e
            })?;
            executed.push(pass.name());
            ctx.stats.passes.push(pass.name());
        }
        Ok(executed)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Owned renderer state a test can borrow a [`PassContext`] from

    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::backends::RecordingDevice;
    use crate::render::primitives::Camera;

    pub struct Fixture {
        pub device: RecordingDevice,
        pub shaders: ShaderLibrary,
        pub targets: FramebufferSet,
        pub textures: DefaultTextures,
        pub primitives: Primitives,
        pub frame: FrameData,
        pub draw_calls: DrawCallBins,
        pub lights: LightRegistry,
        pub batch: Vec<BatchedLight>,
        pub environment: Environment,
        pub flags: RenderFlags,
        pub config: RendererConfig,
        pub output: Option<RenderTarget>,
        pub stats: FrameStats,
    }

    impl Fixture {
        pub fn new(width: u32, height: u32) -> Self {
            let mut device = RecordingDevice::new(width, height);
            let mut shaders = ShaderLibrary::new();
            shaders.load_core(&mut device).expect("core shaders");
            let targets = FramebufferSet::load(&mut device, width, height).expect("targets");
            let textures = DefaultTextures::load(&mut device, 3).expect("textures");
            let primitives = Primitives::load(&mut device).expect("primitives");
            let camera = Camera::perspective(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros(), 60.0);
            let frame = FrameData::new(&camera, width as f32 / height as f32, 0.01, 1000.0, (width, height));
            device.clear_commands();

            Self {
                device,
                shaders,
                targets,
                textures,
                primitives,
                frame,
                draw_calls: DrawCallBins::new(),
                lights: LightRegistry::new(256),
                batch: Vec::new(),
                environment: Environment::default(),
                flags: RenderFlags::empty(),
                config: RendererConfig::new(width, height),
                output: None,
                stats: FrameStats::default(),
            }
        }

        pub fn context(&mut self) -> PassContext<'_> {
            PassContext {
                device: &mut self.device,
                shaders: &mut self.shaders,
                targets: &mut self.targets,
                textures: &self.textures,
                primitives: &self.primitives,
                frame: &self.frame,
                draw_calls: &self.draw_calls,
                lights: &mut self.lights,
                batch: &self.batch,
                environment: &self.environment,
                flags: self.flags,
                config: &self.config,
                output: self.output,
                stats: &mut self.stats,
            }
        }
    }
}
