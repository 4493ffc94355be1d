//! Resolution-dependent render targets
//!
//! All targets of a renderer are owned by one `FramebufferSet`. Every
//! texture matches the current internal resolution, except the SSAO and
//! bloom ping-pong targets which run at half resolution. A resize builds a
//! complete replacement set, including the optional targets that had
//! already been created, and only then releases the old one.

use crate::foundation::collections::PingPong;
use crate::render::api::{
    Attachment, DeviceResult, FilterMode, FramebufferHandle, GraphicsDevice, TextureDesc,
    TextureFormat, TextureHandle,
};
use crate::render::RenderError;

/// Geometry buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GBuffer {
    /// Framebuffer object
    pub framebuffer: FramebufferHandle,
    /// Surface color, RGB8
    pub albedo: TextureHandle,
    /// Emitted radiance, RGB16F
    pub emission: TextureHandle,
    /// Octahedral-encoded normal, RG16F
    pub normal: TextureHandle,
    /// Occlusion, roughness and metalness, RGB8
    pub orm: TextureHandle,
    /// Depth with the geometry stencil, shared by later targets
    pub depth_stencil: TextureHandle,
}

/// A framebuffer writing two HDR color targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DualTarget {
    /// Framebuffer object
    pub framebuffer: FramebufferHandle,
    /// First output, ambient or diffuse
    pub first: TextureHandle,
    /// Second output, specular
    pub second: TextureHandle,
}

/// Composited scene and its bright-pass extract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTarget {
    /// Framebuffer object, depth-stencil shared with the G-buffer
    pub framebuffer: FramebufferHandle,
    /// HDR scene color
    pub color: TextureHandle,
    /// Pixels above the bloom threshold
    pub bright: TextureHandle,
}

/// A framebuffer with a single color texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorTarget {
    /// Framebuffer object
    pub framebuffer: FramebufferHandle,
    /// Color output
    pub color: TextureHandle,
}

/// Every resolution-dependent target
#[derive(Debug)]
pub struct FramebufferSet {
    width: u32,
    height: u32,
    /// Material attributes of deferred geometry
    pub gbuffer: GBuffer,
    /// Ambient and environment specular
    pub lit_env: DualTarget,
    /// Accumulated direct diffuse and specular
    pub lit_obj: DualTarget,
    /// Composited HDR scene
    pub scene: SceneTarget,
    /// Post-processing ping-pong
    pub post: PingPong<ColorTarget>,
    /// Half-resolution SSAO ping-pong, created on first use
    pub ssao: Option<PingPong<ColorTarget>>,
    /// Half-resolution bloom ping-pong, created on first use
    pub bloom: Option<PingPong<ColorTarget>>,
}

/// Handles created while building targets, released if the build fails
#[derive(Debug, Default)]
struct Staged {
    textures: Vec<TextureHandle>,
    framebuffers: Vec<FramebufferHandle>,
}

impl Staged {
    fn release(self, device: &mut dyn GraphicsDevice) {
        for framebuffer in self.framebuffers {
            device.destroy_framebuffer(framebuffer);
        }
        for texture in self.textures {
            device.destroy_texture(texture);
        }
    }
}

/// Run `build`, destroying everything it created when it fails
fn staged<T>(
    device: &mut dyn GraphicsDevice,
    build: impl FnOnce(&mut dyn GraphicsDevice, &mut Staged) -> DeviceResult<T>,
) -> DeviceResult<T> {
    let mut created = Staged::default();
    let result = build(&mut *device, &mut created);
    if result.is_err() {
        created.release(device);
    }
    result
}

fn texture(
    device: &mut dyn GraphicsDevice,
    created: &mut Staged,
    width: u32,
    height: u32,
    format: TextureFormat,
) -> DeviceResult<TextureHandle> {
    let handle =
        device.create_texture(&TextureDesc::texture_2d(width, height, format).with_filter(FilterMode::Linear), None)?;
    created.textures.push(handle);
    Ok(handle)
}

/// Attach color targets and an optional shared depth-stencil, then verify
fn assemble(
    device: &mut dyn GraphicsDevice,
    created: &mut Staged,
    name: &str,
    colors: &[TextureHandle],
    depth_stencil: Option<TextureHandle>,
) -> DeviceResult<FramebufferHandle> {
    let framebuffer = device.create_framebuffer()?;
    created.framebuffers.push(framebuffer);

    for (index, color) in (0u32..).zip(colors) {
        device.attach_texture(framebuffer, Attachment::Color(index), *color, None)?;
    }
    device.set_draw_buffers(framebuffer, u32::try_from(colors.len()).unwrap_or(u32::MAX));

    if let Some(depth) = depth_stencil {
        device.attach_texture(framebuffer, Attachment::DepthStencil, depth, None)?;
    }

    if !device.is_framebuffer_complete(framebuffer) {
        log::error!("Framebuffer '{}' is incomplete", name);
        return Err(RenderError::InitializationFailed(format!("Framebuffer '{}' is incomplete", name)));
    }

    Ok(framebuffer)
}

fn color_target(
    device: &mut dyn GraphicsDevice,
    created: &mut Staged,
    name: &str,
    width: u32,
    height: u32,
    format: TextureFormat,
) -> DeviceResult<ColorTarget> {
    let color = texture(device, created, width, height, format)?;
    let framebuffer = assemble(device, created, name, &[color], None)?;
    Ok(ColorTarget { framebuffer, color })
}

fn ping_pong(
    device: &mut dyn GraphicsDevice,
    created: &mut Staged,
    name: &str,
    width: u32,
    height: u32,
    format: TextureFormat,
) -> DeviceResult<PingPong<ColorTarget>> {
    let first = color_target(device, created, name, width, height, format)?;
    let second = color_target(device, created, name, width, height, format)?;
    Ok(PingPong::new(first, second))
}

fn release_color(device: &mut dyn GraphicsDevice, target: &ColorTarget) {
    device.destroy_framebuffer(target.framebuffer);
    device.destroy_texture(target.color);
}

fn release_ping_pong(device: &mut dyn GraphicsDevice, pair: &PingPong<ColorTarget>) {
    for target in pair.items() {
        release_color(device, target);
    }
}

/// Half of a dimension, never zero
pub fn half_extent(value: u32) -> u32 {
    (value / 2).max(1)
}

impl FramebufferSet {
    /// Create the always-present targets at the given resolution
    pub fn load(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> DeviceResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InitializationFailed(format!(
                "Invalid framebuffer resolution {}x{}",
                width, height
            )));
        }

        let set = staged(device, |device, created| {
            let albedo = texture(device, created, width, height, TextureFormat::Rgb8)?;
            let emission = texture(device, created, width, height, TextureFormat::Rgb16F)?;
            let normal = texture(device, created, width, height, TextureFormat::Rg16F)?;
            let orm = texture(device, created, width, height, TextureFormat::Rgb8)?;
            let depth_stencil = device.create_texture(
                &TextureDesc::texture_2d(width, height, TextureFormat::Depth24Stencil8),
                None,
            )?;
            created.textures.push(depth_stencil);
            let framebuffer =
                assemble(device, created, "gbuffer", &[albedo, emission, normal, orm], Some(depth_stencil))?;
            let gbuffer = GBuffer { framebuffer, albedo, emission, normal, orm, depth_stencil };

            let ambient = texture(device, created, width, height, TextureFormat::Rgb16F)?;
            let env_specular = texture(device, created, width, height, TextureFormat::Rgb16F)?;
            let framebuffer = assemble(device, created, "lit_env", &[ambient, env_specular], Some(depth_stencil))?;
            let lit_env = DualTarget { framebuffer, first: ambient, second: env_specular };

            let diffuse = texture(device, created, width, height, TextureFormat::Rgb16F)?;
            let obj_specular = texture(device, created, width, height, TextureFormat::Rgb16F)?;
            let framebuffer = assemble(device, created, "lit_obj", &[diffuse, obj_specular], Some(depth_stencil))?;
            let lit_obj = DualTarget { framebuffer, first: diffuse, second: obj_specular };

            let color = texture(device, created, width, height, TextureFormat::Rgb16F)?;
            let bright = texture(device, created, width, height, TextureFormat::Rgb16F)?;
            let framebuffer = assemble(device, created, "scene", &[color, bright], Some(depth_stencil))?;
            let scene = SceneTarget { framebuffer, color, bright };

            let post = ping_pong(device, created, "post", width, height, TextureFormat::Rgb16F)?;

            Ok(Self { width, height, gbuffer, lit_env, lit_obj, scene, post, ssao: None, bloom: None })
        })?;

        log::debug!("Framebuffers created at {}x{}", width, height);
        Ok(set)
    }

    /// Current full resolution
    pub const fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resolution of the SSAO and bloom targets
    pub fn half_resolution(&self) -> (u32, u32) {
        (half_extent(self.width), half_extent(self.height))
    }

    /// Create the SSAO ping-pong if it does not exist yet
    pub fn ensure_ssao(&mut self, device: &mut dyn GraphicsDevice) -> DeviceResult<&mut PingPong<ColorTarget>> {
        let (w, h) = self.half_resolution();
        let pair = match self.ssao.take() {
            Some(pair) => pair,
            None => {
                log::debug!("Creating SSAO targets at {}x{}", w, h);
                staged(device, |device, created| ping_pong(device, created, "ssao", w, h, TextureFormat::R16F))?
            }
        };
        Ok(self.ssao.insert(pair))
    }

    /// Create the bloom ping-pong if it does not exist yet
    pub fn ensure_bloom(&mut self, device: &mut dyn GraphicsDevice) -> DeviceResult<&mut PingPong<ColorTarget>> {
        let (w, h) = self.half_resolution();
        let pair = match self.bloom.take() {
            Some(pair) => pair,
            None => {
                log::debug!("Creating bloom targets at {}x{}", w, h);
                staged(device, |device, created| ping_pong(device, created, "bloom", w, h, TextureFormat::Rgba16F))?
            }
        };
        Ok(self.bloom.insert(pair))
    }

    /// Release every framebuffer and texture of the set
    pub fn unload(&mut self, device: &mut dyn GraphicsDevice) {
        device.destroy_framebuffer(self.gbuffer.framebuffer);
        device.destroy_framebuffer(self.lit_env.framebuffer);
        device.destroy_framebuffer(self.lit_obj.framebuffer);
        device.destroy_framebuffer(self.scene.framebuffer);

        for texture in [
            self.gbuffer.albedo,
            self.gbuffer.emission,
            self.gbuffer.normal,
            self.gbuffer.orm,
            self.gbuffer.depth_stencil,
            self.lit_env.first,
            self.lit_env.second,
            self.lit_obj.first,
            self.lit_obj.second,
            self.scene.color,
            self.scene.bright,
        ] {
            device.destroy_texture(texture);
        }

        release_ping_pong(device, &self.post);
        if let Some(pair) = self.ssao.take() {
            release_ping_pong(device, &pair);
        }
        if let Some(pair) = self.bloom.take() {
            release_ping_pong(device, &pair);
        }
    }

    /// Rebuild the whole set at a new resolution
    ///
    /// Optional targets that existed before are recreated as well. The new
    /// set is complete before the old one is released, so on failure `self`
    /// still holds the previous, live targets.
    pub fn resize(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) -> DeviceResult<()> {
        let mut fresh = Self::load(device, width, height)?;

        if let Err(err) = fresh.restore_optional(device, self.ssao.is_some(), self.bloom.is_some()) {
            fresh.unload(device);
            return Err(err);
        }

        self.unload(device);
        *self = fresh;
        Ok(())
    }

    fn restore_optional(&mut self, device: &mut dyn GraphicsDevice, ssao: bool, bloom: bool) -> DeviceResult<()> {
        if ssao {
            self.ensure_ssao(device)?;
        }
        if bloom {
            self.ensure_bloom(device)?;
        }
        Ok(())
    }

    /// Every texture owned by the set with the size it was created at
    pub fn textures(&self) -> Vec<(TextureHandle, (u32, u32))> {
        let full = self.resolution();
        let half = self.half_resolution();

        let mut textures: Vec<(TextureHandle, (u32, u32))> = [
            self.gbuffer.albedo,
            self.gbuffer.emission,
            self.gbuffer.normal,
            self.gbuffer.orm,
            self.gbuffer.depth_stencil,
            self.lit_env.first,
            self.lit_env.second,
            self.lit_obj.first,
            self.lit_obj.second,
            self.scene.color,
            self.scene.bright,
        ]
        .into_iter()
        .chain(self.post.items().iter().map(|t| t.color))
        .map(|t| (t, full))
        .collect();

        for pair in self.ssao.iter().chain(self.bloom.iter()) {
            textures.extend(pair.items().iter().map(|t| (t.color, half)));
        }
        textures
    }
}
