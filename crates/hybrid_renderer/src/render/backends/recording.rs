//! Headless recording device
//!
//! Implements `GraphicsDevice` without touching a GPU. Every call is
//! appended to a command log and resources are tracked in tables, which
//! makes the device suitable for tests, tooling that inspects a frame, and
//! running the pipeline on machines without a graphics context.

use std::collections::{HashMap, HashSet};

use crate::foundation::math::{Mat4, Vec4};
use crate::render::api::{
    Attachment, BlendFunc, BlitMask, ClearFlags, CubeFace, CullFace, DepthFunc, DeviceResult,
    FilterMode, FramebufferHandle, GraphicsDevice, IRect, MeshHandle, PrimitiveKind, ShaderHandle,
    ShaderProgram, StencilState, TextureDesc, TextureHandle, TextureKind, UniformLocation,
    UniformValue,
};
use crate::render::RenderError;

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// Texture allocated
    CreateTexture {
        /// New handle
        handle: TextureHandle,
        /// Allocation parameters
        desc: TextureDesc,
        /// Whether texel data was uploaded
        with_data: bool,
    },
    /// Texture released
    DestroyTexture(TextureHandle),
    /// Framebuffer created
    CreateFramebuffer(FramebufferHandle),
    /// Texture attached to a framebuffer
    AttachTexture {
        /// Target framebuffer
        framebuffer: FramebufferHandle,
        /// Attachment point
        attachment: Attachment,
        /// Attached texture
        texture: TextureHandle,
        /// Cube face for cubemaps
        face: Option<CubeFace>,
    },
    /// Draw buffer selection
    SetDrawBuffers {
        /// Target framebuffer
        framebuffer: FramebufferHandle,
        /// Number of color outputs
        count: u32,
    },
    /// Framebuffer released
    DestroyFramebuffer(FramebufferHandle),
    /// Program linked
    LoadShader {
        /// New handle
        handle: ShaderHandle,
        /// Which program
        program: ShaderProgram,
    },
    /// Program released
    DestroyShader(ShaderHandle),
    /// Program bound
    UseShader(Option<ShaderHandle>),
    /// Uniform written to the bound program
    SetUniform {
        /// Program the location belongs to
        shader: ShaderHandle,
        /// Uniform name
        name: String,
        /// Written value
        value: UniformValue,
    },
    /// Texture bound to a sampler slot
    BindTexture {
        /// Sampler slot
        slot: u32,
        /// Binding target
        kind: TextureKind,
        /// Bound texture
        texture: Option<TextureHandle>,
    },
    /// Built-in mesh uploaded
    CreatePrimitive {
        /// New handle
        handle: MeshHandle,
        /// Shape
        kind: PrimitiveKind,
    },
    /// Mesh released
    DestroyMesh(MeshHandle),
    /// Framebuffer bound for drawing
    BindFramebuffer(Option<FramebufferHandle>),
    /// Viewport change
    SetViewport(IRect),
    /// Clear color change
    SetClearColor(Vec4),
    /// Buffer clear
    Clear {
        /// Framebuffer that was bound
        framebuffer: Option<FramebufferHandle>,
        /// Cleared buffers
        flags: ClearFlags,
    },
    /// Color write mask
    SetColorMask(bool),
    /// Depth test toggle
    SetDepthTest(bool),
    /// Depth write toggle
    SetDepthWrite(bool),
    /// Depth comparison
    SetDepthFunc(DepthFunc),
    /// Face culling
    SetCullFace(Option<CullFace>),
    /// Blending
    SetBlend(Option<BlendFunc>),
    /// Stencil configuration
    SetStencil(Option<StencilState>),
    /// Single draw
    Draw {
        /// Drawn mesh
        mesh: MeshHandle,
        /// Bound program, if any
        program: Option<ShaderProgram>,
        /// Bound framebuffer
        framebuffer: Option<FramebufferHandle>,
    },
    /// Instanced draw
    DrawInstanced {
        /// Drawn mesh
        mesh: MeshHandle,
        /// Bound program, if any
        program: Option<ShaderProgram>,
        /// Bound framebuffer
        framebuffer: Option<FramebufferHandle>,
        /// Instance count
        instances: usize,
        /// Whether per-instance colors were supplied
        colored: bool,
    },
    /// Framebuffer copy
    Blit {
        /// Source, `None` is the screen
        src: Option<FramebufferHandle>,
        /// Destination, `None` is the screen
        dst: Option<FramebufferHandle>,
        /// Source area
        src_rect: IRect,
        /// Destination area
        dst_rect: IRect,
        /// Copied buffers
        mask: BlitMask,
        /// Scaling filter
        filter: FilterMode,
    },
    /// Textured rectangle
    DrawTexture {
        /// Drawn texture
        texture: TextureHandle,
        /// Destination area
        dst_rect: IRect,
    },
}

/// Graphics device that records calls instead of executing them
#[derive(Debug)]
pub struct RecordingDevice {
    screen_size: (u32, u32),
    next_id: u64,
    commands: Vec<DeviceCommand>,

    textures: HashMap<TextureHandle, TextureDesc>,
    framebuffers: HashMap<FramebufferHandle, Vec<(Attachment, TextureHandle)>>,
    shaders: HashMap<ShaderHandle, ShaderProgram>,
    meshes: HashSet<MeshHandle>,
    locations: Vec<(ShaderHandle, String)>,

    bound_shader: Option<ShaderHandle>,
    bound_framebuffer: Option<FramebufferHandle>,

    incomplete_framebuffers: bool,
    failing_shaders: HashSet<ShaderProgram>,
    texture_budget: Option<usize>,

    released: HashSet<u64>,
    redundant_releases: usize,
}

impl RecordingDevice {
    /// Create a device with a default framebuffer of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen_size: (width, height),
            next_id: 1,
            commands: Vec::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            shaders: HashMap::new(),
            meshes: HashSet::new(),
            locations: Vec::new(),
            bound_shader: None,
            bound_framebuffer: None,
            incomplete_framebuffers: false,
            failing_shaders: HashSet::new(),
            texture_budget: None,
            released: HashSet::new(),
            redundant_releases: 0,
        }
    }

    /// Report every framebuffer as incomplete
    pub fn with_incomplete_framebuffers(mut self) -> Self {
        self.incomplete_framebuffers = true;
        self
    }

    /// Make loading `program` fail
    pub fn with_failing_shader(mut self, program: ShaderProgram) -> Self {
        self.failing_shaders.insert(program);
        self
    }

    /// Let only `remaining` more textures be created, `None` lifts the limit
    pub fn limit_texture_creation(&mut self, remaining: Option<usize>) {
        self.texture_budget = remaining;
    }

    /// Resize the default framebuffer
    pub fn set_screen_size(&mut self, width: u32, height: u32) {
        self.screen_size = (width, height);
    }

    fn next_handle(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn note_release(&mut self, id: u64, released: bool) {
        if released {
            self.released.insert(id);
        } else if self.released.contains(&id) {
            log::warn!("Handle {} released more than once", id);
            self.redundant_releases += 1;
        }
    }

    fn bound_program(&self) -> Option<ShaderProgram> {
        self.bound_shader.and_then(|s| self.shaders.get(&s).copied())
    }

    // === Inspection ===

    /// Every call recorded so far
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Drop the command log, keeping resource tables
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Allocation parameters of a live texture
    pub fn texture_desc(&self, texture: TextureHandle) -> Option<TextureDesc> {
        self.textures.get(&texture).copied()
    }

    /// Destroy calls that named a texture or framebuffer already destroyed
    pub const fn redundant_release_count(&self) -> usize {
        self.redundant_releases
    }

    /// Number of textures not yet destroyed
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Number of framebuffers not yet destroyed
    pub fn live_framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// Number of shader programs not yet destroyed
    pub fn live_shader_count(&self) -> usize {
        self.shaders.len()
    }

    /// Number of meshes not yet destroyed
    pub fn live_mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Whether `program` is currently loaded
    pub fn is_program_loaded(&self, program: ShaderProgram) -> bool {
        self.shaders.values().any(|p| *p == program)
    }

    /// Textures attached to a live framebuffer
    pub fn framebuffer_attachments(&self, framebuffer: FramebufferHandle) -> &[(Attachment, TextureHandle)] {
        self.framebuffers.get(&framebuffer).map_or(&[], Vec::as_slice)
    }

    /// Values written to uniforms called `name`, in call order
    pub fn uniform_writes(&self, name: &str) -> Vec<UniformValue> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::SetUniform { name: n, value, .. } if n == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    /// Number of draws, single and instanced
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DeviceCommand::Draw { .. } | DeviceCommand::DrawInstanced { .. }))
            .count()
    }

    /// Number of draws issued with `program` bound
    pub fn draws_with(&self, program: ShaderProgram) -> usize {
        self.commands
            .iter()
            .filter(|c| match c {
                DeviceCommand::Draw { program: p, .. } | DeviceCommand::DrawInstanced { program: p, .. } => {
                    *p == Some(program)
                }
                _ => false,
            })
            .count()
    }

    /// Programs bound at each draw, in order, repeated programs collapsed
    pub fn program_sequence(&self) -> Vec<ShaderProgram> {
        let mut sequence: Vec<ShaderProgram> = Vec::new();
        for command in &self.commands {
            if let DeviceCommand::Draw { program: Some(p), .. } | DeviceCommand::DrawInstanced { program: Some(p), .. } =
                command
            {
                if sequence.last() != Some(p) {
                    sequence.push(*p);
                }
            }
        }
        sequence
    }
}

impl GraphicsDevice for RecordingDevice {
    fn screen_size(&self) -> (u32, u32) {
        self.screen_size
    }

    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>) -> DeviceResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RenderError::ResourceCreationFailed(format!(
                "Texture has zero extent: {}x{}",
                desc.width, desc.height
            )));
        }
        if let Some(budget) = self.texture_budget {
            if budget == 0 {
                return Err(RenderError::ResourceCreationFailed("Texture memory exhausted".to_string()));
            }
            self.texture_budget = Some(budget - 1);
        }
        if let Some(bytes) = data {
            if bytes.len() != desc.byte_len() {
                return Err(RenderError::ResourceCreationFailed(format!(
                    "Texture data is {} bytes, expected {}",
                    bytes.len(),
                    desc.byte_len()
                )));
            }
        }

        let handle = TextureHandle(self.next_handle());
        self.textures.insert(handle, *desc);
        self.commands.push(DeviceCommand::CreateTexture { handle, desc: *desc, with_data: data.is_some() });
        Ok(handle)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        let removed = self.textures.remove(&texture).is_some();
        self.note_release(texture.0, removed);
        if removed {
            self.commands.push(DeviceCommand::DestroyTexture(texture));
        }
    }

    fn create_framebuffer(&mut self) -> DeviceResult<FramebufferHandle> {
        let handle = FramebufferHandle(self.next_handle());
        self.framebuffers.insert(handle, Vec::new());
        self.commands.push(DeviceCommand::CreateFramebuffer(handle));
        Ok(handle)
    }

    fn attach_texture(
        &mut self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        texture: TextureHandle,
        face: Option<CubeFace>,
    ) -> DeviceResult<()> {
        let desc = self
            .textures
            .get(&texture)
            .copied()
            .ok_or_else(|| RenderError::BackendError(format!("Unknown texture {:?}", texture)))?;
        let attachments = self
            .framebuffers
            .get_mut(&framebuffer)
            .ok_or_else(|| RenderError::BackendError(format!("Unknown framebuffer {:?}", framebuffer)))?;

        let depth_point = !matches!(attachment, Attachment::Color(_));
        if depth_point != desc.format.is_depth() {
            return Err(RenderError::BackendError(format!(
                "{:?} texture cannot be attached as {:?}",
                desc.format, attachment
            )));
        }

        attachments.retain(|(a, _)| *a != attachment);
        attachments.push((attachment, texture));
        self.commands.push(DeviceCommand::AttachTexture { framebuffer, attachment, texture, face });
        Ok(())
    }

    fn set_draw_buffers(&mut self, framebuffer: FramebufferHandle, count: u32) {
        self.commands.push(DeviceCommand::SetDrawBuffers { framebuffer, count });
    }

    fn is_framebuffer_complete(&self, framebuffer: FramebufferHandle) -> bool {
        !self.incomplete_framebuffers
            && self.framebuffers.get(&framebuffer).is_some_and(|a| !a.is_empty())
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        let removed = self.framebuffers.remove(&framebuffer).is_some();
        self.note_release(framebuffer.0, removed);
        if removed {
            if self.bound_framebuffer == Some(framebuffer) {
                self.bound_framebuffer = None;
            }
            self.commands.push(DeviceCommand::DestroyFramebuffer(framebuffer));
        }
    }

    fn load_shader(&mut self, program: ShaderProgram) -> DeviceResult<ShaderHandle> {
        if self.failing_shaders.contains(&program) {
            return Err(RenderError::ResourceCreationFailed(format!(
                "Failed to link shader program '{}'",
                program.name()
            )));
        }
        let handle = ShaderHandle(self.next_handle());
        self.shaders.insert(handle, program);
        self.commands.push(DeviceCommand::LoadShader { handle, program });
        Ok(handle)
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) {
        if self.shaders.remove(&shader).is_some() {
            if self.bound_shader == Some(shader) {
                self.bound_shader = None;
            }
            self.commands.push(DeviceCommand::DestroyShader(shader));
        }
    }

    fn uniform_location(&mut self, shader: ShaderHandle, name: &str) -> Option<UniformLocation> {
        if !self.shaders.contains_key(&shader) {
            return None;
        }
        if let Some(index) = self.locations.iter().position(|(s, n)| *s == shader && n == name) {
            return i32::try_from(index).ok().map(UniformLocation);
        }
        self.locations.push((shader, name.to_string()));
        i32::try_from(self.locations.len() - 1).ok().map(UniformLocation)
    }

    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue) {
        let Some((shader, name)) = usize::try_from(location.0).ok().and_then(|i| self.locations.get(i)) else {
            log::warn!("Uniform write to unknown location {:?}", location);
            return;
        };
        if self.bound_shader != Some(*shader) {
            log::warn!("Uniform '{}' written while its program is not bound", name);
        }
        self.commands.push(DeviceCommand::SetUniform { shader: *shader, name: name.clone(), value: *value });
    }

    fn use_shader(&mut self, shader: Option<ShaderHandle>) {
        self.bound_shader = shader;
        self.commands.push(DeviceCommand::UseShader(shader));
    }

    fn bind_texture(&mut self, slot: u32, kind: TextureKind, texture: Option<TextureHandle>) {
        self.commands.push(DeviceCommand::BindTexture { slot, kind, texture });
    }

    fn create_primitive(&mut self, kind: PrimitiveKind) -> DeviceResult<MeshHandle> {
        let handle = MeshHandle(self.next_handle());
        self.meshes.insert(handle);
        self.commands.push(DeviceCommand::CreatePrimitive { handle, kind });
        Ok(handle)
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        if self.meshes.remove(&mesh) {
            self.commands.push(DeviceCommand::DestroyMesh(mesh));
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        self.bound_framebuffer = framebuffer;
        self.commands.push(DeviceCommand::BindFramebuffer(framebuffer));
    }

    fn set_viewport(&mut self, rect: IRect) {
        self.commands.push(DeviceCommand::SetViewport(rect));
    }

    fn set_clear_color(&mut self, color: Vec4) {
        self.commands.push(DeviceCommand::SetClearColor(color));
    }

    fn clear(&mut self, flags: ClearFlags) {
        self.commands.push(DeviceCommand::Clear { framebuffer: self.bound_framebuffer, flags });
    }

    fn set_color_mask(&mut self, enabled: bool) {
        self.commands.push(DeviceCommand::SetColorMask(enabled));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.commands.push(DeviceCommand::SetDepthTest(enabled));
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.commands.push(DeviceCommand::SetDepthWrite(enabled));
    }

    fn set_depth_func(&mut self, func: DepthFunc) {
        self.commands.push(DeviceCommand::SetDepthFunc(func));
    }

    fn set_cull_face(&mut self, face: Option<CullFace>) {
        self.commands.push(DeviceCommand::SetCullFace(face));
    }

    fn set_blend(&mut self, blend: Option<BlendFunc>) {
        self.commands.push(DeviceCommand::SetBlend(blend));
    }

    fn set_stencil(&mut self, stencil: Option<StencilState>) {
        self.commands.push(DeviceCommand::SetStencil(stencil));
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) {
        self.commands.push(DeviceCommand::Draw {
            mesh,
            program: self.bound_program(),
            framebuffer: self.bound_framebuffer,
        });
    }

    fn draw_mesh_instanced(&mut self, mesh: MeshHandle, transforms: &[Mat4], colors: Option<&[Vec4]>) {
        if let Some(colors) = colors {
            if colors.len() != transforms.len() {
                log::warn!(
                    "Instance color count {} does not match transform count {}",
                    colors.len(),
                    transforms.len()
                );
            }
        }
        self.commands.push(DeviceCommand::DrawInstanced {
            mesh,
            program: self.bound_program(),
            framebuffer: self.bound_framebuffer,
            instances: transforms.len(),
            colored: colors.is_some(),
        });
    }

    fn blit(
        &mut self,
        src: Option<FramebufferHandle>,
        dst: Option<FramebufferHandle>,
        src_rect: IRect,
        dst_rect: IRect,
        mask: BlitMask,
        filter: FilterMode,
    ) {
        self.commands.push(DeviceCommand::Blit { src, dst, src_rect, dst_rect, mask, filter });
    }

    fn draw_texture(&mut self, texture: TextureHandle, dst_rect: IRect) {
        self.commands.push(DeviceCommand::DrawTexture { texture, dst_rect });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::TextureFormat;

    #[test]
    fn test_texture_lifecycle() {
        let mut device = RecordingDevice::new(640, 480);
        let desc = TextureDesc::texture_2d(4, 4, TextureFormat::Rgba8);
        let tex = device.create_texture(&desc, Some(&[0u8; 64])).expect("texture");

        assert_eq!(device.texture_desc(tex), Some(desc));
        assert_eq!(device.live_texture_count(), 1);

        device.destroy_texture(tex);
        device.destroy_texture(tex);
        assert_eq!(device.live_texture_count(), 0);
        assert_eq!(device.redundant_release_count(), 1);
        assert_eq!(
            device.commands().iter().filter(|c| matches!(c, DeviceCommand::DestroyTexture(_))).count(),
            1
        );
    }

    #[test]
    fn test_texture_budget() {
        let mut device = RecordingDevice::new(640, 480);
        let desc = TextureDesc::texture_2d(4, 4, TextureFormat::Rgba8);
        device.limit_texture_creation(Some(1));

        assert!(device.create_texture(&desc, None).is_ok());
        assert!(matches!(device.create_texture(&desc, None), Err(RenderError::ResourceCreationFailed(_))));

        device.limit_texture_creation(None);
        assert!(device.create_texture(&desc, None).is_ok());
        assert_eq!(device.live_texture_count(), 2);
    }

    #[test]
    fn test_texture_data_size_checked() {
        let mut device = RecordingDevice::new(640, 480);
        let desc = TextureDesc::texture_2d(4, 4, TextureFormat::Rgba8);
        assert!(device.create_texture(&desc, Some(&[0u8; 3])).is_err());
    }

    #[test]
    fn test_framebuffer_completeness() {
        let mut device = RecordingDevice::new(640, 480);
        let fb = device.create_framebuffer().expect("fb");
        assert!(!device.is_framebuffer_complete(fb));

        let color = device
            .create_texture(&TextureDesc::texture_2d(8, 8, TextureFormat::Rgba8), None)
            .expect("color");
        device.attach_texture(fb, Attachment::Color(0), color, None).expect("attach");
        assert!(device.is_framebuffer_complete(fb));

        let depth = device
            .create_texture(&TextureDesc::texture_2d(8, 8, TextureFormat::Depth16), None)
            .expect("depth");
        assert!(device.attach_texture(fb, Attachment::Color(1), depth, None).is_err());

        let mut broken = RecordingDevice::new(8, 8).with_incomplete_framebuffers();
        let fb = broken.create_framebuffer().expect("fb");
        assert!(!broken.is_framebuffer_complete(fb));
    }

    #[test]
    fn test_uniform_locations_are_stable() {
        let mut device = RecordingDevice::new(640, 480);
        let shader = device.load_shader(ShaderProgram::Geometry).expect("shader");
        let a = device.uniform_location(shader, "uMatModel");
        let b = device.uniform_location(shader, "uMatModel");
        assert!(a.is_some());
        assert_eq!(a, b);

        device.use_shader(Some(shader));
        if let Some(loc) = a {
            device.set_uniform(loc, &UniformValue::Float(2.0));
        }
        assert_eq!(device.uniform_writes("uMatModel"), vec![UniformValue::Float(2.0)]);
    }

    #[test]
    fn test_failing_shader() {
        let mut device = RecordingDevice::new(8, 8).with_failing_shader(ShaderProgram::Ssao);
        assert!(device.load_shader(ShaderProgram::Ssao).is_err());
        assert!(device.load_shader(ShaderProgram::Bloom).is_ok());
    }

    #[test]
    fn test_draws_record_bound_program() {
        let mut device = RecordingDevice::new(8, 8);
        let mesh = device.create_primitive(PrimitiveKind::Quad).expect("mesh");
        let shader = device.load_shader(ShaderProgram::Lighting).expect("shader");

        device.draw_mesh(mesh);
        device.use_shader(Some(shader));
        device.draw_mesh(mesh);
        device.draw_mesh_instanced(mesh, &[Mat4::identity(); 2], None);

        assert_eq!(device.draw_count(), 3);
        assert_eq!(device.draws_with(ShaderProgram::Lighting), 2);
        assert_eq!(device.program_sequence(), vec![ShaderProgram::Lighting]);
    }
}
