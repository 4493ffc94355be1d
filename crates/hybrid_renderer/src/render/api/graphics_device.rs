//! Graphics device abstraction
//!
//! This module defines the trait a graphics API backend implements so the
//! pass pipeline can allocate render targets, bind state and issue draws
//! without knowing which API sits underneath.

use crate::foundation::math::{Mat4, Vec4};
use crate::render::RenderError;

use super::types::{
    Attachment, BlendFunc, BlitMask, ClearFlags, CubeFace, CullFace, DepthFunc, FilterMode,
    FramebufferHandle, IRect, MeshHandle, PrimitiveKind, ShaderHandle, ShaderProgram,
    StencilState, TextureDesc, TextureHandle, TextureKind, UniformLocation, UniformValue,
};

/// Result type for device operations
pub type DeviceResult<T> = Result<T, RenderError>;

/// Low-level graphics device
///
/// Every method maps to a small number of API calls. The trait is
/// deliberately stateful in the same way the underlying APIs are: binding a
/// framebuffer, a shader or a texture slot persists until it is changed.
///
/// Handles returned by the device remain valid until the matching `destroy_*`
/// call. Destroying an unknown handle is a no-op.
pub trait GraphicsDevice {
    /// Size of the default framebuffer in pixels
    fn screen_size(&self) -> (u32, u32);

    // === Textures ===

    /// Allocate a texture, optionally uploading initial texel data
    ///
    /// # Arguments
    /// * `desc` - Dimensions, format and filtering
    /// * `data` - Tightly packed texels matching `desc.format`, or `None` for
    ///   uninitialized storage
    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>) -> DeviceResult<TextureHandle>;

    /// Release a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    // === Framebuffers ===

    /// Create an empty framebuffer object
    fn create_framebuffer(&mut self) -> DeviceResult<FramebufferHandle>;

    /// Attach a texture to a framebuffer
    ///
    /// `face` selects the cube face when `texture` is a cubemap.
    fn attach_texture(
        &mut self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        texture: TextureHandle,
        face: Option<CubeFace>,
    ) -> DeviceResult<()>;

    /// Select which color attachments receive fragment output
    fn set_draw_buffers(&mut self, framebuffer: FramebufferHandle, count: u32);

    /// Completeness check after all attachments are in place
    fn is_framebuffer_complete(&self, framebuffer: FramebufferHandle) -> bool;

    /// Release a framebuffer object; attached textures are not released
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);

    // === Shaders ===

    /// Compile and link one of the pipeline's shader programs
    fn load_shader(&mut self, program: ShaderProgram) -> DeviceResult<ShaderHandle>;

    /// Release a shader program
    fn destroy_shader(&mut self, shader: ShaderHandle);

    /// Look up a uniform by name, `None` if the program does not use it
    fn uniform_location(&mut self, shader: ShaderHandle, name: &str) -> Option<UniformLocation>;

    /// Write a uniform of the currently bound program
    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue);

    /// Bind a program, or unbind with `None`
    fn use_shader(&mut self, shader: Option<ShaderHandle>);

    /// Bind a texture to a sampler slot, or clear the slot with `None`
    fn bind_texture(&mut self, slot: u32, kind: TextureKind, texture: Option<TextureHandle>);

    // === Meshes ===

    /// Upload one of the built-in meshes
    fn create_primitive(&mut self, kind: PrimitiveKind) -> DeviceResult<MeshHandle>;

    /// Release mesh storage
    fn destroy_mesh(&mut self, mesh: MeshHandle);

    // === Fixed-function state ===

    /// Bind a framebuffer for drawing, `None` selects the default framebuffer
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>);

    /// Set the viewport rectangle
    fn set_viewport(&mut self, rect: IRect);

    /// Set the clear color used by subsequent color clears
    fn set_clear_color(&mut self, color: Vec4);

    /// Clear the selected buffers of the bound framebuffer
    fn clear(&mut self, flags: ClearFlags);

    /// Enable or disable writes to the color buffers
    fn set_color_mask(&mut self, enabled: bool);

    /// Enable or disable depth testing
    fn set_depth_test(&mut self, enabled: bool);

    /// Enable or disable depth writes
    fn set_depth_write(&mut self, enabled: bool);

    /// Set the depth comparison
    fn set_depth_func(&mut self, func: DepthFunc);

    /// Set the culled face, `None` disables culling
    fn set_cull_face(&mut self, face: Option<CullFace>);

    /// Set the blend function, `None` disables blending
    fn set_blend(&mut self, blend: Option<BlendFunc>);

    /// Configure stencil testing, `None` disables it
    fn set_stencil(&mut self, stencil: Option<StencilState>);

    // === Drawing ===

    /// Draw a mesh with the bound program
    fn draw_mesh(&mut self, mesh: MeshHandle);

    /// Draw a mesh once per transform
    ///
    /// # Arguments
    /// * `transforms` - One model matrix per instance
    /// * `colors` - Optional per-instance color, must match `transforms` in length
    fn draw_mesh_instanced(&mut self, mesh: MeshHandle, transforms: &[Mat4], colors: Option<&[Vec4]>);

    /// Copy a rectangle between framebuffers, `None` is the default framebuffer
    fn blit(
        &mut self,
        src: Option<FramebufferHandle>,
        dst: Option<FramebufferHandle>,
        src_rect: IRect,
        dst_rect: IRect,
        mask: BlitMask,
        filter: FilterMode,
    );

    /// Draw a texture into a rectangle of the bound framebuffer
    fn draw_texture(&mut self, texture: TextureHandle, dst_rect: IRect);
}
