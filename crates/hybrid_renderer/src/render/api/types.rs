//! Device-level handles and state descriptors
//!
//! Everything in this module is part of the contract between the pipeline
//! and the graphics-device implementation. Handles are opaque: the pipeline
//! never interprets their values, it only hands them back to the device.

use bitflags::bitflags;

use crate::foundation::math::{Mat4, Vec2, Vec3, Vec4};

/// Handle to a 2D texture or cubemap stored in the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// Handle to a framebuffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferHandle(pub u64);

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderHandle(pub u64);

/// Handle to uploaded vertex/index data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub u64);

/// Location of a uniform inside a shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

/// Internal GPU storage formats used by render targets and generated textures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGB
    Rgb8,
    /// 8-bit RGBA
    Rgba8,
    /// Single channel half float
    R16F,
    /// Two channel half float
    Rg16F,
    /// Three channel half float
    Rgb16F,
    /// Four channel half float
    Rgba16F,
    /// 16-bit depth
    Depth16,
    /// 24-bit depth with 8-bit stencil
    Depth24Stencil8,
}

impl TextureFormat {
    /// Whether the format holds depth (and possibly stencil) data
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::Depth16 | Self::Depth24Stencil8)
    }

    /// Size of one texel in bytes
    pub const fn bytes_per_texel(self) -> usize {
        match self {
            Self::R16F | Self::Depth16 => 2,
            Self::Rgb8 => 3,
            Self::Rgba8 | Self::Rg16F | Self::Depth24Stencil8 => 4,
            Self::Rgb16F => 6,
            Self::Rgba16F => 8,
        }
    }
}

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Plain 2D texture
    Texture2D,
    /// Six-faced cube texture
    Cubemap,
}

/// Sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    /// Nearest texel
    Nearest,
    /// Bilinear
    Linear,
}

/// Description of a texture to allocate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Storage format
    pub format: TextureFormat,
    /// 2D or cube
    pub kind: TextureKind,
    /// Min/mag filter
    pub filter: FilterMode,
}

impl TextureDesc {
    /// A 2D texture with nearest filtering
    pub const fn texture_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            kind: TextureKind::Texture2D,
            filter: FilterMode::Nearest,
        }
    }

    /// A square cubemap with nearest filtering
    pub const fn cubemap(size: u32, format: TextureFormat) -> Self {
        Self {
            width: size,
            height: size,
            format,
            kind: TextureKind::Cubemap,
            filter: FilterMode::Nearest,
        }
    }

    /// Same description with a different filter
    #[must_use]
    pub const fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    /// Expected byte length of initial data for a 2D texture
    pub const fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_texel()
    }
}

/// One face of a cubemap, in the conventional +X, -X, +Y, -Y, +Z, -Z order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    /// +X
    PositiveX,
    /// -X
    NegativeX,
    /// +Y
    PositiveY,
    /// -Y
    NegativeY,
    /// +Z
    PositiveZ,
    /// -Z
    NegativeZ,
}

impl CubeFace {
    /// All faces in render order
    pub const ALL: [Self; 6] = [
        Self::PositiveX,
        Self::NegativeX,
        Self::PositiveY,
        Self::NegativeY,
        Self::PositiveZ,
        Self::NegativeZ,
    ];

    /// Position of the face in [`CubeFace::ALL`]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Framebuffer attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    /// Color attachment by index
    Color(u32),
    /// Depth only
    Depth,
    /// Combined depth/stencil
    DepthStencil,
}

bitflags! {
    /// Buffers affected by a clear
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        /// Color buffers
        const COLOR = 1 << 0;
        /// Depth buffer
        const DEPTH = 1 << 1;
        /// Stencil buffer
        const STENCIL = 1 << 2;
    }
}

bitflags! {
    /// Buffers copied by a blit
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BlitMask: u32 {
        /// Color data
        const COLOR = 1 << 0;
        /// Depth data
        const DEPTH = 1 << 1;
    }
}

/// Blend equation factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// 0
    Zero,
    /// 1
    One,
    /// Source alpha
    SrcAlpha,
    /// 1 - source alpha
    OneMinusSrcAlpha,
    /// Destination color
    DstColor,
}

/// Source/destination blend factors for an enabled blend stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    /// Factor applied to the incoming fragment
    pub src: BlendFactor,
    /// Factor applied to the stored value
    pub dst: BlendFactor,
}

impl BlendFunc {
    /// Classic `src * a + dst * (1 - a)`
    pub const ALPHA: Self = Self { src: BlendFactor::SrcAlpha, dst: BlendFactor::OneMinusSrcAlpha };
    /// `src * a + dst`
    pub const ADDITIVE: Self = Self { src: BlendFactor::SrcAlpha, dst: BlendFactor::One };
    /// `src * dst`
    pub const MULTIPLY: Self = Self { src: BlendFactor::DstColor, dst: BlendFactor::Zero };
    /// `src + dst`, used to accumulate light contributions
    pub const ACCUMULATE: Self = Self { src: BlendFactor::One, dst: BlendFactor::One };
}

/// Face culled when culling is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullFace {
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
}

/// Depth comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthFunc {
    /// Pass if closer
    Less,
    /// Pass if closer or equal
    LessEqual,
    /// Pass only on exact match
    Equal,
    /// Always pass
    Always,
}

/// Stencil comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilFunc {
    /// Always pass
    Always,
    /// Pass when the stored value equals the reference
    Equal,
}

/// Operation applied to the stencil value when depth and stencil tests pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOp {
    /// Keep the stored value
    Keep,
    /// Replace with the reference value
    Replace,
}

/// Full stencil configuration for an enabled stencil test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilState {
    /// Comparison
    pub func: StencilFunc,
    /// Reference value
    pub reference: u8,
    /// Bits that may be written
    pub write_mask: u8,
    /// Operation on pass
    pub pass_op: StencilOp,
}

impl StencilState {
    /// Write `reference` wherever geometry is rasterized
    pub const fn write(reference: u8) -> Self {
        Self {
            func: StencilFunc::Always,
            reference,
            write_mask: 0xFF,
            pass_op: StencilOp::Replace,
        }
    }

    /// Pass only where the stored value equals `reference`, never write
    pub const fn test_equal(reference: u8) -> Self {
        Self {
            func: StencilFunc::Equal,
            reference,
            write_mask: 0x00,
            pass_op: StencilOp::Keep,
        }
    }
}

/// Integer pixel rectangle with a bottom-left origin, as used by viewports and blits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IRect {
    /// Left edge
    pub x: i32,
    /// Bottom edge
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl IRect {
    /// Create a rectangle
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle anchored at the origin
    pub fn sized(width: u32, height: u32) -> Self {
        Self::new(0, 0, to_i32(width), to_i32(height))
    }
}

/// Off-screen destination for the final image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTarget {
    /// Framebuffer receiving the color and depth blits
    pub framebuffer: FramebufferHandle,
    /// Width of its color attachment
    pub width: u32,
    /// Height of its color attachment
    pub height: u32,
}

/// Saturating conversion for pixel dimensions
pub fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Value written to a shader uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// Integer, also used for sampler slots and booleans
    Int(i32),
    /// Scalar float
    Float(f32),
    /// 2-component vector
    Vec2(Vec2),
    /// 3-component vector
    Vec3(Vec3),
    /// 4-component vector
    Vec4(Vec4),
    /// 4x4 matrix, column major
    Mat4(Mat4),
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        Self::Int(i32::from(value))
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        Self::Vec2(value)
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        Self::Vec3(value)
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        Self::Vec4(value)
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        Self::Mat4(value)
    }
}

/// Built-in meshes the pipeline needs for screen and sky passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// Full-screen quad in clip space
    Quad,
    /// Unit cube centered on the origin
    Cube,
}

/// Shader programs the pipeline asks the device to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderProgram {
    /// Separable gaussian blur, one direction per draw
    GaussianBlur,
    /// G-buffer fill, one transform per draw
    Geometry,
    /// G-buffer fill, per-instance transforms
    GeometryInstanced,
    /// Single pass lit shading with a bounded light array
    Forward,
    /// Forward shading with per-instance transforms
    ForwardInstanced,
    /// Rotated sky cube
    Skybox,
    /// Depth only
    Depth,
    /// Depth only, instanced
    DepthInstanced,
    /// Linear distance into a cube face
    DepthCube,
    /// Linear distance into a cube face, instanced
    DepthCubeInstanced,
    /// Screen-space ambient occlusion
    Ssao,
    /// Image based ambient and specular from the sky
    AmbientIbl,
    /// Per-light deferred shading
    Lighting,
    /// Deferred composite and bright pass
    Scene,
    /// Bloom composite
    Bloom,
    /// Distance fog
    Fog,
    /// Tone mapping
    Tonemap,
    /// Brightness/contrast/saturation
    Adjustment,
    /// Flat color fill
    Color,
    /// Fast approximate anti-aliasing
    Fxaa,
}

impl ShaderProgram {
    /// Programs loaded unconditionally at startup
    pub const CORE: [Self; 16] = [
        Self::GaussianBlur,
        Self::Geometry,
        Self::GeometryInstanced,
        Self::Forward,
        Self::ForwardInstanced,
        Self::Skybox,
        Self::Depth,
        Self::DepthInstanced,
        Self::DepthCube,
        Self::DepthCubeInstanced,
        Self::AmbientIbl,
        Self::Lighting,
        Self::Scene,
        Self::Tonemap,
        Self::Adjustment,
        Self::Color,
    ];

    /// Human readable name for logs
    pub const fn name(self) -> &'static str {
        match self {
            Self::GaussianBlur => "gaussian_blur",
            Self::Geometry => "geometry",
            Self::GeometryInstanced => "geometry_instanced",
            Self::Forward => "forward",
            Self::ForwardInstanced => "forward_instanced",
            Self::Skybox => "skybox",
            Self::Depth => "depth",
            Self::DepthInstanced => "depth_instanced",
            Self::DepthCube => "depth_cube",
            Self::DepthCubeInstanced => "depth_cube_instanced",
            Self::Ssao => "ssao",
            Self::AmbientIbl => "ambient_ibl",
            Self::Lighting => "lighting",
            Self::Scene => "scene",
            Self::Bloom => "bloom",
            Self::Fog => "fog",
            Self::Tonemap => "tonemap",
            Self::Adjustment => "adjustment",
            Self::Color => "color",
            Self::Fxaa => "fxaa",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_desc_byte_len() {
        let desc = TextureDesc::texture_2d(16, 16, TextureFormat::Rgb16F);
        assert_eq!(desc.byte_len(), 16 * 16 * 6);
        assert!(!desc.format.is_depth());
        assert!(TextureFormat::Depth24Stencil8.is_depth());
    }

    #[test]
    fn test_cube_face_order() {
        let indices: Vec<usize> = CubeFace::ALL.iter().map(|f| f.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_uniform_value_conversions() {
        assert_eq!(UniformValue::from(true), UniformValue::Int(1));
        assert_eq!(UniformValue::from(0.5_f32), UniformValue::Float(0.5));
        assert_eq!(UniformValue::from(Vec3::x()), UniformValue::Vec3(Vec3::x()));
    }

    #[test]
    fn test_stencil_presets() {
        let write = StencilState::write(1);
        assert_eq!(write.func, StencilFunc::Always);
        assert_eq!(write.pass_op, StencilOp::Replace);

        let test = StencilState::test_equal(0);
        assert_eq!(test.write_mask, 0);
        assert_eq!(test.reference, 0);
    }
}
