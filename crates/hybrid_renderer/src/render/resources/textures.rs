//! Built-in textures
//!
//! Default material maps, the random rotation noise shared by SSAO and
//! shadow filtering, the SSAO hemisphere kernel and the split-sum BRDF
//! lookup table used by image-based lighting. Everything is generated on the
//! CPU and uploaded once.

use half::f16;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::foundation::math::{constants, utils, Vec3};
use crate::render::api::{
    DeviceResult, FilterMode, GraphicsDevice, TextureDesc, TextureFormat, TextureHandle,
};

/// Side length of the tiled rotation noise
pub const NOISE_RESOLUTION: u32 = 16;

/// Number of SSAO hemisphere samples
pub const SSAO_KERNEL_SIZE: usize = 32;

/// Side length of the BRDF lookup table
pub const BRDF_LUT_RESOLUTION: u32 = 32;

const BRDF_SAMPLE_COUNT: u32 = 64;

/// Convert floats to packed half-precision bytes
fn pack_half(values: &[f32]) -> Vec<u8> {
    let halves: Vec<f16> = values.iter().map(|v| f16::from_f32(*v)).collect();
    bytemuck::cast_slice(&halves).to_vec()
}

fn signed_unit(rng: &mut StdRng) -> f32 {
    rng.gen::<f32>() * 2.0 - 1.0
}

/// Random rotation vectors, x and y in [-1, 1], z in [0, 1]
pub fn generate_noise(rng: &mut StdRng) -> Vec<f32> {
    let texels = (NOISE_RESOLUTION * NOISE_RESOLUTION) as usize;
    let mut data = Vec::with_capacity(texels * 3);
    for _ in 0..texels {
        data.push(signed_unit(rng));
        data.push(signed_unit(rng));
        data.push(rng.gen::<f32>());
    }
    data
}

/// Hemisphere samples oriented along +Z
///
/// Samples are scattered inside the unit hemisphere and pulled towards the
/// origin so that occlusion close to the shaded point weighs more.
pub fn generate_ssao_kernel(rng: &mut StdRng) -> Vec<Vec3> {
    (0..SSAO_KERNEL_SIZE)
        .map(|i| {
            let direction = utils::normalize_or_zero(Vec3::new(signed_unit(rng), signed_unit(rng), rng.gen::<f32>()));
            let t = i as f32 / SSAO_KERNEL_SIZE as f32;
            direction * rng.gen::<f32>() * utils::lerp(0.1, 1.0, t * t)
        })
        .collect()
}

fn hammersley(i: u32, count: u32) -> (f32, f32) {
    (i as f32 / count as f32, i.reverse_bits() as f32 * 2.328_306_4e-10)
}

fn importance_sample_ggx(xi: (f32, f32), roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = 2.0 * constants::PI * xi.0;
    let cos_theta = ((1.0 - xi.1) / (1.0 + (a * a - 1.0) * xi.1)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta)
}

fn geometry_schlick_ggx(n_dot_x: f32, roughness: f32) -> f32 {
    let k = roughness * roughness / 2.0;
    n_dot_x / (n_dot_x * (1.0 - k) + k)
}

/// Split-sum scale and bias for one (N.V, roughness) pair
pub fn integrate_brdf(n_dot_v: f32, roughness: f32) -> (f32, f32) {
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).max(0.0).sqrt(), 0.0, n_dot_v);
    let mut scale = 0.0;
    let mut bias = 0.0;

    for i in 0..BRDF_SAMPLE_COUNT {
        let h = importance_sample_ggx(hammersley(i, BRDF_SAMPLE_COUNT), roughness);
        let l = h * (2.0 * v.dot(&h)) - v;

        let n_dot_l = l.z.max(0.0);
        let n_dot_h = h.z.max(0.0);
        let v_dot_h = v.dot(&h).max(0.0);

        if n_dot_l > 0.0 {
            let g = geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness);
            let g_vis = g * v_dot_h / (n_dot_h * n_dot_v).max(f32::EPSILON);
            let fc = (1.0 - v_dot_h).powi(5);
            scale += (1.0 - fc) * g_vis;
            bias += fc * g_vis;
        }
    }

    (scale / BRDF_SAMPLE_COUNT as f32, bias / BRDF_SAMPLE_COUNT as f32)
}

/// RG lookup table, N.V along x and roughness along y
pub fn generate_brdf_lut() -> Vec<f32> {
    let size = BRDF_LUT_RESOLUTION;
    let mut data = Vec::with_capacity((size * size * 2) as usize);
    for y in 0..size {
        let roughness = (y as f32 + 0.5) / size as f32;
        for x in 0..size {
            let n_dot_v = (x as f32 + 0.5) / size as f32;
            let (scale, bias) = integrate_brdf(n_dot_v, roughness);
            data.push(scale);
            data.push(bias);
        }
    }
    data
}

/// Textures every frame relies on
#[derive(Debug, Clone)]
pub struct DefaultTextures {
    /// 1x1 white, stands in for missing albedo and ORM maps
    pub white: TextureHandle,
    /// 1x1 black, stands in for missing emission maps
    pub black: TextureHandle,
    /// 1x1 flat tangent-space normal
    pub normal: TextureHandle,
    /// Tiled random rotations
    pub noise: TextureHandle,
    /// Split-sum BRDF table
    pub brdf_lut: TextureHandle,
    /// SSAO hemisphere kernel, created on first use
    pub ssao_kernel: Option<TextureHandle>,
    rng: StdRng,
}

impl DefaultTextures {
    /// Generate and upload the always-present textures
    pub fn load(device: &mut dyn GraphicsDevice, seed: u64) -> DeviceResult<Self> {
        let mut rng = StdRng::seed_from_u64(seed);

        let pixel = TextureDesc::texture_2d(1, 1, TextureFormat::Rgb8).with_filter(FilterMode::Nearest);
        let white = device.create_texture(&pixel, Some(&[255, 255, 255]))?;
        let black = device.create_texture(&pixel, Some(&[0, 0, 0]))?;
        let normal = device.create_texture(&pixel, Some(&[128, 128, 255]))?;

        let noise_desc = TextureDesc::texture_2d(NOISE_RESOLUTION, NOISE_RESOLUTION, TextureFormat::Rgb16F)
            .with_filter(FilterMode::Nearest);
        let noise = device.create_texture(&noise_desc, Some(&pack_half(&generate_noise(&mut rng))))?;

        let lut_desc = TextureDesc::texture_2d(BRDF_LUT_RESOLUTION, BRDF_LUT_RESOLUTION, TextureFormat::Rg16F)
            .with_filter(FilterMode::Linear);
        let brdf_lut = device.create_texture(&lut_desc, Some(&pack_half(&generate_brdf_lut())))?;

        log::debug!("Default textures loaded");

        Ok(Self { white, black, normal, noise, brdf_lut, ssao_kernel: None, rng })
    }

    /// SSAO kernel texture, uploading it on the first call
    pub fn ensure_ssao_kernel(&mut self, device: &mut dyn GraphicsDevice) -> DeviceResult<TextureHandle> {
        if let Some(kernel) = self.ssao_kernel {
            return Ok(kernel);
        }

        let samples: Vec<f32> = generate_ssao_kernel(&mut self.rng)
            .iter()
            .flat_map(|s| [s.x, s.y, s.z])
            .collect();
        let desc = TextureDesc::texture_2d(SSAO_KERNEL_SIZE as u32, 1, TextureFormat::Rgb16F)
            .with_filter(FilterMode::Nearest);
        let kernel = device.create_texture(&desc, Some(&pack_half(&samples)))?;

        log::debug!("SSAO kernel uploaded ({} samples)", SSAO_KERNEL_SIZE);
        self.ssao_kernel = Some(kernel);
        Ok(kernel)
    }

    /// Release every texture
    pub fn unload(&mut self, device: &mut dyn GraphicsDevice) {
        for texture in [self.white, self.black, self.normal, self.noise, self.brdf_lut] {
            device.destroy_texture(texture);
        }
        if let Some(kernel) = self.ssao_kernel.take() {
            device.destroy_texture(kernel);
        }
    }
}
