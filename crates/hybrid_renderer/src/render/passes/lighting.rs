//! Deferred lighting
//!
//! Three screen-space passes over the G-buffer: ambient or image-based
//! environment light, per-light direct light accumulated additively, and
//! the composite that merges both with occlusion and emission into the HDR
//! scene color.

use std::sync::OnceLock;

use crate::foundation::math::Vec4;
use crate::render::api::{BlendFunc, ClearFlags, ShaderProgram};
use crate::render::systems::lighting::{Light, LightType};
use crate::render::RenderResult;

use super::{PassContext, RenderPass, Resource};

/// Uniform names of one light struct in a shader
///
/// Built once per slot so per-draw uploads do not format strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LightUniforms {
    color: String,
    specular: String,
    energy: String,
    kind: String,
    position: String,
    direction: String,
    range: String,
    attenuation: String,
    inner_cutoff: String,
    outer_cutoff: String,
    shadow_cubemap: String,
    shadow_texel_size: String,
    shadow_map: String,
    shadow_bias: String,
    size: String,
    near: String,
    far: String,
    shadow: String,
    view_proj: String,
    pub(crate) enabled: String,
}

impl LightUniforms {
    /// Names for the struct `prefix`
    ///
    /// `view_proj` is where the light-space matrix of a 2D shadow map goes;
    /// the deferred shader keeps it in the struct, the forward shader in a
    /// separate array.
    pub(crate) fn new(prefix: &str, view_proj: String) -> Self {
        let field = |name: &str| format!("{}.{}", prefix, name);
        Self {
            color: field("color"),
            specular: field("specular"),
            energy: field("energy"),
            kind: field("type"),
            position: field("position"),
            direction: field("direction"),
            range: field("range"),
            attenuation: field("attenuation"),
            inner_cutoff: field("innerCutOff"),
            outer_cutoff: field("outerCutOff"),
            shadow_cubemap: field("shadowCubemap"),
            shadow_texel_size: field("shadowMapTxlSz"),
            shadow_map: field("shadowMap"),
            shadow_bias: field("shadowBias"),
            size: field("size"),
            near: field("near"),
            far: field("far"),
            shadow: field("shadow"),
            view_proj,
            enabled: field("enabled"),
        }
    }

    /// The single light struct of the accumulation shader
    pub(crate) fn deferred() -> &'static Self {
        static NAMES: OnceLock<LightUniforms> = OnceLock::new();
        NAMES.get_or_init(|| Self::new("uLight", "uLight.matVP".to_string()))
    }
}

/// Upload one light under the names in `names`
pub(crate) fn upload_light(ctx: &mut PassContext<'_>, names: &LightUniforms, light: &Light) {
    ctx.set(&names.color, light.color);
    ctx.set(&names.specular, light.specular);
    ctx.set(&names.energy, light.energy);
    ctx.set(&names.kind, light.light_type.shader_index());

    match light.light_type {
        LightType::Directional => {
            ctx.set(&names.direction, light.direction);
        }
        LightType::Spot => {
            ctx.set(&names.position, light.position);
            ctx.set(&names.direction, light.direction);
            ctx.set(&names.range, light.range);
            ctx.set(&names.attenuation, light.attenuation);
            ctx.set(&names.inner_cutoff, light.inner_cutoff);
            ctx.set(&names.outer_cutoff, light.outer_cutoff);
        }
        LightType::Omni => {
            ctx.set(&names.position, light.position);
            ctx.set(&names.range, light.range);
            ctx.set(&names.attenuation, light.attenuation);
        }
    }

    match light.shadow.map.filter(|_| light.shadow.enabled) {
        Some(map) => {
            if map.is_cube() {
                ctx.cube_sampler(&names.shadow_cubemap, map.depth);
            } else {
                ctx.set(&names.shadow_texel_size, map.texel_size());
                ctx.sampler(&names.shadow_map, map.depth);
                ctx.set(&names.view_proj, light.shadow.view_proj);
            }
            ctx.set(&names.shadow_bias, light.shadow.bias);
            ctx.set(&names.size, light.size);
            ctx.set(&names.near, light.near);
            ctx.set(&names.far, light.far());
            ctx.set(&names.shadow, true);
        }
        None => ctx.set(&names.shadow, false),
    }
}

/// Ambient term or image-based lighting from the sky
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentLightPass;

impl RenderPass for EnvironmentLightPass {
    fn name(&self) -> &'static str {
        "lit_env"
    }

    fn reads(&self) -> &'static [Resource] {
        &[Resource::GBuffer, Resource::DepthStencil]
    }

    fn writes(&self) -> &'static [Resource] {
        &[Resource::LitEnv]
    }

    fn is_enabled(&self, ctx: &PassContext<'_>) -> bool {
        ctx.draw_calls.has_deferred()
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let frame = ctx.frame;
        let environment = ctx.environment;
        let gbuffer = ctx.targets.gbuffer;
        let brdf_lut = ctx.textures.brdf_lut;

        ctx.device.bind_framebuffer(Some(ctx.targets.lit_env.framebuffer));
        ctx.full_viewport();
        ctx.device.set_blend(None);
        ctx.device.set_depth_test(false);
        let stencil = ctx.geometry_stencil();
        ctx.device.set_stencil(stencil);
        ctx.device.set_clear_color(Vec4::zeros());
        ctx.device.clear(ClearFlags::COLOR);

        match environment.active_sky() {
            Some(sky) => {
                ctx.bind(ShaderProgram::AmbientIbl)?;
                ctx.sampler("uTexAlbedo", gbuffer.albedo);
                ctx.sampler("uTexNormal", gbuffer.normal);
                ctx.sampler("uTexDepth", gbuffer.depth_stencil);
                ctx.sampler("uTexORM", gbuffer.orm);
                ctx.cube_sampler("uCubeIrradiance", sky.irradiance);
                ctx.cube_sampler("uCubePrefilter", sky.prefilter);
                ctx.sampler("uTexBrdfLut", brdf_lut);
                ctx.set("uViewPosition", frame.view_position);
                ctx.set("uMatInvProj", frame.inv_proj);
                ctx.set("uMatInvView", frame.inv_view);
                ctx.set("uQuatSkybox", environment.sky_rotation.coords);
            }
            None => {
                ctx.bind(ShaderProgram::Color)?;
                let ambient = environment.ambient_color;
                ctx.set("uColor", Vec4::new(ambient.x, ambient.y, ambient.z, 0.0));
            }
        }
        ctx.draw_quad();
        ctx.unbind();
        Ok(())
    }
}

/// Direct light of every batched light, summed into the diffuse and
/// specular targets
#[derive(Debug, Clone, Copy, Default)]
pub struct LightAccumulationPass;

impl RenderPass for LightAccumulationPass {
    fn name(&self) -> &'static str {
        "lit_obj"
    }

    fn reads(&self) -> &'static [Resource] {
        &[Resource::GBuffer, Resource::DepthStencil, Resource::ShadowMaps]
    }

    fn writes(&self) -> &'static [Resource] {
        &[Resource::LitObj]
    }

    fn is_enabled(&self, ctx: &PassContext<'_>) -> bool {
        ctx.draw_calls.has_deferred()
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let frame = ctx.frame;
        let batch = ctx.batch;
        let gbuffer = ctx.targets.gbuffer;
        let noise = ctx.textures.noise;

        ctx.device.bind_framebuffer(Some(ctx.targets.lit_obj.framebuffer));
        ctx.full_viewport();
        ctx.device.set_depth_test(false);
        let stencil = ctx.geometry_stencil();
        ctx.device.set_stencil(stencil);
        ctx.device.set_clear_color(Vec4::zeros());
        ctx.device.clear(ClearFlags::COLOR);
        ctx.device.set_blend(Some(BlendFunc::ACCUMULATE));

        ctx.bind(ShaderProgram::Lighting)?;
        ctx.set("uMatInvProj", frame.inv_proj);
        ctx.set("uMatInvView", frame.inv_view);
        ctx.set("uViewPosition", frame.view_position);
        ctx.sampler("uTexAlbedo", gbuffer.albedo);
        ctx.sampler("uTexNormal", gbuffer.normal);
        ctx.sampler("uTexDepth", gbuffer.depth_stencil);
        ctx.sampler("uTexORM", gbuffer.orm);
        ctx.sampler("uTexNoise", noise);

        for batched in batch {
            let Some(light) = ctx.lights.get(batched.handle).copied() else { continue };
            upload_light(ctx, LightUniforms::deferred(), &light);
            ctx.draw_quad();
        }

        ctx.unbind();
        ctx.device.set_blend(None);
        Ok(())
    }
}

/// Merges lighting, occlusion and emission into the scene target
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneCompositePass;

impl RenderPass for SceneCompositePass {
    fn name(&self) -> &'static str {
        "scene"
    }

    fn reads(&self) -> &'static [Resource] {
        &[Resource::GBuffer, Resource::LitEnv, Resource::LitObj, Resource::Ssao]
    }

    fn writes(&self) -> &'static [Resource] {
        &[Resource::SceneColor, Resource::SceneBright]
    }

    fn is_enabled(&self, ctx: &PassContext<'_>) -> bool {
        ctx.draw_calls.has_deferred()
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let targets = &*ctx.targets;
        let (gbuffer, lit_env, lit_obj, scene) = (targets.gbuffer, targets.lit_env, targets.lit_obj, targets.scene);
        let occlusion = match &targets.ssao {
            Some(pair) if ctx.environment.ssao.enabled => pair.source().color,
            _ => ctx.textures.white,
        };
        let threshold = ctx.environment.bloom.hdr_threshold;

        ctx.device.bind_framebuffer(Some(scene.framebuffer));
        ctx.full_viewport();
        ctx.device.set_blend(None);
        ctx.device.set_depth_test(false);
        let stencil = ctx.geometry_stencil();
        ctx.device.set_stencil(stencil);
        ctx.device.set_clear_color(Vec4::zeros());
        ctx.device.clear(ClearFlags::COLOR);

        ctx.bind(ShaderProgram::Scene)?;
        ctx.set("uBloomHdrThreshold", threshold);
        ctx.sampler("uTexEnvAmbient", lit_env.first);
        ctx.sampler("uTexEnvSpecular", lit_env.second);
        ctx.sampler("uTexObjDiffuse", lit_obj.first);
        ctx.sampler("uTexObjSpecular", lit_obj.second);
        ctx.sampler("uTexORM", gbuffer.orm);
        ctx.sampler("uTexSSAO", occlusion);
        ctx.sampler("uTexAlbedo", gbuffer.albedo);
        ctx.sampler("uTexEmission", gbuffer.emission);
        ctx.draw_quad();
        ctx.unbind();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::render::api::{MeshHandle, TextureHandle, TextureKind, UniformValue};
    use crate::render::backends::DeviceCommand;
    use crate::render::passes::test_support::Fixture;
    use crate::render::primitives::{BoundingBox, Mesh};
    use crate::render::resources::Material;
    use crate::render::systems::drawcall::{DrawCall, RenderPath, UvTransform};
    use crate::render::systems::environment::Skybox;
    use crate::render::systems::lighting::batch_lights;
    use crate::render::systems::state::{BlendMode, ShadowCastMode};

    fn with_deferred_call(fixture: &mut Fixture) {
        fixture.draw_calls.push(
            RenderPath::Deferred,
            DrawCall {
                mesh: Mesh::new(MeshHandle(1), 3, 0, BoundingBox::default()),
                material: Material::default(),
                transform: Mat4::identity(),
                shadow_cast_mode: ShadowCastMode::FrontFaces,
                blend_mode: BlendMode::Opaque,
                alpha_scissor_threshold: 0.01,
                instances: None,
                uv: UvTransform::default(),
            },
        );
    }

    #[test]
    fn test_flat_ambient_without_sky() {
        let mut fixture = Fixture::new(32, 32);
        with_deferred_call(&mut fixture);
        fixture.environment.ambient_color = Vec3::new(0.1, 0.2, 0.3);

        EnvironmentLightPass.execute(&mut fixture.context()).expect("lit_env");

        assert_eq!(fixture.device.draws_with(ShaderProgram::Color), 1);
        assert_eq!(
            fixture.device.uniform_writes("uColor"),
            vec![UniformValue::Vec4(Vec4::new(0.1, 0.2, 0.3, 0.0))]
        );
    }

    #[test]
    fn test_sky_uses_image_based_lighting() {
        let mut fixture = Fixture::new(32, 32);
        with_deferred_call(&mut fixture);
        fixture.environment.enable_skybox(Skybox {
            cubemap: TextureHandle(700),
            irradiance: TextureHandle(701),
            prefilter: TextureHandle(702),
        });

        EnvironmentLightPass.execute(&mut fixture.context()).expect("lit_env");

        assert_eq!(fixture.device.draws_with(ShaderProgram::AmbientIbl), 1);
        assert!(fixture.device.commands().contains(&DeviceCommand::BindTexture {
            slot: 4,
            kind: TextureKind::Cubemap,
            texture: Some(TextureHandle(701)),
        }));
    }

    #[test]
    fn test_one_additive_quad_per_light() {
        let mut fixture = Fixture::new(32, 32);
        with_deferred_call(&mut fixture);
        for light_type in [LightType::Directional, LightType::Omni] {
            let h = fixture.lights.create(light_type);
            fixture.lights.set_range(h, 3.0);
            fixture.lights.set_active(h, true);
        }
        fixture.batch = batch_lights(&mut fixture.lights, &fixture.frame, 0.016);
        assert_eq!(fixture.batch.len(), 2);

        LightAccumulationPass.execute(&mut fixture.context()).expect("lit_obj");

        assert_eq!(fixture.device.draws_with(ShaderProgram::Lighting), 2);
        assert!(fixture.device.commands().contains(&DeviceCommand::SetBlend(Some(BlendFunc::ACCUMULATE))));
        assert_eq!(
            fixture.device.uniform_writes("uLight.type"),
            vec![UniformValue::Int(0), UniformValue::Int(2)]
        );
        // Cached uniform: the second light writes the same value
        assert_eq!(fixture.device.uniform_writes("uLight.shadow"), vec![UniformValue::Int(0)]);
    }

    #[test]
    fn test_shadowed_light_binds_its_map() {
        let mut fixture = Fixture::new(32, 32);
        with_deferred_call(&mut fixture);
        let h = fixture.lights.create(LightType::Spot);
        fixture.lights.set_active(h, true);
        fixture.lights.enable_shadow(&mut fixture.device, h, 128).expect("shadow");
        fixture.batch = batch_lights(&mut fixture.lights, &fixture.frame, 0.0);
        let map = fixture.lights.get(h).and_then(|l| l.shadow.map).expect("map");

        LightAccumulationPass.execute(&mut fixture.context()).expect("lit_obj");

        assert_eq!(fixture.device.uniform_writes("uLight.shadow"), vec![UniformValue::Int(1)]);
        assert_eq!(
            fixture.device.uniform_writes("uLight.shadowMapTxlSz"),
            vec![UniformValue::Float(1.0 / 128.0)]
        );
        assert!(fixture.device.commands().iter().any(|c| matches!(
            c,
            DeviceCommand::BindTexture { texture: Some(t), .. } if *t == map.depth
        )));
    }

    #[test]
    fn test_composite_uses_white_occlusion_without_ssao() {
        let mut fixture = Fixture::new(32, 32);
        with_deferred_call(&mut fixture);
        let white = fixture.textures.white;

        SceneCompositePass.execute(&mut fixture.context()).expect("scene");

        assert_eq!(fixture.device.draws_with(ShaderProgram::Scene), 1);
        assert!(fixture.device.commands().iter().any(|c| matches!(
            c,
            DeviceCommand::BindTexture { slot: 5, texture: Some(t), .. } if *t == white
        )));
    }
}
