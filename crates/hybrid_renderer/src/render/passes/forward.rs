//! Forward shading
//!
//! Transparent and blended geometry is shaded in a single pass on top of
//! the composited scene, with a bounded array of lights per draw. An
//! optional depth pre-pass lays down depth first so the shading pass only
//! touches the nearest surface.

use std::sync::OnceLock;

use crate::foundation::math::Vec3;
use crate::render::api::{DepthFunc, ShaderProgram, StencilState};
use crate::render::systems::drawcall::DrawCall;
use crate::render::systems::lighting::{BatchedLight, Light, LightRegistry, LightType};
use crate::render::systems::state::RenderFlags;
use crate::render::RenderResult;

use super::lighting::{upload_light, LightUniforms};
use super::{instance_colors, normal_matrix, upload_material, upload_uv, PassContext, RenderPass, Resource};

/// Light slots of the forward shaders
pub const MAX_FORWARD_LIGHTS: usize = 8;

/// Lights shading one forward draw
///
/// Walks the batch in order. With an `origin`, spot and omni lights whose
/// range sphere does not contain it are rejected before the limit applies;
/// instanced draws pass `None` and keep every batched light.
pub fn select_lights(
    lights: &LightRegistry,
    batch: &[BatchedLight],
    origin: Option<Vec3>,
    limit: usize,
) -> Vec<Light> {
    let in_range = |light: &Light| match (light.light_type, origin) {
        (LightType::Directional, _) | (_, None) => true,
        (_, Some(origin)) => (light.position - origin).norm_squared() <= light.range * light.range,
    };

    batch
        .iter()
        .filter_map(|b| lights.get(b.handle).copied())
        .filter(in_range)
        .take(limit.min(MAX_FORWARD_LIGHTS))
        .collect()
}

/// Uniform names of every forward light slot
fn light_slots() -> &'static [LightUniforms] {
    static SLOTS: OnceLock<Vec<LightUniforms>> = OnceLock::new();
    SLOTS.get_or_init(|| {
        (0..MAX_FORWARD_LIGHTS)
            .map(|i| LightUniforms::new(&format!("uLights[{}]", i), format!("uMatLightVP[{}]", i)))
            .collect()
    })
}

fn upload_lights(ctx: &mut PassContext<'_>, lights: &[Light]) {
    let slots = light_slots();
    for (names, light) in slots.iter().zip(lights) {
        upload_light(ctx, names, light);
        ctx.set(&names.enabled, true);
    }
    for names in slots.iter().skip(lights.len()) {
        ctx.set(&names.enabled, false);
    }
}

fn upload_environment(ctx: &mut PassContext<'_>) {
    let frame = ctx.frame;
    let environment = ctx.environment;
    let textures = ctx.textures;

    ctx.sampler("uTexNoise", textures.noise);
    match environment.active_sky() {
        Some(sky) => {
            ctx.cube_sampler("uCubeIrradiance", sky.irradiance);
            ctx.cube_sampler("uCubePrefilter", sky.prefilter);
            ctx.sampler("uTexBrdfLut", textures.brdf_lut);
            ctx.set("uQuatSkybox", environment.sky_rotation.coords);
            ctx.set("uHasSkybox", true);
        }
        None => {
            ctx.set("uColAmbient", environment.ambient_color);
            ctx.set("uHasSkybox", false);
        }
    }
    ctx.set("uViewPosition", frame.view_position);
    ctx.set("uBloomHdrThreshold", environment.bloom.hdr_threshold);
}

fn upload_call(ctx: &mut PassContext<'_>, call: &DrawCall) {
    ctx.device.set_blend(call.blend_mode.blend_func());
    ctx.set("uAlphaCutoff", call.alpha_scissor_threshold);
    ctx.set("uColAlbedo", call.material.albedo.color.to_vec4());
    upload_material(ctx, &call.material);
}

/// Depth-only rendering of forward geometry
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthPrepass;

impl RenderPass for DepthPrepass {
    fn name(&self) -> &'static str {
        "depth_prepass"
    }

    fn reads(&self) -> &'static [Resource] {
        &[Resource::DepthStencil]
    }

    fn writes(&self) -> &'static [Resource] {
        &[Resource::DepthStencil]
    }

    fn is_enabled(&self, ctx: &PassContext<'_>) -> bool {
        ctx.draw_calls.has_forward() && ctx.flags.contains(RenderFlags::DEPTH_PREPASS)
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let calls = ctx.draw_calls;
        let frame = ctx.frame;

        ctx.device.bind_framebuffer(Some(ctx.targets.scene.framebuffer));
        ctx.full_viewport();
        ctx.device.set_color_mask(false);
        ctx.device.set_blend(None);
        ctx.device.set_depth_test(true);
        ctx.device.set_depth_write(true);
        ctx.device.set_depth_func(DepthFunc::LessEqual);
        ctx.device.set_stencil(Some(StencilState::write(1)));

        if !calls.forward_instanced.is_empty() {
            ctx.bind(ShaderProgram::DepthInstanced)?;
            ctx.set("uMatVP", frame.view_proj);
            for call in &calls.forward_instanced {
                let Some(instances) = &call.instances else { continue };
                ctx.set("uMatModel", call.transform);
                ctx.device.draw_mesh_instanced(call.mesh.handle, &instances.transforms, None);
            }
        }

        if !calls.forward.is_empty() {
            ctx.bind(ShaderProgram::Depth)?;
            // Bin is sorted far to near
            for call in calls.forward.iter().rev() {
                ctx.set("uMatMVP", frame.view_proj * call.transform);
                ctx.device.draw_mesh(call.mesh.handle);
            }
        }

        ctx.unbind();
        ctx.device.set_color_mask(true);
        Ok(())
    }
}

/// Lit forward geometry, blended per draw
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardPass;

impl RenderPass for ForwardPass {
    fn name(&self) -> &'static str {
        "forward"
    }

    fn reads(&self) -> &'static [Resource] {
        &[Resource::ShadowMaps, Resource::DepthStencil]
    }

    fn writes(&self) -> &'static [Resource] {
        &[Resource::SceneColor, Resource::DepthStencil]
    }

    fn is_enabled(&self, ctx: &PassContext<'_>) -> bool {
        ctx.draw_calls.has_forward()
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let calls = ctx.draw_calls;
        let frame = ctx.frame;
        let batch = ctx.batch;
        let limit = ctx.config.forward_light_limit;

        ctx.device.bind_framebuffer(Some(ctx.targets.scene.framebuffer));
        ctx.full_viewport();
        ctx.device.set_depth_test(true);
        if ctx.flags.contains(RenderFlags::DEPTH_PREPASS) {
            ctx.device.set_depth_func(DepthFunc::Equal);
            ctx.device.set_depth_write(false);
            ctx.device.set_stencil(None);
        } else {
            ctx.device.set_depth_func(DepthFunc::LessEqual);
            ctx.device.set_depth_write(true);
            ctx.device.set_stencil(Some(StencilState::write(1)));
        }

        if !calls.forward_instanced.is_empty() {
            ctx.bind(ShaderProgram::ForwardInstanced)?;
            upload_environment(ctx);
            ctx.set("uMatVP", frame.view_proj);
            let lights = select_lights(ctx.lights, batch, None, limit);
            upload_lights(ctx, &lights);
            for call in &calls.forward_instanced {
                let Some(instances) = &call.instances else { continue };
                upload_call(ctx, call);
                ctx.set("uMatModel", call.transform);
                let colors = instance_colors(instances);
                ctx.device.draw_mesh_instanced(call.mesh.handle, &instances.transforms, colors.as_deref());
            }
        }

        if !calls.forward.is_empty() {
            ctx.bind(ShaderProgram::Forward)?;
            upload_environment(ctx);
            for call in &calls.forward {
                let lights = select_lights(ctx.lights, batch, Some(call.origin()), limit);
                upload_lights(ctx, &lights);
                upload_call(ctx, call);
                upload_uv(ctx, &call.uv);
                ctx.set("uMatNormal", normal_matrix(&call.transform));
                ctx.set("uMatModel", call.transform);
                ctx.set("uMatMVP", frame.view_proj * call.transform);
                ctx.device.draw_mesh(call.mesh.handle);
            }
        }

        ctx.unbind();
        ctx.device.set_blend(None);
        ctx.device.set_depth_func(DepthFunc::LessEqual);
        ctx.device.set_depth_write(true);
        ctx.device.set_stencil(None);
        Ok(())
    }
}
