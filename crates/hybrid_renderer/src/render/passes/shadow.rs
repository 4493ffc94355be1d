//! Shadow map rendering
//!
//! Runs before the geometry buffer. Every batched light whose shadow is due
//! renders the frame's shadow casters into its map; directional and spot
//! lights use one view, omni lights render each cube face in turn.

use crate::foundation::math::{Mat4, Vec3};
use crate::render::api::{
    Attachment, ClearFlags, CubeFace, CullFace, DepthFunc, IRect, ShaderProgram,
};
use crate::render::primitives::BoundingBox;
use crate::render::systems::drawcall::DrawCall;
use crate::render::systems::lighting::shadow::{light_view_proj, omni_face_view, omni_projection};
use crate::render::systems::lighting::{Light, LightHandle, ShadowMap};
use crate::render::systems::state::ShadowCastMode;
use crate::render::RenderResult;

use super::{instance_colors, PassContext, RenderPass, Resource};

/// Face culling used while rasterizing a caster
pub const fn caster_cull(mode: ShadowCastMode) -> Option<CullFace> {
    match mode {
        ShadowCastMode::FrontFaces | ShadowCastMode::Disabled => Some(CullFace::Back),
        ShadowCastMode::BackFaces => Some(CullFace::Front),
        ShadowCastMode::AllFaces => None,
    }
}

/// Renders due shadow maps
#[derive(Debug, Clone, Copy, Default)]
pub struct ShadowPass;

/// Programs and per-view uniforms of one shadow view
struct ShadowView {
    view_proj: Mat4,
    instanced: ShaderProgram,
    single: ShaderProgram,
    /// Light position and far distance for linear cube depth
    cube: Option<(Vec3, f32)>,
}

impl ShadowView {
    fn upload_globals(&self, ctx: &mut PassContext<'_>) {
        if let Some((position, far)) = self.cube {
            ctx.set("uViewPosition", position);
            ctx.set("uFar", far);
        }
    }
}

fn draw_casters(ctx: &mut PassContext<'_>, view: &ShadowView) -> RenderResult<()> {
    let calls = ctx.draw_calls;
    let casts = |call: &&DrawCall| call.casts_shadows();

    ctx.bind(view.instanced)?;
    view.upload_globals(ctx);
    ctx.set("uMatVP", view.view_proj);
    for call in calls.deferred_instanced.iter().chain(&calls.forward_instanced).filter(casts) {
        let Some(instances) = &call.instances else { continue };
        ctx.device.set_cull_face(caster_cull(call.shadow_cast_mode));
        ctx.set("uMatModel", call.transform);
        let colors = instance_colors(instances);
        ctx.device.draw_mesh_instanced(call.mesh.handle, &instances.transforms, colors.as_deref());
    }

    ctx.bind(view.single)?;
    view.upload_globals(ctx);
    for call in calls.deferred.iter().chain(&calls.forward).filter(casts) {
        ctx.device.set_cull_face(caster_cull(call.shadow_cast_mode));
        if view.cube.is_some() {
            ctx.set("uMatModel", call.transform);
        }
        ctx.set("uMatMVP", view.view_proj * call.transform);
        ctx.device.draw_mesh(call.mesh.handle);
    }

    ctx.unbind();
    Ok(())
}

fn render_omni(ctx: &mut PassContext<'_>, light: &Light, map: &ShadowMap) -> RenderResult<()> {
    let proj = omni_projection(light);
    for face in CubeFace::ALL {
        ctx.device.attach_texture(map.framebuffer, Attachment::Depth, map.depth, Some(face))?;
        ctx.device.clear(ClearFlags::DEPTH);

        let view = ShadowView {
            view_proj: proj * omni_face_view(light.position, face),
            instanced: ShaderProgram::DepthCubeInstanced,
            single: ShaderProgram::DepthCube,
            cube: Some((light.position, light.far())),
        };
        draw_casters(ctx, &view)?;
    }
    Ok(())
}

fn render_light(
    ctx: &mut PassContext<'_>,
    handle: LightHandle,
    light: &Light,
    map: &ShadowMap,
    scene_bounds: &BoundingBox,
) -> RenderResult<()> {
    ctx.device.bind_framebuffer(Some(map.framebuffer));
    ctx.device.set_viewport(IRect::sized(map.resolution, map.resolution));

    match light_view_proj(light, scene_bounds) {
        Some(view_proj) => {
            ctx.device.clear(ClearFlags::DEPTH);
            let view = ShadowView {
                view_proj,
                instanced: ShaderProgram::DepthInstanced,
                single: ShaderProgram::Depth,
                cube: None,
            };
            draw_casters(ctx, &view)?;
            if let Some(light) = ctx.lights.get_mut(handle) {
                light.shadow.view_proj = view_proj;
            }
        }
        None => render_omni(ctx, light, map)?,
    }
    Ok(())
}

impl RenderPass for ShadowPass {
    fn name(&self) -> &'static str {
        "shadow"
    }

    fn reads(&self) -> &'static [Resource] {
        &[]
    }

    fn writes(&self) -> &'static [Resource] {
        &[Resource::ShadowMaps]
    }

    fn is_enabled(&self, ctx: &PassContext<'_>) -> bool {
        ctx.batch
            .iter()
            .any(|b| ctx.lights.get(b.handle).is_some_and(Light::needs_shadow_render))
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let batch = ctx.batch;
        let scene_bounds = BoundingBox::new(ctx.config.scene_bounds_min, ctx.config.scene_bounds_max);

        ctx.device.set_color_mask(false);
        ctx.device.set_blend(None);
        ctx.device.set_stencil(None);
        ctx.device.set_depth_test(true);
        ctx.device.set_depth_write(true);
        ctx.device.set_depth_func(DepthFunc::LessEqual);

        for batched in batch {
            let Some(light) = ctx.lights.get(batched.handle).copied() else { continue };
            if !light.needs_shadow_render() {
                continue;
            }
            let Some(map) = light.shadow.map else { continue };

            render_light(ctx, batched.handle, &light, &map, &scene_bounds)?;

            if let Some(light) = ctx.lights.get_mut(batched.handle) {
                light.shadow.update.should_update = false;
            }
            ctx.stats.shadow_maps_updated += 1;
            log::trace!("Shadow map of {:?} ({:?}) refreshed", batched.handle, light.light_type);
        }

        ctx.device.set_color_mask(true);
        ctx.device.set_cull_face(Some(CullFace::Back));
        Ok(())
    }
}
