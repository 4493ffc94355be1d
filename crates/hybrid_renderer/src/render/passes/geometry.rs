//! Geometry buffer fill
//!
//! Deferred draws write albedo, emission, normal and ORM, and tag their
//! pixels with stencil value 1 so later screen passes can tell geometry
//! from background.

use crate::foundation::math::Vec4;
use crate::render::api::{ClearFlags, CullFace, DepthFunc, ShaderProgram, StencilState};
use crate::render::RenderResult;

use super::{instance_colors, normal_matrix, upload_material, upload_uv, PassContext, RenderPass, Resource};

/// Fills the G-buffer from deferred draws
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryPass;

impl RenderPass for GeometryPass {
    fn name(&self) -> &'static str {
        "geometry"
    }

    fn reads(&self) -> &'static [Resource] {
        &[]
    }

    fn writes(&self) -> &'static [Resource] {
        &[Resource::GBuffer, Resource::DepthStencil]
    }

    fn is_enabled(&self, _ctx: &PassContext<'_>) -> bool {
        // Clears depth and stencil for the background even with no geometry
        true
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let calls = ctx.draw_calls;
        let frame = ctx.frame;

        ctx.device.bind_framebuffer(Some(ctx.targets.gbuffer.framebuffer));
        ctx.full_viewport();
        ctx.device.set_cull_face(Some(CullFace::Back));
        ctx.device.set_blend(None);
        ctx.device.set_color_mask(true);
        ctx.device.set_depth_test(true);
        ctx.device.set_depth_write(true);
        ctx.device.set_depth_func(DepthFunc::LessEqual);
        ctx.device.set_stencil(Some(StencilState::write(1)));
        ctx.device.set_clear_color(Vec4::zeros());
        ctx.device.clear(ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL);

        if !calls.deferred_instanced.is_empty() {
            ctx.bind(ShaderProgram::GeometryInstanced)?;
            ctx.set("uMatVP", frame.view_proj);
            for call in &calls.deferred_instanced {
                let Some(instances) = &call.instances else { continue };
                ctx.set("uMatModel", call.transform);
                ctx.set("uColAlbedo", call.material.albedo.color.to_vec3());
                upload_material(ctx, &call.material);
                let colors = instance_colors(instances);
                ctx.device.draw_mesh_instanced(call.mesh.handle, &instances.transforms, colors.as_deref());
            }
        }

        if !calls.deferred.is_empty() {
            ctx.bind(ShaderProgram::Geometry)?;
            for call in &calls.deferred {
                ctx.set("uMatNormal", normal_matrix(&call.transform));
                ctx.set("uMatModel", call.transform);
                ctx.set("uMatMVP", frame.view_proj * call.transform);
                ctx.set("uColAlbedo", call.material.albedo.color.to_vec3());
                upload_material(ctx, &call.material);
                upload_uv(ctx, &call.uv);
                ctx.device.draw_mesh(call.mesh.handle);
            }
        }

        ctx.unbind();
        Ok(())
    }
}
