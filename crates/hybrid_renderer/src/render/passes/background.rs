//! Background fill
//!
//! Covers the pixels no deferred geometry touched (stencil 0) with the
//! rotated sky cube or the flat background color.

use crate::foundation::math::Vec4;
use crate::render::api::{ClearFlags, CullFace, ShaderProgram, StencilState};
use crate::render::RenderResult;

use super::{PassContext, RenderPass, Resource};

/// Sky or background color behind the scene
#[derive(Debug, Clone, Copy, Default)]
pub struct BackgroundPass;

impl RenderPass for BackgroundPass {
    fn name(&self) -> &'static str {
        "background"
    }

    fn reads(&self) -> &'static [Resource] {
        &[Resource::DepthStencil]
    }

    fn writes(&self) -> &'static [Resource] {
        &[Resource::SceneColor]
    }

    fn is_enabled(&self, _ctx: &PassContext<'_>) -> bool {
        true
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let frame = ctx.frame;
        let environment = ctx.environment;
        let cube = ctx.primitives.cube.handle;

        ctx.device.bind_framebuffer(Some(ctx.targets.scene.framebuffer));
        ctx.full_viewport();

        // The composite did not run, so the scene target still holds last frame
        if !ctx.draw_calls.has_deferred() {
            ctx.device.set_clear_color(Vec4::zeros());
            ctx.device.clear(ClearFlags::COLOR);
        }

        ctx.device.set_stencil(Some(StencilState::test_equal(0)));
        ctx.device.set_blend(None);
        ctx.device.set_depth_test(false);

        match environment.active_sky() {
            Some(sky) => {
                ctx.device.set_cull_face(None);
                ctx.bind(ShaderProgram::Skybox)?;
                ctx.cube_sampler("uCubeSky", sky.cubemap);
                ctx.set("uRotation", environment.sky_rotation.coords);
                ctx.set("uBloomHdrThreshold", environment.bloom.sky_hdr_threshold);
                ctx.set("uMatView", frame.view);
                ctx.set("uMatProj", frame.proj);
                ctx.device.draw_mesh(cube);
                ctx.device.set_cull_face(Some(CullFace::Back));
            }
            None => {
                ctx.bind(ShaderProgram::Color)?;
                let color = environment.background_color;
                ctx.set("uColor", Vec4::new(color.x, color.y, color.z, 0.0));
                ctx.draw_quad();
            }
        }

        ctx.unbind();
        ctx.device.set_stencil(None);
        Ok(())
    }
}
