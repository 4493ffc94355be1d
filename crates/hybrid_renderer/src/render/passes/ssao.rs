//! Screen-space ambient occlusion
//!
//! Computed at half resolution from the G-buffer depth and normals, then
//! smoothed by alternating horizontal and vertical blur iterations. The
//! result ends in the source slot of the SSAO ping-pong.

use crate::foundation::collections::PingPong;
use crate::foundation::math::Vec2;
use crate::render::api::{IRect, ShaderProgram, TextureHandle};
use crate::render::resources::ColorTarget;
use crate::render::{RenderError, RenderResult};

use super::{PassContext, RenderPass, Resource};

/// Blur direction of iteration `i`, horizontal first
pub fn blur_direction(iteration: u32) -> Vec2 {
    if iteration % 2 == 0 { Vec2::new(1.0, 0.0) } else { Vec2::new(0.0, 1.0) }
}

/// Separable blur over a ping-pong pair
///
/// The first iteration reads `first_source`; every later one reads what the
/// previous iteration wrote. Leaves the last output in the pair's source slot.
pub(crate) fn blur(
    ctx: &mut PassContext<'_>,
    pair: &mut PingPong<ColorTarget>,
    first_source: Option<TextureHandle>,
    iterations: u32,
) -> RenderResult<()> {
    let texel = ctx.texel_size();
    ctx.bind(ShaderProgram::GaussianBlur)?;
    for i in 0..iterations {
        let source = match (i, first_source) {
            (0, Some(texture)) => texture,
            _ => pair.source().color,
        };
        ctx.device.bind_framebuffer(Some(pair.target().framebuffer));
        ctx.set("uTexelDir", blur_direction(i).component_mul(&texel));
        ctx.sampler("uTexture", source);
        ctx.draw_quad();
        pair.flip();
    }
    ctx.unbind();
    Ok(())
}

/// Ambient occlusion and its blur
#[derive(Debug, Clone, Copy, Default)]
pub struct SsaoPass;

impl RenderPass for SsaoPass {
    fn name(&self) -> &'static str {
        "ssao"
    }

    fn reads(&self) -> &'static [Resource] {
        &[Resource::GBuffer, Resource::DepthStencil]
    }

    fn writes(&self) -> &'static [Resource] {
        &[Resource::Ssao]
    }

    fn is_enabled(&self, ctx: &PassContext<'_>) -> bool {
        ctx.environment.ssao.enabled && ctx.draw_calls.has_deferred()
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let Some(mut pair) = ctx.targets.ssao.clone() else {
            return Err(RenderError::RenderingFailed("SSAO targets were not created".to_string()));
        };
        let Some(kernel) = ctx.textures.ssao_kernel else {
            return Err(RenderError::RenderingFailed("SSAO kernel was not created".to_string()));
        };
        let frame = ctx.frame;
        let settings = ctx.environment.ssao;
        let gbuffer = ctx.targets.gbuffer;
        let noise = ctx.textures.noise;
        let (w, h) = ctx.targets.half_resolution();

        ctx.device.bind_framebuffer(Some(pair.target().framebuffer));
        ctx.device.set_viewport(IRect::sized(w, h));
        ctx.device.set_blend(None);
        ctx.device.set_depth_test(false);
        let stencil = ctx.geometry_stencil();
        ctx.device.set_stencil(stencil);

        ctx.bind(ShaderProgram::Ssao)?;
        ctx.set("uMatInvProj", frame.inv_proj);
        ctx.set("uMatInvView", frame.inv_view);
        ctx.set("uMatProj", frame.proj);
        ctx.set("uMatView", frame.view);
        ctx.set("uResolution", Vec2::new(w as f32, h as f32));
        ctx.set("uNear", frame.near);
        ctx.set("uFar", frame.far);
        ctx.set("uRadius", settings.radius);
        ctx.set("uBias", settings.bias);
        ctx.sampler("uTexDepth", gbuffer.depth_stencil);
        ctx.sampler("uTexNormal", gbuffer.normal);
        ctx.sampler("uTexKernel", kernel);
        ctx.sampler("uTexNoise", noise);
        ctx.draw_quad();
        ctx.unbind();
        pair.flip();

        ctx.device.set_stencil(None);
        blur(ctx, &mut pair, None, settings.iterations)?;

        ctx.targets.ssao = Some(pair);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::render::api::{MeshHandle, StencilState, UniformValue};
    use crate::render::backends::DeviceCommand;
    use crate::render::passes::test_support::Fixture;
    use crate::render::primitives::{BoundingBox, Mesh};
    use crate::render::resources::Material;
    use crate::render::systems::drawcall::{DrawCall, RenderPath, UvTransform};
    use crate::render::systems::state::{BlendMode, RenderFlags, ShadowCastMode};

    fn fixture_with_ssao() -> Fixture {
        let mut fixture = Fixture::new(64, 32);
        fixture.environment.ssao.enabled = true;
        fixture.environment.ssao.iterations = 3;
        fixture.targets.ensure_ssao(&mut fixture.device).expect("ssao targets");
        fixture.textures.ensure_ssao_kernel(&mut fixture.device).expect("kernel");
        fixture.shaders.load(&mut fixture.device, ShaderProgram::Ssao).expect("ssao shader");
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
        fixture.device.clear_commands();
        fixture
    }

    #[test]
    fn test_blur_alternates_directions() {
        assert_eq!(blur_direction(0), Vec2::new(1.0, 0.0));
        assert_eq!(blur_direction(1), Vec2::new(0.0, 1.0));
        assert_eq!(blur_direction(2), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_runs_at_half_resolution_and_blurs() {
        let mut fixture = fixture_with_ssao();
        fixture.flags = RenderFlags::STENCIL_TEST;
        assert!(SsaoPass.is_enabled(&fixture.context()));

        SsaoPass.execute(&mut fixture.context()).expect("ssao");

        let commands = fixture.device.commands();
        assert!(commands.contains(&DeviceCommand::SetViewport(IRect::new(0, 0, 32, 16))));
        assert!(commands.contains(&DeviceCommand::SetStencil(Some(StencilState::test_equal(1)))));
        assert_eq!(fixture.device.draws_with(ShaderProgram::Ssao), 1);
        assert_eq!(fixture.device.draws_with(ShaderProgram::GaussianBlur), 3);
        assert_eq!(
            fixture.device.uniform_writes("uTexelDir"),
            vec![
                UniformValue::Vec2(Vec2::new(1.0 / 64.0, 0.0)),
                UniformValue::Vec2(Vec2::new(0.0, 1.0 / 32.0)),
                UniformValue::Vec2(Vec2::new(1.0 / 64.0, 0.0)),
            ]
        );
    }

    #[test]
    fn test_result_lands_in_source_slot() {
        let mut fixture = fixture_with_ssao();
        let start = fixture.targets.ssao.as_ref().map(PingPong::target_index);

        SsaoPass.execute(&mut fixture.context()).expect("ssao");

        // One occlusion draw plus three blur draws flip the pair four times
        assert_eq!(fixture.targets.ssao.as_ref().map(PingPong::target_index), start);
    }

    #[test]
    fn test_disabled_without_deferred_geometry() {
        let mut fixture = Fixture::new(64, 32);
        fixture.environment.ssao.enabled = true;
        assert!(!SsaoPass.is_enabled(&fixture.context()));
    }
}
