//! Post-processing chain
//!
//! Every stage reads the source slot of the post ping-pong, writes the
//! target slot and flips, so the finished image is always in the source
//! slot when the chain ends.

use crate::render::api::{BlitMask, FilterMode, IRect, ShaderProgram, TextureHandle};
use crate::render::systems::environment::{BloomMode, FogMode};
use crate::render::systems::state::RenderFlags;
use crate::render::{RenderError, RenderResult};

use super::ssao::blur;
use super::{PassContext, RenderPass, Resource};

const POST_IO: &[Resource] = &[Resource::Post];

/// Bind the post target for a full-screen stage and return the texture to read
fn begin_stage(ctx: &mut PassContext<'_>, program: ShaderProgram) -> RenderResult<TextureHandle> {
    let post = &ctx.targets.post;
    let (target, source) = (post.target().framebuffer, post.source().color);

    ctx.device.bind_framebuffer(Some(target));
    ctx.full_viewport();
    ctx.device.set_blend(None);
    ctx.device.set_depth_test(false);
    ctx.device.set_stencil(None);
    ctx.bind(program)?;
    Ok(source)
}

fn end_stage(ctx: &mut PassContext<'_>) {
    ctx.draw_quad();
    ctx.unbind();
    ctx.targets.post.flip();
}

/// Copies the scene color into the post chain
#[derive(Debug, Clone, Copy, Default)]
pub struct PostInitPass;

impl RenderPass for PostInitPass {
    fn name(&self) -> &'static str {
        "post_init"
    }

    fn reads(&self) -> &'static [Resource] {
        &[Resource::SceneColor]
    }

    fn writes(&self) -> &'static [Resource] {
        POST_IO
    }

    fn is_enabled(&self, _ctx: &PassContext<'_>) -> bool {
        true
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let (w, h) = ctx.targets.resolution();
        let full = IRect::sized(w, h);
        let scene = ctx.targets.scene.framebuffer;
        let target = ctx.targets.post.target().framebuffer;

        ctx.device.set_stencil(None);
        ctx.device.blit(Some(scene), Some(target), full, full, BlitMask::COLOR, FilterMode::Nearest);
        ctx.targets.post.flip();
        Ok(())
    }
}

/// Blurred highlights merged back into the image
#[derive(Debug, Clone, Copy, Default)]
pub struct BloomPass;

impl RenderPass for BloomPass {
    fn name(&self) -> &'static str {
        "bloom"
    }

    fn reads(&self) -> &'static [Resource] {
        &[Resource::SceneBright, Resource::Post]
    }

    fn writes(&self) -> &'static [Resource] {
        &[Resource::Bloom, Resource::Post]
    }

    fn is_enabled(&self, ctx: &PassContext<'_>) -> bool {
        ctx.environment.bloom.mode != BloomMode::Disabled
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let Some(mut pair) = ctx.targets.bloom.clone() else {
            return Err(RenderError::RenderingFailed("Bloom targets were not created".to_string()));
        };
        let settings = ctx.environment.bloom;
        let bright = ctx.targets.scene.bright;
        let (w, h) = ctx.targets.half_resolution();

        ctx.device.set_viewport(IRect::sized(w, h));
        ctx.device.set_blend(None);
        ctx.device.set_depth_test(false);
        ctx.device.set_stencil(None);
        blur(ctx, &mut pair, Some(bright), settings.iterations)?;
        let blurred = pair.source().color;
        ctx.targets.bloom = Some(pair);

        let source = begin_stage(ctx, ShaderProgram::Bloom)?;
        ctx.sampler("uTexColor", source);
        ctx.sampler("uTexBloomBlur", blurred);
        ctx.set("uBloomMode", settings.mode.shader_index());
        ctx.set("uBloomIntensity", settings.intensity);
        end_stage(ctx);
        Ok(())
    }
}

/// Distance fog from the scene depth
#[derive(Debug, Clone, Copy, Default)]
pub struct FogPass;

impl RenderPass for FogPass {
    fn name(&self) -> &'static str {
        "fog"
    }

    fn reads(&self) -> &'static [Resource] {
        &[Resource::Post, Resource::DepthStencil]
    }

    fn writes(&self) -> &'static [Resource] {
        POST_IO
    }

    fn is_enabled(&self, ctx: &PassContext<'_>) -> bool {
        ctx.environment.fog.mode != FogMode::Disabled
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let frame = ctx.frame;
        let fog = ctx.environment.fog;
        let depth = ctx.targets.gbuffer.depth_stencil;

        let source = begin_stage(ctx, ShaderProgram::Fog)?;
        ctx.sampler("uTexColor", source);
        ctx.sampler("uTexDepth", depth);
        ctx.set("uNear", frame.near);
        ctx.set("uFar", frame.far);
        ctx.set("uFogMode", fog.mode.shader_index());
        ctx.set("uFogColor", fog.color);
        ctx.set("uFogStart", fog.start);
        ctx.set("uFogEnd", fog.end);
        ctx.set("uFogDensity", fog.density);
        end_stage(ctx);
        Ok(())
    }
}

/// HDR to display range
#[derive(Debug, Clone, Copy, Default)]
pub struct TonemapPass;

impl RenderPass for TonemapPass {
    fn name(&self) -> &'static str {
        "tonemap"
    }

    fn reads(&self) -> &'static [Resource] {
        POST_IO
    }

    fn writes(&self) -> &'static [Resource] {
        POST_IO
    }

    fn is_enabled(&self, ctx: &PassContext<'_>) -> bool {
        ctx.environment.tonemap.is_active()
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let tonemap = ctx.environment.tonemap;

        let source = begin_stage(ctx, ShaderProgram::Tonemap)?;
        ctx.sampler("uTexColor", source);
        ctx.set("uTonemapMode", tonemap.mode.shader_index());
        ctx.set("uTonemapExposure", tonemap.exposure);
        ctx.set("uTonemapWhite", tonemap.white);
        end_stage(ctx);
        Ok(())
    }
}

/// Brightness, contrast and saturation
#[derive(Debug, Clone, Copy, Default)]
pub struct AdjustmentPass;

impl RenderPass for AdjustmentPass {
    fn name(&self) -> &'static str {
        "adjustment"
    }

    fn reads(&self) -> &'static [Resource] {
        POST_IO
    }

    fn writes(&self) -> &'static [Resource] {
        POST_IO
    }

    fn is_enabled(&self, _ctx: &PassContext<'_>) -> bool {
        true
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let adjustment = ctx.environment.adjustment;

        let source = begin_stage(ctx, ShaderProgram::Adjustment)?;
        ctx.sampler("uTexColor", source);
        ctx.set("uBrightness", adjustment.brightness);
        ctx.set("uContrast", adjustment.contrast);
        ctx.set("uSaturation", adjustment.saturation);
        end_stage(ctx);
        Ok(())
    }
}

/// Fast approximate anti-aliasing
#[derive(Debug, Clone, Copy, Default)]
pub struct FxaaPass;

impl RenderPass for FxaaPass {
    fn name(&self) -> &'static str {
        "fxaa"
    }

    fn reads(&self) -> &'static [Resource] {
        POST_IO
    }

    fn writes(&self) -> &'static [Resource] {
        POST_IO
    }

    fn is_enabled(&self, ctx: &PassContext<'_>) -> bool {
        ctx.flags.contains(RenderFlags::FXAA)
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let texel = ctx.texel_size();

        let source = begin_stage(ctx, ShaderProgram::Fxaa)?;
        ctx.sampler("uTexture", source);
        ctx.set("uTexelSize", texel);
        end_stage(ctx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec2;
    use crate::render::api::UniformValue;
    use crate::render::backends::DeviceCommand;
    use crate::render::passes::test_support::Fixture;
    use crate::render::systems::environment::TonemapMode;

    #[test]
    fn test_init_copies_scene_and_flips() {
        let mut fixture = Fixture::new(32, 16);
        let scene = fixture.targets.scene.framebuffer;
        let first_target = fixture.targets.post.target().framebuffer;

        PostInitPass.execute(&mut fixture.context()).expect("post_init");

        assert!(fixture.device.commands().contains(&DeviceCommand::Blit {
            src: Some(scene),
            dst: Some(first_target),
            src_rect: IRect::sized(32, 16),
            dst_rect: IRect::sized(32, 16),
            mask: BlitMask::COLOR,
            filter: FilterMode::Nearest,
        }));
        assert_eq!(fixture.targets.post.source().framebuffer, first_target);
    }

    #[test]
    fn test_stages_chain_through_ping_pong() {
        let mut fixture = Fixture::new(32, 16);
        PostInitPass.execute(&mut fixture.context()).expect("post_init");
        let after_init = fixture.targets.post.source().color;

        AdjustmentPass.execute(&mut fixture.context()).expect("adjustment");

        // Adjustment read what init wrote and now its output is the source
        assert!(fixture.device.commands().iter().any(|c| matches!(
            c,
            DeviceCommand::BindTexture { texture: Some(t), .. } if *t == after_init
        )));
        assert_ne!(fixture.targets.post.source().color, after_init);
        assert_eq!(fixture.device.draws_with(ShaderProgram::Adjustment), 1);
    }

    #[test]
    fn test_bloom_blurs_bright_at_half_resolution() {
        let mut fixture = Fixture::new(32, 16);
        fixture.environment.bloom.mode = BloomMode::Additive;
        fixture.environment.bloom.iterations = 4;
        fixture.targets.ensure_bloom(&mut fixture.device).expect("bloom targets");
        fixture.shaders.load(&mut fixture.device, ShaderProgram::Bloom).expect("bloom shader");
        let bright = fixture.targets.scene.bright;
        fixture.device.clear_commands();
        assert!(BloomPass.is_enabled(&fixture.context()));

        BloomPass.execute(&mut fixture.context()).expect("bloom");

        let commands = fixture.device.commands();
        assert!(commands.contains(&DeviceCommand::SetViewport(IRect::sized(16, 8))));
        assert!(commands.iter().any(|c| matches!(
            c,
            DeviceCommand::BindTexture { texture: Some(t), .. } if *t == bright
        )));
        assert_eq!(fixture.device.draws_with(ShaderProgram::GaussianBlur), 4);
        assert_eq!(fixture.device.draws_with(ShaderProgram::Bloom), 1);
        assert_eq!(fixture.device.uniform_writes("uBloomMode"), vec![UniformValue::Int(1)]);
    }

    #[test]
    fn test_bloom_without_targets_fails() {
        let mut fixture = Fixture::new(32, 16);
        fixture.environment.bloom.mode = BloomMode::SoftLight;
        assert!(matches!(
            BloomPass.execute(&mut fixture.context()),
            Err(RenderError::RenderingFailed(_))
        ));
    }

    #[test]
    fn test_optional_stages_follow_settings() {
        let mut fixture = Fixture::new(32, 16);
        assert!(!FogPass.is_enabled(&fixture.context()));
        assert!(!TonemapPass.is_enabled(&fixture.context()));
        assert!(!FxaaPass.is_enabled(&fixture.context()));
        assert!(AdjustmentPass.is_enabled(&fixture.context()));

        fixture.environment.fog.mode = FogMode::Exp2;
        fixture.environment.tonemap.mode = TonemapMode::Aces;
        fixture.flags = RenderFlags::FXAA;
        assert!(FogPass.is_enabled(&fixture.context()));
        assert!(TonemapPass.is_enabled(&fixture.context()));
        assert!(FxaaPass.is_enabled(&fixture.context()));
    }

    #[test]
    fn test_fxaa_texel_size() {
        let mut fixture = Fixture::new(32, 16);
        fixture.shaders.load(&mut fixture.device, ShaderProgram::Fxaa).expect("fxaa shader");

        FxaaPass.execute(&mut fixture.context()).expect("fxaa");

        assert_eq!(
            fixture.device.uniform_writes("uTexelSize"),
            vec![UniformValue::Vec2(Vec2::new(1.0 / 32.0, 1.0 / 16.0))]
        );
    }
}
