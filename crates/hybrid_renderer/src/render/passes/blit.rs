//! Final blit and device state reset

use crate::render::api::{
    to_i32, BlendFunc, BlitMask, CullFace, DepthFunc, FilterMode, GraphicsDevice, IRect,
};
use crate::render::systems::state::RenderFlags;
use crate::render::RenderResult;

use super::{PassContext, RenderPass, Resource};

/// Destination rectangle of the final blit
///
/// With `keep_aspect`, the source aspect ratio is preserved by centering
/// the image with bars on the top and bottom (letterbox) or on the sides
/// (pillarbox). Otherwise the whole destination is covered.
pub fn letterbox(src: (u32, u32), dst: (u32, u32), keep_aspect: bool) -> IRect {
    let full = IRect::sized(dst.0, dst.1);
    if !keep_aspect || src.0 == 0 || src.1 == 0 || dst.0 == 0 || dst.1 == 0 {
        return full;
    }

    let src_ratio = src.0 as f32 / src.1 as f32;
    let dst_ratio = dst.0 as f32 / dst.1 as f32;
    let (dst_w, dst_h) = (to_i32(dst.0), to_i32(dst.1));

    if src_ratio > dst_ratio {
        let height = (dst.0 as f32 / src_ratio).round() as i32;
        IRect::new(0, (dst_h - height) / 2, dst_w, height)
    } else {
        let width = (dst.1 as f32 * src_ratio).round() as i32;
        IRect::new((dst_w - width) / 2, 0, width, dst_h)
    }
}

/// Leave the device in the state unrelated drawing expects after a frame
pub fn reset_device_state(device: &mut dyn GraphicsDevice) {
    let (w, h) = device.screen_size();
    device.bind_framebuffer(None);
    device.set_viewport(IRect::sized(w, h));
    device.set_blend(Some(BlendFunc::ALPHA));
    device.set_cull_face(Some(CullFace::Back));
    device.set_depth_test(false);
    device.set_depth_func(DepthFunc::LessEqual);
    device.set_depth_write(true);
    device.set_stencil(None);
    device.set_color_mask(true);
}

/// Copies the finished image and the scene depth to the destination
#[derive(Debug, Clone, Copy, Default)]
pub struct FinalBlitPass;

impl RenderPass for FinalBlitPass {
    fn name(&self) -> &'static str {
        "final_blit"
    }

    fn reads(&self) -> &'static [Resource] {
        &[Resource::Post, Resource::DepthStencil]
    }

    fn writes(&self) -> &'static [Resource] {
        &[Resource::Output]
    }

    fn is_enabled(&self, _ctx: &PassContext<'_>) -> bool {
        true
    }

    fn execute(&self, ctx: &mut PassContext<'_>) -> RenderResult<()> {
        let resolution = ctx.targets.resolution();
        let (dst, dst_size) = match ctx.output {
            Some(target) => (Some(target.framebuffer), (target.width, target.height)),
            None => (None, ctx.device.screen_size()),
        };
        let src_rect = IRect::sized(resolution.0, resolution.1);
        let dst_rect = letterbox(resolution, dst_size, ctx.flags.contains(RenderFlags::ASPECT_KEEP));
        let filter = if ctx.flags.contains(RenderFlags::BLIT_LINEAR) {
            FilterMode::Linear
        } else {
            FilterMode::Nearest
        };

        let color = ctx.targets.post.source().framebuffer;
        let depth = ctx.targets.gbuffer.framebuffer;

        ctx.device.set_stencil(None);
        ctx.device.blit(Some(color), dst, src_rect, dst_rect, BlitMask::COLOR, filter);
        ctx.device.blit(Some(depth), dst, src_rect, dst_rect, BlitMask::DEPTH, FilterMode::Nearest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{FramebufferHandle, RenderTarget};
    use crate::render::backends::DeviceCommand;
    use crate::render::passes::test_support::Fixture;

    fn blits(fixture: &Fixture) -> Vec<DeviceCommand> {
        fixture
            .device
            .commands()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::Blit { .. }))
            .cloned()
            .collect()
    }

    #[test]
    fn test_letterbox_wide_source() {
        // 2:1 into 1:1 leaves bars above and below
        assert_eq!(letterbox((200, 100), (100, 100), true), IRect::new(0, 25, 100, 50));
    }

    #[test]
    fn test_pillarbox_tall_source() {
        assert_eq!(letterbox((100, 200), (100, 100), true), IRect::new(25, 0, 50, 100));
    }

    #[test]
    fn test_stretch_without_aspect_flag() {
        assert_eq!(letterbox((200, 100), (100, 100), false), IRect::sized(100, 100));
        assert_eq!(letterbox((0, 100), (100, 100), true), IRect::sized(100, 100));
    }

    #[test]
    fn test_blits_color_then_depth_to_screen() {
        let mut fixture = Fixture::new(64, 32);
        let color = fixture.targets.post.source().framebuffer;
        let depth = fixture.targets.gbuffer.framebuffer;

        FinalBlitPass.execute(&mut fixture.context()).expect("blit");

        assert_eq!(
            blits(&fixture),
            vec![
                DeviceCommand::Blit {
                    src: Some(color),
                    dst: None,
                    src_rect: IRect::sized(64, 32),
                    dst_rect: IRect::sized(64, 32),
                    mask: BlitMask::COLOR,
                    filter: FilterMode::Nearest,
                },
                DeviceCommand::Blit {
                    src: Some(depth),
                    dst: None,
                    src_rect: IRect::sized(64, 32),
                    dst_rect: IRect::sized(64, 32),
                    mask: BlitMask::DEPTH,
                    filter: FilterMode::Nearest,
                },
            ]
        );
    }

    #[test]
    fn test_custom_target_with_aspect_and_linear_filter() {
        let mut fixture = Fixture::new(64, 32);
        fixture.flags = RenderFlags::ASPECT_KEEP | RenderFlags::BLIT_LINEAR;
        fixture.output = Some(RenderTarget { framebuffer: FramebufferHandle(9000), width: 32, height: 32 });

        FinalBlitPass.execute(&mut fixture.context()).expect("blit");

        let recorded = blits(&fixture);
        assert!(matches!(
            recorded[0],
            DeviceCommand::Blit { dst: Some(FramebufferHandle(9000)), filter: FilterMode::Linear, dst_rect, .. }
                if dst_rect == IRect::new(0, 8, 32, 16)
        ));
        assert!(matches!(recorded[1], DeviceCommand::Blit { filter: FilterMode::Nearest, .. }));
    }

    #[test]
    fn test_reset_restores_baseline() {
        let mut fixture = Fixture::new(64, 32);
        reset_device_state(&mut fixture.device);

        let commands = fixture.device.commands();
        assert!(commands.contains(&DeviceCommand::BindFramebuffer(None)));
        assert!(commands.contains(&DeviceCommand::SetBlend(Some(BlendFunc::ALPHA))));
        assert!(commands.contains(&DeviceCommand::SetCullFace(Some(CullFace::Back))));
        assert!(commands.contains(&DeviceCommand::SetDepthTest(false)));
    }
}
