//! End-to-end frames driven through a recording device

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::foundation::math::{Mat4, Vec2, Vec3};
    use crate::render::api::{
        BlitMask, FramebufferHandle, IRect, MeshHandle, ShaderProgram, TextureHandle, UniformValue,
    };
    use crate::render::backends::{DeviceCommand, RecordingDevice};
    use crate::render::primitives::BoundingBox;
    use crate::render::resources::{PixelFormat, Texture};
    use crate::render::systems::environment::BloomMode;

    const WIDTH: u32 = 64;
    const HEIGHT: u32 = 32;

    fn renderer() -> Renderer<RecordingDevice> {
        let device = RecordingDevice::new(WIDTH, HEIGHT);
        Renderer::init(device, RendererConfig::new(WIDTH, HEIGHT)).expect("init")
    }

    fn mesh(id: u64) -> Mesh {
        let bounds = BoundingBox::new(Vec3::repeat(-0.5), Vec3::repeat(0.5));
        Mesh::new(MeshHandle(id), 24, 36, bounds)
    }

    fn camera() -> Camera {
        Camera::perspective(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros(), 60.0)
    }

    fn forward_draw_order(device: &RecordingDevice) -> Vec<MeshHandle> {
        device
            .commands()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Draw { mesh, program: Some(ShaderProgram::Forward), .. } => Some(*mesh),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_empty_frame_skips_lighting_and_forward() {
        let mut renderer = renderer();
        renderer.begin(&camera()).expect("begin");
        let stats = renderer.end_with_delta(0.016).expect("end");

        assert_eq!(stats.passes, vec!["geometry", "background", "post_init", "adjustment", "final_blit"]);
        assert!(!renderer.is_frame_active());
    }

    #[test]
    fn test_opaque_frame_runs_deferred_chain_in_order() {
        let mut renderer = renderer();
        let sun = renderer.create_light(LightType::Directional);
        renderer.set_light_active(sun, true);

        renderer.begin(&camera()).expect("begin");
        renderer.draw_mesh(&mesh(500), &Material::default(), &Mat4::identity());
        let stats = renderer.end_with_delta(0.016).expect("end");

        assert_eq!(
            stats.passes,
            vec!["geometry", "lit_env", "lit_obj", "scene", "background", "post_init", "adjustment", "final_blit"]
        );
        assert_eq!(stats.deferred_calls, 1);
        assert_eq!(stats.lights_batched, 1);
    }

    #[test]
    fn test_interval_shadow_refreshes_on_period() {
        let mut renderer = renderer();
        let spot = renderer.create_light(LightType::Spot);
        renderer.set_light_active(spot, true);
        renderer.lights_mut().set_range(spot, 20.0);
        renderer.lights_mut().set_inner_cutoff(spot, 20.0);
        renderer.lights_mut().set_outer_cutoff(spot, 30.0);
        renderer.enable_shadow(spot, 0).expect("shadow map");
        renderer.lights_mut().set_shadow_update_frequency(spot, 100);

        let mut refreshed = Vec::new();
        for _ in 0..7 {
            renderer.begin(&camera()).expect("begin");
            renderer.draw_mesh(&mesh(500), &Material::default(), &Mat4::identity());
            refreshed.push(renderer.end_with_delta(0.016).expect("end").shadow_maps_updated);
        }

        // Rendered on enable, then again once 100ms have accumulated
        assert_eq!(refreshed, vec![1, 0, 0, 0, 0, 0, 1]);
        assert!(refreshed[..5].iter().sum::<usize>() <= 2);
    }

    #[test]
    fn test_translucent_meshes_go_forward_back_to_front() {
        let mut renderer = renderer();
        let glass = Material::colored(Color::new(255, 255, 255, 128));

        renderer.begin(&camera()).expect("begin");
        renderer.draw_mesh(&mesh(601), &glass, &Mat4::new_translation(&Vec3::new(0.0, 0.0, 5.0)));
        renderer.draw_mesh(&mesh(602), &glass, &Mat4::new_translation(&Vec3::new(0.0, 0.0, -5.0)));
        renderer.device_mut().clear_commands();
        let stats = renderer.end_with_delta(0.016).expect("end");

        assert_eq!(stats.forward_calls, 2);
        assert_eq!(stats.deferred_calls, 0);
        assert!(stats.ran("forward"));
        assert!(!stats.ran("lit_obj"));
        assert_eq!(forward_draw_order(renderer.device()), vec![MeshHandle(602), MeshHandle(601)]);
    }

    #[test]
    fn test_forced_deferred_mode_overrides_alpha() {
        let mut renderer = renderer();
        renderer.set_render_mode(RenderMode::Deferred);

        renderer.begin(&camera()).expect("begin");
        renderer.draw_mesh(&mesh(601), &Material::colored(Color::new(255, 0, 0, 10)), &Mat4::identity());
        let stats = renderer.end_with_delta(0.016).expect("end");

        assert_eq!(stats.deferred_calls, 1);
        assert_eq!(stats.forward_calls, 0);
    }

    #[test]
    fn test_offscreen_omni_is_not_batched() {
        let mut renderer = renderer();
        let sun = renderer.create_light(LightType::Directional);
        let lamp = renderer.create_light(LightType::Omni);
        renderer.set_light_active(sun, true);
        renderer.set_light_active(lamp, true);
        renderer.lights_mut().set_position(lamp, Vec3::new(0.0, 0.0, 500.0));
        renderer.lights_mut().set_range(lamp, 5.0);

        renderer.begin(&camera()).expect("begin");
        renderer.draw_mesh(&mesh(500), &Material::default(), &Mat4::identity());
        renderer.device_mut().clear_commands();
        let stats = renderer.end_with_delta(0.016).expect("end");

        assert_eq!(stats.lights_batched, 1);
        // Only the directional type reaches the accumulation shader
        assert_eq!(renderer.device().uniform_writes("uLight.type"), vec![UniformValue::Int(0)]);
    }

    #[test]
    fn test_resolution_change_recreates_targets() {
        let mut renderer = renderer();
        let old_albedo = renderer.targets().gbuffer.albedo;
        let textures_before = renderer.device().live_texture_count();
        let framebuffers_before = renderer.device().live_framebuffer_count();

        renderer.update_resolution(128, 64).expect("resize");

        let device = renderer.device();
        assert_eq!(renderer.resolution(), (128, 64));
        assert_eq!(device.texture_desc(old_albedo), None);
        let albedo = device.texture_desc(renderer.targets().gbuffer.albedo).expect("albedo");
        assert_eq!((albedo.width, albedo.height), (128, 64));
        assert_eq!(device.live_texture_count(), textures_before);
        assert_eq!(device.live_framebuffer_count(), framebuffers_before);
        assert_eq!(renderer.config().width, 128);
    }

    #[test]
    fn test_invalid_or_same_resolution_is_ignored() {
        let mut renderer = renderer();
        renderer.device_mut().clear_commands();

        renderer.update_resolution(0, 64).expect("zero");
        renderer.update_resolution(WIDTH, HEIGHT).expect("same");

        assert!(renderer.device().commands().is_empty());
        assert_eq!(renderer.resolution(), (WIDTH, HEIGHT));
    }

    #[test]
    fn test_failed_resize_leaves_renderer_usable() {
        let mut renderer = renderer();
        let albedo = renderer.targets().gbuffer.albedo;
        let live = renderer.device().live_texture_count();

        renderer.device_mut().limit_texture_creation(Some(4));
        assert!(matches!(
            renderer.update_resolution(128, 64),
            Err(RenderError::ResourceCreationFailed(_))
        ));
        renderer.device_mut().limit_texture_creation(None);

        assert_eq!(renderer.resolution(), (WIDTH, HEIGHT));
        assert_eq!(renderer.config().width, WIDTH);
        assert!(renderer.device().texture_desc(albedo).is_some());
        assert_eq!(renderer.device().live_texture_count(), live);

        renderer.begin(&camera()).expect("begin");
        renderer.draw_mesh(&mesh(500), &Material::default(), &Mat4::identity());
        assert!(renderer.end_with_delta(0.016).is_ok());

        let device = renderer.close();
        assert_eq!(device.redundant_release_count(), 0);
        assert_eq!(device.live_texture_count(), 0);
        assert_eq!(device.live_framebuffer_count(), 0);
    }

    #[test]
    fn test_frame_bracket_errors() {
        let mut renderer = renderer();
        assert!(matches!(renderer.end_with_delta(0.0), Err(RenderError::FrameNotBegun)));

        renderer.begin(&camera()).expect("begin");
        assert!(matches!(renderer.begin(&camera()), Err(RenderError::FrameAlreadyBegun)));
        assert!(renderer.end_with_delta(0.0).is_ok());
    }

    #[test]
    fn test_init_rejects_incomplete_framebuffers() {
        let device = RecordingDevice::new(WIDTH, HEIGHT).with_incomplete_framebuffers();
        let result = Renderer::init(device, RendererConfig::new(WIDTH, HEIGHT));
        assert!(matches!(result, Err(RenderError::InitializationFailed(_))));
    }

    #[test]
    fn test_init_reports_shader_link_failure() {
        let device = RecordingDevice::new(WIDTH, HEIGHT).with_failing_shader(ShaderProgram::Geometry);
        let result = Renderer::init(device, RendererConfig::new(WIDTH, HEIGHT));
        assert!(matches!(result, Err(RenderError::ResourceCreationFailed(_))));
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let config = RendererConfig::new(WIDTH, HEIGHT).with_clip_planes(10.0, 1.0);
        let result = Renderer::init(RecordingDevice::new(WIDTH, HEIGHT), config);
        assert!(matches!(result, Err(RenderError::Config(_))));
    }

    #[test]
    fn test_custom_render_target_receives_final_blit() {
        let mut renderer = renderer();
        let target = RenderTarget { framebuffer: FramebufferHandle(9000), width: 32, height: 32 };
        renderer.set_render_target(Some(target));

        renderer.begin(&camera()).expect("begin");
        renderer.device_mut().clear_commands();
        renderer.end_with_delta(0.016).expect("end");

        let color_blit = renderer.device().commands().iter().find_map(|c| match c {
            DeviceCommand::Blit { dst, mask, .. } if *mask == BlitMask::COLOR => Some(*dst),
            _ => None,
        });
        assert_eq!(color_blit, Some(Some(FramebufferHandle(9000))));
    }

    #[test]
    fn test_debug_buffer_drawn_to_screen() {
        let mut renderer = renderer();
        let albedo = renderer.targets().gbuffer.albedo;
        let rect = IRect::new(0, 0, 16, 8);
        renderer.device_mut().clear_commands();

        renderer.draw_debug_buffer(DebugBuffer::Albedo, rect);
        renderer.draw_debug_buffer(DebugBuffer::Ssao, rect);

        assert_eq!(
            renderer.device().commands(),
            &[DeviceCommand::BindFramebuffer(None), DeviceCommand::DrawTexture { texture: albedo, dst_rect: rect }]
        );
    }

    #[test]
    fn test_submission_outside_frame_is_ignored() {
        let mut renderer = renderer();
        renderer.draw_mesh(&mesh(500), &Material::default(), &Mat4::identity());
        renderer.draw_mesh_instanced(&mesh(500), &Material::default(), &[Mat4::identity()]);

        renderer.begin(&camera()).expect("begin");
        let stats = renderer.end_with_delta(0.016).expect("end");
        assert_eq!(stats.deferred_calls + stats.deferred_instanced_calls, 0);
    }

    #[test]
    fn test_instanced_colors_must_match_count() {
        let mut renderer = renderer();
        let transforms = [Mat4::identity(), Mat4::new_translation(&Vec3::x())];

        renderer.begin(&camera()).expect("begin");
        renderer.draw_mesh_instanced_ex(&mesh(500), &Material::default(), &transforms, &[Color::WHITE]);
        renderer.draw_mesh_instanced(&mesh(501), &Material::default(), &[]);
        renderer.device_mut().clear_commands();
        let stats = renderer.end_with_delta(0.016).expect("end");

        assert_eq!(stats.deferred_instanced_calls, 1);
        let colored = renderer.device().commands().iter().any(|c| {
            matches!(c, DeviceCommand::DrawInstanced { colored: true, .. })
        });
        assert!(!colored);
    }

    fn sprite_sheet(format: PixelFormat) -> Sprite {
        Sprite::new(Texture::new(TextureHandle(700), 128, 64, format), 4, 2)
    }

    #[test]
    fn test_sprites_are_classified_by_sheet_format() {
        let mut renderer = renderer();
        let opaque = sprite_sheet(PixelFormat::R8G8B8);
        let cutout = sprite_sheet(PixelFormat::R8G8B8A8);

        renderer.begin(&camera()).expect("begin");
        renderer.draw_sprite(&opaque, Vec3::zeros());
        renderer.draw_sprite(&cutout, Vec3::new(1.0, 0.0, 0.0));
        let stats = renderer.end_with_delta(0.016).expect("end");

        assert_eq!(stats.deferred_calls, 1);
        assert_eq!(stats.forward_calls, 1);
    }

    #[test]
    fn test_sprite_uploads_current_frame() {
        let mut renderer = renderer();
        let mut sprite = sprite_sheet(PixelFormat::R8G8B8);
        sprite.update(5.0);

        renderer.begin(&camera()).expect("begin");
        renderer.draw_sprite_ex(&sprite, Vec3::zeros(), Vec2::new(-2.0, 2.0), 0.0);
        renderer.device_mut().clear_commands();
        renderer.end_with_delta(0.016).expect("end");

        // Frame 5 is column 1 of row 1, mirrored horizontally
        let device = renderer.device();
        assert_eq!(device.uniform_writes("uTexCoordScale"), vec![UniformValue::Vec2(Vec2::new(-0.25, 0.5))]);
        assert_eq!(device.uniform_writes("uTexCoordOffset"), vec![UniformValue::Vec2(Vec2::new(-0.25, 0.5))]);
    }

    #[test]
    fn test_billboarded_sprite_faces_camera() {
        let mut renderer = renderer();
        renderer.set_billboard_mode(BillboardMode::Front);
        let sprite = sprite_sheet(PixelFormat::R8G8B8);

        renderer.begin(&camera()).expect("begin");
        renderer.draw_sprite_ex(&sprite, Vec3::new(0.0, 1.0, 0.0), Vec2::new(2.0, 4.0), 90.0);
        renderer.device_mut().clear_commands();
        renderer.end_with_delta(0.016).expect("end");

        let models = renderer.device().uniform_writes("uMatModel");
        let Some(UniformValue::Mat4(model)) = models.first() else {
            panic!("no model matrix uploaded");
        };
        // The Y rotation is replaced by the camera orientation, sizes are kept
        approx::assert_relative_eq!(model.fixed_view::<3, 1>(0, 0).into_owned(), Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
        approx::assert_relative_eq!(model.fixed_view::<3, 1>(0, 1).into_owned(), Vec3::new(0.0, 2.0, 0.0), epsilon = 1e-5);
        approx::assert_relative_eq!(model.fixed_view::<3, 1>(0, 3).into_owned(), Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_sprite_outside_frame_is_ignored() {
        let mut renderer = renderer();
        renderer.draw_sprite(&sprite_sheet(PixelFormat::R8G8B8), Vec3::zeros());

        renderer.begin(&camera()).expect("begin");
        let stats = renderer.end_with_delta(0.016).expect("end");
        assert_eq!(stats.deferred_calls + stats.forward_calls, 0);
    }

    #[test]
    fn test_model_parts_become_draw_calls() {
        let mut renderer = renderer();
        let model = Model::new(
            vec![mesh(700), mesh(701)],
            vec![Material::default(), Material::colored(Color::new(0, 0, 255, 100))],
            vec![0, 1],
        );

        renderer.begin(&camera()).expect("begin");
        renderer.draw_model(&model, Vec3::new(0.0, 1.0, 0.0), 2.0);
        let stats = renderer.end_with_delta(0.016).expect("end");

        assert_eq!(stats.deferred_calls, 1);
        assert_eq!(stats.forward_calls, 1);
    }

    #[test]
    fn test_optional_features_allocate_lazily() {
        let mut renderer = renderer();
        assert!(renderer.targets().bloom.is_none());
        assert!(!renderer.device().is_program_loaded(ShaderProgram::Bloom));

        renderer.environment_mut().bloom.mode = BloomMode::Additive;
        renderer.environment_mut().ssao.enabled = true;
        renderer.set_flags(RenderFlags::FXAA);

        renderer.begin(&camera()).expect("begin");
        renderer.draw_mesh(&mesh(500), &Material::default(), &Mat4::identity());
        let stats = renderer.end_with_delta(0.016).expect("end");

        assert!(renderer.targets().bloom.is_some());
        assert!(renderer.targets().ssao.is_some());
        assert!(renderer.device().is_program_loaded(ShaderProgram::Fxaa));
        assert!(stats.ran("ssao"));
        assert!(stats.ran("bloom"));
        assert!(stats.ran("fxaa"));
    }

    #[test]
    fn test_close_releases_everything() {
        let mut renderer = renderer();
        let spot = renderer.create_light(LightType::Spot);
        renderer.enable_shadow(spot, 64).expect("shadow map");
        renderer.environment_mut().bloom.mode = BloomMode::SoftLight;
        renderer.begin(&camera()).expect("begin");
        renderer.end_with_delta(0.016).expect("end");

        let device = renderer.close();
        assert_eq!(device.live_texture_count(), 0);
        assert_eq!(device.live_framebuffer_count(), 0);
        assert_eq!(device.live_shader_count(), 0);
        assert_eq!(device.live_mesh_count(), 0);
    }

    #[test]
    fn test_destroyed_light_frees_its_map() {
        let mut renderer = renderer();
        let lamp = renderer.create_light(LightType::Omni);
        let before = renderer.device().live_texture_count();
        renderer.enable_shadow(lamp, 32).expect("shadow map");
        assert!(renderer.device().live_texture_count() > before);

        assert!(renderer.destroy_light(lamp));
        assert!(!renderer.is_light_exist(lamp));
        assert_eq!(renderer.device().live_texture_count(), before);
    }
}
