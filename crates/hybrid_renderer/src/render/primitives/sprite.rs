//! Animated sprite sheets
//!
//! A sprite is a texture cut into a grid of equally sized frames, drawn as
//! a textured quad. Frames are numbered row by row from the top-left cell.
//! The current frame is fractional so that playback speed is independent
//! of the frame rate the application updates at.

use crate::foundation::math::{utils, Vec2};
use crate::render::resources::{Material, Texture};
use crate::render::systems::drawcall::UvTransform;

use super::frustum::ScreenRect;

/// A texture divided into animation frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    /// Surface the quad is drawn with, albedo holds the sheet
    pub material: Material,
    /// Frame size in texels
    pub frame_size: Vec2,
    /// Frames per row
    pub columns: u32,
    /// Frames per column
    pub rows: u32,
    /// Playback position, the integer part is the shown frame
    pub current_frame: f32,
}

impl Sprite {
    /// Cut `texture` into `columns` by `rows` frames
    ///
    /// Zero counts are raised to one with a warning.
    pub fn new(texture: Texture, columns: u32, rows: u32) -> Self {
        if columns == 0 || rows == 0 {
            log::warn!("Sprite: {}x{} frame grid is empty, using at least one frame per axis", columns, rows);
        }
        let columns = columns.max(1);
        let rows = rows.max(1);

        let mut material = Material::default().with_albedo_texture(texture);
        material.orm.occlusion = 1.0;

        #[allow(clippy::cast_precision_loss)]
        let frame_size = Vec2::new(
            (texture.width / columns) as f32,
            (texture.height / rows) as f32,
        );

        Self { material, frame_size, columns, rows, current_frame: 0.0 }
    }

    /// Total number of frames in the sheet
    pub const fn frame_count(&self) -> u32 {
        self.columns * self.rows
    }

    /// Advance through every frame, wrapping at the end
    ///
    /// `speed` is in frames per call; negative values play backwards.
    pub fn update(&mut self, speed: f32) {
        self.update_range(0, self.frame_count(), speed);
    }

    /// Advance within frames `first..last`, wrapping at the ends
    #[allow(clippy::cast_precision_loss)]
    pub fn update_range(&mut self, first: u32, last: u32, speed: f32) {
        self.current_frame = utils::wrap(self.current_frame + speed, first as f32, last as f32);
    }

    /// Index of the frame currently shown
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn frame_index(&self) -> u32 {
        (self.current_frame.max(0.0) as u32) % self.frame_count()
    }

    /// Column and row of the current frame
    pub fn frame_cell(&self) -> (u32, u32) {
        let index = self.frame_index();
        (index % self.columns, index / self.columns)
    }

    /// Top-left texel of the current frame
    #[allow(clippy::cast_precision_loss)]
    pub fn current_frame_coord(&self) -> Vec2 {
        let (x, y) = self.frame_cell();
        Vec2::new(x as f32 * self.frame_size.x, y as f32 * self.frame_size.y)
    }

    /// Texel rectangle of the current frame
    pub fn current_frame_rect(&self) -> ScreenRect {
        let coord = self.current_frame_coord();
        ScreenRect::new(coord.x, coord.y, self.frame_size.x, self.frame_size.y)
    }

    /// Texture coordinate transform selecting the current frame
    ///
    /// `mirror_x` and `mirror_y` flip the frame on that axis.
    #[allow(clippy::cast_precision_loss)]
    pub fn uv_transform(&self, mirror_x: bool, mirror_y: bool) -> UvTransform {
        let sign = |mirror: bool| if mirror { -1.0 } else { 1.0 };
        let scale = Vec2::new(sign(mirror_x) / self.columns as f32, sign(mirror_y) / self.rows as f32);
        let (x, y) = self.frame_cell();
        UvTransform { offset: Vec2::new(x as f32 * scale.x, y as f32 * scale.y), scale }
    }
}
