//! Software rendering of the scene and frame recording.
//!
//! Bodies are drawn as projected box parts, far to near, with a text caption
//! in the top-left corner. Rendering never fails: drawing errors only lose
//! the affected element.

pub mod camera;
pub mod recording;

pub use camera::CameraView;
pub use recording::Recorder;

use std::sync::OnceLock;

use plotters::backend::BitMapBackend;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};

use crate::constants::*;
use crate::physics::PhysicsEngine;

/// Background color of rendered frames.
const BACKGROUND: [u8; 3] = [30, 30, 38];

/// Family the caption is drawn with.
const CAPTION_FAMILY: &str = "sans-serif";

/// DejaVu Sans, registered as the caption family on first render.
const CAPTION_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Register the bundled caption font once. False if it could not be parsed,
/// in which case captions are skipped.
fn caption_font_ready() -> bool {
    static READY: OnceLock<bool> = OnceLock::new();
    *READY.get_or_init(|| match register_font(CAPTION_FAMILY, FontStyle::Normal, CAPTION_FONT) {
        Ok(()) => true,
        Err(_) => {
            log::warn!("caption font could not be loaded, frames will not be captioned");
            false
        }
    })
}

/// An RGB image.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB bytes, `width * height * 3` long.
    pub rgb: Vec<u8>,
}

impl Frame {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgb: vec![0; (width * height * 3) as usize],
        }
    }
}

/// View and resolution selected by a mode string such as "default",
/// "top", "front_high_res" or "top_high_res".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderMode {
    pub top: bool,
    pub high_res: bool,
}

impl RenderMode {
    pub fn parse(mode: &str) -> Self {
        Self {
            top: mode.contains("top"),
            high_res: mode.contains("high_res"),
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        if self.high_res {
            (RENDER_WIDTH_HIGH_RES, RENDER_HEIGHT_HIGH_RES)
        } else {
            (RENDER_WIDTH, RENDER_HEIGHT)
        }
    }
}

impl Default for RenderMode {
    fn default() -> Self {
        Self::parse("default")
    }
}

/// Scene renderer with a front and a top camera.
#[derive(Clone, Debug)]
pub struct Renderer {
    front: CameraView,
    top: CameraView,
    mode: RenderMode,
    caption: String,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        let aspect = RENDER_WIDTH as f32 / RENDER_HEIGHT as f32;
        Self {
            front: CameraView::front(aspect),
            top: CameraView::top(aspect),
            mode: RenderMode::default(),
            caption: String::new(),
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: &str) {
        self.mode = RenderMode::parse(mode);
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn set_caption(&mut self, caption: impl Into<String>) {
        self.caption = caption.into();
    }

    pub fn camera(&self) -> &CameraView {
        if self.mode.top {
            &self.top
        } else {
            &self.front
        }
    }

    /// Render all enabled bodies from the current view.
    pub fn render<P: PhysicsEngine>(&self, physics: &P) -> Frame {
        let (width, height) = self.mode.resolution();
        let camera = self.camera();

        // (distance, rect, color), drawn far to near.
        let mut boxes: Vec<(f32, [(i32, i32); 2], [u8; 3])> = Vec::new();
        for id in physics.body_ids() {
            let Ok(body) = physics.body(id) else {
                continue;
            };
            if !body.enabled {
                continue;
            }
            for part in body.part_aabbs() {
                let mut projected = Vec::with_capacity(8);
                for corner in 0..8 {
                    let p = [
                        if corner & 1 == 0 { part.min[0] } else { part.max[0] },
                        if corner & 2 == 0 { part.min[1] } else { part.max[1] },
                        if corner & 4 == 0 { part.min[2] } else { part.max[2] },
                    ];
                    if let Some((x, y, _)) = camera.project(p, width, height) {
                        projected.push((x, y));
                    }
                }
                if projected.len() < 8 {
                    continue;
                }
                let x0 = projected.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
                let x1 = projected.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
                let y0 = projected.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
                let y1 = projected.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);
                let distance = camera.distance_to(part.center());
                boxes.push((distance, [(x0 as i32, y0 as i32), (x1 as i32, y1 as i32)], body.color));
            }
        }
        boxes.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut frame = Frame::blank(width, height);
        {
            let root = BitMapBackend::with_buffer(&mut frame.rgb, (width, height)).into_drawing_area();
            let _ = root.fill(&RGBColor(BACKGROUND[0], BACKGROUND[1], BACKGROUND[2]));

            for (_, rect, c) in &boxes {
                let _ = root.draw(&Rectangle::new(*rect, RGBColor(c[0], c[1], c[2]).filled()));
                let _ = root.draw(&Rectangle::new(
                    *rect,
                    RGBColor(c[0] / 2, c[1] / 2, c[2] / 2).stroke_width(1),
                ));
            }

            if !self.caption.is_empty() && caption_font_ready() {
                let font_size = if self.mode.high_res { 40 } else { 14 };
                for (i, line) in self.caption.lines().enumerate() {
                    let _ = root.draw(&Text::new(
                        line.to_string(),
                        (10, 10 + i as i32 * (font_size + 4)),
                        (CAPTION_FAMILY, font_size).into_font().color(&WHITE),
                    ));
                }
            }

            let _ = root.present();
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_mode_parse() {
        assert_eq!(RenderMode::parse("default").resolution(), (RENDER_WIDTH, RENDER_HEIGHT));
        let mode = RenderMode::parse("top_high_res");
        assert!(mode.top);
        assert_eq!(mode.resolution(), (RENDER_WIDTH_HIGH_RES, RENDER_HEIGHT_HIGH_RES));
        assert!(!RenderMode::parse("front_high_res").top);
    }

    #[test]
    fn test_bundled_caption_font_loads() {
        assert!(caption_font_ready());
    }
}
