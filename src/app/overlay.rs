// SPDX-License-Identifier: GPL-3.0-only

//! Detection overlay
//!
//! Outlines every observation of the latest frame in view coordinates.
//!
//! # Coordinate System
//!
//! Observations use normalized coordinates (0.0 to 1.0) with a bottom-left
//! origin. Views have a top-left origin, so each corner maps as
//! `x' = x * width`, `y' = (1 - y) * height`.

use super::frame_processor::{NormalizedPoint, Observation};
use crate::constants::overlay::{
    DEFAULT_VIEW_HEIGHT, DEFAULT_VIEW_WIDTH, LINE_WIDTH, STROKE_COLOR,
};
use image::{Rgba, RgbaImage};

/// Size of the view the overlay is drawn over
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSize {
    pub width: f32,
    pub height: f32,
}

impl ViewSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Default for ViewSize {
    fn default() -> Self {
        Self::new(DEFAULT_VIEW_WIDTH, DEFAULT_VIEW_HEIGHT)
    }
}

/// A point in view coordinates (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewPoint {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(ViewPoint),
    LineTo(ViewPoint),
}

/// Outline of all observations of one frame
///
/// One closed subpath per observation: TL, TR, BR, BL and back to TL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayPath {
    commands: Vec<PathCommand>,
}

impl OverlayPath {
    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Points of each subpath, in drawing order
    pub fn subpaths(&self) -> Vec<Vec<ViewPoint>> {
        let mut subpaths: Vec<Vec<ViewPoint>> = Vec::new();
        for command in &self.commands {
            match command {
                PathCommand::MoveTo(p) => subpaths.push(vec![*p]),
                PathCommand::LineTo(p) => {
                    if let Some(current) = subpaths.last_mut() {
                        current.push(*p);
                    }
                }
            }
        }
        subpaths
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Round,
}

/// Stroke appearance of the overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    /// RGBA stroke color
    pub stroke: [u8; 4],
    pub line_width: f32,
    pub line_join: LineJoin,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            stroke: STROKE_COLOR,
            line_width: LINE_WIDTH,
            line_join: LineJoin::Round,
        }
    }
}

/// Keeps the overlay of the most recent frame
#[derive(Debug, Clone, Default)]
pub struct OverlayRenderer {
    view: ViewSize,
    style: OverlayStyle,
    current: OverlayPath,
}

impl OverlayRenderer {
    pub fn new(view: ViewSize) -> Self {
        Self {
            view,
            ..Default::default()
        }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// Path of the last update
    pub fn path(&self) -> &OverlayPath {
        &self.current
    }

    /// Map a normalized point into the view
    pub fn convert(&self, point: NormalizedPoint) -> ViewPoint {
        ViewPoint {
            x: point.x * self.view.width,
            y: (1.0 - point.y) * self.view.height,
        }
    }

    pub fn build_path(&self, observations: &[Observation]) -> OverlayPath {
        let mut commands = Vec::with_capacity(observations.len() * 5);
        for observation in observations {
            let [tl, tr, br, bl] = observation.corners().map(|p| self.convert(p));
            commands.push(PathCommand::MoveTo(tl));
            commands.push(PathCommand::LineTo(tr));
            commands.push(PathCommand::LineTo(br));
            commands.push(PathCommand::LineTo(bl));
            commands.push(PathCommand::LineTo(tl));
        }
        OverlayPath { commands }
    }

    /// Replace the current overlay with the outlines of `observations`
    pub fn update(&mut self, observations: &[Observation]) -> &OverlayPath {
        self.current = self.build_path(observations);
        &self.current
    }
}

/// Rasterize `path` onto `image`
///
/// The path must be in the image's pixel coordinates, i.e. built by a
/// renderer whose view size matches the image.
pub fn draw_path(image: &mut RgbaImage, path: &OverlayPath, style: &OverlayStyle) {
    let radius = (style.line_width / 2.0).max(0.5);
    for subpath in path.subpaths() {
        for segment in subpath.windows(2) {
            draw_segment(image, segment[0], segment[1], radius, style);
        }
    }
}

fn draw_segment(image: &mut RgbaImage, from: ViewPoint, to: ViewPoint, radius: f32, style: &OverlayStyle) {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as u32;

    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        stamp(image, from.x + dx * t, from.y + dy * t, radius, style);
    }
}

/// Paint a pen footprint centered on (cx, cy)
fn stamp(image: &mut RgbaImage, cx: f32, cy: f32, radius: f32, style: &OverlayStyle) {
    let (width, height) = image.dimensions();
    let color = Rgba(style.stroke);
    let reach = radius.ceil() as i64;
    let (px, py) = (cx.floor() as i64, cy.floor() as i64);

    for oy in -reach..=reach {
        for ox in -reach..=reach {
            let (x, y) = (px + ox, py + oy);
            if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                continue;
            }
            let inside = match style.line_join {
                LineJoin::Round => {
                    let ddx = x as f32 + 0.5 - cx;
                    let ddy = y as f32 + 0.5 - cy;
                    ddx * ddx + ddy * ddy <= radius * radius + 0.5
                }
                LineJoin::Miter => ox.abs() < reach.max(1) && oy.abs() < reach.max(1),
            };
            if inside {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
