//! Drawing targets for the stereo field renderer.
//!
//! [`Surface`] is the small set of 2D operations the renderer needs. Two
//! implementations ship with the crate: [`Framebuffer`], a software RGB
//! rasteriser used for headless rendering, and [`DrawList`], which records
//! calls so tests can assert on what was drawn.

use super::color::{Rgb, Rgba};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

pub trait Surface {
    /// Size of the pixel store being drawn into.
    fn backing_size(&self) -> (u32, u32);
    /// Size the surface is currently shown at.
    fn display_size(&self) -> (u32, u32);
    fn resize_backing(&mut self, width: u32, height: u32);
    /// Blends `color` over the whole surface.
    fn fill(&mut self, color: Rgba);
    fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba);
    /// Open polyline through `points`. Segment `i` (from `points[i]` to
    /// `points[i + 1]`) is stroked with `colors[i]`, falling back to the last
    /// colour when `colors` is shorter.
    fn stroke_polyline(&mut self, points: &[Point], colors: &[Rgb], width: f32);
}

/// Software rasteriser over an RGB pixel grid.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    display: (u32, u32),
    pixels: Vec<Rgb>,
}

impl Framebuffer {
    /// Black framebuffer whose display size matches its backing size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            display: (width, height),
            pixels: vec![Rgb::BLACK; width as usize * height as usize],
        }
    }

    /// Records a new on-screen size; the backing store follows once the
    /// renderer handles the resize.
    pub fn set_display_size(&mut self, width: u32, height: u32) {
        self.display = (width, height);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(self.index(x, y)).copied()
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// Binary PPM (P6) encoding of the current contents.
    pub fn to_ppm(&self) -> Vec<u8> {
        let header = format!("P6\n{} {}\n255\n", self.width, self.height);
        let mut out = Vec::with_capacity(header.len() + self.pixels.len() * 3);
        out.extend_from_slice(header.as_bytes());
        for pixel in &self.pixels {
            out.extend_from_slice(&[pixel.r, pixel.g, pixel.b]);
        }
        out
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn blend(&mut self, x: i64, y: i64, color: Rgba) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let index = self.index(x as u32, y as u32);
        let dst = &mut self.pixels[index];
        *dst = Rgb::new(
            mix(dst.r, color.color.r, color.alpha),
            mix(dst.g, color.color.g, color.alpha),
            mix(dst.b, color.color.b, color.alpha),
        );
    }
}

/// Truncating blend so repeated translucent fills decay all the way to the
/// fill colour.
fn mix(dst: u8, src: u8, alpha: f32) -> u8 {
    let value = f32::from(dst) * (1.0 - alpha) + f32::from(src) * alpha;
    value.clamp(0.0, 255.0) as u8
}

impl Surface for Framebuffer {
    fn backing_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn display_size(&self) -> (u32, u32) {
        self.display
    }

    fn resize_backing(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels
            .resize(width as usize * height as usize, Rgb::BLACK);
    }

    fn fill(&mut self, color: Rgba) {
        if color.alpha >= 1.0 {
            self.pixels.fill(color.color);
            return;
        }
        for pixel in &mut self.pixels {
            *pixel = Rgb::new(
                mix(pixel.r, color.color.r, color.alpha),
                mix(pixel.g, color.color.g, color.alpha),
                mix(pixel.b, color.color.b, color.alpha),
            );
        }
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba) {
        if !center.x.is_finite() || !center.y.is_finite() || radius <= 0.0 {
            return;
        }

        let min_x = (center.x - radius).floor() as i64;
        let max_x = (center.x + radius).ceil() as i64;
        let min_y = (center.y - radius).floor() as i64;
        let max_y = (center.y + radius).ceil() as i64;
        let radius_sq = radius * radius;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f32 + 0.5 - center.x;
                let dy = y as f32 + 0.5 - center.y;
                if dx * dx + dy * dy <= radius_sq {
                    self.blend(x, y, color);
                }
            }
        }
    }

    fn stroke_polyline(&mut self, points: &[Point], colors: &[Rgb], width: f32) {
        let Some(fallback) = colors.last().copied() else {
            return;
        };

        for (index, segment) in points.windows(2).enumerate() {
            let color = colors.get(index).copied().unwrap_or(fallback).opaque();
            let (from, to) = (segment[0], segment[1]);
            if !(from.x.is_finite() && from.y.is_finite() && to.x.is_finite() && to.y.is_finite()) {
                continue;
            }

            let steps = (to.x - from.x).abs().max((to.y - from.y).abs()).ceil().max(1.0) as usize;
            for step in 0..=steps {
                let t = step as f32 / steps as f32;
                let x = from.x + (to.x - from.x) * t;
                let y = from.y + (to.y - from.y) * t;
                if width > 1.0 {
                    self.fill_circle(Point::new(x, y), width / 2.0, color);
                } else {
                    self.blend(x.floor() as i64, y.floor() as i64, color);
                }
            }
        }
    }
}

/// One recorded [`Surface`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Fill(Rgba),
    Circle {
        center: Point,
        radius: f32,
        color: Rgba,
    },
    Polyline {
        points: Vec<Point>,
        colors: Vec<Rgb>,
        width: f32,
    },
    Resize {
        width: u32,
        height: u32,
    },
}

/// Surface that records every call instead of drawing.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    backing: (u32, u32),
    display: (u32, u32),
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            backing: (width, height),
            display: (width, height),
            commands: Vec::new(),
        }
    }

    pub fn set_display_size(&mut self, width: u32, height: u32) {
        self.display = (width, height);
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn circles(&self) -> impl Iterator<Item = (Point, f32, Rgba)> + '_ {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Circle {
                center,
                radius,
                color,
            } => Some((*center, *radius, *color)),
            _ => None,
        })
    }

    pub fn polylines(&self) -> impl Iterator<Item = &[Point]> + '_ {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Polyline { points, .. } => Some(points.as_slice()),
            _ => None,
        })
    }
}

impl Surface for DrawList {
    fn backing_size(&self) -> (u32, u32) {
        self.backing
    }

    fn display_size(&self) -> (u32, u32) {
        self.display
    }

    fn resize_backing(&mut self, width: u32, height: u32) {
        self.backing = (width, height);
        self.commands.push(DrawCommand::Resize { width, height });
    }

    fn fill(&mut self, color: Rgba) {
        self.commands.push(DrawCommand::Fill(color));
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba) {
        self.commands.push(DrawCommand::Circle {
            center,
            radius,
            color,
        });
    }

    fn stroke_polyline(&mut self, points: &[Point], colors: &[Rgb], width: f32) {
        self.commands.push(DrawCommand::Polyline {
            points: points.to_vec(),
            colors: colors.to_vec(),
            width,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translucent_fill_fades_to_black() {
        let mut frame = Framebuffer::new(2, 2);
        frame.fill(Rgb::GREEN.opaque());
        for _ in 0..16 {
            frame.fill(Rgb::BLACK.with_alpha(0.5));
        }
        assert_eq!(frame.pixel(0, 0), Some(Rgb::BLACK));
    }

    #[test]
    fn half_alpha_fill_halves_brightness() {
        let mut frame = Framebuffer::new(1, 1);
        frame.fill(Rgb::new(200, 100, 0).opaque());
        frame.fill(Rgb::BLACK.with_alpha(0.5));
        assert_eq!(frame.pixel(0, 0), Some(Rgb::new(100, 50, 0)));
    }

    #[test]
    fn circle_covers_center_and_clips_at_edges() {
        let mut frame = Framebuffer::new(10, 10);
        frame.fill_circle(Point::new(5.0, 5.0), 2.0, Rgb::GREEN.opaque());
        assert_eq!(frame.pixel(5, 5), Some(Rgb::GREEN));
        assert_eq!(frame.pixel(0, 0), Some(Rgb::BLACK));

        frame.fill_circle(Point::new(-1.0, -1.0), 3.0, Rgb::GREEN.opaque());
        assert_eq!(frame.pixel(0, 0), Some(Rgb::GREEN));
    }

    #[test]
    fn polyline_connects_points_without_closing() {
        let mut frame = Framebuffer::new(10, 10);
        let points = [Point::new(1.5, 1.5), Point::new(8.5, 1.5), Point::new(8.5, 8.5)];
        frame.stroke_polyline(&points, &[Rgb::GREEN], 1.0);

        assert_eq!(frame.pixel(4, 1), Some(Rgb::GREEN));
        assert_eq!(frame.pixel(8, 5), Some(Rgb::GREEN));
        // No segment back from the last point to the first.
        assert_eq!(frame.pixel(5, 5), Some(Rgb::BLACK));
    }

    #[test]
    fn resize_replaces_backing_store() {
        let mut frame = Framebuffer::new(4, 4);
        frame.set_display_size(8, 2);
        assert_eq!(frame.backing_size(), (4, 4));
        frame.resize_backing(8, 2);
        assert_eq!(frame.backing_size(), (8, 2));
        assert_eq!(frame.pixels().len(), 16);
        assert_eq!(frame.pixel(7, 1), Some(Rgb::BLACK));
    }

    #[test]
    fn ppm_header_and_payload() {
        let mut frame = Framebuffer::new(2, 1);
        frame.fill(Rgb::new(1, 2, 3).opaque());
        let ppm = frame.to_ppm();
        assert!(ppm.starts_with(b"P6\n2 1\n255\n"));
        assert_eq!(&ppm[ppm.len() - 6..], &[1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn draw_list_records_calls() {
        let mut list = DrawList::new(100, 100);
        list.fill(Rgb::BLACK.with_alpha(0.5));
        list.fill_circle(Point::new(1.0, 2.0), 2.0, Rgb::GREEN.opaque());
        list.stroke_polyline(&[Point::default(), Point::new(1.0, 1.0)], &[Rgb::GREEN], 1.0);

        assert_eq!(list.commands().len(), 3);
        assert_eq!(list.circles().count(), 1);
        assert_eq!(list.polylines().next().map(<[Point]>::len), Some(2));
    }
}
