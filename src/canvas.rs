//! Drawing surface engine.
//!
//! `PaintSurface` owns the raster paint buffer, the bounded undo ring, the
//! in-progress stroke state machine, and the current technique/tool/color
//! selections.  It knows nothing about stages or presentation: the stage
//! controller drives it through `begin`/`extend`/`end` and the setters.
//!
//! One renderer serves every entry point: taps and smoothed stroke segments
//! both reduce to technique footprints stamped along a path, so spray behaves
//! identically whether the pointer is clicked or dragged.

use std::collections::VecDeque;

use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::templates::{self, Animal};

pub const DEFAULT_WIDTH: u32 = 700;
pub const DEFAULT_HEIGHT: u32 = 500;

/// Undo ring capacity.  Oldest frame is evicted on overflow (FIFO — frames
/// are only ever re-accessed via pop).
pub const MAX_UNDO: usize = 20;

/// Disc count for one spray footprint.
const SPRAY_STAMPS: usize = 10;
/// Per-disc opacity of a spray footprint.
const SPRAY_ALPHA: f32 = 0.25;

/// Cave wall base color.
const WALL_BASE: [u8; 3] = [0x8B, 0x77, 0x65];
/// Speck count for the wall noise texture.
const WALL_SPECKS: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }

    fn mid(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    fn dist(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    fn lerp(self, other: Point, t: f32) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

/// Application technique.  Each preset fixes the default brush radius and
/// base opacity for subsequent strokes; switching never alters painted pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Technique {
    /// Implicit default before the user picks anything.
    #[default]
    Freehand,
    Brush,
    Spray,
    Finger,
    Engraving,
}

impl Technique {
    /// (brush radius, base opacity)
    pub fn preset(self) -> (f32, f32) {
        match self {
            Technique::Freehand => (10.0, 0.6),
            Technique::Brush => (8.0, 0.7),
            Technique::Spray => (25.0, 0.3),
            Technique::Finger => (15.0, 0.6),
            Technique::Engraving => (3.0, 1.0),
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Technique::Freehand => "freehand",
            Technique::Brush => "brush",
            Technique::Spray => "spray",
            Technique::Finger => "finger",
            Technique::Engraving => "engraving",
        }
    }

    pub fn from_id(id: &str) -> Option<Technique> {
        [
            Technique::Freehand,
            Technique::Brush,
            Technique::Spray,
            Technique::Finger,
            Technique::Engraving,
        ]
        .into_iter()
        .find(|t| t.id() == id)
    }
}

/// Binary tool flag, orthogonal to technique.  Paint composites source-over
/// at the technique's base opacity; Eraser restores the preserved wall
/// background at full strength regardless of color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Paint,
    Eraser,
}

/// Pointer-device state machine: Idle → Stroking → Idle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
enum StrokeState {
    #[default]
    Idle,
    Stroking,
}

pub struct PaintSurface {
    width: u32,
    height: u32,
    /// Authoritative pixels: wall background plus every committed stamp.
    /// Never contains guide pixels — see `frame()`.
    paint: RgbaImage,
    /// Pristine wall (base fill + noise texture), kept for eraser restore
    /// and `clear()`.
    background: RgbaImage,
    /// Full-frame snapshots, pushed before each stroke begins.
    undo_ring: VecDeque<RgbaImage>,
    stroke: Vec<Point>,
    state: StrokeState,
    technique: Technique,
    tool: Tool,
    color: [u8; 3],
    brush_radius: f32,
    base_opacity: f32,
    animal: Animal,
    template_visible: bool,
    rng: StdRng,
}

impl PaintSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_rng(width, height, StdRng::from_entropy())
    }

    /// Deterministic construction for tests.
    pub fn new_seeded(width: u32, height: u32, seed: u64) -> Self {
        Self::with_rng(width, height, StdRng::seed_from_u64(seed))
    }

    fn with_rng(width: u32, height: u32, mut rng: StdRng) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let background = wall_texture(width, height, &mut rng);
        let (brush_radius, base_opacity) = Technique::default().preset();
        PaintSurface {
            width,
            height,
            paint: background.clone(),
            background,
            undo_ring: VecDeque::new(),
            stroke: Vec::new(),
            state: StrokeState::Idle,
            technique: Technique::default(),
            tool: Tool::default(),
            color: crate::catalog::catalog()
                .mineral("hematite")
                .map(|m| m.rgb())
                .unwrap_or([0x8B, 0x45, 0x13]),
            brush_radius,
            base_opacity,
            animal: Animal::default(),
            template_visible: true,
            rng,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    // ---- selections ---------------------------------------------------------

    pub fn set_technique(&mut self, technique: Technique) {
        self.technique = technique;
        let (radius, opacity) = technique.preset();
        self.brush_radius = radius;
        self.base_opacity = opacity;
    }

    pub fn technique(&self) -> Technique {
        self.technique
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn toggle_eraser(&mut self) -> Tool {
        self.tool = match self.tool {
            Tool::Paint => Tool::Eraser,
            Tool::Eraser => Tool::Paint,
        };
        self.tool
    }

    pub fn set_color(&mut self, rgb: [u8; 3]) {
        self.color = rgb;
    }

    pub fn color(&self) -> [u8; 3] {
        self.color
    }

    /// Brush size slider: overrides the technique preset until the next
    /// technique switch.
    pub fn set_brush_radius(&mut self, radius: f32) {
        self.brush_radius = radius.clamp(1.0, 100.0);
    }

    pub fn brush_radius(&self) -> f32 {
        self.brush_radius
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.base_opacity = opacity.clamp(0.05, 1.0);
    }

    // ---- template guide -----------------------------------------------------

    pub fn set_animal(&mut self, animal: Animal) {
        self.animal = animal;
    }

    pub fn animal(&self) -> Animal {
        self.animal
    }

    pub fn show_template(&mut self) {
        self.template_visible = true;
    }

    pub fn hide_template(&mut self) {
        self.template_visible = false;
    }

    pub fn template_visible(&self) -> bool {
        self.template_visible
    }

    /// Displayable frame: the paint buffer with the guide composed on top
    /// when visible.  The guide never touches `paint`, so toggling visibility
    /// round-trips painted content exactly.
    pub fn frame(&self) -> RgbaImage {
        let mut frame = self.paint.clone();
        if self.template_visible {
            templates::draw_guide(&mut frame, self.animal);
        }
        frame
    }

    /// Raw paint buffer (no guide).  Used by tests and the export path.
    pub fn paint_buffer(&self) -> &RgbaImage {
        &self.paint
    }

    // ---- stroke capture protocol --------------------------------------------

    /// Pointer down.  Snapshots the buffer into the undo ring *before* any
    /// drawing so every stroke is independently undoable.
    pub fn begin(&mut self, p: Point) {
        if self.state == StrokeState::Stroking {
            return;
        }
        self.push_undo();
        self.stroke.clear();
        self.stroke.push(p);
        self.state = StrokeState::Stroking;
    }

    /// Pointer move while down.  Renders only the newly added smoothed
    /// segment: a quadratic through the previous sample, with the midpoints
    /// of adjacent samples as curve endpoints.
    pub fn extend(&mut self, p: Point) {
        if self.state != StrokeState::Stroking {
            return;
        }
        self.stroke.push(p);
        let n = self.stroke.len();
        if n == 2 {
            let a = self.stroke[0];
            let m = a.mid(self.stroke[1]);
            self.stamp_footprint(a);
            self.stamp_along_segment(a, m);
        } else {
            let a = self.stroke[n - 3].mid(self.stroke[n - 2]);
            let ctrl = self.stroke[n - 2];
            let b = self.stroke[n - 2].mid(self.stroke[n - 1]);
            self.stamp_along_quadratic(a, ctrl, b);
        }
    }

    /// Pointer up.  A single-point stroke stamps one discrete footprint (the
    /// tap case).  Returns the release point for the decorative burst.
    pub fn end(&mut self) -> Option<Point> {
        if self.state != StrokeState::Stroking {
            return None;
        }
        if self.stroke.len() == 1 {
            let p = self.stroke[0];
            self.stamp_footprint(p);
        }
        let release = self.stroke.last().copied();
        self.stroke.clear();
        self.state = StrokeState::Idle;
        release
    }

    /// Pointer capture loss.  Identical to a normal pointer-up so a stroke
    /// can never stay stuck in Stroking.
    pub fn cancel(&mut self) -> Option<Point> {
        self.end()
    }

    // ---- undo ---------------------------------------------------------------

    /// Restore the most recent snapshot.  No-op on an empty ring.
    pub fn undo(&mut self) {
        if let Some(snapshot) = self.undo_ring.pop_back() {
            self.paint = snapshot;
        }
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_ring.len()
    }

    pub fn clear_undo(&mut self) {
        self.undo_ring.clear();
    }

    fn push_undo(&mut self) {
        self.undo_ring.push_back(self.paint.clone());
        while self.undo_ring.len() > MAX_UNDO {
            self.undo_ring.pop_front();
        }
    }

    /// Wipe back to the pristine wall (undoable like a stroke).
    pub fn clear(&mut self) {
        self.push_undo();
        self.paint = self.background.clone();
    }

    // ---- unified stamp renderer ---------------------------------------------

    fn stamp_spacing(&self) -> f32 {
        (self.brush_radius * 0.5).max(1.0)
    }

    fn stamp_along_segment(&mut self, a: Point, b: Point) {
        let steps = (a.dist(b) / self.stamp_spacing()).ceil().max(1.0) as usize;
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            self.stamp_footprint(a.lerp(b, t));
        }
    }

    fn stamp_along_quadratic(&mut self, a: Point, ctrl: Point, b: Point) {
        let approx = a.dist(ctrl) + ctrl.dist(b);
        let steps = (approx / self.stamp_spacing()).ceil().max(1.0) as usize;
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            let u = 1.0 - t;
            let p = Point::new(
                u * u * a.x + 2.0 * u * t * ctrl.x + t * t * b.x,
                u * u * a.y + 2.0 * u * t * ctrl.y + t * t * b.y,
            );
            self.stamp_footprint(p);
        }
    }

    /// One technique footprint at `p`.  Spray scatters small discs inside the
    /// brush radius; every other technique stamps a single brush-radius disc.
    fn stamp_footprint(&mut self, p: Point) {
        match self.technique {
            Technique::Spray => {
                for _ in 0..SPRAY_STAMPS {
                    let dx = self.rng.gen_range(-1.0..1.0) * self.brush_radius;
                    let dy = self.rng.gen_range(-1.0..1.0) * self.brush_radius;
                    let r = self.rng.gen_range(1.0..4.0);
                    self.stamp_disc(Point::new(p.x + dx, p.y + dy), r, SPRAY_ALPHA);
                }
            }
            _ => {
                let r = self.brush_radius;
                let alpha = self.base_opacity;
                self.stamp_disc(p, r, alpha);
            }
        }
    }

    /// Filled disc, blended per the active tool with a 1px soft edge.
    fn stamp_disc(&mut self, center: Point, radius: f32, alpha: f32) {
        if center.x + radius < 0.0 || center.y + radius < 0.0 {
            return;
        }
        let min_x = (center.x - radius).floor().max(0.0) as u32;
        let max_x = ((center.x + radius).ceil() as i64).clamp(0, self.width as i64 - 1) as u32;
        let min_y = (center.y - radius).floor().max(0.0) as u32;
        let max_y = ((center.y + radius).ceil() as i64).clamp(0, self.height as i64 - 1) as u32;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f32 + 0.5 - center.x;
                let dy = y as f32 + 0.5 - center.y;
                let d = (dx * dx + dy * dy).sqrt();
                if d > radius {
                    continue;
                }
                let edge = (radius - d).min(1.0);
                match self.tool {
                    Tool::Paint => {
                        let a = alpha * edge;
                        let color = self.color;
                        blend_over(self.paint.get_pixel_mut(x, y), color, a);
                    }
                    Tool::Eraser => {
                        // Destination-out against the wall layer: full-alpha
                        // restore of the preserved background pixel.
                        let bg = *self.background.get_pixel(x, y);
                        let p = self.paint.get_pixel_mut(x, y);
                        if edge >= 1.0 {
                            *p = bg;
                        } else {
                            blend_over(p, [bg[0], bg[1], bg[2]], edge);
                        }
                    }
                }
            }
        }
    }
}

/// Source-over blend of an opaque color at `alpha` onto an opaque pixel.
fn blend_over(dst: &mut Rgba<u8>, color: [u8; 3], alpha: f32) {
    let a = alpha.clamp(0.0, 1.0);
    for c in 0..3 {
        dst[c] = (color[c] as f32 * a + dst[c] as f32 * (1.0 - a)).round() as u8;
    }
    dst[3] = 255;
}

/// Pristine cave wall: base fill plus a sparse dark speck texture.
fn wall_texture(width: u32, height: u32, rng: &mut StdRng) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(
        width,
        height,
        Rgba([WALL_BASE[0], WALL_BASE[1], WALL_BASE[2], 255]),
    );
    for _ in 0..WALL_SPECKS {
        let x = rng.gen_range(0..width);
        let y = rng.gen_range(0..height);
        let shade = rng.gen_range(0.0..0.1);
        for dy in 0..2u32 {
            for dx in 0..2u32 {
                let (px, py) = (x + dx, y + dy);
                if px < width && py < height {
                    blend_over(img.get_pixel_mut(px, py), [0, 0, 0], shade);
                }
            }
        }
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> PaintSurface {
        PaintSurface::new_seeded(DEFAULT_WIDTH, DEFAULT_HEIGHT, 7)
    }

    /// Pixels differing from the pristine wall.
    fn painted(s: &PaintSurface) -> Vec<(u32, u32)> {
        s.paint_buffer()
            .enumerate_pixels()
            .filter(|(x, y, p)| s.background.get_pixel(*x, *y) != *p)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn undo_on_empty_stack_is_pixel_identical_noop() {
        let mut s = surface();
        let before = s.paint_buffer().clone();
        s.undo();
        assert_eq!(s.paint_buffer(), &before);
    }

    #[test]
    fn tap_paints_disc_of_brush_radius() {
        let mut s = surface();
        s.begin(Point::new(200.0, 200.0));
        assert_eq!(s.end(), Some(Point::new(200.0, 200.0)));

        let marks = painted(&s);
        assert!(!marks.is_empty(), "tap must paint");
        let r = s.brush_radius();
        for (x, y) in &marks {
            let d = ((*x as f32 + 0.5 - 200.0).powi(2) + (*y as f32 + 0.5 - 200.0).powi(2)).sqrt();
            assert!(d <= r + 0.01, "pixel ({}, {}) outside disc", x, y);
        }
        // Center is solidly covered.
        assert!(marks.contains(&(200, 200)));
    }

    #[test]
    fn stroke_is_undoable_in_one_step() {
        let mut s = surface();
        let before = s.paint_buffer().clone();
        s.begin(Point::new(100.0, 100.0));
        s.extend(Point::new(140.0, 120.0));
        s.extend(Point::new(180.0, 160.0));
        s.end();
        assert_ne!(s.paint_buffer(), &before);
        s.undo();
        assert_eq!(s.paint_buffer(), &before);
    }

    #[test]
    fn undo_ring_evicts_oldest_beyond_capacity() {
        let mut s = surface();
        for i in 0..(MAX_UNDO + 1) {
            s.begin(Point::new(50.0 + i as f32 * 5.0, 50.0));
            s.end();
        }
        assert_eq!(s.undo_depth(), MAX_UNDO);

        // Drain the ring: the oldest snapshot (pristine wall) was evicted, so
        // the fully-unwound buffer still carries the first tap.
        for _ in 0..MAX_UNDO {
            s.undo();
        }
        assert_eq!(s.undo_depth(), 0);
        assert!(!painted(&s).is_empty(), "first stroke survives eviction");
        s.undo();
        assert!(!painted(&s).is_empty());
    }

    #[test]
    fn spray_tap_scatters_within_twice_brush_radius() {
        let mut s = surface();
        s.hide_template();
        s.set_technique(Technique::Spray);
        let r = s.brush_radius();
        s.begin(Point::new(100.0, 100.0));
        s.end();

        let marks = painted(&s);
        assert!(!marks.is_empty(), "spray must paint");
        for (x, y) in &marks {
            let d = ((*x as f32 + 0.5 - 100.0).powi(2) + (*y as f32 + 0.5 - 100.0).powi(2)).sqrt();
            assert!(d <= r * 2.0, "spray pixel ({}, {}) beyond 2x radius", x, y);
        }
        // Scatter, not a single solid disc: coverage is far below the full
        // brush disc area.
        let disc_area = std::f32::consts::PI * r * r;
        assert!((marks.len() as f32) < disc_area * 0.9);
    }

    #[test]
    fn eraser_restores_background_pixels() {
        let mut s = surface();
        s.begin(Point::new(300.0, 300.0));
        s.end();
        assert!(!painted(&s).is_empty());

        s.set_tool(Tool::Eraser);
        s.set_brush_radius(s.brush_radius() + 4.0);
        s.begin(Point::new(300.0, 300.0));
        s.end();
        // Everything the first tap touched is back to wall pixels.
        assert!(painted(&s).is_empty());
    }

    #[test]
    fn technique_switch_updates_presets_only() {
        let mut s = surface();
        s.begin(Point::new(200.0, 200.0));
        s.end();
        let after_stroke = s.paint_buffer().clone();

        s.set_technique(Technique::Engraving);
        assert_eq!(s.brush_radius(), 3.0);
        // No retroactive change to painted pixels.
        assert_eq!(s.paint_buffer(), &after_stroke);
    }

    #[test]
    fn template_toggle_round_trips_painted_content() {
        let mut s = surface();
        s.begin(Point::new(250.0, 250.0));
        s.extend(Point::new(320.0, 270.0));
        s.end();

        let shown = s.frame();
        s.hide_template();
        assert_eq!(&s.frame(), s.paint_buffer(), "hidden frame is pure paint");
        s.show_template();
        assert_eq!(s.frame(), shown, "show reproduces the composed frame");
    }

    #[test]
    fn extend_without_begin_is_rejected() {
        let mut s = surface();
        let before = s.paint_buffer().clone();
        s.extend(Point::new(100.0, 100.0));
        assert_eq!(s.paint_buffer(), &before);
        assert_eq!(s.end(), None);
    }

    #[test]
    fn cancel_behaves_like_pointer_up() {
        let mut s = surface();
        s.begin(Point::new(100.0, 100.0));
        s.extend(Point::new(130.0, 110.0));
        assert!(s.cancel().is_some());
        // Fully back to Idle: a fresh stroke works and undoes independently.
        let mid = s.paint_buffer().clone();
        s.begin(Point::new(400.0, 400.0));
        s.end();
        s.undo();
        assert_eq!(s.paint_buffer(), &mid);
    }

    #[test]
    fn clear_restores_pristine_wall_and_is_undoable() {
        let mut s = surface();
        s.begin(Point::new(150.0, 150.0));
        s.end();
        let with_stroke = s.paint_buffer().clone();
        s.clear();
        assert!(painted(&s).is_empty());
        s.undo();
        assert_eq!(s.paint_buffer(), &with_stroke);
    }
}
