//! Finishing stage: detail passes over the completed painting and the
//! lighting control.
//!
//! The finishing buffer starts as a copy of the painting-stage frame; detail
//! passes composite into it directly (they are presented as one-shot actions,
//! not strokes, so they sit outside the undo ring).  The shading pass is the
//! crate's heavy full-frame composite and runs row-parallel.

use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// One-shot detail passes offered in the finishing stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Detail {
    Eyes,
    Horns,
    Shading,
}

impl Detail {
    pub fn id(self) -> &'static str {
        match self {
            Detail::Eyes => "eyes",
            Detail::Horns => "horns",
            Detail::Shading => "shading",
        }
    }
}

/// Lighting-derived values for the presentation layer and overlays.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightingResponse {
    /// 0..=100 as set.
    pub brightness: u8,
    /// Particle drift intensity for the overlay loop.
    pub particle_intensity: f32,
    /// True exactly once per session, on the first drop below the lamp
    /// threshold.
    pub show_lamp_note: bool,
}

/// Brightness below which the lamp narrative is surfaced.
const LAMP_THRESHOLD: u8 = 40;

/// Radial shadow pools for the shading pass: (cx, cy, radius, strength).
const SHADE_POOLS: [(f32, f32, f32, f32); 4] = [
    (350.0, 280.0, 140.0, 0.25),
    (320.0, 260.0, 80.0, 0.18),
    (390.0, 250.0, 90.0, 0.16),
    (360.0, 310.0, 110.0, 0.12),
];

/// Warm rim highlight: (cx, cy, radius, strength).
const RIM_LIGHT: (f32, f32, f32, f32) = (420.0, 220.0, 200.0, 0.15);
const RIM_COLOR: [f32; 3] = [255.0, 220.0, 170.0];

const SPECKLE_COUNT: usize = 1200;

pub struct FinishSurface {
    frame: RgbaImage,
    brightness: u8,
    lamp_note_shown: bool,
    rng: StdRng,
}

impl FinishSurface {
    /// Take over the painting-stage frame as the finishing base.
    pub fn new(frame: RgbaImage) -> Self {
        Self::with_rng(frame, StdRng::from_entropy())
    }

    pub fn new_seeded(frame: RgbaImage, seed: u64) -> Self {
        Self::with_rng(frame, StdRng::seed_from_u64(seed))
    }

    fn with_rng(frame: RgbaImage, rng: StdRng) -> Self {
        FinishSurface {
            frame,
            brightness: 100,
            lamp_note_shown: false,
            rng,
        }
    }

    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Apply one detail pass.  Passes are not idempotent by design (shading
    /// layers accumulate, as repeated pigment applications would).
    pub fn add_detail(&mut self, detail: Detail) {
        match detail {
            Detail::Eyes => self.draw_eye(),
            Detail::Horns => self.draw_horns(),
            Detail::Shading => self.draw_shading(),
        }
        crate::log_info!("finish: applied detail '{}'", detail.id());
    }

    /// Record the lighting level and derive the overlay/audio parameters.
    /// The lamp narrative fires once, on the first dip below the threshold.
    pub fn adjust_lighting(&mut self, brightness: u8) -> LightingResponse {
        self.brightness = brightness.min(100);
        let b = self.brightness as f32 / 100.0;
        let show = self.brightness < LAMP_THRESHOLD && !self.lamp_note_shown;
        if show {
            self.lamp_note_shown = true;
        }
        LightingResponse {
            brightness: self.brightness,
            particle_intensity: 0.25 + (1.0 - b) * 1.25,
            show_lamp_note: show,
        }
    }

    /// Dark filled disc at the documented head position.
    fn draw_eye(&mut self) {
        disc(&mut self.frame, 470.0, 250.0, 5.0, [0x1C, 0x1C, 0x1C]);
    }

    /// Short ochre stroke from the poll toward the horn tip.
    fn draw_horns(&mut self) {
        let (x0, y0, x1, y1) = (500.0f32, 200.0f32, 495.0f32, 185.0f32);
        let len = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        let steps = (len * 2.0).ceil() as usize;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            disc(
                &mut self.frame,
                x0 + (x1 - x0) * t,
                y0 + (y1 - y0) * t,
                2.0,
                [0x8B, 0x45, 0x13],
            );
        }
    }

    /// Layered volume: shadow pools multiplied in, a warm rim screened on
    /// top, then a light speckle pass for pigment grain.
    fn draw_shading(&mut self) {
        let width = self.frame.width() as usize;
        let raw: &mut [u8] = &mut self.frame;
        raw.par_chunks_mut(width * 4).enumerate().for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let fx = x as f32 + 0.5;
                let fy = y as f32 + 0.5;

                for &(cx, cy, r, strength) in &SHADE_POOLS {
                    let d = ((fx - cx).powi(2) + (fy - cy).powi(2)).sqrt();
                    if d >= r {
                        continue;
                    }
                    // Multiply toward black, strongest at the center.
                    let k = 1.0 - strength * (1.0 - d / r);
                    for c in 0..3 {
                        px[c] = (px[c] as f32 * k).round() as u8;
                    }
                }

                let (cx, cy, r, strength) = RIM_LIGHT;
                let d = ((fx - cx).powi(2) + (fy - cy).powi(2)).sqrt();
                if d < r {
                    let w = strength * (1.0 - d / r);
                    for c in 0..3 {
                        // Screen blend against the weighted rim color.
                        let src = RIM_COLOR[c] * w;
                        let dst = px[c] as f32;
                        px[c] = (255.0 - (255.0 - dst) * (255.0 - src) / 255.0).round() as u8;
                    }
                }
            }
        });

        let (w, h) = (self.frame.width(), self.frame.height());
        for _ in 0..SPECKLE_COUNT {
            let x = self.rng.gen_range(0..w);
            let y = self.rng.gen_range(0..h);
            let lighten = self.rng.gen_bool(0.5);
            let amount = self.rng.gen_range(0.0..0.08);
            let p = self.frame.get_pixel_mut(x, y);
            for c in 0..3 {
                let v = p[c] as f32;
                p[c] = if lighten {
                    (v + (255.0 - v) * amount).round() as u8
                } else {
                    (v * (1.0 - amount)).round() as u8
                };
            }
        }
    }
}

fn disc(frame: &mut RgbaImage, cx: f32, cy: f32, radius: f32, color: [u8; 3]) {
    let (w, h) = (frame.width() as i32, frame.height() as i32);
    let r = radius.ceil() as i32;
    for dy in -r..=r {
        for dx in -r..=r {
            let fx = dx as f32;
            let fy = dy as f32;
            if fx * fx + fy * fy > radius * radius {
                continue;
            }
            let px = cx as i32 + dx;
            let py = cy as i32 + dy;
            if px < 0 || py < 0 || px >= w || py >= h {
                continue;
            }
            *frame.get_pixel_mut(px as u32, py as u32) =
                Rgba([color[0], color[1], color[2], 255]);
        }
    }
}
