//! Procedural animal guide outlines.
//!
//! Each animal maps to a small path table (ellipses, quadratics, straight
//! runs) transcribed from the documented Lascaux silhouettes.  The guide is
//! stroked dashed into a frame at low alpha — it is a visual aid only and is
//! never part of the authoritative paint buffer.

use image::RgbaImage;

/// Fauna selectable for the painting stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Animal {
    #[default]
    Horse,
    Aurochs,
    Deer,
    Bison,
}

impl Animal {
    pub fn all() -> &'static [Animal] {
        &[Animal::Horse, Animal::Aurochs, Animal::Deer, Animal::Bison]
    }

    pub fn id(self) -> &'static str {
        match self {
            Animal::Horse => "horse",
            Animal::Aurochs => "aurochs",
            Animal::Deer => "deer",
            Animal::Bison => "bison",
        }
    }

    pub fn from_id(id: &str) -> Option<Animal> {
        Animal::all().iter().copied().find(|a| a.id() == id)
    }
}

/// Guide stroke appearance: 2px dashed black at 30% alpha, 5 on / 5 off.
const GUIDE_ALPHA: f32 = 0.3;
const GUIDE_HALF_WIDTH: f32 = 1.0;
const DASH_ON: f32 = 5.0;
const DASH_PERIOD: f32 = 10.0;

/// Path building blocks, flattened to polylines before stroking.
enum Seg {
    Move(f32, f32),
    Line(f32, f32),
    Quad(f32, f32, f32, f32),
    Ellipse { cx: f32, cy: f32, rx: f32, ry: f32 },
}

use Seg::{Ellipse, Line, Move, Quad};

/// Stamp the dashed silhouette for `animal` over `frame`.
pub fn draw_guide(frame: &mut RgbaImage, animal: Animal) {
    for poly in flatten(outline(animal)) {
        stroke_dashed(frame, &poly);
    }
}

fn outline(animal: Animal) -> Vec<Seg> {
    match animal {
        Animal::Horse => vec![
            // Body, then head, neck, four legs, tail.
            Ellipse { cx: 350.0, cy: 250.0, rx: 100.0, ry: 60.0 },
            Move(420.0, 230.0),
            Quad(480.0, 220.0, 490.0, 250.0),
            Quad(485.0, 270.0, 450.0, 265.0),
            Move(420.0, 230.0),
            Line(430.0, 210.0),
            Line(440.0, 230.0),
            Move(320.0, 310.0),
            Line(310.0, 380.0),
            Move(340.0, 310.0),
            Line(330.0, 380.0),
            Move(370.0, 310.0),
            Line(380.0, 380.0),
            Move(390.0, 310.0),
            Line(400.0, 380.0),
            Move(250.0, 245.0),
            Quad(220.0, 240.0, 210.0, 260.0),
        ],
        Animal::Aurochs => vec![
            // Massive body, head, forward-curved horns, neck hump, legs.
            Ellipse { cx: 350.0, cy: 260.0, rx: 120.0, ry: 70.0 },
            Move(440.0, 240.0),
            Quad(500.0, 235.0, 510.0, 260.0),
            Quad(505.0, 285.0, 470.0, 280.0),
            Move(495.0, 245.0),
            Quad(510.0, 200.0, 500.0, 180.0),
            Move(505.0, 245.0),
            Quad(530.0, 210.0, 540.0, 190.0),
            Move(440.0, 230.0),
            Quad(430.0, 200.0, 410.0, 210.0),
            Move(310.0, 330.0),
            Line(300.0, 400.0),
            Move(340.0, 330.0),
            Line(330.0, 400.0),
            Move(380.0, 330.0),
            Line(390.0, 400.0),
            Move(410.0, 330.0),
            Line(420.0, 400.0),
        ],
        Animal::Deer => vec![
            // Slender body, head, branching antlers, neck, thin legs, tail.
            Ellipse { cx: 350.0, cy: 260.0, rx: 90.0, ry: 50.0 },
            Move(420.0, 245.0),
            Quad(465.0, 240.0, 475.0, 260.0),
            Quad(470.0, 275.0, 445.0, 270.0),
            Move(460.0, 245.0),
            Line(470.0, 200.0),
            Move(470.0, 210.0),
            Line(490.0, 195.0),
            Move(470.0, 220.0),
            Line(485.0, 210.0),
            Move(420.0, 240.0),
            Line(430.0, 220.0),
            Move(320.0, 310.0),
            Line(315.0, 380.0),
            Move(345.0, 310.0),
            Line(340.0, 380.0),
            Move(370.0, 310.0),
            Line(375.0, 380.0),
            Move(395.0, 310.0),
            Line(400.0, 380.0),
            Move(260.0, 255.0),
            Line(240.0, 270.0),
        ],
        Animal::Bison => vec![
            // Body, shoulder hump, lowered head, curved horns, legs, beard.
            Ellipse { cx: 350.0, cy: 270.0, rx: 110.0, ry: 65.0 },
            Move(400.0, 205.0),
            Quad(420.0, 190.0, 440.0, 205.0),
            Quad(445.0, 235.0, 430.0, 245.0),
            Move(445.0, 260.0),
            Quad(490.0, 270.0, 500.0, 295.0),
            Quad(490.0, 310.0, 465.0, 305.0),
            Move(488.0, 280.0),
            Quad(505.0, 265.0, 500.0, 250.0),
            Move(495.0, 282.0),
            Quad(515.0, 270.0, 515.0, 255.0),
            Move(310.0, 335.0),
            Line(305.0, 400.0),
            Move(340.0, 335.0),
            Line(335.0, 400.0),
            Move(375.0, 335.0),
            Line(380.0, 400.0),
            Move(405.0, 335.0),
            Line(410.0, 400.0),
            Move(485.0, 305.0),
            Line(480.0, 325.0),
        ],
    }
}

/// Flatten a path table into polylines.  A `Move` starts a new polyline;
/// ellipses become closed 64-gon polylines of their own.
fn flatten(segs: Vec<Seg>) -> Vec<Vec<(f32, f32)>> {
    let mut polys: Vec<Vec<(f32, f32)>> = Vec::new();
    let mut current: Vec<(f32, f32)> = Vec::new();

    for seg in segs {
        match seg {
            Move(x, y) => {
                if current.len() > 1 {
                    polys.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
                current.push((x, y));
            }
            Line(x, y) => current.push((x, y)),
            Quad(cx, cy, x, y) => {
                if let Some(&(sx, sy)) = current.last() {
                    const STEPS: usize = 16;
                    for i in 1..=STEPS {
                        let t = i as f32 / STEPS as f32;
                        let u = 1.0 - t;
                        current.push((
                            u * u * sx + 2.0 * u * t * cx + t * t * x,
                            u * u * sy + 2.0 * u * t * cy + t * t * y,
                        ));
                    }
                }
            }
            Ellipse { cx, cy, rx, ry } => {
                if current.len() > 1 {
                    polys.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
                const STEPS: usize = 64;
                let ring: Vec<(f32, f32)> = (0..=STEPS)
                    .map(|i| {
                        let a = i as f32 / STEPS as f32 * std::f32::consts::TAU;
                        (cx + rx * a.cos(), cy + ry * a.sin())
                    })
                    .collect();
                polys.push(ring);
            }
        }
    }
    if current.len() > 1 {
        polys.push(current);
    }
    polys
}

/// Walk a polyline by arc length, stamping guide dots during the "on" phase
/// of the dash pattern.
fn stroke_dashed(frame: &mut RgbaImage, poly: &[(f32, f32)]) {
    const STEP: f32 = 0.75;
    let mut travelled = 0.0f32;

    for pair in poly.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        let len = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        if len <= f32::EPSILON {
            continue;
        }
        let mut s = 0.0f32;
        while s < len {
            let phase = (travelled + s) % DASH_PERIOD;
            if phase < DASH_ON {
                let t = s / len;
                dot(frame, x0 + (x1 - x0) * t, y0 + (y1 - y0) * t);
            }
            s += STEP;
        }
        travelled += len;
    }
}

fn dot(frame: &mut RgbaImage, x: f32, y: f32) {
    let (w, h) = (frame.width() as i32, frame.height() as i32);
    let r = GUIDE_HALF_WIDTH;
    let min_x = (x - r).floor() as i32;
    let max_x = (x + r).ceil() as i32;
    let min_y = (y - r).floor() as i32;
    let max_y = (y + r).ceil() as i32;
    for py in min_y..=max_y {
        for px in min_x..=max_x {
            if px < 0 || py < 0 || px >= w || py >= h {
                continue;
            }
            let dx = px as f32 + 0.5 - x;
            let dy = py as f32 + 0.5 - y;
            if dx * dx + dy * dy > r * r {
                continue;
            }
            let p = frame.get_pixel_mut(px as u32, py as u32);
            for c in 0..3 {
                p[c] = (p[c] as f32 * (1.0 - GUIDE_ALPHA)).round() as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn blank() -> RgbaImage {
        RgbaImage::from_pixel(700, 500, Rgba([200, 200, 200, 255]))
    }

    #[test]
    fn every_animal_marks_some_pixels() {
        for &animal in Animal::all() {
            let mut frame = blank();
            draw_guide(&mut frame, animal);
            let marked = frame.pixels().filter(|p| p[0] != 200).count();
            assert!(marked > 100, "{:?} drew {} pixels", animal, marked);
        }
    }

    #[test]
    fn guide_is_dashed_not_solid() {
        // A long horizontal run must alternate marked and unmarked columns.
        let mut frame = blank();
        stroke_dashed(&mut frame, &[(100.0, 100.0), (300.0, 100.0)]);
        let marked: Vec<bool> = (100..300)
            .map(|x| frame.get_pixel(x, 100)[0] != 200)
            .collect();
        assert!(marked.iter().any(|&m| m), "dash-on phase draws");
        assert!(!marked.iter().all(|&m| m), "dash-off phase leaves gaps");
    }

    #[test]
    fn animal_ids_round_trip() {
        for &a in Animal::all() {
            assert_eq!(Animal::from_id(a.id()), Some(a));
        }
        assert_eq!(Animal::from_id("mammoth"), None);
    }
}
