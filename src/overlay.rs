//! Decorative overlay layers: drifting dust motes and the lamplight spotlight.
//!
//! Everything here is cosmetic.  The overlays render into their own RGBA
//! layers for the presentation layer to composite over the painting; they
//! never touch the authoritative paint buffer, and stopping the loop mid-tick
//! loses nothing.

use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Baseline mote population.
const PARTICLE_COUNT: usize = 40;
/// Extra motes emitted when a stroke ends.
const BURST_COUNT: usize = 6;

const MOTE_COLOR: [u8; 3] = [255, 230, 180];

struct Mote {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    size: f32,
    life: u32,
    /// Burst motes are removed on expiry instead of respawned.
    transient: bool,
}

/// Slow-drifting dust lit by the lamp.  Intensity scales drift speed; the
/// finishing stage drives it from the lighting slider.
pub struct ParticleField {
    width: u32,
    height: u32,
    motes: Vec<Mote>,
    intensity: f32,
}

impl ParticleField {
    fn new(width: u32, height: u32, rng: &mut StdRng) -> Self {
        let motes = (0..PARTICLE_COUNT)
            .map(|_| Self::spawn(width, height, rng))
            .collect();
        ParticleField {
            width,
            height,
            motes,
            intensity: 1.0,
        }
    }

    fn spawn(width: u32, height: u32, rng: &mut StdRng) -> Mote {
        Mote {
            x: rng.gen_range(0.0..width as f32),
            y: rng.gen_range(0.0..height as f32),
            vx: rng.gen_range(-0.2..0.2),
            vy: rng.gen_range(-0.6..-0.1),
            size: rng.gen_range(0.5..3.0),
            life: rng.gen_range(200..600),
            transient: false,
        }
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = intensity.clamp(0.0, 2.0);
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn mote_count(&self) -> usize {
        self.motes.len()
    }

    /// Advance every mote by one frame.  Expired or escaped baseline motes
    /// respawn; burst motes just die.
    pub fn tick(&mut self, rng: &mut StdRng) {
        let (w, h) = (self.width as f32, self.height as f32);
        let i = self.intensity;
        for m in &mut self.motes {
            m.x += m.vx * (1.0 + i * 2.0);
            m.y += m.vy * (1.0 + i * 1.5);
            m.life = m.life.saturating_sub(1);
            let gone = m.life == 0 || m.x < -5.0 || m.x > w + 5.0 || m.y < -5.0 || m.y > h + 5.0;
            if gone && !m.transient {
                *m = Self::spawn(self.width, self.height, rng);
            }
        }
        self.motes
            .retain(|m| !(m.transient && (m.life == 0 || m.y < -5.0)));
    }

    /// Emit a short-lived puff of energetic motes (stroke release).
    pub fn burst(&mut self, x: f32, y: f32, rng: &mut StdRng) {
        for _ in 0..BURST_COUNT {
            self.motes.push(Mote {
                x,
                y,
                vx: rng.gen_range(-1.0..1.0),
                vy: rng.gen_range(-2.0..-0.5),
                size: rng.gen_range(1.0..3.0),
                life: rng.gen_range(30..80),
                transient: true,
            });
        }
    }

    /// Warm translucent discs on a transparent layer.
    pub fn render(&self) -> RgbaImage {
        let mut layer = RgbaImage::from_pixel(self.width, self.height, Rgba([0, 0, 0, 0]));
        for m in &self.motes {
            let alpha = (0.08 + 0.25 * (m.size / 3.0) * self.intensity).clamp(0.0, 1.0);
            let a = (alpha * 255.0).round() as u8;
            let r = m.size.ceil() as i32;
            for dy in -r..=r {
                for dx in -r..=r {
                    if (dx * dx + dy * dy) as f32 > m.size * m.size {
                        continue;
                    }
                    let px = m.x as i32 + dx;
                    let py = m.y as i32 + dy;
                    if px < 0 || py < 0 || px >= self.width as i32 || py >= self.height as i32 {
                        continue;
                    }
                    let p = layer.get_pixel_mut(px as u32, py as u32);
                    if p[3] < a {
                        *p = Rgba([MOTE_COLOR[0], MOTE_COLOR[1], MOTE_COLOR[2], a]);
                    }
                }
            }
        }
        layer
    }
}

/// Lamplight pool following the pointer.  Radius flickers a few percent per
/// tick to suggest an open flame.
pub struct Spotlight {
    width: u32,
    height: u32,
    pointer: (f32, f32),
    brush_radius: f32,
    flicker: f32,
}

impl Spotlight {
    fn new(width: u32, height: u32) -> Self {
        Spotlight {
            width,
            height,
            pointer: (width as f32 / 2.0, height as f32 / 2.0),
            brush_radius: 10.0,
            flicker: 1.0,
        }
    }

    pub fn set_pointer(&mut self, x: f32, y: f32) {
        self.pointer = (x, y);
    }

    pub fn set_brush_radius(&mut self, radius: f32) {
        self.brush_radius = radius.max(1.0);
    }

    pub fn tick(&mut self, rng: &mut StdRng) {
        self.flicker = 0.9 + rng.gen_range(-0.06..0.06);
    }

    /// Current pool radius: wide enough to read the stroke, scaled to the
    /// brush, jittered by the flicker factor.
    pub fn radius(&self) -> f32 {
        (self.brush_radius * 6.0).max(120.0) * self.flicker
    }

    /// Full-frame darkness mask with a warm falloff around the pointer.
    /// Stops: warm core, amber mid, near-black surround.
    pub fn render(&self) -> RgbaImage {
        let radius = self.radius();
        let (cx, cy) = self.pointer;
        let mut layer = RgbaImage::new(self.width, self.height);
        for (x, y, p) in layer.enumerate_pixels_mut() {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let t = ((dx * dx + dy * dy).sqrt() / radius).min(1.0);
            let (rgb, a) = if t < 0.5 {
                let k = t / 0.5;
                (
                    lerp3([255.0, 230.0, 170.0], [255.0, 200.0, 120.0], k),
                    0.35 + (0.12 - 0.35) * k,
                )
            } else {
                let k = (t - 0.5) / 0.5;
                (
                    lerp3([255.0, 200.0, 120.0], [0.0, 0.0, 0.0], k),
                    0.12 + (0.85 - 0.12) * k,
                )
            };
            *p = Rgba([
                rgb[0].round() as u8,
                rgb[1].round() as u8,
                rgb[2].round() as u8,
                (a * 255.0).round() as u8,
            ]);
        }
        layer
    }
}

fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

/// Cooperative animation driver for the decorative layers.
///
/// The embedding application calls `tick()` once per frame while the loop is
/// running.  `start()`/`stop()` are idempotent; a stopped loop ignores ticks,
/// so session reset simply stops it and nothing keeps animating.
pub struct OverlayLoop {
    particles: ParticleField,
    spotlight: Spotlight,
    rng: StdRng,
    running: bool,
}

impl OverlayLoop {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_rng(width, height, StdRng::from_entropy())
    }

    pub fn new_seeded(width: u32, height: u32, seed: u64) -> Self {
        Self::with_rng(width, height, StdRng::seed_from_u64(seed))
    }

    fn with_rng(width: u32, height: u32, mut rng: StdRng) -> Self {
        let particles = ParticleField::new(width, height, &mut rng);
        OverlayLoop {
            particles,
            spotlight: Spotlight::new(width, height),
            rng,
            running: false,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn running(&self) -> bool {
        self.running
    }

    /// Advance one frame.  No-op while stopped.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }
        self.particles.tick(&mut self.rng);
        self.spotlight.tick(&mut self.rng);
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32) {
        self.spotlight.set_pointer(x, y);
    }

    pub fn set_brush_radius(&mut self, radius: f32) {
        self.spotlight.set_brush_radius(radius);
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.particles.set_intensity(intensity);
    }

    pub fn burst(&mut self, x: f32, y: f32) {
        if self.running {
            self.particles.burst(x, y, &mut self.rng);
        }
    }

    pub fn particles(&self) -> &ParticleField {
        &self.particles
    }

    pub fn spotlight(&self) -> &Spotlight {
        &self.spotlight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looped() -> OverlayLoop {
        let mut l = OverlayLoop::new_seeded(700, 500, 11);
        l.start();
        l
    }

    #[test]
    fn baseline_population_is_stable_across_ticks() {
        let mut l = looped();
        for _ in 0..1000 {
            l.tick();
        }
        assert_eq!(l.particles().mote_count(), PARTICLE_COUNT);
    }

    #[test]
    fn burst_motes_decay_back_to_baseline() {
        let mut l = looped();
        l.burst(350.0, 250.0);
        assert_eq!(l.particles().mote_count(), PARTICLE_COUNT + BURST_COUNT);
        // Burst lifetimes top out well under 200 ticks.
        for _ in 0..200 {
            l.tick();
        }
        assert_eq!(l.particles().mote_count(), PARTICLE_COUNT);
    }

    #[test]
    fn stopped_loop_ignores_ticks_and_bursts() {
        let mut l = OverlayLoop::new_seeded(700, 500, 11);
        l.burst(100.0, 100.0);
        assert_eq!(l.particles().mote_count(), PARTICLE_COUNT);
        l.start();
        l.stop();
        l.stop();
        let before = l.spotlight().radius();
        l.tick();
        assert_eq!(l.spotlight().radius(), before);
    }

    #[test]
    fn spotlight_radius_tracks_brush_with_flicker_bounds() {
        let mut l = looped();
        l.set_brush_radius(25.0);
        for _ in 0..50 {
            l.tick();
            let r = l.spotlight().radius();
            // 25 * 6 = 150, flicker in [0.84, 0.96].
            assert!((150.0 * 0.84..=150.0 * 0.96).contains(&r), "radius {}", r);
        }
    }

    #[test]
    fn small_brushes_get_the_floor_radius() {
        let mut l = looped();
        l.set_brush_radius(3.0);
        l.tick();
        let r = l.spotlight().radius();
        assert!(r >= 120.0 * 0.84 && r <= 120.0 * 0.96, "radius {}", r);
    }

    #[test]
    fn particle_layer_is_transparent_outside_motes() {
        let l = looped();
        let layer = l.particles().render();
        let opaque = layer.pixels().filter(|p| p[3] > 0).count();
        let total = (layer.width() * layer.height()) as usize;
        assert!(opaque > 0, "motes render");
        assert!(opaque < total / 10, "layer is mostly transparent");
    }
}
