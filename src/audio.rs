//! Ambient cave sound synthesis.
//!
//! Two generators behind one master gain: a 60 Hz sine hum and a white-noise
//! crackle pushed through a one-pole 600 Hz high-pass.  The master gain is
//! linked to the lighting slider so the cave gets louder as the lamp dims.
//!
//! The synth is a pure sample generator; the embedding application owns the
//! output device and pulls samples with `render()`.  A zero sample rate
//! disables the synth entirely and `render()` writes silence.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const HUM_HZ: f32 = 60.0;
const HUM_GAIN: f32 = 0.02;
const NOISE_GAIN: f32 = 0.02;
const HIGHPASS_HZ: f32 = 600.0;

/// Master gain with the lamp at full brightness.
const BASE_GAIN: f32 = 0.15;

pub struct AmbientAudio {
    sample_rate: u32,
    running: bool,
    master: f32,
    phase: f32,
    prev_in: f32,
    prev_out: f32,
    rng: StdRng,
}

impl AmbientAudio {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_rng(sample_rate, StdRng::from_entropy())
    }

    pub fn new_seeded(sample_rate: u32, seed: u64) -> Self {
        Self::with_rng(sample_rate, StdRng::seed_from_u64(seed))
    }

    fn with_rng(sample_rate: u32, rng: StdRng) -> Self {
        if sample_rate == 0 {
            crate::log_warn!("audio: zero sample rate, synth disabled");
        }
        AmbientAudio {
            sample_rate,
            running: false,
            master: BASE_GAIN,
            phase: 0.0,
            prev_in: 0.0,
            prev_out: 0.0,
            rng,
        }
    }

    pub fn enabled(&self) -> bool {
        self.sample_rate > 0
    }

    /// Idempotent.  Starting a disabled synth is allowed and stays silent.
    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn running(&self) -> bool {
        self.running
    }

    /// Lighting link: `brightness` in 0..=100, dimmer means louder.
    pub fn set_brightness(&mut self, brightness: u8) {
        let b = (brightness.min(100)) as f32 / 100.0;
        self.master = BASE_GAIN + (1.0 - b) * 0.5;
    }

    pub fn master_gain(&self) -> f32 {
        self.master
    }

    /// Fill `out` with the next samples.  Silence when stopped or disabled.
    pub fn render(&mut self, out: &mut [f32]) {
        if !self.running || self.sample_rate == 0 {
            out.fill(0.0);
            return;
        }
        let dt = 1.0 / self.sample_rate as f32;
        let rc = 1.0 / (std::f32::consts::TAU * HIGHPASS_HZ);
        let alpha = rc / (rc + dt);
        let phase_step = std::f32::consts::TAU * HUM_HZ * dt;

        for sample in out.iter_mut() {
            let hum = self.phase.sin() * HUM_GAIN;
            self.phase += phase_step;
            if self.phase > std::f32::consts::TAU {
                self.phase -= std::f32::consts::TAU;
            }

            let white = self.rng.gen_range(-1.0f32..1.0);
            let crackle = alpha * (self.prev_out + white - self.prev_in);
            self.prev_in = white;
            self.prev_out = crackle;

            *sample = (hum + crackle * NOISE_GAIN) * self.master;
        }
    }
}
