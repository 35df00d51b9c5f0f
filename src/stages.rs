//! Stage controller: the linear five-stage progression and the session state
//! that rides along with it.
//!
//! `Session` is the crate's public entry point.  A presentation layer calls
//! the operations below and re-renders from the returned state; every
//! precondition violation is a silent no-op so a confused UI can never
//! corrupt the session.  Stage order only moves forward (through explicit
//! transition screens); the single way back is a full `reset()`.

use crate::audio::AmbientAudio;
use crate::canvas::{PaintSurface, Point, Technique, Tool, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::catalog::{self, Mineral, Narrative};
use crate::finish::{Detail, FinishSurface, LightingResponse};
use crate::io::{self, ExportError};
use crate::overlay::OverlayLoop;
use crate::templates::Animal;

/// Materials needed before the collecting gate opens.
const COLLECT_GATE: usize = 3;
/// Prepared paints needed before the grinding gate opens.
const PAINT_GATE: usize = 2;
/// Grind progress added per held tick.
const GRIND_STEP: u8 = 2;
const GRIND_DONE: u8 = 100;

/// Sample rate handed to the ambient synth.  The embedding application can
/// rebuild the session with its device rate; zero disables audio.
const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Screen states.  `Transition(n)` is the interstitial shown after leaving
/// stage `n`; `Complete` follows the finishing stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Title,
    Collecting,
    Grinding,
    WallSelection,
    Painting,
    Finishing,
    Transition(u8),
    Complete,
}

impl Stage {
    /// Progress index 0..=5 for display.  Transitions report the stage they
    /// are leaving.
    pub fn index(self) -> u8 {
        match self {
            Stage::Title => 0,
            Stage::Collecting => 1,
            Stage::Grinding => 2,
            Stage::WallSelection => 3,
            Stage::Painting => 4,
            Stage::Finishing => 5,
            Stage::Transition(n) => n,
            Stage::Complete => 5,
        }
    }
}

/// Wall surface options offered in stage 3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WallQuality {
    Smooth,
    Rough,
}

/// Binder mixed into a finished grind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Binder {
    #[default]
    Fat,
    Marrow,
    Water,
}

impl Binder {
    pub fn id(self) -> &'static str {
        match self {
            Binder::Fat => "fat",
            Binder::Marrow => "marrow",
            Binder::Water => "water",
        }
    }
}

/// A ground and bound pigment, ready for the palette.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedPaint {
    pub mineral_id: String,
    pub color: [u8; 3],
    pub binder: Binder,
}

pub struct Session {
    stage: Stage,
    collected: Vec<String>,
    prepared: Vec<PreparedPaint>,
    wall: Option<WallQuality>,
    mortar: Option<String>,
    grind_progress: u8,
    grinding: bool,
    binder: Binder,
    surface: Option<PaintSurface>,
    finish: Option<FinishSurface>,
    overlays: OverlayLoop,
    audio: AmbientAudio,
    seed: Option<u64>,
}

impl Session {
    pub fn new() -> Self {
        crate::log_info!("session: created");
        Session {
            stage: Stage::Title,
            collected: Vec::new(),
            prepared: Vec::new(),
            wall: None,
            mortar: None,
            grind_progress: 0,
            grinding: false,
            binder: Binder::default(),
            surface: None,
            finish: None,
            overlays: OverlayLoop::new(DEFAULT_WIDTH, DEFAULT_HEIGHT),
            audio: AmbientAudio::new(DEFAULT_SAMPLE_RATE),
            seed: None,
        }
    }

    /// Deterministic session for tests: every internal RNG is seeded.
    pub fn new_seeded(seed: u64) -> Self {
        let mut s = Session::new();
        s.overlays = OverlayLoop::new_seeded(DEFAULT_WIDTH, DEFAULT_HEIGHT, seed);
        s.audio = AmbientAudio::new_seeded(DEFAULT_SAMPLE_RATE, seed);
        s.seed = Some(seed);
        s
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn stage_index(&self) -> u8 {
        self.stage.index()
    }

    pub fn collected(&self) -> &[String] {
        &self.collected
    }

    pub fn prepared_paints(&self) -> &[PreparedPaint] {
        &self.prepared
    }

    pub fn wall(&self) -> Option<WallQuality> {
        self.wall
    }

    pub fn overlays(&self) -> &OverlayLoop {
        &self.overlays
    }

    pub fn audio_mut(&mut self) -> &mut AmbientAudio {
        &mut self.audio
    }

    pub fn surface(&self) -> Option<&PaintSurface> {
        self.surface.as_ref()
    }

    pub fn finish_surface(&self) -> Option<&FinishSurface> {
        self.finish.as_ref()
    }

    // ---- progression --------------------------------------------------------

    /// Title screen dismissed.
    pub fn start(&mut self) {
        if self.stage != Stage::Title {
            return;
        }
        self.stage = Stage::Collecting;
        crate::log_info!("session: started, entering collection");
    }

    /// Whether the current screen's gate allows `advance()`.
    pub fn gate_satisfied(&self) -> bool {
        match self.stage {
            Stage::Collecting => self.collected.len() >= COLLECT_GATE,
            Stage::Grinding => self.prepared.len() >= PAINT_GATE,
            Stage::WallSelection => self.wall == Some(WallQuality::Smooth),
            Stage::Painting => true,
            _ => false,
        }
    }

    /// Move from a satisfied stage into its transition screen.  Returns the
    /// interstitial narrative for display; `None` means nothing happened.
    pub fn advance(&mut self) -> Option<&'static Narrative> {
        if !self.gate_satisfied() {
            return None;
        }
        let leaving = match self.stage {
            Stage::Collecting => 1,
            Stage::Grinding => 2,
            Stage::WallSelection => 3,
            Stage::Painting => 4,
            _ => return None,
        };
        self.stage = Stage::Transition(leaving);
        crate::log_info!("session: leaving stage {}", leaving);
        catalog::catalog().transition(leaving)
    }

    /// Dismiss the transition screen and enter the next stage, running its
    /// setup exactly once per entry.
    pub fn continue_from_transition(&mut self) {
        let Stage::Transition(leaving) = self.stage else {
            return;
        };
        self.stage = match leaving {
            1 => Stage::Grinding,
            2 => Stage::WallSelection,
            3 => {
                self.setup_painting();
                Stage::Painting
            }
            4 => {
                self.setup_finishing();
                Stage::Finishing
            }
            _ => Stage::Title,
        };
    }

    /// Finishing stage accepted as done.
    pub fn complete(&mut self) {
        if self.stage != Stage::Finishing {
            return;
        }
        self.stage = Stage::Complete;
        self.overlays.stop();
        self.audio.stop();
        crate::log_info!("session: complete");
    }

    /// Everything back to the title screen.
    pub fn reset(&mut self) {
        self.stage = Stage::Title;
        self.collected.clear();
        self.prepared.clear();
        self.wall = None;
        self.mortar = None;
        self.grind_progress = 0;
        self.grinding = false;
        self.binder = Binder::default();
        self.surface = None;
        self.finish = None;
        self.overlays.stop();
        self.audio.stop();
        crate::log_info!("session: reset");
    }

    fn setup_painting(&mut self) {
        let mut surface = match self.seed {
            Some(seed) => PaintSurface::new_seeded(DEFAULT_WIDTH, DEFAULT_HEIGHT, seed),
            None => PaintSurface::new(DEFAULT_WIDTH, DEFAULT_HEIGHT),
        };
        // Palette defaults to the first prepared paint.
        if let Some(paint) = self.prepared.first() {
            surface.set_color(paint.color);
        }
        self.overlays.set_brush_radius(surface.brush_radius());
        self.surface = Some(surface);
        self.overlays.start();
        self.audio.start();
        crate::log_info!(
            "session: painting stage ready ({} paints on the palette)",
            self.prepared.len()
        );
    }

    fn setup_finishing(&mut self) {
        if let Some(surface) = &mut self.surface {
            // The guide is an aid, not part of the finished work.
            surface.hide_template();
            let frame = surface.frame();
            self.finish = Some(match self.seed {
                Some(seed) => FinishSurface::new_seeded(frame, seed),
                None => FinishSurface::new(frame),
            });
        }
    }

    // ---- stage 1: collection ------------------------------------------------

    /// Pick up a material.  Idempotent per id; always returns the mineral
    /// record for the info modal when the id is known and the stage is right.
    pub fn collect_material(&mut self, id: &str) -> Option<&'static Mineral> {
        if self.stage != Stage::Collecting {
            return None;
        }
        let mineral = catalog::catalog().mineral(id)?;
        if !self.collected.iter().any(|c| c == id) {
            self.collected.push(id.to_string());
            crate::log_info!(
                "session: collected '{}' ({}/{})",
                id,
                self.collected.len(),
                COLLECT_GATE
            );
        }
        Some(mineral)
    }

    // ---- stage 2: grinding --------------------------------------------------

    pub fn set_binder(&mut self, binder: Binder) {
        self.binder = binder;
    }

    pub fn binder(&self) -> Binder {
        self.binder
    }

    pub fn mortar(&self) -> Option<&str> {
        self.mortar.as_deref()
    }

    pub fn grind_progress(&self) -> u8 {
        self.grind_progress
    }

    /// Load a collected material into the empty mortar.
    pub fn place_in_mortar(&mut self, id: &str) -> bool {
        if self.stage != Stage::Grinding
            || self.mortar.is_some()
            || !self.collected.iter().any(|c| c == id)
        {
            return false;
        }
        self.mortar = Some(id.to_string());
        self.grind_progress = 0;
        true
    }

    /// Pestle pressed.  Grinding only runs while held.
    pub fn start_grinding(&mut self) {
        if self.stage == Stage::Grinding && self.mortar.is_some() {
            self.grinding = true;
        }
    }

    /// Pestle released.  Progress is kept; grinding resumes where it left off.
    pub fn stop_grinding(&mut self) {
        self.grinding = false;
    }

    /// One held tick of grinding.  At full progress the load becomes a
    /// prepared paint with the selected binder and the mortar empties.
    /// Returns the current progress.
    pub fn grind_tick(&mut self) -> u8 {
        if !self.grinding || self.stage != Stage::Grinding {
            return self.grind_progress;
        }
        let Some(id) = self.mortar.clone() else {
            return self.grind_progress;
        };
        self.grind_progress = (self.grind_progress + GRIND_STEP).min(GRIND_DONE);
        if self.grind_progress == GRIND_DONE {
            let color = catalog::catalog()
                .mineral(&id)
                .map(|m| m.rgb())
                .unwrap_or([128, 128, 128]);
            self.prepared.push(PreparedPaint {
                mineral_id: id.clone(),
                color,
                binder: self.binder,
            });
            self.mortar = None;
            self.grind_progress = 0;
            self.grinding = false;
            crate::log_info!(
                "session: prepared paint from '{}' with {} binder",
                id,
                self.binder.id()
            );
        }
        self.grind_progress
    }

    // ---- stage 3: wall selection --------------------------------------------

    /// Choose a wall.  A rough wall is recorded but rejected: the gate stays
    /// closed and the return value tells the UI to explain why.
    pub fn select_wall(&mut self, quality: WallQuality) -> bool {
        if self.stage != Stage::WallSelection {
            return false;
        }
        self.wall = Some(quality);
        match quality {
            WallQuality::Smooth => true,
            WallQuality::Rough => {
                crate::log_info!("session: rough wall rejected");
                false
            }
        }
    }

    // ---- stage 4: painting passthroughs -------------------------------------

    pub fn paint_begin(&mut self, x: f32, y: f32) {
        if self.stage != Stage::Painting {
            return;
        }
        if let Some(surface) = &mut self.surface {
            surface.begin(Point::new(x, y));
            self.overlays.pointer_moved(x, y);
        }
    }

    pub fn paint_extend(&mut self, x: f32, y: f32) {
        if self.stage != Stage::Painting {
            return;
        }
        if let Some(surface) = &mut self.surface {
            surface.extend(Point::new(x, y));
            self.overlays.pointer_moved(x, y);
        }
    }

    /// Pointer released: close the stroke and fire the particle burst at the
    /// release point.
    pub fn paint_end(&mut self) {
        if self.stage != Stage::Painting {
            return;
        }
        if let Some(surface) = &mut self.surface
            && let Some(p) = surface.end()
        {
            self.overlays.burst(p.x, p.y);
        }
    }

    pub fn paint_cancel(&mut self) {
        if let Some(surface) = &mut self.surface {
            surface.cancel();
        }
    }

    pub fn set_technique(&mut self, technique: Technique) {
        if let Some(surface) = &mut self.surface {
            surface.set_technique(technique);
            self.overlays.set_brush_radius(surface.brush_radius());
        }
    }

    pub fn set_tool(&mut self, tool: Tool) {
        if let Some(surface) = &mut self.surface {
            surface.set_tool(tool);
        }
    }

    /// Pick a palette entry by index into the prepared paints.
    pub fn select_paint(&mut self, index: usize) -> bool {
        let Some(paint) = self.prepared.get(index) else {
            return false;
        };
        let color = paint.color;
        if let Some(surface) = &mut self.surface {
            surface.set_color(color);
            true
        } else {
            false
        }
    }

    pub fn set_brush_radius(&mut self, radius: f32) {
        if let Some(surface) = &mut self.surface {
            surface.set_brush_radius(radius);
            self.overlays.set_brush_radius(surface.brush_radius());
        }
    }

    pub fn set_animal(&mut self, animal: Animal) {
        if let Some(surface) = &mut self.surface {
            surface.set_animal(animal);
        }
    }

    pub fn set_template_visible(&mut self, visible: bool) {
        if let Some(surface) = &mut self.surface {
            if visible {
                surface.show_template();
            } else {
                surface.hide_template();
            }
        }
    }

    pub fn undo(&mut self) {
        if let Some(surface) = &mut self.surface {
            surface.undo();
        }
    }

    pub fn clear_canvas(&mut self) {
        if let Some(surface) = &mut self.surface {
            surface.clear();
        }
    }

    /// One animation frame for the decorative layers.
    pub fn overlay_tick(&mut self) {
        self.overlays.tick();
    }

    // ---- stage 5: finishing -------------------------------------------------

    pub fn add_detail(&mut self, detail: Detail) {
        if self.stage != Stage::Finishing {
            return;
        }
        if let Some(finish) = &mut self.finish {
            finish.add_detail(detail);
        }
    }

    /// Lighting slider.  Feeds the particle intensity and audio gain, and
    /// surfaces the lamp narrative once on the first dip below the threshold.
    pub fn adjust_lighting(&mut self, brightness: u8) -> Option<LightingResponse> {
        if self.stage != Stage::Finishing {
            return None;
        }
        let finish = self.finish.as_mut()?;
        let response = finish.adjust_lighting(brightness);
        self.overlays.set_intensity(response.particle_intensity);
        self.audio.set_brightness(response.brightness);
        Some(response)
    }

    /// The lamp narrative text, for the UI when `show_lamp_note` fires.
    pub fn lamp_note(&self) -> Option<&'static str> {
        catalog::catalog().detail_note("lamplight")
    }

    // ---- export -------------------------------------------------------------

    /// Encode the current work as PNG bytes: the finishing frame once it
    /// exists, otherwise the painting frame.  `None` before stage 4.
    pub fn export_png(&self) -> Option<Result<Vec<u8>, ExportError>> {
        if let Some(finish) = &self.finish {
            return Some(io::encode_png(finish.frame()));
        }
        let surface = self.surface.as_ref()?;
        Some(io::encode_png(&surface.frame()))
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new_seeded(42)
    }

    /// Collect three materials and pass the collection gate.
    fn through_collection(s: &mut Session) {
        s.start();
        for id in ["romanechite", "hematite", "goethite"] {
            assert!(s.collect_material(id).is_some());
        }
        assert!(s.advance().is_some());
        s.continue_from_transition();
        assert_eq!(s.stage(), Stage::Grinding);
    }

    /// Grind two paints and pass the grinding gate.
    fn through_grinding(s: &mut Session) {
        for id in ["romanechite", "hematite"] {
            assert!(s.place_in_mortar(id));
            s.start_grinding();
            for _ in 0..50 {
                s.grind_tick();
            }
            assert_eq!(s.mortar(), None);
        }
        assert_eq!(s.prepared_paints().len(), 2);
        assert!(s.advance().is_some());
        s.continue_from_transition();
        assert_eq!(s.stage(), Stage::WallSelection);
    }

    fn through_wall(s: &mut Session) {
        assert!(s.select_wall(WallQuality::Smooth));
        assert!(s.advance().is_some());
        s.continue_from_transition();
        assert_eq!(s.stage(), Stage::Painting);
    }

    #[test]
    fn full_walkthrough_reaches_complete() {
        let mut s = session();
        through_collection(&mut s);
        through_grinding(&mut s);
        through_wall(&mut s);

        s.paint_begin(200.0, 200.0);
        s.paint_extend(260.0, 220.0);
        s.paint_end();

        assert!(s.advance().is_some());
        s.continue_from_transition();
        assert_eq!(s.stage(), Stage::Finishing);

        s.add_detail(Detail::Eyes);
        s.complete();
        assert_eq!(s.stage(), Stage::Complete);
        assert_eq!(s.stage_index(), 5);
    }

    #[test]
    fn advance_is_blocked_until_three_materials() {
        let mut s = session();
        s.start();
        s.collect_material("romanechite");
        s.collect_material("hematite");
        assert!(!s.gate_satisfied());
        assert!(s.advance().is_none());
        assert_eq!(s.stage(), Stage::Collecting);

        s.collect_material("goethite");
        assert!(s.gate_satisfied());
    }

    #[test]
    fn duplicate_collection_is_idempotent() {
        let mut s = session();
        s.start();
        for _ in 0..5 {
            assert!(s.collect_material("hematite").is_some());
        }
        assert_eq!(s.collected().len(), 1);
        assert!(!s.gate_satisfied());
    }

    #[test]
    fn unknown_material_is_rejected() {
        let mut s = session();
        s.start();
        assert!(s.collect_material("obsidian").is_none());
        assert!(s.collected().is_empty());
    }

    #[test]
    fn collecting_outside_stage_one_is_a_noop() {
        let mut s = session();
        assert!(s.collect_material("hematite").is_none());
        through_collection(&mut s);
        assert!(s.collect_material("hausmannite").is_none());
        assert_eq!(s.collected().len(), 3);
    }

    #[test]
    fn grinding_fills_at_two_per_tick_and_produces_paint() {
        let mut s = session();
        through_collection(&mut s);
        assert!(s.place_in_mortar("hematite"));
        s.start_grinding();
        assert_eq!(s.grind_tick(), 2);
        for _ in 0..49 {
            s.grind_tick();
        }
        // 50th tick completed the grind: paint appears, mortar empties.
        assert_eq!(s.prepared_paints().len(), 1);
        assert_eq!(s.prepared_paints()[0].mineral_id, "hematite");
        assert_eq!(s.prepared_paints()[0].color, [0x8B, 0x45, 0x13]);
        assert_eq!(s.mortar(), None);
        assert_eq!(s.grind_progress(), 0);
    }

    #[test]
    fn grinding_pauses_on_release_and_resumes() {
        let mut s = session();
        through_collection(&mut s);
        s.place_in_mortar("goethite");
        s.start_grinding();
        for _ in 0..10 {
            s.grind_tick();
        }
        s.stop_grinding();
        let held = s.grind_progress();
        assert_eq!(held, 20);
        s.grind_tick();
        assert_eq!(s.grind_progress(), held, "no progress while released");
        s.start_grinding();
        s.grind_tick();
        assert_eq!(s.grind_progress(), held + 2);
    }

    #[test]
    fn mortar_rejects_uncollected_and_double_loads() {
        let mut s = session();
        through_collection(&mut s);
        assert!(!s.place_in_mortar("hausmannite"), "never collected");
        assert!(s.place_in_mortar("romanechite"));
        assert!(!s.place_in_mortar("hematite"), "mortar occupied");
    }

    #[test]
    fn binder_is_recorded_on_the_prepared_paint() {
        let mut s = session();
        through_collection(&mut s);
        s.set_binder(Binder::Marrow);
        s.place_in_mortar("romanechite");
        s.start_grinding();
        for _ in 0..50 {
            s.grind_tick();
        }
        assert_eq!(s.prepared_paints()[0].binder, Binder::Marrow);
    }

    #[test]
    fn rough_wall_is_recorded_but_rejected() {
        let mut s = session();
        through_collection(&mut s);
        through_grinding(&mut s);
        assert!(!s.select_wall(WallQuality::Rough));
        assert_eq!(s.wall(), Some(WallQuality::Rough));
        assert!(!s.gate_satisfied());
        assert!(s.advance().is_none());

        assert!(s.select_wall(WallQuality::Smooth));
        assert!(s.gate_satisfied());
    }

    #[test]
    fn painting_setup_runs_once_with_palette_and_overlays() {
        let mut s = session();
        through_collection(&mut s);
        through_grinding(&mut s);
        through_wall(&mut s);

        let surface = s.surface().unwrap();
        // Palette defaults to the first prepared paint (romanechite).
        assert_eq!(surface.color(), [0x2C, 0x2C, 0x2C]);
        assert!(s.overlays().running());
    }

    #[test]
    fn stroke_release_bursts_particles() {
        let mut s = session();
        through_collection(&mut s);
        through_grinding(&mut s);
        through_wall(&mut s);

        let base = s.overlays().particles().mote_count();
        s.paint_begin(200.0, 200.0);
        s.paint_extend(240.0, 210.0);
        s.paint_end();
        assert_eq!(s.overlays().particles().mote_count(), base + 6);
    }

    #[test]
    fn transitions_carry_narrative_content() {
        let mut s = session();
        s.start();
        for id in ["romanechite", "hematite", "goethite"] {
            s.collect_material(id);
        }
        let narrative = s.advance().unwrap();
        assert!(narrative.title.contains("Mineral"));
        assert_eq!(s.stage(), Stage::Transition(1));
        assert_eq!(s.stage_index(), 1);
    }

    #[test]
    fn finishing_frame_excludes_the_guide() {
        let mut s = session();
        through_collection(&mut s);
        through_grinding(&mut s);
        through_wall(&mut s);
        s.paint_begin(200.0, 200.0);
        s.paint_end();
        s.advance();
        s.continue_from_transition();

        let finish_frame = s.finish_surface().unwrap().frame().clone();
        assert_eq!(&finish_frame, s.surface().unwrap().paint_buffer());
    }

    #[test]
    fn lighting_links_overlays_and_audio() {
        let mut s = session();
        through_collection(&mut s);
        through_grinding(&mut s);
        through_wall(&mut s);
        s.advance();
        s.continue_from_transition();

        let r = s.adjust_lighting(30).unwrap();
        assert!(r.show_lamp_note);
        assert!(s.lamp_note().is_some());
        assert!((s.overlays().particles().intensity() - r.particle_intensity).abs() < 1e-6);
        // Second dip stays quiet.
        assert!(!s.adjust_lighting(10).unwrap().show_lamp_note);
    }

    #[test]
    fn export_is_unavailable_before_painting() {
        let mut s = session();
        s.start();
        assert!(s.export_png().is_none());
    }

    #[test]
    fn export_yields_png_bytes() {
        let mut s = session();
        through_collection(&mut s);
        through_grinding(&mut s);
        through_wall(&mut s);
        let bytes = s.export_png().unwrap().unwrap();
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn reset_from_painting_restores_a_fresh_session() {
        let mut s = session();
        through_collection(&mut s);
        through_grinding(&mut s);
        through_wall(&mut s);
        s.paint_begin(100.0, 100.0);
        s.paint_end();

        s.reset();
        assert_eq!(s.stage(), Stage::Title);
        assert_eq!(s.stage_index(), 0);
        assert!(s.collected().is_empty());
        assert!(s.prepared_paints().is_empty());
        assert!(s.wall().is_none());
        assert!(s.surface().is_none());
        assert!(s.finish_surface().is_none());
        assert!(!s.overlays().running());
    }

    #[test]
    fn completing_requires_the_finishing_stage() {
        let mut s = session();
        s.start();
        s.complete();
        assert_eq!(s.stage(), Stage::Collecting);
    }
}
