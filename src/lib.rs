//! cavepaint — core engine for an interactive cave painting simulation.
//!
//! Five linear stages recreate the making of a Lascaux-style painting:
//! collecting mineral pigments, grinding them into paint, choosing a wall,
//! painting freehand over a faint animal guide, and finishing under lamplight.
//! The crate holds all simulation state and rendering; a presentation layer
//! drives it through [`stages::Session`] and composites the returned frames.

pub mod audio;
pub mod canvas;
pub mod catalog;
pub mod finish;
pub mod io;
pub mod logger;
pub mod overlay;
pub mod stages;
pub mod templates;

pub use canvas::{PaintSurface, Point, Technique, Tool};
pub use catalog::{catalog, Mineral, Narrative};
pub use finish::{Detail, FinishSurface, LightingResponse};
pub use io::ExportError;
pub use overlay::OverlayLoop;
pub use stages::{Binder, PreparedPaint, Session, Stage, WallQuality};
pub use templates::Animal;
