//! Static content store — mineral catalog, transition narratives, fauna and
//! technique notes.
//!
//! Everything here is read-only reference data, deserialized once from the
//! embedded `assets/catalog.json` and cached for the lifetime of the process.
//! Lookups by unknown identifier return `None`; the store never fails after a
//! successful load.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Deserialize;

static CATALOG: OnceLock<Catalog> = OnceLock::new();

const CATALOG_JSON: &str = include_str!("../assets/catalog.json");

/// A named pigment source with provenance metadata.  Immutable, loaded once.
#[derive(Clone, Debug, Deserialize)]
pub struct Mineral {
    pub id: String,
    pub name: String,
    /// Display color as `#RRGGBB`.
    pub color: String,
    pub source: String,
    pub distance: String,
    /// Preferred application technique id (`brush`, `spray`, `multiple`, ...).
    pub technique: String,
    #[serde(default)]
    pub location: Option<String>,
    pub fact: String,
    pub citation: String,
    #[serde(default)]
    pub rarity: Option<String>,
}

impl Mineral {
    /// Parse the `#RRGGBB` display color into RGB bytes.
    /// Falls back to mid-grey on a malformed entry rather than failing a lookup.
    pub fn rgb(&self) -> [u8; 3] {
        parse_hex_color(&self.color).unwrap_or([128, 128, 128])
    }
}

/// A titled block of narrative text (transition interstitials, fauna notes,
/// technique notes).
#[derive(Clone, Debug, Deserialize)]
pub struct Narrative {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct Catalog {
    minerals: Vec<Mineral>,
    transitions: HashMap<String, Narrative>,
    fauna: HashMap<String, Narrative>,
    techniques: HashMap<String, Narrative>,
    binders: HashMap<String, String>,
    details: HashMap<String, String>,
}

impl Catalog {
    pub fn mineral(&self, id: &str) -> Option<&Mineral> {
        self.minerals.iter().find(|m| m.id == id)
    }

    pub fn minerals(&self) -> &[Mineral] {
        &self.minerals
    }

    /// Interstitial narrative shown when advancing out of `stage` (1–4).
    pub fn transition(&self, stage: u8) -> Option<&Narrative> {
        self.transitions.get(stage.to_string().as_str())
    }

    pub fn fauna(&self, animal: &str) -> Option<&Narrative> {
        self.fauna.get(animal)
    }

    pub fn technique(&self, id: &str) -> Option<&Narrative> {
        self.techniques.get(id)
    }

    /// Human label for a binder id (`fat`, `marrow`, `water`).
    pub fn binder_label(&self, id: &str) -> Option<&str> {
        self.binders.get(id).map(String::as_str)
    }

    /// One-line note for a finishing detail (`eyes`, `horns`, `shading`,
    /// `lamplight`).
    pub fn detail_note(&self, id: &str) -> Option<&str> {
        self.details.get(id).map(String::as_str)
    }
}

/// Access the process-wide catalog, deserializing the embedded asset on first
/// use.  The asset ships inside the binary, so a parse failure is a build
/// defect; it is logged and surfaces as an empty catalog rather than a panic.
pub fn catalog() -> &'static Catalog {
    CATALOG.get_or_init(|| match serde_json::from_str(CATALOG_JSON) {
        Ok(c) => c,
        Err(e) => {
            crate::log_err!("catalog: embedded asset failed to parse: {}", e);
            Catalog {
                minerals: Vec::new(),
                transitions: HashMap::new(),
                fauna: HashMap::new(),
                techniques: HashMap::new(),
                binders: HashMap::new(),
                details: HashMap::new(),
            }
        }
    })
}

fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}
