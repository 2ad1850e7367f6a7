//! The fixed tone catalog.
//!
//! Every flag carries one [`Tone`]: a named pairing of a General MIDI
//! program number and a pitch. There are exactly twelve of them, four
//! instrument families with three octave variants each. A tone can be used
//! by at most one flag per document, so the catalog doubles as the pool of
//! flags a single file can hold.

use serde::{Deserialize, Serialize};

/// Instrument family of a tone, carrying its General MIDI program number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    Piano,
    Marimba,
    Guitar,
    Violin,
}

impl Instrument {
    /// General MIDI program number (0–127).
    pub const fn program(self) -> u8 {
        match self {
            Instrument::Piano => 0,
            Instrument::Marimba => 12,
            Instrument::Guitar => 24,
            Instrument::Violin => 40,
        }
    }

    pub fn from_program(program: u8) -> Option<Self> {
        match program {
            0 => Some(Instrument::Piano),
            12 => Some(Instrument::Marimba),
            24 => Some(Instrument::Guitar),
            40 => Some(Instrument::Violin),
            _ => None,
        }
    }
}

/// A named instrument/pitch pair attached to a flag.
///
/// Serializes as `{"name", "instrument", "note"}`, the shape used in
/// persisted records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tone {
    pub name: String,
    pub instrument: u8,
    pub note: String,
}

impl Tone {
    /// Look a tone up in the catalog by its name (e.g. `"Violin2"`).
    pub fn by_name(name: &str) -> Option<Tone> {
        catalog().iter().find(|t| t.name == name).cloned()
    }

    /// The instrument family, if the program number belongs to the catalog.
    pub fn family(&self) -> Option<Instrument> {
        Instrument::from_program(self.instrument)
    }
}

const TABLE: [(&str, Instrument, &str); 12] = [
    ("Piano1", Instrument::Piano, "D2"),
    ("Piano2", Instrument::Piano, "D4"),
    ("Piano3", Instrument::Piano, "D6"),
    ("Violin1", Instrument::Violin, "E2"),
    ("Violin2", Instrument::Violin, "E4"),
    ("Violin3", Instrument::Violin, "E6"),
    ("Guitar1", Instrument::Guitar, "F2"),
    ("Guitar2", Instrument::Guitar, "F4"),
    ("Guitar3", Instrument::Guitar, "F6"),
    ("Marimba1", Instrument::Marimba, "G2"),
    ("Marimba2", Instrument::Marimba, "G4"),
    ("Marimba3", Instrument::Marimba, "G6"),
];

/// The full catalog, in display order.
pub fn catalog() -> &'static [Tone] {
    static CATALOG: std::sync::OnceLock<Vec<Tone>> = std::sync::OnceLock::new();
    CATALOG.get_or_init(|| {
        TABLE
            .iter()
            .map(|(name, instrument, note)| Tone {
                name: (*name).to_string(),
                instrument: instrument.program(),
                note: (*note).to_string(),
            })
            .collect()
    })
}

/// Catalog tones not present in `used`, in catalog order.
pub fn available<'a, I>(used: I) -> Vec<Tone>
where
    I: IntoIterator<Item = &'a Tone>,
{
    let used: Vec<&Tone> = used.into_iter().collect();
    catalog()
        .iter()
        .filter(|t| !used.iter().any(|u| u.name == t.name))
        .cloned()
        .collect()
}
