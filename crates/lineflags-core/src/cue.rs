//! Audio cue resolution for a cursor line.
//!
//! A flagged line plays its own tone. Any other line falls back to a note
//! picked from the context classifier's description of that line (for
//! example `"for x in range inside function main"`): the leading keyword
//! picks the pitch class and the nesting depth raises the octave.

use serde::Serialize;

use crate::models::Document;
use crate::tone::{Instrument, Tone};

/// What the audio sink is asked to play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cue {
    pub instrument: u8,
    pub note: String,
}

/// The cue for `line`: the flag's tone if there is one, else the fallback
/// note derived from `context` on piano.
pub fn resolve_cue(doc: Option<&Document>, line: usize, context: &str) -> Cue {
    match doc.and_then(|d| d.flag_at(line)) {
        Some(flag) => Cue::from(&flag.tone),
        None => Cue {
            instrument: Instrument::Piano.program(),
            note: fallback_note(context),
        },
    }
}

impl From<&Tone> for Cue {
    fn from(tone: &Tone) -> Self {
        Cue {
            instrument: tone.instrument,
            note: tone.note.clone(),
        }
    }
}

/// Occurrences of `needle`, overlapping ones included.
fn count(haystack: &str, needle: &str) -> usize {
    haystack
        .char_indices()
        .filter(|(i, _)| haystack[*i..].starts_with(needle))
        .count()
}

/// Map a context description to a note name such as `"g#3"`.
pub fn fallback_note(context: &str) -> String {
    let depth = ["for", "while", "if", "else"]
        .iter()
        .map(|k| count(context, k))
        .sum::<usize>();
    let octave = depth + 2;

    let pitch = |p: &str| format!("{}{}", p, octave);
    if context.starts_with("for") {
        pitch("b")
    } else if context.starts_with("while") {
        pitch("d")
    } else if context.starts_with("if") {
        pitch("g#")
    } else if context.starts_with("else") {
        pitch("a#")
    } else if context.starts_with("elif") {
        pitch("a")
    } else if context.starts_with("async") {
        "c4".to_string()
    } else if context.starts_with("function") {
        "c#4".to_string()
    } else if context.starts_with("Comment") {
        pitch("f")
    } else if context.starts_with("try") {
        pitch("eb")
    } else if context.starts_with("except") {
        pitch("e")
    } else if context.contains("BLANK") {
        pitch("f#")
    } else {
        pitch("g")
    }
}
