// Types for snapshot persistence
// The same document is used for durable storage and for file import/export

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::sequencer::timeline::Tempo;
use crate::synth::oscillator::Waveform;

/// Grid in transport form: decimal step index -> note names
pub type EncodedSequence = BTreeMap<String, Vec<String>>;

/// Display color of one sequencer (hex strings)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub border: String,
    #[serde(default)]
    pub line: String,
}

impl Color {
    /// Parse a `#rrggbb` string into RGB components
    pub fn parse_hex(hex: &str) -> Option<[u8; 3]> {
        let digits = hex.strip_prefix('#')?;
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some([channel(0)?, channel(2)?, channel(4)?])
    }
}

/// Entry of the built-in palette
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteColor {
    pub name: &'static str,
    pub header: &'static str,
    pub text: &'static str,
    pub border: &'static str,
    pub line: &'static str,
}

impl From<&PaletteColor> for Color {
    fn from(color: &PaletteColor) -> Self {
        Self {
            header: color.header.to_string(),
            text: color.text.to_string(),
            border: color.border.to_string(),
            line: color.line.to_string(),
        }
    }
}

const fn palette(
    name: &'static str,
    header: &'static str,
    text: &'static str,
    border: &'static str,
    line: &'static str,
) -> PaletteColor {
    PaletteColor {
        name,
        header,
        text,
        border,
        line,
    }
}

/// Colors cycled through as sequencers are added
pub const PALETTE: [PaletteColor; 12] = [
    palette("blue", "#bcdefb", "#08316d", "#90caf9", "#0067ff"),
    palette("pink", "#f8bbd0", "#880e4f", "#f48fb1", "#ff0088"),
    palette("red", "#ffcdd2", "#b71c1c", "#ef9a9a", "#d80000"),
    palette("orange", "#ffe0b2", "#e65100", "#ffcc80", "#ff5900"),
    palette("yellow", "#fff9c4", "#f57f17", "#fff59d", "#ffa800"),
    palette("green", "#c8e6c9", "#1b5e20", "#a5d6a7", "#14b323"),
    palette("purple", "#e1bee7", "#4a148c", "#ce93d8", "#8724ff"),
    palette("brown", "#d7ccc8", "#4e342e", "#a1887f", "#814c41"),
    palette("teal", "#b2dfdb", "#004d40", "#80cbc4", "#23ae96"),
    palette("lime", "#f0ffb2", "#7cb518", "#d4fc79", "#b2ff59"),
    palette("indigo", "#c5cae9", "#1a237e", "#9fa8da", "#3f51b5"),
    palette("deepOrange", "#ffccbc", "#bf360c", "#ffab91", "#ff5722"),
];

/// Palette color for the sequencer added at list position `position`
pub fn palette_color(position: usize) -> Color {
    Color::from(&PALETTE[position % PALETTE.len()])
}

/// Exported state of one sequencer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencerData {
    pub waveform: Waveform,
    pub amplitude: f32,
    pub cols: usize,
    #[serde(default)]
    pub sequence: EncodedSequence,
}

/// Sequencer entry of a snapshot, keyed by list position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencerEntry {
    pub index: usize,
    #[serde(default)]
    pub color: Color,
    #[serde(flatten)]
    pub data: SequencerData,
}

/// Whole ensemble: shared tempo and every sequencer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub tempo: Tempo,
    #[serde(default)]
    pub sequencers: Vec<SequencerEntry>,
}

impl PersistedSnapshot {
    pub fn new(tempo: Tempo) -> Self {
        Self {
            tempo,
            sequencers: Vec::new(),
        }
    }

    /// Entry stored for list position `index`
    pub fn entry(&self, index: usize) -> Option<&SequencerEntry> {
        self.sequencers.iter().find(|s| s.index == index)
    }

    /// Replace the entry at `index`, or append it
    pub fn upsert(&mut self, entry: SequencerEntry) {
        match self.sequencers.iter_mut().find(|s| s.index == entry.index) {
            Some(existing) => *existing = entry,
            None => self.sequencers.push(entry),
        }
    }
}

impl Default for PersistedSnapshot {
    fn default() -> Self {
        Self::new(Tempo::default())
    }
}
