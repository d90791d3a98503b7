// Note representation for the sequencer
// Static chromatic table C3..C7 plus name parsing ("C#4", "Eb3", "A4")

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Note letter (A-G)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    pub fn as_char(&self) -> char {
        match self {
            Letter::C => 'C',
            Letter::D => 'D',
            Letter::E => 'E',
            Letter::F => 'F',
            Letter::G => 'G',
            Letter::A => 'A',
            Letter::B => 'B',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(Letter::C),
            'D' => Some(Letter::D),
            'E' => Some(Letter::E),
            'F' => Some(Letter::F),
            'G' => Some(Letter::G),
            'A' => Some(Letter::A),
            'B' => Some(Letter::B),
            _ => None,
        }
    }
}

/// Accidental applied to the letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accidental {
    Natural,
    Sharp,
    Flat,
}

impl Accidental {
    pub fn symbol(&self) -> &'static str {
        match self {
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::Flat => "b",
        }
    }
}

/// A pitch of the sequencer grid
///
/// Equality and hashing only look at letter, octave and accidental:
/// the frequency is derived from the table and never compared.
#[derive(Debug, Clone, Copy)]
pub struct Note {
    pub letter: Letter,
    pub octave: i8,
    pub accidental: Accidental,
    /// Frequency in Hz
    pub frequency: f32,
}

impl PartialEq for Note {
    fn eq(&self, other: &Self) -> bool {
        self.letter == other.letter
            && self.octave == other.octave
            && self.accidental == other.accidental
    }
}

impl Eq for Note {}

impl Hash for Note {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.letter.hash(state);
        self.octave.hash(state);
        self.accidental.hash(state);
    }
}

const fn entry(letter: Letter, octave: i8, accidental: Accidental, frequency: f32) -> Note {
    Note {
        letter,
        octave,
        accidental,
        frequency,
    }
}

/// Chromatic table, ascending from C3 to C7
pub const NOTES: [Note; 49] = {
    use Accidental::{Flat, Natural, Sharp};
    use Letter::{A, B, C, D, E, F, G};
    [
        entry(C, 3, Natural, 130.81),
        entry(C, 3, Sharp, 138.59),
        entry(D, 3, Natural, 146.83),
        entry(E, 3, Flat, 155.56),
        entry(E, 3, Natural, 164.81),
        entry(F, 3, Natural, 174.61),
        entry(F, 3, Sharp, 185.00),
        entry(G, 3, Natural, 196.00),
        entry(G, 3, Sharp, 207.65),
        entry(A, 3, Natural, 220.00),
        entry(B, 3, Flat, 233.08),
        entry(B, 3, Natural, 246.94),
        entry(C, 4, Natural, 261.63),
        entry(C, 4, Sharp, 277.18),
        entry(D, 4, Natural, 293.66),
        entry(E, 4, Flat, 311.13),
        entry(E, 4, Natural, 329.63),
        entry(F, 4, Natural, 349.23),
        entry(F, 4, Sharp, 369.99),
        entry(G, 4, Natural, 392.00),
        entry(G, 4, Sharp, 415.30),
        entry(A, 4, Natural, 440.00),
        entry(B, 4, Flat, 466.16),
        entry(B, 4, Natural, 493.88),
        entry(C, 5, Natural, 523.25),
        entry(C, 5, Sharp, 554.37),
        entry(D, 5, Natural, 587.33),
        entry(E, 5, Flat, 622.25),
        entry(E, 5, Natural, 659.25),
        entry(F, 5, Natural, 698.46),
        entry(F, 5, Sharp, 739.99),
        entry(G, 5, Natural, 783.99),
        entry(G, 5, Sharp, 830.61),
        entry(A, 5, Natural, 880.00),
        entry(B, 5, Flat, 932.33),
        entry(B, 5, Natural, 987.77),
        entry(C, 6, Natural, 1046.50),
        entry(C, 6, Sharp, 1108.73),
        entry(D, 6, Natural, 1174.66),
        entry(E, 6, Flat, 1244.51),
        entry(E, 6, Natural, 1318.51),
        entry(F, 6, Natural, 1396.91),
        entry(F, 6, Sharp, 1479.98),
        entry(G, 6, Natural, 1568.00),
        entry(G, 6, Sharp, 1661.22),
        entry(A, 6, Natural, 1760.00),
        entry(B, 6, Flat, 1864.66),
        entry(B, 6, Natural, 1975.53),
        entry(C, 7, Natural, 2093.00),
    ]
};

/// Quick-pick notes: the C major scale from C4 to C5
pub const COMMON_NOTES: [Note; 8] = [
    NOTES[12], NOTES[14], NOTES[16], NOTES[17], NOTES[19], NOTES[21], NOTES[23], NOTES[24],
];

/// Error returned when a note name cannot be mapped to the table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NoteParseError {
    #[error("note name is empty")]
    Empty,

    #[error("malformed note name: {0:?}")]
    Malformed(String),

    #[error("note {0:?} is outside the C3-C7 table")]
    NotInTable(String),
}

impl Note {
    /// Look up a table entry by its components
    pub fn lookup(letter: Letter, octave: i8, accidental: Accidental) -> Option<Note> {
        NOTES
            .iter()
            .find(|n| n.letter == letter && n.octave == octave && n.accidental == accidental)
            .copied()
    }

    /// Parse a note name, returning `None` for anything outside the table
    pub fn from_name(name: &str) -> Option<Note> {
        name.parse().ok()
    }

    /// Get the note name (e.g., "C4", "C#4", "Eb3")
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// True for sharps and flats (the black keys of the grid)
    pub fn is_altered(&self) -> bool {
        self.accidental != Accidental::Natural
    }

    /// Position of this note in `NOTES`
    pub fn table_index(&self) -> Option<usize> {
        NOTES.iter().position(|n| n == self)
    }
}

impl FromStr for Note {
    type Err = NoteParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let letter = match chars.next() {
            Some(c) => Letter::from_char(c)
                .ok_or_else(|| NoteParseError::Malformed(trimmed.to_string()))?,
            None => return Err(NoteParseError::Empty),
        };

        let rest = chars.as_str();
        let (accidental, octave_str) = if let Some(r) = rest.strip_prefix('#') {
            (Accidental::Sharp, r)
        } else if let Some(r) = rest.strip_prefix('♯') {
            (Accidental::Sharp, r)
        } else if let Some(r) = rest.strip_prefix('b') {
            (Accidental::Flat, r)
        } else if let Some(r) = rest.strip_prefix('♭') {
            (Accidental::Flat, r)
        } else {
            (Accidental::Natural, rest)
        };

        let octave: i8 = octave_str
            .parse()
            .map_err(|_| NoteParseError::Malformed(trimmed.to_string()))?;

        Note::lookup(letter, octave, accidental)
            .ok_or_else(|| NoteParseError::NotInTable(trimmed.to_string()))
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.letter.as_char(),
            self.accidental.symbol(),
            self.octave
        )
    }
}
