// Timeline - Musical time representation
// Tempo and the step grid: one step is a sixteenth note

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sixteenth notes per quarter-note beat
pub const STEPS_PER_BEAT: u32 = 4;

/// Tempo in BPM (Beats Per Minute)
///
/// Always within [`Tempo::MIN_BPM`, `Tempo::MAX_BPM`]: every write clamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct Tempo {
    bpm: u16,
}

impl Tempo {
    pub const MIN_BPM: u16 = 1;
    pub const MAX_BPM: u16 = 200;
    pub const DEFAULT_BPM: u16 = 120;

    /// Creates a new tempo, clamping into [1, 200]
    pub fn new(bpm: i64) -> Self {
        let clamped = bpm.clamp(Self::MIN_BPM as i64, Self::MAX_BPM as i64);
        Self {
            bpm: clamped as u16,
        }
    }

    /// Get BPM value
    pub fn bpm(&self) -> u16 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm as f64
    }

    /// Duration of one step (a sixteenth note) in seconds
    pub fn step_duration(&self) -> f64 {
        self.beat_duration_seconds() / STEPS_PER_BEAT as f64
    }

    /// Offset of a step from the start of the loop, in seconds
    pub fn step_offset(&self, step: usize) -> f64 {
        step as f64 * self.step_duration()
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            bpm: Self::DEFAULT_BPM,
        }
    }
}

impl From<i64> for Tempo {
    fn from(bpm: i64) -> Self {
        Self::new(bpm)
    }
}

impl From<Tempo> for i64 {
    fn from(tempo: Tempo) -> Self {
        tempo.bpm as i64
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} BPM", self.bpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo() {
        let tempo = Tempo::new(120);
        assert_eq!(tempo.bpm(), 120);
        assert_eq!(tempo.beat_duration_seconds(), 0.5);
        assert_eq!(tempo.step_duration(), 0.125);
        assert_eq!(tempo.to_string(), "120 BPM");
    }

    #[test]
    fn test_tempo_clamps_on_every_write() {
        assert_eq!(Tempo::new(500).bpm(), 200);
        assert_eq!(Tempo::new(-5).bpm(), 1);
        assert_eq!(Tempo::new(0).bpm(), 1);
        assert_eq!(Tempo::new(201).bpm(), 200);
        assert_eq!(Tempo::new(1).bpm(), 1);
    }

    #[test]
    fn test_step_offset() {
        let tempo = Tempo::new(120);
        assert_eq!(tempo.step_offset(16), 2.0);
        assert_eq!(tempo.step_offset(3), 0.375);
    }

    #[test]
    fn test_tempo_deserialization_clamps() {
        let tempo: Tempo = serde_json::from_str("900").unwrap();
        assert_eq!(tempo.bpm(), 200);
        assert_eq!(serde_json::to_string(&Tempo::new(90)).unwrap(), "90");
    }
}
