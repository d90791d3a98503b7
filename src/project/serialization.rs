// Serialization utilities for snapshot persistence
// Sequence codec (Grid <-> string-keyed map) and JSON documents

use crate::project::ProjectError;
use crate::project::types::*;
use crate::sequencer::note::Note;
use crate::sequencer::pattern::{Grid, SequencerState};
use tracing::debug;

/// Encode a grid into its string-keyed form. Empty steps are never written.
pub fn encode_sequence(grid: &Grid) -> EncodedSequence {
    grid.iter()
        .filter(|(_, notes)| !notes.is_empty())
        .map(|(step, notes)| {
            let names = notes.iter().map(Note::name).collect();
            (step.to_string(), names)
        })
        .collect()
}

/// Decode a string-keyed sequence. Unknown note names and non-numeric step
/// keys are dropped, never reported as errors.
pub fn decode_sequence(sequence: &EncodedSequence) -> Grid {
    let mut grid = Grid::new();
    for (key, names) in sequence {
        let Ok(step) = key.trim().parse::<usize>() else {
            debug!(key = %key, "dropping non-numeric step key");
            continue;
        };
        for name in names {
            match name.parse::<Note>() {
                Ok(note) => {
                    grid.insert(step, note);
                }
                Err(e) => debug!(step, error = %e, "dropping note"),
            }
        }
    }
    grid
}

/// Export a sequencer state into its persisted form
pub fn state_to_data(state: &SequencerState) -> SequencerData {
    SequencerData {
        waveform: state.waveform,
        amplitude: state.amplitude(),
        cols: state.columns(),
        sequence: encode_sequence(&state.grid),
    }
}

/// Rebuild a sequencer state; amplitude and column count are clamped
pub fn data_to_state(data: &SequencerData) -> SequencerState {
    SequencerState::new(
        data.waveform,
        data.amplitude,
        data.cols,
        decode_sequence(&data.sequence),
    )
}

/// Serialize a snapshot as indented JSON
pub fn snapshot_to_json(snapshot: &PersistedSnapshot) -> Result<String, ProjectError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Parse a snapshot document
pub fn snapshot_from_json(json: &str) -> Result<PersistedSnapshot, ProjectError> {
    Ok(serde_json::from_str(json)?)
}
