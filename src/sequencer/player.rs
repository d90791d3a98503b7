// Sequencer Player - Compiles a grid into a loop of timed triggers
// The plan is frozen when playback starts; later edits apply on the next play

use crate::sequencer::note::Note;
use crate::sequencer::pattern::{SequencerState, Step};
use crate::sequencer::timeline::Tempo;

/// One polyphonic trigger of the loop
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub step: Step,
    /// Offset from the start of each loop, in seconds
    pub offset: f64,
    pub notes: Vec<Note>,
}

impl Trigger {
    pub fn frequencies(&self) -> Vec<f32> {
        self.notes.iter().map(|n| n.frequency).collect()
    }
}

/// Compiled schedule of one sequencer
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackPlan {
    /// Clock time of the first loop, in seconds
    pub started_at: f64,
    /// One sixteenth note, in seconds
    pub step_duration: f64,
    /// This sequencer's own column count
    pub columns: usize,
    /// Column count of the loop restart (the longest grid when managed)
    pub loop_columns: usize,
    /// Occupied steps below `columns`, ascending
    pub triggers: Vec<Trigger>,
}

impl PlaybackPlan {
    /// Compile `state` at `tempo`. `max_columns` is the ensemble's longest
    /// grid; the loop never restarts before this grid's own last column.
    pub fn compile(
        state: &SequencerState,
        tempo: Tempo,
        max_columns: Option<usize>,
        started_at: f64,
    ) -> Self {
        let columns = state.columns();
        let loop_columns = max_columns.map_or(columns, |max| max.max(columns));
        let step_duration = tempo.step_duration();

        let triggers = state
            .grid
            .iter()
            .filter(|(step, notes)| *step < columns && !notes.is_empty())
            .map(|(step, notes)| Trigger {
                step,
                offset: tempo.step_offset(step),
                notes: notes.to_vec(),
            })
            .collect();

        Self {
            started_at,
            step_duration,
            columns,
            loop_columns,
            triggers,
        }
    }

    /// Interval of the loop-restart schedule
    pub fn restart_interval(&self) -> f64 {
        self.loop_columns as f64 * self.step_duration
    }
}
