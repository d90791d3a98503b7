// Pattern - The step grid of one sequencer
// A grid maps step columns to the set of notes triggered on that step

use crate::sequencer::note::Note;
use crate::synth::oscillator::Waveform;
use std::collections::BTreeMap;

/// Column index into a grid
pub type Step = usize;

/// Sparse step -> notes mapping
///
/// A step never holds two equal notes and never holds an empty set:
/// removing the last note of a step removes the step.
/// Note order is insertion order (display only); equality ignores it.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    steps: BTreeMap<Step, Vec<Note>>,
}

impl Grid {
    /// Create an empty grid
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes on a step (empty slice for a silent step)
    pub fn notes_at(&self, step: Step) -> &[Note] {
        self.steps.get(&step).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check whether a note is set on a step
    pub fn contains(&self, step: Step, note: &Note) -> bool {
        self.notes_at(step).contains(note)
    }

    /// Add a note to a step. Returns false if it was already present.
    pub fn insert(&mut self, step: Step, note: Note) -> bool {
        let notes = self.steps.entry(step).or_default();
        if notes.contains(&note) {
            return false;
        }
        notes.push(note);
        true
    }

    /// Remove a note from a step, dropping the step when it becomes empty.
    /// Returns false if the note was not present.
    pub fn remove(&mut self, step: Step, note: &Note) -> bool {
        let Some(notes) = self.steps.get_mut(&step) else {
            return false;
        };
        let Some(index) = notes.iter().position(|n| n == note) else {
            return false;
        };
        notes.remove(index);
        if notes.is_empty() {
            self.steps.remove(&step);
        }
        true
    }

    /// Add the note if absent, remove it if present.
    /// Returns true when the note ends up set.
    pub fn toggle(&mut self, step: Step, note: Note) -> bool {
        if self.remove(step, &note) {
            false
        } else {
            self.insert(step, note)
        }
    }

    /// Delete column `index`: its notes are dropped and every later step
    /// moves down by one. Earlier steps are untouched.
    pub fn delete_column(&mut self, index: Step) {
        let tail = self.steps.split_off(&index);
        for (step, notes) in tail {
            if step > index {
                self.steps.insert(step - 1, notes);
            }
        }
    }

    /// Occupied steps in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (Step, &[Note])> {
        self.steps.iter().map(|(step, notes)| (*step, notes.as_slice()))
    }

    /// Number of occupied steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl PartialEq for Grid {
    fn eq(&self, other: &Self) -> bool {
        self.steps.len() == other.steps.len()
            && self.steps.iter().all(|(step, notes)| {
                let theirs = other.notes_at(*step);
                theirs.len() == notes.len() && notes.iter().all(|n| theirs.contains(n))
            })
    }
}

impl Eq for Grid {}

impl FromIterator<(Step, Note)> for Grid {
    fn from_iter<I: IntoIterator<Item = (Step, Note)>>(iter: I) -> Self {
        let mut grid = Grid::new();
        for (step, note) in iter {
            grid.insert(step, note);
        }
        grid
    }
}

/// Outcome of a click on a column header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnEdit {
    /// The trailing "+" header: one column was added
    Appended,
    /// An existing column was removed
    Deleted,
    /// Index beyond the "+" header
    Ignored,
}

/// Complete editable state of one sequencer
#[derive(Debug, Clone, PartialEq)]
pub struct SequencerState {
    pub waveform: Waveform,
    amplitude: f32,
    columns: usize,
    pub grid: Grid,
}

impl SequencerState {
    pub const DEFAULT_COLUMNS: usize = 16;
    pub const DEFAULT_AMPLITUDE: f32 = 0.5;

    /// Build a state, clamping amplitude into [0, 1] and columns to at least 1
    pub fn new(waveform: Waveform, amplitude: f32, columns: usize, grid: Grid) -> Self {
        Self {
            waveform,
            amplitude: clamp_amplitude(amplitude),
            columns: columns.max(1),
            grid,
        }
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = clamp_amplitude(amplitude);
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn set_columns(&mut self, columns: usize) {
        self.columns = columns.max(1);
    }

    /// Header click: `index == columns` appends a column, a lower index
    /// deletes that column and shifts later steps down.
    pub fn insert_column_and_delete(&mut self, index: Step) -> ColumnEdit {
        if index == self.columns {
            self.columns += 1;
            ColumnEdit::Appended
        } else if index < self.columns {
            self.grid.delete_column(index);
            self.columns = self.columns.saturating_sub(1).max(1);
            ColumnEdit::Deleted
        } else {
            ColumnEdit::Ignored
        }
    }
}

impl Default for SequencerState {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            amplitude: Self::DEFAULT_AMPLITUDE,
            columns: Self::DEFAULT_COLUMNS,
            grid: Grid::new(),
        }
    }
}

fn clamp_amplitude(amplitude: f32) -> f32 {
    if amplitude.is_nan() {
        return 0.0;
    }
    amplitude.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::note::NOTES;
    use proptest::prelude::*;

    fn c4() -> Note {
        Note::from_name("C4").unwrap()
    }

    fn e4() -> Note {
        Note::from_name("E4").unwrap()
    }

    #[test]
    fn test_default_state() {
        let state = SequencerState::default();
        assert_eq!(state.waveform, Waveform::Sine);
        assert_eq!(state.amplitude(), 0.5);
        assert_eq!(state.columns(), 16);
        assert!(state.grid.is_empty());
    }

    #[test]
    fn test_toggle_adds_then_removes() {
        let mut grid = Grid::new();

        assert!(grid.toggle(2, c4()));
        assert!(grid.contains(2, &c4()));
        assert_eq!(grid.len(), 1);

        assert!(!grid.toggle(2, c4()));
        assert!(!grid.contains(2, &c4()));
        // Emptied step is removed from the mapping
        assert!(grid.is_empty());
    }

    #[test]
    fn test_no_duplicate_notes_on_a_step() {
        let mut grid = Grid::new();
        assert!(grid.insert(0, c4()));
        assert!(!grid.insert(0, c4()));
        assert_eq!(grid.notes_at(0).len(), 1);
    }

    #[test]
    fn test_notes_keep_insertion_order() {
        let mut grid = Grid::new();
        grid.insert(0, e4());
        grid.insert(0, c4());
        assert_eq!(grid.notes_at(0), &[e4(), c4()]);
    }

    #[test]
    fn test_equality_ignores_note_order() {
        let a: Grid = [(0, c4()), (0, e4())].into_iter().collect();
        let b: Grid = [(0, e4()), (0, c4())].into_iter().collect();
        assert_eq!(a, b);

        let c: Grid = [(1, e4()), (0, c4())].into_iter().collect();
        assert_ne!(a, c);
    }

    #[test]
    fn test_delete_column_shifts_later_steps() {
        let mut grid: Grid = [(0, c4()), (3, e4()), (5, c4()), (6, e4())]
            .into_iter()
            .collect();

        grid.delete_column(3);

        assert!(grid.contains(0, &c4()));
        assert!(grid.contains(4, &c4()));
        assert!(grid.contains(5, &e4()));
        assert_eq!(grid.len(), 3);
        assert_eq!(grid.iter().last().map(|(step, _)| step), Some(5));
    }

    #[test]
    fn test_header_click_appends_column() {
        let mut state = SequencerState::default();
        assert_eq!(state.insert_column_and_delete(16), ColumnEdit::Appended);
        assert_eq!(state.columns(), 17);
    }

    #[test]
    fn test_header_click_deletes_column() {
        let mut state = SequencerState::default();
        state.grid.insert(4, c4());
        state.grid.insert(9, e4());

        assert_eq!(state.insert_column_and_delete(4), ColumnEdit::Deleted);
        assert_eq!(state.columns(), 15);
        assert!(state.grid.notes_at(4).is_empty());
        assert!(state.grid.contains(8, &e4()));
    }

    #[test]
    fn test_column_count_never_below_one() {
        let mut state = SequencerState::new(Waveform::Square, 0.5, 1, Grid::new());
        state.grid.insert(0, c4());

        assert_eq!(state.insert_column_and_delete(0), ColumnEdit::Deleted);
        assert_eq!(state.columns(), 1);
        assert!(state.grid.is_empty());
    }

    #[test]
    fn test_header_click_past_plus_is_ignored() {
        let mut state = SequencerState::default();
        assert_eq!(state.insert_column_and_delete(40), ColumnEdit::Ignored);
        assert_eq!(state.columns(), 16);
    }

    #[test]
    fn test_amplitude_is_clamped() {
        let mut state = SequencerState::default();
        state.set_amplitude(1.7);
        assert_eq!(state.amplitude(), 1.0);
        state.set_amplitude(-0.2);
        assert_eq!(state.amplitude(), 0.0);
        state.set_amplitude(f32::NAN);
        assert_eq!(state.amplitude(), 0.0);
    }

    fn arb_grid() -> impl Strategy<Value = Grid> {
        prop::collection::vec((0usize..24, 0usize..NOTES.len()), 0..40)
            .prop_map(|cells| cells.into_iter().map(|(s, n)| (s, NOTES[n])).collect())
    }

    proptest! {
        #[test]
        fn prop_double_toggle_is_identity(grid in arb_grid(), step in 0usize..24, n in 0usize..49) {
            let mut edited = grid.clone();
            edited.toggle(step, NOTES[n]);
            edited.toggle(step, NOTES[n]);
            prop_assert_eq!(edited, grid);
        }

        #[test]
        fn prop_delete_column_reindexes(grid in arb_grid(), index in 0usize..24) {
            let mut edited = grid.clone();
            edited.delete_column(index);

            for (step, notes) in grid.iter() {
                if step < index {
                    prop_assert_eq!(edited.notes_at(step), notes);
                } else if step > index {
                    prop_assert_eq!(edited.notes_at(step - 1), notes);
                }
            }
            let expected = grid.iter().filter(|(s, _)| *s != index).count();
            prop_assert_eq!(edited.len(), expected);
        }
    }
}
