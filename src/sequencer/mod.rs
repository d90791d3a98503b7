// Sequencer module - Grid model, transport clock and playback

pub mod engine;
pub mod ensemble;
pub mod note;
pub mod pattern;
pub mod player;
pub mod timeline;
pub mod transport;

pub use engine::{EnginePhase, SequencerEngine};
pub use ensemble::Coordinator;
pub use note::{Accidental, COMMON_NOTES, Letter, NOTES, Note, NoteParseError};
pub use pattern::{ColumnEdit, Grid, SequencerState, Step};
pub use player::{PlaybackPlan, Trigger};
pub use timeline::Tempo;
pub use transport::{ScheduleHandle, TransportClock};
