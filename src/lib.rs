// Synth Playground - Library exports for the app, tests and benchmarks

pub mod audio;
pub mod config;
pub mod messaging;
pub mod project;
pub mod sequencer;
pub mod synth;
pub mod ui;

// Re-export commonly used types for convenience
pub use audio::context::{AudioBackend, AudioContext, AudioError};
pub use audio::offline::OfflineContext;
pub use config::{ConfigError, PlaygroundConfig};
pub use messaging::notification::{Notification, NotificationCategory, NotificationLevel};
pub use project::{
    DemoLibrary, FileStore, MemoryStore, PersistedSnapshot, ProjectError, ProjectManager,
    SequencerData, SnapshotStore, StorageError,
};
pub use sequencer::{
    Coordinator, EnginePhase, Grid, Note, PlaybackPlan, SequencerEngine, SequencerState, Step,
    Tempo, TransportClock,
};
pub use synth::oscillator::Waveform;
pub use synth::trait_def::Voice;
