// Snapshot persistence
// Durable storage of the whole ensemble plus JSON file import/export

pub mod demos;
pub mod manager;
pub mod serialization;
pub mod storage;
pub mod types;

pub use demos::{DemoInfo, DemoLibrary};
pub use manager::{ProjectError, ProjectManager};
pub use serialization::{decode_sequence, encode_sequence};
pub use storage::{FileStore, MemoryStore, SnapshotStore, StorageError};
pub use types::{
    Color, EncodedSequence, PALETTE, PersistedSnapshot, SequencerData, SequencerEntry,
    palette_color,
};
