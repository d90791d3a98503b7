// Project manager for exporting and importing snapshot files

use crate::project::serialization::{snapshot_from_json, snapshot_to_json};
use crate::project::types::PersistedSnapshot;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Project error types
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown demo: {0}")]
    UnknownDemo(String),
}

/// Extension of exported documents
pub const FILE_EXTENSION: &str = "json";

/// Handles writing and reading snapshot documents chosen by the user
#[derive(Debug, Clone)]
pub struct ProjectManager {
    default_file_name: String,
}

impl ProjectManager {
    pub fn new() -> Self {
        Self {
            default_file_name: format!("sequencers.{FILE_EXTENSION}"),
        }
    }

    /// File name offered by the save dialog
    pub fn default_file_name(&self) -> &str {
        &self.default_file_name
    }

    /// Force the `.json` suffix
    pub fn with_extension(path: &Path) -> PathBuf {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case(FILE_EXTENSION) => path.to_path_buf(),
            _ => {
                let mut name = path.as_os_str().to_owned();
                name.push(".");
                name.push(FILE_EXTENSION);
                PathBuf::from(name)
            }
        }
    }

    /// Write the snapshot as formatted JSON. Returns the path actually written.
    pub fn export_snapshot<P: AsRef<Path>>(
        &self,
        snapshot: &PersistedSnapshot,
        path: P,
    ) -> Result<PathBuf, ProjectError> {
        let path = Self::with_extension(path.as_ref());
        let json = snapshot_to_json(snapshot)?;
        fs::write(&path, json)?;
        info!(path = %path.display(), sequencers = snapshot.sequencers.len(), "snapshot exported");
        Ok(path)
    }

    /// Read and parse a snapshot document
    pub fn import_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<PersistedSnapshot, ProjectError> {
        let text = fs::read_to_string(path.as_ref())?;
        self.parse_document(&text)
    }

    /// Parse document text (already read from an upload)
    pub fn parse_document(&self, text: &str) -> Result<PersistedSnapshot, ProjectError> {
        snapshot_from_json(text)
    }
}

impl Default for ProjectManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::types::{palette_color, SequencerData, SequencerEntry};
    use crate::sequencer::timeline::Tempo;
    use crate::synth::oscillator::Waveform;
    use tempfile::TempDir;

    fn sample_snapshot() -> PersistedSnapshot {
        let mut snapshot = PersistedSnapshot::new(Tempo::new(140));
        snapshot.upsert(SequencerEntry {
            index: 0,
            color: palette_color(0),
            data: SequencerData {
                waveform: Waveform::Square,
                amplitude: 0.4,
                cols: 8,
                sequence: [("0".to_string(), vec!["C4".to_string()])].into_iter().collect(),
            },
        });
        snapshot
    }

    #[test]
    fn test_export_adds_json_suffix() {
        let dir = TempDir::new().unwrap();
        let manager = ProjectManager::new();

        let written = manager
            .export_snapshot(&sample_snapshot(), dir.path().join("my_song"))
            .unwrap();
        assert_eq!(written, dir.path().join("my_song.json"));

        let kept = manager
            .export_snapshot(&sample_snapshot(), dir.path().join("other.JSON"))
            .unwrap();
        assert_eq!(kept, dir.path().join("other.JSON"));
    }

    #[test]
    fn test_export_import_file() {
        let dir = TempDir::new().unwrap();
        let manager = ProjectManager::new();
        let snapshot = sample_snapshot();

        let path = manager.export_snapshot(&snapshot, dir.path().join("song.json")).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        // Formatted, two-space indentation
        assert!(text.starts_with("{\n  \"tempo\": 140"));

        assert_eq!(manager.import_snapshot(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_import_errors() {
        let dir = TempDir::new().unwrap();
        let manager = ProjectManager::new();

        let missing = manager.import_snapshot(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ProjectError::Io(_))));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{\"tempo\": ").unwrap();
        assert!(matches!(manager.import_snapshot(&bad), Err(ProjectError::Json(_))));
    }

    #[test]
    fn test_default_file_name() {
        assert_eq!(ProjectManager::default().default_file_name(), "sequencers.json");
    }
}
