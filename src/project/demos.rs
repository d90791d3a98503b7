// Demo library - Ready-made ensembles offered from the menu
//
// A library is a manifest (`demos.json`: name, file, icon) plus one snapshot
// document per entry. The bundled set is compiled into the binary; a
// directory with the same layout can replace it.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::project::manager::{ProjectError, ProjectManager};
use crate::project::types::PersistedSnapshot;

/// File name of the manifest inside a demo directory
pub const MANIFEST_FILE: &str = "demos.json";

const BUNDLED_MANIFEST: &str = include_str!("../../assets/demos/demos.json");

const BUNDLED_FILES: &[(&str, &str)] = &[
    (
        "four_on_the_floor.json",
        include_str!("../../assets/demos/four_on_the_floor.json"),
    ),
    (
        "arpeggio.json",
        include_str!("../../assets/demos/arpeggio.json"),
    ),
];

/// Manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DemoInfo {
    pub name: String,
    pub file: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone)]
enum DemoSource {
    Bundled,
    Directory(PathBuf),
}

#[derive(Debug, Clone)]
pub struct DemoLibrary {
    source: DemoSource,
    demos: Vec<DemoInfo>,
}

impl DemoLibrary {
    /// Demos compiled into the binary
    pub fn bundled() -> Self {
        let demos = serde_json::from_str(BUNDLED_MANIFEST).unwrap_or_else(|e| {
            warn!(error = %e, "bundled demo manifest is invalid");
            Vec::new()
        });
        Self {
            source: DemoSource::Bundled,
            demos,
        }
    }

    /// Read `<dir>/demos.json`. Documents are read when a demo is loaded.
    pub fn from_dir(dir: &Path) -> Result<Self, ProjectError> {
        let text = fs::read_to_string(dir.join(MANIFEST_FILE))?;
        let demos: Vec<DemoInfo> = serde_json::from_str(&text)?;
        debug!(dir = %dir.display(), demos = demos.len(), "demo library loaded");
        Ok(Self {
            source: DemoSource::Directory(dir.to_path_buf()),
            demos,
        })
    }

    /// Library from `dir` when given and readable, the bundled one otherwise
    pub fn load_or_bundled(dir: Option<&Path>) -> Self {
        match dir.map(Self::from_dir) {
            Some(Ok(library)) => library,
            Some(Err(e)) => {
                warn!(error = %e, "failed to load demos, using the bundled ones");
                Self::bundled()
            }
            None => Self::bundled(),
        }
    }

    pub fn demos(&self) -> &[DemoInfo] {
        &self.demos
    }

    /// Read and parse the document of the demo called `name`
    pub fn load(&self, name: &str) -> Result<PersistedSnapshot, ProjectError> {
        let info = self
            .demos
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ProjectError::UnknownDemo(name.to_string()))?;

        let manager = ProjectManager::new();
        match &self.source {
            DemoSource::Bundled => {
                let text = BUNDLED_FILES
                    .iter()
                    .find(|(file, _)| *file == info.file)
                    .map(|(_, text)| *text)
                    .ok_or_else(|| ProjectError::UnknownDemo(info.file.clone()))?;
                manager.parse_document(text)
            }
            DemoSource::Directory(dir) => manager.import_snapshot(dir.join(&info.file)),
        }
    }
}

impl Default for DemoLibrary {
    fn default() -> Self {
        Self::bundled()
    }
}
