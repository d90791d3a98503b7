// Ensemble - Owns every sequencer engine and the shared tempo
//
// Ensemble play registers every engine at one shared start time with the
// longest grid as loop length, so all loop restarts coincide. The snapshot
// mirrors the engines (entry index == list position) and is written to the
// store after every change.

use std::sync::Arc;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::audio::context::AudioBackend;
use crate::config::PlaygroundConfig;
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::messaging::rate_limit::RateLimited;
use crate::project::demos::{DemoInfo, DemoLibrary};
use crate::project::manager::{ProjectError, ProjectManager};
use crate::project::storage::{SnapshotStore, load_or_none, save_logged};
use crate::project::types::{Color, PersistedSnapshot, SequencerEntry, palette_color};
use crate::sequencer::engine::SequencerEngine;
use crate::sequencer::timeline::Tempo;
use crate::sequencer::transport::TransportClock;

struct Slot {
    engine: SequencerEngine,
    color: Color,
    /// Engine revision last written to the snapshot
    synced: u64,
}

pub struct Coordinator {
    backend: Arc<dyn AudioBackend>,
    clock: Arc<TransportClock>,
    store: Box<dyn SnapshotStore>,
    project: ProjectManager,
    demos: DemoLibrary,
    slots: Vec<Slot>,
    tempo: Tempo,
    /// `None` until something is saved, and again after `clear()`
    snapshot: Option<PersistedSnapshot>,
    playing: bool,
    tempo_limiter: RateLimited<i64>,
    slider_interval: Duration,
    notifications: Vec<Notification>,
}

impl Coordinator {
    /// Build the ensemble, restoring it from `store` when it holds a snapshot
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        store: Box<dyn SnapshotStore>,
        config: &PlaygroundConfig,
    ) -> Self {
        let clock = backend.clock();
        let mut coordinator = Self {
            backend,
            clock,
            store,
            project: ProjectManager::new(),
            demos: DemoLibrary::load_or_bundled(config.demo_dir.as_deref()),
            slots: Vec::new(),
            tempo: Tempo::default(),
            snapshot: None,
            playing: false,
            tempo_limiter: RateLimited::new(config.slider_interval()),
            slider_interval: config.slider_interval(),
            notifications: Vec::new(),
        };

        match load_or_none(coordinator.store.as_ref()) {
            Some(snapshot) => {
                info!(sequencers = snapshot.sequencers.len(), "restoring stored sequencers");
                coordinator.apply_snapshot(snapshot);
            }
            None => {
                coordinator.clock.set_tempo(coordinator.tempo);
                coordinator.push_default();
            }
        }
        coordinator
    }

    // ---- Transport ------------------------------------------------------

    /// Start every engine on one shared downbeat
    pub fn play_all(&mut self) {
        if self.slots.is_empty() {
            return;
        }
        // Engines playing standalone are restarted in phase with the others
        if self.slots.iter().any(|s| s.engine.is_playing()) {
            self.stop_all();
        }

        let max_columns = self.max_columns();
        let start = self.clock.now();
        for slot in &mut self.slots {
            slot.engine.set_max_columns(Some(max_columns));
            slot.engine.set_managed(true);
            slot.engine.play_at(start);
        }

        self.playing = self.slots.iter().any(|s| s.engine.is_playing());
        if self.playing {
            self.clock.start();
            info!(engines = self.slots.len(), max_columns, start, "ensemble playing");
        } else {
            warn!("no sequencer could start");
            self.release_management();
        }
    }

    /// Stop every engine, stop the clock and rewind it
    pub fn stop_all(&mut self) {
        for slot in &mut self.slots {
            slot.engine.stop();
        }
        self.release_management();
        self.clock.stop();
        self.clock.seek(0.0);
        if self.playing {
            info!("ensemble stopped");
        }
        self.playing = false;
    }

    pub fn toggle_playback(&mut self) {
        if self.playing {
            self.stop_all();
        } else {
            self.play_all();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Longest grid of the ensemble
    pub fn max_columns(&self) -> usize {
        self.slots
            .iter()
            .map(|s| s.engine.columns())
            .max()
            .unwrap_or(1)
    }

    fn release_management(&mut self) {
        for slot in &mut self.slots {
            slot.engine.set_max_columns(None);
            slot.engine.set_managed(false);
        }
    }

    // ---- Tempo ----------------------------------------------------------

    /// Clamp and push the tempo to every engine and the clock
    pub fn set_tempo(&mut self, bpm: i64) -> Tempo {
        self.tempo = Tempo::new(bpm);
        for slot in &mut self.slots {
            slot.engine.change_tempo(i64::from(self.tempo.bpm()));
        }
        self.clock.set_tempo(self.tempo);
        self.persist_all();
        self.tempo
    }

    /// Slider input, applied at most once per interval. Returns true if applied.
    pub fn request_tempo(&mut self, bpm: i64, now: Instant) -> bool {
        match self.tempo_limiter.submit(bpm, now) {
            Some(bpm) => {
                self.set_tempo(bpm);
                true
            }
            None => false,
        }
    }

    /// Apply pending slider values whose interval has passed.
    /// Returns true if anything changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let mut changed = false;
        if let Some(bpm) = self.tempo_limiter.poll(now) {
            self.set_tempo(bpm);
            changed = true;
        }
        for index in 0..self.slots.len() {
            if self.slots[index].engine.poll(now) {
                self.sync(index);
                changed = true;
            }
        }
        changed
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    // ---- Sequencers -----------------------------------------------------

    /// Append a default sequencer. Returns its position.
    pub fn add_sequencer(&mut self) -> usize {
        self.stop_all();
        let index = self.push_default();
        self.persist_all();
        debug!(index, "sequencer added");
        index
    }

    /// Remove the sequencer at `index`; the list is never left empty
    pub fn remove_sequencer(&mut self, index: usize) -> bool {
        if index >= self.slots.len() {
            return false;
        }
        self.stop_all();
        drop(self.slots.remove(index));
        if self.slots.is_empty() {
            self.push_default();
        }
        self.persist_all();
        debug!(index, remaining = self.slots.len(), "sequencer removed");
        true
    }

    /// Back to a single empty sequencer at the default tempo; erases storage
    pub fn clear(&mut self) {
        self.stop_all();
        self.slots.clear();
        self.tempo = Tempo::default();
        self.clock.set_tempo(self.tempo);
        self.push_default();
        self.snapshot = None;
        save_logged(self.store.as_mut(), None);
        info!("sequencers cleared");
    }

    /// Run a mutation on one engine, then persist it if its state changed
    pub fn edit<R>(&mut self, index: usize, f: impl FnOnce(&mut SequencerEngine) -> R) -> Option<R> {
        let slot = self.slots.get_mut(index)?;
        let result = f(&mut slot.engine);
        self.sync(index);
        Some(result)
    }

    pub fn engine(&self, index: usize) -> Option<&SequencerEngine> {
        self.slots.get(index).map(|s| &s.engine)
    }

    pub fn engines(&self) -> impl Iterator<Item = &SequencerEngine> {
        self.slots.iter().map(|s| &s.engine)
    }

    pub fn color(&self, index: usize) -> Option<&Color> {
        self.slots.get(index).map(|s| &s.color)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn new_engine(&self) -> SequencerEngine {
        let mut engine = SequencerEngine::new(Arc::clone(&self.backend));
        engine.set_slider_interval(self.slider_interval);
        engine.change_tempo(i64::from(self.tempo.bpm()));
        engine
    }

    fn push_default(&mut self) -> usize {
        let index = self.slots.len();
        let engine = self.new_engine();
        self.slots.push(Slot {
            synced: engine.revision(),
            engine,
            color: palette_color(index),
        });
        index
    }

    // ---- Persistence ----------------------------------------------------

    /// Snapshot as last written to storage
    pub fn snapshot(&self) -> Option<&PersistedSnapshot> {
        self.snapshot.as_ref()
    }

    /// Snapshot of the current engines
    pub fn current_snapshot(&self) -> PersistedSnapshot {
        PersistedSnapshot {
            tempo: self.tempo,
            sequencers: self
                .slots
                .iter()
                .enumerate()
                .map(|(index, slot)| Self::entry(index, slot))
                .collect(),
        }
    }

    fn entry(index: usize, slot: &Slot) -> SequencerEntry {
        SequencerEntry {
            index,
            color: slot.color.clone(),
            data: slot.engine.export(),
        }
    }

    /// Upsert one engine's entry if it changed since the last write
    fn sync(&mut self, index: usize) {
        let Some(slot) = self.slots.get_mut(index) else {
            return;
        };
        let revision = slot.engine.revision();
        if revision == slot.synced {
            return;
        }
        slot.synced = revision;
        let entry = Self::entry(index, slot);

        let tempo = self.tempo;
        let snapshot = self
            .snapshot
            .get_or_insert_with(|| PersistedSnapshot::new(tempo));
        snapshot.tempo = tempo;
        snapshot.upsert(entry);
        save_logged(self.store.as_mut(), self.snapshot.as_ref());
    }

    /// Rebuild the whole snapshot from the engines and write it
    fn persist_all(&mut self) {
        for slot in &mut self.slots {
            slot.synced = slot.engine.revision();
        }
        self.snapshot = Some(self.current_snapshot());
        save_logged(self.store.as_mut(), self.snapshot.as_ref());
    }

    /// Replace engines and tempo with the content of `snapshot`
    fn apply_snapshot(&mut self, snapshot: PersistedSnapshot) {
        self.stop_all();
        self.tempo = snapshot.tempo;
        self.clock.set_tempo(self.tempo);

        // Drop the old engines (and their voices) before building new ones
        self.slots.clear();
        let count = snapshot.sequencers.len().max(1);
        for index in 0..count {
            let mut engine = self.new_engine();
            let color = match snapshot.entry(index) {
                Some(entry) => {
                    engine.import(&entry.data);
                    entry.color.clone()
                }
                None => palette_color(index),
            };
            self.slots.push(Slot {
                synced: engine.revision(),
                engine,
                color,
            });
        }
        self.persist_all();
    }

    // ---- Files ----------------------------------------------------------

    /// Write the ensemble to `path` (`.json` is appended when missing)
    pub fn export_to_file(&mut self, path: &Path) -> Option<PathBuf> {
        let Some(snapshot) = self.snapshot.as_ref() else {
            self.notify(Notification::warning(
                NotificationCategory::File,
                "Nothing to export yet",
            ));
            return None;
        };
        match self.project.export_snapshot(snapshot, path) {
            Ok(written) => {
                self.notify(Notification::info(
                    NotificationCategory::File,
                    format!("Exported to {}", written.display()),
                ));
                Some(written)
            }
            Err(e) => {
                self.notify_failure("Export failed", &e);
                None
            }
        }
    }

    /// Replace the ensemble with the document at `path`.
    /// On failure nothing changes and one notification is queued.
    pub fn import_from_file(&mut self, path: &Path) -> bool {
        let result = self.project.import_snapshot(path);
        self.finish_import("Import failed", result)
    }

    /// Same as `import_from_file` for document text already read
    pub fn import_document(&mut self, text: &str) -> bool {
        let result = self.project.parse_document(text);
        self.finish_import("Import failed", result)
    }

    /// Demos offered by the menu
    pub fn demos(&self) -> &[DemoInfo] {
        self.demos.demos()
    }

    /// Replace the ensemble with the demo called `name`, like a file import
    pub fn import_demo(&mut self, name: &str) -> bool {
        let result = self.demos.load(name);
        self.finish_import(&format!("Could not load demo \"{name}\""), result)
    }

    fn finish_import(
        &mut self,
        what: &str,
        result: Result<PersistedSnapshot, ProjectError>,
    ) -> bool {
        match result {
            Ok(snapshot) => {
                info!(sequencers = snapshot.sequencers.len(), tempo = %snapshot.tempo, "importing sequencers");
                self.apply_snapshot(snapshot);
                true
            }
            Err(e) => {
                self.notify_failure(what, &e);
                false
            }
        }
    }

    // ---- Notifications --------------------------------------------------

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    fn notify_failure(&mut self, what: &str, error: &ProjectError) {
        warn!(error = %error, "{what}");
        self.notify(Notification::error(
            NotificationCategory::File,
            format!("{what}: {error}"),
        ));
    }

    /// User-visible messages queued since the last call
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::offline::OfflineContext;
    use crate::project::storage::MemoryStore;
    use crate::sequencer::engine::EnginePhase;
    use crate::sequencer::note::Note;
    use crate::synth::oscillator::Waveform;

    fn coordinator() -> (Arc<OfflineContext>, MemoryStore, Coordinator) {
        let backend = Arc::new(OfflineContext::new(1000.0));
        let store = MemoryStore::new();
        let coordinator = Coordinator::new(
            backend.clone(),
            Box::new(store.clone()),
            &PlaygroundConfig::default(),
        );
        (backend, store, coordinator)
    }

    fn set_columns(coordinator: &mut Coordinator, index: usize, columns: usize) {
        coordinator.edit(index, |engine| {
            while engine.columns() < columns {
                let last = engine.columns();
                engine.insert_column_and_delete(last);
            }
            while engine.columns() > columns {
                engine.insert_column_and_delete(0);
            }
        });
    }

    #[test]
    fn test_starts_with_one_default_sequencer() {
        let (_backend, store, coordinator) = coordinator();
        assert_eq!(coordinator.len(), 1);
        assert_eq!(coordinator.tempo().bpm(), 120);
        assert_eq!(coordinator.color(0), Some(&palette_color(0)));
        assert!(coordinator.snapshot().is_none());
        assert!(store.raw().is_none());
    }

    #[test]
    fn test_ensemble_shares_one_restart() {
        let (backend, _store, mut coordinator) = coordinator();
        coordinator.add_sequencer();
        coordinator.add_sequencer();
        set_columns(&mut coordinator, 0, 8);
        set_columns(&mut coordinator, 2, 12);

        coordinator.play_all();
        assert!(coordinator.is_playing());
        assert!(backend.clock().is_running());

        let plans: Vec<_> = coordinator.engines().map(|e| e.plan().cloned().unwrap()).collect();
        for plan in &plans {
            assert_eq!(plan.restart_interval(), 2.0);
            assert_eq!(plan.started_at, plans[0].started_at);
        }
        let columns: Vec<_> = plans.iter().map(|p| p.columns).collect();
        assert_eq!(columns, vec![8, 16, 12]);
        assert!(coordinator.engines().all(|e| e.is_managed()));
    }

    #[test]
    fn test_stop_all_releases_engines_and_rewinds() {
        let (backend, _store, mut coordinator) = coordinator();
        coordinator.add_sequencer();
        coordinator.play_all();
        backend.render_until(0.5);

        coordinator.stop_all();
        assert!(!coordinator.is_playing());
        assert_eq!(backend.clock().pending(), 0);
        assert_eq!(backend.clock().now(), 0.0);
        assert!(!backend.clock().is_running());
        for engine in coordinator.engines() {
            assert_eq!(engine.phase(), EnginePhase::Idle);
            assert_eq!(engine.max_columns(), None);
            assert!(!engine.is_managed());
        }
    }

    #[test]
    fn test_play_all_restarts_standalone_engine_in_phase() {
        let (backend, _store, mut coordinator) = coordinator();
        coordinator.add_sequencer();
        coordinator.edit(1, |engine| engine.play());
        backend.render_until(0.3);

        coordinator.play_all();
        let starts: Vec<f64> = coordinator.engines().map(|e| e.plan().unwrap().started_at).collect();
        assert_eq!(starts, vec![0.0, 0.0]);
    }

    #[test]
    fn test_tempo_reaches_engines_and_storage() {
        let (backend, store, mut coordinator) = coordinator();
        coordinator.add_sequencer();

        assert_eq!(coordinator.set_tempo(500).bpm(), 200);
        assert!(coordinator.engines().all(|e| e.tempo().bpm() == 200));
        assert_eq!(backend.clock().tempo().bpm(), 200);
        assert!(store.raw().unwrap().contains("\"tempo\": 200"));
    }

    #[test]
    fn test_tempo_slider_is_rate_limited() {
        let (_backend, _store, mut coordinator) = coordinator();
        let t0 = Instant::now();
        assert!(coordinator.request_tempo(90, t0));
        assert!(!coordinator.request_tempo(95, t0 + Duration::from_millis(2)));
        assert_eq!(coordinator.tempo().bpm(), 90);

        assert!(coordinator.poll(t0 + Duration::from_millis(30)));
        assert_eq!(coordinator.tempo().bpm(), 95);
    }

    #[test]
    fn test_edit_persists_changed_engine_only() {
        let (_backend, store, mut coordinator) = coordinator();
        let c4 = Note::from_name("C4").unwrap();

        coordinator.edit(0, |engine| engine.cursor());
        assert!(store.raw().is_none());

        coordinator.edit(0, |engine| engine.toggle_note(3, c4));
        let snapshot = coordinator.snapshot().unwrap();
        assert_eq!(snapshot.sequencers.len(), 1);
        assert_eq!(snapshot.sequencers[0].data.sequence["3"], vec!["C4".to_string()]);
        assert!(store.raw().unwrap().contains("\"C4\""));
    }

    #[test]
    fn test_colors_cycle_through_palette() {
        let (_backend, _store, mut coordinator) = coordinator();
        for _ in 0..12 {
            coordinator.add_sequencer();
        }
        assert_eq!(coordinator.len(), 13);
        assert_eq!(coordinator.color(1), Some(&palette_color(1)));
        assert_eq!(coordinator.color(12), Some(&palette_color(0)));
    }

    #[test]
    fn test_remove_compacts_and_never_empties() {
        let (_backend, _store, mut coordinator) = coordinator();
        coordinator.add_sequencer();
        coordinator.add_sequencer();
        coordinator.edit(2, |engine| engine.set_waveform(Waveform::Square));
        coordinator.play_all();

        assert!(coordinator.remove_sequencer(1));
        assert!(!coordinator.is_playing());
        assert_eq!(coordinator.len(), 2);
        assert_eq!(coordinator.engine(1).unwrap().waveform(), Waveform::Square);
        let indices: Vec<usize> = coordinator
            .snapshot()
            .unwrap()
            .sequencers
            .iter()
            .map(|s| s.index)
            .collect();
        assert_eq!(indices, vec![0, 1]);

        assert!(!coordinator.remove_sequencer(7));
        coordinator.remove_sequencer(0);
        coordinator.remove_sequencer(0);
        assert_eq!(coordinator.len(), 1);
        assert_eq!(coordinator.engine(0).unwrap().waveform(), Waveform::Sine);
    }

    #[test]
    fn test_clear_resets_and_erases_storage() {
        let (_backend, store, mut coordinator) = coordinator();
        coordinator.add_sequencer();
        coordinator.set_tempo(80);
        assert!(store.raw().is_some());

        coordinator.clear();
        assert_eq!(coordinator.len(), 1);
        assert_eq!(coordinator.tempo().bpm(), 120);
        assert!(coordinator.snapshot().is_none());
        assert!(store.raw().is_none());
    }

    #[test]
    fn test_restores_from_store() {
        let (backend, store, mut coordinator) = coordinator();
        coordinator.add_sequencer();
        coordinator.set_tempo(90);
        coordinator.edit(1, |engine| engine.set_amplitude(0.25));
        drop(coordinator);

        let restored = Coordinator::new(backend, Box::new(store), &PlaygroundConfig::default());
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.tempo().bpm(), 90);
        assert_eq!(restored.engine(1).unwrap().amplitude(), 0.25);
        assert_eq!(restored.color(1), Some(&palette_color(1)));
    }

    #[test]
    fn test_corrupt_store_gives_default_ensemble() {
        let backend = Arc::new(OfflineContext::new(1000.0));
        let store = MemoryStore::with_raw("{ not json");
        let mut coordinator = Coordinator::new(backend, Box::new(store), &PlaygroundConfig::default());
        assert_eq!(coordinator.len(), 1);
        assert!(coordinator.take_notifications().is_empty());
    }

    #[test]
    fn test_export_without_data_warns() {
        let (_backend, _store, mut coordinator) = coordinator();
        let dir = tempfile::TempDir::new().unwrap();
        assert!(coordinator.export_to_file(&dir.path().join("out")).is_none());
        assert_eq!(coordinator.take_notifications().len(), 1);
    }
}
