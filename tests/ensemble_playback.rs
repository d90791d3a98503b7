// Integration tests for ensemble playback
// Engines run against a recording backend; the clock is driven offline

mod common;

use common::{RecordingBackend, VoiceCall};
use std::sync::Arc;
use synth_playground::audio::context::{AudioBackend, AudioError};
use synth_playground::project::MemoryStore;
use synth_playground::sequencer::{Coordinator, EnginePhase, Note, SequencerEngine};
use synth_playground::PlaygroundConfig;

const SAMPLE_RATE: f64 = 1000.0;

fn note(name: &str) -> Note {
    Note::from_name(name).unwrap()
}

fn coordinator(backend: &Arc<RecordingBackend>) -> Coordinator {
    Coordinator::new(
        backend.clone(),
        Box::new(MemoryStore::new()),
        &PlaygroundConfig::default(),
    )
}

fn resize(engine: &mut SequencerEngine, columns: usize) {
    while engine.columns() > columns {
        engine.insert_column_and_delete(engine.columns() - 1);
    }
    while engine.columns() < columns {
        engine.insert_column_and_delete(engine.columns());
    }
}

/// Three sequencers of 8, 16 and 12 columns at 120 BPM
fn three_sequencers(backend: &Arc<RecordingBackend>) -> Coordinator {
    let mut coordinator = coordinator(backend);
    coordinator.add_sequencer();
    coordinator.add_sequencer();
    for (index, columns) in [(0, 8), (1, 16), (2, 12)] {
        coordinator.edit(index, |engine| {
            resize(engine, columns);
            engine.toggle_note(0, note("C4"));
        });
    }
    coordinator.set_tempo(120);
    coordinator
}

#[test]
fn test_ensemble_restarts_together() {
    let backend = RecordingBackend::new(SAMPLE_RATE);
    let mut coordinator = three_sequencers(&backend);

    coordinator.play_all();
    backend.clock().advance_to(4.0);

    for voice in 0..3 {
        assert_eq!(backend.trigger_times(voice), vec![0.0, 2.0, 4.0]);
    }
    for engine in coordinator.engines() {
        assert_eq!(engine.plan().unwrap().restart_interval(), 2.0);
    }
}

#[test]
fn test_short_grids_clear_their_cursor_early() {
    let backend = RecordingBackend::new(SAMPLE_RATE);
    let mut coordinator = three_sequencers(&backend);
    coordinator.play_all();
    let clock = backend.clock();

    clock.advance_to(0.875);
    let cursors: Vec<_> = coordinator.engines().map(|e| e.cursor()).collect();
    assert_eq!(cursors, vec![Some(7), Some(7), Some(7)]);

    clock.advance_to(1.0);
    let cursors: Vec<_> = coordinator.engines().map(|e| e.cursor()).collect();
    assert_eq!(cursors, vec![None, Some(8), Some(8)]);

    clock.advance_to(1.5);
    let cursors: Vec<_> = coordinator.engines().map(|e| e.cursor()).collect();
    assert_eq!(cursors, vec![None, Some(12), None]);

    clock.advance_to(2.0);
    let cursors: Vec<_> = coordinator.engines().map(|e| e.cursor()).collect();
    assert_eq!(cursors, vec![Some(0), Some(0), Some(0)]);
}

#[test]
fn test_standalone_short_grid_loops_on_its_own_length() {
    let backend = RecordingBackend::new(SAMPLE_RATE);
    let mut coordinator = three_sequencers(&backend);

    coordinator.edit(0, |engine| engine.play());
    backend.clock().advance_to(2.5);

    assert_eq!(backend.trigger_times(0), vec![0.0, 1.0, 2.0]);
}

#[test]
fn test_each_step_releases_then_triggers_its_chord() {
    let backend = RecordingBackend::new(SAMPLE_RATE);
    let mut coordinator = coordinator(&backend);
    coordinator.edit(0, |engine| {
        engine.toggle_note(2, note("C4"));
        engine.toggle_note(2, note("E4"));
    });

    coordinator.play_all();
    backend.clock().advance_to(0.3);

    let calls: Vec<VoiceCall> = backend
        .calls(0)
        .into_iter()
        .filter(|(t, _)| *t > 0.0)
        .map(|(_, call)| call)
        .collect();
    assert_eq!(
        calls,
        vec![
            VoiceCall::ReleaseAll,
            VoiceCall::Trigger {
                frequencies: vec![note("C4").frequency, note("E4").frequency],
                duration: 0.125,
            },
        ]
    );
}

#[test]
fn test_stop_without_play_is_noop() {
    let backend = RecordingBackend::new(SAMPLE_RATE);
    let mut coordinator = coordinator(&backend);

    coordinator.stop_all();
    coordinator.edit(0, |engine| engine.stop());

    let engine = coordinator.engine(0).unwrap();
    assert_eq!(engine.phase(), EnginePhase::Idle);
    assert_eq!(engine.cursor(), None);
    assert_eq!(backend.clock().pending(), 0);
    assert_eq!(backend.voice_count(), 0);
}

#[test]
fn test_stop_silences_and_nothing_fires_afterwards() {
    let backend = RecordingBackend::new(SAMPLE_RATE);
    let mut coordinator = three_sequencers(&backend);
    coordinator.play_all();
    backend.clock().advance_to(0.5);

    coordinator.stop_all();
    let clock = backend.clock();
    clock.start();
    clock.advance_to(5.0);

    for voice in 0..3 {
        assert_eq!(backend.trigger_times(voice), vec![0.0]);
        let (_, last) = backend.calls(voice).pop().unwrap();
        assert_eq!(last, VoiceCall::ReleaseAll);
    }
}

#[test]
fn test_unlock_failure_leaves_ensemble_idle() {
    let backend = RecordingBackend::new(SAMPLE_RATE);
    let mut coordinator = three_sequencers(&backend);
    backend.fail_unlock(Some(AudioError::NoDevice));

    coordinator.play_all();
    assert!(!coordinator.is_playing());
    assert!(!backend.clock().is_running());
    assert_eq!(backend.clock().pending(), 0);
    assert!(coordinator.engines().all(|e| e.phase() == EnginePhase::Idle));
    assert!(coordinator.engines().all(|e| !e.is_managed()));

    backend.fail_unlock(None);
    coordinator.play_all();
    assert!(coordinator.is_playing());
}

#[test]
fn test_edits_while_playing_wait_for_next_play() {
    let backend = RecordingBackend::new(SAMPLE_RATE);
    let mut coordinator = coordinator(&backend);
    coordinator.edit(0, |engine| engine.toggle_note(0, note("A4")));

    coordinator.play_all();
    coordinator.edit(0, |engine| engine.toggle_note(4, note("G4")));
    coordinator.set_tempo(60);
    backend.clock().advance_to(2.0);
    assert_eq!(backend.trigger_times(0), vec![0.0, 2.0]);

    coordinator.stop_all();
    coordinator.play_all();
    // 60 BPM: one step is 0.25s, the loop 4s
    backend.clock().advance_to(1.0);
    assert_eq!(backend.trigger_times(0), vec![0.0, 2.0, 0.0, 1.0]);
}
