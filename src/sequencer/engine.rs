// Sequencer Engine - Plays one grid against the shared transport clock
//
// Idle -> Scheduled -> Playing -> Idle. Play compiles the grid into a frozen
// plan and registers it on the clock; Stop cancels every registered handle
// before silencing the voice.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::audio::context::AudioBackend;
use crate::messaging::rate_limit::RateLimited;
use crate::project::serialization::{data_to_state, state_to_data};
use crate::project::types::SequencerData;
use crate::sequencer::note::Note;
use crate::sequencer::pattern::{ColumnEdit, Grid, SequencerState, Step};
use crate::sequencer::player::PlaybackPlan;
use crate::sequencer::timeline::Tempo;
use crate::sequencer::transport::{ScheduleHandle, TransportClock};
use crate::synth::oscillator::Waveform;
use crate::synth::trait_def::Voice;

/// Minimum interval between two applied slider values
pub const DEFAULT_SLIDER_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    /// Schedules are being registered
    Scheduled,
    Playing,
}

/// State shared with the clock callbacks
struct Playhead {
    cursor: Option<Step>,
    /// Clock time of the last loop restart
    loop_base: f64,
    /// Number of loop restarts since play
    restarts: u64,
    /// Bumped by every play and stop; callbacks of an older play do nothing
    generation: u64,
    voice: Option<Box<dyn Voice>>,
}

pub struct SequencerEngine {
    backend: Arc<dyn AudioBackend>,
    clock: Arc<TransportClock>,
    state: SequencerState,
    tempo: Tempo,
    max_columns: Option<usize>,
    managed: bool,
    phase: EnginePhase,
    handles: Vec<ScheduleHandle>,
    plan: Option<PlaybackPlan>,
    playhead: Arc<Mutex<Playhead>>,
    preview_voice: Option<Box<dyn Voice>>,
    amplitude_limiter: RateLimited<f32>,
    revision: u64,
}

impl SequencerEngine {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self::with_state(backend, SequencerState::default())
    }

    pub fn with_state(backend: Arc<dyn AudioBackend>, state: SequencerState) -> Self {
        let clock = backend.clock();
        let tempo = clock.tempo();
        Self {
            backend,
            clock,
            state,
            tempo,
            max_columns: None,
            managed: false,
            phase: EnginePhase::Idle,
            handles: Vec::new(),
            plan: None,
            playhead: Arc::new(Mutex::new(Playhead {
                cursor: None,
                loop_base: 0.0,
                restarts: 0,
                generation: 0,
                voice: None,
            })),
            preview_voice: None,
            amplitude_limiter: RateLimited::new(DEFAULT_SLIDER_INTERVAL),
            revision: 0,
        }
    }

    pub fn set_slider_interval(&mut self, interval: Duration) {
        self.amplitude_limiter = RateLimited::new(interval);
    }

    // ---- Playback -------------------------------------------------------

    /// Standalone play, starting now
    pub fn play(&mut self) {
        let start = self.clock.now();
        self.play_at(start);
    }

    /// Play with the first loop starting at clock time `start`.
    /// No-op unless idle; stays idle if the audio output cannot be unlocked.
    pub fn play_at(&mut self, start: f64) {
        if self.phase != EnginePhase::Idle {
            debug!(phase = ?self.phase, "play ignored, already started");
            return;
        }
        if let Err(e) = self.backend.unlock() {
            warn!(error = %e, "audio unlock failed, staying idle");
            return;
        }

        self.phase = EnginePhase::Scheduled;
        let plan = PlaybackPlan::compile(&self.state, self.tempo, self.max_columns, start);

        let generation = {
            let mut playhead = self.playhead.lock();
            playhead.cursor = None;
            playhead.loop_base = start;
            playhead.restarts = 0;
            playhead.generation += 1;
            match playhead.voice.as_mut() {
                Some(voice) => {
                    voice.set_waveform(self.state.waveform);
                    voice.set_amplitude(self.state.amplitude());
                }
                None => {
                    playhead.voice = Some(
                        self.backend
                            .create_voice(self.state.waveform, self.state.amplitude()),
                    );
                }
            }
            playhead.generation
        };

        self.register(&plan, generation);
        info!(
            start,
            columns = plan.columns,
            loop_columns = plan.loop_columns,
            triggers = plan.triggers.len(),
            "sequencer playing"
        );
        self.plan = Some(plan);
        self.phase = EnginePhase::Playing;

        // A managed ensemble starts the clock once every engine is registered
        if !self.managed && !self.clock.is_running() {
            self.clock.start();
        }
    }

    /// Register restart, cursor and trigger schedules, in that order.
    /// At a loop boundary the clock fires them in registration order.
    fn register(&mut self, plan: &PlaybackPlan, generation: u64) {
        let start = plan.started_at;
        let step = plan.step_duration;
        let restart_interval = plan.restart_interval();

        self.handles.push(self.clock.schedule_repeating(
            restart_interval,
            start,
            None,
            restart_callback(Arc::clone(&self.playhead), generation),
        ));

        self.handles.push(self.clock.schedule_repeating(
            step,
            start,
            None,
            cursor_callback(Arc::clone(&self.playhead), generation, plan.columns, step),
        ));

        for trigger in &plan.triggers {
            self.handles.push(self.clock.schedule_repeating(
                restart_interval,
                start + trigger.offset,
                None,
                trigger_callback(
                    Arc::clone(&self.playhead),
                    generation,
                    trigger.frequencies(),
                    step,
                ),
            ));
        }
    }

    /// Cancel every schedule, silence the voice and go idle. No-op when idle.
    pub fn stop(&mut self) {
        if self.phase == EnginePhase::Idle {
            return;
        }

        for handle in self.handles.drain(..) {
            self.clock.cancel(handle);
        }

        // The audio thread may already hold a callback taken off the clock
        let mut playhead = self.playhead.lock();
        playhead.generation += 1;
        if let Some(voice) = playhead.voice.as_mut() {
            voice.release_all();
        }
        playhead.cursor = None;
        drop(playhead);

        self.plan = None;
        self.phase = EnginePhase::Idle;
        info!("sequencer stopped");
    }

    pub fn toggle_playback(&mut self) {
        if self.is_playing() {
            self.stop();
        } else {
            self.play();
        }
    }

    /// Stop and dispose of every synthesis resource
    pub fn teardown(&mut self) {
        self.stop();
        self.playhead.lock().voice = None;
        self.preview_voice = None;
    }

    // ---- Edits ----------------------------------------------------------

    /// Returns true when the note ends up set
    pub fn toggle_note(&mut self, step: Step, note: Note) -> bool {
        let set = self.state.grid.toggle(step, note);
        self.touch();
        set
    }

    /// Cell click: toggle the note and audition it
    pub fn click_cell(&mut self, step: Step, note: Note) -> bool {
        let set = self.toggle_note(step, note);
        self.preview(note);
        set
    }

    pub fn insert_column_and_delete(&mut self, index: Step) -> ColumnEdit {
        let edit = self.state.insert_column_and_delete(index);
        if edit != ColumnEdit::Ignored {
            self.touch();
        }
        edit
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        if self.state.waveform == waveform {
            return;
        }
        self.state.waveform = waveform;
        self.for_each_voice(|voice| voice.set_waveform(waveform));
        self.touch();
    }

    /// Set amplitude now, clamped into [0, 1]
    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.state.set_amplitude(amplitude);
        let amplitude = self.state.amplitude();
        self.for_each_voice(|voice| voice.set_amplitude(amplitude));
        self.touch();
    }

    /// Slider input: applied at most once per interval. Returns true if applied.
    pub fn request_amplitude(&mut self, amplitude: f32, now: Instant) -> bool {
        match self.amplitude_limiter.submit(amplitude, now) {
            Some(value) => {
                self.set_amplitude(value);
                true
            }
            None => false,
        }
    }

    /// Apply a pending slider value once its interval has passed
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.amplitude_limiter.poll(now) {
            Some(value) => {
                self.set_amplitude(value);
                true
            }
            None => false,
        }
    }

    /// Clamp and apply a tempo. A running loop keeps its frozen schedule;
    /// the new tempo is used from the next play.
    pub fn change_tempo(&mut self, bpm: i64) -> Tempo {
        self.tempo = Tempo::new(bpm);
        self.clock.set_tempo(self.tempo);
        self.tempo
    }

    /// Ensemble loop length, used from the next play
    pub fn set_max_columns(&mut self, max_columns: Option<usize>) {
        self.max_columns = max_columns;
    }

    pub fn set_managed(&mut self, managed: bool) {
        self.managed = managed;
    }

    /// Play the note once through the preview voice
    pub fn preview(&mut self, note: Note) {
        if let Err(e) = self.backend.unlock() {
            warn!(error = %e, "audio unlock failed, preview skipped");
            return;
        }
        let duration = self.tempo.step_duration();
        let voice = self.preview_voice.get_or_insert_with(|| {
            self.backend
                .create_voice(self.state.waveform, self.state.amplitude())
        });
        voice.trigger_attack_release(&[note.frequency], duration);
    }

    // ---- Export / import ------------------------------------------------

    pub fn export(&self) -> SequencerData {
        state_to_data(&self.state)
    }

    /// Replace the whole state at once, stopping first if playing
    pub fn import(&mut self, data: &SequencerData) {
        if self.phase != EnginePhase::Idle {
            self.stop();
        }
        self.state = data_to_state(data);
        let waveform = self.state.waveform;
        let amplitude = self.state.amplitude();
        self.for_each_voice(|voice| {
            voice.set_waveform(waveform);
            voice.set_amplitude(amplitude);
        });
        self.touch();
        debug!(columns = self.state.columns(), steps = self.state.grid.len(), "sequencer imported");
    }

    // ---- Accessors ------------------------------------------------------

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    pub fn grid(&self) -> &Grid {
        &self.state.grid
    }

    pub fn columns(&self) -> usize {
        self.state.columns()
    }

    pub fn waveform(&self) -> Waveform {
        self.state.waveform
    }

    pub fn amplitude(&self) -> f32 {
        self.state.amplitude()
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn max_columns(&self) -> Option<usize> {
        self.max_columns
    }

    pub fn is_managed(&self) -> bool {
        self.managed
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        self.phase == EnginePhase::Playing
    }

    /// Step under the playback cursor, `None` when idle or past this grid's end
    pub fn cursor(&self) -> Option<Step> {
        self.playhead.lock().cursor
    }

    /// Loop restarts since the last play (the first one fires at the start)
    pub fn restarts(&self) -> u64 {
        self.playhead.lock().restarts
    }

    /// Frozen schedule of the current playback
    pub fn plan(&self) -> Option<&PlaybackPlan> {
        self.plan.as_ref()
    }

    /// Number of clock schedules this engine holds
    pub fn scheduled_handles(&self) -> usize {
        self.handles.len()
    }

    /// Incremented by every change of the exported state
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn for_each_voice(&mut self, mut apply: impl FnMut(&mut dyn Voice)) {
        if let Some(voice) = self.playhead.lock().voice.as_mut() {
            apply(voice.as_mut());
        }
        if let Some(voice) = self.preview_voice.as_mut() {
            apply(voice.as_mut());
        }
    }
}

fn restart_callback(
    playhead: Arc<Mutex<Playhead>>,
    generation: u64,
) -> impl FnMut(f64) + Send + 'static {
    move |t| {
        let mut playhead = playhead.lock();
        if playhead.generation != generation {
            return;
        }
        playhead.loop_base = t;
        playhead.restarts += 1;
    }
}

fn cursor_callback(
    playhead: Arc<Mutex<Playhead>>,
    generation: u64,
    columns: usize,
    step: f64,
) -> impl FnMut(f64) + Send + 'static {
    move |t| {
        let mut playhead = playhead.lock();
        if playhead.generation != generation {
            return;
        }
        let steps = ((t - playhead.loop_base) / step).round();
        playhead.cursor = if steps >= 0.0 && (steps as usize) < columns {
            Some(steps as usize)
        } else {
            None
        };
    }
}

/// Each step cuts the previous chord before sounding its own
fn trigger_callback(
    playhead: Arc<Mutex<Playhead>>,
    generation: u64,
    frequencies: Vec<f32>,
    step: f64,
) -> impl FnMut(f64) + Send + 'static {
    move |_| {
        let mut playhead = playhead.lock();
        if playhead.generation != generation {
            return;
        }
        if let Some(voice) = playhead.voice.as_mut() {
            voice.release_all();
            voice.trigger_attack_release(&frequencies, step);
        }
    }
}

impl Drop for SequencerEngine {
    fn drop(&mut self) {
        self.teardown();
    }
}
