// Mixer - Sums every live synth into the output buffer
// Each sequencer voice owns one PolySynth registered here until the voice is dropped

use crate::synth::oscillator::Waveform;
use crate::synth::poly_synth::PolySynth;
use crate::synth::trait_def::Voice;
use parking_lot::Mutex;
use std::sync::Arc;

pub type SharedSynth = Arc<Mutex<PolySynth>>;

struct MixerState {
    synths: Vec<SharedSynth>,
    sample_rate: f32,
}

pub struct Mixer {
    state: Mutex<MixerState>,
}

impl Mixer {
    pub fn new(sample_rate: f32) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MixerState {
                synths: Vec::new(),
                sample_rate,
            }),
        })
    }

    /// Sample rate used for synths created from now on
    pub fn set_sample_rate(&self, sample_rate: f32) {
        self.state.lock().sample_rate = sample_rate;
    }

    pub fn sample_rate(&self) -> f32 {
        self.state.lock().sample_rate
    }

    /// Register a new synth and return the voice handle owning it
    pub fn create_voice(self: &Arc<Self>, waveform: Waveform, amplitude: f32) -> MixerVoice {
        let mut state = self.state.lock();
        let synth = Arc::new(Mutex::new(PolySynth::new(
            waveform,
            amplitude,
            state.sample_rate,
        )));
        state.synths.push(Arc::clone(&synth));
        MixerVoice {
            mixer: Arc::clone(self),
            synth,
        }
    }

    fn detach(&self, synth: &SharedSynth) {
        self.state.lock().synths.retain(|s| !Arc::ptr_eq(s, synth));
    }

    /// Number of registered synths
    pub fn voice_count(&self) -> usize {
        self.state.lock().synths.len()
    }

    /// Add every synth's output to `out`. Never blocks: a synth locked
    /// elsewhere is skipped for this block.
    pub fn render_add(&self, out: &mut [f32]) {
        let Some(state) = self.state.try_lock() else {
            return;
        };
        for synth in &state.synths {
            if let Some(mut synth) = synth.try_lock() {
                synth.render_add(out);
            }
        }
    }
}

/// Voice handle backed by a mixer synth; dropping it unregisters the synth
pub struct MixerVoice {
    mixer: Arc<Mixer>,
    synth: SharedSynth,
}

impl Voice for MixerVoice {
    fn trigger_attack_release(&mut self, frequencies: &[f32], duration: f64) {
        self.synth.lock().trigger_attack_release(frequencies, duration);
    }

    fn release_all(&mut self) {
        self.synth.lock().release_all();
    }

    fn set_waveform(&mut self, waveform: Waveform) {
        self.synth.lock().set_waveform(waveform);
    }

    fn set_amplitude(&mut self, amplitude: f32) {
        self.synth.lock().set_amplitude(amplitude);
    }
}

impl Drop for MixerVoice {
    fn drop(&mut self) {
        self.mixer.detach(&self.synth);
    }
}
