// Shared helpers for integration tests
// A backend whose voices record every call instead of producing sound

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use synth_playground::audio::context::{AudioBackend, AudioError};
use synth_playground::sequencer::transport::TransportClock;
use synth_playground::synth::oscillator::Waveform;
use synth_playground::synth::trait_def::Voice;

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceCall {
    Trigger { frequencies: Vec<f32>, duration: f64 },
    ReleaseAll,
    Waveform(Waveform),
    Amplitude(f32),
}

/// Calls of one voice, tagged with the clock time they happened at
pub type CallLog = Arc<Mutex<Vec<(f64, VoiceCall)>>>;

pub struct RecordingVoice {
    clock: Arc<TransportClock>,
    log: CallLog,
}

impl RecordingVoice {
    fn record(&self, call: VoiceCall) {
        self.log.lock().push((self.clock.now(), call));
    }
}

impl Voice for RecordingVoice {
    fn trigger_attack_release(&mut self, frequencies: &[f32], duration: f64) {
        self.record(VoiceCall::Trigger {
            frequencies: frequencies.to_vec(),
            duration,
        });
    }

    fn release_all(&mut self) {
        self.record(VoiceCall::ReleaseAll);
    }

    fn set_waveform(&mut self, waveform: Waveform) {
        self.record(VoiceCall::Waveform(waveform));
    }

    fn set_amplitude(&mut self, amplitude: f32) {
        self.record(VoiceCall::Amplitude(amplitude));
    }
}

pub struct RecordingBackend {
    clock: Arc<TransportClock>,
    unlock_failure: Mutex<Option<AudioError>>,
    /// One log per created voice, in creation order
    voices: Mutex<Vec<CallLog>>,
}

impl RecordingBackend {
    pub fn new(sample_rate: f64) -> Arc<Self> {
        Arc::new(Self {
            clock: Arc::new(TransportClock::new(sample_rate)),
            unlock_failure: Mutex::new(None),
            voices: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_unlock(&self, error: Option<AudioError>) {
        *self.unlock_failure.lock() = error;
    }

    pub fn voice_count(&self) -> usize {
        self.voices.lock().len()
    }

    pub fn calls(&self, voice: usize) -> Vec<(f64, VoiceCall)> {
        self.voices
            .lock()
            .get(voice)
            .map(|log| log.lock().clone())
            .unwrap_or_default()
    }

    /// Clock times of every trigger of one voice
    pub fn trigger_times(&self, voice: usize) -> Vec<f64> {
        self.calls(voice)
            .into_iter()
            .filter(|(_, call)| matches!(call, VoiceCall::Trigger { .. }))
            .map(|(t, _)| t)
            .collect()
    }
}

impl AudioBackend for RecordingBackend {
    fn clock(&self) -> Arc<TransportClock> {
        Arc::clone(&self.clock)
    }

    fn unlock(&self) -> Result<(), AudioError> {
        match self.unlock_failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn create_voice(&self, _waveform: Waveform, _amplitude: f32) -> Box<dyn Voice> {
        let log = CallLog::default();
        self.voices.lock().push(Arc::clone(&log));
        Box::new(RecordingVoice {
            clock: Arc::clone(&self.clock),
            log,
        })
    }
}
