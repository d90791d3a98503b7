// Offline backend - No device; audio is rendered on demand
// Used for headless runs, benches and tests

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::audio::context::{AudioBackend, AudioError};
use crate::audio::mixer::Mixer;
use crate::sequencer::transport::{DEFAULT_SAMPLE_RATE, TransportClock};
use crate::synth::oscillator::Waveform;
use crate::synth::trait_def::Voice;

pub struct OfflineContext {
    clock: Arc<TransportClock>,
    mixer: Arc<Mixer>,
    unlock_failure: Mutex<Option<AudioError>>,
    unlock_calls: AtomicUsize,
}

impl OfflineContext {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            clock: Arc::new(TransportClock::new(sample_rate)),
            mixer: Mixer::new(sample_rate as f32),
            unlock_failure: Mutex::new(None),
            unlock_calls: AtomicUsize::new(0),
        }
    }

    /// Make every following `unlock()` fail with `error` (or succeed again with `None`)
    pub fn set_unlock_failure(&self, error: Option<AudioError>) {
        *self.unlock_failure.lock() = error;
    }

    pub fn unlock_calls(&self) -> usize {
        self.unlock_calls.load(Ordering::Relaxed)
    }

    pub fn mixer(&self) -> &Arc<Mixer> {
        &self.mixer
    }

    /// Render `frames` mono samples, driving the clock as the device would
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames];
        let mut offset = 0;
        self.clock.process_block(frames, |n| {
            self.mixer.render_add(&mut out[offset..offset + n]);
            offset += n;
        });
        out
    }

    /// Render until the clock reads `seconds`
    pub fn render_until(&self, seconds: f64) -> Vec<f32> {
        let target = (seconds * self.clock.sample_rate()).round() as u64;
        let frames = target.saturating_sub(self.clock.position_samples());
        self.render(frames as usize)
    }
}

impl Default for OfflineContext {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl AudioBackend for OfflineContext {
    fn clock(&self) -> Arc<TransportClock> {
        Arc::clone(&self.clock)
    }

    fn unlock(&self) -> Result<(), AudioError> {
        self.unlock_calls.fetch_add(1, Ordering::Relaxed);
        match self.unlock_failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn create_voice(&self, waveform: Waveform, amplitude: f32) -> Box<dyn Voice> {
        Box::new(self.mixer.create_voice(waveform, amplitude))
    }
}
