// Poly synth - Polyphony handling for one sequencer

use super::oscillator::Waveform;
use super::voice::SynthVoice;

pub const MAX_VOICES: usize = 16;

/// Fixed pool of voices sharing one waveform and one output gain
pub struct PolySynth {
    voices: [SynthVoice; MAX_VOICES],
    waveform: Waveform,
    amplitude: f32,
    sample_rate: f32,
    /// Age counter incremented on each note for voice stealing priority
    age_counter: u64,
}

impl PolySynth {
    pub fn new(waveform: Waveform, amplitude: f32, sample_rate: f32) -> Self {
        let voices = std::array::from_fn(|_| SynthVoice::new(waveform, sample_rate));

        Self {
            voices,
            waveform,
            amplitude: amplitude.clamp(0.0, 1.0),
            sample_rate,
            age_counter: 0,
        }
    }

    /// Start all frequencies at once, each gated for `duration` seconds
    pub fn trigger_attack_release(&mut self, frequencies: &[f32], duration: f64) {
        let gate_samples = (duration.max(0.0) * self.sample_rate as f64).round() as u64;
        for &frequency in frequencies {
            self.age_counter = self.age_counter.wrapping_add(1);
            let index = match self.voices.iter().position(|v| !v.is_active()) {
                Some(free) => free,
                None => self.find_voice_to_steal(),
            };
            self.voices[index].note_on(frequency, gate_samples, self.age_counter);
        }
    }

    /// Releasing voices first, then the oldest
    fn find_voice_to_steal(&self) -> usize {
        self.voices
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| (!v.is_releasing(), v.age()))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    pub fn release_all(&mut self) {
        for voice in self.voices.iter_mut().filter(|v| v.is_active()) {
            voice.note_off();
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
        for voice in &mut self.voices {
            voice.set_waveform(waveform);
        }
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude.clamp(0.0, 1.0);
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    pub fn next_sample(&mut self) -> f32 {
        let sum: f32 = self.voices.iter_mut().map(|v| v.next_sample()).sum();
        sum * self.amplitude / 4.0
    }

    /// Add this synth's output to `out` (mono)
    pub fn render_add(&mut self, out: &mut [f32]) {
        if self.active_voice_count() == 0 {
            return;
        }
        for sample in out.iter_mut() {
            *sample += self.next_sample();
        }
    }
}
