// Voice - One sounding note of a polyphonic synth

use super::envelope::{AdsrEnvelope, AdsrParams};
use super::oscillator::{Oscillator, SimpleOscillator, Waveform};

pub struct SynthVoice {
    oscillator: SimpleOscillator,
    envelope: AdsrEnvelope,
    frequency: f32,
    /// Samples left before the gate closes (attack-release notes)
    gate_remaining: Option<u64>,
    /// Age counter for voice stealing priority (higher = newer)
    age: u64,
}

impl SynthVoice {
    pub fn new(waveform: Waveform, sample_rate: f32) -> Self {
        Self {
            oscillator: SimpleOscillator::new(waveform, sample_rate),
            envelope: AdsrEnvelope::new(AdsrParams::default(), sample_rate),
            frequency: 0.0,
            gate_remaining: None,
            age: 0,
        }
    }

    /// Start a note that releases by itself after `gate_samples`
    pub fn note_on(&mut self, frequency: f32, gate_samples: u64, age: u64) {
        self.frequency = frequency;
        self.gate_remaining = Some(gate_samples);
        self.age = age;

        self.oscillator.set_frequency(frequency);
        self.oscillator.reset();
        self.envelope.note_on();
    }

    pub fn note_off(&mut self) {
        self.gate_remaining = None;
        self.envelope.note_off();
    }

    pub fn is_active(&self) -> bool {
        self.envelope.is_active()
    }

    /// Gate closed but the release tail is still sounding
    pub fn is_releasing(&self) -> bool {
        self.envelope.is_releasing()
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.oscillator.set_waveform(waveform);
    }

    pub fn set_adsr(&mut self, params: AdsrParams) {
        self.envelope.set_params(params);
    }

    pub fn next_sample(&mut self) -> f32 {
        if !self.envelope.is_active() {
            return 0.0;
        }

        if let Some(remaining) = self.gate_remaining {
            if remaining == 0 {
                self.note_off();
            } else {
                self.gate_remaining = Some(remaining - 1);
            }
        }

        let envelope_value = self.envelope.process();
        self.oscillator.next_sample() * envelope_value
    }
}
