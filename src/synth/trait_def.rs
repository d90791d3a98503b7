// Voice trait definition

use super::oscillator::Waveform;

/// Polyphonic synthesis resource owned by one sequencer
///
/// Implementations render on the audio thread; the handle is driven from the
/// thread that owns the sequencer. Dropping the handle disposes the resource.
pub trait Voice: Send {
    /// Start every frequency now and release them after `duration` seconds
    fn trigger_attack_release(&mut self, frequencies: &[f32], duration: f64);

    /// Release every sounding note
    fn release_all(&mut self);

    fn set_waveform(&mut self, waveform: Waveform);

    /// Linear output gain in [0, 1]
    fn set_amplitude(&mut self, amplitude: f32);
}
