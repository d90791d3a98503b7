// Synth module - Reference voices behind the `Voice` seam

pub mod envelope;
pub mod oscillator;
pub mod poly_synth;
pub mod trait_def;
pub mod voice;
