// Audio module - Backends, CPAL output and real-time mixing

pub mod context;
pub mod dsp_utils;
pub mod engine;
pub mod mixer;
pub mod offline;
pub mod parameters;
