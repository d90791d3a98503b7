// UI module - egui presentation over the coordinator

pub mod app;
pub mod grid;
