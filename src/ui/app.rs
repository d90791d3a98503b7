// Main UI App - Transport bar, sequencer cards and status bar

use crate::audio::context::AudioContext;
use crate::messaging::notification::{Notification, NotificationLevel};
use crate::project::manager::ProjectManager;
use crate::sequencer::ensemble::Coordinator;
use crate::sequencer::timeline::Tempo;
use crate::ui::grid::{GridAction, GridEditor};
use eframe::egui;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct PlaygroundApp {
    coordinator: Coordinator,
    audio: Arc<AudioContext>,
    editors: Vec<GridEditor>,
    tempo_ui: i64,
    master_gain_ui: f32,
    // Notification system
    notification_queue: VecDeque<Notification>,
    max_notifications: usize,
}

impl PlaygroundApp {
    pub fn new(coordinator: Coordinator, audio: Arc<AudioContext>) -> Self {
        let tempo_ui = i64::from(coordinator.tempo().bpm());
        let master_gain_ui = audio.master_gain();
        Self {
            coordinator,
            audio,
            editors: Vec::new(),
            tempo_ui,
            master_gain_ui,
            notification_queue: VecDeque::new(),
            max_notifications: 10,
        }
    }

    /// Collect notifications from the output stream and the coordinator
    fn update_notifications(&mut self) {
        let incoming = self
            .audio
            .drain_notifications()
            .into_iter()
            .chain(self.coordinator.take_notifications());
        for notification in incoming {
            self.notification_queue.push_back(notification);
            if self.notification_queue.len() > self.max_notifications {
                self.notification_queue.pop_front();
            }
        }
    }

    /// Notifications younger than 5 seconds, newest first
    fn recent_notifications(&self) -> Vec<&Notification> {
        self.notification_queue
            .iter()
            .rev()
            .filter(|n| n.is_recent(5000))
            .take(3)
            .collect()
    }

    fn draw_transport(&mut self, ui: &mut egui::Ui) {
        let now = Instant::now();
        ui.horizontal(|ui| {
            ui.menu_button("☰", |ui| {
                if ui.button("Clear").clicked() {
                    self.coordinator.clear();
                    self.tempo_ui = i64::from(self.coordinator.tempo().bpm());
                    ui.close_menu();
                }
                ui.separator();
                if ui.button("Export…").clicked() {
                    ui.close_menu();
                    self.export_dialog();
                }
                if ui.button("Import…").clicked() {
                    ui.close_menu();
                    self.import_dialog();
                }
                ui.separator();
                ui.menu_button("Demos", |ui| {
                    let names: Vec<String> =
                        self.coordinator.demos().iter().map(|d| d.name.clone()).collect();
                    if names.is_empty() {
                        ui.label("No demos available");
                    }
                    for name in names {
                        if ui.button(&name).clicked() {
                            ui.close_menu();
                            if self.coordinator.import_demo(&name) {
                                self.after_import();
                            }
                        }
                    }
                });
            });

            ui.separator();

            ui.label(format!("Tempo {} BPM", self.coordinator.tempo().bpm()));
            let slider = egui::Slider::new(
                &mut self.tempo_ui,
                i64::from(Tempo::MIN_BPM)..=i64::from(Tempo::MAX_BPM),
            )
            .show_value(false);
            if ui.add(slider).changed() {
                self.coordinator.request_tempo(self.tempo_ui, now);
            }

            ui.separator();

            let label = if self.coordinator.is_playing() { "⏹ Stop" } else { "▶ Play" };
            if ui.button(label).clicked() {
                self.coordinator.toggle_playback();
            }

            ui.separator();

            ui.label("Master:");
            if ui
                .add(egui::Slider::new(&mut self.master_gain_ui, 0.0..=1.0))
                .changed()
            {
                self.audio.set_master_gain(self.master_gain_ui);
            }
        });
    }

    fn draw_sequencers(&mut self, ui: &mut egui::Ui) {
        let now = Instant::now();
        self.editors.resize_with(self.coordinator.len(), GridEditor::default);

        let mut pending = Vec::new();
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for (index, editor) in self.editors.iter_mut().enumerate() {
                    let (Some(engine), Some(color)) =
                        (self.coordinator.engine(index), self.coordinator.color(index))
                    else {
                        continue;
                    };
                    let actions = editor.show(ui, index, engine, color);
                    pending.extend(actions.into_iter().map(|action| (index, action)));
                    ui.add_space(8.0);
                }

                if ui.button("+").on_hover_text("Add sequencer").clicked() {
                    self.coordinator.add_sequencer();
                }
            });

        // Removing shifts indices, so it is applied last
        let mut removed = None;
        for (index, action) in pending {
            match action {
                GridAction::ClickCell(step, note) => {
                    self.coordinator.edit(index, |e| e.click_cell(step, note));
                }
                GridAction::Preview(note) => {
                    self.coordinator.edit(index, |e| e.preview(note));
                }
                GridAction::ColumnHeader(step) => {
                    self.coordinator.edit(index, |e| e.insert_column_and_delete(step));
                }
                GridAction::SetWaveform(waveform) => {
                    self.coordinator.edit(index, |e| e.set_waveform(waveform));
                }
                GridAction::RequestAmplitude(amplitude) => {
                    self.coordinator
                        .edit(index, |e| e.request_amplitude(amplitude, now));
                }
                GridAction::TogglePlayback => {
                    self.coordinator.edit(index, |e| e.toggle_playback());
                }
                GridAction::Remove => removed = Some(index),
            }
        }
        if let Some(index) = removed {
            self.coordinator.remove_sequencer(index);
            if index < self.editors.len() {
                self.editors.remove(index);
            }
        }
    }

    fn export_dialog(&mut self) {
        let file_name = ProjectManager::new().default_file_name().to_string();
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .set_file_name(file_name)
            .save_file()
        {
            self.coordinator.export_to_file(&path);
        }
    }

    fn import_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .pick_file()
            && self.coordinator.import_from_file(&path)
        {
            self.after_import();
        }
    }

    /// Imported ensembles get fresh editors and the imported tempo
    fn after_import(&mut self) {
        self.tempo_ui = i64::from(self.coordinator.tempo().bpm());
        self.editors.clear();
    }

    fn draw_status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let recent = self.recent_notifications();
            if recent.is_empty() {
                ui.label("Ready");
                return;
            }
            for notification in recent {
                let (icon, color) = match notification.level {
                    NotificationLevel::Info => ("ℹ", egui::Color32::from_rgb(100, 150, 255)),
                    NotificationLevel::Warning => ("⚠", egui::Color32::from_rgb(255, 165, 0)),
                    NotificationLevel::Error => ("✖", egui::Color32::RED),
                };
                ui.colored_label(color, icon);
                ui.colored_label(color, &notification.message);
                ui.add_space(10.0);
            }
        });
    }
}

impl eframe::App for PlaygroundApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Trailing slider values and the moving cursor need regular frames
        ctx.request_repaint_after(Duration::from_millis(16));

        self.coordinator.poll(Instant::now());
        self.update_notifications();

        egui::TopBottomPanel::top("transport").show(ctx, |ui| {
            ui.add_space(4.0);
            self.draw_transport(ui);
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.draw_status_bar(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_sequencers(ui);
        });
    }
}
