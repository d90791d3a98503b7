// Sequencer grid UI - One card per sequencer: controls, note grid, cursor
// Pure renderer: user input is returned as actions, never applied here

use crate::project::types::Color;
use crate::sequencer::engine::SequencerEngine;
use crate::sequencer::note::{COMMON_NOTES, NOTES, Note};
use crate::sequencer::pattern::Step;
use crate::synth::oscillator::Waveform;
use eframe::egui;
use egui::{Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, Ui, Vec2};
use std::ops::Range;

const LABEL_WIDTH: f32 = 36.0;
const HEADER_HEIGHT: f32 = 18.0;
const CELL_WIDTH: f32 = 20.0;
const CELL_HEIGHT: f32 = 12.0;

/// What the user did on a sequencer card
#[derive(Debug, Clone, PartialEq)]
pub enum GridAction {
    ClickCell(Step, Note),
    /// Quick-pick button: audition a note without editing
    Preview(Note),
    /// Column header click: delete that column, or append on the last header
    ColumnHeader(Step),
    SetWaveform(Waveform),
    RequestAmplitude(f32),
    TogglePlayback,
    Remove,
}

/// Card colors resolved from the stored hex strings
struct Palette {
    header: Color32,
    text: Color32,
    border: Color32,
    line: Color32,
}

impl Palette {
    fn from_color(color: &Color) -> Self {
        let resolve = |hex: &str, fallback: Color32| {
            Color::parse_hex(hex)
                .map(|[r, g, b]| Color32::from_rgb(r, g, b))
                .unwrap_or(fallback)
        };
        Self {
            header: resolve(&color.header, Color32::from_gray(60)),
            text: resolve(&color.text, Color32::WHITE),
            border: resolve(&color.border, Color32::from_gray(90)),
            line: resolve(&color.line, Color32::from_rgb(255, 100, 100)),
        }
    }
}

/// Per-card UI state
#[derive(Debug, Default)]
pub struct GridEditor {
    /// Slider value while dragging (the engine applies it rate-limited)
    amplitude_ui: Option<f32>,
}

impl GridEditor {
    pub fn show(
        &mut self,
        ui: &mut Ui,
        index: usize,
        engine: &SequencerEngine,
        color: &Color,
    ) -> Vec<GridAction> {
        let palette = Palette::from_color(color);
        let mut actions = Vec::new();

        egui::Frame::group(ui.style())
            .stroke(Stroke::new(1.5, palette.border))
            .show(ui, |ui| {
                self.show_toolbar(ui, index, engine, &palette, &mut actions);
                Self::show_quick_pick(ui, &mut actions);
                ui.add_space(4.0);
                egui::ScrollArea::both()
                    .id_salt(("sequencer_grid", index))
                    .max_height(320.0)
                    .auto_shrink([false, true])
                    .show(ui, |ui| {
                        Self::draw_grid(ui, engine, &palette, &mut actions);
                    });
            });

        actions
    }

    fn show_toolbar(
        &mut self,
        ui: &mut Ui,
        index: usize,
        engine: &SequencerEngine,
        palette: &Palette,
        actions: &mut Vec<GridAction>,
    ) {
        ui.horizontal(|ui| {
            egui::Frame::none()
                .fill(palette.header)
                .inner_margin(Vec2::new(6.0, 2.0))
                .show(ui, |ui| {
                    ui.colored_label(palette.text, format!("Sequencer {}", index + 1));
                });

            // Play/stop belongs to the ensemble while it is managed
            let label = if engine.is_playing() { "⏹" } else { "▶" };
            let button = ui.add_enabled(!engine.is_managed(), egui::Button::new(label));
            if button.clicked() {
                actions.push(GridAction::TogglePlayback);
            }

            let mut waveform = engine.waveform();
            egui::ComboBox::from_id_salt(("waveform", index))
                .selected_text(waveform.as_str())
                .show_ui(ui, |ui| {
                    for option in Waveform::ALL {
                        ui.selectable_value(&mut waveform, option, option.as_str());
                    }
                });
            if waveform != engine.waveform() {
                actions.push(GridAction::SetWaveform(waveform));
            }

            ui.label("Volume:");
            let mut amplitude = self.amplitude_ui.unwrap_or_else(|| engine.amplitude());
            let slider = ui.add(egui::Slider::new(&mut amplitude, 0.0..=1.0).show_value(false));
            if slider.changed() {
                self.amplitude_ui = Some(amplitude);
                actions.push(GridAction::RequestAmplitude(amplitude));
            }
            if !slider.dragged() && !slider.changed() {
                self.amplitude_ui = None;
            }

            if ui.button("🗑").on_hover_text("Remove sequencer").clicked() {
                actions.push(GridAction::Remove);
            }
        });
    }

    fn show_quick_pick(ui: &mut Ui, actions: &mut Vec<GridAction>) {
        ui.horizontal(|ui| {
            ui.label("Try:");
            for note in COMMON_NOTES {
                if ui.small_button(note.name()).clicked() {
                    actions.push(GridAction::Preview(note));
                }
            }
        });
    }

    fn draw_grid(
        ui: &mut Ui,
        engine: &SequencerEngine,
        palette: &Palette,
        actions: &mut Vec<GridAction>,
    ) {
        let columns = engine.columns();
        // One extra header column appends a column
        let size = Vec2::new(
            LABEL_WIDTH + (columns + 1) as f32 * CELL_WIDTH,
            HEADER_HEIGHT + NOTES.len() as f32 * CELL_HEIGHT,
        );
        let (response, painter) = ui.allocate_painter(size, Sense::click());
        let rect = response.rect;
        painter.rect_filled(rect, 0.0, Color32::from_gray(30));

        let cursor = engine.cursor();
        let font = FontId::monospace(9.0);
        // Only columns inside the scroll viewport are painted
        let visible = Self::visible_steps(rect, ui.clip_rect(), columns);
        let visible_cells = visible.start..visible.end.min(columns);

        // Column headers
        for step in visible.clone() {
            let cell = Self::header_rect(rect, step);
            let (text, fill) = if step == columns {
                ("+".to_string(), Color32::from_gray(45))
            } else if cursor == Some(step) {
                ((step + 1).to_string(), palette.line)
            } else {
                ((step + 1).to_string(), palette.header)
            };
            painter.rect_filled(cell.shrink(1.0), 2.0, fill);
            painter.text(cell.center(), Align2::CENTER_CENTER, text, font.clone(), palette.text);
        }

        // Rows, highest note on top
        for (row, note) in NOTES.iter().rev().enumerate() {
            let y = rect.top() + HEADER_HEIGHT + row as f32 * CELL_HEIGHT;
            let label_rect = Rect::from_min_size(
                Pos2::new(rect.left(), y),
                Vec2::new(LABEL_WIDTH, CELL_HEIGHT),
            );
            let label_fill = if note.is_altered() {
                Color32::from_gray(20)
            } else {
                Color32::from_gray(200)
            };
            let label_text = if note.is_altered() {
                Color32::from_gray(200)
            } else {
                Color32::from_gray(20)
            };
            painter.rect_filled(label_rect.shrink(0.5), 0.0, label_fill);
            painter.text(label_rect.center(), Align2::CENTER_CENTER, note.name(), font.clone(), label_text);

            for step in visible_cells.clone() {
                let cell = Self::cell_rect(rect, step, row);
                let fill = if engine.grid().contains(step, note) {
                    palette.line
                } else if cursor == Some(step) {
                    Color32::from_gray(70)
                } else if note.is_altered() {
                    Color32::from_gray(38)
                } else {
                    Color32::from_gray(48)
                };
                painter.rect_filled(cell.shrink(1.0), 1.0, fill);
            }
        }

        if response.clicked()
            && let Some(pos) = response.interact_pointer_pos()
            && let Some(action) = Self::hit_test(rect, pos, columns)
        {
            actions.push(action);
        }
    }

    /// Header indices (the "+" header included) overlapping `clip`
    fn visible_steps(rect: Rect, clip: Rect, columns: usize) -> Range<Step> {
        let origin = rect.left() + LABEL_WIDTH;
        let first = ((clip.left() - origin) / CELL_WIDTH).floor().max(0.0) as usize;
        let last = ((clip.right() - origin) / CELL_WIDTH).ceil().max(0.0) as usize;
        let end = (last + 1).min(columns + 1);
        first.min(end)..end
    }

    fn header_rect(rect: Rect, step: Step) -> Rect {
        Rect::from_min_size(
            Pos2::new(rect.left() + LABEL_WIDTH + step as f32 * CELL_WIDTH, rect.top()),
            Vec2::new(CELL_WIDTH, HEADER_HEIGHT),
        )
    }

    fn cell_rect(rect: Rect, step: Step, row: usize) -> Rect {
        Rect::from_min_size(
            Pos2::new(
                rect.left() + LABEL_WIDTH + step as f32 * CELL_WIDTH,
                rect.top() + HEADER_HEIGHT + row as f32 * CELL_HEIGHT,
            ),
            Vec2::new(CELL_WIDTH, CELL_HEIGHT),
        )
    }

    /// Map a click inside the grid to an action
    fn hit_test(rect: Rect, pos: Pos2, columns: usize) -> Option<GridAction> {
        let x = pos.x - rect.left() - LABEL_WIDTH;
        let y = pos.y - rect.top();
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let step = (x / CELL_WIDTH) as usize;

        if y < HEADER_HEIGHT {
            return (step <= columns).then_some(GridAction::ColumnHeader(step));
        }
        if step >= columns {
            return None;
        }
        let row = ((y - HEADER_HEIGHT) / CELL_HEIGHT) as usize;
        let note = *NOTES.iter().rev().nth(row)?;
        Some(GridAction::ClickCell(step, note))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_rect() -> Rect {
        Rect::from_min_size(Pos2::new(10.0, 10.0), Vec2::new(400.0, 700.0))
    }

    #[test]
    fn test_header_click_maps_to_column() {
        let rect = grid_rect();
        let pos = Pos2::new(10.0 + LABEL_WIDTH + 2.5 * CELL_WIDTH, 15.0);
        assert_eq!(
            GridEditor::hit_test(rect, pos, 16),
            Some(GridAction::ColumnHeader(2))
        );

        // The extra header appends
        let append = Pos2::new(10.0 + LABEL_WIDTH + 16.5 * CELL_WIDTH, 15.0);
        assert_eq!(
            GridEditor::hit_test(rect, append, 16),
            Some(GridAction::ColumnHeader(16))
        );
    }

    #[test]
    fn test_cell_click_maps_to_note() {
        let rect = grid_rect();
        // First row is the highest note
        let top = Pos2::new(10.0 + LABEL_WIDTH + 0.5 * CELL_WIDTH, 10.0 + HEADER_HEIGHT + 1.0);
        assert_eq!(
            GridEditor::hit_test(rect, top, 16),
            Some(GridAction::ClickCell(0, Note::from_name("C7").unwrap()))
        );

        let bottom = Pos2::new(
            10.0 + LABEL_WIDTH + 3.5 * CELL_WIDTH,
            10.0 + HEADER_HEIGHT + 48.5 * CELL_HEIGHT,
        );
        assert_eq!(
            GridEditor::hit_test(rect, bottom, 16),
            Some(GridAction::ClickCell(3, Note::from_name("C3").unwrap()))
        );
    }

    #[test]
    fn test_clicks_outside_cells_are_ignored() {
        let rect = grid_rect();
        assert_eq!(GridEditor::hit_test(rect, Pos2::new(12.0, 40.0), 16), None);
        let past_end = Pos2::new(10.0 + LABEL_WIDTH + 16.5 * CELL_WIDTH, 60.0);
        assert_eq!(GridEditor::hit_test(rect, past_end, 16), None);
    }

    #[test]
    fn test_only_visible_columns_are_painted() {
        let columns = 100_000_000;
        let rect = Rect::from_min_size(
            Pos2::new(0.0, 0.0),
            Vec2::new(LABEL_WIDTH + (columns + 1) as f32 * CELL_WIDTH, 600.0),
        );

        let clip = Rect::from_min_size(Pos2::new(0.0, 0.0), Vec2::new(400.0, 600.0));
        let visible = GridEditor::visible_steps(rect, clip, columns);
        assert_eq!(visible.start, 0);
        assert!(visible.len() <= 400 / CELL_WIDTH as usize + 2);

        // Scrolled to the end: the "+" header is the last painted index
        let columns = 100_000;
        let rect = Rect::from_min_size(
            Pos2::new(0.0, 0.0),
            Vec2::new(LABEL_WIDTH + (columns + 1) as f32 * CELL_WIDTH, 600.0),
        );
        let far = Rect::from_min_max(
            Pos2::new(rect.right() - 400.0, 0.0),
            Pos2::new(rect.right(), 600.0),
        );
        let visible = GridEditor::visible_steps(rect, far, columns);
        assert_eq!(visible.end, columns + 1);
        assert!(visible.len() <= 400 / CELL_WIDTH as usize + 2);
    }

    #[test]
    fn test_short_grid_paints_every_column() {
        let rect = grid_rect();
        assert_eq!(GridEditor::visible_steps(rect, rect, 4), 0..5);
    }

    #[test]
    fn test_palette_falls_back_on_bad_hex() {
        let color = Color {
            header: "#bcdefb".to_string(),
            text: "not a color".to_string(),
            ..Color::default()
        };
        let palette = Palette::from_color(&color);
        assert_eq!(palette.header, Color32::from_rgb(0xbc, 0xde, 0xfb));
        assert_eq!(palette.text, Color32::WHITE);
    }
}
