use egui::Context;

use crate::config::DemoKind;
use crate::controller::{MoveFlags, UiActions, UiModel};
use crate::model::LensMode;

const SHADOW_X: std::ops::RangeInclusive<f32> = -10.0..=10.0;
const SHADOW_Y: std::ops::RangeInclusive<f32> = 0.0..=15.0;
const SHADOW_Z: std::ops::RangeInclusive<f32> = -10.0..=10.0;

/// Run one egui pass over `model` and collect what the user changed.
pub fn run(egui_ctx: &Context, raw_input: egui::RawInput, model: &UiModel) -> (egui::FullOutput, UiActions) {
    let mut actions = UiActions::default();
    let output = egui_ctx.run(raw_input, |ctx| {
        // egui may run the closure more than once per frame
        actions = UiActions::default();
        draw_overlay(ctx, model);
        draw_info_sidebar(ctx, model);
        draw_controls(ctx, model, &mut actions);
        if model.touch_panel {
            actions.touch_panel = Some(draw_touch_panel(ctx));
        }
    });
    (output, actions)
}

fn info_text(kind: DemoKind) -> &'static str {
    match kind {
        DemoKind::AmesRoom => {
            "A distorted room that looks rectangular from one viewpoint. \
             Switch presets to see how the illusion falls apart."
        }
        DemoKind::Lens => {
            "A disc in front of the camera resamples the scene. \
             Pick a lens to change how it bends the image."
        }
        DemoKind::Mirror => {
            "Walk with WASD or the arrow keys and look with the mouse. \
             The mirrors refresh their reflections every few frames."
        }
        DemoKind::Prism => {
            "White light splits into bands as it passes the prism. \
             Rotate it to change how far the colours spread."
        }
        DemoKind::Shadow => "Move the light to see how the object's shading changes.",
        DemoKind::Spiral => "Drag to look around the spiral.",
        DemoKind::Background => "Move the pointer over the canvas.",
    }
}

/// Loading, error and start hints centred over the canvas.
fn draw_overlay(ctx: &Context, model: &UiModel) {
    if !model.overlay_visible {
        return;
    }
    egui::Area::new(egui::Id::new("status_overlay"))
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .interactable(false)
        .show(ctx, |ui| {
            egui::Frame::NONE
                .fill(egui::Color32::from_black_alpha(160))
                .inner_margin(12.0)
                .corner_radius(6.0)
                .show(ui, |ui| {
                    ui.label(egui::RichText::new(&model.status_text).size(18.0).color(egui::Color32::WHITE));
                });
        });
}

fn info_text_id() -> egui::Id {
    egui::Id::new("info_text_shown")
}

/// Whether the sidebar shows its description; kept in egui memory.
fn info_text_shown(ctx: &Context) -> bool {
    ctx.data_mut(|d| *d.get_temp_mut_or(info_text_id(), true))
}

fn set_info_text_shown(ctx: &Context, shown: bool) {
    ctx.data_mut(|d| d.insert_temp(info_text_id(), shown));
}

fn draw_info_sidebar(ctx: &Context, model: &UiModel) {
    let mut shown = info_text_shown(ctx);
    egui::Window::new(model.title.as_str())
        .id(egui::Id::new("info_sidebar"))
        .default_pos([8.0, 8.0])
        .default_width(220.0)
        .default_open(false)
        .resizable(false)
        .show(ctx, |ui| {
            ui.toggle_value(&mut shown, "Text");
            if shown {
                ui.label(egui::RichText::new(info_text(model.kind)).small());
            }
        });
    set_info_text_shown(ctx, shown);
}

fn draw_controls(ctx: &Context, model: &UiModel, actions: &mut UiActions) {
    let has_controls = model.lens_mode.is_some()
        || !model.preset_names.is_empty()
        || model.prism.is_some()
        || model.shadow_light.is_some();
    if !has_controls {
        return;
    }

    egui::Window::new("Controls")
        .anchor(egui::Align2::RIGHT_TOP, [-8.0, 8.0])
        .resizable(false)
        .collapsible(true)
        .show(ctx, |ui| {
            if let Some(current) = model.lens_mode {
                ui.label(egui::RichText::new("Lens").small());
                ui.horizontal_wrapped(|ui| {
                    for mode in LensMode::ALL {
                        if ui.selectable_label(mode == current, mode.label()).clicked() && mode != current {
                            actions.lens_mode = Some(mode);
                        }
                    }
                });
            }

            if !model.preset_names.is_empty() {
                ui.label(egui::RichText::new("View").small());
                ui.horizontal_wrapped(|ui| {
                    for name in &model.preset_names {
                        if ui.button(name).clicked() {
                            actions.preset = Some(name.clone());
                        }
                    }
                });
            }

            if let Some((angle, show)) = model.prism {
                let mut angle = angle;
                ui.label(egui::RichText::new("Prism angle").small());
                if ui.add(egui::Slider::new(&mut angle, -90.0..=90.0).suffix("°")).changed() {
                    actions.prism_angle_deg = Some(angle);
                }
                let mut show = show;
                if ui.checkbox(&mut show, "Show spectrum").changed() {
                    actions.show_spectrum = Some(show);
                }
            }

            if let Some([x, y, z]) = model.shadow_light {
                let mut pos = [x, y, z];
                ui.label(egui::RichText::new("Light position").small());
                let mut changed = false;
                changed |= ui.add(egui::Slider::new(&mut pos[0], SHADOW_X).text("x")).changed();
                changed |= ui.add(egui::Slider::new(&mut pos[1], SHADOW_Y).text("y")).changed();
                changed |= ui.add(egui::Slider::new(&mut pos[2], SHADOW_Z).text("z")).changed();
                if changed {
                    actions.shadow_light = Some(pos);
                }
            }
        });
}

/// Four hold-to-move buttons; returns which are held this frame.
fn draw_touch_panel(ctx: &Context) -> MoveFlags {
    let mut flags = MoveFlags::NONE;
    let size = egui::vec2(56.0, 56.0);
    egui::Area::new(egui::Id::new("touch_panel"))
        .anchor(egui::Align2::LEFT_BOTTOM, [16.0, -16.0])
        .show(ctx, |ui| {
            let held = |ui: &mut egui::Ui, label: &str| {
                ui.add_sized(size, egui::Button::new(egui::RichText::new(label).size(22.0)))
                    .is_pointer_button_down_on()
            };
            ui.vertical(|ui| {
                ui.horizontal(|ui| {
                    ui.add_space(size.x + ui.spacing().item_spacing.x);
                    flags.forward = held(ui, "▲");
                });
                ui.horizontal(|ui| {
                    flags.left = held(ui, "◀");
                    flags.backward = held(ui, "▼");
                    flags.right = held(ui, "▶");
                });
            });
        });
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(kind: DemoKind) -> UiModel {
        UiModel {
            kind,
            title: kind.title().to_string(),
            overlay_visible: true,
            status_text: "Loading...".to_string(),
            lens_mode: None,
            preset_names: Vec::new(),
            prism: None,
            shadow_light: None,
            touch_panel: false,
        }
    }

    #[test]
    fn idle_frame_produces_no_actions() {
        let ctx = Context::default();
        let mut m = model(DemoKind::Shadow);
        m.shadow_light = Some([9.5, 2.0, 3.0]);
        let (_, actions) = run(&ctx, egui::RawInput::default(), &m);
        assert_eq!(actions.shadow_light, None);
        assert_eq!(actions.preset, None);
        assert!(actions.touch_panel.is_none());
    }

    #[test]
    fn info_text_toggle_survives_frames() {
        let ctx = Context::default();
        let m = model(DemoKind::Prism);
        run(&ctx, egui::RawInput::default(), &m);
        assert!(info_text_shown(&ctx));

        set_info_text_shown(&ctx, false);
        run(&ctx, egui::RawInput::default(), &m);
        assert!(!info_text_shown(&ctx));
    }

    #[test]
    fn touch_panel_reports_released_buttons() {
        let ctx = Context::default();
        let mut m = model(DemoKind::Mirror);
        m.touch_panel = true;
        let (_, actions) = run(&ctx, egui::RawInput::default(), &m);
        assert_eq!(actions.touch_panel, Some(MoveFlags::NONE));
    }
}
