use egui::Context;

use crate::controller::Simulation;
use crate::model::overlay::{HotbarButton, Overlays, Severity, NOTIFICATION_FADE_MS, PROGRESS_FADE_MS};

/// Inputs of the developer panel, kept across frames.
pub struct DevPanel {
    pub title: String,
    pub message: String,
    pub duration_ms: f64,
    pub severity: Severity,
    pub item_name: String,
    pub item_quantity: u32,
}

impl Default for DevPanel {
    fn default() -> Self {
        Self {
            title: "Test".into(),
            message: "Hello from the dev panel".into(),
            duration_ms: 3000.0,
            severity: Severity::Info,
            item_name: "Copper Ore".into(),
            item_quantity: 1,
        }
    }
}

/// Moves queued simulation commands into the overlays and runs their timers.
pub fn pump_overlays(sim: &mut Simulation, overlays: &mut Overlays, elapsed_ms: f64) {
    for cmd in sim.drain_ui_commands() {
        overlays.apply(cmd);
    }
    overlays.advance(elapsed_ms);
}

/// Build the complete UI and return egui output
pub fn build_ui(
    egui_ctx: &Context,
    raw_input: egui::RawInput,
    sim: &mut Simulation,
    overlays: &mut Overlays,
    dev: &mut DevPanel,
    dt: f32,
) -> egui::FullOutput {
    egui_ctx.run(raw_input, |ctx| {
        draw_notification(ctx, overlays);
        draw_progress(ctx, overlays);
        draw_hotbar(ctx, overlays);
        draw_inventory(ctx, sim, overlays);
        draw_dev_window(ctx, sim, overlays, dev, dt);
    })
}

fn severity_color(severity: Severity) -> egui::Color32 {
    let [r, g, b] = severity.rgb();
    egui::Color32::from_rgb(r, g, b)
}

fn draw_notification(ctx: &Context, overlays: &Overlays) {
    let Some(n) = overlays.notification() else { return };
    let alpha = ctx.animate_bool_with_time(
        egui::Id::new("notification_fade"),
        !n.fading,
        (NOTIFICATION_FADE_MS / 1000.0) as f32,
    );

    egui::Area::new(egui::Id::new("notification"))
        .anchor(egui::Align2::RIGHT_TOP, [-12.0, 12.0])
        .show(ctx, |ui| {
            egui::Frame::NONE
                .fill(egui::Color32::from_black_alpha(200).gamma_multiply(alpha))
                .stroke(egui::Stroke::new(3.0, severity_color(n.severity).gamma_multiply(alpha)))
                .inner_margin(10.0)
                .corner_radius(4.0)
                .show(ui, |ui| {
                    ui.set_max_width(260.0);
                    let text = egui::Color32::WHITE.gamma_multiply(alpha);
                    ui.label(egui::RichText::new(&n.title).strong().color(text));
                    ui.label(egui::RichText::new(&n.message).small().color(text));
                });
        });
}

fn draw_progress(ctx: &Context, overlays: &Overlays) {
    let Some(p) = overlays.progress() else { return };
    let alpha = ctx.animate_bool_with_time(
        egui::Id::new("progress_fade"),
        !p.fading,
        (PROGRESS_FADE_MS / 1000.0) as f32,
    );
    let fraction = p.fraction(overlays.now());

    egui::Area::new(egui::Id::new("progress"))
        .anchor(egui::Align2::CENTER_BOTTOM, [0.0, -72.0])
        .show(ctx, |ui| {
            ui.set_width(280.0);
            ui.multiply_opacity(alpha);
            ui.label(egui::RichText::new(&p.title).strong().color(egui::Color32::WHITE));
            ui.add(egui::ProgressBar::new(fraction).text(p.message.as_str()));
        });
}

fn draw_hotbar(ctx: &Context, overlays: &mut Overlays) {
    egui::Area::new(egui::Id::new("hotbar"))
        .anchor(egui::Align2::CENTER_BOTTOM, [0.0, -8.0])
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                for button in HotbarButton::ALL {
                    let selected = button == HotbarButton::Inventory && overlays.inventory_open();
                    let frame = egui::Frame::NONE
                        .fill(egui::Color32::from_black_alpha(160))
                        .stroke(if selected {
                            egui::Stroke::new(2.0, egui::Color32::YELLOW)
                        } else {
                            egui::Stroke::new(0.5, egui::Color32::BLACK)
                        })
                        .inner_margin(2.0);
                    let clicked = frame
                        .show(ui, |ui| {
                            ui.add_sized([72.0, 32.0], egui::Button::new(button.label()).frame(false))
                                .clicked()
                        })
                        .inner;
                    if clicked {
                        overlays.press_hotbar(button);
                    }
                }
            });
        });
}

fn draw_inventory(ctx: &Context, sim: &Simulation, overlays: &mut Overlays) {
    if !overlays.inventory_open() {
        return;
    }
    let mut open = true;
    egui::Window::new("Inventory")
        .open(&mut open)
        .default_pos([12.0, 220.0])
        .resizable(false)
        .show(ctx, |ui| {
            let stacks = sim.inventory().stacks();
            if stacks.is_empty() {
                ui.label(egui::RichText::new("Empty").small().italics());
            }
            for stack in stacks {
                ui.label(format!("{} x{}", stack.item.name, stack.quantity))
                    .on_hover_text(stack.item.description);
            }
        });
    if !open {
        overlays.toggle_inventory();
    }
}

fn draw_dev_window(ctx: &Context, sim: &mut Simulation, overlays: &mut Overlays, dev: &mut DevPanel, dt: f32) {
    let state = *sim.character_state();

    egui::Window::new("Dev")
        .default_pos([8.0, 8.0])
        .default_open(false)
        .show(ctx, |ui| {
            ui.label(
                egui::RichText::new(format!("FPS: {:.0}", if dt > 0.0 { 1.0 / dt } else { 0.0 }))
                    .small(),
            );
            ui.label(
                egui::RichText::new(format!(
                    "Pos: x: {:.2} y: {:.2} z: {:.2}",
                    state.position.x, state.position.y, state.position.z
                ))
                .small(),
            );
            ui.label(egui::RichText::new(format!("Heading: {:.1}", state.heading.to_degrees())).small());
            ui.label(
                egui::RichText::new(format!(
                    "Anim: {:?}  Mining: {:?}",
                    sim.animation_state(),
                    sim.mining_step()
                ))
                .small(),
            );

            let mut fov_deg = sim.camera.fov_y.to_degrees().clamp(30.0, 120.0);
            if ui.add(egui::Slider::new(&mut fov_deg, 30.0..=120.0).step_by(5.0).text("FOV")).changed() {
                sim.camera.fov_y = fov_deg.to_radians();
            }

            ui.separator();
            ui.label(egui::RichText::new("Notification").strong());
            ui.text_edit_singleline(&mut dev.title);
            ui.text_edit_singleline(&mut dev.message);
            ui.horizontal(|ui| {
                egui::ComboBox::from_id_salt("severity")
                    .selected_text(dev.severity.label())
                    .show_ui(ui, |ui| {
                        for sev in Severity::ALL {
                            ui.selectable_value(&mut dev.severity, sev, sev.label());
                        }
                    });
                ui.add(egui::DragValue::new(&mut dev.duration_ms).range(100.0..=60_000.0).suffix(" ms"));
            });
            if ui.button("Send").clicked() {
                overlays.notify(dev.title.clone(), dev.message.clone(), dev.duration_ms, dev.severity);
            }

            ui.separator();
            ui.label(egui::RichText::new("Items").strong());
            ui.horizontal(|ui| {
                ui.text_edit_singleline(&mut dev.item_name);
                ui.add(egui::DragValue::new(&mut dev.item_quantity).range(1..=999));
            });
            ui.horizontal(|ui| {
                if ui.button("Add").clicked() {
                    sim.add_item_by_name(dev.item_name.trim(), dev.item_quantity);
                }
                if ui.button("Remove").clicked() {
                    sim.remove_item_by_name(dev.item_name.trim(), dev.item_quantity);
                }
            });

            ui.separator();
            ui.label(egui::RichText::new("Controls:").small());
            ui.label(egui::RichText::new("WASD / arrows - Move").small());
            ui.label(egui::RichText::new("Space - Jump").small());
            ui.label(egui::RichText::new("Right drag - Orbit").small());
            ui.label(egui::RichText::new("Click red cube - Mine").small());
        });
}
