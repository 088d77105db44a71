use imgui::{Condition, TextureId};

use crate::{
    command::Command,
    lighting::LightingPreset,
    view::CameraView,
    viewer::{Presentation, Viewer},
};

const IMAGE_MAX_SIZE: [f32; 2] = [480.0, 480.0];

/// Builds the viewer's windows for this frame and returns the commands the
/// user triggered. Commands are applied by the caller after the frame is built.
pub fn draw(
    ui: &imgui::Ui,
    viewer: &Viewer,
    fallback_texture: Option<(TextureId, [f32; 2])>,
) -> Vec<Command> {
    let mut commands = Vec::new();

    ui.window("Products")
        .position([10.0, 10.0], Condition::FirstUseEver)
        .size([200.0, 260.0], Condition::FirstUseEver)
        .build(|| {
            if viewer.menu().is_empty() {
                ui.text_disabled("Catalog unavailable");
            }

            for name in viewer.menu() {
                if ui.button(name) {
                    commands.push(Command::LoadModel(name.clone()));
                }
            }
        });

    ui.window("Display")
        .position([10.0, 280.0], Condition::FirstUseEver)
        .size([200.0, 240.0], Condition::FirstUseEver)
        .build(|| {
            if ui.button("3D") {
                commands.push(Command::Show3D);
            }
            ui.same_line();
            if ui.button("Image") {
                commands.push(Command::ShowImage);
            }

            ui.separator();
            ui.text("View");
            for view in CameraView::ALL {
                if ui.button(format!("{}##view", view.label())) {
                    commands.push(Command::ChangeView(view.label().to_string()));
                }
                ui.same_line();
            }
            ui.new_line();

            ui.separator();
            ui.text("Lighting");
            for preset in LightingPreset::ALL {
                if ui.button(format!("{}##light", preset.label())) {
                    commands.push(Command::ChangeLighting(preset.label().to_string()));
                }
                ui.same_line();
            }
            ui.new_line();

            ui.separator();
            if ui.button("Wireframe") {
                commands.push(Command::ToggleWireframe);
            }
        });

    if let Some(info) = viewer.info() {
        ui.window(format!("About {}###about", info.name))
            .position([220.0, 10.0], Condition::FirstUseEver)
            .size([300.0, 120.0], Condition::FirstUseEver)
            .build(|| {
                ui.text(&info.name);
                ui.separator();
                ui.text_wrapped(&info.description);
            });
    }

    if viewer.presentation() == Presentation::Image {
        ui.window("Image")
            .position([220.0, 140.0], Condition::FirstUseEver)
            .always_auto_resize(true)
            .build(|| match fallback_texture {
                Some((texture_id, size)) => {
                    imgui::Image::new(texture_id, fit_within(size, IMAGE_MAX_SIZE)).build(ui);
                }
                None => match viewer.fallback_image() {
                    Some(fallback) => ui.text(format!("Image unavailable: {}", fallback.path)),
                    None => ui.text("No product selected"),
                },
            });
    }

    commands
}

/// Scales `size` down to fit inside `bounds`, keeping its aspect ratio.
fn fit_within(size: [f32; 2], bounds: [f32; 2]) -> [f32; 2] {
    if size[0] <= 0.0 || size[1] <= 0.0 {
        return [0.0, 0.0];
    }

    let scale = (bounds[0] / size[0]).min(bounds[1] / size[1]).min(1.0);
    [size[0] * scale, size[1] * scale]
}
