use std::{sync::Arc, time::Instant};

use anyhow::Context;
use glam::Vec2;
use imgui::{FontConfig, FontSource};
use imgui_winit_support::WinitPlatform;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    assets::FileAssetSource,
    config::{RenderConfig, ViewerConfig},
    controls::DragMode,
    rendering::renderer::Renderer,
    ui,
    viewer::Viewer,
};

const PIXELS_PER_SCROLL_LINE: f32 = 100.0;

struct ImguiState {
    context: imgui::Context,
    platform: WinitPlatform,
}

struct App {
    title: String,
    renderer: Option<Renderer>,
    viewer: Viewer,
    imgui: Option<ImguiState>,
    last_frame: Instant,
}

impl App {
    fn new(title: String, viewer: Viewer) -> Self {
        Self {
            title,
            renderer: None,
            viewer,
            imgui: None,
            last_frame: Instant::now(),
        }
    }

    fn setup_imgui(window: &Window) -> ImguiState {
        let mut context = imgui::Context::create();
        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(
            context.io_mut(),
            window,
            imgui_winit_support::HiDpiMode::Default,
        );

        let font_size = 14.0;
        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: font_size,
                ..Default::default()
            }),
        }]);

        // Disable INI support because it's broken in the published version of imgui
        context.set_ini_filename(None);

        ImguiState { context, platform }
    }

    fn create_renderer(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title(self.title.clone())
            .with_transparent(true);
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .context("Failed to create window")?,
        );

        let mut imgui = Self::setup_imgui(&window);
        let renderer = pollster::block_on(Renderer::new(
            window.clone(),
            &self.viewer,
            &mut imgui.context,
            RenderConfig::default(),
        ))?;

        let size = window.inner_size();
        self.viewer.resize(size.width, size.height);

        self.imgui = Some(imgui);
        self.renderer = Some(renderer);

        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(renderer), Some(imgui)) = (self.renderer.as_mut(), self.imgui.as_mut()) else {
            return;
        };

        let now = Instant::now();
        imgui
            .context
            .io_mut()
            .update_delta_time(now - self.last_frame);
        self.last_frame = now;

        if let Err(e) = imgui
            .platform
            .prepare_frame(imgui.context.io_mut(), &renderer.window)
        {
            log::error!("Failed to prepare Imgui frame: {e}");
            return;
        }

        renderer.sync_fallback_image(&self.viewer);

        let ui = imgui.context.new_frame();
        let commands = ui::draw(ui, &self.viewer, renderer.fallback_texture());
        imgui.platform.prepare_render(ui, &renderer.window);

        for command in commands {
            self.viewer.dispatch(command);
        }

        self.viewer.update();

        match renderer.render(&self.viewer, &mut imgui.context) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                renderer.resize(renderer.size);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Out of memory");
                event_loop.exit();
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timeout");
            }
            Err(other) => {
                log::error!("Unexpected error: {:?}", other);
            }
        }

        renderer.window.request_redraw();
    }

    fn handle_pointer(&mut self, event: &WindowEvent, ui_wants_mouse: bool) {
        let viewer = &mut self.viewer;

        match *event {
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed if !ui_wants_mouse => match button {
                    MouseButton::Left => viewer.controls.begin_drag(DragMode::Rotate),
                    MouseButton::Right => viewer.controls.begin_drag(DragMode::Pan),
                    _ => {}
                },
                ElementState::Pressed => {}
                ElementState::Released => viewer.controls.end_drag(),
            },
            WindowEvent::CursorMoved { position, .. } => {
                let viewport_height = self
                    .renderer
                    .as_ref()
                    .map_or(1.0, |renderer| renderer.size.height as f32);
                viewer.controls.cursor_moved(
                    Vec2::new(position.x as f32, position.y as f32),
                    viewport_height,
                    &viewer.camera,
                );
            }
            WindowEvent::MouseWheel { delta, .. } if !ui_wants_mouse => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => {
                        position.y as f32 / PIXELS_PER_SCROLL_LINE
                    }
                };
                viewer.controls.scrolled(lines);
            }
            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }

        if let Err(e) = self.create_renderer(event_loop) {
            log::error!("Failed to start viewer: {e:#}");
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let ui_wants_mouse = self
            .imgui
            .as_ref()
            .is_some_and(|imgui| imgui.context.io().want_capture_mouse);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(new_size);
                }
                self.viewer.resize(new_size.width, new_size.height);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => self.handle_pointer(&event, ui_wants_mouse),
        }

        if let (Some(renderer), Some(imgui)) = (self.renderer.as_ref(), self.imgui.as_mut()) {
            imgui.platform.handle_event::<()>(
                imgui.context.io_mut(),
                &renderer.window,
                &Event::WindowEvent { window_id, event },
            );
        }
    }
}

pub async fn run(config: ViewerConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;

    let source = Arc::new(FileAssetSource::new(config.catalog_path.clone()));
    let viewer = Viewer::new(&config, source).context("Failed to create viewer")?;

    let mut app = App::new(config.window_title.clone(), viewer);
    event_loop.run_app(&mut app)?;

    Ok(())
}
