use std::sync::Arc;

use anyhow::anyhow;
use gpui::{
    AnyElement, App, AppContext, Bounds, Context, IntoElement, KeyBinding, ObjectFit,
    ParentElement, Render, RenderImage, Styled, StyledImage, TitlebarOptions, Window,
    WindowBounds, WindowOptions, actions, div, img, px, size,
};
use gpui_component::{Root, h_flex};
use image::{Frame as ImageFrame, Rgba};

use crate::{
    config::ViewerConfig,
    pipeline::{FrameSource, SensorService, source::StartupPhase},
    types::DeviceInfo,
};

mod display_state;
mod render_util;

use display_state::DisplayState;
use render_util::gray_to_image;

actions!(stereo_ir_viewer, [Quit]);

pub fn launch_ui(
    app: &mut App,
    source: Arc<FrameSource>,
    sensor: Box<dyn SensorService>,
    config: &ViewerConfig,
) -> gpui::Result<()> {
    if source.phase() != StartupPhase::Streaming {
        return Err(anyhow!("display started before frames are streaming"));
    }
    let device_info = source
        .device_info()
        .cloned()
        .ok_or_else(|| anyhow!("display started before the first frame arrived"))?;

    app.bind_keys([KeyBinding::new("escape", Quit, None)]);
    let quit_source = source.clone();
    app.on_action(move |_: &Quit, cx: &mut App| {
        quit_source.mark_terminated();
        cx.quit();
    });
    let close_source = source.clone();
    app.on_window_closed(move |cx| {
        if cx.windows().is_empty() {
            close_source.mark_terminated();
            cx.quit();
        }
    })
    .detach();

    let (width, height) = device_info.display_size();
    let bounds = Bounds::centered(None, size(px(width as f32), px(height as f32)), app);
    let window_options = WindowOptions {
        window_bounds: Some(WindowBounds::Windowed(bounds)),
        titlebar: Some(TitlebarOptions {
            title: Some(config.window_title.into()),
            appears_transparent: false,
            traffic_light_position: None,
        }),
        is_resizable: false,
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| ViewerView::new(source, sensor, device_info));
        app.new(|cx| Root::new(view, window, cx))
    })?;
    app.activate(true);

    Ok(())
}

struct ViewerView {
    source: Arc<FrameSource>,
    display: DisplayState,
    // Owned here so the sensor stops delivering once the window is gone.
    _sensor: Box<dyn SensorService>,
    left_image: Option<Arc<RenderImage>>,
    right_image: Option<Arc<RenderImage>>,
}

impl ViewerView {
    fn new(
        source: Arc<FrameSource>,
        sensor: Box<dyn SensorService>,
        device_info: DeviceInfo,
    ) -> Self {
        Self {
            source,
            display: DisplayState::new(device_info),
            _sensor: sensor,
            left_image: None,
            right_image: None,
        }
    }

    /// Uploads both halves when a new frame is ready; otherwise keeps what is shown.
    fn present(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        if !self.display.refresh(&self.source, window.scale_factor()) {
            return;
        }
        let Some(pair) = self.display.pair() else {
            return;
        };

        if let Some(image) = gray_to_image(&pair.left) {
            replace_image(&mut self.left_image, image, window, cx);
        }
        if let Some(image) = gray_to_image(&pair.right) {
            replace_image(&mut self.right_image, image, window, cx);
        }
    }
}

impl Render for ViewerView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        // Redraw on idle so new frames show up as soon as they land.
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        self.present(window, cx);

        let info = self.display.device_info();
        let width = info.width as f32;
        let height = info.height as f32;

        h_flex()
            .size_full()
            .bg(gpui::rgb(0x000000))
            .child(camera_half(self.left_image.clone(), width, height))
            .child(camera_half(self.right_image.clone(), width, height))
    }
}

fn camera_half(image: Option<Arc<RenderImage>>, width: f32, height: f32) -> AnyElement {
    match image {
        // Textures are already at physical resolution, so this samples 1:1.
        Some(image) => img(image)
            .w(px(width))
            .h(px(height))
            .object_fit(ObjectFit::Fill)
            .into_any_element(),
        None => div().w(px(width)).h(px(height)).into_any_element(),
    }
}

fn replace_image(
    slot: &mut Option<Arc<RenderImage>>,
    new_image: Arc<RenderImage>,
    window: &mut Window,
    cx: &mut Context<'_, ViewerView>,
) {
    if let Some(old_image) = slot.replace(new_image) {
        // Free the old GPU texture; the sprite atlas would otherwise keep every frame.
        cx.drop_image(old_image, Some(window));
    }
}
