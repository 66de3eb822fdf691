#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod pipeline;
mod types;
mod ui;

use anyhow::{Context, Result};
use gpui::Application;

use config::ViewerConfig;
use pipeline::{FrameSource, connect_sensor};

fn main() -> Result<()> {
    env_logger::init();

    let config = ViewerConfig::default();
    let sensor = connect_sensor(&config.backend).context("failed to reach the sensor service")?;

    let source = FrameSource::new();
    source.start(sensor.as_ref(), &config)?;

    Application::new().run(move |app| {
        gpui_component::init(app);

        if let Err(err) = ui::launch_ui(app, source, sensor, &config) {
            eprintln!("failed to launch ui: {err:?}");
            std::process::exit(1);
        }
    });

    Ok(())
}
