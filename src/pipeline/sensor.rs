use std::sync::Arc;

use anyhow::{Context, Result};

use super::simulated::{SimulatedDevice, SimulatedSensor};
use crate::types::{Policies, SensorImage};

/// Receives every frame the sensor service delivers, on the service's thread.
pub trait FrameSink: Send + Sync {
    fn on_frame_ready(&self, image: &SensorImage);
}

/// Receives the full set of active policies whenever it changes.
pub trait PolicySink: Send + Sync {
    fn on_policy_change(&self, active: Policies);
}

/// The sensor runtime as seen from this program.
///
/// Notifications are delivered asynchronously from a thread owned by the
/// service; a sink must not assume any ordering relative to its caller.
pub trait SensorService: Send + Sync {
    fn subscribe_policy(&self, sink: Arc<dyn PolicySink>);
    fn request_policy(&self, policies: Policies);
    fn subscribe_frames(&self, sink: Arc<dyn FrameSink>);
}

#[derive(Clone, Debug, Default)]
pub enum SensorBackend {
    /// Synthetic stereo IR device driven by an in-process delivery thread.
    #[default]
    Simulated,
}

pub fn connect_sensor(backend: &SensorBackend) -> Result<Box<dyn SensorService>> {
    match backend {
        SensorBackend::Simulated => {
            let sensor = SimulatedSensor::start(SimulatedDevice::default())
                .context("failed to start simulated sensor")?;
            log::info!("connected to simulated stereo IR sensor");
            Ok(Box::new(sensor))
        }
    }
}
