use std::{
    sync::{Arc, Mutex, OnceLock},
    time::Duration,
};

use thiserror::Error;

use super::{
    gate::{GateError, GateSignal, GateWaiter, startup_gate},
    latest::{LatestFrame, LatestFrameSlot, SlotStats},
    lock,
    sensor::{FrameSink, PolicySink, SensorService},
};
use crate::{
    config::ViewerConfig,
    types::{CameraSide, DeviceInfo, Policies, SensorImage},
};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StartupError {
    #[error("Images policy was not set properly")]
    PolicyTimeout {
        #[source]
        cause: GateError,
    },
    #[error("No image has been fetched")]
    FirstFrameTimeout {
        #[source]
        cause: GateError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartupPhase {
    Uninitialized,
    PolicyPending,
    AwaitingFirstFrame,
    Streaming,
    Terminated,
}

/// Bridges the sensor service to the display: keeps the device description
/// and the newest frame buffer.
#[derive(Debug)]
pub struct FrameSource {
    device_info: OnceLock<DeviceInfo>,
    latest: LatestFrameSlot,
    phase: Mutex<StartupPhase>,
    policy_signal: GateSignal,
    policy_waiter: GateWaiter,
    first_frame_signal: GateSignal,
    first_frame_waiter: GateWaiter,
}

impl FrameSource {
    pub fn new() -> Arc<Self> {
        let (policy_signal, policy_waiter) = startup_gate();
        let (first_frame_signal, first_frame_waiter) = startup_gate();
        Arc::new(Self {
            device_info: OnceLock::new(),
            latest: LatestFrameSlot::new(),
            phase: Mutex::new(StartupPhase::Uninitialized),
            policy_signal,
            policy_waiter,
            first_frame_signal,
            first_frame_waiter,
        })
    }

    /// Runs the whole startup sequence; on success frames are streaming.
    pub fn start(
        self: &Arc<Self>,
        service: &dyn SensorService,
        config: &ViewerConfig,
    ) -> Result<(), StartupError> {
        self.negotiate_capture_policy(service, config.policy_timeout)?;
        self.begin_streaming(service);
        self.await_first_frame(config.first_frame_timeout)
    }

    /// Asks the service for images and waits for it to confirm the policy.
    pub fn negotiate_capture_policy(
        self: &Arc<Self>,
        service: &dyn SensorService,
        timeout: Duration,
    ) -> Result<(), StartupError> {
        self.set_phase(StartupPhase::PolicyPending);
        service.subscribe_policy(self.clone());
        service.request_policy(Policies::IMAGES);

        self.policy_waiter.wait(timeout).map_err(|cause| {
            self.set_phase(StartupPhase::Terminated);
            StartupError::PolicyTimeout { cause }
        })
    }

    pub fn begin_streaming(self: &Arc<Self>, service: &dyn SensorService) {
        self.set_phase(StartupPhase::AwaitingFirstFrame);
        service.subscribe_frames(self.clone());
    }

    pub fn await_first_frame(&self, timeout: Duration) -> Result<(), StartupError> {
        match self.first_frame_waiter.wait(timeout) {
            Ok(()) => {
                self.set_phase(StartupPhase::Streaming);
                Ok(())
            }
            Err(cause) => {
                self.set_phase(StartupPhase::Terminated);
                Err(StartupError::FirstFrameTimeout { cause })
            }
        }
    }

    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.get()
    }

    pub fn latest_frame(&self) -> Option<LatestFrame> {
        self.latest.snapshot()
    }

    pub fn frame_stats(&self) -> SlotStats {
        self.latest.stats()
    }

    pub fn phase(&self) -> StartupPhase {
        *lock(&self.phase)
    }

    pub fn mark_terminated(&self) {
        if !self.set_phase(StartupPhase::Terminated) {
            return;
        }
        let stats = self.frame_stats();
        log::info!(
            "stream closed after {} frames ({} never displayed)",
            stats.published,
            stats.superseded
        );
    }

    fn set_phase(&self, next: StartupPhase) -> bool {
        let mut phase = lock(&self.phase);
        if *phase == next {
            return false;
        }
        log::debug!("frame source {:?} -> {:?}", *phase, next);
        *phase = next;
        true
    }
}

impl PolicySink for FrameSource {
    fn on_policy_change(&self, active: Policies) {
        if active.contains(Policies::IMAGES) {
            self.policy_signal.signal();
        } else {
            log::debug!("ignoring policy change without images: {active:?}");
        }
    }
}

impl FrameSink for FrameSource {
    fn on_frame_ready(&self, image: &SensorImage) {
        let mut first = false;
        let info = self.device_info.get_or_init(|| {
            first = true;
            DeviceInfo::from_image(image)
        });

        self.latest.publish(image.data(CameraSide::Left));

        if first {
            log::info!("first image received (sequence {})\n{info}", image.sequence);
            self.first_frame_signal.signal();
        }
    }
}
