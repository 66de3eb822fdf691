use std::time::Duration;

use crate::pipeline::SensorBackend;

pub const POLICY_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const FIRST_FRAME_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const WINDOW_TITLE: &str = "Video Feed";

#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub policy_timeout: Duration,
    pub first_frame_timeout: Duration,
    pub window_title: &'static str,
    pub backend: SensorBackend,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            policy_timeout: POLICY_TIMEOUT,
            first_frame_timeout: FIRST_FRAME_TIMEOUT,
            window_title: WINDOW_TITLE,
            backend: SensorBackend::default(),
        }
    }
}
