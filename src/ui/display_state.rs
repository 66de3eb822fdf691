use super::render_util::{StereoPair, split_stereo, upscale_nearest};
use crate::{
    pipeline::{FrameSource, LatestFrame},
    types::DeviceInfo,
};

/// What the window currently shows, independent of GPUI.
#[derive(Debug)]
pub struct DisplayState {
    device_info: DeviceInfo,
    shown_sequence: Option<u64>,
    scale: f32,
    pair: Option<StereoPair>,
}

impl DisplayState {
    pub fn new(device_info: DeviceInfo) -> Self {
        Self {
            device_info,
            shown_sequence: None,
            scale: 1.0,
            pair: None,
        }
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// Both halves at the current scale; `None` until a frame was shown.
    pub fn pair(&self) -> Option<&StereoPair> {
        self.pair.as_ref()
    }

    /// Newest frame from `source` if it was not handed out before.
    pub fn take_new_frame(&mut self, source: &FrameSource) -> Option<LatestFrame> {
        let frame = source.latest_frame()?;
        if self.shown_sequence == Some(frame.sequence) {
            return None;
        }
        self.shown_sequence = Some(frame.sequence);
        Some(frame)
    }

    /// Pulls the newest frame for a window at `scale`. Returns `true` when
    /// `pair` changed and needs uploading; a bad frame keeps the old picture.
    pub fn refresh(&mut self, source: &FrameSource, scale: f32) -> bool {
        if (scale - self.scale).abs() > f32::EPSILON {
            self.scale = scale;
            // Rebuild the current frame at the new density.
            self.shown_sequence = None;
        }

        let Some(frame) = self.take_new_frame(source) else {
            return false;
        };

        match split_stereo(&frame.bytes, &self.device_info) {
            Ok(pair) => {
                self.pair = Some(StereoPair {
                    left: upscale_nearest(&pair.left, self.scale),
                    right: upscale_nearest(&pair.right, self.scale),
                });
                true
            }
            Err(err) => {
                log::warn!("skipping frame {}: {err}", frame.sequence);
                false
            }
        }
    }
}
