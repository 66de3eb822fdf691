use std::{fmt, sync::Arc, time::Instant};

use bitflags::bitflags;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraSide {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Infrared,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageType {
    Default,
}

bitflags! {
    /// Sensor service policies, matching the runtime's policy bit layout.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Policies: u64 {
        const BACKGROUND_FRAMES = 1 << 0;
        const IMAGES = 1 << 1;
        const OPTIMIZE_HMD = 1 << 2;
        const ALLOW_PAUSE_RESUME = 1 << 3;
        const MAP_POINTS = 1 << 7;
    }
}

/// Static description of the stereo camera, taken from the first frame.
///
/// `num_bytes` is the size of ONE camera image; the raw frame buffer holds
/// both images at `byte_offset_left` and `byte_offset_right`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_id: u32,
    pub format: PixelFormat,
    pub image_type: ImageType,
    pub bytes_per_pixel: u32,
    pub num_bytes: u32,
    pub distortion_width: u32,
    pub distortion_height: u32,
    pub width: u32,
    pub height: u32,
    pub byte_offset_left: u32,
    pub byte_offset_right: u32,
}

impl DeviceInfo {
    pub fn from_image(image: &SensorImage) -> Self {
        image.metadata().clone()
    }

    pub fn byte_offset(&self, side: CameraSide) -> u32 {
        match side {
            CameraSide::Left => self.byte_offset_left,
            CameraSide::Right => self.byte_offset_right,
        }
    }

    /// Surface size needed to show both cameras next to each other.
    pub fn display_size(&self) -> (u32, u32) {
        (self.width * 2, self.height)
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DeviceID: {}", self.device_id)?;
        writeln!(f, "Format: {:?}", self.format)?;
        writeln!(f, "Type: {:?}", self.image_type)?;
        writeln!(f, "BytesPerPixel: {}", self.bytes_per_pixel)?;
        writeln!(f, "NumBytes: {}", self.num_bytes)?;
        writeln!(f, "DistortionHeight: {}", self.distortion_height)?;
        writeln!(f, "DistortionWidth: {}", self.distortion_width)?;
        writeln!(f, "Height: {}", self.height)?;
        writeln!(f, "Width: {}", self.width)?;
        writeln!(f, "ByteOffsetLeft: {}", self.byte_offset_left)?;
        write!(f, "ByteOffsetRight: {}", self.byte_offset_right)
    }
}

/// One frame as handed over by the sensor service.
#[derive(Clone, Debug)]
pub struct SensorImage {
    metadata: DeviceInfo,
    pub sequence: u64,
    #[allow(dead_code)]
    pub timestamp: Instant,
    data: Arc<[u8]>,
}

impl SensorImage {
    pub fn new(metadata: DeviceInfo, sequence: u64, data: Arc<[u8]>) -> Self {
        Self {
            metadata,
            sequence,
            timestamp: Instant::now(),
            data,
        }
    }

    pub fn metadata(&self) -> &DeviceInfo {
        &self.metadata
    }

    /// Raw bytes for the requested camera.
    ///
    /// The runtime hands back the whole stereo buffer whichever side is asked
    /// for, so callers locate each camera with [`SensorImage::byte_offset`].
    pub fn data(&self, _side: CameraSide) -> Arc<[u8]> {
        self.data.clone()
    }

    #[cfg(test)]
    pub fn byte_offset(&self, side: CameraSide) -> u32 {
        self.metadata.byte_offset(side)
    }
}

#[cfg(test)]
pub(crate) fn test_device_info(width: u32, height: u32) -> DeviceInfo {
    let num_bytes = width * height;
    DeviceInfo {
        device_id: 7,
        format: PixelFormat::Infrared,
        image_type: ImageType::Default,
        bytes_per_pixel: 1,
        num_bytes,
        distortion_width: 64,
        distortion_height: 64,
        width,
        height,
        byte_offset_left: 0,
        byte_offset_right: num_bytes,
    }
}
