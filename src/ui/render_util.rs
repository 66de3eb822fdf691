use image::{
    GrayImage, ImageBuffer,
    imageops::{self, FilterType},
};
use rayon::prelude::*;
use thiserror::Error;

use super::{Arc, ImageFrame, RenderImage, Rgba};
use crate::types::{CameraSide, DeviceInfo};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PresentError {
    #[error("only 1 byte per pixel images can be shown, device reports {0}")]
    UnsupportedBytesPerPixel(u32),
    #[error("{width}x{height} image needs {expected} bytes but device reports {actual}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("{side:?} image {start}..{end} lies outside the {len} byte frame")]
    OutOfBounds {
        side: CameraSide,
        start: usize,
        end: usize,
        len: usize,
    },
}

#[derive(Debug)]
pub struct StereoPair {
    pub left: GrayImage,
    pub right: GrayImage,
}

/// Cuts both camera images out of a raw stereo frame.
pub fn split_stereo(frame: &[u8], info: &DeviceInfo) -> Result<StereoPair, PresentError> {
    if info.bytes_per_pixel != 1 {
        return Err(PresentError::UnsupportedBytesPerPixel(info.bytes_per_pixel));
    }

    let expected = info.width as usize * info.height as usize;
    let actual = info.num_bytes as usize;
    if expected != actual {
        return Err(PresentError::SizeMismatch {
            width: info.width,
            height: info.height,
            expected,
            actual,
        });
    }

    Ok(StereoPair {
        left: camera_image(frame, info, CameraSide::Left)?,
        right: camera_image(frame, info, CameraSide::Right)?,
    })
}

fn camera_image(
    frame: &[u8],
    info: &DeviceInfo,
    side: CameraSide,
) -> Result<GrayImage, PresentError> {
    let start = info.byte_offset(side) as usize;
    let end = start + info.num_bytes as usize;
    let region = frame.get(start..end).ok_or(PresentError::OutOfBounds {
        side,
        start,
        end,
        len: frame.len(),
    })?;

    // Length was checked against width * height above.
    GrayImage::from_raw(info.width, info.height, region.to_vec()).ok_or(
        PresentError::OutOfBounds {
            side,
            start,
            end,
            len: frame.len(),
        },
    )
}

/// Resizes `gray` to the physical pixel size it covers at `scale`, duplicating
/// pixels so the GPU samples the texture 1:1 and never blends neighbours.
pub fn upscale_nearest(gray: &GrayImage, scale: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let target_width = ((width as f32 * scale).round() as u32).max(1);
    let target_height = ((height as f32 * scale).round() as u32).max(1);
    if (target_width, target_height) == (width, height) {
        return gray.clone();
    }
    imageops::resize(gray, target_width, target_height, FilterType::Nearest)
}

pub(super) fn gray_to_image(gray: &GrayImage) -> Option<Arc<RenderImage>> {
    let (width, height) = gray.dimensions();
    // Equal channels, so the BGRA order GPUI wants needs no swizzle.
    let rgba = gray_to_rgba(gray.as_raw());

    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, rgba)?;
    let frame = ImageFrame::new(buffer);

    Some(Arc::new(RenderImage::new(vec![frame])))
}

fn gray_to_rgba(data: &[u8]) -> Vec<u8> {
    let mut rgba = vec![0u8; data.len() * 4];
    rgba.par_chunks_mut(4)
        .zip(data.par_iter().copied())
        .for_each(|(dst, value)| {
            dst[0] = value;
            dst[1] = value;
            dst[2] = value;
            dst[3] = 255;
        });
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_device_info;

    #[test]
    fn splits_vga_frame_into_two_rasters() {
        let info = test_device_info(640, 480);
        assert_eq!(info.num_bytes, 307_200);
        assert_eq!(info.byte_offset_right, 307_200);

        let mut frame = vec![0u8; 614_400];
        frame[..307_200].fill(11);
        frame[307_200..].fill(99);
        frame[0] = 1;
        frame[307_199] = 2;
        frame[307_200] = 3;
        frame[614_399] = 4;

        let pair = split_stereo(&frame, &info).unwrap();

        assert_eq!(pair.left.dimensions(), (640, 480));
        assert_eq!(pair.right.dimensions(), (640, 480));
        assert_eq!(pair.left.as_raw().as_slice(), &frame[..307_200]);
        assert_eq!(pair.right.as_raw().as_slice(), &frame[307_200..]);
        assert_eq!(pair.left.get_pixel(0, 0).0, [1]);
        assert_eq!(pair.left.get_pixel(639, 479).0, [2]);
        assert_eq!(pair.right.get_pixel(0, 0).0, [3]);
        assert_eq!(pair.right.get_pixel(639, 479).0, [4]);
    }

    #[test]
    fn follows_reported_offsets() {
        let mut info = test_device_info(2, 1);
        info.byte_offset_left = 4;
        info.byte_offset_right = 1;
        let frame = [0, 10, 20, 30, 40, 50];

        let pair = split_stereo(&frame, &info).unwrap();
        assert_eq!(pair.left.as_raw().as_slice(), &[40, 50]);
        assert_eq!(pair.right.as_raw().as_slice(), &[10, 20]);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let info = test_device_info(4, 4);
        let frame = vec![0u8; 20];

        assert_eq!(
            split_stereo(&frame, &info).unwrap_err(),
            PresentError::OutOfBounds {
                side: CameraSide::Right,
                start: 16,
                end: 32,
                len: 20,
            }
        );
    }

    #[test]
    fn wide_pixels_are_rejected() {
        let mut info = test_device_info(4, 4);
        info.bytes_per_pixel = 2;
        assert_eq!(
            split_stereo(&[0; 64], &info).unwrap_err(),
            PresentError::UnsupportedBytesPerPixel(2)
        );
    }

    #[test]
    fn inconsistent_size_is_rejected() {
        let mut info = test_device_info(4, 4);
        info.num_bytes = 10;
        assert!(matches!(
            split_stereo(&[0; 64], &info),
            Err(PresentError::SizeMismatch { expected: 16, actual: 10, .. })
        ));
    }

    #[test]
    fn unit_scale_keeps_the_raster() {
        let gray = GrayImage::from_raw(2, 1, vec![5, 6]).unwrap();
        assert_eq!(upscale_nearest(&gray, 1.0), gray);
    }

    #[test]
    fn hidpi_scale_duplicates_pixels() {
        let gray = GrayImage::from_raw(2, 1, vec![10, 200]).unwrap();
        let scaled = upscale_nearest(&gray, 2.0);

        assert_eq!(scaled.dimensions(), (4, 2));
        assert_eq!(
            scaled.as_raw().as_slice(),
            &[10, 10, 200, 200, 10, 10, 200, 200]
        );
    }

    #[test]
    fn fractional_scale_never_invents_values() {
        let gray = GrayImage::from_raw(4, 2, vec![0, 50, 100, 150, 200, 250, 30, 60]).unwrap();
        let scaled = upscale_nearest(&gray, 1.5);

        assert_eq!(scaled.dimensions(), (6, 3));
        assert!(scaled.as_raw().iter().all(|v| gray.as_raw().contains(v)));
    }

    #[test]
    fn gray_expands_to_opaque_pixels() {
        assert_eq!(gray_to_rgba(&[0, 128]), vec![0, 0, 0, 255, 128, 128, 128, 255]);
    }
}
