use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use rayon::prelude::*;

use super::{
    lock,
    sensor::{FrameSink, PolicySink, SensorService},
};
use crate::types::{DeviceInfo, ImageType, PixelFormat, Policies, SensorImage};

// Roughly the 60 fps the runtime delivers images at.
const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const POLICY_LATENCY: Duration = Duration::from_millis(50);
const IDLE_POLL: Duration = Duration::from_millis(50);

const DISPARITY: i64 = 24;
const BAND_HALF_WIDTH: i64 = 10;
const BLOB_RADIUS: i64 = 36;

#[derive(Clone, Debug)]
pub struct SimulatedDevice {
    pub device_id: u32,
    pub width: u32,
    pub height: u32,
    pub distortion_size: u32,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self {
            device_id: 1,
            width: 640,
            height: 240,
            distortion_size: 64,
        }
    }
}

impl SimulatedDevice {
    pub fn info(&self) -> DeviceInfo {
        let num_bytes = self.width * self.height;
        DeviceInfo {
            device_id: self.device_id,
            format: PixelFormat::Infrared,
            image_type: ImageType::Default,
            bytes_per_pixel: 1,
            num_bytes,
            distortion_width: self.distortion_size,
            distortion_height: self.distortion_size,
            width: self.width,
            height: self.height,
            byte_offset_left: 0,
            byte_offset_right: num_bytes,
        }
    }

    /// Full stereo buffer: left image followed by the right one.
    pub fn render(&self, sequence: u64) -> Arc<[u8]> {
        let image_len = (self.width * self.height) as usize;
        let mut buffer = vec![0u8; image_len * 2];
        let (left, right) = buffer.split_at_mut(image_len);
        self.paint(left, sequence, 0);
        self.paint(right, sequence, -DISPARITY);
        buffer.into()
    }

    fn paint(&self, image: &mut [u8], sequence: u64, shift: i64) {
        let width = self.width.max(1) as usize;
        let height = self.height.max(1) as usize;
        let span = width as i64;
        let t = sequence as i64;

        let band_x = (t * 5 + shift).rem_euclid(span);
        let blob_x = span / 4 + (t * 2).rem_euclid((span / 2).max(1)) + shift;
        let blob_y = height as i64 / 2;
        let radius_sq = BLOB_RADIUS * BLOB_RADIUS;

        image
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                let base = 16 + (y * 48 / height) as u8;
                for (x, px) in row.iter_mut().enumerate() {
                    let x = x as i64;
                    let mut value = base;
                    if (x - band_x).abs() < BAND_HALF_WIDTH {
                        value = value.max(140);
                    }
                    let (dx, dy) = (x - blob_x, y as i64 - blob_y);
                    let dist_sq = dx * dx + dy * dy;
                    if dist_sq < radius_sq {
                        value = value.max((255 - dist_sq * 155 / radius_sq) as u8);
                    }
                    *px = value;
                }
            });
    }
}

enum Control {
    RequestPolicy(Policies),
}

#[derive(Default)]
struct Subscribers {
    policy: Mutex<Vec<Arc<dyn PolicySink>>>,
    frames: Mutex<Vec<Arc<dyn FrameSink>>>,
}

/// In-process stand-in for the sensor runtime.
///
/// Policy requests are confirmed asynchronously and frames are pushed from a
/// dedicated delivery thread, the same way the real service behaves.
pub struct SimulatedSensor {
    subscribers: Arc<Subscribers>,
    control_tx: Sender<Control>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SimulatedSensor {
    pub fn start(device: SimulatedDevice) -> Result<Self> {
        let subscribers = Arc::new(Subscribers::default());
        let (control_tx, control_rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));

        let worker = DeliveryWorker {
            device,
            subscribers: subscribers.clone(),
            control_rx,
            stop: stop.clone(),
        };
        let handle = thread::Builder::new()
            .name("simulated-sensor".into())
            .spawn(move || worker.run())?;

        Ok(Self {
            subscribers,
            control_tx,
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for SimulatedSensor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl SensorService for SimulatedSensor {
    fn subscribe_policy(&self, sink: Arc<dyn PolicySink>) {
        lock(&self.subscribers.policy).push(sink);
    }

    fn request_policy(&self, policies: Policies) {
        if self
            .control_tx
            .send(Control::RequestPolicy(policies))
            .is_err()
        {
            log::warn!("simulated sensor stopped, dropping policy request {policies:?}");
        }
    }

    fn subscribe_frames(&self, sink: Arc<dyn FrameSink>) {
        lock(&self.subscribers.frames).push(sink);
    }
}

struct DeliveryWorker {
    device: SimulatedDevice,
    subscribers: Arc<Subscribers>,
    control_rx: Receiver<Control>,
    stop: Arc<AtomicBool>,
}

impl DeliveryWorker {
    fn run(self) {
        let mut active = Policies::empty();
        let mut pending: Option<(Policies, Instant)> = None;
        let mut next_frame = Instant::now();
        let mut sequence = 0u64;

        while !self.stop.load(Ordering::Relaxed) {
            let now = Instant::now();
            let mut deadline = now + IDLE_POLL;
            if let Some((_, due)) = pending {
                deadline = deadline.min(due);
            }
            if active.contains(Policies::IMAGES) {
                deadline = deadline.min(next_frame);
            }

            match self
                .control_rx
                .recv_timeout(deadline.saturating_duration_since(now))
            {
                Ok(Control::RequestPolicy(requested)) => {
                    log::debug!("simulated sensor received policy request {requested:?}");
                    pending = Some((requested, Instant::now() + POLICY_LATENCY));
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if let Some((requested, due)) = pending {
                if Instant::now() >= due {
                    pending = None;
                    active |= requested;
                    next_frame = Instant::now();
                    self.notify_policy(active);
                }
            }

            if active.contains(Policies::IMAGES) && Instant::now() >= next_frame {
                sequence += 1;
                self.deliver(sequence);
                next_frame += FRAME_INTERVAL;
                let now = Instant::now();
                if next_frame < now {
                    // Fell behind; skip the missed slots instead of bursting.
                    next_frame = now + FRAME_INTERVAL;
                }
            }
        }
    }

    fn notify_policy(&self, active: Policies) {
        let sinks = lock(&self.subscribers.policy).clone();
        for sink in sinks {
            sink.on_policy_change(active);
        }
    }

    fn deliver(&self, sequence: u64) {
        let sinks = lock(&self.subscribers.frames).clone();
        if sinks.is_empty() {
            return;
        }

        let image = SensorImage::new(self.device.info(), sequence, self.device.render(sequence));
        for sink in sinks {
            sink.on_frame_ready(&image);
        }
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::bounded;

    use super::*;

    struct ForwardPolicies(Sender<Policies>);

    impl PolicySink for ForwardPolicies {
        fn on_policy_change(&self, active: Policies) {
            let _ = self.0.try_send(active);
        }
    }

    struct ForwardFrames(Sender<u64>);

    impl FrameSink for ForwardFrames {
        fn on_frame_ready(&self, image: &SensorImage) {
            let _ = self.0.try_send(image.sequence);
        }
    }

    #[test]
    fn rendered_buffer_holds_two_distinct_images() {
        let device = SimulatedDevice::default();
        let info = device.info();
        let buffer = device.render(10);

        assert_eq!(buffer.len(), (info.num_bytes * 2) as usize);
        let (left, right) = buffer.split_at(info.byte_offset_right as usize);
        assert_eq!(left.len(), right.len());
        assert_ne!(left, right);
    }

    #[test]
    fn consecutive_frames_differ() {
        let device = SimulatedDevice::default();
        assert_ne!(device.render(1), device.render(2));
    }

    #[test]
    fn policy_request_is_confirmed_asynchronously() {
        let sensor = SimulatedSensor::start(SimulatedDevice::default()).unwrap();
        let (tx, rx) = bounded(4);
        sensor.subscribe_policy(Arc::new(ForwardPolicies(tx)));

        sensor.request_policy(Policies::IMAGES);
        let active = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(active.contains(Policies::IMAGES));
    }

    #[test]
    fn frames_flow_only_once_images_are_enabled() {
        let sensor = SimulatedSensor::start(SimulatedDevice::default()).unwrap();
        let (tx, rx) = bounded(64);
        sensor.subscribe_frames(Arc::new(ForwardFrames(tx)));

        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());

        sensor.request_policy(Policies::IMAGES);
        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(second > first);
    }

    #[test]
    fn background_policy_alone_does_not_stream() {
        let sensor = SimulatedSensor::start(SimulatedDevice::default()).unwrap();
        let (policy_tx, policy_rx) = bounded(4);
        let (frame_tx, frame_rx) = bounded(4);
        sensor.subscribe_policy(Arc::new(ForwardPolicies(policy_tx)));
        sensor.subscribe_frames(Arc::new(ForwardFrames(frame_tx)));

        sensor.request_policy(Policies::BACKGROUND_FRAMES);
        let active = policy_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(!active.contains(Policies::IMAGES));
        assert!(frame_rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
