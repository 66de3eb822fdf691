use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use super::lock;

#[derive(Clone, Debug)]
pub struct LatestFrame {
    pub sequence: u64,
    pub bytes: Arc<[u8]>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlotStats {
    pub published: u64,
    /// Frames replaced before any reader looked at them.
    pub superseded: u64,
}

#[derive(Debug)]
struct Slot {
    frame: LatestFrame,
    observed: bool,
}

/// Single-slot mailbox: writers replace, readers share the newest frame.
#[derive(Debug, Default)]
pub struct LatestFrameSlot {
    slot: Mutex<Option<Slot>>,
    published: AtomicU64,
    superseded: AtomicU64,
}

impl LatestFrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` as the newest frame and returns its sequence number.
    pub fn publish(&self, bytes: Arc<[u8]>) -> u64 {
        let mut slot = lock(&self.slot);
        let sequence = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        let previous = slot.replace(Slot {
            frame: LatestFrame { sequence, bytes },
            observed: false,
        });
        if let Some(previous) = previous {
            if !previous.observed {
                self.superseded.fetch_add(1, Ordering::Relaxed);
            }
        }
        sequence
    }

    /// Newest frame, or `None` before the first publish. Does not consume it.
    pub fn snapshot(&self) -> Option<LatestFrame> {
        let mut slot = lock(&self.slot);
        slot.as_mut().map(|slot| {
            slot.observed = true;
            slot.frame.clone()
        })
    }

    pub fn stats(&self) -> SlotStats {
        let _slot = lock(&self.slot);
        SlotStats {
            published: self.published.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
        }
    }
}
