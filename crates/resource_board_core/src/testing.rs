//! In-memory port implementations shared by the core's unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::domain::{Coordinates, Receipt};
use crate::ports::{
    Clock, GeocodingService, PortError, PortResult, ReceiptRenderingService, SlotBatch, SlotMap,
    StorageService,
};

#[derive(Default)]
pub struct MemoryStorage {
    slots: Mutex<SlotMap>,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn with_slots(slots: SlotMap) -> Self {
        Self {
            slots: Mutex::new(slots),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> SlotMap {
        self.slots.lock().unwrap().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageService for MemoryStorage {
    async fn read_slots(&self) -> PortResult<SlotMap> {
        Ok(self.snapshot())
    }

    async fn commit(&self, batch: SlotBatch) -> PortResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("disk full".to_string()));
        }
        let mut slots = self.slots.lock().unwrap();
        for key in batch.removals {
            slots.remove(&key);
        }
        slots.extend(batch.writes);
        Ok(())
    }
}

/// Answers every lookup with a fixed result.
pub enum StubGeocoder {
    Found(Coordinates),
    Empty,
    Offline,
}

#[async_trait]
impl GeocodingService for StubGeocoder {
    async fn geocode(&self, _address: &str) -> PortResult<Vec<Coordinates>> {
        match self {
            StubGeocoder::Found(point) => Ok(vec![*point, Coordinates::new(0.0, 0.0)]),
            StubGeocoder::Empty => Ok(Vec::new()),
            StubGeocoder::Offline => Err(PortError::ExternalLookupFailed(
                "connection refused".to_string(),
            )),
        }
    }
}

/// Records every receipt it is asked to render.
#[derive(Default)]
pub struct RecordingReceipts {
    pub rendered: Mutex<Vec<Receipt>>,
    pub broken: bool,
}

impl RecordingReceipts {
    pub fn broken() -> Self {
        Self {
            rendered: Mutex::new(Vec::new()),
            broken: true,
        }
    }

    pub fn count(&self) -> usize {
        self.rendered.lock().unwrap().len()
    }
}

#[async_trait]
impl ReceiptRenderingService for RecordingReceipts {
    async fn render_receipt(&self, receipt: &Receipt) -> PortResult<String> {
        if self.broken {
            return Err(PortError::Unexpected("printer jammed".to_string()));
        }
        self.rendered.lock().unwrap().push(receipt.clone());
        Ok(format!("receipt for {}", receipt.needer_name))
    }
}

/// A clock that advances one minute on every reading.
pub struct SteppingClock {
    next: Mutex<DateTime<Utc>>,
}

impl Default for SteppingClock {
    fn default() -> Self {
        Self {
            next: Mutex::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock().unwrap();
        let now = *next;
        *next = now + Duration::minutes(1);
        now
    }
}
