//! Station clock shared by all sessions.
//!
//! Time tags are produced from local time plus an offset. Clock
//! synchronization from a master sets the offset, so later time tags follow
//! the master's clock without touching the host clock.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{Local, NaiveDateTime, TimeDelta};

use crate::types::Cp56Time2a;

/// Station time base.
#[derive(Debug, Default)]
pub struct StationClock {
    offset_ms: AtomicI64,
}

impl StationClock {
    /// Create a clock that follows local time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offset from local time.
    pub fn offset(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.offset_ms.load(Ordering::Relaxed))
    }

    /// Current station time.
    pub fn now(&self) -> NaiveDateTime {
        let local = Local::now().naive_local();
        local.checked_add_signed(self.offset()).unwrap_or(local)
    }

    /// Current station time as a time tag.
    pub fn now_cp56(&self) -> Cp56Time2a {
        Cp56Time2a::from_datetime(self.now())
    }

    /// Align the station time with `master_time` and return the new offset.
    pub fn synchronize(&self, master_time: NaiveDateTime) -> TimeDelta {
        let offset = master_time - Local::now().naive_local();
        self.offset_ms
            .store(offset.num_milliseconds(), Ordering::Relaxed);
        offset
    }
}
