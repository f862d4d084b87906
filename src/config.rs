//! Controlled station configuration.

use std::time::Duration;

use crate::error::{Iec104Error, Result};
use crate::types::SEQ_MODULO;

/// Default IEC 104 port.
pub const DEFAULT_PORT: u16 = 2404;

/// Default T1 timeout (send or test confirmation) in seconds.
pub const DEFAULT_T1_TIMEOUT: u64 = 15;

/// Default T2 timeout (acknowledge received I-frames) in seconds.
pub const DEFAULT_T2_TIMEOUT: u64 = 10;

/// Default T3 timeout (test frame on idle link) in seconds.
pub const DEFAULT_T3_TIMEOUT: u64 = 20;

/// Default K parameter (max unconfirmed I-frames).
pub const DEFAULT_K: u16 = 12;

/// Default W parameter (max unconfirmed receives before sending S-frame).
pub const DEFAULT_W: u16 = 8;

/// Default common address of the station.
pub const DEFAULT_COMMON_ADDRESS: u16 = 1;

/// Common address addressing every station.
pub const BROADCAST_ADDRESS: u16 = 0xFFFF;

/// Default period of the spontaneous update cycle in seconds.
pub const DEFAULT_SPONTANEOUS_INTERVAL: u64 = 5;

/// Default probability that a point is reported in one spontaneous cycle.
pub const DEFAULT_SPONTANEOUS_PROBABILITY: f64 = 0.2;

/// Default maximum number of objects per interrogation ASDU.
pub const DEFAULT_INTERROGATION_BATCH: usize = 20;

/// Default capacity of the per-session request queue.
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 256;

/// Server configuration.
///
/// Immutable once handed to the server; every session reads the same
/// values.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Listen address (host:port)
    pub bind_address: String,
    /// Common address (CA) of this station
    pub common_address: u16,
    /// T1 timeout: time to wait for send or test confirmation
    pub t1_timeout: Duration,
    /// T2 timeout: longest delay before acknowledging received I-frames
    pub t2_timeout: Duration,
    /// T3 timeout: idle time before a test frame is sent
    pub t3_timeout: Duration,
    /// K parameter: max unconfirmed I-frames
    pub k: u16,
    /// W parameter: max unconfirmed receives before sending S-frame
    pub w: u16,
    /// Period of the spontaneous update cycle
    pub spontaneous_interval: Duration,
    /// Probability that a point is reported in a spontaneous cycle
    pub spontaneous_probability: f64,
    /// Max objects per interrogation response ASDU
    pub interrogation_batch: usize,
    /// Queued outbound requests per session
    pub send_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(format!("0.0.0.0:{}", DEFAULT_PORT))
    }
}

impl ServerConfig {
    /// Create a new configuration listening on `bind_address`.
    pub fn new(bind_address: impl Into<String>) -> Self {
        Self {
            bind_address: bind_address.into(),
            common_address: DEFAULT_COMMON_ADDRESS,
            t1_timeout: Duration::from_secs(DEFAULT_T1_TIMEOUT),
            t2_timeout: Duration::from_secs(DEFAULT_T2_TIMEOUT),
            t3_timeout: Duration::from_secs(DEFAULT_T3_TIMEOUT),
            k: DEFAULT_K,
            w: DEFAULT_W,
            spontaneous_interval: Duration::from_secs(DEFAULT_SPONTANEOUS_INTERVAL),
            spontaneous_probability: DEFAULT_SPONTANEOUS_PROBABILITY,
            interrogation_batch: DEFAULT_INTERROGATION_BATCH,
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
        }
    }

    /// Set the station common address.
    pub fn common_address(mut self, common_address: u16) -> Self {
        self.common_address = common_address;
        self
    }

    /// Set T1 timeout.
    pub fn t1_timeout(mut self, timeout: Duration) -> Self {
        self.t1_timeout = timeout;
        self
    }

    /// Set T2 timeout.
    pub fn t2_timeout(mut self, timeout: Duration) -> Self {
        self.t2_timeout = timeout;
        self
    }

    /// Set T3 timeout.
    pub fn t3_timeout(mut self, timeout: Duration) -> Self {
        self.t3_timeout = timeout;
        self
    }

    /// Set K parameter.
    pub fn k(mut self, k: u16) -> Self {
        self.k = k;
        self
    }

    /// Set W parameter.
    pub fn w(mut self, w: u16) -> Self {
        self.w = w;
        self
    }

    /// Set the spontaneous update period.
    pub fn spontaneous_interval(mut self, interval: Duration) -> Self {
        self.spontaneous_interval = interval;
        self
    }

    /// Set the per-point spontaneous report probability.
    pub fn spontaneous_probability(mut self, probability: f64) -> Self {
        self.spontaneous_probability = probability;
        self
    }

    /// Set the max objects per interrogation ASDU.
    pub fn interrogation_batch(mut self, batch: usize) -> Self {
        self.interrogation_batch = batch;
        self
    }

    /// Set the per-session request queue capacity.
    pub fn send_queue_capacity(mut self, capacity: usize) -> Self {
        self.send_queue_capacity = capacity;
        self
    }

    /// Check the parameters for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 || self.k >= SEQ_MODULO {
            return Err(Iec104Error::config(format!(
                "k must be in 1..{}, got {}",
                SEQ_MODULO, self.k
            )));
        }
        if self.w == 0 || self.w >= SEQ_MODULO {
            return Err(Iec104Error::config(format!(
                "w must be in 1..{}, got {}",
                SEQ_MODULO, self.w
            )));
        }
        for (name, timeout) in [
            ("t1", self.t1_timeout),
            ("t2", self.t2_timeout),
            ("t3", self.t3_timeout),
        ] {
            if timeout.is_zero() {
                return Err(Iec104Error::config(format!("{} must be positive", name)));
            }
        }
        if self.spontaneous_interval.is_zero() {
            return Err(Iec104Error::config("spontaneous interval must be positive"));
        }
        if !(0.0..=1.0).contains(&self.spontaneous_probability) {
            return Err(Iec104Error::config(format!(
                "spontaneous probability must be in [0, 1], got {}",
                self.spontaneous_probability
            )));
        }
        if !(1..=127).contains(&self.interrogation_batch) {
            return Err(Iec104Error::config(format!(
                "interrogation batch must be in 1..=127, got {}",
                self.interrogation_batch
            )));
        }
        if self.send_queue_capacity == 0 {
            return Err(Iec104Error::config("send queue capacity must be positive"));
        }
        if self.common_address == 0 || self.common_address == BROADCAST_ADDRESS {
            return Err(Iec104Error::config(format!(
                "common address {} is reserved",
                self.common_address
            )));
        }
        Ok(())
    }
}
