//! APCI bookkeeping of one connection.
//!
//! Owned by the session task alone. Tracks both sequence counters, the
//! I-frames the peer has not acknowledged yet (k window and t1), the
//! received I-frames we have not acknowledged yet (w threshold and t2) and
//! an outstanding TESTFR.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::warn;

use crate::codec::Apdu;
use crate::config::ServerConfig;
use crate::error::{Iec104Error, Result};
use crate::types::{seq_add, seq_distance};

/// Sequence and acknowledgement state of a connection.
#[derive(Debug)]
pub struct SessionState {
    k: u16,
    w: u16,
    t1: Duration,
    t2: Duration,
    /// V(S): sequence number of the next I-frame we send
    send_seq: u16,
    /// V(R): sequence number we expect from the peer next
    recv_seq: u16,
    /// Oldest sequence number not yet acknowledged by the peer
    ack_seq: u16,
    /// Send time of every unacknowledged I-frame, oldest first
    outstanding: VecDeque<Instant>,
    /// Received I-frames not yet acknowledged
    unacked_count: u16,
    /// Receive time of the oldest unacknowledged I-frame
    first_unacked_at: Option<Instant>,
    /// Send time of an unanswered TESTFR act
    test_pending_since: Option<Instant>,
    /// Encoded ASDUs waiting for the k window to open
    backlog: VecDeque<Bytes>,
    backlog_capacity: usize,
}

impl SessionState {
    /// Fresh state; both sequence counters start at zero.
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            k: config.k.max(1),
            w: config.w.max(1),
            t1: config.t1_timeout,
            t2: config.t2_timeout,
            send_seq: 0,
            recv_seq: 0,
            ack_seq: 0,
            outstanding: VecDeque::with_capacity(config.k as usize),
            unacked_count: 0,
            first_unacked_at: None,
            test_pending_since: None,
            backlog: VecDeque::new(),
            backlog_capacity: config.send_queue_capacity.max(1),
        }
    }

    /// Sequence number of the next I-frame we send.
    pub fn send_seq(&self) -> u16 {
        self.send_seq
    }

    /// Sequence number expected from the peer.
    pub fn recv_seq(&self) -> u16 {
        self.recv_seq
    }

    /// Received I-frames not yet acknowledged.
    pub fn unacked_count(&self) -> u16 {
        self.unacked_count
    }

    /// Sent I-frames not yet acknowledged by the peer.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// ASDUs waiting for the send window.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Whether another I-frame may be sent.
    pub fn window_open(&self) -> bool {
        self.outstanding.len() < self.k as usize
    }

    /// Queue an unsolicited ASDU for sending.
    ///
    /// Returns false, dropping the ASDU, when the backlog is full.
    pub fn enqueue(&mut self, asdu: Bytes) -> bool {
        if self.backlog.len() >= self.backlog_capacity {
            return false;
        }
        self.backlog.push_back(asdu);
        true
    }

    /// Queue the complete answer to one request.
    ///
    /// Replies are never cut short: the backlog capacity only bounds
    /// unsolicited traffic, so a reply set is queued whole even past it.
    pub fn enqueue_replies(&mut self, replies: impl IntoIterator<Item = Bytes>) {
        self.backlog.extend(replies);
    }

    /// Next queued I-frame, if the window allows one.
    pub fn next_i_frame(&mut self, now: Instant) -> Option<Apdu> {
        if !self.window_open() {
            return None;
        }
        let asdu = self.backlog.pop_front()?;
        Some(self.i_frame(asdu, now))
    }

    /// Number an I-frame and advance V(S).
    ///
    /// The frame carries V(R), so it also acknowledges everything received.
    pub fn i_frame(&mut self, asdu: Bytes, now: Instant) -> Apdu {
        let apdu = Apdu::i_frame(self.send_seq, self.recv_seq, asdu);
        self.send_seq = seq_add(self.send_seq, 1);
        self.outstanding.push_back(now);
        self.reset_receive_ack();
        apdu
    }

    /// S-frame acknowledging everything received.
    pub fn s_frame(&mut self) -> Apdu {
        self.reset_receive_ack();
        Apdu::s_frame(self.recv_seq)
    }

    fn reset_receive_ack(&mut self) {
        self.unacked_count = 0;
        self.first_unacked_at = None;
    }

    /// Account for a received I-frame.
    ///
    /// A sequence gap is logged and then accepted. Returns true once `w`
    /// frames are waiting for acknowledgement.
    pub fn on_i_frame(&mut self, peer_send_seq: u16, now: Instant) -> bool {
        if peer_send_seq != self.recv_seq {
            warn!(
                expected = self.recv_seq,
                actual = peer_send_seq,
                "Send sequence mismatch, resynchronizing"
            );
        }
        self.recv_seq = seq_add(peer_send_seq, 1);
        self.unacked_count = self.unacked_count.saturating_add(1);
        self.first_unacked_at.get_or_insert(now);
        self.unacked_count >= self.w
    }

    /// Release the I-frames acknowledged by the peer's N(R).
    pub fn acknowledge(&mut self, peer_recv_seq: u16) -> Result<()> {
        let acked = seq_distance(self.ack_seq, peer_recv_seq) as usize;
        if acked > self.outstanding.len() {
            return Err(Iec104Error::protocol(format!(
                "acknowledged sequence {} outside window {}..={}",
                peer_recv_seq, self.ack_seq, self.send_seq
            )));
        }
        self.outstanding.drain(..acked);
        self.ack_seq = peer_recv_seq;
        Ok(())
    }

    /// Record a TESTFR act we sent.
    ///
    /// Returns false if one is already waiting for its confirmation.
    pub fn test_sent(&mut self, now: Instant) -> bool {
        if self.test_pending_since.is_some() {
            return false;
        }
        self.test_pending_since = Some(now);
        true
    }

    /// Record a TESTFR con from the peer.
    pub fn test_confirmed(&mut self) {
        self.test_pending_since = None;
    }

    /// Whether an I-frame or a TESTFR has gone unanswered for t1.
    pub fn t1_expired(&self, now: Instant) -> bool {
        let expired = |since: &Instant| now.saturating_duration_since(*since) >= self.t1;
        self.outstanding.front().is_some_and(expired)
            || self.test_pending_since.as_ref().is_some_and(expired)
    }

    /// Whether received I-frames have waited t2 for acknowledgement.
    pub fn t2_due(&self, now: Instant) -> bool {
        self.first_unacked_at
            .is_some_and(|since| now.saturating_duration_since(since) >= self.t2)
    }
}
