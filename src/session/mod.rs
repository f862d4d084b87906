//! One controlled-station connection.
//!
//! A session is a single task that owns the framed socket and the APCI
//! state. Two background tasks, a TESTFR keepalive and the spontaneous
//! reporter, feed it [`Request`]s over an mpsc channel and read the data
//! transfer flag from a watch channel. Only the session task writes to the
//! socket, so I-frames leave in `send_seq` order without gaps.

mod state;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::{Apdu, Iec104Codec};
use crate::config::ServerConfig;
use crate::error::{Iec104Error, Result};
use crate::handler::AsduHandler;
use crate::types::{Apci, Asdu, Cot, UFunction};

pub use state::SessionState;

/// Resolution of the t1/t2 checks.
const TIMER_TICK: Duration = Duration::from_millis(100);

/// Work handed to the session task by its background tasks.
#[derive(Debug)]
pub enum Request {
    /// Send an ASDU in an I-frame
    I(Asdu),
    /// Send a U-frame
    U(UFunction),
}

/// A connection to one controlling station.
pub struct Session<T> {
    framed: Framed<T, Iec104Codec>,
    peer: String,
    handler: Arc<AsduHandler>,
    config: Arc<ServerConfig>,
    state: SessionState,
    data_transfer: watch::Sender<bool>,
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an accepted connection. Data transfer starts stopped.
    ///
    /// Fails if `config` does not pass [`ServerConfig::validate`].
    pub fn new(
        io: T,
        peer: impl Into<String>,
        handler: Arc<AsduHandler>,
        config: Arc<ServerConfig>,
    ) -> Result<Self> {
        config.validate()?;
        let (data_transfer, _) = watch::channel(false);
        Ok(Self {
            framed: Framed::new(io, Iec104Codec::new()),
            peer: peer.into(),
            state: SessionState::new(&config),
            handler,
            config,
            data_transfer,
        })
    }

    /// Serve the connection until the peer leaves, an error occurs or
    /// `shutdown` is cancelled.
    ///
    /// Background tasks are stopped before this returns.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        let (request_tx, mut requests) = mpsc::channel(self.config.send_queue_capacity.max(1));
        let tasks = shutdown.child_token();
        let mut background = JoinSet::new();

        background.spawn(keepalive(
            request_tx.clone(),
            self.data_transfer.subscribe(),
            self.config.t3_timeout,
            tasks.clone(),
        ));
        background.spawn(spontaneous(
            request_tx,
            self.data_transfer.subscribe(),
            self.handler.clone(),
            self.config.spontaneous_interval,
            self.config.spontaneous_probability,
            tasks.clone(),
        ));

        let result = self.serve(&mut requests, &shutdown).await;

        tasks.cancel();
        drop(requests);
        while background.join_next().await.is_some() {}

        match &result {
            Ok(()) => info!(peer = %self.peer, "Session closed"),
            Err(e) => warn!(peer = %self.peer, "Session terminated: {}", e),
        }
        result
    }

    async fn serve(
        &mut self,
        requests: &mut mpsc::Receiver<Request>,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        let mut timers = interval(TIMER_TICK);
        timers.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(peer = %self.peer, "Shutdown requested");
                    return Ok(());
                }
                frame = self.framed.next() => match frame {
                    Some(Ok(apdu)) => self.on_apdu(apdu).await?,
                    Some(Err(e)) => return Err(e),
                    None => {
                        info!(peer = %self.peer, "Connection closed by peer");
                        return Ok(());
                    }
                },
                Some(request) = requests.recv() => self.on_request(request).await?,
                _ = timers.tick() => self.check_timers().await?,
            }
        }
    }

    fn active(&self) -> bool {
        *self.data_transfer.borrow()
    }

    async fn on_apdu(&mut self, apdu: Apdu) -> Result<()> {
        debug!(peer = %self.peer, "RX {}", apdu);

        match apdu.apci {
            Apci::IFrame { send_seq, recv_seq } => {
                self.state.acknowledge(recv_seq)?;
                let ack_due = self.state.on_i_frame(send_seq, Instant::now());
                if let Some(data) = apdu.asdu {
                    self.on_asdu(data);
                }
                self.flush().await?;
                // Replies sent by the flush already carry the acknowledgement
                if ack_due && self.state.unacked_count() > 0 {
                    let ack = self.state.s_frame();
                    self.send(ack).await?;
                }
            }
            Apci::SFrame { recv_seq } => {
                self.state.acknowledge(recv_seq)?;
                self.flush().await?;
            }
            Apci::UFrame { function } => self.on_u_frame(function).await?,
        }
        Ok(())
    }

    async fn on_u_frame(&mut self, function: UFunction) -> Result<()> {
        match function {
            UFunction::StartDtAct => {
                self.data_transfer.send_replace(true);
                self.confirm(function).await?;
                info!(peer = %self.peer, "Data transfer started");
                self.flush().await?;
            }
            UFunction::StopDtAct => {
                self.data_transfer.send_replace(false);
                self.confirm(function).await?;
                info!(peer = %self.peer, "Data transfer stopped");
            }
            UFunction::TestFrAct => self.confirm(function).await?,
            UFunction::TestFrCon => self.state.test_confirmed(),
            UFunction::StartDtCon | UFunction::StopDtCon => {
                warn!(peer = %self.peer, %function, "Unexpected U-frame ignored");
            }
        }
        Ok(())
    }

    async fn confirm(&mut self, activation: UFunction) -> Result<()> {
        match activation.confirmation() {
            Some(confirmation) => self.send(Apdu::u_frame(confirmation)).await,
            None => Ok(()),
        }
    }

    fn on_asdu(&mut self, data: Bytes) {
        if !self.active() {
            warn!(peer = %self.peer, "I-frame while data transfer is stopped, ASDU ignored");
            return;
        }

        let request = match Asdu::parse(&data) {
            Ok(asdu) => asdu,
            Err(e) => {
                warn!(peer = %self.peer, type_id = data.first().copied(), "Ignoring ASDU: {}", e);
                return;
            }
        };

        debug!(
            peer = %self.peer,
            type_id = %request.header.type_id,
            cot = %request.header.cot,
            objects = request.objects.len(),
            "Request"
        );
        let replies: Vec<Bytes> = self
            .handler
            .handle(&request)
            .iter()
            .filter_map(|reply| self.encode(reply))
            .collect();
        self.state.enqueue_replies(replies);
    }

    async fn on_request(&mut self, request: Request) -> Result<()> {
        match request {
            Request::I(asdu) => {
                if !self.active() {
                    return Ok(());
                }
                self.enqueue(&asdu);
                self.flush().await
            }
            Request::U(function) => {
                if function == UFunction::TestFrAct && !self.state.test_sent(Instant::now()) {
                    return Ok(());
                }
                self.send(Apdu::u_frame(function)).await
            }
        }
    }

    fn encode(&self, asdu: &Asdu) -> Option<Bytes> {
        match asdu.encode() {
            Ok(buf) => Some(buf.freeze()),
            Err(e) => {
                warn!(peer = %self.peer, type_id = %asdu.type_id(), "Dropping ASDU: {}", e);
                None
            }
        }
    }

    fn enqueue(&mut self, asdu: &Asdu) {
        let Some(encoded) = self.encode(asdu) else {
            return;
        };
        if !self.state.enqueue(encoded) {
            warn!(
                peer = %self.peer,
                type_id = %asdu.type_id(),
                backlog = self.state.backlog_len(),
                "Send backlog full, ASDU dropped"
            );
        }
    }

    /// Send queued I-frames as far as the k window allows.
    async fn flush(&mut self) -> Result<()> {
        if !self.active() {
            return Ok(());
        }
        while let Some(apdu) = self.state.next_i_frame(Instant::now()) {
            self.send(apdu).await?;
        }
        Ok(())
    }

    async fn check_timers(&mut self) -> Result<()> {
        let now = Instant::now();
        if self.state.t1_expired(now) {
            return Err(Iec104Error::T1Timeout);
        }
        if self.state.t2_due(now) {
            let ack = self.state.s_frame();
            self.send(ack).await?;
        }
        Ok(())
    }

    async fn send(&mut self, apdu: Apdu) -> Result<()> {
        debug!(peer = %self.peer, "TX {}", apdu);
        self.framed.send(apdu).await
    }
}

/// Send TESTFR act every `period` while data transfer is enabled.
async fn keepalive(
    requests: mpsc::Sender<Request>,
    data_transfer: watch::Receiver<bool>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let enabled = *data_transfer.borrow();
                if enabled && requests.send(Request::U(UFunction::TestFrAct)).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Report randomly chosen points with COT spontaneous every `period`.
async fn spontaneous(
    requests: mpsc::Sender<Request>,
    data_transfer: watch::Receiver<bool>,
    handler: Arc<AsduHandler>,
    period: Duration,
    probability: f64,
    cancel: CancellationToken,
) {
    let mut rng = StdRng::from_entropy();
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let enabled = *data_transfer.borrow();
                if !enabled {
                    continue;
                }
                let registry = handler.registry();
                for idx in 0..registry.len() {
                    if !(probability > 0.0 && rng.gen_bool(probability.min(1.0))) {
                        continue;
                    }
                    let Some(asdu) = registry
                        .read(idx)
                        .and_then(|reading| handler.point_asdu(&reading, Cot::Spontaneous))
                    else {
                        continue;
                    };
                    if requests.send(Request::I(asdu)).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
