use std::{
    net::TcpStream,
    sync::{Arc, Mutex, PoisonError},
    thread::{self, sleep, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::Context;
use conn::{FramedConn, Framing};
use messages::{Envelope, Reading};

pub mod cluon;
pub mod conn;
pub mod messages;
pub mod rec;

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Latest values received from the vehicle. Cloning shares the same slots.
#[derive(Debug, Clone, Default)]
pub struct TelemetryState {
    ground_steering: Arc<Mutex<Option<f32>>>,
    distance: Arc<Mutex<Option<f32>>>,
}

impl TelemetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ground_steering(&self) -> Option<f32> {
        *self.ground_steering.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn distance(&self) -> Option<f32> {
        *self.distance.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn apply(&self, reading: Reading) {
        let (slot, value) = match reading {
            Reading::GroundSteering(value) => (&self.ground_steering, value),
            Reading::Distance(value) => (&self.distance, value),
        };
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }
}

/// Connects to `addr` and keeps `state` updated with every reading that
/// arrives. Connection and receive errors are logged and retried.
pub fn spawn_subscriber(
    name: &'static str,
    addr: String,
    framing: Framing,
    state: TelemetryState,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        let mut conn = match FramedConn::connect(&addr, framing) {
            Ok(conn) => conn,
            Err(e) => {
                log::warn!("{name}: could not connect to {addr}: {e}");
                sleep(RETRY_DELAY);
                continue;
            }
        };
        log::info!("{name}: connected to {addr}");

        run_subscriber(name, &mut conn, &state);
        sleep(RETRY_DELAY);
    })
}

fn run_subscriber(name: &str, conn: &mut FramedConn<TcpStream>, state: &TelemetryState) {
    loop {
        let envelope = match conn.receive_envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                log::error!("{name}: error receiving envelope {e:?}");
                return;
            }
        };
        match envelope.reading() {
            Ok(Some(reading)) => state.apply(reading),
            Ok(None) => {}
            Err(e) => log::warn!("{name}: dropping envelope: {e}"),
        }
    }
}

/// Sends computed steering angles as ground steering requests. Connects on
/// the first publish and reconnects after a failure, waiting at least the
/// retry delay between attempts.
pub struct SteeringPublisher {
    addr: String,
    framing: Framing,
    sender_stamp: u32,
    retry_delay: Duration,
    conn: Option<FramedConn<TcpStream>>,
    last_attempt: Option<Instant>,
}

impl SteeringPublisher {
    pub fn new(addr: impl Into<String>, framing: Framing, sender_stamp: u32) -> Self {
        Self {
            addr: addr.into(),
            framing,
            sender_stamp,
            retry_delay: RETRY_DELAY,
            conn: None,
            last_attempt: None,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Returns `false` when the angle was dropped because the last connection
    /// attempt is more recent than the retry delay.
    pub fn publish(&mut self, angle: f64) -> anyhow::Result<bool> {
        if self.conn.is_none() {
            if self.last_attempt.is_some_and(|t| t.elapsed() < self.retry_delay) {
                return Ok(false);
            }
            self.last_attempt = Some(Instant::now());
            let conn = FramedConn::connect(&self.addr, self.framing)
                .with_context(|| format!("connecting to {}", self.addr))?;
            log::info!("Publishing steering to {}", self.addr);
            self.conn = Some(conn);
        }
        let Some(conn) = self.conn.as_mut() else {
            return Ok(false);
        };

        let envelope = Envelope::ground_steering(angle as f32, self.sender_stamp);
        if let Err(e) = conn.send_envelope(&envelope) {
            self.conn = None;
            self.last_attempt = Some(Instant::now());
            return Err(e.context(format!("publishing to {}, will reconnect", self.addr)));
        }

        Ok(true)
    }
}
