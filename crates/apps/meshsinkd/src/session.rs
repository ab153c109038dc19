//! MQTT capture session: connect, subscribe, dispatch, reconnect.
//!
//! The session owns one broker connection and moves through
//! Disconnected → Connecting → Subscribed, with a bounded backoff loop
//! on unexpected disconnects. Retry state lives on the session
//! instance, never in globals, so sessions stay independent and the
//! loop is testable with injected connect/sleep functions.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, ClientError, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};

use meshsink_store::Store;

use crate::config::MqttConfig;
use crate::ingest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Subscribed,
    Reconnecting,
    GivenUp,
}

/// How a session run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Operator- or peer-initiated shutdown; no retries attempted.
    CleanShutdown,
    /// Retry budget exhausted; the surrounding process decides what
    /// happens next.
    GivenUp,
}

/// Diagnostic classification of a connection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectClass {
    Refused,
    NameResolution,
    Other,
}

impl fmt::Display for DisconnectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refused => write!(f, "connection refused"),
            Self::NameResolution => write!(f, "name resolution failure"),
            Self::Other => write!(f, "transport error"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("subscribe request failed: {0}")]
    Subscribe(#[from] ClientError),
}

pub fn classify(err: &ConnectError) -> DisconnectClass {
    match err {
        ConnectError::Connection(ConnectionError::Io(io_err)) => classify_io(io_err),
        ConnectError::Connection(ConnectionError::ConnectionRefused(_)) => {
            DisconnectClass::Refused
        }
        _ => DisconnectClass::Other,
    }
}

fn classify_io(err: &std::io::Error) -> DisconnectClass {
    match err.kind() {
        std::io::ErrorKind::ConnectionRefused => DisconnectClass::Refused,
        _ if err.to_string().contains("lookup") => DisconnectClass::NameResolution,
        _ => DisconnectClass::Other,
    }
}

/// Bounded doubling backoff: 1s, 2s, 4s, … capped at 60s, ten attempts.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { attempts: 10, base: Duration::from_secs(1), cap: Duration::from_secs(60) }
    }
}

impl ReconnectPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        // 2^6 already clears a 60s cap from a 1s base; avoid overflow
        // for large attempt numbers.
        let doubled = self.base * 2u32.saturating_pow(attempt.min(16));
        doubled.min(self.cap)
    }

    pub fn delays(&self) -> Vec<Duration> {
        (0..self.attempts).map(|attempt| self.delay(attempt)).collect()
    }
}

/// Run a bounded retry loop: attempt, and on failure report, sleep the
/// policy delay, and try again. Returns `None` when the budget is
/// exhausted. Connect and sleep are injected so tests run without a
/// broker or a clock.
pub(crate) async fn retry_with_backoff<T, E, C, CF, S, SF, R>(
    policy: &ReconnectPolicy,
    mut connect: C,
    mut sleep: S,
    mut on_failure: R,
) -> Option<T>
where
    C: FnMut(u32) -> CF,
    CF: Future<Output = Result<T, E>>,
    S: FnMut(Duration) -> SF,
    SF: Future<Output = ()>,
    R: FnMut(u32, &E),
{
    for attempt in 0..policy.attempts {
        match connect(attempt).await {
            Ok(value) => return Some(value),
            Err(err) => {
                on_failure(attempt, &err);
                sleep(policy.delay(attempt)).await;
            }
        }
    }
    None
}

enum PumpExit {
    Clean,
    Failed(ConnectError),
}

impl PumpExit {
    /// A clean exit ends the session; only failures feed the retry
    /// loop.
    fn outcome(self) -> Result<SessionOutcome, ConnectError> {
        match self {
            Self::Clean => Ok(SessionOutcome::CleanShutdown),
            Self::Failed(err) => Err(err),
        }
    }
}

/// What the pump does with one polled event. Separated from the poll
/// loop so the branching is testable without a broker connection.
enum EventAction {
    Deliver(rumqttc::Publish),
    Ignore,
    Exit(PumpExit),
}

fn dispatch(polled: Result<Event, ConnectionError>) -> EventAction {
    match polled {
        Ok(Event::Incoming(Packet::Publish(publish))) => EventAction::Deliver(publish),
        Ok(Event::Incoming(Packet::Disconnect)) => EventAction::Exit(PumpExit::Clean),
        Ok(_) => EventAction::Ignore,
        Err(err) => EventAction::Exit(PumpExit::Failed(err.into())),
    }
}

struct Link {
    // Dropping the client closes the request channel and with it the
    // connection; it must live as long as the event loop.
    _client: AsyncClient,
    eventloop: EventLoop,
}

pub struct CaptureSession {
    mqtt: MqttConfig,
    channel_key: String,
    store: Arc<Store>,
    policy: ReconnectPolicy,
    state: SessionState,
}

impl CaptureSession {
    pub fn new(mqtt: MqttConfig, channel_key: String, store: Arc<Store>) -> Self {
        Self {
            mqtt,
            channel_key,
            store,
            policy: ReconnectPolicy::default(),
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session until a clean shutdown or an exhausted retry
    /// budget.
    pub async fn run(mut self) -> SessionOutcome {
        self.state = SessionState::Connecting;
        let mut link = match self.establish().await {
            Ok(link) => link,
            Err(err) => {
                warn!("initial connect failed: {err} ({})", classify(&err));
                match self.reconnect().await {
                    Some(link) => link,
                    None => return self.give_up(),
                }
            }
        };

        loop {
            match self.pump(&mut link).await.outcome() {
                Ok(outcome) => {
                    info!("clean disconnect from {}:{}", self.mqtt.host, self.mqtt.port);
                    self.state = SessionState::Disconnected;
                    return outcome;
                }
                Err(err) => {
                    warn!("connection lost: {err} ({})", classify(&err));
                    drop(link);
                    match self.reconnect().await {
                        Some(next) => link = next,
                        None => return self.give_up(),
                    }
                }
            }
        }
    }

    fn give_up(&mut self) -> SessionOutcome {
        self.state = SessionState::GivenUp;
        error!(
            "giving up on {}:{} after {} reconnect attempts",
            self.mqtt.host, self.mqtt.port, self.policy.attempts
        );
        SessionOutcome::GivenUp
    }

    async fn reconnect(&mut self) -> Option<Link> {
        self.state = SessionState::Reconnecting;
        let this = &*self;
        let link = retry_with_backoff(
            &this.policy,
            |_| this.establish(),
            tokio::time::sleep,
            |attempt, err: &ConnectError| {
                warn!(
                    "reconnect attempt {}/{} failed: {err} ({})",
                    attempt + 1,
                    this.policy.attempts,
                    classify(err)
                );
            },
        )
        .await;

        if link.is_some() {
            self.state = SessionState::Subscribed;
        }
        link
    }

    /// Open a fresh connection and queue the topic subscriptions.
    async fn establish(&self) -> Result<Link, ConnectError> {
        let mut options =
            MqttOptions::new(self.mqtt.client_id.clone(), self.mqtt.host.clone(), self.mqtt.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(user), Some(pass)) = (&self.mqtt.username, &self.mqtt.password) {
            options.set_credentials(user.clone(), pass.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(options, 64);
        loop {
            match eventloop.poll().await? {
                Event::Incoming(Packet::ConnAck(_)) => break,
                _ => continue,
            }
        }
        for topic in &self.mqtt.topics {
            client.subscribe(topic.clone(), QoS::AtMostOnce).await?;
        }
        info!("subscribed to {} topic(s) on {}:{}", self.mqtt.topics.len(), self.mqtt.host, self.mqtt.port);
        Ok(Link { _client: client, eventloop })
    }

    /// Dispatch inbound events until the connection ends. Per-message
    /// failures never break the loop; only transport errors and clean
    /// disconnects exit.
    async fn pump(&mut self, link: &mut Link) -> PumpExit {
        self.state = SessionState::Subscribed;
        loop {
            match dispatch(link.eventloop.poll().await) {
                EventAction::Deliver(publish) => {
                    let now = unix_now();
                    match ingest::handle_publish(
                        &self.store,
                        &self.channel_key,
                        &publish.topic,
                        &publish.payload,
                        now,
                    ) {
                        Ok(outcome) => debug!("{}: {outcome:?}", publish.topic),
                        Err(err) => error!("storage failure on {}: {err}", publish.topic),
                    }
                }
                EventAction::Ignore => continue,
                EventAction::Exit(exit) => return exit,
            }
        }
    }
}

pub fn unix_now() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() as i64,
        Err(_) => 0,
    }
}
