//! Broker session management
//!
//! Owns the MQTT client and its event loop. The event loop runs on its own
//! task: it stamps every inbound publish with the receive time and forwards
//! it through a bounded channel, and it raises the connected signal once the
//! broker accepts the session.

pub mod tls;

use crate::{
    clock,
    defaults::{CHANNEL_CAPACITY, DEFAULT_KEEP_ALIVE},
    error::{AppError, Result},
    logging::Logger,
    models::Config,
    types::Protocol,
};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectionError, Event, MqttOptions, Packet, QoS, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Inbound publish as handed to the tracker
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    /// Monotonic receive stamp, taken on arrival in the event loop
    pub received_at: f64,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>, received_at: f64) -> Self {
        Self {
            topic: topic.into(),
            payload,
            received_at,
        }
    }
}

/// Publishing side of a broker session
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Publish and wait for the request to be accepted
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Publish without waiting; fails when the outgoing queue is full
    fn try_publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;
}

/// Client id with a random 3-digit suffix
pub fn client_id_with_suffix(base: &str) -> String {
    // The low bits of a v4 uuid are uniformly random
    let suffix = 100 + (uuid::Uuid::new_v4().as_u128() % 900) as u16;
    format!("{}{}", base, suffix)
}

/// Broker address as passed to the client for a protocol
pub fn broker_address(protocol: Protocol, host: &str, port: u16, tls: bool) -> Result<String> {
    match protocol {
        Protocol::Mqtt => Ok(host.to_string()),
        Protocol::Ws => {
            let scheme = if tls { "wss" } else { "ws" };
            let url = url::Url::parse(&format!("{}://{}:{}/", scheme, host, port))?;
            Ok(url.to_string())
        }
    }
}

/// Build client options from the configuration
pub fn mqtt_options(config: &Config, client_id: &str) -> Result<MqttOptions> {
    let protocol = config.protocol_kind()?;
    let tls = tls::tls_configuration(config.tls_mode());
    let address = broker_address(protocol, &config.host, config.port, tls.is_some())?;

    let mut options = MqttOptions::new(client_id, address, config.port);
    options.set_keep_alive(DEFAULT_KEEP_ALIVE);

    if let Some(ref username) = config.username {
        options.set_credentials(username.clone(), config.password.clone().unwrap_or_default());
    }

    let transport = match (protocol, tls) {
        (Protocol::Mqtt, None) => Transport::Tcp,
        (Protocol::Mqtt, Some(tls)) => Transport::tls_with_config(tls),
        (Protocol::Ws, None) => Transport::Ws,
        (Protocol::Ws, Some(tls)) => Transport::wss_with_config(tls),
    };
    options.set_transport(transport);

    Ok(options)
}

/// Publishing handle backed by the MQTT client
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
}

#[async_trait]
impl MessageTransport for MqttTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await?;
        Ok(())
    }

    fn try_publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.client.try_publish(topic, QoS::AtMostOnce, false, payload)?;
        Ok(())
    }
}

/// A live broker session
pub struct BrokerSession {
    client: AsyncClient,
    client_id: String,
    connected: watch::Receiver<bool>,
    closing: Arc<AtomicBool>,
    event_loop: Option<JoinHandle<()>>,
    logger: Logger,
}

impl BrokerSession {
    /// Start the session; inbound publishes are forwarded to `inbound`
    ///
    /// Returns immediately; the receiver from [`BrokerSession::connected`]
    /// turns true once the broker accepts the session.
    pub fn start(config: &Config, inbound: mpsc::Sender<InboundMessage>, logger: Logger) -> Result<Self> {
        let client_id = client_id_with_suffix(&config.client_id);
        let options = mqtt_options(config, &client_id)?;
        let (client, mut event_loop) = AsyncClient::new(options, CHANNEL_CAPACITY);

        let (connected_tx, connected) = watch::channel(false);
        let closing = Arc::new(AtomicBool::new(false));

        logger.add_context_field("client_id".to_string(), &client_id);
        logger
            .info(&format!("Connecting to {}:{}", config.host, config.port))
            .field("protocol", &config.protocol)
            .field("tls", format!("{:?}", config.tls_mode()))
            .log();

        let topic = config.topic.clone();
        let loop_client = client.clone();
        let loop_closing = Arc::clone(&closing);
        let loop_logger = logger.clone();

        let task = tokio::spawn(async move {
            let mut ever_connected = false;
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        loop_logger
                            .info("Connected to broker")
                            .field("code", format!("{:?}", ack.code))
                            .log();
                        if let Err(e) = loop_client.try_subscribe(topic.clone(), QoS::AtMostOnce) {
                            loop_logger
                                .error(&format!("Failed to subscribe to {}: {}", topic, e))
                                .log();
                            break;
                        }
                        ever_connected = true;
                        let _ = connected_tx.send(true);
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = InboundMessage::new(
                            publish.topic,
                            publish.payload.to_vec(),
                            clock::monotonic_seconds(),
                        );
                        if inbound.send(message).await.is_err() {
                            // Dispatcher is gone; nothing left to deliver to
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if loop_closing.load(Ordering::SeqCst) {
                            break;
                        }

                        let first_connect = !ever_connected;
                        log_connection_error(&loop_logger, &e, first_connect);
                        if first_connect {
                            break;
                        }

                        let _ = connected_tx.send(false);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok(Self {
            client,
            client_id,
            connected,
            closing,
            event_loop: Some(task),
            logger,
        })
    }

    /// Client id actually used for the session
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Receiver of the connected signal
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Publishing handle for the tracker
    pub fn transport(&self) -> MqttTransport {
        MqttTransport {
            client: self.client.clone(),
        }
    }

    /// Disconnect; safe to call more than once and after a failed connect
    pub async fn disconnect(&mut self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.client.try_disconnect() {
            crate::log_debug!(self.logger, "Disconnect request not sent: {}", e);
        }

        if let Some(mut task) = self.event_loop.take() {
            // Give the event loop a moment to flush the DISCONNECT packet
            if tokio::time::timeout(Duration::from_secs(2), &mut task).await.is_err() {
                crate::log_debug!(self.logger, "Event loop did not stop in time");
                task.abort();
            }
        }
    }
}

impl Drop for BrokerSession {
    fn drop(&mut self) {
        if let Some(task) = self.event_loop.take() {
            task.abort();
        }
    }
}

/// Wait for a connected signal with an upper bound
pub async fn wait_for_connection(mut connected: watch::Receiver<bool>, timeout: Duration) -> Result<()> {
    match tokio::time::timeout(timeout, connected.wait_for(|up| *up)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) => Err(AppError::connection("Broker session ended before it was established")),
        Err(_) => Err(AppError::connection(format!(
            "Broker did not accept the session within {}s",
            timeout.as_secs_f64()
        ))),
    }
}

fn log_connection_error(logger: &Logger, error: &ConnectionError, first_connect: bool) {
    let message = match error {
        ConnectionError::ConnectionRefused(code) => {
            format!("Broker refused the connection, reason code {:?}", code)
        }
        other => format!("Connection error: {}", other),
    };

    let builder = if first_connect {
        logger.error(&message)
    } else {
        logger.warn(&format!("{}; reconnecting", message))
    };
    builder.field("first_connect", first_connect).log();
}
