//! Impure I/O operations for the MQTT transport
//!
//! This module owns the rumqttc client and event loop. The event loop runs in
//! one spawned task which reports state changes and inbound messages through a
//! single [`TransportEvent`] channel.

use super::connection::{configure_mqtt_options, ConnectionState, MqttError};
use super::message_handler::{EventRoute, MessageHandler};
use crate::config::{Credentials, MqttSection};
use crate::error::sanitize_error_message;
use crate::transport::{Transport, TransportEvent};
use async_trait::async_trait;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, EventLoop};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// Capacity of the rumqttc request channel
const REQUEST_CAPACITY: usize = 10;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// MQTT transport backed by rumqttc
pub struct MqttClient {
    client_id: String,
    config: MqttSection,
    client: Option<AsyncClient>,
    event_sender: Option<mpsc::Sender<TransportEvent>>,
    event_loop_handle: Option<JoinHandle<()>>,
    shutdown_tx: Option<watch::Sender<bool>>,
}

impl MqttClient {
    /// Create a transport; fails early on an unusable broker URL
    pub fn new(client_id: &str, config: MqttSection) -> Result<Self, MqttError> {
        configure_mqtt_options(client_id, &config, None)?;

        Ok(MqttClient {
            client_id: client_id.to_string(),
            config,
            client: None,
            event_sender: None,
            event_loop_handle: None,
            shutdown_tx: None,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Whether the event loop task has been started and not yet stopped
    pub fn is_started(&self) -> bool {
        self.event_loop_handle.is_some()
    }

    fn started_client(&self) -> Result<&AsyncClient, MqttError> {
        self.client.as_ref().ok_or_else(|| {
            MqttError::ConnectionFailed("transport has not been connected".to_string().into())
        })
    }

    /// Forward an event to the installed sender, if any
    async fn report(sender: &Option<mpsc::Sender<TransportEvent>>, event: TransportEvent) {
        let Some(sender) = sender else {
            debug!(target: "mqtt_transport", ?event, "No event sender installed, dropping event");
            return;
        };

        if sender.send(event).await.is_err() {
            debug!(target: "mqtt_transport", "Event receiver closed, dropping event");
        }
    }

    /// Perform interruptible sleep with shutdown monitoring
    /// Returns true if sleep completed, false if shutdown requested
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay_ms: u64) -> bool {
        if *shutdown_rx.borrow() {
            return false;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Shutdown signal received during reconnection delay, stopping");
                    return false;
                }
                true
            }
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {
                true
            }
        }
    }

    /// Drive the rumqttc event loop until shutdown
    async fn run_event_loop(
        client_id: String,
        mut event_loop: EventLoop,
        sender: Option<mpsc::Sender<TransportEvent>>,
        mut shutdown_rx: watch::Receiver<bool>,
        reconnect_delay_ms: u64,
    ) {
        info!(client_id = %client_id, "Starting MQTT event loop");

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping event loop");
                        break;
                    }
                }

                event_result = event_loop.poll() => {
                    match event_result {
                        Ok(event) => {
                            let route = MessageHandler::route_mqtt_event(&event);
                            Self::process_event_route(route, &sender).await;
                        }
                        Err(e) => {
                            error!(
                                client_id = %client_id,
                                "MQTT event loop error: {}",
                                sanitize_error_message(&e.to_string())
                            );
                            let disconnected =
                                TransportEvent::StateChanged(ConnectionState::Disconnected);
                            Self::report(&sender, disconnected).await;

                            // rumqttc redials on the next poll
                            let delay = reconnect_delay_ms;
                            if !Self::interruptible_sleep(shutdown_rx.clone(), delay).await {
                                break;
                            }
                            let connecting =
                                TransportEvent::StateChanged(ConnectionState::Connecting);
                            Self::report(&sender, connecting).await;
                        }
                    }
                }
            }
        }

        info!(client_id = %client_id, "MQTT event loop stopped");
    }

    /// Process routed MQTT event - extracted for testability
    async fn process_event_route(
        route: EventRoute,
        sender: &Option<mpsc::Sender<TransportEvent>>,
    ) {
        match route {
            EventRoute::ConnectionAcknowledged => {
                info!("MQTT connection acknowledged");
                Self::report(sender, TransportEvent::StateChanged(ConnectionState::Connected))
                    .await;
            }
            EventRoute::MessageReceived {
                topic,
                payload,
                retain,
            } => match MessageHandler::payload_as_str(&payload) {
                Some(payload) => {
                    debug!(
                        target: "mqtt_transport",
                        topic = %topic,
                        payload,
                        retain,
                        "Received MQTT message"
                    );
                    let message = TransportEvent::Message {
                        topic,
                        payload: payload.to_string(),
                    };
                    Self::report(sender, message).await;
                }
                None => {
                    warn!(topic = %topic, "Dropping MQTT message with non UTF-8 payload");
                }
            },
            EventRoute::Disconnected => {
                warn!("MQTT broker disconnected client");
                Self::report(
                    sender,
                    TransportEvent::StateChanged(ConnectionState::Disconnected),
                )
                .await;
            }
            EventRoute::SubscriptionConfirmed {
                packet_id,
                return_codes,
            } => {
                debug!(target: "mqtt_transport", packet_id, %return_codes, "Subscription confirmed");
            }
            EventRoute::UnsubscribeConfirmed => {
                debug!(target: "mqtt_transport", "Unsubscribe confirmed");
            }
            EventRoute::InfrastructureEvent(event_str) => {
                debug!(target: "mqtt_transport", "MQTT event: {}", event_str);
            }
            EventRoute::OutgoingEvent => {}
        }
    }
}

#[async_trait]
impl Transport for MqttClient {
    type Error = MqttError;

    async fn connect(&mut self, credentials: Option<Credentials>) -> Result<(), Self::Error> {
        if self.event_loop_handle.is_some() {
            return Err(MqttError::AlreadyConnected);
        }

        let mqtt_options =
            configure_mqtt_options(&self.client_id, &self.config, credentials.as_ref())?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self::report(
            &self.event_sender,
            TransportEvent::StateChanged(ConnectionState::Connecting),
        )
        .await;

        let handle = tokio::spawn(Self::run_event_loop(
            self.client_id.clone(),
            event_loop,
            self.event_sender.clone(),
            shutdown_rx,
            self.config.reconnect_delay_ms,
        ));

        self.client = Some(client);
        self.shutdown_tx = Some(shutdown_tx);
        self.event_loop_handle = Some(handle);

        info!(broker = %self.config.broker_url, "MQTT transport connecting");
        Ok(())
    }

    async fn publish_raw(&self, topic: &str, payload: &str) -> Result<(), Self::Error> {
        let client = self.started_client()?;
        client
            .publish(topic, QoS::AtLeastOnce, false, payload.to_string())
            .await
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))?;

        debug!(target: "mqtt_transport", topic, payload, "Published message");
        Ok(())
    }

    async fn subscribe_raw(&self, topic: &str) -> Result<(), Self::Error> {
        let client = self.started_client()?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .instrument(crate::mqtt_span!(operation = "subscribe", topic))
            .await
            .map_err(|e| {
                MqttError::SubscriptionFailed(format!("Failed to subscribe to {topic}: {e}").into())
            })?;

        debug!(target: "mqtt_transport", topic, "Subscribe requested");
        Ok(())
    }

    async fn unsubscribe_raw(&self, topic: &str) -> Result<(), Self::Error> {
        let client = self.started_client()?;
        // Requests queue up while the broker is unreachable; fail instead of waiting for room
        client.try_unsubscribe(topic).map_err(|e| {
            MqttError::UnsubscribeFailed(format!("Failed to unsubscribe from {topic}: {e}").into())
        })?;

        debug!(target: "mqtt_transport", topic, "Unsubscribe requested");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        let Some(client) = self.client.take() else {
            debug!("Disconnect requested on a transport that was never connected");
            return Ok(());
        };

        Self::report(
            &self.event_sender,
            TransportEvent::StateChanged(ConnectionState::Disconnecting),
        )
        .await;

        // Never wait on a full request queue, the loop must still be stopped
        let result = client
            .try_disconnect()
            .map_err(|e| MqttError::ConnectionFailed(Box::new(e)));
        if let Err(e) = &result {
            warn!(target: "mqtt_transport", "Disconnect request not queued: {}", e);
        }

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }

        if let Some(mut handle) = self.event_loop_handle.take() {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut handle).await {
                Ok(Ok(())) => {
                    info!("Event loop task shut down gracefully");
                }
                Ok(Err(e)) if !e.is_cancelled() => {
                    warn!("Event loop task ended with error: {}", e);
                }
                Err(_) => {
                    warn!("Event loop task didn't shut down gracefully, forcing abort");
                    handle.abort();
                }
                _ => {}
            }
        }

        Self::report(
            &self.event_sender,
            TransportEvent::StateChanged(ConnectionState::Disconnected),
        )
        .await;

        info!("MQTT transport disconnected");
        result
    }

    fn set_event_sender(&mut self, sender: mpsc::Sender<TransportEvent>) {
        self.event_sender = Some(sender);
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
        }

        // No async in Drop; callers should disconnect() for a clean shutdown
        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }
    }
}
