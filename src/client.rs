//! Realtime client façade
//!
//! [`RealtimeClient`] owns one transport and one [`ConnectionStateMachine`].
//! Outbound publish/subscribe calls are gated on the connection state; inbound
//! transport events are consumed by a single delivery task which is the only
//! writer of that state and the only caller of the sink.
//!
//! ```rust,no_run
//! use qiscus_realtime::client::RealtimeClient;
//! use qiscus_realtime::config::MqttSection;
//! use qiscus_realtime::sink::ChannelSink;
//! use qiscus_realtime::transport::MqttTransport;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let transport = MqttTransport::new("my-client", MqttSection::new("mqtt://localhost:1883"))?;
//! let (sink, mut notifications) = ChannelSink::new();
//! let mut client = RealtimeClient::new(transport, Arc::new(sink));
//!
//! client.connect(None).await?;
//! while let Some(notification) = notifications.recv().await {
//!     println!("{notification:?}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

use crate::config::Credentials;
use crate::error::{RealtimeError, RealtimeResult};
use crate::protocol::payload::{encode_presence, encode_receipt, encode_typing};
use crate::protocol::{ReceiptEvent, ReceiptStatus, TopicBuilder};
use crate::sink::RealtimeEventSink;
use crate::transport::mqtt::{ConnectionStateMachine, EventRouter};
use crate::transport::{ConnectionState, Transport, TransportEvent};
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the transport event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Consumer side of the transport callback surface
struct Delivery {
    state: Arc<ConnectionStateMachine>,
    sink: Arc<dyn RealtimeEventSink>,
}

impl Delivery {
    fn handle(&self, event: TransportEvent) {
        match event {
            TransportEvent::StateChanged(new_state) => {
                if self.state.on_transport_state_changed(new_state) {
                    info!(state = %new_state, "Realtime connection state changed");
                    self.sink.on_connection_state_changed(new_state);
                }
            }
            TransportEvent::Message { topic, payload } => {
                let span = crate::delivery_span!(topic = %topic);
                let _guard = span.enter();
                let event = EventRouter::route(&topic, &payload);
                debug!(topic = %topic, kind = %event.kind(), "Routed realtime message");
                self.sink.handle(&event);
            }
        }
    }

    async fn run(self, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        debug!("Transport event channel closed, delivery stopped");
    }
}

/// Public façade over a realtime transport
pub struct RealtimeClient<T: Transport> {
    transport: T,
    state: Arc<ConnectionStateMachine>,
    sink: Arc<dyn RealtimeEventSink>,
    delivery_handle: Option<JoinHandle<()>>,
    /// Set by a successful `connect`, cleared by `disconnect`
    connect_issued: bool,
}

impl<T: Transport> RealtimeClient<T> {
    pub fn new(transport: T, sink: Arc<dyn RealtimeEventSink>) -> Self {
        Self {
            transport,
            state: Arc::new(ConnectionStateMachine::new()),
            sink,
            delivery_handle: None,
            connect_issued: false,
        }
    }

    /// Current connection state as last reported by the transport
    pub fn state(&self) -> ConnectionState {
        self.state.state()
    }

    pub fn can_send(&self) -> bool {
        self.state.can_send()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Start the delivery task (first call only) and connect the transport
    ///
    /// Rejected with [`RealtimeError::AlreadyStarted`] until [`disconnect`] is
    /// called, whatever state the transport has reported in between.
    ///
    /// [`disconnect`]: RealtimeClient::disconnect
    pub async fn connect(&mut self, credentials: Option<Credentials>) -> RealtimeResult<()> {
        // Reported state lags the transport, so it can't guard a second connect
        if self.connect_issued {
            return Err(RealtimeError::AlreadyStarted);
        }

        if self.delivery_handle.is_none() {
            let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            self.transport.set_event_sender(tx);
            let delivery = Delivery {
                state: self.state.clone(),
                sink: self.sink.clone(),
            };
            self.delivery_handle = Some(tokio::spawn(delivery.run(rx)));
        }

        info!(
            authenticated = credentials.is_some(),
            "Connecting realtime client"
        );
        self.transport
            .connect(credentials)
            .await
            .map_err(RealtimeError::transport)?;
        self.connect_issued = true;
        Ok(())
    }

    /// Ensure send-class operations are permitted right now
    fn check_connection_state(&self) -> RealtimeResult<()> {
        let state = self.state();
        if !ConnectionStateMachine::can_send_in(state) {
            return Err(RealtimeError::not_connected(state));
        }
        Ok(())
    }

    /// Publish a raw payload; fails immediately unless connected
    ///
    /// Nothing is buffered: a publish rejected here is lost unless the caller
    /// retries after reconnecting.
    pub async fn publish(&self, topic: &str, payload: &str) -> RealtimeResult<()> {
        if let Err(e) = self.check_connection_state() {
            warn!(topic, "Can't publish: {}", e);
            return Err(e);
        }

        self.transport
            .publish_raw(topic, payload)
            .await
            .map_err(RealtimeError::transport)
    }

    /// Subscribe to a topic filter; fails immediately unless connected
    ///
    /// Failed subscriptions are not replayed. Callers re-issue them after
    /// observing a transition to [`ConnectionState::Connected`].
    pub async fn subscribe(&self, topic: &str) -> RealtimeResult<()> {
        if let Err(e) = self.check_connection_state() {
            info!(topic, state = %self.state(), "Delay subscribe until connected");
            return Err(e);
        }

        self.transport
            .subscribe_raw(topic)
            .await
            .map_err(RealtimeError::transport)?;
        debug!(topic, "Subscribed");
        Ok(())
    }

    /// Unsubscribe, forwarded regardless of connection state
    pub async fn unsubscribe(&self, topic: &str) -> RealtimeResult<()> {
        self.transport
            .unsubscribe_raw(topic)
            .await
            .map_err(RealtimeError::transport)
    }

    /// Disconnect, forwarded regardless of connection state
    pub async fn disconnect(&mut self) -> RealtimeResult<()> {
        info!(state = %self.state(), "Disconnecting realtime client");
        self.connect_issued = false;
        self.transport
            .disconnect()
            .await
            .map_err(RealtimeError::transport)
    }

    /// Subscribe to the comment stream of a user token
    pub async fn subscribe_comments(&self, token: &str) -> RealtimeResult<()> {
        require("token", token)?;
        self.subscribe(&TopicBuilder::comment(token)).await
    }

    /// Subscribe to typing, read and delivery events of a room
    pub async fn subscribe_room(&self, room_id: &str) -> RealtimeResult<()> {
        require("room_id", room_id)?;
        for topic in TopicBuilder::room_subscriptions(room_id) {
            self.subscribe(&topic).await?;
        }
        Ok(())
    }

    /// Subscribe to presence changes of a user
    pub async fn subscribe_presence(&self, user: &str) -> RealtimeResult<()> {
        require("user", user)?;
        self.subscribe(&TopicBuilder::presence(user)).await
    }

    /// Tell a room that `user` started or stopped typing
    pub async fn publish_typing(
        &self,
        room_id: &str,
        user: &str,
        is_typing: bool,
    ) -> RealtimeResult<()> {
        require("room_id", room_id)?;
        require("user", user)?;
        let topic = TopicBuilder::typing(room_id, room_id, user);
        self.publish(&topic, &encode_typing(is_typing)).await
    }

    /// Announce `user` online or offline, stamped with the current UTC time
    pub async fn publish_presence(&self, user: &str, is_online: bool) -> RealtimeResult<()> {
        require("user", user)?;
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let topic = TopicBuilder::presence(user);
        self.publish(&topic, &encode_presence(is_online, &timestamp))
            .await
    }

    /// Acknowledge a comment as read or delivered on behalf of `user`
    pub async fn publish_receipt(
        &self,
        status: ReceiptStatus,
        user: &str,
        receipt: &ReceiptEvent,
    ) -> RealtimeResult<()> {
        require("room_id", &receipt.room_id)?;
        require("comment_id", &receipt.comment_id)?;
        require("user", user)?;

        let room_id = receipt.room_id.as_str();
        let topic = match status {
            ReceiptStatus::Read => TopicBuilder::read(room_id, room_id, user),
            ReceiptStatus::Delivered => TopicBuilder::delivery(room_id, room_id, user),
        };
        let payload = encode_receipt(&receipt.comment_id, &receipt.comment_unique_id);
        self.publish(&topic, &payload).await
    }
}

impl<T: Transport> Drop for RealtimeClient<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.delivery_handle.take() {
            handle.abort();
        }
    }
}

fn require(field: &str, value: &str) -> RealtimeResult<()> {
    if value.is_empty() || value.contains(['/', '+', '#']) {
        return Err(RealtimeError::invalid_input(format!(
            "{field} must be a non-empty topic segment, got '{value}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{DecodedEvent, PresenceEvent, TypingEvent};
    use crate::sink::{ChannelSink, SinkNotification};
    use crate::testing::MockTransport;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn next(rx: &mut UnboundedReceiver<SinkNotification>) -> SinkNotification {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for sink notification")
            .expect("sink channel closed")
    }

    fn setup() -> (
        RealtimeClient<MockTransport>,
        MockTransport,
        UnboundedReceiver<SinkNotification>,
    ) {
        let transport = MockTransport::new();
        let handle = transport.clone();
        let (sink, rx) = ChannelSink::new();
        (RealtimeClient::new(transport, Arc::new(sink)), handle, rx)
    }

    async fn connected() -> (
        RealtimeClient<MockTransport>,
        MockTransport,
        UnboundedReceiver<SinkNotification>,
    ) {
        let (mut client, handle, mut rx) = setup();
        client.connect(None).await.unwrap();
        assert_eq!(
            next(&mut rx).await,
            SinkNotification::ConnectionState(ConnectionState::Connecting)
        );
        handle
            .emit(TransportEvent::StateChanged(ConnectionState::Connected))
            .await;
        assert_eq!(
            next(&mut rx).await,
            SinkNotification::ConnectionState(ConnectionState::Connected)
        );
        (client, handle, rx)
    }

    #[tokio::test]
    async fn test_publish_while_disconnected_performs_no_transport_call() {
        let (client, handle, _rx) = setup();

        assert_eq!(client.state(), ConnectionState::Disconnected);
        let error = client.publish("1/c", "hello").await.unwrap_err();
        assert!(error.is_not_connected());
        assert!(handle.get_published().await.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_while_connecting_is_rejected() {
        let (mut client, handle, mut rx) = setup();
        client.connect(None).await.unwrap();
        assert_eq!(
            next(&mut rx).await,
            SinkNotification::ConnectionState(ConnectionState::Connecting)
        );

        let error = client.subscribe("1/c").await.unwrap_err();
        assert!(matches!(
            error,
            RealtimeError::NotConnected {
                state: ConnectionState::Connecting
            }
        ));
        assert!(handle.get_subscribed().await.is_empty());
    }

    #[tokio::test]
    async fn test_publish_and_subscribe_when_connected() {
        let (client, handle, _rx) = connected().await;

        assert!(client.can_send());
        client.subscribe("token/c").await.unwrap();
        client.publish("r/1/1/a/t", "true").await.unwrap();

        assert_eq!(handle.get_subscribed().await, vec!["token/c"]);
        assert_eq!(
            handle.get_published().await,
            vec![("r/1/1/a/t".to_string(), "true".to_string())]
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_and_disconnect_forwarded_while_disconnected() {
        let (mut client, handle, _rx) = setup();

        client.unsubscribe("token/c").await.unwrap();
        client.disconnect().await.unwrap();

        assert_eq!(handle.get_unsubscribed().await, vec!["token/c"]);
        assert_eq!(handle.disconnect_calls(), 1);
    }

    #[tokio::test]
    async fn test_inbound_messages_are_routed_to_sink() {
        let (_client, handle, mut rx) = connected().await;

        handle.emit_message("r/9/_/_/t", "true").await;
        assert_eq!(
            next(&mut rx).await,
            SinkNotification::Event(DecodedEvent::Typing(TypingEvent {
                room_id: "9".to_string(),
                user_email: String::new(),
                is_typing: true,
            }))
        );

        // Undefined messages never reach the sink
        handle.emit_message("unknown/topic/shape", "x").await;
        handle.emit_message("u/bob@x.com/s", "0:2020-01-01T00:00:00Z").await;
        assert_eq!(
            next(&mut rx).await,
            SinkNotification::Event(DecodedEvent::Online(PresenceEvent {
                user_email: "bob@x.com".to_string(),
                is_online: false,
                timestamp_utc: "2020-01-01T00:00:00Z".to_string(),
            }))
        );
    }

    #[tokio::test]
    async fn test_repeated_state_is_not_notified() {
        let (client, handle, mut rx) = connected().await;

        handle
            .emit(TransportEvent::StateChanged(ConnectionState::Connected))
            .await;
        handle
            .emit(TransportEvent::StateChanged(ConnectionState::Disconnected))
            .await;

        assert_eq!(
            next(&mut rx).await,
            SinkNotification::ConnectionState(ConnectionState::Disconnected)
        );
        assert!(!client.can_send());
        assert!(client.publish("1/c", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_connect_twice_is_rejected() {
        let (mut client, handle, _rx) = connected().await;
        assert!(matches!(
            client.connect(None).await,
            Err(RealtimeError::AlreadyStarted)
        ));
        assert_eq!(handle.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_immediate_second_connect_is_rejected() {
        let (mut client, handle, _rx) = setup();

        // No state has been delivered yet when the second call arrives
        client.connect(None).await.unwrap();
        assert!(matches!(
            client.connect(None).await,
            Err(RealtimeError::AlreadyStarted)
        ));
        assert_eq!(handle.connect_calls(), 1);
    }

    #[tokio::test]
    async fn test_connect_rejected_after_transport_drop_until_disconnect() {
        let (mut client, handle, mut rx) = connected().await;

        handle
            .emit(TransportEvent::StateChanged(ConnectionState::Disconnected))
            .await;
        assert_eq!(
            next(&mut rx).await,
            SinkNotification::ConnectionState(ConnectionState::Disconnected)
        );
        assert!(matches!(
            client.connect(None).await,
            Err(RealtimeError::AlreadyStarted)
        ));
        assert_eq!(handle.connect_calls(), 1);

        client.disconnect().await.unwrap();
        client.connect(None).await.unwrap();
        assert_eq!(handle.connect_calls(), 2);
    }

    #[tokio::test]
    async fn test_connect_can_be_retried_after_failure() {
        let (sink, _rx) = ChannelSink::new();
        let mut client = RealtimeClient::new(MockTransport::with_failure(), Arc::new(sink));

        for _ in 0..2 {
            let error = client.connect(None).await.unwrap_err();
            assert!(matches!(error, RealtimeError::TransportError(_)));
        }
    }

    #[tokio::test]
    async fn test_reconnect_after_disconnect() {
        let (mut client, handle, mut rx) = connected().await;

        client.disconnect().await.unwrap();
        assert_eq!(
            next(&mut rx).await,
            SinkNotification::ConnectionState(ConnectionState::Disconnecting)
        );
        assert_eq!(
            next(&mut rx).await,
            SinkNotification::ConnectionState(ConnectionState::Disconnected)
        );

        client.connect(None).await.unwrap();
        assert_eq!(
            next(&mut rx).await,
            SinkNotification::ConnectionState(ConnectionState::Connecting)
        );
        assert_eq!(handle.connect_calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_transport_connect_is_reported() {
        let transport = MockTransport::with_failure();
        let (sink, _rx) = ChannelSink::new();
        let mut client = RealtimeClient::new(transport, Arc::new(sink));

        let error = client.connect(None).await.unwrap_err();
        assert!(matches!(error, RealtimeError::TransportError(_)));
    }

    #[tokio::test]
    async fn test_typed_publish_helpers() {
        let (client, handle, _rx) = connected().await;

        client.publish_typing("55", "bob@x.com", true).await.unwrap();
        client
            .publish_receipt(
                ReceiptStatus::Read,
                "bob@x.com",
                &ReceiptEvent {
                    room_id: "55".to_string(),
                    comment_id: "10".to_string(),
                    comment_unique_id: "uniq".to_string(),
                },
            )
            .await
            .unwrap();
        client.publish_presence("bob@x.com", true).await.unwrap();

        let published = handle.get_published().await;
        assert_eq!(
            published[0],
            ("r/55/55/bob@x.com/t".to_string(), "true".to_string())
        );
        assert_eq!(
            published[1],
            ("r/55/55/bob@x.com/r".to_string(), "10:uniq".to_string())
        );
        assert_eq!(published[2].0, "u/bob@x.com/s");
        assert!(published[2].1.starts_with("1:"));
        assert!(published[2].1.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_typed_helpers_validate_segments() {
        let (client, handle, _rx) = connected().await;

        assert!(matches!(
            client.publish_typing("", "bob", true).await,
            Err(RealtimeError::InvalidInput { .. })
        ));
        assert!(matches!(
            client.subscribe_room("5/+").await,
            Err(RealtimeError::InvalidInput { .. })
        ));
        assert!(handle.get_published().await.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_helpers() {
        let (client, handle, _rx) = connected().await;

        client.subscribe_comments("tok").await.unwrap();
        client.subscribe_room("42").await.unwrap();
        client.subscribe_presence("bob@x.com").await.unwrap();

        assert_eq!(
            handle.get_subscribed().await,
            vec![
                "tok/c",
                "r/42/+/+/t",
                "r/42/+/+/r",
                "r/42/+/+/d",
                "u/bob@x.com/s"
            ]
        );
    }
}
