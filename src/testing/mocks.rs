//! Mock implementations for testing
//!
//! Provides a mock [`Transport`] that records outbound calls and lets tests
//! inject state changes and inbound messages as if they came from a broker.

use crate::config::Credentials;
use crate::transport::{ConnectionState, Transport, TransportEvent};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

pub type PublishedMessage = (String, String);

#[derive(Debug, Error)]
#[error("Mock transport failure: {0}")]
pub struct MockTransportError(pub String);

/// Mock transport for testing
///
/// Clones share all recorded state, so a test keeps one clone as a handle
/// after moving the other into a client.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    pub published: Arc<Mutex<Vec<PublishedMessage>>>,
    pub subscribed: Arc<Mutex<Vec<String>>>,
    pub unsubscribed: Arc<Mutex<Vec<String>>>,
    pub connect_count: Arc<AtomicUsize>,
    pub disconnect_count: Arc<AtomicUsize>,
    pub should_fail: bool,
    pub event_sender: Arc<Mutex<Option<mpsc::Sender<TransportEvent>>>>,
    pub last_credentials: Arc<Mutex<Option<Credentials>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub async fn get_published(&self) -> Vec<PublishedMessage> {
        self.published.lock().await.clone()
    }

    pub async fn get_subscribed(&self) -> Vec<String> {
        self.subscribed.lock().await.clone()
    }

    pub async fn get_unsubscribed(&self) -> Vec<String> {
        self.unsubscribed.lock().await.clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_count.load(Ordering::SeqCst)
    }

    pub async fn clear_history(&self) {
        self.published.lock().await.clear();
        self.subscribed.lock().await.clear();
        self.unsubscribed.lock().await.clear();
    }

    /// Push an event into the installed channel, as the broker side would
    pub async fn emit(&self, event: TransportEvent) {
        let sender = self.event_sender.lock().await.clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    pub async fn emit_message(&self, topic: &str, payload: &str) {
        self.emit(TransportEvent::Message {
            topic: topic.to_string(),
            payload: payload.to_string(),
        })
        .await;
    }

    fn check(&self, operation: &str) -> Result<(), MockTransportError> {
        if self.should_fail {
            return Err(MockTransportError(format!("{operation} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MockTransportError;

    async fn connect(&mut self, credentials: Option<Credentials>) -> Result<(), Self::Error> {
        self.check("connect")?;
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        *self.last_credentials.lock().await = credentials;
        self.emit(TransportEvent::StateChanged(ConnectionState::Connecting))
            .await;
        Ok(())
    }

    async fn publish_raw(&self, topic: &str, payload: &str) -> Result<(), Self::Error> {
        self.check("publish")?;
        self.published
            .lock()
            .await
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }

    async fn subscribe_raw(&self, topic: &str) -> Result<(), Self::Error> {
        self.check("subscribe")?;
        self.subscribed.lock().await.push(topic.to_string());
        Ok(())
    }

    async fn unsubscribe_raw(&self, topic: &str) -> Result<(), Self::Error> {
        self.check("unsubscribe")?;
        self.unsubscribed.lock().await.push(topic.to_string());
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.disconnect_count.fetch_add(1, Ordering::SeqCst);
        self.emit(TransportEvent::StateChanged(ConnectionState::Disconnecting))
            .await;
        self.emit(TransportEvent::StateChanged(ConnectionState::Disconnected))
            .await;
        Ok(())
    }

    fn set_event_sender(&mut self, sender: mpsc::Sender<TransportEvent>) {
        if let Ok(mut event_sender) = self.event_sender.try_lock() {
            *event_sender = Some(sender);
        }
    }
}
