//! Mock transport for testing.
//!
//! Allows queueing inbound frames and capturing sent frames for
//! verification.

use super::{Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mock transport for testing.
///
/// Clones share state, so a test can keep one handle while the client
/// owns another.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    connected: bool,
    connected_address: Option<String>,
    sent_frames: Vec<Vec<u8>>,
    receive_queue: VecDeque<Vec<u8>>,
    hold_open: bool,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame to be returned by the next `recv()` call.
    pub fn queue_frame(&self, data: Vec<u8>) {
        let mut inner = self.inner.lock().unwrap();
        inner.receive_queue.push_back(data);
    }

    /// Queue a text frame.
    pub fn queue_text(&self, text: &str) {
        self.queue_frame(text.as_bytes().to_vec());
    }

    /// Keep `recv()` pending instead of reporting a closed connection once
    /// the queue is drained.
    pub fn hold_open(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.hold_open = true;
    }

    /// Get all frames that were sent.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        let inner = self.inner.lock().unwrap();
        inner.sent_frames.clone()
    }

    /// Get all sent frames as text.
    pub fn sent_text(&self) -> Vec<String> {
        self.sent_frames()
            .into_iter()
            .map(|frame| String::from_utf8_lossy(&frame).into_owned())
            .collect()
    }

    /// Get the address that was connected to.
    pub fn connected_address(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner.connected_address.clone()
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_connect = Some(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_send = Some(error.to_string());
    }

    /// Forget sent frames.
    pub fn clear_sent(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.sent_frames.clear();
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.connected = true;
        inner.connected_address = Some(address.to_string());
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.sent_frames.push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let held = {
            let mut inner = self.inner.lock().unwrap();
            if !inner.connected {
                return Err(TransportError::NotConnected);
            }
            if let Some(frame) = inner.receive_queue.pop_front() {
                return Ok(frame);
            }
            inner.hold_open
        };

        if held {
            std::future::pending::<()>().await;
        }
        Err(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.connected
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.connected = false;
        Ok(())
    }
}
