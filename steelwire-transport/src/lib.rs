/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # SteelWire Transport
//!
//! Transport primitive seam for the SteelWire gateway engine.
//!
//! The gateway core does not implement networking. It sends and receives
//! raw frames through the [`Transport`] trait; the hosting process plugs in
//! the actual wire (TCP, MQ, test harness).
//!
//! [`ChannelTransport`] is an in-process implementation over tokio channels,
//! used by tests and demos.

use async_trait::async_trait;
use bytes::Bytes;
use steelwire_core::error::TransportError;
use tokio::sync::Mutex;
use tokio::sync::mpsc;

/// Abstract "send raw frame" / "receive raw frame" primitive.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a raw frame to the counterparty.
    ///
    /// # Errors
    /// Returns [`TransportError`] if the frame cannot be sent.
    async fn send(&self, frame: Bytes) -> Result<(), TransportError>;

    /// Receives the next raw frame from the counterparty.
    ///
    /// # Errors
    /// Returns [`TransportError::Closed`] once the peer is gone.
    async fn recv(&self) -> Result<Bytes, TransportError>;
}

/// In-process transport over tokio mpsc channels.
///
/// [`ChannelTransport::pair`] returns two connected endpoints; frames sent
/// on one side arrive on the other in order.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Bytes>,
    rx: Mutex<mpsc::UnboundedReceiver<Bytes>>,
}

impl ChannelTransport {
    /// Creates a connected pair of endpoints.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: a_tx,
                rx: Mutex::new(b_rx),
            },
            Self {
                tx: b_tx,
                rx: Mutex::new(a_rx),
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, frame: Bytes) -> Result<(), TransportError> {
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn recv(&self) -> Result<Bytes, TransportError> {
        self.rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Closed)
    }
}
