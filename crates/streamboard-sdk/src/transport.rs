//! Raw channel implementations.
//!
//! The bus only needs two things from the outside world: a way to post an
//! outgoing [`Envelope`] ([`Transport`]) and a stream of [`Inbound`] frames
//! ([`InboundRx`]). This module provides:
//!
//! - [`ChannelTransport`]: an in-memory duplex pair built on unbounded
//!   tokio channels, for tests and in-process embedding.
//! - [`JsonLinesTransport`]: one JSON envelope per line over any
//!   `AsyncRead`/`AsyncWrite` pair, typically the plugin's stdin/stdout.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use streamboard_types::{Envelope, Inbound};

use crate::error::{Result, SdkError};

/// Receiving half of a raw channel.
pub type InboundRx = mpsc::UnboundedReceiver<Inbound>;

/// Outgoing half of a raw channel.
///
/// Posting never waits: transports queue the envelope and deliver it in
/// order. An error means the channel is gone.
pub trait Transport: Send + Sync {
    /// Queue an envelope for delivery to the peer.
    fn post(&self, envelope: Envelope) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-memory pair
// ---------------------------------------------------------------------------

/// One end of an in-memory duplex channel.
///
/// Every envelope posted here is delivered to the peer tagged with this
/// end's identity.
pub struct ChannelTransport {
    peer: mpsc::UnboundedSender<Inbound>,
    identity: Option<String>,
}

/// A transport together with the frames arriving at it.
pub struct Endpoint {
    /// Posts to the peer.
    pub transport: Arc<ChannelTransport>,
    /// Frames posted by the peer.
    pub inbound: InboundRx,
}

impl ChannelTransport {
    /// Create a transport that delivers into `peer`.
    pub fn new(peer: mpsc::UnboundedSender<Inbound>, identity: Option<String>) -> Self {
        Self { peer, identity }
    }

    /// Create a connected pair with no sender identities.
    pub fn pair() -> (Endpoint, Endpoint) {
        Self::pair_with_identities(None, None)
    }

    /// Create a connected pair whose frames carry the given identities.
    pub fn pair_with_identities(
        left: Option<&str>,
        right: Option<&str>,
    ) -> (Endpoint, Endpoint) {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        let left = Endpoint {
            transport: Arc::new(Self::new(right_tx, left.map(str::to_owned))),
            inbound: left_rx,
        };
        let right = Endpoint {
            transport: Arc::new(Self::new(left_tx, right.map(str::to_owned))),
            inbound: right_rx,
        };
        (left, right)
    }

    /// The identity attached to frames posted through this end.
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }
}

impl Transport for ChannelTransport {
    fn post(&self, envelope: Envelope) -> Result<()> {
        let frame = Inbound {
            sender: self.identity.clone(),
            envelope,
        };
        self.peer
            .send(frame)
            .map_err(|_| SdkError::Transport("peer receiver dropped".into()))
    }
}

// ---------------------------------------------------------------------------
// JSON lines
// ---------------------------------------------------------------------------

/// Transport that writes one JSON envelope per line.
///
/// A background writer task drains an internal queue into the writer; a
/// background reader task parses lines from the reader into [`Inbound`]
/// frames. Frames read this way carry no sender identity.
pub struct JsonLinesTransport {
    outgoing: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl JsonLinesTransport {
    /// Spawn reader and writer tasks over the given halves.
    pub fn spawn<R, W>(reader: R, writer: W) -> (Arc<Self>, InboundRx)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_lines(writer, out_rx));
        tokio::spawn(read_lines(reader, in_tx));
        let transport = Self {
            outgoing: Mutex::new(Some(out_tx)),
            writer: Mutex::new(Some(writer)),
        };
        (Arc::new(transport), in_rx)
    }

    /// Spawn over the process's stdin and stdout.
    pub fn stdio() -> (Arc<Self>, InboundRx) {
        Self::spawn(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Stop accepting envelopes and wait until every queued one is written.
    pub async fn close(&self) {
        self.outgoing.lock().take();
        let writer = self.writer.lock().take();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                warn!(error = %e, "json-lines: writer task failed");
            }
        }
    }
}

impl Transport for JsonLinesTransport {
    fn post(&self, envelope: Envelope) -> Result<()> {
        match &*self.outgoing.lock() {
            Some(queue) => queue
                .send(envelope)
                .map_err(|_| SdkError::Transport("json-lines writer stopped".into())),
            None => Err(SdkError::Transport("json-lines transport closed".into())),
        }
    }
}

async fn write_lines<W>(mut writer: W, mut queue: mpsc::UnboundedReceiver<Envelope>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(envelope) = queue.recv().await {
        let mut line = match serde_json::to_string(&envelope) {
            Ok(line) => line,
            Err(e) => {
                warn!(channel = %envelope.channel, error = %e, "json-lines: cannot encode envelope");
                continue;
            }
        };
        line.push('\n');
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!(error = %e, "json-lines: write failed, stopping writer");
            break;
        }
        if let Err(e) = writer.flush().await {
            warn!(error = %e, "json-lines: flush failed, stopping writer");
            break;
        }
    }
    debug!("json-lines: writer finished");
}

async fn read_lines<R>(reader: R, frames: mpsc::UnboundedSender<Inbound>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("json-lines: peer closed input");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Envelope>(trimmed) {
                    Ok(envelope) => {
                        if frames.send(Inbound::anonymous(envelope)).is_err() {
                            debug!("json-lines: inbound receiver dropped");
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "json-lines: ignoring malformed line");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "json-lines: read error, exiting");
                break;
            }
        }
    }
}
