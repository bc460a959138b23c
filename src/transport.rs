//! Frame transport: owns the serial byte stream, serializes outgoing
//! frames, and fans fully-decoded payloads out to subscribers.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::framing::{encode_frame, FrameDecoder};

/// Tuning knobs for a [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Size of the scratch buffer each stream read fills. Chunked reads
    /// keep the syscall count down; at 115200 baud a byte lands roughly
    /// every 87 microseconds.
    pub read_chunk_size: usize,
    /// Upper bound on writing one frame; `None` waits indefinitely.
    pub write_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            read_chunk_size: 1024,
            write_timeout: None,
        }
    }
}

struct Registry {
    /// Subscribers in registration order. Mutated only under the lock;
    /// delivery snapshots the senders first.
    subscribers: StdMutex<Vec<(u64, mpsc::UnboundedSender<Bytes>)>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// Owns a duplex byte stream carrying framed payloads.
///
/// A background reader task accumulates incoming bytes, extracts complete
/// frames and delivers each decoded payload to every [`Subscription`] in
/// registration order. Outgoing writes are serialized by a single-permit
/// lock so no two frames interleave on the wire.
///
/// The transport is created once per serial device. A read error or end of
/// input is fatal: the reader exits, every subscription drains to `None`,
/// and subsequent [`Transport::send`] calls fail with
/// [`Error::TransportClosed`].
pub struct Transport {
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    write_timeout: Option<Duration>,
    registry: Arc<Registry>,
    reader: JoinHandle<()>,
}

impl Transport {
    /// Wraps any duplex byte stream and starts the reader task.
    ///
    /// Must be called from within a tokio runtime. Feeding an in-memory
    /// pipe (for example [`tokio::io::duplex`]) exercises the exact
    /// accumulate-and-extract path used against a physical port.
    pub fn from_stream<S>(stream: S) -> Transport
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Transport::from_stream_with(stream, TransportConfig::default())
    }

    /// [`from_stream`](Transport::from_stream) with explicit tuning.
    pub fn from_stream_with<S>(stream: S, config: TransportConfig) -> Transport
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let registry = Arc::new(Registry {
            subscribers: StdMutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });
        let reader = tokio::spawn(read_loop(
            read_half,
            registry.clone(),
            config.read_chunk_size.max(1),
        ));
        Transport {
            writer: tokio::sync::Mutex::new(Box::new(write_half)),
            write_timeout: config.write_timeout,
            registry,
            reader,
        }
    }

    /// Encodes `payload` and writes the frame atomically.
    pub async fn send(&self, payload: &[u8]) -> Result<()> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }
        let frame = encode_frame(payload);
        let mut writer = self.writer.lock().await;
        let write = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        };
        match self.write_timeout {
            Some(limit) => tokio::time::timeout(limit, write)
                .await
                .map_err(|_| io::Error::from(io::ErrorKind::TimedOut))??,
            None => write.await?,
        }
        Ok(())
    }

    /// Registers a consumer of decoded payloads.
    ///
    /// Dropping the returned [`Subscription`] unregisters it. Subscribing
    /// on a closed transport yields a subscription that immediately drains
    /// to `None`.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut subscribers = self.registry.subscribers.lock().unwrap();
            if !self.registry.closed.load(Ordering::Acquire) {
                subscribers.push((id, tx));
            }
        }
        Subscription {
            id,
            rx,
            registry: self.registry.clone(),
        }
    }

    /// Whether the reader has terminated.
    pub fn is_closed(&self) -> bool {
        self.registry.closed.load(Ordering::Acquire)
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// A registered consumer of decoded payloads.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<Bytes>,
    registry: Arc<Registry>,
}

impl Subscription {
    /// Receives the next decoded payload, or `None` once the transport has
    /// closed and the backlog is drained.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry
            .subscribers
            .lock()
            .unwrap()
            .retain(|(id, _)| *id != self.id);
    }
}

async fn read_loop<R>(mut reader: R, registry: Arc<Registry>, chunk_size: usize)
where
    R: AsyncRead + Send + Unpin,
{
    let mut decoder = FrameDecoder::new();
    let mut scratch = vec![0u8; chunk_size];
    let mut acc = BytesMut::with_capacity(4 * chunk_size);
    loop {
        match reader.read(&mut scratch).await {
            Ok(0) => {
                log::debug!("byte stream reached end of input");
                break;
            }
            Ok(n) => {
                acc.extend_from_slice(&scratch[..n]);
                loop {
                    match decoder.decode(&mut acc) {
                        Ok(Some(payload)) => deliver(&registry, payload),
                        Ok(None) => break,
                        Err(e) => log::warn!("skipping malformed frame: {e}"),
                    }
                }
            }
            Err(e) => {
                log::error!("read failed, shutting the transport down: {e}");
                break;
            }
        }
    }
    // Closing under the subscriber lock keeps `subscribe` from racing the
    // shutdown; dropping the senders wakes every pending `recv`.
    let mut subscribers = registry.subscribers.lock().unwrap();
    registry.closed.store(true, Ordering::Release);
    subscribers.clear();
}

fn deliver(registry: &Registry, payload: Bytes) {
    let snapshot: Vec<mpsc::UnboundedSender<Bytes>> = registry
        .subscribers
        .lock()
        .unwrap()
        .iter()
        .map(|(_, tx)| tx.clone())
        .collect();
    for tx in snapshot {
        let _ = tx.send(payload.clone());
    }
}
