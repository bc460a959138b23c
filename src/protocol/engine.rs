//! The request/completion exchange.
//!
//! Every request is a single frame whose first octet is the opcode. The
//! module answers in one of two shapes, chosen by the module per request:
//!
//! - synchronous: one completion with handle 0,
//! - asynchronous: a 2-byte pending packet carrying a big-endian handle,
//!   followed later by a completion with that handle.
//!
//! A request subscribes to the transport before sending, then filters the
//! shared inbound traffic: the first pending packet it observes latches its
//! handle, and a completion is accepted when its handle matches the latch
//! or is 0.

use std::sync::Mutex as StdMutex;

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::protocol::{request, Command, Notification, Status};
use crate::transport::{Subscription, Transport};

#[derive(Default)]
struct NotifySlot {
    seq: u64,
    waiter: Option<(u64, oneshot::Sender<()>)>,
}

/// Handle to an RX22 module.
///
/// Cheap to share behind an `Arc`; every operation takes `&self`. Commands
/// run concurrently over the shared wire and are told apart by handle
/// correlation.
pub struct Gateway {
    transport: Transport,
    notify_slot: StdMutex<NotifySlot>,
}

impl Gateway {
    /// Drives the module over any duplex byte stream.
    ///
    /// Must be called from within a tokio runtime. This is also the
    /// simulation entry point: an in-memory pipe such as
    /// [`tokio::io::duplex`] runs the full production path without a port.
    pub fn from_stream<S>(stream: S) -> Gateway
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Gateway::new(Transport::from_stream(stream))
    }

    pub(crate) fn new(transport: Transport) -> Gateway {
        Gateway {
            transport,
            notify_slot: StdMutex::new(NotifySlot::default()),
        }
    }

    /// The underlying frame transport.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Sends a raw request and returns the completed payload, status byte
    /// unchecked. Firmware bring-up escape hatch; the typed surface is the
    /// supported API.
    pub async fn execute_raw(
        &self,
        command: Command,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let mut sub = self.transport.subscribe();
        if cancel.is_cancelled() {
            return Err(Error::Canceled);
        }
        self.transport.send(&request(command, payload)).await?;

        let mut expected = None;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Canceled),
                frame = sub.recv() => {
                    let Some(frame) = frame else { return Err(Error::TransportClosed) };
                    if let Some(done) = correlate(&frame, &mut expected) {
                        return Ok(done);
                    }
                }
            }
        }
    }

    /// Sends a request and returns the completion after checking its status.
    pub(crate) async fn execute(
        &self,
        command: Command,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        let completion = self.execute_raw(command, payload, cancel).await?;
        let status = Status::from_raw(completion[2])
            .ok_or(Error::MalformedResponse("status byte outside the known set"))?;
        if !status.is_success() {
            return Err(Error::Status(status));
        }
        Ok(completion)
    }

    /// Waits for the next notification from a remote device.
    ///
    /// The module allows at most one outstanding notification request, and
    /// so does this engine: issuing a new one first resolves the previous
    /// waiter with a minimal record carrying [`Status::Superseded`]. A
    /// 3-byte completion from the module (its own cancel/supersede signal)
    /// resolves the same way rather than as an error, so a dispatch loop
    /// can observe it and carry on.
    pub async fn receive_notification(&self, cancel: &CancellationToken) -> Result<Notification> {
        let mut sub = self.transport.subscribe();
        let (tx, mut displaced) = oneshot::channel();
        let token = {
            let mut slot = self.notify_slot.lock().unwrap();
            if let Some((_, prev)) = slot.waiter.take() {
                let _ = prev.send(());
            }
            slot.seq += 1;
            slot.waiter = Some((slot.seq, tx));
            slot.seq
        };

        let out = self.notification_exchange(&mut sub, &mut displaced, cancel).await;

        let mut slot = self.notify_slot.lock().unwrap();
        if matches!(slot.waiter, Some((t, _)) if t == token) {
            slot.waiter = None;
        }
        out
    }

    async fn notification_exchange(
        &self,
        sub: &mut Subscription,
        displaced: &mut oneshot::Receiver<()>,
        cancel: &CancellationToken,
    ) -> Result<Notification> {
        if cancel.is_cancelled() {
            return Err(Error::Canceled);
        }
        self.transport
            .send(&request(Command::ReceiveNotification, &[]))
            .await?;

        let mut expected = None;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Canceled),
                _ = &mut *displaced => return Ok(Notification::superseded()),
                frame = sub.recv() => {
                    let Some(frame) = frame else { return Err(Error::TransportClosed) };
                    if let Some(done) = correlate(&frame, &mut expected) {
                        return Notification::decode(&done);
                    }
                }
            }
        }
    }
}

/// Classifies one inbound payload against an in-flight request.
///
/// The latch is set-once: the first pending packet observed after our send
/// is ours, later ones belong to other requests. A handle-0 completion is
/// accepted unconditionally: the module issues at most one outstanding
/// synchronous reply, so there is nothing to route it by.
fn correlate(payload: &Bytes, expected: &mut Option<u16>) -> Option<Bytes> {
    match payload.len() {
        2 => {
            let handle = BigEndian::read_u16(payload);
            if expected.is_none() {
                *expected = Some(handle);
            }
            None
        }
        n if n >= 3 => {
            let handle = BigEndian::read_u16(&payload[..2]);
            if handle == 0 || *expected == Some(handle) {
                Some(payload.clone())
            } else {
                None
            }
        }
        n => {
            log::debug!("ignoring runt payload of {n} bytes");
            None
        }
    }
}
