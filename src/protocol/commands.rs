//! Typed command surface: input validation, request marshalling and
//! completion decoding for every module operation.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::protocol::{Command, Gateway};
use crate::{SERIAL_LEN, STATE_LEN};

/// Result of a successful join.
#[derive(Debug, Clone)]
pub struct JoinedDevice {
    pub serial: Bytes,
    pub device_type: u8,
}

/// Result of a state query.
#[derive(Debug, Clone)]
pub struct StateReport {
    pub mode: u8,
    pub state: [u8; STATE_LEN],
}

impl Gateway {
    /// Looks up the serial of a paired far device (or transmitter) by
    /// table index.
    pub async fn remote_serial(&self, index: u16, cancel: &CancellationToken) -> Result<Bytes> {
        let mut payload = BytesMut::with_capacity(2);
        payload.put_u16(index);
        let completion = self.execute(Command::GetSerial, &payload, cancel).await?;
        trailing(&completion, SERIAL_LEN)?;
        Ok(completion.slice(3..3 + SERIAL_LEN))
    }

    /// Looks up the serial of a paired transmitter by table index.
    ///
    /// Same wire operation as [`remote_serial`](Gateway::remote_serial);
    /// the module serves both tables from one opcode.
    pub async fn transmitter_serial(
        &self,
        index: u16,
        cancel: &CancellationToken,
    ) -> Result<Bytes> {
        self.remote_serial(index, cancel).await
    }

    /// Admits `serial` through the receive filter.
    pub async fn add_filter(&self, serial: &[u8], cancel: &CancellationToken) -> Result<()> {
        check_serial(serial)?;
        self.execute(Command::AddFilter, serial, cancel).await?;
        Ok(())
    }

    /// Empties the receive filter.
    pub async fn clear_filter(&self, cancel: &CancellationToken) -> Result<()> {
        self.execute(Command::ClearFilter, &[], cancel).await?;
        Ok(())
    }

    /// Opens the network for a joining device, announcing `gateway_serial`.
    pub async fn join_device(
        &self,
        gateway_serial: &[u8],
        cancel: &CancellationToken,
    ) -> Result<JoinedDevice> {
        check_serial(gateway_serial)?;
        let completion = self.execute(Command::JoinDevice, gateway_serial, cancel).await?;
        trailing(&completion, SERIAL_LEN + 1)?;
        Ok(JoinedDevice {
            serial: completion.slice(3..3 + SERIAL_LEN),
            device_type: completion[3 + SERIAL_LEN],
        })
    }

    /// Removes `joined` from the network on behalf of `initial`.
    pub async fn remove_device(
        &self,
        initial: &[u8],
        joined: &[u8],
        cancel: &CancellationToken,
    ) -> Result<()> {
        check_serial(initial)?;
        check_serial(joined)?;
        let mut payload = BytesMut::with_capacity(2 * SERIAL_LEN);
        payload.extend_from_slice(initial);
        payload.extend_from_slice(joined);
        self.execute(Command::RemoveDevice, &payload, cancel).await?;
        Ok(())
    }

    /// Drives `joined` into `state` under `mode`.
    pub async fn change_state(
        &self,
        initial: &[u8],
        joined: &[u8],
        mode: u8,
        state: &[u8],
        cancel: &CancellationToken,
    ) -> Result<()> {
        check_serial(initial)?;
        check_serial(joined)?;
        check_state(state)?;
        let mut payload = BytesMut::with_capacity(2 * SERIAL_LEN + 1 + STATE_LEN);
        payload.extend_from_slice(initial);
        payload.extend_from_slice(joined);
        payload.put_u8(mode);
        payload.extend_from_slice(state);
        self.execute(Command::ChangeState, &payload, cancel).await?;
        Ok(())
    }

    /// Runs a learn operation on `joined`.
    pub async fn learn_control(
        &self,
        initial: &[u8],
        joined: &[u8],
        function: u8,
        mode: u8,
        state: &[u8],
        cancel: &CancellationToken,
    ) -> Result<()> {
        check_serial(initial)?;
        check_serial(joined)?;
        check_state(state)?;
        let mut payload = BytesMut::with_capacity(2 * SERIAL_LEN + 2 + STATE_LEN);
        payload.extend_from_slice(initial);
        payload.extend_from_slice(joined);
        payload.put_u8(function);
        payload.put_u8(mode);
        payload.extend_from_slice(state);
        self.execute(Command::LearnControl, &payload, cancel).await?;
        Ok(())
    }

    /// Reads back the state of `joined` under `mode`.
    pub async fn query_state(
        &self,
        initial: &[u8],
        joined: &[u8],
        mode: u8,
        cancel: &CancellationToken,
    ) -> Result<StateReport> {
        check_serial(initial)?;
        check_serial(joined)?;
        let mut payload = BytesMut::with_capacity(2 * SERIAL_LEN + 1);
        payload.extend_from_slice(initial);
        payload.extend_from_slice(joined);
        payload.put_u8(mode);
        let completion = self.execute(Command::QueryState, &payload, cancel).await?;
        trailing(&completion, 1 + STATE_LEN)?;
        let state: [u8; STATE_LEN] = completion[4..4 + STATE_LEN]
            .try_into()
            .map_err(|_| Error::MalformedResponse("state field"))?;
        Ok(StateReport {
            mode: completion[3],
            state,
        })
    }

    /// Transmits one command frame as the transmitter `serial`, carrying a
    /// packed [function byte](crate::function_byte).
    pub async fn send_command(
        &self,
        serial: &[u8],
        function: u8,
        cancel: &CancellationToken,
    ) -> Result<()> {
        check_serial(serial)?;
        let mut payload = BytesMut::with_capacity(SERIAL_LEN + 1);
        payload.extend_from_slice(serial);
        payload.put_u8(function);
        self.execute(Command::SendCommand, &payload, cancel).await?;
        Ok(())
    }

    /// Emits `count` command frames separated by `delay`.
    ///
    /// Cancellation between frames aborts the burst with
    /// [`Error::Canceled`]; the remaining frames are not sent.
    pub async fn send_burst(
        &self,
        serial: &[u8],
        function: u8,
        count: u32,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for i in 0..count {
            self.send_command(serial, function, cancel).await?;
            if i + 1 < count {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Canceled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
        Ok(())
    }

    /// Emits command frames every `interval` until `cancel` fires, then
    /// returns cleanly.
    pub async fn continuous_emit(
        &self,
        serial: &[u8],
        function: u8,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        loop {
            match self.send_command(serial, function, cancel).await {
                Ok(()) => {}
                Err(Error::Canceled) => return Ok(()),
                Err(e) => return Err(e),
            }
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// [`continuous_emit`](Gateway::continuous_emit) bounded by a deadline.
    ///
    /// The deadline is checked between frames so an expiring timer can
    /// never tear a frame on the wire.
    pub async fn send_for_duration(
        &self,
        serial: &[u8],
        function: u8,
        duration: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            match self.send_command(serial, function, cancel).await {
                Ok(()) => {}
                Err(Error::Canceled) => return Ok(()),
                Err(e) => return Err(e),
            }
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep_until(deadline) => return Ok(()),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}

fn check_serial(serial: &[u8]) -> Result<()> {
    if serial.len() != SERIAL_LEN {
        return Err(Error::InvalidArgument("serial must be exactly 16 bytes"));
    }
    Ok(())
}

fn check_state(state: &[u8]) -> Result<()> {
    if state.len() != STATE_LEN {
        return Err(Error::InvalidArgument("state must be exactly 4 bytes"));
    }
    Ok(())
}

/// Checks that a completion carries at least `len` octets after the status.
fn trailing(completion: &Bytes, len: usize) -> Result<()> {
    if completion.len() < 3 + len {
        return Err(Error::MalformedResponse("completion shorter than its payload"));
    }
    Ok(())
}
