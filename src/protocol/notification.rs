use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::protocol::Status;

/// Wire length of a full notification completion.
pub const NOTIFICATION_LEN: usize = 28;

/// Info-type byte of a notification, a closed set.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoType {
    Release = 0x00,
    PushAndHold = 0x01,
    Sensor = 0x02,
    StateChange = 0x03,
    LearnStart = 0x40,
    LearnComplete = 0x41,
    LearnFail = 0x42,
}

impl InfoType {
    pub fn from_raw(raw: u8) -> Option<InfoType> {
        Some(match raw {
            0x00 => InfoType::Release,
            0x01 => InfoType::PushAndHold,
            0x02 => InfoType::Sensor,
            0x03 => InfoType::StateChange,
            0x40 => InfoType::LearnStart,
            0x41 => InfoType::LearnComplete,
            0x42 => InfoType::LearnFail,
            _ => return None,
        })
    }
}

/// One notification from a remote device.
///
/// A full record carries a 16-byte serial and 8 additional octets. A
/// canceled or superseded request resolves with a minimal record instead:
/// the status tells the story and `serial`/`additional` are empty.
#[derive(Debug, Clone)]
pub struct Notification {
    pub handle: u16,
    pub status: Status,
    /// Raw info-type byte; see [`Notification::info`].
    pub info_type: u8,
    pub serial: Bytes,
    pub additional: Bytes,
}

impl Notification {
    /// Decodes a completed notification payload.
    ///
    /// Accepts the 3-byte canceled/superseded form and the full
    /// [`NOTIFICATION_LEN`]-byte form; anything else is malformed.
    pub(crate) fn decode(payload: &[u8]) -> Result<Notification> {
        let handle = BigEndian::read_u16(&payload[..2]);
        let status = Status::from_raw(payload[2])
            .ok_or(Error::MalformedResponse("status byte outside the known set"))?;
        match payload.len() {
            3 => Ok(Notification {
                handle,
                status,
                info_type: 0,
                serial: Bytes::new(),
                additional: Bytes::new(),
            }),
            NOTIFICATION_LEN => Ok(Notification {
                handle,
                status,
                info_type: payload[3],
                serial: Bytes::copy_from_slice(&payload[4..20]),
                additional: Bytes::copy_from_slice(&payload[20..28]),
            }),
            _ => Err(Error::MalformedResponse("notification has an impossible length")),
        }
    }

    /// The locally synthesized record a displaced notification request
    /// resolves with.
    pub(crate) fn superseded() -> Notification {
        Notification {
            handle: 0,
            status: Status::Superseded,
            info_type: 0,
            serial: Bytes::new(),
            additional: Bytes::new(),
        }
    }

    /// The info-type, when it is in the known set.
    pub fn info(&self) -> Option<InfoType> {
        InfoType::from_raw(self.info_type)
    }
}
