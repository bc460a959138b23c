use bytes::{BufMut, BytesMut};

/// Request opcodes understood by the module.
///
/// `GetSerial` answers both far-device and transmitter serial queries; the
/// module distinguishes them by the paired-device table the index falls in.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Transmit a command frame on behalf of a paired transmitter.
    SendCommand = 0x02,
    JoinDevice = 0x04,
    RemoveDevice = 0x05,
    ClearFilter = 0x06,
    AddFilter = 0x07,
    ReceiveNotification = 0x08,
    ChangeState = 0x09,
    QueryState = 0x0A,
    LearnControl = 0x0B,
    GetSerial = 0x21,
}

impl Command {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Assembles a request payload: opcode first, arguments after.
pub(crate) fn request(command: Command, payload: &[u8]) -> BytesMut {
    let mut out = BytesMut::with_capacity(1 + payload.len());
    out.put_u8(command.code());
    out.extend_from_slice(payload);
    out
}
