//! Gateway builder: serial line configuration and the `open()` entry
//! point.
//!
//! The RX22 speaks 115200 baud, 8 data bits, no parity, 1 stop bit, no
//! flow control; only the path is mandatory:
//!
//! ```no_run
//! use easywave_rx22::GatewayBuilder;
//!
//! # fn main() -> Result<(), easywave_rx22::Error> {
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # let _guard = rt.enter();
//! let gateway = GatewayBuilder::new()
//!     .path("/dev/ttyUSB0")
//!     .open()?;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::time::Duration;

use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};

use crate::error::{Error, Result};
use crate::protocol::Gateway;
use crate::transport::{Transport, TransportConfig};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Configures and opens a [`Gateway`] on a serial device.
#[derive(Debug, Clone)]
pub struct GatewayBuilder {
    path: Option<String>,
    baud_rate: u32,
    transport: TransportConfig,
}

impl GatewayBuilder {
    pub fn new() -> GatewayBuilder {
        GatewayBuilder {
            path: None,
            baud_rate: DEFAULT_BAUD_RATE,
            transport: TransportConfig::default(),
        }
    }

    /// Serial device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Size of the scratch buffer each serial read fills.
    pub fn read_chunk_size(mut self, read_chunk_size: usize) -> Self {
        self.transport.read_chunk_size = read_chunk_size;
        self
    }

    /// Upper bound on writing one frame; unbounded by default.
    pub fn write_timeout(mut self, write_timeout: Duration) -> Self {
        self.transport.write_timeout = Some(write_timeout);
        self
    }

    /// Opens the port (8-N-1, no flow control) and starts the gateway.
    ///
    /// Must be called from within a tokio runtime; the transport's reader
    /// task is spawned immediately.
    pub fn open(self) -> Result<Gateway> {
        let path = self
            .path
            .ok_or(Error::InvalidArgument("serial device path is required"))?;
        let stream = tokio_serial::new(path, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(io::Error::from)?;
        Ok(Gateway::new(Transport::from_stream_with(stream, self.transport)))
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        GatewayBuilder::new()
    }
}
