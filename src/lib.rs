/*!
Host-side driver for the EasyWave RX22 bidirectional radio gateway.

The RX22 is attached over a serial line (115200 baud, 8-N-1). This crate
owns that byte stream, frames and unframes the octet protocol, runs the
request/completion exchange against the module, and exposes a typed command
surface (filters, join/remove, state, learn, transmit) plus an asynchronous
notification dispatcher for traffic originated by remote devices.

# Example
```no_run
use std::sync::Arc;
use easywave_rx22::{Dispatcher, GatewayBuilder};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let gateway = Arc::new(GatewayBuilder::new().path("/dev/ttyUSB0").open()?);
    let cancel = CancellationToken::new();

    let (dispatcher, mut events) = Dispatcher::new(gateway.clone());
    tokio::spawn({
        let cancel = cancel.clone();
        async move { dispatcher.run(&cancel).await }
    });

    while let Some(event) = events.recv().await {
        println!("{event:?}");
    }
    Ok(())
}
```

The gateway can also be driven over any duplex byte stream (a PTY, a
socket, or an in-memory pipe for tests) via [`Gateway::from_stream`]:

```no_run
let (host, _peer) = tokio::io::duplex(4096);
let gateway = easywave_rx22::Gateway::from_stream(host);
# let _ = gateway;
```
*/

#[cfg(feature = "serial")]
mod builder;
mod dispatch;
mod error;
pub mod framing;
mod gpio;
mod protocol;
mod transport;

#[cfg(feature = "serial")]
pub use builder::{GatewayBuilder, DEFAULT_BAUD_RATE};
pub use dispatch::{Dispatcher, Event, LearnPhase};
pub use error::{Error, Result};
pub use gpio::{pulse_reset, ResetControl};
pub use protocol::{
    function_byte, split_function_byte, Button, Command, Function, Gateway, InfoType,
    JoinedDevice, Notification, StateReport, Status, NOTIFICATION_LEN,
};
pub use transport::{Subscription, Transport, TransportConfig};

/// Length of a device serial, in octets.
pub const SERIAL_LEN: usize = 16;
/// Length of a device state vector, in octets.
pub const STATE_LEN: usize = 4;
