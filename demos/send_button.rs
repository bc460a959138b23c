use std::time::Duration;

use easywave_rx22::{function_byte, Button, Function, GatewayBuilder};
use tokio_util::sync::CancellationToken;

fn parse_serial(hex: &str) -> Option<Vec<u8>> {
    if hex.len() != 32 {
        return None;
    }
    (0..16)
        .map(|i| u8::from_str_radix(&hex[2 * i..2 * i + 2], 16).ok())
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let serial = args
        .next()
        .and_then(|s| parse_serial(&s))
        .ok_or("usage: send_button <path> <32-hex-digit serial>")?;

    let gateway = GatewayBuilder::new().path(path).open()?;
    let cancel = CancellationToken::new();
    gateway
        .send_burst(
            &serial,
            function_byte(Button::A, Function::Default),
            5,
            Duration::from_millis(120),
            &cancel,
        )
        .await?;
    log::info!("burst sent");
    Ok(())
}
