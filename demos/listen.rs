use std::sync::Arc;

use easywave_rx22::{Dispatcher, GatewayBuilder};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let gateway = Arc::new(GatewayBuilder::new().path(path).open()?);

    let cancel = CancellationToken::new();
    let (dispatcher, mut events) = Dispatcher::new(gateway);
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move { dispatcher.run(&cancel).await }
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Quit...");
                cancel.cancel();
                break;
            }
            event = events.recv() => {
                match event {
                    Some(event) => println!("{event:?}"),
                    None => break,
                }
            }
        }
    }
    run.await??;
    Ok(())
}
