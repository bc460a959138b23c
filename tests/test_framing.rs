//! Transport-level framing properties: arbitrary chunking of the byte
//! stream never changes what subscribers observe.

use std::time::Duration;

use bytes::Bytes;
use easywave_rx22::framing::{encode_frame, EOP, SOP};
use easywave_rx22::{Error, Subscription, Transport, TransportConfig};
use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::timeout;

fn pair() -> (Transport, DuplexStream) {
    let (host, device) = tokio::io::duplex(4096);
    (Transport::from_stream(host), device)
}

async fn recv_one(sub: &mut Subscription) -> Bytes {
    timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("no payload within 2s")
        .expect("transport closed")
}

#[tokio::test]
async fn any_partition_yields_the_same_payloads() {
    let mut rng = rand::rng();
    let mut payloads: Vec<Vec<u8>> = vec![
        vec![0x01, 0x02, 0x03],
        vec![],
        vec![0x81, 0x82, 0x80],
    ];
    for _ in 0..5 {
        let len = rng.random_range(0..48);
        payloads.push((0..len).map(|_| rng.random()).collect());
    }

    let mut wire = Vec::new();
    for p in &payloads {
        wire.extend_from_slice(&encode_frame(p));
    }

    let (transport, mut device) = pair();
    let mut sub = transport.subscribe();

    let writer = tokio::spawn(async move {
        let mut rest = &wire[..];
        while !rest.is_empty() {
            let n = { rand::rng().random_range(1..=rest.len().min(7)) };
            device.write_all(&rest[..n]).await.unwrap();
            rest = &rest[n..];
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        device
    });

    for expected in &payloads {
        assert_eq!(&recv_one(&mut sub).await[..], &expected[..]);
    }
    writer.await.unwrap();
}

#[tokio::test]
async fn partial_frame_is_withheld_until_complete() {
    let (transport, mut device) = pair();
    let mut sub = transport.subscribe();

    let frame = encode_frame(&[0x10, 0x20, 0x30]);
    device.write_all(&frame[..3]).await.unwrap();
    assert!(timeout(Duration::from_millis(100), sub.recv()).await.is_err());

    device.write_all(&frame[3..]).await.unwrap();
    assert_eq!(&recv_one(&mut sub).await[..], &[0x10, 0x20, 0x30]);
}

#[tokio::test]
async fn noise_before_first_sop_is_discarded() {
    let (transport, mut device) = pair();
    let mut sub = transport.subscribe();

    device.write_all(&[0x55, 0x00, 0x7f]).await.unwrap();
    device.write_all(&encode_frame(&[0x42])).await.unwrap();
    assert_eq!(&recv_one(&mut sub).await[..], &[0x42]);
}

#[tokio::test]
async fn malformed_frame_is_skipped() {
    let (transport, mut device) = pair();
    let mut sub = transport.subscribe();

    // 0x80 followed by a byte above 0x02 is an invalid escape
    device.write_all(&[SOP, 0x80, 0x55, EOP]).await.unwrap();
    device.write_all(&encode_frame(&[0x09])).await.unwrap();
    assert_eq!(&recv_one(&mut sub).await[..], &[0x09]);
}

#[tokio::test]
async fn empty_payload_is_delivered() {
    let (transport, mut device) = pair();
    let mut sub = transport.subscribe();

    device.write_all(&[SOP, EOP]).await.unwrap();
    assert!(recv_one(&mut sub).await.is_empty());
}

#[tokio::test]
async fn listeners_observe_registration_order() {
    let (transport, mut device) = pair();
    let mut first = transport.subscribe();
    let mut second = transport.subscribe();

    device.write_all(&encode_frame(&[0x11])).await.unwrap();
    assert_eq!(&recv_one(&mut first).await[..], &[0x11]);
    assert_eq!(&recv_one(&mut second).await[..], &[0x11]);

    drop(second);
    device.write_all(&encode_frame(&[0x22])).await.unwrap();
    assert_eq!(&recv_one(&mut first).await[..], &[0x22]);
}

#[tokio::test]
async fn outbound_frames_are_stuffed() {
    let (transport, mut device) = pair();
    transport.send(&[0x81, 0x82, 0x80]).await.unwrap();

    let mut buf = [0u8; 16];
    let n = device.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], &[0x81, 0x80, 0x01, 0x80, 0x02, 0x80, 0x00, 0x82]);
}

#[tokio::test]
async fn peer_close_shuts_the_transport_down() {
    let (transport, device) = pair();
    let mut sub = transport.subscribe();
    drop(device);

    assert!(timeout(Duration::from_secs(2), sub.recv()).await.unwrap().is_none());
    assert!(transport.is_closed());
    assert!(matches!(transport.send(&[0x01]).await, Err(Error::TransportClosed)));

    // a late subscription drains immediately
    let mut late = transport.subscribe();
    assert!(late.recv().await.is_none());
}

#[tokio::test]
async fn write_timeout_surfaces_as_an_error() {
    // tiny pipe, nobody reading: the frame cannot drain
    let (host, _device) = tokio::io::duplex(16);
    let transport = Transport::from_stream_with(
        host,
        TransportConfig {
            write_timeout: Some(Duration::from_millis(50)),
            ..TransportConfig::default()
        },
    );

    let payload = vec![0x01; 256];
    assert!(matches!(
        transport.send(&payload).await,
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::TimedOut
    ));
}
