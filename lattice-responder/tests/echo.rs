use lattice_core::wire::{Packet, PACKET_LEN};
use lattice_responder::Responder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Notify;

const SECRET: &[u8] = b"0123456789abcdef";

async fn spawn_responder() -> (SocketAddr, Arc<Notify>, tokio::task::JoinHandle<()>) {
    let addr: SocketAddr = "127.0.0.1:0".parse().expect("addr");
    let mut responder = Responder::bind(addr, SECRET.to_vec())
        .await
        .expect("bind");
    let local = responder.local_addr().expect("local addr");
    let stop = Arc::new(Notify::new());
    let stop_clone = stop.clone();
    let handle = tokio::spawn(async move {
        let _ = responder.run_until(stop_clone).await;
    });
    (local, stop, handle)
}

#[tokio::test]
async fn echo_idempotence_reply_equals_request() {
    let (server_addr, stop, handle) = spawn_responder().await;
    let client = UdpSocket::bind("127.0.0.1:0").await.expect("bind client");

    let pkt = Packet::new_probe(0, 111, 222);
    let bytes = pkt.encode(SECRET);
    client.send_to(&bytes, server_addr).await.expect("send");

    let mut buf = [0u8; PACKET_LEN];
    let (n, _from) = tokio::time::timeout(Duration::from_millis(500), client.recv_from(&mut buf))
        .await
        .expect("no timeout")
        .expect("recv");
    assert_eq!(n, PACKET_LEN);
    assert_eq!(&buf[..n], &bytes[..]);

    stop.notify_one();
    let _ = handle.await;
}

#[tokio::test]
async fn reflector_rejection_zero_tag_gets_no_reply() {
    let (server_addr, stop, handle) = spawn_responder().await;
    let client = UdpSocket::bind("127.0.0.1:0").await.expect("bind client");

    let mut bytes = Packet::new_probe(0, 1, 1).encode(SECRET);
    bytes[28..32].copy_from_slice(&[0, 0, 0, 0]);
    client.send_to(&bytes, server_addr).await.expect("send");

    let mut buf = [0u8; PACKET_LEN];
    let result = tokio::time::timeout(Duration::from_millis(200), client.recv_from(&mut buf)).await;
    assert!(result.is_err(), "expected no reply, got {result:?}");

    stop.notify_one();
    let _ = handle.await;
}

#[tokio::test]
async fn happy_burst_of_five_samples() {
    let (server_addr, stop, handle) = spawn_responder().await;
    let client = UdpSocket::bind("127.0.0.1:0").await.expect("bind client");

    for seq in 0..5u32 {
        let bytes = Packet::new_probe(seq, seq as u64 * 1000, seq as u64).encode(SECRET);
        client.send_to(&bytes, server_addr).await.expect("send");
        let mut buf = [0u8; PACKET_LEN];
        let (n, _) = tokio::time::timeout(Duration::from_millis(200), client.recv_from(&mut buf))
            .await
            .expect("no timeout")
            .expect("recv");
        assert_eq!(&buf[..n], &bytes[..]);
    }

    stop.notify_one();
    let _ = handle.await;
}
