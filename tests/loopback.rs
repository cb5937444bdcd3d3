//! UDP 루프백 통합 테스트

use std::net::SocketAddr;

use srfp::{Config, Error, LossyTransport, Phase, Receiver, Sender, UdpTransport};

fn fast_config() -> Config {
    Config {
        payload_size: 512,
        send_interval_us: 0,
        streaming_timeout_ms: 500,
        repair_window_ms: 200,
        repair_interval_us: 0,
        max_retries: 10,
        loss_probability: 0.0,
    }
}

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

/// 임시 디렉터리를 루트로 하는 서버 실행
async fn spawn_server(root: &std::path::Path) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let transport = UdpTransport::bind(loopback()).await.unwrap();
    let mut sender = Sender::new(fast_config(), root, transport);
    let addr = sender.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let _ = sender.run().await;
    });
    (addr, handle)
}

#[tokio::test]
async fn test_download_over_udp() {
    let dir = tempfile::tempdir().unwrap();
    let data: Vec<u8> = (0..15_000u32).map(|i| (i * 7 % 256) as u8).collect();
    std::fs::write(dir.path().join("data.bin"), &data).unwrap();

    let (server_addr, server) = spawn_server(dir.path()).await;

    let transport = UdpTransport::bind(loopback()).await.unwrap();
    let mut receiver = Receiver::new(fast_config(), transport, server_addr);
    let received = receiver.download("data.bin").await.unwrap();

    assert_eq!(received.as_ref(), data.as_slice());
    assert_eq!(receiver.phase(), Phase::Complete);

    server.abort();
}

#[tokio::test]
async fn test_download_with_simulated_loss() {
    let dir = tempfile::tempdir().unwrap();
    let data: Vec<u8> = (0..15_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(dir.path().join("lossy.bin"), &data).unwrap();

    let (server_addr, server) = spawn_server(dir.path()).await;

    let socket = UdpTransport::bind(loopback()).await.unwrap();
    let transport = LossyTransport::with_seed(socket, 0.2, 42);
    let mut receiver = Receiver::new(fast_config(), transport, server_addr);

    let output = dir.path().join("out.bin");
    let written = receiver.download_to("lossy.bin", &output).await.unwrap();

    assert_eq!(written, data.len() as u64);
    assert_eq!(std::fs::read(&output).unwrap(), data);
    assert!(receiver.transport().dropped() > 0);
    assert!(receiver.stats().repair_rounds >= 1);

    server.abort();
}

#[tokio::test]
async fn test_missing_file_reports_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (server_addr, server) = spawn_server(dir.path()).await;

    let transport = UdpTransport::bind(loopback()).await.unwrap();
    let mut receiver = Receiver::new(fast_config(), transport, server_addr);
    let result = receiver.download("absent.txt").await;

    match result {
        Err(Error::Remote { code, reason }) => {
            assert_eq!(code, 404);
            assert_eq!(reason, "File Not Found");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(receiver.phase(), Phase::Failed);

    server.abort();
}
