//! 데이터그램 전송 계층
//!
//! - `Transport`: 송수신 추상화 (소켓 없이 테스트 가능)
//! - `UdpTransport`: tokio UDP 소켓 구현
//! - `LossyTransport`: 수신 손실 시뮬레이션 래퍼

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::debug;

/// 데이터그램 전송 추상화
#[async_trait]
pub trait Transport: Send + Sync {
    /// 데이터그램 하나 전송
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;

    /// 데이터그램 하나 수신 (무기한 대기)
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// 로컬 주소
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// 기한까지 데이터그램 수신
    ///
    /// 기한이 지나면 `Ok(None)`.
    async fn recv_until(
        &self,
        buf: &mut [u8],
        deadline: Instant,
    ) -> io::Result<Option<(usize, SocketAddr)>> {
        match tokio::time::timeout_at(deadline, self.recv_from(buf)).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }
}

/// tokio UDP 소켓 기반 전송
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// 주소에 바인딩
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

/// 수신 데이터그램을 확률적으로 버리는 래퍼
pub struct LossyTransport<T> {
    inner: T,
    loss_probability: f64,
    rng: Mutex<StdRng>,
    dropped: Mutex<u64>,
}

impl<T: Transport> LossyTransport<T> {
    pub fn new(inner: T, loss_probability: f64) -> Self {
        Self::with_rng(inner, loss_probability, StdRng::from_entropy())
    }

    /// 재현 가능한 손실 패턴용 (테스트)
    pub fn with_seed(inner: T, loss_probability: f64, seed: u64) -> Self {
        Self::with_rng(inner, loss_probability, StdRng::seed_from_u64(seed))
    }

    fn with_rng(inner: T, loss_probability: f64, rng: StdRng) -> Self {
        Self {
            inner,
            loss_probability: loss_probability.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
            dropped: Mutex::new(0),
        }
    }

    /// 버린 데이터그램 수
    pub fn dropped(&self) -> u64 {
        *self.dropped.lock()
    }

    fn should_drop(&self) -> bool {
        self.loss_probability > 0.0 && self.rng.lock().gen_bool(self.loss_probability)
    }
}

#[async_trait]
impl<T: Transport> Transport for LossyTransport<T> {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.inner.send_to(buf, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        loop {
            let (len, addr) = self.inner.recv_from(buf).await?;
            if self.should_drop() {
                *self.dropped.lock() += 1;
                debug!("손실 시뮬레이션: {} bytes from {} 버림", len, addr);
                continue;
            }
            return Ok((len, addr));
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

/// 테스트용 메모리 네트워크
#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashMap;
    use std::io;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    use super::Transport;

    type Datagram = (Vec<u8>, SocketAddr);

    /// 주소별 수신함을 가진 가상 네트워크
    #[derive(Clone, Default)]
    pub(crate) struct MemoryNetwork {
        inboxes: Arc<Mutex<HashMap<SocketAddr, mpsc::UnboundedSender<Datagram>>>>,
    }

    impl MemoryNetwork {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// 주소에 엔드포인트 생성
        pub(crate) fn endpoint(&self, addr: &str) -> MemoryTransport {
            let addr: SocketAddr = addr.parse().expect("valid socket address");
            let (tx, rx) = mpsc::unbounded_channel();
            self.inboxes.lock().insert(addr, tx);
            MemoryTransport {
                addr,
                network: self.clone(),
                inbox: tokio::sync::Mutex::new(rx),
            }
        }
    }

    pub(crate) struct MemoryTransport {
        addr: SocketAddr,
        network: MemoryNetwork,
        inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
    }

    impl MemoryTransport {
        pub(crate) fn addr(&self) -> SocketAddr {
            self.addr
        }

        /// 대기 중인 데이터그램 모두 꺼내기
        pub(crate) fn drain(&self) -> Vec<Datagram> {
            let mut inbox = self.inbox.try_lock().expect("inbox not in use");
            let mut out = Vec::new();
            while let Ok(datagram) = inbox.try_recv() {
                out.push(datagram);
            }
            out
        }
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
            // 받는 쪽이 없으면 UDP처럼 조용히 사라짐
            if let Some(tx) = self.network.inboxes.lock().get(&target) {
                let _ = tx.send((buf.to_vec(), self.addr));
            }
            Ok(buf.len())
        }

        async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            let mut inbox = self.inbox.lock().await;
            let (data, from) = inbox
                .recv()
                .await
                .ok_or_else(|| io::Error::from(io::ErrorKind::ConnectionAborted))?;
            let len = data.len().min(buf.len());
            buf[..len].copy_from_slice(&data[..len]);
            Ok((len, from))
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            Ok(self.addr)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::memory::MemoryNetwork;
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_recv_until_deadline() {
        let net = MemoryNetwork::new();
        let a = net.endpoint("10.0.0.1:1000");

        let mut buf = [0u8; 16];
        let deadline = Instant::now() + Duration::from_millis(200);
        let result = a.recv_until(&mut buf, deadline).await.unwrap();
        assert!(result.is_none());
        assert!(Instant::now() >= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_until_delivers() {
        let net = MemoryNetwork::new();
        let a = net.endpoint("10.0.0.1:1000");
        let b = net.endpoint("10.0.0.2:2000");

        b.send_to(b"ping", a.addr()).await.unwrap();

        let mut buf = [0u8; 16];
        let deadline = Instant::now() + Duration::from_secs(1);
        let (len, from) = a.recv_until(&mut buf, deadline).await.unwrap().unwrap();
        assert_eq!(&buf[..len], b"ping");
        assert_eq!(from, b.addr());
    }

    #[tokio::test]
    async fn test_lossy_drops_everything() {
        let net = MemoryNetwork::new();
        let lossy = LossyTransport::with_seed(net.endpoint("10.0.0.1:1000"), 1.0, 7);
        let peer = net.endpoint("10.0.0.2:2000");

        for _ in 0..5 {
            peer.send_to(b"x", "10.0.0.1:1000".parse().unwrap())
                .await
                .unwrap();
        }

        let mut buf = [0u8; 4];
        let deadline = Instant::now() + Duration::from_millis(50);
        assert!(lossy.recv_until(&mut buf, deadline).await.unwrap().is_none());
        assert_eq!(lossy.dropped(), 5);
    }

    #[tokio::test]
    async fn test_lossy_zero_probability_passes_through() {
        let net = MemoryNetwork::new();
        let lossy = LossyTransport::with_seed(net.endpoint("10.0.0.1:1000"), 0.0, 7);
        let peer = net.endpoint("10.0.0.2:2000");

        peer.send_to(b"data", lossy.local_addr().unwrap())
            .await
            .unwrap();

        let mut buf = [0u8; 8];
        let (len, _) = lossy.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"data");
        assert_eq!(lossy.dropped(), 0);
    }

    #[tokio::test]
    async fn test_udp_loopback() {
        let a = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

        a.send_to(b"hello", b.local_addr().unwrap()).await.unwrap();

        let mut buf = [0u8; 16];
        let deadline = Instant::now() + Duration::from_secs(2);
        let (len, from) = b.recv_until(&mut buf, deadline).await.unwrap().unwrap();
        assert_eq!(&buf[..len], b"hello");
        assert_eq!(from, a.local_addr().unwrap());
    }
}
