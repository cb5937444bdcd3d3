//! 송신자 (서버측)
//!
//! - 파일을 고정 크기 세그먼트로 나눠 ACK 없이 한 번에 전송
//! - `RETRANS` 요청 시 해당 세그먼트만 파일에서 다시 읽어 재전송
//! - 요청/응답을 한 번에 하나씩 처리 (버스트 중 다른 요청은 소켓 큐에서 대기)

use std::io::{self, SeekFrom};
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tracing::{debug, error, info, warn};

use crate::message::{truncate, ErrorReply, Request};
use crate::segment::{self, Sequence};
use crate::session::SessionRegistry;
use crate::stats::TransferStats;
use crate::transport::Transport;
use crate::{Config, Result, MAX_DATAGRAM_SIZE};

/// `serve` 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// 버스트 전송 완료
    Streamed { segments: u64 },

    /// 파일 없음 (`ERROR 404` 응답)
    NotFound,

    /// 읽기 실패 등 (`ERROR 500` 응답)
    Failed,
}

/// `retransmit` 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetransmitOutcome {
    /// 세그먼트 재전송
    Resent { is_last: bool },

    /// 해당 주소의 세션 없음 (무시)
    NoSession,

    /// 파일 끝을 넘는 시퀀스 (무시)
    BeyondEof,

    /// GET 이후 파일이 사라짐 (무시)
    FileMissing,
}

/// 송신자
pub struct Sender<T> {
    /// 설정
    config: Config,

    /// 파일 루트 디렉터리
    root: PathBuf,

    /// 전송 계층
    transport: T,

    /// 주소별 세션
    sessions: SessionRegistry,

    /// 전송 통계
    stats: TransferStats,
}

impl<T: Transport> Sender<T> {
    /// 새 송신자 생성
    pub fn new(config: Config, root: impl Into<PathBuf>, transport: T) -> Self {
        Self {
            config,
            root: root.into(),
            transport,
            sessions: SessionRegistry::new(),
            stats: TransferStats::new(),
        }
    }

    /// 서버 루프 (종료하지 않음)
    pub async fn run(&mut self) -> Result<()> {
        let local_addr = self.transport.local_addr()?;
        info!("SRFP Sender started on {}", local_addr);

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            debug!("요청 대기 중...");
            match self.transport.recv_from(&mut buf).await {
                Ok((len, addr)) => {
                    if let Err(e) = self.handle_datagram(&buf[..len], addr).await {
                        warn!("메시지 처리 에러 ({}): {}", addr, e);
                    }
                }
                Err(e) => {
                    warn!("수신 에러: {}", e);
                }
            }
        }
    }

    /// 수신 데이터그램 처리
    pub async fn handle_datagram(&mut self, data: &[u8], addr: SocketAddr) -> Result<()> {
        match Request::parse(data) {
            Ok(Request::Get { filename }) => {
                self.serve(&filename, addr).await?;
            }
            Ok(Request::Retrans { sequence }) => {
                self.retransmit(addr, sequence).await?;
            }
            Err(e) => {
                warn!(
                    "{}에서 온 메시지 무시: {} ({:?})",
                    addr,
                    e,
                    truncate(&String::from_utf8_lossy(data), 100)
                );
            }
        }
        Ok(())
    }

    /// 파일 전체 버스트 전송
    pub async fn serve(&mut self, filename: &str, addr: SocketAddr) -> Result<ServeOutcome> {
        info!("클라이언트 {} 파일 요청: {}", addr, filename);

        let Some(path) = self.resolve(filename) else {
            warn!("허용되지 않는 경로: {}", filename);
            self.refuse(addr, ErrorReply::not_found()).await;
            return Ok(ServeOutcome::NotFound);
        };

        let mut file = match open_regular_file(&path).await {
            Ok(Some(file)) => file,
            Ok(None) => {
                error!("파일 {} 없음, {}에 에러 전송", filename, addr);
                self.refuse(addr, ErrorReply::not_found()).await;
                return Ok(ServeOutcome::NotFound);
            }
            Err(e) => {
                error!("{} 열기 실패: {}", filename, e);
                self.refuse_io(addr, &e).await;
                return Ok(ServeOutcome::Failed);
            }
        };

        let file_size = match file.metadata().await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                error!("{} 메타데이터 읽기 실패: {}", filename, e);
                self.refuse_io(addr, &e).await;
                return Ok(ServeOutcome::Failed);
            }
        };
        let payload_size = self.config.payload_size;
        let total_segments = segment::segment_count(file_size, payload_size);

        if total_segments > u64::from(Sequence::MAX) + 1 {
            error!("파일 {} 너무 큼: {} bytes", filename, file_size);
            self.refuse(addr, ErrorReply::internal("File Too Large")).await;
            return Ok(ServeOutcome::Failed);
        }

        if let Some(previous) = self.sessions.register(addr, filename) {
            debug!("{} 세션 교체: {} -> {}", addr, previous, filename);
        }

        if file_size == 0 {
            warn!("파일 {} 비어 있음, 빈 세그먼트 하나 전송", filename);
            self.send_segment(addr, 0, &[], true).await;
            return Ok(ServeOutcome::Streamed { segments: 1 });
        }

        info!(
            "{} ({} bytes, {} segments) 전송 시작 -> {}",
            filename, file_size, total_segments, addr
        );

        let mut chunk = vec![0u8; payload_size];
        let mut offset = 0u64;
        let mut sequence: Sequence = 0;
        let mut sent = 0u64;
        let mut last_sent = false;

        loop {
            let len = match read_chunk(&mut file, &mut chunk).await {
                Ok(len) => len,
                Err(e) => {
                    error!("{} 읽기 에러 (offset {}): {}", filename, offset, e);
                    self.refuse_io(addr, &e).await;
                    return Ok(ServeOutcome::Failed);
                }
            };
            if len == 0 {
                break;
            }

            offset += len as u64;
            let is_last = offset == file_size;

            self.send_segment(addr, sequence, &chunk[..len], is_last).await;
            sent += 1;

            if is_last {
                last_sent = true;
                break;
            }

            // 파일이 전송 중에 커진 경우
            let Some(next) = sequence.checked_add(1) else {
                break;
            };
            sequence = next;

            if self.config.send_interval_us > 0 {
                tokio::time::sleep(self.config.send_interval()).await;
            }
        }

        if !last_sent {
            warn!("{} 전송 중 크기가 바뀜: LAST 세그먼트 없이 종료", filename);
        }

        info!("{} -> {} 전송 완료 ({} segments)", filename, addr, sent);
        Ok(ServeOutcome::Streamed { segments: sent })
    }

    /// 세그먼트 하나 재전송
    ///
    /// LAST 여부는 현재 파일 크기로 다시 계산한다.
    /// GET 이후 파일이 바뀌면 세그먼트 경계가 어긋날 수 있다.
    pub async fn retransmit(
        &mut self,
        addr: SocketAddr,
        sequence: Sequence,
    ) -> Result<RetransmitOutcome> {
        let Some(filename) = self.sessions.lookup(&addr).map(str::to_owned) else {
            warn!("{}에서 RETRANS 수신, 등록된 전송 없음", addr);
            return Ok(RetransmitOutcome::NoSession);
        };

        debug!("{} 재전송 요청: {} segment {}", addr, filename, sequence);

        let mut file = match self.resolve(&filename) {
            Some(path) => match open_regular_file(&path).await? {
                Some(file) => file,
                None => {
                    error!("재전송할 파일 {} 없음", filename);
                    return Ok(RetransmitOutcome::FileMissing);
                }
            },
            None => return Ok(RetransmitOutcome::FileMissing),
        };

        let payload_size = self.config.payload_size;
        let file_size = file.metadata().await?.len();
        let total_segments = file_size.div_ceil(payload_size.max(1) as u64);
        let offset = u64::from(sequence) * payload_size as u64;

        file.seek(SeekFrom::Start(offset)).await?;
        let mut chunk = vec![0u8; payload_size];
        let len = read_chunk(&mut file, &mut chunk).await?;

        if len == 0 {
            warn!(
                "segment {} 재전송 요청이 파일 {} 끝을 넘음",
                sequence, filename
            );
            return Ok(RetransmitOutcome::BeyondEof);
        }

        let is_last = u64::from(sequence) + 1 == total_segments;
        info!("segment {} 재전송 -> {}", sequence, addr);
        if self.send_segment(addr, sequence, &chunk[..len], is_last).await {
            self.stats.retransmitted_segments += 1;
        }

        Ok(RetransmitOutcome::Resent { is_last })
    }

    /// 세그먼트 인코딩 후 전송
    ///
    /// 전송 실패는 기록만 하고 계속 진행한다.
    async fn send_segment(
        &mut self,
        addr: SocketAddr,
        sequence: Sequence,
        payload: &[u8],
        is_last: bool,
    ) -> bool {
        let bytes = segment::encode(sequence, payload, is_last);
        match self.transport.send_to(&bytes, addr).await {
            Ok(_) => {
                self.stats.segments_sent += 1;
                self.stats.total_bytes += payload.len() as u64;
                true
            }
            Err(e) => {
                self.stats.send_failures += 1;
                error!("segment {} 전송 실패 ({}): {}", sequence, addr, e);
                false
            }
        }
    }

    /// 에러 응답 전송 후 세션 제거
    async fn refuse(&mut self, addr: SocketAddr, reply: ErrorReply) {
        self.sessions.remove(&addr);
        if let Err(e) = self.transport.send_to(&reply.to_bytes(), addr).await {
            self.stats.send_failures += 1;
            error!("에러 응답 전송 실패 ({}): {}", addr, e);
        }
    }

    /// `ERROR 500 Server IO Error: <e>` 전송 후 세션 제거
    async fn refuse_io(&mut self, addr: SocketAddr, e: &io::Error) {
        self.refuse(addr, ErrorReply::internal(format!("Server IO Error: {e}")))
            .await;
    }

    /// 요청 파일명을 루트 아래 경로로 변환
    ///
    /// 절대 경로나 `..`가 들어간 이름은 거부한다.
    fn resolve(&self, filename: &str) -> Option<PathBuf> {
        let relative = Path::new(filename);
        let allowed = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

        allowed.then(|| self.root.join(relative))
    }

    /// 세션 테이블
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// 통계 반환
    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.transport.local_addr()
    }
}

/// 일반 파일 열기 (없거나 디렉터리면 `None`)
async fn open_regular_file(path: &Path) -> io::Result<Option<File>> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    if file.metadata().await?.is_file() {
        Ok(Some(file))
    } else {
        Ok(None)
    }
}

/// 버퍼가 찰 때까지 (또는 EOF까지) 읽기
async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
