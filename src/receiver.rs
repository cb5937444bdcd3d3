//! 수신자 (클라이언트측)
//!
//! 상태 전이: `Streaming → Repairing → {Complete, Failed}`
//!
//! - Streaming: 무활동 타임아웃까지 버스트 수신, LAST 플래그로 총 개수 확정
//! - Repairing: 누락 시퀀스마다 `RETRANS` 요청, 라운드 수 제한
//! - Complete: 시퀀스 순서로 페이로드 연결

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::path::Path;

use bytes::{Bytes, BytesMut};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::message::{ErrorReply, Request};
use crate::segment::{self, DecodeError, Segment, Sequence};
use crate::stats::TransferStats;
use crate::transport::Transport;
use crate::{Config, Error, Result, MAX_DATAGRAM_SIZE};

/// 총 개수 미확정 상태에서 한 세그먼트가 최고 시퀀스를 밀어 올릴 수 있는 최대 폭
///
/// 체크섬은 헤더를 덮지 않으므로 시퀀스가 손상된 세그먼트도 검증을 통과한다.
pub const MAX_SEQUENCE_GAP: Sequence = 1 << 16;

/// 예상 총 세그먼트 수
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedTotal {
    /// 아직 모름
    Unknown,

    /// LAST 없이 추정한 값 (최고 시퀀스 + 1)
    Provisional(u64),

    /// LAST 플래그로 확정된 값
    Confirmed(u64),
}

impl ExpectedTotal {
    pub fn value(&self) -> Option<u64> {
        match *self {
            ExpectedTotal::Unknown => None,
            ExpectedTotal::Provisional(n) | ExpectedTotal::Confirmed(n) => Some(n),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, ExpectedTotal::Confirmed(_))
    }
}

/// 수신 버퍼
///
/// 시퀀스별로 처음 도착한 유효 세그먼트만 저장하고 덮어쓰지 않는다.
#[derive(Debug)]
pub struct ReceptionBuffer {
    segments: BTreeMap<Sequence, Bytes>,
    highest_seen: Option<Sequence>,
    expected_total: ExpectedTotal,
}

impl ReceptionBuffer {
    pub fn new() -> Self {
        Self {
            segments: BTreeMap::new(),
            highest_seen: None,
            expected_total: ExpectedTotal::Unknown,
        }
    }

    /// 검증된 세그먼트 삽입
    ///
    /// 이미 있는 시퀀스면 `false` (중복).
    pub fn insert(&mut self, segment: Segment) -> bool {
        let sequence = segment.sequence;
        if self.segments.contains_key(&sequence) {
            return false;
        }

        self.highest_seen = Some(self.highest_seen.map_or(sequence, |h| h.max(sequence)));

        if segment.is_last() {
            self.expected_total = ExpectedTotal::Confirmed(u64::from(sequence) + 1);
        } else if let ExpectedTotal::Provisional(n) = self.expected_total {
            // 추정치 너머의 세그먼트: 파일이 더 길다
            let seen = u64::from(sequence) + 1;
            if seen > n {
                self.expected_total = ExpectedTotal::Provisional(seen);
            }
        }

        self.segments.insert(sequence, segment.payload);
        true
    }

    /// 시퀀스가 받아들일 만한 범위인지
    ///
    /// 총 개수가 확정되기 전에는 지금까지의 최고 시퀀스에서
    /// [`MAX_SEQUENCE_GAP`]을 넘게 건너뛰는 세그먼트를 거부한다.
    pub fn is_plausible(&self, sequence: Sequence) -> bool {
        match self.expected_total {
            ExpectedTotal::Confirmed(n) => u64::from(sequence) < n,
            _ => {
                let base = self.highest_seen.unwrap_or(0);
                sequence <= base.saturating_add(MAX_SEQUENCE_GAP)
            }
        }
    }

    /// LAST 없이 스트리밍이 끝났을 때 총 개수 추정
    pub fn settle_provisional(&mut self) -> ExpectedTotal {
        if let (ExpectedTotal::Unknown, Some(highest)) = (self.expected_total, self.highest_seen) {
            self.expected_total = ExpectedTotal::Provisional(u64::from(highest) + 1);
        }
        self.expected_total
    }

    /// 누락 시퀀스 목록 (오름차순)
    ///
    /// 추정 상태에서는 추정치 바로 다음 시퀀스를 탐색용으로 포함한다.
    /// 추정치 직전 세그먼트는 LAST가 아니었으므로 파일이 더 길다.
    pub fn missing(&self) -> Vec<Sequence> {
        let (total, probe) = match self.expected_total {
            ExpectedTotal::Unknown => return Vec::new(),
            ExpectedTotal::Provisional(n) => (n, Sequence::try_from(n).ok()),
            ExpectedTotal::Confirmed(n) => (n, None),
        };

        let mut missing: Vec<Sequence> = (0..total)
            .filter_map(|seq| Sequence::try_from(seq).ok())
            .filter(|seq| !self.segments.contains_key(seq))
            .collect();
        missing.extend(probe);
        missing
    }

    /// 확정 총 개수까지 모두 수신했는지
    pub fn is_complete(&self) -> bool {
        self.expected_total.is_confirmed() && self.missing().is_empty()
    }

    /// 시퀀스 순서로 페이로드 연결
    ///
    /// 누락이 있으면 내부 불변식 위반으로 에러를 반환한다.
    pub fn assemble(&self) -> Result<Bytes> {
        let ExpectedTotal::Confirmed(total) = self.expected_total else {
            return Err(Error::TotalUnknown);
        };

        let capacity: usize = self.segments.values().map(Bytes::len).sum();
        let mut out = BytesMut::with_capacity(capacity);

        for seq in 0..total {
            let sequence = Sequence::try_from(seq).map_err(|_| Error::TotalUnknown)?;
            let payload = self
                .segments
                .get(&sequence)
                .ok_or(Error::MissingSegment { sequence })?;
            out.extend_from_slice(payload);
        }

        Ok(out.freeze())
    }

    pub fn contains(&self, sequence: Sequence) -> bool {
        self.segments.contains_key(&sequence)
    }

    pub fn expected_total(&self) -> ExpectedTotal {
        self.expected_total
    }

    pub fn highest_seen(&self) -> Option<Sequence> {
        self.highest_seen
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Default for ReceptionBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// 수신 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Streaming,
    Repairing,
    Complete,
    Failed,
}

/// 서버에서 온 데이터그램 분류
#[derive(Debug)]
enum Inbound {
    /// 체크섬이 맞는 세그먼트
    Segment(Segment),

    /// 서버 에러 응답
    Refused(ErrorReply),

    /// 체크섬 불일치
    Corrupt(Segment),

    /// 헤더보다 짧음
    Malformed(DecodeError),
}

fn inspect(data: &[u8]) -> Inbound {
    if let Some(reply) = ErrorReply::parse(data) {
        return Inbound::Refused(reply);
    }

    match segment::decode(data) {
        Ok(segment) if segment.verify() => Inbound::Segment(segment),
        Ok(segment) => Inbound::Corrupt(segment),
        Err(e) => Inbound::Malformed(e),
    }
}

/// 수신자
pub struct Receiver<T> {
    /// 설정
    config: Config,

    /// 전송 계층
    transport: T,

    /// 서버 주소 (다른 주소의 데이터그램은 버림)
    server_addr: SocketAddr,

    /// 현재 상태
    phase: Phase,

    /// 수신 통계
    stats: TransferStats,

    /// 수신 버퍼
    buf: Vec<u8>,
}

impl<T: Transport> Receiver<T> {
    /// 새 수신자 생성
    pub fn new(config: Config, transport: T, server_addr: SocketAddr) -> Self {
        Self {
            config,
            transport,
            server_addr,
            phase: Phase::Idle,
            stats: TransferStats::new(),
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        }
    }

    /// 파일 다운로드
    pub async fn download(&mut self, filename: &str) -> Result<Bytes> {
        self.stats = TransferStats::new();
        self.phase = Phase::Streaming;

        info!("{}에 파일 요청: {}", self.server_addr, filename);
        let request = Request::Get {
            filename: filename.to_string(),
        };
        self.transport
            .send_to(&request.to_bytes(), self.server_addr)
            .await?;

        let mut buffer = ReceptionBuffer::new();
        match self.receive(&mut buffer).await {
            Ok(data) => {
                self.phase = Phase::Complete;
                info!("{} 수신 완료: {} bytes", filename, data.len());
                Ok(data)
            }
            Err(e) => {
                self.phase = Phase::Failed;
                error!("{} 수신 실패: {}", filename, e);
                Err(e)
            }
        }
    }

    /// 다운로드 후 파일로 저장
    pub async fn download_to(&mut self, filename: &str, output: &Path) -> Result<u64> {
        let data = self.download(filename).await?;
        tokio::fs::write(output, &data).await?;
        info!("{:?}에 저장", output);
        Ok(data.len() as u64)
    }

    async fn receive(&mut self, buffer: &mut ReceptionBuffer) -> Result<Bytes> {
        self.stream(buffer).await?;

        self.phase = Phase::Repairing;
        self.repair(buffer).await?;

        buffer.assemble()
    }

    /// Streaming 단계
    async fn stream(&mut self, buffer: &mut ReceptionBuffer) -> Result<()> {
        let timeout = self.config.streaming_timeout();
        let mut deadline = Instant::now() + timeout;

        loop {
            let Some((len, from)) = self.transport.recv_until(&mut self.buf, deadline).await?
            else {
                if buffer.is_empty() {
                    warn!("스트리밍 타임아웃: 수신한 세그먼트 없음");
                    return Err(Error::StreamingTimeout);
                }

                let total = buffer.settle_provisional();
                warn!(
                    "LAST 없이 스트리밍 타임아웃: {} segments 수신 (최고 {:?}), 추정 total {:?}",
                    buffer.len(),
                    buffer.highest_seen(),
                    total
                );
                return Ok(());
            };

            if from != self.server_addr {
                self.stats.foreign_datagrams += 1;
                debug!("예상하지 않은 주소 {}의 데이터그램 무시", from);
                continue;
            }
            deadline = Instant::now() + timeout;

            match inspect(&self.buf[..len]) {
                Inbound::Refused(reply) => {
                    error!("서버 에러: {} {}", reply.code, reply.reason);
                    return Err(reply.into());
                }
                Inbound::Malformed(e) => {
                    self.stats.malformed_datagrams += 1;
                    warn!("데이터그램 무시: {}", e);
                }
                Inbound::Corrupt(segment) => {
                    self.stats.corrupt_segments += 1;
                    warn!(
                        "segment {} 체크섬 불일치 (header {:04X}, actual {:04X}), 버림",
                        segment.sequence,
                        segment.checksum,
                        segment::checksum(&segment.payload)
                    );
                }
                Inbound::Segment(segment) => {
                    let sequence = segment.sequence;
                    let is_last = segment.is_last();

                    if !buffer.is_plausible(sequence) {
                        self.stats.corrupt_segments += 1;
                        warn!(
                            "segment {} 시퀀스 범위 밖 (최고 {:?}), 버림",
                            sequence,
                            buffer.highest_seen()
                        );
                        continue;
                    }

                    if self.store(buffer, segment) {
                        debug!("segment {} 수신", sequence);
                        if is_last {
                            info!(
                                "LAST segment {} 수신: total {} segments",
                                sequence,
                                u64::from(sequence) + 1
                            );
                            return Ok(());
                        }
                    } else {
                        debug!("segment {} 중복 (무시)", sequence);
                    }
                }
            }
        }
    }

    /// Repairing 단계
    async fn repair(&mut self, buffer: &mut ReceptionBuffer) -> Result<()> {
        let max_retries = self.config.max_retries;
        let mut rounds = 0u32;

        loop {
            let missing = buffer.missing();
            if missing.is_empty() {
                debug!("누락 없음 ({} rounds)", rounds);
                return Ok(());
            }

            if rounds >= max_retries {
                error!(
                    "{} rounds 후에도 {} segments 복구 실패: {:?}",
                    rounds,
                    missing.len(),
                    missing
                );
                return Err(Error::RepairBudgetExhausted { missing });
            }

            rounds += 1;
            self.stats.repair_rounds = rounds;
            info!(
                "재전송 라운드 {}/{}: {} segments 누락 (total {:?})",
                rounds,
                max_retries,
                missing.len(),
                buffer.expected_total()
            );

            self.request_segments(&missing).await;

            let mut pending: BTreeSet<Sequence> = missing.into_iter().collect();
            self.collect_replies(buffer, &mut pending).await?;

            if !pending.is_empty() {
                debug!("라운드 {} 종료, 미수신 {} segments", rounds, pending.len());
            }
        }
    }

    /// 누락 시퀀스마다 RETRANS 전송
    async fn request_segments(&mut self, missing: &[Sequence]) {
        let interval = self.config.repair_interval();

        for (idx, &sequence) in missing.iter().enumerate() {
            self.request_segment(sequence).await;

            if !interval.is_zero() && idx + 1 < missing.len() {
                tokio::time::sleep(interval).await;
            }
        }
    }

    async fn request_segment(&mut self, sequence: Sequence) {
        let request = Request::Retrans { sequence };
        match self
            .transport
            .send_to(&request.to_bytes(), self.server_addr)
            .await
        {
            Ok(_) => self.stats.repair_requests += 1,
            Err(e) => {
                self.stats.send_failures += 1;
                warn!("RETRANS {} 전송 실패: {}", sequence, e);
            }
        }
    }

    /// 재전송 창 동안 응답 수집
    ///
    /// 이번 라운드 대상만 받는다. 탐색 응답이 LAST가 아니면 다음 시퀀스를
    /// 바로 요청해서 잃어버린 꼬리 전체를 한 라운드 안에 찾는다.
    /// LAST로 총 개수가 확정되면 그 너머의 대상은 지운다.
    async fn collect_replies(
        &mut self,
        buffer: &mut ReceptionBuffer,
        pending: &mut BTreeSet<Sequence>,
    ) -> Result<()> {
        let deadline = Instant::now() + self.config.repair_window();

        while !pending.is_empty() {
            let Some((len, from)) = self.transport.recv_until(&mut self.buf, deadline).await?
            else {
                break;
            };

            if from != self.server_addr {
                self.stats.foreign_datagrams += 1;
                debug!("예상하지 않은 주소 {}의 데이터그램 무시", from);
                continue;
            }

            match inspect(&self.buf[..len]) {
                Inbound::Refused(reply) => {
                    error!("서버 에러: {} {}", reply.code, reply.reason);
                    return Err(reply.into());
                }
                Inbound::Malformed(e) => {
                    self.stats.malformed_datagrams += 1;
                    warn!("데이터그램 무시: {}", e);
                }
                Inbound::Corrupt(segment) => {
                    self.stats.corrupt_segments += 1;
                    warn!("재전송 segment {} 체크섬 불일치, 버림", segment.sequence);
                }
                Inbound::Segment(segment) => {
                    let sequence = segment.sequence;
                    if !pending.remove(&sequence) {
                        self.stats.duplicate_segments += 1;
                        debug!("라운드 대상 아닌 segment {} 무시", sequence);
                        continue;
                    }

                    let is_last = segment.is_last();
                    let before = buffer.expected_total();
                    self.store(buffer, segment);
                    debug!("segment {} 복구", sequence);

                    let after = buffer.expected_total();
                    if after == before {
                        continue;
                    }

                    match after {
                        ExpectedTotal::Confirmed(total) if is_last => {
                            info!("LAST segment {}: total {:?} -> {:?}", sequence, before, after);
                            pending.retain(|&seq| u64::from(seq) < total);
                        }
                        ExpectedTotal::Provisional(next) => {
                            let Ok(probe) = Sequence::try_from(next) else {
                                continue;
                            };
                            if !buffer.contains(probe) && pending.insert(probe) {
                                debug!("추정 total {:?} -> {:?}, segment {} 탐색", before, after, probe);
                                self.request_segment(probe).await;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        Ok(())
    }

    fn store(&mut self, buffer: &mut ReceptionBuffer, segment: Segment) -> bool {
        let len = segment.payload.len() as u64;
        if buffer.insert(segment) {
            self.stats.segments_received += 1;
            self.stats.total_bytes += len;
            true
        } else {
            self.stats.duplicate_segments += 1;
            false
        }
    }

    /// 현재 상태
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// 통계 반환
    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
