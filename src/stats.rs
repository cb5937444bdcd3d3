//! 전송 통계

use std::time::{Duration, Instant};

/// 전체 전송 통계
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 전송한 세그먼트 수 (재전송 포함)
    pub segments_sent: u64,

    /// 재전송한 세그먼트 수
    pub retransmitted_segments: u64,

    /// 새로 저장한 세그먼트 수
    pub segments_received: u64,

    /// 페이로드 바이트 (송신측: 전송, 수신측: 저장)
    pub total_bytes: u64,

    /// 중복 수신 세그먼트 수
    pub duplicate_segments: u64,

    /// 체크섬 불일치 세그먼트 수
    pub corrupt_segments: u64,

    /// 헤더보다 짧은 데이터그램 수
    pub malformed_datagrams: u64,

    /// 다른 주소에서 온 데이터그램 수
    pub foreign_datagrams: u64,

    /// 전송 실패 수
    pub send_failures: u64,

    /// 보낸 RETRANS 요청 수
    pub repair_requests: u64,

    /// 재전송 라운드 수
    pub repair_rounds: u32,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            segments_sent: 0,
            retransmitted_segments: 0,
            segments_received: 0,
            total_bytes: 0,
            duplicate_segments: 0,
            corrupt_segments: 0,
            malformed_datagrams: 0,
            foreign_datagrams: 0,
            send_failures: 0,
            repair_requests: 0,
            repair_rounds: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 전체 처리율 (bytes/sec)
    pub fn overall_throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 / elapsed
    }

    /// 수신 중 버린 세그먼트 비율 (손상 + 중복)
    pub fn discard_rate(&self) -> f64 {
        let discarded = self.corrupt_segments + self.duplicate_segments;
        let total = self.segments_received + discarded;
        if total == 0 {
            return 0.0;
        }
        discarded as f64 / total as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Sent: {} (retrans {}) | Received: {} | Bytes: {} | Throughput: {:.2} MB/s | Dup: {} | Corrupt: {} ({:.1}% discarded) | RETRANS: {} in {} rounds",
            self.elapsed().as_secs_f64(),
            self.segments_sent,
            self.retransmitted_segments,
            self.segments_received,
            self.total_bytes,
            self.overall_throughput() / 1_000_000.0,
            self.duplicate_segments,
            self.corrupt_segments,
            self.discard_rate() * 100.0,
            self.repair_requests,
            self.repair_rounds,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discard_rate() {
        let mut stats = TransferStats::new();
        assert_eq!(stats.discard_rate(), 0.0);

        stats.segments_received = 8;
        stats.duplicate_segments = 1;
        stats.corrupt_segments = 1;
        assert!((stats.discard_rate() - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_mentions_counters() {
        let mut stats = TransferStats::new();
        stats.repair_requests = 4;
        stats.repair_rounds = 2;
        stats.segments_received = 3;
        stats.duplicate_segments = 1;

        let summary = stats.summary();
        assert!(summary.contains("RETRANS: 4 in 2 rounds"));
        assert!(summary.contains("(25.0% discarded)"));
    }
}
