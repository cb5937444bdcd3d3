//! 프로토콜 설정

use std::time::Duration;

use crate::{Error, Result, DEFAULT_PAYLOAD_SIZE, MAX_PAYLOAD};

/// SRFP 프로토콜 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 세그먼트 페이로드 크기 (바이트)
    pub payload_size: usize,

    /// 세그먼트 전송 간격 (마이크로초)
    /// 0이면 최대 속도로 전송
    pub send_interval_us: u64,

    /// 스트리밍 단계 무활동 타임아웃 (밀리초)
    pub streaming_timeout_ms: u64,

    /// 재전송 라운드당 응답 대기 시간 (밀리초)
    pub repair_window_ms: u64,

    /// RETRANS 요청 간격 (마이크로초)
    pub repair_interval_us: u64,

    /// 최대 재전송 라운드 수
    pub max_retries: u32,

    /// 수신 데이터그램 손실 시뮬레이션 확률 (0.0 ~ 1.0)
    pub loss_probability: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            payload_size: DEFAULT_PAYLOAD_SIZE,
            send_interval_us: 1000,           // 1ms
            streaming_timeout_ms: 5000,       // 5초
            repair_window_ms: 1000,           // 1초
            repair_interval_us: 500,
            max_retries: 5,
            loss_probability: 0.0,
        }
    }
}

impl Config {
    /// 고성능 LAN용 설정
    pub fn high_performance() -> Self {
        Self {
            payload_size: DEFAULT_PAYLOAD_SIZE,
            send_interval_us: 0,              // 최대 속도
            streaming_timeout_ms: 2000,
            repair_window_ms: 300,
            repair_interval_us: 0,
            max_retries: 5,
            loss_probability: 0.0,
        }
    }

    /// 불안정한 네트워크용 설정
    pub fn unstable_network() -> Self {
        Self {
            payload_size: 1000,               // 작은 세그먼트
            send_interval_us: 2000,
            streaming_timeout_ms: 10000,
            repair_window_ms: 2000,
            repair_interval_us: 1000,
            max_retries: 10,
            loss_probability: 0.0,
        }
    }

    /// 설정 값 검증
    pub fn validate(&self) -> Result<()> {
        if self.payload_size == 0 || self.payload_size > MAX_PAYLOAD {
            return Err(Error::InvalidConfig(format!(
                "payload_size는 1..={} 범위여야 함: {}",
                MAX_PAYLOAD, self.payload_size
            )));
        }

        if !(0.0..=1.0).contains(&self.loss_probability) {
            return Err(Error::InvalidConfig(format!(
                "loss_probability는 0.0..=1.0 범위여야 함: {}",
                self.loss_probability
            )));
        }

        Ok(())
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_micros(self.send_interval_us)
    }

    pub fn streaming_timeout(&self) -> Duration {
        Duration::from_millis(self.streaming_timeout_ms)
    }

    pub fn repair_window(&self) -> Duration {
        Duration::from_millis(self.repair_window_ms)
    }

    pub fn repair_interval(&self) -> Duration {
        Duration::from_micros(self.repair_interval_us)
    }

    /// 전체 다운로드 소요 시간 상한 (페이싱 제외)
    pub fn worst_case_duration(&self) -> Duration {
        self.streaming_timeout() + self.repair_window() * self.max_retries
    }
}
