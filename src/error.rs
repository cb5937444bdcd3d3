//! 에러 타입 정의

use thiserror::Error;

use crate::segment::Sequence;

/// SRFP 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("유효하지 않은 메시지: {0}")]
    InvalidMessage(String),

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("서버 에러 응답: {code} {reason}")]
    Remote { code: u16, reason: String },

    #[error("스트리밍 타임아웃: 세그먼트를 하나도 받지 못함")]
    StreamingTimeout,

    #[error("재전송 한도 초과: 복구 못한 시퀀스 {missing:?}")]
    RepairBudgetExhausted { missing: Vec<Sequence> },

    #[error("조립 중 세그먼트 누락 (내부 불변식 위반): sequence={sequence}")]
    MissingSegment { sequence: Sequence },

    #[error("조립 시점에 총 세그먼트 수 미확정 (내부 불변식 위반)")]
    TotalUnknown,
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
