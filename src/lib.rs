//! # SRFP (Selective Repair File Protocol)
//!
//! UDP 기반 파일 다운로드 프로토콜
//!
//! ## 핵심 특징
//! - **무응답 버스트**: 서버는 ACK 없이 전체 세그먼트를 한 번에 전송
//! - **선택적 재전송**: 클라이언트가 누락된 시퀀스만 `RETRANS`로 요청
//! - **체크섬 검증**: 손상된 세그먼트는 저장하지 않고 버림
//! - **제한된 복구**: 재시도 횟수로 전체 소요 시간 상한 보장
//! - **순서 무관 수신**: 최종 조립 시에만 시퀀스 순서로 정렬

pub mod config;
pub mod error;
pub mod message;
pub mod receiver;
pub mod segment;
pub mod sender;
pub mod session;
pub mod stats;
pub mod transport;

pub use config::Config;
pub use error::{Error, Result};
pub use message::{ErrorReply, Request};
pub use receiver::{ExpectedTotal, Phase, ReceptionBuffer, Receiver};
pub use segment::{DecodeError, Segment, Sequence};
pub use sender::{RetransmitOutcome, Sender, ServeOutcome};
pub use session::SessionRegistry;
pub use stats::TransferStats;
pub use transport::{LossyTransport, Transport, UdpTransport};

/// 세그먼트 헤더 크기 (sequence 4 + checksum 2 + flags 1)
pub const HEADER_SIZE: usize = 7;

/// 마지막 세그먼트 플래그
pub const FLAG_LAST: u8 = 0x01;

/// 기본 페이로드 크기 (바이트)
///
/// 이더넷 MTU 1500에서 IP/UDP 헤더를 빼고 IP 단편화를 피하는 크기
pub const DEFAULT_PAYLOAD_SIZE: usize = 1400;

/// UDP 데이터그램 최대 크기
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// 최대 페이로드 크기
pub const MAX_PAYLOAD: usize = MAX_DATAGRAM_SIZE - HEADER_SIZE;

/// 기본 서버 포트
pub const DEFAULT_PORT: u16 = 9999;
