//! 세그먼트 정의와 코덱
//!
//! 와이어 포맷 (네트워크 바이트 오더):
//!
//! ```text
//! [sequence: u32][checksum: u16][flags: u8][payload ...]
//! ```
//!
//! 체크섬은 페이로드 바이트의 단순 합(mod 65536)이다.
//! 큰 손상만 잡아내며 의도적인 변조는 막지 못한다.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::{FLAG_LAST, HEADER_SIZE};

/// 시퀀스 번호 (32비트)
pub type Sequence = u32;

/// 디코딩 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("헤더보다 짧은 데이터그램: {len} bytes (최소 {HEADER_SIZE})")]
    TooShort { len: usize },
}

/// 페이로드 체크섬 (바이트 합 mod 65536)
pub fn checksum(payload: &[u8]) -> u16 {
    payload
        .iter()
        .fold(0u16, |acc, &byte| acc.wrapping_add(u16::from(byte)))
}

/// 세그먼트를 와이어 바이트로 인코딩
pub fn encode(sequence: Sequence, payload: &[u8], is_last: bool) -> Bytes {
    let flags = if is_last { FLAG_LAST } else { 0 };

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    buf.put_u32(sequence);
    buf.put_u16(checksum(payload));
    buf.put_u8(flags);
    buf.put_slice(payload);
    buf.freeze()
}

/// 와이어 바이트에서 세그먼트 디코딩
///
/// 체크섬은 검증하지 않는다. 손상된 세그먼트도 로그를 남길 수 있도록
/// 그대로 파싱하고, 검증은 [`Segment::verify`]로 호출자가 한다.
pub fn decode(bytes: &[u8]) -> Result<Segment, DecodeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DecodeError::TooShort { len: bytes.len() });
    }

    let mut buf = bytes;
    let sequence = buf.get_u32();
    let checksum = buf.get_u16();
    let flags = buf.get_u8();

    Ok(Segment {
        sequence,
        checksum,
        flags,
        payload: Bytes::copy_from_slice(buf),
    })
}

/// 세그먼트 (전송 단위)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// 시퀀스 번호 (0부터 시작)
    pub sequence: Sequence,

    /// 헤더에 실린 체크섬
    pub checksum: u16,

    /// 플래그 (bit0 = LAST)
    pub flags: u8,

    /// 실제 데이터
    pub payload: Bytes,
}

impl Segment {
    /// 새 세그먼트 생성 (체크섬 자동 계산)
    pub fn new(sequence: Sequence, payload: Bytes, is_last: bool) -> Self {
        Self {
            sequence,
            checksum: checksum(&payload),
            flags: if is_last { FLAG_LAST } else { 0 },
            payload,
        }
    }

    /// 마지막 세그먼트 여부
    pub fn is_last(&self) -> bool {
        self.flags & FLAG_LAST != 0
    }

    /// 체크섬 검증
    pub fn verify(&self) -> bool {
        checksum(&self.payload) == self.checksum
    }
}

/// 파일 크기와 페이로드 크기로 총 세그먼트 수 계산
///
/// 빈 파일도 빈 세그먼트 하나로 전송되므로 최소 1이다.
pub fn segment_count(file_size: u64, payload_size: usize) -> u64 {
    let payload_size = payload_size.max(1) as u64;
    file_size.div_ceil(payload_size).max(1)
}
