//! 컨트롤 메시지 정의
//!
//! 텍스트 명령 (UTF-8, 개행 종료):
//! - `GET /<filename>`: 클라이언트 → 서버, 전송 시작
//! - `RETRANS <sequence>`: 클라이언트 → 서버, 세그먼트 하나 재전송 요청
//! - `ERROR <code> <reason>`: 서버 → 클라이언트, 해당 시도 종료

use bytes::Bytes;

use crate::segment::Sequence;
use crate::{Error, Result};

/// GET 명령 접두사
pub const GET_PREFIX: &str = "GET /";

/// RETRANS 명령 접두사
pub const RETRANS_PREFIX: &str = "RETRANS ";

/// ERROR 응답 접두사
pub const ERROR_PREFIX: &[u8] = b"ERROR";

/// 클라이언트 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// 파일 전송 요청
    Get { filename: String },

    /// 세그먼트 재전송 요청
    Retrans { sequence: Sequence },
}

impl Request {
    /// 바이트로 직렬화
    pub fn to_bytes(&self) -> Bytes {
        let text = match self {
            Request::Get { filename } => format!("{GET_PREFIX}{filename}\n"),
            Request::Retrans { sequence } => format!("{RETRANS_PREFIX}{sequence}\n"),
        };
        Bytes::from(text)
    }

    /// 바이트에서 파싱
    ///
    /// 앞뒤 공백은 무시한다. 잘못된 UTF-8은 대체 문자로 바뀐다.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(data);
        let text = text.trim();

        if let Some(filename) = text.strip_prefix(GET_PREFIX) {
            if filename.is_empty() {
                return Err(Error::InvalidMessage("GET에 파일명 없음".into()));
            }
            return Ok(Request::Get {
                filename: filename.to_string(),
            });
        }

        if text.starts_with(RETRANS_PREFIX) {
            let sequence = text
                .split_whitespace()
                .nth(1)
                .and_then(|s| s.parse::<Sequence>().ok())
                .ok_or_else(|| Error::InvalidMessage(format!("잘못된 RETRANS: {text}")))?;
            return Ok(Request::Retrans { sequence });
        }

        Err(Error::InvalidMessage(format!(
            "알 수 없는 명령: {}",
            truncate(text, 100)
        )))
    }
}

/// 서버 에러 응답
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReply {
    pub code: u16,
    pub reason: String,
}

impl ErrorReply {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// `ERROR 404 File Not Found`
    pub fn not_found() -> Self {
        Self::new(404, "File Not Found")
    }

    /// `ERROR 500 <reason>`
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(500, reason)
    }

    /// ERROR 응답인지 확인 (접두사만 검사)
    pub fn matches(data: &[u8]) -> bool {
        data.starts_with(ERROR_PREFIX)
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(format!("ERROR {} {}\n", self.code, self.reason))
    }

    /// 바이트에서 파싱
    ///
    /// 코드를 읽을 수 없으면 0으로 두고 나머지를 사유로 쓴다.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if !Self::matches(data) {
            return None;
        }

        let text = String::from_utf8_lossy(&data[ERROR_PREFIX.len()..]);
        let text = text.trim();
        let (code, reason) = match text.split_once(' ') {
            Some((code, reason)) => (code, reason),
            None => (text, ""),
        };

        Some(match code.parse::<u16>() {
            Ok(code) => Self::new(code, reason.trim()),
            Err(_) => Self::new(0, text),
        })
    }
}

impl From<ErrorReply> for Error {
    fn from(reply: ErrorReply) -> Self {
        Error::Remote {
            code: reply.code,
            reason: reply.reason,
        }
    }
}

/// 로그용 문자열 자르기 (문자 경계 유지)
pub(crate) fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let get = Request::Get {
            filename: "teste.txt".into(),
        };
        assert_eq!(get.to_bytes().as_ref(), b"GET /teste.txt\n");

        let retrans = Request::Retrans { sequence: 12 };
        assert_eq!(retrans.to_bytes().as_ref(), b"RETRANS 12\n");
    }

    #[test]
    fn test_parse_requests() {
        assert_eq!(
            Request::parse(b"GET /dir/file.bin\n").unwrap(),
            Request::Get {
                filename: "dir/file.bin".into()
            }
        );
        assert_eq!(
            Request::parse(b"  RETRANS 7\r\n").unwrap(),
            Request::Retrans { sequence: 7 }
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Request::parse(b"GET /").is_err());
        assert!(Request::parse(b"RETRANS abc\n").is_err());
        assert!(Request::parse(b"RETRANS -1\n").is_err());
        assert!(Request::parse(b"HELLO\n").is_err());
        assert!(Request::parse(&[0xFF, 0xFE, 0x00]).is_err());
    }

    #[test]
    fn test_error_reply() {
        let reply = ErrorReply::not_found();
        assert_eq!(reply.to_bytes().as_ref(), b"ERROR 404 File Not Found\n");
        assert_eq!(ErrorReply::parse(&reply.to_bytes()), Some(reply));

        let reply = ErrorReply::parse(b"ERROR 500 Server IO Error: disk gone\n").unwrap();
        assert_eq!(reply.code, 500);
        assert_eq!(reply.reason, "Server IO Error: disk gone");

        assert_eq!(ErrorReply::parse(b"ERROR\n"), Some(ErrorReply::new(0, "")));
        assert_eq!(ErrorReply::parse(b"GET /x"), None);
    }

    #[test]
    fn test_truncate_keeps_char_boundary() {
        assert_eq!(truncate("가나다라", 2), "가나");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
