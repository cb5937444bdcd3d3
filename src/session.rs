//! 세션 레지스트리 (서버측)
//!
//! 클라이언트 주소 → 전송 중인 파일명. `GET`에서 등록/덮어쓰기하고
//! `RETRANS`에서 조회만 한다. 종료 메시지가 없으므로 만료하지 않는다.

use std::collections::HashMap;
use std::net::SocketAddr;

/// 주소별 전송 세션 테이블
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SocketAddr, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 세션 등록 (같은 주소의 기존 세션은 덮어씀)
    ///
    /// 이전 파일명을 반환한다.
    pub fn register(&mut self, addr: SocketAddr, filename: impl Into<String>) -> Option<String> {
        self.sessions.insert(addr, filename.into())
    }

    /// 세션 조회
    pub fn lookup(&self, addr: &SocketAddr) -> Option<&str> {
        self.sessions.get(addr).map(String::as_str)
    }

    /// 세션 제거
    pub fn remove(&mut self, addr: &SocketAddr) -> Option<String> {
        self.sessions.remove(addr)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
