//! 에러 타입 정의

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// SARQ 프로토콜 에러 타입
///
/// 손상되거나 손실된 패킷은 여기에 나타나지 않는다. 코덱이 돌려주는
/// [`crate::packet::PacketError`]는 호출자가 그대로 버린다.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("페이로드가 너무 큼: {len} bytes (최대 {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("출력 파일이 이미 존재함: {}", path.display())]
    FileConflict { path: PathBuf },

    #[error("피어 연결 불가: {addr} ({attempts}회 시도)")]
    TransportUnavailable { addr: SocketAddr, attempts: u32 },

    #[error("유효하지 않은 포트: {0} (1024 < port < 64000)")]
    InvalidPort(String),

    #[error("유효하지 않은 손실률: {0} (0 <= loss < 1)")]
    InvalidLossRate(String),

    #[error("잘못된 인자: {0}")]
    InvalidArguments(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
