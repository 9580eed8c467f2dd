//! # SARQ (Stop-and-wait ARQ)
//!
//! 손실 릴레이를 거치는 UDP 기반 stop-and-wait 파일 전송
//!
//! ## 구성
//! - **송신자**: 512 bytes 단위 분할, 타임아웃 재전송, 빈 패킷으로 종료
//! - **채널 (릴레이)**: 매직 넘버 검증, 확률적 손실, 타입 기반 전달
//! - **수신자**: 시퀀스 번호 기반 중복 제거, 순서대로 기록, 모든 유효 패킷에 ACK
//!
//! 세 역할은 서로 독립적인 프로세스이며 [`transport::Transport`]로만 통신한다.

pub mod config;
pub mod error;
pub mod packet;
pub mod receiver;
pub mod relay;
pub mod sender;
pub mod stats;
pub mod transport;

pub use config::Config;
pub use error::{Error, Result};
pub use packet::{Packet, PacketError, PacketType, SeqNo};
pub use receiver::Receiver;
pub use relay::Relay;
pub use sender::Sender;
pub use stats::{RelayStats, TransferStats};
pub use transport::{LinkPorts, Transport, UdpLink};

/// 매직 넘버 (패킷 식별용)
pub const MAGIC_NUMBER: u16 = 0x497E;

/// 최대 페이로드 크기 (바이트)
pub const MAX_PAYLOAD: usize = 512;

/// 고정 헤더 크기: magic(2) + type(1) + seqno(1) + length(2)
pub const HEADER_LEN: usize = 6;
