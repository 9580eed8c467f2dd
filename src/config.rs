//! 프로토콜 설정
//!
//! 프로세스 전역 값은 상수와 불변 설정값으로만 둔다.

use std::time::Duration;

use crate::{Error, Result};

/// 허용 포트 하한 (미포함)
pub const MIN_PORT: u16 = 1024;

/// 허용 포트 상한 (미포함)
pub const MAX_PORT: u16 = 64000;

/// SARQ 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// ACK 대기 타임아웃 (밀리초)
    /// 만료되면 같은 패킷을 그대로 재전송
    pub ack_timeout_ms: u64,

    /// 수신 버퍼 크기 (바이트)
    /// 헤더 + 최대 페이로드보다 커야 잘린 데이터그램을 피할 수 있음
    pub recv_buffer_size: usize,

    /// 시작 시 소켓 연결 시도 횟수
    pub connect_attempts: u32,

    /// 연결 재시도 간격 (밀리초)
    pub connect_retry_interval_ms: u64,

    /// 수신자 종료 후 재전송된 패킷에 계속 ACK하는 시간 (밀리초)
    /// 0이면 종료 패킷 수신 즉시 종료
    pub linger_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 1000,             // 1초
            recv_buffer_size: 1024,
            connect_attempts: 5,
            connect_retry_interval_ms: 3000,  // 3초
            linger_ms: 0,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn connect_retry_interval(&self) -> Duration {
        Duration::from_millis(self.connect_retry_interval_ms)
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }

    /// 테스트용 설정 (짧은 타임아웃)
    pub fn fast() -> Self {
        Self {
            ack_timeout_ms: 20,
            connect_attempts: 2,
            connect_retry_interval_ms: 10,
            ..Self::default()
        }
    }
}

/// 포트 문자열 검증
pub fn parse_port(raw: &str) -> Result<u16> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port > MIN_PORT && port < MAX_PORT => Ok(port),
        _ => Err(Error::InvalidPort(raw.to_string())),
    }
}

/// 손실률 문자열 검증 (0 <= loss < 1)
pub fn parse_loss_rate(raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(loss) if (0.0..1.0).contains(&loss) => Ok(loss),
        _ => Err(Error::InvalidLossRate(raw.to_string())),
    }
}
