//! 수신자
//!
//! - 시퀀스 번호 기반 중복 제거
//! - 유효한 패킷마다 ACK 전송
//! - 빈 데이터 패킷 수신 시 출력 종료

use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::packet::{Packet, SeqNo};
use crate::stats::TransferStats;
use crate::transport::Transport;
use crate::{Config, Error, Result};

/// 수신자 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// 패킷 대기
    Waiting,

    /// 새 페이로드 기록 중
    AcceptedWrite,

    /// 종료 패킷 수신, 출력 닫힘
    Done,
}

/// 데이터그램 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// 디코딩 실패, ACK 없이 버림
    Invalid,

    /// 새 페이로드 기록
    Accepted { len: usize },

    /// 이전 패킷 재수신, ACK만 다시 보냄
    Duplicate,

    /// 종료 패킷
    EndOfTransfer,
}

/// 목적지 파일 생성 (이미 있으면 실패)
pub async fn create_output(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => Error::FileConflict {
                path: path.to_path_buf(),
            },
            _ => Error::Io(e),
        })
}

/// Stop-and-wait 수신자
pub struct Receiver<T, W> {
    transport: T,
    output: W,
    config: Config,
    expected_seqno: SeqNo,
    state: ReceiverState,
    stats: TransferStats,
}

impl<T, W> Receiver<T, W>
where
    T: Transport,
    W: AsyncWrite + Unpin + Send,
{
    /// 새 수신자 생성
    pub fn new(transport: T, output: W, config: Config) -> Self {
        Self {
            transport,
            output,
            config,
            expected_seqno: SeqNo::Zero,
            state: ReceiverState::Waiting,
            stats: TransferStats::new(),
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// 다음에 수락할 시퀀스 번호
    pub fn expected_seqno(&self) -> SeqNo {
        self.expected_seqno
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 출력 핸들 반환
    pub fn into_output(self) -> W {
        self.output
    }

    /// 데이터그램 하나 처리
    pub async fn handle_datagram(&mut self, bytes: &[u8]) -> Result<Verdict> {
        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                self.stats.invalid_packets += 1;
                debug!("패킷 버림: {}", e);
                return Ok(Verdict::Invalid);
            }
        };

        // 중복이라도 현재 기대값으로 ACK: 송신자의 재전송 루프가 진행되도록
        self.transport
            .send(&Packet::ack(self.expected_seqno).encode())
            .await?;
        self.stats.acks_sent += 1;

        if self.state == ReceiverState::Done || packet.seqno() != self.expected_seqno {
            self.stats.duplicate_packets += 1;
            debug!(
                "중복 패킷: seqno={}, expected={}",
                packet.seqno(),
                self.expected_seqno
            );
            return Ok(Verdict::Duplicate);
        }

        self.stats.total_packets += 1;

        if packet.is_empty() {
            self.output.flush().await?;
            self.output.shutdown().await?;
            self.state = ReceiverState::Done;
            self.stats.finish();
            info!("End of transfer: {} bytes written", self.stats.total_bytes);
            return Ok(Verdict::EndOfTransfer);
        }

        self.state = ReceiverState::AcceptedWrite;
        self.output.write_all(packet.payload()).await?;
        self.stats.total_bytes += packet.len() as u64;
        self.expected_seqno = self.expected_seqno.flip();
        self.state = ReceiverState::Waiting;

        debug!("{} bytes written (seqno={})", packet.len(), packet.seqno());
        Ok(Verdict::Accepted { len: packet.len() })
    }

    /// 종료 패킷까지 수신
    ///
    /// `linger_ms`가 0보다 크면 종료 후 그 시간 동안 재전송된 패킷에 계속 ACK한다.
    pub async fn run(&mut self) -> Result<TransferStats> {
        let mut buf = vec![0u8; self.config.recv_buffer_size];

        while self.state != ReceiverState::Done {
            let len = self.transport.recv(&mut buf).await?;
            self.handle_datagram(&buf[..len]).await?;
        }

        if self.config.linger_ms > 0 {
            let deadline = Instant::now() + self.config.linger();
            while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
                match tokio::time::timeout(remaining, self.transport.recv(&mut buf)).await {
                    Ok(Ok(len)) => {
                        self.handle_datagram(&buf[..len]).await?;
                    }
                    Ok(Err(e)) => return Err(e),
                    Err(_) => break,
                }
            }
        }

        info!("Receiver finished: {}", self.stats.summary());
        Ok(self.stats.clone())
    }
}
