//! 송신자
//!
//! - 최대 512 bytes 단위로 페이로드 분할
//! - 한 번에 하나의 패킷만 미확인 상태 (stop-and-wait)
//! - 타임아웃 시 동일 바이트 무한 재전송
//! - 마지막에 빈 데이터 패킷으로 전송 종료 표시

use bytes::Bytes;
use tracing::{debug, info, trace};

use crate::packet::{Packet, PacketError, SeqNo};
use crate::stats::TransferStats;
use crate::transport::Transport;
use crate::{Config, Result, MAX_PAYLOAD};

/// 송신자 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// 다음 패킷 준비
    PreparingPacket,

    /// ACK 대기 (재전송 루프)
    AwaitingAck,

    /// 종료 패킷까지 확인됨
    Done,
}

/// 페이로드 분할기
///
/// 순서대로 겹침/빈틈 없이 최대 [`MAX_PAYLOAD`] 바이트씩 내보낸 뒤
/// 빈 조각을 정확히 한 번 내보낸다.
#[derive(Debug)]
pub struct Chunks {
    data: Bytes,
    offset: usize,
    sentinel_emitted: bool,
}

impl Chunks {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            offset: 0,
            sentinel_emitted: false,
        }
    }
}

impl Iterator for Chunks {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.offset < self.data.len() {
            let end = (self.offset + MAX_PAYLOAD).min(self.data.len());
            let chunk = self.data.slice(self.offset..end);
            self.offset = end;
            return Some(chunk);
        }

        if self.sentinel_emitted {
            return None;
        }
        self.sentinel_emitted = true;
        Some(Bytes::new())
    }
}

/// 응답 대기 결과
enum Response {
    Timeout,
    Invalid(PacketError),
    Packet(Packet),
}

/// Stop-and-wait 송신자
pub struct Sender<T> {
    transport: T,
    config: Config,
    next_seqno: SeqNo,
    state: SenderState,
    stats: TransferStats,
}

impl<T: Transport> Sender<T> {
    /// 새 송신자 생성
    pub fn new(transport: T, config: Config) -> Self {
        Self {
            transport,
            config,
            next_seqno: SeqNo::Zero,
            state: SenderState::PreparingPacket,
            stats: TransferStats::new(),
        }
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    /// 다음 데이터 패킷에 붙일 시퀀스 번호
    pub fn next_seqno(&self) -> SeqNo {
        self.next_seqno
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 통계 반환
    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    /// 전체 페이로드 전송
    ///
    /// 종료 패킷이 확인되면 반환한다. 응답 없는 피어에는 포기하지 않는다.
    /// 호출마다 새 세션으로 시작한다 (시퀀스 번호 0부터).
    pub async fn send_file(&mut self, data: Bytes) -> Result<TransferStats> {
        info!("Sending {} bytes", data.len());
        self.next_seqno = SeqNo::Zero;
        self.state = SenderState::PreparingPacket;
        self.stats = TransferStats::new();

        for payload in Chunks::new(data) {
            self.state = SenderState::PreparingPacket;
            let packet = Packet::data(self.next_seqno, payload)?;

            self.state = SenderState::AwaitingAck;
            self.send_packet(&packet).await?;

            self.stats.total_packets += 1;
            self.stats.total_bytes += packet.len() as u64;
            self.next_seqno = self.next_seqno.flip();
        }

        self.state = SenderState::Done;
        self.stats.finish();
        info!("Transfer complete: {}", self.stats.summary());

        Ok(self.stats.clone())
    }

    /// 유효한 ACK를 받을 때까지 반복 전송
    async fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        let bytes = packet.encode();
        let mut buf = vec![0u8; self.config.recv_buffer_size];
        let mut attempt = 0u64;

        loop {
            self.transport.send(&bytes).await?;
            self.stats.transmissions += 1;
            if attempt > 0 {
                self.stats.retransmissions += 1;
            }
            attempt += 1;
            trace!(
                "패킷 전송: seqno={}, len={}, attempt={}",
                packet.seqno(),
                packet.len(),
                attempt
            );

            match self.wait_for_response(&mut buf).await? {
                Response::Packet(response) if response.is_valid_ack() => {
                    // 시퀀스 번호는 비교하지 않음: 중복 패킷에 대한 ACK는 이미 뒤집힌 값을 담는다
                    if response.seqno() != packet.seqno() {
                        debug!(
                            "ACK seqno 불일치 수락: sent={}, ack={}",
                            packet.seqno(),
                            response.seqno()
                        );
                    }
                    debug!("ACK 수신: seqno={} ({}회 전송)", packet.seqno(), attempt);
                    return Ok(());
                }
                Response::Packet(response) => {
                    self.stats.ignored_responses += 1;
                    debug!(
                        "ACK 아닌 응답 무시: type={:?}, len={}",
                        response.packet_type(),
                        response.len()
                    );
                }
                Response::Invalid(e) => {
                    self.stats.ignored_responses += 1;
                    self.stats.invalid_packets += 1;
                    debug!("유효하지 않은 응답 무시: {}", e);
                }
                Response::Timeout => {
                    self.stats.timeouts += 1;
                    debug!("ACK 타임아웃: seqno={}, 재전송", packet.seqno());
                }
            }
        }
    }

    async fn wait_for_response(&self, buf: &mut [u8]) -> Result<Response> {
        match tokio::time::timeout(self.config.ack_timeout(), self.transport.recv(buf)).await {
            Err(_) => Ok(Response::Timeout),
            Ok(Ok(len)) => Ok(match Packet::decode(&buf[..len]) {
                Ok(packet) => Response::Packet(packet),
                Err(e) => Response::Invalid(e),
            }),
            Ok(Err(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::packet::PacketType;
    use crate::transport::mock::{self, MemoryLink};

    /// 모든 데이터 패킷에 ACK로 답하는 피어, 빈 패킷 확인 후 종료
    fn spawn_acker(peer: MemoryLink) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1024];
            loop {
                let len = peer.recv(&mut buf).await.unwrap();
                let packet = Packet::decode(&buf[..len]).unwrap();
                peer.send(&Packet::ack(packet.seqno()).encode()).await.unwrap();
                if packet.is_empty() {
                    break;
                }
            }
        })
    }

    fn decoded(frames: &[Bytes]) -> Vec<Packet> {
        frames.iter().map(|f| Packet::decode(f).unwrap()).collect()
    }

    #[test]
    fn test_chunks_cover_payload_then_sentinel() {
        let data: Vec<u8> = (0..1025u32).map(|i| i as u8).collect();
        let chunks: Vec<Bytes> = Chunks::new(Bytes::from(data.clone())).collect();

        assert_eq!(
            chunks.iter().map(|c| c.len()).collect::<Vec<_>>(),
            vec![512, 512, 1, 0]
        );
        assert_eq!(chunks.concat(), data);
    }

    #[test]
    fn test_chunks_empty_payload() {
        let chunks: Vec<Bytes> = Chunks::new(Bytes::new()).collect();
        assert_eq!(chunks, vec![Bytes::new()]);
    }

    #[tokio::test]
    async fn test_empty_payload_sends_single_sentinel() {
        let (link, peer) = mock::pair();
        let acker = spawn_acker(peer);

        let mut sender = Sender::new(link, Config::fast());
        let stats = sender.send_file(Bytes::new()).await.unwrap();
        acker.await.unwrap();

        let packets = decoded(&sender.transport().sent());
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].packet_type(), PacketType::Data);
        assert!(packets[0].is_empty());
        assert_eq!(stats.total_bytes, 0);
        assert_eq!(sender.state(), SenderState::Done);
    }

    #[tokio::test]
    async fn test_exact_payload_size_sends_two_packets() {
        let (link, peer) = mock::pair();
        let acker = spawn_acker(peer);

        let mut sender = Sender::new(link, Config::fast());
        sender.send_file(Bytes::from(vec![7u8; 512])).await.unwrap();
        acker.await.unwrap();

        let lens: Vec<usize> = decoded(&sender.transport().sent())
            .iter()
            .map(|p| p.len())
            .collect();
        assert_eq!(lens, vec![512, 0]);
    }

    #[tokio::test]
    async fn test_sequence_numbers_alternate() {
        let (link, peer) = mock::pair();
        let acker = spawn_acker(peer);

        let mut sender = Sender::new(link, Config::fast());
        let stats = sender.send_file(Bytes::from(vec![1u8; 1025])).await.unwrap();
        acker.await.unwrap();

        let packets = decoded(&sender.transport().sent());
        let seqnos: Vec<SeqNo> = packets.iter().map(|p| p.seqno()).collect();
        assert_eq!(seqnos, vec![SeqNo::Zero, SeqNo::One, SeqNo::Zero, SeqNo::One]);
        assert_eq!(stats.total_packets, 4);
        assert_eq!(stats.total_bytes, 1025);
        assert_eq!(stats.retransmissions, 0);
        assert_eq!(sender.next_seqno(), SeqNo::Zero);
    }

    #[tokio::test]
    async fn test_each_transfer_starts_at_seqno_zero() {
        let (link, peer) = mock::pair();

        // 두 전송 모두에 ACK (빈 패킷 두 번 확인 후 종료)
        let acker = tokio::spawn(async move {
            let mut buf = vec![0u8; 1024];
            let mut sentinels = 0;
            while sentinels < 2 {
                let len = peer.recv(&mut buf).await.unwrap();
                let packet = Packet::decode(&buf[..len]).unwrap();
                peer.send(&Packet::ack(packet.seqno()).encode()).await.unwrap();
                if packet.is_empty() {
                    sentinels += 1;
                }
            }
        });

        let mut sender = Sender::new(link, Config::fast());
        sender.send_file(Bytes::new()).await.unwrap();
        assert_eq!(sender.next_seqno(), SeqNo::One);

        sender.send_file(Bytes::from_static(b"second")).await.unwrap();
        acker.await.unwrap();

        let packets = decoded(&sender.transport().sent());
        assert_eq!(packets.len(), 3);
        assert_eq!(&packets[1].payload()[..], b"second");
        assert_eq!(packets[1].seqno(), SeqNo::Zero);
        assert_eq!(packets[2].seqno(), SeqNo::One);
        assert_eq!(sender.state(), SenderState::Done);
    }

    #[tokio::test]
    async fn test_timeout_retransmits_identical_bytes() {
        let (link, peer) = mock::pair();

        // 첫 전송은 무시, 두 번째에 응답
        let responder = tokio::spawn(async move {
            let mut buf = vec![0u8; 1024];
            peer.recv(&mut buf).await.unwrap();
            let len = peer.recv(&mut buf).await.unwrap();
            let packet = Packet::decode(&buf[..len]).unwrap();
            peer.send(&Packet::ack(packet.seqno()).encode()).await.unwrap();
            peer
        });

        let mut sender = Sender::new(link, Config::fast());
        let stats = sender.send_file(Bytes::new()).await.unwrap();
        responder.await.unwrap();

        let frames = sender.transport().sent();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], frames[1]);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.retransmissions, 1);
    }

    #[tokio::test]
    async fn test_non_conforming_responses_are_ignored() {
        let (link, peer) = mock::pair();

        let responder = tokio::spawn(async move {
            let mut buf = vec![0u8; 1024];
            let replies: Vec<Vec<u8>> = vec![
                b"garbage".to_vec(),
                // 페이로드 달린 ACK
                vec![0x49, 0x7E, 1, 0, 0, 1, 0xAA],
                Packet::sentinel(SeqNo::Zero).encode().to_vec(),
                Packet::ack(SeqNo::Zero).encode().to_vec(),
            ];
            for reply in replies {
                peer.recv(&mut buf).await.unwrap();
                peer.send(&reply).await.unwrap();
            }
            peer
        });

        let mut config = Config::fast();
        config.ack_timeout_ms = 5_000;
        let mut sender = Sender::new(link, config);
        let stats = sender.send_file(Bytes::new()).await.unwrap();
        responder.await.unwrap();

        assert_eq!(sender.transport().sent().len(), 4);
        assert_eq!(stats.ignored_responses, 3);
        assert_eq!(stats.invalid_packets, 1);
        assert_eq!(stats.timeouts, 0);
    }

    #[tokio::test]
    async fn test_silent_peer_causes_unbounded_retransmission() {
        let (link, _peer) = mock::pair();
        let mut sender = Sender::new(link, Config::fast());

        let result = tokio::time::timeout(
            Duration::from_millis(200),
            sender.send_file(Bytes::from_static(b"never delivered")),
        )
        .await;
        assert!(result.is_err());

        let frames = sender.transport().sent();
        assert!(frames.len() >= 3);
        assert!(frames.iter().all(|f| f == &frames[0]));
        assert_eq!(sender.state(), SenderState::AwaitingAck);
    }
}
