//! 손실 시뮬레이션 릴레이 (채널)
//!
//! 송신자와 수신자 사이에서 유효한 패킷만 확률적으로 전달한다.
//! - 디코딩 실패 패킷은 조용히 버림
//! - 유효 패킷은 `loss_rate` 확률로 버림
//! - 나머지는 바이트 그대로 선언된 타입 방향으로 전달 (DATA → 수신자, ACK → 송신자)
//!
//! 두 방향은 각각 별도 태스크에서 순차 처리되므로 방향별 전달 순서가 유지된다.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};

use crate::packet::{Packet, PacketError, PacketType};
use crate::stats::RelayStats;
use crate::transport::Transport;
use crate::{Config, Error, Result};

/// 전달 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// 수신자 쪽으로 (DATA)
    ToReceiver,

    /// 송신자 쪽으로 (ACK)
    ToSender,
}

/// 패킷 처리 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// 디코딩 실패로 버림
    Invalid(PacketError),

    /// 손실 시뮬레이션으로 버림
    Lost,

    /// 전달
    Forward(Direction),
}

/// 수신 구간
#[derive(Debug, Clone, Copy)]
enum Leg {
    Sender,
    Receiver,
}

/// 손실 릴레이
pub struct Relay<T> {
    /// 송신자와 연결된 링크
    sender_leg: T,

    /// 수신자와 연결된 링크
    receiver_leg: T,

    /// 손실 확률 [0, 1]
    loss_rate: f64,

    rng: Mutex<StdRng>,

    stats: Mutex<RelayStats>,

    config: Config,
}

impl<T: Transport + 'static> Relay<T> {
    /// 새 릴레이 생성 (엔트로피 시드)
    pub fn new(sender_leg: T, receiver_leg: T, loss_rate: f64, config: Config) -> Self {
        Self::with_rng(sender_leg, receiver_leg, loss_rate, config, StdRng::from_entropy())
    }

    /// 고정 RNG로 생성 (테스트 재현용)
    ///
    /// 손실 확률은 [0, 1]로 제한되며 NaN은 0으로 본다.
    pub fn with_rng(
        sender_leg: T,
        receiver_leg: T,
        loss_rate: f64,
        config: Config,
        rng: StdRng,
    ) -> Self {
        let loss_rate = if loss_rate.is_nan() {
            0.0
        } else {
            loss_rate.clamp(0.0, 1.0)
        };

        Self {
            sender_leg,
            receiver_leg,
            loss_rate,
            rng: Mutex::new(rng),
            stats: Mutex::new(RelayStats::default()),
            config,
        }
    }

    pub fn loss_rate(&self) -> f64 {
        self.loss_rate
    }

    pub fn sender_leg(&self) -> &T {
        &self.sender_leg
    }

    pub fn receiver_leg(&self) -> &T {
        &self.receiver_leg
    }

    /// 통계 반환
    pub fn stats(&self) -> RelayStats {
        self.stats.lock().clone()
    }

    /// 손실 여부 추첨
    fn packet_lost(&self) -> bool {
        self.rng.lock().gen::<f64>() < self.loss_rate
    }

    /// 전달 여부와 방향 결정 (I/O 없음)
    pub fn decide(&self, bytes: &[u8]) -> Verdict {
        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(e) => return Verdict::Invalid(e),
        };

        if self.packet_lost() {
            return Verdict::Lost;
        }

        match packet.packet_type() {
            PacketType::Data => Verdict::Forward(Direction::ToReceiver),
            PacketType::Ack => Verdict::Forward(Direction::ToSender),
        }
    }

    /// 데이터그램 하나 처리 후 필요하면 전달
    pub async fn process(&self, bytes: &[u8]) -> Result<Verdict> {
        let verdict = self.decide(bytes);

        match verdict {
            Verdict::Invalid(e) => {
                self.stats.lock().invalid += 1;
                debug!("유효하지 않은 패킷 버림: {}", e);
            }
            Verdict::Lost => {
                self.stats.lock().lost += 1;
                trace!("패킷 손실 시뮬레이션: {} bytes", bytes.len());
            }
            Verdict::Forward(Direction::ToReceiver) => {
                self.receiver_leg.send(bytes).await?;
                self.stats.lock().forwarded_data += 1;
            }
            Verdict::Forward(Direction::ToSender) => {
                self.sender_leg.send(bytes).await?;
                self.stats.lock().forwarded_acks += 1;
            }
        }

        Ok(verdict)
    }

    /// 한 구간의 수신 루프
    async fn pump(self: Arc<Self>, leg: Leg) -> Result<()> {
        let mut buf = vec![0u8; self.config.recv_buffer_size];

        loop {
            let len = match leg {
                Leg::Sender => self.sender_leg.recv(&mut buf).await?,
                Leg::Receiver => self.receiver_leg.recv(&mut buf).await?,
            };
            self.process(&buf[..len]).await?;
        }
    }

    /// 두 구간을 병렬 실행
    ///
    /// 정상 동작 중에는 반환하지 않으며, 한쪽이 에러로 끝나면 다른 쪽도 중단한다.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        info!("Relay started (loss rate {:.1}%)", self.loss_rate * 100.0);

        let mut from_sender = tokio::spawn(self.clone().pump(Leg::Sender));
        let mut from_receiver = tokio::spawn(self.clone().pump(Leg::Receiver));

        let result = tokio::select! {
            r = &mut from_sender => r,
            r = &mut from_receiver => r,
        };
        from_sender.abort();
        from_receiver.abort();

        info!("Relay stopped: {}", self.stats().summary());

        match result {
            Ok(r) => r,
            Err(e) => Err(Error::Io(std::io::Error::other(e))),
        }
    }
}
