//! 전송 통계

use std::time::{Duration, Instant};

/// 엔드포인트(송신자/수신자) 전송 통계
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 종료 시간 (전송 완료 시 기록)
    pub finish_time: Option<Instant>,

    /// 처리된 고유 데이터 패킷 수 (종료 패킷 포함)
    pub total_packets: u64,

    /// 페이로드 바이트 수 (송신: 읽은 양, 수신: 기록한 양)
    pub total_bytes: u64,

    /// 송신 횟수 (재전송 포함)
    pub transmissions: u64,

    /// 재전송 횟수
    pub retransmissions: u64,

    /// ACK 대기 타임아웃 횟수
    pub timeouts: u64,

    /// 무시된 응답 수 (ACK 조건 불충족)
    pub ignored_responses: u64,

    /// 중복 수신 패킷 수
    pub duplicate_packets: u64,

    /// 디코딩 실패로 버린 데이터그램 수
    pub invalid_packets: u64,

    /// 송신한 ACK 수
    pub acks_sent: u64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            finish_time: None,
            total_packets: 0,
            total_bytes: 0,
            transmissions: 0,
            retransmissions: 0,
            timeouts: 0,
            ignored_responses: 0,
            duplicate_packets: 0,
            invalid_packets: 0,
            acks_sent: 0,
        }
    }

    /// 완료 시각 기록
    pub fn finish(&mut self) {
        self.finish_time.get_or_insert_with(Instant::now);
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        match self.finish_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// 전체 처리율 (bytes/sec)
    pub fn overall_throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.total_bytes as f64 / elapsed
    }

    /// 재전송 비율 (송신 횟수 대비)
    pub fn retransmit_ratio(&self) -> f64 {
        if self.transmissions == 0 {
            return 0.0;
        }
        self.retransmissions as f64 / self.transmissions as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Packets: {} | Bytes: {} | Throughput: {:.2} KB/s | Sent: {} (retx {:.1}%) | Dup: {} | Invalid: {} | ACKs: {}",
            self.elapsed().as_secs_f64(),
            self.total_packets,
            self.total_bytes,
            self.overall_throughput() / 1_000.0,
            self.transmissions,
            self.retransmit_ratio() * 100.0,
            self.duplicate_packets,
            self.invalid_packets,
            self.acks_sent,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

/// 릴레이 통계
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    /// 수신자 방향으로 전달된 데이터 패킷
    pub forwarded_data: u64,

    /// 송신자 방향으로 전달된 ACK 패킷
    pub forwarded_acks: u64,

    /// 손실 시뮬레이션으로 버린 패킷
    pub lost: u64,

    /// 디코딩 실패로 버린 데이터그램
    pub invalid: u64,
}

impl RelayStats {
    /// 유효 패킷 총수
    pub fn total_valid(&self) -> u64 {
        self.forwarded_data + self.forwarded_acks + self.lost
    }

    /// 관측 손실률
    pub fn observed_loss_rate(&self) -> f64 {
        let total = self.total_valid();
        if total == 0 {
            return 0.0;
        }
        self.lost as f64 / total as f64
    }

    pub fn summary(&self) -> String {
        format!(
            "DATA fwd: {} | ACK fwd: {} | Lost: {} ({:.1}%) | Invalid: {}",
            self.forwarded_data,
            self.forwarded_acks,
            self.lost,
            self.observed_loss_rate() * 100.0,
            self.invalid,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retransmit_ratio() {
        let mut stats = TransferStats::new();
        assert_eq!(stats.retransmit_ratio(), 0.0);

        stats.transmissions = 4;
        stats.retransmissions = 1;
        assert!((stats.retransmit_ratio() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_elapsed_freezes_after_finish() {
        let mut stats = TransferStats::new();
        stats.finish();
        let first = stats.elapsed();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(stats.elapsed(), first);
    }

    #[test]
    fn test_relay_loss_rate() {
        let stats = RelayStats {
            forwarded_data: 2,
            forwarded_acks: 1,
            lost: 1,
            invalid: 10,
        };
        assert_eq!(stats.total_valid(), 4);
        assert!((stats.observed_loss_rate() - 0.25).abs() < f64::EPSILON);
    }
}
