//! 데이터그램 전송 계층
//!
//! 프로토콜 로직은 [`Transport`] 트레이트만 본다. 실제 구현은 UDP 소켓 쌍인
//! [`UdpLink`]이며, 시작 시 연결 재시도는 ARQ 루프 밖에서 여기서 끝난다.

use std::future::Future;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::{Config, Error, Result};

/// 단일 피어와 연결된 양방향 데이터그램 채널
pub trait Transport: Send + Sync {
    /// 데이터그램 하나 송신 (fire-and-forget)
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// 데이터그램 하나 수신, 받은 길이 반환
    fn recv(&self, buf: &mut [u8]) -> impl Future<Output = Result<usize>> + Send;
}

/// 일시적인 에러인지 (재시도 또는 손실로 간주 가능)
fn is_transient_io_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::AddrInUse
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
    )
}

/// 루프백 주소
pub fn local_addr(port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
}

/// 링크 포트 구성
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkPorts {
    /// 수신 소켓 포트
    pub in_port: u16,

    /// 송신 소켓 포트
    pub out_port: u16,

    /// 피어의 수신 포트
    pub peer_port: u16,
}

/// UDP 소켓 쌍
///
/// 수신 소켓은 누구에게서든 받고, 송신 소켓은 피어의 수신 포트에 연결된다.
#[derive(Debug)]
pub struct UdpLink {
    inbound: UdpSocket,
    outbound: UdpSocket,
}

impl UdpLink {
    /// 두 소켓만 바인딩 (아직 피어 미연결)
    pub async fn bind(in_addr: SocketAddr, out_addr: SocketAddr) -> Result<Self> {
        let inbound = UdpSocket::bind(in_addr).await?;
        let outbound = UdpSocket::bind(out_addr).await?;
        Ok(Self { inbound, outbound })
    }

    /// 송신 소켓을 피어에 연결
    pub async fn connect(&self, peer: SocketAddr) -> Result<()> {
        self.outbound.connect(peer).await?;
        debug!("송신 소켓 {} -> {} 연결", self.outbound.local_addr()?, peer);
        Ok(())
    }

    /// 바인딩 + 연결, 일시적 실패는 고정 간격으로 재시도
    pub async fn establish(ports: LinkPorts, config: &Config) -> Result<Self> {
        let peer = local_addr(ports.peer_port);
        let attempts = config.connect_attempts.max(1);

        for attempt in 1..=attempts {
            let result = async {
                let link = Self::bind(local_addr(ports.in_port), local_addr(ports.out_port)).await?;
                link.connect(peer).await?;
                Ok::<_, Error>(link)
            }
            .await;

            match result {
                Ok(link) => {
                    info!(
                        "Link ready: in={} out={} peer={}",
                        ports.in_port, ports.out_port, peer
                    );
                    return Ok(link);
                }
                Err(Error::Io(e)) if is_transient_io_error(&e) => {
                    warn!(
                        "연결 실패 ({}/{}): {}, {}ms 후 재시도",
                        attempt, attempts, e, config.connect_retry_interval_ms
                    );
                    if attempt < attempts {
                        tokio::time::sleep(config.connect_retry_interval()).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::TransportUnavailable {
            addr: peer,
            attempts,
        })
    }

    /// 수신 소켓 주소
    pub fn inbound_addr(&self) -> Result<SocketAddr> {
        Ok(self.inbound.local_addr()?)
    }

    /// 송신 소켓 주소
    pub fn outbound_addr(&self) -> Result<SocketAddr> {
        Ok(self.outbound.local_addr()?)
    }
}

impl Transport for UdpLink {
    async fn send(&self, data: &[u8]) -> Result<()> {
        match self.outbound.send(data).await {
            Ok(_) => Ok(()),
            // 피어가 아직 없거나 사라짐: 손실과 같게 취급
            Err(e) if is_transient_io_error(&e) => {
                debug!("송신 실패 (손실로 간주): {}", e);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.inbound.recv(buf).await {
                Ok(len) => return Ok(len),
                Err(e) if is_transient_io_error(&e) => {
                    debug!("수신 에러 무시: {}", e);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
