//! SARQ 채널
//!
//! 송신자와 수신자 사이에서 패킷을 전달하며 손실을 시뮬레이션
//!
//! 사용법:
//!   sarq-channel <cs_in> <cs_out> <cr_in> <cr_out> <s_in> <r_in> <loss>
//!
//!   cs_in, cs_out - 송신자 측 수신/송신 포트
//!   cr_in, cr_out - 수신자 측 수신/송신 포트
//!   s_in          - 송신자의 수신 포트
//!   r_in          - 수신자의 수신 포트
//!   loss          - 패킷 손실 확률 (0 <= loss < 1)

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sarq::config::{parse_loss_rate, parse_port};
use sarq::{Config, Error, LinkPorts, Relay, UdpLink};

const USAGE: &str = "usage: sarq-channel <cs_in> <cs_out> <cr_in> <cr_out> <s_in> <r_in> <loss>";

/// 채널 실행 인자
struct ChannelArgs {
    sender_leg: LinkPorts,
    receiver_leg: LinkPorts,
    loss_rate: f64,
}

fn parse_args(args: &[String]) -> sarq::Result<ChannelArgs> {
    if args.len() != 8 {
        return Err(Error::InvalidArguments(format!(
            "expected 7 arguments, got {}",
            args.len().saturating_sub(1)
        )));
    }

    let cs_in = parse_port(&args[1])?;
    let cs_out = parse_port(&args[2])?;
    let cr_in = parse_port(&args[3])?;
    let cr_out = parse_port(&args[4])?;
    let s_in = parse_port(&args[5])?;
    let r_in = parse_port(&args[6])?;

    Ok(ChannelArgs {
        sender_leg: LinkPorts {
            in_port: cs_in,
            out_port: cs_out,
            peer_port: s_in,
        },
        receiver_leg: LinkPorts {
            in_port: cr_in,
            out_port: cr_out,
            peer_port: r_in,
        },
        loss_rate: parse_loss_rate(&args[7])?,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args: Vec<String> = std::env::args().collect();
    let channel_args = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            std::process::exit(1);
        }
    };

    let config = Config::default();
    let sender_leg = UdpLink::establish(channel_args.sender_leg, &config).await?;
    let receiver_leg = UdpLink::establish(channel_args.receiver_leg, &config).await?;

    info!("Packet loss: {:.1}%", channel_args.loss_rate * 100.0);

    let relay = Arc::new(Relay::new(sender_leg, receiver_leg, channel_args.loss_rate, config));
    relay.run().await?;

    Ok(())
}
