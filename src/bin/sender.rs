//! SARQ 송신자
//!
//! 파일을 읽어 채널을 통해 수신자에게 stop-and-wait 방식으로 전송
//!
//! 사용법:
//!   sarq-sender <s_in> <s_out> <c_s_in> <file>
//!
//!   s_in   - 송신자가 ACK를 받을 포트
//!   s_out  - 송신자가 데이터를 보낼 포트
//!   c_s_in - 채널의 송신자 측 수신 포트
//!   file   - 전송할 파일

use std::path::PathBuf;

use bytes::Bytes;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sarq::config::parse_port;
use sarq::{Config, Error, LinkPorts, Sender, UdpLink};

const USAGE: &str = "usage: sarq-sender <s_in> <s_out> <c_s_in> <file>";

/// 송신자 실행 인자
struct SenderArgs {
    ports: LinkPorts,
    file_path: PathBuf,
}

fn parse_args(args: &[String]) -> sarq::Result<SenderArgs> {
    if args.len() != 5 {
        return Err(Error::InvalidArguments(format!(
            "expected 4 arguments, got {}",
            args.len().saturating_sub(1)
        )));
    }

    Ok(SenderArgs {
        ports: LinkPorts {
            in_port: parse_port(&args[1])?,
            out_port: parse_port(&args[2])?,
            peer_port: parse_port(&args[3])?,
        },
        file_path: PathBuf::from(&args[4]),
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
    let sender_args = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            std::process::exit(1);
        }
    };

    // 소켓보다 파일을 먼저 확인
    info!("Loading file: {:?}", sender_args.file_path);
    let data = tokio::fs::read(&sender_args.file_path).await?;
    info!("Data size: {} bytes", data.len());

    let config = Config::default();
    let link = UdpLink::establish(sender_args.ports, &config).await?;

    let mut sender = Sender::new(link, config);
    let stats = sender.send_file(Bytes::from(data)).await?;

    info!("Done: {}", stats.summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let parsed = parse_args(&args(&["sarq-sender", "5001", "5002", "6001", "in.bin"])).unwrap();
        assert_eq!(parsed.ports.in_port, 5001);
        assert_eq!(parsed.ports.peer_port, 6001);
        assert_eq!(parsed.file_path, PathBuf::from("in.bin"));
    }

    #[test]
    fn test_parse_args_rejects_bad_input() {
        assert!(parse_args(&args(&["sarq-sender", "5001"])).is_err());
        assert!(matches!(
            parse_args(&args(&["sarq-sender", "80", "5002", "6001", "in.bin"])),
            Err(Error::InvalidPort(_))
        ));
    }
}
