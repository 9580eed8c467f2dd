//! SARQ 수신자
//!
//! 채널에서 패킷을 받아 파일로 조립
//!
//! 사용법:
//!   sarq-receiver <r_in> <r_out> <c_r_in> <file>
//!
//!   r_in   - 수신자가 데이터를 받을 포트
//!   r_out  - 수신자가 ACK를 보낼 포트
//!   c_r_in - 채널의 수신자 측 수신 포트
//!   file   - 저장할 파일 (이미 존재하면 실패)

use std::path::PathBuf;

use tokio::fs::File;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sarq::config::parse_port;
use sarq::receiver::create_output;
use sarq::{Config, Error, LinkPorts, Receiver, UdpLink};

const USAGE: &str = "usage: sarq-receiver <r_in> <r_out> <c_r_in> <file>";

/// 수신자 실행 인자
struct ReceiverArgs {
    ports: LinkPorts,
    output_path: PathBuf,
}

fn parse_args(args: &[String]) -> sarq::Result<ReceiverArgs> {
    if args.len() != 5 {
        return Err(Error::InvalidArguments(format!(
            "expected 4 arguments, got {}",
            args.len().saturating_sub(1)
        )));
    }

    Ok(ReceiverArgs {
        ports: LinkPorts {
            in_port: parse_port(&args[1])?,
            out_port: parse_port(&args[2])?,
            peer_port: parse_port(&args[3])?,
        },
        output_path: PathBuf::from(&args[4]),
    })
}

/// 링크를 먼저 연결한 뒤 출력 파일 생성
///
/// 연결에 실패하면 파일을 만들지 않으므로 같은 경로로 다시 실행할 수 있다.
async fn open_session(args: &ReceiverArgs, config: &Config) -> sarq::Result<(UdpLink, File)> {
    let link = UdpLink::establish(args.ports, config).await?;
    let output = create_output(&args.output_path).await?;
    Ok((link, output))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args: Vec<String> = std::env::args().collect();
    let receiver_args = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            std::process::exit(1);
        }
    };

    let config = Config::default();
    let (link, output) = match open_session(&receiver_args, &config).await {
        Ok(session) => session,
        Err(e @ Error::FileConflict { .. }) => {
            error!("{}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };
    info!("Writing to {:?}", receiver_args.output_path);

    let mut receiver = Receiver::new(link, output, config);
    let stats = receiver.run().await?;

    info!("Done: {}", stats.summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args: Vec<String> = ["sarq-receiver", "7001", "7002", "6003", "out.bin"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let parsed = parse_args(&args).unwrap();
        assert_eq!(parsed.ports.out_port, 7002);
        assert_eq!(parsed.output_path, PathBuf::from("out.bin"));
    }

    #[tokio::test]
    async fn test_failed_link_leaves_no_output_file() {
        let holder = tokio::net::UdpSocket::bind(sarq::transport::local_addr(0))
            .await
            .unwrap();
        let taken = holder.local_addr().unwrap().port();

        let dir = tempfile::tempdir().unwrap();
        let args = ReceiverArgs {
            ports: LinkPorts {
                in_port: taken,
                out_port: 0,
                peer_port: 40000,
            },
            output_path: dir.path().join("out.bin"),
        };

        let err = open_session(&args, &Config::fast()).await.unwrap_err();
        assert!(matches!(err, Error::TransportUnavailable { .. }));
        assert!(!args.output_path.exists());
    }

    #[tokio::test]
    async fn test_existing_output_is_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"keep").unwrap();

        let args = ReceiverArgs {
            ports: LinkPorts {
                in_port: 0,
                out_port: 0,
                peer_port: 40000,
            },
            output_path: path.clone(),
        };

        let err = open_session(&args, &Config::fast()).await.unwrap_err();
        assert!(matches!(err, Error::FileConflict { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"keep");
    }
}
