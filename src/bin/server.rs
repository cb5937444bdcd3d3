//! SRFP 서버 (송신자) - Selective Repair File Protocol
//!
//! 루트 디렉터리 아래 파일을 요청한 클라이언트에게 버스트 전송하고
//! `RETRANS` 요청에 개별 세그먼트를 다시 보낸다.
//!
//! 사용법:
//!   cargo run --release --bin srfp-server -- [OPTIONS]
//!
//! 예시:
//!   # 현재 디렉터리 제공
//!   cargo run --release --bin srfp-server
//!
//!   # 다른 포트, 페이싱 없이
//!   cargo run --release --bin srfp-server -- --bind 0.0.0.0:9000 --root ./files --send-interval-us 0

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use srfp::{Config, Sender, UdpTransport, DEFAULT_PAYLOAD_SIZE};

/// SRFP Server - UDP 파일 다운로드 서버
#[derive(Parser, Debug)]
#[command(name = "srfp-server", version, about)]
struct Args {
    /// 바인드 주소
    #[arg(short, long, default_value = "0.0.0.0:9999")]
    bind: SocketAddr,

    /// 파일 루트 디렉터리
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// 세그먼트 페이로드 크기 (바이트)
    #[arg(long, default_value_t = DEFAULT_PAYLOAD_SIZE)]
    payload_size: usize,

    /// 세그먼트 전송 간격 (마이크로초, 0이면 페이싱 없음)
    #[arg(long, default_value_t = 1000)]
    send_interval_us: u64,

    /// 디버그 로그 출력
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 로깅 설정 (RUST_LOG 우선)
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config {
        payload_size: args.payload_size,
        send_interval_us: args.send_interval_us,
        ..Config::default()
    };
    config.validate()?;

    info!("SRFP Server starting...");
    info!("Root directory: {:?}", args.root);
    info!("Payload size: {} bytes", config.payload_size);
    info!("Send interval: {:?}", config.send_interval());

    let transport = UdpTransport::bind(args.bind).await?;
    let mut sender = Sender::new(config, args.root, transport);
    sender.run().await?;

    Ok(())
}
