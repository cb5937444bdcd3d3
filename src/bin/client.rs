//! SRFP 클라이언트 (수신자) - Selective Repair File Protocol
//!
//! 서버에 파일을 요청하고 누락 세그먼트만 `RETRANS`로 복구한다.
//!
//! 사용법:
//!   cargo run --release --bin srfp-client -- [OPTIONS] <FILE>
//!
//! 예시:
//!   # 기본 수신
//!   cargo run --release --bin srfp-client -- --server 127.0.0.1:9999 data.bin
//!
//!   # 20% 손실 시뮬레이션 + 재시도 10회
//!   cargo run --release --bin srfp-client -- data.bin --loss 0.2 --max-retries 10

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use srfp::{Config, LossyTransport, Receiver, UdpTransport};

/// SRFP Client - UDP 파일 다운로드 클라이언트
#[derive(Parser, Debug)]
#[command(name = "srfp-client", version, about)]
struct Args {
    /// 요청할 파일명 (서버 루트 기준)
    file: String,

    /// 서버 주소
    #[arg(short, long, default_value = "127.0.0.1:9999")]
    server: SocketAddr,

    /// 저장 경로 (기본: 요청 파일명)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 로컬 바인드 주소
    #[arg(short, long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,

    /// 수신 손실 시뮬레이션 확률 (0.0 ~ 1.0)
    #[arg(long, default_value_t = 0.0)]
    loss: f64,

    /// 스트리밍 무활동 타임아웃 (밀리초)
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// 재전송 라운드당 대기 시간 (밀리초)
    #[arg(long, default_value_t = 1000)]
    repair_window_ms: u64,

    /// 최대 재전송 라운드 수
    #[arg(long, default_value_t = 5)]
    max_retries: u32,

    /// 디버그 로그 출력
    #[arg(short, long)]
    verbose: bool,
}

/// 요청 파일명의 마지막 경로 요소
fn default_output(file: &str) -> PathBuf {
    Path::new(file)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("download.bin"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config {
        streaming_timeout_ms: args.timeout_ms,
        repair_window_ms: args.repair_window_ms,
        max_retries: args.max_retries,
        loss_probability: args.loss,
        ..Config::default()
    };
    config.validate()?;

    let output = args.output.unwrap_or_else(|| default_output(&args.file));

    info!("SRFP Client starting...");
    info!("Server address: {}", args.server);
    info!("Output: {:?}", output);
    info!(
        "Worst-case duration: {:.1}s",
        config.worst_case_duration().as_secs_f64()
    );
    if config.loss_probability > 0.0 {
        info!("Simulated loss: {:.1}%", config.loss_probability * 100.0);
    }

    let socket = UdpTransport::bind(args.bind).await?;
    let transport = LossyTransport::new(socket, config.loss_probability);
    let mut receiver = Receiver::new(config, transport, args.server);

    let result = receiver.download_to(&args.file, &output).await;

    info!("{}", receiver.stats().summary());
    if receiver.transport().dropped() > 0 {
        info!("Simulated drops: {}", receiver.transport().dropped());
    }

    match result {
        Ok(bytes) => {
            info!("Transfer complete: {} bytes -> {:?}", bytes, output);
            Ok(())
        }
        Err(e) => {
            error!("Transfer failed: {}", e);
            Err(e.into())
        }
    }
}
