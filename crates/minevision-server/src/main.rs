//! MineVision 后端服务入口
//!
//! 启动流程：日志 → 应用配置 → 运行时依赖检查 → 摄像头注册 → HTTP 服务。
//! ctrl-c 时先停止所有摄像头处理器再退出。

mod error;
mod response;
mod routes;
mod state;

use anyhow::Result;
use clap::Parser;
use minevision_core::{init_logging, load_camera_records, AppConfig, LoggerConfig, StreamManager};
use state::AppState;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// MineVision 多路视频增强后端
#[derive(Parser, Debug)]
#[command(name = "minevision-server", version, about)]
struct Args {
    /// 应用配置文件路径
    #[arg(long, default_value = "config/minevision.toml")]
    config: PathBuf,

    /// 覆盖监听地址
    #[arg(long)]
    host: Option<String>,

    /// 覆盖监听端口
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&LoggerConfig::default())?;

    let mut config = AppConfig::load_or_default(&args.config);
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    check_ffmpeg();

    let manager = Arc::new(StreamManager::new(config.stream.to_stream_config()));

    let records = load_camera_records(
        &config.registry.camera_info_path,
        &config.registry.rtsp_path,
    );
    if records.is_empty() {
        warn!("没有可用的摄像头配置");
    }
    for record in &records {
        manager.register_camera(
            &record.info.camera_id,
            &record.rtsp_url,
            record.info.lut_path.clone().map(PathBuf::from),
            record.info.name.as_deref(),
            record.info.location.as_deref(),
        );
    }

    let state = AppState {
        manager: Arc::clone(&manager),
        cameras: Arc::new(records),
        stream: config.stream.clone(),
    };

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP 服务监听于 http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("收到退出信号，停止所有摄像头");
            let manager = Arc::clone(&manager);
            tokio::task::spawn_blocking(move || manager.stop_all()).await?;
        }
    }

    Ok(())
}

/// 运行时依赖检查：ffmpeg 缺失只告警，不阻止启动
fn check_ffmpeg() {
    let status = Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(s) if s.success() => info!("ffmpeg 可用"),
        _ => warn!("未找到 ffmpeg，RTSP 解码将不可用"),
    }
}
