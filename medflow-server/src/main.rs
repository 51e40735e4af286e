//! MedFlow服务器主程序

mod config;

use clap::Parser;
use medflow_broadcast::{BroadcastRouter, SubscriptionManager};
use medflow_core::{NewHospital, Result};
use medflow_queue::{EngineConfig, InMemoryDoctorDirectory, QueueEngine};
use medflow_store::{MemoryPatientStore, TenantRegistry};
use medflow_web::{AppState, WebServer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::ServerConfig;

/// MedFlow服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "medflow-server")]
#[command(about = "MedFlow 多租户门诊排队与实时看板服务器")]
struct Args {
    /// 监听主机（覆盖配置文件）
    #[arg(long)]
    host: Option<String>,

    /// 监听端口（覆盖配置文件）
    #[arg(short, long)]
    port: Option<u16>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&args.log_level))
        .init();

    info!("启动MedFlow服务器...");

    let mut cfg = ServerConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        cfg.host = host;
    }
    if let Some(port) = args.port {
        cfg.port = port;
    }

    info!("MedFlow服务器配置:");
    info!("  监听地址: {}:{}", cfg.host, cfg.port);
    info!("  操作时限: {}s", cfg.request_timeout_secs);
    match cfg.doctor_capacity {
        Some(capacity) => info!("  医生接诊上限: {}", capacity),
        None => info!("  医生接诊上限: 未启用"),
    }

    // 组装核心组件
    let registry = Arc::new(TenantRegistry::new());
    let directory = Arc::new(match cfg.doctor_capacity {
        Some(capacity) => InMemoryDoctorDirectory::with_capacity(capacity),
        None => InMemoryDoctorDirectory::new(),
    });
    let store = Arc::new(MemoryPatientStore::new());
    let subscriptions = Arc::new(SubscriptionManager::new(registry.clone()));
    let router = Arc::new(BroadcastRouter::new(subscriptions.clone()));
    let engine = Arc::new(QueueEngine::with_config(
        registry.clone(),
        directory.clone(),
        store,
        router.clone(),
        EngineConfig {
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
        },
    ));

    if cfg.seed_demo {
        let hospital = registry
            .register(NewHospital {
                name: "City Care Hospital".to_string(),
                email: "demo@medflow.local".to_string(),
                phone: None,
                address: None,
            })
            .await?;
        directory.seed_defaults(hospital.id).await?;
        info!("演示租户已创建: {}", hospital.id);
    }

    let state = AppState {
        engine,
        registry,
        directory,
        subscriptions,
        router,
    };

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .map_err(|e| medflow_core::MedflowError::Config(format!("invalid listen address: {e}")))?;

    let server = WebServer::new(addr, state);
    if let Err(e) = server.run().await {
        error!("服务器启动失败: {}", e);
        return Err(e);
    }

    Ok(())
}
