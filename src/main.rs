//! 校园组织目录服务主入口

use campus_rbac::{
    config::AppConfig, handlers::health, middleware::AppState, repository::Directory, routes,
    telemetry,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("campus-rbac {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 按优先级加载：.env.<CAMPUS_ENV> 或 .env.local > .env
    if let Ok(env) = std::env::var("CAMPUS_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
    }
    dotenv::dotenv().ok();

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志与指标
    telemetry::init_telemetry(&config);
    telemetry::init_metrics();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "campus-rbac starting...");

    // 3. 目录（含系统角色）
    let directory = Directory::from_config(&config.directory)?;
    tracing::info!(
        roles = directory.roles().len(),
        cascade_deactivation = config.directory.cascade_deactivation,
        "Directory initialized"
    );

    // 4. 应用状态
    let app_state = Arc::new(AppState::new(config.clone(), directory.into_shared()));

    // 5. 后台过期扫描
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = config.sweep.enabled.then(|| {
        app_state
            .attribution_service
            .clone()
            .spawn_sweeper(Duration::from_secs(config.sweep.interval_secs), shutdown_rx)
    });

    // 6. 启动服务器
    let app = routes::create_router(app_state.clone());
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 7. 优雅关闭
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper {
        let timeout = Duration::from_secs(config.server.graceful_shutdown_timeout_secs);
        if tokio::time::timeout(timeout, handle).await.is_err() {
            tracing::warn!("Graceful shutdown timeout reached, abandoning expiration sweeper");
        }
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }
}

/// 打印帮助信息
fn print_help() {
    println!("campus-rbac {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: campus-rbac [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 CAMPUS_ 前缀的环境变量完成，例如");
    println!("  CAMPUS_SERVER__ADDR=0.0.0.0:3000");
    println!("  CAMPUS_SWEEP__INTERVAL_SECS=300");
    println!("  CAMPUS_DIRECTORY__CASCADE_DEACTIVATION=true");
}
