//! 健康检查处理器
//! 提供 /health、/ready 和 /metrics 端点

use axum::{extract::State, Json};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::middleware::AppState;

/// 存活探针响应
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// 就绪探针响应
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: Vec<HealthCheck>,
}

/// 健康检查项
#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 目录规模与缓存状态
#[derive(Serialize)]
pub struct MetricsResponse {
    pub units: usize,
    pub roles: usize,
    pub attributions: usize,
    pub elements: usize,
    pub revision: u64,
    pub resolver_cache_entries: usize,
    pub process_uptime_secs: u64,
}

static APP_START_TIME: OnceCell<Instant> = OnceCell::new();

/// 记录应用启动时间（main 中调用一次）
pub fn set_start_time() {
    let _ = APP_START_TIME.set(Instant::now());
}

/// 获取应用运行时间（秒）
pub fn get_uptime() -> u64 {
    APP_START_TIME.get().map_or(0, |start| start.elapsed().as_secs())
}

/// 存活探针
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: get_uptime(),
    })
}

/// 就绪探针
/// 目录锁在限定时间内可读即视为就绪
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> Json<ReadinessResponse> {
    let mut checks = Vec::new();

    let directory = tokio::time::timeout(Duration::from_secs(2), state.directory.read()).await;
    checks.push(match directory {
        Ok(dir) => HealthCheck {
            name: "directory".to_string(),
            status: "healthy".to_string(),
            message: Some(format!("revision {}", dir.revision())),
        },
        Err(_) => HealthCheck {
            name: "directory".to_string(),
            status: "unhealthy".to_string(),
            message: Some("directory lock not acquired within 2s".to_string()),
        },
    });

    let all_healthy = checks.iter().all(|c| c.status == "healthy");

    Json(ReadinessResponse {
        ready: all_healthy,
        checks,
    })
}

/// 指标暴露端点
pub async fn metrics_export(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    let dir = state.directory.read().await;

    Json(MetricsResponse {
        units: dir.units().len(),
        roles: dir.roles().len(),
        attributions: dir.attributions().len(),
        elements: dir.elements().len(),
        revision: dir.revision(),
        resolver_cache_entries: state.permission_service.cached_entries(),
        process_uptime_secs: get_uptime(),
    })
}
