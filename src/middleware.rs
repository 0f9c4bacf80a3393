//! HTTP 中间件
//! 请求追踪与操作者上下文

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::repository::SharedDirectory;
use crate::services::{
    AttributionService, ElementService, PermissionService, RoleService, SearchService, UnitService,
};

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub directory: SharedDirectory,
    pub unit_service: Arc<UnitService>,
    pub role_service: Arc<RoleService>,
    pub element_service: Arc<ElementService>,
    pub attribution_service: Arc<AttributionService>,
    pub permission_service: Arc<PermissionService>,
    pub search_service: Arc<SearchService>,
}

impl AppState {
    /// 基于共享目录装配所有服务
    pub fn new(config: AppConfig, directory: SharedDirectory) -> Self {
        Self {
            unit_service: Arc::new(UnitService::new(directory.clone())),
            role_service: Arc::new(RoleService::new(directory.clone())),
            element_service: Arc::new(ElementService::new(directory.clone())),
            attribution_service: Arc::new(AttributionService::new(directory.clone())),
            permission_service: Arc::new(
                PermissionService::new(directory.clone(), config.resolver.cache_enabled)
                    .with_max_entries(config.resolver.max_cache_entries),
            ),
            search_service: Arc::new(SearchService::new(directory.clone(), config.search.clone())),
            directory,
            config,
        }
    }
}

/// 发起变更的操作者，取自 `x-actor-id` 头
///
/// 仅用于填写 createdBy/requestedBy 等字段，不做身份认证。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    pub actor_id: String,
}

pub const ACTOR_HEADER: &str = "x-actor-id";
const DEFAULT_ACTOR: &str = "system";

impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor_id = match parts.headers.get(ACTOR_HEADER) {
            None => DEFAULT_ACTOR.to_string(),
            Some(value) => {
                let value = value
                    .to_str()
                    .map_err(|_| AppError::BadRequest(format!("{} must be valid ASCII", ACTOR_HEADER)))?
                    .trim();
                if value.is_empty() {
                    DEFAULT_ACTOR.to_string()
                } else {
                    value.to_string()
                }
            }
        };

        Ok(ActorContext { actor_id })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let uri = req.uri().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();
        let mut response = next.run(req).await;
        let elapsed = start.elapsed();

        // 指标标签只使用静态字符串
        let status = response.status().as_u16();
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            _ => "UNKNOWN",
        };
        let status_class = match status {
            200..=299 => "2xx",
            300..=399 => "3xx",
            400..=499 => "4xx",
            _ => "5xx",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_class).increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
