//! 授权记录的 HTTP 处理器

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::AppError,
    middleware::{ActorContext, AppState},
    models::attribution::*,
};

/// 列出授权记录
pub async fn list_attributions(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<AttributionListFilters>,
) -> Result<impl IntoResponse, AppError> {
    let attributions = state.attribution_service.list_attributions(filters).await;
    Ok(Json(json!({
        "count": attributions.len(),
        "attributions": attributions,
    })))
}

/// 授予角色
pub async fn create_attribution(
    State(state): State<Arc<AppState>>,
    actor: ActorContext,
    Json(req): Json<CreateAttributionRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let attribution = state
        .attribution_service
        .create_attribution(req, &actor.actor_id)
        .await?;
    Ok((StatusCode::CREATED, Json(attribution)))
}

pub async fn get_attribution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let attribution = state.attribution_service.get_attribution(&id).await?;
    Ok(Json(attribution))
}

/// 状态变更（approve / reject / suspend / resume / revoke）
pub async fn change_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attribution = state
        .attribution_service
        .change_status(&id, req.action, req.version)
        .await?;
    Ok(Json(attribution))
}

/// 立即执行一次过期扫描
pub async fn sweep_expirations(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let report = state.attribution_service.sweep_expirations(Utc::now()).await;
    Ok(Json(report))
}
