//! 有效权限查询

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{error::AppError, middleware::AppState};

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub unit_id: Option<String>,
}

/// 解析用户在单元上的有效权限
pub async fn resolve_permissions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<ResolveQuery>,
) -> Result<impl IntoResponse, AppError> {
    let unit_id = query
        .unit_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("unit_id query parameter is required".to_string()))?;

    let effective = state
        .permission_service
        .resolve(&user_id, &unit_id)
        .await?;
    Ok(Json(effective))
}
