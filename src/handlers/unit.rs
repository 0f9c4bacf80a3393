//! 组织单元的 HTTP 处理器

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{error::AppError, middleware::AppState, models::unit::*};

#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    pub root_id: Option<String>,
}

/// 列出单元
pub async fn list_units(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<UnitListFilters>,
) -> Result<impl IntoResponse, AppError> {
    let units = state.unit_service.list_units(filters).await;

    Ok(Json(json!({
        "count": units.len(),
        "units": units,
    })))
}

/// 创建单元
pub async fn create_unit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUnitRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let unit = state.unit_service.insert_unit(req).await?;

    Ok((StatusCode::CREATED, Json(unit)))
}

/// 单元树
pub async fn get_unit_tree(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TreeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let tree = state
        .unit_service
        .get_unit_tree(query.root_id.as_deref())
        .await?;

    Ok(Json(json!({ "roots": tree })))
}

/// 获取单元详情
pub async fn get_unit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let unit = state.unit_service.get_unit(&id).await?;
    Ok(Json(unit))
}

/// 更新单元（可移动到新的父单元）
pub async fn update_unit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUnitRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let unit = state.unit_service.update_unit(&id, req).await?;
    Ok(Json(unit))
}

/// 停用单元
pub async fn deactivate_unit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<DeactivateUnitRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let version = body.and_then(|Json(req)| req.version);
    let unit = state.unit_service.deactivate(&id, version).await?;
    Ok(Json(unit))
}

pub async fn get_children(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let units = state.unit_service.get_children(&id).await?;
    Ok(Json(json!({ "count": units.len(), "units": units })))
}

pub async fn get_ancestors(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let units = state.unit_service.get_ancestors(&id).await?;
    Ok(Json(json!({ "count": units.len(), "units": units })))
}

pub async fn get_descendants(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let units = state.unit_service.get_descendants(&id).await?;
    Ok(Json(json!({ "count": units.len(), "units": units })))
}
