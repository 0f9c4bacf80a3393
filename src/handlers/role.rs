//! 角色、权限目录与角色申请的 HTTP 处理器

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

use crate::{
    error::AppError,
    middleware::{ActorContext, AppState},
    models::role::*,
};

#[derive(Debug, Deserialize)]
pub struct RoleRequestListQuery {
    pub status: Option<RoleRequestStatus>,
}

/// 权限目录
pub async fn list_permission_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let categories = state.role_service.list_permission_categories().await;
    Ok(Json(json!({ "categories": categories })))
}

/// 列出角色
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<RoleListFilters>,
) -> Result<impl IntoResponse, AppError> {
    let roles = state.role_service.list_roles(filters).await;
    Ok(Json(json!({
        "count": roles.len(),
        "roles": roles,
    })))
}

/// 创建角色
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    actor: ActorContext,
    Json(req): Json<CreateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let role = state.role_service.create_role(req, &actor.actor_id).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// 获取角色详情
pub async fn get_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let role = state.role_service.get_role(&id).await?;
    Ok(Json(role))
}

/// 更新角色
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let role = state.role_service.update_role(&id, req).await?;
    Ok(Json(role))
}

/// 替换角色权限集
pub async fn update_role_permissions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRolePermissionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = state.role_service.update_role_permissions(&id, req).await?;
    Ok(Json(role))
}

/// 删除角色
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.role_service.delete_role(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==================== Role Requests ====================

pub async fn list_role_requests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RoleRequestListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let requests = state.role_service.list_role_requests(query.status).await;
    Ok(Json(json!({
        "count": requests.len(),
        "requests": requests,
    })))
}

/// 提交角色申请
pub async fn submit_role_request(
    State(state): State<Arc<AppState>>,
    actor: ActorContext,
    Json(req): Json<SubmitRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let request = state
        .role_service
        .submit_role_request(req, &actor.actor_id)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// 批准角色申请
pub async fn approve_role_request(
    State(state): State<Arc<AppState>>,
    actor: ActorContext,
    Path(id): Path<String>,
    body: Option<Json<DecideRoleRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let decision = body.map(|Json(d)| d).unwrap_or_default();
    let (request, role) = state
        .role_service
        .approve_role_request(&id, &actor.actor_id, decision)
        .await?;

    Ok(Json(json!({
        "request": request,
        "role": role,
    })))
}

/// 拒绝角色申请
pub async fn reject_role_request(
    State(state): State<Arc<AppState>>,
    actor: ActorContext,
    Path(id): Path<String>,
    body: Option<Json<DecideRoleRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let decision = body.map(|Json(d)| d).unwrap_or_default();
    let request = state
        .role_service
        .reject_role_request(&id, &actor.actor_id, decision)
        .await?;
    Ok(Json(request))
}
