//! 元素登记的 HTTP 处理器

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::{error::AppError, middleware::AppState, models::element::*};

pub async fn list_elements(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<ElementListFilters>,
) -> Result<impl IntoResponse, AppError> {
    let elements = state.element_service.list_elements(filters).await;
    Ok(Json(json!({
        "count": elements.len(),
        "elements": elements,
    })))
}

pub async fn create_element(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateElementRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let element = state.element_service.create_element(req).await?;
    Ok((StatusCode::CREATED, Json(element)))
}

pub async fn get_element(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let element = state.element_service.get_element(&id).await?;
    Ok(Json(element))
}

pub async fn deactivate_element(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let element = state.element_service.deactivate_element(&id).await?;
    Ok(Json(element))
}
