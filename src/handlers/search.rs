//! 检索处理器

use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::{error::AppError, middleware::AppState, models::search::SearchQuery};

pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(query): Json<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.search_service.search(query).await?;
    Ok(Json(result))
}
