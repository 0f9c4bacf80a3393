//! 统一错误模型
//! 定义目录服务的错误分类和错误响应格式

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Role {0} is a system role and cannot be modified")]
    ImmutableRole(String),

    #[error("Role {role_id} is still referenced by {count} attribution(s)")]
    RoleInUse { role_id: String, count: usize },

    #[error("Illegal status transition: {action} from {from}")]
    StateTransition { from: String, action: String },

    #[error("Attribution {existing_id} already covers this user, role and scope")]
    Overlap { existing_id: String },

    #[error("Cycle detected: unit {unit_id} cannot be placed under {parent_id}")]
    CycleDetected { unit_id: String, parent_id: String },

    #[error("Version conflict on {entity} {id}: expected {expected}, found {actual}")]
    VersionConflict {
        entity: &'static str,
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ImmutableRole(_) => StatusCode::FORBIDDEN,
            AppError::RoleInUse { .. }
            | AppError::StateTransition { .. }
            | AppError::Overlap { .. }
            | AppError::VersionConflict { .. } => StatusCode::CONFLICT,
            AppError::CycleDetected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 稳定的机器可读错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::ImmutableRole(_) => "IMMUTABLE_ROLE",
            AppError::RoleInUse { .. } => "ROLE_IN_USE",
            AppError::StateTransition { .. } => "STATE_TRANSITION",
            AppError::Overlap { .. } => "OVERLAP",
            AppError::CycleDetected { .. } => "CYCLE_DETECTED",
            AppError::VersionConflict { .. } => "VERSION_CONFLICT",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Config(_) | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 获取用户友好的错误消息（不包含内部细节）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(_) => "Configuration error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// 调用方能否通过修正输入或重试来恢复
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AppError::CycleDetected { .. } | AppError::Config(_) | AppError::Internal(_)
        )
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }

    // 便捷方法
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn internal_error(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub error_code: &'static str,
    pub message: String,
    pub request_id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                error_code: self.error_code(),
                message: self.user_message(),
                request_id,
            },
        };

        if status.is_server_error() {
            tracing::error!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Application error"
            );
        } else {
            tracing::warn!(
                code = self.code(),
                error_code = self.error_code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Request rejected"
            );
        }

        (status, Json(error_response)).into_response()
    }
}

/// 从 validator 的校验错误转换
impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}
