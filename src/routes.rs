//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer};

use crate::{handlers, middleware::AppState};

/// 请求体上限
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::metrics_export));

    // 组织单元
    let unit_routes = Router::new()
        .route(
            "/api/v1/units",
            get(handlers::unit::list_units).post(handlers::unit::create_unit),
        )
        .route("/api/v1/units/tree", get(handlers::unit::get_unit_tree))
        .route(
            "/api/v1/units/{id}",
            get(handlers::unit::get_unit).put(handlers::unit::update_unit),
        )
        .route(
            "/api/v1/units/{id}/deactivate",
            post(handlers::unit::deactivate_unit),
        )
        .route("/api/v1/units/{id}/children", get(handlers::unit::get_children))
        .route("/api/v1/units/{id}/ancestors", get(handlers::unit::get_ancestors))
        .route(
            "/api/v1/units/{id}/descendants",
            get(handlers::unit::get_descendants),
        );

    // 角色与权限目录
    let role_routes = Router::new()
        .route(
            "/api/v1/permissions",
            get(handlers::role::list_permission_categories),
        )
        .route(
            "/api/v1/roles",
            get(handlers::role::list_roles).post(handlers::role::create_role),
        )
        .route(
            "/api/v1/roles/{id}",
            get(handlers::role::get_role)
                .put(handlers::role::update_role)
                .delete(handlers::role::delete_role),
        )
        .route(
            "/api/v1/roles/{id}/permissions",
            put(handlers::role::update_role_permissions),
        )
        .route(
            "/api/v1/role-requests",
            get(handlers::role::list_role_requests).post(handlers::role::submit_role_request),
        )
        .route(
            "/api/v1/role-requests/{id}/approve",
            post(handlers::role::approve_role_request),
        )
        .route(
            "/api/v1/role-requests/{id}/reject",
            post(handlers::role::reject_role_request),
        );

    // 元素
    let element_routes = Router::new()
        .route(
            "/api/v1/elements",
            get(handlers::element::list_elements).post(handlers::element::create_element),
        )
        .route("/api/v1/elements/{id}", get(handlers::element::get_element))
        .route(
            "/api/v1/elements/{id}/deactivate",
            post(handlers::element::deactivate_element),
        );

    // 授权与权限解析
    let attribution_routes = Router::new()
        .route(
            "/api/v1/attributions",
            get(handlers::attribution::list_attributions)
                .post(handlers::attribution::create_attribution),
        )
        .route(
            "/api/v1/attributions/sweep",
            post(handlers::attribution::sweep_expirations),
        )
        .route(
            "/api/v1/attributions/{id}",
            get(handlers::attribution::get_attribution),
        )
        .route(
            "/api/v1/attributions/{id}/status",
            post(handlers::attribution::change_status),
        )
        .route(
            "/api/v1/users/{user_id}/permissions",
            get(handlers::permission::resolve_permissions),
        );

    let search_routes = Router::new().route("/api/v1/search", post(handlers::search::search));

    Router::new()
        .merge(public_routes)
        .merge(unit_routes)
        .merge(role_routes)
        .merge(element_routes)
        .merge(attribution_routes)
        .merge(search_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(axum::middleware::from_fn(crate::middleware::request_tracking_middleware))
        .with_state(state)
}
