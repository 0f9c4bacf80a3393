//! 测试公共模块
//! 提供测试配置、示例目录和 HTTP 辅助函数

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use campus_rbac::{
    config::{
        AppConfig, DirectoryConfig, LoggingConfig, ResolverConfig, SearchConfig, ServerConfig,
        SweepConfig,
    },
    middleware::AppState,
    models::{
        attribution::{CreateAttributionRequest, ScopeType},
        role::CreateRoleRequest,
        unit::{CreateUnitRequest, UnitType},
    },
    repository::Directory,
    routes,
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// 创建测试配置
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(), // 使用随机端口
            graceful_shutdown_timeout_secs: 5,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        directory: DirectoryConfig {
            cascade_deactivation: true,
            seed_system_roles: true,
        },
        sweep: SweepConfig {
            enabled: false,
            interval_secs: 60,
        },
        search: SearchConfig {
            default_page_size: 20,
            max_page_size: 200,
        },
        resolver: ResolverConfig {
            cache_enabled: true,
            max_cache_entries: 1_000,
        },
    }
}

pub fn unit_request(id: &str, unit_type: UnitType, parent: Option<&str>) -> CreateUnitRequest {
    CreateUnitRequest {
        id: Some(id.to_string()),
        unit_type,
        name: id.to_string(),
        code: id.to_uppercase(),
        parent_id: parent.map(str::to_string),
        head: None,
        location: None,
        email: None,
        phone: None,
    }
}

pub fn role_request(id: &str, name: &str, permissions: &[&str]) -> CreateRoleRequest {
    CreateRoleRequest {
        id: Some(id.to_string()),
        name: name.to_string(),
        description: None,
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        unit_id: None,
    }
}

pub fn grant(user: &str, role: &str, scope_type: ScopeType, scope: Option<&str>) -> CreateAttributionRequest {
    CreateAttributionRequest {
        user_id: user.to_string(),
        user_name: None,
        role_id: role.to_string(),
        scope_type,
        scope_id: scope.map(str::to_string),
        start_date: None,
        end_date: None,
    }
}

/// 示例目录：
///
/// ```text
/// univ-1
/// ├── univ-1-fac-1
/// │   └── univ-1-fac-1-dep-1
/// └── univ-1-fac-2
/// ```
///
/// 以及系统角色和 `role-doyen`（unite.view_children）。
pub fn university_directory() -> Directory {
    let config = create_test_config();
    let mut dir = Directory::from_config(&config.directory).expect("seed system roles");
    let now = Utc::now();

    dir.insert_unit(unit_request("univ-1", UnitType::University, None), now)
        .expect("insert univ-1");
    dir.insert_unit(unit_request("univ-1-fac-1", UnitType::Faculty, Some("univ-1")), now)
        .expect("insert univ-1-fac-1");
    dir.insert_unit(
        unit_request("univ-1-fac-1-dep-1", UnitType::Department, Some("univ-1-fac-1")),
        now,
    )
    .expect("insert univ-1-fac-1-dep-1");
    dir.insert_unit(unit_request("univ-1-fac-2", UnitType::Faculty, Some("univ-1")), now)
        .expect("insert univ-1-fac-2");

    dir.create_role(role_request("role-doyen", "Doyen", &["unite.view_children"]), "admin", now)
        .expect("create role-doyen");

    dir
}

/// 创建测试应用状态
pub fn create_test_app_state() -> Arc<AppState> {
    let config = create_test_config();
    Arc::new(AppState::new(config, university_directory().into_shared()))
}

pub fn create_test_app() -> (Router, Arc<AppState>) {
    let state = create_test_app_state();
    (routes::create_router(state.clone()), state)
}

/// 发送请求并解析 JSON 响应
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-actor-id", "admin-test");

    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, json)
}
