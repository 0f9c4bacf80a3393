//! 校园组织目录服务库
//! 单元树、角色目录、授权台账、权限解析与通用检索

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
