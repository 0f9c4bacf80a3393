//! HTTP 处理器模块

pub mod attribution;
pub mod element;
pub mod health;
pub mod permission;
pub mod role;
pub mod search;
pub mod unit;
