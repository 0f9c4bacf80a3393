//! 数据模型模块
//! 单元树、权限目录、角色、attribution、业务元素以及检索查询模型

pub mod attribution;
pub mod element;
pub mod permission;
pub mod role;
pub mod search;
pub mod unit;
