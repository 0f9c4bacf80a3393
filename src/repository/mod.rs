//! In-memory repository layer

pub mod attribution_repo;
pub mod collection;
pub mod directory;
pub mod element_repo;
pub mod role_repo;
pub mod unit_repo;

pub use attribution_repo::*;
pub use directory::*;
pub use element_repo::*;
pub use role_repo::*;
pub use unit_repo::*;

/// 生成带前缀的记录 id，例如 `attr-5f0c...`
pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}
