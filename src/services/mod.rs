//! Business logic services layer

pub mod attribution_service;
pub mod element_service;
pub mod permission_service;
pub mod role_service;
pub mod search_service;
pub mod unit_service;

pub use attribution_service::AttributionService;
pub use element_service::ElementService;
pub use permission_service::PermissionService;
pub use role_service::RoleService;
pub use search_service::SearchService;
pub use unit_service::UnitService;
