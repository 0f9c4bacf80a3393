//! 权限解析服务
//!
//! 有效权限 = 用户所有生效中的 attribution 中，作用范围覆盖目标单元的那些
//! 所引用角色的权限并集。规则：
//! - Global：对任何单元生效（包括已停用的单元）
//! - Unit：授予点及其全部后代，不向上继承
//! - Element：仅 scope_id 与目标单元完全相同时生效
//!
//! 授予点和目标单元都必须是 live 的（见 [`UnitTree::is_live`]）。
//!
//! [`UnitTree::is_live`]: crate::repository::UnitTree::is_live

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::models::attribution::{Attribution, ScopeType};
use crate::models::permission::EffectivePermissions;
use crate::repository::{Directory, SharedDirectory};

/// 一次解析的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub permissions: BTreeSet<String>,
    /// 参与计算的 attribution 中最早的截止日期，过后结果失效
    pub valid_until: Option<DateTime<Utc>>,
}

/// attribution 的作用范围是否覆盖目标单元
fn covers(dir: &Directory, attribution: &Attribution, unit_id: &str, target_live: bool) -> bool {
    let units = dir.units();
    match (attribution.scope_type, attribution.scope_id.as_deref()) {
        (ScopeType::Global, _) => true,
        (ScopeType::Unit, Some(scope_id)) => {
            target_live && units.is_live(scope_id) && units.is_ancestor_or_self(scope_id, unit_id)
        }
        (ScopeType::Element, Some(scope_id)) => target_live && scope_id == unit_id,
        (_, None) => false,
    }
}

/// 基于目录快照计算有效权限（纯函数）
pub fn resolve_effective_permissions(
    dir: &Directory,
    user_id: &str,
    unit_id: &str,
    now: DateTime<Utc>,
) -> Result<Resolution> {
    dir.units().get(unit_id)?;
    let target_live = dir.units().is_live(unit_id);

    let mut permissions = BTreeSet::new();
    let mut valid_until: Option<DateTime<Utc>> = None;

    for attribution in dir.attributions().for_user(user_id) {
        if !attribution.is_effective_at(now) || !covers(dir, attribution, unit_id, target_live) {
            continue;
        }
        let Some(role) = dir.roles().find(&attribution.role_id) else {
            continue;
        };

        permissions.extend(role.permissions.iter().cloned());
        if let Some(end) = attribution.end_date {
            valid_until = Some(valid_until.map_or(end, |current| current.min(end)));
        }
    }

    Ok(Resolution {
        permissions,
        valid_until,
    })
}

#[derive(Debug, Clone)]
struct CachedResolution {
    revision: u64,
    resolution: Resolution,
}

impl CachedResolution {
    fn is_fresh(&self, revision: u64, now: DateTime<Utc>) -> bool {
        self.revision == revision && self.resolution.valid_until.map_or(true, |end| now <= end)
    }
}

/// 权限解析服务（带按目录 revision 失效的缓存）
pub struct PermissionService {
    directory: SharedDirectory,
    cache: Option<DashMap<(String, String), CachedResolution>>,
    max_entries: usize,
}

/// 默认缓存条目上限
pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 10_000;

impl PermissionService {
    pub fn new(directory: SharedDirectory, cache_enabled: bool) -> Self {
        Self {
            directory,
            cache: cache_enabled.then(DashMap::new),
            max_entries: DEFAULT_MAX_CACHE_ENTRIES,
        }
    }

    /// 设置缓存条目上限（至少为 1）
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// 当前缓存条目数
    pub fn cached_entries(&self) -> usize {
        self.cache.as_ref().map_or(0, |cache| cache.len())
    }

    /// 解析用户在单元上的有效权限
    #[instrument(skip(self))]
    pub async fn resolve(&self, user_id: &str, unit_id: &str) -> Result<EffectivePermissions> {
        let dir = self.directory.read().await;
        let now = Utc::now();
        let revision = dir.revision();
        let key = (user_id.to_string(), unit_id.to_string());

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key).filter(|entry| entry.is_fresh(revision, now)) {
                metrics::counter!("permission_resolutions_total", "cache" => "hit").increment(1);
                return Ok(EffectivePermissions {
                    user_id: key.0,
                    unit_id: key.1,
                    permissions: hit.resolution.permissions.clone(),
                });
            }
        }

        let resolution = resolve_effective_permissions(&dir, user_id, unit_id, now)?;
        metrics::counter!("permission_resolutions_total", "cache" => "miss").increment(1);
        debug!(count = resolution.permissions.len(), revision, "Permissions resolved");

        let permissions = resolution.permissions.clone();
        // 没有任何授权记录的用户不进缓存
        let has_grants = dir.attributions().for_user(user_id).next().is_some();
        if let (Some(cache), true) = (&self.cache, has_grants) {
            // revision 变化后旧条目全部作废
            cache.retain(|_, entry| entry.revision == revision);
            if cache.len() >= self.max_entries {
                debug!(entries = cache.len(), "Resolver cache full, clearing");
                cache.clear();
            }
            cache.insert(key.clone(), CachedResolution { revision, resolution });
        }

        Ok(EffectivePermissions {
            user_id: key.0,
            unit_id: key.1,
            permissions,
        })
    }

    /// 检查单个权限
    pub async fn has_permission(&self, user_id: &str, unit_id: &str, permission_id: &str) -> Result<bool> {
        Ok(self
            .resolve(user_id, unit_id)
            .await?
            .permissions
            .contains(permission_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::attribution::{CreateAttributionRequest, StatusAction};
    use crate::models::permission::PermissionCatalog;
    use crate::models::element::CreateElementRequest;
    use crate::models::role::CreateRoleRequest;
    use crate::models::unit::{CreateUnitRequest, UnitType};
    use chrono::Duration;

    fn unit(id: &str, parent: Option<&str>) -> CreateUnitRequest {
        CreateUnitRequest {
            id: Some(id.to_string()),
            unit_type: UnitType::Department,
            name: id.to_string(),
            code: id.to_uppercase(),
            parent_id: parent.map(str::to_string),
            head: None,
            location: None,
            email: None,
            phone: None,
        }
    }

    fn grant(user: &str, role: &str, scope_type: ScopeType, scope: Option<&str>) -> CreateAttributionRequest {
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

    /// univ-1 > univ-1-fac-1 > univ-1-fac-1-dep-1, univ-1 > univ-1-fac-2
    fn directory() -> Directory {
        let now = Utc::now();
        let mut dir = Directory::new(true, PermissionCatalog::default());
        dir.insert_unit(unit("univ-1", None), now).unwrap();
        dir.insert_unit(unit("univ-1-fac-1", Some("univ-1")), now).unwrap();
        dir.insert_unit(unit("univ-1-fac-1-dep-1", Some("univ-1-fac-1")), now).unwrap();
        dir.insert_unit(unit("univ-1-fac-2", Some("univ-1")), now).unwrap();
        dir.create_role(
            CreateRoleRequest {
                id: Some("role-doyen".to_string()),
                name: "Doyen".to_string(),
                description: None,
                permissions: vec!["unite.view_children".to_string()],
                unit_id: None,
            },
            "admin",
            now,
        )
        .unwrap();
        dir.create_role(
            CreateRoleRequest {
                id: Some("role-lecteur".to_string()),
                name: "Lecteur".to_string(),
                description: None,
                permissions: vec!["unite.view".to_string()],
                unit_id: None,
            },
            "admin",
            now,
        )
        .unwrap();
        dir
    }

    fn resolve(dir: &Directory, user: &str, unit: &str) -> BTreeSet<String> {
        resolve_effective_permissions(dir, user, unit, Utc::now())
            .unwrap()
            .permissions
    }

    #[test]
    fn test_unit_scope_inherits_downward_only() {
        let mut dir = directory();
        dir.create_attribution(grant("user-doyen", "role-doyen", ScopeType::Unit, Some("univ-1-fac-1")), "admin", Utc::now())
            .unwrap();

        assert!(resolve(&dir, "user-doyen", "univ-1-fac-1").contains("unite.view_children"));
        assert!(resolve(&dir, "user-doyen", "univ-1-fac-1-dep-1").contains("unite.view_children"));
        assert!(resolve(&dir, "user-doyen", "univ-1").is_empty());
        assert!(resolve(&dir, "user-doyen", "univ-1-fac-2").is_empty());
    }

    #[test]
    fn test_element_scope_is_exact() {
        let mut dir = directory();
        dir.create_attribution(grant("u1", "role-lecteur", ScopeType::Element, Some("univ-1-fac-1")), "admin", Utc::now())
            .unwrap();

        assert!(resolve(&dir, "u1", "univ-1-fac-1").contains("unite.view"));
        assert!(resolve(&dir, "u1", "univ-1-fac-1-dep-1").is_empty());
    }

    #[test]
    fn test_element_ids_never_shadow_units() {
        let mut dir = directory();
        let now = Utc::now();

        let err = dir
            .create_element(
                CreateElementRequest {
                    id: Some("univ-1-fac-1".to_string()),
                    name: "Cours".to_string(),
                    kind: "course".to_string(),
                    unit_id: None,
                },
                now,
            )
            .unwrap_err();
        assert!(matches!(err, crate::error::AppError::Validation(_)));
        assert!(dir.elements().is_empty());

        dir.create_element(
            CreateElementRequest {
                id: Some("cours-algo".to_string()),
                name: "Algorithmique".to_string(),
                kind: "course".to_string(),
                unit_id: Some("univ-1-fac-1".to_string()),
            },
            now,
        )
        .unwrap();
        let err = dir.insert_unit(unit("cours-algo", Some("univ-1")), now).unwrap_err();
        assert!(matches!(err, crate::error::AppError::Validation(_)));
        assert!(dir.units().find("cours-algo").is_none());

        // 元素上的授权不会落到任何单元上
        dir.create_attribution(grant("u1", "role-lecteur", ScopeType::Element, Some("cours-algo")), "admin", now)
            .unwrap();
        for unit in ["univ-1", "univ-1-fac-1", "univ-1-fac-1-dep-1"] {
            assert!(resolve(&dir, "u1", unit).is_empty(), "{}", unit);
        }
    }

    #[test]
    fn test_global_scope_applies_everywhere() {
        let mut dir = directory();
        dir.create_attribution(grant("u1", "role-lecteur", ScopeType::Global, None), "admin", Utc::now())
            .unwrap();
        dir.deactivate_unit("univ-1-fac-2", None, Utc::now()).unwrap();

        for unit in ["univ-1", "univ-1-fac-1", "univ-1-fac-1-dep-1", "univ-1-fac-2"] {
            assert!(resolve(&dir, "u1", unit).contains("unite.view"), "{}", unit);
        }
    }

    #[test]
    fn test_non_active_attributions_are_ignored() {
        let mut dir = directory();
        let now = Utc::now();
        let a = dir
            .create_attribution(grant("u1", "role-lecteur", ScopeType::Unit, Some("univ-1")), "admin", now)
            .unwrap();
        dir.change_attribution_status(&a.id, StatusAction::Suspend, None, now).unwrap();
        assert!(resolve(&dir, "u1", "univ-1").is_empty());

        let mut future = grant("u2", "role-lecteur", ScopeType::Global, None);
        future.start_date = Some(now + Duration::days(1));
        dir.create_attribution(future, "admin", now).unwrap();
        assert!(resolve(&dir, "u2", "univ-1").is_empty());
    }

    #[test]
    fn test_lapsed_window_is_not_effective_before_sweep() {
        let mut dir = directory();
        let now = Utc::now();
        let mut req = grant("u1", "role-lecteur", ScopeType::Global, None);
        req.end_date = Some(now + Duration::hours(1));
        dir.create_attribution(req, "admin", now).unwrap();

        let during = resolve_effective_permissions(&dir, "u1", "univ-1", now).unwrap();
        assert!(during.permissions.contains("unite.view"));
        assert_eq!(during.valid_until, Some(now + Duration::hours(1)));

        let after = resolve_effective_permissions(&dir, "u1", "univ-1", now + Duration::hours(2)).unwrap();
        assert!(after.permissions.is_empty());
    }

    #[test]
    fn test_deactivated_grant_point_cascades() {
        let mut dir = directory();
        dir.create_attribution(grant("u1", "role-doyen", ScopeType::Unit, Some("univ-1-fac-1")), "admin", Utc::now())
            .unwrap();
        dir.deactivate_unit("univ-1-fac-1", None, Utc::now()).unwrap();

        assert!(resolve(&dir, "u1", "univ-1-fac-1").is_empty());
        assert!(resolve(&dir, "u1", "univ-1-fac-1-dep-1").is_empty());
    }

    #[test]
    fn test_unknown_unit_is_not_found() {
        let dir = directory();
        let err = resolve_effective_permissions(&dir, "u1", "nowhere", Utc::now()).unwrap_err();
        assert!(matches!(err, crate::error::AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_cache_invalidated_by_mutation() {
        let mut dir = directory();
        dir.create_attribution(grant("u1", "role-lecteur", ScopeType::Unit, Some("univ-1-fac-2")), "admin", Utc::now())
            .unwrap();
        let shared = dir.into_shared();
        let service = PermissionService::new(shared.clone(), true);

        assert!(!service.has_permission("u1", "univ-1", "unite.view").await.unwrap());
        assert_eq!(service.cached_entries(), 1);

        shared
            .write()
            .await
            .create_attribution(grant("u1", "role-lecteur", ScopeType::Global, None), "admin", Utc::now())
            .unwrap();

        assert!(service.has_permission("u1", "univ-1", "unite.view").await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_skips_users_without_grants() {
        let service = PermissionService::new(directory().into_shared(), true);

        for i in 0..500 {
            let resolved = service.resolve(&format!("stranger-{}", i), "univ-1").await.unwrap();
            assert!(resolved.permissions.is_empty());
        }
        assert_eq!(service.cached_entries(), 0);
    }

    #[tokio::test]
    async fn test_cache_size_is_capped() {
        let mut dir = directory();
        for i in 0..20 {
            dir.create_attribution(grant(&format!("u{}", i), "role-lecteur", ScopeType::Global, None), "admin", Utc::now())
                .unwrap();
        }
        let service = PermissionService::new(dir.into_shared(), true).with_max_entries(8);

        for i in 0..20 {
            for unit in ["univ-1", "univ-1-fac-1", "univ-1-fac-2"] {
                assert!(service
                    .has_permission(&format!("u{}", i), unit, "unite.view")
                    .await
                    .unwrap());
                assert!(service.cached_entries() <= 8);
            }
        }
    }
}
