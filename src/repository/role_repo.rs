//! Role repository (角色目录)

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use super::collection::{Collection, Keyed};
use crate::error::{AppError, Result};
use crate::models::permission::PermissionCatalog;
use crate::models::role::*;

impl Keyed for Role {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for RoleRequest {
    fn key(&self) -> &str {
        &self.id
    }
}

/// 内置系统角色：(id, 名称, 描述, 权限；None 表示目录中的全部权限)
const SYSTEM_ROLES: &[(&str, &str, &str, Option<&[&str]>)] = &[
    (
        "role-super-admin",
        "Super Admin",
        "Accès complet à l'ensemble de l'établissement",
        None,
    ),
    (
        "role-admin-systeme",
        "Admin Système",
        "Gestion des unités, rôles et attributions",
        Some(&[
            "unite.view",
            "unite.view_children",
            "unite.create",
            "unite.edit",
            "unite.deactivate",
            "role.view",
            "role.create",
            "role.edit",
            "role.delete",
            "attribution.view",
            "attribution.create",
            "attribution.approve",
            "attribution.revoke",
        ]),
    ),
    (
        "role-observateur",
        "Observateur",
        "Consultation seule",
        Some(&["unite.view", "unite.view_children", "role.view", "attribution.view"]),
    ),
];

#[derive(Debug, Clone)]
pub struct RoleCatalog {
    roles: Collection<Role>,
    requests: Collection<RoleRequest>,
    permissions: PermissionCatalog,
}

impl RoleCatalog {
    pub fn new(permissions: PermissionCatalog) -> Self {
        Self {
            roles: Collection::new(),
            requests: Collection::new(),
            permissions,
        }
    }

    pub fn permission_catalog(&self) -> &PermissionCatalog {
        &self.permissions
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }

    pub fn find(&self, id: &str) -> Option<&Role> {
        self.roles.get(id)
    }

    /// 获取角色
    pub fn get(&self, id: &str) -> Result<&Role> {
        self.roles.get(id).ok_or_else(|| AppError::not_found("role", id))
    }

    /// 列出角色
    pub fn list(&self, filters: &RoleListFilters) -> Vec<Role> {
        self.roles
            .iter()
            .filter(|r| filters.matches(r))
            .cloned()
            .collect()
    }

    /// 校验权限 id 均在目录中
    pub fn resolve_permissions(&self, ids: &[String]) -> Result<BTreeSet<String>> {
        let unknown = self.permissions.unknown(ids);
        if !unknown.is_empty() {
            return Err(AppError::validation(format!(
                "unknown permission id(s): {}",
                unknown.join(", ")
            )));
        }
        Ok(ids.iter().cloned().collect())
    }

    /// 名称在同一作用域内唯一（忽略大小写和首尾空白）
    pub fn ensure_unique_name(&self, name: &str, unit_id: Option<&str>, exclude: Option<&str>) -> Result<()> {
        let wanted = name.trim().to_lowercase();
        let clash = self.roles.iter().any(|r| {
            Some(r.id.as_str()) != exclude
                && r.unit_id.as_deref() == unit_id
                && r.name.trim().to_lowercase() == wanted
        });
        if clash {
            return Err(AppError::validation(format!(
                "a role named '{}' already exists in scope {}",
                name.trim(),
                unit_id.unwrap_or("global")
            )));
        }
        Ok(())
    }

    /// 创建角色；调用方负责校验 unit_id 指向的单元
    pub fn create(
        &mut self,
        req: CreateRoleRequest,
        created_by: &str,
        is_system: bool,
        now: DateTime<Utc>,
    ) -> Result<Role> {
        let id = req.id.clone().unwrap_or_else(|| super::new_id("role"));
        if self.roles.contains(&id) {
            return Err(AppError::validation(format!("role id already exists: {}", id)));
        }
        if req.name.trim().is_empty() {
            return Err(AppError::validation("role name must not be blank"));
        }
        self.ensure_unique_name(&req.name, req.unit_id.as_deref(), None)?;
        let permissions = self.resolve_permissions(&req.permissions)?;

        let role = Role {
            id,
            name: req.name.trim().to_string(),
            description: req.description,
            permissions,
            is_system,
            unit_id: req.unit_id,
            user_count: 0,
            created_at: now,
            created_by: created_by.to_string(),
            updated_at: now,
            version: 1,
        };

        self.roles
            .insert(role.clone())
            .map_err(|_| AppError::internal_error("role insert raced with itself"))?;
        Ok(role)
    }

    fn check_mutable(&self, id: &str, version: u64) -> Result<&Role> {
        let role = self.get(id)?;
        if role.is_system {
            return Err(AppError::ImmutableRole(id.to_string()));
        }
        if role.version != version {
            return Err(AppError::VersionConflict {
                entity: "role",
                id: id.to_string(),
                expected: version,
                actual: role.version,
            });
        }
        Ok(role)
    }

    /// 更新角色
    pub fn update(&mut self, id: &str, req: UpdateRoleRequest, now: DateTime<Utc>) -> Result<Role> {
        let role = self.check_mutable(id, req.version)?;

        let new_name = match req.name.as_deref().map(str::trim) {
            Some("") => return Err(AppError::validation("role name must not be blank")),
            Some(name) if name != role.name => {
                self.ensure_unique_name(name, role.unit_id.as_deref(), Some(id))?;
                Some(name.to_string())
            }
            _ => None,
        };
        let permissions = match &req.permissions {
            Some(ids) => Some(self.resolve_permissions(ids)?),
            None => None,
        };

        let role = self
            .roles
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("role", id))?;
        if let Some(name) = new_name {
            role.name = name;
        }
        if req.description.is_some() {
            role.description = req.description;
        }
        if let Some(permissions) = permissions {
            role.permissions = permissions;
        }
        role.version += 1;
        role.updated_at = now;

        Ok(role.clone())
    }

    /// 替换角色的权限集
    pub fn set_permissions(
        &mut self,
        id: &str,
        req: UpdateRolePermissionsRequest,
        now: DateTime<Utc>,
    ) -> Result<Role> {
        self.check_mutable(id, req.version)?;
        let permissions = self.resolve_permissions(&req.permissions)?;

        let role = self
            .roles
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("role", id))?;
        role.permissions = permissions;
        role.version += 1;
        role.updated_at = now;

        Ok(role.clone())
    }

    /// 删除角色；`open_attributions` 为仍引用该角色的非终态 attribution 数
    pub fn delete(&mut self, id: &str, open_attributions: usize) -> Result<Role> {
        let role = self.get(id)?;
        if role.is_system {
            return Err(AppError::ImmutableRole(id.to_string()));
        }
        let in_use = (role.user_count as usize).max(open_attributions);
        if in_use > 0 {
            return Err(AppError::RoleInUse {
                role_id: id.to_string(),
                count: in_use,
            });
        }

        self.roles
            .remove(id)
            .ok_or_else(|| AppError::not_found("role", id))
    }

    /// 刷新反规范化的 user_count
    pub fn set_user_count(&mut self, id: &str, count: u32) {
        if let Some(role) = self.roles.get_mut(id) {
            if role.user_count != count {
                role.user_count = count;
            }
        }
    }

    /// 安装内置系统角色（已存在的跳过）
    pub fn seed_system_roles(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let mut installed = 0;
        for (id, name, description, permissions) in SYSTEM_ROLES {
            if self.roles.contains(id) {
                continue;
            }
            let permissions = match permissions {
                Some(ids) => ids.iter().map(|p| p.to_string()).collect(),
                None => self.permissions.all_ids(),
            };
            self.create(
                CreateRoleRequest {
                    id: Some(id.to_string()),
                    name: name.to_string(),
                    description: Some(description.to_string()),
                    permissions,
                    unit_id: None,
                },
                "system",
                true,
                now,
            )?;
            installed += 1;
        }
        Ok(installed)
    }

    // ==================== Role Requests ====================

    pub fn list_requests(&self, status: Option<RoleRequestStatus>) -> Vec<RoleRequest> {
        self.requests
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect()
    }

    pub fn get_request(&self, id: &str) -> Result<&RoleRequest> {
        self.requests
            .get(id)
            .ok_or_else(|| AppError::not_found("role request", id))
    }

    /// 提交角色申请（提交时即校验权限 id）
    pub fn submit_request(
        &mut self,
        req: SubmitRoleRequest,
        requested_by: &str,
        now: DateTime<Utc>,
    ) -> Result<RoleRequest> {
        self.resolve_permissions(&req.permissions)?;

        let request = RoleRequest {
            id: super::new_id("role-request"),
            name: req.name.trim().to_string(),
            description: req.description,
            permissions: req.permissions,
            unit_id: req.unit_id,
            justification: req.justification,
            status: RoleRequestStatus::Pending,
            requested_by: requested_by.to_string(),
            requested_at: now,
            decided_by: None,
            decided_at: None,
            decision_comment: None,
            role_id: None,
        };

        self.requests
            .insert(request.clone())
            .map_err(|_| AppError::internal_error("role request insert raced with itself"))?;
        Ok(request)
    }

    fn pending_request(&self, id: &str, action: &str) -> Result<&RoleRequest> {
        let request = self.get_request(id)?;
        if request.status != RoleRequestStatus::Pending {
            return Err(AppError::StateTransition {
                from: request.status.as_str().to_string(),
                action: action.to_string(),
            });
        }
        Ok(request)
    }

    /// 批准申请：按 createRole 的规则创建角色
    pub fn approve_request(
        &mut self,
        id: &str,
        decided_by: &str,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(RoleRequest, Role)> {
        let request = self.pending_request(id, "approve")?.clone();

        let role = self.create(
            CreateRoleRequest {
                id: None,
                name: request.name.clone(),
                description: request.description.clone(),
                permissions: request.permissions.clone(),
                unit_id: request.unit_id.clone(),
            },
            &request.requested_by,
            false,
            now,
        )?;

        let stored = self
            .requests
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("role request", id))?;
        stored.status = RoleRequestStatus::Approved;
        stored.decided_by = Some(decided_by.to_string());
        stored.decided_at = Some(now);
        stored.decision_comment = comment;
        stored.role_id = Some(role.id.clone());

        Ok((stored.clone(), role))
    }

    /// 拒绝申请
    pub fn reject_request(
        &mut self,
        id: &str,
        decided_by: &str,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<RoleRequest> {
        self.pending_request(id, "reject")?;

        let stored = self
            .requests
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("role request", id))?;
        stored.status = RoleRequestStatus::Rejected;
        stored.decided_by = Some(decided_by.to_string());
        stored.decided_at = Some(now);
        stored.decision_comment = comment;

        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> RoleCatalog {
        let mut roles = RoleCatalog::new(PermissionCatalog::default());
        roles.seed_system_roles(Utc::now()).unwrap();
        roles
    }

    fn create(name: &str, unit_id: Option<&str>, permissions: &[&str]) -> CreateRoleRequest {
        CreateRoleRequest {
            id: None,
            name: name.to_string(),
            description: None,
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            unit_id: unit_id.map(str::to_string),
        }
    }

    #[test]
    fn test_seeded_super_admin_holds_every_permission() {
        let roles = catalog();
        let admin = roles.get("role-super-admin").unwrap();
        assert!(admin.is_system);
        assert_eq!(admin.permissions.len(), roles.permission_catalog().all_ids().len());
    }

    #[test]
    fn test_seed_is_repeatable() {
        let mut roles = catalog();
        assert_eq!(roles.seed_system_roles(Utc::now()).unwrap(), 0);
        assert_eq!(roles.len(), 3);
    }

    #[test]
    fn test_name_unique_per_scope() {
        let mut roles = catalog();
        roles
            .create(create("Doyen", Some("fac-1"), &["unite.view"]), "admin", false, Utc::now())
            .unwrap();

        let dup = roles.create(create(" doyen ", Some("fac-1"), &[]), "admin", false, Utc::now());
        assert!(matches!(dup, Err(AppError::Validation(_))));

        // 其他单元下同名合法
        assert!(roles
            .create(create("Doyen", Some("fac-2"), &[]), "admin", false, Utc::now())
            .is_ok());
    }

    #[test]
    fn test_unknown_permission_rejected() {
        let mut roles = catalog();
        let err = roles
            .create(create("Surveillant", None, &["absence.view", "absence.delete"]), "admin", false, Utc::now())
            .unwrap_err();
        assert!(err.to_string().contains("absence.delete"));
        assert!(roles.list(&RoleListFilters::default()).iter().all(|r| r.name != "Surveillant"));
    }

    #[test]
    fn test_system_role_is_immutable() {
        let mut roles = catalog();
        let version = roles.get("role-observateur").unwrap().version;
        let err = roles
            .update(
                "role-observateur",
                UpdateRoleRequest {
                    name: Some("Lecteur".to_string()),
                    version,
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, AppError::ImmutableRole(_)));
        assert!(matches!(
            roles.delete("role-observateur", 0),
            Err(AppError::ImmutableRole(_))
        ));
    }

    #[test]
    fn test_delete_refused_while_in_use() {
        let mut roles = catalog();
        let role = roles
            .create(create("Professeur", None, &["note.edit"]), "admin", false, Utc::now())
            .unwrap();
        roles.set_user_count(&role.id, 2);
        assert!(matches!(
            roles.delete(&role.id, 2),
            Err(AppError::RoleInUse { count: 2, .. })
        ));

        roles.set_user_count(&role.id, 0);
        assert!(matches!(roles.delete(&role.id, 1), Err(AppError::RoleInUse { .. })));
        assert!(roles.delete(&role.id, 0).is_ok());
        assert!(roles.find(&role.id).is_none());
    }

    #[test]
    fn test_set_permissions_bumps_version() {
        let mut roles = catalog();
        let role = roles
            .create(create("Professeur", None, &["note.view"]), "admin", false, Utc::now())
            .unwrap();
        let updated = roles
            .set_permissions(
                &role.id,
                UpdateRolePermissionsRequest {
                    permissions: vec!["note.view".into(), "note.edit".into()],
                    version: role.version,
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(updated.version, role.version + 1);
        assert!(updated.permissions.contains("note.edit"));

        let stale = roles.set_permissions(
            &role.id,
            UpdateRolePermissionsRequest {
                permissions: vec![],
                version: role.version,
            },
            Utc::now(),
        );
        assert!(matches!(stale, Err(AppError::VersionConflict { .. })));
    }

    #[test]
    fn test_role_request_lifecycle() {
        let mut roles = catalog();
        let request = roles
            .submit_request(
                SubmitRoleRequest {
                    name: "Chef de département".to_string(),
                    description: None,
                    permissions: vec!["unite.view".into()],
                    unit_id: None,
                    justification: Some("Nouvelle structure".into()),
                },
                "user-1",
                Utc::now(),
            )
            .unwrap();

        let (approved, role) = roles
            .approve_request(&request.id, "admin", None, Utc::now())
            .unwrap();
        assert_eq!(approved.status, RoleRequestStatus::Approved);
        assert_eq!(approved.role_id.as_deref(), Some(role.id.as_str()));
        assert_eq!(role.created_by, "user-1");

        let again = roles.reject_request(&request.id, "admin", None, Utc::now());
        assert!(matches!(again, Err(AppError::StateTransition { .. })));
    }
}
