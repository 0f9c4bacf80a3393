//! 目录：持有单元树、角色目录、授权台账和元素登记表
//!
//! 所有跨集合的校验都在这里完成，且全部校验先于任何写入；
//! 每次成功的变更都会递增 `revision`，供权限解析缓存判断失效。

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::attribution_repo::{AttributionLedger, NewAttribution};
use super::element_repo::ElementRegistry;
use super::role_repo::RoleCatalog;
use super::unit_repo::UnitTree;
use crate::config::DirectoryConfig;
use crate::error::{AppError, Result};
use crate::models::attribution::*;
use crate::models::element::*;
use crate::models::permission::PermissionCatalog;
use crate::models::role::*;
use crate::models::unit::*;

/// 服务之间共享的目录句柄
pub type SharedDirectory = Arc<RwLock<Directory>>;

#[derive(Debug, Clone)]
pub struct Directory {
    units: UnitTree,
    roles: RoleCatalog,
    attributions: AttributionLedger,
    elements: ElementRegistry,
    revision: u64,
}

impl Directory {
    pub fn new(cascade_deactivation: bool, permissions: PermissionCatalog) -> Self {
        Self {
            units: UnitTree::new(cascade_deactivation),
            roles: RoleCatalog::new(permissions),
            attributions: AttributionLedger::new(),
            elements: ElementRegistry::new(),
            revision: 0,
        }
    }

    /// 按配置创建目录，并视需要安装系统角色
    pub fn from_config(config: &DirectoryConfig) -> Result<Self> {
        let mut directory = Self::new(config.cascade_deactivation, PermissionCatalog::default());
        if config.seed_system_roles {
            directory.seed_system_roles(Utc::now())?;
        }
        Ok(directory)
    }

    pub fn into_shared(self) -> SharedDirectory {
        Arc::new(RwLock::new(self))
    }

    pub fn units(&self) -> &UnitTree {
        &self.units
    }

    pub fn roles(&self) -> &RoleCatalog {
        &self.roles
    }

    pub fn attributions(&self) -> &AttributionLedger {
        &self.attributions
    }

    pub fn elements(&self) -> &ElementRegistry {
        &self.elements
    }

    pub fn permission_catalog(&self) -> &PermissionCatalog {
        self.roles.permission_catalog()
    }

    /// 单调递增的变更计数
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn commit<T>(&mut self, value: T) -> T {
        self.revision += 1;
        value
    }

    // ==================== Units ====================

    pub fn insert_unit(&mut self, req: CreateUnitRequest, now: DateTime<Utc>) -> Result<Unit> {
        if let Some(id) = req.id.as_deref() {
            self.ensure_scope_id_free(id)?;
        }
        let unit = self.units.insert(req, now)?;
        Ok(self.commit(unit))
    }

    pub fn update_unit(&mut self, id: &str, req: UpdateUnitRequest, now: DateTime<Utc>) -> Result<Unit> {
        let unit = self.units.update(id, req, now)?;
        Ok(self.commit(unit))
    }

    pub fn deactivate_unit(&mut self, id: &str, version: Option<u64>, now: DateTime<Utc>) -> Result<Unit> {
        let was_active = self.units.get(id)?.active;
        let unit = self.units.deactivate(id, version, now)?;
        if was_active {
            return Ok(self.commit(unit));
        }
        Ok(unit)
    }

    /// 单元与元素共用授权范围的 id 空间
    fn ensure_scope_id_free(&self, id: &str) -> Result<()> {
        if self.units.find(id).is_some() || self.elements.find(id).is_some() {
            return Err(AppError::validation(format!(
                "id {} is already used by a unit or an element",
                id
            )));
        }
        Ok(())
    }

    // ==================== Elements ====================

    pub fn create_element(&mut self, req: CreateElementRequest, now: DateTime<Utc>) -> Result<Element> {
        if let Some(id) = req.id.as_deref() {
            self.ensure_scope_id_free(id)?;
        }
        if let Some(unit_id) = req.unit_id.as_deref() {
            self.units.get(unit_id)?;
        }
        let element = self.elements.insert(req, now)?;
        Ok(self.commit(element))
    }

    /// 停用元素；对已停用的元素是幂等的
    pub fn deactivate_element(&mut self, id: &str) -> Result<Element> {
        let was_active = self.elements.get(id)?.active;
        let element = self.elements.deactivate(id)?;
        if was_active {
            return Ok(self.commit(element));
        }
        Ok(element)
    }

    // ==================== Roles ====================

    fn ensure_role_scope(&self, unit_id: Option<&str>) -> Result<()> {
        if let Some(unit_id) = unit_id {
            self.units.get(unit_id)?;
        }
        Ok(())
    }

    pub fn create_role(&mut self, req: CreateRoleRequest, created_by: &str, now: DateTime<Utc>) -> Result<Role> {
        self.ensure_role_scope(req.unit_id.as_deref())?;
        let role = self.roles.create(req, created_by, false, now)?;
        Ok(self.commit(role))
    }

    pub fn update_role(&mut self, id: &str, req: UpdateRoleRequest, now: DateTime<Utc>) -> Result<Role> {
        let role = self.roles.update(id, req, now)?;
        self.attributions.rename_role(&role.id, &role.name, now);
        Ok(self.commit(role))
    }

    pub fn set_role_permissions(
        &mut self,
        id: &str,
        req: UpdateRolePermissionsRequest,
        now: DateTime<Utc>,
    ) -> Result<Role> {
        let role = self.roles.set_permissions(id, req, now)?;
        Ok(self.commit(role))
    }

    pub fn delete_role(&mut self, id: &str) -> Result<Role> {
        let open = self.attributions.open_for_role(id);
        let role = self.roles.delete(id, open)?;
        Ok(self.commit(role))
    }

    pub fn seed_system_roles(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let installed = self.roles.seed_system_roles(now)?;
        if installed > 0 {
            self.revision += 1;
        }
        Ok(installed)
    }

    pub fn submit_role_request(
        &mut self,
        req: SubmitRoleRequest,
        requested_by: &str,
        now: DateTime<Utc>,
    ) -> Result<RoleRequest> {
        self.ensure_role_scope(req.unit_id.as_deref())?;
        let request = self.roles.submit_request(req, requested_by, now)?;
        Ok(self.commit(request))
    }

    pub fn approve_role_request(
        &mut self,
        id: &str,
        decided_by: &str,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(RoleRequest, Role)> {
        // 批准时重新校验模板单元
        let unit_id = self.roles.get_request(id)?.unit_id.clone();
        self.ensure_role_scope(unit_id.as_deref())?;
        let decided = self.roles.approve_request(id, decided_by, comment, now)?;
        Ok(self.commit(decided))
    }

    pub fn reject_role_request(
        &mut self,
        id: &str,
        decided_by: &str,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<RoleRequest> {
        let request = self.roles.reject_request(id, decided_by, comment, now)?;
        Ok(self.commit(request))
    }

    // ==================== Attributions ====================

    /// 解析授权范围，返回 (scope_id, scope_name)
    fn resolve_scope(&self, scope_type: ScopeType, scope_id: Option<&str>) -> Result<(Option<String>, String)> {
        match (scope_type, scope_id) {
            (ScopeType::Global, None) => Ok((None, "Global".to_string())),
            (ScopeType::Global, Some(_)) => Err(AppError::validation("a global attribution takes no scopeId")),
            (_, None) => Err(AppError::validation(format!(
                "scopeId is required for {} scope",
                scope_type
            ))),
            (ScopeType::Unit, Some(id)) => {
                let unit = self.units.get(id)?;
                if !self.units.is_live(id) {
                    return Err(AppError::validation(format!("unit {} is not active", id)));
                }
                Ok((Some(unit.id.clone()), unit.name.clone()))
            }
            (ScopeType::Element, Some(id)) => {
                if let Some(element) = self.elements.find(id) {
                    let unit_live = element.unit_id.as_deref().map_or(true, |u| self.units.is_live(u));
                    if !element.active || !unit_live {
                        return Err(AppError::validation(format!("element {} is not active", id)));
                    }
                    return Ok((Some(element.id.clone()), element.name.clone()));
                }
                match self.units.find(id) {
                    Some(unit) if self.units.is_live(id) => Ok((Some(unit.id.clone()), unit.name.clone())),
                    Some(_) => Err(AppError::validation(format!("unit {} is not active", id))),
                    None => Err(AppError::not_found("element", id)),
                }
            }
        }
    }

    pub fn create_attribution(
        &mut self,
        req: CreateAttributionRequest,
        requested_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Attribution> {
        let role = self.roles.get(&req.role_id)?;
        let role_name = role.name.clone();
        let (scope_id, scope_name) = self.resolve_scope(req.scope_type, req.scope_id.as_deref())?;

        let new = NewAttribution {
            user_name: req
                .user_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| req.user_id.clone()),
            user_id: req.user_id,
            role_id: req.role_id,
            role_name,
            scope_type: req.scope_type,
            scope_id,
            scope_name,
            start_date: req.start_date.unwrap_or(now),
            end_date: req.end_date,
            requested_by: requested_by.to_string(),
        };

        let attribution = self.attributions.insert(new, now)?;
        self.refresh_user_count(&attribution.role_id);
        Ok(self.commit(attribution))
    }

    pub fn change_attribution_status(
        &mut self,
        id: &str,
        action: StatusAction,
        version: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<Attribution> {
        let attribution = self.attributions.change_status(id, action, version, now)?;
        self.refresh_user_count(&attribution.role_id);
        Ok(self.commit(attribution))
    }

    /// 过期扫描；没有记录过期时不产生新的 revision
    pub fn sweep_expirations(&mut self, now: DateTime<Utc>) -> SweepReport {
        let report = self.attributions.sweep_expirations(now);
        if report.expired.is_empty() {
            return report;
        }

        let touched: BTreeSet<String> = report
            .expired
            .iter()
            .filter_map(|id| self.attributions.get(id).ok())
            .map(|a| a.role_id.clone())
            .collect();
        for role_id in &touched {
            self.refresh_user_count(role_id);
        }
        self.commit(report)
    }

    fn refresh_user_count(&mut self, role_id: &str) {
        let count = self.attributions.count_for_role(role_id);
        self.roles.set_user_count(role_id, count);
    }
}
