//! Role catalog service
//! 角色、权限目录与角色申请流程

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::models::permission::PermissionCategory;
use crate::models::role::*;
use crate::repository::SharedDirectory;

/// 角色服务
pub struct RoleService {
    directory: SharedDirectory,
}

impl RoleService {
    pub fn new(directory: SharedDirectory) -> Self {
        Self { directory }
    }

    /// 静态权限目录
    pub async fn list_permission_categories(&self) -> Vec<PermissionCategory> {
        self.directory
            .read()
            .await
            .permission_catalog()
            .categories()
            .to_vec()
    }

    #[instrument(skip(self))]
    pub async fn list_roles(&self, filters: RoleListFilters) -> Vec<Role> {
        self.directory.read().await.roles().list(&filters)
    }

    #[instrument(skip(self))]
    pub async fn get_role(&self, id: &str) -> Result<Role> {
        self.directory.read().await.roles().get(id).cloned()
    }

    /// 创建角色
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_role(&self, request: CreateRoleRequest, created_by: &str) -> Result<Role> {
        let mut dir = self.directory.write().await;
        let role = dir.create_role(request, created_by, Utc::now()).map_err(|e| {
            warn!(error = %e, "Role creation rejected");
            e
        })?;

        info!(role_id = %role.id, permissions = role.permissions.len(), "Role created");
        Ok(role)
    }

    /// 更新角色（改名会同步到引用它的 attribution）
    #[instrument(skip(self, request))]
    pub async fn update_role(&self, id: &str, request: UpdateRoleRequest) -> Result<Role> {
        let mut dir = self.directory.write().await;
        let role = dir.update_role(id, request, Utc::now()).map_err(|e| {
            warn!(error = %e, "Role update rejected");
            e
        })?;

        info!(role_id = %role.id, version = role.version, "Role updated");
        Ok(role)
    }

    /// 替换角色权限集，返回更新后的角色
    #[instrument(skip(self, request))]
    pub async fn update_role_permissions(
        &self,
        id: &str,
        request: UpdateRolePermissionsRequest,
    ) -> Result<Role> {
        let mut dir = self.directory.write().await;
        let role = dir.set_role_permissions(id, request, Utc::now()).map_err(|e| {
            warn!(error = %e, "Role permission update rejected");
            e
        })?;

        info!(role_id = %role.id, permissions = role.permissions.len(), "Role permissions replaced");
        Ok(role)
    }

    #[instrument(skip(self))]
    pub async fn delete_role(&self, id: &str) -> Result<()> {
        let mut dir = self.directory.write().await;
        let role = dir.delete_role(id).map_err(|e| {
            warn!(error = %e, "Role deletion rejected");
            e
        })?;

        info!(role_id = %role.id, "Role deleted");
        Ok(())
    }

    // ==================== Role Requests ====================

    #[instrument(skip(self))]
    pub async fn list_role_requests(&self, status: Option<RoleRequestStatus>) -> Vec<RoleRequest> {
        self.directory.read().await.roles().list_requests(status)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn submit_role_request(
        &self,
        request: SubmitRoleRequest,
        requested_by: &str,
    ) -> Result<RoleRequest> {
        let mut dir = self.directory.write().await;
        let submitted = dir.submit_role_request(request, requested_by, Utc::now())?;

        info!(request_id = %submitted.id, requested_by = %requested_by, "Role request submitted");
        Ok(submitted)
    }

    #[instrument(skip(self, decision))]
    pub async fn approve_role_request(
        &self,
        id: &str,
        decided_by: &str,
        decision: DecideRoleRequest,
    ) -> Result<(RoleRequest, Role)> {
        let mut dir = self.directory.write().await;
        let (request, role) = dir
            .approve_role_request(id, decided_by, decision.comment, Utc::now())
            .map_err(|e| {
                warn!(error = %e, "Role request approval rejected");
                e
            })?;

        info!(request_id = %request.id, role_id = %role.id, "Role request approved");
        Ok((request, role))
    }

    #[instrument(skip(self, decision))]
    pub async fn reject_role_request(
        &self,
        id: &str,
        decided_by: &str,
        decision: DecideRoleRequest,
    ) -> Result<RoleRequest> {
        let mut dir = self.directory.write().await;
        let request = dir.reject_role_request(id, decided_by, decision.comment, Utc::now())?;

        info!(request_id = %request.id, "Role request rejected");
        Ok(request)
    }
}
